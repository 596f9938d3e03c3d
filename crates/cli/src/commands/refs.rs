use crate::buildstore;
use crate::repo::LocalRepo;
use crate::storage::IndexCache;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use xref_core::{ByteOffsets, FileByteRanges, RefIndex, Session};

/// Build (or load from cache) the reference index for the current commit
/// and list references to one def.
pub fn handle_refs(
    session: &Session,
    local: &LocalRepo,
    def_path: &str,
    unit: Option<&str>,
    unit_type: Option<&str>,
    rebuild: bool,
) -> Result<()> {
    let commit = &local.commit_id;
    let dir = match buildstore::local_data_dir(&local.root, commit) {
        Some(dir) => dir,
        None => bail!(
            "no build found for {}@{}; run an analysis build first",
            local.uri,
            commit
        ),
    };

    let output = buildstore::load_graph_output(&dir)?;
    let def = output
        .defs
        .iter()
        .filter(|d| unit.map_or(true, |u| d.key.unit == u))
        .filter(|d| unit_type.map_or(true, |t| d.key.unit_type == t))
        .find(|d| d.key.path == def_path)
        .with_context(|| format!("no def {} in build data for {}", def_path, commit))?;

    let cache = IndexCache::open(buildstore::index_cache_path(&local.root))?;
    let index = if rebuild {
        None
    } else {
        cache.load(commit)?
    };
    let index = match index {
        Some(index) => index,
        None => {
            if session.verbose {
                tracing::debug!(
                    "building reference index for {} defs / {} refs",
                    output.defs.len(),
                    output.refs.len()
                );
            }
            let mut index = RefIndex::new();
            index.build(
                &output.defs,
                &output.refs,
                &FileByteRanges::new(),
                &ByteOffsets::new(),
            )?;
            cache.save(commit, &index)?;
            index
        }
    };

    let refs = index.references_to(&def.key)?;
    if refs.is_empty() {
        println!("no references to '{}'", def_path);
        return Ok(());
    }

    println!("{} references to '{}':", refs.len(), def_path.bold());
    for r in &refs {
        let marker = if r.is_external() { "ext" } else { "   " };
        println!(
            "  {} {} : {} [{}..{})",
            marker.dimmed(),
            r.repo,
            r.file,
            r.start,
            r.end
        );
    }
    Ok(())
}

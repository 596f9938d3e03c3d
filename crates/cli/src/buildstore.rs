//! Local per-repository build-output directory, keyed by commit.
//!
//! Analysis tooling writes `<unit>.graph.json` (defs + refs) and
//! `<unit>.depresolve.json` files under `.xref/builds/<commit>/`; this
//! module only ever reads them.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use xref_core::GraphOutput;

pub const BUILD_DATA_DIR: &str = ".xref";
pub const GRAPH_SUFFIX: &str = ".graph.json";

/// The build-data directory for one commit of the repository at `root`.
pub fn commit_dir(root: &Path, commit: &str) -> PathBuf {
    root.join(BUILD_DATA_DIR).join("builds").join(commit)
}

/// `Some(dir)` when local build data exists for this exact commit.
pub fn local_data_dir(root: &Path, commit: &str) -> Option<PathBuf> {
    let dir = commit_dir(root, commit);
    dir.is_dir().then_some(dir)
}

/// Path of the sled index cache for the repository at `root`.
pub fn index_cache_path(root: &Path) -> PathBuf {
    root.join(BUILD_DATA_DIR).join("index.db")
}

/// Merge every `*.graph.json` under `dir` into one graph output.
pub fn load_graph_output(dir: &Path) -> Result<GraphOutput> {
    let mut merged = GraphOutput::default();

    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(GRAPH_SUFFIX) {
            continue;
        }
        let path = entry.path();
        debug!(file = %path.display(), "reading graph data");
        let file = File::open(path)
            .with_context(|| format!("failed to open graph data {}", path.display()))?;
        let out: GraphOutput = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to decode graph data {}", path.display()))?;
        merged.defs.extend(out.defs);
        merged.refs.extend(out.refs);
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use xref_core::test_fixtures::CorpusBuilder;

    #[test]
    fn test_local_data_dir_requires_exact_commit() {
        let tmp = TempDir::new().unwrap();
        assert!(local_data_dir(tmp.path(), "c1").is_none());

        fs::create_dir_all(commit_dir(tmp.path(), "c1")).unwrap();
        assert!(local_data_dir(tmp.path(), "c1").is_some());
        assert!(local_data_dir(tmp.path(), "c2").is_none());
    }

    #[test]
    fn test_load_graph_output_merges_units() {
        let tmp = TempDir::new().unwrap();
        let dir = commit_dir(tmp.path(), "c1");
        fs::create_dir_all(&dir).unwrap();

        let lib = CorpusBuilder::new("github.com/a/app", "c1")
            .def("lib", "Widget", "src/widget.rs", 0, 6)
            .reference("lib", "Widget", "src/a.rs", 10, 16)
            .build();
        let util = CorpusBuilder::new("github.com/a/app", "c1")
            .def("util", "helper", "src/util.rs", 0, 6)
            .build();

        let write = |name: &str, defs, refs| {
            let out = GraphOutput { defs, refs };
            fs::write(
                dir.join(format!("{}{}", name, GRAPH_SUFFIX)),
                serde_json::to_string(&out).unwrap(),
            )
            .unwrap();
        };
        write("lib", lib.defs, lib.refs);
        write("util", util.defs, util.refs);
        // Unrelated files are ignored.
        fs::write(dir.join("unit.depresolve.json"), "[]").unwrap();

        let merged = load_graph_output(&dir).unwrap();
        assert_eq!(merged.defs.len(), 2);
        assert_eq!(merged.refs.len(), 1);
    }
}

use crate::buildstore;
use crate::repo::LocalRepo;
use anyhow::Result;
use colored::Colorize;
use xref_core::backend::{BuildSource, DependencySource};
use xref_core::{DepResolver, RepoRevSpec, Session};

pub fn handle_deps<B>(session: &Session, backend: &B, local: &LocalRepo) -> Result<()>
where
    B: BuildSource + DependencySource,
{
    let uri = session
        .repo
        .as_ref()
        .map(|r| r.uri.clone())
        .unwrap_or_else(|| local.uri.clone());
    let mut rev = RepoRevSpec::new(uri, &local.commit_id);
    rev.commit_id = local.commit_id.clone();

    let resolver = DepResolver::new(session, backend, backend);
    let local_dir = buildstore::local_data_dir(&local.root, &local.commit_id);
    let targets = resolver.resolve(&rev, local_dir.as_deref())?;

    if targets.is_empty() {
        println!("no dependencies recorded for {}", rev.uri);
        return Ok(());
    }

    for target in &targets {
        let mut detail = Vec::new();
        if !target.to_unit_type.is_empty() || !target.to_unit.is_empty() {
            detail.push(format!("{}:{}", target.to_unit_type, target.to_unit));
        }
        if !target.to_rev_spec.is_empty() {
            detail.push(format!("@{}", target.to_rev_spec));
        }
        if detail.is_empty() {
            println!("{}", target.to_repo_clone_url.bold());
        } else {
            println!(
                "{} {}",
                target.to_repo_clone_url.bold(),
                detail.join(" ").dimmed()
            );
        }
    }
    Ok(())
}

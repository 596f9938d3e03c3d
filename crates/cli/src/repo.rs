use anyhow::{Context, Result};
use git2::Repository;
use std::path::{Path, PathBuf};
use xref_core::repo_uri_from_clone_url;

/// The git repository an invocation runs inside: its worktree root, the
/// URI derived from the `origin` remote, and the HEAD commit.
#[derive(Debug, Clone)]
pub struct LocalRepo {
    pub root: PathBuf,
    pub uri: String,
    pub commit_id: String,
}

/// Discover the repository containing `start` and derive its identity.
pub fn open_current_repo(start: &Path) -> Result<LocalRepo> {
    let repo = Repository::discover(start)
        .with_context(|| format!("no git repository found at {}", start.display()))?;
    let root = repo
        .workdir()
        .unwrap_or_else(|| repo.path())
        .to_path_buf();

    let origin = repo
        .find_remote("origin")
        .context("repository has no 'origin' remote; pass --repo explicitly")?;
    let url = origin
        .url()
        .context("'origin' remote has a non-UTF-8 URL")?;
    let uri = repo_uri_from_clone_url(url);

    let commit_id = repo
        .head()
        .context("failed to read HEAD")?
        .peel_to_commit()
        .context("HEAD does not point at a commit")?
        .id()
        .to_string();

    Ok(LocalRepo {
        root,
        uri,
        commit_id,
    })
}

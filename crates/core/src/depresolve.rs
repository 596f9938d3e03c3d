//! Dependency resolution: which repositories/commits does a repository
//! depend on. Local analysis artifacts take total precedence; the remote
//! service is only consulted when no local resolution file exists at all.

use crate::backend::{BuildSource, DependencySource};
use crate::context::{RepoRevSpec, Session};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Suffix identifying dependency-resolution output files in a commit's
/// build-data directory.
pub const DEP_RESOLVE_SUFFIX: &str = ".depresolve.json";

/// A concrete external repository+unit+revision a raw dependency resolves
/// to.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ResolvedTarget {
    pub to_repo_clone_url: String,
    #[serde(default)]
    pub to_unit_type: String,
    #[serde(default)]
    pub to_unit: String,
    #[serde(default)]
    pub to_rev_spec: String,
}

/// One record in a dependency-resolution output file: the raw
/// import/require statement plus its resolution or failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(default)]
    pub raw: serde_json::Value,
    #[serde(default)]
    pub target: Option<ResolvedTarget>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The minimal dependency record the remote service keeps per built
/// commit: a bare clone URL with no unit-level detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDep {
    pub from_repo: String,
    #[serde(default)]
    pub from_commit_id: String,
    pub to_repo_clone_url: String,
}

/// Derive a repository URI from a clone URL:
/// `https://github.com/a/b.git` -> `github.com/a/b`.
pub fn repo_uri_from_clone_url(clone_url: &str) -> String {
    let stripped = clone_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("git://")
        .trim_start_matches("ssh://");
    let stripped = match stripped.split_once('@') {
        Some((_, rest)) => rest,
        None => stripped,
    };
    stripped
        .replace(':', "/")
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .to_string()
}

/// Resolves a repository's dependency set, local artifacts first.
pub struct DepResolver<'a> {
    session: &'a Session,
    builds: &'a dyn BuildSource,
    deps: &'a dyn DependencySource,
}

impl<'a> DepResolver<'a> {
    pub fn new(
        session: &'a Session,
        builds: &'a dyn BuildSource,
        deps: &'a dyn DependencySource,
    ) -> Self {
        Self {
            session,
            builds,
            deps,
        }
    }

    /// Deduplicated resolved targets for `rev`. `local_build_dir` is the
    /// commit's build-data directory when the caller has local artifacts
    /// for this exact commit.
    pub fn resolve(
        &self,
        rev: &RepoRevSpec,
        local_build_dir: Option<&Path>,
    ) -> Result<Vec<ResolvedTarget>> {
        if let Some(dir) = local_build_dir {
            if let Some(targets) = self.resolve_local(dir)? {
                // An empty local answer is final; never fall through.
                return Ok(targets);
            }
        }
        self.resolve_remote(rev)
    }

    /// Scan every dependency-resolution file under `dir`. Returns `None`
    /// when no such file exists, `Some(targets)` otherwise.
    fn resolve_local(&self, dir: &Path) -> Result<Option<Vec<ResolvedTarget>>> {
        let mut found_any = false;
        let mut targets: BTreeSet<ResolvedTarget> = BTreeSet::new();

        for entry in WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy();
            if !name.ends_with(DEP_RESOLVE_SUFFIX) {
                continue;
            }
            found_any = true;
            debug!(file = %path.display(), "reading dependency resolutions");

            let file = File::open(path)?;
            let resolutions: Vec<Resolution> = serde_json::from_reader(BufReader::new(file))
                .map_err(|source| Error::BadResolutionFile {
                    file: path.display().to_string(),
                    source,
                })?;
            for resolution in resolutions {
                if let Some(target) = resolution.target {
                    if !target.to_repo_clone_url.is_empty() {
                        targets.insert(target);
                    }
                }
            }
        }

        if found_any {
            Ok(Some(targets.into_iter().collect()))
        } else {
            Ok(None)
        }
    }

    /// Ask the remote service which commit has a build, then list the
    /// dependencies it recorded for that commit.
    fn resolve_remote(&self, rev: &RepoRevSpec) -> Result<Vec<ResolvedTarget>> {
        let build = self.builds.get_build(rev, false)?;
        let commit = match build.usable_commit() {
            Some(commit) => commit.to_string(),
            None => {
                return Err(Error::DependenciesUnknown {
                    repo: rev.uri.clone(),
                    commit: rev.effective_commit().to_string(),
                })
            }
        };
        if build.exact.as_ref().map_or(true, |b| !b.success) {
            let behind = build.commits_behind.unwrap_or(0);
            info!(
                "using dependencies of commit {} ({} commits behind) because {} is not built",
                commit,
                behind,
                rev.effective_commit()
            );
        }
        if self.session.verbose {
            debug!(repo = %rev.uri, commit = %commit, "listing remote dependencies");
        }

        let resolved_rev = RepoRevSpec {
            uri: rev.uri.clone(),
            rev: rev.rev.clone(),
            commit_id: commit,
        };
        let deps = self.deps.list_dependencies(&resolved_rev)?;

        let targets: BTreeSet<ResolvedTarget> = deps
            .into_iter()
            .filter(|d| !d.to_repo_clone_url.is_empty())
            .map(|d| ResolvedTarget {
                to_repo_clone_url: d.to_repo_clone_url,
                ..ResolvedTarget::default()
            })
            .collect();
        Ok(targets.into_iter().collect())
    }
}

//! Background completion warm-up for the interactive query loop.
//!
//! One worker per dependency target fetches its build status and exported
//! def list, all appending into one mutex-guarded candidate collection.
//! Candidates arrive in no particular order; workers that outlive the
//! shell have their results silently discarded with the collection.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::debug;
use xref_core::backend::{BuildSource, DefListOptions, DefSource, ListOptions};
use xref_core::{repo_uri_from_clone_url, RepoRevSpec, ResolvedTarget};

const WARM_UP_PER_PAGE: usize = 500;

/// Append-only, thread-safe collection of completion candidates.
#[derive(Clone, Default)]
pub struct CompletionSet {
    inner: Arc<Mutex<Vec<String>>>,
}

impl CompletionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, candidate: String) {
        let mut candidates = self.inner.lock().expect("completion lock poisoned");
        candidates.push(candidate);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("completion lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive prefix matches, point-in-time snapshot.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let candidates = self.inner.lock().expect("completion lock poisoned");
        candidates
            .iter()
            .filter(|c| c.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect()
    }
}

/// Spawn one worker per dependency target. Failures are logged at debug
/// level and the target skipped; nothing here aborts the shell.
pub fn warm_up<B>(
    set: &CompletionSet,
    targets: Vec<ResolvedTarget>,
    backend: Arc<B>,
) -> Vec<JoinHandle<()>>
where
    B: DefSource + BuildSource + Send + Sync + 'static,
{
    targets
        .into_iter()
        .map(|target| {
            let set = set.clone();
            let backend = Arc::clone(&backend);
            thread::spawn(move || warm_up_target(&set, &target, backend.as_ref()))
        })
        .collect()
}

fn warm_up_target<B>(set: &CompletionSet, target: &ResolvedTarget, backend: &B)
where
    B: DefSource + BuildSource,
{
    let uri = repo_uri_from_clone_url(&target.to_repo_clone_url);
    let rev = RepoRevSpec::new(&uri, &target.to_rev_spec);

    let build = match backend.get_build(&rev, false) {
        Ok(build) => build,
        Err(e) => {
            debug!("no build info for {} (completion warm-up): {}", uri, e);
            return;
        }
    };
    let commit = match build.usable_commit() {
        Some(commit) => commit.to_string(),
        None => {
            debug!("no successful build for {} (completion warm-up)", uri);
            return;
        }
    };

    let built_rev = RepoRevSpec {
        uri: uri.clone(),
        rev: target.to_rev_spec.clone(),
        commit_id: commit,
    };
    let opt = DefListOptions {
        unit_type: non_empty(&target.to_unit_type),
        unit: non_empty(&target.to_unit),
        exported_only: true,
        list: ListOptions {
            per_page: WARM_UP_PER_PAGE,
            page: 1,
        },
    };
    let defs = match backend.list_defs(&built_rev, &opt) {
        Ok(defs) => defs,
        Err(e) => {
            debug!("unable to list defs for {} (completion warm-up): {}", uri, e);
            return;
        }
    };
    debug!("got {} completions for {}", defs.len(), uri);

    for def in defs {
        set.add(def.name.clone());
        if let Some(fmt) = &def.fmt {
            let qname = &fmt.name.dep_qualified;
            // Only complete on simple selectors.
            if qname.matches('.').count() < 2 && !qname.contains('(') {
                set.add(qname.clone());
            }
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

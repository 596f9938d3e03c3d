use crate::buildstore;
use crate::completion::{self, CompletionSet};
use crate::output;
use crate::repo::LocalRepo;
use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use xref_core::backend::{
    BuildSource, DefSource, DependencySource, ListOptions, SearchOptions, SnippetSource,
};
use xref_core::{
    repo_uri_from_clone_url, DepResolver, RepoRevSpec, ResolvedTarget, Session,
};

const SEARCH_PER_PAGE: usize = 12;
const HISTORY_FILE: &str = ".xref_history";

pub struct QueryOpts {
    pub commit: Option<String>,
    pub show_def: bool,
    pub refs: usize,
    pub context_lines: u32,
}

pub fn handle_query<B>(
    session: &Session,
    backend: Arc<B>,
    local: &LocalRepo,
    terms: Vec<String>,
    opts: &QueryOpts,
) -> Result<()>
where
    B: DefSource + BuildSource + DependencySource + SnippetSource + Send + Sync + 'static,
{
    let uri = session
        .repo
        .as_ref()
        .map(|r| r.uri.clone())
        .unwrap_or_else(|| local.uri.clone());

    // Dependency scope: this repo plus everything it resolves to.
    let mut rev = RepoRevSpec::new(&uri, &local.commit_id);
    rev.commit_id = local.commit_id.clone();
    let resolver = DepResolver::new(session, backend.as_ref(), backend.as_ref());
    let local_dir = buildstore::local_data_dir(&local.root, &local.commit_id);
    let targets = resolver.resolve(&rev, local_dir.as_deref())?;

    let mut scope_uris = vec![uri.clone()];
    for target in &targets {
        let dep_uri = repo_uri_from_clone_url(&target.to_repo_clone_url);
        if !scope_uris.contains(&dep_uri) {
            scope_uris.push(dep_uri);
        }
    }

    let requested = opts.commit.clone().unwrap_or_else(|| local.commit_id.clone());
    let commit = determine_commit(backend.as_ref(), &uri, &requested)?;
    let constraints = build_constraints(&scope_uris, &uri, &commit);

    if !terms.is_empty() {
        return run_query(session, backend.as_ref(), &uri, &constraints, &terms.join(" "), opts);
    }
    interactive(session, backend, &uri, &constraints, &scope_uris, targets, opts)
}

/// Pick the commit the server will search: the requested one when it has
/// an exact successful build, otherwise the newest built ancestor.
fn determine_commit<B: BuildSource>(backend: &B, uri: &str, requested: &str) -> Result<String> {
    let build = backend.get_build(&RepoRevSpec::new(uri, requested), false)?;
    let exact_ok = build
        .exact
        .as_ref()
        .map_or(false, |b| b.success && b.commit_id == requested);
    if exact_ok {
        return Ok(requested.to_string());
    }
    match &build.last_successful {
        Some(last) => {
            tracing::info!(
                "searching commit {} ({} commits behind) because {} is not built",
                last.commit_id,
                build.commits_behind.unwrap_or(0),
                requested
            );
            Ok(last.commit_id.clone())
        }
        None => {
            warn!("no search index for {}: it has no successful builds", uri);
            Ok(requested.to_string())
        }
    }
}

/// `repo:` constraints; only the current repo is pinned to a commit.
fn build_constraints(scope_uris: &[String], own_uri: &str, commit: &str) -> String {
    let mut constraints = String::new();
    for uri in scope_uris {
        constraints.push_str("repo:");
        constraints.push_str(uri);
        if uri == own_uri && !commit.is_empty() {
            constraints.push('@');
            constraints.push_str(commit);
        }
        constraints.push(' ');
    }
    constraints
}

fn run_query<B>(
    session: &Session,
    backend: &B,
    own_uri: &str,
    constraints: &str,
    terms: &str,
    opts: &QueryOpts,
) -> Result<()>
where
    B: DefSource + SnippetSource,
{
    let query = format!("{}{}", constraints, terms);
    if session.verbose {
        debug!("query: {:?}", query);
    }

    let defs = backend.search(
        &query,
        &SearchOptions {
            defs: true,
            list: ListOptions {
                per_page: SEARCH_PER_PAGE,
                page: 1,
            },
        },
    )?;

    // The service can return one def per indexed commit; show each once.
    let mut seen = HashSet::new();
    for def in defs {
        let dedup_key = (
            def.key.repo.clone(),
            def.key.unit_type.clone(),
            def.key.unit.clone(),
            def.key.path.clone(),
        );
        if !seen.insert(dedup_key) {
            continue;
        }

        let from_dep = def.key.repo != own_uri;
        println!("{}", output::fmt_def_name(&def, from_dep));
        let doc = output::strip_html(&def.doc);
        let doc = doc.trim();
        if !doc.is_empty() {
            println!("{}", doc);
        }
        println!("{}", format!("@ {} : {}", def.key.repo, def.file).dimmed());

        if opts.show_def {
            match backend.fetch(
                &def.key.repo,
                &def.key.commit_id,
                &def.file,
                def.def_start,
                def.def_end,
                0,
            ) {
                Ok(snippet) => {
                    println!("{}", output::indent(&output::highlight(&snippet, &def.name), "  "));
                    println!();
                }
                Err(e) => warn!(
                    "error fetching def {} in {}; skipping: {}",
                    def.key.path, def.key.repo, e
                ),
            }
        }

        if opts.refs > 0 {
            let refs = match backend.list_refs(
                &def.key,
                &ListOptions {
                    per_page: opts.refs,
                    page: 1,
                },
            ) {
                Ok(refs) => refs,
                Err(e) => {
                    warn!(
                        "error listing refs for {} in {}; skipping: {}",
                        def.key.path, def.key.repo, e
                    );
                    continue;
                }
            };
            println!();
            for r in refs {
                println!("{}", format!("\tref @ {} : {}", r.repo, r.file).dimmed());
                match backend.fetch(&r.repo, &r.commit_id, &r.file, r.start, r.end, opts.context_lines)
                {
                    Ok(snippet) => {
                        println!("{}", output::indent(&output::highlight(&snippet, &def.name), "\t"));
                        println!();
                    }
                    Err(e) => {
                        warn!(
                            "error fetching reference in {} at {}; skipping: {}",
                            r.repo, r.file, e
                        );
                    }
                }
            }
        }
        println!();
    }
    Ok(())
}

/// Interactive loop: completion candidates warm up in the background while
/// lines are read; SIGINT aborts the read cleanly. Workers still in flight
/// at exit finish on their own and their output is discarded.
fn interactive<B>(
    session: &Session,
    backend: Arc<B>,
    own_uri: &str,
    constraints: &str,
    scope_uris: &[String],
    targets: Vec<ResolvedTarget>,
    opts: &QueryOpts,
) -> Result<()>
where
    B: DefSource + BuildSource + DependencySource + SnippetSource + Send + Sync + 'static,
{
    let completions = CompletionSet::new();
    for uri in scope_uris {
        if let Some(base) = uri.rsplit('/').next() {
            completions.add(base.to_string());
        }
    }
    let _workers = completion::warm_up(&completions, targets, Arc::clone(&backend));

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))?;
    }

    let (tx, rx) = mpsc::channel::<io::Result<String>>();
    thread::spawn(move || {
        let stdin = io::stdin();
        loop {
            let mut line = String::new();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });

    println!("search {} and its dependencies; end a prefix with '?' to list known symbols", own_uri);
    let history = history_path();
    loop {
        print!("{} ", "✱".cyan());
        io::stdout().flush()?;

        let line = loop {
            if interrupted.load(Ordering::SeqCst) {
                println!();
                return Ok(());
            }
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(line)) => break line,
                Ok(Err(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    // EOF
                    println!();
                    return Ok(());
                }
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(prefix) = line.strip_suffix('?') {
            for candidate in completions.matching(prefix.trim()) {
                println!("  {}", candidate);
            }
            continue;
        }
        if let Some(path) = &history {
            if let Err(e) = append_history(path, line) {
                debug!("unable to save query history: {}", e);
            }
        }
        run_query(session, backend.as_ref(), own_uri, constraints, line, opts)?;
    }
}

fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE))
}

fn append_history(path: &PathBuf, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

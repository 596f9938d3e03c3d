//! Shared fixtures: a corpus builder for index tests and an in-memory
//! backend implementing every collaborator trait. Used by this crate's
//! tests and by downstream crates.

use crate::backend::{
    BlameSource, Build, BuildInfo, BuildSource, DefListOptions, DefSource, DependencySource,
    ListOptions, Person, SearchOptions, SnippetSource,
};
use crate::byterange::{ByteOffsets, ByteRange, FileByteRanges};
use crate::context::RepoRevSpec;
use crate::depresolve::ResolvedDep;
use crate::error::{Error, Result};
use crate::graph::{Def, DefKey, Ref};
use std::collections::HashMap;

/// A minimal exported def in a unit of `repo`.
pub fn def_in_unit(repo: &str, commit: &str, unit: &str, path: &str, file: &str) -> Def {
    Def {
        key: DefKey {
            repo: repo.to_string(),
            commit_id: commit.to_string(),
            unit_type: "RustCrate".to_string(),
            unit: unit.to_string(),
            path: path.to_string(),
        },
        name: path.to_string(),
        kind: "fn".to_string(),
        file: file.to_string(),
        def_start: 0,
        def_end: 10,
        exported: true,
        doc: String::new(),
        fmt: None,
    }
}

/// Everything an index build needs, assembled fluently.
pub struct Corpus {
    pub defs: Vec<Def>,
    pub refs: Vec<Ref>,
    pub ranges: FileByteRanges,
    pub offsets: ByteOffsets,
}

pub struct CorpusBuilder {
    repo: String,
    commit: String,
    defs: Vec<Def>,
    refs: Vec<Ref>,
}

impl CorpusBuilder {
    pub fn new(repo: &str, commit: &str) -> Self {
        Self {
            repo: repo.to_string(),
            commit: commit.to_string(),
            defs: Vec::new(),
            refs: Vec::new(),
        }
    }

    pub fn def(mut self, unit: &str, path: &str, file: &str, start: u32, end: u32) -> Self {
        let mut def = def_in_unit(&self.repo, &self.commit, unit, path, file);
        def.def_start = start;
        def.def_end = end;
        self.defs.push(def);
        self
    }

    /// A ref originating from the target def's own unit.
    pub fn reference(self, def_unit: &str, def_path: &str, file: &str, start: u32, end: u32) -> Self {
        let unit = def_unit.to_string();
        self.reference_from_unit(&unit, def_unit, def_path, file, start, end)
    }

    pub fn reference_from_unit(
        mut self,
        from_unit: &str,
        def_unit: &str,
        def_path: &str,
        file: &str,
        start: u32,
        end: u32,
    ) -> Self {
        self.refs.push(Ref {
            def_repo: self.repo.clone(),
            def_unit_type: "RustCrate".to_string(),
            def_unit: def_unit.to_string(),
            def_path: def_path.to_string(),
            repo: self.repo.clone(),
            commit_id: self.commit.clone(),
            unit_type: "RustCrate".to_string(),
            unit: from_unit.to_string(),
            file: file.to_string(),
            start,
            end,
            def: false,
        });
        self
    }

    pub fn build(self) -> Corpus {
        let mut ranges = FileByteRanges::new();
        for def in &self.defs {
            ranges.insert(
                &def.file,
                ByteRange {
                    start: def.def_start,
                    end: def.def_end,
                },
            );
        }
        for r in &self.refs {
            ranges.insert(
                &r.file,
                ByteRange {
                    start: r.start,
                    end: r.end,
                },
            );
        }
        Corpus {
            defs: self.defs,
            refs: self.refs,
            ranges,
            offsets: ByteOffsets::new(),
        }
    }
}

/// In-memory implementation of all collaborator traits.
#[derive(Default)]
pub struct MemBackend {
    defs_by_commit: HashMap<String, Vec<Def>>,
    refs_by_target: HashMap<(String, String, String, String), Vec<Ref>>,
    builds: HashMap<(String, String), BuildInfo>,
    remote_deps: HashMap<String, Vec<ResolvedDep>>,
    authors_by_path: HashMap<String, Vec<Person>>,
    range_authors_by_repo: HashMap<String, Person>,
    snippets: HashMap<(String, String), String>,
    next_build_id: u64,
}

impl MemBackend {
    /// Register a successful exact build for `(uri, rev)`; the rev doubles
    /// as the commit id. Returns the commit.
    pub fn add_successful_build(&mut self, uri: &str, rev: &str) -> String {
        self.next_build_id += 1;
        let id = self.next_build_id;
        let build = Build {
            id,
            commit_id: rev.to_string(),
            success: true,
            ended_at: None,
        };
        self.builds.insert(
            (uri.to_string(), rev.to_string()),
            BuildInfo {
                exact: Some(build),
                last_successful: None,
                commits_behind: None,
            },
        );
        rev.to_string()
    }

    /// Register an answer where only an ancestor commit is built.
    pub fn add_ancestor_build(&mut self, uri: &str, rev: &str, ancestor: &str, behind: u32) {
        self.next_build_id += 1;
        let id = self.next_build_id;
        self.builds.insert(
            (uri.to_string(), rev.to_string()),
            BuildInfo {
                exact: None,
                last_successful: Some(Build {
                    id,
                    commit_id: ancestor.to_string(),
                    success: true,
                    ended_at: None,
                }),
                commits_behind: Some(behind),
            },
        );
    }

    pub fn add_defs(&mut self, commit: &str, defs: Vec<Def>) {
        self.defs_by_commit
            .entry(commit.to_string())
            .or_default()
            .extend(defs);
    }

    pub fn add_ref_to(&mut self, key: &DefKey, from_repo: &str, file: &str, start: u32, end: u32) {
        let target = (
            key.repo.clone(),
            key.unit_type.clone(),
            key.unit.clone(),
            key.path.clone(),
        );
        self.refs_by_target.entry(target).or_default().push(Ref {
            def_repo: key.repo.clone(),
            def_unit_type: key.unit_type.clone(),
            def_unit: key.unit.clone(),
            def_path: key.path.clone(),
            repo: from_repo.to_string(),
            commit_id: format!("{}-head", from_repo),
            unit_type: "RustCrate".to_string(),
            unit: "consumer".to_string(),
            file: file.to_string(),
            start,
            end,
            def: false,
        });
    }

    pub fn add_remote_dep(&mut self, uri: &str, clone_url: &str) {
        self.remote_deps
            .entry(uri.to_string())
            .or_default()
            .push(ResolvedDep {
                from_repo: uri.to_string(),
                from_commit_id: String::new(),
                to_repo_clone_url: clone_url.to_string(),
            });
    }

    pub fn add_author(&mut self, def_path: &str, person: Person) {
        self.authors_by_path
            .entry(def_path.to_string())
            .or_default()
            .push(person);
    }

    pub fn set_range_author(&mut self, repo: &str, person: Person) {
        self.range_authors_by_repo.insert(repo.to_string(), person);
    }

    pub fn add_snippet(&mut self, repo: &str, file: &str, content: &str) {
        self.snippets
            .insert((repo.to_string(), file.to_string()), content.to_string());
    }
}

impl DefSource for MemBackend {
    fn get_def(&self, key: &DefKey) -> Result<Def> {
        self.defs_by_commit
            .values()
            .flatten()
            .find(|d| d.key == *key)
            .cloned()
            .ok_or_else(|| Error::Remote(format!("def not found: {}", key)))
    }

    fn search(&self, query: &str, opt: &SearchOptions) -> Result<Vec<Def>> {
        // Constraint prefixes (repo:...) are ignored by the fixture.
        let needle = query
            .split_whitespace()
            .filter(|t| !t.contains(':'))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let mut hits: Vec<Def> = self
            .defs_by_commit
            .values()
            .flatten()
            .filter(|d| d.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.truncate(opt.list.per_page);
        Ok(hits)
    }

    fn list_defs(&self, rev: &RepoRevSpec, opt: &DefListOptions) -> Result<Vec<Def>> {
        let defs = self
            .defs_by_commit
            .get(rev.effective_commit())
            .cloned()
            .unwrap_or_default();
        Ok(defs
            .into_iter()
            .filter(|d| !opt.exported_only || d.exported)
            .filter(|d| {
                opt.unit_type
                    .as_ref()
                    .map_or(true, |t| d.key.unit_type == *t)
            })
            .filter(|d| opt.unit.as_ref().map_or(true, |u| d.key.unit == *u))
            .collect())
    }

    fn list_refs(&self, key: &DefKey, opt: &ListOptions) -> Result<Vec<Ref>> {
        let target = (
            key.repo.clone(),
            key.unit_type.clone(),
            key.unit.clone(),
            key.path.clone(),
        );
        let mut refs = self
            .refs_by_target
            .get(&target)
            .cloned()
            .unwrap_or_default();
        refs.truncate(opt.per_page);
        Ok(refs)
    }
}

impl BuildSource for MemBackend {
    fn get_build(&self, rev: &RepoRevSpec, exact: bool) -> Result<BuildInfo> {
        let info = self
            .builds
            .get(&(rev.uri.clone(), rev.effective_commit().to_string()))
            .cloned()
            .unwrap_or_default();
        if exact {
            Ok(BuildInfo {
                exact: info.exact,
                last_successful: None,
                commits_behind: None,
            })
        } else {
            Ok(info)
        }
    }
}

impl DependencySource for MemBackend {
    fn list_dependencies(&self, rev: &RepoRevSpec) -> Result<Vec<ResolvedDep>> {
        Ok(self.remote_deps.get(&rev.uri).cloned().unwrap_or_default())
    }
}

impl BlameSource for MemBackend {
    fn authors_of(&self, def: &Def) -> Result<Vec<Person>> {
        self.authors_by_path
            .get(&def.key.path)
            .cloned()
            .ok_or_else(|| Error::Remote(format!("no blame data for {}", def.key.path)))
    }

    fn author_of_range(
        &self,
        repo: &str,
        _commit_id: &str,
        _file: &str,
        _start: u32,
        _end: u32,
    ) -> Result<Person> {
        self.range_authors_by_repo
            .get(repo)
            .cloned()
            .ok_or_else(|| Error::Remote(format!("no blame data for {}", repo)))
    }
}

impl SnippetSource for MemBackend {
    fn fetch(
        &self,
        repo: &str,
        _commit_id: &str,
        file: &str,
        start: u32,
        end: u32,
        _context_lines: u32,
    ) -> Result<String> {
        let content = self
            .snippets
            .get(&(repo.to_string(), file.to_string()))
            .ok_or_else(|| Error::Remote(format!("no content for {}:{}", repo, file)))?;
        let start = start as usize;
        let end = (end as usize).min(content.len());
        if start > end {
            return Err(Error::Remote(format!("bad range for {}:{}", repo, file)));
        }
        Ok(content[start..end].to_string())
    }
}

//! Delta engine: classify every def across two commits of a repository
//! into Added / Changed / Deleted and propagate the impact to authors,
//! cross-repository consumers, and dependent repositories.

use crate::backend::{
    BlameSource, Build, BuildSource, DefListOptions, DefSource, ListOptions, Person,
};
use crate::context::{RepoRevSpec, Session};
use crate::error::{Error, Result};
use crate::graph::Def;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// The two sides of a delta as requested by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaSpec {
    pub base: RepoRevSpec,
    pub head: RepoRevSpec,
}

/// A resolved delta: both sides with commits pinned and their build
/// records attached. Transient; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub base: RepoRevSpec,
    pub head: RepoRevSpec,
    pub base_build: Build,
    pub head_build: Build,
}

/// One def's fate across the delta. Exactly one of added/changed/deleted
/// holds; construction with both sides absent is impossible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaDef {
    pub base: Option<Def>,
    pub head: Option<Def>,
}

impl DeltaDef {
    pub fn added(head: Def) -> Self {
        Self {
            base: None,
            head: Some(head),
        }
    }

    pub fn deleted(base: Def) -> Self {
        Self {
            base: Some(base),
            head: None,
        }
    }

    pub fn changed(base: Def, head: Def) -> Self {
        Self {
            base: Some(base),
            head: Some(head),
        }
    }

    pub fn is_added(&self) -> bool {
        self.base.is_none() && self.head.is_some()
    }

    pub fn is_changed(&self) -> bool {
        self.base.is_some() && self.head.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.base.is_some() && self.head.is_none()
    }
}

/// Counts of added/changed/deleted defs, independent of display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStat {
    pub added: usize,
    pub changed: usize,
    pub deleted: usize,
}

/// The classified defs of a delta, emitted Added, then Changed, then
/// Deleted, each group sorted by def key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaDefs {
    pub defs: Vec<DeltaDef>,
    pub diff_stat: DiffStat,
}

/// Defs attributed to one person by blame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaAuthor {
    pub person: Person,
    pub defs: Vec<Def>,
}

/// Affected defs consumed from other repositories, grouped by the person
/// who wrote the referencing code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaClient {
    pub person: Person,
    pub defs: Vec<Def>,
    pub ref_count: usize,
}

/// Affected defs grouped by the referencing repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaDependent {
    pub repo: String,
    pub defs: Vec<Def>,
    pub ref_count: usize,
}

/// Computes deltas over the collaborator interfaces.
pub struct DeltaEngine<'a> {
    session: &'a Session,
    defs: &'a dyn DefSource,
    builds: &'a dyn BuildSource,
    blame: &'a dyn BlameSource,
}

impl<'a> DeltaEngine<'a> {
    pub fn new(
        session: &'a Session,
        defs: &'a dyn DefSource,
        builds: &'a dyn BuildSource,
        blame: &'a dyn BlameSource,
    ) -> Self {
        Self {
            session,
            defs,
            builds,
            blame,
        }
    }

    /// Resolve both sides to built commits. A side without any successful
    /// build is fatal.
    pub fn get(&self, spec: &DeltaSpec) -> Result<Delta> {
        let (base, base_build) = self.resolve_side(&spec.base)?;
        let (head, head_build) = self.resolve_side(&spec.head)?;
        if self.session.verbose {
            debug!(
                "resolved delta: base {}@{} (build {}), head {}@{} (build {})",
                base.uri, base.commit_id, base_build.id, head.uri, head.commit_id, head_build.id
            );
        }
        Ok(Delta {
            base,
            head,
            base_build,
            head_build,
        })
    }

    fn resolve_side(&self, rev: &RepoRevSpec) -> Result<(RepoRevSpec, Build)> {
        let info = self.builds.get_build(rev, false)?;
        let build = info
            .exact
            .clone()
            .filter(|b| b.success)
            .or(info.last_successful)
            .ok_or_else(|| Error::NotBuilt {
                repo: rev.uri.clone(),
                commit: rev.effective_commit().to_string(),
            })?;
        let resolved = RepoRevSpec {
            uri: rev.uri.clone(),
            rev: rev.rev.clone(),
            commit_id: build.commit_id.clone(),
        };
        Ok((resolved, build))
    }

    /// Classify every def across the delta. Defs present on both sides
    /// and equal under [`defs_equal`] are omitted.
    pub fn list_defs(&self, delta: &Delta) -> Result<DeltaDefs> {
        let opt = DefListOptions::default();
        let base_defs = self.defs.list_defs(&delta.base, &opt)?;
        let head_defs = self.defs.list_defs(&delta.head, &opt)?;
        Ok(classify(base_defs, head_defs))
    }

    /// Attribute every changed/deleted def to the people who last
    /// modified it. Per-def blame failures are logged and skipped.
    pub fn list_affected_authors(&self, delta: &Delta) -> Result<Vec<DeltaAuthor>> {
        let delta_defs = self.list_defs(delta)?;
        let mut authors: Vec<DeltaAuthor> = Vec::new();

        for def in impacted_base_defs(&delta_defs) {
            let people = match self.blame.authors_of(def) {
                Ok(people) => people,
                Err(e) => {
                    warn!("skipping blame for {}: {}", def.key.path, e);
                    continue;
                }
            };
            for person in people {
                match authors
                    .iter_mut()
                    .find(|a| a.person.identity() == person.identity())
                {
                    Some(author) => author.defs.push(def.clone()),
                    None => authors.push(DeltaAuthor {
                        person,
                        defs: vec![def.clone()],
                    }),
                }
            }
        }
        Ok(authors)
    }

    /// People in other repositories whose code references the
    /// changed/deleted defs, as of the base commit. Multiple reference
    /// sites in one file count once per def.
    pub fn list_affected_clients(&self, delta: &Delta) -> Result<Vec<DeltaClient>> {
        let delta_defs = self.list_defs(delta)?;
        let mut clients: Vec<DeltaClient> = Vec::new();
        let mut seen: HashSet<(String, String, String)> = HashSet::new();

        for def in impacted_base_defs(&delta_defs) {
            for r in self.cross_repo_refs(def, &delta.base.uri)? {
                if !seen.insert((def.key.path.clone(), r.repo.clone(), r.file.clone())) {
                    continue;
                }
                let person = match self.blame.author_of_range(
                    &r.repo, &r.commit_id, &r.file, r.start, r.end,
                ) {
                    Ok(person) => person,
                    Err(e) => {
                        warn!("skipping ref attribution in {}:{}: {}", r.repo, r.file, e);
                        continue;
                    }
                };
                match clients
                    .iter_mut()
                    .find(|c| c.person.identity() == person.identity())
                {
                    Some(client) => {
                        client.ref_count += 1;
                        if !client.defs.iter().any(|d| d.key == def.key) {
                            client.defs.push(def.clone());
                        }
                    }
                    None => clients.push(DeltaClient {
                        person,
                        defs: vec![def.clone()],
                        ref_count: 1,
                    }),
                }
            }
        }
        Ok(clients)
    }

    /// Repositories whose code references the changed/deleted defs, as of
    /// the base commit.
    pub fn list_affected_dependents(&self, delta: &Delta) -> Result<Vec<DeltaDependent>> {
        let delta_defs = self.list_defs(delta)?;
        let mut dependents: Vec<DeltaDependent> = Vec::new();
        let mut seen: HashSet<(String, String, String)> = HashSet::new();

        for def in impacted_base_defs(&delta_defs) {
            for r in self.cross_repo_refs(def, &delta.base.uri)? {
                if !seen.insert((r.repo.clone(), def.key.path.clone(), r.file.clone())) {
                    continue;
                }
                match dependents.iter_mut().find(|d| d.repo == r.repo) {
                    Some(dependent) => {
                        dependent.ref_count += 1;
                        if !dependent.defs.iter().any(|d| d.key == def.key) {
                            dependent.defs.push(def.clone());
                        }
                    }
                    None => dependents.push(DeltaDependent {
                        repo: r.repo.clone(),
                        defs: vec![def.clone()],
                        ref_count: 1,
                    }),
                }
            }
        }
        Ok(dependents)
    }

    fn cross_repo_refs(&self, def: &Def, base_repo: &str) -> Result<Vec<crate::graph::Ref>> {
        let refs = self.defs.list_refs(&def.key, &ListOptions::default())?;
        Ok(refs.into_iter().filter(|r| r.repo != base_repo).collect())
    }
}

/// Whether two defs with the same identity count as unchanged. File path,
/// documentation, and formatted signature participate; byte offsets do
/// not, so a def that only moved is not reported.
pub fn defs_equal(base: &Def, head: &Def) -> bool {
    base.file == head.file && base.doc == head.doc && base.signature() == head.signature()
}

/// Positional/content classification keyed by `(unit_type, unit, path)`.
/// Renames and moves across units appear as delete+add.
pub fn classify(base: Vec<Def>, head: Vec<Def>) -> DeltaDefs {
    let index = |defs: Vec<Def>| -> BTreeMap<(String, String, String), Def> {
        defs.into_iter()
            .map(|d| {
                (
                    (
                        d.key.unit_type.clone(),
                        d.key.unit.clone(),
                        d.key.path.clone(),
                    ),
                    d,
                )
            })
            .collect()
    };
    let mut base_by_key = index(base);
    let head_by_key = index(head);

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for (key, head_def) in head_by_key {
        match base_by_key.remove(&key) {
            None => added.push(DeltaDef::added(head_def)),
            Some(base_def) => {
                if !defs_equal(&base_def, &head_def) {
                    changed.push(DeltaDef::changed(base_def, head_def));
                }
            }
        }
    }
    let deleted: Vec<DeltaDef> = base_by_key
        .into_values()
        .map(DeltaDef::deleted)
        .collect();

    let diff_stat = DiffStat {
        added: added.len(),
        changed: changed.len(),
        deleted: deleted.len(),
    };
    let mut defs = added;
    defs.extend(changed);
    defs.extend(deleted);
    DeltaDefs { defs, diff_stat }
}

/// The base-side defs the impact propagation works from: everything
/// changed or deleted. Added defs have no prior consumers or authors.
fn impacted_base_defs(delta_defs: &DeltaDefs) -> impl Iterator<Item = &Def> {
    delta_defs
        .defs
        .iter()
        .filter(|d| d.is_changed() || d.is_deleted())
        .filter_map(|d| d.base.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{def_in_unit, MemBackend};

    fn spec() -> DeltaSpec {
        DeltaSpec {
            base: RepoRevSpec::new("github.com/a/app", "v1"),
            head: RepoRevSpec::new("github.com/a/app", "master"),
        }
    }

    fn engine_fixture<'a>(backend: &'a MemBackend, session: &'a Session) -> DeltaEngine<'a> {
        DeltaEngine::new(session, backend, backend, backend)
    }

    #[test]
    fn test_classification_table() {
        let unchanged_base = def_in_unit("github.com/a/app", "c1", "app", "Same", "src/s.rs");
        let unchanged_head = def_in_unit("github.com/a/app", "c2", "app", "Same", "src/s.rs");

        let mut changed_base = def_in_unit("github.com/a/app", "c1", "app", "B", "src/b.rs");
        changed_base.kind = "fn".into();
        let mut changed_head = def_in_unit("github.com/a/app", "c2", "app", "B", "src/b.rs");
        changed_head.kind = "struct".into(); // signature differs

        let deleted = def_in_unit("github.com/a/app", "c1", "app", "A", "src/a.rs");
        let added = def_in_unit("github.com/a/app", "c2", "app", "C", "src/c.rs");

        let result = classify(
            vec![deleted.clone(), changed_base, unchanged_base],
            vec![added.clone(), changed_head, unchanged_head],
        );

        assert_eq!(
            result.diff_stat,
            DiffStat {
                added: 1,
                changed: 1,
                deleted: 1
            }
        );
        assert_eq!(result.defs.len(), 3);
        assert!(result.defs[0].is_added());
        assert_eq!(result.defs[0].head.as_ref().unwrap().key.path, "C");
        assert!(result.defs[1].is_changed());
        assert_eq!(result.defs[1].base.as_ref().unwrap().key.path, "B");
        assert!(result.defs[2].is_deleted());
        assert_eq!(result.defs[2].base.as_ref().unwrap().key.path, "A");
    }

    #[test]
    fn test_moved_only_def_is_omitted() {
        let base = def_in_unit("github.com/a/app", "c1", "app", "Same", "src/s.rs");
        let mut head = def_in_unit("github.com/a/app", "c2", "app", "Same", "src/s.rs");
        head.def_start += 120;
        head.def_end += 120;

        let result = classify(vec![base], vec![head]);
        assert!(result.defs.is_empty());
        assert_eq!(result.diff_stat, DiffStat::default());
    }

    #[test]
    fn test_get_requires_builds_on_both_sides() {
        let mut backend = MemBackend::default();
        backend.add_successful_build("github.com/a/app", "c1");
        // head side has no build

        let session = Session::default();
        let engine = engine_fixture(&backend, &session);
        let err = engine.get(&spec()).unwrap_err();
        assert!(matches!(err, Error::NotBuilt { .. }));
    }

    #[test]
    fn test_list_defs_scenario() {
        // Base {A, B}, head {B', C}.
        let mut backend = MemBackend::default();
        let base_rev = backend.add_successful_build("github.com/a/app", "v1");
        let head_rev = backend.add_successful_build("github.com/a/app", "master");

        let a = def_in_unit("github.com/a/app", &base_rev, "app", "A", "src/a.rs");
        let mut b = def_in_unit("github.com/a/app", &base_rev, "app", "B", "src/b.rs");
        b.kind = "fn".into();
        backend.add_defs(&base_rev, vec![a, b]);

        let mut b2 = def_in_unit("github.com/a/app", &head_rev, "app", "B", "src/b.rs");
        b2.kind = "struct".into();
        let c = def_in_unit("github.com/a/app", &head_rev, "app", "C", "src/c.rs");
        backend.add_defs(&head_rev, vec![b2, c]);

        let session = Session::default();
        let engine = engine_fixture(&backend, &session);
        let delta = engine.get(&spec()).unwrap();
        let result = engine.list_defs(&delta).unwrap();

        assert_eq!(
            result.diff_stat,
            DiffStat {
                added: 1,
                changed: 1,
                deleted: 1
            }
        );
    }

    #[test]
    fn test_affected_authors_grouped_and_skipping() {
        let mut backend = MemBackend::default();
        let base_rev = backend.add_successful_build("github.com/a/app", "v1");
        let head_rev = backend.add_successful_build("github.com/a/app", "master");

        let gone_a = def_in_unit("github.com/a/app", &base_rev, "app", "A", "src/a.rs");
        let gone_b = def_in_unit("github.com/a/app", &base_rev, "app", "B", "src/b.rs");
        let unblamable = def_in_unit("github.com/a/app", &base_rev, "app", "X", "src/x.rs");
        backend.add_defs(
            &base_rev,
            vec![gone_a.clone(), gone_b.clone(), unblamable],
        );
        backend.add_defs(&head_rev, vec![]);

        let ada = Person {
            login: "ada".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
        };
        backend.add_author("A", ada.clone());
        backend.add_author("B", ada.clone());
        // No author recorded for "X": blame fails and the def is skipped.

        let session = Session::default();
        let engine = engine_fixture(&backend, &session);
        let delta = engine.get(&spec()).unwrap();
        let authors = engine.list_affected_authors(&delta).unwrap();

        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].person.email, "ada@example.com");
        assert_eq!(authors[0].defs.len(), 2);
    }

    #[test]
    fn test_affected_clients_dedup_by_file() {
        let mut backend = MemBackend::default();
        let base_rev = backend.add_successful_build("github.com/a/app", "v1");
        let head_rev = backend.add_successful_build("github.com/a/app", "master");

        let gone = def_in_unit("github.com/a/app", &base_rev, "app", "Gone", "src/g.rs");
        backend.add_defs(&base_rev, vec![gone.clone()]);
        backend.add_defs(&head_rev, vec![]);

        // Two reference sites in the same consumer file plus one internal.
        backend.add_ref_to(&gone.key, "github.com/x/consumer", "src/use.rs", 5, 9);
        backend.add_ref_to(&gone.key, "github.com/x/consumer", "src/use.rs", 50, 54);
        backend.add_ref_to(&gone.key, "github.com/a/app", "src/internal.rs", 5, 9);

        let grace = Person {
            login: "grace".into(),
            name: "Grace".into(),
            email: "grace@example.com".into(),
        };
        backend.set_range_author("github.com/x/consumer", grace.clone());

        let session = Session::default();
        let engine = engine_fixture(&backend, &session);
        let delta = engine.get(&spec()).unwrap();
        let clients = engine.list_affected_clients(&delta).unwrap();

        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].person.email, "grace@example.com");
        // Same file counts once per def.
        assert_eq!(clients[0].ref_count, 1);
        assert_eq!(clients[0].defs.len(), 1);

        let dependents = engine.list_affected_dependents(&delta).unwrap();
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].repo, "github.com/x/consumer");
        assert_eq!(dependents[0].ref_count, 1);
    }

    #[test]
    fn test_delta_def_invariant() {
        let def = def_in_unit("github.com/a/app", "c1", "app", "A", "src/a.rs");
        assert!(DeltaDef::added(def.clone()).is_added());
        assert!(DeltaDef::deleted(def.clone()).is_deleted());
        let dd = DeltaDef::changed(def.clone(), def);
        assert!(dd.is_changed() && !dd.is_added() && !dd.is_deleted());
    }

    #[test]
    fn test_zero_refs_def_yields_no_clients() {
        let mut backend = MemBackend::default();
        let base_rev = backend.add_successful_build("github.com/a/app", "v1");
        let head_rev = backend.add_successful_build("github.com/a/app", "master");
        let gone = def_in_unit("github.com/a/app", &base_rev, "app", "Gone", "src/g.rs");
        backend.add_defs(&base_rev, vec![gone]);
        backend.add_defs(&head_rev, vec![]);

        let session = Session::default();
        let engine = engine_fixture(&backend, &session);
        let delta = engine.get(&spec()).unwrap();
        assert!(engine.list_affected_clients(&delta).unwrap().is_empty());
        assert!(engine.list_affected_dependents(&delta).unwrap().is_empty());
    }

    #[test]
    fn test_defs_equal_uses_doc_and_signature() {
        let base = def_in_unit("github.com/a/app", "c1", "app", "A", "src/a.rs");
        let mut head = def_in_unit("github.com/a/app", "c2", "app", "A", "src/a.rs");
        assert!(defs_equal(&base, &head));

        head.doc = "now documented".into();
        assert!(!defs_equal(&base, &head));
    }
}

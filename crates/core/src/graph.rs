use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite identity of a definition.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DefKey {
    pub repo: String,
    pub commit_id: String,
    pub unit_type: String,
    pub unit: String,
    pub path: String,
}

impl fmt::Display for DefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.repo, self.unit_type, self.unit, self.path
        )
    }
}

/// Qualified renditions of a name at increasingly wide scopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualFormats {
    pub unqualified: String,
    pub scope_qualified: String,
    pub dep_qualified: String,
    pub repository_wide_qualified: String,
    pub language_wide_qualified: String,
}

/// Display metadata attached to a def by the analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefFmtStrings {
    pub def_keyword: String,
    pub name: QualFormats,
    pub typ: QualFormats,
    pub name_and_type_separator: String,
    pub language: String,
}

/// A named code entity at a specific location in a specific commit.
///
/// Defs are immutable once produced by analysis of a commit; a later commit
/// supersedes a def with a new one under a different `commit_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Def {
    pub key: DefKey,
    pub name: String,
    pub kind: String,
    pub file: String,
    pub def_start: u32,
    pub def_end: u32,
    pub exported: bool,
    #[serde(default)]
    pub doc: String,
    #[serde(default)]
    pub fmt: Option<DefFmtStrings>,
}

impl Def {
    /// The formatted signature used for display and for change detection.
    /// Byte offsets never contribute to it.
    pub fn signature(&self) -> String {
        match &self.fmt {
            Some(f) => {
                let kw = if f.def_keyword.is_empty() {
                    String::new()
                } else {
                    format!("{} ", f.def_keyword)
                };
                format!(
                    "{}{}{}{}",
                    kw, f.name.dep_qualified, f.name_and_type_separator, f.typ.dep_qualified
                )
            }
            None => format!("{} {}", self.kind, self.name),
        }
    }
}

/// A byte-range occurrence `[start, end)` in `file` pointing at a def.
///
/// The target def is carried as its key fields minus the commit: refs keep
/// pointing at whatever the target repo's indexed commit provides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    pub def_repo: String,
    pub def_unit_type: String,
    pub def_unit: String,
    pub def_path: String,
    pub repo: String,
    pub commit_id: String,
    pub unit_type: String,
    pub unit: String,
    pub file: String,
    pub start: u32,
    pub end: u32,
    /// True when this ref is the definition site itself.
    #[serde(default)]
    pub def: bool,
}

impl Ref {
    /// Whether this ref targets the given def key (commit is not compared;
    /// an index corpus holds one commit per repo).
    pub fn points_to(&self, key: &DefKey) -> bool {
        self.def_repo == key.repo
            && self.def_unit_type == key.unit_type
            && self.def_unit == key.unit
            && self.def_path == key.path
    }

    /// A ref is external when it originates outside the target def's
    /// owning source unit or repository.
    pub fn is_external(&self) -> bool {
        self.def_repo != self.repo
            || self.def_unit_type != self.unit_type
            || self.def_unit != self.unit
    }

    /// The source unit this ref originates from.
    pub fn unit_key(&self) -> UnitKey {
        UnitKey {
            unit_type: self.unit_type.clone(),
            unit: self.unit.clone(),
        }
    }
}

/// Identity of a source unit within one repository commit.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UnitKey {
    pub unit_type: String,
    pub unit: String,
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.unit_type, self.unit)
    }
}

/// An analyzable compilation unit scoped to a repository commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub key: UnitKey,
    pub repo: String,
    pub commit_id: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// A source unit together with the raw JSON payload emitted by the
/// language-specific analysis tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSourceUnit {
    pub unit: SourceUnit,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ref(unit: &str, def_path: &str) -> Ref {
        Ref {
            def_repo: "github.com/a/lib".into(),
            def_unit_type: "RustCrate".into(),
            def_unit: "lib".into(),
            def_path: def_path.into(),
            repo: "github.com/a/app".into(),
            commit_id: "c1".into(),
            unit_type: "RustCrate".into(),
            unit: unit.into(),
            file: "src/main.rs".into(),
            start: 10,
            end: 14,
            def: false,
        }
    }

    #[test]
    fn test_points_to_ignores_commit() {
        let r = test_ref("app", "Widget");
        let key = DefKey {
            repo: "github.com/a/lib".into(),
            commit_id: "some-other-commit".into(),
            unit_type: "RustCrate".into(),
            unit: "lib".into(),
            path: "Widget".into(),
        };
        assert!(r.points_to(&key));

        let other = DefKey {
            path: "Gadget".into(),
            ..key
        };
        assert!(!r.points_to(&other));
    }

    #[test]
    fn test_external_ref() {
        let cross_repo = test_ref("app", "Widget");
        assert!(cross_repo.is_external());

        let mut internal = test_ref("lib", "Widget");
        internal.repo = "github.com/a/lib".into();
        assert!(!internal.is_external());
    }

    #[test]
    fn test_signature_prefers_fmt_strings() {
        let mut def = Def {
            name: "Widget".into(),
            kind: "struct".into(),
            ..Def::default()
        };
        assert_eq!(def.signature(), "struct Widget");

        def.fmt = Some(DefFmtStrings {
            def_keyword: "fn".into(),
            name: QualFormats {
                dep_qualified: "widget::new".into(),
                ..QualFormats::default()
            },
            typ: QualFormats {
                dep_qualified: "(usize) -> Widget".into(),
                ..QualFormats::default()
            },
            name_and_type_separator: " ".into(),
            language: "rust".into(),
        });
        assert_eq!(def.signature(), "fn widget::new (usize) -> Widget");
    }

    #[test]
    fn test_repo_source_unit_carries_raw_payload() {
        let unit = SourceUnit {
            key: UnitKey {
                unit_type: "RustCrate".into(),
                unit: "lib".into(),
            },
            repo: "github.com/a/lib".into(),
            commit_id: "c1".into(),
            files: vec!["src/lib.rs".into()],
        };
        let rsu = RepoSourceUnit {
            unit,
            data: serde_json::json!({"edition": "2021"}),
        };
        assert_eq!(rsu.data["edition"], "2021");
        assert_eq!(rsu.unit.key.to_string(), "RustCrate:lib");
    }

    #[test]
    fn test_def_key_display() {
        let key = DefKey {
            repo: "github.com/a/lib".into(),
            commit_id: "c1".into(),
            unit_type: "RustCrate".into(),
            unit: "lib".into(),
            path: "Widget/new".into(),
        };
        assert_eq!(key.to_string(), "github.com/a/lib/RustCrate/lib/Widget/new");
    }
}

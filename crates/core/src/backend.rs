//! Collaborator interfaces the core consumes: the def/ref store, build
//! status, dependency listing, blame attribution, and source snippets.
//! `xref-client` provides the HTTP implementations; tests use the
//! in-memory backend from `test_fixtures`.

use crate::context::RepoRevSpec;
use crate::depresolve::ResolvedDep;
use crate::error::Result;
use crate::graph::{Def, DefKey, Ref};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pagination for list calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOptions {
    pub per_page: usize,
    pub page: usize,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            per_page: 100,
            page: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub defs: bool,
    #[serde(flatten)]
    pub list: ListOptions,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            defs: true,
            list: ListOptions::default(),
        }
    }
}

/// Filters for listing the defs of a repository commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefListOptions {
    #[serde(default)]
    pub unit_type: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    pub exported_only: bool,
    #[serde(default)]
    pub list: ListOptions,
}

/// One recorded analysis build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: u64,
    pub commit_id: String,
    pub success: bool,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// Answer to a build lookup: the exact-commit build when one exists, and
/// otherwise the newest successfully built ancestor on the default branch
/// with the distance to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub exact: Option<Build>,
    #[serde(default)]
    pub last_successful: Option<Build>,
    #[serde(default)]
    pub commits_behind: Option<u32>,
}

impl BuildInfo {
    /// The commit whose analysis data should be used, if any build exists.
    pub fn usable_commit(&self) -> Option<&str> {
        self.exact
            .as_ref()
            .filter(|b| b.success)
            .or(self.last_successful.as_ref())
            .map(|b| b.commit_id.as_str())
    }
}

/// A person attributed by blame or account records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    pub login: String,
    pub name: String,
    pub email: String,
}

impl Person {
    /// Identity key used when grouping; email wins, login is the fallback
    /// for service accounts without one.
    pub fn identity(&self) -> &str {
        if self.email.is_empty() {
            &self.login
        } else {
            &self.email
        }
    }
}

/// Query interface of the def/ref store.
pub trait DefSource {
    fn get_def(&self, key: &DefKey) -> Result<Def>;
    fn search(&self, query: &str, opt: &SearchOptions) -> Result<Vec<Def>>;
    fn list_defs(&self, rev: &RepoRevSpec, opt: &DefListOptions) -> Result<Vec<Def>>;
    fn list_refs(&self, key: &DefKey, opt: &ListOptions) -> Result<Vec<Ref>>;
}

/// Build-status lookup. With `exact` set, only an exact-commit build
/// satisfies the query; otherwise the service may answer with the latest
/// successfully built ancestor.
pub trait BuildSource {
    fn get_build(&self, rev: &RepoRevSpec, exact: bool) -> Result<BuildInfo>;
}

/// Remote dependency listing for a built commit.
pub trait DependencySource {
    fn list_dependencies(&self, rev: &RepoRevSpec) -> Result<Vec<ResolvedDep>>;
}

/// Blame-equivalent attribution, external to this core.
pub trait BlameSource {
    /// People who last modified the def's byte range.
    fn authors_of(&self, def: &Def) -> Result<Vec<Person>>;
    /// Person who last modified a byte range of a file.
    fn author_of_range(
        &self,
        repo: &str,
        commit_id: &str,
        file: &str,
        start: u32,
        end: u32,
    ) -> Result<Person>;
}

/// Source-text fetches for display; failures here are per-item and
/// skippable.
pub trait SnippetSource {
    fn fetch(
        &self,
        repo: &str,
        commit_id: &str,
        file: &str,
        start: u32,
        end: u32,
        context_lines: u32,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_commit_prefers_exact() {
        let info = BuildInfo {
            exact: Some(Build {
                id: 7,
                commit_id: "head".into(),
                success: true,
                ended_at: None,
            }),
            last_successful: Some(Build {
                id: 3,
                commit_id: "older".into(),
                success: true,
                ended_at: None,
            }),
            commits_behind: Some(4),
        };
        assert_eq!(info.usable_commit(), Some("head"));
    }

    #[test]
    fn test_usable_commit_skips_failed_exact() {
        let info = BuildInfo {
            exact: Some(Build {
                id: 7,
                commit_id: "head".into(),
                success: false,
                ended_at: None,
            }),
            last_successful: Some(Build {
                id: 3,
                commit_id: "older".into(),
                success: true,
                ended_at: None,
            }),
            commits_behind: Some(4),
        };
        assert_eq!(info.usable_commit(), Some("older"));
        assert_eq!(BuildInfo::default().usable_commit(), None);
    }

    #[test]
    fn test_person_identity() {
        let with_email = Person {
            login: "ada".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
        };
        assert_eq!(with_email.identity(), "ada@example.com");

        let bot = Person {
            login: "ci-bot".into(),
            ..Person::default()
        };
        assert_eq!(bot.identity(), "ci-bot");
    }
}

use serde::{Deserialize, Serialize};

/// A repository known to the remote service, identified by URI
/// (e.g. `github.com/a/lib`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSpec {
    pub uri: String,
}

/// A repository at a revision. `rev` is what the caller asked for (branch,
/// tag, or commit); `commit_id` is filled in once resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoRevSpec {
    pub uri: String,
    pub rev: String,
    #[serde(default)]
    pub commit_id: String,
}

impl RepoRevSpec {
    pub fn new(uri: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            rev: rev.into(),
            commit_id: String::new(),
        }
    }

    /// The commit to use: the resolved commit when known, the raw rev
    /// otherwise.
    pub fn effective_commit(&self) -> &str {
        if self.commit_id.is_empty() {
            &self.rev
        } else {
            &self.commit_id
        }
    }
}

/// Explicit per-invocation context threaded through the resolver and the
/// delta engine in place of global state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Remote service endpoint, e.g. `https://xref.example.com`.
    pub endpoint: String,
    /// Optional bearer token forwarded to the remote service.
    pub auth_token: Option<String>,
    /// The repository this invocation operates on, when known.
    pub repo: Option<RepoSpec>,
    pub verbose: bool,
}

impl Session {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_repo(mut self, uri: impl Into<String>) -> Self {
        self.repo = Some(RepoSpec { uri: uri.into() });
        self
    }
}

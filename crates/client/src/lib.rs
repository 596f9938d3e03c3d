//! HTTP implementation of the core's collaborator interfaces.
//!
//! All calls are blocking and JSON-bodied. Service errors come back as
//! `{"message": "..."}` bodies and are surfaced as `Error::Remote`.

use serde::Deserialize;
use tracing::debug;
use xref_core::backend::{
    BlameSource, BuildInfo, BuildSource, DefListOptions, DefSource, DependencySource,
    ListOptions, Person, SearchOptions, SnippetSource,
};
use xref_core::depresolve::ResolvedDep;
use xref_core::{Def, DefKey, Error, Ref, RepoRevSpec, Result, Session};

/// Blocking JSON client for the xref service.
pub struct HttpBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct ServiceError {
    message: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    defs: Vec<Def>,
}

#[derive(Deserialize)]
struct TreeEntry {
    contents: String,
}

impl HttpBackend {
    pub fn new(session: &Session) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: session.endpoint.trim_end_matches('/').to_string(),
            auth_token: session.auth_token.clone(),
        }
    }

    fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.endpoint, path);
        debug!(%url, "GET");
        let mut req = self.client.get(&url).query(query);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .map_err(|e| Error::Remote(format!("{}: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ServiceError>()
                .map(|e| e.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(Error::Remote(format!("{}: {}", url, message)));
        }
        resp.json()
            .map_err(|e| Error::Remote(format!("{}: {}", url, e)))
    }
}

impl DefSource for HttpBackend {
    fn get_def(&self, key: &DefKey) -> Result<Def> {
        self.get(
            "/api/defs/get",
            &[
                ("repo", key.repo.as_str()),
                ("commit", key.commit_id.as_str()),
                ("unit_type", key.unit_type.as_str()),
                ("unit", key.unit.as_str()),
                ("path", key.path.as_str()),
            ],
        )
    }

    fn search(&self, query: &str, opt: &SearchOptions) -> Result<Vec<Def>> {
        let per_page = opt.list.per_page.to_string();
        let defs = if opt.defs { "true" } else { "false" };
        let resp: SearchResponse = self.get(
            "/api/search",
            &[("q", query), ("defs", defs), ("per_page", &per_page)],
        )?;
        Ok(resp.defs)
    }

    fn list_defs(&self, rev: &RepoRevSpec, opt: &DefListOptions) -> Result<Vec<Def>> {
        let per_page = opt.list.per_page.to_string();
        let exported = if opt.exported_only { "true" } else { "false" };
        let mut query: Vec<(&str, &str)> = vec![
            ("repo", rev.uri.as_str()),
            ("commit", rev.effective_commit()),
            ("exported", exported),
            ("per_page", &per_page),
        ];
        if let Some(unit_type) = &opt.unit_type {
            query.push(("unit_type", unit_type));
        }
        if let Some(unit) = &opt.unit {
            query.push(("unit", unit));
        }
        self.get("/api/defs", &query)
    }

    fn list_refs(&self, key: &DefKey, opt: &ListOptions) -> Result<Vec<Ref>> {
        let per_page = opt.per_page.to_string();
        let page = opt.page.to_string();
        self.get(
            "/api/refs",
            &[
                ("def_repo", key.repo.as_str()),
                ("def_unit_type", key.unit_type.as_str()),
                ("def_unit", key.unit.as_str()),
                ("def_path", key.path.as_str()),
                ("per_page", &per_page),
                ("page", &page),
            ],
        )
    }
}

impl BuildSource for HttpBackend {
    fn get_build(&self, rev: &RepoRevSpec, exact: bool) -> Result<BuildInfo> {
        let exact = if exact { "true" } else { "false" };
        self.get(
            "/api/builds",
            &[
                ("repo", rev.uri.as_str()),
                ("rev", rev.effective_commit()),
                ("exact", exact),
            ],
        )
    }
}

impl DependencySource for HttpBackend {
    fn list_dependencies(&self, rev: &RepoRevSpec) -> Result<Vec<ResolvedDep>> {
        self.get(
            "/api/deps",
            &[("repo", rev.uri.as_str()), ("commit", rev.effective_commit())],
        )
    }
}

impl BlameSource for HttpBackend {
    fn authors_of(&self, def: &Def) -> Result<Vec<Person>> {
        self.get(
            "/api/blame/def",
            &[
                ("repo", def.key.repo.as_str()),
                ("commit", def.key.commit_id.as_str()),
                ("unit_type", def.key.unit_type.as_str()),
                ("unit", def.key.unit.as_str()),
                ("path", def.key.path.as_str()),
            ],
        )
    }

    fn author_of_range(
        &self,
        repo: &str,
        commit_id: &str,
        file: &str,
        start: u32,
        end: u32,
    ) -> Result<Person> {
        let start = start.to_string();
        let end = end.to_string();
        self.get(
            "/api/blame/range",
            &[
                ("repo", repo),
                ("commit", commit_id),
                ("file", file),
                ("start", &start),
                ("end", &end),
            ],
        )
    }
}

impl SnippetSource for HttpBackend {
    fn fetch(
        &self,
        repo: &str,
        commit_id: &str,
        file: &str,
        start: u32,
        end: u32,
        context_lines: u32,
    ) -> Result<String> {
        let start = start.to_string();
        let end = end.to_string();
        let context = context_lines.to_string();
        let entry: TreeEntry = self.get(
            "/api/tree",
            &[
                ("repo", repo),
                ("commit", commit_id),
                ("file", file),
                ("start", &start),
                ("end", &end),
                ("context_lines", &context),
                ("full_lines", "true"),
            ],
        )?;
        Ok(entry.contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let session = Session::new("https://xref.example.com/");
        let backend = HttpBackend::new(&session);
        assert_eq!(backend.endpoint, "https://xref.example.com");
    }

    #[test]
    fn test_token_carried_from_session() {
        let mut session = Session::new("https://xref.example.com");
        session.auth_token = Some("t0ken".into());
        let backend = HttpBackend::new(&session);
        assert_eq!(backend.auth_token.as_deref(), Some("t0ken"));
    }
}

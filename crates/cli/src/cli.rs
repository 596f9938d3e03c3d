use crate::commands;
use crate::repo;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use xref_client::HttpBackend;
use xref_core::Session;

const DEFAULT_ENDPOINT: &str = "https://xref.example.com";

#[derive(Parser)]
#[command(name = "xref")]
#[command(about = "Query definitions, cross-references, and commit deltas for a repository")]
#[command(version)]
pub struct Cli {
    /// Remote service endpoint (default: $XREF_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Repository URI (default: derived from the 'origin' remote)
    #[arg(short = 'r', long, global = true)]
    pub repo: Option<String>,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search code in the current project and its dependencies [alias: q]
    #[command(visible_alias = "q")]
    Query {
        /// Search terms; with none, an interactive prompt opens
        #[arg(value_name = "TERMS")]
        terms: Vec<String>,

        /// Commit to search (default: current HEAD, falling back to the
        /// newest built commit on the default branch)
        #[arg(short = 'c', long)]
        commit: Option<String>,

        /// Show each definition's body
        #[arg(short = 'd', long)]
        def: bool,

        /// Show this many references per definition
        #[arg(short = 'x', long, default_value = "0")]
        refs: usize,

        /// Surrounding context lines in reference snippets
        #[arg(short = 'L', long, default_value = "3")]
        context_lines: u32,
    },

    /// List references to a definition from local build data
    Refs {
        /// Def path, e.g. Widget/new
        #[arg(value_name = "DEF_PATH")]
        def_path: String,

        /// Restrict to one source unit
        #[arg(long)]
        unit: Option<String>,

        /// Restrict to one source unit type
        #[arg(long)]
        unit_type: Option<String>,

        /// Rebuild the index even if a cached one exists
        #[arg(long)]
        rebuild: bool,
    },

    /// List the repositories this repository depends on
    Deps,

    /// Summarize changes and impacts between two commits
    #[command(subcommand)]
    Delta(DeltaCommands),

    /// Internal subcommands (not for interactive use)
    #[command(subcommand, hide = true)]
    Internal(InternalCommands),
}

#[derive(Args)]
pub struct DeltaRange {
    /// Base commit
    #[arg(short = 'f', long = "from")]
    pub base: String,

    /// Head commit
    #[arg(short = 't', long = "to", default_value = "master")]
    pub head: String,
}

#[derive(Subcommand)]
pub enum DeltaCommands {
    /// List defs that changed between commits
    Defs {
        #[command(flatten)]
        range: DeltaRange,

        /// Show statistics (# added/changed/deleted)
        #[arg(long)]
        stat: bool,
    },

    /// List authors whose code changed between commits
    Authors {
        #[command(flatten)]
        range: DeltaRange,
    },

    /// List people in other repositories affected by the changes
    Clients {
        #[command(flatten)]
        range: DeltaRange,
    },

    /// List repositories affected by the changes
    Dependents {
        #[command(flatten)]
        range: DeltaRange,
    },
}

#[derive(Subcommand)]
pub enum InternalCommands {
    /// Normalize analyzer graph output on stdin to byte offsets
    NormalizeGraphData {
        /// Offset kind the analyzer reported: byte, char, or unspecified
        #[arg(long, default_value = "unspecified")]
        offset_type: String,

        /// Source unit directory to read file contents from
        #[arg(long)]
        dir: Option<String>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        // The normalize pipe needs neither a repository nor a session.
        if let Commands::Internal(InternalCommands::NormalizeGraphData { offset_type, dir }) =
            &self.command
        {
            return commands::normalize::handle_normalize(
                offset_type,
                dir.as_deref().map(Path::new),
            );
        }

        let local = repo::open_current_repo(Path::new("."))?;
        let uri = self.repo.clone().unwrap_or_else(|| local.uri.clone());

        let endpoint = self
            .endpoint
            .clone()
            .or_else(|| std::env::var("XREF_ENDPOINT").ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let mut session = Session::new(endpoint).with_repo(&uri);
        session.auth_token = std::env::var("XREF_TOKEN").ok();
        session.verbose = self.verbose;

        match self.command {
            Commands::Query {
                terms,
                commit,
                def,
                refs,
                context_lines,
            } => {
                let backend = Arc::new(HttpBackend::new(&session));
                let opts = commands::query::QueryOpts {
                    commit,
                    show_def: def,
                    refs,
                    context_lines,
                };
                commands::query::handle_query(&session, backend, &local, terms, &opts)
            }
            Commands::Refs {
                def_path,
                unit,
                unit_type,
                rebuild,
            } => commands::refs::handle_refs(
                &session,
                &local,
                &def_path,
                unit.as_deref(),
                unit_type.as_deref(),
                rebuild,
            ),
            Commands::Deps => {
                let backend = HttpBackend::new(&session);
                commands::deps::handle_deps(&session, &backend, &local)
            }
            Commands::Delta(delta) => {
                let backend = HttpBackend::new(&session);
                commands::delta::handle_delta(&session, &backend, delta)
            }
            Commands::Internal(_) => unreachable!("handled above"),
        }
    }
}

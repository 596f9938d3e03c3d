//! xref core library
//!
//! This crate provides the def/ref data model, the cross-reference index,
//! dependency resolution, and the commit-delta engine.

pub mod backend;
pub mod byterange;
pub mod context;
pub mod delta;
pub mod depresolve;
pub mod error;
pub mod graph;
pub mod refindex;
pub mod test_fixtures;

// Re-export main types
pub use backend::{
    BlameSource, Build, BuildInfo, BuildSource, DefListOptions, DefSource, DependencySource,
    ListOptions, Person, SearchOptions, SnippetSource,
};
pub use byterange::{normalize, ByteOffsets, ByteRange, FileByteRanges, GraphOutput, OffsetKind};
pub use context::{RepoRevSpec, RepoSpec, Session};
pub use delta::{Delta, DeltaDef, DeltaDefs, DeltaEngine, DeltaSpec, DiffStat};
pub use depresolve::{DepResolver, ResolvedDep, ResolvedTarget, Resolution};
pub use error::{Error, Result};
pub use graph::{Def, DefFmtStrings, DefKey, QualFormats, Ref, RepoSourceUnit, SourceUnit, UnitKey};
pub use refindex::RefIndex;

// Utility functions
pub use depresolve::repo_uri_from_clone_url;

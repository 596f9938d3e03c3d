use thiserror::Error;

/// Errors produced by the core index, resolver, and delta engine.
#[derive(Debug, Error)]
pub enum Error {
    /// No analysis artifacts exist for the requested commit, locally or
    /// remotely.
    #[error("no build found for {repo}@{commit}; run an analysis build first")]
    NotBuilt { repo: String, commit: String },

    /// The reference index was queried before or during a (re)build.
    #[error("reference index is not ready; retry after the build completes")]
    NotReady,

    /// A reference names a def key that no def carries.
    #[error("reference targets unknown def {key}")]
    UnknownDef { key: String },

    /// Two references from the same source unit overlap in one file.
    #[error(
        "overlapping references from unit {unit} in {file}: \
         [{first_start}, {first_end}) and [{second_start}, {second_end})"
    )]
    OverlappingRefs {
        unit: String,
        file: String,
        first_start: u32,
        first_end: u32,
        second_start: u32,
        second_end: u32,
    },

    /// An offset does not fit the recorded length of its file.
    #[error("offset {offset} out of range for {file} (length {len})")]
    OffsetOutOfRange { file: String, offset: u32, len: u32 },

    /// No offset table was recorded for a file that needs conversion.
    #[error("no byte-offset table recorded for {file}")]
    MissingOffsets { file: String },

    /// A dependency-resolution file on disk failed to decode.
    #[error("{file}: {source}")]
    BadResolutionFile {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    /// No dependency data could be found locally or remotely.
    #[error("dependencies unknown for {repo}@{commit}; run an analysis build first")]
    DependenciesUnknown { repo: String, commit: String },

    /// A remote service call failed.
    #[error("remote: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

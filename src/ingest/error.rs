use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a seeding run.
///
/// Everything else the pipeline hits (unknown countries, malformed fields,
/// failed batches) is recovered locally and surfaced through logs and
/// counters only.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("source file not available: {}", .path.display())]
    SourceUnavailable { path: PathBuf },

    #[error("missing source files after extraction: {}", .files.join(", "))]
    MissingSourceFiles { files: Vec<String> },

    #[error("countries table is empty after import")]
    EmptySeed,

    #[error("{job} job failed")]
    JobFailed {
        job: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Why a single row was dropped. Row-level only, never fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowSkip {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid date `{1}` in field `{0}`")]
    InvalidDate(&'static str, String),

    #[error("invalid value `{1}` for required field `{0}`")]
    InvalidValue(&'static str, String),
}

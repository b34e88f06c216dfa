//! Error types for the SQLite helpers.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one helper operation.
///
/// Every variant is logged where it is detected, so callers only decide
/// what to do next; they never need to log again to diagnose it.
#[derive(Error, Debug)]
pub enum SqliteError {
    #[error("database file already exists: {}", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("database file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("could not open database {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{operation}: database handle is missing")]
    NullHandle { operation: &'static str },

    #[error("could not close database: {source}")]
    CloseFailed {
        #[source]
        source: rusqlite::Error,
    },

    #[error("could not execute SQL `{sql}`: {source}")]
    QueryFailed {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("could not prepare statement `{sql}`")]
    StatementPrepareFailed {
        sql: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("could not step statement `{sql}`")]
    StatementStepFailed {
        sql: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("could not convert `{value}` to an integer")]
    ValueParseFailed { value: String },

    #[error("step of `{sql}` produced neither a row nor completion")]
    UnexpectedStepResult { sql: String },
}

impl SqliteError {
    /// Extended result code reported by the engine, if this error wraps one.
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            SqliteError::OpenFailed { source, .. }
            | SqliteError::CloseFailed { source }
            | SqliteError::QueryFailed { source, .. } => engine_code(source),
            SqliteError::StatementPrepareFailed { source, .. }
            | SqliteError::StatementStepFailed { source, .. } => {
                source.as_ref().and_then(engine_code)
            }
            _ => None,
        }
    }
}

pub(crate) fn engine_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.extended_code),
        _ => None,
    }
}

pub type Result<T> = std::result::Result<T, SqliteError>;

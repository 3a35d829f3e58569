use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

/// Store-level failures. `NotFound`, `Conflict`, and `Validation` carry
/// reasons meant for the caller; everything else is internal.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

use thiserror::Error;

/// Everything a [`DocumentStore`](crate::DocumentStore) call can fail with.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No home directory to put `parley.db` in.
    #[error("No data directory for the parley database")]
    NoDataDir,

    /// Creating the database directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The addressed record does not exist.
    #[error("No such record")]
    NotFound,

    /// The acting identity is not allowed to touch this record.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The backend cannot be reached right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The request itself is malformed (wrong participants, bad key...).
    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    /// A stored message or listing id is not a UUID.
    #[error("Bad UUID: {0}")]
    Uuid(#[from] uuid::Error),

    /// A stored timestamp is not RFC 3339.
    #[error("Bad timestamp: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// JSON column could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

//! Persistence abstraction and SQLite implementation.

pub mod sqlite;

use crate::{canvas::Canvas, types::SortOrder};

/// Low-level storage failure.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// A canvas with this name is already stored.
    #[error("canvas `{name}` already exists")]
    Conflict {
        /// Colliding name.
        name: String,
    },
    /// Engine error from SQLite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// No pooled connection became available.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    /// JSON encode/decode error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Anything else, e.g. a stored row that no longer decodes.
    #[error("{0}")]
    Message(String),
}

/// Result alias for persistence calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Outcome of a bulk insert that committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Rows written.
    pub inserted: usize,
    /// Names skipped because they already existed.
    pub skipped: Vec<String>,
}

/// Gallery page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    /// Optional full-text filter over names.
    pub search: Option<String>,
    /// Rows to skip.
    pub offset: usize,
    /// Maximum rows returned.
    pub limit: usize,
    /// Direction on creation time.
    pub order: SortOrder,
}

/// Durable canvas storage.
///
/// Calls are blocking; async callers run them on a blocking thread. Shared
/// by reference between concurrent callers, so implementations isolate
/// writers themselves.
pub trait CanvasStore: Send + Sync {
    /// Inserts one canvas; [`PersistError::Conflict`] if the name exists.
    fn insert(&self, canvas: &Canvas) -> PersistResult<()>;

    /// Inserts all rows in one transaction. Name collisions are skipped and
    /// reported; any other error rolls the whole batch back.
    fn bulk_insert(&self, canvases: &[Canvas]) -> PersistResult<BulkReport>;

    /// Exact, case-sensitive name lookup.
    fn get_by_name(&self, name: &str) -> PersistResult<Option<Canvas>>;

    /// Uniform pick among all rows.
    fn get_random(&self) -> PersistResult<Option<Canvas>>;

    /// Row with the greatest creation time.
    fn get_latest(&self) -> PersistResult<Option<Canvas>>;

    /// One page ordered by creation time, optionally filtered by name search.
    fn get_page(&self, query: &PageQuery) -> PersistResult<Vec<Canvas>>;

    /// Removes the named canvas and its search entry. Returns whether a row
    /// was removed.
    fn delete(&self, name: &str) -> PersistResult<bool>;

    /// Total number of stored canvases.
    fn count(&self) -> PersistResult<usize>;
}

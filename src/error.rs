use thiserror::Error;

/// Errors surfaced by the storage layer.
///
/// Missing rows are not errors here: lookups return `Option` and mutations
/// return `bool`. Projection and filtering are total functions and have no
/// error type at all.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Convergence could not establish an image-bearing column: the legacy
    /// column rename failed and so did the add-and-copy fallback. Fatal,
    /// because every read path needs at least one image column to resolve.
    #[error("cannot establish an image column on products: {0}")]
    ImageColumn(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

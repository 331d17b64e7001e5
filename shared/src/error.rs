use thiserror::Error;

/// Error taxonomy shared by the stores and the HTTP layer.
///
/// Every variant except `Storage`/`Serde` maps to a deliberate client-facing
/// condition; the backend translates them into status classes.
#[derive(Debug, Error)]
pub enum CmsError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A tag or category label did not resolve to an existing entity.
    #[error("unknown label: {0}")]
    UnknownLabel(String),

    /// The rich-document payload could not be interpreted as a node tree.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A parent was named but carries no URL record of its own.
    #[error("missing url record for parent: {0}")]
    DependencyMissing(String),

    /// Bulk delete removed a different number of URL records than entities.
    /// This is a consistency break, not a retryable failure.
    #[error("partial delete: removed {removed} url records for {expected} entities")]
    PartialDelete { expected: usize, removed: usize },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type CmsResult<T> = Result<T, CmsError>;

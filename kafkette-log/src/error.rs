//! Error types for the commit log.

/// Error type for log and storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Appending exhausted its retry budget against concurrent writers.
    #[error("append-conflict: key {key} still contended after {attempts} attempts")]
    AppendConflict { key: String, attempts: u32 },

    /// A commit tried to move a checkpoint backwards under the reject policy.
    #[error("offset-regression: key {key} is committed at {committed}, refused {requested}")]
    OffsetRegression {
        key: String,
        committed: u64,
        requested: u64,
    },

    /// A stored log does not satisfy the contiguous offset invariant.
    #[error("corrupt-log: key {key} holds offset {found} at index {index}")]
    CorruptLog {
        key: String,
        index: usize,
        found: u64,
    },

    /// The store did not answer in time; the outcome is unknown.
    #[error("store timed out: {0}")]
    Timeout(String),

    /// The store reported a transient failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The connection to the store is gone for good; retrying cannot help.
    #[error("store closed: {0}")]
    Closed(String),

    /// Stored JSON did not have the expected shape.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl Error {
    /// Whether the failed operation may be retried from a fresh read.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, Error>;

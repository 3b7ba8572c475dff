//! Unified error types for the result cache.
//!
//! Display strings carry a stable upper-case code so callers and logs can
//! match on the failure class without inspecting the variant.

use crate::{DocId, QueryId};

/// Errors raised by the cache engine and its backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A backend adapter did not provide an optional hook.
    #[error("NOT_IMPLEMENTED: backend does not support `{0}`")]
    NotImplemented(&'static str),

    /// Two distinct query strings hashed to the same registry key.
    #[error("HASH_COLLISION: {requested:?} collides with registered query {existing:?}")]
    HashCollision { existing: String, requested: String },

    /// A hinted document could not be found in the cached hit list.
    ///
    /// The caller's bookkeeping disagrees with the cache contents.
    #[error("CONTRACT_VIOLATION: document {doc_id} (rank hint {rank_hint}) not cached for query {query_id}")]
    HintedHitNotFound { query_id: QueryId, doc_id: DocId, rank_hint: usize },

    /// A stored value could not be encoded or decoded.
    #[error("CODEC_ERROR: {0}")]
    Codec(String),

    /// SQLite operation failed.
    #[error("BACKEND_ERROR: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration failed to apply.
    #[error("BACKEND_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Filesystem operation failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// The backend has been closed.
    #[error("BACKEND_CLOSED")]
    Closed,

    /// Invalid input parameters (e.g., a zero chunk size).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::HashCollision { existing: "a".to_string(), requested: "b".to_string() };
        assert!(err.to_string().starts_with("HASH_COLLISION"));
        assert!(err.to_string().contains("\"b\""));
    }

    #[test]
    fn test_contract_violation_display() {
        let err = Error::HintedHitNotFound { query_id: 3, doc_id: 70, rank_hint: 4 };
        let msg = err.to_string();
        assert!(msg.contains("CONTRACT_VIOLATION"));
        assert!(msg.contains("70"));
        assert!(msg.contains("query 3"));
    }

    #[test]
    fn test_codec_error_from_json() {
        let err: Error = serde_json::from_str::<u64>("not json").unwrap_err().into();
        assert!(matches!(err, Error::Codec(_)));
    }
}

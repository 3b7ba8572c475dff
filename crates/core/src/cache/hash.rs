//! Query-string hashing for registry keys.

use sha2::{Digest, Sha256};

/// Hex SHA-256 digest of a query string.
///
/// Bounds the registry key length regardless of how long the query is.
pub fn compute_query_hash(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        assert_eq!(compute_query_hash("hello"), compute_query_hash("hello"));
    }

    #[test]
    fn test_hash_distinguishes_queries() {
        assert_ne!(compute_query_hash("hello"), compute_query_hash("hello "));
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_query_hash(&"x".repeat(10_000));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_known_value() {
        assert_eq!(
            compute_query_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

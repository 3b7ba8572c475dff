//! Backend key construction and parsing.

use super::hash::compute_query_hash;
use crate::QueryId;

/// Holds the next query id to allocate.
pub const COUNTER_KEY: &[u8] = b"I";

/// Holds the chunk size the hit lists were written with.
pub const CHUNK_SIZE_KEY: &[u8] = b"C";

pub fn query_hash_key(query: &str) -> Vec<u8> {
    format!("Q{}", compute_query_hash(query)).into_bytes()
}

pub fn query_str_key(id: QueryId) -> Vec<u8> {
    format!("S{id}").into_bytes()
}

pub fn hit_chunk_key(id: QueryId, chunk: usize) -> Vec<u8> {
    format!("H{id}:{chunk}").into_bytes()
}

pub fn stats_key(id: QueryId) -> Vec<u8> {
    format!("T{id}").into_bytes()
}

pub fn facets_key(id: QueryId) -> Vec<u8> {
    format!("F{id}").into_bytes()
}

/// A backend key classified by its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    Counter,
    ChunkSize,
    QueryHash(String),
    QueryStr(QueryId),
    HitChunk(QueryId, usize),
    Stats(QueryId),
    Facets(QueryId),
    /// Not part of the cache layout.
    Foreign,
}

impl CacheKey {
    /// Query id the key belongs to, if any.
    pub fn query_id(&self) -> Option<QueryId> {
        match self {
            CacheKey::QueryStr(id) | CacheKey::HitChunk(id, _) | CacheKey::Stats(id) | CacheKey::Facets(id) => Some(*id),
            _ => None,
        }
    }
}

/// Classify a raw backend key.
pub fn parse_key(key: &[u8]) -> CacheKey {
    let Ok(key) = std::str::from_utf8(key) else {
        return CacheKey::Foreign;
    };
    let Some(prefix) = key.chars().next() else {
        return CacheKey::Foreign;
    };
    let rest = &key[prefix.len_utf8()..];

    let parsed = match prefix {
        'I' if rest.is_empty() => Some(CacheKey::Counter),
        'C' if rest.is_empty() => Some(CacheKey::ChunkSize),
        'Q' if rest.len() == 64 && rest.chars().all(|c| c.is_ascii_hexdigit()) => {
            Some(CacheKey::QueryHash(rest.to_string()))
        }
        'S' => parse_id(rest).map(CacheKey::QueryStr),
        'T' => parse_id(rest).map(CacheKey::Stats),
        'F' => parse_id(rest).map(CacheKey::Facets),
        'H' => rest
            .split_once(':')
            .and_then(|(id, chunk)| Some(CacheKey::HitChunk(parse_id(id)?, parse_decimal(chunk)?))),
        _ => None,
    };

    parsed.unwrap_or(CacheKey::Foreign)
}

fn parse_id(s: &str) -> Option<QueryId> {
    parse_decimal(s)
}

/// Strict decimal: no sign, no leading zeros, so each number has one key.
fn parse_decimal<T: std::str::FromStr>(s: &str) -> Option<T> {
    let canonical = s == "0" || (!s.is_empty() && !s.starts_with('0') && s.bytes().all(|b| b.is_ascii_digit()));
    if canonical { s.parse().ok() } else { None }
}

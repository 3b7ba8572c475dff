//! Result cache engine for precomputed search results.
//!
//! This crate provides:
//! - Chunked storage of ranked hit lists keyed by dense query ids
//! - Match-count statistics and facet frequency tables per query
//! - Pluggable key-value backends (in-memory, SQLite) and codecs
//! - Layered configuration

pub mod backend;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;

/// Dense identifier allocated once per distinct query string.
pub type QueryId = u64;

/// Opaque document identifier from the search engine's id space.
pub type DocId = u64;

pub use backend::{KeyValueBackend, MemoryBackend, SqliteBackend};
pub use cache::{
    CacheManager, CacheOptions, FacetCount, FacetTable, FacetValue, InMemoryInverter, Inverter, Posting,
    SortedRunInverter, Stats, VerifyReport,
};
pub use codec::{BincodeCodec, Codec, JsonCodec};
pub use config::{BackendKind, CacheConfig, CodecKind, ConfigError, InverterKind};
pub use error::Error;

//! Key-value storage backends.
//!
//! The cache manager persists everything through [`KeyValueBackend`]. Any
//! store that can get, set and delete byte values by byte key satisfies it:
//!
//! - [`MemoryBackend`] keeps a `HashMap` and is used by tests
//! - [`SqliteBackend`] stores a single key/value table in SQLite, staging
//!   writes until [`KeyValueBackend::flush`]

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::Error;

/// Byte-keyed store that a cache manager owns for its lifetime.
///
/// `get`, `set` and `delete` are required. The remaining hooks have default
/// bodies that report [`Error::NotImplemented`], so an adapter that cannot
/// enumerate keys or has no durability step fails loudly when one is used.
pub trait KeyValueBackend: Send {
    /// Get the value stored under `key`, or `None` if there is none.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Store `value` under `key`, replacing any existing value.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Remove the value under `key`. Removing an absent key does nothing.
    fn delete(&mut self, key: &[u8]) -> Result<(), Error>;

    /// All keys currently stored, in no particular order.
    fn keys(&self) -> Result<Vec<Vec<u8>>, Error> {
        Err(Error::NotImplemented("keys"))
    }

    /// Make all writes so far durable and visible to other readers.
    fn flush(&mut self) -> Result<(), Error> {
        Err(Error::NotImplemented("flush"))
    }

    /// Release backend resources. Only repeated `close` calls may follow.
    fn close(&mut self) -> Result<(), Error> {
        Err(Error::NotImplemented("close"))
    }
}

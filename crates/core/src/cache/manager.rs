//! Cache manager construction and backend lifecycle.
//!
//! The manager owns one backend for its lifetime, together with the codec
//! and inversion strategy injected at construction. Query, hit, stats and
//! facet operations are implemented on it in the sibling modules.

use std::cell::Cell;

use super::invert::{InMemoryInverter, Inverter, SortedRunInverter};
use super::keys::{CHUNK_SIZE_KEY, COUNTER_KEY};
use crate::backend::{KeyValueBackend, MemoryBackend, SqliteBackend};
use crate::codec::{BincodeCodec, Codec, JsonCodec};
use crate::config::{BackendKind, CacheConfig, CodecKind, InverterKind};
use crate::Error;

/// Tunables for a [`CacheManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Number of document ids per stored hit-list chunk.
    pub chunk_size: usize,
    /// Whether `remove_hits` subtracts the removed count from cached stats.
    pub adjust_stats_on_remove: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { chunk_size: 1000, adjust_stats_on_remove: true }
    }
}

/// Result cache over a key-value backend.
///
/// Writes are visible to reads through the same manager immediately and to
/// other handles on the backend after [`CacheManager::flush`]. There is no
/// internal locking: callers serialize mutation of a given query id.
///
/// The chunk size is recorded in the backend with the first stored hit list.
/// Hit operations on a manager configured with a different chunk size fail
/// with `Error::InvalidInput` rather than misreading the chunks.
///
/// Dropping a manager over [`SqliteBackend`] flushes pending writes; call
/// [`CacheManager::close`] to see a failing flush as an error.
pub struct CacheManager {
    pub(crate) backend: Box<dyn KeyValueBackend>,
    pub(crate) codec: Box<dyn Codec>,
    pub(crate) inverter: Box<dyn Inverter>,
    pub(crate) options: CacheOptions,
    /// Set once the recorded chunk size is known to match `options`.
    chunk_size_checked: Cell<bool>,
    closed: bool,
}

impl CacheManager {
    /// Manager with default options, the bincode codec and in-memory inversion.
    pub fn new(backend: impl KeyValueBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            codec: Box::new(BincodeCodec::new()),
            inverter: Box::new(InMemoryInverter::new()),
            options: CacheOptions::default(),
            chunk_size_checked: Cell::new(false),
            closed: false,
        }
    }

    /// Manager with explicit options.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the chunk size is zero.
    pub fn with_options(backend: impl KeyValueBackend + 'static, options: CacheOptions) -> Result<Self, Error> {
        Self::from_parts(
            Box::new(backend),
            Box::new(BincodeCodec::new()),
            Box::new(InMemoryInverter::new()),
            options,
        )
    }

    /// Assemble a manager from boxed parts.
    pub fn from_parts(
        backend: Box<dyn KeyValueBackend>, codec: Box<dyn Codec>, inverter: Box<dyn Inverter>, options: CacheOptions,
    ) -> Result<Self, Error> {
        if options.chunk_size == 0 {
            return Err(Error::InvalidInput("chunk_size must be greater than 0".into()));
        }
        Ok(Self { backend, codec, inverter, options, chunk_size_checked: Cell::new(false), closed: false })
    }

    /// Open the backend, codec and inverter named by a configuration.
    pub fn open(config: &CacheConfig) -> Result<Self, Error> {
        let backend: Box<dyn KeyValueBackend> = match config.backend {
            BackendKind::Sqlite => Box::new(SqliteBackend::open(&config.db_path)?),
            BackendKind::Memory => Box::new(MemoryBackend::new()),
        };
        let codec: Box<dyn Codec> = match config.codec {
            CodecKind::Bincode => Box::new(BincodeCodec::new()),
            CodecKind::Json => Box::new(JsonCodec::new()),
        };
        let inverter: Box<dyn Inverter> = match config.inverter {
            InverterKind::InMemory => Box::new(InMemoryInverter::new()),
            InverterKind::SortedRuns => Box::new(SortedRunInverter::new()),
        };

        tracing::info!(
            backend = ?config.backend,
            codec = codec.name(),
            inverter = inverter.name(),
            chunk_size = config.chunk_size,
            "opening result cache"
        );
        Self::from_parts(backend, codec, inverter, config.options())
    }

    /// Replace the codec. Existing stored values must already use its format.
    pub fn with_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Replace the inversion strategy used by `iter_by_docid`.
    pub fn with_inverter(mut self, inverter: impl Inverter + 'static) -> Self {
        self.inverter = Box::new(inverter);
        self
    }

    pub fn options(&self) -> CacheOptions {
        self.options
    }

    pub fn chunk_size(&self) -> usize {
        self.options.chunk_size
    }

    /// True iff no query id has ever been allocated.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.load(COUNTER_KEY)?.is_none())
    }

    /// Make all writes so far durable and visible to other handles.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.backend.flush()
    }

    /// Release the backend. Repeated calls are no-ops.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.inverter.invalidate();
        self.backend.close()?;
        self.closed = true;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Erase every key in the backend: ids, mappings, hits, stats, facets.
    pub fn clear(&mut self) -> Result<(), Error> {
        let keys = self.backend.keys()?;
        for key in &keys {
            self.backend.delete(key)?;
        }
        self.inverter.invalidate();
        self.chunk_size_checked.set(false);
        tracing::info!(keys = keys.len(), "cleared result cache");
        Ok(())
    }

    /// Chunk size recorded in the backend, if any hit list was ever stored.
    pub fn stored_chunk_size(&self) -> Result<Option<usize>, Error> {
        let Some(bytes) = self.load(CHUNK_SIZE_KEY)? else {
            return Ok(None);
        };
        let stored = self.codec.decode_int(&bytes)?;
        usize::try_from(stored)
            .map(Some)
            .map_err(|_| Error::InvalidInput(format!("recorded chunk_size {stored} does not fit in usize")))
    }

    /// Fail unless the recorded chunk size, if any, equals the configured one.
    pub(crate) fn check_chunk_size(&self) -> Result<(), Error> {
        if self.chunk_size_checked.get() {
            return Ok(());
        }
        match self.stored_chunk_size()? {
            Some(stored) if stored != self.options.chunk_size => {
                tracing::error!(stored, configured = self.options.chunk_size, "chunk size mismatch");
                Err(Error::InvalidInput(format!(
                    "cache was written with chunk_size {stored} but is opened with chunk_size {}",
                    self.options.chunk_size
                )))
            }
            Some(_) => {
                self.chunk_size_checked.set(true);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Record the configured chunk size unless one is already recorded.
    pub(crate) fn record_chunk_size(&mut self) -> Result<(), Error> {
        self.check_chunk_size()?;
        if self.chunk_size_checked.get() {
            return Ok(());
        }
        let bytes = self.codec.encode_int(self.options.chunk_size as u64)?;
        self.store(CHUNK_SIZE_KEY, &bytes)?;
        self.chunk_size_checked.set(true);
        Ok(())
    }

    /// Read a value; a stored empty value counts as absent.
    pub(crate) fn load(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.backend.get(key)?.filter(|value| !value.is_empty()))
    }

    pub(crate) fn store(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.backend.set(key, value)
    }

    pub(crate) fn remove_key(&mut self, key: &[u8]) -> Result<(), Error> {
        self.backend.delete(key)
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("codec", &self.codec.name())
            .field("inverter", &self.inverter.name())
            .field("options", &self.options)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

//! In-memory backend.

use std::collections::HashMap;

use super::KeyValueBackend;
use crate::Error;

/// `HashMap`-backed store. Writes are immediately "durable", so `flush` only
/// checks that the store is still open.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<Vec<u8>, Vec<u8>>,
    closed: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed { Err(Error::Closed) } else { Ok(()) }
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.ensure_open()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), Error> {
        self.ensure_open()?;
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, Error> {
        self.ensure_open()?;
        Ok(self.entries.keys().cloned().collect())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.ensure_open()
    }

    fn close(&mut self) -> Result<(), Error> {
        if !self.closed {
            self.entries.clear();
            self.closed = true;
        }
        Ok(())
    }
}

//! Chunked hit-list storage.
//!
//! A hit list is split into chunks of `chunk_size` document ids, each stored
//! under `H<queryid>:<chunk>`. Every chunk but the last is full, and the
//! first absent chunk marks the end of the list, so the length is implicit.
//! Reading chunks back therefore needs the chunk size they were written with,
//! which is recorded under the `C` key by the first write.

use super::keys::hit_chunk_key;
use super::manager::CacheManager;
use crate::{DocId, Error, QueryId};

impl CacheManager {
    /// Get the cached hits for ranks `start..end` (or `start..` if `end` is
    /// `None`), clipped to the length of the list.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the cache was written with another
    /// chunk size or a stored chunk holds more hits than the chunk size.
    pub fn get_hits(&self, id: QueryId, start: usize, end: Option<usize>) -> Result<Vec<DocId>, Error> {
        self.check_chunk_size()?;
        if end.is_some_and(|end| end <= start) {
            return Ok(Vec::new());
        }

        let chunk_size = self.options.chunk_size;
        let last_chunk = end.map(|end| (end - 1) / chunk_size);
        let mut chunk = start / chunk_size;
        let mut offset = start % chunk_size;
        let mut hits = Vec::new();

        while last_chunk.is_none_or(|last| chunk <= last) {
            let Some(docids) = self.read_chunk(id, chunk)? else {
                break;
            };
            if docids.len() > chunk_size {
                return Err(Error::InvalidInput(format!(
                    "query {id} chunk {chunk} holds {} hits, more than chunk_size {chunk_size}",
                    docids.len()
                )));
            }

            let base = chunk * chunk_size;
            let stop = end.map_or(docids.len(), |end| (end - base).min(docids.len()));
            if offset < stop {
                hits.extend_from_slice(&docids[offset..stop]);
            }
            if docids.len() < chunk_size {
                break;
            }

            offset = 0;
            chunk += 1;
        }

        Ok(hits)
    }

    /// Replace the cached hits for a query.
    pub fn set_hits(&mut self, id: QueryId, docids: &[DocId]) -> Result<(), Error> {
        self.set_hits_from(id, docids, 0)
    }

    /// Replace the hits from chunk `start_chunk` onward, leaving earlier
    /// chunks untouched. Chunks beyond the new end are deleted.
    pub fn set_hits_from(&mut self, id: QueryId, docids: &[DocId], start_chunk: usize) -> Result<(), Error> {
        self.record_chunk_size()?;
        let mut chunk = start_chunk;
        for piece in docids.chunks(self.options.chunk_size) {
            let bytes = self.codec.encode_docids(piece)?;
            self.store(&hit_chunk_key(id, chunk), &bytes)?;
            chunk += 1;
        }
        let written = chunk - start_chunk;

        // Drop stale chunks left over from a longer list.
        loop {
            let key = hit_chunk_key(id, chunk);
            if self.load(&key)?.is_none() {
                break;
            }
            self.remove_key(&key)?;
            chunk += 1;
        }

        self.inverter.invalidate();
        tracing::debug!(
            query_id = id,
            start_chunk,
            hits = docids.len(),
            written,
            dropped = chunk - start_chunk - written,
            "stored hits"
        );
        Ok(())
    }

    /// Number of hits cached for a query.
    ///
    /// Every chunk is fetched to find the end of the list; only the last one
    /// is decoded.
    pub fn hit_count(&self, id: QueryId) -> Result<usize, Error> {
        self.check_chunk_size()?;
        let mut chunks = 0;
        let mut last = None;
        while let Some(bytes) = self.load(&hit_chunk_key(id, chunks))? {
            last = Some(bytes);
            chunks += 1;
        }
        let Some(bytes) = last else {
            return Ok(0);
        };

        let tail = self.codec.decode_docids(&bytes)?.len();
        Ok((chunks - 1) * self.options.chunk_size + tail)
    }

    pub(crate) fn read_chunk(&self, id: QueryId, chunk: usize) -> Result<Option<Vec<DocId>>, Error> {
        self.load(&hit_chunk_key(id, chunk))?
            .map(|bytes| self.codec.decode_docids(&bytes))
            .transpose()
    }
}

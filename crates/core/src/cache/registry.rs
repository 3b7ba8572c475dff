//! Query string to query id registry.
//!
//! Forward entries live under the SHA-256 of the query string and hold the
//! string itself next to the id, so a hash collision is detected instead of
//! aliasing two queries. Reverse entries live under the id and make the
//! registered strings enumerable. The `I` counter is the allocation
//! authority: ids below it are allocated, and ids are never reused.

use std::ops::Range;

use super::keys::{COUNTER_KEY, query_hash_key, query_str_key};
use super::manager::CacheManager;
use crate::{Error, QueryId};

impl CacheManager {
    /// Number of query ids allocated so far.
    pub fn query_count(&self) -> Result<u64, Error> {
        match self.load(COUNTER_KEY)? {
            Some(bytes) => self.codec.decode_int(&bytes),
            None => Ok(0),
        }
    }

    /// Look up the id of a registered query string.
    ///
    /// # Errors
    ///
    /// Returns `Error::HashCollision` if a different string is registered
    /// under the same hash.
    pub fn get_queryid(&self, query: &str) -> Result<Option<QueryId>, Error> {
        let Some(bytes) = self.load(&query_hash_key(query))? else {
            return Ok(None);
        };

        let (stored, id) = self.codec.decode_query_entry(&bytes)?;
        if stored != query {
            tracing::error!(query_id = id, "query string hash collision");
            return Err(Error::HashCollision { existing: stored, requested: query.to_string() });
        }
        Ok(Some(id))
    }

    /// Get the id of a query string, allocating the next id if it is new.
    pub fn get_or_make_queryid(&mut self, query: &str) -> Result<QueryId, Error> {
        if let Some(id) = self.get_queryid(query)? {
            return Ok(id);
        }

        let id = self.query_count()?;
        let entry = self.codec.encode_query_entry(query, id)?;
        let reverse = self.codec.encode_query_str(query)?;
        let next = self.codec.encode_int(id + 1)?;

        self.store(&query_hash_key(query), &entry)?;
        self.store(&query_str_key(id), &reverse)?;
        self.store(COUNTER_KEY, &next)?;

        tracing::info!(query_id = id, "allocated query id");
        Ok(id)
    }

    /// The string registered for a query id.
    pub fn query_str(&self, id: QueryId) -> Result<Option<String>, Error> {
        self.load(&query_str_key(id))?
            .map(|bytes| self.codec.decode_query_str(&bytes))
            .transpose()
    }

    /// Every allocated query id, in ascending order.
    pub fn iter_queryids(&self) -> Result<Range<QueryId>, Error> {
        Ok(0..self.query_count()?)
    }

    /// Every registered query string, in query id order.
    pub fn iter_query_strs(&self) -> Result<impl Iterator<Item = Result<String, Error>> + '_, Error> {
        let ids = self.iter_queryids()?;
        Ok(ids.filter_map(move |id| match self.query_str(id) {
            Ok(Some(query)) => Some(Ok(query)),
            Ok(None) => {
                tracing::warn!(query_id = id, "allocated query id has no reverse mapping");
                None
            }
            Err(e) => Some(Err(e)),
        }))
    }
}

//! Consistency checks over a stored cache.

use std::collections::BTreeMap;

use serde::Serialize;

use super::keys::{CacheKey, parse_key};
use super::manager::CacheManager;
use crate::{Error, QueryId};

/// Outcome of [`CacheManager::verify`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub queries_checked: u64,
    pub chunks_checked: usize,
    /// Whether the backend could enumerate its keys for the layout check.
    pub keys_checked: bool,
    pub problems: Vec<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }

    fn fail(&mut self, problem: String) {
        tracing::warn!(%problem, "cache verification failure");
        self.problems.push(problem);
    }
}

impl CacheManager {
    /// Check the registry mappings, the chunk layout of every hit list and,
    /// if the backend can enumerate keys, that no key falls outside the layout.
    ///
    /// Only backend and decode failures are returned as errors; inconsistencies
    /// are collected in the report.
    pub fn verify(&self) -> Result<VerifyReport, Error> {
        let mut report = VerifyReport::default();
        let count = self.query_count()?;
        let chunk_size = self.options.chunk_size;
        let mut chunk_counts: BTreeMap<QueryId, usize> = BTreeMap::new();

        let recorded = self.stored_chunk_size()?;
        if let Some(stored) = recorded.filter(|&stored| stored != chunk_size) {
            report.fail(format!("hit lists were written with chunk size {stored}, not {chunk_size}"));
        }

        for id in 0..count {
            report.queries_checked += 1;

            match self.query_str(id)? {
                None => report.fail(format!("query id {id} has no query string")),
                Some(query) => match self.get_queryid(&query) {
                    Ok(Some(found)) if found == id => {}
                    Ok(Some(found)) => {
                        report.fail(format!("query {query:?} is stored as id {id} but looks up as id {found}"))
                    }
                    Ok(None) => report.fail(format!("query {query:?} (id {id}) has no forward mapping")),
                    Err(Error::HashCollision { existing, .. }) => {
                        report.fail(format!("query {query:?} (id {id}) collides with {existing:?}"))
                    }
                    Err(e) => return Err(e),
                },
            }

            let mut chunk = 0;
            while let Some(docids) = self.read_chunk(id, chunk)? {
                report.chunks_checked += 1;
                if docids.is_empty() || docids.len() > chunk_size {
                    report.fail(format!("query {id} chunk {chunk} holds {} hits", docids.len()));
                }
                chunk += 1;
                if docids.len() < chunk_size && self.read_chunk(id, chunk)?.is_some() {
                    report.fail(format!("query {id} chunk {} is short but not last", chunk - 1));
                }
            }
            chunk_counts.insert(id, chunk);
        }

        if recorded.is_none() && report.chunks_checked > 0 {
            report.fail("hit chunks are stored without a recorded chunk size".to_string());
        }

        match self.backend.keys() {
            Ok(keys) => {
                report.keys_checked = true;
                self.verify_keys(&keys, count, &chunk_counts, &mut report)?;
            }
            Err(Error::NotImplemented(_)) => {
                tracing::info!("backend cannot enumerate keys, skipping layout check");
            }
            Err(e) => return Err(e),
        }

        tracing::info!(
            queries = report.queries_checked,
            chunks = report.chunks_checked,
            problems = report.problems.len(),
            "verified result cache"
        );
        Ok(report)
    }

    fn verify_keys(
        &self, keys: &[Vec<u8>], count: u64, chunk_counts: &BTreeMap<QueryId, usize>, report: &mut VerifyReport,
    ) -> Result<(), Error> {
        for key in keys {
            let parsed = parse_key(key);
            if parsed.query_id().is_some_and(|id| id >= count) {
                report.fail(format!("key {} refers to an unallocated query id", String::from_utf8_lossy(key)));
                continue;
            }

            match parsed {
                CacheKey::Foreign => {
                    report.fail(format!("key {} is not part of the cache layout", String::from_utf8_lossy(key)))
                }
                CacheKey::HitChunk(id, chunk) if chunk >= chunk_counts.get(&id).copied().unwrap_or(0) => {
                    report.fail(format!("query {id} chunk {chunk} is stranded after the end of its hit list"))
                }
                CacheKey::QueryHash(_) => {
                    let Some(bytes) = self.load(key)? else { continue };
                    let (query, id) = self.codec.decode_query_entry(&bytes)?;
                    if id >= count {
                        report.fail(format!("query {query:?} maps to unallocated id {id}"));
                    } else if self.query_str(id)?.as_deref() != Some(query.as_str()) {
                        report.fail(format!("query {query:?} maps to id {id}, which belongs to another query"));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

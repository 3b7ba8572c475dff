//! Removal of hits from a cached list using approximate rank hints.
//!
//! Callers pass `(rank_hint, docid)` pairs where the hint may over-estimate
//! the true rank, never under-estimate it. The common case is an exact hint:
//! only the chunks from the lowest hinted rank onward are read and
//! rewritten. Pairs whose hint misses fall back to a scan of the whole list,
//! walking backwards from the hint.

use super::manager::CacheManager;
use crate::{DocId, Error, QueryId};

impl CacheManager {
    /// Remove every named document from the hit list of a query, keeping the
    /// order of the remaining hits. Returns the number of hits removed.
    ///
    /// With `adjust_stats_on_remove` set, each known stats field is reduced
    /// by that number.
    ///
    /// # Errors
    ///
    /// Returns `Error::HintedHitNotFound` if a document is not in the list at
    /// or below its hinted rank. Nothing is written in that case.
    pub fn remove_hits(
        &mut self, id: QueryId, ranks_and_docids: impl IntoIterator<Item = (usize, DocId)>,
    ) -> Result<usize, Error> {
        let mut pairs: Vec<(usize, DocId)> = ranks_and_docids.into_iter().collect();
        if pairs.is_empty() {
            return Ok(0);
        }

        // Highest rank first, so a removal never shifts a rank still to be processed.
        pairs.sort_unstable_by(|a, b| b.cmp(a));
        let lowest = pairs[pairs.len() - 1].0;

        let chunk_size = self.options.chunk_size;
        let mut start_chunk = lowest / chunk_size;
        let start_rank = start_chunk * chunk_size;
        let mut hits = self.get_hits(id, start_rank, None)?;

        let mut unmatched = Vec::new();
        for &(rank, docid) in &pairs {
            let offset = rank - start_rank;
            if hits.get(offset) == Some(&docid) {
                hits.remove(offset);
            } else {
                unmatched.push((rank, docid));
            }
        }

        if !unmatched.is_empty() {
            tracing::warn!(
                query_id = id,
                unmatched = unmatched.len(),
                hinted = pairs.len(),
                "stale rank hints, scanning whole hit list"
            );

            let mut all = self.get_hits(id, 0, Some(start_rank))?;
            all.append(&mut hits);
            hits = all;
            start_chunk = 0;

            for (rank_hint, docid) in unmatched {
                let found = hits
                    .get(..=rank_hint.min(hits.len().saturating_sub(1)))
                    .and_then(|candidates| candidates.iter().rposition(|&hit| hit == docid));
                match found {
                    Some(rank) => {
                        hits.remove(rank);
                    }
                    None => {
                        tracing::error!(query_id = id, docid, rank_hint, "hinted hit not in cached list");
                        return Err(Error::HintedHitNotFound { query_id: id, doc_id: docid, rank_hint });
                    }
                }
            }
        }

        self.set_hits_from(id, &hits, start_chunk)?;

        let removed = pairs.len();
        if self.options.adjust_stats_on_remove {
            let mut stats = self.get_stats(id)?;
            if !stats.is_unknown() {
                stats.decrement(removed as i64);
                self.set_stats(id, stats)?;
            }
        }

        tracing::debug!(query_id = id, removed, start_chunk, "removed hits");
        Ok(removed)
    }
}

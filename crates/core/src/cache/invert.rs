//! Inversion of cached hit lists into a per-document view.
//!
//! `iter_by_docid` turns `queryid -> [docid]` into
//! `docid -> [(queryid, rank)]`. How the inversion is built and held is a
//! strategy injected into the manager:
//!
//! - [`InMemoryInverter`] keeps a sorted map, simple and fine for moderate caches
//! - [`SortedRunInverter`] keeps one flat record per hit and sorts it once,
//!   a more compact layout for large caches
//!
//! Both yield documents in ascending id order, with each document's postings
//! ordered by query id then rank.

use std::collections::BTreeMap;

use super::manager::CacheManager;
use crate::{DocId, Error, QueryId};

/// `(queryid, rank)` of one cached hit.
pub type Posting = (QueryId, usize);

/// Source of hit lists handed to an inverter, in query id order.
pub type HitLists<'a> = &'a mut dyn Iterator<Item = Result<(QueryId, Vec<DocId>), Error>>;

/// Strategy for building and holding the per-document view.
pub trait Inverter: Send {
    fn name(&self) -> &'static str;

    /// Whether an inversion is held and still valid.
    fn is_prepared(&self) -> bool;

    /// Build the inversion from every cached hit list, replacing any held one.
    fn prepare(&mut self, lists: HitLists<'_>) -> Result<(), Error>;

    /// Drop any held inversion.
    fn invalidate(&mut self);

    /// Documents in ascending id order with their postings. Empty when not prepared.
    fn entries(&self) -> Box<dyn Iterator<Item = (DocId, Vec<Posting>)> + '_>;
}

#[derive(Debug, Default)]
pub struct InMemoryInverter {
    items: Option<BTreeMap<DocId, Vec<Posting>>>,
}

impl InMemoryInverter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inverter for InMemoryInverter {
    fn name(&self) -> &'static str {
        "in_memory"
    }

    fn is_prepared(&self) -> bool {
        self.items.is_some()
    }

    fn prepare(&mut self, lists: HitLists<'_>) -> Result<(), Error> {
        self.items = None;
        let mut items: BTreeMap<DocId, Vec<Posting>> = BTreeMap::new();
        for list in lists {
            let (id, docids) = list?;
            for (rank, docid) in docids.into_iter().enumerate() {
                items.entry(docid).or_default().push((id, rank));
            }
        }
        self.items = Some(items);
        Ok(())
    }

    fn invalidate(&mut self) {
        self.items = None;
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (DocId, Vec<Posting>)> + '_> {
        match &self.items {
            Some(items) => Box::new(items.iter().map(|(docid, postings)| (*docid, postings.clone()))),
            None => Box::new(std::iter::empty()),
        }
    }
}

#[derive(Debug, Default)]
pub struct SortedRunInverter {
    /// `(docid, queryid, rank)`, sorted once prepared.
    records: Option<Vec<(DocId, QueryId, usize)>>,
}

impl SortedRunInverter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inverter for SortedRunInverter {
    fn name(&self) -> &'static str {
        "sorted_runs"
    }

    fn is_prepared(&self) -> bool {
        self.records.is_some()
    }

    fn prepare(&mut self, lists: HitLists<'_>) -> Result<(), Error> {
        self.records = None;
        let mut records = Vec::new();
        for list in lists {
            let (id, docids) = list?;
            records.extend(docids.into_iter().enumerate().map(|(rank, docid)| (docid, id, rank)));
        }
        records.sort_unstable();
        self.records = Some(records);
        Ok(())
    }

    fn invalidate(&mut self) {
        self.records = None;
    }

    fn entries(&self) -> Box<dyn Iterator<Item = (DocId, Vec<Posting>)> + '_> {
        let Some(records) = &self.records else {
            return Box::new(std::iter::empty());
        };
        Box::new(
            records
                .chunk_by(|a, b| a.0 == b.0)
                .map(|run| (run[0].0, run.iter().map(|&(_, id, rank)| (id, rank)).collect())),
        )
    }
}

impl CacheManager {
    /// Rebuild the per-document view now, discarding any held one.
    pub fn prepare_iter_by_docid(&mut self) -> Result<(), Error> {
        self.inverter.invalidate();
        self.ensure_inverted()
    }

    /// Drop the held per-document view. Hit mutations do this automatically.
    pub fn invalidate_iter_by_docid(&mut self) {
        self.inverter.invalidate();
    }

    /// Every cached document in ascending id order, with the `(queryid, rank)`
    /// of each cached hit that refers to it.
    pub fn iter_by_docid(&mut self) -> Result<impl Iterator<Item = (DocId, Vec<Posting>)> + '_, Error> {
        self.ensure_inverted()?;
        Ok(self.inverter.entries())
    }

    fn ensure_inverted(&mut self) -> Result<(), Error> {
        if self.inverter.is_prepared() {
            return Ok(());
        }

        let count = self.query_count()?;
        // The inverter is swapped out so the hit lists can be read through `self`.
        let mut inverter = std::mem::replace(&mut self.inverter, Box::new(InMemoryInverter::new()));
        let result = {
            let mut lists = (0..count).map(|id| self.get_hits(id, 0, None).map(|hits| (id, hits)));
            inverter.prepare(&mut lists)
        };
        self.inverter = inverter;

        tracing::debug!(queries = count, strategy = self.inverter.name(), "inverted cached hits");
        result
    }
}

//! Per-query facet frequency tables.
//!
//! A [`FacetTable`] is kept in canonical order at all times: fields by name,
//! and within a field by descending frequency, ties broken by ascending
//! value. Duplicate values in a field are coalesced by summing frequencies,
//! so two tables built from the same counts compare equal whatever order
//! they were assembled in.

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use super::keys::facets_key;
use super::manager::CacheManager;
use crate::{Error, QueryId};

/// A facet value: a string, or a numeric `(begin, end)` range.
///
/// Values are totally ordered: all text values sort before all ranges,
/// text by string order and ranges by `(begin, end)` under IEEE total order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FacetValue {
    Text(String),
    Range(f64, f64),
}

impl Ord for FacetValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FacetValue::Text(a), FacetValue::Text(b)) => a.cmp(b),
            (FacetValue::Text(_), FacetValue::Range(..)) => Ordering::Less,
            (FacetValue::Range(..), FacetValue::Text(_)) => Ordering::Greater,
            (FacetValue::Range(a0, a1), FacetValue::Range(b0, b1)) => a0.total_cmp(b0).then(a1.total_cmp(b1)),
        }
    }
}

impl PartialOrd for FacetValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FacetValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FacetValue {}

impl From<&str> for FacetValue {
    fn from(value: &str) -> Self {
        FacetValue::Text(value.to_string())
    }
}

impl From<String> for FacetValue {
    fn from(value: String) -> Self {
        FacetValue::Text(value)
    }
}

impl From<(f64, f64)> for FacetValue {
    fn from((begin, end): (f64, f64)) -> Self {
        FacetValue::Range(begin, end)
    }
}

/// One observed value of a facet and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: FacetValue,
    pub frequency: u64,
}

/// Facet field name to canonically ordered value counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetTable {
    fields: BTreeMap<String, Vec<FacetCount>>,
}

impl FacetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the counts for one field, replacing any existing counts.
    pub fn insert(&mut self, field: impl Into<String>, counts: impl IntoIterator<Item = (FacetValue, u64)>) {
        let counts = counts.into_iter().map(|(value, frequency)| FacetCount { value, frequency }).collect();
        self.fields.insert(field.into(), canonical_counts(counts));
    }

    pub fn get(&self, field: &str) -> Option<&[FacetCount]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[FacetCount])> {
        self.fields.iter().map(|(name, counts)| (name.as_str(), counts.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge another table into this one.
    ///
    /// Fields only in `other` are copied; fields in both take the union of
    /// their values, summing the frequencies of equal values.
    pub fn merge(&mut self, other: &FacetTable) {
        for (name, counts) in &other.fields {
            match self.fields.entry(name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(counts.clone());
                }
                Entry::Occupied(mut slot) => {
                    let merged = slot.get().iter().chain(counts).cloned().collect();
                    *slot.get_mut() = canonical_counts(merged);
                }
            }
        }
    }

    /// Restore canonical order, e.g. after decoding a table written elsewhere.
    pub(crate) fn canonicalize(&mut self) {
        for counts in self.fields.values_mut() {
            *counts = canonical_counts(std::mem::take(counts));
        }
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<(FacetValue, u64)>)> for FacetTable {
    fn from_iter<I: IntoIterator<Item = (S, Vec<(FacetValue, u64)>)>>(iter: I) -> Self {
        let mut table = FacetTable::new();
        for (field, counts) in iter {
            table.insert(field, counts);
        }
        table
    }
}

/// Coalesce equal values, then order by descending frequency and ascending value.
/// Coalesced frequencies saturate at `u64::MAX`.
fn canonical_counts(mut counts: Vec<FacetCount>) -> Vec<FacetCount> {
    counts.sort_by(|a, b| a.value.cmp(&b.value));

    let mut coalesced: Vec<FacetCount> = Vec::with_capacity(counts.len());
    for count in counts {
        match coalesced.last_mut() {
            Some(last) if last.value == count.value => {
                last.frequency = last.frequency.saturating_add(count.frequency);
            }
            _ => coalesced.push(count),
        }
    }

    coalesced.sort_by(|a, b| Reverse(a.frequency).cmp(&Reverse(b.frequency)).then_with(|| a.value.cmp(&b.value)));
    coalesced
}

impl CacheManager {
    /// Get the facet table for a query, or `None` if it was never populated.
    pub fn get_facets(&self, id: QueryId) -> Result<Option<FacetTable>, Error> {
        self.load(&facets_key(id))?
            .map(|bytes| self.codec.decode_facets(&bytes))
            .transpose()
    }

    /// Replace the facet table for a query.
    pub fn set_facets(&mut self, id: QueryId, facets: &FacetTable) -> Result<(), Error> {
        let mut facets = facets.clone();
        facets.canonicalize();
        let bytes = self.codec.encode_facets(&facets)?;
        self.store(&facets_key(id), &bytes)
    }

    /// Merge `facets` into the stored table. See [`FacetTable::merge`].
    pub fn add_facets(&mut self, id: QueryId, facets: &FacetTable) -> Result<(), Error> {
        let mut current = self.get_facets(id)?.unwrap_or_default();
        current.canonicalize();
        current.merge(facets);
        self.set_facets(id, &current)
    }

    pub fn clear_facets(&mut self, id: QueryId) -> Result<(), Error> {
        self.remove_key(&facets_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn text(counts: &[(&str, u64)]) -> Vec<(FacetValue, u64)> {
        counts.iter().map(|(value, freq)| (FacetValue::from(*value), *freq)).collect()
    }

    fn order(table: &FacetTable, field: &str) -> Vec<(FacetValue, u64)> {
        table.get(field).unwrap().iter().map(|c| (c.value.clone(), c.frequency)).collect()
    }

    #[test]
    fn test_canonical_order() {
        let table: FacetTable = [("f1", text(&[("0", 7), ("3", 6), ("4", 12), ("1", 7)]))].into_iter().collect();
        assert_eq!(order(&table, "f1"), text(&[("4", 12), ("0", 7), ("1", 7), ("3", 6)]));
    }

    #[test]
    fn test_fields_sorted_by_name() {
        let table: FacetTable =
            [("zeta", text(&[("a", 1)])), ("alpha", text(&[("b", 2)])), ("mid", text(&[]))].into_iter().collect();
        let names: Vec<&str> = table.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_duplicate_values_coalesce() {
        let table: FacetTable = [("f", text(&[("x", 2), ("y", 3), ("x", 4)]))].into_iter().collect();
        assert_eq!(order(&table, "f"), text(&[("x", 6), ("y", 3)]));
    }

    #[test]
    fn test_text_sorts_before_ranges() {
        let mut table = FacetTable::new();
        table.insert("price", vec![(FacetValue::Range(10.0, 20.0), 3), (FacetValue::from("free"), 3)]);
        table.insert("size", vec![(FacetValue::Range(2.0, 3.0), 1), (FacetValue::Range(-1.0, 2.0), 1)]);

        assert_eq!(table.get("price").unwrap()[0].value, FacetValue::from("free"));
        assert_eq!(table.get("size").unwrap()[0].value, FacetValue::Range(-1.0, 2.0));
    }

    #[test]
    fn test_merge_sums_and_unions() {
        let mut a: FacetTable = [("f1", text(&[("0", 7), ("3", 6), ("4", 12)]))].into_iter().collect();
        let b: FacetTable =
            [("f1", text(&[("2", 12), ("3", 6)])), ("f2", text(&[("x", 1)]))].into_iter().collect();
        a.merge(&b);

        assert_eq!(order(&a, "f1"), text(&[("2", 12), ("3", 12), ("4", 12), ("0", 7)]));
        assert_eq!(order(&a, "f2"), text(&[("x", 1)]));
    }

    #[test]
    fn test_set_and_get() {
        let mut cache = CacheManager::new(MemoryBackend::new());
        assert!(cache.get_facets(0).unwrap().is_none());

        let table: FacetTable = [("f1", text(&[("a", 1), ("b", 5)]))].into_iter().collect();
        cache.set_facets(0, &table).unwrap();
        assert_eq!(cache.get_facets(0).unwrap(), Some(table));
    }

    #[test]
    fn test_add_to_empty_stores_verbatim() {
        let mut cache = CacheManager::new(MemoryBackend::new());
        let table: FacetTable = [("f1", text(&[("a", 1)]))].into_iter().collect();
        cache.add_facets(3, &table).unwrap();
        assert_eq!(cache.get_facets(3).unwrap(), Some(table));
    }

    #[test]
    fn test_add_is_associative() {
        let a: FacetTable = [("f1", text(&[("0", 7), ("3", 6)])), ("f2", text(&[("p", 2)]))].into_iter().collect();
        let b: FacetTable = [("f1", text(&[("3", 6), ("9", 1)])), ("f3", text(&[("q", 4)]))].into_iter().collect();

        let mut cache = CacheManager::new(MemoryBackend::new());
        cache.add_facets(0, &a).unwrap();
        cache.add_facets(0, &b).unwrap();

        let mut merged = a.clone();
        merged.merge(&b);
        cache.add_facets(1, &merged).unwrap();

        assert_eq!(cache.get_facets(0).unwrap(), cache.get_facets(1).unwrap());
    }

    #[test]
    fn test_clear() {
        let mut cache = CacheManager::new(MemoryBackend::new());
        let table: FacetTable = [("f1", text(&[("a", 1)]))].into_iter().collect();
        cache.set_facets(0, &table).unwrap();
        cache.clear_facets(0).unwrap();
        assert!(cache.get_facets(0).unwrap().is_none());
    }

    #[test]
    fn test_add_merges_ranges() {
        let mut cache = CacheManager::new(MemoryBackend::new());
        let first: FacetTable =
            [("price", vec![(FacetValue::Range(0.0, 10.0), 4), (FacetValue::Range(10.0, 20.0), 2)])]
                .into_iter()
                .collect();
        let second: FacetTable = [(
            "price",
            vec![(FacetValue::Range(10.0, 20.0), 3), (FacetValue::Range(0.0, 5.0), 4), (FacetValue::from("free"), 1)],
        )]
        .into_iter()
        .collect();

        cache.set_facets(0, &first).unwrap();
        cache.add_facets(0, &second).unwrap();

        let stored = cache.get_facets(0).unwrap().unwrap();
        assert_eq!(
            order(&stored, "price"),
            vec![
                (FacetValue::Range(10.0, 20.0), 5),
                (FacetValue::Range(0.0, 5.0), 4),
                (FacetValue::Range(0.0, 10.0), 4),
                (FacetValue::from("free"), 1),
            ]
        );
    }

    #[test]
    fn test_coalesced_frequency_saturates() {
        let table: FacetTable = [("f", text(&[("x", u64::MAX), ("x", 3)]))].into_iter().collect();
        assert_eq!(order(&table, "f"), text(&[("x", u64::MAX)]));
    }
}

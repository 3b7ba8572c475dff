//! Serialization of stored values.
//!
//! Every value the cache writes goes through a [`Codec`], with one typed
//! encode/decode pair per value kind. Both shipped codecs are serde formats:
//! [`BincodeCodec`] (compact, the default) and [`JsonCodec`] (self-describing,
//! readable from other languages).

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{FacetTable, Stats};
use crate::{DocId, Error, QueryId};

/// Typed encoding of every value kind the cache stores.
pub trait Codec: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    fn encode_int(&self, value: u64) -> Result<Vec<u8>, Error>;
    fn decode_int(&self, bytes: &[u8]) -> Result<u64, Error>;

    fn encode_docids(&self, docids: &[DocId]) -> Result<Vec<u8>, Error>;
    fn decode_docids(&self, bytes: &[u8]) -> Result<Vec<DocId>, Error>;

    /// Forward registry entry: the original query string with its id.
    fn encode_query_entry(&self, query: &str, id: QueryId) -> Result<Vec<u8>, Error>;
    fn decode_query_entry(&self, bytes: &[u8]) -> Result<(String, QueryId), Error>;

    fn encode_query_str(&self, query: &str) -> Result<Vec<u8>, Error>;
    fn decode_query_str(&self, bytes: &[u8]) -> Result<String, Error>;

    fn encode_stats(&self, stats: &Stats) -> Result<Vec<u8>, Error>;
    fn decode_stats(&self, bytes: &[u8]) -> Result<Stats, Error>;

    fn encode_facets(&self, facets: &FacetTable) -> Result<Vec<u8>, Error>;
    fn decode_facets(&self, bytes: &[u8]) -> Result<FacetTable, Error>;
}

/// A serde data format that a [`SerdeCodec`] delegates to.
pub trait Format: Send + Sync + 'static {
    const NAME: &'static str;

    fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error>;
    fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error>;
}

/// bincode 1.x with its default (fixed-width, little-endian) options.
#[derive(Debug, Clone, Copy)]
pub struct Bincode;

impl Format for Bincode {
    const NAME: &'static str = "bincode";

    fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
        Ok(bincode::serialize(value)?)
    }

    fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Json;

impl Format for Json {
    const NAME: &'static str = "json";

    fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(value)?)
    }

    fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// [`Codec`] over any serde [`Format`].
pub struct SerdeCodec<F> {
    format: PhantomData<F>,
}

pub type BincodeCodec = SerdeCodec<Bincode>;
pub type JsonCodec = SerdeCodec<Json>;

impl<F: Format> SerdeCodec<F> {
    pub fn new() -> Self {
        Self { format: PhantomData }
    }
}

impl<F: Format> Default for SerdeCodec<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Format> fmt::Debug for SerdeCodec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SerdeCodec").field(&F::NAME).finish()
    }
}

impl<F: Format> Codec for SerdeCodec<F> {
    fn name(&self) -> &'static str {
        F::NAME
    }

    fn encode_int(&self, value: u64) -> Result<Vec<u8>, Error> {
        F::to_bytes(&value)
    }

    fn decode_int(&self, bytes: &[u8]) -> Result<u64, Error> {
        F::from_bytes(bytes)
    }

    fn encode_docids(&self, docids: &[DocId]) -> Result<Vec<u8>, Error> {
        F::to_bytes(docids)
    }

    fn decode_docids(&self, bytes: &[u8]) -> Result<Vec<DocId>, Error> {
        F::from_bytes(bytes)
    }

    fn encode_query_entry(&self, query: &str, id: QueryId) -> Result<Vec<u8>, Error> {
        F::to_bytes(&(query, id))
    }

    fn decode_query_entry(&self, bytes: &[u8]) -> Result<(String, QueryId), Error> {
        F::from_bytes(bytes)
    }

    fn encode_query_str(&self, query: &str) -> Result<Vec<u8>, Error> {
        F::to_bytes(query)
    }

    fn decode_query_str(&self, bytes: &[u8]) -> Result<String, Error> {
        F::from_bytes(bytes)
    }

    fn encode_stats(&self, stats: &Stats) -> Result<Vec<u8>, Error> {
        F::to_bytes(stats)
    }

    fn decode_stats(&self, bytes: &[u8]) -> Result<Stats, Error> {
        F::from_bytes(bytes)
    }

    fn encode_facets(&self, facets: &FacetTable) -> Result<Vec<u8>, Error> {
        F::to_bytes(facets)
    }

    fn decode_facets(&self, bytes: &[u8]) -> Result<FacetTable, Error> {
        F::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FacetValue;

    fn sample_facets() -> FacetTable {
        let mut facets = FacetTable::new();
        facets.insert("colour", vec![(FacetValue::from("red"), 4), (FacetValue::from("blue"), 2)]);
        facets.insert("price", vec![(FacetValue::Range(0.0, 9.5), 7)]);
        facets
    }

    #[test]
    fn test_empty_docids_encode_to_non_empty_bytes() {
        // Empty values read back as absent, so an empty chunk must not encode to nothing.
        assert!(!BincodeCodec::new().encode_docids(&[]).unwrap().is_empty());
        assert!(!JsonCodec::new().encode_docids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_bincode_values() {
        let codec = BincodeCodec::new();
        assert_eq!(codec.decode_int(&codec.encode_int(42).unwrap()).unwrap(), 42);

        let entry = codec.encode_query_entry("hello world", 7).unwrap();
        assert_eq!(codec.decode_query_entry(&entry).unwrap(), ("hello world".to_string(), 7));

        let stats = Stats { lower: Some(1), upper: None, estimate: Some(-3) };
        assert_eq!(codec.decode_stats(&codec.encode_stats(&stats).unwrap()).unwrap(), stats);
    }

    #[test]
    fn test_json_is_readable() {
        let codec = JsonCodec::new();
        let bytes = codec.encode_docids(&[120, 110, 100]).unwrap();
        assert_eq!(bytes, b"[120,110,100]");

        let facets = sample_facets();
        let decoded = codec.decode_facets(&codec.encode_facets(&facets).unwrap()).unwrap();
        assert_eq!(decoded, facets);
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let codec = BincodeCodec::new();
        assert!(matches!(codec.decode_stats(b"\x01"), Err(Error::Codec(_))));
        assert!(matches!(JsonCodec::new().decode_int(b"{"), Err(Error::Codec(_))));
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(BincodeCodec::new().name(), "bincode");
        assert_eq!(format!("{:?}", JsonCodec::new()), "SerdeCodec(\"json\")");
    }
}

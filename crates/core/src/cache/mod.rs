//! Result cache over a generic key-value backend.
//!
//! This module stores precomputed search results per query id. It supports:
//!
//! - Dense query ids allocated per distinct query string (SHA-256 keyed)
//! - Ranked hit lists split into fixed-size chunks with random access
//! - Hit removal from approximate rank hints
//! - Per-query match statistics and facet frequency tables
//! - Inversion of every cached list into a per-document view
//!
//! Key layout, one ASCII prefix per value kind:
//!
//! | Prefix | Suffix | Value |
//! |---|---|---|
//! | `I` | | next query id to allocate |
//! | `C` | | chunk size the hit lists were written with |
//! | `Q` | hex SHA-256 of the query string | (query string, query id) |
//! | `S` | query id | query string |
//! | `H` | `queryid:chunk` | chunk of document ids |
//! | `T` | query id | [`Stats`] |
//! | `F` | query id | [`FacetTable`] |

pub mod facets;
pub mod hash;
pub mod hits;
pub mod invert;
pub mod keys;
pub mod manager;
pub mod registry;
pub mod remove;
pub mod stats;
pub mod verify;

pub use facets::{FacetCount, FacetTable, FacetValue};
pub use invert::{InMemoryInverter, Inverter, Posting, SortedRunInverter};
pub use manager::{CacheManager, CacheOptions};
pub use stats::Stats;
pub use verify::VerifyReport;

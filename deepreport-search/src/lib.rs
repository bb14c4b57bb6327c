//! DeepReport Search - search backends and evidence aggregation
//!
//! Every backend answers an ordered list of queries with one result set per query.
//! Failures never escape a search call: they come back as degraded result entries.
//! The aggregator turns the accumulated result sets of a section into a bounded
//! textual evidence bundle.

pub mod aggregator;
pub mod providers;

pub use aggregator::*;
pub use providers::*;

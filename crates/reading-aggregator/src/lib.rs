//! Reading Aggregation
//!
//! Collects readings from every registered data source for one evaluation
//! cycle, normalizes metric names and units, drops implausible and stale
//! readings, and produces a single ordered snapshot.

mod aggregator;
mod error;
mod normalizer;
mod validator;

pub use aggregator::{AggregatorConfig, DataSource, ReadingAggregator};
pub use error::{ConfigError, SourceError, ValidationError};
pub use normalizer::Normalizer;
pub use validator::{PlausibilityConfig, Validator};

//! RebaseLab Core: price series, percent-change rebasing, providers, CSV cache.
//!
//! This crate contains the reusable time-series pieces of RebaseLab:
//! - Price series with the sorted / unique / positive invariant
//! - Direct-ratio rebasing to a 0% baseline at the first observation
//! - Multi-symbol alignment into one complete combined table
//! - Data provider trait, Yahoo Finance provider and circuit breaker
//! - Flat per-symbol CSV cache keyed by (symbol, start, end)

pub mod data;
pub mod normalize;
pub mod series;

pub use normalize::{AlignPolicy, CombinedTable, NormalizeError, TableColumn};
pub use series::{PercentChangeSeries, PriceColumn, PricePoint, PriceSeries, SeriesError};

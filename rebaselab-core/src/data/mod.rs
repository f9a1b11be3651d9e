//! Price providers, circuit breaker, calendar and the per-symbol CSV cache.

pub mod cache;
pub mod calendar;
pub mod circuit_breaker;
pub mod provider;
pub mod synthetic;
pub mod yahoo;

pub use cache::{decode_symbol, encode_symbol, CacheEntry, CacheKey, CsvCache};
pub use calendar::{in_window, local_date, lookback_window};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use provider::{
    DataError, DataProvider, DataSource, DownloadProgress, FetchResult, RawBar, StdoutProgress,
};
pub use synthetic::SyntheticProvider;
pub use yahoo::{RetryPolicy, YahooProvider};

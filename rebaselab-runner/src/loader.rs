//! Fetch-and-cache orchestration.
//!
//! For each requested symbol, in request order:
//! 1. Cache file for `(symbol, start, end)` present and valid → use it
//! 2. Offline → exclude the symbol
//! 3. Fetch from the provider, keep `[start, end)`, write the cache file
//!    (synthetic data is never cached)
//!
//! Symbols that fail are excluded and reported by name; only a batch where
//! every symbol failed is an error.

use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use rebaselab_core::data::{
    in_window, CacheKey, CsvCache, DataError, DataProvider, DataSource, DownloadProgress, RawBar,
};
use rebaselab_core::PriceSeries;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Refetch and replace cache entries.
    pub force: bool,
    /// Never touch the network; cache misses become exclusions.
    pub offline: bool,
    /// Fetch symbols concurrently on the rayon pool.
    pub parallel: bool,
}

/// A symbol left out of the outcome, with the reason.
#[derive(Debug, Clone)]
pub struct Exclusion {
    pub symbol: String,
    pub error: DataError,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.symbol, self.error)
    }
}

#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub symbol: String,
    pub series: PriceSeries,
    pub source: DataSource,
}

/// Resolved series in request order plus the excluded symbols.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub loaded: Vec<LoadedSeries>,
    pub excluded: Vec<Exclusion>,
}

impl FetchOutcome {
    pub fn get(&self, symbol: &str) -> Option<&LoadedSeries> {
        self.loaded.iter().find(|l| l.symbol == symbol)
    }

    pub fn excluded_symbols(&self) -> Vec<&str> {
        self.excluded.iter().map(|e| e.symbol.as_str()).collect()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no symbols requested")]
    NoSymbols,

    #[error("invalid date window: start {start} is not before end {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("No data retrieved. ({})", summarize(.excluded))]
    NoData { excluded: Vec<Exclusion> },
}

fn summarize(excluded: &[Exclusion]) -> String {
    excluded
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resolve every symbol from cache or provider.
///
/// Duplicate symbols are collapsed, keeping the first occurrence.
pub fn fetch_series(
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
    cache: &CsvCache,
    provider: &dyn DataProvider,
    progress: Option<&dyn DownloadProgress>,
    opts: &FetchOptions,
) -> Result<FetchOutcome, LoadError> {
    if start >= end {
        return Err(LoadError::InvalidWindow { start, end });
    }

    let mut unique: Vec<&str> = Vec::with_capacity(symbols.len());
    for s in symbols {
        if !unique.contains(&s.as_str()) {
            unique.push(s);
        }
    }
    if unique.is_empty() {
        return Err(LoadError::NoSymbols);
    }

    let total = unique.len();
    let resolve = |(i, symbol): (usize, &&str)| {
        if let Some(p) = progress {
            p.on_start(symbol, i, total);
        }
        let result = resolve_one(symbol, start, end, cache, provider, opts);
        if let Some(p) = progress {
            let status = result.as_ref().map(|(_, source)| *source).map_err(Clone::clone);
            p.on_complete(symbol, i, total, &status);
        }
        result
    };

    // `collect` on an indexed parallel iterator keeps request order.
    let results: Vec<Result<(PriceSeries, DataSource), DataError>> = if opts.parallel {
        unique.par_iter().enumerate().map(resolve).collect()
    } else {
        unique.iter().enumerate().map(resolve).collect()
    };

    let mut loaded = Vec::new();
    let mut excluded = Vec::new();
    for (symbol, result) in unique.iter().zip(results) {
        match result {
            Ok((series, source)) => loaded.push(LoadedSeries {
                symbol: symbol.to_string(),
                series,
                source,
            }),
            Err(error) => {
                tracing::warn!(symbol, %error, "excluding symbol");
                excluded.push(Exclusion {
                    symbol: symbol.to_string(),
                    error,
                });
            }
        }
    }

    if let Some(p) = progress {
        p.on_batch_complete(loaded.len(), excluded.len(), total);
    }

    if loaded.is_empty() {
        return Err(LoadError::NoData { excluded });
    }
    Ok(FetchOutcome { loaded, excluded })
}

fn resolve_one(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    cache: &CsvCache,
    provider: &dyn DataProvider,
    opts: &FetchOptions,
) -> Result<(PriceSeries, DataSource), DataError> {
    let key = CacheKey::new(symbol, start, end);

    if !opts.force && cache.contains(&key) {
        match cache.load(&key) {
            Ok(series) => {
                tracing::info!(symbol, rows = series.len(), "cache hit");
                return Ok((series, DataSource::Cache));
            }
            Err(e) => tracing::warn!(symbol, error = %e, "cache entry unusable, refetching"),
        }
    }

    if opts.offline {
        return Err(DataError::NotCached {
            symbol: symbol.to_string(),
        });
    }
    if !provider.is_available() {
        return Err(DataError::CircuitOpen);
    }

    let fetched = provider.fetch(symbol, start, end)?;
    let bars: Vec<RawBar> = fetched
        .bars
        .into_iter()
        .filter(|b| in_window(b.date, start, end))
        .collect();
    if bars.is_empty() {
        return Err(DataError::NoData {
            symbol: symbol.to_string(),
        });
    }

    let series = PriceSeries::from_raw_bars(symbol, &bars)?;
    tracing::info!(
        symbol,
        rows = series.len(),
        column = series.column().label(),
        source = %fetched.source,
        "fetched series"
    );

    if fetched.source != DataSource::Synthetic {
        // A failed write costs a refetch next time, not this load.
        if let Err(e) = cache.write(&key, &series) {
            tracing::warn!(symbol, error = %e, "failed to cache series");
        }
    }

    Ok((series, fetched.source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebaselab_core::data::{FetchResult, SyntheticProvider};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> std::path::PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir =
            std::env::temp_dir().join(format!("rebaselab_loader_test_{}_{id}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Synthetic bars under the Yahoo tag so they get cached; "BAD" is unknown.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl DataProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<FetchResult, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if symbol == "BAD" {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.into(),
                });
            }
            Ok(FetchResult {
                symbol: symbol.into(),
                bars: SyntheticProvider::generate(symbol, start, end),
                source: DataSource::Yahoo,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn syms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn second_call_is_served_from_cache() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);
        let provider = CountingProvider::default();
        let opts = FetchOptions::default();

        let first = fetch_series(&syms(&["SPY"]), d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &opts).unwrap();
        assert_eq!(first.loaded[0].source, DataSource::Yahoo);

        let second = fetch_series(&syms(&["SPY"]), d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &opts).unwrap();
        assert_eq!(second.loaded[0].source, DataSource::Cache);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.loaded[0].series.points(), second.loaded[0].series.points());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn lookalike_symbols_do_not_share_a_cache_file() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);
        let provider = CountingProvider::default();
        let opts = FetchOptions::default();

        let underscore = fetch_series(&syms(&["BRK_B"]), d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &opts).unwrap();
        let slash = fetch_series(&syms(&["BRK/B"]), d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &opts).unwrap();

        assert_eq!(slash.loaded[0].source, DataSource::Yahoo);
        assert_ne!(underscore.loaded[0].series.points(), slash.loaded[0].series.points());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.entries().unwrap().len(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn force_refetches() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);
        let provider = CountingProvider::default();
        let force = FetchOptions {
            force: true,
            ..FetchOptions::default()
        };

        for _ in 0..2 {
            fetch_series(&syms(&["SPY"]), d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &force).unwrap();
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.entries().unwrap().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_failure_excludes_by_name() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);
        let provider = CountingProvider::default();

        let outcome = fetch_series(
            &syms(&["AAPL", "BAD", "^GSPC"]),
            d(2024, 1, 1),
            d(2024, 3, 1),
            &cache,
            &provider,
            None,
            &FetchOptions::default(),
        )
        .unwrap();

        let loaded: Vec<&str> = outcome.loaded.iter().map(|l| l.symbol.as_str()).collect();
        assert_eq!(loaded, vec!["AAPL", "^GSPC"]);
        assert_eq!(outcome.excluded_symbols(), vec!["BAD"]);
        assert!(matches!(outcome.excluded[0].error, DataError::SymbolNotFound { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn all_failed_is_no_data() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);
        let provider = CountingProvider::default();

        let err = fetch_series(&syms(&["BAD"]), d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &FetchOptions::default())
            .unwrap_err();
        match err {
            LoadError::NoData { excluded } => assert_eq!(excluded.len(), 1),
            other => panic!("expected NoData, got {other}"),
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn offline_miss_is_excluded_without_network() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);
        let provider = CountingProvider::default();
        let offline = FetchOptions {
            offline: true,
            ..FetchOptions::default()
        };

        let err = fetch_series(&syms(&["SPY"]), d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &offline).unwrap_err();
        assert!(err.to_string().contains("No data retrieved"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn synthetic_results_are_not_cached() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);

        let outcome = fetch_series(
            &syms(&["FAKE"]),
            d(2024, 1, 1),
            d(2024, 3, 1),
            &cache,
            &SyntheticProvider::new(),
            None,
            &FetchOptions::default(),
        )
        .unwrap();

        assert_eq!(outcome.loaded[0].source, DataSource::Synthetic);
        assert!(cache.entries().unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parallel_keeps_request_order() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);
        let provider = CountingProvider::default();
        let parallel = FetchOptions {
            parallel: true,
            ..FetchOptions::default()
        };
        let requested = syms(&["MSFT", "AAPL", "GOOG", "AMZN", "NVDA", "^GSPC"]);

        let outcome = fetch_series(&requested, d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &parallel).unwrap();
        let loaded: Vec<String> = outcome.loaded.iter().map(|l| l.symbol.clone()).collect();
        assert_eq!(loaded, requested);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn duplicates_are_collapsed() {
        let dir = temp_cache_dir();
        let cache = CsvCache::new(&dir);
        let provider = CountingProvider::default();

        let outcome = fetch_series(&syms(&["SPY", "SPY"]), d(2024, 1, 1), d(2024, 3, 1), &cache, &provider, None, &FetchOptions::default()).unwrap();
        assert_eq!(outcome.loaded.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn inverted_window_rejected() {
        let cache = CsvCache::new(temp_cache_dir());
        let err = fetch_series(&syms(&["SPY"]), d(2024, 3, 1), d(2024, 1, 1), &cache, &SyntheticProvider::new(), None, &FetchOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidWindow { .. }));
    }
}

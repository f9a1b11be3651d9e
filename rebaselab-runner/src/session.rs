//! Dashboard session: the tracked ticker list and the load cycle.
//!
//! The session owns only the ticker list. Loading reads it, runs
//! fetch-and-cache plus normalization, and hands back a [`LoadState`] the
//! caller renders. Nothing here touches the terminal.

use chrono::NaiveDate;
use rebaselab_core::data::{CsvCache, DataProvider, DataSource, DownloadProgress};
use rebaselab_core::{AlignPolicy, CombinedTable, NormalizeError};
use serde::Serialize;
use thiserror::Error;

use crate::config::BenchmarkConfig;
use crate::loader::{fetch_series, Exclusion, FetchOptions, LoadError};

/// Shown when loading with an empty ticker list.
pub const NO_TICKERS_MESSAGE: &str = "Add at least one ticker, then load.";

/// Result of [`Session::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Input was blank after trimming; nothing changed.
    Ignored,
    Added(Vec<String>),
    /// Every entry was already tracked; nothing changed.
    Duplicate(Vec<String>),
    /// Some entries were new, some already tracked.
    Partial {
        added: Vec<String>,
        duplicates: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    tickers: Vec<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Add comma-separated tickers. Entries are trimmed and upper-cased.
    pub fn add(&mut self, input: &str) -> AddOutcome {
        let mut added = Vec::new();
        let mut duplicates = Vec::new();

        for entry in input.split(',') {
            let symbol = entry.trim().to_uppercase();
            if symbol.is_empty() {
                continue;
            }
            if self.tickers.contains(&symbol) {
                if !duplicates.contains(&symbol) {
                    duplicates.push(symbol);
                }
            } else {
                self.tickers.push(symbol.clone());
                added.push(symbol);
            }
        }

        match (added.is_empty(), duplicates.is_empty()) {
            (true, true) => AddOutcome::Ignored,
            (false, true) => AddOutcome::Added(added),
            (true, false) => AddOutcome::Duplicate(duplicates),
            (false, false) => AddOutcome::Partial { added, duplicates },
        }
    }

    pub fn clear(&mut self) {
        self.tickers.clear();
    }

    /// Run one load cycle over the tracked tickers.
    pub fn load(&self, ctx: &LoadContext<'_>) -> LoadState {
        if self.tickers.is_empty() {
            return LoadState::NoTickers;
        }
        match build_dashboard(&self.tickers, ctx) {
            Ok(dashboard) => LoadState::Ready(dashboard),
            Err(e) => {
                tracing::error!(error = %e, "load failed");
                LoadState::Failed(e.to_string())
            }
        }
    }
}

/// Everything a load cycle needs besides the ticker list.
pub struct LoadContext<'a> {
    pub cache: &'a CsvCache,
    pub provider: &'a dyn DataProvider,
    pub progress: Option<&'a dyn DownloadProgress>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub benchmark: &'a BenchmarkConfig,
    pub align: AlignPolicy,
    pub options: FetchOptions,
}

#[derive(Debug, Clone)]
pub enum LoadState {
    NoTickers,
    Ready(Dashboard),
    Failed(String),
}

/// Where one table column came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub label: String,
    pub symbol: String,
    pub source: DataSource,
}

/// A loaded, rebased table ready to render or export.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub table: CombinedTable,
    pub excluded: Vec<Exclusion>,
    pub provenance: Vec<Provenance>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub align: AlignPolicy,
}

impl Dashboard {
    pub fn excluded_symbols(&self) -> Vec<&str> {
        self.excluded.iter().map(|e| e.symbol.as_str()).collect()
    }

    pub fn source_of(&self, label: &str) -> Option<DataSource> {
        self.provenance.iter().find(|p| p.label == label).map(|p| p.source)
    }
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Fetch `tickers` plus the benchmark, then align and rebase.
///
/// The benchmark, when it loads, is the last column and carries its display label.
/// A ticker equal to the benchmark symbol is folded into the benchmark column.
pub fn build_dashboard(tickers: &[String], ctx: &LoadContext<'_>) -> Result<Dashboard, DashboardError> {
    let benchmark = &ctx.benchmark.symbol;
    let mut symbols: Vec<String> = tickers.iter().filter(|t| *t != benchmark).cloned().collect();
    symbols.push(benchmark.clone());

    let outcome = fetch_series(
        &symbols,
        ctx.start,
        ctx.end,
        ctx.cache,
        ctx.provider,
        ctx.progress,
        &ctx.options,
    )?;

    let label_for = |symbol: &str| -> String {
        if symbol == benchmark.as_str() {
            ctx.benchmark.label.clone()
        } else {
            symbol.to_string()
        }
    };

    let labeled: Vec<(String, &rebaselab_core::PriceSeries)> = outcome
        .loaded
        .iter()
        .map(|l| (label_for(&l.symbol), &l.series))
        .collect();
    let table = CombinedTable::build(labeled.iter().map(|(label, s)| (label.as_str(), *s)), ctx.align)?;

    let provenance = outcome
        .loaded
        .iter()
        .map(|l| Provenance {
            label: label_for(&l.symbol),
            symbol: l.symbol.clone(),
            source: l.source,
        })
        .collect();

    tracing::info!(
        columns = table.column_count(),
        rows = table.row_count(),
        excluded = outcome.excluded.len(),
        hash = %table.content_hash(),
        "dashboard ready"
    );

    Ok(Dashboard {
        table,
        excluded: outcome.excluded,
        provenance,
        start: ctx.start,
        end: ctx.end,
        align: ctx.align,
    })
}

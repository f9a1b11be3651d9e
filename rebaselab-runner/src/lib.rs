//! RebaseLab Runner: fetch-and-cache orchestration, session state, config, export.
//!
//! This crate builds on `rebaselab-core` to provide:
//! - Per-symbol loading from the CSV cache with provider fallback
//! - The dashboard session (tracked tickers, load cycle, benchmark column)
//! - TOML configuration
//! - Combined-table CSV and JSON export

pub mod config;
pub mod export;
pub mod loader;
pub mod session;

pub use config::{BenchmarkConfig, ConfigError, ProviderConfig, RebaseConfig};
pub use export::{dashboard_to_json, table_to_csv, write_table_csv, DEFAULT_EXPORT_FILE};
pub use loader::{fetch_series, Exclusion, FetchOptions, FetchOutcome, LoadError, LoadedSeries};
pub use session::{
    build_dashboard, AddOutcome, Dashboard, DashboardError, LoadContext, LoadState, Provenance,
    Session, NO_TICKERS_MESSAGE,
};

//! Application state: single-owner, main-thread only.
//!
//! Loads run inline on the main thread. A load request is queued by the
//! input handler and executed by the event loop after the next redraw, so the
//! "Loading..." status is on screen while the network is busy.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};

use rebaselab_core::data::{CacheKey, CsvCache, DataError, DataProvider};
use rebaselab_runner::{
    write_table_csv, AddOutcome, Dashboard, FetchOptions, LoadContext, LoadState, RebaseConfig,
    Session, NO_TICKERS_MESSAGE,
};

/// Maximum number of records kept in the error history.
pub const ERROR_HISTORY_CAP: usize = 50;

/// Which panel is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Tickers,
    Chart,
    Help,
}

impl Panel {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        match self {
            Panel::Tickers => 0,
            Panel::Chart => 1,
            Panel::Help => 2,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(Panel::Tickers),
            1 => Some(Panel::Chart),
            2 => Some(Panel::Help),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Panel::Tickers => "Tickers",
            Panel::Chart => "Chart",
            Panel::Help => "Help",
        }
    }

    pub fn next(self) -> Panel {
        match self {
            Panel::Tickers => Panel::Chart,
            Panel::Chart => Panel::Help,
            Panel::Help => Panel::Tickers,
        }
    }

    pub fn prev(self) -> Panel {
        match self {
            Panel::Tickers => Panel::Help,
            Panel::Chart => Panel::Tickers,
            Panel::Help => Panel::Chart,
        }
    }
}

/// What the Tickers panel entry line edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    Ticker,
    /// The cache and output directory.
    Directory,
}

impl EntryMode {
    pub fn label(self) -> &'static str {
        match self {
            EntryMode::Ticker => "Ticker",
            EntryMode::Directory => "Directory",
        }
    }
}

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Error category for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Export,
    Other,
}

impl ErrorCategory {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::Network => "NET",
            ErrorCategory::Data => "DATA",
            ErrorCategory::Export => "EXP",
            ErrorCategory::Other => "ERR",
        }
    }

    /// Bucket a provider or cache error.
    pub fn of(error: &DataError) -> Self {
        match error {
            DataError::NetworkUnreachable(_)
            | DataError::RateLimited { .. }
            | DataError::ServerError { .. }
            | DataError::AuthenticationRequired(_)
            | DataError::CircuitOpen => ErrorCategory::Network,
            DataError::ResponseFormatChanged(_)
            | DataError::SymbolNotFound { .. }
            | DataError::NoData { .. }
            | DataError::NotCached { .. }
            | DataError::Cache(_)
            | DataError::Series(_) => ErrorCategory::Data,
        }
    }
}

/// An error record for the error history overlay.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub category: ErrorCategory,
    pub message: String,
    pub context: String,
}

/// Which overlay (if any) is shown on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    Welcome,
    ErrorHistory,
}

/// Top-level application state.
pub struct AppState {
    // Navigation
    pub active_panel: Panel,
    pub running: bool,
    pub overlay: Overlay,

    // Ticker entry
    pub session: Session,
    pub input: String,
    pub entry_mode: EntryMode,
    pub cache_status: HashMap<String, bool>,

    // Last completed load
    pub dashboard: Option<Dashboard>,
    pub load_pending: bool,

    // Cross-cutting
    pub status_message: Option<(String, StatusLevel)>,
    pub error_history: VecDeque<ErrorRecord>,
    pub error_scroll: usize,

    pub config: RebaseConfig,
    pub cache: CsvCache,
    pub provider: Box<dyn DataProvider>,
    /// End of the lookback window (exclusive).
    pub today: NaiveDate,
}

impl AppState {
    pub fn new(config: RebaseConfig, provider: Box<dyn DataProvider>, today: NaiveDate) -> Self {
        let cache = CsvCache::new(&config.cache_dir);
        Self {
            active_panel: Panel::Tickers,
            running: true,
            overlay: Overlay::Welcome,
            session: Session::new(),
            input: String::new(),
            entry_mode: EntryMode::Ticker,
            cache_status: HashMap::new(),
            dashboard: None,
            load_pending: false,
            status_message: Some((NO_TICKERS_MESSAGE.to_string(), StatusLevel::Info)),
            error_history: VecDeque::with_capacity(ERROR_HISTORY_CAP),
            error_scroll: 0,
            config,
            cache,
            provider,
            today,
        }
    }

    /// The `[start, end)` window every load uses.
    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        self.config.window(self.today)
    }

    /// Switch the entry line between tickers and the directory.
    ///
    /// Directory mode starts with the current directory so it can be edited in place.
    pub fn toggle_entry_mode(&mut self) {
        self.entry_mode = match self.entry_mode {
            EntryMode::Ticker => {
                self.input = self.config.cache_dir.display().to_string();
                EntryMode::Directory
            }
            EntryMode::Directory => {
                self.input.clear();
                EntryMode::Ticker
            }
        };
    }

    /// Submit the entry line according to the current entry mode.
    pub fn submit_input(&mut self) {
        match self.entry_mode {
            EntryMode::Ticker => self.submit_tickers(),
            EntryMode::Directory => {
                let input = std::mem::take(&mut self.input);
                self.entry_mode = EntryMode::Ticker;
                let trimmed = input.trim();
                if !trimmed.is_empty() {
                    self.set_cache_dir(PathBuf::from(trimmed));
                }
            }
        }
    }

    /// Point the cache and the CSV export at `dir`.
    pub fn set_cache_dir(&mut self, dir: PathBuf) {
        if dir == self.config.cache_dir {
            return;
        }
        tracing::info!(from = %self.config.cache_dir.display(), to = %dir.display(), "cache dir changed");
        self.cache = CsvCache::new(&dir);
        self.config.cache_dir = dir;
        self.refresh_cache_status();
        self.set_status(format!("Cache and export directory: {}", self.config.cache_dir.display()));
    }

    /// Add the entry line to the tracked list and clear it.
    fn submit_tickers(&mut self) {
        let input = std::mem::take(&mut self.input);
        match self.session.add(&input) {
            AddOutcome::Ignored => {}
            AddOutcome::Added(added) => {
                self.set_status(format!("Added {}", added.join(", ")));
            }
            AddOutcome::Duplicate(dups) => {
                self.set_warning(format!("Already in list: {}", dups.join(", ")));
            }
            AddOutcome::Partial { added, duplicates } => {
                self.set_warning(format!(
                    "Added {}; already in list: {}",
                    added.join(", "),
                    duplicates.join(", ")
                ));
            }
        }
        self.refresh_cache_status();
    }

    /// Empty the tracked list and drop the chart.
    pub fn clear(&mut self) {
        self.session.clear();
        self.dashboard = None;
        self.cache_status.clear();
        self.set_status(NO_TICKERS_MESSAGE);
    }

    /// Queue a load for the event loop. Returns false when there is nothing to load.
    pub fn request_load(&mut self) -> bool {
        if self.session.is_empty() {
            self.dashboard = None;
            self.set_status(NO_TICKERS_MESSAGE);
            return false;
        }
        self.load_pending = true;
        self.set_status(format!(
            "Loading {} ticker(s) plus {}...",
            self.session.tickers().len(),
            self.config.benchmark.label
        ));
        true
    }

    /// Run a queued load, if any.
    pub fn run_pending_load(&mut self) {
        if std::mem::take(&mut self.load_pending) {
            self.load();
        }
    }

    /// Run one load cycle now and apply its result.
    pub fn load(&mut self) {
        let (start, end) = self.window();
        let ctx = LoadContext {
            cache: &self.cache,
            provider: self.provider.as_ref(),
            progress: None,
            start,
            end,
            benchmark: &self.config.benchmark,
            align: self.config.align,
            options: FetchOptions {
                parallel: self.config.parallel,
                ..FetchOptions::default()
            },
        };
        let state = self.session.load(&ctx);
        self.apply_load(state);
        self.refresh_cache_status();
    }

    fn apply_load(&mut self, state: LoadState) {
        match state {
            LoadState::NoTickers => {
                self.dashboard = None;
                self.set_status(NO_TICKERS_MESSAGE);
            }
            LoadState::Failed(message) => {
                self.dashboard = None;
                self.push_error(ErrorCategory::Data, message, "load".into());
            }
            LoadState::Ready(dashboard) => {
                for exclusion in &dashboard.excluded {
                    self.push_error(
                        ErrorCategory::of(&exclusion.error),
                        exclusion.error.to_string(),
                        format!("excluded {}", exclusion.symbol),
                    );
                }
                let table = &dashboard.table;
                let summary = format!(
                    "Loaded {} columns, {} days ({} to {})",
                    table.column_count(),
                    table.row_count(),
                    table.first_date(),
                    table.last_date()
                );
                if dashboard.excluded.is_empty() {
                    self.set_status(summary);
                } else {
                    self.set_warning(format!(
                        "{summary}; excluded: {}",
                        dashboard.excluded_symbols().join(", ")
                    ));
                }
                self.dashboard = Some(dashboard);
            }
        }
    }

    /// Write the current table to the configured export file.
    pub fn export(&mut self) {
        let Some(dashboard) = &self.dashboard else {
            self.set_warning("Nothing to export yet: load first.");
            return;
        };
        let path = self.config.export_path();
        match write_table_csv(&dashboard.table, &path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "exported table");
                self.set_status(format!("Exported {}", path.display()));
            }
            Err(e) => {
                self.push_error(ErrorCategory::Export, format!("{e:#}"), path.display().to_string());
            }
        }
    }

    /// Recompute which tracked tickers have a cache file for the current window.
    pub fn refresh_cache_status(&mut self) {
        let (start, end) = self.window();
        self.cache_status = self
            .session
            .tickers()
            .iter()
            .map(|t| (t.clone(), self.cache.contains(&CacheKey::new(t.as_str(), start, end))))
            .collect();
    }

    /// Push an error to the history, capping at [`ERROR_HISTORY_CAP`].
    pub fn push_error(&mut self, category: ErrorCategory, message: String, context: String) {
        tracing::warn!(category = category.label(), %context, "{message}");
        let record = ErrorRecord {
            timestamp: chrono::Local::now().naive_local(),
            category,
            message: message.clone(),
            context,
        };
        self.error_history.push_front(record);
        self.error_history.truncate(ERROR_HISTORY_CAP);
        self.status_message = Some((message, StatusLevel::Error));
    }

    /// Set an info status message.
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    /// Set a warning status message.
    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebaselab_core::data::SyntheticProvider;

    fn app() -> AppState {
        let config = RebaseConfig {
            cache_dir: std::env::temp_dir().join("rebaselab_app_unit"),
            ..RebaseConfig::default()
        };
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        AppState::new(config, Box::new(SyntheticProvider::new()), today)
    }

    #[test]
    fn panel_cycle() {
        assert_eq!(Panel::Tickers.next(), Panel::Chart);
        assert_eq!(Panel::Help.next(), Panel::Tickers);
        assert_eq!(Panel::Tickers.prev(), Panel::Help);
        assert_eq!(Panel::Chart.prev(), Panel::Tickers);
    }

    #[test]
    fn panel_from_index() {
        for i in 0..Panel::COUNT {
            let p = Panel::from_index(i).unwrap();
            assert_eq!(p.index(), i);
        }
        assert!(Panel::from_index(Panel::COUNT).is_none());
    }

    #[test]
    fn error_history_caps_at_50() {
        let mut app = app();
        for i in 0..60 {
            app.push_error(ErrorCategory::Other, format!("error {i}"), String::new());
        }
        assert_eq!(app.error_history.len(), ERROR_HISTORY_CAP);
        assert!(app.error_history[0].message.contains("59"));
        assert_eq!(app.status_message.as_ref().unwrap().1, StatusLevel::Error);
    }

    #[test]
    fn duplicate_submit_warns() {
        let mut app = app();
        app.input = "aapl".into();
        app.submit_input();
        assert!(app.input.is_empty());
        assert_eq!(app.status_message.as_ref().unwrap().1, StatusLevel::Info);

        app.input = "AAPL".into();
        app.submit_input();
        assert_eq!(app.session.tickers().len(), 1);
        let (msg, level) = app.status_message.clone().unwrap();
        assert_eq!(level, StatusLevel::Warning);
        assert!(msg.contains("AAPL"));
    }

    #[test]
    fn load_request_without_tickers_is_informational() {
        let mut app = app();
        assert!(!app.request_load());
        assert!(!app.load_pending);
        assert_eq!(
            app.status_message,
            Some((NO_TICKERS_MESSAGE.to_string(), StatusLevel::Info))
        );
    }

    #[test]
    fn directory_entry_rebuilds_cache() {
        let mut app = app();
        app.input = "aapl".into();
        app.submit_input();

        app.toggle_entry_mode();
        assert_eq!(app.entry_mode, EntryMode::Directory);
        assert_eq!(app.input, app.config.cache_dir.display().to_string());

        let target = std::env::temp_dir().join("rebaselab_app_unit_moved");
        app.input = format!("  {}  ", target.display());
        app.submit_input();

        assert_eq!(app.entry_mode, EntryMode::Ticker);
        assert!(app.input.is_empty());
        assert_eq!(app.config.cache_dir, target);
        assert_eq!(app.cache.cache_dir(), target.as_path());
        assert_eq!(app.config.export_path(), target.join("percent_change_10yr.csv"));
        assert_eq!(app.session.tickers(), &["AAPL".to_string()]);
        assert!(app.status_message.as_ref().unwrap().0.contains("rebaselab_app_unit_moved"));
    }

    #[test]
    fn blank_directory_entry_keeps_cache() {
        let mut app = app();
        let before = app.config.cache_dir.clone();
        app.toggle_entry_mode();
        app.input = "   ".into();
        app.submit_input();
        assert_eq!(app.entry_mode, EntryMode::Ticker);
        assert_eq!(app.config.cache_dir, before);
        assert_eq!(app.cache.cache_dir(), before.as_path());
    }

    #[test]
    fn export_without_dashboard_warns() {
        let mut app = app();
        app.export();
        assert_eq!(app.status_message.as_ref().unwrap().1, StatusLevel::Warning);
    }

    #[test]
    fn categorizes_data_errors() {
        assert_eq!(ErrorCategory::of(&DataError::CircuitOpen), ErrorCategory::Network);
        assert_eq!(
            ErrorCategory::of(&DataError::SymbolNotFound { symbol: "X".into() }),
            ErrorCategory::Data
        );
    }
}

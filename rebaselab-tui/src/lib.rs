//! RebaseLab TUI: ticker entry, load cycle, percent-change chart and CSV export.
//!
//! Panels:
//! 1. Tickers: entry line, tracked list, cache status, last load summary
//! 2. Chart: percent change since the first common day, benchmark included
//! 3. Help: keyboard shortcuts

pub mod app;
pub mod input;
pub mod theme;
pub mod ui;

pub use app::{AppState, EntryMode, ErrorCategory, Overlay, Panel, StatusLevel};
pub use input::handle_key;

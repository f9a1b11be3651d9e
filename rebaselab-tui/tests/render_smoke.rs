//! Rendering smoke tests against ratatui's TestBackend, plus the
//! add → load → chart → export flow driven through key events.

use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::TestBackend;
use ratatui::Terminal;

use rebaselab_core::data::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use rebaselab_runner::{RebaseConfig, NO_TICKERS_MESSAGE};
use rebaselab_tui::{handle_key, ui, AppState, EntryMode, Overlay, Panel, StatusLevel};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// Serves a few January 2024 closes for AAPL and ^GSPC; everything else is unknown.
struct MockProvider;

impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(&self, symbol: &str, _start: NaiveDate, _end: NaiveDate) -> Result<FetchResult, DataError> {
        let rows: &[(u32, f64)] = match symbol {
            "AAPL" => &[(2, 185.0), (3, 184.0), (4, 182.0), (5, 181.0), (8, 185.5)],
            "^GSPC" => &[(2, 4742.8), (3, 4704.8), (4, 4688.7), (5, 4697.2), (8, 4763.5)],
            _ => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
        };
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars: rows
                .iter()
                .map(|(day, p)| RawBar::with_closes(d(*day), Some(*p), Some(*p)))
                .collect(),
            source: DataSource::Yahoo,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn app(dir: &std::path::Path) -> AppState {
    let config = RebaseConfig {
        cache_dir: dir.to_path_buf(),
        ..RebaseConfig::default()
    };
    let mut app = AppState::new(config, Box::new(MockProvider), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    app.overlay = Overlay::None;
    app
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
}

fn type_line(app: &mut AppState, s: &str) {
    for c in s.chars() {
        handle_key(app, key(KeyCode::Char(c)));
    }
    handle_key(app, key(KeyCode::Enter));
}

/// Render one frame and return the screen as text, one line per row.
fn render(app: &AppState) -> String {
    let backend = TestBackend::new(120, 40);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal.draw(|f| ui::draw(f, app)).unwrap();

    let buffer = terminal.backend().buffer();
    let width = buffer.area.width as usize;
    buffer
        .content()
        .chunks(width)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn empty_app_shows_informational_state() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let screen = render(&app);
    assert!(screen.contains("Tickers [1/3]"));
    assert!(screen.contains(NO_TICKERS_MESSAGE));
    assert!(screen.contains("S&P500 (^GSPC)"));
}

#[test]
fn welcome_overlay_renders() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.overlay = Overlay::Welcome;
    let screen = render(&app);
    assert!(screen.contains("Welcome to RebaseLab"));
}

#[test]
fn entry_line_echoes_typing() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    for c in "msft".chars() {
        handle_key(&mut app, key(KeyCode::Char(c)));
    }
    assert!(render(&app).contains("> msft_"));
}

#[test]
fn load_chart_and_export_flow() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());

    type_line(&mut app, "aapl");
    handle_key(&mut app, ctrl('l'));
    assert!(app.load_pending);
    assert!(render(&app).contains("Loading 1 ticker(s) plus S&P500..."));

    app.run_pending_load();
    let dashboard = app.dashboard.as_ref().expect("dashboard after load");
    assert_eq!(dashboard.table.labels().collect::<Vec<_>>(), vec!["AAPL", "S&P500"]);
    assert_eq!(dashboard.table.row_count(), 5);
    assert_eq!(app.status_message.as_ref().unwrap().1, StatusLevel::Info);
    assert_eq!(app.cache_status.get("AAPL"), Some(&true));

    let tickers_screen = render(&app);
    assert!(tickers_screen.contains("Trading days: 5"));
    assert!(tickers_screen.contains("yahoo"));

    handle_key(&mut app, key(KeyCode::Tab));
    assert_eq!(app.active_panel, Panel::Chart);
    let chart_screen = render(&app);
    assert!(chart_screen.contains("Chart [2/3]"));
    assert!(chart_screen.contains("2024-01-02"));
    assert!(chart_screen.contains("S&P500"));

    handle_key(&mut app, ctrl('e'));
    let exported = std::fs::read_to_string(dir.path().join("percent_change_10yr.csv")).unwrap();
    assert!(exported.starts_with("Date,AAPL,S&P500"));
    assert_eq!(exported.lines().count(), 6);
}

#[test]
fn partial_failure_is_reported_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());

    type_line(&mut app, "AAPL, ZZZZ");
    app.load();

    let (msg, level) = app.status_message.clone().unwrap();
    assert_eq!(level, StatusLevel::Warning);
    assert!(msg.contains("excluded: ZZZZ"), "{msg}");
    assert_eq!(app.error_history.len(), 1);
    assert!(app.error_history[0].context.contains("ZZZZ"));

    handle_key(&mut app, ctrl('r'));
    assert!(render(&app).contains("Error History (1)"));
}

#[test]
fn nothing_retrieved_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.config.benchmark.symbol = "NOPE".into();

    type_line(&mut app, "ZZZZ");
    app.load();

    assert!(app.dashboard.is_none());
    let (msg, level) = app.status_message.clone().unwrap();
    assert_eq!(level, StatusLevel::Error);
    assert!(msg.starts_with("No data retrieved."), "{msg}");

    handle_key(&mut app, key(KeyCode::Tab));
    assert!(render(&app).contains("Nothing loaded yet."));
}

#[test]
fn clear_drops_chart() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    type_line(&mut app, "AAPL");
    app.load();
    assert!(app.dashboard.is_some());

    handle_key(&mut app, ctrl('x'));
    assert!(app.dashboard.is_none());
    assert!(render(&app).contains(NO_TICKERS_MESSAGE));
}

#[test]
fn help_panel_lists_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.active_panel = Panel::Help;
    let screen = render(&app);
    assert!(screen.contains("Ctrl+L / F5"));
    assert!(screen.contains("Ctrl+E"));
}

#[test]
fn missing_benchmark_is_not_stood_in_by_a_ticker() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    app.config.benchmark.symbol = "NOPE".into();
    app.config.benchmark.label = "Nope".into();

    type_line(&mut app, "AAPL");
    app.load();
    let dashboard = app.dashboard.as_ref().expect("AAPL alone still loads");
    assert_eq!(dashboard.table.labels().collect::<Vec<_>>(), vec!["AAPL"]);

    let screen = render(&app);
    assert!(screen.contains("Excluded: NOPE"), "{screen}");
    assert!(!screen.contains("AAPL: "), "{screen}");
    assert!(!screen.contains("Nope: "), "{screen}");
}

#[test]
fn directory_entry_moves_cache_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let moved = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());

    handle_key(&mut app, ctrl('d'));
    assert_eq!(app.entry_mode, EntryMode::Directory);
    assert!(render(&app).contains("Directory: > "));

    app.input.clear();
    type_line(&mut app, &moved.path().display().to_string());
    assert_eq!(app.entry_mode, EntryMode::Ticker);
    assert_eq!(app.config.cache_dir, moved.path());
    assert!(render(&app).contains(&moved.path().display().to_string()));

    type_line(&mut app, "AAPL");
    app.load();
    assert!(app.dashboard.is_some());
    handle_key(&mut app, ctrl('e'));

    assert!(moved.path().join("percent_change_10yr.csv").is_file());
    let cached: Vec<_> = std::fs::read_dir(moved.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("AAPL_"))
        .collect();
    assert_eq!(cached.len(), 1, "{cached:?}");
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

//! RebaseLab terminal dashboard.

use std::fs::{self, OpenOptions};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

use rebaselab_core::data::YahooProvider;
use rebaselab_runner::RebaseConfig;
use rebaselab_tui::{input, ui, AppState};

const LOG_FILE: &str = "rebaselab.log";

#[derive(Parser)]
#[command(name = "rebaselab", about = "RebaseLab: percent change since day one, against a benchmark")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache and export directory. Overrides the config; Ctrl+D changes it at runtime.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = RebaseConfig::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }
    init_logging(&config)?;

    let breaker = Arc::new(config.provider.circuit_breaker());
    let provider = YahooProvider::new(breaker, config.provider.retry_policy())?;
    let today = chrono::Local::now().date_naive();
    let mut app = AppState::new(config, Box::new(provider), today);

    // Install a panic hook that restores the terminal before printing the panic.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Log to `{cache_dir}/rebaselab.log` so output never lands on the alternate screen.
fn init_logging(config: &RebaseConfig) -> Result<()> {
    fs::create_dir_all(&config.cache_dir)
        .with_context(|| format!("failed to create {}", config.cache_dir.display()))?;
    let path = config.cache_dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
) -> Result<()> {
    loop {
        // 1. Render
        terminal.draw(|f| ui::draw(f, app))?;

        // 2. A queued load runs after the frame showing "Loading..." is up.
        if app.load_pending {
            app.run_pending_load();
            continue;
        }

        // 3. Poll for input events (50ms timeout for ~20 FPS tick)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                input::handle_key(app, key);
            }
        }

        // 4. Check quit
        if !app.running {
            break;
        }
    }
    Ok(())
}

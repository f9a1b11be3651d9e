//! RebaseLab CLI: fetch, export, and cache management commands.
//!
//! Commands:
//! - `fetch`: load symbols plus the benchmark, print the rebased summary,
//!   optionally write the combined CSV or print JSON
//! - `cache status`: list cache files with range, rows and size
//! - `cache clean`: remove cache files not written recently

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use rebaselab_core::data::{
    CsvCache, DataProvider, DownloadProgress, StdoutProgress, SyntheticProvider, YahooProvider,
};
use rebaselab_core::AlignPolicy;
use rebaselab_runner::{
    build_dashboard, dashboard_to_json, write_table_csv, AddOutcome, Dashboard, FetchOptions,
    LoadContext, RebaseConfig, Session,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rebaselab-cli",
    about = "RebaseLab CLI: percent-change comparison against a benchmark"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load symbols plus the benchmark and print the rebased table summary.
    Fetch {
        /// Symbols to load (e.g., AAPL MSFT). Comma-separated lists are accepted.
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD), inclusive. Defaults to `--years` before the end.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), exclusive. Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Lookback in years when no start date is given.
        #[arg(long)]
        years: Option<u32>,

        /// Cache directory. Defaults to the configured one (./data).
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Refetch even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Never touch the network.
        #[arg(long, default_value_t = false, conflicts_with_all = ["force", "synthetic"])]
        offline: bool,

        /// Use deterministic synthetic prices instead of Yahoo Finance.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Fetch symbols in parallel.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Date alignment across symbols.
        #[arg(long, value_enum)]
        align: Option<AlignArg>,

        /// Write the combined percent-change CSV here.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the dashboard as JSON instead of the text summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cache files with their date range, rows and size.
    Status {
        /// Cache directory. Defaults to the configured one (./data).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
    /// Remove cache files not written within the given number of days.
    Clean {
        /// Remove files older than this many days.
        #[arg(long)]
        unused_days: u64,

        /// Cache directory. Defaults to the configured one (./data).
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AlignArg {
    Intersection,
    ForwardFill,
}

impl From<AlignArg> for AlignPolicy {
    fn from(arg: AlignArg) -> Self {
        match arg {
            AlignArg::Intersection => AlignPolicy::Intersection,
            AlignArg::ForwardFill => AlignPolicy::ForwardFill,
        }
    }
}

struct FetchArgs {
    symbols: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    years: Option<u32>,
    force: bool,
    offline: bool,
    synthetic: bool,
    output: Option<PathBuf>,
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = RebaseConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Fetch {
            symbols,
            start,
            end,
            years,
            cache_dir,
            force,
            offline,
            synthetic,
            parallel,
            align,
            output,
            json,
        } => {
            if let Some(dir) = cache_dir {
                config.cache_dir = dir;
            }
            if let Some(align) = align {
                config.align = align.into();
            }
            config.parallel |= parallel;
            run_fetch(
                &config,
                FetchArgs {
                    symbols,
                    start,
                    end,
                    years,
                    force,
                    offline,
                    synthetic,
                    output,
                    json,
                },
            )
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => {
                run_cache_status(&cache_dir.unwrap_or(config.cache_dir))
            }
            CacheAction::Clean {
                unused_days,
                cache_dir,
                confirm,
            } => run_cache_clean(&cache_dir.unwrap_or(config.cache_dir), unused_days, confirm),
        },
    }
}

fn run_fetch(config: &RebaseConfig, args: FetchArgs) -> Result<()> {
    let end = args
        .end
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let years = args.years.unwrap_or(config.lookback_years);
    if years == 0 {
        bail!("--years must be at least 1");
    }
    let start = match args.start.as_deref() {
        Some(s) => parse_date(s)?,
        None => rebaselab_core::data::lookback_window(end, years).0,
    };

    let mut session = Session::new();
    for entry in &args.symbols {
        match session.add(entry) {
            AddOutcome::Duplicate(dups) | AddOutcome::Partial { duplicates: dups, .. } => {
                eprintln!("WARNING: already in list: {}", dups.join(", "));
            }
            AddOutcome::Ignored | AddOutcome::Added(_) => {}
        }
    }
    if session.is_empty() {
        bail!("no symbols given");
    }

    let provider: Box<dyn DataProvider> = if args.synthetic {
        eprintln!("WARNING: using synthetic prices; results are not market data");
        Box::new(SyntheticProvider::new())
    } else {
        let breaker = Arc::new(config.provider.circuit_breaker());
        Box::new(YahooProvider::new(breaker, config.provider.retry_policy())?)
    };

    let cache = CsvCache::new(&config.cache_dir);
    let stdout_progress = StdoutProgress;
    let progress: Option<&dyn DownloadProgress> = if args.json {
        None
    } else {
        Some(&stdout_progress)
    };

    let ctx = LoadContext {
        cache: &cache,
        provider: provider.as_ref(),
        progress,
        start,
        end,
        benchmark: &config.benchmark,
        align: config.align,
        options: FetchOptions {
            force: args.force,
            offline: args.offline,
            parallel: config.parallel,
        },
    };

    let dashboard = build_dashboard(session.tickers(), &ctx)?;

    if args.json {
        println!("{}", dashboard_to_json(&dashboard)?);
    } else {
        print_summary(&dashboard);
    }

    if let Some(path) = &args.output {
        write_table_csv(&dashboard.table, path)?;
        if !args.json {
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn print_summary(dashboard: &Dashboard) {
    let table = &dashboard.table;
    println!();
    println!("=== Percent Change ===");
    println!("Window:   {} to {} (end exclusive)", dashboard.start, dashboard.end);
    println!(
        "Aligned:  {} rows, {} to {} ({})",
        table.row_count(),
        table.first_date(),
        table.last_date(),
        dashboard.align.label()
    );
    println!();
    println!("{:<10} {:<10} {:<10} {:>12}", "Label", "Symbol", "Source", "Change");
    println!("{}", "-".repeat(45));
    for (column, provenance) in table.columns().iter().zip(&dashboard.provenance) {
        let change = column.values.last().copied().unwrap_or(0.0);
        println!(
            "{:<10} {:<10} {:<10} {:>11.2}%",
            column.label, column.symbol, provenance.source, change
        );
    }
    if !dashboard.excluded.is_empty() {
        println!();
        for exclusion in &dashboard.excluded {
            println!("EXCLUDED: {exclusion}");
        }
    }
    println!();
    println!("Hash: {}", table.content_hash());
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    let cache = CsvCache::new(cache_dir);
    let entries = cache.entries()?;

    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let total_size: u64 = entries.iter().map(|e| e.size_bytes).sum();
    println!("Cache: {}", cache_dir.display());
    println!("Files: {}", entries.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<10} {:<25} {:>8} {:>10}", "Symbol", "Range", "Rows", "Size");
    println!("{}", "-".repeat(56));
    for entry in &entries {
        println!(
            "{:<10} {:<25} {:>8} {:>10}",
            entry.key.symbol,
            format!("{} to {}", entry.key.start, entry.key.end),
            entry.rows,
            format_size(entry.size_bytes)
        );
    }

    Ok(())
}

fn run_cache_clean(cache_dir: &Path, unused_days: u64, confirm: bool) -> Result<()> {
    let cache = CsvCache::new(cache_dir);
    let stale = cache.stale_entries(Duration::from_secs(unused_days.saturating_mul(24 * 60 * 60)))?;

    if stale.is_empty() {
        println!("No cache files older than {unused_days} days to remove.");
        return Ok(());
    }

    println!("Found {} cache file(s) older than {unused_days} days:", stale.len());
    for entry in &stale {
        println!("  {} ({})", entry.key.file_name(), format_size(entry.size_bytes));
    }

    if !confirm {
        println!();
        println!("Dry run: pass --confirm to delete these files.");
        return Ok(());
    }

    for entry in &stale {
        cache.remove(entry)?;
        println!("Removed: {}", entry.key.file_name());
    }

    println!("Done. Removed {} file(s).", stale.len());
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

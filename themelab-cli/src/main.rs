//! ThemeLab CLI: screen and cache management commands.
//!
//! Commands:
//! - `run`: screen the universe for a date and write the Top-N report
//! - `cache status`: list cached report fingerprints
//! - `cache clear`: remove every cached report
//!
//! Logs go to stderr (`RUST_LOG` filter, `THEMELAB_LOG_FORMAT=json` for JSON
//! lines); the Top-N summary goes to stdout.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use themelab_runner::{
    load_screen_config, load_signals, load_theme_map, run_screen_cached, write_report,
    DataProvider, MockProvider, Report, ReportCache, RunRequest, SnapshotProvider,
};

#[derive(Parser)]
#[command(
    name = "themelab",
    about = "ThemeLab CLI: theme-aware Top-N security screener"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderKind {
    /// Deterministic synthetic universe built from the theme map.
    Mock,
    /// Frozen CSV snapshot under --snapshot-dir.
    Snapshot,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen the universe and write the Top-N report.
    Run {
        /// Requested date (YYYY-MM-DD). Weekends resolve to the previous Friday.
        #[arg(long)]
        date: String,

        /// Number of rows in the report.
        #[arg(long, default_value_t = 5)]
        top: usize,

        /// Signal config (TOML).
        #[arg(long)]
        signals: PathBuf,

        /// Theme map (CSV, legacy or typed schema).
        #[arg(long)]
        theme_map: PathBuf,

        /// Screen config (TOML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Data provider.
        #[arg(long, value_enum, default_value_t = ProviderKind::Mock)]
        provider: ProviderKind,

        /// Snapshot base directory (snapshot provider).
        #[arg(long, default_value = "data/snapshots")]
        snapshot_dir: PathBuf,

        /// Pin the snapshot date (YYYY-MM-DD) instead of using the evaluation date.
        #[arg(long)]
        snapshot_as_of: Option<String>,

        /// Rank on technicals only (theme weight 0).
        #[arg(long, default_value_t = false)]
        technical_only: bool,

        /// Always recompute; neither read nor write the cache.
        #[arg(long, default_value_t = false)]
        no_cache: bool,

        /// Report cache directory.
        #[arg(long, default_value = ".themelab_cache")]
        cache_dir: PathBuf,

        /// Output directory for the report JSON and CSV.
        #[arg(long, default_value = "reports")]
        output_dir: PathBuf,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached reports.
    Status {
        /// Report cache directory.
        #[arg(long, default_value = ".themelab_cache")]
        cache_dir: PathBuf,
    },
    /// Remove every cached report.
    Clear {
        /// Report cache directory.
        #[arg(long, default_value = ".themelab_cache")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            date,
            top,
            signals,
            theme_map,
            config,
            provider,
            snapshot_dir,
            snapshot_as_of,
            technical_only,
            no_cache,
            cache_dir,
            output_dir,
        } => run_screen_cmd(RunArgs {
            date,
            top,
            signals,
            theme_map,
            config,
            provider,
            snapshot_dir,
            snapshot_as_of,
            technical_only,
            cache_dir: (!no_cache).then_some(cache_dir),
            output_dir,
        }),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Clear { cache_dir } => run_cache_clear(&cache_dir),
        },
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if std::env::var("THEMELAB_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}

struct RunArgs {
    date: String,
    top: usize,
    signals: PathBuf,
    theme_map: PathBuf,
    config: Option<PathBuf>,
    provider: ProviderKind,
    snapshot_dir: PathBuf,
    snapshot_as_of: Option<String>,
    technical_only: bool,
    /// `None` disables the cache.
    cache_dir: Option<PathBuf>,
    output_dir: PathBuf,
}

fn parse_date(raw: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("{flag} must be YYYY-MM-DD, got '{raw}'"))
}

fn run_screen_cmd(args: RunArgs) -> Result<()> {
    if args.top == 0 {
        bail!("--top must be at least 1");
    }
    let requested_date = parse_date(&args.date, "--date")?;
    let snapshot_as_of = args
        .snapshot_as_of
        .as_deref()
        .map(|s| parse_date(s, "--snapshot-as-of"))
        .transpose()?;

    let request = RunRequest {
        requested_date,
        top_n: args.top,
        signals: load_signals(&args.signals)?,
        theme_map: load_theme_map(&args.theme_map)?,
        config: load_screen_config(args.config.as_deref())?,
        theme_weight_override: args.technical_only.then_some(0.0),
    };

    let provider: Box<dyn DataProvider> = match args.provider {
        ProviderKind::Mock => Box::new(MockProvider::default()),
        ProviderKind::Snapshot => Box::new(SnapshotProvider::new(args.snapshot_dir, snapshot_as_of)),
    };
    let cache = args.cache_dir.map(ReportCache::new);

    let report = run_screen_cached(&request, provider.as_ref(), cache.as_ref())?;

    print_summary(&report);
    let paths = write_report(&report, &args.output_dir)?;
    println!("Report written to: {}", paths.json.display());
    println!("                   {}", paths.csv.display());

    Ok(())
}

fn print_summary(report: &Report) {
    println!();
    println!(
        "=== Top {} for {} (requested {}) ===",
        report.top_n, report.evaluation_date, report.requested_date
    );
    println!("Provider:     {}", report.provider);
    if let Some(snapshot) = &report.snapshot {
        println!("Snapshot:     {snapshot}");
    }
    println!("Fingerprint:  {}", report.fingerprint);
    println!(
        "Universe:     {} securities, {} scored, {} with theme hits",
        report.meta.universe_count, report.meta.scored_count, report.meta.securities_with_hits
    );
    if report.meta.technical_only {
        println!("Mode:         technical only");
    }
    println!();
    println!(
        "{:>4}  {:<8}  {:<16}  {:>8}  {:>8}  Themes",
        "Rank", "Ticker", "Name", "Final", "Theme"
    );
    for row in &report.results {
        let themes = if row.reason.themes_used.is_empty() {
            "-".to_string()
        } else {
            row.reason.themes_used.join(", ")
        };
        println!(
            "{:>4}  {:<8}  {:<16}  {:>8.4}  {:>8.4}  {}",
            row.rank,
            row.ticker,
            row.name,
            row.score_breakdown.final_score,
            row.score_breakdown.theme_score,
            themes
        );
        if !row.reason.risk_flags.is_empty() {
            println!("      risk: {}", row.reason.risk_flags.join(", "));
        }
    }
    println!();
    println!(
        "Distinct themes: {} [{}] (band {}..={}, {})",
        report.meta.distinct_themes.len(),
        report.meta.distinct_themes.join(", "),
        report.meta.convergence_min,
        report.meta.convergence_max,
        if report.meta.convergence_ok { "ok" } else { "outside band" }
    );
    if !report.meta.unresolved_theme_keys.is_empty() {
        println!(
            "Unresolved theme-map keys: {}",
            report.meta.unresolved_theme_keys.join(", ")
        );
    }
    if !report.meta.skipped_keywords.is_empty() {
        println!(
            "Skipped keywords (too short): {}",
            report.meta.skipped_keywords.join(", ")
        );
    }
    println!();
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }
    let cache = ReportCache::new(cache_dir);
    let fingerprints = cache.entries()?;
    println!("Cache directory: {}", cache_dir.display());
    println!("Cached reports:  {}", fingerprints.len());
    for fingerprint in &fingerprints {
        match cache.get(fingerprint) {
            Ok(Some(entry)) => println!(
                "  {}  {} top{}  {}  created {}",
                fingerprint,
                entry.report.evaluation_date,
                entry.report.top_n,
                entry.report.provider,
                entry.created_at.format("%Y-%m-%d %H:%M:%S")
            ),
            Ok(None) => {}
            Err(e) => println!("  {fingerprint}  CORRUPT: {e}"),
        }
    }
    Ok(())
}

fn run_cache_clear(cache_dir: &Path) -> Result<()> {
    let removed = ReportCache::new(cache_dir).clear()?;
    println!("Removed {removed} cached report(s) from {}", cache_dir.display());
    Ok(())
}

//! Polite Crawler main entry point
//!
//! This is the command-line interface for the single-domain crawler.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use polite_crawler::config::{load_config_with_hash, validate, Config, ConfigOverrides};
use polite_crawler::crawler::{CrawlEngine, CrawlReport, Policy};
use polite_crawler::output::{
    print_statistics, write_visited, write_visited_to_file, TracingSink, DETAIL_TARGET,
};
use polite_crawler::url::ScopeMode;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Polite Crawler: visits every page of one site
///
/// Starting from a seed URL, follows the hyperlinks that stay on the seed's
/// site while respecting its robots.txt rules and declared crawl rate. The
/// visited URLs are printed one per line.
#[derive(Parser, Debug)]
#[command(name = "polite-crawler")]
#[command(version)]
#[command(about = "A polite single-domain web crawler", long_about = None)]
struct Cli {
    /// URL to start crawling from (overrides the config file)
    #[arg(value_name = "SEED")]
    seed: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// User agent sent to servers and matched against robots.txt
    #[arg(short = 'a', long)]
    user_agent: Option<String>,

    /// Robots file location, relative to the seed or absolute
    #[arg(long, value_name = "PATH", conflicts_with = "no_robots")]
    robots_file: Option<String>,

    /// Ignore robots.txt entirely
    #[arg(long)]
    no_robots: bool,

    /// Maximum tasks started per time window
    #[arg(long, value_name = "N")]
    tasks_per: Option<u32>,

    /// Length of the time window in seconds
    #[arg(long, value_name = "SECONDS")]
    per_unit: Option<f64>,

    /// Treat URLs differing only by query string as the same page
    #[arg(long)]
    ignore_queries: bool,

    /// Number of concurrent fetch workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// How linked hosts are matched against the seed host
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,

    /// Re-queue a URL once after a timeout, 429 or 5xx
    #[arg(long)]
    retry_transient: bool,

    /// Write visited URLs to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resolve the crawl policy (fetching robots.txt) and exit without crawling
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    /// Either host may be a string suffix of the other
    Suffix,
    /// Same host or a dot-separated subdomain
    Subdomain,
}

impl From<ScopeArg> for ScopeMode {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Suffix => ScopeMode::Suffix,
            ScopeArg::Subdomain => ScopeMode::Subdomain,
        }
    }
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            seed: self.seed.clone(),
            user_agent: self.user_agent.clone(),
            robots_file: self.robots_file.clone(),
            no_robots: self.no_robots,
            tasks_per: self.tasks_per,
            per_unit: self.per_unit,
            ignore_queries: self.ignore_queries,
            workers: self.workers,
            scope: self.scope.map(ScopeMode::from),
            retry_transient: self.retry_transient,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };
    cli.overrides().apply(&mut config);
    validate(&config).context("Invalid configuration")?;

    let engine = CrawlEngine::from_config(&config, Arc::new(TracingSink))
        .await
        .context("Failed to start crawl")?;

    if cli.dry_run {
        print_policy(engine.policy(), &config);
        return Ok(());
    }

    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.trigger();
        }
    });

    let report = engine.run().await.context("Crawl failed")?;
    write_report(&report, cli.output.as_ref())?;

    if !cli.quiet {
        print_statistics(&report.stats);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries the visited URL list.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("polite_crawler=info,warn"),
            1 => EnvFilter::new("polite_crawler=debug,info"),
            2 => EnvFilter::new(format!("polite_crawler=trace,{}=off,info", DETAIL_TARGET)),
            _ => EnvFilter::new("polite_crawler=trace,debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn write_report(report: &CrawlReport, output: Option<&PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            write_visited_to_file(report, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {} URLs to {}", report.visited.len(), path.display());
        }
        None => write_visited(report, std::io::stdout().lock()).context("Failed to write URLs")?,
    }

    let duration = report.finished_at - report.started_at;
    tracing::info!(
        "Crawl of {} {} after {}.{:03}s",
        report.seed,
        if report.interrupted { "interrupted" } else { "completed" },
        duration.num_seconds(),
        duration.num_milliseconds().rem_euclid(1000)
    );
    Ok(())
}

/// Handles the --dry-run mode: shows the policy the crawl would run with
fn print_policy(policy: &Policy, config: &Config) {
    println!("=== Polite Crawler Dry Run ===\n");

    println!("Seed: {}", config.crawler.seed.as_deref().unwrap_or_default());
    println!("Scope: {} ({:?})", policy.scope_netloc, policy.scope_mode);
    println!("User agent: {}", policy.user_agent);
    println!(
        "Robots file: {}",
        config.crawler.robots_file().unwrap_or("(disabled)")
    );

    println!("\nRate:");
    println!(
        "  {} task(s) per {:.3}s ({:?})",
        policy.tasks_per,
        policy.per_unit.as_secs_f64(),
        policy.rate_source
    );
    println!("  Workers: {}", config.crawler.workers);

    println!("\nURLs:");
    println!("  Ignore queries: {}", policy.ignore_queries);
    println!("  Retry transient failures: {}", config.crawler.retry_transient);

    println!("\n✓ Configuration is valid");
}

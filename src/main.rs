//! Forum-Mirror main entry point
//!
//! This is the command-line interface for building and resuming offline forum mirrors.

use anyhow::{bail, Context};
use clap::Parser;
use forum_mirror::auth::COOKIES_FILE;
use forum_mirror::config::{apply_overrides, load_config_with_hash, Config};
use forum_mirror::crawler::run_mirror;
use forum_mirror::output::{load_statistics, print_statistics};
use forum_mirror::storage::remove_state_files;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Settings file looked up inside the output folder when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "settings.toml";

/// Exit status after Ctrl-C
const INTERRUPTED_EXIT: u8 = 130;

/// Forum-Mirror: an offline mirror builder for forums
///
/// Discovers every page of one forum, downloads pages and their assets and rewrites links so
/// the copy browses offline. Interrupted runs resume from the state kept in the output folder.
#[derive(Parser, Debug)]
#[command(name = "forum-mirror")]
#[command(version)]
#[command(about = "Builds a browsable offline mirror of a forum", long_about = None)]
struct Cli {
    /// Root URL of the forum, e.g. https://example.forumeiros.com
    #[arg(value_name = "FORUM_URL")]
    forum_url: String,

    /// Output folder (defaults to ./<first label of the forum host>)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Path to TOML settings file (defaults to <DIR>/settings.toml when present)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// JSON cookie file (defaults to <DIR>/cookies.json)
    #[arg(long, value_name = "FILE")]
    cookies: Option<PathBuf>,

    /// Start a fresh mirror, deleting previous state
    #[arg(long, conflicts_with = "stats")]
    fresh: bool,

    /// Show statistics of the saved crawl state and exit
    #[arg(long)]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let output = match &cli.output {
        Some(dir) => dir.clone(),
        None => default_output_dir(&cli.forum_url)?,
    };

    if cli.stats {
        handle_stats(&output)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_settings(cli.config.as_deref(), &output)?;
    let config = apply_overrides(config, &cli.forum_url, &output)
        .context("Invalid forum URL or settings")?;

    if cli.fresh {
        let removed = remove_state_files(&output)?;
        tracing::info!("Starting fresh mirror ({} state files removed)", removed);
    } else {
        tracing::info!("Starting mirror (will resume if an interrupted run exists)");
    }

    let cookies = cli
        .cookies
        .clone()
        .unwrap_or_else(|| output.join(COOKIES_FILE));

    tokio::select! {
        result = run_mirror(config, &cookies) => {
            let summary = result.context("Mirror failed")?;
            tracing::info!("Discovery: {}", summary.discovery);
            tracing::info!("Download: {}", summary.download);
            println!("✓ Mirror written to: {}", output.display());
            Ok(ExitCode::SUCCESS)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; rerun the same command to resume");
            Ok(ExitCode::from(INTERRUPTED_EXIT))
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` wins over the flags when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("forum_mirror=info,warn"),
                1 => EnvFilter::new("forum_mirror=debug,info"),
                2 => EnvFilter::new("forum_mirror=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// `./<first label of the host>`, e.g. `./myforum` for `https://myforum.forumeiros.com`
fn default_output_dir(forum_url: &str) -> anyhow::Result<PathBuf> {
    let url = url::Url::parse(forum_url).with_context(|| format!("Invalid forum URL: {}", forum_url))?;
    let Some(label) = url.host_str().and_then(|host| host.split('.').next()) else {
        bail!("Forum URL has no host: {}", forum_url);
    };
    Ok(PathBuf::from(".").join(label))
}

/// Reads the settings file, falling back to defaults when none is given or found
fn load_settings(explicit: Option<&Path>, output: &Path) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = output.join(DEFAULT_CONFIG_FILE);
            if !candidate.exists() {
                tracing::info!("No settings file, using defaults");
                return Ok(Config::default());
            }
            candidate
        }
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok(config)
}

/// Handles the --stats mode: shows statistics of the saved state
fn handle_stats(output: &Path) -> anyhow::Result<()> {
    println!("Backup folder: {}\n", output.display());
    let stats = load_statistics(output)
        .with_context(|| format!("Failed to read crawl state in {}", output.display()))?;
    print_statistics(&stats);
    Ok(())
}

//! fsw - watch paths and print file system events

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use fswatch::Watcher;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod output;
mod settings;

use settings::{FileConfig, Overrides};

/// Watch files and directories and print what changes
#[derive(Parser)]
#[command(name = "fsw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Paths to watch
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Also watch every directory beneath each path
    #[arg(short, long)]
    recursive: bool,

    /// TOML config file with [filter], [debounce] and [batch] sections
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debounce events per path, sweeping after MS of quiet
    #[arg(long, value_name = "MS")]
    debounce: Option<u64>,

    /// Deliver events in batches of up to SIZE
    #[arg(long, value_name = "SIZE")]
    batch: Option<usize>,

    /// Flush a partial batch after MS of quiet
    #[arg(long, value_name = "MS")]
    batch_wait: Option<u64>,

    /// Only report files with this extension (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Skip dotfiles
    #[arg(long)]
    ignore_hidden: bool,

    /// Print one JSON object per event
    #[arg(long)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_filter(&self) -> EnvFilter {
        if self.quiet {
            return EnvFilter::new("error");
        }
        match self.verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("fswatch=debug,fsw=debug"),
            _ => EnvFilter::new("fswatch=trace,fsw=trace"),
        }
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            debounce_ms: self.debounce,
            batch_size: self.batch,
            batch_wait_ms: self.batch_wait,
            extensions: self.extensions.clone(),
            ignore_hidden: self.ignore_hidden,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(std::io::stderr)
        .init();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let json = cli.json;
    let config = settings::resolve(file, &cli.overrides())
        .with_handler(move |events| output::print_events(&events, json))
        .with_error_handler(output::print_error);

    let watcher = Arc::new(Watcher::with_config(config).context("Invalid watcher configuration")?);
    for path in &cli.paths {
        let added = if cli.recursive {
            watcher.add_recursive(path)
        } else {
            watcher.add(path)
        };
        added.with_context(|| format!("Failed to watch {}", path.display()))?;
    }
    watcher.start().context("Failed to start watcher")?;
    tracing::info!(paths = watcher.watched_count(), "watching");

    let waiter = {
        let watcher = watcher.clone();
        tokio::task::spawn_blocking(move || watcher.wait())
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            tracing::debug!("interrupted");
        }
        _ = waiter => {}
    }

    watcher.close()?;
    output::print_stats(&watcher.stats(), json);
    Ok(())
}

mod app;
mod ui;

use anyhow::{Context, Result};
use app::{App, TopOptions};
use clap::{Parser, Subcommand};
use hostmon_core::{HostmonConfig, ProcessField, SnapshotNormalizer};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hostmon", version, about = "Host telemetry and process table sampler")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print one normalized host snapshot as JSON
    Snapshot {
        /// Take a priming sample and wait this long first, so rates are filled in
        #[arg(long, value_name = "MS")]
        delay_ms: Option<u64>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the process table on every refresh
    Top {
        #[arg(long, default_value = "cpu_percent")]
        sort: ProcessField,

        #[arg(long)]
        ascending: bool,

        #[arg(long, default_value_t = 15)]
        limit: usize,

        /// Only show processes owned by this user
        #[arg(long)]
        user: Option<String>,

        /// Comma separated columns, in display order
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<ProcessField>>,

        /// Stop after this many tables; runs until Ctrl-C when omitted
        #[arg(long)]
        iterations: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => HostmonConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => HostmonConfig::default(),
    };

    match cli.command {
        Command::Snapshot { delay_ms, compact } => snapshot(&config, delay_ms, compact).await,
        Command::Top {
            sort,
            ascending,
            limit,
            user,
            fields,
            iterations,
        } => {
            let options = TopOptions {
                sort,
                descending: !ascending,
                limit,
                user,
                fields: fields.unwrap_or_else(|| config.sampler.fields.clone()),
                iterations,
            };
            let app = App::new(&config, options).await?;
            let res = app.run().await;
            app.shutdown().await?;
            res
        }
    }
}

async fn snapshot(config: &HostmonConfig, delay_ms: Option<u64>, compact: bool) -> Result<()> {
    let severity = config.severity_config().context("invalid severity profiles")?;
    let mut normalizer = SnapshotNormalizer::for_host(severity);

    if let Some(ms) = delay_ms {
        normalizer.collect(Instant::now());
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let snapshot = normalizer.collect(Instant::now());
    let json = if compact {
        serde_json::to_string(&snapshot)?
    } else {
        serde_json::to_string_pretty(&snapshot)?
    };
    println!("{}", json);
    Ok(())
}

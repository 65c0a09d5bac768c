use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use teslafi_core::{
    CacheConfig, CommandOutcome, DeviceFacade, HttpTransport, PollingCache, TransportConfig,
    VehicleFacades,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod report;
mod scheduler;

use report::{FacadeRow, Report};

#[derive(Debug, Parser)]
#[command(name = "teslafid")]
#[command(about = "TeslaFi vehicle poller with cached, offline-aware facades")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, env = "TESLAFI_TOKEN", hide_env_values = true)]
    token: String,

    #[arg(long, default_value = teslafi_core::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Throttle window and refresh cadence.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    scan_interval_secs: u64,

    #[arg(long, default_value_t = 10_000)]
    fetch_timeout_ms: u64,

    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    tracker_interval_secs: u64,
}

#[derive(Debug, Subcommand)]
enum Command {
    Identity,
    Once {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Refresh {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Run {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    Lock,
    Unlock,
    Wake,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let scan_interval = Duration::from_secs(cli.scan_interval_secs);
    let fetch_timeout = Duration::from_millis(cli.fetch_timeout_ms);
    let cache_config = CacheConfig {
        throttle_interval: scan_interval,
        fetch_timeout,
    };
    let mut transport_config = TransportConfig::new(cli.token);
    transport_config.base_url = cli.base_url;
    transport_config.request_timeout = fetch_timeout;

    let transport = HttpTransport::new(transport_config).context("building http client")?;
    let cache = PollingCache::connect(Arc::new(transport), cache_config).await?;
    let facades = Arc::new(VehicleFacades::build(&cache));

    match cli.command {
        Command::Identity => {
            println!("{}", serde_json::to_string_pretty(cache.identity())?);
        }
        Command::Once { format } => {
            Report::collect(&cache, &facades).print(format)?;
        }
        Command::Refresh { format } => {
            cache.force_refresh().await;
            Report::collect(&cache, &facades).print(format)?;
        }
        Command::Run { format } => {
            let tracker_interval = Duration::from_secs(cli.tracker_interval_secs);
            scheduler::run(cache, facades, scan_interval, tracker_interval, format).await?;
        }
        Command::Lock => {
            let outcome = facades.lock.lock().await?;
            print_action(&facades.lock, outcome)?;
        }
        Command::Unlock => {
            let outcome = facades.lock.unlock().await?;
            print_action(&facades.lock, outcome)?;
        }
        Command::Wake => {
            let outcome = facades.wake.turn_on().await?;
            print_action(&facades.wake, outcome)?;
        }
    }

    Ok(())
}

fn print_action(facade: &dyn DeviceFacade, outcome: CommandOutcome) -> Result<()> {
    if outcome == CommandOutcome::Contradicted {
        warn!(facade = %facade.name(), "vehicle did not confirm the action");
    } else {
        info!(facade = %facade.name(), ?outcome, "action completed");
    }
    let out = serde_json::json!({
        "outcome": outcome,
        "facade": FacadeRow::from_facade(facade),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

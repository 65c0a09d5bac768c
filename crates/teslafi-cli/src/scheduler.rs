use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teslafi_core::{PollingCache, PositionUpdate, VehicleFacades};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::report::{print_position, Report};
use crate::OutputFormat;

const POSITION_CHANNEL_SIZE: usize = 16;

/// Drives the cache and every facade on independent tickers until ctrl-c.
///
/// The cache refreshes at the scan interval. Each facade also ticks on its
/// own, slightly offset schedule; the shared throttle keeps the network
/// traffic at one fetch per window.
pub async fn run(
    cache: Arc<PollingCache>,
    facades: Arc<VehicleFacades>,
    scan_interval: Duration,
    tracker_interval: Duration,
    format: OutputFormat,
) -> Result<()> {
    let mut tasks = JoinSet::new();

    {
        let cache = Arc::clone(&cache);
        tasks.spawn(async move {
            let mut ticker = interval_at(Instant::now() + scan_interval, scan_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let snapshot = cache.refresh().await;
                debug!(reachable = snapshot.is_reachable(), "scheduled refresh");
            }
        });
    }

    let facade_count = facades.all().len();
    for index in 0..facade_count {
        let facades = Arc::clone(&facades);
        let offset = Duration::from_millis(50 * (index as u64 + 1));
        tasks.spawn(async move {
            let mut ticker = interval_at(Instant::now() + offset, scan_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(facade) = facades.all().get(index) {
                    facade.update().await;
                }
            }
        });
    }

    let (position_tx, mut position_rx) = mpsc::channel::<PositionUpdate>(POSITION_CHANNEL_SIZE);
    {
        let facades = Arc::clone(&facades);
        tasks.spawn(async move {
            let mut ticker = interval_at(Instant::now(), tracker_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(update) = facades.tracker.update_info().await else {
                    continue;
                };
                if position_tx.send(update).await.is_err() {
                    break;
                }
            }
        });
    }

    let mut report_ticker = interval_at(Instant::now(), scan_interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping");
                break;
            }
            Some(update) = position_rx.recv() => {
                print_position(&update, format)?;
            }
            _ = report_ticker.tick() => {
                let report = Report::collect(&cache, &facades);
                report.print(format)?;
                info!(
                    reachable = report.reachable,
                    refreshes = report.stats.refreshes,
                    throttled = report.stats.throttled,
                    "tick"
                );
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}

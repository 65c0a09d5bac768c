use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::snapshot::{FieldReading, Identity, Snapshot};
use crate::transport::{TransportError, VehicleTransport};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no vehicle identity in either the live or the last good feed")]
    IdentityUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Current,
    LastGood,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub refreshes: u64,
    pub throttled: u64,
    pub live_fetches: u64,
    pub last_good_fetches: u64,
    pub transport_failures: u64,
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// State touched only while holding the refresh lock.
struct RefreshState {
    last_refresh_at: Option<Instant>,
    was_reachable: bool,
}

/// State swapped in whole under a short write lock; readers never wait on I/O.
#[derive(Default)]
struct Shared {
    current: Arc<Snapshot>,
    last_good: Arc<Snapshot>,
    overlay: Arc<BTreeMap<String, FieldReading>>,
    stats: CacheStats,
}

/// Consistent read of the cache taken under a single lock acquisition.
#[derive(Debug, Clone)]
pub struct CacheView {
    pub current: Arc<Snapshot>,
    pub last_good: Arc<Snapshot>,
    overlay: Arc<BTreeMap<String, FieldReading>>,
}

impl CacheView {
    pub fn is_reachable(&self) -> bool {
        self.current.is_reachable()
    }

    /// Reads a field. Optimistic patches only shadow the current snapshot.
    pub fn read(&self, source: Source, field: &str) -> Option<FieldReading> {
        match source {
            Source::Current => self.overlay.get(field).cloned().or_else(|| {
                self.current
                    .get(field)
                    .cloned()
                    .map(FieldReading::Exact)
            }),
            Source::LastGood => self.last_good.get(field).cloned().map(FieldReading::Exact),
        }
    }
}

pub struct PollingCache {
    transport: Arc<dyn VehicleTransport>,
    config: CacheConfig,
    identity: Identity,
    refresh: Mutex<RefreshState>,
    shared: RwLock<Shared>,
}

impl PollingCache {
    /// Builds the cache and runs one unconditional refresh to capture the
    /// vehicle identity.
    pub async fn connect(
        transport: Arc<dyn VehicleTransport>,
        config: CacheConfig,
    ) -> Result<Arc<Self>, CacheError> {
        debug!("initialising polling cache");

        let mut refresh = RefreshState {
            last_refresh_at: None,
            // Start as online so an offline first poll pulls the last good record.
            was_reachable: true,
        };
        let shared = RwLock::new(Shared::default());
        run_cycle(&*transport, &config, &mut refresh, &shared, None).await;

        let identity = {
            let guard = shared.read();
            Identity::from_snapshot(&guard.current)
                .or_else(|| Identity::from_snapshot(&guard.last_good))
        }
        .ok_or(CacheError::IdentityUnavailable)?;

        info!(id = %identity.id, name = %identity.name(), "vehicle identity captured");

        Ok(Arc::new(Self {
            transport,
            config,
            identity,
            refresh: Mutex::new(refresh),
            shared,
        }))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn throttle_interval(&self) -> Duration {
        self.config.throttle_interval
    }

    /// Throttled refresh. Inside the window this returns the cached snapshot
    /// without touching the network.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        let mut refresh = self.refresh.lock().await;

        if let Some(at) = refresh.last_refresh_at {
            if at.elapsed() < self.config.throttle_interval {
                let mut shared = self.shared.write();
                shared.stats.throttled += 1;
                return Arc::clone(&shared.current);
            }
        }

        self.cycle_locked(&mut refresh).await
    }

    /// Refresh that ignores the throttle window but still restarts it.
    pub async fn force_refresh(&self) -> Arc<Snapshot> {
        let mut refresh = self.refresh.lock().await;
        self.cycle_locked(&mut refresh).await
    }

    async fn cycle_locked(&self, refresh: &mut RefreshState) -> Arc<Snapshot> {
        run_cycle(
            &*self.transport,
            &self.config,
            refresh,
            &self.shared,
            Some(&self.identity),
        )
        .await;
        self.current_snapshot()
    }

    pub fn is_reachable(&self) -> bool {
        self.shared.read().current.is_reachable()
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.shared.read().current)
    }

    pub fn last_good_snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.shared.read().last_good)
    }

    pub fn view(&self) -> CacheView {
        let shared = self.shared.read();
        CacheView {
            current: Arc::clone(&shared.current),
            last_good: Arc::clone(&shared.last_good),
            overlay: Arc::clone(&shared.overlay),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.read().stats.clone()
    }

    pub(crate) fn transport(&self) -> &dyn VehicleTransport {
        &*self.transport
    }

    /// Shadows a field of the current snapshot until the next executed refresh.
    pub(crate) fn patch(&self, field: &str, reading: FieldReading) {
        let mut shared = self.shared.write();
        Arc::make_mut(&mut shared.overlay).insert(field.to_string(), reading);
    }
}

async fn run_cycle(
    transport: &dyn VehicleTransport,
    config: &CacheConfig,
    refresh: &mut RefreshState,
    shared: &RwLock<Shared>,
    identity: Option<&Identity>,
) {
    let live = fetch_bounded(config.fetch_timeout, transport.fetch_live(), "live");
    let (current, live_failed) = match live.await {
        Ok(snapshot) => (snapshot, false),
        Err(_) => (Snapshot::empty(), true),
    };
    let reachable = current.is_reachable();

    if let (Some(identity), true) = (identity, reachable) {
        if !identity.matches(&current) {
            warn!(
                expected_id = %identity.id,
                reported_id = ?current.get("id"),
                "vehicle identity changed; keeping the first identity"
            );
        }
    }

    // Only an online to offline edge pulls the last good record.
    let mut last_good_fetch = None;
    if !reachable && refresh.was_reachable {
        info!("vehicle went offline, fetching last good record");
        let fetched =
            fetch_bounded(config.fetch_timeout, transport.fetch_last_good(), "last good").await;
        last_good_fetch = Some(fetched);
    } else if reachable && !refresh.was_reachable {
        info!("vehicle back online");
    }
    refresh.was_reachable = reachable;
    refresh.last_refresh_at = Some(Instant::now());

    let current = Arc::new(current);
    let mut shared = shared.write();
    shared.stats.refreshes += 1;
    shared.stats.live_fetches += 1;
    shared.stats.last_refreshed = Some(Utc::now());
    if live_failed {
        shared.stats.transport_failures += 1;
    }

    if reachable {
        shared.last_good = Arc::clone(&current);
    }
    match last_good_fetch {
        Some(Ok(snapshot)) if snapshot.is_reachable() => {
            shared.stats.last_good_fetches += 1;
            shared.last_good = Arc::new(snapshot);
        }
        Some(Ok(_)) => {
            shared.stats.last_good_fetches += 1;
            warn!("last good record carries no vehicle id, keeping the previous one");
        }
        Some(Err(_)) => {
            shared.stats.last_good_fetches += 1;
            shared.stats.transport_failures += 1;
        }
        None => {}
    }

    shared.current = current;
    shared.overlay = Arc::default();
}

async fn fetch_bounded<F>(
    limit: Duration,
    fetch: F,
    endpoint: &str,
) -> Result<Snapshot, TransportError>
where
    F: Future<Output = Result<Snapshot, TransportError>>,
{
    let result = match timeout(limit, fetch).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    };
    if let Err(err) = &result {
        warn!(endpoint, error = %err, "fetch failed, treating vehicle as unreachable");
    }
    result
}

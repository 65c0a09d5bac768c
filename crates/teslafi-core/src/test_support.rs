use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::cache::PollingCache;
use crate::config::CacheConfig;
use crate::snapshot::Snapshot;
use crate::transport::{CommandResponse, TransportError, VehicleTransport};

pub const VIN: &str = "5YJ3E1EA7KF000123";

#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail,
}

/// Replays scripted replies per endpoint. The last reply of each script
/// repeats once the script is exhausted.
pub struct ScriptedTransport {
    live: Mutex<VecDeque<Reply<Snapshot>>>,
    last_good: Mutex<VecDeque<Reply<Snapshot>>>,
    commands: Mutex<VecDeque<Reply<Value>>>,
    pub live_calls: AtomicUsize,
    pub last_good_calls: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            live: Mutex::new(VecDeque::new()),
            last_good: Mutex::new(VecDeque::new()),
            commands: Mutex::new(VecDeque::new()),
            live_calls: AtomicUsize::new(0),
            last_good_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn live(self, replies: impl IntoIterator<Item = Reply<Snapshot>>) -> Self {
        self.live.lock().extend(replies);
        self
    }

    pub fn last_good(self, replies: impl IntoIterator<Item = Reply<Snapshot>>) -> Self {
        self.last_good.lock().extend(replies);
        self
    }

    pub fn commands(self, replies: impl IntoIterator<Item = Reply<Value>>) -> Self {
        self.commands.lock().extend(replies);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Appends replies after construction; clears a sticky last reply first.
    pub fn push_live(&self, reply: Reply<Snapshot>) {
        let mut live = self.live.lock();
        live.clear();
        live.push_back(reply);
    }

    pub fn live_calls(&self) -> usize {
        self.live_calls.load(Ordering::SeqCst)
    }

    pub fn last_good_calls(&self) -> usize {
        self.last_good_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn next<T: Clone>(script: &Mutex<VecDeque<Reply<T>>>) -> Result<T, TransportError> {
    let mut script = script.lock();
    let reply = if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    };
    match reply {
        Some(Reply::Ok(value)) => Ok(value),
        Some(Reply::Fail) | None => Err(TransportError::Status { status: 503 }),
    }
}

#[async_trait]
impl VehicleTransport for ScriptedTransport {
    async fn fetch_live(&self) -> Result<Snapshot, TransportError> {
        self.live_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        next(&self.live)
    }

    async fn fetch_last_good(&self) -> Result<Snapshot, TransportError> {
        self.last_good_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        next(&self.last_good)
    }

    async fn send_command(&self, command: &str) -> Result<CommandResponse, TransportError> {
        self.sent.lock().push(command.to_string());
        self.pause().await;
        next(&self.commands).map(CommandResponse::new)
    }
}

pub fn snapshot(value: Value) -> Snapshot {
    match value {
        Value::Object(map) => Snapshot::from_vars(map.into_iter().collect()),
        _ => Snapshot::empty(),
    }
}

/// Reachable snapshot for the test vehicle with extra fields merged in.
pub fn online(extra: Value) -> Snapshot {
    let mut base = snapshot(json!({
        "id": "7",
        "vehicle_id": 1234,
        "display_name": "Red Car",
        "vin": VIN,
    }));
    base.vars.extend(snapshot(extra).vars);
    base
}

pub fn offline() -> Snapshot {
    snapshot(json!({ "id": null }))
}

pub fn config() -> CacheConfig {
    CacheConfig {
        throttle_interval: Duration::from_secs(60),
        fetch_timeout: Duration::from_secs(5),
    }
}

pub async fn connect(transport: &Arc<ScriptedTransport>) -> Arc<PollingCache> {
    PollingCache::connect(transport.clone(), config())
        .await
        .expect("cache connects")
}

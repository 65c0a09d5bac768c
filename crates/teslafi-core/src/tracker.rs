use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::PollingCache;
use crate::facade::{Availability, DeviceFacade, FacadeKind, FacadeReading, FacadeValue, Position};
use crate::snapshot::FieldReading;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionUpdate {
    pub dev_id: String,
    pub host_name: String,
    pub position: Position,
}

pub struct LocationTracker {
    cache: Arc<PollingCache>,
    suffix: String,
    latitude_field: String,
    longitude_field: String,
    assume_when_offline: bool,
}

impl LocationTracker {
    pub fn new(cache: Arc<PollingCache>, suffix: &str, assume_when_offline: bool) -> Self {
        Self {
            cache,
            suffix: suffix.to_string(),
            latitude_field: "latitude".to_string(),
            longitude_field: "longitude".to_string(),
            assume_when_offline,
        }
    }

    /// Tracker tick: throttled refresh, then the update to publish, if any.
    pub async fn update_info(&self) -> Option<PositionUpdate> {
        self.update().await;
        self.position_update()
    }

    /// `None` whenever the tracker is unavailable, even if stale
    /// coordinates are still cached.
    pub fn position_update(&self) -> Option<PositionUpdate> {
        let Some(FacadeValue::Position(position)) = self.read().value else {
            return None;
        };
        let update = PositionUpdate {
            dev_id: self.unique_id(),
            host_name: self.name(),
            position,
        };
        debug!(name = %update.host_name, "updating device position");
        Some(update)
    }
}

#[async_trait]
impl DeviceFacade for LocationTracker {
    fn kind(&self) -> FacadeKind {
        FacadeKind::Tracker
    }

    fn suffix(&self) -> &str {
        &self.suffix
    }

    fn cache(&self) -> &PollingCache {
        &self.cache
    }

    fn read(&self) -> FacadeReading {
        let view = self.cache.view();
        let availability = Availability::derive(view.is_reachable(), self.assume_when_offline);
        let value = availability.source.and_then(|source| {
            let latitude = coordinate(view.read(source, &self.latitude_field))?;
            let longitude = coordinate(view.read(source, &self.longitude_field))?;
            Some(FacadeValue::Position(Position {
                latitude,
                longitude,
            }))
        });

        FacadeReading {
            available: availability.available,
            assumed: availability.assumed,
            value,
        }
    }
}

fn coordinate(reading: Option<FieldReading>) -> Option<f64> {
    match reading? {
        FieldReading::Exact(Value::Number(n)) => n.as_f64(),
        FieldReading::Exact(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

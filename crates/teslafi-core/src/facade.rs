//! Read side shared by every vehicle facade.
//!
//! A facade binds one cache field and an assumed-state policy. Nothing is
//! stored between reads: availability and value are derived from the cache
//! each time.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::{PollingCache, Source};
use crate::command::{CommandError, CommandOutcome};
use crate::snapshot::{literal_matches, FieldReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FacadeKind {
    Sensor,
    BinarySensor,
    Lock,
    Switch,
    Tracker,
}

impl FacadeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Lock => "lock",
            Self::Switch => "switch",
            Self::Tracker => "tracker",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FacadeValue {
    Raw(Value),
    State(bool),
    Position(Position),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    On,
    Off,
}

/// Live value, assumed value from the last good snapshot, or unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    pub assumed: bool,
    pub source: Option<Source>,
}

impl Availability {
    pub fn derive(reachable: bool, assume_when_offline: bool) -> Self {
        if reachable {
            Self {
                available: true,
                assumed: false,
                source: Some(Source::Current),
            }
        } else if assume_when_offline {
            Self {
                available: true,
                assumed: true,
                source: Some(Source::LastGood),
            }
        } else {
            Self {
                available: false,
                assumed: false,
                source: None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacadeReading {
    pub available: bool,
    pub assumed: bool,
    pub value: Option<FacadeValue>,
}

/// How a facade turns a field reading into its externally visible value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    Raw,
    Match { on: String },
    /// For fields whose "on" literal means the opposite, e.g. `Disconnected`.
    MatchInverted { on: String },
}

impl Interpretation {
    pub fn interpret(&self, reading: &FieldReading) -> Option<FacadeValue> {
        match self {
            Self::Raw => match reading {
                FieldReading::Exact(value) => Some(FacadeValue::Raw(value.clone())),
                FieldReading::Not(_) => None,
            },
            Self::Match { on } => matches_on(reading, on).map(FacadeValue::State),
            Self::MatchInverted { on } => {
                matches_on(reading, on).map(|hit| FacadeValue::State(!hit))
            }
        }
    }
}

fn matches_on(reading: &FieldReading, on: &str) -> Option<bool> {
    match reading {
        FieldReading::Exact(value) => Some(literal_matches(value, on)),
        FieldReading::Not(value) if literal_matches(value, on) => Some(false),
        FieldReading::Not(_) => None,
    }
}

#[async_trait]
pub trait DeviceFacade: Send + Sync {
    fn kind(&self) -> FacadeKind;
    fn suffix(&self) -> &str;
    fn cache(&self) -> &PollingCache;
    fn read(&self) -> FacadeReading;

    fn value(&self) -> Option<FacadeValue> {
        self.read().value
    }

    fn is_available(&self) -> bool {
        self.read().available
    }

    fn is_assumed_state(&self) -> bool {
        self.read().assumed
    }

    fn name(&self) -> String {
        self.cache().identity().entity_name(self.suffix())
    }

    fn unique_id(&self) -> String {
        self.cache().identity().entity_unique_id(self.suffix())
    }

    /// Poll tick. Goes through the shared throttle, never forces a fetch.
    async fn update(&self) {
        debug!(facade = %self.name(), "updating facade");
        self.cache().refresh().await;
    }

    async fn perform_action(&self, _intent: Intent) -> Result<CommandOutcome, CommandError> {
        Err(CommandError::Unsupported(self.name()))
    }
}

/// Sensor or binary sensor bound to a single field.
pub struct FieldFacade {
    cache: Arc<PollingCache>,
    kind: FacadeKind,
    suffix: String,
    field: String,
    interpretation: Interpretation,
    assume_when_offline: bool,
}

impl FieldFacade {
    pub fn sensor(
        cache: Arc<PollingCache>,
        suffix: &str,
        field: &str,
        assume_when_offline: bool,
    ) -> Self {
        Self::new(
            cache,
            FacadeKind::Sensor,
            suffix,
            field,
            Interpretation::Raw,
            assume_when_offline,
        )
    }

    pub fn binary(
        cache: Arc<PollingCache>,
        suffix: &str,
        field: &str,
        on: &str,
        assume_when_offline: bool,
    ) -> Self {
        let interpretation = Interpretation::Match { on: on.to_string() };
        Self::new(
            cache,
            FacadeKind::BinarySensor,
            suffix,
            field,
            interpretation,
            assume_when_offline,
        )
    }

    pub fn binary_inverted(
        cache: Arc<PollingCache>,
        suffix: &str,
        field: &str,
        on: &str,
        assume_when_offline: bool,
    ) -> Self {
        let interpretation = Interpretation::MatchInverted { on: on.to_string() };
        Self::new(
            cache,
            FacadeKind::BinarySensor,
            suffix,
            field,
            interpretation,
            assume_when_offline,
        )
    }

    pub fn new(
        cache: Arc<PollingCache>,
        kind: FacadeKind,
        suffix: &str,
        field: &str,
        interpretation: Interpretation,
        assume_when_offline: bool,
    ) -> Self {
        Self {
            cache,
            kind,
            suffix: suffix.to_string(),
            field: field.to_string(),
            interpretation,
            assume_when_offline,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Boolean view for binary interpretations; `None` when unavailable.
    pub fn state(&self) -> Option<bool> {
        match self.read().value {
            Some(FacadeValue::State(on)) => Some(on),
            _ => None,
        }
    }
}

#[async_trait]
impl DeviceFacade for FieldFacade {
    fn kind(&self) -> FacadeKind {
        self.kind
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
        let value = availability
            .source
            .and_then(|source| view.read(source, &self.field))
            .and_then(|reading| self.interpretation.interpret(&reading));

        FacadeReading {
            available: availability.available,
            assumed: availability.assumed,
            value,
        }
    }
}

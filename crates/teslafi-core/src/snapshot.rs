use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded poll result. Reachability is derived from the `id` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub vars: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_vars(vars: BTreeMap<String, Value>) -> Self {
        Self { vars }
    }

    pub fn is_reachable(&self) -> bool {
        self.vars.get("id").is_some_and(|id| !id.is_null())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.vars.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.vars.get(field).and_then(Value::as_str)
    }
}

/// What is known about a single field at read time.
///
/// Polled data is always `Exact`. `Not` only comes from an optimistic command
/// patch that learned the field is *not* the given literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldReading {
    Exact(Value),
    Not(Value),
}

/// Compares a polled value against a configured literal. The feed reports
/// most scalars as strings, so numbers and booleans compare by their text.
pub fn literal_matches(value: &Value, literal: &str) -> bool {
    match value {
        Value::String(s) => s == literal,
        Value::Number(n) => n.to_string() == literal,
        Value::Bool(b) => b.to_string().eq_ignore_ascii_case(literal),
        _ => false,
    }
}

/// Vehicle identity captured once when the cache is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub vehicle_id: Option<String>,
    pub display_name: Option<String>,
    pub vin: String,
}

impl Identity {
    /// Returns `None` unless the snapshot is reachable and carries a VIN.
    pub fn from_snapshot(snapshot: &Snapshot) -> Option<Self> {
        if !snapshot.is_reachable() {
            return None;
        }

        let id = scalar_text(snapshot.get("id")?)?;
        let vin = snapshot.str_field("vin")?.to_string();
        let vehicle_id = snapshot.get("vehicle_id").and_then(scalar_text);
        let display_name = snapshot
            .str_field("display_name")
            .map(|name| name.replace(' ', "").to_lowercase())
            .filter(|name| !name.is_empty());

        Some(Self {
            id,
            vehicle_id,
            display_name,
            vin,
        })
    }

    pub fn name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.uniq_name())
    }

    /// Last six characters of the VIN.
    pub fn uniq_name(&self) -> String {
        let skip = self.vin.chars().count().saturating_sub(6);
        self.vin.chars().skip(skip).collect()
    }

    pub fn entity_name(&self, suffix: &str) -> String {
        format!("teslafi_{}{suffix}", self.name())
    }

    pub fn entity_unique_id(&self, suffix: &str) -> String {
        format!("teslafi_{}{suffix}", self.uniq_name())
    }

    /// True when a reachable snapshot reports the same vehicle.
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        let same_id = snapshot
            .get("id")
            .and_then(scalar_text)
            .is_none_or(|id| id == self.id);
        let same_vin = snapshot.str_field("vin").is_none_or(|vin| vin == self.vin);
        same_id && same_vin
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

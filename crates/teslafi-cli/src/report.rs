use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use teslafi_core::{
    CacheStats, DeviceFacade, FacadeKind, FacadeValue, Identity, PollingCache, PositionUpdate,
    VehicleFacades,
};

use crate::OutputFormat;

#[derive(Debug, Clone, Serialize)]
pub struct FacadeRow {
    pub name: String,
    pub unique_id: String,
    pub kind: FacadeKind,
    pub available: bool,
    pub assumed: bool,
    pub value: Option<FacadeValue>,
}

impl FacadeRow {
    pub fn from_facade(facade: &dyn DeviceFacade) -> Self {
        let reading = facade.read();
        Self {
            name: facade.name(),
            unique_id: facade.unique_id(),
            kind: facade.kind(),
            available: reading.available,
            assumed: reading.assumed,
            value: reading.value,
        }
    }

    /// `unavailable`, the value, or the value marked as assumed.
    pub fn state_label(&self) -> String {
        if !self.available {
            return "unavailable".to_string();
        }
        let value = match &self.value {
            None => "unknown".to_string(),
            Some(FacadeValue::State(on)) => (if *on { "on" } else { "off" }).to_string(),
            Some(FacadeValue::Raw(serde_json::Value::String(s))) => s.clone(),
            Some(FacadeValue::Raw(other)) => other.to_string(),
            Some(FacadeValue::Position(p)) => format!("{:.5}, {:.5}", p.latitude, p.longitude),
        };
        if self.assumed {
            format!("{value} (assumed)")
        } else {
            value
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub ts: DateTime<Utc>,
    pub vehicle: Identity,
    pub reachable: bool,
    pub stats: CacheStats,
    pub facades: Vec<FacadeRow>,
}

impl Report {
    pub fn collect(cache: &PollingCache, facades: &VehicleFacades) -> Self {
        Self {
            ts: Utc::now(),
            vehicle: cache.identity().clone(),
            reachable: cache.is_reachable(),
            stats: cache.stats(),
            facades: facades.all().into_iter().map(FacadeRow::from_facade).collect(),
        }
    }

    pub fn print(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(self)?),
            OutputFormat::Ndjson => println!("{}", serde_json::to_string(self)?),
            OutputFormat::Human => print!("{}", self.render_human()),
        }
        Ok(())
    }

    pub fn render_human(&self) -> String {
        let mut out = String::new();
        out.push_str("=== TeslaFi Vehicle ===\n");
        out.push_str(&format!("Time:       {}\n", self.ts.to_rfc3339()));
        out.push_str(&format!(
            "Vehicle:    {} (vin ..{}, id {})\n",
            self.vehicle.name(),
            self.vehicle.uniq_name(),
            self.vehicle.id
        ));
        out.push_str(&format!(
            "State:      reachable={} refreshes={} throttled={} failures={}\n",
            self.reachable,
            self.stats.refreshes,
            self.stats.throttled,
            self.stats.transport_failures,
        ));
        if let Some(at) = self.stats.last_refreshed {
            out.push_str(&format!("Refreshed:  {}\n", at.to_rfc3339()));
        }
        for row in &self.facades {
            out.push_str(&format!(
                "  {:<14} {:<44} {}\n",
                row.kind.as_str(),
                row.name,
                row.state_label()
            ));
        }
        out
    }
}

pub fn print_position(update: &PositionUpdate, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(update)?),
        OutputFormat::Ndjson => println!("{}", serde_json::to_string(update)?),
        OutputFormat::Human => println!(
            "Position:   {} {:.5}, {:.5}",
            update.host_name, update.position.latitude, update.position.longitude
        ),
    }
    Ok(())
}

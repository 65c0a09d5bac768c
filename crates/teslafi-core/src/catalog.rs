use std::sync::Arc;

use crate::actuator::{Lock, Switch};
use crate::cache::PollingCache;
use crate::command::{BinaryCommand, CommandExecutor, Confirmation};
use crate::facade::{DeviceFacade, FieldFacade};
use crate::tracker::LocationTracker;

pub const LOCK_SUFFIX: &str = "_door_lock";
pub const WAKE_SUFFIX: &str = "_wake";
pub const TRACKER_SUFFIX: &str = "_device_tracker";

/// (suffix, field, assume when offline)
const SENSORS: [(&str, &str, bool); 8] = [
    ("_state", "carState", false),
    ("_location", "location", false),
    ("_charging_state", "charging_state", false),
    ("_charging_current", "charger_actual_current", false),
    ("_charge_energy_added", "charge_energy_added", false),
    ("_last_seen", "Date", true),
    ("_battery_level", "battery_level", true),
    ("_usable_battery_level", "usable_battery_level", true),
];

/// (suffix, field, on literal)
const BINARY_SENSORS: [(&str, &str, &str); 3] = [
    ("_status", "state", "online"),
    ("_charge_enable", "charge_enable_request", "1"),
    ("_climate", "is_climate_on", "1"),
];

/// The standard facade set for one vehicle, all sharing one cache and one
/// command executor.
pub struct VehicleFacades {
    pub executor: Arc<CommandExecutor>,
    pub sensors: Vec<FieldFacade>,
    pub binary_sensors: Vec<FieldFacade>,
    pub lock: Lock,
    pub wake: Switch,
    pub tracker: LocationTracker,
}

impl VehicleFacades {
    pub fn build(cache: &Arc<PollingCache>) -> Self {
        let executor = Arc::new(CommandExecutor::new(Arc::clone(cache)));

        let sensors = SENSORS
            .iter()
            .map(|(suffix, field, assume)| {
                FieldFacade::sensor(Arc::clone(cache), suffix, field, *assume)
            })
            .collect();

        let mut binary_sensors: Vec<FieldFacade> = BINARY_SENSORS
            .iter()
            .map(|(suffix, field, on)| {
                FieldFacade::binary(Arc::clone(cache), suffix, field, on, false)
            })
            .collect();
        // Plugged in unless the charger reports "Disconnected".
        binary_sensors.push(FieldFacade::binary_inverted(
            Arc::clone(cache),
            "_charge_plug",
            "charging_state",
            "Disconnected",
            false,
        ));

        let lock = Lock::new(
            Arc::clone(&executor),
            LOCK_SUFFIX,
            BinaryCommand {
                field: "locked".to_string(),
                on_literal: "True".to_string(),
                on_command: "door_lock".to_string(),
                off_command: Some("door_unlock".to_string()),
                confirmation: Confirmation::ResultFlag,
            },
            false,
        );

        let wake = Switch::new(
            Arc::clone(&executor),
            WAKE_SUFFIX,
            BinaryCommand {
                field: "state".to_string(),
                on_literal: "online".to_string(),
                on_command: "wake_up".to_string(),
                off_command: None,
                confirmation: Confirmation::FieldEcho,
            },
            false,
        );

        let tracker = LocationTracker::new(Arc::clone(cache), TRACKER_SUFFIX, false);

        Self {
            executor,
            sensors,
            binary_sensors,
            lock,
            wake,
            tracker,
        }
    }

    pub fn all(&self) -> Vec<&dyn DeviceFacade> {
        let mut all: Vec<&dyn DeviceFacade> = Vec::new();
        all.extend(self.sensors.iter().map(|f| f as &dyn DeviceFacade));
        all.extend(self.binary_sensors.iter().map(|f| f as &dyn DeviceFacade));
        all.push(&self.lock);
        all.push(&self.wake);
        all.push(&self.tracker);
        all
    }
}

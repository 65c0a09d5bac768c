pub mod actuator;
pub mod cache;
pub mod catalog;
pub mod command;
pub mod config;
pub mod facade;
pub mod snapshot;
pub mod tracker;
pub mod transport;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod cache_tests;

pub use actuator::{Lock, Switch};
pub use cache::{CacheError, CacheStats, CacheView, PollingCache, Source};
pub use catalog::VehicleFacades;
pub use command::{BinaryCommand, CommandError, CommandExecutor, CommandOutcome, Confirmation};
pub use config::{CacheConfig, TransportConfig};
pub use facade::{
    Availability, DeviceFacade, FacadeKind, FacadeReading, FacadeValue, FieldFacade, Intent,
    Interpretation, Position,
};
pub use snapshot::{FieldReading, Identity, Snapshot};
pub use tracker::{LocationTracker, PositionUpdate};
pub use transport::{CommandResponse, HttpTransport, TransportError, VehicleTransport};

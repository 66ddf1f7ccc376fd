pub mod telemetry;

pub use telemetry::{
    NORMAL_BATTERY_STATUS, UNKNOWN,
    BatteryInfo, BatteryOverride, DroneState, Position, Property, PropertyChange,
};

use serde::{Deserialize, Serialize};

pub const UNKNOWN: &str = "unknown";
pub const NORMAL_BATTERY_STATUS: &str = "normal";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    /// Meters above home.
    pub alt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfo {
    pub voltage: f64,            // Volts, mean of the valid cells
    pub current: Option<f64>,    // Amps
    pub remaining: Option<f64>,  // Percent 0-100
    pub temperature: Option<f64>, // Celsius
    pub consumed_mah: Option<f64>,
    pub status: String,
}

impl Default for BatteryInfo {
    fn default() -> Self {
        Self {
            voltage: 0.0,
            current: None,
            remaining: None,
            temperature: None,
            consumed_mah: None,
            status: UNKNOWN.to_string(),
        }
    }
}

/// Partial battery reading laid over live telemetry.
///
/// `None` means "not overridden". For the nullable fields `Some(None)` is an
/// explicit override to null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatteryOverride {
    pub voltage: Option<f64>,
    pub current: Option<Option<f64>>,
    pub remaining: Option<Option<f64>>,
    pub temperature: Option<Option<f64>>,
    pub consumed_mah: Option<Option<f64>>,
    pub status: Option<String>,
}

impl BatteryOverride {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Shallow merge: fields present in `newer` replace ours.
    pub fn merge(&mut self, newer: BatteryOverride) {
        if newer.voltage.is_some() { self.voltage = newer.voltage; }
        if newer.current.is_some() { self.current = newer.current; }
        if newer.remaining.is_some() { self.remaining = newer.remaining; }
        if newer.temperature.is_some() { self.temperature = newer.temperature; }
        if newer.consumed_mah.is_some() { self.consumed_mah = newer.consumed_mah; }
        if newer.status.is_some() { self.status = newer.status; }
    }

    pub fn apply(&self, live: &BatteryInfo) -> BatteryInfo {
        BatteryInfo {
            voltage: self.voltage.unwrap_or(live.voltage),
            current: self.current.unwrap_or(live.current),
            remaining: self.remaining.unwrap_or(live.remaining),
            temperature: self.temperature.unwrap_or(live.temperature),
            consumed_mah: self.consumed_mah.unwrap_or(live.consumed_mah),
            status: self.status.clone().unwrap_or_else(|| live.status.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneState {
    pub armed: bool,
    pub mode: String,
    pub position: Position,
    pub groundspeed: f64,
    pub battery: BatteryInfo,
}

impl Default for DroneState {
    fn default() -> Self {
        Self {
            armed: false,
            mode: UNKNOWN.to_string(),
            position: Position::default(),
            groundspeed: 0.0,
            battery: BatteryInfo::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    Armed,
    Mode,
    Position,
    Groundspeed,
    Battery,
}

impl Property {
    pub const ALL: [Property; 5] = [
        Property::Armed,
        Property::Mode,
        Property::Position,
        Property::Groundspeed,
        Property::Battery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Armed => "armed",
            Property::Mode => "mode",
            Property::Position => "position",
            Property::Groundspeed => "groundspeed",
            Property::Battery => "battery",
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pushed to the transport whenever a cached property is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub property: Property,
    pub value: serde_json::Value,
}

impl PropertyChange {
    pub fn new<T: Serialize>(property: Property, value: &T) -> Self {
        Self {
            property,
            value: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        }
    }
}

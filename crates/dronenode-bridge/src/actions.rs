//! Action inputs, validated at the boundary.
//!
//! Each action has one accepted JSON shape. Unknown fields, wrong types and
//! out-of-range values are rejected with [`BridgeError::Validation`] before
//! anything reaches the link.

use std::fmt;
use std::str::FromStr;

use dronenode_fc::ModeInput;
use dronenode_proto::BatteryOverride;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionName {
    Arm,
    Disarm,
    Takeoff,
    SetMode,
    SetSpeed,
    Goto,
    Rtl,
    Land,
    SetHome,
    SetYaw,
    SimulateBattery,
}

impl ActionName {
    pub const ALL: [ActionName; 11] = [
        ActionName::Arm,
        ActionName::Disarm,
        ActionName::Takeoff,
        ActionName::SetMode,
        ActionName::SetSpeed,
        ActionName::Goto,
        ActionName::Rtl,
        ActionName::Land,
        ActionName::SetHome,
        ActionName::SetYaw,
        ActionName::SimulateBattery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::Arm => "arm",
            ActionName::Disarm => "disarm",
            ActionName::Takeoff => "takeoff",
            ActionName::SetMode => "setMode",
            ActionName::SetSpeed => "setSpeed",
            ActionName::Goto => "goto",
            ActionName::Rtl => "rtl",
            ActionName::Land => "land",
            ActionName::SetHome => "setHome",
            ActionName::SetYaw => "setYaw",
            ActionName::SimulateBattery => "simulateBattery",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| BridgeError::validation(format!("unknown action {s:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedKind {
    Air,
    Ground,
}

impl SpeedKind {
    /// DO_CHANGE_SPEED param1.
    pub fn code(&self) -> f32 {
        match self {
            SpeedKind::Air => 0.0,
            SpeedKind::Ground => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedRequest {
    pub kind: SpeedKind,
    pub speed: f32,
    /// Percent; -1 leaves throttle unchanged.
    pub throttle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GotoRequest {
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    pub yaw: Option<f32>,
    /// Only a positive speed produces a speed-change command.
    pub speed: Option<f32>,
    /// None uses the configured default radius.
    pub acceptance_radius: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HomeRequest {
    Current,
    At { lat: f32, lon: f32, alt: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YawRequest {
    pub yaw: f32,
    pub speed: f32,
    /// -1 counter-clockwise, 1 clockwise.
    pub direction: i8,
    pub relative: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatteryRequest {
    Clear,
    Merge(BatteryOverride),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Arm,
    Disarm,
    Takeoff { alt: f32 },
    SetMode(ModeInput),
    SetSpeed(SpeedRequest),
    Goto(GotoRequest),
    Rtl,
    Land,
    SetHome(HomeRequest),
    SetYaw(YawRequest),
    SimulateBattery(BatteryRequest),
}

impl Action {
    pub fn name(&self) -> ActionName {
        match self {
            Action::Arm => ActionName::Arm,
            Action::Disarm => ActionName::Disarm,
            Action::Takeoff { .. } => ActionName::Takeoff,
            Action::SetMode(_) => ActionName::SetMode,
            Action::SetSpeed(_) => ActionName::SetSpeed,
            Action::Goto(_) => ActionName::Goto,
            Action::Rtl => ActionName::Rtl,
            Action::Land => ActionName::Land,
            Action::SetHome(_) => ActionName::SetHome,
            Action::SetYaw(_) => ActionName::SetYaw,
            Action::SimulateBattery(_) => ActionName::SimulateBattery,
        }
    }

    /// Parses and validates the input for `name`.
    pub fn from_json(name: &str, input: &Value) -> Result<Self, BridgeError> {
        let name: ActionName = name.parse()?;
        let action = match name {
            ActionName::Arm => no_input(name, input).map(|_| Action::Arm)?,
            ActionName::Disarm => no_input(name, input).map(|_| Action::Disarm)?,
            ActionName::Rtl => no_input(name, input).map(|_| Action::Rtl)?,
            ActionName::Land => no_input(name, input).map(|_| Action::Land)?,
            ActionName::Takeoff => {
                let i: TakeoffInput = parse(name, input)?;
                Action::Takeoff { alt: required(i.alt, "alt")? as f32 }
            }
            ActionName::SetMode => Action::SetMode(ModeInput::from_json(input)?),
            ActionName::SetSpeed => {
                let i: SetSpeedInput = parse(name, input)?;
                Action::SetSpeed(SpeedRequest {
                    kind: i.kind.unwrap_or(SpeedKind::Ground),
                    speed: required(i.speed, "speed")? as f32,
                    throttle: i.throttle.unwrap_or(-1.0) as f32,
                })
            }
            ActionName::Goto => {
                let i: GotoInput = parse(name, input)?;
                Action::Goto(GotoRequest {
                    lat: required(i.lat, "lat")?,
                    lon: required(i.lon, "lon")?,
                    alt: required(i.alt, "alt")? as f32,
                    yaw: i.yaw.map(|y| y as f32),
                    speed: i.speed.map(|s| s as f32),
                    acceptance_radius: i.acceptance.map(|a| a as f32),
                })
            }
            ActionName::SetHome => {
                let i: SetHomeInput = parse(name, input)?;
                if i.use_current {
                    Action::SetHome(HomeRequest::Current)
                } else {
                    match (i.lat, i.lon, i.alt) {
                        (Some(lat), Some(lon), Some(alt)) => Action::SetHome(HomeRequest::At {
                            lat: lat as f32,
                            lon: lon as f32,
                            alt: alt as f32,
                        }),
                        _ => {
                            return Err(BridgeError::validation(
                                "setHome: lat, lon and alt are required unless useCurrent is true",
                            ))
                        }
                    }
                }
            }
            ActionName::SetYaw => {
                let i: SetYawInput = parse(name, input)?;
                Action::SetYaw(YawRequest {
                    yaw: required(i.yaw, "yaw")? as f32,
                    speed: i.speed.unwrap_or(20.0) as f32,
                    direction: i.direction.unwrap_or(1),
                    relative: i.relative.unwrap_or(false),
                })
            }
            ActionName::SimulateBattery => {
                let i: SimulateBatteryInput = parse(name, input)?;
                Action::SimulateBattery(i.into_request()?)
            }
        };
        action.validate()?;
        Ok(action)
    }

    /// Range checks shared by JSON and typed callers.
    pub fn validate(&self) -> Result<(), BridgeError> {
        match self {
            Action::Takeoff { alt } => {
                if !alt.is_finite() || *alt <= 0.0 {
                    return Err(BridgeError::validation(format!("takeoff: alt must be a positive number, got {alt}")));
                }
            }
            Action::SetSpeed(req) => {
                if !req.speed.is_finite() || req.speed <= 0.0 {
                    return Err(BridgeError::validation(format!(
                        "setSpeed: speed must be a positive number, got {}",
                        req.speed
                    )));
                }
                if !(-1.0..=100.0).contains(&req.throttle) {
                    return Err(BridgeError::validation(format!(
                        "setSpeed: throttle must be within -1..=100, got {}",
                        req.throttle
                    )));
                }
            }
            Action::Goto(req) => {
                if !(req.lat.is_finite() && req.lon.is_finite() && req.alt.is_finite()) {
                    return Err(BridgeError::validation("goto: lat/lon/alt must be finite numbers"));
                }
                check_lat_lon("goto", req.lat, req.lon)?;
                if req.acceptance_radius.is_some_and(|a| !a.is_finite() || a < 1.0) {
                    return Err(BridgeError::validation("goto: acceptance must be at least 1 m"));
                }
                if req.speed.is_some_and(|s| !s.is_finite() || s < 0.0) {
                    return Err(BridgeError::validation("goto: speed must be a non-negative number"));
                }
            }
            Action::SetHome(HomeRequest::At { lat, lon, alt }) => {
                if !(lat.is_finite() && lon.is_finite() && alt.is_finite()) {
                    return Err(BridgeError::validation("setHome: lat/lon/alt must be finite numbers"));
                }
                check_lat_lon("setHome", f64::from(*lat), f64::from(*lon))?;
            }
            Action::SetYaw(req) => {
                if !req.yaw.is_finite() || !req.speed.is_finite() {
                    return Err(BridgeError::validation("setYaw: yaw and speed must be finite numbers"));
                }
                if req.direction != 1 && req.direction != -1 {
                    return Err(BridgeError::validation(format!(
                        "setYaw: direction must be 1 or -1, got {}",
                        req.direction
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Out-of-range degrees would saturate in the 1e7 fixed-point encoding.
fn check_lat_lon(action: &str, lat: f64, lon: f64) -> Result<(), BridgeError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(BridgeError::validation(format!(
            "{action}: lat must be within ±90 and lon within ±180, got {lat}, {lon}"
        )));
    }
    Ok(())
}

fn parse<T: DeserializeOwned>(name: ActionName, input: &Value) -> Result<T, BridgeError> {
    // A bare null means "no fields"; the per-field checks then report what is missing.
    let input = match input {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(input).map_err(|e| BridgeError::validation(format!("{name}: {e}")))
}

fn no_input(name: ActionName, input: &Value) -> Result<(), BridgeError> {
    match input {
        Value::Null => Ok(()),
        Value::Object(m) if m.is_empty() => Ok(()),
        other => Err(BridgeError::validation(format!("{name} takes no input, got {other}"))),
    }
}

fn required(v: Option<f64>, field: &str) -> Result<f64, BridgeError> {
    v.ok_or_else(|| BridgeError::validation(format!("{field} is required")))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TakeoffInput {
    alt: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetSpeedInput {
    #[serde(rename = "type", default, deserialize_with = "speed_kind")]
    kind: Option<SpeedKind>,
    speed: Option<f64>,
    throttle: Option<f64>,
}

fn speed_kind<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SpeedKind>, D::Error> {
    match Option::<String>::deserialize(d)?.as_deref() {
        None => Ok(None),
        Some("ground") => Ok(Some(SpeedKind::Ground)),
        Some("air") => Ok(Some(SpeedKind::Air)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "type must be \"ground\" or \"air\", got {other:?}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GotoInput {
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<f64>,
    yaw: Option<f64>,
    speed: Option<f64>,
    acceptance: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct SetHomeInput {
    #[serde(default)]
    use_current: bool,
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SetYawInput {
    yaw: Option<f64>,
    speed: Option<f64>,
    direction: Option<i8>,
    relative: Option<bool>,
}

/// A number, or a string holding one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn coerce(&self, field: &str) -> Result<f64, BridgeError> {
        let v = match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse::<f64>().ok(),
        };
        v.filter(|v| v.is_finite())
            .ok_or_else(|| BridgeError::validation(format!("simulateBattery: {field} is not a number")))
    }
}

/// Keeps "absent" (`None`) apart from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct SimulateBatteryInput {
    active: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    voltage: Option<Option<Numeric>>,
    #[serde(default, deserialize_with = "present")]
    current: Option<Option<Numeric>>,
    #[serde(default, deserialize_with = "present")]
    remaining: Option<Option<Numeric>>,
    #[serde(default, deserialize_with = "present")]
    temperature: Option<Option<Numeric>>,
    #[serde(default, deserialize_with = "present")]
    consumed_mah: Option<Option<Numeric>>,
    status: Option<String>,
}

impl SimulateBatteryInput {
    fn into_request(self) -> Result<BatteryRequest, BridgeError> {
        let nullable = |v: Option<Option<Numeric>>, field: &str| -> Result<Option<Option<f64>>, BridgeError> {
            match v {
                None => Ok(None),
                Some(None) => Ok(Some(None)),
                Some(Some(n)) => n.coerce(field).map(|x| Some(Some(x))),
            }
        };

        let voltage = match self.voltage {
            None => None,
            Some(None) => return Err(BridgeError::validation("simulateBattery: voltage cannot be null")),
            Some(Some(n)) => Some(n.coerce("voltage")?),
        };
        let remaining = nullable(self.remaining, "remaining")?;
        if let Some(Some(r)) = remaining {
            if !(0.0..=100.0).contains(&r) {
                return Err(BridgeError::validation(format!(
                    "simulateBattery: remaining must be within 0..=100, got {r}"
                )));
            }
        }
        let fields = BatteryOverride {
            voltage,
            current: nullable(self.current, "current")?,
            remaining,
            temperature: nullable(self.temperature, "temperature")?,
            consumed_mah: nullable(self.consumed_mah, "consumedMah")?,
            status: self.status,
        };

        if self.active == Some(false) || fields.is_empty() {
            Ok(BatteryRequest::Clear)
        } else {
            Ok(BatteryRequest::Merge(fields))
        }
    }
}

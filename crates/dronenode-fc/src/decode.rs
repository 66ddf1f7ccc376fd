//! Raw mavlink2rest messages to typed state updates.
//!
//! Every decoder is total: missing or malformed fields become defaults or
//! nulls. `None` is only returned when the message is not a JSON object, so
//! the caller can decide not to apply anything.

use dronenode_proto::{BatteryInfo, Position, NORMAL_BATTERY_STATUS};
use mavlink::common::MavModeFlag;
use serde_json::Value;

use crate::modes::ModeTable;

/// Telemetry messages the poller reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryKind {
    Heartbeat,
    GlobalPosition,
    VfrHud,
    BatteryStatus,
}

impl TelemetryKind {
    pub const ALL: [TelemetryKind; 4] = [
        TelemetryKind::Heartbeat,
        TelemetryKind::GlobalPosition,
        TelemetryKind::VfrHud,
        TelemetryKind::BatteryStatus,
    ];

    pub fn message_name(&self) -> &'static str {
        match self {
            TelemetryKind::Heartbeat => "HEARTBEAT",
            TelemetryKind::GlobalPosition => "GLOBAL_POSITION_INT",
            TelemetryKind::VfrHud => "VFR_HUD",
            TelemetryKind::BatteryStatus => "BATTERY_STATUS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatUpdate {
    pub armed: bool,
    pub mode: String,
}

// Cell voltages outside (0, 65535) mean "not reported".
const CELL_MV_MAX: f64 = u16::MAX as f64;
// BATTERY_STATUS.temperature when unknown.
const TEMPERATURE_UNKNOWN: f64 = i16::MAX as f64;

fn number(msg: &Value, key: &str) -> Option<f64> {
    msg.get(key).and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// `base_mode` arrives as `{"bits": n}`; a bare number is accepted too.
fn mode_bits(msg: &Value) -> u64 {
    let raw = match msg.get("base_mode") {
        Some(Value::Object(o)) => o.get("bits"),
        other => other,
    };
    raw.and_then(|v| v.as_u64().or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)))
        .unwrap_or(0)
}

pub fn decode_heartbeat(msg: &Value, modes: &ModeTable) -> Option<HeartbeatUpdate> {
    if !msg.is_object() {
        return None;
    }
    let armed_bit = u64::from(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED.bits());
    let armed = mode_bits(msg) & armed_bit != 0;
    let mode = msg
        .get("custom_mode")
        .and_then(Value::as_u64)
        .and_then(|c| u32::try_from(c).ok())
        .map_or(dronenode_proto::UNKNOWN, |c| modes.code_to_name(c))
        .to_string();
    Some(HeartbeatUpdate { armed, mode })
}

pub fn decode_global_position(msg: &Value) -> Option<Position> {
    if !msg.is_object() {
        return None;
    }
    let alt_mm = number(msg, "relative_alt").or_else(|| number(msg, "alt")).unwrap_or(0.0);
    Some(Position {
        lat: number(msg, "lat").unwrap_or(0.0) / 1e7,
        lon: number(msg, "lon").unwrap_or(0.0) / 1e7,
        alt: alt_mm / 1000.0,
    })
}

/// Groundspeed (m/s) from VFR_HUD.
pub fn decode_vfr_hud(msg: &Value) -> Option<f64> {
    if !msg.is_object() {
        return None;
    }
    Some(number(msg, "groundspeed").unwrap_or(0.0))
}

pub fn decode_battery_status(msg: &Value) -> Option<BatteryInfo> {
    if !msg.is_object() {
        return None;
    }

    let cells: Vec<f64> = msg
        .get("voltages")
        .and_then(Value::as_array)
        .map(|vs| {
            vs.iter()
                .filter_map(Value::as_f64)
                .filter(|mv| *mv > 0.0 && *mv < CELL_MV_MAX)
                .collect()
        })
        .unwrap_or_default();
    let voltage = if cells.is_empty() {
        0.0
    } else {
        cells.iter().sum::<f64>() / cells.len() as f64 / 1000.0
    };

    // centi-amps, -1 = not measured
    let current = number(msg, "current_battery").filter(|c| *c >= 0.0).map(|c| c / 100.0);
    let remaining = number(msg, "battery_remaining").filter(|r| *r >= 0.0);
    let temperature = number(msg, "temperature")
        .filter(|t| *t != TEMPERATURE_UNKNOWN)
        .map(|t| t / 100.0);
    let consumed_mah = number(msg, "current_consumed").filter(|c| *c >= 0.0).map(|c| c / 1000.0);
    let status = msg
        .get("battery_function")
        .and_then(|f| f.get("type"))
        .and_then(Value::as_str)
        .unwrap_or(NORMAL_BATTERY_STATUS)
        .to_string();

    Some(BatteryInfo { voltage, current, remaining, temperature, consumed_mah, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn heartbeat_armed_and_mode() {
        let t = ModeTable::arducopter();
        let hb = decode_heartbeat(&json!({"base_mode": {"bits": 209}, "custom_mode": 4}), &t).unwrap();
        assert!(hb.armed);
        assert_eq!(hb.mode, "GUIDED");

        let hb = decode_heartbeat(&json!({"base_mode": {"bits": 81}, "custom_mode": 6}), &t).unwrap();
        assert!(!hb.armed);
        assert_eq!(hb.mode, "RTL");

        let hb = decode_heartbeat(&json!({"base_mode": 128, "custom_mode": 42}), &t).unwrap();
        assert!(hb.armed);
        assert_eq!(hb.mode, "unknown");
    }

    #[test]
    fn heartbeat_tolerates_garbage() {
        let t = ModeTable::arducopter();
        let hb = decode_heartbeat(&json!({"base_mode": "x"}), &t).unwrap();
        assert_eq!(hb, HeartbeatUpdate { armed: false, mode: "unknown".into() });
        assert!(decode_heartbeat(&json!("HEARTBEAT"), &t).is_none());
    }

    #[test]
    fn position_prefers_relative_alt() {
        let p = decode_global_position(&json!({
            "lat": 444_940_000, "lon": 113_420_000, "alt": 120_000, "relative_alt": 20_500
        }))
        .unwrap();
        assert!((p.lat - 44.494).abs() < 1e-9);
        assert!((p.lon - 11.342).abs() < 1e-9);
        assert_eq!(p.alt, 20.5);

        let p = decode_global_position(&json!({"lat": 0, "lon": 0, "alt": 120_000})).unwrap();
        assert_eq!(p.alt, 120.0);
    }

    #[test]
    fn groundspeed_defaults_to_zero() {
        assert_eq!(decode_vfr_hud(&json!({"groundspeed": 3.25})), Some(3.25));
        assert_eq!(decode_vfr_hud(&json!({"airspeed": 3.0})), Some(0.0));
    }

    #[test]
    fn battery_filters_sentinels() {
        let b = decode_battery_status(&json!({
            "voltages": [0, 12600, 70000],
            "current_battery": -1,
            "battery_remaining": -1,
        }))
        .unwrap();
        assert!((b.voltage - 12.6).abs() < 1e-9);
        assert_eq!(b.current, None);
        assert_eq!(b.remaining, None);
        assert_eq!(b.temperature, None);
        assert_eq!(b.consumed_mah, None);
        assert_eq!(b.status, "normal");
    }

    #[test]
    fn battery_unit_conversions() {
        let b = decode_battery_status(&json!({
            "voltages": [4200, 4100, 65535, 65535],
            "current_battery": 250,
            "battery_remaining": 87,
            "temperature": 2550,
            "current_consumed": 1500,
            "battery_function": {"type": "MAV_BATTERY_FUNCTION_ALL"},
        }))
        .unwrap();
        assert!((b.voltage - 4.15).abs() < 1e-9);
        assert_eq!(b.current, Some(2.5));
        assert_eq!(b.remaining, Some(87.0));
        assert_eq!(b.temperature, Some(25.5));
        assert_eq!(b.consumed_mah, Some(1.5));
        assert_eq!(b.status, "MAV_BATTERY_FUNCTION_ALL");
    }

    #[test]
    fn battery_without_cells_reads_zero_volts() {
        let b = decode_battery_status(&json!({"temperature": 32767})).unwrap();
        assert_eq!(b.voltage, 0.0);
        assert_eq!(b.temperature, None);
    }

    #[test]
    fn message_names() {
        let names: Vec<_> = TelemetryKind::ALL.iter().map(|k| k.message_name()).collect();
        assert_eq!(names, ["HEARTBEAT", "GLOBAL_POSITION_INT", "VFR_HUD", "BATTERY_STATUS"]);
    }
}

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dronenode_fc::decode::HeartbeatUpdate;
use dronenode_proto::{BatteryInfo, BatteryOverride, DroneState, Position, Property};
use serde_json::Value;

#[derive(Debug, Default)]
struct Inner {
    live: DroneState,
    battery_override: Option<BatteryOverride>,
}

/// Latest decoded telemetry plus the optional battery override.
///
/// Cloning hands out another handle to the same cache. Live fields are
/// written only by the poller, the override only by `simulateBattery`;
/// property reads may come from anywhere.
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    inner: Arc<RwLock<Inner>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A writer that panicked mid-update leaves whole values behind, never torn ones.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn armed(&self) -> bool {
        self.read().live.armed
    }

    pub fn mode(&self) -> String {
        self.read().live.mode.clone()
    }

    pub fn position(&self) -> Position {
        self.read().live.position
    }

    pub fn groundspeed(&self) -> f64 {
        self.read().live.groundspeed
    }

    /// Effective battery: the override laid over live telemetry.
    pub fn battery(&self) -> BatteryInfo {
        let inner = self.read();
        match &inner.battery_override {
            Some(ov) => ov.apply(&inner.live.battery),
            None => inner.live.battery.clone(),
        }
    }

    pub fn live_battery(&self) -> BatteryInfo {
        self.read().live.battery.clone()
    }

    pub fn battery_override(&self) -> Option<BatteryOverride> {
        self.read().battery_override.clone()
    }

    /// Every property as readers see it (battery is the effective one).
    pub fn snapshot(&self) -> DroneState {
        let mut state = self.read().live.clone();
        state.battery = self.battery();
        state
    }

    pub fn read_property(&self, property: Property) -> Value {
        let json = |v: serde_json::Result<Value>| v.unwrap_or(Value::Null);
        match property {
            Property::Armed => Value::Bool(self.armed()),
            Property::Mode => Value::String(self.mode()),
            Property::Position => json(serde_json::to_value(self.position())),
            Property::Groundspeed => json(serde_json::to_value(self.groundspeed())),
            Property::Battery => json(serde_json::to_value(self.battery())),
        }
    }

    pub fn set_heartbeat(&self, hb: HeartbeatUpdate) {
        let mut inner = self.write();
        inner.live.armed = hb.armed;
        inner.live.mode = hb.mode;
    }

    pub fn set_position(&self, position: Position) {
        self.write().live.position = position;
    }

    pub fn set_groundspeed(&self, groundspeed: f64) {
        self.write().live.groundspeed = groundspeed;
    }

    pub fn set_live_battery(&self, battery: BatteryInfo) {
        self.write().live.battery = battery;
    }

    /// Shallow-merge `fields` into the current override, creating it if needed.
    pub fn merge_battery_override(&self, fields: BatteryOverride) {
        let mut inner = self.write();
        match inner.battery_override.as_mut() {
            Some(ov) => ov.merge(fields),
            None => inner.battery_override = Some(fields),
        }
    }

    pub fn clear_battery_override(&self) {
        self.write().battery_override = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_battery() -> BatteryInfo {
        BatteryInfo {
            voltage: 12.6,
            current: Some(2.5),
            remaining: Some(80.0),
            temperature: None,
            consumed_mah: None,
            status: "normal".into(),
        }
    }

    #[test]
    fn starts_empty() {
        let cache = StateCache::new();
        assert!(!cache.armed());
        assert_eq!(cache.mode(), "unknown");
        assert_eq!(cache.groundspeed(), 0.0);
        assert!(cache.battery_override().is_none());
    }

    #[test]
    fn handles_share_state() {
        let writer = StateCache::new();
        let reader = writer.clone();
        writer.set_heartbeat(HeartbeatUpdate { armed: true, mode: "GUIDED".into() });
        writer.set_groundspeed(4.5);
        assert!(reader.armed());
        assert_eq!(reader.mode(), "GUIDED");
        assert_eq!(reader.read_property(Property::Groundspeed), serde_json::json!(4.5));
    }

    #[test]
    fn partial_override_then_clear() {
        let cache = StateCache::new();
        cache.set_live_battery(live_battery());

        cache.merge_battery_override(BatteryOverride { remaining: Some(Some(42.0)), ..Default::default() });
        let eff = cache.battery();
        assert_eq!(eff.remaining, Some(42.0));
        assert_eq!(eff.voltage, 12.6);
        assert_eq!(eff.current, Some(2.5));
        assert_eq!(cache.snapshot().battery.remaining, Some(42.0));
        assert_eq!(cache.live_battery().remaining, Some(80.0));

        cache.merge_battery_override(BatteryOverride { voltage: Some(10.5), ..Default::default() });
        let eff = cache.battery();
        assert_eq!(eff.voltage, 10.5);
        assert_eq!(eff.remaining, Some(42.0));

        cache.clear_battery_override();
        assert_eq!(cache.battery(), live_battery());
    }

    #[test]
    fn override_tracks_later_live_updates() {
        let cache = StateCache::new();
        cache.merge_battery_override(BatteryOverride { status: Some("critical".into()), ..Default::default() });
        cache.set_live_battery(live_battery());
        let eff = cache.battery();
        assert_eq!(eff.status, "critical");
        assert_eq!(eff.voltage, 12.6);
    }
}

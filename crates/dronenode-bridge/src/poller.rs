use std::sync::Arc;
use std::time::Duration;

use dronenode_fc::decode::{self, TelemetryKind};
use dronenode_fc::{ModeTable, TelemetryLink};
use dronenode_proto::{Property, PropertyChange};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::cache::StateCache;
use crate::sink::PropertySink;

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollReport {
    /// Properties written this cycle, in notification order.
    pub updated: Vec<Property>,
    /// Kinds whose fetch or decode failed. Their cached values were kept.
    pub failed: Vec<TelemetryKind>,
}

/// Periodically reads the four telemetry messages into the cache.
pub struct TelemetryPoller {
    link: Arc<dyn TelemetryLink>,
    modes: Arc<ModeTable>,
    cache: StateCache,
    sink: Arc<dyn PropertySink>,
    interval: Duration,
}

impl TelemetryPoller {
    pub fn new(
        link: Arc<dyn TelemetryLink>,
        modes: Arc<ModeTable>,
        cache: StateCache,
        sink: Arc<dyn PropertySink>,
        interval: Duration,
    ) -> Self {
        Self { link, modes, cache, sink, interval }
    }

    /// Polls forever. Never returns on its own; abort the task to stop it.
    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let report = self.poll_once().await;
            if !report.failed.is_empty() {
                debug!(failed = ?report.failed, updated = report.updated.len(), "poll cycle incomplete");
            }
        }
    }

    /// One cycle: fetch all kinds concurrently, then merge whatever arrived.
    pub async fn poll_once(&self) -> PollReport {
        let (hb, pos, vfr, bat) = tokio::join!(
            self.fetch(TelemetryKind::Heartbeat),
            self.fetch(TelemetryKind::GlobalPosition),
            self.fetch(TelemetryKind::VfrHud),
            self.fetch(TelemetryKind::BatteryStatus),
        );

        let mut report = PollReport::default();
        for (kind, fetched) in [
            (TelemetryKind::Heartbeat, hb),
            (TelemetryKind::GlobalPosition, pos),
            (TelemetryKind::VfrHud, vfr),
            (TelemetryKind::BatteryStatus, bat),
        ] {
            match fetched {
                Ok(Some(msg)) => {
                    if !self.merge(kind, &msg, &mut report.updated) {
                        warn!(message = kind.message_name(), %msg, "telemetry not decodable, keeping cached value");
                        report.failed.push(kind);
                    }
                }
                Ok(None) => {}
                Err(()) => report.failed.push(kind),
            }
        }
        report
    }

    async fn fetch(&self, kind: TelemetryKind) -> Result<Option<Value>, ()> {
        let name = kind.message_name();
        match self.link.last_message(name).await {
            Ok(Some(msg)) => Ok(Some(msg)),
            Ok(None) => {
                debug!(message = name, "not received yet");
                Ok(None)
            }
            Err(e) => {
                warn!(message = name, status = ?e.status(), error = %e, "telemetry fetch failed");
                Err(())
            }
        }
    }

    /// Decodes and writes one message; false when it could not be decoded.
    fn merge(&self, kind: TelemetryKind, msg: &Value, updated: &mut Vec<Property>) -> bool {
        match kind {
            TelemetryKind::Heartbeat => {
                let Some(hb) = decode::decode_heartbeat(msg, &self.modes) else { return false };
                let (armed, mode) = (hb.armed, hb.mode.clone());
                self.cache.set_heartbeat(hb);
                self.notify(PropertyChange::new(Property::Armed, &armed), updated);
                self.notify(PropertyChange::new(Property::Mode, &mode), updated);
            }
            TelemetryKind::GlobalPosition => {
                let Some(position) = decode::decode_global_position(msg) else { return false };
                self.cache.set_position(position);
                self.notify(PropertyChange::new(Property::Position, &position), updated);
            }
            TelemetryKind::VfrHud => {
                let Some(groundspeed) = decode::decode_vfr_hud(msg) else { return false };
                self.cache.set_groundspeed(groundspeed);
                self.notify(PropertyChange::new(Property::Groundspeed, &groundspeed), updated);
            }
            TelemetryKind::BatteryStatus => {
                let Some(battery) = decode::decode_battery_status(msg) else { return false };
                self.cache.set_live_battery(battery);
                self.notify(PropertyChange::new(Property::Battery, &self.cache.battery()), updated);
            }
        }
        true
    }

    fn notify(&self, change: PropertyChange, updated: &mut Vec<Property>) {
        updated.push(change.property);
        self.sink.property_changed(change);
    }
}

pub mod command;
pub mod decode;
pub mod doctor;
pub mod link;
pub mod mav;
pub mod modes;
pub mod probe;

pub use command::{CommandEncoder, SenderIdentity, Target, Waypoint, DEFAULT_ACCEPTANCE_RADIUS_M};
pub use link::{LinkError, Mavlink2RestLink, TelemetryLink};
pub use mav::CommandEnvelope;
pub use modes::{ModeInput, ModeTable, ModeTableConfig};

/// Re-exported so callers can name commands without depending on `mavlink` directly.
pub use mavlink::common::MavCmd;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FcConfig {
    /// mavlink2rest base URL.
    pub base_url: String,

    /// MAVLink ids we send as (GCS side)
    pub sender_system_id: u8,
    pub sender_component_id: u8,

    /// Autopilot component on the vehicle. The target system is `drone.sys_id`.
    pub target_component: u8,

    /// Telemetry poll period.
    pub poll_interval_ms: u64,

    /// Pause between the GUIDED mode switch and the follow-up command.
    pub takeoff_settle_ms: u64,
    pub goto_settle_ms: u64,

    pub default_acceptance_radius_m: f32,
}

impl Default for FcConfig {
    fn default() -> Self {
        let sender = SenderIdentity::default();
        Self {
            base_url: "http://drone1:8088".into(),
            sender_system_id: sender.system_id,
            sender_component_id: sender.component_id,
            target_component: 1,
            poll_interval_ms: 500,
            takeoff_settle_ms: 150,
            goto_settle_ms: 100,
            default_acceptance_radius_m: DEFAULT_ACCEPTANCE_RADIUS_M,
        }
    }
}

impl FcConfig {
    pub fn sender(&self) -> SenderIdentity {
        SenderIdentity { system_id: self.sender_system_id, component_id: self.sender_component_id }
    }

    pub fn target(&self, sys_id: u8) -> Target {
        Target { system: sys_id, component: self.target_component }
    }
}

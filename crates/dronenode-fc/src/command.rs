use std::sync::Arc;

use mavlink::common::{MavCmd, MavFrame, MavMissionType, MavModeFlag};
use tracing::{debug, error};

use crate::link::{LinkError, TelemetryLink};
use crate::mav::{CommandEnvelope, CommandLong, EnvelopeHeader, MissionItemInt, OutboundMessage};
use crate::modes::{ModeInput, ModeTable};

pub const DEFAULT_ACCEPTANCE_RADIUS_M: f32 = 5.0;

/// MISSION_ITEM_INT `current` value for an ad-hoc guided waypoint.
const GUIDED_WAYPOINT: u8 = 2;

/// Who we claim to be on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderIdentity {
    pub system_id: u8,
    pub component_id: u8,
}

impl Default for SenderIdentity {
    /// GCS / mission planner.
    fn default() -> Self {
        Self { system_id: 255, component_id: 240 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub system: u8,
    pub component: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    pub yaw: Option<f32>,
    pub acceptance_radius: f32,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64, alt: f32) -> Self {
        Self { lat, lon, alt, yaw: None, acceptance_radius: DEFAULT_ACCEPTANCE_RADIUS_M }
    }
}

/// Degrees to the 1e7-scaled integers used by the `_INT` messages.
pub fn to_e7(deg: f64) -> i32 {
    (deg * 1e7).round() as i32
}

/// Turns typed commands into envelopes and sends them. No retries here.
#[derive(Clone)]
pub struct CommandEncoder {
    link: Arc<dyn TelemetryLink>,
    sender: SenderIdentity,
    target: Target,
    modes: Arc<ModeTable>,
}

impl CommandEncoder {
    pub fn new(
        link: Arc<dyn TelemetryLink>,
        sender: SenderIdentity,
        target: Target,
        modes: Arc<ModeTable>,
    ) -> Self {
        Self { link, sender, target, modes }
    }

    pub fn modes(&self) -> &ModeTable {
        &self.modes
    }

    fn header(&self) -> EnvelopeHeader {
        EnvelopeHeader {
            system_id: self.sender.system_id,
            component_id: self.sender.component_id,
            sequence: 0,
        }
    }

    /// Missing trailing params are 0; anything past seven is ignored.
    pub fn build_long_command(&self, command: MavCmd, params: &[f32]) -> CommandEnvelope {
        let mut p = [0.0f32; 7];
        for (slot, v) in p.iter_mut().zip(params) {
            *slot = *v;
        }
        CommandEnvelope {
            header: self.header(),
            message: OutboundMessage::CommandLong(CommandLong {
                target_system: self.target.system,
                target_component: self.target.component,
                command,
                confirmation: 0,
                param1: p[0],
                param2: p[1],
                param3: p[2],
                param4: p[3],
                param5: p[4],
                param6: p[5],
                param7: p[6],
            }),
        }
    }

    pub fn build_mission_item(&self, wp: &Waypoint) -> CommandEnvelope {
        let acceptance = if wp.acceptance_radius.is_finite() && wp.acceptance_radius > 0.0 {
            wp.acceptance_radius
        } else {
            DEFAULT_ACCEPTANCE_RADIUS_M
        };
        let yaw = wp.yaw.filter(|y| y.is_finite()).unwrap_or(0.0);
        CommandEnvelope {
            header: self.header(),
            message: OutboundMessage::MissionItemInt(MissionItemInt {
                target_system: self.target.system,
                target_component: self.target.component,
                seq: 0,
                frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
                command: MavCmd::MAV_CMD_NAV_WAYPOINT,
                current: GUIDED_WAYPOINT,
                autocontinue: 0,
                param1: 0.0,
                param2: acceptance,
                param3: 0.0,
                param4: yaw,
                x: to_e7(wp.lat),
                y: to_e7(wp.lon),
                z: wp.alt,
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            }),
        }
    }

    pub async fn long_command(&self, command: MavCmd, params: &[f32]) -> Result<(), LinkError> {
        let env = self.build_long_command(command, params);
        self.send(env).await
    }

    pub async fn mission_item_waypoint(&self, wp: &Waypoint) -> Result<(), LinkError> {
        let env = self.build_mission_item(wp);
        self.send(env).await
    }

    /// DO_SET_MODE with the custom-mode-enabled flag and the resolved code.
    pub async fn set_mode(&self, input: &ModeInput) -> Result<(), LinkError> {
        let code = input.resolve(&self.modes);
        debug!(?input, code, "set mode");
        let custom_mode_enabled = f32::from(MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits());
        self.long_command(MavCmd::MAV_CMD_DO_SET_MODE, &[custom_mode_enabled, code as f32])
            .await
    }

    async fn send(&self, env: CommandEnvelope) -> Result<(), LinkError> {
        debug!(kind = env.message.kind(), command = ?env.message.command(), "sending");
        if let Err(e) = self.link.post(&env).await {
            error!(
                kind = env.message.kind(),
                command = ?env.message.command(),
                target_system = self.target.system,
                target_component = self.target.component,
                status = ?e.status(),
                body = e.body().unwrap_or(""),
                payload = %env.to_log_string(),
                "{} failed: {}",
                env.message.kind(),
                e
            );
            return Err(e);
        }
        Ok(())
    }
}

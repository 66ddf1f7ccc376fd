//! Outbound message envelopes in the mavlink2rest JSON shape:
//! `{"header": {...}, "message": {"type": "COMMAND_LONG", ...}}`.
//!
//! Enum-valued fields reuse the `mavlink` crate's types so they serialize as
//! `{"type": "MAV_CMD_..."}`.

use mavlink::common::{MavCmd, MavFrame, MavMissionType};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnvelopeHeader {
    pub system_id: u8,
    pub component_id: u8,
    pub sequence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandLong {
    pub target_system: u8,
    pub target_component: u8,
    pub command: MavCmd,
    pub confirmation: u8,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub param5: f32,
    pub param6: f32,
    pub param7: f32,
}

impl CommandLong {
    pub fn params(&self) -> [f32; 7] {
        [
            self.param1, self.param2, self.param3, self.param4,
            self.param5, self.param6, self.param7,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionItemInt {
    pub target_system: u8,
    pub target_component: u8,
    pub seq: u16,
    pub frame: MavFrame,
    pub command: MavCmd,
    /// 2 = guided-mode waypoint, not part of a stored mission.
    pub current: u8,
    pub autocontinue: u8,
    pub param1: f32,
    /// Acceptance radius (m).
    pub param2: f32,
    pub param3: f32,
    /// Yaw (deg).
    pub param4: f32,
    /// Latitude * 1e7.
    pub x: i32,
    /// Longitude * 1e7.
    pub y: i32,
    /// Altitude (m, relative to home).
    pub z: f32,
    pub mission_type: MavMissionType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "COMMAND_LONG")]
    CommandLong(CommandLong),
    #[serde(rename = "MISSION_ITEM_INT")]
    MissionItemInt(MissionItemInt),
}

impl OutboundMessage {
    pub fn command(&self) -> MavCmd {
        match self {
            OutboundMessage::CommandLong(c) => c.command,
            OutboundMessage::MissionItemInt(m) => m.command,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::CommandLong(_) => "COMMAND_LONG",
            OutboundMessage::MissionItemInt(_) => "MISSION_ITEM_INT",
        }
    }
}

/// One outbound command. Built fresh per send and never reused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandEnvelope {
    pub header: EnvelopeHeader,
    pub message: OutboundMessage,
}

impl CommandEnvelope {
    pub fn as_command_long(&self) -> Option<&CommandLong> {
        match &self.message {
            OutboundMessage::CommandLong(c) => Some(c),
            OutboundMessage::MissionItemInt(_) => None,
        }
    }

    pub fn as_mission_item(&self) -> Option<&MissionItemInt> {
        match &self.message {
            OutboundMessage::MissionItemInt(m) => Some(m),
            OutboundMessage::CommandLong(_) => None,
        }
    }

    /// Compact JSON for log lines.
    pub fn to_log_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable envelope: {e}>"))
    }
}

use std::sync::Arc;
use std::time::Duration;

use dronenode_fc::{CommandEncoder, FcConfig, MavCmd, ModeInput, Waypoint};
use dronenode_proto::{Property, PropertyChange};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::actions::{Action, BatteryRequest, GotoRequest, HomeRequest, SpeedKind, SpeedRequest, YawRequest};
use crate::cache::StateCache;
use crate::error::BridgeError;
use crate::sink::PropertySink;

const GUIDED: &str = "GUIDED";
const RTL: &str = "RTL";
const LAND: &str = "LAND";

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    pub takeoff_settle: Duration,
    pub goto_settle: Duration,
    pub default_acceptance_radius: f32,
}

impl From<&FcConfig> for DispatchConfig {
    fn from(fc: &FcConfig) -> Self {
        Self {
            takeoff_settle: Duration::from_millis(fc.takeoff_settle_ms),
            goto_settle: Duration::from_millis(fc.goto_settle_ms),
            default_acceptance_radius: fc.default_acceptance_radius_m,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::from(&FcConfig::default())
    }
}

/// Runs actions as command sequences.
///
/// Dispatches are independent: two concurrent calls may interleave their
/// commands. Ordering only holds within one action. No retries.
#[derive(Clone)]
pub struct ActionDispatcher {
    encoder: CommandEncoder,
    cache: StateCache,
    sink: Arc<dyn PropertySink>,
    cfg: DispatchConfig,
}

impl ActionDispatcher {
    pub fn new(encoder: CommandEncoder, cache: StateCache, sink: Arc<dyn PropertySink>, cfg: DispatchConfig) -> Self {
        Self { encoder, cache, sink, cfg }
    }

    /// Entry point for transports: parse `input` for `name`, then run it.
    pub async fn invoke(&self, name: &str, input: &Value) -> Result<(), BridgeError> {
        let action = Action::from_json(name, input).inspect_err(|e| {
            warn!(action = name, %input, "rejected: {e}");
        })?;
        self.dispatch(action).await
    }

    pub async fn dispatch(&self, action: Action) -> Result<(), BridgeError> {
        let name = action.name();
        if let Err(e) = action.validate() {
            warn!(action = %name, "rejected: {e}");
            return Err(e);
        }
        info!(action = %name, "dispatch");

        let res = match action {
            Action::Arm => self.arm(true).await,
            Action::Disarm => self.arm(false).await,
            Action::Takeoff { alt } => self.takeoff(alt).await,
            Action::SetMode(mode) => self.set_mode(&mode).await,
            Action::SetSpeed(req) => self.set_speed(req).await,
            Action::Goto(req) => self.goto(req).await,
            Action::Rtl => self.set_mode(&ModeInput::from(RTL)).await,
            Action::Land => self.set_mode(&ModeInput::from(LAND)).await,
            Action::SetHome(req) => self.set_home(req).await,
            Action::SetYaw(req) => self.set_yaw(req).await,
            Action::SimulateBattery(req) => {
                self.simulate_battery(req);
                Ok(())
            }
        };
        if let Err(e) = &res {
            warn!(action = %name, error = %e, "action failed");
        }
        res
    }

    async fn arm(&self, arm: bool) -> Result<(), BridgeError> {
        let flag = if arm { 1.0 } else { 0.0 };
        self.encoder.long_command(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, &[flag]).await?;
        Ok(())
    }

    async fn set_mode(&self, mode: &ModeInput) -> Result<(), BridgeError> {
        self.encoder.set_mode(mode).await?;
        Ok(())
    }

    async fn takeoff(&self, alt: f32) -> Result<(), BridgeError> {
        self.set_mode(&ModeInput::from(GUIDED)).await?;
        sleep(self.cfg.takeoff_settle).await;
        self.encoder
            .long_command(MavCmd::MAV_CMD_NAV_TAKEOFF, &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, alt])
            .await?;
        Ok(())
    }

    async fn set_speed(&self, req: SpeedRequest) -> Result<(), BridgeError> {
        self.encoder
            .long_command(MavCmd::MAV_CMD_DO_CHANGE_SPEED, &[req.kind.code(), req.speed, req.throttle])
            .await?;
        Ok(())
    }

    async fn goto(&self, req: GotoRequest) -> Result<(), BridgeError> {
        if let Some(speed) = req.speed.filter(|s| *s > 0.0) {
            self.set_speed(SpeedRequest { kind: SpeedKind::Air, speed, throttle: -1.0 }).await?;
        }
        self.set_mode(&ModeInput::from(GUIDED)).await?;
        sleep(self.cfg.goto_settle).await;
        let wp = Waypoint {
            yaw: req.yaw,
            acceptance_radius: req.acceptance_radius.unwrap_or(self.cfg.default_acceptance_radius),
            ..Waypoint::new(req.lat, req.lon, req.alt)
        };
        self.encoder.mission_item_waypoint(&wp).await?;
        Ok(())
    }

    async fn set_home(&self, req: HomeRequest) -> Result<(), BridgeError> {
        let params = match req {
            HomeRequest::Current => [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            HomeRequest::At { lat, lon, alt } => [0.0, 0.0, 0.0, 0.0, lat, lon, alt],
        };
        self.encoder.long_command(MavCmd::MAV_CMD_DO_SET_HOME, &params).await?;
        Ok(())
    }

    async fn set_yaw(&self, req: YawRequest) -> Result<(), BridgeError> {
        let relative = if req.relative { 1.0 } else { 0.0 };
        self.encoder
            .long_command(
                MavCmd::MAV_CMD_CONDITION_YAW,
                &[req.yaw, req.speed, f32::from(req.direction), relative],
            )
            .await?;
        Ok(())
    }

    fn simulate_battery(&self, req: BatteryRequest) {
        match req {
            BatteryRequest::Clear => self.cache.clear_battery_override(),
            BatteryRequest::Merge(fields) => self.cache.merge_battery_override(fields),
        }
        let battery = self.cache.battery();
        info!(overridden = self.cache.battery_override().is_some(), "battery override updated");
        self.sink.property_changed(PropertyChange::new(Property::Battery, &battery));
    }
}

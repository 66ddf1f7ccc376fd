use anyhow::Result;
use reqwest::Url;

use crate::modes::{ModeTable, ModeTableConfig};
use crate::FcConfig;

pub fn check_fc(fc: &FcConfig, sys_id: u8) -> Result<()> {
    let url = Url::parse(&fc.base_url).map_err(|e| anyhow::anyhow!("fc.base_url invalid ({}): {}", fc.base_url, e))?;
    anyhow::ensure!(matches!(url.scheme(), "http" | "https"), "fc.base_url must be http(s)");
    anyhow::ensure!(sys_id > 0, "drone.sys_id must be 1..255");
    anyhow::ensure!(fc.poll_interval_ms >= 50, "fc.poll_interval_ms too small; set >= 50");
    anyhow::ensure!(fc.takeoff_settle_ms > 0, "fc.takeoff_settle_ms must be > 0");
    anyhow::ensure!(fc.goto_settle_ms > 0, "fc.goto_settle_ms must be > 0");
    anyhow::ensure!(
        fc.default_acceptance_radius_m.is_finite() && fc.default_acceptance_radius_m > 0.0,
        "fc.default_acceptance_radius_m must be > 0"
    );
    Ok(())
}

/// The table must be a bijection and must know the modes actions switch to.
pub fn check_modes(cfg: &ModeTableConfig) -> Result<ModeTable> {
    let table = ModeTable::from_config(cfg)?;
    for needed in ["GUIDED", "RTL", "LAND"] {
        anyhow::ensure!(table.names().any(|n| n == needed), "modes.table lacks {}", needed);
    }
    Ok(table)
}

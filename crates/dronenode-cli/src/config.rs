use anyhow::{Context, Result};
use dronenode_fc::{FcConfig, ModeTableConfig};
use dronenode_registry::RegistryConfig;

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    pub drone: DroneCfg,
    #[serde(default)]
    pub fc: FcConfig,
    #[serde(default)]
    pub modes: ModeTableConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, serde::Deserialize)]
pub struct DroneCfg {
    pub name: String,
    /// MAVLink system id of the vehicle.
    pub sys_id: u8,
}

pub fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
    let mut cfg: Config = toml::from_str(&s).context("parse config toml")?;
    apply_env(&mut cfg, |k| std::env::var(k).ok())?;
    Ok(cfg)
}

/// Environment wins over the file. Empty variables are ignored.
pub fn apply_env(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    let var = |k: &str| var(k).filter(|v| !v.is_empty());

    if let Some(v) = var("DRONE_NAME") {
        cfg.drone.name = v;
    }
    if let Some(v) = var("SYSID") {
        cfg.drone.sys_id = v.trim().parse().with_context(|| format!("SYSID={v} is not a MAVLink system id"))?;
    }
    if let Some(v) = var("M2R_BASE") {
        cfg.fc.base_url = v;
    }
    if let Some(v) = var("TDD_URL") {
        cfg.registry.base_url = v;
    }
    if let Some(v) = var("ZION_EMAIL") {
        cfg.registry.email = v;
    }
    if let Some(v) = var("ZION_PASSWORD") {
        cfg.registry.password = v;
    }
    if let Some(v) = var("ZION_TOKEN") {
        cfg.registry.token = Some(v);
    }

    cfg.fc.base_url = cfg.fc.base_url.trim_end_matches('/').to_string();
    cfg.registry.base_url = cfg.registry.base_url.trim_end_matches('/').to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
        [drone]
        name = "drone1"
        sys_id = 1
    "#;

    #[test]
    fn minimal_file_gets_defaults() {
        let mut cfg: Config = toml::from_str(MINIMAL).unwrap();
        apply_env(&mut cfg, |_| None).unwrap();
        assert_eq!(cfg.fc.base_url, "http://drone1:8088");
        assert_eq!(cfg.fc.poll_interval_ms, 500);
        assert_eq!(cfg.modes.table["GUIDED"], 4);
        assert_eq!(cfg.registry.retry_interval_s, 3);
        assert!(cfg.registry.token.is_none());
    }

    #[test]
    fn env_overrides_and_url_normalisation() {
        let env: HashMap<&str, &str> = [
            ("DRONE_NAME", "hexa7"),
            ("SYSID", "7"),
            ("M2R_BASE", "http://10.0.0.7:8088//"),
            ("TDD_URL", "http://zion:3000/"),
            ("ZION_TOKEN", "abc"),
            ("ZION_EMAIL", ""),
        ]
        .into_iter()
        .collect();
        let mut cfg: Config = toml::from_str(MINIMAL).unwrap();
        apply_env(&mut cfg, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.drone.name, "hexa7");
        assert_eq!(cfg.drone.sys_id, 7);
        assert_eq!(cfg.fc.base_url, "http://10.0.0.7:8088");
        assert_eq!(cfg.registry.base_url, "http://zion:3000");
        assert_eq!(cfg.registry.token.as_deref(), Some("abc"));
        assert_eq!(cfg.registry.email, "");
    }

    #[test]
    fn bad_sysid_is_an_error() {
        let mut cfg: Config = toml::from_str(MINIMAL).unwrap();
        assert!(apply_env(&mut cfg, |k| (k == "SYSID").then(|| "300".to_string())).is_err());
    }

    #[test]
    fn custom_mode_table() {
        let cfg: Config = toml::from_str(
            r#"
            [drone]
            name = "rover"
            sys_id = 2
            [modes]
            default_code = 4
            [modes.table]
            MANUAL = 0
            GUIDED = 15
            RTL = 11
            LAND = 9
            "#,
        )
        .unwrap();
        assert_eq!(cfg.modes.default_code, 4);
        assert_eq!(cfg.modes.table.len(), 4);
    }
}

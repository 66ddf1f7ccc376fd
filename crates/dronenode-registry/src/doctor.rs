use anyhow::Result;
use reqwest::Url;

use crate::RegistryConfig;

pub fn check_registry(cfg: &RegistryConfig) -> Result<()> {
    if !cfg.enable {
        return Ok(());
    }
    Url::parse(&cfg.base_url).map_err(|e| anyhow::anyhow!("registry.base_url invalid ({}): {}", cfg.base_url, e))?;
    anyhow::ensure!(
        cfg.email.is_empty() == cfg.password.is_empty(),
        "registry.email and registry.password must be set together"
    );
    anyhow::ensure!(cfg.retry_interval_s > 0, "registry.retry_interval_s must be > 0");
    anyhow::ensure!(cfg.reannounce_interval_s > 0, "registry.reannounce_interval_s must be > 0");
    anyhow::ensure!(cfg.min_refresh_delay_s > 0, "registry.min_refresh_delay_s must be > 0");
    Ok(())
}

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::decode::TelemetryKind;
use crate::link::{LinkError, TelemetryLink};

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub base_url: String,
    pub elapsed: Duration,
    /// Last heartbeat already cached by the link, if any.
    pub heartbeat_seen: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("telemetry link not reachable at {base_url}: {source}")]
    Unreachable {
        base_url: String,
        #[source]
        source: LinkError,
    },

    #[error("telemetry link at {base_url} answered with an unexpected HEARTBEAT template: {template}")]
    UnexpectedTemplate { base_url: String, template: String },
}

/// Startup check: the link must serve the HEARTBEAT template before we accept work.
pub async fn probe_link(link: &dyn TelemetryLink, base_url: &str) -> Result<ProbeResult, ProbeError> {
    let start = Instant::now();
    let name = TelemetryKind::Heartbeat.message_name();

    let template = link.template(name).await.map_err(|source| ProbeError::Unreachable {
        base_url: base_url.to_string(),
        source,
    })?;
    if !template.get("message").is_some_and(|m| m.is_object()) {
        return Err(ProbeError::UnexpectedTemplate {
            base_url: base_url.to_string(),
            template: template.to_string(),
        });
    }

    // Not fatal: the vehicle may simply not be talking yet.
    let heartbeat_seen = match link.last_message(name).await {
        Ok(m) => m.is_some(),
        Err(e) => {
            warn!(base_url, "link probe: could not read last heartbeat: {e}");
            false
        }
    };

    let elapsed = start.elapsed();
    info!(base_url, heartbeat_seen, elapsed_ms = elapsed.as_millis() as u64, "link probe OK");
    Ok(ProbeResult { base_url: base_url.to_string(), elapsed, heartbeat_seen })
}

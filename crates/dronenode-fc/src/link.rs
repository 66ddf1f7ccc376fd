use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::mav::CommandEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("invalid response body from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl LinkError {
    pub fn status(&self) -> Option<u16> {
        match self {
            LinkError::Status { status, .. } => Some(*status),
            LinkError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            LinkError::Decode { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            LinkError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Downstream vehicle-telemetry link.
#[async_trait]
pub trait TelemetryLink: Send + Sync {
    /// Empty message template for a MAVLink message name.
    async fn template(&self, name: &str) -> Result<Value, LinkError>;

    /// Last received message of the given type, `None` if the vehicle has not sent one yet.
    async fn last_message(&self, name: &str) -> Result<Option<Value>, LinkError>;

    /// Fire-and-forget send.
    async fn post(&self, envelope: &CommandEnvelope) -> Result<(), LinkError>;
}

/// mavlink2rest v1 REST API.
#[derive(Debug, Clone)]
pub struct Mavlink2RestLink {
    client: reqwest::Client,
    base_url: String,
    vehicle: u8,
    component: u8,
}

impl Mavlink2RestLink {
    /// `vehicle`/`component` select whose messages `last_message` reads.
    pub fn new(base_url: &str, vehicle: u8, component: u8) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            vehicle,
            component,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn template_url(&self, name: &str) -> Result<Url, LinkError> {
        let raw = format!("{}/v1/helper/mavlink", self.base_url);
        Url::parse_with_params(&raw, &[("name", name)])
            .map_err(|e| LinkError::Decode { url: raw, reason: e.to_string() })
    }

    fn last_message_url(&self, name: &str) -> String {
        format!(
            "{}/v1/mavlink/vehicles/{}/components/{}/messages/{}",
            self.base_url, self.vehicle, self.component, name
        )
    }

    fn post_url(&self) -> String {
        format!("{}/v1/mavlink", self.base_url)
    }

    async fn check(url: &str, res: reqwest::Response) -> Result<reqwest::Response, LinkError> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        Err(LinkError::Status { url: url.to_string(), status, body })
    }

    async fn json(url: &str, res: reqwest::Response) -> Result<Value, LinkError> {
        res.json::<Value>()
            .await
            .map_err(|e| LinkError::Decode { url: url.to_string(), reason: e.to_string() })
    }
}

#[async_trait]
impl TelemetryLink for Mavlink2RestLink {
    async fn template(&self, name: &str) -> Result<Value, LinkError> {
        let url = self.template_url(name)?;
        let url_str = url.to_string();
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| LinkError::Transport { url: url_str.clone(), source })?;
        let res = Self::check(&url_str, res).await?;
        Self::json(&url_str, res).await
    }

    async fn last_message(&self, name: &str) -> Result<Option<Value>, LinkError> {
        let url = self.last_message_url(name);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| LinkError::Transport { url: url.clone(), source })?;
        if res.status() == StatusCode::NOT_FOUND {
            debug!(%url, "no {} received yet", name);
            return Ok(None);
        }
        let res = Self::check(&url, res).await?;
        let body = Self::json(&url, res).await?;
        Ok(message_of(body))
    }

    async fn post(&self, envelope: &CommandEnvelope) -> Result<(), LinkError> {
        let url = self.post_url();
        let res = self
            .client
            .post(&url)
            .json(envelope)
            .send()
            .await
            .map_err(|source| LinkError::Transport { url: url.clone(), source })?;
        Self::check(&url, res).await?;
        Ok(())
    }
}

/// Pulls `message` out of a `{message, status}` reply.
fn message_of(mut body: Value) -> Option<Value> {
    match body.get_mut("message").map(Value::take) {
        Some(Value::Null) | None => None,
        Some(m) => Some(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn urls_follow_v1_layout() {
        let link = Mavlink2RestLink::new("http://drone1:8088/", 3, 1);
        assert_eq!(link.base_url(), "http://drone1:8088");
        assert_eq!(
            link.last_message_url("HEARTBEAT"),
            "http://drone1:8088/v1/mavlink/vehicles/3/components/1/messages/HEARTBEAT"
        );
        assert_eq!(link.post_url(), "http://drone1:8088/v1/mavlink");
        assert_eq!(
            link.template_url("COMMAND_LONG").unwrap().as_str(),
            "http://drone1:8088/v1/helper/mavlink?name=COMMAND_LONG"
        );
    }

    #[test]
    fn message_extracted_from_reply() {
        let body = json!({"message": {"type": "HEARTBEAT", "custom_mode": 4}, "status": {}});
        assert_eq!(message_of(body).unwrap()["custom_mode"], 4);
        assert!(message_of(json!({"status": {}})).is_none());
        assert!(message_of(json!({"message": null})).is_none());
    }

    #[test]
    fn status_error_exposes_status_and_body() {
        let e = LinkError::Status { url: "u".into(), status: 500, body: "boom".into() };
        assert_eq!(e.status(), Some(500));
        assert_eq!(e.body(), Some("boom"));
        assert_eq!(e.to_string(), "u returned HTTP 500: boom");
    }
}

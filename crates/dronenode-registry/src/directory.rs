use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ServiceError;

const TD_CONTENT_TYPE: &str = "application/td+json";

/// Statuses the directory answers a successful replace with.
const UPSERT_ACCEPTED: [u16; 4] = [200, 201, 202, 204];

/// Registry of capability descriptions.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Replace-or-insert under `id`. Returns the HTTP status.
    async fn upsert(&self, id: &str, description: &Value, token: Option<&str>) -> Result<u16, ServiceError>;

    /// Insert, letting the directory pick the location.
    async fn create(&self, description: &Value, token: Option<&str>) -> Result<u16, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDirectory {
    pub fn new(base_url: &str) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.trim_end_matches('/').to_string() }
    }

    /// `{base}/things[/{id}]`, with `id` percent-encoded as one path segment.
    fn things_url(&self, id: Option<&str>) -> Result<Url, ServiceError> {
        let invalid = |reason: String| ServiceError::InvalidUrl { base: self.base_url.clone(), reason };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| invalid("base URL cannot carry a path".into()))?;
            segs.pop_if_empty().push("things");
            if let Some(id) = id {
                segs.push(id);
            }
        }
        Ok(url)
    }

    fn request(&self, req: RequestBuilder, description: &Value, token: Option<&str>) -> RequestBuilder {
        let req = req
            .header(CONTENT_TYPE, HeaderValue::from_static(TD_CONTENT_TYPE))
            .body(description.to_string());
        match token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }
}

#[async_trait]
impl DirectoryService for HttpDirectory {
    async fn upsert(&self, id: &str, description: &Value, token: Option<&str>) -> Result<u16, ServiceError> {
        let url = self.things_url(Some(id))?;
        let url_str = url.to_string();
        let res = self
            .request(self.client.put(url), description, token)
            .send()
            .await
            .map_err(|source| ServiceError::Transport { url: url_str.clone(), source })?;
        let status = res.status().as_u16();
        if !UPSERT_ACCEPTED.contains(&status) {
            return Err(ServiceError::from_response(&url_str, res).await);
        }
        debug!(url = %url_str, status, "description replaced");
        Ok(status)
    }

    async fn create(&self, description: &Value, token: Option<&str>) -> Result<u16, ServiceError> {
        let url = self.things_url(None)?;
        let url_str = url.to_string();
        let res = self
            .request(self.client.post(url), description, token)
            .send()
            .await
            .map_err(|source| ServiceError::Transport { url: url_str.clone(), source })?;
        if !res.status().is_success() {
            return Err(ServiceError::from_response(&url_str, res).await);
        }
        let location = res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("n/a")
            .to_string();
        let status = res.status().as_u16();
        info!(url = %url_str, status, %location, "description created");
        Ok(status)
    }
}

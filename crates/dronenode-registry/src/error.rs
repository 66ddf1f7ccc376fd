#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{url} rejected our credentials (HTTP 401)")]
    Unauthorized { url: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered without a token")]
    MissingToken { url: String },

    #[error("cannot build request URL from {base}: {reason}")]
    InvalidUrl { base: String, reason: String },
}

impl ServiceError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ServiceError::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Unauthorized { .. } => Some(401),
            ServiceError::Status { status, .. } => Some(*status),
            ServiceError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            ServiceError::MissingToken { .. } | ServiceError::InvalidUrl { .. } => None,
        }
    }

    /// Maps a non-accepted response to `Unauthorized` or `Status`.
    pub(crate) async fn from_response(url: &str, res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        if status == 401 {
            return ServiceError::Unauthorized { url: url.to_string() };
        }
        let body = res.text().await.unwrap_or_default();
        ServiceError::Status { url: url.to_string(), status, body }
    }
}

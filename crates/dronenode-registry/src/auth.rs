use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ServiceError;

/// Token issuer of the directory service.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<String, ServiceError>;

    /// Creates the account; used when login answers 401.
    async fn register(&self, email: &str, password: &str) -> Result<String, ServiceError>;
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenReply {
    access_token: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpAuthService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthService {
    pub fn new(base_url: &str) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.trim_end_matches('/').to_string() }
    }

    async fn post(&self, path: &str, email: &str, password: &str) -> Result<TokenReply, ServiceError> {
        let url = self.url(path);
        debug!(%url, "requesting token");
        let res = self
            .client
            .post(&url)
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(|source| ServiceError::Transport { url: url.clone(), source })?;
        if !res.status().is_success() {
            return Err(ServiceError::from_response(&url, res).await);
        }
        // A body that is not JSON is treated like one without a token.
        Ok(res.json::<TokenReply>().await.unwrap_or_default())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn non_empty(tok: Option<String>) -> Option<String> {
    tok.filter(|t| !t.is_empty())
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<String, ServiceError> {
        let reply = self.post("/auth", email, password).await?;
        non_empty(reply.access_token).ok_or_else(|| ServiceError::MissingToken { url: self.url("/auth") })
    }

    async fn register(&self, email: &str, password: &str) -> Result<String, ServiceError> {
        let reply = self.post("/auth/register", email, password).await?;
        non_empty(reply.access_token)
            .or_else(|| non_empty(reply.token))
            .ok_or_else(|| ServiceError::MissingToken { url: self.url("/auth/register") })
    }
}

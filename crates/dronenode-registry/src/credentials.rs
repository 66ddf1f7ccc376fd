use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::AuthService;
use crate::error::ServiceError;
use crate::jwt;

#[derive(Debug, Clone)]
pub struct CredentialConfig {
    pub email: String,
    pub password: String,
    /// Refresh this long before the token expires.
    pub refresh_margin: Duration,
    pub min_refresh_delay: Duration,
}

impl CredentialConfig {
    fn has_credentials(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

/// Owns the single bearer token.
///
/// The token is replaced whole, never edited. At most one refresh timer is
/// pending; scheduling a new one aborts the previous.
pub struct CredentialManager {
    auth: Arc<dyn AuthService>,
    cfg: CredentialConfig,
    token: tokio::sync::Mutex<Option<String>>,
    refresh: Mutex<Option<JoinHandle<()>>>,
}

impl CredentialManager {
    pub fn new(auth: Arc<dyn AuthService>, cfg: CredentialConfig) -> Arc<Self> {
        Arc::new(Self { auth, cfg, token: tokio::sync::Mutex::new(None), refresh: Mutex::new(None) })
    }

    pub fn has_credentials(&self) -> bool {
        self.cfg.has_credentials()
    }

    /// Installs a pre-provisioned token and schedules its refresh.
    pub async fn seed(self: &Arc<Self>, token: String) {
        self.schedule_refresh(&token);
        *self.token.lock().await = Some(token);
    }

    /// Cached token without any network traffic.
    pub async fn current(&self) -> Option<String> {
        self.token.lock().await.clone()
    }

    /// Cached token, or a fresh login. `None` means proceed unauthenticated.
    pub async fn get_token(self: &Arc<Self>) -> Option<String> {
        let mut slot = self.token.lock().await;
        if let Some(tok) = slot.as_ref() {
            return Some(tok.clone());
        }
        if !self.has_credentials() {
            return None;
        }

        let tok = match self.auth.login(&self.cfg.email, &self.cfg.password).await {
            Ok(tok) => {
                info!("logged in to directory");
                tok
            }
            Err(ServiceError::Unauthorized { url }) => {
                warn!(%url, "login rejected, registering account");
                match self.auth.register(&self.cfg.email, &self.cfg.password).await {
                    Ok(tok) => {
                        info!("registered with directory");
                        tok
                    }
                    Err(e) => {
                        warn!(status = ?e.status(), error = %e, "registration failed");
                        return None;
                    }
                }
            }
            Err(e) => {
                warn!(status = ?e.status(), error = %e, "login failed");
                return None;
            }
        };

        self.schedule_refresh(&tok);
        *slot = Some(tok.clone());
        Some(tok)
    }

    /// Drops the cached token and logs in again.
    pub async fn force_refresh(self: &Arc<Self>) -> Option<String> {
        self.token.lock().await.take();
        self.get_token().await
    }

    fn schedule_refresh(self: &Arc<Self>, token: &str) {
        let mut pending = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = pending.take() {
            prev.abort();
        }

        let Some(exp) = jwt::expiry(token) else {
            debug!("token has no exp claim, not scheduling a refresh");
            return;
        };
        let delay = jwt::refresh_delay(
            exp,
            OffsetDateTime::now_utc(),
            self.cfg.refresh_margin,
            self.cfg.min_refresh_delay,
        );
        debug!(delay_s = delay.as_secs(), "token refresh scheduled");

        let weak: Weak<Self> = Arc::downgrade(self);
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(mgr) = weak.upgrade() else { return };
            // Detach ourselves so the reschedule below does not abort this task.
            mgr.refresh.lock().unwrap_or_else(PoisonError::into_inner).take();
            match mgr.force_refresh().await {
                Some(_) => info!("token refreshed"),
                None => warn!("token refresh failed, continuing without a token"),
            }
        }));
    }

    #[cfg(test)]
    fn refresh_pending(&self) -> bool {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl Drop for CredentialManager {
    fn drop(&mut self) {
        if let Some(h) = self.refresh.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            h.abort();
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::credentials::CredentialManager;
use crate::directory::DirectoryService;
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announced {
    Replaced(u16),
    Created(u16),
}

/// One announcement of this drone's description.
pub struct Registrar {
    directory: Arc<dyn DirectoryService>,
    credentials: Arc<CredentialManager>,
    id: String,
    description: Value,
}

impl Registrar {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        credentials: Arc<CredentialManager>,
        id: String,
        description: Value,
    ) -> Self {
        Self { directory, credentials, id, description }
    }

    /// Replace under our id; on rejection create instead.
    ///
    /// A 401 on the replace forces one re-login and one retry before
    /// falling back to create.
    pub async fn announce(&self) -> Result<Announced, ServiceError> {
        let token = match self.credentials.current().await {
            Some(t) => Some(t),
            None => self.credentials.get_token().await,
        };

        match self.directory.upsert(&self.id, &self.description, token.as_deref()).await {
            Ok(status) => return Ok(Announced::Replaced(status)),
            Err(e) if e.is_unauthorized() && self.credentials.has_credentials() => {
                warn!(id = %self.id, "upsert unauthorized, logging in again");
                let token = self.credentials.force_refresh().await;
                match self.directory.upsert(&self.id, &self.description, token.as_deref()).await {
                    Ok(status) => return Ok(Announced::Replaced(status)),
                    Err(e) => warn!(id = %self.id, status = ?e.status(), error = %e, "upsert retry failed, trying create"),
                }
            }
            Err(e) => warn!(id = %self.id, status = ?e.status(), error = %e, "upsert failed, trying create"),
        }

        let token = self.credentials.current().await;
        let status = self.directory.create(&self.description, token.as_deref()).await?;
        Ok(Announced::Created(status))
    }
}

/// Announces until the first success, then re-announces on a fixed period.
pub struct RegistrationLoop {
    registrar: Registrar,
    retry_interval: Duration,
    reannounce_interval: Duration,
}

impl RegistrationLoop {
    pub fn new(registrar: Registrar, retry_interval: Duration, reannounce_interval: Duration) -> Self {
        Self { registrar, retry_interval, reannounce_interval }
    }

    /// Runs forever; abort the task to stop it.
    pub async fn run(self) {
        let mut attempt: u64 = 0;
        loop {
            attempt += 1;
            match self.registrar.announce().await {
                Ok(how) => {
                    info!(attempt, ?how, "registered with directory");
                    break;
                }
                Err(e) => {
                    warn!(
                        attempt,
                        status = ?e.status(),
                        error = %e,
                        "registration failed, retrying in {:?}",
                        self.retry_interval
                    );
                    sleep(self.retry_interval).await;
                }
            }
        }

        let mut tick = interval_at(Instant::now() + self.reannounce_interval, self.reannounce_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            match self.registrar.announce().await {
                Ok(how) => info!(?how, "re-announced"),
                Err(e) => warn!(status = ?e.status(), error = %e, "re-announce failed"),
            }
        }
    }
}

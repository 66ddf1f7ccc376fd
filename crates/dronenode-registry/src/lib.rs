pub mod auth;
pub mod credentials;
pub mod description;
pub mod directory;
pub mod doctor;
pub mod error;
pub mod jwt;
pub mod register;

pub use auth::{AuthService, HttpAuthService};
pub use credentials::{CredentialConfig, CredentialManager};
pub use directory::{DirectoryService, HttpDirectory};
pub use error::ServiceError;
pub use register::{Announced, Registrar, RegistrationLoop};

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub enable: bool,
    /// Directory base URL; auth lives under the same host.
    pub base_url: String,
    pub email: String,
    pub password: String,
    /// Pre-provisioned bearer token.
    pub token: Option<String>,

    pub retry_interval_s: u64,
    pub reannounce_interval_s: u64,
    pub refresh_margin_s: u64,
    pub min_refresh_delay_s: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enable: true,
            base_url: "http://zion:3000".into(),
            email: String::new(),
            password: String::new(),
            token: None,
            retry_interval_s: 3,
            reannounce_interval_s: 300,
            refresh_margin_s: 60,
            min_refresh_delay_s: 5,
        }
    }
}

impl RegistryConfig {
    pub fn credentials(&self) -> CredentialConfig {
        CredentialConfig {
            email: self.email.clone(),
            password: self.password.clone(),
            refresh_margin: Duration::from_secs(self.refresh_margin_s),
            min_refresh_delay: Duration::from_secs(self.min_refresh_delay_s),
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_s)
    }

    pub fn reannounce_interval(&self) -> Duration {
        Duration::from_secs(self.reannounce_interval_s)
    }
}

use serde::{Deserialize, Serialize};

pub mod auth;
pub mod date;
pub mod hive;
pub mod monitoring;
pub mod notification;
pub mod protocol;

pub use auth::*;
pub use date::Timestamp;
pub use hive::*;
pub use monitoring::*;
pub use notification::*;

// =========================================================
// Constants
// =========================================================

/// Storage key under which the bearer token is persisted.
pub const TOKEN_STORAGE_KEY: &str = "token";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_ACCEPT: &str = "Accept";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const HEALTH_PATH: &str = "/health";

/// Formats the `Authorization` header value for a bearer token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

// =========================================================
// Services
// =========================================================

/// The four backend services the console talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Auth,
    Hive,
    Monitoring,
    Notification,
}

impl Service {
    /// Every service, in the order clients are built and visited.
    pub const ALL: [Service; 4] = [
        Service::Auth,
        Service::Hive,
        Service::Monitoring,
        Service::Notification,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Hive => "hive",
            Service::Monitoring => "monitoring",
            Service::Notification => "notification",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Body of the `/health` endpoint every service exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

use apiary_shared::{Service, TOKEN_STORAGE_KEY};
use std::time::Duration;

// =========================================================
// Runtime configuration
// =========================================================

/// Defaults used when the environment does not override them.
const DEFAULT_AUTH_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_HIVE_URL: &str = "http://127.0.0.1:8001";
const DEFAULT_MONITORING_URL: &str = "http://127.0.0.1:8002";
const DEFAULT_NOTIFICATION_URL: &str = "http://127.0.0.1:8003";
const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Where each service lives and how requests are bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub auth_url: String,
    pub hive_url: String,
    pub monitoring_url: String,
    pub notification_url: String,
    pub timeout: Duration,
    pub token_key: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            hive_url: DEFAULT_HIVE_URL.to_string(),
            monitoring_url: DEFAULT_MONITORING_URL.to_string(),
            notification_url: DEFAULT_NOTIFICATION_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            token_key: TOKEN_STORAGE_KEY.to_string(),
        }
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

impl ConsoleConfig {
    /// Reads `APIARY_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |name: &str, default: String| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .map(trim_base)
                .unwrap_or(default)
        };

        let timeout = lookup("APIARY_TIMEOUT_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.timeout);

        Self {
            auth_url: var("APIARY_AUTH_URL", defaults.auth_url),
            hive_url: var("APIARY_HIVE_URL", defaults.hive_url),
            monitoring_url: var("APIARY_MONITORING_URL", defaults.monitoring_url),
            notification_url: var("APIARY_NOTIFICATION_URL", defaults.notification_url),
            timeout,
            token_key: lookup("APIARY_TOKEN_KEY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.token_key),
        }
    }

    /// Points every service at one origin, as a dev proxy would.
    pub fn with_single_origin(mut self, origin: &str) -> Self {
        let origin = trim_base(origin.to_string());
        self.auth_url = origin.clone();
        self.hive_url = origin.clone();
        self.monitoring_url = origin.clone();
        self.notification_url = origin;
        self
    }

    pub fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth_url,
            Service::Hive => &self.hive_url,
            Service::Monitoring => &self.monitoring_url,
            Service::Notification => &self.notification_url,
        }
    }
}

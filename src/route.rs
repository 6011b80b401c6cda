//! Route table.
//!
//! Pure domain model: no I/O, only which views exist and how the session
//! gates them.

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AppRoute {
    #[default]
    Login,
    Dashboard,
    Hives,
    HiveDetails(i64),
    Sensors,
    Inspections,
    Notifications,
    Settings,
    NotFound,
}

impl AppRoute {
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Self::Dashboard,
            "/login" => Self::Login,
            "/hives" => Self::Hives,
            "/sensors" => Self::Sensors,
            "/inspections" => Self::Inspections,
            "/notifications" => Self::Notifications,
            "/settings" => Self::Settings,
            _ => trimmed
                .strip_prefix("/hives/")
                .and_then(|id| id.parse().ok())
                .map(Self::HiveDetails)
                .unwrap_or(Self::NotFound),
        }
    }

    pub fn to_path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Dashboard => "/".to_string(),
            Self::Hives => "/hives".to_string(),
            Self::HiveDetails(id) => format!("/hives/{id}"),
            Self::Sensors => "/sensors".to_string(),
            Self::Inspections => "/inspections".to_string(),
            Self::Notifications => "/notifications".to_string(),
            Self::Settings => "/settings".to_string(),
            Self::NotFound => "/404".to_string(),
        }
    }

    /// Whether the view is behind `RequireSession`.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::Login | Self::NotFound)
    }

    /// Whether the view is behind `RequireAnonymous`.
    pub fn should_redirect_when_authenticated(&self) -> bool {
        matches!(self, Self::Login)
    }

    pub fn auth_failure_redirect() -> Self {
        Self::Login
    }

    pub fn auth_success_redirect() -> Self {
        Self::Dashboard
    }
}

impl Display for AppRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

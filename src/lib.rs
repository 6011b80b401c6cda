pub mod client;
pub mod config;
pub mod error;
pub mod forms;
pub mod guard;
pub mod interceptor;
pub mod navigation;
pub mod request;
pub mod route;
pub mod session;
pub mod state;
pub mod storage;
pub mod stores;

pub use client::{ApiClientFactory, ApiClientSet, ServiceClient, ServiceHealth};
pub use config::ConsoleConfig;
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use guard::{GuardDecision, RouteGuard};
pub use navigation::{MemoryNavigator, Navigator};
pub use request::{HttpClient, ReqwestHttpClient};
pub use route::AppRoute;
pub use session::{LoginOutcome, Session, SessionStore};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use stores::{HiveStore, MonitoringStore, NotificationStore};

use std::rc::Rc;

// =========================================================
// Application context
// =========================================================

/// Everything the views need, built once and passed down explicitly.
///
/// Construction order is fixed: clients first, then the session store that
/// drives them, then the guard and resource stores.
pub struct AppContext {
    pub config: ConsoleConfig,
    pub storage: Rc<dyn KeyValueStore>,
    pub navigator: Rc<dyn Navigator>,
    pub clients: Rc<ApiClientSet>,
    pub session: Rc<SessionStore>,
    pub guard: Rc<RouteGuard>,
    pub hives: HiveStore,
    pub monitoring: MonitoringStore,
    pub notifications: NotificationStore,
}

impl AppContext {
    pub fn new(
        config: ConsoleConfig,
        transport: Rc<dyn HttpClient>,
        storage: Rc<dyn KeyValueStore>,
        navigator: Rc<dyn Navigator>,
    ) -> Self {
        let clients = Rc::new(ApiClientSet::new(
            &config,
            transport,
            storage.clone(),
            navigator.clone(),
        ));
        let session = SessionStore::new(
            clients.clone(),
            storage.clone(),
            navigator.clone(),
            &config.token_key,
        );
        let guard = RouteGuard::new(session.clone(), navigator.clone());

        Self {
            hives: HiveStore::new(clients.clone()),
            monitoring: MonitoringStore::new(clients.clone()),
            notifications: NotificationStore::new(clients.clone()),
            config,
            storage,
            navigator,
            clients,
            session,
            guard,
        }
    }

    /// Context over the real network with the given storage and navigator.
    pub fn with_reqwest(
        config: ConsoleConfig,
        storage: Rc<dyn KeyValueStore>,
        navigator: Rc<dyn Navigator>,
    ) -> Self {
        Self::new(config, Rc::new(ReqwestHttpClient::new()), storage, navigator)
    }

    /// Restores the session and starts following it with the guard.
    pub async fn start(&self) -> GuardDecision {
        self.session.initialize().await;
        self.guard.watch();
        self.guard.enforce()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::MockHttpClient;
    use apiary_shared::protocol::HttpMethod;
    use serde_json::json;

    fn context(path: &str, storage: Rc<MemoryStorage>) -> (Rc<MockHttpClient>, Rc<MemoryNavigator>, AppContext) {
        let http = Rc::new(MockHttpClient::new());
        let navigator = Rc::new(MemoryNavigator::new(path));
        let config = ConsoleConfig::default().with_single_origin("http://api.test");
        let ctx = AppContext::new(config, http.clone(), storage, navigator.clone());
        (http, navigator, ctx)
    }

    #[tokio::test]
    async fn start_restores_a_persisted_session() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set("token", "abc");
        let (http, navigator, ctx) = context("/login", storage);
        http.mock_response(
            HttpMethod::Get,
            "http://api.test/users/me",
            200,
            json!({
                "id": 1,
                "email": "keeper@example.com",
                "username": "keeper",
                "is_active": true,
                "is_superuser": false
            }),
        );

        let decision = ctx.start().await;

        assert_eq!(decision, GuardDecision::Redirect(AppRoute::Dashboard));
        assert_eq!(navigator.current_path(), "/");
        assert!(ctx.session.is_authenticated());
        assert!(
            ctx.clients
                .authorization_headers()
                .iter()
                .all(|h| h.as_deref() == Some("Bearer abc"))
        );
    }

    #[tokio::test]
    async fn fresh_contexts_do_not_share_state() {
        let (_, _, first) = context("/", Rc::new(MemoryStorage::new()));
        let (_, _, second) = context("/", Rc::new(MemoryStorage::new()));

        first.clients.set_token(Some("abc"));

        assert_eq!(second.clients.authorization_headers(), vec![None; 4]);
        first.start().await;
        assert!(!second.session.snapshot().initialized);
    }
}

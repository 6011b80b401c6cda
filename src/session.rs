//! Session store.
//!
//! Single source of truth for "who is signed in". The persisted token is
//! written only here and by the 401 hook, and every write is mirrored to the
//! client set before the operation that made it returns.

use crate::client::ApiClientSet;
use crate::error::ApiResult;
use crate::navigation::{Navigator, redirect_to_login};
use crate::state::{Observable, SubscriptionId};
use crate::storage::{KeyValueStore, StorageEvent};
use apiary_shared::protocol::CurrentUser;
use apiary_shared::{ChangePassword, TokenRequest, TokenResponse, UserProfile};
use serde::Serialize;
use std::cell::Cell;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

const MISSING_TOKEN_MESSAGE: &str = "Login response did not include an access token";
const USER_FETCH_MESSAGE: &str = "Failed to fetch user information";
const LOGIN_FALLBACK_MESSAGE: &str = "Failed to login";

// =========================================================
// State
// =========================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
    pub loading: bool,
    pub initialized: bool,
    pub error: Option<String>,
}

impl Session {
    /// Only a server-confirmed user counts; a stored token alone does not.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Guards must not decide anything yet.
    pub fn is_pending(&self) -> bool {
        !self.initialized || self.loading
    }

    fn clear(&mut self) {
        self.token = None;
        self.user = None;
        self.error = None;
        self.loading = false;
    }
}

/// Result of [`SessionStore::login`]; failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginOutcome {
    pub success: bool,
    pub is_authenticated: bool,
    pub user: Option<UserProfile>,
}

impl LoginOutcome {
    fn failed() -> Self {
        Self {
            success: false,
            is_authenticated: false,
            user: None,
        }
    }
}

// =========================================================
// SessionStore
// =========================================================

pub struct SessionStore {
    state: Observable<Session>,
    clients: Rc<ApiClientSet>,
    storage: Rc<dyn KeyValueStore>,
    navigator: Rc<dyn Navigator>,
    token_key: String,
    init_started: Cell<bool>,
}

impl SessionStore {
    /// Builds the store and hooks it to 401s and to external storage changes.
    pub fn new(
        clients: Rc<ApiClientSet>,
        storage: Rc<dyn KeyValueStore>,
        navigator: Rc<dyn Navigator>,
        token_key: &str,
    ) -> Rc<Self> {
        let store = Rc::new(Self {
            state: Observable::default(),
            clients,
            storage,
            navigator,
            token_key: token_key.to_string(),
            init_started: Cell::new(false),
        });

        let weak: Weak<Self> = Rc::downgrade(&store);
        store.clients.events().on_unauthorized(move || {
            if let Some(store) = weak.upgrade() {
                store.drop_session("server rejected credentials");
            }
        });

        let weak: Weak<Self> = Rc::downgrade(&store);
        store.storage.subscribe(Rc::new(move |event: &StorageEvent| {
            if let Some(store) = weak.upgrade() {
                store.on_storage_event(event);
            }
        }));

        store
    }

    pub fn snapshot(&self) -> Session {
        self.state.get()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.with(Session::is_authenticated)
    }

    pub fn subscribe(&self, subscriber: impl Fn(&Session) + 'static) -> SubscriptionId {
        self.state.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }

    pub fn clear_error(&self) {
        self.state.update(|s| s.error = None);
    }

    /// Restores a persisted session. Only the first call does anything.
    pub async fn initialize(&self) {
        if self.init_started.replace(true) {
            debug!("session initialization already started");
            return;
        }
        self.state.update(|s| s.loading = true);

        if let Some(token) = self.storage.get(&self.token_key) {
            self.clients.set_token(Some(&token));
            self.state.update(|s| s.token = Some(token));
            self.check_auth().await;
        }

        self.state.update(|s| {
            s.initialized = true;
            s.loading = false;
        });
        info!(authenticated = self.is_authenticated(), "session initialized");
    }

    /// Exchanges credentials for a token and loads the user behind it.
    ///
    /// Any failure rolls the token back out of storage and out of every
    /// client, and records a message in `error`.
    pub async fn login(&self, identifier: &str, secret: &str) -> LoginOutcome {
        self.state.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let request = TokenRequest {
            username: identifier.to_string(),
            password: secret.to_string(),
        };
        let result = match self.clients.call(&request).await {
            Ok(TokenResponse {
                access_token: Some(token),
                ..
            }) if !token.is_empty() => self.adopt_token(token).await,
            Ok(_) => Err(MISSING_TOKEN_MESSAGE.to_string()),
            Err(e) => Err(e.message_or(LOGIN_FALLBACK_MESSAGE).to_string()),
        };

        match result {
            Ok(()) => {
                let session = self.state.update(|s| {
                    s.loading = false;
                    s.clone()
                });
                info!(user_id = session.user.as_ref().map(|u| u.id), "logged in");
                LoginOutcome {
                    success: true,
                    is_authenticated: session.is_authenticated(),
                    user: session.user,
                }
            }
            Err(message) => {
                warn!(%message, "login failed");
                self.storage.delete(&self.token_key);
                self.clients.set_token(None);
                self.state.update(|s| {
                    s.clear();
                    s.error = Some(message);
                });
                LoginOutcome::failed()
            }
        }
    }

    async fn adopt_token(&self, token: String) -> Result<(), String> {
        self.storage.set(&self.token_key, &token);
        self.clients.set_token(Some(&token));
        self.state.update(|s| s.token = Some(token));
        if self.check_auth().await {
            Ok(())
        } else {
            Err(USER_FETCH_MESSAGE.to_string())
        }
    }

    /// Confirms the persisted token with the server.
    ///
    /// Never makes a request without a token. A failed check is "not signed
    /// in", not an error, so `error` is cleared either way. A result for a
    /// token that was removed or replaced while the request was in flight is
    /// discarded.
    pub async fn check_auth(&self) -> bool {
        let Some(token) = self.storage.get(&self.token_key) else {
            debug!("no persisted token");
            return false;
        };

        let result = self.clients.call(&CurrentUser).await;
        if self.storage.get(&self.token_key).as_deref() != Some(token.as_str()) {
            debug!("token changed during check; result discarded");
            return false;
        }

        match result {
            Ok(user) => {
                self.state.update(|s| {
                    s.token = Some(token);
                    s.user = Some(user);
                    s.error = None;
                });
                true
            }
            Err(e) => {
                warn!(status = ?e.status, code = e.code(), "token check failed");
                self.storage.delete(&self.token_key);
                self.clients.set_token(None);
                self.state.update(|s| {
                    s.token = None;
                    s.user = None;
                    s.error = None;
                });
                false
            }
        }
    }

    /// Ends the session and sends the user to the login view. Idempotent.
    pub fn logout(&self) {
        self.storage.delete(&self.token_key);
        self.clients.set_token(None);
        self.state.update(Session::clear);
        info!("logged out");
        redirect_to_login(self.navigator.as_ref());
    }

    pub async fn change_password(&self, current: &str, new: &str) -> ApiResult<()> {
        let request = ChangePassword {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        match self.clients.call(&request).await {
            Ok(_) => {
                info!("password changed");
                Ok(())
            }
            Err(e) => {
                warn!(code = e.code(), message = %e.message, "password change failed");
                Err(e)
            }
        }
    }

    fn drop_session(&self, reason: &str) {
        self.clients.set_token(None);
        self.state.update(Session::clear);
        info!(reason, "session dropped");
    }

    fn on_storage_event(&self, event: &StorageEvent) {
        if event.key != self.token_key || !event.is_removal() {
            return;
        }
        self.drop_session("token removed by another context");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleConfig;
    use crate::error::ApiErrorKind;
    use crate::navigation::MemoryNavigator;
    use crate::request::{MockHttpClient, TransportError};
    use crate::storage::MemoryStorage;
    use apiary_shared::protocol::HttpMethod;
    use serde_json::{Value, json};
    use std::cell::RefCell;

    const TOKEN_URL: &str = "http://api.test/token";
    const ME_URL: &str = "http://api.test/users/me";

    struct TestContext {
        http: Rc<MockHttpClient>,
        storage: Rc<MemoryStorage>,
        navigator: Rc<MemoryNavigator>,
        clients: Rc<ApiClientSet>,
        store: Rc<SessionStore>,
    }

    impl TestContext {
        fn new(path: &str) -> Self {
            Self::with_storage(path, Rc::new(MemoryStorage::new()))
        }

        fn with_storage(path: &str, storage: Rc<MemoryStorage>) -> Self {
            let http = Rc::new(MockHttpClient::new());
            let navigator = Rc::new(MemoryNavigator::new(path));
            let config = ConsoleConfig::default().with_single_origin("http://api.test");
            let clients = Rc::new(ApiClientSet::new(
                &config,
                http.clone(),
                storage.clone(),
                navigator.clone(),
            ));
            let store = SessionStore::new(clients.clone(), storage.clone(), navigator.clone(), "token");
            Self {
                http,
                storage,
                navigator,
                clients,
                store,
            }
        }

        fn mock_token(&self, status: u16, body: Value) {
            self.http.mock_response(HttpMethod::Post, TOKEN_URL, status, body);
        }

        fn mock_me(&self, status: u16, body: Value) {
            self.http.mock_response(HttpMethod::Get, ME_URL, status, body);
        }

        fn assert_no_token_anywhere(&self) {
            assert_eq!(self.storage.get("token"), None);
            assert_eq!(self.clients.authorization_headers(), vec![None; 4]);
        }
    }

    fn keeper() -> Value {
        json!({
            "id": 7,
            "email": "keeper@example.com",
            "username": "keeper",
            "is_active": true,
            "is_superuser": false
        })
    }

    #[tokio::test]
    async fn login_with_valid_credentials_authenticates() {
        let ctx = TestContext::new("/login");
        ctx.mock_token(200, json!({ "access_token": "abc", "token_type": "bearer" }));
        ctx.mock_me(200, keeper());

        let outcome = ctx.store.login("keeper@example.com", "secret").await;

        assert!(outcome.success);
        assert!(outcome.is_authenticated);
        assert_eq!(outcome.user.as_ref().map(|u| u.id), Some(7));

        let session = ctx.store.snapshot();
        assert!(session.is_authenticated());
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert!(!session.loading);
        assert_eq!(session.error, None);
        assert_eq!(ctx.storage.get("token").as_deref(), Some("abc"));
        assert!(
            ctx.clients
                .authorization_headers()
                .iter()
                .all(|h| h.as_deref() == Some("Bearer abc"))
        );
        assert_eq!(
            ctx.http.last_request().unwrap().header("Authorization"),
            Some("Bearer abc")
        );
    }

    #[tokio::test]
    async fn login_with_wrong_password_records_the_server_message() {
        let ctx = TestContext::new("/login");
        ctx.mock_token(401, json!({ "detail": "Incorrect username or password" }));

        let outcome = ctx.store.login("keeper@example.com", "wrong").await;

        assert_eq!(outcome, LoginOutcome::failed());
        let session = ctx.store.snapshot();
        assert!(!session.is_authenticated());
        assert_eq!(session.error.as_deref(), Some("Incorrect username or password"));
        ctx.assert_no_token_anywhere();
        assert_eq!(ctx.http.calls(HttpMethod::Get, ME_URL), 0);
        assert_eq!(ctx.navigator.history(), vec!["/login"]);
    }

    #[tokio::test]
    async fn login_without_token_in_response_rolls_back() {
        let ctx = TestContext::new("/login");
        ctx.mock_token(200, json!({ "token_type": "bearer" }));

        let outcome = ctx.store.login("keeper@example.com", "secret").await;

        assert!(!outcome.success);
        assert_eq!(ctx.store.snapshot().error.as_deref(), Some(MISSING_TOKEN_MESSAGE));
        ctx.assert_no_token_anywhere();
    }

    #[tokio::test]
    async fn login_rolls_back_when_user_fetch_fails() {
        let ctx = TestContext::new("/login");
        ctx.mock_token(200, json!({ "access_token": "abc" }));
        ctx.mock_me(500, json!({ "detail": "database unavailable" }));

        let outcome = ctx.store.login("keeper@example.com", "secret").await;

        assert!(!outcome.success);
        let session = ctx.store.snapshot();
        assert!(!session.is_authenticated());
        assert_eq!(session.token, None);
        assert_eq!(session.error.as_deref(), Some(USER_FETCH_MESSAGE));
        ctx.assert_no_token_anywhere();
    }

    #[tokio::test]
    async fn login_reports_network_failures() {
        let ctx = TestContext::new("/login");
        ctx.http.mock_failure(
            HttpMethod::Post,
            TOKEN_URL,
            TransportError::Network("connection refused".into()),
        );

        let outcome = ctx.store.login("keeper@example.com", "secret").await;

        assert!(!outcome.success);
        assert_eq!(
            ctx.store.snapshot().error.as_deref(),
            Some(crate::error::NETWORK_ERROR_MESSAGE)
        );
    }

    #[tokio::test]
    async fn check_auth_without_token_makes_no_request() {
        let ctx = TestContext::new("/");

        assert!(!ctx.store.check_auth().await);
        assert!(ctx.http.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn check_auth_failure_is_silent() {
        let ctx = TestContext::new("/");
        ctx.storage.set("token", "expired");
        ctx.mock_me(403, json!({ "detail": "Inactive user" }));

        assert!(!ctx.store.check_auth().await);

        let session = ctx.store.snapshot();
        assert_eq!(session.error, None);
        assert_eq!(session.user, None);
        ctx.assert_no_token_anywhere();
    }

    #[tokio::test]
    async fn unauthorized_response_drops_the_session() {
        let ctx = TestContext::new("/login");
        ctx.mock_token(200, json!({ "access_token": "abc" }));
        ctx.mock_me(200, keeper());
        ctx.store.login("keeper@example.com", "secret").await;
        ctx.navigator.navigate("/hives");
        assert!(ctx.store.is_authenticated());

        ctx.http.mock_response(
            HttpMethod::Get,
            "http://api.test/hives/",
            401,
            json!({ "detail": "Could not validate credentials" }),
        );
        let err = ctx
            .clients
            .call(&apiary_shared::protocol::ListHives)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::Unauthorized);
        assert!(!ctx.store.is_authenticated());
        ctx.assert_no_token_anywhere();
        assert_eq!(ctx.navigator.current_path(), "/login");
    }

    #[tokio::test]
    async fn concurrent_initialize_fetches_the_user_once() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set("token", "abc");
        let ctx = TestContext::with_storage("/", storage);
        ctx.mock_me(200, keeper());

        futures::join!(ctx.store.initialize(), ctx.store.initialize());
        ctx.store.initialize().await;

        assert_eq!(ctx.http.calls(HttpMethod::Get, ME_URL), 1);
        let session = ctx.store.snapshot();
        assert!(session.initialized);
        assert!(!session.loading);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn second_initialize_returns_while_first_is_pending() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set("token", "abc");
        let ctx = TestContext::with_storage("/", storage);
        ctx.mock_me(200, keeper());

        let observed = Rc::new(RefCell::new(None));
        let sink = observed.clone();
        let store = ctx.store.clone();
        let second = async move {
            store.initialize().await;
            *sink.borrow_mut() = Some(store.snapshot());
        };
        futures::join!(ctx.store.initialize(), second);

        let mid = observed.borrow().clone().unwrap();
        assert!(mid.is_pending());
        assert!(ctx.store.snapshot().initialized);
    }

    #[tokio::test]
    async fn initialize_without_token_ends_anonymous() {
        let ctx = TestContext::new("/");

        ctx.store.initialize().await;

        let session = ctx.store.snapshot();
        assert!(session.initialized);
        assert!(!session.loading);
        assert!(!session.is_authenticated());
        assert!(ctx.http.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn initialize_fails_open_on_network_errors() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set("token", "abc");
        let ctx = TestContext::with_storage("/", storage);
        ctx.http.mock_failure(
            HttpMethod::Get,
            ME_URL,
            TransportError::Timeout(std::time::Duration::from_millis(15_000)),
        );

        ctx.store.initialize().await;

        let session = ctx.store.snapshot();
        assert!(session.initialized);
        assert!(!session.is_authenticated());
        assert_eq!(session.error, None);
    }

    #[tokio::test]
    async fn removal_in_another_context_signs_out() {
        let storage = Rc::new(MemoryStorage::new());
        let ctx = TestContext::with_storage("/login", storage.clone());
        ctx.mock_token(200, json!({ "access_token": "abc" }));
        ctx.mock_me(200, keeper());
        ctx.store.login("keeper@example.com", "secret").await;
        assert!(ctx.store.is_authenticated());

        let other_tab = storage.open_context();
        other_tab.set("theme", "dark");
        assert!(ctx.store.is_authenticated());
        other_tab.set("token", "rotated");
        assert!(ctx.store.is_authenticated());

        other_tab.delete("token");

        assert!(!ctx.store.is_authenticated());
        assert_eq!(ctx.clients.authorization_headers(), vec![None; 4]);
        assert_eq!(ctx.navigator.history(), vec!["/login"]);
    }

    #[tokio::test]
    async fn removal_during_a_pending_check_keeps_the_session_closed() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set("token", "abc");
        let ctx = TestContext::with_storage("/", storage.clone());
        ctx.mock_me(200, keeper());
        let other_tab = storage.open_context();

        futures::join!(ctx.store.initialize(), async {
            assert_eq!(ctx.http.calls(HttpMethod::Get, ME_URL), 1);
            other_tab.delete("token");
        });

        let session = ctx.store.snapshot();
        assert!(session.initialized);
        assert!(!session.is_authenticated());
        assert_eq!(session.token, None);
        ctx.assert_no_token_anywhere();
    }

    #[tokio::test]
    async fn logout_during_a_pending_check_wins() {
        let storage = Rc::new(MemoryStorage::new());
        storage.set("token", "abc");
        let ctx = TestContext::with_storage("/hives", storage);
        ctx.mock_me(200, keeper());

        let (checked, _) = futures::join!(ctx.store.check_auth(), async {
            ctx.store.logout();
        });

        assert!(!checked);
        assert!(!ctx.store.is_authenticated());
        assert_eq!(ctx.store.snapshot().token, None);
        ctx.assert_no_token_anywhere();
        assert_eq!(ctx.navigator.current_path(), "/login");
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let ctx = TestContext::new("/login");
        ctx.mock_token(200, json!({ "access_token": "abc" }));
        ctx.mock_me(200, keeper());
        ctx.store.login("keeper@example.com", "secret").await;
        ctx.navigator.navigate("/settings");

        ctx.store.logout();
        let after_first = ctx.store.snapshot();
        ctx.store.logout();

        assert_eq!(ctx.store.snapshot(), after_first);
        assert!(!after_first.is_authenticated());
        ctx.assert_no_token_anywhere();
        assert_eq!(ctx.navigator.history(), vec!["/login", "/settings", "/login"]);
    }

    #[tokio::test]
    async fn subscribers_never_see_authenticated_without_user() {
        let ctx = TestContext::new("/login");
        ctx.mock_token(200, json!({ "access_token": "abc" }));
        ctx.mock_me(200, keeper());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        ctx.store.subscribe(move |s| sink.borrow_mut().push(s.clone()));

        ctx.store.login("keeper@example.com", "secret").await;

        let seen = seen.borrow();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|s| s.loading || s.token.is_none() || s.user.is_some()));
        assert!(seen.last().unwrap().is_authenticated());
    }

    #[tokio::test]
    async fn change_password_surfaces_normalized_errors() {
        let ctx = TestContext::new("/settings");
        ctx.http.mock_response(
            HttpMethod::Post,
            "http://api.test/change-password",
            400,
            json!({ "detail": "Incorrect current password" }),
        );

        let err = ctx.store.change_password("old", "new-password").await.unwrap_err();
        assert_eq!(err.message, "Incorrect current password");
        assert_eq!(err.status, Some(400));

        ctx.http.mock_response(
            HttpMethod::Post,
            "http://api.test/change-password",
            200,
            json!({ "message": "Password updated successfully" }),
        );
        assert!(ctx.store.change_password("old", "new-password").await.is_ok());
    }
}

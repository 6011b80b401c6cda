//! Request/response hooks shared by every service client.

use crate::error::ApiError;
use crate::navigation::{Navigator, redirect_to_login};
use crate::request::HttpRequest;
use crate::storage::KeyValueStore;
use apiary_shared::{HEADER_AUTHORIZATION, bearer};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Runs on every outgoing request, right before dispatch.
pub trait RequestInterceptor {
    fn before_send(&self, req: &mut HttpRequest);
}

/// Observes every normalized failure before it is handed back to the caller.
pub trait ResponseInterceptor {
    fn on_error(&self, err: &ApiError);
}

// =========================================================
// AuthEvents
// =========================================================

type Listener = Rc<dyn Fn()>;

/// Fan-out for "the server rejected our credentials".
///
/// Lets the session store react to a 401 without the clients holding a
/// reference back to it.
#[derive(Default)]
pub struct AuthEvents {
    unauthorized: RefCell<Vec<Listener>>,
}

impl AuthEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_unauthorized(&self, listener: impl Fn() + 'static) {
        self.unauthorized.borrow_mut().push(Rc::new(listener));
    }

    pub fn emit_unauthorized(&self) {
        let listeners: Vec<Listener> = self.unauthorized.borrow().clone();
        for listener in listeners {
            listener();
        }
    }
}

// =========================================================
// AuthInterceptor
// =========================================================

/// Injects the bearer token and turns 401s into a global logout.
pub struct AuthInterceptor {
    storage: Rc<dyn KeyValueStore>,
    navigator: Rc<dyn Navigator>,
    events: Rc<AuthEvents>,
    token_key: String,
}

impl AuthInterceptor {
    pub fn new(
        storage: Rc<dyn KeyValueStore>,
        navigator: Rc<dyn Navigator>,
        events: Rc<AuthEvents>,
        token_key: &str,
    ) -> Self {
        Self {
            storage,
            navigator,
            events,
            token_key: token_key.to_string(),
        }
    }
}

impl RequestInterceptor for AuthInterceptor {
    fn before_send(&self, req: &mut HttpRequest) {
        // Read at dispatch time: another context may have changed it.
        if let Some(token) = self.storage.get(&self.token_key) {
            req.headers
                .insert(HEADER_AUTHORIZATION.to_string(), bearer(&token));
            debug!(url = %req.url, "attached bearer token");
        }
    }
}

impl ResponseInterceptor for AuthInterceptor {
    fn on_error(&self, err: &ApiError) {
        if err.status != Some(401) {
            return;
        }
        warn!("unauthorized response, clearing session");
        self.storage.delete(&self.token_key);
        self.events.emit_unauthorized();
        redirect_to_login(self.navigator.as_ref());
    }
}

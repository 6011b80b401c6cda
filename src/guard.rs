//! View gates.
//!
//! `require_session` and `require_anonymous` are pure functions of the
//! session snapshot. [`RouteGuard`] binds them to a store and a navigator.

use crate::navigation::Navigator;
use crate::route::AppRoute;
use crate::session::{Session, SessionStore};
use crate::state::SubscriptionId;
use std::cell::Cell;
use std::rc::Rc;
use tracing::info;

/// What a gate tells the view to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session not validated yet; show a neutral placeholder.
    Pending,
    Render,
    Redirect(AppRoute),
}

/// Gate for views that need a signed-in user.
pub fn require_session(session: &Session) -> GuardDecision {
    if session.is_pending() {
        GuardDecision::Pending
    } else if session.is_authenticated() {
        GuardDecision::Render
    } else {
        GuardDecision::Redirect(AppRoute::auth_failure_redirect())
    }
}

/// Gate for the login view.
pub fn require_anonymous(session: &Session) -> GuardDecision {
    if session.is_pending() {
        GuardDecision::Pending
    } else if session.is_authenticated() {
        GuardDecision::Redirect(AppRoute::auth_success_redirect())
    } else {
        GuardDecision::Render
    }
}

/// Picks the gate a route sits behind.
pub fn decide(route: &AppRoute, session: &Session) -> GuardDecision {
    if route.requires_auth() {
        require_session(session)
    } else if route.should_redirect_when_authenticated() {
        require_anonymous(session)
    } else {
        GuardDecision::Render
    }
}

pub struct RouteGuard {
    store: Rc<SessionStore>,
    navigator: Rc<dyn Navigator>,
    watching: Cell<Option<SubscriptionId>>,
}

impl RouteGuard {
    pub fn new(store: Rc<SessionStore>, navigator: Rc<dyn Navigator>) -> Rc<Self> {
        Rc::new(Self {
            store,
            navigator,
            watching: Cell::new(None),
        })
    }

    pub fn resolve(&self, route: &AppRoute) -> GuardDecision {
        decide(route, &self.store.snapshot())
    }

    /// Resolves the current route and follows a redirect, if any.
    pub fn enforce(&self) -> GuardDecision {
        let route = self.navigator.current_route();
        let decision = self.resolve(&route);
        if let GuardDecision::Redirect(target) = &decision {
            info!(from = %route, to = %target, "guard redirect");
            self.navigator.navigate(&target.to_path());
        }
        decision
    }

    /// Re-checks the current route whenever the session changes.
    pub fn watch(self: &Rc<Self>) {
        if self.watching.get().is_some() {
            return;
        }
        let weak = Rc::downgrade(self);
        let id = self.store.subscribe(move |session| {
            let Some(guard) = weak.upgrade() else {
                return;
            };
            let route = guard.navigator.current_route();
            if let GuardDecision::Redirect(target) = decide(&route, session) {
                info!(from = %route, to = %target, "session changed, leaving view");
                guard.navigator.navigate(&target.to_path());
            }
        });
        self.watching.set(Some(id));
    }

    pub fn unwatch(&self) {
        if let Some(id) = self.watching.take() {
            self.store.unsubscribe(id);
        }
    }
}

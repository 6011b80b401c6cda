//! Hard navigation capability.

use crate::route::AppRoute;
use std::cell::RefCell;
use tracing::info;

pub trait Navigator {
    fn current_path(&self) -> String;

    /// Full navigation to `path`, replacing the current view.
    fn navigate(&self, path: &str);

    fn current_route(&self) -> AppRoute {
        AppRoute::from_path(&self.current_path())
    }
}

/// Sends the user to the login view unless they are already there.
pub fn redirect_to_login(navigator: &dyn Navigator) {
    if navigator.current_route() != AppRoute::Login {
        let target = AppRoute::auth_failure_redirect().to_path();
        info!(from = %navigator.current_path(), "redirecting to login");
        navigator.navigate(&target);
    }
}

/// Navigator that keeps its history in memory.
pub struct MemoryNavigator {
    history: RefCell<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(initial_path: &str) -> Self {
        Self {
            history: RefCell::new(vec![initial_path.to_string()]),
        }
    }

    /// Every path visited, starting with the initial one.
    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.history.borrow().last().cloned().unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&self, path: &str) {
        self.history.borrow_mut().push(path.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirects_once_and_not_from_login() {
        let nav = MemoryNavigator::new("/hives/3");
        redirect_to_login(&nav);
        redirect_to_login(&nav);
        assert_eq!(nav.history(), vec!["/hives/3", "/login"]);
    }
}

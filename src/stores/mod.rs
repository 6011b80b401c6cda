//! Resource stores mirroring the hive, monitoring and notification services.
//!
//! Every operation clears `error`, raises `loading`, and on failure records
//! the normalized message. Failures are never returned to the caller.

pub mod hive;
pub mod monitoring;
pub mod notification;

pub use hive::{HiveState, HiveStore};
pub use monitoring::{MonitoringState, MonitoringStore};
pub use notification::{NotificationState, NotificationStore};

use crate::error::ApiResult;
use crate::state::Observable;
use std::future::Future;
use tracing::warn;

/// Request bookkeeping shared by every store state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadState {
    pub loading: bool,
    pub error: Option<String>,
}

pub trait Tracked {
    fn load_state(&mut self) -> &mut LoadState;
}

/// Runs `request` with loading/error bookkeeping.
///
/// On success `apply` folds the response into the state in the same update
/// that lowers `loading`; on failure the state keeps its data.
pub(crate) async fn track<S, T, R>(
    state: &Observable<S>,
    operation: &str,
    request: impl Future<Output = ApiResult<T>>,
    apply: impl FnOnce(&mut S, T) -> R,
) -> Option<R>
where
    S: Clone + Tracked,
{
    state.update(|s| {
        let load = s.load_state();
        load.loading = true;
        load.error = None;
    });

    match request.await {
        Ok(value) => Some(state.update(|s| {
            s.load_state().loading = false;
            apply(s, value)
        })),
        Err(e) => {
            warn!(operation, code = e.code(), message = %e.message, "store operation failed");
            state.update(|s| {
                let load = s.load_state();
                load.loading = false;
                load.error = Some(e.message);
            });
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::client::ApiClientSet;
    use crate::config::ConsoleConfig;
    use crate::navigation::MemoryNavigator;
    use crate::request::MockHttpClient;
    use crate::storage::MemoryStorage;
    use std::rc::Rc;

    pub const ORIGIN: &str = "http://api.test";

    pub fn clients() -> (Rc<MockHttpClient>, Rc<ApiClientSet>) {
        let http = Rc::new(MockHttpClient::new());
        let config = ConsoleConfig::default().with_single_origin(ORIGIN);
        let clients = ApiClientSet::new(
            &config,
            http.clone(),
            Rc::new(MemoryStorage::new()),
            Rc::new(MemoryNavigator::new("/")),
        );
        (http, Rc::new(clients))
    }

    pub fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }
}

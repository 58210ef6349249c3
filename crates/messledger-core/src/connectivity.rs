//! Remote reachability tracking.
//!
//! The `ConnectivityMonitor` remembers the outcome of the last health check
//! and decides whether the remote service may be used. It never guesses:
//! until a check (or a successful response) proves both the backend and its
//! data store are up, every operation goes to the local store.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

/// Default validity window of a health check.
/// Doubled once the remote has proven reliable to reduce check churn.
pub const DEFAULT_CHECK_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub remote_configured: bool,
    pub backend_available: bool,
    pub data_store_connected: bool,
    pub last_checked_at: Option<Instant>,
    pub confirmed_working: bool,
}

impl ConnectivityState {
    fn new(remote_configured: bool) -> Self {
        Self {
            remote_configured,
            backend_available: false,
            data_store_connected: false,
            last_checked_at: None,
            confirmed_working: false,
        }
    }

    pub fn should_use_remote(&self) -> bool {
        self.remote_configured && self.backend_available && self.data_store_connected
    }
}

pub struct ConnectivityMonitor {
    state: Mutex<ConnectivityState>,
    check_window: Duration,
}

impl ConnectivityMonitor {
    pub fn new(remote_configured: bool, check_window: Duration) -> Self {
        Self {
            state: Mutex::new(ConnectivityState::new(remote_configured)),
            check_window,
        }
    }

    /// Monitor for a client with no remote configured; always local.
    pub fn local_only() -> Self {
        Self::new(false, DEFAULT_CHECK_WINDOW)
    }

    fn lock(&self) -> MutexGuard<'_, ConnectivityState> {
        // State is plain flags, so a poisoned lock still holds usable data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of a health check or of a response that reported
    /// the store status. Returns true when this changed the data source.
    pub fn record_health(&self, data_store_connected: bool, backend_available: bool) -> bool {
        let mut state = self.lock();
        let was_remote = state.should_use_remote();

        state.data_store_connected = data_store_connected;
        state.backend_available = backend_available;
        state.last_checked_at = Some(Instant::now());
        if data_store_connected || backend_available {
            state.confirmed_working = true;
        }

        let is_remote = state.should_use_remote();
        if was_remote != is_remote {
            info!(
                remote = is_remote,
                backend_available, data_store_connected, "Data source changed"
            );
        } else {
            debug!(backend_available, data_store_connected, "Health recorded");
        }
        was_remote != is_remote
    }

    /// Record that the remote could not be reached. Returns true only for
    /// the call that moved the data source from remote to local.
    pub fn mark_unavailable(&self) -> bool {
        self.record_health(false, false)
    }

    /// Whether the last check is recent enough to trust.
    pub fn is_check_valid(&self) -> bool {
        let state = self.lock();
        let Some(checked_at) = state.last_checked_at else {
            return false;
        };
        let window = if state.confirmed_working {
            self.check_window * 2
        } else {
            self.check_window
        };
        checked_at.elapsed() <= window
    }

    pub fn should_use_remote(&self) -> bool {
        self.lock().should_use_remote()
    }

    pub fn is_remote_configured(&self) -> bool {
        self.lock().remote_configured
    }

    pub fn snapshot(&self) -> ConnectivityState {
        *self.lock()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::local_only()
    }
}

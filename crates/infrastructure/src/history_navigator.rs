//! Navigator recording visited paths, for processes without a browser router.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;
use tramite_application::Navigator;

/// Navigator keeping the navigation history in memory.
#[derive(Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    /// Creates a navigator with an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recent destination.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.history().last().cloned()
    }

    /// Returns every destination in visiting order.
    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.history().clone()
    }

    fn history(&self) -> MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, path: &str) {
        info!(path = path, "navigating");
        self.history().push(path.to_owned());
    }
}

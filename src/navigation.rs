use std::sync::{Mutex, PoisonError};

use tracing::info;

/// Page navigation primitive of the host environment
pub trait Navigator: Send + Sync {
    /// Path of the view currently shown
    fn current_view(&self) -> String;

    fn navigate_to(&self, view: &str);
}

/// Whether `current` already shows `view` (paths may carry a prefix)
pub fn is_on_view(current: &str, view: &str) -> bool {
    current.contains(view)
}

#[derive(Debug)]
struct History {
    current: String,
    navigations: Vec<String>,
}

/// Navigator that keeps the current view and every navigation in memory
#[derive(Debug)]
pub struct HistoryNavigator {
    history: Mutex<History>,
}

impl HistoryNavigator {
    pub fn new(initial_view: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(History {
                current: initial_view.into(),
                navigations: Vec::new(),
            }),
        }
    }

    /// Views navigated to, oldest first
    pub fn navigations(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .navigations
            .clone()
    }

    pub fn navigation_count(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .navigations
            .len()
    }
}

impl Navigator for HistoryNavigator {
    fn current_view(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    fn navigate_to(&self, view: &str) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        info!(from = %history.current, to = %view, "Navigating");
        history.current = view.to_string();
        history.navigations.push(view.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_records_navigations() {
        let navigator = HistoryNavigator::new("/app/dashboard.html");
        assert_eq!(navigator.navigation_count(), 0);

        navigator.navigate_to("index.html");
        assert_eq!(navigator.current_view(), "index.html");
        assert_eq!(navigator.navigations(), vec!["index.html".to_string()]);
    }

    #[test]
    fn test_is_on_view() {
        assert!(is_on_view("/app/index.html", "index.html"));
        assert!(!is_on_view("/app/attendance.html", "index.html"));
    }
}

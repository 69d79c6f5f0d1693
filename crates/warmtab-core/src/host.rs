//! Capabilities the core consumes from the browser.
//!
//! The browser owns every tab and window and is the only source of truth for
//! whether they exist. These traits are the whole surface the core relies on;
//! the daemon implements them over the native-messaging bridge and tests
//! implement them in memory.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use warmtab_types::{
    ContentMessage, CreateWindow, TabId, TabInfo, WindowId, WindowInfo, WindowType,
};

/// Errors reported by the browser side.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The tab, window or receiver no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// The browser does not implement the API.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The bridge to the browser failed.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// Any other browser-reported failure.
    #[error("{0}")]
    Other(String),
}

impl HostError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// Tab and window lifecycle API of the browser.
///
/// Every call is a suspension point: other event handlers may run and the
/// browser may change state before the call returns.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// All windows of the given type. Popup windows are returned populated
    /// with their tabs.
    async fn windows(&self, kind: WindowType) -> HostResult<Vec<WindowInfo>>;

    async fn create_window(&self, params: CreateWindow) -> HostResult<WindowInfo>;

    /// Fails with [`HostError::NotFound`] when the window is gone.
    async fn get_window(&self, window_id: WindowId) -> HostResult<WindowInfo>;

    async fn focus_window(&self, window_id: WindowId) -> HostResult<()>;

    /// Removing a window that is already gone succeeds.
    async fn remove_window(&self, window_id: WindowId) -> HostResult<()>;

    /// Fails with [`HostError::NotFound`] when the tab is gone.
    async fn get_tab(&self, tab_id: TabId) -> HostResult<TabInfo>;

    /// The active tab of the last focused window.
    async fn active_tab(&self) -> HostResult<Option<TabInfo>>;

    async fn create_tab(&self, url: &str, active: bool) -> HostResult<TabInfo>;

    /// `index` of `-1` appends to the end of the window.
    async fn move_tab(&self, tab_id: TabId, window_id: WindowId, index: i32) -> HostResult<()>;

    async fn activate_tab(&self, tab_id: TabId) -> HostResult<()>;

    async fn remove_tab(&self, tab_id: TabId) -> HostResult<()>;

    /// Fails when no content script is listening in the tab yet.
    async fn send_message(&self, tab_id: TabId, message: &ContentMessage) -> HostResult<()>;

    /// Concatenated text of the elements matching `selector` in the page.
    async fn extract_text(&self, tab_id: TabId, selector: &str) -> HostResult<String>;
}

/// One tier of the browser's key-value storage.
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Values for the requested keys; absent keys are omitted.
    async fn get(&self, keys: &[&str]) -> HostResult<HashMap<String, Value>>;

    async fn set(&self, items: HashMap<String, Value>) -> HostResult<()>;

    async fn remove(&self, keys: &[&str]) -> HostResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_error_display() {
        assert_eq!(
            HostError::NotFound("tab 4".to_string()).to_string(),
            "not found: tab 4"
        );
        assert_eq!(
            HostError::Unsupported("windows".to_string()).to_string(),
            "unsupported: windows"
        );
        assert_eq!(HostError::Other("boom".to_string()).to_string(), "boom");
    }

    #[test]
    fn test_is_not_found() {
        assert!(HostError::NotFound("x".to_string()).is_not_found());
        assert!(!HostError::Bridge("closed".to_string()).is_not_found());
    }
}

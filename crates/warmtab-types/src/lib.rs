//! Shared types for warmtab components.
//!
//! This crate provides the browser-facing types used across warmtab-core,
//! warmtab-rpc and warmtab-daemon. Field names follow the browser extension
//! APIs (camelCase on the wire) so values pass through the native-messaging
//! bridge without translation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a browser tab, assigned by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TabId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a browser window, assigned by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

impl WindowId {
    /// Sentinel the browser reports when focus leaves every window.
    pub const NONE: WindowId = WindowId(-1);

    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for WindowId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A pre-created hidden tab and the window that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmTab {
    pub tab_id: TabId,
    pub window_id: WindowId,
}

impl WarmTab {
    #[must_use]
    pub fn new(tab_id: TabId, window_id: WindowId) -> Self {
        Self { tab_id, window_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    Normal,
    Popup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Normal,
    Minimized,
    Maximized,
    Fullscreen,
}

/// Tab details as reported by the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub id: TabId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<WindowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Window details as reported by the browser.
///
/// `tabs` is only filled when the window was queried with `populate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub id: WindowId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<WindowType>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tabs: Vec<TabInfo>,
}

impl WindowInfo {
    #[must_use]
    pub fn first_tab(&self) -> Option<&TabInfo> {
        self.tabs.first()
    }
}

/// Window position and size in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for Geometry {
    /// Far off the left edge of any screen, one pixel square.
    fn default() -> Self {
        Self {
            left: -10_000,
            top: 0,
            width: 1,
            height: 1,
        }
    }
}

/// Parameters for `windows.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    #[serde(rename = "type")]
    pub kind: WindowType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<WindowState>,
}

impl CreateWindow {
    /// Hidden, unfocused popup navigated to `url`.
    #[must_use]
    pub fn offscreen(url: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            url: Some(url.into()),
            tab_id: None,
            kind: WindowType::Popup,
            left: Some(geometry.left),
            top: Some(geometry.top),
            width: Some(geometry.width),
            height: Some(geometry.height),
            focused: false,
            state: None,
        }
    }

    /// Focused, maximized normal window that adopts an existing tab.
    #[must_use]
    pub fn promote_tab(tab_id: TabId) -> Self {
        Self {
            tab_id: Some(tab_id),
            ..Self::blank_normal()
        }
    }

    /// Focused, maximized normal window with the browser's new-tab page.
    #[must_use]
    pub fn blank_normal() -> Self {
        Self {
            url: None,
            tab_id: None,
            kind: WindowType::Normal,
            left: None,
            top: None,
            width: None,
            height: None,
            focused: true,
            state: Some(WindowState::Maximized),
        }
    }
}

/// Lifecycle events emitted by the browser that the warm pool reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    TabRemoved {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
    WindowRemoved {
        #[serde(rename = "windowId")]
        window_id: WindowId,
    },
    /// `window_id` is [`WindowId::NONE`] when no browser window has focus.
    WindowFocusChanged {
        #[serde(rename = "windowId")]
        window_id: WindowId,
    },
}

/// A committed navigation, as reported by `webNavigation.onCommitted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationEvent {
    pub tab_id: TabId,
    pub frame_id: i64,
    pub url: String,
}

impl NavigationEvent {
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.frame_id == 0
    }
}

/// Messages delivered to the content script of a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentMessage {
    /// Type `text` into the chat input and submit it.
    #[serde(rename = "QUERY")]
    Query { text: String },
}

/// Optional browser features, probed once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Hidden popup windows can be created and later promoted on-screen.
    #[serde(default)]
    pub offscreen_windows: bool,
}

//! Recognising and adopting warm windows the pool does not know about.
//!
//! A previous host process may have died after creating a warm window, or
//! two code paths may have raced to create one. Such windows are found by
//! shape: a popup whose first tab is on the target service and whose
//! geometry puts it off-screen.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use warmtab_types::{WarmTab, WindowId, WindowInfo, WindowType};

use super::WarmPool;

/// Geometry bounds a popup must fall within to count as a warm window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdoptionBounds {
    /// Left edge at or beyond this offset (negative is off the left edge).
    pub max_left: i32,
    pub max_width: i32,
    pub max_height: i32,
}

impl Default for AdoptionBounds {
    fn default() -> Self {
        Self {
            max_left: -1000,
            max_width: 5,
            max_height: 5,
        }
    }
}

impl AdoptionBounds {
    /// The warm tab held by `window`, if the window looks like one of ours.
    #[must_use]
    pub fn warm_tab_in(&self, window: &WindowInfo, target_url: &str) -> Option<WarmTab> {
        let tab = window.first_tab()?;
        let on_target = tab
            .url
            .as_deref()
            .is_some_and(|url| url.starts_with(target_url));
        let offscreen = window.left.unwrap_or(0) <= self.max_left
            && window.width.unwrap_or(0) <= self.max_width
            && window.height.unwrap_or(0) <= self.max_height;

        (on_target && offscreen).then(|| WarmTab::new(tab.id, window.id))
    }
}

impl WarmPool {
    /// Every popup window currently matching the warm-window shape.
    pub(super) async fn find_warm_popups(&self) -> Vec<WarmTab> {
        let settings = &self.inner.settings;
        match self.inner.host.windows(WindowType::Popup).await {
            Ok(windows) => windows
                .iter()
                .filter_map(|w| settings.adoption.warm_tab_in(w, &settings.target_url))
                .collect(),
            Err(e) => {
                debug!("Could not list popup windows: {e}");
                Vec::new()
            }
        }
    }

    pub(super) async fn is_warm_popup_window(&self, window_id: WindowId) -> bool {
        if self.contains_window(window_id) {
            return true;
        }
        if self.inner.ids.get().await.window_id == Some(window_id) {
            return true;
        }
        self.find_warm_popups()
            .await
            .iter()
            .any(|item| item.window_id == window_id)
    }

    /// Enqueue unknown warm windows into free slots and close the surplus.
    ///
    /// Windows already queued are left alone. Returns how many were adopted.
    pub(super) async fn adopt_existing(&self) -> usize {
        let found = self.find_warm_popups().await;
        let candidates: Vec<WarmTab> = found
            .into_iter()
            .filter(|item| !self.contains_window(item.window_id))
            .collect();

        let mut adopted = 0;
        for item in candidates {
            if self.free_slots() > 0 && self.enqueue(item).await {
                info!(
                    "Adopted existing warm window {} (tab {})",
                    item.window_id, item.tab_id
                );
                adopted += 1;
            } else if !self.contains_window(item.window_id) {
                debug!("Closing redundant warm window {}", item.window_id);
                self.remove_window_quietly(item.window_id).await;
            }
        }
        adopted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warmtab_types::{TabId, TabInfo};

    const TARGET: &str = "https://gemini.google.com/app";

    fn popup(left: i32, width: i32, url: &str) -> WindowInfo {
        WindowInfo {
            id: WindowId(900),
            kind: Some(WindowType::Popup),
            focused: false,
            left: Some(left),
            top: Some(0),
            width: Some(width),
            height: Some(1),
            tabs: vec![TabInfo {
                id: TabId(901),
                window_id: Some(WindowId(900)),
                url: Some(url.to_string()),
                active: true,
            }],
        }
    }

    #[test]
    fn test_offscreen_popup_on_target_matches() {
        let bounds = AdoptionBounds::default();
        let found = bounds.warm_tab_in(&popup(-10_000, 1, TARGET), TARGET);
        assert_eq!(found, Some(WarmTab::new(TabId(901), WindowId(900))));
    }

    #[test]
    fn test_target_url_prefix_matches_subpaths() {
        let bounds = AdoptionBounds::default();
        let url = "https://gemini.google.com/app/abc123";
        assert!(bounds.warm_tab_in(&popup(-10_000, 1, url), TARGET).is_some());
    }

    #[test]
    fn test_visible_popup_is_not_adopted() {
        let bounds = AdoptionBounds::default();
        assert!(bounds.warm_tab_in(&popup(0, 1, TARGET), TARGET).is_none());
        assert!(
            bounds
                .warm_tab_in(&popup(-10_000, 800, TARGET), TARGET)
                .is_none()
        );
    }

    #[test]
    fn test_other_site_is_not_adopted() {
        let bounds = AdoptionBounds::default();
        assert!(
            bounds
                .warm_tab_in(&popup(-10_000, 1, "https://example.com"), TARGET)
                .is_none()
        );
    }

    #[test]
    fn test_window_without_tabs_is_not_adopted() {
        let mut window = popup(-10_000, 1, TARGET);
        window.tabs.clear();
        assert!(
            AdoptionBounds::default()
                .warm_tab_in(&window, TARGET)
                .is_none()
        );
    }
}

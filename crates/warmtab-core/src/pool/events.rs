//! Reactions to tab and window lifecycle events.
//!
//! Each event is handled in its own task. Handlers re-query the browser
//! instead of trusting the queue, since the tab or window an event names
//! may already be gone by the time the handler runs.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use warmtab_types::{CreateWindow, HostEvent, TabId, WindowId};

use super::WarmPool;

impl WarmPool {
    /// Consume host events until the channel closes.
    pub fn spawn_event_loop(&self, mut events: mpsc::UnboundedReceiver<HostEvent>) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let pool = pool.clone();
                tokio::spawn(async move { pool.handle_event(event).await });
            }
            debug!("Host event channel closed");
        })
    }

    pub async fn handle_event(&self, event: HostEvent) {
        if !self.inner.enabled {
            return;
        }
        match event {
            HostEvent::TabRemoved { tab_id } => self.on_tab_removed(tab_id).await,
            HostEvent::WindowRemoved { window_id } => self.on_window_removed(window_id).await,
            HostEvent::WindowFocusChanged { window_id } => self.on_focus_changed(window_id).await,
        }
    }

    async fn on_tab_removed(&self, tab_id: TabId) {
        let removed_queued = self.remove_queued(|item| item.tab_id == tab_id);
        let removed_cached = self.inner.ids.get().await.tab_id == Some(tab_id);
        self.after_removal(removed_queued || removed_cached).await;
    }

    async fn on_window_removed(&self, window_id: WindowId) {
        let removed_queued = self.remove_queued(|item| item.window_id == window_id);
        let removed_cached = self.inner.ids.get().await.window_id == Some(window_id);
        self.after_removal(removed_queued || removed_cached).await;
    }

    async fn after_removal(&self, removed_warm: bool) {
        if removed_warm {
            debug!("Warm tab closed externally");
            self.sync_persisted_head().await;
        }

        match self.has_on_screen_windows().await {
            Ok(false) => {
                // The user closed their last window. The warm window may be
                // surfaced by the browser next; don't mistake that for a
                // request to bring it on screen.
                {
                    let mut state = self.state();
                    state.waiting_for_on_screen = true;
                    state.suppress_popup_until =
                        Some(Instant::now() + self.inner.settings.suppress_popup_focus);
                }
                self.schedule_fill(Duration::ZERO);
            }
            Ok(true) if removed_warm => self.schedule_fill(self.inner.settings.refill_delay),
            Ok(true) => {}
            Err(e) => {
                debug!("Could not list normal windows: {e}");
                if removed_warm {
                    self.schedule_fill(self.inner.settings.refill_delay);
                }
            }
        }
    }

    async fn on_focus_changed(&self, window_id: WindowId) {
        if window_id.is_none() {
            return;
        }

        match self.has_on_screen_windows().await {
            Ok(true) => {
                self.set_waiting(false);
                return;
            }
            Ok(false) => {}
            Err(e) => {
                debug!("Could not list normal windows: {e}");
                return;
            }
        }

        let is_warm = self.is_warm_popup_window(window_id).await;
        if is_warm && self.is_suppressing_popup_focus() {
            debug!("Ignoring focus on warm window {window_id} right after last window closed");
            return;
        }
        if !is_warm && !self.is_waiting_for_on_screen_window() {
            return;
        }

        self.set_waiting(true);
        self.ensure_on_screen_window().await;
    }

    /// Give the user a normal window again after they closed every one and
    /// focus landed on a warm window.
    async fn ensure_on_screen_window(&self) {
        if !self.is_waiting_for_on_screen_window() {
            return;
        }
        let Some(_promoting) = self.inner.promoting.try_begin() else {
            return;
        };

        match self.has_on_screen_windows().await {
            Ok(true) => {
                self.set_waiting(false);
                self.schedule_fill(Duration::ZERO);
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Could not list normal windows: {e}");
                return;
            }
        }

        if self.cached_warm_tab().await.is_none() {
            self.ensure_filled().await;
        }

        match self.inner.host.create_window(CreateWindow::blank_normal()).await {
            Ok(window) => info!("Opened window {} for the user", window.id),
            Err(e) => warn!("Failed to open a normal window: {e}"),
        }

        self.refresh_waiting_state().await;
        self.schedule_fill(self.inner.settings.refill_delay);
    }
}

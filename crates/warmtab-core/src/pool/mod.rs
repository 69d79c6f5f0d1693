//! Warm pool of pre-rendered hidden tabs.
//!
//! The pool keeps up to `max_size` hidden popup windows navigated to the
//! target service. Taking a tab reveals it in an on-screen window and
//! schedules a refill in the background.
//!
//! The browser owns every tab and window, and the pool's view of them goes
//! stale whenever an event handler awaits the host. Every queued entry is
//! re-checked for liveness before it is handed out, and shared state is
//! re-read after each host call rather than carried across it.

mod adopt;
mod events;
mod flight;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use warmtab_types::{Capabilities, CreateWindow, Geometry, TabId, WarmTab, WindowId, WindowType};

pub use adopt::AdoptionBounds;

use crate::host::{BrowserHost, HostResult};
use crate::ids_store::IdsStore;
use flight::SingleFlight;

pub const DEFAULT_TARGET_URL: &str = "https://gemini.google.com/app";

/// Runtime settings of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: usize,
    /// Page the warm tabs are navigated to.
    pub target_url: String,
    /// Debounce applied to refills triggered by removals and hand-outs.
    pub refill_delay: Duration,
    /// After the last on-screen window closes, focus landing on a warm
    /// window within this period is ignored.
    pub suppress_popup_focus: Duration,
    pub offscreen: Geometry,
    pub adoption: AdoptionBounds,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 1,
            target_url: DEFAULT_TARGET_URL.to_string(),
            refill_delay: Duration::from_millis(2000),
            suppress_popup_focus: Duration::from_millis(800),
            offscreen: Geometry::default(),
            adoption: AdoptionBounds::default(),
        }
    }
}

struct PoolState {
    queue: VecDeque<WarmTab>,
    max_size: usize,
    waiting_for_on_screen: bool,
    suppress_popup_until: Option<Instant>,
    fill_timer: Option<JoinHandle<()>>,
    fill_generation: u64,
    waiters: VecDeque<oneshot::Sender<()>>,
}

struct Inner {
    host: Arc<dyn BrowserHost>,
    ids: IdsStore,
    settings: PoolSettings,
    enabled: bool,
    state: Mutex<PoolState>,
    creating: SingleFlight,
    promoting: SingleFlight,
}

/// Handle to the warm pool. Clones share the same pool.
#[derive(Clone)]
pub struct WarmPool {
    inner: Arc<Inner>,
}

impl WarmPool {
    /// Build a pool. Nothing is created until [`WarmPool::fill`] runs.
    ///
    /// Without off-screen window support the pool is inert: filling and
    /// event handling do nothing and [`WarmPool::dequeue`] returns `None`.
    #[must_use]
    pub fn new(
        host: Arc<dyn BrowserHost>,
        ids: IdsStore,
        settings: PoolSettings,
        capabilities: Capabilities,
    ) -> Self {
        let enabled = capabilities.offscreen_windows;
        if !enabled {
            info!("Off-screen windows unsupported, warm pool disabled");
        }
        let max_size = settings.max_size.max(1);
        Self {
            inner: Arc::new(Inner {
                host,
                ids,
                settings,
                enabled,
                state: Mutex::new(PoolState {
                    queue: VecDeque::new(),
                    max_size,
                    waiting_for_on_screen: false,
                    suppress_popup_until: None,
                    fill_timer: None,
                    fill_generation: 0,
                    waiters: VecDeque::new(),
                }),
                creating: SingleFlight::default(),
                promoting: SingleFlight::default(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn ids(&self) -> &IdsStore {
        &self.inner.ids
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.state().max_size
    }

    /// Change the capacity. Entries beyond the new capacity are dropped
    /// from the tail and their windows closed; spare capacity is filled.
    pub async fn set_max_size(&self, max_size: usize) {
        let max_size = max_size.max(1);
        let (dropped, under_capacity) = {
            let mut state = self.state();
            state.max_size = max_size;
            let dropped: Vec<WarmTab> = if state.queue.len() > max_size {
                state.queue.drain(max_size..).collect()
            } else {
                Vec::new()
            };
            (dropped, state.queue.len() < max_size)
        };

        for item in dropped {
            debug!("Pool shrunk, closing warm window {}", item.window_id);
            self.remove_window_quietly(item.window_id).await;
        }
        if under_capacity {
            self.ensure_filled().await;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    /// Dequeues parked until a warm tab is enqueued.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.state().waiters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().queue.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        let state = self.state();
        state.queue.len() >= state.max_size
    }

    /// Set while the browser has no on-screen window and the user may
    /// need one re-created.
    #[must_use]
    pub fn is_waiting_for_on_screen_window(&self) -> bool {
        self.state().waiting_for_on_screen
    }

    /// Top the pool up to capacity. Returns early when a creation is
    /// already in flight or the pool is full.
    pub async fn fill(&self) {
        self.ensure_filled().await;
    }

    /// Take a live warm tab and reveal it on screen.
    ///
    /// Waits for as long as it takes the pool to produce one. Returns the
    /// tab and the on-screen window now holding it, or `None` when the pool
    /// is disabled.
    pub async fn dequeue(&self) -> Option<WarmTab> {
        self.acquire(None).await
    }

    /// Like [`WarmPool::dequeue`], but gives up if no entry becomes
    /// available within `timeout`. Once an entry is taken its reveal runs
    /// to completion.
    pub async fn dequeue_timeout(&self, timeout: Duration) -> Option<WarmTab> {
        self.acquire(Some(Instant::now() + timeout)).await
    }

    async fn acquire(&self, deadline: Option<Instant>) -> Option<WarmTab> {
        if !self.inner.enabled {
            return None;
        }

        loop {
            let item = self.next_queued(deadline).await?;

            if let Err(e) = self.inner.host.get_tab(item.tab_id).await {
                debug!("Warm tab {} is gone ({e}), discarding", item.tab_id);
                self.remove_window_quietly(item.window_id).await;
                self.sync_persisted_head().await;
                self.schedule_fill(self.inner.settings.refill_delay);
                continue;
            }

            self.sync_persisted_head().await;

            match self.reveal(item).await {
                Ok(revealed) => {
                    info!(
                        "Revealed warm tab {} in window {}",
                        revealed.tab_id, revealed.window_id
                    );
                    self.schedule_fill(self.inner.settings.refill_delay);
                    return Some(revealed);
                }
                Err(e) => {
                    warn!("Failed to reveal warm tab {}: {e}", item.tab_id);
                    self.remove_window_quietly(item.window_id).await;
                    self.schedule_fill(self.inner.settings.refill_delay);
                }
            }
        }
    }

    /// Pop the head, or register as a waiter and start a fill.
    async fn next_queued(&self, deadline: Option<Instant>) -> Option<WarmTab> {
        loop {
            let woken = {
                let mut state = self.state();
                if let Some(item) = state.queue.pop_front() {
                    return Some(item);
                }
                let (tx, rx) = oneshot::channel();
                state.waiters.retain(|waiter| !waiter.is_closed());
                state.waiters.push_back(tx);
                rx
            };

            let pool = self.clone();
            tokio::spawn(async move { pool.ensure_filled().await });

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, woken).await.is_err() {
                        debug!("Timed out waiting for a warm tab");
                        return None;
                    }
                }
                None => {
                    let _ = woken.await;
                }
            }
        }
    }

    /// Move the tab into an on-screen window and bring it to front.
    async fn reveal(&self, item: WarmTab) -> HostResult<WarmTab> {
        let host = &self.inner.host;
        let windows = host.windows(WindowType::Normal).await?;
        // Prefer the focused window, else the first other normal window.
        let target = windows
            .iter()
            .filter(|w| w.id != item.window_id)
            .min_by_key(|w| !w.focused)
            .map(|w| w.id);

        let revealed = if let Some(target) = target {
            host.move_tab(item.tab_id, target, -1).await?;
            host.activate_tab(item.tab_id).await?;
            host.focus_window(target).await?;
            self.remove_window_quietly(item.window_id).await;
            WarmTab::new(item.tab_id, target)
        } else {
            let window = host
                .create_window(CreateWindow::promote_tab(item.tab_id))
                .await?;
            if window.id != item.window_id {
                self.remove_window_quietly(item.window_id).await;
            }
            WarmTab::new(item.tab_id, window.id)
        };

        self.refresh_waiting_state().await;
        Ok(revealed)
    }

    /// Append `item` unless the pool is full or already holds the tab.
    /// A new head is persisted before any waiter is woken.
    async fn enqueue(&self, item: WarmTab) -> bool {
        let became_head = {
            let mut state = self.state();
            if state.queue.len() >= state.max_size
                || state.queue.iter().any(|queued| queued.tab_id == item.tab_id)
            {
                return false;
            }
            state.queue.push_back(item);
            state.queue.len() == 1
        };

        if became_head {
            self.inner.ids.set(item).await;
        }
        self.wake_waiter();
        true
    }

    fn wake_waiter(&self) {
        let mut state = self.state();
        while let Some(waiter) = state.waiters.pop_front() {
            // A waiter that timed out has dropped its receiver.
            if waiter.send(()).is_ok() {
                break;
            }
        }
    }

    /// Mirror the queue head into the ids store.
    async fn sync_persisted_head(&self) {
        let head = self.state().queue.front().copied();
        match head {
            Some(item) => self.inner.ids.set(item).await,
            None => self.inner.ids.clear().await,
        }
    }

    fn contains_window(&self, window_id: WindowId) -> bool {
        self.state()
            .queue
            .iter()
            .any(|item| item.window_id == window_id)
    }

    fn contains_tab(&self, tab_id: TabId) -> bool {
        self.state().queue.iter().any(|item| item.tab_id == tab_id)
    }

    fn free_slots(&self) -> usize {
        let state = self.state();
        state.max_size.saturating_sub(state.queue.len())
    }

    /// Drop queue entries matching `pred`. Returns whether any were dropped.
    fn remove_queued(&self, pred: impl Fn(&WarmTab) -> bool) -> bool {
        let mut state = self.state();
        let before = state.queue.len();
        state.queue.retain(|item| !pred(item));
        state.queue.len() != before
    }

    fn set_waiting(&self, waiting: bool) {
        self.state().waiting_for_on_screen = waiting;
    }

    async fn has_on_screen_windows(&self) -> HostResult<bool> {
        let windows = self.inner.host.windows(WindowType::Normal).await?;
        Ok(!windows.is_empty())
    }

    async fn refresh_waiting_state(&self) {
        match self.has_on_screen_windows().await {
            Ok(has_windows) => self.set_waiting(!has_windows),
            Err(e) => debug!("Could not list normal windows: {e}"),
        }
    }

    async fn remove_window_quietly(&self, window_id: WindowId) {
        if let Err(e) = self.inner.host.remove_window(window_id).await {
            debug!("Failed to remove window {window_id}: {e}");
        }
    }

    async fn ensure_filled(&self) {
        if !self.inner.enabled || self.inner.creating.is_busy() {
            return;
        }

        self.refresh_waiting_state().await;

        if self.is_empty() {
            self.adopt_existing().await;
        }

        loop {
            if self.is_full() {
                return;
            }

            if let Some(cached) = self.cached_warm_tab().await
                && !self.contains_tab(cached.tab_id)
            {
                if self.enqueue(cached).await {
                    debug!("Re-queued cached warm tab {}", cached.tab_id);
                    continue;
                }
                return;
            }

            if !self.create_window().await {
                return;
            }
        }
    }

    /// The persisted warm tab if both its tab and window are still alive.
    /// A dead one is dropped from the queue and the persisted pair.
    async fn cached_warm_tab(&self) -> Option<WarmTab> {
        let cached = self.inner.ids.get().await.warm_tab()?;
        let host = &self.inner.host;
        if host.get_tab(cached.tab_id).await.is_ok()
            && host.get_window(cached.window_id).await.is_ok()
        {
            return Some(cached);
        }

        debug!("Cached warm tab {} is gone", cached.tab_id);
        self.remove_queued(|item| item.tab_id == cached.tab_id);
        self.sync_persisted_head().await;
        None
    }

    /// Add one warm tab: the cached one, an adopted stray, or a new window.
    /// Returns whether the queue grew.
    async fn create_window(&self) -> bool {
        let Some(_creating) = self.inner.creating.try_begin() else {
            return false;
        };

        if let Some(cached) = self.cached_warm_tab().await
            && !self.contains_tab(cached.tab_id)
        {
            return self.enqueue(cached).await;
        }

        if self.adopt_existing().await > 0 {
            return true;
        }
        if self.is_full() {
            return false;
        }

        let settings = &self.inner.settings;
        let params = CreateWindow::offscreen(settings.target_url.clone(), settings.offscreen);
        let window = match self.inner.host.create_window(params).await {
            Ok(window) => window,
            Err(e) => {
                warn!("Failed to create warm window: {e}");
                self.schedule_fill(settings.refill_delay);
                return false;
            }
        };

        let Some(tab_id) = window.first_tab().map(|tab| tab.id) else {
            warn!("Warm window {} has no tab, closing it", window.id);
            self.remove_window_quietly(window.id).await;
            return false;
        };

        let item = WarmTab::new(tab_id, window.id);
        if self.enqueue(item).await {
            info!("Created warm window {} (tab {tab_id})", window.id);
            true
        } else {
            if !self.contains_window(window.id) {
                debug!("Pool filled meanwhile, closing window {}", window.id);
                self.remove_window_quietly(window.id).await;
            }
            false
        }
    }

    /// Run a fill after `delay`, replacing any pending one.
    fn schedule_fill(&self, delay: Duration) {
        if !self.inner.enabled {
            return;
        }

        let pool = self.clone();
        let mut state = self.state();
        if let Some(timer) = state.fill_timer.take() {
            timer.abort();
        }
        state.fill_generation = state.fill_generation.wrapping_add(1);
        let generation = state.fill_generation;

        state.fill_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if pool.take_fired_timer(generation) {
                pool.ensure_filled().await;
            }
        }));
    }

    /// Forget the handle of the timer that just fired so a later schedule
    /// cannot abort the fill it is about to run.
    fn take_fired_timer(&self, generation: u64) -> bool {
        let mut state = self.state();
        if state.fill_generation != generation {
            return false;
        }
        state.fill_timer = None;
        true
    }

    fn is_suppressing_popup_focus(&self) -> bool {
        self.state()
            .suppress_popup_until
            .is_some_and(|until| Instant::now() < until)
    }
}

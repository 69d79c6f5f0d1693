//! Test fixtures and helpers

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use warmtab_types::{
    Capabilities, ContentMessage, CreateWindow, Geometry, TabId, TabInfo, WarmTab, WindowId,
    WindowInfo, WindowType,
};

use crate::host::{BrowserHost, HostError, HostResult, StorageArea};
use crate::ids_store::IdsStore;
use crate::pool::{PoolSettings, WarmPool};

pub const TARGET: &str = "https://gemini.google.com/app";
pub const PAGE: &str = "https://example.com/article";

#[derive(Default)]
struct BrowserState {
    next_id: i64,
    windows: BTreeMap<WindowId, WindowInfo>,
    created_windows: Vec<CreateWindow>,
    created_tabs: Vec<String>,
    removed_windows: Vec<WindowId>,
    removed_tabs: Vec<TabId>,
    messages: Vec<(TabId, ContentMessage)>,
    failing_sends: usize,
    fail_offscreen_creates: bool,
    page_text: String,
    fail_extraction: bool,
    extraction_delay: Option<Duration>,
    scripting_unsupported: bool,
    extraction_calls: usize,
}

impl BrowserState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn window_of(&self, tab_id: TabId) -> Option<WindowId> {
        self.windows
            .values()
            .find(|w| w.tabs.iter().any(|t| t.id == tab_id))
            .map(|w| w.id)
    }

    fn tab(&self, tab_id: TabId) -> Option<TabInfo> {
        self.windows
            .values()
            .flat_map(|w| w.tabs.iter())
            .find(|t| t.id == tab_id)
            .cloned()
    }

    /// Detach a tab; a window left without tabs closes, as browsers do.
    fn take_tab(&mut self, tab_id: TabId) -> Option<TabInfo> {
        let window_id = self.window_of(tab_id)?;
        let window = self.windows.get_mut(&window_id)?;
        let idx = window.tabs.iter().position(|t| t.id == tab_id)?;
        let tab = window.tabs.remove(idx);
        if window.tabs.is_empty() {
            self.windows.remove(&window_id);
        }
        Some(tab)
    }

    fn focus(&mut self, window_id: WindowId) {
        for window in self.windows.values_mut() {
            window.focused = window.id == window_id;
        }
    }

    fn new_window(&mut self, kind: WindowType, focused: bool, geometry: Geometry) -> WindowId {
        let id = WindowId(self.next_id());
        self.windows.insert(
            id,
            WindowInfo {
                id,
                kind: Some(kind),
                focused: false,
                left: Some(geometry.left),
                top: Some(geometry.top),
                width: Some(geometry.width),
                height: Some(geometry.height),
                tabs: Vec::new(),
            },
        );
        if focused {
            self.focus(id);
        }
        id
    }

    fn new_tab(&mut self, window_id: WindowId, url: &str) -> TabInfo {
        let tab = TabInfo {
            id: TabId(self.next_id()),
            window_id: Some(window_id),
            url: Some(url.to_string()),
            active: true,
        };
        self.insert_tab(window_id, tab.clone());
        tab
    }

    fn insert_tab(&mut self, window_id: WindowId, mut tab: TabInfo) {
        if let Some(window) = self.windows.get_mut(&window_id) {
            for other in &mut window.tabs {
                other.active = false;
            }
            tab.window_id = Some(window_id);
            tab.active = true;
            window.tabs.push(tab);
        }
    }
}

fn on_screen() -> Geometry {
    Geometry {
        left: 0,
        top: 0,
        width: 1280,
        height: 800,
    }
}

/// In-memory browser that records what the pool asks of it.
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<BrowserState>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().unwrap()
    }

    /// A normal window holding one tab on [`PAGE`].
    pub fn add_normal_window(&self, focused: bool) -> WarmTab {
        let mut state = self.state();
        let window_id = state.new_window(WindowType::Normal, focused, on_screen());
        let tab = state.new_tab(window_id, PAGE);
        WarmTab::new(tab.id, window_id)
    }

    /// An off-screen popup on `url`, as a previous host process would have
    /// left behind.
    pub fn add_warm_popup(&self, url: &str) -> WarmTab {
        let mut state = self.state();
        let window_id = state.new_window(WindowType::Popup, false, Geometry::default());
        let tab = state.new_tab(window_id, url);
        WarmTab::new(tab.id, window_id)
    }

    pub fn close_window(&self, window_id: WindowId) {
        self.state().windows.remove(&window_id);
    }

    pub fn close_tab(&self, tab_id: TabId) {
        self.state().take_tab(tab_id);
    }

    pub fn has_tab(&self, tab_id: TabId) -> bool {
        self.state().tab(tab_id).is_some()
    }

    pub fn has_window(&self, window_id: WindowId) -> bool {
        self.state().windows.contains_key(&window_id)
    }

    pub fn window_of(&self, tab_id: TabId) -> Option<WindowId> {
        self.state().window_of(tab_id)
    }

    pub fn window(&self, window_id: WindowId) -> Option<WindowInfo> {
        self.state().windows.get(&window_id).cloned()
    }

    pub fn created_windows(&self) -> Vec<CreateWindow> {
        self.state().created_windows.clone()
    }

    /// Number of hidden warm windows the pool asked for.
    pub fn offscreen_creations(&self) -> usize {
        self.state()
            .created_windows
            .iter()
            .filter(|w| w.kind == WindowType::Popup)
            .count()
    }

    /// Blank normal windows opened for the user (not tab promotions).
    pub fn blank_window_creations(&self) -> usize {
        self.state()
            .created_windows
            .iter()
            .filter(|w| **w == CreateWindow::blank_normal())
            .count()
    }

    pub fn created_tabs(&self) -> Vec<String> {
        self.state().created_tabs.clone()
    }

    pub fn removed_tabs(&self) -> Vec<TabId> {
        self.state().removed_tabs.clone()
    }

    pub fn removed_windows(&self) -> Vec<WindowId> {
        self.state().removed_windows.clone()
    }

    pub fn count_windows(&self, kind: WindowType) -> usize {
        self.state()
            .windows
            .values()
            .filter(|w| w.kind == Some(kind))
            .count()
    }

    pub fn windows_of_kind(&self, kind: WindowType) -> Vec<WindowId> {
        self.state()
            .windows
            .values()
            .filter(|w| w.kind == Some(kind))
            .map(|w| w.id)
            .collect()
    }

    pub fn messages(&self) -> Vec<(TabId, ContentMessage)> {
        self.state().messages.clone()
    }

    pub fn fail_next_messages(&self, count: usize) {
        self.state().failing_sends = count;
    }

    pub fn set_fail_offscreen_creates(&self, fail: bool) {
        self.state().fail_offscreen_creates = fail;
    }

    pub fn set_page_text(&self, text: &str) {
        self.state().page_text = text.to_string();
    }

    pub fn set_fail_extraction(&self, fail: bool) {
        self.state().fail_extraction = fail;
    }

    pub fn set_extraction_delay(&self, delay: Duration) {
        self.state().extraction_delay = Some(delay);
    }

    pub fn set_scripting_unsupported(&self, unsupported: bool) {
        self.state().scripting_unsupported = unsupported;
    }

    pub fn extraction_calls(&self) -> usize {
        self.state().extraction_calls
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> HostError {
    HostError::NotFound(format!("No {what} with id: {id}"))
}

#[async_trait]
impl BrowserHost for FakeBrowser {
    async fn windows(&self, kind: WindowType) -> HostResult<Vec<WindowInfo>> {
        Ok(self
            .state()
            .windows
            .values()
            .filter(|w| w.kind == Some(kind))
            .cloned()
            .collect())
    }

    async fn create_window(&self, params: CreateWindow) -> HostResult<WindowInfo> {
        let mut state = self.state();
        state.created_windows.push(params.clone());

        if params.kind == WindowType::Popup && state.fail_offscreen_creates {
            return Err(HostError::Other("window creation refused".to_string()));
        }

        let geometry = match (params.left, params.top, params.width, params.height) {
            (Some(left), Some(top), Some(width), Some(height)) => Geometry {
                left,
                top,
                width,
                height,
            },
            _ => on_screen(),
        };

        let moved = match params.tab_id {
            Some(tab_id) => Some(state.take_tab(tab_id).ok_or_else(|| not_found("tab", tab_id))?),
            None => None,
        };

        let window_id = state.new_window(params.kind, params.focused, geometry);
        match moved {
            Some(tab) => state.insert_tab(window_id, tab),
            None => {
                let url = params.url.as_deref().unwrap_or("chrome://newtab/");
                state.new_tab(window_id, url);
            }
        }

        state
            .windows
            .get(&window_id)
            .cloned()
            .ok_or_else(|| not_found("window", window_id))
    }

    async fn get_window(&self, window_id: WindowId) -> HostResult<WindowInfo> {
        self.state()
            .windows
            .get(&window_id)
            .cloned()
            .ok_or_else(|| not_found("window", window_id))
    }

    async fn focus_window(&self, window_id: WindowId) -> HostResult<()> {
        let mut state = self.state();
        if !state.windows.contains_key(&window_id) {
            return Err(not_found("window", window_id));
        }
        state.focus(window_id);
        Ok(())
    }

    async fn remove_window(&self, window_id: WindowId) -> HostResult<()> {
        let mut state = self.state();
        state.windows.remove(&window_id);
        state.removed_windows.push(window_id);
        Ok(())
    }

    async fn get_tab(&self, tab_id: TabId) -> HostResult<TabInfo> {
        self.state().tab(tab_id).ok_or_else(|| not_found("tab", tab_id))
    }

    async fn active_tab(&self) -> HostResult<Option<TabInfo>> {
        let state = self.state();
        let window = state
            .windows
            .values()
            .filter(|w| w.kind == Some(WindowType::Normal))
            .min_by_key(|w| !w.focused);
        Ok(window.and_then(|w| w.tabs.iter().find(|t| t.active).cloned()))
    }

    async fn create_tab(&self, url: &str, _active: bool) -> HostResult<TabInfo> {
        let mut state = self.state();
        state.created_tabs.push(url.to_string());
        let existing = state
            .windows
            .values()
            .filter(|w| w.kind == Some(WindowType::Normal))
            .min_by_key(|w| !w.focused)
            .map(|w| w.id);
        let window_id = match existing {
            Some(id) => id,
            None => state.new_window(WindowType::Normal, true, on_screen()),
        };
        Ok(state.new_tab(window_id, url))
    }

    async fn move_tab(&self, tab_id: TabId, window_id: WindowId, _index: i32) -> HostResult<()> {
        let mut state = self.state();
        if !state.windows.contains_key(&window_id) {
            return Err(not_found("window", window_id));
        }
        let tab = state.take_tab(tab_id).ok_or_else(|| not_found("tab", tab_id))?;
        state.insert_tab(window_id, tab);
        Ok(())
    }

    async fn activate_tab(&self, tab_id: TabId) -> HostResult<()> {
        let mut state = self.state();
        let window_id = state.window_of(tab_id).ok_or_else(|| not_found("tab", tab_id))?;
        if let Some(window) = state.windows.get_mut(&window_id) {
            for tab in &mut window.tabs {
                tab.active = tab.id == tab_id;
            }
        }
        Ok(())
    }

    async fn remove_tab(&self, tab_id: TabId) -> HostResult<()> {
        let mut state = self.state();
        state.take_tab(tab_id).ok_or_else(|| not_found("tab", tab_id))?;
        state.removed_tabs.push(tab_id);
        Ok(())
    }

    async fn send_message(&self, tab_id: TabId, message: &ContentMessage) -> HostResult<()> {
        let mut state = self.state();
        if state.tab(tab_id).is_none() {
            return Err(not_found("tab", tab_id));
        }
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(HostError::Other(
                "Could not establish connection. Receiving end does not exist.".to_string(),
            ));
        }
        state.messages.push((tab_id, message.clone()));
        Ok(())
    }

    async fn extract_text(&self, tab_id: TabId, _selector: &str) -> HostResult<String> {
        let (delay, fail, text) = {
            let mut state = self.state();
            state.extraction_calls += 1;
            if state.scripting_unsupported {
                return Err(HostError::Unsupported("scripting".to_string()));
            }
            if state.tab(tab_id).is_none() {
                return Err(not_found("tab", tab_id));
            }
            (
                state.extraction_delay,
                state.fail_extraction,
                state.page_text.clone(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(HostError::Other("Cannot access contents of the page".to_string()));
        }
        Ok(text)
    }
}

/// One browser storage area held in memory.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
    failing: AtomicBool,
    gets: AtomicUsize,
    get_delay: Mutex<Option<Duration>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().unwrap().is_empty()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every read wait, like a busy extension.
    pub fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock().unwrap() = Some(delay);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn check(&self) -> HostResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HostError::Bridge("storage unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageArea for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> HostResult<HashMap<String, Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let found: HashMap<String, Value> = {
            let values = self.values.lock().unwrap();
            keys.iter()
                .filter_map(|k| values.get(*k).map(|v| ((*k).to_string(), v.clone())))
                .collect()
        };
        // The answer is fixed when the read starts; the delay is transit.
        let delay = *self.get_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(found)
    }

    async fn set(&self, items: HashMap<String, Value>) -> HostResult<()> {
        self.check()?;
        self.values.lock().unwrap().extend(items);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> HostResult<()> {
        self.check()?;
        let mut values = self.values.lock().unwrap();
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

pub fn enabled() -> Capabilities {
    Capabilities {
        offscreen_windows: true,
    }
}

/// A pool wired to a fake browser and in-memory storage.
pub struct Harness {
    pub browser: Arc<FakeBrowser>,
    pub session: Arc<MemoryStorage>,
    pub local: Arc<MemoryStorage>,
    pub settings: PoolSettings,
    pub pool: WarmPool,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(PoolSettings::default())
    }

    pub fn with_settings(settings: PoolSettings) -> Self {
        let browser = FakeBrowser::new();
        let session = MemoryStorage::new();
        let local = MemoryStorage::new();
        let pool = build_pool(&browser, &session, &local, settings.clone(), enabled());
        Self {
            browser,
            session,
            local,
            settings,
            pool,
        }
    }

    /// A fresh pool over the same browser and storage, as after the host
    /// process was restarted.
    pub fn restart(&self) -> WarmPool {
        build_pool(
            &self.browser,
            &self.session,
            &self.local,
            self.settings.clone(),
            enabled(),
        )
    }

    pub fn ids(&self) -> IdsStore {
        IdsStore::new(self.session.clone(), self.local.clone())
    }
}

pub fn build_pool(
    browser: &Arc<FakeBrowser>,
    session: &Arc<MemoryStorage>,
    local: &Arc<MemoryStorage>,
    settings: PoolSettings,
    capabilities: Capabilities,
) -> WarmPool {
    let ids = IdsStore::new(session.clone(), local.clone());
    WarmPool::new(browser.clone(), ids, settings, capabilities)
}

/// Let spawned tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

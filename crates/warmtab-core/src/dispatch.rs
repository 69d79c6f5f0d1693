//! Turning a user action into a query on the chat service.
//!
//! The page's URL picks a rule group, the group supplies the prompt and an
//! optional selector for page text, and the resulting query is delivered to
//! a warm tab when the pool has one, or to a freshly opened tab otherwise.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;
use warmtab_types::{ContentMessage, NavigationEvent, TabId, TabInfo};

use crate::host::{BrowserHost, HostError};
use crate::pool::{DEFAULT_TARGET_URL, WarmPool};
use crate::rules::{DEFAULT_PROMPT, MatchResult, RuleConfig, SettingsStore, find_matching_group};
use crate::text::normalize_content_text;

/// Keyboard command that triggers a dispatch for the active tab.
pub const OPEN_QUERY_COMMAND: &str = "open-query";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Delivery attempts before giving up on a tab's content script.
    pub max_send_attempts: u32,
    pub send_retry_delay: Duration,
    /// How long to wait for the pool before opening a tab directly.
    pub acquire_timeout: Duration,
    pub extraction_timeout: Duration,
    /// Used when the matched group has an empty prompt.
    pub default_prompt: String,
    pub target_url: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_send_attempts: 10,
            send_retry_delay: Duration::from_millis(500),
            acquire_timeout: Duration::from_millis(8000),
            extraction_timeout: Duration::from_millis(3000),
            default_prompt: DEFAULT_PROMPT.to_string(),
            target_url: DEFAULT_TARGET_URL.to_string(),
        }
    }
}

pub struct Dispatcher {
    host: Arc<dyn BrowserHost>,
    pool: WarmPool,
    rules: Arc<dyn SettingsStore>,
    settings: DispatchSettings,
    /// Set once the browser reports it cannot run page scripts.
    scripting_unsupported: AtomicBool,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        host: Arc<dyn BrowserHost>,
        pool: WarmPool,
        rules: Arc<dyn SettingsStore>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            host,
            pool,
            rules,
            settings,
            scripting_unsupported: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &WarmPool {
        &self.pool
    }

    /// Send the query for `tab`, or for the active tab when `tab` carries
    /// no URL. Returns the tab the query went to.
    ///
    /// Pages that are not http(s) are ignored.
    pub async fn open_with_tab(&self, tab: Option<TabInfo>) -> Option<TabId> {
        let tab = match tab {
            Some(tab) if tab.url.is_some() => Some(tab),
            _ => self.active_tab().await,
        }?;
        let url = tab.url.as_deref().filter(|url| is_web_page(url))?;

        let config = match self.rules.load_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load rule config, using defaults: {e}");
                RuleConfig::default()
            }
        };
        let matched = find_matching_group(url, &config);
        let query = self.build_query_text(url, Some(tab.id), &matched).await;

        self.open_prerendered(&query).await
    }

    pub async fn open_with_current_tab(&self) -> Option<TabId> {
        self.open_with_tab(None).await
    }

    /// `url` and prompt on separate lines, followed by the page text when
    /// the match names a selector.
    pub async fn build_query_text(
        &self,
        url: &str,
        tab_id: Option<TabId>,
        matched: &MatchResult,
    ) -> String {
        let prompt = if matched.prompt.is_empty() {
            &self.settings.default_prompt
        } else {
            &matched.prompt
        };
        let selector = matched.css_selector.trim();

        match tab_id {
            Some(tab_id) if !selector.is_empty() => {
                let text = self.extract_text(tab_id, selector).await;
                format!("{url}\n{prompt}\n{text}")
            }
            _ => format!("{url}\n{prompt}"),
        }
    }

    /// Normalized text under `selector`, or empty on any failure.
    async fn extract_text(&self, tab_id: TabId, selector: &str) -> String {
        if self.scripting_unsupported.load(Ordering::Relaxed) {
            return String::new();
        }
        let extraction = self.host.extract_text(tab_id, selector);
        match tokio::time::timeout(self.settings.extraction_timeout, extraction).await {
            Ok(Ok(text)) => normalize_content_text(&text),
            Ok(Err(HostError::Unsupported(api))) => {
                info!("Page scripting unavailable ({api}), sending queries without page text");
                self.scripting_unsupported.store(true, Ordering::Relaxed);
                String::new()
            }
            Ok(Err(e)) => {
                debug!("Text extraction failed in tab {tab_id}: {e}");
                String::new()
            }
            Err(_) => {
                warn!("Text extraction timed out in tab {tab_id}");
                String::new()
            }
        }
    }

    /// Deliver `query` to a warm tab, falling back to a new tab.
    pub async fn open_prerendered(&self, query: &str) -> Option<TabId> {
        let Some(item) = self.pool.dequeue_timeout(self.settings.acquire_timeout).await else {
            return self.open_cold(query).await;
        };
        if !query.is_empty() {
            self.send_query(item.tab_id, query).await;
        }
        Some(item.tab_id)
    }

    async fn open_cold(&self, query: &str) -> Option<TabId> {
        let tab = match self.host.create_tab(&self.settings.target_url, true).await {
            Ok(tab) => tab,
            Err(e) => {
                warn!("Failed to open a tab: {e}");
                return None;
            }
        };
        info!("Opened tab {} without a warm window", tab.id);
        if !query.is_empty() {
            self.send_query(tab.id, query).await;
        }
        Some(tab.id)
    }

    /// Deliver the query, retrying while the content script loads.
    /// Returns whether it was delivered.
    pub async fn send_query(&self, tab_id: TabId, text: &str) -> bool {
        let message = ContentMessage::Query {
            text: text.to_string(),
        };
        let attempts = self.settings.max_send_attempts.max(1);

        for attempt in 1..=attempts {
            match self.host.send_message(tab_id, &message).await {
                Ok(()) => return true,
                Err(e) => {
                    debug!("Query delivery to tab {tab_id} failed (attempt {attempt}): {e}");
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.send_retry_delay).await;
                    }
                }
            }
        }

        warn!("Gave up delivering query to tab {tab_id} after {attempts} attempts");
        false
    }

    /// Hand a query typed into the service's own URL (`?q=`) over to a warm
    /// tab, closing the tab that navigated.
    pub async fn handle_navigation(&self, event: &NavigationEvent) {
        if !self.pool.is_enabled() || !event.is_top_level() {
            return;
        }
        let (Ok(target), Ok(url)) = (Url::parse(&self.settings.target_url), Url::parse(&event.url))
        else {
            return;
        };
        if url.origin() != target.origin() {
            return;
        }
        let Some(text) = query_text(&url) else {
            return;
        };

        let Some(item) = self.pool.dequeue_timeout(self.settings.acquire_timeout).await else {
            return;
        };
        if item.tab_id == event.tab_id {
            return;
        }

        if let Err(e) = self.host.remove_tab(event.tab_id).await {
            debug!("Failed to close tab {}: {e}", event.tab_id);
        }
        self.send_query(item.tab_id, &text).await;
    }

    /// First install or update: persist the normalized rules, then warm up.
    pub async fn handle_installed(&self) {
        match self.rules.load_config().await {
            Ok(config) => {
                if let Err(e) = self.rules.save_config(&config).await {
                    warn!("Failed to save rule config: {e}");
                }
            }
            Err(e) => warn!("Failed to load rule config: {e}"),
        }
        self.pool.fill().await;
    }

    pub async fn handle_startup(&self) {
        self.pool.fill().await;
    }

    async fn active_tab(&self) -> Option<TabInfo> {
        match self.host.active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                warn!("Could not get the active tab: {e}");
                None
            }
        }
    }
}

fn is_web_page(url: &str) -> bool {
    Url::parse(url).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Non-empty `q` parameter, form-decoded.
fn query_text(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
        .filter(|text| !text.is_empty())
}

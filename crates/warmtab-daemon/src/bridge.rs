//! Browser and storage access over the native-messaging bridge.
//!
//! Each core trait call becomes one request to the extension, which performs
//! the matching browser API call and answers with its result.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Value, json};
use tracing::warn;
use warmtab_core::{BrowserHost, HostError, HostResult, StorageArea};
use warmtab_rpc::protocol::{NOT_FOUND, UNSUPPORTED, method};
use warmtab_rpc::{BridgeClient, ClientError};
use warmtab_types::{
    Capabilities, ContentMessage, CreateWindow, TabId, TabInfo, WindowId, WindowInfo, WindowType,
};

fn host_error(err: ClientError) -> HostError {
    match err {
        ClientError::Rpc {
            code: NOT_FOUND,
            message,
        } => HostError::NotFound(message),
        ClientError::Rpc {
            code: UNSUPPORTED,
            message,
        } => HostError::Unsupported(message),
        ClientError::Rpc { message, .. } => HostError::Other(message),
        other => HostError::Bridge(other.to_string()),
    }
}

async fn call<T: DeserializeOwned>(
    client: &BridgeClient,
    method: &str,
    params: Value,
) -> HostResult<T> {
    client
        .request(method, Some(params))
        .await
        .map_err(host_error)
}

/// For calls whose result the core doesn't use.
async fn call_unit(client: &BridgeClient, method: &str, params: Value) -> HostResult<()> {
    call::<IgnoredAny>(client, method, params).await.map(|_| ())
}

/// Ask the extension what this browser supports. Anything short of a clear
/// answer counts as no support.
pub async fn probe_capabilities(client: &BridgeClient) -> Capabilities {
    match client
        .request::<Capabilities>(method::RUNTIME_CAPABILITIES, None)
        .await
    {
        Ok(capabilities) => capabilities,
        Err(e) => {
            warn!("Capability probe failed, warm pool disabled: {e}");
            Capabilities::default()
        }
    }
}

/// [`BrowserHost`] backed by the extension.
pub struct BridgeHost {
    client: Arc<BridgeClient>,
}

impl BridgeHost {
    #[must_use]
    pub fn new(client: Arc<BridgeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BrowserHost for BridgeHost {
    async fn windows(&self, kind: WindowType) -> HostResult<Vec<WindowInfo>> {
        call(
            &self.client,
            method::WINDOWS_GET_ALL,
            json!({"windowTypes": [kind], "populate": true}),
        )
        .await
    }

    async fn create_window(&self, params: CreateWindow) -> HostResult<WindowInfo> {
        let params =
            serde_json::to_value(&params).map_err(|e| HostError::Other(e.to_string()))?;
        call(&self.client, method::WINDOWS_CREATE, params).await
    }

    async fn get_window(&self, window_id: WindowId) -> HostResult<WindowInfo> {
        call(
            &self.client,
            method::WINDOWS_GET,
            json!({"windowId": window_id}),
        )
        .await
    }

    async fn focus_window(&self, window_id: WindowId) -> HostResult<()> {
        call_unit(
            &self.client,
            method::WINDOWS_UPDATE,
            json!({"windowId": window_id, "focused": true}),
        )
        .await
    }

    async fn remove_window(&self, window_id: WindowId) -> HostResult<()> {
        call_unit(
            &self.client,
            method::WINDOWS_REMOVE,
            json!({"windowId": window_id}),
        )
        .await
    }

    async fn get_tab(&self, tab_id: TabId) -> HostResult<TabInfo> {
        call(&self.client, method::TABS_GET, json!({"tabId": tab_id})).await
    }

    async fn active_tab(&self) -> HostResult<Option<TabInfo>> {
        let tabs: Vec<TabInfo> = call(
            &self.client,
            method::TABS_QUERY,
            json!({"active": true, "currentWindow": true}),
        )
        .await?;
        Ok(tabs.into_iter().next())
    }

    async fn create_tab(&self, url: &str, active: bool) -> HostResult<TabInfo> {
        call(
            &self.client,
            method::TABS_CREATE,
            json!({"url": url, "active": active}),
        )
        .await
    }

    async fn move_tab(&self, tab_id: TabId, window_id: WindowId, index: i32) -> HostResult<()> {
        call_unit(
            &self.client,
            method::TABS_MOVE,
            json!({"tabId": tab_id, "windowId": window_id, "index": index}),
        )
        .await
    }

    async fn activate_tab(&self, tab_id: TabId) -> HostResult<()> {
        call_unit(
            &self.client,
            method::TABS_UPDATE,
            json!({"tabId": tab_id, "active": true}),
        )
        .await
    }

    async fn remove_tab(&self, tab_id: TabId) -> HostResult<()> {
        call_unit(&self.client, method::TABS_REMOVE, json!({"tabId": tab_id})).await
    }

    async fn send_message(&self, tab_id: TabId, message: &ContentMessage) -> HostResult<()> {
        call_unit(
            &self.client,
            method::TABS_SEND_MESSAGE,
            json!({"tabId": tab_id, "message": message}),
        )
        .await
    }

    async fn extract_text(&self, tab_id: TabId, selector: &str) -> HostResult<String> {
        let text: Option<String> = call(
            &self.client,
            method::SCRIPTING_EXTRACT_TEXT,
            json!({"tabId": tab_id, "selector": selector}),
        )
        .await?;
        Ok(text.unwrap_or_default())
    }
}

/// Which of the extension's storage areas a [`BridgeStorage`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Cleared when the browser exits.
    Session,
    Local,
    /// Follows the user's browser profile across machines.
    Sync,
}

/// [`StorageArea`] backed by one of the extension's storage areas.
pub struct BridgeStorage {
    client: Arc<BridgeClient>,
    area: StorageKind,
}

impl BridgeStorage {
    #[must_use]
    pub fn new(client: Arc<BridgeClient>, area: StorageKind) -> Self {
        Self { client, area }
    }
}

#[async_trait]
impl StorageArea for BridgeStorage {
    async fn get(&self, keys: &[&str]) -> HostResult<HashMap<String, Value>> {
        let values: Option<HashMap<String, Value>> = call(
            &self.client,
            method::STORAGE_GET,
            json!({"area": self.area, "keys": keys}),
        )
        .await?;
        Ok(values.unwrap_or_default())
    }

    async fn set(&self, items: HashMap<String, Value>) -> HostResult<()> {
        call_unit(
            &self.client,
            method::STORAGE_SET,
            json!({"area": self.area, "items": items}),
        )
        .await
    }

    async fn remove(&self, keys: &[&str]) -> HostResult<()> {
        call_unit(
            &self.client,
            method::STORAGE_REMOVE,
            json!({"area": self.area, "keys": keys}),
        )
        .await
    }
}

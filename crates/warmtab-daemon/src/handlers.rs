//! Notification handlers for the daemon.
//!
//! The extension forwards browser events as JSON-RPC notifications. Each is
//! decoded into a [`Notice`] and then handed to the pool or the dispatcher:
//! - Tab/window lifecycle and focus (`tabs.onRemoved`, `windows.*`)
//! - User actions (`action.onClicked`, `commands.onCommand`)
//! - Navigation to the chat service (`webNavigation.onCommitted`)
//! - Extension lifecycle (`runtime.onInstalled`, `runtime.onStartup`)

use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use warmtab_core::{Dispatcher, OPEN_QUERY_COMMAND};
use warmtab_rpc::protocol::event;
use warmtab_types::{HostEvent, NavigationEvent, TabId, TabInfo, WindowId};

use crate::error::{DaemonError, Result};

/// A decoded extension notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Host(HostEvent),
    /// Send the query for this tab, or for the active tab when `None`.
    Open(Option<TabInfo>),
    Navigation(NavigationEvent),
    Installed,
    Startup,
    Ignored,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabParams {
    tab_id: TabId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindowParams {
    window_id: WindowId,
}

#[derive(Deserialize)]
struct ActionParams {
    #[serde(default)]
    tab: Option<TabInfo>,
}

#[derive(Deserialize)]
struct CommandParams {
    command: String,
}

fn params<T: DeserializeOwned>(method: &str, params: Option<&Value>) -> Result<T> {
    let value = params.cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| DaemonError::InvalidParams(format!("{method}: {e}")))
}

/// Decode a notification by method name.
///
/// # Errors
///
/// Returns [`DaemonError::InvalidParams`] if a known event carries params
/// of the wrong shape.
pub fn decode_notification(method: &str, raw: Option<&Value>) -> Result<Notice> {
    let notice = match method {
        event::TAB_REMOVED => {
            let p: TabParams = params(method, raw)?;
            Notice::Host(HostEvent::TabRemoved { tab_id: p.tab_id })
        }
        event::WINDOW_REMOVED => {
            let p: WindowParams = params(method, raw)?;
            Notice::Host(HostEvent::WindowRemoved {
                window_id: p.window_id,
            })
        }
        event::WINDOW_FOCUS_CHANGED => {
            let p: WindowParams = params(method, raw)?;
            Notice::Host(HostEvent::WindowFocusChanged {
                window_id: p.window_id,
            })
        }
        event::ACTION_CLICKED => {
            let p: ActionParams = params(method, raw)?;
            Notice::Open(p.tab)
        }
        event::COMMAND => {
            let p: CommandParams = params(method, raw)?;
            if p.command == OPEN_QUERY_COMMAND {
                Notice::Open(None)
            } else {
                debug!("Ignoring command {}", p.command);
                Notice::Ignored
            }
        }
        event::NAVIGATION_COMMITTED => Notice::Navigation(params(method, raw)?),
        event::INSTALLED => Notice::Installed,
        event::STARTUP => Notice::Startup,
        other => {
            debug!("Ignoring unknown notification {other}");
            Notice::Ignored
        }
    };
    Ok(notice)
}

/// Where decoded notices go.
pub struct Router {
    pub dispatcher: Arc<Dispatcher>,
    pub events: mpsc::UnboundedSender<HostEvent>,
}

impl Router {
    /// Route one notification. Dispatch work runs on its own task so a slow
    /// delivery never holds up later events.
    pub fn handle_notification(&self, method: &str, raw: Option<&Value>) {
        trace!("Notification {method}");
        let notice = match decode_notification(method, raw) {
            Ok(notice) => notice,
            Err(e) => {
                warn!("Dropping notification: {e}");
                return;
            }
        };

        let dispatcher = self.dispatcher.clone();
        match notice {
            Notice::Host(event) => {
                if self.events.send(event).is_err() {
                    debug!("Pool event loop has stopped");
                }
            }
            Notice::Open(tab) => {
                tokio::spawn(async move {
                    dispatcher.open_with_tab(tab).await;
                });
            }
            Notice::Navigation(nav) => {
                tokio::spawn(async move {
                    dispatcher.handle_navigation(&nav).await;
                });
            }
            Notice::Installed => {
                tokio::spawn(async move {
                    dispatcher.handle_installed().await;
                });
            }
            Notice::Startup => {
                tokio::spawn(async move {
                    dispatcher.handle_startup().await;
                });
            }
            Notice::Ignored => {}
        }
    }
}

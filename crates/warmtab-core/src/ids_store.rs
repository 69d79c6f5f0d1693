//! Durable mirror of the warm tab's identifiers.
//!
//! The native host can be torn down by the browser at any moment without a
//! shutdown hook, so the identifiers of the warm tab at the head of the pool
//! are written to two storage tiers:
//!
//! - the session tier, cleared by the browser when its session ends, so it
//!   never outlives the tab it names within one session;
//! - the local tier, which survives browser and host restarts.
//!
//! Reads prefer memory, then session, then local. A pair recovered from
//! storage is written back to memory and both tiers, unless a `set` or
//! `clear` happened while it was being read.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};
use warmtab_types::{TabId, WarmTab, WindowId};

use crate::host::StorageArea;

pub const KEY_TAB: &str = "prerenderTabId";
pub const KEY_WINDOW: &str = "prerenderWindowId";
pub const KEY_TAB_PERSIST: &str = "prerenderTabIdPersist";
pub const KEY_WINDOW_PERSIST: &str = "prerenderWindowIdPersist";

/// Tab/window pair as stored. Either both fields are set or the pair is
/// treated as empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistedIds {
    pub tab_id: Option<TabId>,
    pub window_id: Option<WindowId>,
}

impl PersistedIds {
    pub const EMPTY: PersistedIds = PersistedIds {
        tab_id: None,
        window_id: None,
    };

    /// Keep only integral values; anything else reads as absent.
    fn from_values(tab: Option<&Value>, window: Option<&Value>) -> Self {
        Self {
            tab_id: tab.and_then(Value::as_i64).map(TabId),
            window_id: window.and_then(Value::as_i64).map(WindowId),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.tab_id.is_some() && self.window_id.is_some()
    }

    #[must_use]
    pub fn warm_tab(&self) -> Option<WarmTab> {
        Some(WarmTab::new(self.tab_id?, self.window_id?))
    }
}

impl From<WarmTab> for PersistedIds {
    fn from(tab: WarmTab) -> Self {
        Self {
            tab_id: Some(tab.tab_id),
            window_id: Some(tab.window_id),
        }
    }
}

#[derive(Debug, Default)]
struct Memory {
    ids: PersistedIds,
    /// Bumped by every change; storage work started under an older value
    /// has been superseded.
    generation: u64,
}

impl Memory {
    fn replace(&mut self, ids: PersistedIds) -> u64 {
        self.ids = ids;
        self.generation += 1;
        self.generation
    }
}

/// Two-tier store with an in-memory cache in front.
///
/// Never fails: storage errors are logged and read as "nothing known".
pub struct IdsStore {
    session: Arc<dyn StorageArea>,
    local: Arc<dyn StorageArea>,
    memory: Mutex<Memory>,
    /// Serializes storage writes; only the newest generation is written.
    writes: tokio::sync::Mutex<()>,
}

impl IdsStore {
    #[must_use]
    pub fn new(session: Arc<dyn StorageArea>, local: Arc<dyn StorageArea>) -> Self {
        Self {
            session,
            local,
            memory: Mutex::new(Memory::default()),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    fn memory(&self) -> MutexGuard<'_, Memory> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.memory().generation == generation
    }

    /// Current pair, without I/O when memory already holds one.
    pub async fn get(&self) -> PersistedIds {
        let (cached, generation) = {
            let memory = self.memory();
            (memory.ids, memory.generation)
        };
        if cached.is_valid() {
            return cached;
        }

        let stored = self.read_from_storage().await;

        let adopted = {
            let mut memory = self.memory();
            if memory.generation != generation {
                return memory.ids;
            }
            stored
                .warm_tab()
                .map(|tab| (tab, memory.replace(stored)))
        };

        if let Some((tab, generation)) = adopted {
            debug!(
                "Recovered warm tab {} (window {}) from storage",
                tab.tab_id, tab.window_id
            );
            self.write_pair(tab, generation).await;
        }

        self.memory().ids
    }

    /// Remember `tab` in memory and in both storage tiers.
    pub async fn set(&self, tab: WarmTab) {
        let generation = self.memory().replace(tab.into());
        self.write_pair(tab, generation).await;
    }

    async fn write_pair(&self, tab: WarmTab, generation: u64) {
        let _write = self.writes.lock().await;
        if !self.is_current(generation) {
            return;
        }

        let session_items = HashMap::from([
            (KEY_TAB.to_string(), Value::from(tab.tab_id.0)),
            (KEY_WINDOW.to_string(), Value::from(tab.window_id.0)),
        ]);
        let local_items = HashMap::from([
            (KEY_TAB_PERSIST.to_string(), Value::from(tab.tab_id.0)),
            (KEY_WINDOW_PERSIST.to_string(), Value::from(tab.window_id.0)),
        ]);

        if let Err(e) = self.session.set(session_items).await {
            warn!("Failed to write warm tab ids to session storage: {e}");
        }
        if let Err(e) = self.local.set(local_items).await {
            warn!("Failed to write warm tab ids to local storage: {e}");
        }
    }

    /// Forget the pair in memory and in both storage tiers.
    pub async fn clear(&self) {
        let generation = self.memory().replace(PersistedIds::EMPTY);

        let _write = self.writes.lock().await;
        if !self.is_current(generation) {
            return;
        }

        if let Err(e) = self.session.remove(&[KEY_TAB, KEY_WINDOW]).await {
            warn!("Failed to clear session warm tab ids: {e}");
        }
        if let Err(e) = self
            .local
            .remove(&[KEY_TAB_PERSIST, KEY_WINDOW_PERSIST])
            .await
        {
            warn!("Failed to clear local warm tab ids: {e}");
        }
    }

    async fn read_from_storage(&self) -> PersistedIds {
        match self.session.get(&[KEY_TAB, KEY_WINDOW]).await {
            Ok(values) => {
                let pair = PersistedIds::from_values(values.get(KEY_TAB), values.get(KEY_WINDOW));
                if pair.is_valid() {
                    return pair;
                }
            }
            Err(e) => debug!("Session storage unavailable: {e}"),
        }

        match self.local.get(&[KEY_TAB_PERSIST, KEY_WINDOW_PERSIST]).await {
            Ok(values) => {
                let pair = PersistedIds::from_values(
                    values.get(KEY_TAB_PERSIST),
                    values.get(KEY_WINDOW_PERSIST),
                );
                if pair.is_valid() {
                    return pair;
                }
            }
            Err(e) => debug!("Local storage unavailable: {e}"),
        }

        PersistedIds::EMPTY
    }
}

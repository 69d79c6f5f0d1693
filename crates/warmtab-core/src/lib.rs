//! Core of warmtab: a pool of pre-rendered hidden tabs, the store that lets
//! the pool survive restarts of the native host, and the dispatch logic that
//! turns a user action into a query on the chat service.
//!
//! Everything here talks to the browser through [`BrowserHost`] and
//! [`StorageArea`]. The daemon implements them over native messaging.

pub mod config;
pub mod dispatch;
pub mod host;
pub mod ids_store;
pub mod pool;
pub mod rules;
pub mod text;

mod error;

#[cfg(test)]
mod tests;

pub use dispatch::{DispatchSettings, Dispatcher, OPEN_QUERY_COMMAND};
pub use error::{Error, Result};
pub use host::{BrowserHost, HostError, HostResult, StorageArea};
pub use ids_store::{IdsStore, PersistedIds};
pub use pool::{AdoptionBounds, PoolSettings, WarmPool};
pub use rules::{RuleConfig, SettingsStore, StorageSettingsStore};

pub use warmtab_types::*;

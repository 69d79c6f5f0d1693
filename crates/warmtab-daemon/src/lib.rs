//! Warmtab native messaging host.
//!
//! This crate connects the warmtab core to the browser extension: it adapts
//! the bridge to the core's host and storage traits and routes the
//! extension's event notifications to the warm pool and the dispatcher.

pub mod bridge;
pub mod error;
pub mod handlers;
pub mod server;

pub use bridge::{BridgeHost, BridgeStorage, StorageKind, probe_capabilities};
pub use error::{DaemonError, Result};
pub use handlers::{Notice, Router, decode_notification};
pub use server::{run, serve_pipe};

//! Native-messaging JSON-RPC bridge for warmtab.
//!
//! The browser extension owns every browser API; the native process owns the
//! warm-pool logic. This crate carries calls and events between the two over
//! the native-messaging pipe the browser sets up when it launches the host.
//!
//! - [`protocol`]: JSON-RPC 2.0 message types and the method/event names
//! - [`transport`]: native-messaging frame codec
//! - [`client`]: request/response multiplexer over the pipe
//! - [`error`]: Result type alias
//!
//! # Example
//!
//! ```no_run
//! use warmtab_rpc::{BridgeClient, method};
//! use warmtab_types::WindowInfo;
//!
//! # async fn example() -> Result<(), warmtab_rpc::ClientError> {
//! let (client, mut events) = BridgeClient::stdio();
//!
//! let windows: Vec<WindowInfo> = client
//!     .request(method::WINDOWS_GET_ALL, Some(serde_json::json!({"windowTypes": ["normal"]})))
//!     .await?;
//! println!("{} normal windows", windows.len());
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{BridgeClient, ClientError, DEFAULT_REQUEST_TIMEOUT};

pub use error::{Error, Result};

pub use protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, Message,
    NOT_FOUND, Notification, PARSE_ERROR, Request, RequestId, Response, RpcError, UNSUPPORTED,
    event, method,
};

pub use transport::{CodecError, NativeMessagingCodec};

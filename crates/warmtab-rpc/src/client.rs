//! Bridge client for talking to the browser extension.
//!
//! The extension launches the native host and exchanges native-messaging
//! frames over its stdin/stdout. [`BridgeClient`] multiplexes outgoing
//! requests over that pipe, matches responses by id, and hands every
//! extension-originated message (event notifications) to a channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::protocol::{Message, Notification, Request, RequestId, Response, RpcError};
use crate::transport::{CodecError, NativeMessagingCodec};

/// Default time to wait for the extension to answer a request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the incoming event channel.
const INCOMING_CAPACITY: usize = 256;

/// Errors that can occur with the bridge client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC error: {code} - {message}")]
    Rpc { code: i32, message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timeout")]
    Timeout,
}

impl From<RpcError> for ClientError {
    fn from(e: RpcError) -> Self {
        ClientError::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}

/// Pending request waiting for a response
type PendingRequest = oneshot::Sender<Result<Response, ClientError>>;
type PendingMap = Arc<Mutex<HashMap<RequestId, PendingRequest>>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// JSON-RPC client over a native-messaging pipe
pub struct BridgeClient {
    sender: Mutex<FramedWrite<BoxedWriter, NativeMessagingCodec>>,
    pending: PendingMap,
    next_id: AtomicU64,
    timeout: Duration,
}

impl BridgeClient {
    /// Bridge over the process's stdin/stdout, as launched by the browser.
    #[must_use]
    pub fn stdio() -> (Self, mpsc::Receiver<Message>) {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Bridge over an arbitrary reader/writer pair.
    ///
    /// Returns the client and the receiver for extension-originated messages.
    /// The receiver closes when the reader reaches end of stream.
    pub fn new<R, W>(reader: R, writer: W) -> (Self, mpsc::Receiver<Message>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let pending_clone = pending.clone();

        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_CAPACITY);

        tokio::spawn(async move {
            let mut stream = FramedRead::new(reader, NativeMessagingCodec::new());
            while let Some(result) = stream.next().await {
                match result {
                    Ok(Message::Response(resp)) => {
                        let mut pending = pending_clone.lock().await;
                        if let Some(tx) = pending.remove(&resp.id) {
                            let _ = tx.send(Ok(resp));
                        } else {
                            debug!("Dropping response for unknown request {}", resp.id);
                        }
                    }
                    Ok(msg) => {
                        if incoming_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Bridge read failed: {e}");
                        break;
                    }
                }
            }

            debug!("Bridge input closed");
            let mut pending = pending_clone.lock().await;
            for (_, tx) in pending.drain() {
                let _ = tx.send(Err(ClientError::ConnectionClosed));
            }
        });

        let writer: BoxedWriter = Box::new(writer);
        let client = Self {
            sender: Mutex::new(FramedWrite::new(writer, NativeMessagingCodec::new())),
            pending,
            next_id: AtomicU64::new(1),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        };

        (client, incoming_rx)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send an RPC request and wait for a response.
    ///
    /// A `null` or absent result deserializes as `T` from `null`, so unit
    /// results work for fire-and-confirm calls.
    ///
    /// # Errors
    ///
    /// Returns an error if sending fails, the connection closes, the request
    /// times out, the extension answers with an error, or deserialization fails.
    pub async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<T, ClientError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = Request::new(method, params, id.clone());

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        let sent = {
            let mut sender = self.sender.lock().await;
            sender.send(Message::Request(request)).await
        };
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(e.into());
        }

        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(received) => received.map_err(|_| ClientError::ConnectionClosed)??,
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ClientError::Timeout);
            }
        };

        if let Some(error) = response.error {
            return Err(error.into());
        }

        let result = response.result.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(result)?)
    }

    /// Send a notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Codec` if sending fails.
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), ClientError> {
        let notification = Notification::new(method, params);
        let mut sender = self.sender.lock().await;
        sender.send(Message::Notification(notification)).await?;
        Ok(())
    }

    /// Answer a request the extension sent us.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Codec` if sending fails.
    pub async fn respond(&self, response: Response) -> Result<(), ClientError> {
        let mut sender = self.sender.lock().await;
        sender.send(Message::Response(response)).await?;
        Ok(())
    }
}

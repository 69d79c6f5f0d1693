//! Native-messaging transport codec for JSON-RPC messages.
//!
//! Browsers talk to native hosts over stdin/stdout using frames with a 4-byte
//! length prefix in native byte order (little-endian on every platform the
//! browsers ship on) followed by UTF-8 JSON.
//!
//! Frame format:
//! ```text
//! +----------------+------------------+
//! |  4 bytes       |  N bytes         |
//! |  (length LE)   |  (JSON payload)  |
//! +----------------+------------------+
//! ```

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::Message;

/// Largest frame the browser accepts from a native host (1 MiB)
pub const MAX_OUTGOING_SIZE: usize = 1024 * 1024;

/// Largest frame the browser sends to a native host (64 MiB)
pub const MAX_INCOMING_SIZE: usize = 64 * 1024 * 1024;

/// Length prefix size in bytes
const LENGTH_PREFIX_SIZE: usize = 4;

/// Codec for native-messaging framed JSON-RPC messages
#[derive(Debug, Default)]
pub struct NativeMessagingCodec {
    current_length: Option<usize>,
}

impl NativeMessagingCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for NativeMessagingCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.current_length.is_none() {
            if src.len() < LENGTH_PREFIX_SIZE {
                return Ok(None);
            }

            let len = src.get_u32_le() as usize;

            if len > MAX_INCOMING_SIZE {
                return Err(CodecError::MessageTooLarge(len));
            }

            self.current_length = Some(len);
        }

        let Some(length) = self.current_length else {
            return Ok(None);
        };

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let payload = src.split_to(length);
        self.current_length = None;

        let json_str = std::str::from_utf8(&payload)?;
        let message: Message = serde_json::from_str(json_str)?;

        Ok(Some(message))
    }
}

impl Encoder<Message> for NativeMessagingCodec {
    type Error = CodecError;

    // Message size is checked against MAX_OUTGOING_SIZE (fits in u32)
    #[allow(clippy::cast_possible_truncation)]
    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_string(&item)?;
        let json_bytes = json.as_bytes();

        if json_bytes.len() > MAX_OUTGOING_SIZE {
            return Err(CodecError::MessageTooLarge(json_bytes.len()));
        }

        dst.reserve(LENGTH_PREFIX_SIZE + json_bytes.len());
        dst.put_u32_le(json_bytes.len() as u32);
        dst.put_slice(json_bytes);

        Ok(())
    }
}

/// Errors that can occur during codec operations
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),
}

//! JSON-RPC 2.0 protocol types.
//!
//! This module provides the JSON-RPC 2.0 message types exchanged with the
//! browser extension, plus the method names both sides agree on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
/// The tab, window or key named in the request does not exist.
pub const NOT_FOUND: i32 = -32010;
/// The browser does not implement the requested API.
pub const UNSUPPORTED: i32 = -32011;

/// Methods the native process calls on the extension.
pub mod method {
    pub const WINDOWS_GET_ALL: &str = "windows.getAll";
    pub const WINDOWS_CREATE: &str = "windows.create";
    pub const WINDOWS_GET: &str = "windows.get";
    pub const WINDOWS_UPDATE: &str = "windows.update";
    pub const WINDOWS_REMOVE: &str = "windows.remove";
    pub const TABS_GET: &str = "tabs.get";
    pub const TABS_QUERY: &str = "tabs.query";
    pub const TABS_CREATE: &str = "tabs.create";
    pub const TABS_MOVE: &str = "tabs.move";
    pub const TABS_UPDATE: &str = "tabs.update";
    pub const TABS_REMOVE: &str = "tabs.remove";
    pub const TABS_SEND_MESSAGE: &str = "tabs.sendMessage";
    pub const SCRIPTING_EXTRACT_TEXT: &str = "scripting.extractText";
    pub const STORAGE_GET: &str = "storage.get";
    pub const STORAGE_SET: &str = "storage.set";
    pub const STORAGE_REMOVE: &str = "storage.remove";
    pub const RUNTIME_CAPABILITIES: &str = "runtime.capabilities";
}

/// Notifications the extension forwards from browser event listeners.
pub mod event {
    pub const TAB_REMOVED: &str = "tabs.onRemoved";
    pub const WINDOW_REMOVED: &str = "windows.onRemoved";
    pub const WINDOW_FOCUS_CHANGED: &str = "windows.onFocusChanged";
    pub const ACTION_CLICKED: &str = "action.onClicked";
    pub const COMMAND: &str = "commands.onCommand";
    pub const NAVIGATION_COMMITTED: &str = "webNavigation.onCommitted";
    pub const INSTALLED: &str = "runtime.onInstalled";
    pub const STARTUP: &str = "runtime.onStartup";
}

/// JSON-RPC 2.0 Request ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Request {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }

    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RequestId,
}

impl Response {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    #[must_use]
    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// JSON-RPC 2.0 Notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    #[must_use]
    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::new(NOT_FOUND, format!("No such {}", what.into()))
    }

    #[must_use]
    pub fn unsupported(api: impl Into<String>) -> Self {
        Self::new(UNSUPPORTED, format!("Unsupported API: {}", api.into()))
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Incoming message that could be a request, response, or notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    /// Parse a JSON string into a `Message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or doesn't match any message type.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize this message to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(r) if r.id.is_some())
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Request(r) if r.id.is_none())
            || matches!(self, Message::Notification(_))
    }

    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    /// Method name and params of a notification, whichever variant it decoded as.
    #[must_use]
    pub fn as_notification(&self) -> Option<(&str, Option<&Value>)> {
        match self {
            Message::Request(r) if r.id.is_none() => Some((&r.method, r.params.as_ref())),
            Message::Notification(n) => Some((&n.method, n.params.as_ref())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::new(
            method::TABS_GET,
            Some(serde_json::json!({"tabId": 7})),
            1.into(),
        );
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"tabs.get\""));
        assert!(json.contains("\"id\":1"));
    }

    #[test]
    fn test_request_without_params() {
        let req = Request::new(method::RUNTIME_CAPABILITIES, None, 1.into());
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_notification_no_id() {
        let notif = Request::notification(event::STARTUP, None);
        let json = serde_json::to_string(&notif).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn test_response_error() {
        let resp = Response::error(3.into(), RpcError::not_found("tab 12"));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("-32010"));
        assert!(json.contains("No such tab 12"));
        assert!(!json.contains("\"result\""));
    }

    #[test]
    fn test_request_id_types() {
        let num: RequestId = 42.into();
        assert_eq!(num.to_string(), "42");

        let text: RequestId = "abc".into();
        assert_eq!(text.to_string(), "abc");
    }

    #[test]
    fn test_rpc_error_unsupported() {
        let err = RpcError::unsupported("scripting");
        assert_eq!(err.code, UNSUPPORTED);
        assert_eq!(err.to_string(), "RPC error -32011: Unsupported API: scripting");
    }

    #[test]
    fn test_rpc_error_with_data() {
        let err = RpcError::with_data(
            INTERNAL_ERROR,
            "boom",
            serde_json::json!({"api": "windows.create"}),
        );
        assert_eq!(err.data.unwrap()["api"], "windows.create");
    }

    #[test]
    fn test_message_parse_request() {
        let json = r#"{"jsonrpc":"2.0","method":"tabs.get","params":{"tabId":1},"id":1}"#;
        let msg = Message::parse(json).unwrap();
        assert!(msg.is_request());
        assert!(!msg.is_notification());
    }

    #[test]
    fn test_message_parse_event_notification() {
        let json = r#"{"jsonrpc":"2.0","method":"tabs.onRemoved","params":{"tabId":9}}"#;
        let msg = Message::parse(json).unwrap();
        assert!(msg.is_notification());

        let (name, params) = msg.as_notification().unwrap();
        assert_eq!(name, event::TAB_REMOVED);
        assert_eq!(params.unwrap()["tabId"], 9);
    }

    #[test]
    fn test_message_parse_response() {
        let json = r#"{"jsonrpc":"2.0","result":{"id":900},"id":1}"#;
        let msg = Message::parse(json).unwrap();
        assert!(msg.is_response());
        assert!(msg.as_notification().is_none());
    }

    #[test]
    fn test_message_parse_error_response() {
        let json = r#"{"jsonrpc":"2.0","error":{"code":-32010,"message":"No such tab 4"},"id":2}"#;
        let Message::Response(resp) = Message::parse(json).unwrap() else {
            panic!("Expected Response");
        };
        assert_eq!(resp.error.unwrap().code, NOT_FOUND);
    }

    #[test]
    fn test_message_to_json() {
        let msg = Message::Notification(Notification::new(event::INSTALLED, None));
        let json = msg.to_json().unwrap();
        assert!(json.contains("runtime.onInstalled"));
    }
}

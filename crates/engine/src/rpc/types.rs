// EDB - Ethereum Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Request/response types of the command API.
//!
//! The shapes follow JSON-RPC 2.0 so that any JSON-RPC client library can
//! drive a debugging session.
//!
//! - [`RpcRequest`] - Incoming request with method and parameters
//! - [`RpcResponse`] - Outgoing response with result or error
//! - [`RpcError`] - Structured error with a numeric code from [`error_codes`]
//! - [`RpcId`] - Request/response identifier (string or number)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Method name (e.g. "debug_stepOver")
    pub method: String,
    /// Optional positional parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Request identifier for matching with response
    pub id: RpcId,
}

impl RpcRequest {
    /// A request with the current protocol version
    pub fn new(id: impl Into<RpcId>, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self { jsonrpc: "2.0".to_string(), method: method.into(), params, id: id.into() }
    }
}

/// JSON-RPC 2.0 response, carrying either a result or an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Successful method result (omitted if error occurred)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information (omitted if method succeeded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// Request identifier matching the original request
    pub id: RpcId,
}

impl RpcResponse {
    /// Response for `id` from a method result
    pub fn from_result(id: RpcId, result: Result<serde_json::Value, RpcError>) -> Self {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        Self { jsonrpc: "2.0".to_string(), result, error, id }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct RpcError {
    /// Numeric error code, see [`error_codes`]
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Request/response identifier, a string or a number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    /// Numeric identifier
    Number(u64),
    /// String identifier
    String(String),
}

impl From<u64> for RpcId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RpcId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

/// Error codes: the standard JSON-RPC 2.0 ones and the debugger's own
pub mod error_codes {
    // Standard JSON-RPC 2.0 error codes

    /// Parse error - Invalid JSON was received
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid request - The JSON sent is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found - The method does not exist or is not available
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params - Invalid method parameter(s)
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error - Internal JSON-RPC error
    pub const INTERNAL_ERROR: i32 = -32603;

    // Debugger error codes (starting from -33000)

    /// No instance is known for the address
    pub const UNKNOWN_ADDRESS: i32 = -33001;
    /// The breakpoint is not registered
    pub const UNKNOWN_BREAKPOINT: i32 = -33002;
    /// The trace has no instruction to report
    pub const EMPTY_TRACE: i32 = -33003;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let request: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "debug_stepNext",
            "id": "a"
        }))
        .unwrap();
        assert_eq!(request.id, RpcId::String("a".into()));
        assert!(request.params.is_none());

        let request: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "debug_advance",
            "params": [3],
            "id": 7
        }))
        .unwrap();
        assert_eq!(request.id, RpcId::Number(7));
    }

    #[test]
    fn test_response_omits_missing_members() {
        let ok = RpcResponse::from_result(1.into(), Ok(json!(true)));
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value, json!({ "jsonrpc": "2.0", "result": true, "id": 1 }));

        let err = RpcError { code: error_codes::INVALID_PARAMS, message: "bad".into(), data: None };
        assert_eq!(err.to_string(), "bad (code -32602)");
        let value = serde_json::to_value(RpcResponse::from_result("x".into(), Err(err))).unwrap();
        assert_eq!(value["error"]["code"], -32602);
        assert!(value.get("result").is_none());
    }
}

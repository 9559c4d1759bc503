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

//! Helpers shared by the command handlers.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::types::{error_codes, RpcError};

/// Build an error object
pub fn to_rpc_error(code: i32, message: &str, data: Option<Value>) -> RpcError {
    RpcError { code, message: message.to_string(), data }
}

/// Internal error
pub fn internal_error(message: &str) -> RpcError {
    to_rpc_error(error_codes::INTERNAL_ERROR, message, None)
}

/// Unknown method
pub fn method_not_found(method: &str) -> RpcError {
    to_rpc_error(error_codes::METHOD_NOT_FOUND, &format!("Method '{method}' not found"), None)
}

/// Invalid parameters
pub fn invalid_params(message: &str) -> RpcError {
    to_rpc_error(error_codes::INVALID_PARAMS, message, None)
}

/// Positional parameter `index`, `None` if absent or `null`
pub fn param<T: DeserializeOwned>(params: &Option<Value>, index: usize) -> Result<Option<T>, RpcError> {
    let value = match params {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(values)) => values.get(index),
        Some(_) => return Err(invalid_params("Invalid params: expected an array")),
    };
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| invalid_params(&format!("Invalid parameter {index}: {e}"))),
    }
}

/// Required positional parameter `index`
pub fn required_param<T: DeserializeOwned>(
    params: &Option<Value>,
    index: usize,
    name: &str,
) -> Result<T, RpcError> {
    param(params, index)?.ok_or_else(|| invalid_params(&format!("Missing parameter {index}: {name}")))
}

/// Serialize a method result
pub fn to_json<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| internal_error(&format!("Failed to serialize result: {e}")))
}

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

//! Breakpoint commands.
//!
//! A breakpoint parameter is either its textual form or its JSON form:
//!
//! ```json
//! "@1:12"
//! { "kind": "node", "source_id": 1, "start": 100, "length": 20 }
//! ```
//!
//! - `debug_addBreakpoint` - `[breakpoint]`, answers whether it was new
//! - `debug_removeBreakpoint` - `[breakpoint]`, fails with `UNKNOWN_BREAKPOINT`
//! - `debug_listBreakpoints`
//! - `debug_clearBreakpoints`

use rdb_common::types::Breakpoint;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    rpc::{
        error_codes,
        utils::{invalid_params, required_param, to_json, to_rpc_error},
        RpcError,
    },
    session::Session,
};

/// Breakpoint as sent by a client
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BreakpointParam {
    /// `[@]<source>:<line>` or `[@]<source>:<start>:<length>`
    Text(String),
    /// Serialized [`Breakpoint`]
    Structured(Breakpoint),
}

impl TryFrom<BreakpointParam> for Breakpoint {
    type Error = RpcError;

    fn try_from(param: BreakpointParam) -> Result<Self, Self::Error> {
        match param {
            BreakpointParam::Text(text) => text
                .parse()
                .map_err(|e| invalid_params(&format!("Invalid breakpoint '{text}': {e}"))),
            BreakpointParam::Structured(breakpoint) => Ok(breakpoint),
        }
    }
}

fn breakpoint_param(params: &Option<Value>) -> Result<Breakpoint, RpcError> {
    required_param::<BreakpointParam>(params, 0, "breakpoint")?.try_into()
}

/// `debug_addBreakpoint`
pub fn add_breakpoint(session: &mut Session, params: &Option<Value>) -> Result<Value, RpcError> {
    let breakpoint = breakpoint_param(params)?;
    let added = session.add_breakpoint(breakpoint);
    Ok(json!({ "breakpoint": breakpoint.to_string(), "added": added }))
}

/// `debug_removeBreakpoint`
pub fn remove_breakpoint(session: &mut Session, params: &Option<Value>) -> Result<Value, RpcError> {
    let breakpoint = breakpoint_param(params)?;
    if !session.remove_breakpoint(&breakpoint) {
        return Err(to_rpc_error(
            error_codes::UNKNOWN_BREAKPOINT,
            &format!("Breakpoint {breakpoint} is not registered"),
            None,
        ));
    }
    debug!(%breakpoint, "Removed breakpoint");
    Ok(Value::Bool(true))
}

/// `debug_listBreakpoints`
pub fn list_breakpoints(session: &Session) -> Result<Value, RpcError> {
    to_json(&session.breakpoints())
}

/// `debug_clearBreakpoints`
pub fn clear_breakpoints(session: &mut Session) -> Result<Value, RpcError> {
    let count = session.breakpoints().len();
    session.clear_breakpoints();
    Ok(json!(count))
}

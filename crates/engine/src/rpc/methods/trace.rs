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

//! State inspection commands.
//!
//! - `debug_getState` - cursor, depths, current instruction and location
//! - `debug_getLocation` - the resolved source location
//! - `debug_getInstruction` - the recorded instruction under the cursor
//! - `debug_getTransactionLog` - the log built so far, `null` when disabled

use serde_json::{json, Value};

use crate::{
    rpc::{
        error_codes,
        utils::{internal_error, to_json, to_rpc_error},
        RpcError,
    },
    session::Session,
};

/// `debug_getState`
pub fn get_state(session: &Session) -> Result<Value, RpcError> {
    let instruction = session.current_instruction().map(|inst| {
        json!({
            "pc": inst.pc,
            "opcode": inst.mnemonic(),
            "depth": inst.depth,
            "gasCost": inst.gas_cost,
            "error": inst.error,
        })
    });

    Ok(json!({
        "index": session.index(),
        "steps": session.trace().len(),
        "finished": session.is_finished(),
        "callDepth": session.call_depth(),
        "functionDepth": session.function_depth(),
        "storageAddress": session.codex().current().storage_address,
        "sourceRangeFinal": session.is_source_range_final(),
        "instruction": instruction,
        "location": to_json(&session.location())?,
    }))
}

/// `debug_getLocation`
pub fn get_location(session: &Session) -> Result<Value, RpcError> {
    to_json(&session.location())
}

/// `debug_getInstruction`
pub fn get_instruction(session: &Session) -> Result<Value, RpcError> {
    match session.current_instruction() {
        Some(instruction) => to_json(instruction),
        None => Err(to_rpc_error(error_codes::EMPTY_TRACE, "The trace has no instructions", None)),
    }
}

/// `debug_getTransactionLog`
pub fn get_transaction_log(session: &Session) -> Result<Value, RpcError> {
    match session.transaction_log() {
        Some(log) => log
            .to_json_value()
            .map_err(|e| internal_error(&format!("Failed to serialize transaction log: {e}"))),
        None => Ok(Value::Null),
    }
}

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

//! Storage and instance queries.
//!
//! - `debug_getStorage` - `[slot]` of the executing account, or `[address, slot]`.
//!   Slots are quantities (`"0x1"`) or full words. Unknown values are `null`.
//! - `debug_getContext` - `[address]`, the context of a known instance

use alloy_primitives::{Address, B256, U256};
use serde_json::{json, Value};

use crate::{
    rpc::{
        error_codes,
        utils::{param, required_param, to_rpc_error},
        RpcError,
    },
    session::Session,
};

/// `debug_getStorage`
pub fn get_storage(session: &mut Session, params: &Option<Value>) -> Result<Value, RpcError> {
    let (address, slot) = match param::<U256>(params, 1)? {
        Some(slot) => (required_param::<Address>(params, 0, "address")?, slot),
        None => {
            let slot = required_param::<U256>(params, 0, "slot")?;
            (session.codex().current().storage_address, slot)
        }
    };
    let slot = B256::from(slot.to_be_bytes::<32>());
    let value = session.fetch_storage(address, slot);

    Ok(json!({
        "address": address,
        "slot": slot,
        "value": value.known(),
        "known": value.is_known(),
    }))
}

/// `debug_getContext`
pub fn get_context(session: &Session, params: &Option<Value>) -> Result<Value, RpcError> {
    let address = required_param::<Address>(params, 0, "address")?;
    let Some(context) = session.registry().context_of(&address) else {
        return Err(to_rpc_error(
            error_codes::UNKNOWN_ADDRESS,
            &format!("No instance known at {address}"),
            None,
        ));
    };

    Ok(json!({
        "address": address,
        "context": context.id,
        "name": context.name(),
        "constructor": context.metadata.is_constructor,
        "bare": context.is_bare(),
        "unlinked": context.is_unlinked(),
    }))
}

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

//! Stepping commands.
//!
//! - `debug_advance` - `[count?]` raw instruction steps (default 1)
//! - `debug_stepNext`, `debug_stepInto`, `debug_stepOut`, `debug_stepOver`
//! - `debug_continue` - `[breakpoints?]`, the registered set when omitted
//! - `debug_runToEnd`
//! - `debug_reset`
//!
//! Every command answers with the outcome and the state it left the session in:
//!
//! ```json
//! {
//!   "outcome": { "status": "stoppedAt", "stop": { "reason": "stepComplete" } },
//!   "index": 42,
//!   "finished": false,
//!   "callDepth": 1,
//!   "functionDepth": 2,
//!   "location": { "pc": 118, "position": { ... }, ... }
//! }
//! ```

use rdb_common::types::Breakpoint;
use serde_json::{json, Value};

use super::breakpoint::BreakpointParam;
use crate::{
    rpc::{
        utils::{param, to_json},
        RpcError,
    },
    session::{Session, StepOutcome},
};

/// Outcome of a stepping command together with the resulting state
pub fn navigation_result(session: &Session, outcome: StepOutcome) -> Result<Value, RpcError> {
    Ok(json!({
        "outcome": to_json(&outcome)?,
        "index": session.index(),
        "finished": session.is_finished(),
        "callDepth": session.call_depth(),
        "functionDepth": session.function_depth(),
        "location": to_json(&session.location())?,
    }))
}

/// Run a stepping operation and report its outcome
pub fn step_with(
    session: &mut Session,
    operation: fn(&mut Session) -> StepOutcome,
) -> Result<Value, RpcError> {
    let outcome = operation(session);
    navigation_result(session, outcome)
}

/// `debug_advance`
pub fn advance(session: &mut Session, params: &Option<Value>) -> Result<Value, RpcError> {
    let count = param::<usize>(params, 0)?.unwrap_or(1);
    let outcome = session.advance(count);
    navigation_result(session, outcome)
}

/// `debug_continue`
pub fn continue_until(session: &mut Session, params: &Option<Value>) -> Result<Value, RpcError> {
    let outcome = match param::<Vec<BreakpointParam>>(params, 0)? {
        Some(list) => {
            let breakpoints =
                list.into_iter().map(Breakpoint::try_from).collect::<Result<Vec<_>, _>>()?;
            session.continue_until(&breakpoints)
        }
        None => session.continue_until_breakpoint(),
    };
    navigation_result(session, outcome)
}

/// `debug_reset`
pub fn reset(session: &mut Session) -> Result<Value, RpcError> {
    session.reset();
    Ok(json!({
        "index": session.index(),
        "finished": session.is_finished(),
        "location": to_json(&session.location())?,
    }))
}

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

//! Command dispatch.
//!
//! [`MethodHandler`] owns a [`Session`] and routes each method name to the
//! handler implementing it. Handlers live in modules grouped by concern.

mod breakpoint;
mod navigation;
mod storage;
mod trace;

pub use breakpoint::BreakpointParam;
pub use navigation::navigation_result;

use serde_json::Value;
use tracing::debug;

use super::{
    types::{error_codes, RpcError, RpcRequest, RpcResponse},
    utils::{method_not_found, to_rpc_error},
};
use crate::session::Session;

/// Routes commands to a session
#[derive(Debug)]
pub struct MethodHandler {
    session: Session,
}

impl MethodHandler {
    /// Serve commands for `session`
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// The session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable access to the session
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Give back the session
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Handle a method call
    pub fn handle_method(&mut self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        debug!("Handling RPC method: {method}");
        let session = &mut self.session;

        match method {
            // Stepping
            "debug_advance" => navigation::advance(session, &params),
            "debug_stepNext" => navigation::step_with(session, Session::step_next),
            "debug_stepInto" => navigation::step_with(session, Session::step_into),
            "debug_stepOut" => navigation::step_with(session, Session::step_out),
            "debug_stepOver" => navigation::step_with(session, Session::step_over),
            "debug_continue" => navigation::continue_until(session, &params),
            "debug_runToEnd" => navigation::step_with(session, Session::run_to_end),
            "debug_reset" => navigation::reset(session),

            // Inspection
            "debug_getState" => trace::get_state(session),
            "debug_getLocation" => trace::get_location(session),
            "debug_getInstruction" => trace::get_instruction(session),
            "debug_getTransactionLog" => trace::get_transaction_log(session),
            "debug_getStorage" => storage::get_storage(session, &params),
            "debug_getContext" => storage::get_context(session, &params),

            // Breakpoints
            "debug_addBreakpoint" => breakpoint::add_breakpoint(session, &params),
            "debug_removeBreakpoint" => breakpoint::remove_breakpoint(session, &params),
            "debug_listBreakpoints" => breakpoint::list_breakpoints(session),
            "debug_clearBreakpoints" => breakpoint::clear_breakpoints(session),

            _ => Err(method_not_found(method)),
        }
    }

    /// Handle a full request
    pub fn handle_request(&mut self, request: RpcRequest) -> RpcResponse {
        let result = if request.jsonrpc != "2.0" {
            Err(to_rpc_error(
                error_codes::INVALID_REQUEST,
                &format!("Unsupported JSON-RPC version '{}'", request.jsonrpc),
                None,
            ))
        } else {
            self.handle_method(&request.method, request.params)
        };
        RpcResponse::from_result(request.id, result)
    }
}

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

//! JSON command API over a debugging session.
//!
//! Clients drive a [`crate::Session`] by sending JSON-RPC 2.0 requests to a
//! [`MethodHandler`]. The transport is up to the host; the handler only turns
//! requests into responses.
//!
//! # Usage
//!
//! ```ignore
//! let mut handler = MethodHandler::new(session);
//! let response = handler.handle_request(RpcRequest::new(1, "debug_stepOver", None));
//! ```

pub mod methods;
pub use methods::*;

pub mod types;
pub use types::*;

pub mod utils;

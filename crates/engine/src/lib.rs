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

//! RDB Engine - replay core of the EVM trace debugger
//!
//! The engine replays a recorded execution trace one instruction at a time.
//! It reconstructs call frames and storage as it goes ([`codex`]), resolves
//! every program counter to a source location ([`source`]), and offers
//! source-level stepping and breakpoints on top of that ([`session`]).

pub mod codex;
pub use codex::*;

pub mod config;
pub use config::*;

pub mod effect;
pub use effect::*;

pub mod provider;
pub use provider::*;

pub mod registry;
pub use registry::*;

pub mod rpc;
pub use rpc::*;

pub mod session;
pub use session::*;

pub mod source;
pub use source::*;

pub mod trace;
pub use trace::*;

pub mod txlog;
pub use txlog::*;

pub mod utils;
pub use utils::*;

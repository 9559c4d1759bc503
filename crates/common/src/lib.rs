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

//! RDB Common - Shared types for the trace debugger
//!
//! This crate contains the data model shared by the debugging engine and its
//! frontends: recorded instructions, source-map entries, source locations,
//! breakpoints, storage values, and the transaction log tree. It also hosts the
//! logging bootstrap used by every RDB component and its tests.

/// Common types used throughout RDB including instructions, sources, breakpoints and logs
pub mod types;

/// Environment variable names
pub mod env;

/// Logging setup and utilities for consistent logging across RDB components
pub mod logging;
/// Extended opcode classification utilities used when replaying recorded traces
pub mod opcode;

pub use logging::*;
pub use opcode::*;

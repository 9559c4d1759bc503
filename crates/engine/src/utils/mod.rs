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

//! Utility functions and helpers for the RDB engine.
//!
//! - [`disasm`] - EVM bytecode disassembly, used to pair program counters with
//!   source-map entries
//! - [`binary`] - Contract binary normalization, link-placeholder masking and
//!   wildcard matching
//! - [`memory`] - Reading call data, return data and log data out of recorded memory

pub mod binary;
pub use binary::*;

pub mod disasm;
pub use disasm::*;

pub mod memory;
pub use memory::*;

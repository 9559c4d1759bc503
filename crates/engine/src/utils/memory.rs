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

use alloy_primitives::{Bytes, U256};

/// Largest slice materialized from recorded memory.
pub const MAX_MEMORY_SLICE: usize = 1 << 24;

/// Read `length` bytes at `offset` from recorded frame memory.
///
/// Bytes beyond the recorded memory read as zero, mirroring EVM memory
/// expansion. Offsets or lengths that do not fit in memory bounds yield an
/// empty slice.
pub fn memory_slice(memory: &Bytes, offset: U256, length: U256) -> Bytes {
    let (Ok(offset), Ok(length)) = (usize::try_from(offset), usize::try_from(length)) else {
        return Bytes::new();
    };
    if length == 0 || length > MAX_MEMORY_SLICE || offset > MAX_MEMORY_SLICE {
        return Bytes::new();
    }

    let mut out = vec![0u8; length];
    if offset < memory.len() {
        let available = (memory.len() - offset).min(length);
        out[..available].copy_from_slice(&memory[offset..offset + available]);
    }
    Bytes::from(out)
}

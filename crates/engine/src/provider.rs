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

//! External state providers.
//!
//! A trace alone does not contain the code of the contracts it calls, nor the
//! values of storage slots it never touched. A session can be given providers
//! that answer these questions, typically backed by an archive node at the
//! block the transaction ran in. Both are optional: without a code provider,
//! addresses without a registered instance stay unresolved; without a storage
//! provider, untouched slots read as unknown.

use alloy_primitives::{Address, BlockNumber, Bytes, B256};
use auto_impl::auto_impl;

/// Source of deployed code for addresses that have no registered instance
#[auto_impl(&, Box, Arc)]
pub trait CodeProvider {
    /// Code deployed at `address` as of `block` (`None` means latest)
    fn code_at(&self, address: Address, block: Option<BlockNumber>) -> Option<Bytes>;
}

/// Source of storage values for slots the trace has not yet touched
#[auto_impl(&, Box, Arc)]
pub trait StorageProvider {
    /// Value of `slot` in the storage of `address` as of `block`
    fn storage_at(&self, address: Address, slot: B256, block: Option<BlockNumber>) -> Option<B256>;
}

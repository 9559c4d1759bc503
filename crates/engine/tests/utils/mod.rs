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

//! Trace and contract fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use alloy_primitives::{hex, Address, BlockNumber, Bytes, B256, U256};
use rdb_common::types::{ContextId, Instruction, SourceFile, SourceMapEntry};
use rdb_engine::{
    CodeProvider, ContextMetadata, DebuggerConfig, Registry, Session, StorageProvider,
    TransactionInfo,
};
use revm::bytecode::OpCode;

pub const SENDER: Address = Address::repeat_byte(0xee);
pub const CONTRACT: Address = Address::repeat_byte(0xaa);
pub const OTHER: Address = Address::repeat_byte(0xbb);

pub fn step(pc: usize, op: OpCode, depth: usize) -> Instruction {
    Instruction::new(pc, op.get(), depth)
}

pub fn word(n: u64) -> U256 {
    U256::from(n)
}

pub fn slot(n: u64) -> B256 {
    B256::from(U256::from(n).to_be_bytes::<32>())
}

pub fn address_word(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}

/// Byte offset and length of the first occurrence of `needle` in `text`
pub fn range_of(text: &str, needle: &str) -> (usize, usize) {
    let start = text.find(needle).unwrap_or_else(|| panic!("{needle:?} not in source"));
    (start, needle.len())
}

/// Register `code` as a context with `metadata` and `map`, deployed at `address`
pub fn deploy(
    registry: &mut Registry,
    address: Address,
    code: &[u8],
    map: Vec<SourceMapEntry>,
    metadata: ContextMetadata,
) -> ContextId {
    let context = registry.add_context(&hex::encode(code), metadata.with_source_map(map)).unwrap();
    assert_eq!(registry.add_instance(address, Bytes::copy_from_slice(code)), context);
    context
}

/// One step per byte of `code` (no push data), all at `depth`
pub fn straight_line(code: &[u8], depth: usize) -> Vec<Instruction> {
    code.iter().enumerate().map(|(pc, op)| Instruction::new(pc, *op, depth)).collect()
}

/// Session for a call from [`SENDER`] to [`CONTRACT`]
pub fn call_session(
    registry: Registry,
    sources: Vec<SourceFile>,
    steps: Vec<Instruction>,
    config: DebuggerConfig,
) -> Session {
    let builder = Session::builder(TransactionInfo::call(SENDER, CONTRACT, Bytes::new()), steps)
        .with_registry(registry)
        .with_config(config);
    sources.into_iter().fold(builder, |b, file| b.with_source(file)).build()
}

/// Chain state served to a session by its providers
#[derive(Debug, Default, Clone)]
pub struct StaticState {
    pub code: HashMap<Address, Bytes>,
    pub storage: HashMap<(Address, B256), B256>,
}

impl CodeProvider for StaticState {
    fn code_at(&self, address: Address, _block: Option<BlockNumber>) -> Option<Bytes> {
        self.code.get(&address).cloned()
    }
}

impl StorageProvider for StaticState {
    fn storage_at(&self, address: Address, slot: B256, _block: Option<BlockNumber>) -> Option<B256> {
        self.storage.get(&(address, slot)).copied()
    }
}

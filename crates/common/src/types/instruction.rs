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

use alloy_primitives::{Address, Bytes, B256, U256};
use revm::bytecode::OpCode;
use serde::{Deserialize, Serialize};

use crate::OpcodeTr;

/// One recorded execution step of a transaction trace.
///
/// The stack is stored bottom-to-top, exactly as structured-log tracers emit
/// it, so the top of the stack is the *last* element. Memory is the full
/// memory of the executing frame *before* the instruction runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    /// Program counter of the instruction within the executing code
    pub pc: usize,
    /// Raw opcode byte
    pub op: u8,
    /// Gas charged for this step
    #[serde(default)]
    pub gas_cost: u64,
    /// Call depth, starting at 1 for the transaction's initial frame
    pub depth: usize,
    /// Operand stack, bottom to top
    #[serde(default)]
    pub stack: Vec<U256>,
    /// Frame memory before executing this step
    #[serde(default)]
    pub memory: Bytes,
    /// Immediate data for `PUSHn` instructions, when the tracer records it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_data: Option<Bytes>,
    /// Call data of a call/create issued by this step, when the tracer records it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_data: Option<Bytes>,
    /// Error reported by the tracer for this step (e.g. out of gas)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Instruction {
    /// Create a new instruction at `pc` and call `depth` with an empty stack
    pub fn new(pc: usize, op: u8, depth: usize) -> Self {
        Self { pc, op, depth, ..Default::default() }
    }

    /// Replace the operand stack (bottom to top)
    pub fn with_stack(mut self, stack: impl IntoIterator<Item = U256>) -> Self {
        self.stack = stack.into_iter().collect();
        self
    }

    /// Replace the frame memory
    pub fn with_memory(mut self, memory: impl Into<Bytes>) -> Self {
        self.memory = memory.into();
        self
    }

    /// Attach explicit call data for a call/create step
    pub fn with_call_data(mut self, call_data: impl Into<Bytes>) -> Self {
        self.call_data = Some(call_data.into());
        self
    }

    /// Attach a tracer error to this step
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Decoded opcode, or `None` for an undefined byte
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::new(self.op)
    }

    /// Human-readable opcode mnemonic
    pub fn mnemonic(&self) -> &'static str {
        self.opcode().map(|op| op.as_str()).unwrap_or("INVALID")
    }

    /// Stack value `n` positions below the top (0 is the top)
    pub fn stack_peek(&self, n: usize) -> Option<U256> {
        self.stack.len().checked_sub(n + 1).map(|i| self.stack[i])
    }

    /// Stack value `n` positions below the top, as a 32-byte word
    pub fn stack_word(&self, n: usize) -> Option<B256> {
        self.stack_peek(n).map(|v| B256::from(v.to_be_bytes::<32>()))
    }

    /// Stack value `n` positions below the top, as an address
    pub fn stack_address(&self, n: usize) -> Option<Address> {
        self.stack_word(n).map(Address::from_word)
    }

    /// Number of stack operands this opcode consumes
    pub fn stack_inputs(&self) -> usize {
        self.opcode().map(|op| op.info().inputs() as usize).unwrap_or_default()
    }

    /// Whether this step is a message call
    pub fn is_message_call(&self) -> bool {
        self.opcode().is_some_and(|op| op.is_message_call())
    }

    /// Whether this step is a contract creation
    pub fn is_create(&self) -> bool {
        self.opcode().is_some_and(|op| op.is_create())
    }

    /// Whether this step opens a new frame
    pub fn is_call(&self) -> bool {
        self.is_message_call() || self.is_create()
    }

    /// Whether this step terminates its frame. Undefined opcodes always halt.
    pub fn is_halt(&self) -> bool {
        self.opcode().is_none_or(|op| op.is_halt())
    }

    /// Whether this step terminates its frame unsuccessfully, either through
    /// `REVERT`/`INVALID`, an undefined opcode, or a tracer-reported error
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.opcode().is_none_or(|op| op.is_failure())
    }
}

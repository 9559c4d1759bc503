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

//! Recorded execution trace with a cursor.
//!
//! The [`TraceStore`] owns the ordered list of recorded [`Instruction`]s and a
//! cursor into it. The cursor only moves forward; [`TraceStore::reset`] rewinds
//! it to the beginning. Advancing past the last instruction does not move the
//! cursor, it sets the `finished` flag instead, so the final instruction stays
//! inspectable after the trace is exhausted.

use std::collections::HashMap;

use alloy_primitives::Address;
use rdb_common::types::Instruction;
use tracing::debug;

/// Ordered list of recorded instructions with a forward-only cursor.
#[derive(Debug, Clone, Default)]
pub struct TraceStore {
    steps: Vec<Instruction>,
    index: usize,
    finished: bool,
    /// Address produced by each `CREATE`/`CREATE2` step, keyed by step index
    created: HashMap<usize, Address>,
}

impl TraceStore {
    /// Create a store over `steps` with the cursor at the first step.
    ///
    /// An empty trace is finished from the start.
    pub fn new(steps: Vec<Instruction>) -> Self {
        let created = discover_created_addresses(&steps);
        debug!(steps = steps.len(), creations = created.len(), "Loaded trace");
        let finished = steps.is_empty();
        Self { steps, index: 0, finished, created }
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the trace has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Cursor position
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the trace has been exhausted
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// All steps
    pub fn steps(&self) -> &[Instruction] {
        &self.steps
    }

    /// Step under the cursor, `None` only for an empty trace
    pub fn current(&self) -> Option<&Instruction> {
        self.steps.get(self.index)
    }

    /// Step after the cursor
    pub fn next(&self) -> Option<&Instruction> {
        self.steps.get(self.index + 1)
    }

    /// Step at an arbitrary index
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.steps.get(index)
    }

    /// Address created by the `CREATE`/`CREATE2` at `index`, as pushed onto the
    /// creator's stack when control returned to it. `None` if the creation
    /// failed or the trace ends before control returned.
    pub fn created_address(&self, index: usize) -> Option<Address> {
        self.created.get(&index).copied()
    }

    /// Move the cursor forward by one step.
    ///
    /// Returns `false` if the trace was already finished.
    pub fn advance(&mut self) -> bool {
        if self.finished {
            return false;
        }
        if self.index + 1 < self.steps.len() {
            self.index += 1;
        } else {
            self.finished = true;
        }
        true
    }

    /// Rewind the cursor to the first step
    pub fn reset(&mut self) {
        self.index = 0;
        self.finished = self.steps.is_empty();
    }
}

/// For every creation step, find the first later step executing back at the
/// creator's depth and read the address it left on top of the stack.
fn discover_created_addresses(steps: &[Instruction]) -> HashMap<usize, Address> {
    let mut created = HashMap::new();
    let mut pending: Vec<(usize, usize)> = Vec::new();

    for (j, step) in steps.iter().enumerate() {
        while let Some(&(i, depth)) = pending.last() {
            if step.depth > depth {
                break;
            }
            pending.pop();
            if step.depth == depth {
                if let Some(address) = step.stack_address(0).filter(|a| !a.is_zero()) {
                    created.insert(i, address);
                }
            }
        }

        if step.is_create() {
            pending.push((j, step.depth));
        }
    }

    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use revm::bytecode::OpCode;

    fn step(pc: usize, op: OpCode, depth: usize) -> Instruction {
        Instruction::new(pc, op.get(), depth)
    }

    fn address_word(address: Address) -> U256 {
        U256::from_be_slice(address.as_slice())
    }

    #[test]
    fn test_cursor_and_finish() {
        let mut trace = TraceStore::new(vec![
            step(0, OpCode::PUSH0, 1),
            step(1, OpCode::POP, 1),
            step(2, OpCode::STOP, 1),
        ]);
        assert_eq!(trace.index(), 0);
        assert!(!trace.is_finished());

        assert!(trace.advance());
        assert!(trace.advance());
        assert_eq!(trace.index(), 2);
        assert!(!trace.is_finished());

        // Exhausting the trace keeps the cursor on the last step
        assert!(trace.advance());
        assert!(trace.is_finished());
        assert_eq!(trace.index(), 2);
        assert_eq!(trace.current().map(|s| s.pc), Some(2));
        assert!(!trace.advance());

        trace.reset();
        assert_eq!(trace.index(), 0);
        assert!(!trace.is_finished());
    }

    #[test]
    fn test_empty_trace_is_finished() {
        let mut trace = TraceStore::new(vec![]);
        assert!(trace.is_finished());
        assert!(trace.current().is_none());
        assert!(!trace.advance());
    }

    #[test]
    fn test_created_address_discovery() {
        let created = Address::repeat_byte(0xcc);
        let trace = TraceStore::new(vec![
            step(0, OpCode::CREATE, 1),
            step(0, OpCode::PUSH0, 2),
            step(1, OpCode::CREATE, 2),
            // nested creation fails immediately: zero is pushed
            step(2, OpCode::RETURN, 2).with_stack([U256::ZERO]),
            step(1, OpCode::POP, 1).with_stack([address_word(created)]),
        ]);

        assert_eq!(trace.created_address(0), Some(created));
        assert_eq!(trace.created_address(2), None);
        assert_eq!(trace.created_address(1), None);
    }

    #[test]
    fn test_creation_without_return_has_no_address() {
        let trace = TraceStore::new(vec![step(0, OpCode::CREATE2, 1), step(0, OpCode::PUSH0, 2)]);
        assert_eq!(trace.created_address(0), None);
    }
}

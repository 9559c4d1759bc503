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

//! EVM bytecode disassembly.
//!
//! Source maps describe instructions, not bytes: entry *k* belongs to the
//! *k*-th instruction. Disassembly recovers the instruction boundaries
//! (skipping `PUSHn` immediates) so that each program counter can be paired
//! with its source-map entry.

use alloy_primitives::Bytes;
use revm::bytecode::opcode::OpCode;

const PUSH1: u8 = 0x60;
const PUSH32: u8 = 0x7f;

/// A single disassembled instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisassemblyInstruction {
    /// Program counter offset where this instruction starts
    pub pc: usize,
    /// Raw opcode byte
    pub op: u8,
    /// Immediate bytes of a `PUSHn`, zero-padded if the code is truncated
    pub push_data: Vec<u8>,
}

impl DisassemblyInstruction {
    /// Decoded opcode, `None` for undefined bytes (e.g. embedded metadata)
    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::new(self.op)
    }

    /// Check if this instruction is a `PUSHn`
    pub fn is_push(&self) -> bool {
        (PUSH1..=PUSH32).contains(&self.op)
    }

    /// Total instruction size in bytes (opcode + immediate data)
    pub fn size(&self) -> usize {
        1 + self.push_data.len()
    }
}

/// Disassemble EVM bytecode into its instructions
///
/// Undefined opcode bytes are kept as one-byte instructions, so trailing
/// metadata and data sections still consume source-map entries positionally.
pub fn disassemble(bytecode: &Bytes) -> Vec<DisassemblyInstruction> {
    let mut instructions = Vec::new();
    let mut pc = 0;

    while pc < bytecode.len() {
        let op = bytecode[pc];
        let push_data = if (PUSH1..=PUSH32).contains(&op) {
            let size = (op - PUSH1 + 1) as usize;
            (pc + 1..pc + 1 + size).map(|i| bytecode.get(i).copied().unwrap_or_default()).collect()
        } else {
            Vec::new()
        };

        let inst = DisassemblyInstruction { pc, op, push_data };
        pc += inst.size();
        instructions.push(inst);
    }

    instructions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_skips_push_immediates() {
        let bytecode = Bytes::from(vec![
            0x60, 0x42, // PUSH1 0x42
            0x61, 0x12, 0x34, // PUSH2 0x1234
            0x80, // DUP1
        ]);
        let result = disassemble(&bytecode);

        assert_eq!(result.iter().map(|i| i.pc).collect::<Vec<_>>(), vec![0, 2, 5]);
        assert_eq!(result[0].push_data, vec![0x42]);
        assert_eq!(result[1].size(), 3);
        assert!(!result[2].is_push());
        assert_eq!(result[1].opcode(), Some(OpCode::PUSH2));
    }

    #[test]
    fn test_truncated_push_is_padded() {
        let result = disassemble(&Bytes::from(vec![0x61, 0x12]));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].push_data, vec![0x12, 0x00]);
    }

    #[test]
    fn test_undefined_bytes_are_single_instructions() {
        let result = disassemble(&Bytes::from(vec![0x0c, 0xa2, 0x00]));
        assert_eq!(result.len(), 3);
        assert!(result[0].opcode().is_none());
        assert_eq!(result[2].opcode(), Some(OpCode::STOP));
    }
}

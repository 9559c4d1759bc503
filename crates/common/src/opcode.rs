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

use revm::bytecode::OpCode;

/// Extended trait for classifying EVM opcodes while replaying a recorded trace
///
/// The debugger never executes bytecode; it only observes the opcode of each
/// recorded step. These predicates answer the questions the replay engine
/// asks about a step: does it open a new frame, does it close one, does it
/// touch storage, and how many stack operands does it consume.
pub trait OpcodeTr {
    /// Check if this opcode is a message call (`CALL`, `CALLCODE`,
    /// `DELEGATECALL`, `STATICCALL`)
    ///
    /// # Example
    /// ```rust
    /// use revm::bytecode::OpCode;
    /// use rdb_common::OpcodeTr;
    ///
    /// assert!(OpCode::DELEGATECALL.is_message_call());
    /// assert!(!OpCode::CREATE.is_message_call());
    /// ```
    fn is_message_call(&self) -> bool;

    /// Check if this opcode deploys a contract (`CREATE`, `CREATE2`)
    fn is_create(&self) -> bool;

    /// Check if this opcode opens a new call frame, i.e. is either a message
    /// call or a contract creation
    fn is_call(&self) -> bool {
        self.is_message_call() || self.is_create()
    }

    /// Check if this opcode normally terminates the current call frame
    ///
    /// Returns `true` for `STOP`, `RETURN`, `REVERT`, `INVALID` and
    /// `SELFDESTRUCT`.
    fn is_halt(&self) -> bool;

    /// Check if this opcode terminates the frame unsuccessfully
    /// (`REVERT` or the designated `INVALID` opcode)
    fn is_failure(&self) -> bool;

    /// Check if this opcode is `JUMP` or `JUMPI`
    fn is_jump(&self) -> bool;

    /// Number of topics emitted by this opcode if it is one of `LOG0..=LOG4`
    fn log_topic_count(&self) -> Option<usize>;

    /// Check if this opcode modifies persistent contract storage
    fn modifies_storage(&self) -> bool;
}

impl OpcodeTr for OpCode {
    fn is_message_call(&self) -> bool {
        matches!(*self, Self::CALL | Self::CALLCODE | Self::DELEGATECALL | Self::STATICCALL)
    }

    fn is_create(&self) -> bool {
        matches!(*self, Self::CREATE | Self::CREATE2)
    }

    fn is_halt(&self) -> bool {
        matches!(
            *self,
            Self::STOP | Self::RETURN | Self::REVERT | Self::INVALID | Self::SELFDESTRUCT
        )
    }

    fn is_failure(&self) -> bool {
        matches!(*self, Self::REVERT | Self::INVALID)
    }

    fn is_jump(&self) -> bool {
        matches!(*self, Self::JUMP | Self::JUMPI)
    }

    fn log_topic_count(&self) -> Option<usize> {
        match *self {
            Self::LOG0 => Some(0),
            Self::LOG1 => Some(1),
            Self::LOG2 => Some(2),
            Self::LOG3 => Some(3),
            Self::LOG4 => Some(4),
            _ => None,
        }
    }

    fn modifies_storage(&self) -> bool {
        matches!(*self, Self::SSTORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_opening_opcodes() {
        for op in [OpCode::CALL, OpCode::CALLCODE, OpCode::DELEGATECALL, OpCode::STATICCALL] {
            assert!(op.is_message_call(), "{op} should be a message call");
            assert!(op.is_call());
            assert!(!op.is_create());
        }
        for op in [OpCode::CREATE, OpCode::CREATE2] {
            assert!(op.is_create());
            assert!(op.is_call());
            assert!(!op.is_message_call());
        }
        assert!(!OpCode::ADD.is_call());
    }

    #[test]
    fn test_halting_opcodes() {
        assert!(OpCode::STOP.is_halt());
        assert!(OpCode::RETURN.is_halt());
        assert!(OpCode::SELFDESTRUCT.is_halt());
        assert!(OpCode::REVERT.is_failure());
        assert!(OpCode::INVALID.is_failure());
        assert!(!OpCode::RETURN.is_failure());
        assert!(!OpCode::JUMP.is_halt());
    }

    #[test]
    fn test_log_topics() {
        assert_eq!(OpCode::LOG0.log_topic_count(), Some(0));
        assert_eq!(OpCode::LOG4.log_topic_count(), Some(4));
        assert_eq!(OpCode::SSTORE.log_topic_count(), None);
        assert!(OpCode::SSTORE.modifies_storage());
        assert!(!OpCode::SLOAD.modifies_storage());
    }
}

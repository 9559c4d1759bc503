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

//! Classification of recorded steps into state transitions.
//!
//! Each step, together with the step after it, is classified into at most one
//! [`Effect`]. The effect set is closed: storage reconstruction matches on it
//! exhaustively, and everything that is not listed is a no-op.
//!
//! Termination is detected from the trace shape as well as from the opcode: a
//! step whose successor runs at a shallower depth ended its frame, even if the
//! opcode itself is not a halting one (out of gas, stack underflow, ...).

use alloy_primitives::{Address, Bytes, B256, U256};
use rdb_common::{
    types::{CallScheme, Instruction},
    OpcodeTr,
};
use revm::bytecode::OpCode;

use crate::utils::memory_slice;

/// Message-call flavour of an [`Effect::Call`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageScheme {
    /// `CALL`
    Call,
    /// `CALLCODE`
    CallCode,
    /// `DELEGATECALL`
    DelegateCall,
    /// `STATICCALL`
    StaticCall,
}

impl From<MessageScheme> for CallScheme {
    fn from(scheme: MessageScheme) -> Self {
        match scheme {
            MessageScheme::Call => Self::Call,
            MessageScheme::CallCode => Self::CallCode,
            MessageScheme::DelegateCall => Self::DelegateCall,
            MessageScheme::StaticCall => Self::StaticCall,
        }
    }
}

/// A state transition produced by one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Message call to `address`
    Call {
        /// Call flavour
        scheme: MessageScheme,
        /// Callee (code address)
        address: Address,
        /// Value transferred; zero for delegate and static calls
        value: U256,
        /// Call data
        input: Bytes,
        /// The call produced no steps of its own
        instantaneous: bool,
    },
    /// Contract creation
    Create {
        /// Address of the new contract, when known
        address: Option<Address>,
        /// Value endowed
        value: U256,
        /// Init code
        init_code: Bytes,
        /// `CREATE2` salt
        salt: Option<B256>,
        /// The creation produced no steps of its own
        instantaneous: bool,
    },
    /// Write to the executing account's storage
    Store {
        /// Slot
        slot: B256,
        /// New value
        value: B256,
    },
    /// Read of the executing account's storage
    Load {
        /// Slot
        slot: B256,
        /// Value read, taken from the next step's stack top when available
        value: Option<B256>,
    },
    /// Successful end of the current frame
    Return {
        /// Return data (runtime code for a creation)
        data: Bytes,
        /// Beneficiary if the frame ended with `SELFDESTRUCT`
        beneficiary: Option<Address>,
    },
    /// Unsuccessful end of the current frame
    Fail {
        /// Revert data
        data: Bytes,
        /// Tracer-reported error, if any
        error: Option<String>,
        /// Whether the frame ended with an explicit `REVERT`
        reverted: bool,
    },
    /// Emitted event; not a storage transition
    Log {
        /// Topics
        topics: Vec<B256>,
        /// Data
        data: Bytes,
    },
}

impl Effect {
    /// Whether this effect opens a frame that has steps in the trace
    pub fn pushes_frame(&self) -> bool {
        matches!(
            self,
            Self::Call { instantaneous: false, .. } | Self::Create { instantaneous: false, .. }
        )
    }

    /// Whether this effect closes the current frame
    pub fn pops_frame(&self) -> bool {
        matches!(self, Self::Return { .. } | Self::Fail { .. })
    }
}

/// Classify `step`, whose successor in the trace is `next`.
///
/// Addresses of created contracts are not known from the step alone; callers
/// fill in [`Effect::Create::address`] from the trace.
pub fn classify(step: &Instruction, next: Option<&Instruction>) -> Option<Effect> {
    let returns_to_caller = next.is_some_and(|n| n.depth < step.depth);

    let Some(op) = step.opcode() else {
        return Some(fail(step, false));
    };

    if step.error.is_some() && (returns_to_caller || !op.is_call()) {
        return Some(fail(step, op == OpCode::REVERT));
    }

    let effect = match op {
        OpCode::CALL | OpCode::CALLCODE => {
            call(step, next, if op == OpCode::CALL { MessageScheme::Call } else { MessageScheme::CallCode })
        }
        OpCode::DELEGATECALL => call(step, next, MessageScheme::DelegateCall),
        OpCode::STATICCALL => call(step, next, MessageScheme::StaticCall),
        OpCode::CREATE | OpCode::CREATE2 => create(step, next, op == OpCode::CREATE2),
        OpCode::SSTORE => Some(Effect::Store { slot: step.stack_word(0)?, value: step.stack_word(1)? }),
        OpCode::SLOAD => Some(Effect::Load {
            slot: step.stack_word(0)?,
            value: next.filter(|n| n.depth == step.depth).and_then(|n| n.stack_word(0)),
        }),
        OpCode::STOP => Some(Effect::Return { data: Bytes::new(), beneficiary: None }),
        OpCode::RETURN => Some(Effect::Return { data: frame_output(step), beneficiary: None }),
        OpCode::SELFDESTRUCT => {
            Some(Effect::Return { data: Bytes::new(), beneficiary: step.stack_address(0) })
        }
        OpCode::REVERT => Some(Effect::Fail { data: frame_output(step), error: None, reverted: true }),
        OpCode::INVALID => Some(fail(step, false)),
        _ => match op.log_topic_count() {
            Some(count) => {
                let data = memory_slice(&step.memory, step.stack_peek(0)?, step.stack_peek(1)?);
                let topics = (0..count).map(|i| step.stack_word(2 + i)).collect::<Option<_>>()?;
                Some(Effect::Log { topics, data })
            }
            None => None,
        },
    };

    // A non-halting step followed by a shallower one ended its frame exceptionally.
    if returns_to_caller && !op.is_halt() {
        return Some(fail(step, false));
    }

    effect
}

fn fail(step: &Instruction, reverted: bool) -> Effect {
    let error = step.error.clone().or_else(|| Some("exceptional halt".to_string()));
    let data = if reverted { frame_output(step) } else { Bytes::new() };
    Effect::Fail { data, error, reverted }
}

/// Memory range named by the two topmost stack operands (`RETURN`, `REVERT`)
fn frame_output(step: &Instruction) -> Bytes {
    match (step.stack_peek(0), step.stack_peek(1)) {
        (Some(offset), Some(length)) => memory_slice(&step.memory, offset, length),
        _ => Bytes::new(),
    }
}

/// Whether the step after a call/create runs inside the new frame
fn enters_frame(step: &Instruction, next: Option<&Instruction>) -> bool {
    next.is_some_and(|n| n.depth > step.depth)
}

fn call(step: &Instruction, next: Option<&Instruction>, scheme: MessageScheme) -> Option<Effect> {
    let address = step.stack_address(1)?;
    let (value, args_at) = match scheme {
        MessageScheme::Call | MessageScheme::CallCode => (step.stack_peek(2)?, 3),
        MessageScheme::DelegateCall | MessageScheme::StaticCall => (U256::ZERO, 2),
    };
    let input = match &step.call_data {
        Some(data) => data.clone(),
        None => memory_slice(&step.memory, step.stack_peek(args_at)?, step.stack_peek(args_at + 1)?),
    };

    Some(Effect::Call { scheme, address, value, input, instantaneous: !enters_frame(step, next) })
}

fn create(step: &Instruction, next: Option<&Instruction>, create2: bool) -> Option<Effect> {
    let value = step.stack_peek(0)?;
    let init_code = match &step.call_data {
        Some(data) => data.clone(),
        None => memory_slice(&step.memory, step.stack_peek(1)?, step.stack_peek(2)?),
    };
    let salt = if create2 { Some(step.stack_word(3)?) } else { None };

    Some(Effect::Create {
        address: None,
        value,
        init_code,
        salt,
        instantaneous: !enters_frame(step, next),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(op: OpCode, depth: usize) -> Instruction {
        Instruction::new(0, op.get(), depth)
    }

    fn word(address: Address) -> U256 {
        U256::from_be_slice(address.as_slice())
    }

    fn b256(n: u64) -> B256 {
        B256::from(U256::from(n).to_be_bytes::<32>())
    }

    #[test]
    fn test_call_reads_operands_and_memory() {
        let callee = Address::repeat_byte(0xbb);
        // stack bottom..top: retLen retOff argsLen argsOff value addr gas
        let call = step(OpCode::CALL, 1)
            .with_stack([0u64, 0, 2, 1, 5].map(U256::from).into_iter().chain([word(callee), U256::from(1000)]))
            .with_memory(vec![0xaa, 0xbb, 0xcc]);

        let effect = classify(&call, Some(&step(OpCode::PUSH0, 2))).unwrap();
        assert_eq!(
            effect,
            Effect::Call {
                scheme: MessageScheme::Call,
                address: callee,
                value: U256::from(5),
                input: Bytes::from(vec![0xbb, 0xcc]),
                instantaneous: false,
            }
        );
        assert!(effect.pushes_frame());
    }

    #[test]
    fn test_call_without_deeper_successor_is_instantaneous() {
        let callee = Address::repeat_byte(0x01);
        // stack bottom..top: retLen retOff argsLen argsOff addr gas
        let call = step(OpCode::STATICCALL, 1)
            .with_stack([0u64, 0, 0, 0].map(U256::from).into_iter().chain([word(callee), U256::from(1)]));

        let Some(Effect::Call { instantaneous, value, scheme, .. }) =
            classify(&call, Some(&step(OpCode::POP, 1)))
        else {
            panic!("expected a call");
        };
        assert!(instantaneous);
        assert_eq!(value, U256::ZERO);
        assert_eq!(scheme, MessageScheme::StaticCall);

        // A call that is the last step of the trace is instantaneous as well
        assert!(matches!(classify(&call, None), Some(Effect::Call { instantaneous: true, .. })));
    }

    #[test]
    fn test_explicit_call_data_wins_over_memory() {
        let call = step(OpCode::DELEGATECALL, 1)
            .with_stack([0u64, 0, 4, 0, 7, 1].map(U256::from))
            .with_call_data(vec![1, 2, 3, 4, 5]);
        let Some(Effect::Call { input, .. }) = classify(&call, None) else { panic!("expected a call") };
        assert_eq!(input.len(), 5);
    }

    #[test]
    fn test_storage_effects() {
        // stack bottom..top: value slot
        let store = step(OpCode::SSTORE, 1).with_stack([U256::from(42), U256::from(1)]);
        assert_eq!(classify(&store, None), Some(Effect::Store { slot: b256(1), value: b256(42) }));

        let load = step(OpCode::SLOAD, 1).with_stack([U256::from(1)]);
        let after = step(OpCode::POP, 1).with_stack([U256::from(42)]);
        assert_eq!(
            classify(&load, Some(&after)),
            Some(Effect::Load { slot: b256(1), value: Some(b256(42)) })
        );
        assert_eq!(classify(&load, None), Some(Effect::Load { slot: b256(1), value: None }));
    }

    #[test]
    fn test_frame_endings() {
        let ret = step(OpCode::RETURN, 2)
            .with_stack([U256::from(2), U256::from(0)])
            .with_memory(vec![0xde, 0xad, 0xbe]);
        assert_eq!(
            classify(&ret, None),
            Some(Effect::Return { data: Bytes::from(vec![0xde, 0xad]), beneficiary: None })
        );

        let revert = step(OpCode::REVERT, 2).with_stack([U256::from(0), U256::from(0)]);
        assert!(matches!(classify(&revert, None), Some(Effect::Fail { reverted: true, .. })));
        assert!(matches!(classify(&step(OpCode::INVALID, 2), None), Some(Effect::Fail { .. })));
        assert!(matches!(
            classify(&step(OpCode::STOP, 1), None),
            Some(Effect::Return { beneficiary: None, .. })
        ));

        let beneficiary = Address::repeat_byte(0x77);
        let destruct = step(OpCode::SELFDESTRUCT, 2).with_stack([word(beneficiary)]);
        assert_eq!(
            classify(&destruct, None),
            Some(Effect::Return { data: Bytes::new(), beneficiary: Some(beneficiary) })
        );
    }

    #[test]
    fn test_implicit_exceptional_halt() {
        let add = step(OpCode::ADD, 2).with_stack([U256::from(1), U256::from(2)]);
        let back_in_caller = step(OpCode::POP, 1);

        let Some(Effect::Fail { error, reverted, .. }) = classify(&add, Some(&back_in_caller)) else {
            panic!("expected an exceptional halt");
        };
        assert!(!reverted);
        assert!(error.is_some());

        // The same step followed by a step at its own depth is a no-op
        assert_eq!(classify(&add, Some(&step(OpCode::POP, 2))), None);
    }

    #[test]
    fn test_tracer_error_is_failure() {
        let sstore = step(OpCode::SSTORE, 1)
            .with_stack([U256::from(1), U256::from(1)])
            .with_error("out of gas");
        assert_eq!(
            classify(&sstore, None),
            Some(Effect::Fail { data: Bytes::new(), error: Some("out of gas".into()), reverted: false })
        );
    }

    #[test]
    fn test_undefined_opcode_fails() {
        assert!(matches!(classify(&Instruction::new(0, 0x0c, 1), None), Some(Effect::Fail { .. })));
    }

    #[test]
    fn test_log_effect() {
        let topic = U256::from(0xfeed);
        // stack bottom..top: topic0 length offset
        let log = step(OpCode::LOG1, 1)
            .with_stack([topic, U256::from(1), U256::from(0)])
            .with_memory(vec![0x99]);
        assert_eq!(
            classify(&log, None),
            Some(Effect::Log { topics: vec![B256::from(topic.to_be_bytes::<32>())], data: Bytes::from(vec![0x99]) })
        );
    }

    #[test]
    fn test_non_state_opcodes() {
        assert_eq!(classify(&step(OpCode::ADD, 1), Some(&step(OpCode::POP, 1))), None);
        assert_eq!(classify(&step(OpCode::JUMP, 1), Some(&step(OpCode::JUMPDEST, 1))), None);
    }
}

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

//! Storage reconstruction.
//!
//! The Codex keeps one frame per active call. Each frame holds its own view of
//! every account's storage, as far as the trace has revealed it. The views are
//! persistent maps, so opening a frame shares the parent's view instead of
//! copying it.
//!
//! * A call or create pushes a frame whose view starts as the caller's.
//! * A store writes only the top frame's view of the storage owner.
//! * A load of a slot the view does not yet know back-fills every frame.
//! * A successful return commits the callee's view into the caller's.
//! * A failure discards the callee's view.
//!
//! The bottom frame is never popped, so the Codex is never empty.

use alloy_primitives::{Address, Bytes, B256, U256};
use itertools::Itertools;
use rdb_common::types::{ContextId, StorageValue};
use rpds::HashTrieMapSync;
use tracing::{debug, trace};

use crate::effect::{Effect, MessageScheme};

/// One account's storage as far as it is known
pub type StoragePage = HashTrieMapSync<B256, B256>;

type Pages = HashTrieMapSync<Address, StoragePage>;

/// One active call frame
#[derive(Debug, Clone)]
pub struct CodexFrame {
    /// Address whose code runs, `None` for a creation whose address is unknown
    pub address: Option<Address>,
    /// Account whose storage the frame reads and writes
    pub storage_address: Address,
    /// Context of the running code
    pub context: Option<ContextId>,
    /// `msg.sender` of the frame
    pub sender: Address,
    /// `msg.value` of the frame
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// Whether the frame runs init code
    pub is_create: bool,
    pages: Pages,
}

impl CodexFrame {
    /// A frame with no known storage
    pub fn new(address: Option<Address>, storage_address: Address) -> Self {
        Self {
            address,
            storage_address,
            context: None,
            sender: Address::ZERO,
            value: U256::ZERO,
            input: Bytes::new(),
            is_create: false,
            pages: Pages::new_sync(),
        }
    }

    /// Known value of `slot` in the storage of `address`
    pub fn storage(&self, address: &Address, slot: &B256) -> Option<B256> {
        self.pages.get(address)?.get(slot).copied()
    }

    /// Every known slot of `address`, sorted by slot
    pub fn page(&self, address: &Address) -> Option<Vec<(B256, B256)>> {
        Some(self.pages.get(address)?.iter().map(|(k, v)| (*k, *v)).sorted().collect())
    }

    /// Accounts with at least one known slot
    pub fn accounts(&self) -> Vec<Address> {
        self.pages.keys().copied().sorted().collect()
    }

    fn write(&mut self, address: Address, slot: B256, value: B256) {
        let page = self.pages.get(&address).cloned().unwrap_or_else(StoragePage::new_sync);
        self.pages.insert_mut(address, page.insert(slot, value));
    }

    fn child(&self) -> Self {
        Self { pages: self.pages.clone(), ..Self::new(None, self.storage_address) }
    }
}

/// Stack of storage views, one per active call
#[derive(Debug, Clone)]
pub struct Codex {
    root: CodexFrame,
    frames: Vec<CodexFrame>,
}

impl Codex {
    /// Create a Codex whose bottom frame is `root`
    pub fn new(root: CodexFrame) -> Self {
        let root = CodexFrame { pages: Pages::new_sync(), ..root };
        Self { frames: vec![root.clone()], root }
    }

    /// Drop every frame and start again from a fresh bottom frame
    pub fn reset(&mut self) {
        self.frames = vec![self.root.clone()];
    }

    /// Number of active frames, at least 1
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// All frames, bottom first
    pub fn frames(&self) -> &[CodexFrame] {
        &self.frames
    }

    /// Top frame
    pub fn current(&self) -> &CodexFrame {
        self.frames.last().unwrap_or(&self.root)
    }

    /// Value of `slot` of `address` as seen by the top frame
    pub fn storage_at(&self, address: &Address, slot: &B256) -> StorageValue {
        self.current().storage(address, slot).into()
    }

    /// Apply one effect. `callee_context` is the context of the code entered
    /// by a call or create. Returns the frame popped by a return or failure.
    pub fn apply(&mut self, effect: &Effect, callee_context: Option<ContextId>) -> Option<CodexFrame> {
        match effect {
            Effect::Call { instantaneous: true, .. } | Effect::Create { instantaneous: true, .. } => None,
            Effect::Call { scheme, address, value, input, .. } => {
                let caller = self.current();
                let mut frame = caller.child();
                frame.address = Some(*address);
                frame.context = callee_context;
                frame.input = input.clone();
                match scheme {
                    MessageScheme::Call | MessageScheme::StaticCall => {
                        frame.storage_address = *address;
                        frame.sender = caller.storage_address;
                        frame.value = *value;
                    }
                    MessageScheme::CallCode => {
                        frame.sender = caller.storage_address;
                        frame.value = *value;
                    }
                    MessageScheme::DelegateCall => {
                        frame.sender = caller.sender;
                        frame.value = caller.value;
                    }
                }
                trace!(depth = self.frames.len() + 1, storage = %frame.storage_address, "Codex call");
                self.frames.push(frame);
                None
            }
            Effect::Create { address, value, init_code, .. } => {
                let caller = self.current();
                let mut frame = caller.child();
                if address.is_none() {
                    debug!("Creation without a known address; its storage is tracked under 0x0");
                }
                frame.address = *address;
                frame.storage_address = address.unwrap_or_default();
                frame.sender = caller.storage_address;
                frame.value = *value;
                frame.input = init_code.clone();
                frame.context = callee_context;
                frame.is_create = true;
                self.frames.push(frame);
                None
            }
            Effect::Store { slot, value } => {
                let top = self.top_mut();
                let owner = top.storage_address;
                top.write(owner, *slot, *value);
                None
            }
            Effect::Load { slot, value } => {
                let owner = self.current().storage_address;
                // Only a first touch reveals the value from before the transaction.
                if self.current().storage(&owner, slot).is_some() {
                    return None;
                }
                if let Some(value) = value {
                    self.backfill(owner, *slot, *value);
                }
                None
            }
            Effect::Return { .. } => {
                if self.frames.len() < 2 {
                    return None;
                }
                let popped = self.frames.pop()?;
                self.top_mut().pages = popped.pages.clone();
                Some(popped)
            }
            Effect::Fail { .. } => {
                if self.frames.len() < 2 {
                    return None;
                }
                self.frames.pop()
            }
            Effect::Log { .. } => None,
        }
    }

    /// Record that `slot` of `address` held `value` before any write the
    /// trace has shown so far. Frames that already know the slot keep
    /// their value.
    pub fn backfill(&mut self, address: Address, slot: B256, value: B256) {
        for frame in &mut self.frames {
            if frame.storage(&address, &slot).is_none() {
                frame.write(address, slot, value);
            }
        }
    }

    fn top_mut(&mut self) -> &mut CodexFrame {
        if self.frames.is_empty() {
            self.frames.push(self.root.clone());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: Address = Address::repeat_byte(0xaa);
    const B: Address = Address::repeat_byte(0xbb);
    const L: Address = Address::repeat_byte(0x11);

    fn word(n: u64) -> B256 {
        B256::from(U256::from(n).to_be_bytes::<32>())
    }

    fn codex() -> Codex {
        let mut root = CodexFrame::new(Some(A), A);
        root.sender = Address::repeat_byte(0xee);
        root.value = U256::from(7);
        Codex::new(root)
    }

    fn call(scheme: MessageScheme, address: Address) -> Effect {
        Effect::Call { scheme, address, value: U256::from(1), input: Bytes::new(), instantaneous: false }
    }

    fn ret() -> Effect {
        Effect::Return { data: Bytes::new(), beneficiary: None }
    }

    fn fail() -> Effect {
        Effect::Fail { data: Bytes::new(), error: None, reverted: true }
    }

    #[test]
    fn test_write_in_callee_is_committed_on_return() {
        let mut codex = codex();
        codex.apply(&call(MessageScheme::Call, B), None);
        codex.apply(&Effect::Store { slot: word(1), value: word(42) }, None);

        assert_eq!(codex.frames()[1].storage(&B, &word(1)), Some(word(42)));
        assert_eq!(codex.frames()[0].storage(&B, &word(1)), None);

        let popped = codex.apply(&ret(), None).unwrap();
        assert_eq!(popped.storage_address, B);
        assert_eq!(codex.depth(), 1);
        assert_eq!(codex.storage_at(&B, &word(1)), StorageValue::Known(word(42)));
    }

    #[test]
    fn test_failure_discards_callee_writes() {
        let mut codex = codex();
        codex.apply(&Effect::Store { slot: word(1), value: word(1) }, None);
        codex.apply(&call(MessageScheme::Call, B), None);
        codex.apply(&Effect::Store { slot: word(2), value: word(2) }, None);
        codex.apply(&fail(), None);

        assert_eq!(codex.depth(), 1);
        assert_eq!(codex.storage_at(&A, &word(1)), StorageValue::Known(word(1)));
        assert_eq!(codex.storage_at(&B, &word(2)), StorageValue::Unknown);
    }

    #[test]
    fn test_bottom_frame_is_never_popped() {
        let mut codex = codex();
        assert!(codex.apply(&ret(), None).is_none());
        assert!(codex.apply(&fail(), None).is_none());
        assert_eq!(codex.depth(), 1);
        assert_eq!(codex.current().storage_address, A);
    }

    #[test]
    fn test_delegate_call_inherits_storage_sender_and_value() {
        let mut codex = codex();
        codex.apply(&call(MessageScheme::DelegateCall, L), Some(ContextId::repeat_byte(1)));
        let frame = codex.current();
        assert_eq!(frame.address, Some(L));
        assert_eq!(frame.storage_address, A);
        assert_eq!(frame.sender, Address::repeat_byte(0xee));
        assert_eq!(frame.value, U256::from(7));
        assert_eq!(frame.context, Some(ContextId::repeat_byte(1)));

        codex.apply(&Effect::Store { slot: word(5), value: word(6) }, None);
        codex.apply(&ret(), None);
        assert_eq!(codex.storage_at(&A, &word(5)), StorageValue::Known(word(6)));
        assert_eq!(codex.storage_at(&L, &word(5)), StorageValue::Unknown);
    }

    #[test]
    fn test_plain_call_sets_sender_to_caller_storage_owner() {
        let mut codex = codex();
        codex.apply(&call(MessageScheme::DelegateCall, L), None);
        codex.apply(&call(MessageScheme::Call, B), None);
        let frame = codex.current();
        assert_eq!(frame.sender, A);
        assert_eq!(frame.storage_address, B);
        assert_eq!(frame.value, U256::from(1));
    }

    #[test]
    fn test_instantaneous_calls_do_not_push() {
        let mut codex = codex();
        let effect = Effect::Call {
            scheme: MessageScheme::Call,
            address: B,
            value: U256::ZERO,
            input: Bytes::new(),
            instantaneous: true,
        };
        codex.apply(&effect, None);
        assert_eq!(codex.depth(), 1);
    }

    #[test]
    fn test_load_backfills_every_frame() {
        let mut codex = codex();
        codex.apply(&call(MessageScheme::Call, B), None);
        codex.apply(&Effect::Load { slot: word(3), value: Some(word(9)) }, None);

        // The value was in storage before the call, so the caller sees it too.
        assert_eq!(codex.frames()[0].storage(&B, &word(3)), Some(word(9)));
        assert_eq!(codex.frames()[1].storage(&B, &word(3)), Some(word(9)));

        // Frames opened afterwards inherit the back-filled value.
        codex.apply(&call(MessageScheme::Call, A), None);
        assert_eq!(codex.current().storage(&B, &word(3)), Some(word(9)));
    }

    #[test]
    fn test_load_of_known_slot_leaves_ancestors_alone() {
        let mut codex = codex();
        codex.apply(&call(MessageScheme::Call, B), None);
        codex.apply(&Effect::Store { slot: word(3), value: word(1) }, None);
        codex.apply(&Effect::Load { slot: word(3), value: Some(word(1)) }, None);

        assert_eq!(codex.frames()[0].storage(&B, &word(3)), None);
        assert_eq!(codex.frames()[1].storage(&B, &word(3)), Some(word(1)));

        // A nested frame inherits the write, so its load is not a first touch either.
        codex.apply(&call(MessageScheme::Call, A), None);
        codex.apply(&call(MessageScheme::Call, B), None);
        codex.apply(&Effect::Load { slot: word(3), value: Some(word(1)) }, None);
        assert_eq!(codex.frames()[0].storage(&B, &word(3)), None);
        assert_eq!(codex.frames()[2].storage(&B, &word(3)), None);
    }

    #[test]
    fn test_reverted_write_read_back_does_not_reach_caller() {
        let mut codex = codex();
        codex.apply(&call(MessageScheme::Call, B), None);
        codex.apply(&Effect::Store { slot: word(1), value: word(42) }, None);
        codex.apply(&Effect::Load { slot: word(1), value: Some(word(42)) }, None);
        codex.apply(&fail(), None);

        assert_eq!(codex.depth(), 1);
        assert_eq!(codex.storage_at(&B, &word(1)), StorageValue::Unknown);
    }

    #[test]
    fn test_known_slot_is_not_overwritten_by_load() {
        let mut codex = codex();
        codex.apply(&Effect::Store { slot: word(1), value: word(2) }, None);
        codex.apply(&Effect::Load { slot: word(1), value: Some(word(3)) }, None);
        assert_eq!(codex.storage_at(&A, &word(1)), StorageValue::Known(word(2)));
    }

    #[test]
    fn test_create_frame() {
        let mut codex = codex();
        let created = Address::repeat_byte(0xcc);
        codex.apply(
            &Effect::Create {
                address: Some(created),
                value: U256::ZERO,
                init_code: Bytes::from(vec![0x00]),
                salt: None,
                instantaneous: false,
            },
            None,
        );
        assert!(codex.current().is_create);
        assert_eq!(codex.current().storage_address, created);
        assert_eq!(codex.current().sender, A);
    }

    #[test]
    fn test_reset() {
        let mut codex = codex();
        codex.apply(&Effect::Store { slot: word(1), value: word(2) }, None);
        codex.apply(&call(MessageScheme::Call, B), None);
        codex.reset();
        assert_eq!(codex.depth(), 1);
        assert_eq!(codex.current().address, Some(A));
        assert_eq!(codex.storage_at(&A, &word(1)), StorageValue::Unknown);
        assert!(codex.current().accounts().is_empty());
    }
}

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

//! Transaction log builder.
//!
//! Fed the same per-step transitions as the Codex, the builder grows a
//! [`TransactionLog`] tree: external calls and creations, internal function
//! calls, events, self-destructs and reverts. Nodes are only ever appended;
//! closing a frame fills in its status and output.

use alloy_primitives::{Address, Bytes, B256};
use rdb_common::types::{
    CallKind, CallNode, CallScheme, CallStatus, ContractKind, LogEntryKind, TransactionLog,
};
use tracing::{debug, error, warn};

use crate::registry::Context;

/// An entry of the builder's open-frame stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Open {
    External(usize),
    Internal(usize),
}

impl Open {
    fn id(&self) -> usize {
        match self {
            Self::External(id) | Self::Internal(id) => *id,
        }
    }
}

/// Source-level meaning of entering `context` with `input`
pub fn call_kind(scheme: CallScheme, context: Option<&Context>, input: &[u8]) -> CallKind {
    if scheme.is_create() {
        return CallKind::Constructor { contract: context.and_then(|c| c.name()).map(str::to_string) };
    }

    let Some(context) = context else {
        return CallKind::Message;
    };
    let function = context.function_for_input(input);

    if context.metadata.kind == ContractKind::Library {
        return CallKind::LibraryCall {
            library: context.name().map(str::to_string),
            function: function.map(|f| f.name.clone()),
        };
    }

    match function {
        Some(f) => CallKind::Function { name: f.name.clone(), selector: f.selector() },
        None => CallKind::Message,
    }
}

/// Incrementally builds the [`TransactionLog`] of a replay
#[derive(Debug, Clone)]
pub struct TransactionLogBuilder {
    log: TransactionLog,
    open: Vec<Open>,
}

impl TransactionLogBuilder {
    /// Start a log with the transaction root and the outermost frame
    pub fn new(from: Address, to: Option<Address>, root: CallNode) -> Self {
        let mut log = TransactionLog::new();
        let tx = log.append(None, 0, LogEntryKind::Transaction { from, to });
        let frame = log.append(Some(tx), 0, LogEntryKind::Call(root));
        Self { log, open: vec![Open::External(frame)] }
    }

    /// The log built so far
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Consume the builder
    pub fn into_log(self) -> TransactionLog {
        self.log
    }

    fn parent(&self) -> usize {
        self.open.last().map(Open::id).unwrap_or_default()
    }

    /// An external call or creation that has steps of its own
    pub fn on_call(&mut self, step: usize, node: CallNode) {
        let id = self.log.append(Some(self.parent()), step, LogEntryKind::Call(node));
        self.open.push(Open::External(id));
    }

    /// An external call or creation that completed without steps of its own.
    /// `success` is the status word the caller received.
    pub fn on_instantaneous(&mut self, step: usize, mut node: CallNode, success: bool) {
        node.status = Some(if success {
            CallStatus::Returned
        } else {
            CallStatus::Failed { reason: None }
        });
        self.log.append(Some(self.parent()), step, LogEntryKind::Instantaneous(node));
    }

    /// A jump into an internal function
    pub fn on_jump_in(&mut self, step: usize, function: Option<String>, node_id: Option<i64>) {
        let id = self.log.append(
            Some(self.parent()),
            step,
            LogEntryKind::InternalCall { function, node_id, returned: false },
        );
        self.open.push(Open::Internal(id));
    }

    /// A jump out of an internal function
    pub fn on_jump_out(&mut self) {
        match self.open.last() {
            Some(&Open::Internal(id)) => {
                self.open.pop();
                if let Some(LogEntryKind::InternalCall { returned, .. }) =
                    self.log.get_mut(id).map(|e| &mut e.kind)
                {
                    *returned = true;
                }
            }
            _ => debug!("Jump out of a function whose entry was not seen"),
        }
    }

    /// An event emitted by `address`
    pub fn on_log(&mut self, step: usize, address: Address, topics: Vec<B256>, data: Bytes) {
        self.log.append(Some(self.parent()), step, LogEntryKind::Event { address, topics, data });
    }

    /// The current external frame returned. `address` is the account that
    /// self-destructed in favour of `beneficiary`, if any.
    pub fn on_return(
        &mut self,
        step: usize,
        output: Bytes,
        self_destruct: Option<(Address, Address)>,
    ) {
        let Some(frame) = self.close_internal_calls() else {
            warn!("Return without an open external frame");
            return;
        };

        let status = match self_destruct {
            Some((address, beneficiary)) => {
                self.log.append(Some(frame), step, LogEntryKind::SelfDestruct { address, beneficiary });
                CallStatus::SelfDestructed
            }
            None => CallStatus::Returned,
        };
        self.close(frame, status, output);
    }

    /// The current external frame reverted or halted exceptionally
    pub fn on_fail(&mut self, step: usize, data: Bytes, error: Option<String>, reverted: bool) {
        let Some(frame) = self.close_internal_calls() else {
            warn!("Failure without an open external frame");
            return;
        };

        let revert = LogEntryKind::Revert { data: data.clone(), error: error.clone() };
        self.log.append(Some(frame), step, revert);
        let status = if reverted { CallStatus::Reverted } else { CallStatus::Failed { reason: error } };
        self.close(frame, status, data);
    }

    /// Pop internal calls left open by the ending frame and return the frame
    fn close_internal_calls(&mut self) -> Option<usize> {
        while let Some(Open::Internal(_)) = self.open.last() {
            self.open.pop();
        }
        match self.open.pop() {
            Some(Open::External(id)) => Some(id),
            _ => None,
        }
    }

    fn close(&mut self, id: usize, status: CallStatus, output: Bytes) {
        match self.log.get_mut(id).map(|e| &mut e.kind) {
            Some(LogEntryKind::Call(node)) => {
                node.status = Some(status);
                node.output = Some(output);
            }
            _ => error!(id, "Open frame is not a call node"),
        }
    }
}

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

use std::{
    fmt::Write,
    ops::{Deref, DerefMut},
};

use alloy_primitives::{hex, Address, Bytes, Selector, B256, U256};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::ContextId;

/// How a call frame was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum CallScheme {
    /// `CALL`
    #[display("CALL")]
    Call,
    /// `CALLCODE`
    #[display("CALLCODE")]
    CallCode,
    /// `DELEGATECALL`
    #[display("DELEGATECALL")]
    DelegateCall,
    /// `STATICCALL`
    #[display("STATICCALL")]
    StaticCall,
    /// `CREATE`
    #[display("CREATE")]
    Create,
    /// `CREATE2`
    #[display("CREATE2")]
    Create2,
}

impl CallScheme {
    /// Whether this scheme deploys a contract
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create | Self::Create2)
    }
}

/// What an external call means at the source level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// Call whose selector matches a function in the callee's ABI
    Function {
        /// Function name
        name: String,
        /// Function selector
        selector: Selector,
    },
    /// Contract deployment
    Constructor {
        /// Name of the deployed contract, if known
        contract: Option<String>,
    },
    /// Call into a context tagged as a library
    LibraryCall {
        /// Library name, if known
        library: Option<String>,
        /// Function name, if the selector matched
        function: Option<String>,
    },
    /// Plain message: value transfer, fallback, or unknown callee
    Message,
}

/// How a frame ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    /// Returned normally
    Returned,
    /// Reverted with `REVERT`
    Reverted,
    /// Halted exceptionally (invalid opcode, out of gas, ...)
    Failed {
        /// Tracer-reported reason, if any
        reason: Option<String>,
    },
    /// Ended with `SELFDESTRUCT`
    SelfDestructed,
}

impl CallStatus {
    /// Whether the frame's effects were kept
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Returned | Self::SelfDestructed)
    }
}

/// An external call or creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNode {
    /// Entry scheme
    pub scheme: CallScheme,
    /// Source-level meaning
    pub kind: CallKind,
    /// Storage owner of the calling frame
    pub caller: Address,
    /// Storage owner of the callee (the created address for creations, if known)
    pub address: Option<Address>,
    /// Address whose code runs (differs from `address` for delegate calls)
    pub code_address: Option<Address>,
    /// Context of the code that runs
    pub context: Option<ContextId>,
    /// Value transferred
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// How the frame ended, `None` while still open
    pub status: Option<CallStatus>,
    /// Return or revert data
    pub output: Option<Bytes>,
}

/// Payload of one transaction-log node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogEntryKind {
    /// Root of the log
    Transaction {
        /// Sender
        from: Address,
        /// Recipient, `None` for a creation transaction
        to: Option<Address>,
    },
    /// External call or creation with a body in the trace
    Call(CallNode),
    /// External call that completed without any steps in the trace (precompiles,
    /// empty accounts, calls failing before entry)
    Instantaneous(CallNode),
    /// Internal function call, entered via a jump-in and closed by a jump-out
    InternalCall {
        /// Function name, if the jump target resolved to a function definition
        function: Option<String>,
        /// AST node id of the function definition
        node_id: Option<i64>,
        /// Whether a matching jump-out was seen
        returned: bool,
    },
    /// Emitted event
    Event {
        /// Emitting address
        address: Address,
        /// Topics
        topics: Vec<B256>,
        /// Non-indexed data
        data: Bytes,
    },
    /// Self-destruct of the current frame's account
    SelfDestruct {
        /// Destroyed account
        address: Address,
        /// Receiver of the balance
        beneficiary: Address,
    },
    /// Revert or exceptional halt of the enclosing frame
    Revert {
        /// Revert data
        data: Bytes,
        /// Tracer-reported error, for exceptional halts
        error: Option<String>,
    },
}

/// One node of the transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique ID of this node (its index in the log)
    pub id: usize,
    /// ID of the parent node (`None` for the root)
    pub parent_id: Option<usize>,
    /// Index of the trace step that produced this node
    pub step: usize,
    /// Node payload
    pub kind: LogEntryKind,
}

/// Tree-structured summary of a transaction: external calls, internal function
/// calls, events, self-destructs and reverts, each linked to the trace step
/// that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionLog {
    inner: Vec<LogEntry>,
}

impl Deref for TransactionLog {
    type Target = Vec<LogEntry>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for TransactionLog {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<'a> IntoIterator for &'a TransactionLog {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;
    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl TransactionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert the log to a `serde_json::Value` for RPC serialization
    pub fn to_json_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Append a node under `parent_id` and return its id
    pub fn append(&mut self, parent_id: Option<usize>, step: usize, kind: LogEntryKind) -> usize {
        let id = self.inner.len();
        self.inner.push(LogEntry { id, parent_id, step, kind });
        id
    }

    /// Get the parent of a node
    pub fn get_parent(&self, id: usize) -> Option<&LogEntry> {
        self.inner.get(id).and_then(|entry| entry.parent_id.and_then(|p| self.inner.get(p)))
    }

    /// Get all children of a node, in insertion order
    pub fn get_children(&self, id: usize) -> Vec<&LogEntry> {
        self.inner.iter().filter(|entry| entry.parent_id == Some(id)).collect()
    }

    /// Render the log as an indented tree with ANSI colours
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let roots: Vec<&LogEntry> = self.inner.iter().filter(|e| e.parent_id.is_none()).collect();
        if roots.is_empty() {
            out.push_str("  \x1b[90mNo log entries\x1b[0m\n");
            return out;
        }

        for (i, root) in roots.iter().enumerate() {
            self.render_entry(&mut out, root, 0, i == roots.len() - 1, vec![]);
        }
        out
    }

    /// Print the log tree to stdout
    pub fn print_log_tree(&self) {
        println!();
        println!("\x1b[36m══════════════════════ TRANSACTION LOG ══════════════════════\x1b[0m");
        print!("{}", self.render_tree());
        println!("\x1b[36m═════════════════════════════════════════════════════════════\x1b[0m");
    }

    fn render_entry(
        &self,
        out: &mut String,
        entry: &LogEntry,
        indent_level: usize,
        is_last: bool,
        mut prefix: Vec<bool>,
    ) {
        for &is_empty in &prefix {
            out.push_str(if is_empty { "    " } else { "\x1b[90m│\x1b[0m   " });
        }
        if indent_level > 0 {
            out.push_str(if is_last { "\x1b[90m└──\x1b[0m " } else { "\x1b[90m├──\x1b[0m " });
        }

        let _ = writeln!(out, "{}", format_kind(&entry.kind));

        if indent_level > 0 {
            prefix.push(is_last);
        }
        let children = self.get_children(entry.id);
        for (i, child) in children.iter().enumerate() {
            self.render_entry(out, child, indent_level + 1, i == children.len() - 1, prefix.clone());
        }
    }
}

fn format_kind(kind: &LogEntryKind) -> String {
    match kind {
        LogEntryKind::Transaction { from, to } => match to {
            Some(to) => format!("\x1b[1mTransaction\x1b[0m {from} → {to}"),
            None => format!("\x1b[1mTransaction\x1b[0m {from} → (create)"),
        },
        LogEntryKind::Call(call) => format_call(call, false),
        LogEntryKind::Instantaneous(call) => format_call(call, true),
        LogEntryKind::InternalCall { function, returned, .. } => {
            let name = function.as_deref().unwrap_or("<internal>");
            if *returned {
                format!("\x1b[36m{name}()\x1b[0m")
            } else {
                format!("\x1b[36m{name}()\x1b[0m \x1b[90m(no return)\x1b[0m")
            }
        }
        LogEntryKind::Event { address, topics, data } => {
            let signature = topics
                .first()
                .map(|t| format!("0x{}…", hex::encode(&t[..4])))
                .unwrap_or_else(|| "anonymous".to_string());
            format!(
                "\x1b[96mevent\x1b[0m {signature} from {address} ({} topics, {} bytes data)",
                topics.len(),
                data.len()
            )
        }
        LogEntryKind::SelfDestruct { address, beneficiary } => {
            format!("\x1b[91mSELFDESTRUCT\x1b[0m {address} → {beneficiary}")
        }
        LogEntryKind::Revert { data, error } => match error {
            Some(error) => format!("\x1b[91mhalt\x1b[0m {error}"),
            None => format!("\x1b[91mrevert\x1b[0m {}", format_data_preview(data)),
        },
    }
}

fn format_call(call: &CallNode, instantaneous: bool) -> String {
    let target = call.address.map(|a| a.to_string()).unwrap_or_else(|| "<unknown>".to_string());
    let what = match &call.kind {
        CallKind::Function { name, .. } => format!("{name}()"),
        CallKind::Constructor { contract } => {
            format!("new {}", contract.as_deref().unwrap_or("<unknown contract>"))
        }
        CallKind::LibraryCall { library, function } => format!(
            "{}.{}()",
            library.as_deref().unwrap_or("<library>"),
            function.as_deref().unwrap_or("<unknown>")
        ),
        CallKind::Message => format!("message {}", format_data_preview(&call.input)),
    };

    let mut line = format!("\x1b[34m{:12}\x1b[0m {target} {what}", call.scheme.to_string());
    if !call.value.is_zero() {
        let _ = write!(line, " \x1b[93m[{} wei]\x1b[0m", call.value);
    }
    match &call.status {
        Some(status) if status.is_success() => line.push_str(" \x1b[32m✓\x1b[0m"),
        Some(_) => line.push_str(" \x1b[31m✗\x1b[0m"),
        None => {}
    }
    if instantaneous {
        line.push_str(" \x1b[90m(instantaneous)\x1b[0m");
    }
    line
}

fn format_data_preview(data: &Bytes) -> String {
    if data.len() <= 4 {
        format!("0x{}", hex::encode(data))
    } else {
        format!("0x{}… [{} bytes]", hex::encode(&data[..4]), data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(kind: CallKind) -> CallNode {
        CallNode {
            scheme: CallScheme::Call,
            kind,
            caller: Address::repeat_byte(0xaa),
            address: Some(Address::repeat_byte(0xbb)),
            code_address: Some(Address::repeat_byte(0xbb)),
            context: None,
            value: U256::ZERO,
            input: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
            status: Some(CallStatus::Returned),
            output: None,
        }
    }

    #[test]
    fn test_scheme_display() {
        assert_eq!(CallScheme::DelegateCall.to_string(), "DELEGATECALL");
        assert_eq!(CallScheme::Create2.to_string(), "CREATE2");
        assert!(CallScheme::Create2.is_create());
    }

    #[test]
    fn test_tree_links() {
        let mut log = TransactionLog::new();
        let root = log.append(
            None,
            0,
            LogEntryKind::Transaction { from: Address::ZERO, to: Some(Address::repeat_byte(1)) },
        );
        let outer = log.append(Some(root), 0, LogEntryKind::Call(call(CallKind::Message)));
        let inner = log.append(
            Some(outer),
            3,
            LogEntryKind::InternalCall { function: Some("f".into()), node_id: Some(7), returned: true },
        );

        assert_eq!(log.len(), 3);
        assert_eq!(log.get_parent(inner).map(|e| e.id), Some(outer));
        assert!(log.get_parent(root).is_none());
        assert_eq!(log.get_children(outer).len(), 1);
        assert_eq!(log.get_children(root)[0].id, outer);
    }

    #[test]
    fn test_render_tree_mentions_every_node() {
        let mut log = TransactionLog::new();
        let root = log.append(None, 0, LogEntryKind::Transaction { from: Address::ZERO, to: None });
        let selector = Selector::from([0xde, 0xad, 0xbe, 0xef]);
        let outer = log.append(
            Some(root),
            0,
            LogEntryKind::Call(call(CallKind::Function { name: "transfer".into(), selector })),
        );
        log.append(
            Some(outer),
            5,
            LogEntryKind::Revert { data: Bytes::new(), error: Some("out of gas".into()) },
        );

        let rendered = log.render_tree();
        assert!(rendered.contains("Transaction"));
        assert!(rendered.contains("transfer()"));
        assert!(rendered.contains("out of gas"));
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn test_empty_log_renders_placeholder() {
        assert!(TransactionLog::new().render_tree().contains("No log entries"));
    }

    #[test]
    fn test_serialization() {
        let mut log = TransactionLog::new();
        log.append(None, 0, LogEntryKind::Transaction { from: Address::ZERO, to: None });
        let value = log.to_json_value().unwrap();
        let back: TransactionLog = serde_json::from_value(value).unwrap();
        assert_eq!(back, log);
    }
}

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

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Numeric identifier of a source file, as used by compiler source maps.
pub type SourceId = usize;

/// AST node types at which stepping never stops.
///
/// Source units and contract definitions span whole files, so landing on them
/// carries no information.
const SKIPPED_NODE_TYPES: &[&str] = &["SourceUnit", "ContractDefinition"];

/// Jump annotation of a source-map entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpType {
    /// Jump into a function (`i`)
    #[serde(rename = "i")]
    In,
    /// Jump out of a function (`o`)
    #[serde(rename = "o")]
    Out,
    /// Regular instruction or loop jump (`-`)
    #[default]
    #[serde(rename = "-")]
    Regular,
}

impl fmt::Display for JumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "i"),
            Self::Out => write!(f, "o"),
            Self::Regular => write!(f, "-"),
        }
    }
}

/// One decompressed entry of a compiler source map.
///
/// Entry *k* describes the *k*-th instruction of the corresponding bytecode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// Byte offset of the range in the source file
    pub start: usize,
    /// Byte length of the range
    pub length: usize,
    /// Source file, or `None` for compiler-generated code with no source (`-1`)
    pub source_id: Option<SourceId>,
    /// Jump annotation
    pub jump: JumpType,
}

impl SourceMapEntry {
    /// Create an entry mapped to `source_id`
    pub fn new(source_id: SourceId, start: usize, length: usize) -> Self {
        Self { start, length, source_id: Some(source_id), jump: JumpType::Regular }
    }

    /// Set the jump annotation
    pub fn with_jump(mut self, jump: JumpType) -> Self {
        self.jump = jump;
        self
    }
}

/// A resolved source position for one program counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    /// Source file, `None` if the instruction is unmapped
    pub source_id: Option<SourceId>,
    /// Byte offset of the range
    pub start: usize,
    /// Byte length of the range
    pub length: usize,
    /// Jump annotation of the instruction
    pub jump: JumpType,
}

impl SourcePosition {
    /// The position of an instruction without source information
    pub fn unmapped() -> Self {
        Self::default()
    }

    /// Whether this position has no source
    pub fn is_unmapped(&self) -> bool {
        self.source_id.is_none()
    }

    /// Whether both positions denote the same source range, ignoring jump tags
    pub fn same_range(&self, other: &Self) -> bool {
        self.source_id == other.source_id && self.start == other.start && self.length == other.length
    }
}

impl From<SourceMapEntry> for SourcePosition {
    fn from(entry: SourceMapEntry) -> Self {
        Self { source_id: entry.source_id, start: entry.start, length: entry.length, jump: entry.jump }
    }
}

/// A flattened AST node, reduced to what the stepper and the transaction log need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstNode {
    /// Compiler-assigned node id
    pub id: i64,
    /// Node type, e.g. `FunctionDefinition` or `ExpressionStatement`
    pub node_type: String,
    /// Byte offset of the node in its source
    pub start: usize,
    /// Byte length of the node
    pub length: usize,
    /// Declared name, for named nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether a `VariableDeclaration` declares contract state
    #[serde(default)]
    pub state_variable: bool,
}

impl AstNode {
    /// Create a node
    pub fn new(id: i64, node_type: impl Into<String>, start: usize, length: usize) -> Self {
        Self { id, node_type: node_type.into(), start, length, name: None, state_variable: false }
    }

    /// Set the declared name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark a variable declaration as a state variable
    pub fn as_state_variable(mut self) -> Self {
        self.state_variable = true;
        self
    }

    /// Whether this node spans exactly the given range
    pub fn spans(&self, start: usize, length: usize) -> bool {
        self.start == start && self.length == length
    }

    /// Whether stepping should never stop on this node
    pub fn is_skipped(&self) -> bool {
        SKIPPED_NODE_TYPES.contains(&self.node_type.as_str())
            || (self.node_type == "VariableDeclaration" && self.state_variable)
    }

    /// Whether this node is a function definition
    pub fn is_function_definition(&self) -> bool {
        self.node_type == "FunctionDefinition"
    }
}

/// A source file known to the debugger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Source id referenced by source maps
    pub id: SourceId,
    /// Path of the file as reported by the compiler
    pub path: PathBuf,
    /// Full text, if available
    #[serde(default)]
    pub contents: Option<String>,
    /// Compiler-generated (internal) source
    #[serde(default)]
    pub internal: bool,
    /// Flattened AST nodes in pre-order
    #[serde(default)]
    pub ast: Vec<AstNode>,
}

impl SourceFile {
    /// Create a user source file
    pub fn new(id: SourceId, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self { id, path: path.into(), contents: Some(contents.into()), internal: false, ast: vec![] }
    }

    /// Mark this file as compiler-generated
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Attach flattened AST nodes
    pub fn with_ast(mut self, ast: Vec<AstNode>) -> Self {
        self.ast = ast;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_nodes() {
        assert!(AstNode::new(1, "SourceUnit", 0, 100).is_skipped());
        assert!(AstNode::new(2, "ContractDefinition", 0, 100).is_skipped());
        assert!(AstNode::new(3, "VariableDeclaration", 5, 10).as_state_variable().is_skipped());
        assert!(!AstNode::new(4, "VariableDeclaration", 5, 10).is_skipped());
        assert!(!AstNode::new(5, "ExpressionStatement", 5, 10).is_skipped());
    }

    #[test]
    fn test_position_range_comparison() {
        let a = SourcePosition::from(SourceMapEntry::new(0, 10, 5).with_jump(JumpType::In));
        let b = SourcePosition::from(SourceMapEntry::new(0, 10, 5));
        assert!(a.same_range(&b));
        assert!(!a.same_range(&SourcePosition::unmapped()));
        assert!(SourcePosition::unmapped().is_unmapped());
    }
}

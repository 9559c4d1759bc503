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

//! Source resolution.
//!
//! Maps a program counter within a context to a source position, the AST node
//! at that position, and 1-based line numbers. The per-context instruction
//! table is built lazily, on first lookup, by disassembling the context's
//! binary and pairing each instruction with its source-map entry by position.
//!
//! Sources come from two places: user sources registered with the session's
//! [`SourceRegistry`], and compiler-generated (internal) sources attached to a
//! single context. Internal sources shadow user sources with the same id.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes};
use rdb_common::types::{
    AstNode, LineRange, Location, SourceFile, SourceId, SourceMapEntry, SourcePosition,
};
use semver::Version;
use tracing::trace;

use crate::{registry::Context, utils::disassemble};

/// One row of an [`InstructionTable`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Position of the instruction in the disassembly
    pub index: usize,
    /// Program counter
    pub pc: usize,
    /// Raw opcode byte
    pub op: u8,
    /// Source position from the source map
    pub position: SourcePosition,
}

/// Program counter to source position table of one context
#[derive(Debug, Clone, Default)]
pub struct InstructionTable {
    entries: Vec<TableEntry>,
    by_pc: HashMap<usize, usize>,
}

impl InstructionTable {
    /// Build the table by disassembling `bytes` and pairing instruction *k*
    /// with source-map entry *k*. Instructions past the end of the source map
    /// are unmapped.
    pub fn build(bytes: &Bytes, source_map: &[SourceMapEntry]) -> Self {
        let instructions = disassemble(bytes);
        let mut entries = Vec::with_capacity(instructions.len());
        let mut by_pc = HashMap::with_capacity(instructions.len());

        for (index, inst) in instructions.into_iter().enumerate() {
            let position =
                source_map.get(index).copied().map(SourcePosition::from).unwrap_or_default();
            by_pc.insert(inst.pc, index);
            entries.push(TableEntry { index, pc: inst.pc, op: inst.op, position });
        }

        trace!(instructions = entries.len(), mapped = source_map.len(), "Built instruction table");
        Self { entries, by_pc }
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All rows in code order
    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    /// Row for `pc`, if an instruction starts there
    pub fn get(&self, pc: usize) -> Option<&TableEntry> {
        self.by_pc.get(&pc).map(|&i| &self.entries[i])
    }

    /// Source position of `pc`; unknown PCs (e.g. after a halt) are unmapped
    pub fn position(&self, pc: usize) -> SourcePosition {
        self.get(pc).map(|e| e.position).unwrap_or_default()
    }
}

/// A source file with precomputed line starts
#[derive(Debug, Clone)]
pub struct IndexedSource {
    /// The file
    pub file: SourceFile,
    line_starts: Vec<usize>,
}

impl IndexedSource {
    /// Index a source file
    pub fn new(file: SourceFile) -> Self {
        let line_starts = match &file.contents {
            Some(text) => std::iter::once(0)
                .chain(text.bytes().enumerate().filter(|(_, b)| *b == b'\n').map(|(i, _)| i + 1))
                .collect(),
            None => Vec::new(),
        };
        Self { file, line_starts }
    }

    /// Whether the source is compiler-generated
    pub fn is_internal(&self) -> bool {
        self.file.internal
    }

    /// 1-based line containing byte `offset`, `None` without source text
    pub fn line_of(&self, offset: usize) -> Option<usize> {
        if self.line_starts.is_empty() {
            return None;
        }
        Some(self.line_starts.partition_point(|&start| start <= offset))
    }

    /// 1-based inclusive line range covered by `start..start + length`
    pub fn line_range(&self, start: usize, length: usize) -> Option<LineRange> {
        let first = self.line_of(start)?;
        let last = self.line_of(start + length.saturating_sub(1))?;
        Some(LineRange { start: first, end: last.max(first) })
    }

    /// Innermost AST node whose range is exactly `start..start + length`
    pub fn node_at(&self, start: usize, length: usize) -> Option<&AstNode> {
        // Nodes are stored in pre-order, so the last exact match is the innermost.
        self.file.ast.iter().rev().find(|node| node.spans(start, length))
    }

    /// Source text of a range
    pub fn text(&self, start: usize, length: usize) -> Option<&str> {
        self.file.contents.as_deref()?.get(start..start + length)
    }
}

/// User sources known to a session
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceId, IndexedSource>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source; a later registration with the same id replaces it
    pub fn add(&mut self, file: SourceFile) {
        self.sources.insert(file.id, IndexedSource::new(file));
    }

    /// Look up a source
    pub fn get(&self, id: SourceId) -> Option<&IndexedSource> {
        self.sources.get(&id)
    }

    /// Iterate over all sources
    pub fn iter(&self) -> impl Iterator<Item = &IndexedSource> {
        self.sources.values()
    }

    /// Number of sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Find source `id` as seen from `context`: the context's internal sources
/// first, then the user sources.
pub fn find_source<'a>(
    sources: &'a SourceRegistry,
    context: Option<&'a Context>,
    id: SourceId,
) -> Option<&'a IndexedSource> {
    context.and_then(|ctx| ctx.internal_source(id)).or_else(|| sources.get(id))
}

/// Resolve the full [`Location`] of `pc` executing in `context`
pub fn locate(
    sources: &SourceRegistry,
    context: Option<&Context>,
    address: Option<Address>,
    pc: usize,
) -> Location {
    let position = context.map(|ctx| ctx.instruction_table().position(pc)).unwrap_or_default();
    let source = position.source_id.and_then(|id| find_source(sources, context, id));

    Location {
        address,
        context: context.map(|ctx| ctx.id),
        pc,
        position,
        internal: source.is_some_and(|s| s.is_internal()),
        node: source.and_then(|s| s.node_at(position.start, position.length)).cloned(),
        lines: source.and_then(|s| s.line_range(position.start, position.length)),
    }
}

/// Whether the instruction at `pc` is the last one of its source range.
///
/// `next_pc` is the program counter of the following step when it runs in the
/// same context; a context change (call, create, return) always ends the
/// range. Moving from user code into an internal source of the same context
/// does not end the range, since the internal code runs on behalf of the
/// user statement.
pub fn is_source_range_final(
    sources: &SourceRegistry,
    context: Option<&Context>,
    pc: usize,
    next_pc: Option<usize>,
) -> bool {
    let (Some(ctx), Some(next_pc)) = (context, next_pc) else {
        return true;
    };

    let table = ctx.instruction_table();
    let current = table.position(pc);
    let following = table.position(next_pc);
    if current.same_range(&following) {
        return false;
    }

    let is_internal = |position: &SourcePosition| {
        position
            .source_id
            .and_then(|id| find_source(sources, context, id))
            .is_some_and(|s| s.is_internal())
    };
    !((!current.is_unmapped() && !is_internal(&current)) && is_internal(&following))
}

/// Whether entering `context` through an external call adds a phantom
/// function-depth level: solc of at least `min_version`, except in constructors.
pub fn requires_phantom_frame(context: Option<&Context>, min_version: &Version) -> bool {
    context.is_some_and(|ctx| {
        !ctx.metadata.is_constructor
            && ctx
                .metadata
                .compiler
                .as_ref()
                .is_some_and(|c| c.is_solc() && c.is_at_least(min_version))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdb_common::types::JumpType;

    const TEXT: &str = "line one\nline two\n\nline four";

    #[test]
    fn test_table_pairs_instructions_positionally() {
        // PUSH1 0x80, PUSH1 0x40, MSTORE, STOP
        let bytes = Bytes::from(vec![0x60, 0x80, 0x60, 0x40, 0x52, 0x00]);
        let map = vec![
            SourceMapEntry::new(0, 0, 8),
            SourceMapEntry::new(0, 9, 8),
            SourceMapEntry::new(0, 0, 8).with_jump(JumpType::In),
        ];
        let table = InstructionTable::build(&bytes, &map);

        assert_eq!(table.len(), 4);
        assert_eq!(table.position(0), SourcePosition::from(map[0]));
        assert_eq!(table.position(2), SourcePosition::from(map[1]));
        assert_eq!(table.position(4).jump, JumpType::In);
        // STOP has no source-map entry, PC 1 is push data, PC 99 is past the code
        assert!(table.position(5).is_unmapped());
        assert!(table.position(1).is_unmapped());
        assert!(table.position(99).is_unmapped());
    }

    #[test]
    fn test_line_numbers_are_one_based() {
        let source = IndexedSource::new(SourceFile::new(0, "A.sol", TEXT));
        assert_eq!(source.line_of(0), Some(1));
        assert_eq!(source.line_of(8), Some(1));
        assert_eq!(source.line_of(9), Some(2));
        assert_eq!(source.line_of(18), Some(3));
        assert_eq!(source.line_of(19), Some(4));
        assert_eq!(source.line_range(0, 8), Some(LineRange { start: 1, end: 1 }));
        assert_eq!(source.line_range(5, 10), Some(LineRange { start: 1, end: 2 }));
        assert_eq!(source.line_range(9, 0), Some(LineRange { start: 2, end: 2 }));
        assert_eq!(source.text(9, 8), Some("line two"));
    }

    #[test]
    fn test_source_without_text_has_no_lines() {
        let source = IndexedSource::new(SourceFile { id: 0, ..Default::default() });
        assert_eq!(source.line_of(0), None);
        assert_eq!(source.line_range(0, 1), None);
    }

    #[test]
    fn test_innermost_node_wins() {
        let source = IndexedSource::new(SourceFile::new(0, "A.sol", TEXT).with_ast(vec![
            AstNode::new(1, "SourceUnit", 0, 28),
            AstNode::new(2, "Block", 9, 8),
            AstNode::new(3, "ExpressionStatement", 9, 8),
        ]));
        assert_eq!(source.node_at(9, 8).map(|n| n.id), Some(3));
        assert_eq!(source.node_at(0, 28).map(|n| n.id), Some(1));
        assert!(source.node_at(9, 7).is_none());
    }
}

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

use std::ops::RangeInclusive;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use super::{AstNode, SourceId, SourcePosition};

/// Identifier of a context: the hash of its (placeholder-masked) binary.
pub type ContextId = B256;

/// Where execution currently is, in bytecode and in source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Address whose code is executing, `None` during a creation whose target is unknown
    pub address: Option<Address>,
    /// Context of the executing code, if known
    pub context: Option<ContextId>,
    /// Program counter
    pub pc: usize,
    /// Source position of the program counter
    pub position: SourcePosition,
    /// Whether the position is in a compiler-generated source
    pub internal: bool,
    /// AST node whose range exactly matches the position, innermost first
    pub node: Option<AstNode>,
    /// 1-based line range covered by the position, when source text is known
    pub lines: Option<LineRange>,
}

impl Location {
    /// Source id of the position
    pub fn source_id(&self) -> Option<SourceId> {
        self.position.source_id
    }

    /// 1-based first line of the position
    pub fn start_line(&self) -> Option<usize> {
        self.lines.map(|l| l.start)
    }

    /// Whether the position covers more than one line
    pub fn is_multiline(&self) -> bool {
        self.lines.is_some_and(|l| l.end > l.start)
    }
}

/// Inclusive 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    /// First line
    pub start: usize,
    /// Last line
    pub end: usize,
}

impl LineRange {
    /// Whether `line` falls in this range
    pub fn contains(&self, line: usize) -> bool {
        RangeInclusive::new(self.start, self.end).contains(&line)
    }
}

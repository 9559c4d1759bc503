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

//! Function depth.
//!
//! The call-stack depth that stepping reasons about is the source-level
//! function depth, not the EVM call depth. Internal function calls show up as
//! jumps tagged "into" and "out of" a function in the source map and adjust
//! the depth of the current external frame. An external call opens a new
//! level on top of the caller's depth.

use tracing::warn;

/// Per-external-frame function depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDepth {
    levels: Vec<usize>,
    root_phantom: bool,
}

impl FunctionDepth {
    /// Depth tracker for a transaction whose first frame does or does not
    /// get a phantom level
    pub fn new(root_phantom: bool) -> Self {
        let mut depth = Self { levels: vec![0], root_phantom };
        depth.enter_call(root_phantom);
        depth
    }

    /// Current function depth
    pub fn current(&self) -> usize {
        self.levels.last().copied().unwrap_or_default()
    }

    /// Number of open external frames
    pub fn frames(&self) -> usize {
        self.levels.len() - 1
    }

    /// A jump into an internal function
    pub fn jump_in(&mut self) {
        if let Some(top) = self.levels.last_mut() {
            *top += 1;
        }
    }

    /// A jump out of an internal function
    pub fn jump_out(&mut self) {
        if let Some(top) = self.levels.last_mut() {
            *top = top.saturating_sub(1);
        }
    }

    /// An external call or creation with steps of its own
    pub fn enter_call(&mut self, phantom: bool) {
        let base = self.current();
        self.levels.push(base + if phantom { 2 } else { 1 });
    }

    /// The current external frame returned or failed
    pub fn exit_call(&mut self) {
        if self.levels.len() > 2 {
            self.levels.pop();
        } else {
            warn!("Ignoring return from the outermost frame");
        }
    }

    /// Back to the state right after construction
    pub fn reset(&mut self) {
        *self = Self::new(self.root_phantom);
    }
}

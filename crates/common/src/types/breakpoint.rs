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

use std::{fmt::Display, str::FromStr};

use eyre::{bail, eyre, Error, Result};
use serde::{Deserialize, Serialize};

use super::{Location, SourceId};

/// A source-level breakpoint.
///
/// Breakpoints are matched against the resolved [`Location`] of the current
/// step. A node breakpoint matches an exact source range, a line breakpoint
/// matches any position whose range *starts* on the given line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Breakpoint {
    /// Breakpoint at an exact source range (an AST node)
    Node {
        /// Source file
        source_id: SourceId,
        /// Byte offset of the range
        start: usize,
        /// Byte length of the range
        length: usize,
    },
    /// Breakpoint at a source line
    Line {
        /// Source file
        source_id: SourceId,
        /// 1-based line number
        line: usize,
    },
}

impl Breakpoint {
    /// Create a node breakpoint
    pub fn node(source_id: SourceId, start: usize, length: usize) -> Self {
        Self::Node { source_id, start, length }
    }

    /// Create a line breakpoint
    pub fn line(source_id: SourceId, line: usize) -> Self {
        Self::Line { source_id, line }
    }

    /// Source file of this breakpoint
    pub fn source_id(&self) -> SourceId {
        match self {
            Self::Node { source_id, .. } | Self::Line { source_id, .. } => *source_id,
        }
    }

    /// Whether execution at `location` hits this breakpoint
    pub fn is_hit(&self, location: &Location) -> bool {
        if location.source_id() != Some(self.source_id()) {
            return false;
        }

        match self {
            Self::Node { start, length, .. } => {
                location.position.start == *start && location.position.length == *length
            }
            Self::Line { line, .. } => location.start_line() == Some(*line),
        }
    }
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node { source_id, start, length } => write!(f, "@{source_id}:{start}:{length}"),
            Self::Line { source_id, line } => write!(f, "@{source_id}:{line}"),
        }
    }
}

impl FromStr for Breakpoint {
    type Err = Error;

    /// Parses a breakpoint from a string.
    /// Format: `[@]<source>:<line>` or `[@]<source>:<start>:<length>`
    /// Examples:
    /// - `@0:42` - Breakpoint at line 42 of source 0
    /// - `1:120:35` - Breakpoint at the 35-byte range starting at offset 120 of source 1
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);
        let parts: Vec<&str> = trimmed.split(':').collect();

        let parse = |value: &str, what: &str| -> Result<usize> {
            value.trim().parse::<usize>().map_err(|e| eyre!("Invalid {what} '{value}': {e}"))
        };

        match parts.as_slice() {
            [source, line] => {
                let line = parse(line, "line number")?;
                if line == 0 {
                    bail!("Line numbers are 1-based, got 0");
                }
                Ok(Self::Line { source_id: parse(source, "source id")?, line })
            }
            [source, start, length] => Ok(Self::Node {
                source_id: parse(source, "source id")?,
                start: parse(start, "offset")?,
                length: parse(length, "length")?,
            }),
            _ => bail!(
                "Invalid breakpoint format. Expected <source>:<line> or <source>:<start>:<length>, got: {s}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineRange, SourceMapEntry, SourcePosition};

    fn location(source_id: usize, start: usize, length: usize, line: usize) -> Location {
        Location {
            position: SourcePosition::from(SourceMapEntry::new(source_id, start, length)),
            lines: Some(LineRange { start: line, end: line }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_line_breakpoint() {
        assert_eq!("@0:42".parse::<Breakpoint>().unwrap(), Breakpoint::line(0, 42));
        assert_eq!(" 3:7 ".parse::<Breakpoint>().unwrap(), Breakpoint::line(3, 7));
    }

    #[test]
    fn test_parse_node_breakpoint() {
        assert_eq!("1:120:35".parse::<Breakpoint>().unwrap(), Breakpoint::node(1, 120, 35));
        assert_eq!("@1:120:35".parse::<Breakpoint>().unwrap(), Breakpoint::node(1, 120, 35));
    }

    #[test]
    fn test_parse_invalid_breakpoints() {
        assert!("".parse::<Breakpoint>().is_err());
        assert!("0".parse::<Breakpoint>().is_err());
        assert!("0:0".parse::<Breakpoint>().is_err());
        assert!("a:1".parse::<Breakpoint>().is_err());
        assert!("0:1:2:3".parse::<Breakpoint>().is_err());
        assert!("0:-1".parse::<Breakpoint>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        for bp in [Breakpoint::line(2, 10), Breakpoint::node(0, 5, 17)] {
            assert_eq!(bp.to_string().parse::<Breakpoint>().unwrap(), bp);
        }
        assert_eq!(Breakpoint::line(2, 10).to_string(), "@2:10");
        assert_eq!(Breakpoint::node(0, 5, 17).to_string(), "@0:5:17");
    }

    #[test]
    fn test_node_breakpoint_matches_exact_range() {
        let bp = Breakpoint::node(0, 10, 5);
        assert!(bp.is_hit(&location(0, 10, 5, 1)));
        assert!(!bp.is_hit(&location(0, 10, 6, 1)));
        assert!(!bp.is_hit(&location(1, 10, 5, 1)));
        assert!(!bp.is_hit(&Location::default()));
    }

    #[test]
    fn test_line_breakpoint_matches_start_line() {
        let bp = Breakpoint::line(0, 3);
        assert!(bp.is_hit(&location(0, 10, 5, 3)));
        assert!(!bp.is_hit(&location(0, 10, 5, 4)));

        let mut multiline = location(0, 10, 50, 2);
        multiline.lines = Some(LineRange { start: 2, end: 4 });
        assert!(!bp.is_hit(&multiline));
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Breakpoint::line(1, 9)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "line", "source_id": 1, "line": 9}));
        let back: Breakpoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, Breakpoint::line(1, 9));
    }
}

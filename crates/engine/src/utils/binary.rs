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

//! Contract binary normalization.
//!
//! Unlinked binaries contain 40-character library placeholders such as
//! `__$1d0cbd4fc7e5d6bb37ad4f9d3ec5e1a5b5$__` or `__MyLib_______________________________`
//! in place of library addresses. Context identity is computed over the hex
//! text with every placeholder replaced by zeros, and instance matching treats
//! placeholder ranges as wildcards.

use std::ops::Range;

use alloy_primitives::{hex, keccak256, Bytes, B256};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::RegistryError;

/// Length, in hex characters, of a library address placeholder.
pub const LINK_PLACEHOLDER_LEN: usize = 40;

static LINK_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__.{36}__").expect("link placeholder pattern is a valid regex"));

/// Strip an optional `0x` prefix and lowercase the hex digits
pub fn normalize_hex(binary: &str) -> String {
    let trimmed = binary.trim();
    trimmed.strip_prefix("0x").unwrap_or(trimmed).to_ascii_lowercase()
}

/// Hex-character ranges of every link placeholder in a normalized binary
pub fn link_placeholder_ranges(normalized: &str) -> Vec<Range<usize>> {
    LINK_PLACEHOLDER.find_iter(normalized).map(|m| m.range()).collect()
}

/// Replace every link placeholder with zeros
pub fn mask_link_placeholders(normalized: &str) -> String {
    LINK_PLACEHOLDER.replace_all(normalized, "0".repeat(LINK_PLACEHOLDER_LEN)).into_owned()
}

/// Decode a normalized, placeholder-masked binary into bytes
pub fn decode_binary(masked: &str) -> Result<Bytes, RegistryError> {
    hex::decode(masked).map(Bytes::from).map_err(|e| RegistryError::InvalidBinary(e.to_string()))
}

/// Identity hash of a binary: keccak256 over the masked lowercase hex text
pub fn binary_hash(masked: &str) -> B256 {
    keccak256(masked.as_bytes())
}

/// Whether `candidate` (raw hex) equals `template` (normalized hex) outside the
/// given placeholder ranges. Both must have the same length.
pub fn matches_with_wildcards(template: &str, ranges: &[Range<usize>], candidate: &str) -> bool {
    if template.len() != candidate.len() {
        return false;
    }
    matches_prefix_with_wildcards(template, ranges, candidate)
}

/// Whether `candidate` starts with `template`, treating placeholder ranges as
/// wildcards. Used to recognise constructor contexts in init code, which has
/// ABI-encoded constructor arguments appended.
pub fn matches_prefix_with_wildcards(
    template: &str,
    ranges: &[Range<usize>],
    candidate: &str,
) -> bool {
    if candidate.len() < template.len() {
        return false;
    }

    let (template, candidate) = (template.as_bytes(), candidate.as_bytes());
    let mut pos = 0;
    for range in ranges {
        if template[pos..range.start] != candidate[pos..range.start] {
            return false;
        }
        pos = range.end;
    }
    template[pos..] == candidate[pos..template.len()]
}

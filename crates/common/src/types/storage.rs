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

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Value of a storage slot as reconstructed from the trace.
///
/// Slots that were neither written nor read by the trace, and that no storage
/// provider could fetch, are `Unknown` rather than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum StorageValue {
    /// The slot holds this value
    Known(B256),
    /// The value of the slot cannot be determined
    Unknown,
}

impl StorageValue {
    /// The value, if known
    pub fn known(self) -> Option<B256> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }

    /// Whether the value is known
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl From<Option<B256>> for StorageValue {
    fn from(value: Option<B256>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

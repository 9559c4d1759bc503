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

use eyre::{eyre, Result};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Name reported by the Solidity compiler.
pub const SOLC: &str = "solc";

/// Compiler that produced a piece of bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInfo {
    /// Compiler name, e.g. `solc` or `vyper`
    pub name: String,
    /// Compiler version, if it parses as semver
    pub version: Option<Version>,
}

impl CompilerInfo {
    /// Solidity compiler of the given version, e.g. `0.8.19+commit.7dd6d404`
    pub fn solc(version: &str) -> Result<Self> {
        let version = Version::parse(version.trim_start_matches('v'))
            .map_err(|e| eyre!("Invalid solc version {version}: {e}"))?;
        Ok(Self { name: SOLC.to_string(), version: Some(version) })
    }

    /// Whether this is the Solidity compiler
    pub fn is_solc(&self) -> bool {
        self.name == SOLC
    }

    /// Whether the compiler version is at least `min`, ignoring build metadata
    pub fn is_at_least(&self, min: &Version) -> bool {
        self.version.as_ref().is_some_and(|v| {
            (v.major, v.minor, v.patch) >= (min.major, min.minor, min.patch)
        })
    }
}

/// Kind of contract a context was compiled from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    /// Regular contract
    #[default]
    Contract,
    /// Library, reached through delegate calls
    Library,
    /// Interface, never deployed
    Interface,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solc_version_with_build_metadata() {
        let info = CompilerInfo::solc("0.8.19+commit.7dd6d404").unwrap();
        assert!(info.is_solc());
        assert!(info.is_at_least(&Version::new(0, 5, 1)));
        assert!(info.is_at_least(&Version::new(0, 8, 19)));
        assert!(!info.is_at_least(&Version::new(0, 8, 20)));
    }

    #[test]
    fn test_old_solc() {
        let info = CompilerInfo::solc("v0.4.24+commit.e67f0147.Emscripten.clang").unwrap();
        assert!(!info.is_at_least(&Version::new(0, 5, 1)));
        assert!(CompilerInfo::solc("not-a-version").is_err());
    }
}

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

//! Debugger configuration.
//!
//! A [`DebuggerConfig`] is fixed for the lifetime of a session. It can be built
//! in code through the `with_*` methods or loaded from a TOML file:
//!
//! ```toml
//! step_into_internal_sources = false
//! build_transaction_log = true
//! phantom_frame_min_version = "0.5.1"
//! max_steps_per_operation = 1000000
//! ```
//!
//! [`DebuggerConfig::from_env`] layers the file named by `RDB_CONFIG_FILE` and
//! the per-key overrides listed in [`rdb_common::env`] over the defaults.

use std::{env, fs, path::Path};

use eyre::{Result, WrapErr};
use rdb_common::env::{
    RDB_CONFIG_FILE, RDB_MAX_STEPS_PER_OPERATION, RDB_STEP_INTO_INTERNAL_SOURCES,
};
use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// First solc release whose external functions are entered through an extra
/// internal jump, which shows up as a phantom function-depth level.
pub const DEFAULT_PHANTOM_FRAME_MIN_VERSION: Version = Version::new(0, 5, 1);

/// Configuration for a debugging session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerConfig {
    /// Stop in compiler-generated sources while stepping, even when the
    /// current position is in user code
    pub step_into_internal_sources: bool,
    /// Maintain the transaction log while advancing
    pub build_transaction_log: bool,
    /// Minimum solc version for which calls push a phantom function-depth level
    pub phantom_frame_min_version: Version,
    /// Upper bound on raw steps taken by a single stepping operation; `None`
    /// means unbounded
    pub max_steps_per_operation: Option<usize>,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            step_into_internal_sources: false,
            build_transaction_log: true,
            phantom_frame_min_version: DEFAULT_PHANTOM_FRAME_MIN_VERSION,
            max_steps_per_operation: None,
        }
    }
}

impl DebuggerConfig {
    /// Load a configuration from a TOML file; missing keys take their defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).wrap_err("Failed to parse debugger config")
    }

    /// Load the configuration from the environment: the file named by
    /// `RDB_CONFIG_FILE` if set, then the per-key overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var_os(RDB_CONFIG_FILE) {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };

        if let Ok(value) = env::var(RDB_STEP_INTO_INTERNAL_SOURCES) {
            config.step_into_internal_sources = parse_flag(&value)
                .wrap_err_with(|| format!("Invalid {RDB_STEP_INTO_INTERNAL_SOURCES}"))?;
        }
        if let Ok(value) = env::var(RDB_MAX_STEPS_PER_OPERATION) {
            config.max_steps_per_operation = match value.trim() {
                "" => None,
                limit => Some(
                    limit
                        .parse()
                        .wrap_err_with(|| format!("Invalid {RDB_MAX_STEPS_PER_OPERATION}"))?,
                ),
            };
        }

        debug!(?config, "Loaded debugger config from the environment");
        Ok(config)
    }

    /// Allow stepping to stop in compiler-generated sources
    pub fn with_step_into_internal_sources(mut self, enabled: bool) -> Self {
        self.step_into_internal_sources = enabled;
        self
    }

    /// Enable or disable building the transaction log
    pub fn with_transaction_log(mut self, enabled: bool) -> Self {
        self.build_transaction_log = enabled;
        self
    }

    /// Set the minimum solc version that uses phantom frames
    pub fn with_phantom_frame_min_version(mut self, version: Version) -> Self {
        self.phantom_frame_min_version = version;
        self
    }

    /// Bound the number of raw steps any single stepping operation may take
    pub fn with_max_steps_per_operation(mut self, limit: usize) -> Self {
        self.max_steps_per_operation = Some(limit);
        self
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => eyre::bail!("expected a boolean, got '{other}'"),
    }
}

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

//! Environment variable names read by RDB.
//!
//! # Environment Variables
//!
//! - [`RDB_CONFIG_FILE`] - TOML file holding the debugger configuration
//! - [`RDB_STEP_INTO_INTERNAL_SOURCES`] - Overrides `step_into_internal_sources`
//! - [`RDB_MAX_STEPS_PER_OPERATION`] - Overrides `max_steps_per_operation`
//!
//! Overrides take precedence over the configuration file, which takes
//! precedence over the built-in defaults.

/// Environment variable naming the configuration file.
///
/// # Examples
///
/// ```bash
/// RDB_CONFIG_FILE=./rdb.toml cargo test
/// ```
pub const RDB_CONFIG_FILE: &str = "RDB_CONFIG_FILE";

/// Environment variable enabling stops in compiler-generated sources.
///
/// Accepts `true`/`false` as well as `1`/`0`.
pub const RDB_STEP_INTO_INTERNAL_SOURCES: &str = "RDB_STEP_INTO_INTERNAL_SOURCES";

/// Environment variable bounding the raw steps of one stepping operation.
///
/// Must be a valid `usize`. An empty value removes the bound.
pub const RDB_MAX_STEPS_PER_OPERATION: &str = "RDB_MAX_STEPS_PER_OPERATION";

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

//! Context and instance registry.
//!
//! A *context* is a distinct piece of bytecode together with everything known
//! about it (name, compiler, ABI, source map, generated sources). Its identity
//! is the hash of its binary with library placeholders masked, so registering
//! the same binary twice yields the same context.
//!
//! An *instance* binds a deployed address to the context its code matches.
//! Matching first tries the exact hash, then treats the link placeholders of
//! unlinked contexts as wildcards. Code that matches nothing still gets a
//! *bare* context with no source information, so every executing address
//! has a context.

use std::{collections::HashMap, ops::Range};

use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::{hex, Address, Bytes, Selector};
use once_cell::sync::OnceCell;
use rdb_common::types::{
    CompilerInfo, ContextId, ContractKind, SourceFile, SourceId, SourceMapEntry,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    source::{IndexedSource, InstructionTable},
    utils::{
        binary_hash, decode_binary, link_placeholder_ranges, mask_link_placeholders,
        matches_prefix_with_wildcards, matches_with_wildcards, normalize_hex,
    },
};

/// Errors raised while registering contexts
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The binary is not valid hex once placeholders are masked
    #[error("invalid contract binary: {0}")]
    InvalidBinary(String),
    /// No context with this id
    #[error("unknown context {0}")]
    UnknownContext(ContextId),
}

/// Everything known about a context besides its binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextMetadata {
    /// Contract name
    pub contract_name: Option<String>,
    /// Compiler that produced the binary
    pub compiler: Option<CompilerInfo>,
    /// Whether the binary is init code rather than runtime code
    pub is_constructor: bool,
    /// Contract kind
    pub kind: ContractKind,
    /// Contract ABI
    pub abi: Option<JsonAbi>,
    /// Decompressed source map, one entry per instruction
    pub source_map: Vec<SourceMapEntry>,
    /// Source that defines the contract
    pub primary_source: Option<SourceId>,
    /// Compiler-generated sources private to this context
    pub internal_sources: Vec<SourceFile>,
}

impl ContextMetadata {
    /// Metadata for a named contract
    pub fn new(contract_name: impl Into<String>) -> Self {
        Self { contract_name: Some(contract_name.into()), ..Default::default() }
    }

    /// Set the compiler
    pub fn with_compiler(mut self, compiler: CompilerInfo) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Mark the binary as init code
    pub fn constructor(mut self) -> Self {
        self.is_constructor = true;
        self
    }

    /// Set the contract kind
    pub fn with_kind(mut self, kind: ContractKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the ABI
    pub fn with_abi(mut self, abi: JsonAbi) -> Self {
        self.abi = Some(abi);
        self
    }

    /// Set the decompressed source map
    pub fn with_source_map(mut self, source_map: Vec<SourceMapEntry>) -> Self {
        self.source_map = source_map;
        self
    }

    /// Set the defining source
    pub fn with_primary_source(mut self, id: SourceId) -> Self {
        self.primary_source = Some(id);
        self
    }

    /// Attach a compiler-generated source
    pub fn with_internal_source(mut self, file: SourceFile) -> Self {
        self.internal_sources.push(file.internal());
        self
    }

    /// Whether this metadata carries no information at all
    pub fn is_bare(&self) -> bool {
        self.contract_name.is_none()
            && self.compiler.is_none()
            && self.abi.is_none()
            && self.source_map.is_empty()
            && self.internal_sources.is_empty()
    }
}

/// A distinct piece of bytecode and its metadata
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    /// Identity hash
    pub id: ContextId,
    /// Normalized hex of the binary, placeholders kept
    pub binary: String,
    /// Decoded binary with placeholders zeroed
    #[serde(skip)]
    pub bytes: Bytes,
    /// Hex-character ranges of link placeholders in `binary`
    pub link_ranges: Vec<Range<usize>>,
    /// Metadata
    pub metadata: ContextMetadata,
    #[serde(skip)]
    internal_sources: HashMap<SourceId, IndexedSource>,
    #[serde(skip)]
    instructions: OnceCell<InstructionTable>,
}

impl Context {
    fn new(id: ContextId, binary: String, bytes: Bytes, metadata: ContextMetadata) -> Self {
        let link_ranges = link_placeholder_ranges(&binary);
        let mut context = Self {
            id,
            binary,
            bytes,
            link_ranges,
            metadata: ContextMetadata::default(),
            internal_sources: HashMap::new(),
            instructions: OnceCell::new(),
        };
        context.set_metadata(metadata);
        context
    }

    fn set_metadata(&mut self, metadata: ContextMetadata) {
        self.internal_sources = metadata
            .internal_sources
            .iter()
            .cloned()
            .map(|file| (file.id, IndexedSource::new(file.internal())))
            .collect();
        self.instructions = OnceCell::new();
        self.metadata = metadata;
    }

    /// Whether nothing beyond the binary is known
    pub fn is_bare(&self) -> bool {
        self.metadata.is_bare()
    }

    /// Whether the binary contains unresolved library placeholders
    pub fn is_unlinked(&self) -> bool {
        !self.link_ranges.is_empty()
    }

    /// Contract name, if known
    pub fn name(&self) -> Option<&str> {
        self.metadata.contract_name.as_deref()
    }

    /// The PC to source-position table, built on first use
    pub fn instruction_table(&self) -> &InstructionTable {
        self.instructions
            .get_or_init(|| InstructionTable::build(&self.bytes, &self.metadata.source_map))
    }

    /// A compiler-generated source of this context
    pub fn internal_source(&self, id: SourceId) -> Option<&IndexedSource> {
        self.internal_sources.get(&id)
    }

    /// ABI function matching the first four bytes of `input`
    pub fn function_for_input(&self, input: &[u8]) -> Option<&Function> {
        let selector = Selector::try_from(input.get(..4)?).ok()?;
        self.metadata.abi.as_ref()?.functions().find(|f| f.selector() == selector)
    }
}

/// A deployed address and the context of its code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    /// Deployed address
    pub address: Address,
    /// Matched context
    pub context: ContextId,
    /// Code as deployed (linked)
    pub binary: Bytes,
}

/// Registry of contexts and instances. Entries are only ever added.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    contexts: HashMap<ContextId, Context>,
    instances: HashMap<Address, Instance>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binary (hex, optionally `0x`-prefixed, possibly unlinked).
    ///
    /// Registering an already known binary returns the existing id. If the
    /// existing context is bare, the new metadata replaces it.
    pub fn add_context(
        &mut self,
        binary: &str,
        metadata: ContextMetadata,
    ) -> Result<ContextId, RegistryError> {
        let normalized = normalize_hex(binary);
        let masked = mask_link_placeholders(&normalized);
        let id = binary_hash(&masked);

        if let Some(existing) = self.contexts.get_mut(&id) {
            if existing.is_bare() && !metadata.is_bare() {
                debug!(context = %id, name = ?metadata.contract_name, "Upgrading bare context");
                existing.set_metadata(metadata);
            } else {
                trace!(context = %id, "Context already registered");
            }
            return Ok(id);
        }

        let bytes = decode_binary(&masked)?;
        let context = Context::new(id, normalized, bytes, metadata);
        debug!(
            context = %id,
            name = ?context.name(),
            constructor = context.metadata.is_constructor,
            unlinked = context.is_unlinked(),
            "Registered context"
        );
        self.contexts.insert(id, context);
        Ok(id)
    }

    /// Bind `address` to the context matching `binary`, creating a bare
    /// context if none matches.
    ///
    /// An address keeps the binary it was first registered with; a different
    /// binary for the same address is ignored with a warning.
    pub fn add_instance(&mut self, address: Address, binary: Bytes) -> ContextId {
        if let Some(existing) = self.instances.get(&address) {
            if existing.binary != binary {
                warn!(%address, "Ignoring new binary for an address that already has an instance");
            }
            return existing.context;
        }

        let hex = hex::encode(&binary);
        let context = match self.match_runtime(&hex) {
            Some(id) => id,
            None => self.insert_bare(hex, binary.clone(), false),
        };

        debug!(%address, context = %context, "Registered instance");
        self.instances.insert(address, Instance { address, context, binary });
        context
    }

    /// Context of the init code `init_code`: the longest constructor context
    /// that is a prefix of it (constructor arguments follow the code), or a new
    /// bare constructor context.
    pub fn creation_context(&mut self, init_code: &Bytes) -> ContextId {
        let hex = hex::encode(init_code);
        match self.match_creation(&hex) {
            Some(id) => id,
            None => self.insert_bare(hex, init_code.clone(), true),
        }
    }

    /// Re-match every instance against the current contexts, moving instances
    /// from bare contexts to richer ones registered since. Returns the number
    /// of instances that changed context.
    pub fn refresh_instances(&mut self) -> usize {
        let updates: Vec<(Address, ContextId)> = self
            .instances
            .values()
            .filter_map(|instance| {
                let matched = self.match_runtime(&hex::encode(&instance.binary))?;
                (matched != instance.context).then_some((instance.address, matched))
            })
            .collect();

        for (address, context) in &updates {
            if let Some(instance) = self.instances.get_mut(address) {
                debug!(%address, context = %context, "Instance moved to a new context");
                instance.context = *context;
            }
        }
        updates.len()
    }

    /// Look up a context
    pub fn context(&self, id: &ContextId) -> Option<&Context> {
        self.contexts.get(id)
    }

    /// Look up a context, failing if it is unknown
    pub fn try_context(&self, id: &ContextId) -> Result<&Context, RegistryError> {
        self.context(id).ok_or(RegistryError::UnknownContext(*id))
    }

    /// Look up an instance
    pub fn instance(&self, address: &Address) -> Option<&Instance> {
        self.instances.get(address)
    }

    /// Context of the code deployed at `address`
    pub fn context_of(&self, address: &Address) -> Option<&Context> {
        self.instance(address).and_then(|i| self.context(&i.context))
    }

    /// All contexts
    pub fn contexts(&self) -> impl Iterator<Item = &Context> {
        self.contexts.values()
    }

    /// All instances
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Find the context of deployed code, preferring contexts with metadata:
    /// an exact non-bare match, then an unlinked template, then a bare exact match.
    fn match_runtime(&self, hex: &str) -> Option<ContextId> {
        let exact = self.contexts.get(&binary_hash(hex));
        if let Some(ctx) = exact.filter(|c| !c.is_bare()) {
            return Some(ctx.id);
        }

        self.contexts
            .values()
            .filter(|c| !c.metadata.is_constructor && c.is_unlinked() && !c.is_bare())
            .filter(|c| matches_with_wildcards(&c.binary, &c.link_ranges, hex))
            .map(|c| c.id)
            .min()
            .or_else(|| exact.map(|c| c.id))
    }

    fn match_creation(&self, hex: &str) -> Option<ContextId> {
        self.contexts
            .values()
            .filter(|c| c.metadata.is_constructor && !c.binary.is_empty())
            .filter(|c| matches_prefix_with_wildcards(&c.binary, &c.link_ranges, hex))
            .max_by(|a, b| {
                a.binary
                    .len()
                    .cmp(&b.binary.len())
                    .then(a.is_bare().cmp(&b.is_bare()).reverse())
                    .then(b.id.cmp(&a.id))
            })
            .map(|c| c.id)
    }

    fn insert_bare(&mut self, hex: String, bytes: Bytes, is_constructor: bool) -> ContextId {
        let id = binary_hash(&hex);
        self.contexts.entry(id).or_insert_with(|| {
            debug!(context = %id, constructor = is_constructor, "Created bare context");
            let metadata = ContextMetadata { is_constructor, ..Default::default() };
            Context::new(id, hex, bytes, metadata)
        });
        id
    }
}

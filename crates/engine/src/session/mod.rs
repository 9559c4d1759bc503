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

//! Debugging session.
//!
//! A [`Session`] owns everything needed to replay one transaction: the trace
//! and its cursor, the context/instance registry, the user sources, the Codex,
//! the function-depth tracker and the transaction log. There is no shared
//! state between sessions.
//!
//! Every stepping operation (`step_next`, `step_over`, `continue_until`...) is a loop over
//! [`Session::step`], which processes exactly one recorded instruction.
//! All state is consistent between two calls to `step`, which is where
//! interruption is observed.

mod depth;
mod stepping;

pub use depth::FunctionDepth;
pub use stepping::{StepOutcome, StopReason};

use std::{
    cell::RefCell,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use alloy_primitives::{Address, BlockNumber, Bytes, B256, U256};
use rdb_common::types::{
    Breakpoint, CallNode, CallScheme, ContextId, Instruction, JumpType, Location, SourceFile,
    StorageValue, TransactionLog,
};
use revm::bytecode::OpCode;
use tracing::{debug, info, trace};

use crate::{
    codex::{Codex, CodexFrame},
    config::DebuggerConfig,
    effect::{classify, Effect},
    provider::{CodeProvider, StorageProvider},
    registry::{Context, Registry},
    source::{self, SourceRegistry},
    trace::TraceStore,
    txlog::{call_kind, TransactionLogBuilder},
};

/// The transaction being replayed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionInfo {
    /// Sender
    pub from: Address,
    /// Recipient, `None` for a creation transaction
    pub to: Option<Address>,
    /// Value sent
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// Block the transaction ran in, passed on to providers
    pub block: Option<BlockNumber>,
    /// Address of the contract deployed by a creation transaction, if known
    pub contract_address: Option<Address>,
}

impl TransactionInfo {
    /// A message call to `to`
    pub fn call(from: Address, to: Address, input: impl Into<Bytes>) -> Self {
        Self { from, to: Some(to), input: input.into(), ..Default::default() }
    }

    /// A contract creation
    pub fn create(from: Address, init_code: impl Into<Bytes>) -> Self {
        Self { from, to: None, input: init_code.into(), ..Default::default() }
    }

    /// Set the value sent
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Set the address a creation transaction deploys to
    pub fn with_contract_address(mut self, address: Address) -> Self {
        self.contract_address = Some(address);
        self
    }

    /// Set the block
    pub fn with_block(mut self, block: BlockNumber) -> Self {
        self.block = Some(block);
        self
    }
}

/// Cloneable flag that asks a running stepping operation to stop at the next
/// instruction boundary
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    /// Request an interruption
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether an interruption is pending
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Withdraw a pending interruption
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Consume a pending interruption
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Builder for [`Session`]
pub struct SessionBuilder {
    tx: TransactionInfo,
    steps: Vec<Instruction>,
    config: DebuggerConfig,
    registry: Registry,
    sources: SourceRegistry,
    code_provider: Option<Box<dyn CodeProvider>>,
    storage_provider: Option<Box<dyn StorageProvider>>,
}

impl SessionBuilder {
    /// Use `config` instead of the default configuration
    pub fn with_config(mut self, config: DebuggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from a pre-populated registry
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Start from a pre-populated source registry
    pub fn with_sources(mut self, sources: SourceRegistry) -> Self {
        self.sources = sources;
        self
    }

    /// Register one user source
    pub fn with_source(mut self, file: SourceFile) -> Self {
        self.sources.add(file);
        self
    }

    /// Fetch code of unknown addresses from `provider`
    pub fn with_code_provider(mut self, provider: impl CodeProvider + 'static) -> Self {
        self.code_provider = Some(Box::new(provider));
        self
    }

    /// Fetch untouched storage slots from `provider`
    pub fn with_storage_provider(mut self, provider: impl StorageProvider + 'static) -> Self {
        self.storage_provider = Some(Box::new(provider));
        self
    }

    /// Build the session, positioned at the first step
    pub fn build(self) -> Session {
        let mut session = Session {
            trace: TraceStore::new(self.steps),
            registry: self.registry,
            sources: self.sources,
            codex: Codex::new(CodexFrame::new(None, Address::ZERO)),
            depth: FunctionDepth::new(false),
            txlog: None,
            breakpoints: Vec::new(),
            code_provider: self.code_provider,
            storage_provider: self.storage_provider,
            interrupt: InterruptHandle::default(),
            location: RefCell::new(None),
            finished_frame: None,
            context_changes: 0,
            tx: self.tx,
            config: self.config,
        };
        session.start();
        info!(
            steps = session.trace.len(),
            to = ?session.tx.to,
            context = ?session.codex.current().context,
            "Debugging session ready"
        );
        session
    }
}

/// Replay state of one transaction
pub struct Session {
    config: DebuggerConfig,
    tx: TransactionInfo,
    trace: TraceStore,
    registry: Registry,
    sources: SourceRegistry,
    codex: Codex,
    depth: FunctionDepth,
    txlog: Option<TransactionLogBuilder>,
    breakpoints: Vec<Breakpoint>,
    code_provider: Option<Box<dyn CodeProvider>>,
    storage_provider: Option<Box<dyn StorageProvider>>,
    interrupt: InterruptHandle,
    /// Location of the cursor, keyed by cursor index
    location: RefCell<Option<(usize, Location)>>,
    /// Executing frame (address, context) of the final step, once finished
    finished_frame: Option<(Option<Address>, Option<ContextId>)>,
    context_changes: usize,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tx", &self.tx)
            .field("index", &self.trace.index())
            .field("finished", &self.trace.is_finished())
            .field("call_depth", &self.codex.depth())
            .field("function_depth", &self.depth.current())
            .finish_non_exhaustive()
    }
}

/// What one step does besides its Codex effect
#[derive(Debug, Default)]
struct StepExtras {
    jump: Option<JumpType>,
    function: Option<(Option<String>, Option<i64>)>,
    status_word: bool,
}

impl Session {
    /// Start building a session replaying `steps` of `tx`
    pub fn builder(tx: TransactionInfo, steps: Vec<Instruction>) -> SessionBuilder {
        SessionBuilder {
            tx,
            steps,
            config: DebuggerConfig::default(),
            registry: Registry::new(),
            sources: SourceRegistry::new(),
            code_provider: None,
            storage_provider: None,
        }
    }

    /// (Re)initialise the dynamic state for the first step
    fn start(&mut self) {
        let (address, context, is_create) = match self.tx.to {
            Some(to) => (Some(to), self.resolve_instance(to), false),
            None => {
                let context = self.registry.creation_context(&self.tx.input);
                (self.tx.contract_address, Some(context), true)
            }
        };

        let mut root = CodexFrame::new(address, address.unwrap_or_default());
        root.context = context;
        root.sender = self.tx.from;
        root.value = self.tx.value;
        root.input = self.tx.input.clone();
        root.is_create = is_create;

        let root_context = context.and_then(|id| self.registry.context(&id));
        let phantom = source::requires_phantom_frame(root_context, &self.config.phantom_frame_min_version);

        self.txlog = self.config.build_transaction_log.then(|| {
            let scheme = if is_create { CallScheme::Create } else { CallScheme::Call };
            let node = CallNode {
                scheme,
                kind: call_kind(scheme, root_context, &self.tx.input),
                caller: self.tx.from,
                address,
                code_address: address,
                context,
                value: self.tx.value,
                input: self.tx.input.clone(),
                status: None,
                output: None,
            };
            TransactionLogBuilder::new(self.tx.from, self.tx.to, node)
        });

        self.codex = Codex::new(root);
        self.depth = FunctionDepth::new(phantom);
        self.location.replace(None);
        self.finished_frame = None;
        self.context_changes = 0;
    }

    /// Context of the code at `address`, discovering it through the code
    /// provider if no instance is registered yet
    fn resolve_instance(&mut self, address: Address) -> Option<ContextId> {
        if let Some(instance) = self.registry.instance(&address) {
            return Some(instance.context);
        }
        let code = self.code_provider.as_ref()?.code_at(address, self.tx.block)?;
        if code.is_empty() {
            return None;
        }
        debug!(%address, size = code.len(), "Discovered instance through the code provider");
        Some(self.registry.add_instance(address, code))
    }

    fn current_context(&self) -> Option<&Context> {
        self.codex.current().context.and_then(|id| self.registry.context(&id))
    }

    /// Everything a step needs that is read from the trace and the sources
    fn step_extras(&self, current: &Instruction, next: Option<&Instruction>) -> StepExtras {
        let mut extras = StepExtras {
            status_word: next.and_then(|n| n.stack_peek(0)).is_some_and(|w| !w.is_zero()),
            ..Default::default()
        };

        let Some(next) = next else { return extras };
        let taken = match current.opcode() {
            Some(OpCode::JUMP) => true,
            Some(OpCode::JUMPI) => next.pc != current.pc + 1,
            _ => false,
        };
        if !taken || next.depth != current.depth {
            return extras;
        }

        let context = self.current_context();
        let jump = context.map(|c| c.instruction_table().position(current.pc).jump);
        if jump == Some(JumpType::In) {
            let target = source::locate(&self.sources, context, None, next.pc);
            extras.function = Some(match target.node.filter(|n| n.is_function_definition()) {
                Some(node) => (node.name, Some(node.id)),
                None => (None, None),
            });
        }
        extras.jump = jump;
        extras
    }

    /// Process the instruction under the cursor and move past it
    pub fn step(&mut self) -> StepOutcome {
        if self.trace.is_finished() {
            return StepOutcome::Finished;
        }
        let index = self.trace.index();
        let Some(current) = self.trace.current() else {
            return StepOutcome::Finished;
        };
        let next = self.trace.next();
        let mut effect = classify(current, next);
        let extras = self.step_extras(current, next);
        let executing = (self.codex.current().address, self.codex.current().context);

        // Fill in what the step alone does not tell
        match &mut effect {
            Some(Effect::Create { address, salt, init_code, .. }) => {
                *address = self.trace.created_address(index).or_else(|| {
                    let creator = self.codex.current().storage_address;
                    salt.map(|salt| creator.create2_from_code(salt.0, init_code))
                });
            }
            Some(Effect::Load { slot, value: value @ None }) => {
                let owner = self.codex.current().storage_address;
                if self.codex.current().storage(&owner, slot).is_none() {
                    if let Some(provider) = &self.storage_provider {
                        *value = provider.storage_at(owner, *slot, self.tx.block);
                    }
                }
            }
            _ => {}
        }

        if let Some(effect) = &effect {
            self.apply(index, effect, &extras);
        }

        match extras.jump {
            Some(JumpType::In) => {
                self.depth.jump_in();
                if let (Some(txlog), Some((name, id))) = (&mut self.txlog, extras.function) {
                    txlog.on_jump_in(index, name, id);
                }
            }
            Some(JumpType::Out) => {
                self.depth.jump_out();
                if let Some(txlog) = &mut self.txlog {
                    txlog.on_jump_out();
                }
            }
            _ => {}
        }

        self.trace.advance();
        if self.trace.is_finished() {
            self.finished_frame = Some(executing);
            debug!(steps = self.trace.len(), "Reached the end of the trace");
            return StepOutcome::Finished;
        }
        StepOutcome::Continue
    }

    fn apply(&mut self, index: usize, effect: &Effect, extras: &StepExtras) {
        trace!(index, ?effect, "Applying effect");
        let caller = self.codex.current().storage_address;

        let callee = match effect {
            Effect::Call { address, .. } => self.resolve_instance(*address),
            Effect::Create { init_code, .. } => Some(self.registry.creation_context(init_code)),
            _ => None,
        };
        let callee_context = callee.and_then(|id| self.registry.context(&id));

        if let Some(txlog) = &mut self.txlog {
            match effect {
                Effect::Call { scheme, address, value, input, instantaneous } => {
                    let scheme = CallScheme::from(*scheme);
                    let storage = match scheme {
                        CallScheme::Call | CallScheme::StaticCall => *address,
                        _ => caller,
                    };
                    let node = CallNode {
                        scheme,
                        kind: call_kind(scheme, callee_context, input),
                        caller,
                        address: Some(storage),
                        code_address: Some(*address),
                        context: callee,
                        value: *value,
                        input: input.clone(),
                        status: None,
                        output: None,
                    };
                    if *instantaneous {
                        txlog.on_instantaneous(index, node, extras.status_word);
                    } else {
                        txlog.on_call(index, node);
                    }
                }
                Effect::Create { address, value, init_code, salt, instantaneous } => {
                    let scheme = if salt.is_some() { CallScheme::Create2 } else { CallScheme::Create };
                    let node = CallNode {
                        scheme,
                        kind: call_kind(scheme, callee_context, init_code),
                        caller,
                        address: *address,
                        code_address: *address,
                        context: callee,
                        value: *value,
                        input: init_code.clone(),
                        status: None,
                        output: None,
                    };
                    if *instantaneous {
                        txlog.on_instantaneous(index, node, extras.status_word);
                    } else {
                        txlog.on_call(index, node);
                    }
                }
                Effect::Return { data, beneficiary } => {
                    txlog.on_return(index, data.clone(), beneficiary.map(|b| (caller, b)));
                }
                Effect::Fail { data, error, reverted } => {
                    txlog.on_fail(index, data.clone(), error.clone(), *reverted);
                }
                Effect::Log { topics, data } => {
                    txlog.on_log(index, caller, topics.clone(), data.clone());
                }
                Effect::Store { .. } | Effect::Load { .. } => {}
            }
        }

        let phantom = matches!(effect, Effect::Call { .. })
            && source::requires_phantom_frame(callee_context, &self.config.phantom_frame_min_version);

        let ending = self.codex.current().clone();
        let frames = self.codex.depth();
        self.codex.apply(effect, callee);

        if effect.pushes_frame() {
            self.depth.enter_call(phantom);
            self.context_changes += 1;
        } else if effect.pops_frame() {
            if self.codex.depth() < frames {
                self.depth.exit_call();
            }
            self.context_changes += 1;
        }

        if let (Effect::Return { data, beneficiary: None }, true) = (effect, ending.is_create) {
            match ending.address {
                Some(address) => {
                    let context = self.registry.add_instance(address, data.clone());
                    debug!(%address, context = %context, "Registered created contract");
                }
                None => debug!("Creation returned without a known address"),
            }
        }
    }

    /// Rewind to the first step. Registries, sources and breakpoints are kept.
    pub(crate) fn rewind(&mut self) {
        self.trace.reset();
        self.interrupt.clear();
        self.start();
        info!("Session reset");
    }

    /// The configuration
    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    /// The transaction being replayed
    pub fn transaction(&self) -> &TransactionInfo {
        &self.tx
    }

    /// The trace and its cursor
    pub fn trace(&self) -> &TraceStore {
        &self.trace
    }

    /// The context/instance registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the registry, e.g. to register contexts found late.
    /// Call [`Registry::refresh_instances`] afterwards.
    pub fn registry_mut(&mut self) -> &mut Registry {
        self.location.replace(None);
        &mut self.registry
    }

    /// The user sources
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// The Codex
    pub fn codex(&self) -> &Codex {
        &self.codex
    }

    /// Cursor position
    pub fn index(&self) -> usize {
        self.trace.index()
    }

    /// Whether the whole trace has been replayed
    pub fn is_finished(&self) -> bool {
        self.trace.is_finished()
    }

    /// Instruction under the cursor
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.trace.current()
    }

    /// Source-level function depth
    pub fn function_depth(&self) -> usize {
        self.depth.current()
    }

    /// Number of active external frames, at least 1
    pub fn call_depth(&self) -> usize {
        self.codex.depth()
    }

    /// Handle to interrupt stepping from another thread
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// The transaction log built so far, if enabled
    pub fn transaction_log(&self) -> Option<&TransactionLog> {
        self.txlog.as_ref().map(TransactionLogBuilder::log)
    }

    /// Address and context of the code running the current instruction
    fn executing(&self) -> (Option<Address>, Option<ContextId>) {
        self.finished_frame
            .unwrap_or_else(|| (self.codex.current().address, self.codex.current().context))
    }

    /// Location of the instruction under the cursor
    pub fn location(&self) -> Location {
        let index = self.trace.index();
        if let Some((cached, location)) = &*self.location.borrow() {
            if *cached == index {
                return location.clone();
            }
        }

        let pc = self.trace.current().map(|i| i.pc).unwrap_or_default();
        let (address, context) = self.executing();
        let context = context.and_then(|id| self.registry.context(&id));
        let location = source::locate(&self.sources, context, address, pc);
        self.location.replace(Some((index, location.clone())));
        location
    }

    /// Whether the current instruction is the last one of its source range
    pub fn is_source_range_final(&self) -> bool {
        let (Some(current), Some(next)) = (self.trace.current(), self.trace.next()) else {
            return true;
        };
        let effect = classify(current, Some(next));
        let changes_context = effect.as_ref().is_some_and(|e| e.pushes_frame() || e.pops_frame());
        let next_pc = (!changes_context && next.depth == current.depth).then_some(next.pc);
        let context = self.executing().1.and_then(|id| self.registry.context(&id));
        source::is_source_range_final(&self.sources, context, current.pc, next_pc)
    }

    /// Value of `slot` in the storage of the executing account, as far as the
    /// trace has revealed it
    pub fn storage(&self, slot: B256) -> StorageValue {
        let owner = self.codex.current().storage_address;
        self.codex.storage_at(&owner, &slot)
    }

    /// Value of `slot` of `address` as seen by the current frame
    pub fn storage_of(&self, address: Address, slot: B256) -> StorageValue {
        self.codex.storage_at(&address, &slot)
    }

    /// Like [`Session::storage_of`], but asks the storage provider about
    /// unknown slots and back-fills the answer into every frame
    pub fn fetch_storage(&mut self, address: Address, slot: B256) -> StorageValue {
        let known = self.codex.storage_at(&address, &slot);
        if known.is_known() {
            return known;
        }
        let Some(value) = self
            .storage_provider
            .as_ref()
            .and_then(|p| p.storage_at(address, slot, self.tx.block))
        else {
            return StorageValue::Unknown;
        };
        self.codex.backfill(address, slot, value);
        StorageValue::Known(value)
    }

    /// Registered breakpoints
    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Register a breakpoint. Returns `false` if it was already registered.
    pub fn add_breakpoint(&mut self, breakpoint: Breakpoint) -> bool {
        if self.breakpoints.contains(&breakpoint) {
            return false;
        }
        debug!(%breakpoint, "Added breakpoint");
        self.breakpoints.push(breakpoint);
        true
    }

    /// Remove a breakpoint. Returns `false` if it was not registered.
    pub fn remove_breakpoint(&mut self, breakpoint: &Breakpoint) -> bool {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|b| b != breakpoint);
        before != self.breakpoints.len()
    }

    /// Remove all breakpoints
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }
}

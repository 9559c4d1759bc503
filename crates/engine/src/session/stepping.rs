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

//! Source-level stepping.
//!
//! Every operation here is a loop over [`Session::step`]. Between two steps
//! the loop polls the interrupt flag and the per-operation step budget; both
//! stop the operation at an instruction boundary.

use rdb_common::types::{Breakpoint, Location};
use serde::Serialize;
use tracing::debug;

use super::Session;

/// Why a stepping operation stopped before the end of the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "breakpoint", rename_all = "camelCase")]
pub enum StopReason {
    /// The operation reached its target
    StepComplete,
    /// A breakpoint fired
    Breakpoint(Breakpoint),
    /// An interruption was requested
    Interrupted,
    /// The per-operation step budget ran out
    StepLimit,
}

/// Result of a step or of a stepping operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "stop", rename_all = "camelCase")]
pub enum StepOutcome {
    /// A single step was taken and the trace has more steps
    Continue,
    /// The operation stopped with the trace not yet finished
    StoppedAt(StopReason),
    /// The trace is finished
    Finished,
}

impl StepOutcome {
    /// Whether the trace is finished
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Reasons to abandon an operation between two steps
#[derive(Debug, Clone, Copy)]
enum Interruption {
    Interrupted,
    StepLimit,
}

impl From<Interruption> for StopReason {
    fn from(interruption: Interruption) -> Self {
        match interruption {
            Interruption::Interrupted => Self::Interrupted,
            Interruption::StepLimit => Self::StepLimit,
        }
    }
}

#[derive(Debug)]
struct Budget {
    remaining: Option<usize>,
}

const STOPPED: StepOutcome = StepOutcome::StoppedAt(StopReason::StepComplete);

/// Whether two locations start on the same known line
fn same_line(a: &Location, b: &Location) -> bool {
    a.source_id() == b.source_id() && a.start_line().is_some() && a.start_line() == b.start_line()
}

impl Session {
    /// One step, unless interrupted or out of budget
    fn tick(&mut self, budget: &mut Budget) -> Result<StepOutcome, Interruption> {
        if self.interrupt.take() {
            debug!(index = self.index(), "Stepping interrupted");
            return Err(Interruption::Interrupted);
        }
        if let Some(remaining) = &mut budget.remaining {
            if *remaining == 0 {
                debug!(index = self.index(), "Step budget exhausted");
                return Err(Interruption::StepLimit);
            }
            *remaining -= 1;
        }
        Ok(self.step())
    }

    fn run(
        &mut self,
        operation: &'static str,
        body: impl FnOnce(&mut Self, &mut Budget) -> Result<StepOutcome, Interruption>,
    ) -> StepOutcome {
        if self.is_finished() {
            return StepOutcome::Finished;
        }
        let start = self.index();
        let mut budget = Budget { remaining: self.config.max_steps_per_operation };
        let outcome = body(self, &mut budget).unwrap_or_else(|i| StepOutcome::StoppedAt(i.into()));
        debug!(operation, from = start, to = self.index(), ?outcome, "Stepping operation done");
        outcome
    }

    /// Whether `step_next` passes over `location` without stopping
    fn is_skippable(&self, location: &Location, allow_internal: bool) -> bool {
        location.position.is_unmapped()
            || location.position.length == 0
            || location.node.as_ref().is_some_and(|n| n.is_skipped())
            || (location.internal && !allow_internal)
    }

    fn allow_internal(&self, start: &Location) -> bool {
        self.config.step_into_internal_sources || start.internal
    }

    fn next_inner(
        &mut self,
        budget: &mut Budget,
        allow_internal: bool,
    ) -> Result<StepOutcome, Interruption> {
        let start = self.location();
        let changes = self.context_changes;
        loop {
            if self.tick(budget)?.is_finished() {
                return Ok(StepOutcome::Finished);
            }
            let current = self.location();
            if self.is_skippable(&current, allow_internal) {
                continue;
            }
            if !current.position.same_range(&start.position)
                || current.context != start.context
                || self.context_changes != changes
            {
                return Ok(STOPPED);
            }
        }
    }

    fn over_inner(&mut self, budget: &mut Budget) -> Result<StepOutcome, Interruption> {
        let start = self.location();
        let depth = self.function_depth();
        let allow_internal = self.allow_internal(&start);
        loop {
            if self.next_inner(budget, allow_internal)?.is_finished() {
                return Ok(StepOutcome::Finished);
            }
            let current_depth = self.function_depth();
            if current_depth < depth {
                return Ok(STOPPED);
            }
            if current_depth > depth || same_line(&start, &self.location()) {
                continue;
            }
            return Ok(STOPPED);
        }
    }

    /// Advance to the next instruction that starts a different, stoppable
    /// source range
    pub fn step_next(&mut self) -> StepOutcome {
        self.run("step_next", |session, budget| {
            let start = session.location();
            let allow_internal = session.allow_internal(&start);
            session.next_inner(budget, allow_internal)
        })
    }

    /// Step until entering a function, or until the source line changes
    pub fn step_into(&mut self) -> StepOutcome {
        self.run("step_into", |session, budget| {
            let start = session.location();
            let depth = session.function_depth();
            let allow_internal = session.allow_internal(&start);
            loop {
                if session.next_inner(budget, allow_internal)?.is_finished() {
                    return Ok(StepOutcome::Finished);
                }
                if session.function_depth() > depth || !same_line(&start, &session.location()) {
                    return Ok(STOPPED);
                }
            }
        })
    }

    /// Step until the current function returns. On a statement spanning
    /// several lines this steps over the statement instead.
    pub fn step_out(&mut self) -> StepOutcome {
        self.run("step_out", |session, budget| {
            let start = session.location();
            if start.is_multiline() {
                return session.over_inner(budget);
            }
            let depth = session.function_depth();
            let allow_internal = session.allow_internal(&start);
            loop {
                if session.next_inner(budget, allow_internal)?.is_finished() {
                    return Ok(StepOutcome::Finished);
                }
                if session.function_depth() < depth {
                    return Ok(STOPPED);
                }
            }
        })
    }

    /// Step to the next line at the current function depth, or out of the
    /// current function, without stopping in functions it calls
    pub fn step_over(&mut self) -> StepOutcome {
        self.run("step_over", Self::over_inner)
    }

    /// Run until one of the registered breakpoints fires
    pub fn continue_until_breakpoint(&mut self) -> StepOutcome {
        let breakpoints = self.breakpoints.clone();
        self.continue_until(&breakpoints)
    }

    /// Run until one of `breakpoints` fires.
    ///
    /// A breakpoint fires on the step where it starts to match: a source
    /// range spanning several instructions stops execution once per entry.
    /// When started in user code without stepping into internal sources, the
    /// previous location only follows user code, so an excursion into
    /// compiler-generated code does not re-arm the breakpoint it came from.
    pub fn continue_until(&mut self, breakpoints: &[Breakpoint]) -> StepOutcome {
        self.run("continue", |session, budget| {
            let mut previous = session.location();
            let guard_user = !session.config.step_into_internal_sources && !previous.internal;
            loop {
                if session.tick(budget)?.is_finished() {
                    return Ok(StepOutcome::Finished);
                }
                let current = session.location();
                if let Some(hit) =
                    breakpoints.iter().find(|bp| bp.is_hit(&current) && !bp.is_hit(&previous))
                {
                    debug!(breakpoint = %hit, index = session.index(), "Breakpoint hit");
                    return Ok(StepOutcome::StoppedAt(StopReason::Breakpoint(*hit)));
                }
                if !guard_user || !current.internal {
                    previous = current;
                }
            }
        })
    }

    /// Run to the end of the trace, ignoring breakpoints
    pub fn run_to_end(&mut self) -> StepOutcome {
        self.run("run_to_end", |session, budget| loop {
            if session.tick(budget)?.is_finished() {
                return Ok(StepOutcome::Finished);
            }
        })
    }

    /// Take `count` steps, or fewer if the trace ends first
    pub fn advance(&mut self, count: usize) -> StepOutcome {
        self.run("advance", |session, budget| {
            for _ in 0..count {
                if session.tick(budget)?.is_finished() {
                    return Ok(StepOutcome::Finished);
                }
            }
            Ok(STOPPED)
        })
    }

    /// Rewind to the first step. The registries, sources and breakpoints are
    /// kept; the Codex, function depth and transaction log start over.
    pub fn reset(&mut self) {
        self.rewind();
    }
}

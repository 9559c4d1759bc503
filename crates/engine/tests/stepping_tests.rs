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

//! Source-level stepping over internal function calls and generated sources.

mod utils;

use rdb_common::types::{
    AstNode, Breakpoint, CompilerInfo, JumpType, LogEntryKind, SourceFile, SourceMapEntry,
};
use rdb_engine::{ContextMetadata, DebuggerConfig, Registry, Session, StepOutcome, StopReason};
use revm::bytecode::OpCode;
use tracing::info;
use utils::*;

const TEXT: &str = "contract C {
  function f() public {
    g();
    x = 1;
  }
  function g() internal {
    y = 2;
  }
}
";

const G: &str = "function g() internal {\n    y = 2;\n  }";
const F: &str = "function f() public {\n    g();\n    x = 1;\n  }";

const STOPPED: StepOutcome = StepOutcome::StoppedAt(StopReason::StepComplete);

fn entry(needle: &str) -> SourceMapEntry {
    let (start, length) = range_of(TEXT, needle);
    SourceMapEntry::new(0, start, length)
}

/// `f` calls `g` through a tagged jump and then assigns `x`
///
/// | index | pc | op       | source     |
/// |-------|----|----------|------------|
/// | 0     | 0  | JUMPDEST | `g();`     |
/// | 1     | 1  | JUMP in  | `g();`     |
/// | 2     | 2  | JUMPDEST | function g |
/// | 3     | 3  | JUMPDEST | `y = 2;`   |
/// | 4     | 4  | JUMP out | function g |
/// | 5     | 5  | JUMPDEST | `x = 1;`   |
/// | 6     | 6  | STOP     | function f |
fn function_call_session(config: DebuggerConfig) -> Session {
    let code = [0x5b, 0x56, 0x5b, 0x5b, 0x56, 0x5b, 0x00];
    let map = vec![
        entry("g();"),
        entry("g();").with_jump(JumpType::In),
        entry(G),
        entry("y = 2;"),
        entry(G).with_jump(JumpType::Out),
        entry("x = 1;"),
        entry(F),
    ];
    let mut registry = Registry::new();
    deploy(&mut registry, CONTRACT, &code, map, ContextMetadata::new("C"));

    let (g_start, g_len) = range_of(TEXT, G);
    let (f_start, f_len) = range_of(TEXT, F);
    let source = SourceFile::new(0, "C.sol", TEXT).with_ast(vec![
        AstNode::new(1, "SourceUnit", 0, TEXT.len()),
        AstNode::new(10, "FunctionDefinition", f_start, f_len).with_name("f"),
        AstNode::new(20, "FunctionDefinition", g_start, g_len).with_name("g"),
    ]);
    call_session(registry, vec![source], straight_line(&code, 1), config)
}

#[test]
fn test_step_next_stops_at_new_range() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = function_call_session(DebuggerConfig::default());
    assert_eq!(session.location().start_line(), Some(3));
    assert_eq!(session.step_next(), STOPPED);
    assert_eq!(session.index(), 2);
    assert_eq!(session.function_depth(), 2);
    assert_eq!(session.location().node.and_then(|n| n.name), Some("g".to_string()));
}

#[test]
fn test_step_into_enters_function() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = function_call_session(DebuggerConfig::default());
    assert_eq!(session.function_depth(), 1);
    assert_eq!(session.step_into(), STOPPED);
    assert_eq!(session.index(), 2);
    assert_eq!(session.function_depth(), 2);

    assert_eq!(session.step_into(), STOPPED);
    assert_eq!(session.location().start_line(), Some(7));
}

#[test]
fn test_step_over_skips_function_body() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = function_call_session(DebuggerConfig::default());
    let depth = session.function_depth();
    assert_eq!(session.step_over(), STOPPED);
    assert_eq!(session.index(), 5);
    assert!(session.function_depth() <= depth);
    assert_eq!(session.location().start_line(), Some(4));

    assert_eq!(session.step_over(), STOPPED);
    assert_eq!(session.index(), 6);
    assert_eq!(session.step_over(), StepOutcome::Finished);
}

#[test]
fn test_step_out_returns_to_caller() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = function_call_session(DebuggerConfig::default());
    session.advance(3);
    assert_eq!(session.location().start_line(), Some(7));
    assert_eq!(session.function_depth(), 2);

    assert_eq!(session.step_out(), STOPPED);
    assert_eq!(session.index(), 5);
    assert_eq!(session.function_depth(), 1);
}

#[test]
fn test_step_out_of_multiline_statement_steps_over_it() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = function_call_session(DebuggerConfig::default());
    session.advance(2);
    assert!(session.location().is_multiline());

    assert_eq!(session.step_out(), STOPPED);
    assert_eq!(session.index(), 3);
    assert_eq!(session.function_depth(), 2);
}

#[test]
fn test_internal_function_in_transaction_log() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = function_call_session(DebuggerConfig::default());
    session.run_to_end();
    let log = session.transaction_log().unwrap();

    assert_eq!(log.len(), 3);
    assert_eq!(
        log[2].kind,
        LogEntryKind::InternalCall { function: Some("g".into()), node_id: Some(20), returned: true }
    );
    assert_eq!(log[2].step, 1);
    assert!(log.render_tree().contains('g'));

    let disabled = function_call_session(DebuggerConfig::default().with_transaction_log(false));
    assert!(disabled.transaction_log().is_none());
}

/// User code around two instructions of a generated source
///
/// | index | source              |
/// |-------|---------------------|
/// | 0     | `x = 1;`            |
/// | 1     | internal `{ a }`    |
/// | 2     | internal `{ b }`    |
/// | 3     | `y = 2;`            |
/// | 4     | function f          |
fn internal_source_session(config: DebuggerConfig) -> Session {
    let code = [0x5b, 0x5b, 0x5b, 0x5b, 0x00];
    let map = vec![
        entry("x = 1;"),
        SourceMapEntry::new(5, 0, 5),
        SourceMapEntry::new(5, 6, 5),
        entry("y = 2;"),
        entry(F),
    ];
    let metadata = ContextMetadata::new("C")
        .with_internal_source(SourceFile::new(5, "#utility.yul", "{ a }\n{ b }"));
    let mut registry = Registry::new();
    deploy(&mut registry, CONTRACT, &code, map, metadata);
    call_session(registry, vec![SourceFile::new(0, "C.sol", TEXT)], straight_line(&code, 1), config)
}

#[test]
fn test_internal_sources_are_skipped_by_default() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = internal_source_session(DebuggerConfig::default());
    assert!(!session.is_source_range_final());
    assert_eq!(session.step_next(), STOPPED);
    assert_eq!(session.index(), 3);
    assert!(!session.location().internal);
}

#[test]
fn test_internal_sources_when_enabled_or_started_inside() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session =
        internal_source_session(DebuggerConfig::default().with_step_into_internal_sources(true));
    assert_eq!(session.step_next(), STOPPED);
    assert_eq!(session.index(), 1);
    assert!(session.location().internal);
    assert_eq!(session.location().start_line(), Some(1));

    let mut session = internal_source_session(DebuggerConfig::default());
    session.advance(1);
    assert!(session.location().internal);
    assert_eq!(session.step_next(), STOPPED);
    assert_eq!(session.index(), 2);
    assert_eq!(session.location().start_line(), Some(2));
    assert!(session.is_source_range_final());
}

#[test]
fn test_breakpoints_in_internal_sources_fire() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = internal_source_session(DebuggerConfig::default());
    let breakpoint = Breakpoint::line(5, 2);
    assert_eq!(
        session.continue_until(&[breakpoint]),
        StepOutcome::StoppedAt(StopReason::Breakpoint(breakpoint))
    );
    assert_eq!(session.index(), 2);
}

#[test]
fn test_user_breakpoint_is_not_rearmed_by_internal_code() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    // x = 1; -> internal -> x = 1; must stop once only
    let code = [0x5b, 0x5b, 0x5b, 0x00];
    let map = vec![
        entry("g();"),
        entry("x = 1;"),
        SourceMapEntry::new(5, 0, 5),
        entry("x = 1;"),
    ];
    let metadata =
        ContextMetadata::new("C").with_internal_source(SourceFile::new(5, "#utility.yul", "{ a }"));
    let mut registry = Registry::new();
    deploy(&mut registry, CONTRACT, &code, map, metadata);
    let steps = straight_line(&code, 1);

    let mut session = call_session(
        registry.clone(),
        vec![SourceFile::new(0, "C.sol", TEXT)],
        steps.clone(),
        DebuggerConfig::default(),
    );
    session.add_breakpoint(Breakpoint::line(0, 4));
    assert!(matches!(session.continue_until_breakpoint(), StepOutcome::StoppedAt(_)));
    assert_eq!(session.index(), 1);
    assert_eq!(session.continue_until_breakpoint(), StepOutcome::Finished);

    // Stepping into internal sources turns the excursion into a real exit
    let mut session = call_session(
        registry,
        vec![SourceFile::new(0, "C.sol", TEXT)],
        steps,
        DebuggerConfig::default().with_step_into_internal_sources(true),
    );
    session.add_breakpoint(Breakpoint::line(0, 4));
    session.continue_until_breakpoint();
    assert_eq!(session.index(), 1);
    assert!(matches!(session.continue_until_breakpoint(), StepOutcome::StoppedAt(_)));
    assert_eq!(session.index(), 3);
}

fn solc_session(callee_version: &str, caller_version: &str) -> Session {
    let mut registry = Registry::new();
    deploy(
        &mut registry,
        CONTRACT,
        &[0xf1, 0x00],
        vec![],
        ContextMetadata::new("Caller").with_compiler(CompilerInfo::solc(caller_version).unwrap()),
    );
    deploy(
        &mut registry,
        OTHER,
        &[0x00],
        vec![],
        ContextMetadata::new("Callee").with_compiler(CompilerInfo::solc(callee_version).unwrap()),
    );
    let steps = vec![
        step(0, OpCode::CALL, 1).with_stack([
            word(0),
            word(0),
            word(0),
            word(0),
            word(0),
            address_word(OTHER),
            word(1),
        ]),
        step(0, OpCode::STOP, 2),
        step(1, OpCode::STOP, 1),
    ];
    call_session(registry, vec![], steps, DebuggerConfig::default())
}

#[test]
fn test_phantom_frames_for_recent_compilers() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");

    let mut session = solc_session("0.8.20", "0.8.20");
    assert_eq!(session.function_depth(), 2);
    session.advance(1);
    assert_eq!(session.function_depth(), 4);
    session.advance(1);
    assert_eq!(session.function_depth(), 2);

    let mut session = solc_session("0.4.24", "v0.5.0");
    assert_eq!(session.function_depth(), 1);
    session.advance(1);
    assert_eq!(session.function_depth(), 2);
    assert_eq!(session.call_depth(), 2);
}

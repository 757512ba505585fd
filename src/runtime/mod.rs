//! Runtime support module.
//!
//! Executes programs two ways: the original functions with native recursion
//! (`Interpreter`), and the generated units on the explicit-stack trampoline
//! (`GroupRunner`). Both record builtin side effects so runs can be compared.

mod cursor;
mod group_runner;
mod interpreter;
mod trampoline;
mod value;

use std::thread;

use log::warn;

use crate::ast::Program;
use crate::codegen::{EntryPoint, GeneratedUnit};
use crate::error::RuntimeError;

pub use cursor::{Cursor, CursorContext, DispatchFrame};
pub use group_runner::GroupRunner;
pub use interpreter::{Effects, Env, Interpreter, ResultSlots, DEFAULT_MAX_CALL_DEPTH};
pub use trampoline::{RecursionRunner, RunStats, Step};
pub use value::{parse_value, Value, ValueParseError};

/// Stack reserved per interpreted call level on the direct-run thread.
const STACK_PER_CALL: usize = 128 * 1024;
const MIN_DIRECT_STACK: usize = 8 << 20;
const MAX_DIRECT_STACK: usize = 1 << 30;

/// Deepest direct run that fits in `MAX_DIRECT_STACK`. Larger limits are capped.
pub const MAX_DIRECT_CALL_DEPTH: usize = MAX_DIRECT_STACK / STACK_PER_CALL;

/// Result of running one function.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub value: Option<Value>,
    pub effects: Effects,
    /// Only set for trampolined runs.
    pub stats: Option<RunStats>,
}

/// Runs `function` (optionally `module::path::function`) in direct style.
///
/// The interpreter runs on its own thread with a stack sized for
/// `max_call_depth` (at most `MAX_DIRECT_CALL_DEPTH`), so exceeding the limit
/// is reported as `RuntimeError::StackOverflow` rather than aborting the process.
pub fn run_direct(
    program: &Program,
    function: &str,
    args: Vec<Value>,
    max_call_depth: usize,
) -> Result<RunOutcome, RuntimeError> {
    if max_call_depth > MAX_DIRECT_CALL_DEPTH {
        warn!(
            "call depth limit {} does not fit the interpreter stack, using {}",
            max_call_depth, MAX_DIRECT_CALL_DEPTH
        );
    }
    let max_call_depth = max_call_depth.min(MAX_DIRECT_CALL_DEPTH);
    let stack_size = (max_call_depth * STACK_PER_CALL).clamp(MIN_DIRECT_STACK, MAX_DIRECT_STACK);

    thread::scope(|scope| {
        let handle = thread::Builder::new()
            .name("saferec-direct".to_string())
            .stack_size(stack_size)
            .spawn_scoped(scope, move || -> Result<RunOutcome, RuntimeError> {
                let mut interpreter = Interpreter::new(program).with_max_call_depth(max_call_depth);
                let value = interpreter.call_by_name(function, args)?;
                Ok(RunOutcome {
                    value,
                    effects: interpreter.take_effects(),
                    stats: None,
                })
            })
            .map_err(|e| RuntimeError::Internal {
                message: format!("failed to spawn the interpreter thread: {}", e),
            })?;
        handle.join().map_err(|_| RuntimeError::Internal {
            message: "interpreter thread panicked".to_string(),
        })?
    })
}

/// Finds the entry point named by `path`: an entry point name or the original
/// function name, optionally qualified as `Module::name`. An unqualified name
/// exposed by several modules is ambiguous.
pub fn find_entry_point<'u>(
    units: &'u [GeneratedUnit],
    path: &str,
) -> Result<(&'u GeneratedUnit, &'u EntryPoint), RuntimeError> {
    let unknown = || RuntimeError::UnknownFunction {
        name: path.to_string(),
    };
    let mut segments: Vec<&str> = path.split("::").collect();
    let name = segments.pop().ok_or_else(unknown)?;

    let candidates: Vec<(&GeneratedUnit, &EntryPoint)> = units
        .iter()
        .filter(|unit| {
            segments.is_empty() || unit.container.segments.iter().map(String::as_str).eq(segments.iter().copied())
        })
        .flat_map(|unit| unit.entry_points.iter().map(move |entry| (unit, entry)))
        .filter(|(_, entry)| entry.name == name || entry.function == name)
        .collect();

    match candidates.as_slice() {
        [] => Err(unknown()),
        [found] => Ok(*found),
        many => Err(RuntimeError::AmbiguousEntryPoint {
            name: path.to_string(),
            candidates: many
                .iter()
                .map(|(unit, entry)| qualified_name(unit, entry))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn qualified_name(unit: &GeneratedUnit, entry: &EntryPoint) -> String {
    if unit.container.is_root() {
        entry.name.clone()
    } else {
        format!("{}::{}", unit.container, entry.name)
    }
}

/// Runs the generated entry point `entry_point` on the trampoline.
pub fn run_generated(
    program: &Program,
    units: &[GeneratedUnit],
    entry_point: &str,
    args: Vec<Value>,
) -> Result<RunOutcome, RuntimeError> {
    let (unit, entry) = find_entry_point(units, entry_point)?;

    let mut runner = GroupRunner::new(program, unit);
    let value = runner.invoke(&entry.name, args)?;
    Ok(RunOutcome {
        value,
        effects: runner.take_effects(),
        stats: Some(runner.last_stats()),
    })
}

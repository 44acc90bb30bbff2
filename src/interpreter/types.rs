//! Execution context and limits: environment, cwd, last-exit-code, and a
//! loop-control signal. No shell-option flags, no call stack, no
//! positional parameters (functions are out of scope).

use std::collections::HashMap;

/// Guards against runaway scripts (e.g. an infinite `while true; do
/// :; done`).
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Aborts the run once this many simple commands have been dispatched.
    pub max_command_count: u64,
    /// Aborts a pipeline with more stages than this.
    pub max_pipeline_stages: usize,
    /// Caps bytes buffered into an `OutputCollector` for a single
    /// redirect target or command-substitution capture.
    pub max_output_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_command_count: 100_000,
            max_pipeline_stages: 64,
            max_output_bytes: 64 * 1024 * 1024,
        }
    }
}

/// The `break`/`continue` signal a loop body sets to unwind early.
/// Carries the requested level; decremented by each enclosing loop as it
/// propagates outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    None,
    Break(u32),
    Continue(u32),
}

/// The mutable bundle a single run owns: environment, cwd, last exit
/// code, loop-control signal. Created fresh per [`crate::Shell::exec`]
/// call from the shell's base environment plus any per-call overrides;
/// discarded when the root AST node finishes.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub env: HashMap<String, String>,
    pub cwd: String,
    pub last_exit_code: i32,
    pub loop_signal: LoopSignal,
    pub command_count: u64,
}

impl ExecutionContext {
    pub fn new(env: HashMap<String, String>, cwd: String) -> Self {
        Self { env, cwd, last_exit_code: 0, loop_signal: LoopSignal::None, command_count: 0 }
    }

    /// A context forked for a command substitution or pipeline stage: it
    /// sees the current env/cwd snapshot, but mutations it makes (`cd`,
    /// assignments) never propagate back to `self` — the child inherits
    /// but cannot leak changes back.
    pub fn fork(&self) -> Self {
        Self::new(self.env.clone(), self.cwd.clone())
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
    }

    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(|s| s.as_str())
    }
}

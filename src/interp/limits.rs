//! Execution limits.
//!
//! Deterministic-termination budgets. Counters reset on each public
//! `exec`; breaches unwind to the exec boundary and report exit 137.

use crate::interp::error::LimitExceeded;
use crate::interp::state::ShellState;

/// Exit status reported when a budget is breached.
pub const LIMIT_EXIT_CODE: i32 = 137;

#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Function / eval / command-substitution nesting.
    pub max_call_depth: u32,
    /// Iterations allowed for any single loop.
    pub max_loop_iterations: u64,
    /// Commands executed per top-level `exec`.
    pub max_command_count: u64,
    /// Total fields a brace expansion may produce.
    pub max_brace_items: usize,
    /// Bytes of arithmetic expression text.
    pub max_arith_length: usize,
    /// Parser input bytes, checked before tokenizing.
    pub max_input_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_call_depth: 100,
            max_loop_iterations: 10_000,
            max_command_count: 1_000_000,
            max_brace_items: 10_000,
            max_arith_length: 4_096,
            max_input_bytes: crate::parser::DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl ExecutionLimits {
    /// Count one executed command.
    pub fn bump_command(&self, state: &mut ShellState) -> Result<(), LimitExceeded> {
        state.command_count += 1;
        if state.command_count > self.max_command_count {
            return Err(LimitExceeded::new(format!(
                "command limit exceeded ({} commands)",
                self.max_command_count
            )));
        }
        Ok(())
    }

    pub fn check_call_depth(&self, state: &ShellState) -> Result<(), LimitExceeded> {
        if state.call_depth >= self.max_call_depth {
            return Err(LimitExceeded::new(format!(
                "maximum call depth exceeded ({})",
                self.max_call_depth
            )));
        }
        Ok(())
    }

    pub fn check_iterations(&self, count: u64) -> Result<(), LimitExceeded> {
        if count > self.max_loop_iterations {
            return Err(LimitExceeded::new(format!(
                "loop iteration limit exceeded ({} iterations)",
                self.max_loop_iterations
            )));
        }
        Ok(())
    }

    pub fn check_brace_items(&self, count: usize) -> Result<(), LimitExceeded> {
        if count > self.max_brace_items {
            return Err(LimitExceeded::new(format!(
                "brace expansion limit exceeded ({} items)",
                self.max_brace_items
            )));
        }
        Ok(())
    }

    pub fn check_arith_length(&self, text: &str) -> Result<(), LimitExceeded> {
        if text.len() > self.max_arith_length {
            return Err(LimitExceeded::new(format!(
                "arithmetic expression too long (limit {} bytes)",
                self.max_arith_length
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_budget() {
        let limits = ExecutionLimits { max_command_count: 3, ..Default::default() };
        let mut state = ShellState::default();
        for _ in 0..3 {
            limits.bump_command(&mut state).unwrap();
        }
        let err = limits.bump_command(&mut state).unwrap_err();
        assert!(err.message.contains("command limit"));
    }

    #[test]
    fn call_depth_budget() {
        let limits = ExecutionLimits { max_call_depth: 2, ..Default::default() };
        let mut state = ShellState::default();
        state.call_depth = 1;
        assert!(limits.check_call_depth(&state).is_ok());
        state.call_depth = 2;
        assert!(limits.check_call_depth(&state).is_err());
    }

    #[test]
    fn iteration_budget() {
        let limits = ExecutionLimits { max_loop_iterations: 10, ..Default::default() };
        assert!(limits.check_iterations(10).is_ok());
        assert!(limits.check_iterations(11).is_err());
    }

    #[test]
    fn brace_budget_message_names_value() {
        let limits = ExecutionLimits { max_brace_items: 5, ..Default::default() };
        let err = limits.check_brace_items(6).unwrap_err();
        assert!(err.message.contains('5'));
    }
}

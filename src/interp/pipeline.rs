//! Pipelines.
//!
//! Stages run left to right; each stage's stdout is fully materialized
//! and fed to the next stage's stdin. There is no interleaving and no
//! backpressure — a documented deviation from real pipes. Stages other
//! than a lone command run in subshell clones, so variable assignments
//! inside a multi-stage pipeline do not escape.

use crate::ast::types::Pipeline;
use crate::interp::engine::Interp;
use crate::interp::error::{CarriesOutput, Interrupt, ShellExit};
use crate::interp::state::{ExecResult, ShellState};

impl<'a> Interp<'a> {
    pub fn execute_pipeline(
        &self,
        state: &mut ShellState,
        pipeline: &Pipeline,
    ) -> Result<ExecResult, Interrupt> {
        let mut result = if pipeline.commands.len() == 1 {
            // A single command runs in the current shell.
            self.execute_command(state, &pipeline.commands[0], None)?
        } else {
            self.run_staged(state, pipeline)?
        };

        if pipeline.negated {
            result.exit_code = if result.exit_code == 0 { 1 } else { 0 };
            state.set_exit_code(result.exit_code);
        }
        Ok(result)
    }

    fn run_staged(
        &self,
        state: &mut ShellState,
        pipeline: &Pipeline,
    ) -> Result<ExecResult, Interrupt> {
        let mut codes = Vec::with_capacity(pipeline.commands.len());
        let mut stderr = String::new();
        let mut carried_stdin = state.current_stdin.clone().unwrap_or_default();
        let mut final_stdout = String::new();

        let last = pipeline.commands.len() - 1;
        for (i, command) in pipeline.commands.iter().enumerate() {
            let run_in_parent = i == last && state.shopts.lastpipe;

            let result = if run_in_parent {
                self.execute_command(state, command, Some(&carried_stdin))?
            } else {
                let mut sub = state.subshell();
                let outcome = self.execute_command(&mut sub, command, Some(&carried_stdin));
                state.command_count = sub.command_count;
                state.next_virtual_pid = sub.next_virtual_pid;
                match outcome {
                    Ok(result) => result,
                    Err(Interrupt::Exit(ShellExit { code, stdout, stderr })) => {
                        ExecResult::new(stdout, stderr, code)
                    }
                    Err(Interrupt::Limit(e)) => return Err(Interrupt::Limit(e)),
                    Err(mut other) => {
                        let carried = other.carried();
                        ExecResult::new(
                            carried.stdout().to_string(),
                            carried.stderr().to_string(),
                            other.exit_code(),
                        )
                    }
                }
            };

            codes.push(result.exit_code);
            if i == last {
                final_stdout = result.stdout;
                stderr.push_str(&result.stderr);
            } else {
                // `|&` folds this stage's stderr into the pipe.
                let pipe_stderr = pipeline.stderr_pipes.get(i).copied().unwrap_or(false);
                if pipe_stderr {
                    carried_stdin = format!("{}{}", result.stdout, result.stderr);
                } else {
                    carried_stdin = result.stdout;
                    stderr.push_str(&result.stderr);
                }
            }
        }

        state.set_pipestatus(&codes);

        let exit_code = if state.options.pipefail {
            codes.iter().rev().find(|&&c| c != 0).copied().unwrap_or(0)
        } else {
            *codes.last().unwrap_or(&0)
        };

        Ok(ExecResult::new(final_stdout, stderr, exit_code))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn stdout_flows_through_stages() {
        let out = run("echo hello | cat");
        assert_eq!(out.stdout, "hello\n");
    }

    #[test]
    fn exit_code_is_last_stage() {
        let out = run("false | true; echo $?");
        assert_eq!(out.stdout, "0\n");
        let out = run("true | false; echo $?");
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn pipefail_reports_failing_stage() {
        let out = run("set -o pipefail\nfalse | true; echo $?");
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn negation_inverts() {
        let out = run("! false; echo $?");
        assert_eq!(out.stdout, "0\n");
        let out = run("! true; echo $?");
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn pipestatus_array() {
        let out = run("true | false | true; echo ${PIPESTATUS[0]} ${PIPESTATUS[1]} ${PIPESTATUS[2]}");
        assert_eq!(out.stdout, "0 1 0\n");
    }

    #[test]
    fn pipeline_stage_isolation() {
        let out = run("x=outer; echo hi | x=inner; echo $x");
        assert_eq!(out.stdout, "outer\n");
    }

    #[test]
    fn stderr_pipe_folds_into_stdin() {
        let out = run("missing_xyz |& cat");
        assert!(out.stdout.contains("command not found"));
        assert_eq!(out.stderr, "");
    }

    #[test]
    fn read_from_pipe_with_lastpipe_needs_subshell_semantics() {
        // Without lastpipe the final stage runs in a subshell.
        let out = run("echo value | read v; echo [$v]");
        assert_eq!(out.stdout, "[]\n");
        let out = run("shopt -s lastpipe\necho value | read v; echo [$v]");
        assert_eq!(out.stdout, "[value]\n");
    }
}

//! Execution engine.
//!
//! Walks the AST: scripts → statements → pipelines → commands. Command
//! resolution order is functions, then builtins, then the external
//! command registry. Output is accumulated in memory; control flow
//! unwinds through `Interrupt` values carrying output with them.

use crate::ast::types::{
    Command, CompoundCommand, ListOperator, Script, SimpleCommand, Statement,
};
use crate::command::CommandResult;
use crate::fs::SyncFs;
use crate::interp::builtins;
use crate::interp::error::{CarriesOutput, ErrexitAbort, Interrupt, ShellExit};
use crate::interp::limits::ExecutionLimits;
use crate::interp::state::{ExecResult, ShellState};

/// Host-provided external command execution, as the engine sees it.
pub trait ExternalExec: Send + Sync {
    fn contains(&self, name: &str) -> bool;
    fn run(
        &self,
        name: &str,
        args: &[String],
        env: std::collections::HashMap<String, String>,
        cwd: &str,
        stdin: &str,
    ) -> CommandResult;
}

/// Registry stub for embedders that wire no external commands.
pub struct NoExternalCommands;

impl ExternalExec for NoExternalCommands {
    fn contains(&self, _name: &str) -> bool {
        false
    }

    fn run(
        &self,
        name: &str,
        _args: &[String],
        _env: std::collections::HashMap<String, String>,
        _cwd: &str,
        _stdin: &str,
    ) -> CommandResult {
        CommandResult::error(format!("sandbash: {}: command not found\n", name), 127)
    }
}

/// The tree-walking interpreter. Cheap to construct; all mutable state
/// lives in the `ShellState` passed through every call.
pub struct Interp<'a> {
    pub limits: &'a ExecutionLimits,
    pub fs: &'a dyn SyncFs,
    pub external: &'a dyn ExternalExec,
}

impl<'a> Interp<'a> {
    pub fn new(limits: &'a ExecutionLimits, fs: &'a dyn SyncFs, external: &'a dyn ExternalExec) -> Self {
        Self { limits, fs, external }
    }

    // =========================================================================
    // Script / statement
    // =========================================================================

    pub fn execute_script(
        &self,
        state: &mut ShellState,
        script: &Script,
    ) -> Result<ExecResult, Interrupt> {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = state.last_exit_code;

        for statement in &script.statements {
            match self.execute_statement(state, statement) {
                Ok(result) => {
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    exit_code = result.exit_code;
                    state.set_exit_code(exit_code);
                }
                Err(Interrupt::Errexit(e)) => {
                    // errexit ends the script but is not an error of the
                    // enclosing context.
                    stdout.push_str(&e.stdout);
                    stderr.push_str(&e.stderr);
                    state.set_exit_code(e.code);
                    return Ok(ExecResult::new(stdout, stderr, e.code));
                }
                Err(interrupt) => {
                    return Err(interrupt.with_output(&stdout, &stderr));
                }
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    pub fn execute_statement(
        &self,
        state: &mut ShellState,
        statement: &Statement,
    ) -> Result<ExecResult, Interrupt> {
        if let Some(ref deferred) = statement.deferred_error {
            state.set_exit_code(2);
            return Ok(ExecResult::failure(format!("sandbash: {}\n", deferred.message), 2));
        }

        if state.options.noexec {
            return Ok(ExecResult::ok());
        }

        state.current_line = statement.line as u32;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if state.options.verbose {
            if let Some(ref source) = statement.source_text {
                stderr.push_str(source);
                stderr.push('\n');
            }
        }

        if statement.background {
            // Synchronous emulation: run the statement, remember a virtual
            // pid in $!, report success immediately.
            let mut sub = state.subshell();
            let pid = sub.bash_pid;
            let mut body = statement.clone();
            body.background = false;
            let result = match self.execute_statement(&mut sub, &body) {
                Ok(r) => r,
                Err(Interrupt::Exit(e)) => ExecResult::new(e.stdout, e.stderr, e.code),
                Err(Interrupt::Limit(e)) => return Err(Interrupt::Limit(e)),
                Err(mut other) => {
                    let carried = other.carried();
                    ExecResult::new(
                        carried.stdout().to_string(),
                        carried.stderr().to_string(),
                        other.exit_code(),
                    )
                }
            };
            stdout.push_str(&result.stdout);
            stderr.push_str(&result.stderr);
            state.last_bg_pid = pid;
            state.set_exit_code(0);
            return Ok(ExecResult::new(stdout, stderr, 0));
        }

        let mut exit_code = 0;
        let mut last_ran = 0usize;
        let mut short_circuited = false;
        let mut last_negated = false;

        for (i, pipeline) in statement.pipelines.iter().enumerate() {
            if i > 0 {
                let skip = match statement.operators[i - 1] {
                    ListOperator::And => exit_code != 0,
                    ListOperator::Or => exit_code == 0,
                    ListOperator::Seq => false,
                };
                if skip {
                    short_circuited = true;
                    continue;
                }
            }

            // A non-final `&&`/`||` operand is a condition context.
            let is_condition_operand = statement
                .operators
                .get(i)
                .map(|op| matches!(op, ListOperator::And | ListOperator::Or))
                .unwrap_or(false);

            let saved_condition = state.in_condition;
            if is_condition_operand {
                state.in_condition = true;
            }
            let outcome = self.execute_pipeline(state, pipeline);
            state.in_condition = saved_condition;

            // Recoverable expansion failures end the command, set $?,
            // and let the script continue; fatal ones (nounset, ${v:?})
            // keep unwinding.
            let result = match outcome {
                Ok(result) => result,
                Err(Interrupt::Expansion(e)) if !e.fatal => {
                    ExecResult::new(e.stdout, e.stderr, e.code)
                }
                Err(Interrupt::Glob(e)) => ExecResult::new(e.stdout, e.stderr, 1),
                Err(other) => return Err(other.with_output(&stdout, &stderr)),
            };
            stdout.push_str(&result.stdout);
            stderr.push_str(&result.stderr);
            exit_code = result.exit_code;
            last_ran = i;
            short_circuited = false;
            last_negated = pipeline.negated;
            state.set_exit_code(exit_code);
        }

        let was_final = last_ran == statement.pipelines.len() - 1 && !short_circuited;
        if self.should_errexit(state, exit_code, was_final, last_negated) {
            return Err(Interrupt::Errexit(ErrexitAbort { code: exit_code, stdout, stderr }));
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    fn should_errexit(&self, state: &ShellState, exit_code: i32, was_final: bool, negated: bool) -> bool {
        state.options.errexit && exit_code != 0 && was_final && !negated && !state.in_condition
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub fn execute_command(
        &self,
        state: &mut ShellState,
        command: &Command,
        stdin: Option<&str>,
    ) -> Result<ExecResult, Interrupt> {
        self.limits.bump_command(state)?;

        // Piped stdin replaces the inherited stream only for this command;
        // inherited stdin is consumed in place so successive `read`s in
        // one compound see the remainder.
        let replaced = stdin.map(|input| state.current_stdin.replace(input.to_string()));

        let result = match command {
            Command::Simple(simple) => self.execute_simple_command(state, simple),
            Command::Compound(compound) => self.execute_compound(state, compound),
            Command::Function(def) => {
                state.functions.insert(def.name.clone(), def.clone());
                Ok(ExecResult::ok())
            }
        };

        if let Some(previous) = replaced {
            state.current_stdin = previous;
        }
        result
    }

    /// Run a statement list in the current state, accumulating output.
    /// Unlike `execute_script`, errexit keeps unwinding: enclosing
    /// compounds and conditions decide what to do with it.
    pub fn execute_body(
        &self,
        state: &mut ShellState,
        body: &[Statement],
    ) -> Result<ExecResult, Interrupt> {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;

        for statement in body {
            match self.execute_statement(state, statement) {
                Ok(result) => {
                    stdout.push_str(&result.stdout);
                    stderr.push_str(&result.stderr);
                    exit_code = result.exit_code;
                    state.set_exit_code(exit_code);
                }
                Err(interrupt) => return Err(interrupt.with_output(&stdout, &stderr)),
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    fn execute_simple_command(
        &self,
        state: &mut ShellState,
        command: &SimpleCommand,
    ) -> Result<ExecResult, Interrupt> {
        state.current_line = command.line as u32;

        // Assignment-only command: mutate state, no command run.
        let name_word = match &command.name {
            None => {
                let mut stderr = String::new();
                let mut code = 0;
                for assignment in &command.assignments {
                    match self.apply_assignment(state, assignment, false)? {
                        crate::interp::assign::AssignOutcome::Done => {}
                        crate::interp::assign::AssignOutcome::Failed(message) => {
                            stderr.push_str(&format!("sandbash: {}\n", message));
                            code = 1;
                        }
                    }
                }
                // Expansion-time substitutions decide $? for bare
                // assignments (x=$(false) reports 1).
                if code == 0 {
                    if let Some(sub_code) = state.expansion_exit_code.take() {
                        code = sub_code;
                    }
                }
                let expansion_stderr = std::mem::take(&mut state.expansion_stderr);
                let redirected = self.apply_redirections_only(state, &command.redirections)?;
                return Ok(ExecResult::new(
                    redirected.stdout,
                    format!("{}{}{}", expansion_stderr, redirected.stderr, stderr),
                    code,
                ));
            }
            Some(word) => word,
        };

        // Expand command name and arguments.
        let mut argv = self.expand_words(state, std::slice::from_ref(name_word))?;
        let arg_fields = self.expand_words(state, &command.args)?;
        argv.extend(arg_fields);
        let expansion_stderr = std::mem::take(&mut state.expansion_stderr);
        let substitution_code = state.expansion_exit_code.take();

        if argv.is_empty() {
            // The name expanded away ($empty or a bare substitution);
            // assignments still apply and $? follows the substitution.
            for assignment in &command.assignments {
                if let crate::interp::assign::AssignOutcome::Failed(message) =
                    self.apply_assignment(state, assignment, false)?
                {
                    return Ok(ExecResult::failure(format!("sandbash: {}\n", message), 1));
                }
            }
            return Ok(ExecResult::new(
                String::new(),
                expansion_stderr,
                substitution_code.unwrap_or(0),
            ));
        }

        let name = argv.remove(0);
        let args = argv;

        if state.options.xtrace {
            let ps4 = state.get_scalar("PS4").unwrap_or_else(|| "+ ".to_string());
            let mut trace = format!("{}{}", ps4, name);
            for arg in &args {
                trace.push(' ');
                trace.push_str(arg);
            }
            state.expansion_stderr.push_str(&format!("{}\n", trace));
        }
        let xtrace_stderr = std::mem::take(&mut state.expansion_stderr);

        // Temporary assignment prefixes: applied for the command's
        // duration, exported into its view.
        let saved_vars = self.apply_temp_assignments(state, command)?;

        let outcome = self.run_resolved_command(state, command, &name, &args);

        self.restore_temp_assignments(state, saved_vars);

        let mut result = match outcome {
            Ok(result) => result,
            Err(interrupt) => {
                return Err(interrupt.with_output("", &format!("{}{}", expansion_stderr, xtrace_stderr)))
            }
        };

        state.last_arg = args.last().cloned().unwrap_or_else(|| name.clone());
        result.stderr = format!("{}{}{}", expansion_stderr, xtrace_stderr, result.stderr);
        Ok(result)
    }

    fn run_resolved_command(
        &self,
        state: &mut ShellState,
        command: &SimpleCommand,
        name: &str,
        args: &[String],
    ) -> Result<ExecResult, Interrupt> {
        // Redirections are planned before dispatch so heredocs feed stdin
        // and target files are created/truncated up front.
        let plan = match self.plan_redirections(state, &command.redirections) {
            Ok(plan) => plan,
            Err(Interrupt::Expansion(e)) if !e.fatal => {
                return Ok(ExecResult::failure(format!("sandbash: {}\n", e.message), 1));
            }
            Err(other) => return Err(other),
        };
        let replaced_stdin =
            plan.stdin.clone().map(|input| state.current_stdin.replace(input));

        let dispatch = self.dispatch_command(state, name, args);

        if let Some(previous) = replaced_stdin {
            state.current_stdin = previous;
        }

        let result = match dispatch {
            Ok(result) => result,
            Err(interrupt) => return Err(self.route_interrupt(state, plan, interrupt)),
        };
        let routed = self.finish_redirections(state, plan, result)?;
        self.run_pending_procsubs(state)?;
        Ok(routed)
    }

    /// Output carried by an unwinding interrupt still honors the
    /// command's redirections before propagating further.
    fn route_interrupt(
        &self,
        state: &mut ShellState,
        plan: crate::interp::redirect::RedirPlan,
        mut interrupt: Interrupt,
    ) -> Interrupt {
        let carried = interrupt.carried();
        let stdout = std::mem::take(carried.stdout_mut());
        let stderr = std::mem::take(carried.stderr_mut());
        match self.finish_redirections(state, plan, ExecResult::new(stdout, stderr, 0)) {
            Ok(routed) => interrupt.with_output(&routed.stdout, &routed.stderr),
            Err(_) => interrupt,
        }
    }

    fn dispatch_command(
        &self,
        state: &mut ShellState,
        name: &str,
        args: &[String],
    ) -> Result<ExecResult, Interrupt> {
        let result = if state.functions.contains_key(name) {
            self.call_function(state, name, args)?
        } else if builtins::is_builtin(name) {
            self.run_builtin(state, name, args)?
        } else if self.external.contains(name) {
            let stdin = state.current_stdin.clone().unwrap_or_default();
            let output = self.external.run(name, args, state.exported_env(), &state.cwd, &stdin);
            ExecResult::new(output.stdout, output.stderr, output.exit_code)
        } else if name.contains('/') {
            self.run_script_file(state, name, args)?
        } else {
            ExecResult::failure(format!("sandbash: {}: command not found\n", name), 127)
        };
        Ok(result)
    }

    /// A path-shaped name runs the file as a script in a child shell.
    /// Missing file is 127; directories and non-executable files are 126.
    fn run_script_file(
        &self,
        state: &mut ShellState,
        name: &str,
        args: &[String],
    ) -> Result<ExecResult, Interrupt> {
        let path = self.fs.resolve_path(&state.cwd, name);
        let stat = match self.fs.stat(&path) {
            Ok(stat) => stat,
            Err(_) => {
                return Ok(ExecResult::failure(
                    format!("sandbash: {}: No such file or directory\n", name),
                    127,
                ))
            }
        };
        if stat.is_directory {
            return Ok(ExecResult::failure(format!("sandbash: {}: Is a directory\n", name), 126));
        }
        if stat.mode & 0o111 == 0 {
            return Ok(ExecResult::failure(
                format!("sandbash: {}: Permission denied\n", name),
                126,
            ));
        }
        let source = match self.fs.read_file(&path) {
            Ok(source) => source,
            Err(_) => {
                return Ok(ExecResult::failure(
                    format!("sandbash: {}: cannot execute\n", name),
                    126,
                ))
            }
        };
        let script = match crate::parser::parse_with_limit(&source, self.limits.max_input_bytes) {
            Ok(script) => script,
            Err(e) => {
                return Ok(ExecResult::failure(format!("sandbash: {}: {}\n", name, e), 2));
            }
        };
        let mut sub = state.subshell();
        sub.script_name = name.to_string();
        sub.positional = args.to_vec();
        sub.scopes.clear();
        let result = match self.execute_script(&mut sub, &script) {
            Ok(result) => result,
            Err(Interrupt::Exit(exit)) => ExecResult::new(exit.stdout, exit.stderr, exit.code),
            Err(Interrupt::Limit(e)) => return Err(Interrupt::Limit(e)),
            Err(mut other) => {
                let carried = other.carried();
                ExecResult::new(
                    carried.stdout().to_string(),
                    carried.stderr().to_string(),
                    other.exit_code(),
                )
            }
        };
        state.command_count = sub.command_count;
        Ok(result)
    }

    pub(crate) fn execute_compound(
        &self,
        state: &mut ShellState,
        compound: &CompoundCommand,
    ) -> Result<ExecResult, Interrupt> {
        let plan = match self.plan_redirections(state, compound.redirections()) {
            Ok(plan) => plan,
            Err(Interrupt::Expansion(e)) if !e.fatal => {
                return Ok(ExecResult::failure(format!("sandbash: {}\n", e.message), 1));
            }
            Err(other) => return Err(other),
        };
        let replaced = plan.stdin.clone().map(|input| state.current_stdin.replace(input));

        let result = self.execute_compound_body(state, compound);
        if let Some(previous) = replaced {
            state.current_stdin = previous;
        }

        let result = match result {
            Ok(result) => result,
            Err(interrupt) => return Err(self.route_interrupt(state, plan, interrupt)),
        };
        self.finish_redirections(state, plan, result)
    }

    /// Resolve an argv-shaped line the way `xargs`-style reentry needs:
    /// parse and execute text as a script against the current state.
    pub fn execute_source_text(
        &self,
        state: &mut ShellState,
        source: &str,
    ) -> Result<ExecResult, Interrupt> {
        let script = match crate::parser::parse_with_limit(source, self.limits.max_input_bytes) {
            Ok(script) => script,
            Err(e) => {
                return Ok(ExecResult::failure(format!("sandbash: syntax error: {}\n", e), 2));
            }
        };
        self.execute_script(state, &script)
    }

    /// Run a script in a subshell clone, capturing output and exit code.
    pub fn run_subshell(
        &self,
        state: &mut ShellState,
        script: &Script,
    ) -> Result<ExecResult, Interrupt> {
        let mut sub = state.subshell();
        sub.call_depth += 1;
        self.limits.check_call_depth(&sub)?;
        let result = match self.execute_script(&mut sub, script) {
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
        };
        state.command_count = sub.command_count;
        state.next_virtual_pid = sub.next_virtual_pid;
        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn echo_and_exit_code() {
        let out = run("echo hello world");
        assert_eq!(out.stdout, "hello world\n");
        assert_eq!(out.exit_code, 0);
    }

    #[test]
    fn true_false() {
        assert_eq!(run("true").exit_code, 0);
        assert_eq!(run("false").exit_code, 1);
    }

    #[test]
    fn and_or_chains() {
        assert_eq!(run("true && echo yes").stdout, "yes\n");
        assert_eq!(run("false && echo no").stdout, "");
        assert_eq!(run("false || echo fallback").stdout, "fallback\n");
        assert_eq!(run("true || echo skipped").stdout, "");
    }

    #[test]
    fn seq_statement_exit_code() {
        let out = run("false; echo $?");
        assert_eq!(out.stdout, "1\n");
        assert_eq!(out.exit_code, 0);
    }

    #[test]
    fn command_not_found_is_127() {
        let out = run("definitely_missing_cmd");
        assert_eq!(out.exit_code, 127);
        assert!(out.stderr.contains("command not found"));
    }

    #[test]
    fn variable_assignment_and_expansion() {
        assert_eq!(run("x=hello; echo $x").stdout, "hello\n");
        assert_eq!(run("x=a; x=b; echo $x").stdout, "b\n");
    }

    #[test]
    fn temp_assignment_does_not_leak() {
        let out = run("x=outer; x=inner true; echo $x");
        assert_eq!(out.stdout, "outer\n");
    }

    #[test]
    fn background_reports_zero_and_bang() {
        let out = run("false & echo $?");
        assert_eq!(out.stdout, "0\n");
    }

    #[test]
    fn errexit_stops_script() {
        let out = run("set -e\nfalse\necho unreachable");
        assert_eq!(out.stdout, "");
        assert_eq!(out.exit_code, 1);
    }

    #[test]
    fn errexit_spares_conditions() {
        let out = run("set -e\nif false; then echo no; fi\necho alive");
        assert_eq!(out.stdout, "alive\n");
        let out = run("set -e\nfalse || echo caught\necho alive");
        assert_eq!(out.stdout, "caught\nalive\n");
        let out = run("set -e\n! false\necho alive");
        assert_eq!(out.stdout, "alive\n");
    }

    #[test]
    fn exit_unwinds_with_output() {
        let out = run("echo before; exit 3; echo after");
        assert_eq!(out.stdout, "before\n");
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn function_definition_and_call() {
        let out = run("f() { echo in-f; }; f");
        assert_eq!(out.stdout, "in-f\n");
    }

    #[test]
    fn command_count_limit() {
        use crate::interp::testkit::run_with_limits;
        use crate::interp::ExecutionLimits;
        let limits = ExecutionLimits { max_command_count: 5, ..Default::default() };
        let out = run_with_limits("while true; do echo x; done", limits);
        assert_eq!(out.exit_code, 137);
    }

    #[test]
    fn xtrace_writes_to_stderr() {
        let out = run("set -x\necho hi");
        assert_eq!(out.stdout, "hi\n");
        assert!(out.stderr.contains("+ echo hi"));
    }
}

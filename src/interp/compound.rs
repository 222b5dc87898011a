//! Compound commands: conditionals, loops, case, select, groups and
//! subshells. Loops honor the iteration budget and absorb `break` /
//! `continue` interrupts at the right nesting level.

use crate::ast::types::{
    BlockCommand, CaseCommand, CaseTerminator, CompoundCommand, ForArithCommand, ForCommand,
    IfCommand, LoopCommand, Script, SelectCommand, Statement,
};
use crate::expand::pattern::{matches_pattern, PatternOptions};
use crate::interp::engine::Interp;
use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, ShellState};

/// What a loop body iteration asked the loop to do.
enum LoopSignal {
    Normal(i32),
    Break(u32),
    Continue(u32),
}

impl<'a> Interp<'a> {
    pub fn execute_compound_body(
        &self,
        state: &mut ShellState,
        compound: &CompoundCommand,
    ) -> Result<ExecResult, Interrupt> {
        match compound {
            CompoundCommand::If(node) => self.run_if(state, node),
            CompoundCommand::While(node) => self.run_loop(state, node, false),
            CompoundCommand::Until(node) => self.run_loop(state, node, true),
            CompoundCommand::For(node) => self.run_for(state, node),
            CompoundCommand::ForArith(node) => self.run_for_arith(state, node),
            CompoundCommand::Case(node) => self.run_case(state, node),
            CompoundCommand::Select(node) => self.run_select(state, node),
            CompoundCommand::Group(node) => self.execute_body(state, &node.body),
            CompoundCommand::Subshell(node) => self.run_subshell_block(state, node),
            CompoundCommand::Arith(node) => {
                self.limits.check_arith_length(&node.expression.source)?;
                match self.eval_arith_cmd(state, &node.expression.expr) {
                    Ok(value) => Ok(ExecResult::code(if value != 0 { 0 } else { 1 })),
                    Err(Interrupt::Expansion(e)) => {
                        Ok(ExecResult::failure(format!("sandbash: {}\n", e.message), 1))
                    }
                    Err(other) => Err(other),
                }
            }
            CompoundCommand::Cond(node) => self.eval_cond_command(state, &node.expression),
        }
    }

    fn run_if(&self, state: &mut ShellState, node: &IfCommand) -> Result<ExecResult, Interrupt> {
        let mut stdout = String::new();
        let mut stderr = String::new();

        for clause in &node.clauses {
            let condition = self.run_condition(state, &clause.condition);
            let condition = condition.map_err(|e| e.with_output(&stdout, &stderr))?;
            stdout.push_str(&condition.stdout);
            stderr.push_str(&condition.stderr);

            if condition.exit_code == 0 {
                let body = self
                    .execute_body(state, &clause.body)
                    .map_err(|e| e.with_output(&stdout, &stderr))?;
                return Ok(ExecResult::new(
                    format!("{}{}", stdout, body.stdout),
                    format!("{}{}", stderr, body.stderr),
                    body.exit_code,
                ));
            }
        }

        if let Some(ref else_body) = node.else_body {
            let body =
                self.execute_body(state, else_body).map_err(|e| e.with_output(&stdout, &stderr))?;
            return Ok(ExecResult::new(
                format!("{}{}", stdout, body.stdout),
                format!("{}{}", stderr, body.stderr),
                body.exit_code,
            ));
        }

        // No clause matched: status 0.
        Ok(ExecResult::new(stdout, stderr, 0))
    }

    /// Run a condition statement list with errexit suspended.
    pub fn run_condition(
        &self,
        state: &mut ShellState,
        condition: &[Statement],
    ) -> Result<ExecResult, Interrupt> {
        let saved = state.in_condition;
        state.in_condition = true;
        let result = self.execute_body(state, condition);
        state.in_condition = saved;
        result
    }

    /// One loop-body run, classifying break/continue for this level.
    fn loop_iteration(
        &self,
        state: &mut ShellState,
        body: &[Statement],
        stdout: &mut String,
        stderr: &mut String,
    ) -> Result<LoopSignal, Interrupt> {
        state.loop_depth += 1;
        let outcome = self.execute_body(state, body);
        state.loop_depth -= 1;

        match outcome {
            Ok(result) => {
                stdout.push_str(&result.stdout);
                stderr.push_str(&result.stderr);
                Ok(LoopSignal::Normal(result.exit_code))
            }
            Err(Interrupt::Break(e)) => {
                stdout.push_str(&e.stdout);
                stderr.push_str(&e.stderr);
                Ok(LoopSignal::Break(e.levels.max(1)))
            }
            Err(Interrupt::Continue(e)) => {
                stdout.push_str(&e.stdout);
                stderr.push_str(&e.stderr);
                Ok(LoopSignal::Continue(e.levels.max(1)))
            }
            Err(other) => Err(other.with_output(stdout, stderr)),
        }
    }

    fn run_loop(
        &self,
        state: &mut ShellState,
        node: &LoopCommand,
        until: bool,
    ) -> Result<ExecResult, Interrupt> {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let mut iterations: u64 = 0;

        loop {
            iterations += 1;
            self.limits
                .check_iterations(iterations)
                .map_err(|e| Interrupt::from(e).with_output(&stdout, &stderr))?;

            let condition = self
                .run_condition(state, &node.condition)
                .map_err(|e| e.with_output(&stdout, &stderr))?;
            stdout.push_str(&condition.stdout);
            stderr.push_str(&condition.stderr);

            let proceed =
                if until { condition.exit_code != 0 } else { condition.exit_code == 0 };
            if !proceed {
                break;
            }

            match self.loop_iteration(state, &node.body, &mut stdout, &mut stderr)? {
                LoopSignal::Normal(code) => exit_code = code,
                LoopSignal::Break(levels) => {
                    if levels > 1 {
                        return Err(Interrupt::Break(crate::interp::error::LoopBreak {
                            levels: levels - 1,
                            stdout,
                            stderr,
                        }));
                    }
                    exit_code = 0;
                    break;
                }
                LoopSignal::Continue(levels) => {
                    if levels > 1 {
                        return Err(Interrupt::Continue(crate::interp::error::LoopContinue {
                            levels: levels - 1,
                            stdout,
                            stderr,
                        }));
                    }
                }
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    fn run_for(&self, state: &mut ShellState, node: &ForCommand) -> Result<ExecResult, Interrupt> {
        let items = match &node.words {
            Some(words) => self.expand_words(state, words)?,
            None => state.positional.clone(),
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;

        for (iteration, item) in items.iter().enumerate() {
            self.limits
                .check_iterations(iteration as u64 + 1)
                .map_err(|e| Interrupt::from(e).with_output(&stdout, &stderr))?;

            if let Err(message) = state.set_scalar(&node.variable, item.clone()) {
                stderr.push_str(&format!("sandbash: {}\n", message));
                return Ok(ExecResult::new(stdout, stderr, 1));
            }

            match self.loop_iteration(state, &node.body, &mut stdout, &mut stderr)? {
                LoopSignal::Normal(code) => exit_code = code,
                LoopSignal::Break(levels) => {
                    if levels > 1 {
                        return Err(Interrupt::Break(crate::interp::error::LoopBreak {
                            levels: levels - 1,
                            stdout,
                            stderr,
                        }));
                    }
                    exit_code = 0;
                    break;
                }
                LoopSignal::Continue(levels) => {
                    if levels > 1 {
                        return Err(Interrupt::Continue(crate::interp::error::LoopContinue {
                            levels: levels - 1,
                            stdout,
                            stderr,
                        }));
                    }
                }
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    fn run_for_arith(
        &self,
        state: &mut ShellState,
        node: &ForArithCommand,
    ) -> Result<ExecResult, Interrupt> {
        state.current_line = node.line as u32;
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;

        if let Some(ref init) = node.init {
            self.eval_arith_cmd(state, &init.expr)
                .map_err(|e| e.with_output(&stdout, &stderr))?;
        }

        let mut iterations: u64 = 0;
        loop {
            iterations += 1;
            self.limits
                .check_iterations(iterations)
                .map_err(|e| Interrupt::from(e).with_output(&stdout, &stderr))?;

            if let Some(ref condition) = node.condition {
                let value = self
                    .eval_arith_cmd(state, &condition.expr)
                    .map_err(|e| e.with_output(&stdout, &stderr))?;
                if value == 0 {
                    break;
                }
            }

            match self.loop_iteration(state, &node.body, &mut stdout, &mut stderr)? {
                LoopSignal::Normal(code) => exit_code = code,
                LoopSignal::Break(levels) => {
                    if levels > 1 {
                        return Err(Interrupt::Break(crate::interp::error::LoopBreak {
                            levels: levels - 1,
                            stdout,
                            stderr,
                        }));
                    }
                    exit_code = 0;
                    break;
                }
                LoopSignal::Continue(levels) => {
                    if levels > 1 {
                        return Err(Interrupt::Continue(crate::interp::error::LoopContinue {
                            levels: levels - 1,
                            stdout,
                            stderr,
                        }));
                    }
                }
            }

            if let Some(ref update) = node.update {
                self.eval_arith_cmd(state, &update.expr)
                    .map_err(|e| e.with_output(&stdout, &stderr))?;
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    fn run_case(&self, state: &mut ShellState, node: &CaseCommand) -> Result<ExecResult, Interrupt> {
        let subject = self.expand_word_single(state, &node.subject)?;
        let opts = PatternOptions {
            extglob: true,
            case_insensitive: state.shopts.nocasematch,
            ..Default::default()
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let mut fall_through = false;

        for arm in &node.arms {
            let mut hits = fall_through;
            if !hits {
                for pattern_word in &arm.patterns {
                    let pattern = self.expand_word_pattern(state, pattern_word)?;
                    if matches_pattern(&subject, &pattern, &opts) {
                        hits = true;
                        break;
                    }
                }
            }
            if !hits {
                continue;
            }

            let body =
                self.execute_body(state, &arm.body).map_err(|e| e.with_output(&stdout, &stderr))?;
            stdout.push_str(&body.stdout);
            stderr.push_str(&body.stderr);
            exit_code = body.exit_code;

            match arm.terminator {
                CaseTerminator::Break => {
                    fall_through = false;
                    break;
                }
                CaseTerminator::FallThrough => {
                    fall_through = true;
                }
                CaseTerminator::TestNext => {
                    fall_through = false;
                }
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    fn run_select(
        &self,
        state: &mut ShellState,
        node: &SelectCommand,
    ) -> Result<ExecResult, Interrupt> {
        let items = match &node.words {
            Some(words) => self.expand_words(state, words)?,
            None => state.positional.clone(),
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = 0;
        let ps3 = state.get_scalar("PS3").unwrap_or_else(|| "#? ".to_string());
        let mut iterations: u64 = 0;

        loop {
            iterations += 1;
            self.limits
                .check_iterations(iterations)
                .map_err(|e| Interrupt::from(e).with_output(&stdout, &stderr))?;

            for (i, item) in items.iter().enumerate() {
                stderr.push_str(&format!("{}) {}\n", i + 1, item));
            }
            stderr.push_str(&ps3);

            let line = match take_stdin_line(state) {
                Some(line) => line,
                None => break,
            };
            let _ = state.set_scalar("REPLY", line.clone());
            let selection = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| if n >= 1 { items.get(n - 1) } else { None });
            let value = selection.cloned().unwrap_or_default();
            if let Err(message) = state.set_scalar(&node.variable, value) {
                stderr.push_str(&format!("sandbash: {}\n", message));
                return Ok(ExecResult::new(stdout, stderr, 1));
            }

            match self.loop_iteration(state, &node.body, &mut stdout, &mut stderr)? {
                LoopSignal::Normal(code) => exit_code = code,
                LoopSignal::Break(levels) => {
                    if levels > 1 {
                        return Err(Interrupt::Break(crate::interp::error::LoopBreak {
                            levels: levels - 1,
                            stdout,
                            stderr,
                        }));
                    }
                    exit_code = 0;
                    break;
                }
                LoopSignal::Continue(levels) => {
                    if levels > 1 {
                        return Err(Interrupt::Continue(crate::interp::error::LoopContinue {
                            levels: levels - 1,
                            stdout,
                            stderr,
                        }));
                    }
                }
            }
        }

        Ok(ExecResult::new(stdout, stderr, exit_code))
    }

    fn run_subshell_block(
        &self,
        state: &mut ShellState,
        node: &BlockCommand,
    ) -> Result<ExecResult, Interrupt> {
        let script = Script { statements: node.body.clone() };
        let result = self.run_subshell(state, &script)?;
        state.set_exit_code(result.exit_code);
        Ok(result)
    }
}

/// Consume one line from the inherited stdin stream.
pub fn take_stdin_line(state: &mut ShellState) -> Option<String> {
    let stdin = state.current_stdin.as_mut()?;
    if stdin.is_empty() {
        return None;
    }
    match stdin.find('\n') {
        Some(idx) => {
            let line = stdin[..idx].to_string();
            *stdin = stdin[idx + 1..].to_string();
            Some(line)
        }
        None => {
            let line = std::mem::take(stdin);
            Some(line)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn if_elif_else() {
        assert_eq!(run("if true; then echo a; fi").stdout, "a\n");
        assert_eq!(run("if false; then echo a; else echo b; fi").stdout, "b\n");
        assert_eq!(run("if false; then echo a; elif true; then echo c; fi").stdout, "c\n");
    }

    #[test]
    fn if_without_match_is_zero() {
        let out = run("if false; then echo a; fi; echo $?");
        assert_eq!(out.stdout, "0\n");
    }

    #[test]
    fn while_loop_counts() {
        let out = run("i=0; while (( i < 3 )); do echo $i; i=$((i+1)); done");
        assert_eq!(out.stdout, "0\n1\n2\n");
    }

    #[test]
    fn until_loop() {
        let out = run("i=0; until (( i >= 2 )); do echo $i; i=$((i+1)); done");
        assert_eq!(out.stdout, "0\n1\n");
    }

    #[test]
    fn for_list_loop() {
        assert_eq!(run("for x in a b c; do echo $x; done").stdout, "a\nb\nc\n");
    }

    #[test]
    fn for_defaults_to_positional() {
        let out = run("set -- one two; for x; do echo $x; done");
        assert_eq!(out.stdout, "one\ntwo\n");
    }

    #[test]
    fn c_style_for() {
        let out = run("for ((i=0; i<3; i++)); do echo $i; done");
        assert_eq!(out.stdout, "0\n1\n2\n");
    }

    #[test]
    fn break_and_continue() {
        let out = run("for x in 1 2 3 4; do if [ $x = 3 ]; then break; fi; echo $x; done");
        assert_eq!(out.stdout, "1\n2\n");
        let out = run("for x in 1 2 3; do if [ $x = 2 ]; then continue; fi; echo $x; done");
        assert_eq!(out.stdout, "1\n3\n");
    }

    #[test]
    fn break_two_levels() {
        let out = run("for a in 1 2; do for b in x y; do echo $a$b; break 2; done; done");
        assert_eq!(out.stdout, "1x\n");
    }

    #[test]
    fn case_matching() {
        let out = run("case hello.txt in *.md) echo md;; *.txt) echo txt;; *) echo other;; esac");
        assert_eq!(out.stdout, "txt\n");
    }

    #[test]
    fn case_fallthrough() {
        let out = run("case a in a) echo one;& b) echo two;; c) echo three;; esac");
        assert_eq!(out.stdout, "one\ntwo\n");
    }

    #[test]
    fn case_test_next() {
        let out = run("case abc in a*) echo starts;;& *c) echo ends;; esac");
        assert_eq!(out.stdout, "starts\nends\n");
    }

    #[test]
    fn case_no_match_is_zero() {
        let out = run("case z in a) echo a;; esac; echo $?");
        assert_eq!(out.stdout, "0\n");
    }

    #[test]
    fn subshell_isolation() {
        let out = run("x=outer; (x=inner; echo $x); echo $x");
        assert_eq!(out.stdout, "inner\nouter\n");
    }

    #[test]
    fn subshell_cwd_isolation() {
        let out = run("mkdir -p /tmp/d 2>/dev/null; (cd /tmp; pwd); pwd");
        assert!(out.stdout.ends_with("/\n"));
    }

    #[test]
    fn group_shares_state() {
        let out = run("{ x=shared; }; echo $x");
        assert_eq!(out.stdout, "shared\n");
    }

    #[test]
    fn arith_command_exit_codes() {
        assert_eq!(run("(( 1 ))").exit_code, 0);
        assert_eq!(run("(( 0 ))").exit_code, 1);
        assert_eq!(run("(( 2 > 1 ))").exit_code, 0);
    }

    #[test]
    fn loop_iteration_limit() {
        use crate::interp::testkit::run_with_limits;
        use crate::interp::ExecutionLimits;
        let limits = ExecutionLimits { max_loop_iterations: 5, ..Default::default() };
        let out = run_with_limits("while true; do :; done", limits);
        assert_eq!(out.exit_code, 137);
        assert!(out.stderr.contains("iteration"));
    }

    #[test]
    fn select_reads_choice() {
        let out = run("echo 2 | { select c in apple pear; do echo picked:$c; break; done; }");
        assert_eq!(out.stdout, "picked:pear\n");
        assert!(out.stderr.contains("1) apple"));
    }
}

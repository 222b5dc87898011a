//! Function calls.
//!
//! A call pushes a scope (for `local`), swaps in the argument list as
//! the positional parameters, and runs the body. `return` unwinds to
//! here; the saved positionals come back atomically on exit.

use indexmap::IndexMap;

use crate::interp::engine::Interp;
use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, Scope, ShellState};

impl<'a> Interp<'a> {
    pub fn call_function(
        &self,
        state: &mut ShellState,
        name: &str,
        args: &[String],
    ) -> Result<ExecResult, Interrupt> {
        self.limits.check_call_depth(state)?;
        let def = match state.functions.get(name) {
            Some(def) => def.clone(),
            None => {
                return Ok(ExecResult::failure(
                    format!("sandbash: {}: command not found\n", name),
                    127,
                ))
            }
        };

        state.call_depth += 1;
        state.scopes.push(Scope {
            vars: IndexMap::new(),
            function_name: name.to_string(),
            saved_positional: std::mem::replace(&mut state.positional, args.to_vec()),
        });

        let outcome = self.execute_compound(state, &def.body);

        let frame = state.scopes.pop().expect("function frame");
        state.positional = frame.saved_positional;
        state.call_depth -= 1;

        match outcome {
            Ok(result) => Ok(result),
            Err(Interrupt::Return(ret)) => {
                state.set_exit_code(ret.code);
                Ok(ExecResult::new(ret.stdout, ret.stderr, ret.code))
            }
            Err(other) => Err(other),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::{run, run_with_limits};
    use crate::interp::ExecutionLimits;

    #[test]
    fn arguments_become_positionals() {
        let out = run("f() { echo $1:$2:$#; }; f one two");
        assert_eq!(out.stdout, "one:two:2\n");
    }

    #[test]
    fn positionals_restored_after_call() {
        let out = run("set -- outer; f() { echo in:$1; }; f inner; echo out:$1");
        assert_eq!(out.stdout, "in:inner\nout:outer\n");
    }

    #[test]
    fn return_sets_exit_code() {
        let out = run("f() { return 7; }; f; echo $?");
        assert_eq!(out.stdout, "7\n");
    }

    #[test]
    fn return_keeps_prior_output() {
        let out = run("f() { echo first; return 0; echo second; }; f");
        assert_eq!(out.stdout, "first\n");
    }

    #[test]
    fn local_variables_stay_local() {
        let out = run("x=global; f() { local x=local; echo $x; }; f; echo $x");
        assert_eq!(out.stdout, "local\nglobal\n");
    }

    #[test]
    fn unscoped_writes_escape() {
        let out = run("f() { y=from-function; }; f; echo $y");
        assert_eq!(out.stdout, "from-function\n");
    }

    #[test]
    fn nested_calls() {
        let out = run("outer() { inner a; }; inner() { echo got:$1; }; outer");
        assert_eq!(out.stdout, "got:a\n");
    }

    #[test]
    fn recursion_hits_depth_limit() {
        let limits = ExecutionLimits { max_call_depth: 50, ..Default::default() };
        let out = run_with_limits("f(){ f; }; f", limits);
        assert_eq!(out.stdout, "");
        assert_eq!(out.exit_code, 137);
        assert!(out.stderr.contains("call depth"));
    }

    #[test]
    fn function_body_redirection() {
        use crate::interp::testkit::run_in;
        let (_, fs) = run_in("f() { echo logged; } >/log.txt; f; f");
        assert_eq!(fs.file("/log.txt"), "logged\n");
    }

    #[test]
    fn funcname_visible() {
        let out = run("f() { echo $FUNCNAME; }; f");
        assert_eq!(out.stdout, "f\n");
    }
}

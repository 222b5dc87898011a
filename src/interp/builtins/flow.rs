//! Control flow builtins and interpreter re-entry: `break`, `continue`,
//! `return`, `exit`, `eval`, `source`, `let`, `type`, `command`.

use crate::interp::builtins;
use crate::interp::engine::Interp;
use crate::interp::error::{
    FunctionReturn, Interrupt, LoopBreak, LoopContinue, ShellExit,
};
use crate::interp::state::{ExecResult, ShellState};

fn parse_level(args: &[String]) -> Result<u32, String> {
    match args.first() {
        None => Ok(1),
        Some(text) => match text.parse::<i64>() {
            Ok(n) if n >= 1 => Ok(n as u32),
            Ok(n) => Err(format!("{}: loop count out of range", n)),
            Err(_) => Err(format!("{}: numeric argument required", text)),
        },
    }
}

pub fn run_break(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    if state.loop_depth == 0 {
        // Outside a loop this is a warning, not an error.
        return Ok(ExecResult::failure(
            "sandbash: break: only meaningful in a `for', `while', or `until' loop\n",
            0,
        ));
    }
    match parse_level(args) {
        Ok(levels) => Err(Interrupt::Break(LoopBreak { levels, ..Default::default() })),
        Err(message) => Ok(ExecResult::failure(format!("sandbash: break: {}\n", message), 1)),
    }
}

pub fn run_continue(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    if state.loop_depth == 0 {
        return Ok(ExecResult::failure(
            "sandbash: continue: only meaningful in a `for', `while', or `until' loop\n",
            0,
        ));
    }
    match parse_level(args) {
        Ok(levels) => Err(Interrupt::Continue(LoopContinue { levels, ..Default::default() })),
        Err(message) => Ok(ExecResult::failure(format!("sandbash: continue: {}\n", message), 1)),
    }
}

pub fn run_return(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    if !state.in_function() {
        return Ok(ExecResult::failure(
            "sandbash: return: can only `return' from a function or sourced script\n",
            1,
        ));
    }
    let code = match args.first() {
        None => state.last_exit_code,
        Some(text) => match text.parse::<i32>() {
            Ok(n) => n & 0xff,
            Err(_) => {
                return Ok(ExecResult::failure(
                    format!("sandbash: return: {}: numeric argument required\n", text),
                    2,
                ))
            }
        },
    };
    Err(Interrupt::Return(FunctionReturn { code, ..Default::default() }))
}

pub fn run_exit(state: &mut ShellState, args: &[String]) -> Result<ExecResult, Interrupt> {
    let code = match args.first() {
        None => state.last_exit_code,
        Some(text) => match text.parse::<i32>() {
            Ok(n) => n & 0xff,
            Err(_) => 2,
        },
    };
    Err(Interrupt::Exit(ShellExit { code, ..Default::default() }))
}

pub fn run_eval(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
) -> Result<ExecResult, Interrupt> {
    let source = args.join(" ");
    if source.trim().is_empty() {
        return Ok(ExecResult::ok());
    }
    interp.limits.check_call_depth(state)?;
    state.call_depth += 1;
    let result = interp.execute_source_text(state, &source);
    state.call_depth -= 1;
    result
}

pub fn run_source(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
) -> Result<ExecResult, Interrupt> {
    let path = match args.first() {
        Some(path) => path.clone(),
        None => {
            return Ok(ExecResult::failure("sandbash: source: filename argument required\n", 2))
        }
    };

    let resolved = interp.fs.resolve_path(&state.cwd, &path);
    let source = match interp.fs.read_file(&resolved) {
        Ok(content) => content,
        Err(_) => {
            return Ok(ExecResult::failure(
                format!("sandbash: source: {}: No such file or directory\n", path),
                1,
            ))
        }
    };

    interp.limits.check_call_depth(state)?;
    state.call_depth += 1;

    // Extra arguments temporarily replace the positional parameters.
    let saved_positional = if args.len() > 1 {
        Some(std::mem::replace(&mut state.positional, args[1..].to_vec()))
    } else {
        None
    };

    let outcome = interp.execute_source_text(state, &source);

    if let Some(saved) = saved_positional {
        state.positional = saved;
    }
    state.call_depth -= 1;

    match outcome {
        // `return` ends the sourced file, not the caller.
        Err(Interrupt::Return(ret)) => {
            state.set_exit_code(ret.code);
            Ok(ExecResult::new(ret.stdout, ret.stderr, ret.code))
        }
        other => other,
    }
}

pub fn run_let(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
) -> Result<ExecResult, Interrupt> {
    if args.is_empty() {
        return Ok(ExecResult::failure("sandbash: let: expression expected\n", 1));
    }
    let mut value = 0;
    for arg in args {
        value = match interp.eval_arith_text(state, arg) {
            Ok(v) => v,
            Err(Interrupt::Expansion(e)) => {
                return Ok(ExecResult::failure(format!("sandbash: let: {}\n", e.message), 1))
            }
            Err(other) => return Err(other),
        };
    }
    Ok(ExecResult::code(if value != 0 { 0 } else { 1 }))
}

pub fn run_type(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
) -> Result<ExecResult, Interrupt> {
    let mut out = String::new();
    let mut stderr = String::new();
    let mut code = 0;
    for name in args.iter().filter(|a| !a.starts_with('-')) {
        if state.functions.contains_key(name.as_str()) {
            out.push_str(&format!("{} is a function\n", name));
        } else if builtins::is_builtin(name) {
            out.push_str(&format!("{} is a shell builtin\n", name));
        } else if interp.external.contains(name) {
            out.push_str(&format!("{} is /usr/bin/{}\n", name, name));
        } else {
            stderr.push_str(&format!("sandbash: type: {}: not found\n", name));
            code = 1;
        }
    }
    Ok(ExecResult::new(out, stderr, code))
}

/// `command [-v] name [args]` — bypass function lookup.
pub fn run_command(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
) -> Result<ExecResult, Interrupt> {
    let mut rest = args;
    let mut describe = false;
    while let Some(first) = rest.first() {
        match first.as_str() {
            "-v" | "-V" => {
                describe = true;
                rest = &rest[1..];
            }
            "--" | "-p" => rest = &rest[1..],
            _ => break,
        }
    }
    let name = match rest.first() {
        Some(name) => name.clone(),
        None => return Ok(ExecResult::ok()),
    };

    if describe {
        if builtins::is_builtin(&name) || interp.external.contains(&name) {
            return Ok(ExecResult::new(format!("{}\n", name), String::new(), 0));
        }
        return Ok(ExecResult::code(1));
    }

    let call_args = &rest[1..];
    if builtins::is_builtin(&name) {
        return interp.run_builtin(state, &name, call_args);
    }
    if interp.external.contains(&name) {
        let stdin = state.current_stdin.clone().unwrap_or_default();
        let output =
            interp.external.run(&name, call_args, state.exported_env(), &state.cwd, &stdin);
        return Ok(ExecResult::new(output.stdout, output.stderr, output.exit_code));
    }
    Ok(ExecResult::failure(format!("sandbash: {}: command not found\n", name), 127))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::{run, run_in};

    #[test]
    fn break_outside_loop_warns() {
        let out = run("break; echo still-here; echo $?");
        assert!(out.stderr.contains("only meaningful"));
        assert!(out.stdout.contains("still-here"));
    }

    #[test]
    fn return_outside_function_fails() {
        let out = run("return 5; echo code=$?");
        assert!(out.stdout.contains("code=1"));
    }

    #[test]
    fn exit_without_args_uses_last_status() {
        let out = run("false; exit");
        assert_eq!(out.exit_code, 1);
    }

    #[test]
    fn eval_concatenates_and_runs() {
        assert_eq!(run("eval 'echo from' eval").stdout, "from eval\n");
        assert_eq!(run("cmd=echo; eval $cmd nested").stdout, "nested\n");
    }

    #[test]
    fn eval_sees_current_scope() {
        assert_eq!(run("x=1; eval 'echo $x'").stdout, "1\n");
        assert_eq!(run("eval 'y=2'; echo $y").stdout, "2\n");
    }

    #[test]
    fn source_runs_in_current_shell() {
        let (out, _) = run_in("echo 'sourced_var=yes' >/lib.sh; source /lib.sh; echo $sourced_var");
        assert_eq!(out.stdout, "yes\n");
    }

    #[test]
    fn source_with_arguments() {
        let (out, _) = run_in("echo 'echo arg:$1' >/lib.sh; . /lib.sh hello");
        assert_eq!(out.stdout, "arg:hello\n");
    }

    #[test]
    fn source_return_stops_file_only() {
        let (out, _) = run_in("printf 'echo one\\nreturn 3\\necho two\\n' >/lib.sh; source /lib.sh; echo code=$?");
        assert_eq!(out.stdout, "one\ncode=3\n");
    }

    #[test]
    fn source_missing_file() {
        let out = run("source /missing.sh; echo $?");
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn let_builtin() {
        assert_eq!(run("let 'x = 2 + 3'; echo $x").stdout, "5\n");
        assert_eq!(run("let 0; echo $?").stdout, "1\n");
        assert_eq!(run("let 1; echo $?").stdout, "0\n");
    }

    #[test]
    fn type_classifies() {
        let out = run("f() { :; }; type f echo cat");
        assert!(out.stdout.contains("f is a function"));
        assert!(out.stdout.contains("echo is a shell builtin"));
        assert!(out.stdout.contains("cat is /usr/bin/cat"));
    }

    #[test]
    fn command_bypasses_functions() {
        let out = run("echo() { builtin_echo_is_hidden; }; command echo visible");
        assert_eq!(out.stdout, "visible\n");
    }
}

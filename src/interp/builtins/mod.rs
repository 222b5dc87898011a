//! Interpreter-coupled builtins.
//!
//! These are the commands that must live inside the interpreter because
//! they read or mutate shell state: variable and option management,
//! control flow, directory state, and the re-entrant `eval`/`source`.

pub mod cd;
pub mod declare;
pub mod echo;
pub mod flow;
pub mod read;
pub mod set_cmd;
pub mod test_cmd;

use crate::interp::engine::Interp;
use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, ShellState};

pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        ":" | "true"
            | "false"
            | "echo"
            | "printf"
            | "cd"
            | "pwd"
            | "umask"
            | "read"
            | "set"
            | "shopt"
            | "shift"
            | "declare"
            | "typeset"
            | "local"
            | "export"
            | "readonly"
            | "unset"
            | "break"
            | "continue"
            | "return"
            | "exit"
            | "eval"
            | "source"
            | "."
            | "let"
            | "test"
            | "["
            | "type"
            | "command"
    )
}

impl<'a> Interp<'a> {
    pub fn run_builtin(
        &self,
        state: &mut ShellState,
        name: &str,
        args: &[String],
    ) -> Result<ExecResult, Interrupt> {
        match name {
            ":" | "true" => Ok(ExecResult::ok()),
            "false" => Ok(ExecResult::code(1)),
            "echo" => echo::run_echo(state, args),
            "printf" => echo::run_printf(state, args),
            "cd" => cd::run_cd(self, state, args),
            "pwd" => cd::run_pwd(state),
            "umask" => cd::run_umask(state, args),
            "read" => read::run_read(state, args),
            "set" => set_cmd::run_set(state, args),
            "shopt" => set_cmd::run_shopt(state, args),
            "shift" => set_cmd::run_shift(state, args),
            "declare" | "typeset" => declare::run_declare(self, state, args, declare::Mode::Declare),
            "local" => declare::run_declare(self, state, args, declare::Mode::Local),
            "export" => declare::run_declare(self, state, args, declare::Mode::Export),
            "readonly" => declare::run_declare(self, state, args, declare::Mode::Readonly),
            "unset" => declare::run_unset(self, state, args),
            "break" => flow::run_break(state, args),
            "continue" => flow::run_continue(state, args),
            "return" => flow::run_return(state, args),
            "exit" => flow::run_exit(state, args),
            "eval" => flow::run_eval(self, state, args),
            "source" | "." => flow::run_source(self, state, args),
            "let" => flow::run_let(self, state, args),
            "test" => test_cmd::run_test(self, state, args),
            "[" => {
                if args.last().map(String::as_str) != Some("]") {
                    return Ok(ExecResult::failure("sandbash: [: missing `]'\n", 2));
                }
                test_cmd::run_test(self, state, &args[..args.len() - 1])
            }
            "type" => flow::run_type(self, state, args),
            "command" => flow::run_command(self, state, args),
            _ => Ok(ExecResult::failure(
                format!("sandbash: {}: builtin not implemented\n", name),
                1,
            )),
        }
    }
}

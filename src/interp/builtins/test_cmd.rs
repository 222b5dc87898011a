//! `test` / `[` — the classic conditional command over plain arguments.
//! Unlike `[[ ]]`, operands here are already expanded, `=` compares
//! literally, and `-a`/`-o` conjunctions plus `\( \)` grouping exist.

use crate::ast::types::CondUnaryOp;
use crate::interp::engine::Interp;
use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, ShellState};

pub fn run_test(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
) -> Result<ExecResult, Interrupt> {
    if args.is_empty() {
        return Ok(ExecResult::code(1));
    }
    let mut parser = TestParser { interp, state, args, pos: 0 };
    match parser.parse_or() {
        Ok(value) => {
            if parser.pos != args.len() {
                return Ok(ExecResult::failure(
                    format!("sandbash: test: {}: unexpected argument\n", args[parser.pos]),
                    2,
                ));
            }
            Ok(ExecResult::code(if value { 0 } else { 1 }))
        }
        Err(TestError::Interrupt(interrupt)) => Err(interrupt),
        Err(TestError::Message(message)) => {
            Ok(ExecResult::failure(format!("sandbash: test: {}\n", message), 2))
        }
    }
}

enum TestError {
    Message(String),
    Interrupt(Interrupt),
}

impl From<Interrupt> for TestError {
    fn from(i: Interrupt) -> Self {
        TestError::Interrupt(i)
    }
}

struct TestParser<'i, 'a, 's> {
    interp: &'i Interp<'a>,
    state: &'s mut ShellState,
    args: &'s [String],
    pos: usize,
}

impl TestParser<'_, '_, '_> {
    fn peek(&self) -> Option<&str> {
        self.args.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> Option<String> {
        let value = self.args.get(self.pos).cloned();
        if value.is_some() {
            self.pos += 1;
        }
        value
    }

    fn parse_or(&mut self) -> Result<bool, TestError> {
        let mut value = self.parse_and()?;
        while self.peek() == Some("-o") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn parse_and(&mut self) -> Result<bool, TestError> {
        let mut value = self.parse_not()?;
        while self.peek() == Some("-a") {
            self.pos += 1;
            let rhs = self.parse_not()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn parse_not(&mut self) -> Result<bool, TestError> {
        if self.peek() == Some("!") {
            self.pos += 1;
            return Ok(!self.parse_not()?);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<bool, TestError> {
        if self.peek() == Some("(") {
            self.pos += 1;
            let value = self.parse_or()?;
            if self.peek() != Some(")") {
                return Err(TestError::Message("`)' expected".to_string()));
            }
            self.pos += 1;
            return Ok(value);
        }

        let first = match self.next() {
            Some(arg) => arg,
            None => return Err(TestError::Message("argument expected".to_string())),
        };

        // Binary form: ARG op ARG.
        if let Some(op) = self.peek() {
            if is_binary_op(op) {
                let op = op.to_string();
                self.pos += 1;
                let rhs = self
                    .next()
                    .ok_or_else(|| TestError::Message(format!("{}: argument expected", op)))?;
                return self.binary(&first, &op, &rhs);
            }
        }

        // Unary form: -x ARG.
        if first.starts_with('-') && first.len() == 2 {
            if let Some(op) = CondUnaryOp::from_flag(&first) {
                let operand = match self.next() {
                    Some(arg) => arg,
                    // POSIX: `test -n` is the one-argument string test.
                    None => return Ok(!first.is_empty()),
                };
                return Ok(self.interp.unary_test(self.state, op, &operand)?);
            }
        }

        // One argument: true when non-empty.
        Ok(!first.is_empty())
    }

    fn binary(&mut self, lhs: &str, op: &str, rhs: &str) -> Result<bool, TestError> {
        Ok(match op {
            "=" | "==" => lhs == rhs,
            "!=" => lhs != rhs,
            "<" => lhs < rhs,
            ">" => lhs > rhs,
            "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" => {
                let a = self.integer(lhs)?;
                let b = self.integer(rhs)?;
                match op {
                    "-eq" => a == b,
                    "-ne" => a != b,
                    "-lt" => a < b,
                    "-le" => a <= b,
                    "-gt" => a > b,
                    _ => a >= b,
                }
            }
            "-nt" | "-ot" | "-ef" => {
                let a = self.interp.fs.stat(&self.interp.fs.resolve_path(&self.state.cwd, lhs)).ok();
                let b = self.interp.fs.stat(&self.interp.fs.resolve_path(&self.state.cwd, rhs)).ok();
                match op {
                    "-nt" => matches!((&a, &b), (Some(x), Some(y)) if x.mtime > y.mtime)
                        || (a.is_some() && b.is_none()),
                    "-ot" => matches!((&a, &b), (Some(x), Some(y)) if x.mtime < y.mtime)
                        || (a.is_none() && b.is_some()),
                    _ => {
                        a.is_some()
                            && self.interp.fs.resolve_path(&self.state.cwd, lhs)
                                == self.interp.fs.resolve_path(&self.state.cwd, rhs)
                    }
                }
            }
            _ => return Err(TestError::Message(format!("{}: binary operator expected", op))),
        })
    }

    fn integer(&mut self, text: &str) -> Result<i64, TestError> {
        text.trim()
            .parse::<i64>()
            .map_err(|_| TestError::Message(format!("{}: integer expression expected", text)))
    }
}

fn is_binary_op(op: &str) -> bool {
    matches!(
        op,
        "=" | "==" | "!=" | "<" | ">" | "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" | "-nt" | "-ot" | "-ef"
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::{run, run_in};

    #[test]
    fn string_tests() {
        assert_eq!(run("test hello; echo $?").stdout, "0\n");
        assert_eq!(run("test ''; echo $?").stdout, "1\n");
        assert_eq!(run("[ -z '' ]; echo $?").stdout, "0\n");
        assert_eq!(run("[ -n x ]; echo $?").stdout, "0\n");
    }

    #[test]
    fn equality_is_literal() {
        assert_eq!(run("[ abc = abc ]; echo $?").stdout, "0\n");
        assert_eq!(run("[ abc = a* ]; echo $?").stdout, "1\n");
        assert_eq!(run("[ a != b ]; echo $?").stdout, "0\n");
    }

    #[test]
    fn numeric_comparisons() {
        assert_eq!(run("[ 5 -gt 3 ]; echo $?").stdout, "0\n");
        assert_eq!(run("[ 5 -le 3 ]; echo $?").stdout, "1\n");
    }

    #[test]
    fn non_integer_errors() {
        let out = run("[ x -eq 3 ]; echo code=$?");
        assert!(out.stderr.contains("integer expression expected"));
        assert!(out.stdout.contains("code=2"));
    }

    #[test]
    fn file_tests() {
        let (out, _) = run_in("echo hi >/f; [ -f /f ] && echo yes; [ -d / ] && echo dir");
        assert_eq!(out.stdout, "yes\ndir\n");
    }

    #[test]
    fn conjunctions() {
        assert_eq!(run("[ a = a -a b = b ]; echo $?").stdout, "0\n");
        assert_eq!(run("[ a = b -o c = c ]; echo $?").stdout, "0\n");
        assert_eq!(run("[ ! a = b ]; echo $?").stdout, "0\n");
    }

    #[test]
    fn missing_bracket() {
        let out = run("[ a = a; echo code=$?");
        assert!(out.stdout.contains("code=2"));
    }

    #[test]
    fn empty_test_is_false() {
        assert_eq!(run("test; echo $?").stdout, "1\n");
    }
}

//! `[[ … ]]` evaluation.
//!
//! File tests go through the virtual filesystem; `==`/`!=` match shell
//! patterns unless the right side was quoted; `=~` compiles the regex
//! and binds `BASH_REMATCH`.

use std::collections::BTreeMap;

use regex_lite::Regex;

use crate::ast::types::{CondBinaryOp, CondExpr, CondUnaryOp, Word, WordPart};
use crate::expand::pattern::{matches_pattern, PatternOptions};
use crate::interp::engine::Interp;
use crate::interp::error::{ExpansionFailure, Interrupt};
use crate::interp::state::{ExecResult, ShellState, Value, VarFlags, Variable};

impl<'a> Interp<'a> {
    pub fn eval_cond_command(
        &self,
        state: &mut ShellState,
        expr: &CondExpr,
    ) -> Result<ExecResult, Interrupt> {
        match self.eval_cond(state, expr) {
            Ok(true) => Ok(ExecResult::code(0)),
            Ok(false) => Ok(ExecResult::code(1)),
            Err(Interrupt::Expansion(e)) if !e.fatal => {
                Ok(ExecResult::failure(format!("sandbash: {}\n", e.message), 2))
            }
            Err(other) => Err(other),
        }
    }

    pub fn eval_cond(&self, state: &mut ShellState, expr: &CondExpr) -> Result<bool, Interrupt> {
        match expr {
            CondExpr::Not(inner) => Ok(!self.eval_cond(state, inner)?),
            CondExpr::And(lhs, rhs) => {
                // Short-circuit: the right side may have side effects.
                if !self.eval_cond(state, lhs)? {
                    return Ok(false);
                }
                self.eval_cond(state, rhs)
            }
            CondExpr::Or(lhs, rhs) => {
                if self.eval_cond(state, lhs)? {
                    return Ok(true);
                }
                self.eval_cond(state, rhs)
            }
            CondExpr::Group(inner) => self.eval_cond(state, inner),
            CondExpr::Word(word) => {
                let text = self.expand_word_single(state, word)?;
                Ok(!text.is_empty())
            }
            CondExpr::Unary { op, operand } => {
                let text = self.expand_word_single(state, operand)?;
                self.unary_test(state, *op, &text)
            }
            CondExpr::Binary { op, lhs, rhs } => self.binary_test(state, *op, lhs, rhs),
        }
    }

    pub fn unary_test(
        &self,
        state: &mut ShellState,
        op: CondUnaryOp,
        text: &str,
    ) -> Result<bool, Interrupt> {
        let path = || self.fs.resolve_path(&state.cwd, text);
        Ok(match op {
            CondUnaryOp::ZeroLength => text.is_empty(),
            CondUnaryOp::NonZeroLength => !text.is_empty(),
            CondUnaryOp::Exists | CondUnaryOp::FileExistsAlias => self.fs.exists(&path()),
            CondUnaryOp::RegularFile => self.fs.is_file(&path()),
            CondUnaryOp::Directory => self.fs.is_dir(&path()),
            CondUnaryOp::Symlink => {
                self.fs.lstat(&path()).map(|s| s.is_symlink).unwrap_or(false)
            }
            CondUnaryOp::NonEmptyFile => {
                self.fs.stat(&path()).map(|s| s.is_file && s.size > 0).unwrap_or(false)
            }
            CondUnaryOp::Readable | CondUnaryOp::Writable => self.fs.exists(&path()),
            CondUnaryOp::Executable => {
                self.fs.stat(&path()).map(|s| s.is_directory || s.mode & 0o111 != 0).unwrap_or(false)
            }
            CondUnaryOp::Setuid => {
                self.fs.stat(&path()).map(|s| s.mode & 0o4000 != 0).unwrap_or(false)
            }
            CondUnaryOp::Setgid => {
                self.fs.stat(&path()).map(|s| s.mode & 0o2000 != 0).unwrap_or(false)
            }
            CondUnaryOp::Sticky => {
                self.fs.stat(&path()).map(|s| s.mode & 0o1000 != 0).unwrap_or(false)
            }
            // No devices, fifos, sockets or terminals in the sandbox.
            CondUnaryOp::BlockSpecial
            | CondUnaryOp::CharSpecial
            | CondUnaryOp::Fifo
            | CondUnaryOp::Socket
            | CondUnaryOp::Tty => false,
            CondUnaryOp::ModifiedSince => self.fs.exists(&path()),
            CondUnaryOp::OwnedByUser | CondUnaryOp::OwnedByGroup => self.fs.exists(&path()),
            CondUnaryOp::OptionEnabled => option_enabled(state, text),
            CondUnaryOp::VarSet => {
                if let Some((name, subscript)) = split_subscript(text) {
                    self.element_is_set(state, name, subscript)?
                } else {
                    state.is_set(text)
                }
            }
            CondUnaryOp::VarNameref => {
                state.get_var(text).map(|v| v.flags.nameref).unwrap_or(false)
                    || nameref_flag(state, text)
            }
        })
    }

    fn binary_test(
        &self,
        state: &mut ShellState,
        op: CondBinaryOp,
        lhs: &Word,
        rhs: &Word,
    ) -> Result<bool, Interrupt> {
        match op {
            CondBinaryOp::Eq | CondBinaryOp::Ne => {
                let left = self.expand_word_single(state, lhs)?;
                let pattern = self.expand_word_pattern(state, rhs)?;
                let opts = PatternOptions {
                    extglob: true,
                    case_insensitive: state.shopts.nocasematch,
                    ..Default::default()
                };
                let hit = matches_pattern(&left, &pattern, &opts);
                Ok(if op == CondBinaryOp::Eq { hit } else { !hit })
            }
            CondBinaryOp::Regex => {
                let left = self.expand_word_single(state, lhs)?;
                let source = self.expand_word_regex(state, rhs)?;
                let flags = if state.shopts.nocasematch { "(?i)" } else { "" };
                let regex = Regex::new(&format!("{}{}", flags, source)).map_err(|_| {
                    Interrupt::Expansion(ExpansionFailure::new(format!(
                        "invalid regular expression: {}",
                        source
                    )))
                })?;
                match regex.captures(&left) {
                    Some(captures) => {
                        let mut rematch = BTreeMap::new();
                        for (i, group) in captures.iter().enumerate() {
                            if let Some(m) = group {
                                rematch.insert(i as i64, m.as_str().to_string());
                            }
                        }
                        state.env.insert(
                            "BASH_REMATCH".to_string(),
                            Variable { value: Value::Indexed(rematch), flags: VarFlags::default() },
                        );
                        Ok(true)
                    }
                    None => {
                        state.env.insert(
                            "BASH_REMATCH".to_string(),
                            Variable {
                                value: Value::Indexed(BTreeMap::new()),
                                flags: VarFlags::default(),
                            },
                        );
                        Ok(false)
                    }
                }
            }
            CondBinaryOp::Lt | CondBinaryOp::Gt => {
                let left = self.expand_word_single(state, lhs)?;
                let right = self.expand_word_single(state, rhs)?;
                Ok(if op == CondBinaryOp::Lt { left < right } else { left > right })
            }
            CondBinaryOp::NumEq
            | CondBinaryOp::NumNe
            | CondBinaryOp::NumLt
            | CondBinaryOp::NumLe
            | CondBinaryOp::NumGt
            | CondBinaryOp::NumGe => {
                let left_text = self.expand_word_single(state, lhs)?;
                let right_text = self.expand_word_single(state, rhs)?;
                let a = self.eval_arith_text(state, &left_text)?;
                let b = self.eval_arith_text(state, &right_text)?;
                Ok(match op {
                    CondBinaryOp::NumEq => a == b,
                    CondBinaryOp::NumNe => a != b,
                    CondBinaryOp::NumLt => a < b,
                    CondBinaryOp::NumLe => a <= b,
                    CondBinaryOp::NumGt => a > b,
                    _ => a >= b,
                })
            }
            CondBinaryOp::NewerThan | CondBinaryOp::OlderThan | CondBinaryOp::SameFile => {
                let left = self.expand_word_single(state, lhs)?;
                let right = self.expand_word_single(state, rhs)?;
                let a = self.fs.stat(&self.fs.resolve_path(&state.cwd, &left)).ok();
                let b = self.fs.stat(&self.fs.resolve_path(&state.cwd, &right)).ok();
                Ok(match op {
                    CondBinaryOp::NewerThan => match (a, b) {
                        (Some(a), Some(b)) => a.mtime > b.mtime,
                        (Some(_), None) => true,
                        _ => false,
                    },
                    CondBinaryOp::OlderThan => match (a, b) {
                        (Some(a), Some(b)) => a.mtime < b.mtime,
                        (None, Some(_)) => true,
                        _ => false,
                    },
                    _ => {
                        // -ef: same underlying file; paths resolve equal.
                        self.fs.resolve_path(&state.cwd, &left)
                            == self.fs.resolve_path(&state.cwd, &right)
                            && a.is_some()
                    }
                })
            }
        }
    }

    fn element_is_set(
        &self,
        state: &mut ShellState,
        name: &str,
        subscript: &str,
    ) -> Result<bool, Interrupt> {
        match state.get_var(name).map(|v| v.value.clone()) {
            Some(Value::Associative(map)) => {
                let key = self.expand_subscript_key(state, subscript)?;
                Ok(map.contains_key(&key))
            }
            Some(Value::Indexed(map)) => {
                if subscript == "@" || subscript == "*" {
                    return Ok(!map.is_empty());
                }
                let idx = self.eval_index(state, subscript)?;
                let idx =
                    if idx < 0 { map.keys().next_back().map(|&k| k + 1).unwrap_or(0) + idx } else { idx };
                Ok(map.contains_key(&idx))
            }
            Some(Value::Scalar(_)) => {
                if subscript == "@" || subscript == "*" {
                    return Ok(true);
                }
                Ok(self.eval_index(state, subscript)? == 0)
            }
            None => Ok(false),
        }
    }
}

fn option_enabled(state: &ShellState, name: &str) -> bool {
    match name {
        "errexit" => state.options.errexit,
        "nounset" => state.options.nounset,
        "pipefail" => state.options.pipefail,
        "xtrace" => state.options.xtrace,
        "verbose" => state.options.verbose,
        "noexec" => state.options.noexec,
        "noglob" => state.options.noglob,
        "noclobber" => state.options.noclobber,
        "allexport" => state.options.allexport,
        "posix" => state.options.posix,
        "monitor" => state.options.monitor,
        _ => false,
    }
}

fn nameref_flag(state: &ShellState, name: &str) -> bool {
    state.env.get(name).map(|v| v.flags.nameref).unwrap_or(false)
}

fn split_subscript(text: &str) -> Option<(&str, &str)> {
    let open = text.find('[')?;
    let close = text.rfind(']')?;
    if close != text.len() - 1 || close <= open {
        return None;
    }
    Some((&text[..open], &text[open + 1..close]))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::{run, run_in};

    #[test]
    fn string_tests() {
        assert_eq!(run("[[ -z '' ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ -z x ]]; echo $?").stdout, "1\n");
        assert_eq!(run("[[ -n x ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ hello ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ '' ]]; echo $?").stdout, "1\n");
    }

    #[test]
    fn string_equality_and_patterns() {
        assert_eq!(run("[[ abc == abc ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ abc == a* ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ abc == 'a*' ]]; echo $?").stdout, "1\n");
        assert_eq!(run("[[ abc != a* ]]; echo $?").stdout, "1\n");
        assert_eq!(run("x=hello.txt; [[ $x == *.txt ]]; echo $?").stdout, "0\n");
    }

    #[test]
    fn lexicographic_compare() {
        assert_eq!(run("[[ apple < banana ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ banana > apple ]]; echo $?").stdout, "0\n");
    }

    #[test]
    fn numeric_comparisons() {
        assert_eq!(run("[[ 5 -gt 3 ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ 5 -le 3 ]]; echo $?").stdout, "1\n");
        assert_eq!(run("x=4; [[ $x -eq 4 ]]; echo $?").stdout, "0\n");
        // Numeric contexts evaluate arithmetic.
        assert_eq!(run("[[ 2+2 -eq 4 ]]; echo $?").stdout, "0\n");
    }

    #[test]
    fn conjunction_and_negation() {
        assert_eq!(run("[[ a == a && b == b ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ a == b || c == c ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ ! a == b ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ ! ( -z x || -z y ) ]]; echo $?").stdout, "0\n");
    }

    #[test]
    fn file_tests() {
        let (out, _) = run_in("echo data >/f.txt; [[ -f /f.txt ]] && echo file; [[ -d / ]] && echo dir");
        assert_eq!(out.stdout, "file\ndir\n");
        assert_eq!(run("[[ -e /nope ]]; echo $?").stdout, "1\n");
        let (out, _) = run_in("echo x >/s.txt; [[ -s /s.txt ]] && echo nonempty");
        assert_eq!(out.stdout, "nonempty\n");
    }

    #[test]
    fn regex_match_and_rematch() {
        let out = run("[[ abc123 =~ ([a-z]+)([0-9]+) ]] && echo ${BASH_REMATCH[0]}:${BASH_REMATCH[1]}:${BASH_REMATCH[2]}");
        assert_eq!(out.stdout, "abc123:abc:123\n");
    }

    #[test]
    fn regex_anchors() {
        assert_eq!(run("[[ hello =~ ^h.*o$ ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ hello =~ ^x ]]; echo $?").stdout, "1\n");
    }

    #[test]
    fn regex_quoted_is_literal() {
        assert_eq!(run("[[ a.c =~ \"a.c\" ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ abc =~ \"a.c\" ]]; echo $?").stdout, "1\n");
        assert_eq!(run("[[ abc =~ a.c ]]; echo $?").stdout, "0\n");
    }

    #[test]
    fn var_set_test() {
        assert_eq!(run("x=1; [[ -v x ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ -v never_set ]]; echo $?").stdout, "1\n");
        assert_eq!(run("a=(1 2); [[ -v 'a[1]' ]]; echo $?").stdout, "0\n");
        assert_eq!(run("a=(1 2); [[ -v 'a[5]' ]]; echo $?").stdout, "1\n");
    }

    #[test]
    fn option_test() {
        assert_eq!(run("set -e; [[ -o errexit ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ -o errexit ]]; echo $?").stdout, "1\n");
    }

    #[test]
    fn nocasematch_applies() {
        assert_eq!(run("shopt -s nocasematch; [[ ABC == abc ]]; echo $?").stdout, "0\n");
        assert_eq!(run("[[ ABC == abc ]]; echo $?").stdout, "1\n");
    }

    #[test]
    fn empty_expansion_needs_no_quotes() {
        // [[ ]] has no word splitting: unquoted empty var works.
        assert_eq!(run("x=''; [[ -z $x ]]; echo $?").stdout, "0\n");
    }
}

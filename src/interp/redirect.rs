//! Redirections.
//!
//! A command's redirections are planned before it runs (targets are
//! opened and truncated up front, heredocs become the stdin buffer) and
//! applied to its output afterwards: every write is buffered until the
//! command completes, then flushed through the fd map.

use crate::ast::types::{RedirOp, RedirTarget, Redirection};
use crate::interp::engine::Interp;
use crate::interp::error::{ExpansionFailure, Interrupt};
use crate::interp::state::{ExecResult, ShellState};

/// Where a stream ends up.
#[derive(Debug, Clone, PartialEq)]
pub enum Sink {
    /// The enclosing context's stdout.
    Stdout,
    /// The enclosing context's stderr.
    Stderr,
    /// Appended to a file that planning already created/truncated.
    File(String),
    /// `>&-`, `/dev/null`.
    Discard,
}

#[derive(Debug, Clone)]
pub struct RedirPlan {
    pub stdin: Option<String>,
    pub out: Sink,
    pub err: Sink,
}

impl Default for RedirPlan {
    fn default() -> Self {
        Self { stdin: None, out: Sink::Stdout, err: Sink::Stderr }
    }
}

impl<'a> Interp<'a> {
    pub fn plan_redirections(
        &self,
        state: &mut ShellState,
        redirections: &[Redirection],
    ) -> Result<RedirPlan, Interrupt> {
        let mut plan = RedirPlan::default();

        for redirection in redirections {
            self.plan_one(state, redirection, &mut plan)?;
        }
        Ok(plan)
    }

    fn open_failure(&self, path: &str) -> Interrupt {
        Interrupt::Expansion(ExpansionFailure::new(format!(
            "{}: cannot overwrite or create file",
            path
        )))
    }

    fn target_text(&self, state: &mut ShellState, target: &RedirTarget) -> Result<String, Interrupt> {
        match target {
            RedirTarget::Word(word) => self.expand_word_single(state, word),
            RedirTarget::HereDoc(_) => Ok(String::new()),
        }
    }

    fn plan_one(
        &self,
        state: &mut ShellState,
        redirection: &Redirection,
        plan: &mut RedirPlan,
    ) -> Result<(), Interrupt> {
        match redirection.op {
            RedirOp::HereDoc => {
                if let RedirTarget::HereDoc(doc) = &redirection.target {
                    let body = if doc.quoted {
                        match &doc.body.parts[..] {
                            [crate::ast::types::WordPart::Literal(text)] => text.clone(),
                            _ => String::new(),
                        }
                    } else {
                        self.expand_heredoc_body(state, &doc.body)?
                    };
                    plan.stdin = Some(body);
                }
            }
            RedirOp::HereString => {
                let mut text = self.target_text(state, &redirection.target)?;
                text.push('\n');
                plan.stdin = Some(text);
            }
            RedirOp::In => {
                let path = self.resolve_target(state, &redirection.target)?;
                if path == "/dev/null" {
                    plan.stdin = Some(String::new());
                } else {
                    match self.fs.read_file(&path) {
                        Ok(content) => plan.stdin = Some(content),
                        Err(_) => {
                            return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                                "{}: No such file or directory",
                                display_path(&path)
                            ))));
                        }
                    }
                }
            }
            RedirOp::InOut => {
                let path = self.resolve_target(state, &redirection.target)?;
                plan.stdin = Some(self.fs.read_file(&path).unwrap_or_default());
                if !self.fs.exists(&path) {
                    self.fs.write_file(&path, "", false).map_err(|_| self.open_failure(&path))?;
                }
            }
            RedirOp::Out | RedirOp::Clobber | RedirOp::Append => {
                let path = self.resolve_target(state, &redirection.target)?;
                let append = redirection.op == RedirOp::Append;
                let sink = self.open_sink(state, &path, append, redirection.op)?;
                if let Some(ref name) = redirection.fd_var {
                    // {name}>file allocates a descriptor for later >&$name.
                    let fd = state.next_fd;
                    state.next_fd += 1;
                    state.fd_table.insert(fd, path.clone());
                    let _ = state.set_scalar(name, fd.to_string());
                } else {
                    match redirection.fd {
                        Some(2) => plan.err = sink,
                        Some(1) | None => plan.out = sink,
                        Some(0) => {}
                        Some(fd) => {
                            state.fd_table.insert(fd, path.clone());
                        }
                    }
                }
            }
            RedirOp::BothOut | RedirOp::BothAppend => {
                let path = self.resolve_target(state, &redirection.target)?;
                let append = redirection.op == RedirOp::BothAppend;
                let sink = self.open_sink(state, &path, append, redirection.op)?;
                plan.out = sink.clone();
                plan.err = sink;
            }
            RedirOp::DupOut => {
                let text = self.target_text(state, &redirection.target)?;
                let source_fd = redirection.fd.unwrap_or(1);
                let sink = match text.trim_end_matches('-') {
                    "" => Sink::Discard, // >&-
                    "1" => plan.out.clone(),
                    "2" => plan.err.clone(),
                    other => match other.parse::<i32>() {
                        Ok(fd) => match state.fd_table.get(&fd) {
                            Some(path) => Sink::File(path.clone()),
                            None => {
                                return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                                    "{}: Bad file descriptor",
                                    fd
                                ))));
                            }
                        },
                        Err(_) => {
                            // `>&file` routes both streams to a file.
                            let path = self.absolute(state, &text);
                            let sink = self.open_sink(state, &path, false, RedirOp::Out)?;
                            plan.out = sink.clone();
                            plan.err = sink;
                            return Ok(());
                        }
                    },
                };
                match source_fd {
                    2 => plan.err = sink,
                    _ => plan.out = sink,
                }
            }
            RedirOp::DupIn => {
                let text = self.target_text(state, &redirection.target)?;
                if text == "-" {
                    plan.stdin = Some(String::new());
                }
                // `<&0` and friends: the single inherited stream already
                // serves as every readable fd.
            }
        }
        Ok(())
    }

    fn resolve_target(
        &self,
        state: &mut ShellState,
        target: &RedirTarget,
    ) -> Result<String, Interrupt> {
        let text = self.target_text(state, target)?;
        Ok(self.absolute(state, &text))
    }

    fn absolute(&self, state: &ShellState, path: &str) -> String {
        self.fs.resolve_path(&state.cwd, path)
    }

    /// Create/truncate the target now; writes land later via `Sink`.
    fn open_sink(
        &self,
        state: &ShellState,
        path: &str,
        append: bool,
        op: RedirOp,
    ) -> Result<Sink, Interrupt> {
        match path {
            "/dev/null" => return Ok(Sink::Discard),
            "/dev/stdout" => return Ok(Sink::Stdout),
            "/dev/stderr" => return Ok(Sink::Stderr),
            _ => {}
        }

        if !append {
            if state.options.noclobber && op == RedirOp::Out && self.fs.is_file(path) {
                return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                    "{}: cannot overwrite existing file",
                    display_path(path)
                ))));
            }
            self.fs.write_file(path, "", false).map_err(|_| self.open_failure(path))?;
        } else if !self.fs.exists(path) {
            self.fs.write_file(path, "", false).map_err(|_| self.open_failure(path))?;
        }
        Ok(Sink::File(path.to_string()))
    }

    /// Route the command's buffered output through the plan.
    pub fn finish_redirections(
        &self,
        _state: &mut ShellState,
        plan: RedirPlan,
        result: ExecResult,
    ) -> Result<ExecResult, Interrupt> {
        let mut stdout = String::new();
        let mut stderr = String::new();

        for (text, sink) in [(result.stdout, &plan.out), (result.stderr, &plan.err)] {
            if text.is_empty() {
                continue;
            }
            match sink {
                Sink::Stdout => stdout.push_str(&text),
                Sink::Stderr => stderr.push_str(&text),
                Sink::Discard => {}
                Sink::File(path) => {
                    if self.fs.write_file(path, &text, true).is_err() {
                        return Ok(ExecResult::failure(
                            format!("sandbash: {}: write error\n", display_path(path)),
                            1,
                        ));
                    }
                }
            }
        }

        Ok(ExecResult::new(stdout, stderr, result.exit_code))
    }

    /// Assignment-only commands still honor their redirections (files
    /// get created) without producing any stream content.
    pub fn apply_redirections_only(
        &self,
        state: &mut ShellState,
        redirections: &[Redirection],
    ) -> Result<ExecResult, Interrupt> {
        match self.plan_redirections(state, redirections) {
            Ok(plan) => self.finish_redirections(state, plan, ExecResult::ok()),
            Err(Interrupt::Expansion(e)) if !e.fatal => {
                Ok(ExecResult::failure(format!("sandbash: {}\n", e.message), 1))
            }
            Err(other) => Err(other),
        }
    }
}

fn display_path(path: &str) -> &str {
    path
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::{run, run_in};

    #[test]
    fn stdout_to_file() {
        let (out, fs) = run_in("echo hello >/out.txt");
        assert_eq!(out.stdout, "");
        assert_eq!(fs.file("/out.txt"), "hello\n");
    }

    #[test]
    fn append_to_file() {
        let (_, fs) = run_in("echo one >/log; echo two >>/log");
        assert_eq!(fs.file("/log"), "one\ntwo\n");
    }

    #[test]
    fn truncation_happens_even_on_failure() {
        let (_, fs) = run_in("echo keep >/f; missing_cmd >/f");
        assert_eq!(fs.file("/f"), "");
    }

    #[test]
    fn stdin_from_file() {
        let (out, _) = run_in("echo data >/in.txt; cat </in.txt");
        assert_eq!(out.stdout, "data\n");
    }

    #[test]
    fn missing_input_file_fails() {
        let out = run("cat </nope; echo code=$?");
        assert!(out.stderr.contains("No such file"));
        assert!(out.stdout.contains("code=1"));
    }

    #[test]
    fn stderr_redirect() {
        let (out, fs) = run_in("missing_cmd 2>/err.txt; echo after");
        assert_eq!(out.stderr, "");
        assert!(fs.file("/err.txt").contains("command not found"));
        assert_eq!(out.stdout, "after\n");
    }

    #[test]
    fn merge_stderr_into_stdout() {
        let out = run("missing_cmd 2>&1 | cat");
        assert!(out.stdout.contains("command not found"));
        assert_eq!(out.stderr, "");
    }

    #[test]
    fn order_of_dup_matters() {
        // >f 2>&1: both into the file.
        let (out, fs) = run_in("{ echo out; missing_cmd; } >/both 2>&1");
        assert_eq!(out.stdout, "");
        assert_eq!(out.stderr, "");
        let content = fs.file("/both");
        assert!(content.contains("out"));
        assert!(content.contains("command not found"));
    }

    #[test]
    fn both_streams_shorthand() {
        let (_, fs) = run_in("{ echo out; missing_cmd; } &>/all");
        let content = fs.file("/all");
        assert!(content.contains("out") && content.contains("command not found"));
    }

    #[test]
    fn dev_null_discards() {
        let out = run("echo noisy >/dev/null; echo quiet");
        assert_eq!(out.stdout, "quiet\n");
    }

    #[test]
    fn heredoc_feeds_stdin() {
        let out = run("cat <<EOF\nline one\nline two\nEOF");
        assert_eq!(out.stdout, "line one\nline two\n");
    }

    #[test]
    fn heredoc_expands_unless_quoted() {
        let out = run("x=world; cat <<EOF\nhello $x\nEOF");
        assert_eq!(out.stdout, "hello world\n");
        let out = run("x=world; cat <<'EOF'\nhello $x\nEOF");
        assert_eq!(out.stdout, "hello $x\n");
    }

    #[test]
    fn herestring() {
        let out = run("cat <<<'just this'");
        assert_eq!(out.stdout, "just this\n");
    }

    #[test]
    fn noclobber_blocks_overwrite() {
        let out = run("set -C; echo a >/f; echo b >/f; echo $?");
        assert!(out.stderr.contains("cannot overwrite"));
        assert!(out.stdout.ends_with("1\n"));
        let out = run("set -C; echo a >/f; echo b >|/f; echo $?");
        assert!(out.stdout.ends_with("0\n"));
    }

    #[test]
    fn compound_redirection() {
        let (_, fs) = run_in("for i in 1 2; do echo $i; done >/loop.txt");
        assert_eq!(fs.file("/loop.txt"), "1\n2\n");
    }

    #[test]
    fn close_stdout() {
        let out = run("echo hidden >&-; echo shown");
        assert_eq!(out.stdout, "shown\n");
    }
}

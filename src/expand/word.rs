//! The expansion pipeline.
//!
//! Per word: brace expansion first, then per-part expansion into labeled
//! segments, IFS field formation, pathname expansion and quote removal.
//! `"$@"` contributes hard field breaks; everything else flows through
//! the segment model in `split`.

use crate::ast::types::{BraceItem, ProcessSubDirection, Script, Word, WordPart};
use crate::expand::brace::expand_braces;
use crate::expand::pattern::{escape_pattern, has_glob_chars};
use crate::expand::split::{split_fields, Field, Segment};
use crate::expand::tilde::expand_tilde;
use crate::interp::engine::Interp;
use crate::interp::error::{CarriesOutput, GlobFailure, Interrupt};
use crate::interp::state::{ExecResult, ShellState};

/// One expanded unit: a segment, or a hard field boundary from `"$@"`.
#[derive(Debug, Clone)]
pub enum Piece {
    Seg(Segment),
    Break,
}

impl Piece {
    pub fn quoted(text: impl Into<String>) -> Self {
        Piece::Seg(Segment::quoted_text(text))
    }

    pub fn expansion(text: impl Into<String>) -> Self {
        Piece::Seg(Segment::expansion(text))
    }
}

/// Split pieces on hard breaks and form fields per group.
pub fn assemble_fields(pieces: &[Piece], ifs: &str) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut group: Vec<Segment> = Vec::new();
    for piece in pieces {
        match piece {
            Piece::Seg(segment) => group.push(segment.clone()),
            Piece::Break => {
                fields.extend(split_fields(&group, ifs));
                group.clear();
            }
        }
    }
    fields.extend(split_fields(&group, ifs));
    fields
}

impl<'a> Interp<'a> {
    /// Full pipeline for command words: every word may produce zero or
    /// more fields.
    pub fn expand_words(
        &self,
        state: &mut ShellState,
        words: &[Word],
    ) -> Result<Vec<String>, Interrupt> {
        let mut out = Vec::new();
        for word in words {
            for braced in expand_braces(word, self.limits)? {
                let pieces = self.expand_parts(state, &braced.parts)?;
                let ifs = state.ifs();
                for field in assemble_fields(&pieces, &ifs) {
                    self.glob_into(state, field, &mut out)?;
                }
            }
        }
        Ok(out)
    }

    fn glob_into(
        &self,
        state: &mut ShellState,
        field: Field,
        out: &mut Vec<String>,
    ) -> Result<(), Interrupt> {
        if state.options.noglob || !has_glob_chars(&field.pattern, state.shopts.extglob) {
            out.push(field.value);
            return Ok(());
        }
        let matches = self.glob_pattern(state, &field.pattern);
        if matches.is_empty() {
            if state.shopts.failglob {
                return Err(Interrupt::Glob(GlobFailure::new(field.value)));
            }
            if !state.shopts.nullglob {
                out.push(field.value);
            }
            return Ok(());
        }
        out.extend(matches);
        Ok(())
    }

    /// Expansion without field splitting or globbing: assignments,
    /// redirect targets, heredoc bodies, `[[ ]]` operands, case
    /// subjects. Multi-value expansions join on a space.
    pub fn expand_word_single(
        &self,
        state: &mut ShellState,
        word: &Word,
    ) -> Result<String, Interrupt> {
        let pieces = self.expand_parts(state, &word.parts)?;
        let mut text = String::new();
        let mut first = true;
        for piece in &pieces {
            match piece {
                Piece::Seg(segment) => {
                    text.push_str(&segment.value);
                    first = false;
                }
                Piece::Break => {
                    if !first {
                        text.push(' ');
                    }
                }
            }
        }
        Ok(text)
    }

    /// Pattern-context expansion: quoted parts are escaped, glob parts
    /// stay live. Used for case patterns, `[[ == ]]` and `${v#…}`.
    pub fn expand_word_pattern(
        &self,
        state: &mut ShellState,
        word: &Word,
    ) -> Result<String, Interrupt> {
        let pieces = self.expand_parts(state, &word.parts)?;
        let mut text = String::new();
        for piece in &pieces {
            match piece {
                Piece::Seg(segment) => text.push_str(&segment.pattern),
                Piece::Break => text.push(' '),
            }
        }
        Ok(text)
    }

    /// Regex-context expansion for `=~`: quoted text is regex-escaped,
    /// unquoted text and expansion results pass through as regex source.
    pub fn expand_word_regex(
        &self,
        state: &mut ShellState,
        word: &Word,
    ) -> Result<String, Interrupt> {
        let mut out = String::new();
        for part in &word.parts {
            match part {
                WordPart::Literal(s) => out.push_str(s),
                WordPart::Escaped(s) => out.push_str(s),
                WordPart::SingleQuoted(s) => out.push_str(&regex_escape(s)),
                WordPart::DoubleQuoted(inner) => {
                    let mut pieces = Vec::new();
                    self.expand_quoted_parts(state, inner, &mut pieces)?;
                    for piece in pieces {
                        if let Piece::Seg(segment) = piece {
                            out.push_str(&regex_escape(&segment.value));
                        }
                    }
                }
                other => {
                    let mut pieces = Vec::new();
                    self.expand_part(state, other, &mut pieces)?;
                    for piece in pieces {
                        if let Piece::Seg(segment) = piece {
                            out.push_str(&segment.value);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Heredoc bodies: parameter/command/arithmetic expansion only.
    pub fn expand_heredoc_body(
        &self,
        state: &mut ShellState,
        body: &Word,
    ) -> Result<String, Interrupt> {
        self.expand_word_single(state, body)
    }

    // =========================================================================
    // Part-level expansion
    // =========================================================================

    pub fn expand_parts(
        &self,
        state: &mut ShellState,
        parts: &[WordPart],
    ) -> Result<Vec<Piece>, Interrupt> {
        let mut pieces = Vec::new();
        for part in parts {
            self.expand_part(state, part, &mut pieces)?;
        }
        Ok(pieces)
    }

    fn expand_part(
        &self,
        state: &mut ShellState,
        part: &WordPart,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), Interrupt> {
        match part {
            WordPart::Literal(s) => pieces.push(Piece::Seg(Segment::literal(s.clone()))),
            WordPart::Escaped(s) => pieces.push(Piece::quoted(s.clone())),
            WordPart::SingleQuoted(s) => pieces.push(Piece::quoted(s.clone())),
            WordPart::DoubleQuoted(inner) => self.expand_quoted_parts(state, inner, pieces)?,
            WordPart::Parameter(pe) => self.expand_parameter(state, pe, false, pieces)?,
            WordPart::CommandSub { body, .. } => {
                let output = self.run_command_substitution(state, body)?;
                pieces.push(Piece::expansion(output));
            }
            WordPart::ArithSub(expr) => {
                self.limits.check_arith_length(&expr.source)?;
                let value = self.eval_arith(state, &expr.expr)?;
                pieces.push(Piece::expansion(value.to_string()));
            }
            WordPart::ProcessSub { direction, body } => {
                let path = self.setup_process_sub(state, *direction, body)?;
                pieces.push(Piece::Seg(Segment {
                    pattern: escape_pattern(&path),
                    value: path,
                    quoted: false,
                    splittable: false,
                }));
            }
            WordPart::Glob(pattern) => pieces.push(Piece::Seg(Segment::glob(pattern.clone()))),
            WordPart::Tilde(user) => {
                let home = expand_tilde(state, user.as_deref());
                pieces.push(Piece::Seg(Segment {
                    pattern: escape_pattern(&home),
                    value: home,
                    quoted: false,
                    splittable: false,
                }));
            }
            WordPart::Brace(items) => {
                // Reached only in single-expansion contexts where brace
                // expansion does not apply: reproduce the source text.
                pieces.push(Piece::Seg(Segment::literal(brace_source(items))));
            }
        }
        Ok(())
    }

    /// Inside double quotes: expansions join the quoted run; `$@` and
    /// `arr[@]` produce one field per element.
    pub fn expand_quoted_parts(
        &self,
        state: &mut ShellState,
        parts: &[WordPart],
        pieces: &mut Vec<Piece>,
    ) -> Result<(), Interrupt> {
        for part in parts {
            match part {
                WordPart::Literal(s) | WordPart::Escaped(s) | WordPart::SingleQuoted(s) => {
                    pieces.push(Piece::quoted(s.clone()));
                }
                WordPart::Parameter(pe) => self.expand_parameter(state, pe, true, pieces)?,
                WordPart::CommandSub { body, .. } => {
                    let output = self.run_command_substitution(state, body)?;
                    pieces.push(Piece::quoted(output));
                }
                WordPart::ArithSub(expr) => {
                    self.limits.check_arith_length(&expr.source)?;
                    let value = self.eval_arith(state, &expr.expr)?;
                    pieces.push(Piece::quoted(value.to_string()));
                }
                WordPart::DoubleQuoted(inner) => {
                    self.expand_quoted_parts(state, inner, pieces)?;
                }
                other => {
                    // Remaining parts have no special meaning in quotes.
                    let mut nested = Vec::new();
                    self.expand_part(state, other, &mut nested)?;
                    for piece in nested {
                        match piece {
                            Piece::Seg(segment) => pieces.push(Piece::quoted(segment.value)),
                            Piece::Break => pieces.push(Piece::Break),
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Substitution execution
    // =========================================================================

    /// `$(…)`: run in a subshell clone, capture stdout, strip trailing
    /// newlines; stderr accumulates on the shell for the enclosing
    /// command to report.
    pub fn run_command_substitution(
        &self,
        state: &mut ShellState,
        body: &Script,
    ) -> Result<String, Interrupt> {
        let result = self.run_subshell(state, body)?;
        state.expansion_stderr.push_str(&result.stderr);
        state.expansion_exit_code = Some(result.exit_code);
        let mut output = result.stdout;
        while output.ends_with('\n') {
            output.pop();
        }
        Ok(output)
    }

    pub fn run_command_sub_text(
        &self,
        state: &mut ShellState,
        text: &str,
    ) -> Result<String, Interrupt> {
        match crate::parser::parse_nested(text) {
            Ok(script) => self.run_command_substitution(state, &script),
            Err(e) => {
                state.expansion_stderr.push_str(&format!("sandbash: syntax error: {}\n", e));
                state.expansion_exit_code = Some(2);
                Ok(String::new())
            }
        }
    }

    /// `${…}` text from arithmetic context.
    pub fn expand_braced_text(
        &self,
        state: &mut ShellState,
        text: &str,
    ) -> Result<String, Interrupt> {
        let pe = crate::parser::expansion::parse_braced_expansion(text).map_err(|e| {
            Interrupt::Expansion(crate::interp::error::ExpansionFailure::new(e.to_string()))
        })?;
        let mut pieces = Vec::new();
        self.expand_parameter(state, &pe, false, &mut pieces)?;
        let mut out = String::new();
        for piece in pieces {
            match piece {
                Piece::Seg(segment) => out.push_str(&segment.value),
                Piece::Break => out.push(' '),
            }
        }
        Ok(out)
    }

    /// `<(…)` materializes output now; `>(…)` queues the body to run
    /// after the consuming command, fed whatever was written.
    fn setup_process_sub(
        &self,
        state: &mut ShellState,
        direction: ProcessSubDirection,
        body: &Script,
    ) -> Result<String, Interrupt> {
        let n = state.next_procsub;
        state.next_procsub += 1;
        let path = format!("/dev/fd/{}", n);

        match direction {
            ProcessSubDirection::Read => {
                let result = self.run_subshell(state, body)?;
                state.expansion_stderr.push_str(&result.stderr);
                if self.fs.write_file(&path, &result.stdout, false).is_err() {
                    return Err(Interrupt::Expansion(
                        crate::interp::error::ExpansionFailure::new(format!(
                            "{}: cannot create process substitution file",
                            path
                        )),
                    ));
                }
            }
            ProcessSubDirection::Write => {
                let _ = self.fs.write_file(&path, "", false);
                state.pending_procsubs.push((path.clone(), body.clone()));
            }
        }
        Ok(path)
    }

    /// Run queued `>(…)` bodies against what the command wrote.
    pub fn run_pending_procsubs(&self, state: &mut ShellState) -> Result<(), Interrupt> {
        let pending = std::mem::take(&mut state.pending_procsubs);
        for (path, script) in pending {
            let content = self.fs.read_file(&path).unwrap_or_default();
            let mut sub = state.subshell();
            sub.current_stdin = Some(content);
            let result = match self.execute_script(&mut sub, &script) {
                Ok(result) => result,
                Err(mut interrupt) => {
                    let carried = interrupt.carried();
                    ExecResult::new(
                        carried.stdout().to_string(),
                        carried.stderr().to_string(),
                        interrupt.exit_code(),
                    )
                }
            };
            // The consumer's output surfaces through the shell's
            // diagnostic channel in this single-threaded model.
            state.expansion_stderr.push_str(&result.stdout);
            state.expansion_stderr.push_str(&result.stderr);
        }
        Ok(())
    }
}

fn regex_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ".^$*+?()[]{}|\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reconstruct brace-expansion source for contexts that keep it literal.
fn brace_source(items: &[BraceItem]) -> String {
    let mut out = String::from("{");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            BraceItem::Word(word) => {
                for part in &word.parts {
                    match part {
                        WordPart::Literal(s) => out.push_str(s),
                        WordPart::SingleQuoted(s) => {
                            out.push('\'');
                            out.push_str(s);
                            out.push('\'');
                        }
                        _ => {}
                    }
                }
            }
            BraceItem::NumberRange { start, end, step, .. } => {
                out.push_str(&start.to_string());
                out.push_str("..");
                out.push_str(&end.to_string());
                if let Some(s) = step {
                    out.push_str("..");
                    out.push_str(&s.to_string());
                }
            }
            BraceItem::CharRange { start, end, step } => {
                out.push(*start);
                out.push_str("..");
                out.push(*end);
                if let Some(s) = step {
                    out.push_str("..");
                    out.push_str(&s.to_string());
                }
            }
        }
    }
    out.push('}');
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn basic_splitting() {
        let out = run("x='a b  c'; for w in $x; do echo [$w]; done");
        assert_eq!(out.stdout, "[a]\n[b]\n[c]\n");
    }

    #[test]
    fn quoted_expansion_stays_whole() {
        let out = run("x='a b'; for w in \"$x\"; do echo [$w]; done");
        assert_eq!(out.stdout, "[a b]\n");
    }

    #[test]
    fn ifs_colon_scenario() {
        let out = run("IFS=: ; a=x:y::z ; for w in $a; do echo \"[$w]\"; done");
        assert_eq!(out.stdout, "[x]\n[y]\n[]\n[z]\n");
    }

    #[test]
    fn empty_unquoted_vanishes() {
        let out = run("e=''; set -- pre $e post; echo $#");
        assert_eq!(out.stdout, "2\n");
    }

    #[test]
    fn quoted_empty_survives() {
        let out = run("e=''; set -- pre \"$e\" post; echo $#");
        assert_eq!(out.stdout, "3\n");
    }

    #[test]
    fn command_substitution_strips_trailing_newlines() {
        assert_eq!(run("echo [$(echo hi)]").stdout, "[hi]\n");
        assert_eq!(run("x=$(printf 'a\\n\\n\\n'); echo [$x]").stdout, "[a]\n");
    }

    #[test]
    fn command_substitution_splits_unquoted() {
        let out = run("set -- $(echo one two); echo $#");
        assert_eq!(out.stdout, "2\n");
        let out = run("set -- \"$(echo one two)\"; echo $#");
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn command_substitution_stderr_passes_through() {
        let out = run("x=$(missing_cmd_xyz); echo code=$?");
        assert!(out.stderr.contains("command not found"));
        assert!(out.stdout.contains("code=127"));
    }

    #[test]
    fn nested_command_substitution() {
        assert_eq!(run("echo $(echo $(echo deep))").stdout, "deep\n");
    }

    #[test]
    fn backquote_substitution() {
        assert_eq!(run("echo `echo legacy`").stdout, "legacy\n");
    }

    #[test]
    fn tilde_expansion_forms() {
        let out = run("HOME=/home/me; echo ~ ~/sub");
        assert_eq!(out.stdout, "/home/me /home/me/sub\n");
    }

    #[test]
    fn tilde_in_assignment_after_colon() {
        let out = run("HOME=/h; p=/bin:~/bin; echo $p");
        assert_eq!(out.stdout, "/bin:/h/bin\n");
    }

    #[test]
    fn quoted_tilde_is_literal() {
        assert_eq!(run("echo '~'").stdout, "~\n");
        assert_eq!(run("echo \"~\"").stdout, "~\n");
    }

    #[test]
    fn brace_expansion_in_command_words() {
        assert_eq!(run("echo {a,b}{1,2}").stdout, "a1 a2 b1 b2\n");
        assert_eq!(run("echo file{1..3}.txt").stdout, "file1.txt file2.txt file3.txt\n");
    }

    #[test]
    fn brace_not_in_assignment() {
        assert_eq!(run("x={a,b}; echo $x").stdout, "{a,b}\n");
    }

    #[test]
    fn arith_expansion_in_words() {
        assert_eq!(run("echo pre$((1+2))post").stdout, "pre3post\n");
    }

    #[test]
    fn mixed_quote_concatenation() {
        let out = run("a='1 2'; b='3 4'; set -- $a\"$b\"; echo $#; echo \"$2\"");
        assert_eq!(out.stdout, "2\n23 4\n");
    }

    #[test]
    fn escaped_glob_chars_stay_literal() {
        assert_eq!(run("echo \\*").stdout, "*\n");
        assert_eq!(run("echo '*'").stdout, "*\n");
    }

    #[test]
    fn unmatched_glob_stays_as_typed() {
        assert_eq!(run("echo *.nomatch").stdout, "*.nomatch\n");
    }

    #[test]
    fn nullglob_drops_unmatched() {
        assert_eq!(run("shopt -s nullglob; echo start *.nomatch end").stdout, "start end\n");
    }

    #[test]
    fn failglob_errors() {
        let out = run("shopt -s failglob; echo *.nomatch; echo after");
        assert!(out.stderr.contains("no match"));
    }

    #[test]
    fn glob_matches_files() {
        use crate::interp::testkit::run_in;
        let (out, _) = run_in("echo x >/b.txt; echo x >/a.txt; echo x >/c.md; cd /; echo *.txt");
        assert_eq!(out.stdout, "a.txt b.txt\n");
    }

    #[test]
    fn glob_from_variable_expansion() {
        use crate::interp::testkit::run_in;
        let (out, _) = run_in("echo x >/v1.txt; cd /; p='*.txt'; echo $p; echo \"$p\"");
        assert_eq!(out.stdout, "v1.txt\n*.txt\n");
    }

    #[test]
    fn process_substitution_read() {
        let out = run("cat <(echo inner)");
        assert_eq!(out.stdout, "inner\n");
    }

    #[test]
    fn heredoc_body_expansion() {
        let out = run("n=3; cat <<EOF\nvalue: $((n * 2))\nEOF");
        assert_eq!(out.stdout, "value: 6\n");
    }
}

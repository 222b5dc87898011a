//! Parameter expansion semantics for scalars.
//!
//! `$name`, `${name}` and every `${name<op>}` form. `@`/`*`-shaped
//! expansions (positional parameters, whole arrays, key listings) are
//! routed to the multi-value path in `positional`.

use crate::ast::types::{
    ParamOp, ParameterExpansion, PatternAnchor, PatternSide, TransformKind, Word, WordPart,
};
use crate::expand::pattern::{matches_pattern, pattern_to_regex, PatternOptions};
use crate::expand::quote;
use crate::expand::split::Segment;
use crate::expand::word::Piece;
use crate::interp::engine::Interp;
use crate::interp::error::{ExpansionFailure, Interrupt, UnboundVariable};
use crate::interp::state::{ShellState, Value};

/// Ops that are safe to apply to an unset variable under `set -u`.
fn nounset_safe(op: &Option<ParamOp>) -> bool {
    matches!(
        op,
        Some(ParamOp::Default { .. })
            | Some(ParamOp::AssignDefault { .. })
            | Some(ParamOp::ErrorIfUnset { .. })
            | Some(ParamOp::Alternative { .. })
    )
}

fn push_scalar(pieces: &mut Vec<Piece>, text: String, quoted: bool) {
    if quoted {
        pieces.push(Piece::quoted(text));
    } else {
        pieces.push(Piece::expansion(text));
    }
}

impl<'a> Interp<'a> {
    pub fn expand_parameter(
        &self,
        state: &mut ShellState,
        pe: &ParameterExpansion,
        quoted: bool,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), Interrupt> {
        // Multi-value shapes take the dedicated path.
        if self.is_multi_parameter(pe) {
            return self.expand_multi_parameter(state, pe, quoted, pieces);
        }

        let value = self.read_param(state, &pe.name)?;

        if value.is_none()
            && state.options.nounset
            && !nounset_safe(&pe.op)
            && !matches!(pe.op, Some(ParamOp::BadSubstitution { .. }))
        {
            return Err(Interrupt::Unbound(UnboundVariable::new(pe.name.clone())));
        }

        let op = match &pe.op {
            None => {
                push_scalar(pieces, value.unwrap_or_default(), quoted);
                return Ok(());
            }
            Some(op) => op,
        };

        match op {
            ParamOp::Default { word, check_empty } => {
                let empty = value.as_deref().map(|v| v.is_empty()).unwrap_or(true);
                if value.is_none() || (*check_empty && empty) {
                    self.expand_operation_word(state, word, quoted, pieces)?;
                } else {
                    push_scalar(pieces, value.unwrap_or_default(), quoted);
                }
            }

            ParamOp::AssignDefault { word, check_empty } => {
                let empty = value.as_deref().map(|v| v.is_empty()).unwrap_or(true);
                if value.is_none() || (*check_empty && empty) {
                    let text = self.expand_word_single(state, word)?;
                    self.assign_parameter(state, &pe.name, text.clone())?;
                    push_scalar(pieces, text, quoted);
                } else {
                    push_scalar(pieces, value.unwrap_or_default(), quoted);
                }
            }

            ParamOp::ErrorIfUnset { word, check_empty } => {
                let empty = value.as_deref().map(|v| v.is_empty()).unwrap_or(true);
                if value.is_none() || (*check_empty && empty) {
                    let message = match word {
                        Some(word) => self.expand_word_single(state, word)?,
                        None => {
                            if *check_empty {
                                "parameter null or not set".to_string()
                            } else {
                                "parameter not set".to_string()
                            }
                        }
                    };
                    return Err(Interrupt::Expansion(ExpansionFailure::fatal(format!(
                        "{}: {}",
                        pe.name, message
                    ))));
                }
                push_scalar(pieces, value.unwrap_or_default(), quoted);
            }

            ParamOp::Alternative { word, check_empty } => {
                let empty = value.as_deref().map(|v| v.is_empty()).unwrap_or(true);
                let is_set = value.is_some() && !(*check_empty && empty);
                if is_set {
                    self.expand_operation_word(state, word, quoted, pieces)?;
                }
            }

            ParamOp::Length => {
                let count = value.unwrap_or_default().chars().count();
                push_scalar(pieces, count.to_string(), quoted);
            }

            ParamOp::Substring { offset, length } => {
                let value = value.unwrap_or_default();
                let text = self.substring(state, &value, offset, length.as_ref())?;
                push_scalar(pieces, text, quoted);
            }

            ParamOp::RemovePattern { pattern, side, greedy } => {
                let value = value.unwrap_or_default();
                let text = self.apply_remove(state, &value, pattern, *side, *greedy)?;
                push_scalar(pieces, text, quoted);
            }

            ParamOp::ReplacePattern { pattern, replacement, all, anchor } => {
                let value = value.unwrap_or_default();
                let text =
                    self.apply_replace(state, &value, pattern, replacement.as_ref(), *all, *anchor)?;
                push_scalar(pieces, text, quoted);
            }

            ParamOp::CaseConvert { upper, all, pattern } => {
                let value = value.unwrap_or_default();
                let text = self.apply_case(state, &value, *upper, *all, pattern.as_ref())?;
                push_scalar(pieces, text, quoted);
            }

            ParamOp::Transform(kind) => {
                let text = self.apply_transform(state, &pe.name, value, *kind)?;
                push_scalar(pieces, text, quoted);
            }

            ParamOp::Indirect { op } => {
                let target = value.unwrap_or_default();
                if target.is_empty() {
                    if state.options.nounset {
                        return Err(Interrupt::Unbound(UnboundVariable::new(pe.name.clone())));
                    }
                    push_scalar(pieces, String::new(), quoted);
                    return Ok(());
                }
                if !is_valid_reference(&target) {
                    return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                        "{}: bad substitution",
                        target
                    ))));
                }
                let inner = ParameterExpansion {
                    name: target,
                    op: op.as_ref().map(|boxed| (**boxed).clone()),
                };
                return self.expand_parameter(state, &inner, quoted, pieces);
            }

            ParamOp::LengthSliceError => {
                return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                    "${{#{}}}: bad substitution",
                    pe.name
                ))));
            }

            ParamOp::BadSubstitution { text } => {
                return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                    "${{{}}}: bad substitution",
                    text
                ))));
            }

            // Multi-only ops were routed earlier.
            ParamOp::ArrayKeys { .. } | ParamOp::NamePrefix { .. } => {
                return self.expand_multi_parameter(state, pe, quoted, pieces);
            }
        }
        Ok(())
    }

    /// Default/alternative words: in an unquoted context the word's
    /// literal text is itself splittable; a fully quoted word is not.
    fn expand_operation_word(
        &self,
        state: &mut ShellState,
        word: &Word,
        quoted: bool,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), Interrupt> {
        if quoted {
            self.expand_quoted_parts(state, &word.parts, pieces)?;
            return Ok(());
        }
        for part in &word.parts {
            match part {
                WordPart::Literal(s) => {
                    pieces.push(Piece::Seg(Segment::expansion(s.clone())));
                }
                other => {
                    let mut nested = Vec::new();
                    // Reuse the standard part expansion for the rest.
                    let single = std::slice::from_ref(other);
                    nested.extend(self.expand_parts(state, single)?);
                    pieces.extend(nested);
                }
            }
        }
        Ok(())
    }

    /// Read a scalar parameter: specials, positionals, subscripted
    /// array elements, ordinary variables.
    pub fn read_param(&self, state: &mut ShellState, name: &str) -> Result<Option<String>, Interrupt> {
        if let Some((base, subscript)) = split_subscript(name) {
            return self.read_element_text(state, base, subscript);
        }

        Ok(match name {
            "#" => Some(state.positional.len().to_string()),
            "?" => Some(state.last_exit_code.to_string()),
            "$" => Some(state.shell_pid.to_string()),
            "!" => {
                if state.last_bg_pid == 0 {
                    None
                } else {
                    Some(state.last_bg_pid.to_string())
                }
            }
            "0" => Some(state.script_name.clone()),
            "-" => Some(state.option_flags()),
            "_" => Some(state.last_arg.clone()),
            "LINENO" => Some(state.current_line.to_string()),
            "BASHPID" => Some(state.bash_pid.to_string()),
            "FUNCNAME" => state.scopes.last().map(|s| s.function_name.clone()),
            "SHELLOPTS" => Some(shellopts_string(state)),
            "BASHOPTS" => Some(bashopts_string(state)),
            digits if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                let n: usize = digits.parse().unwrap_or(0);
                if n == 0 {
                    Some(state.script_name.clone())
                } else {
                    state.positional.get(n - 1).cloned()
                }
            }
            _ => state.get_var(name).map(|v| v.value.as_scalar()),
        })
    }

    fn read_element_text(
        &self,
        state: &mut ShellState,
        base: &str,
        subscript: &str,
    ) -> Result<Option<String>, Interrupt> {
        match state.get_var(base).map(|v| v.value.clone()) {
            Some(Value::Associative(map)) => {
                let key = self.expand_subscript_key(state, subscript)?;
                Ok(map.get(&key).cloned())
            }
            Some(Value::Indexed(map)) => {
                let idx = self.eval_index(state, subscript)?;
                let idx = if idx < 0 {
                    map.keys().next_back().map(|&k| k + 1).unwrap_or(0) + idx
                } else {
                    idx
                };
                Ok(map.get(&idx).cloned())
            }
            Some(Value::Scalar(s)) => {
                let idx = self.eval_index(state, subscript)?;
                Ok(if idx == 0 { Some(s) } else { None })
            }
            None => Ok(None),
        }
    }

    /// `${v:=default}` writes through to the variable or element.
    fn assign_parameter(
        &self,
        state: &mut ShellState,
        name: &str,
        value: String,
    ) -> Result<(), Interrupt> {
        if let Some((base, subscript)) = split_subscript(name) {
            match self.assign_element(state, base, subscript, value, false)? {
                crate::interp::assign::AssignOutcome::Done => return Ok(()),
                crate::interp::assign::AssignOutcome::Failed(m) => {
                    return Err(Interrupt::Expansion(ExpansionFailure::new(m)))
                }
            }
        }
        if !crate::parser::lexer::is_valid_name(name) {
            return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                "{}: cannot assign in this way",
                name
            ))));
        }
        state
            .set_scalar(name, value)
            .map_err(|m| Interrupt::Expansion(ExpansionFailure::new(m)))
    }

    // =========================================================================
    // Shared operation helpers (also used by the multi-value path)
    // =========================================================================

    pub fn substring(
        &self,
        state: &mut ShellState,
        value: &str,
        offset: &crate::ast::types::ArithmeticExpression,
        length: Option<&crate::ast::types::ArithmeticExpression>,
    ) -> Result<String, Interrupt> {
        let chars: Vec<char> = value.chars().collect();
        let len = chars.len() as i64;

        let mut start = self.eval_arith(state, &offset.expr)?;
        if start < 0 {
            start += len;
        }
        if start < 0 || start > len {
            return Ok(String::new());
        }

        let end = match length {
            None => len,
            Some(expr) => {
                let l = self.eval_arith(state, &expr.expr)?;
                if l < 0 {
                    let end = len + l;
                    if end < start {
                        return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                            "{}: substring expression < 0",
                            l
                        ))));
                    }
                    end
                } else {
                    (start + l).min(len)
                }
            }
        };

        Ok(chars[start as usize..end.max(start) as usize].iter().collect())
    }

    pub fn apply_remove(
        &self,
        state: &mut ShellState,
        value: &str,
        pattern: &Word,
        side: PatternSide,
        greedy: bool,
    ) -> Result<String, Interrupt> {
        let pattern_text = self.expand_word_pattern(state, pattern)?;
        let opts = PatternOptions { extglob: state.shopts.extglob, ..Default::default() };
        let chars: Vec<char> = value.chars().collect();

        // Candidate split points, scanned for the shortest or longest
        // matching prefix/suffix.
        let boundaries: Vec<usize> = (0..=chars.len()).collect();
        match side {
            PatternSide::Prefix => {
                let hits = boundaries.iter().filter(|&&j| {
                    let head: String = chars[..j].iter().collect();
                    matches_pattern(&head, &pattern_text, &opts)
                });
                let cut = if greedy { hits.last() } else { hits.take(1).last() };
                Ok(match cut {
                    Some(&j) => chars[j..].iter().collect(),
                    None => value.to_string(),
                })
            }
            PatternSide::Suffix => {
                let hits: Vec<usize> = boundaries
                    .iter()
                    .copied()
                    .filter(|&i| {
                        let tail: String = chars[i..].iter().collect();
                        matches_pattern(&tail, &pattern_text, &opts)
                    })
                    .collect();
                let cut = if greedy { hits.first() } else { hits.last() };
                Ok(match cut {
                    Some(&i) => chars[..i].iter().collect(),
                    None => value.to_string(),
                })
            }
        }
    }

    pub fn apply_replace(
        &self,
        state: &mut ShellState,
        value: &str,
        pattern: &Word,
        replacement: Option<&Word>,
        all: bool,
        anchor: PatternAnchor,
    ) -> Result<String, Interrupt> {
        let pattern_text = self.expand_word_pattern(state, pattern)?;
        if pattern_text.is_empty() {
            return Ok(value.to_string());
        }
        let replacement = match replacement {
            Some(word) => self.expand_word_single(state, word)?,
            None => String::new(),
        };
        let opts = PatternOptions { extglob: state.shopts.extglob, ..Default::default() };

        match anchor {
            PatternAnchor::Start => {
                let chars: Vec<char> = value.chars().collect();
                let hit = (0..=chars.len()).rev().find(|&j| {
                    let head: String = chars[..j].iter().collect();
                    matches_pattern(&head, &pattern_text, &opts)
                });
                Ok(match hit {
                    Some(j) if j > 0 || matches_pattern("", &pattern_text, &opts) => {
                        let tail: String = chars[j..].iter().collect();
                        format!("{}{}", replacement, tail)
                    }
                    _ => value.to_string(),
                })
            }
            PatternAnchor::End => {
                let chars: Vec<char> = value.chars().collect();
                let hit = (0..=chars.len()).find(|&i| {
                    let tail: String = chars[i..].iter().collect();
                    matches_pattern(&tail, &pattern_text, &opts)
                });
                Ok(match hit {
                    Some(i) => {
                        let head: String = chars[..i].iter().collect();
                        format!("{}{}", head, replacement)
                    }
                    None => value.to_string(),
                })
            }
            PatternAnchor::None => {
                let source = match pattern_to_regex(&pattern_text, &opts) {
                    Some(source) => source,
                    None => return Ok(value.to_string()),
                };
                let regex = match regex_lite::Regex::new(&format!("(?s){}", source)) {
                    Ok(regex) => regex,
                    Err(_) => return Ok(value.to_string()),
                };
                let replaced = if all {
                    regex.replace_all(value, |_: &regex_lite::Captures<'_>| replacement.clone())
                } else {
                    regex.replace(value, |_: &regex_lite::Captures<'_>| replacement.clone())
                };
                Ok(replaced.into_owned())
            }
        }
    }

    pub fn apply_case(
        &self,
        state: &mut ShellState,
        value: &str,
        upper: bool,
        all: bool,
        pattern: Option<&Word>,
    ) -> Result<String, Interrupt> {
        let pattern_text = match pattern {
            Some(word) => Some(self.expand_word_pattern(state, word)?),
            None => None,
        };
        let opts = PatternOptions { extglob: state.shopts.extglob, ..Default::default() };
        let char_matches = |c: char| match &pattern_text {
            None => true,
            Some(p) => matches_pattern(&c.to_string(), p, &opts),
        };
        let convert = |c: char| -> String {
            if upper {
                c.to_uppercase().collect()
            } else {
                c.to_lowercase().collect()
            }
        };

        let mut out = String::new();
        for (i, c) in value.chars().enumerate() {
            let eligible = (all || i == 0) && char_matches(c);
            if eligible {
                out.push_str(&convert(c));
            } else {
                out.push(c);
            }
        }
        Ok(out)
    }

    pub fn apply_transform(
        &self,
        state: &mut ShellState,
        name: &str,
        value: Option<String>,
        kind: TransformKind,
    ) -> Result<String, Interrupt> {
        if value.is_none() && !matches!(kind, TransformKind::Attributes | TransformKind::Declare) {
            return Ok(String::new());
        }
        let text = value.unwrap_or_default();
        Ok(match kind {
            TransformKind::Quote => quote::shell_quote(&text),
            TransformKind::Escape => quote::expand_escapes(&text),
            TransformKind::Prompt => quote::prompt_expand(&text, &state.cwd, "user"),
            TransformKind::Attributes => match state.get_var(name) {
                Some(var) => quote::attribute_letters(&var.value, &var.flags),
                None => String::new(),
            },
            TransformKind::Declare => match state.get_var(name) {
                Some(var) => {
                    let var = var.clone();
                    quote::declare_form(name, &var.value, &var.flags)
                }
                None => String::new(),
            },
            TransformKind::Keyed | TransformKind::KeyValue => quote::shell_quote(&text),
            TransformKind::UpperFirst => quote::upper_first(&text),
            TransformKind::Upper => text.to_uppercase(),
            TransformKind::Lower => text.to_lowercase(),
        })
    }
}

/// `SHELLOPTS` — enabled `set -o` names, colon-joined.
fn shellopts_string(state: &ShellState) -> String {
    let opts = &state.options;
    let table = [
        ("allexport", opts.allexport),
        ("errexit", opts.errexit),
        ("monitor", opts.monitor),
        ("noclobber", opts.noclobber),
        ("noexec", opts.noexec),
        ("noglob", opts.noglob),
        ("nounset", opts.nounset),
        ("pipefail", opts.pipefail),
        ("posix", opts.posix),
        ("verbose", opts.verbose),
        ("xtrace", opts.xtrace),
    ];
    table.iter().filter(|(_, on)| *on).map(|(name, _)| *name).collect::<Vec<_>>().join(":")
}

/// `BASHOPTS` — enabled shopt names, colon-joined.
fn bashopts_string(state: &ShellState) -> String {
    let shopts = &state.shopts;
    let table = [
        ("dotglob", shopts.dotglob),
        ("extglob", shopts.extglob),
        ("failglob", shopts.failglob),
        ("globskipdots", shopts.globskipdots),
        ("globstar", shopts.globstar),
        ("lastpipe", shopts.lastpipe),
        ("nocaseglob", shopts.nocaseglob),
        ("nocasematch", shopts.nocasematch),
        ("nullglob", shopts.nullglob),
    ];
    table.iter().filter(|(_, on)| *on).map(|(name, _)| *name).collect::<Vec<_>>().join(":")
}

pub fn split_subscript(name: &str) -> Option<(&str, &str)> {
    let open = name.find('[')?;
    if !name.ends_with(']') {
        return None;
    }
    Some((&name[..open], &name[open + 1..name.len() - 1]))
}

fn is_valid_reference(target: &str) -> bool {
    if target == "@" || target == "*" {
        return true;
    }
    if target.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    match split_subscript(target) {
        Some((base, _)) => crate::parser::lexer::is_valid_name(base),
        None => crate::parser::lexer::is_valid_name(target),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn plain_and_braced() {
        assert_eq!(run("x=v; echo $x ${x}").stdout, "v v\n");
        assert_eq!(run("echo [$unset_thing]").stdout, "[]\n");
    }

    #[test]
    fn default_values() {
        assert_eq!(run("echo ${missing-fallback}").stdout, "fallback\n");
        assert_eq!(run("x=; echo [${x-fb}] [${x:-fb}]").stdout, "[] [fb]\n");
        assert_eq!(run("x=set; echo ${x:-fb}").stdout, "set\n");
    }

    #[test]
    fn assign_default() {
        assert_eq!(run("echo ${v:=assigned}; echo $v").stdout, "assigned\nassigned\n");
        assert_eq!(run("v=kept; : ${v:=other}; echo $v").stdout, "kept\n");
    }

    #[test]
    fn error_if_unset() {
        let out = run("echo ${nope:?custom message}; echo unreached");
        assert!(out.stderr.contains("nope: custom message"));
        assert!(!out.stdout.contains("unreached"));
        assert_eq!(out.exit_code, 1);
    }

    #[test]
    fn alternative_value() {
        assert_eq!(run("x=1; echo [${x:+alt}]").stdout, "[alt]\n");
        assert_eq!(run("echo [${missing:+alt}]").stdout, "[]\n");
        assert_eq!(run("x=; echo [${x+set}] [${x:+nonempty}]").stdout, "[set] []\n");
    }

    #[test]
    fn length() {
        assert_eq!(run("v=HelloWorld; echo ${#v}").stdout, "10\n");
        assert_eq!(run("echo ${#missing}").stdout, "0\n");
        // Code points, not bytes.
        assert_eq!(run("v=héllo; echo ${#v}").stdout, "5\n");
    }

    #[test]
    fn substring() {
        assert_eq!(run("v=abcdef; echo ${v:2}").stdout, "cdef\n");
        assert_eq!(run("v=abcdef; echo ${v:1:3}").stdout, "bcd\n");
        assert_eq!(run("v=abcdef; echo ${v: -2}").stdout, "ef\n");
        assert_eq!(run("v=abcdef; echo ${v:1:-2}").stdout, "bcd\n");
        assert_eq!(run("v=abc; echo [${v:10}]").stdout, "[]\n");
    }

    #[test]
    fn pattern_removal() {
        assert_eq!(run("v=aabbcc; echo ${v#a}").stdout, "abbcc\n");
        assert_eq!(run("v=aabbcc; echo ${v##a*b}").stdout, "cc\n");
        assert_eq!(run("v=aabbcc; echo ${v#a*b}").stdout, "bcc\n");
        assert_eq!(run("v=file.tar.gz; echo ${v%.*}").stdout, "file.tar\n");
        assert_eq!(run("v=file.tar.gz; echo ${v%%.*}").stdout, "file\n");
        assert_eq!(run("v=hello; echo ${v#x}").stdout, "hello\n");
    }

    #[test]
    fn pattern_replacement() {
        assert_eq!(run("v=banana; echo ${v/an/AN}").stdout, "bANana\n");
        assert_eq!(run("v=banana; echo ${v//an/AN}").stdout, "bANANa\n");
        assert_eq!(run("v=banana; echo ${v/#ba/BA}").stdout, "BAnana\n");
        assert_eq!(run("v=banana; echo ${v/%na/NA}").stdout, "banaNA\n");
        assert_eq!(run("v=banana; echo ${v/an}").stdout, "bana\n");
        assert_eq!(run("v=a.b.c; echo ${v//./-}").stdout, "a-b-c\n");
    }

    #[test]
    fn replacement_with_glob_pattern() {
        assert_eq!(run("v=hello.txt; echo ${v/*.txt/matched}").stdout, "matched\n");
    }

    #[test]
    fn case_conversion() {
        assert_eq!(run("v=HelloWorld; echo \"${v,,}  ${v^^}  ${#v}\"").stdout, "helloworld  HELLOWORLD  10\n");
        assert_eq!(run("v=hello; echo ${v^}").stdout, "Hello\n");
        assert_eq!(run("v=HELLO; echo ${v,}").stdout, "hELLO\n");
        assert_eq!(run("v=hello; echo ${v^^[aeiou]}").stdout, "hEllO\n");
    }

    #[test]
    fn transforms() {
        assert_eq!(run("v='two words'; echo ${v@Q}").stdout, "'two words'\n");
        assert_eq!(run("v=abc; echo ${v@U} ${v@u}").stdout, "ABC Abc\n");
        assert_eq!(run("v=ABC; echo ${v@L}").stdout, "abc\n");
        assert_eq!(run("declare -i n=5; echo ${n@a}").stdout, "i\n");
    }

    #[test]
    fn indirection() {
        assert_eq!(run("target=hello; ptr=target; echo ${!ptr}").stdout, "hello\n");
        assert_eq!(run("a=(x y z); ref='a[1]'; echo ${!ref}").stdout, "y\n");
        assert_eq!(run("echo [${!unset_ptr}]").stdout, "[]\n");
    }

    #[test]
    fn bad_substitution_is_runtime() {
        let out = run("if false; then echo ${x~bad}; fi; echo survived");
        assert_eq!(out.stdout, "survived\n");
        let out = run("echo ${x~bad}; echo code=$?");
        assert!(out.stderr.contains("bad substitution"));
    }

    #[test]
    fn nounset_behavior() {
        let out = run("set -u\necho $undefined_var\necho unreached");
        assert!(out.stderr.contains("unbound variable"));
        assert!(!out.stdout.contains("unreached"));

        let out = run("set -u\necho [${undefined-safe}]\necho ok");
        assert_eq!(out.stdout, "[safe]\nok\n");
    }

    #[test]
    fn special_parameters() {
        assert_eq!(run("set -- a b; echo $#").stdout, "2\n");
        assert_eq!(run("false; echo $?").stdout, "1\n");
        let out = run("echo $0");
        assert_eq!(out.stdout, "sandbash\n");
    }

    #[test]
    fn array_element_reads() {
        assert_eq!(run("a=(x y z); echo ${a[0]} ${a[2]} ${a[-1]}").stdout, "x z z\n");
        assert_eq!(run("a=(x); echo [${a[9]}]").stdout, "[]\n");
        assert_eq!(run("declare -A m=([k]=v); echo ${m[k]}").stdout, "v\n");
    }

    #[test]
    fn array_without_subscript_is_element_zero() {
        assert_eq!(run("a=(first second); echo $a").stdout, "first\n");
    }

    #[test]
    fn default_word_with_quotes_splits_correctly() {
        // Entirely quoted default: one field.
        let out = run("set -- ${v:-\"A B C\"}; echo $#");
        assert_eq!(out.stdout, "1\n");
        // Unquoted default: splits.
        let out = run("set -- ${v:-A B C}; echo $#");
        assert_eq!(out.stdout, "3\n");
        // Mixed: quoted chunk protected, unquoted spaces split.
        let out = run("set -- ${v:-\"A B\" C}; echo $#; echo $1");
        assert_eq!(out.stdout, "2\nA B\n");
    }

    #[test]
    fn linenos_count() {
        let out = run("echo $LINENO\necho $LINENO");
        assert_eq!(out.stdout, "1\n2\n");
    }
}

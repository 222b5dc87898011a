//! Multi-value expansion: `$@`, `$*`, `${arr[@]}`, `${arr[*]}`, key
//! listings and prefix-name listings, with their dedicated quoting
//! rules. Quoted `@` yields one field per element; quoted `*` joins on
//! the first IFS character; unquoted forms split like any expansion.

use crate::ast::types::{ParamOp, ParameterExpansion, TransformKind, Word};
use crate::expand::param::split_subscript;
use crate::expand::quote;
use crate::expand::word::Piece;
use crate::interp::engine::Interp;
use crate::interp::error::{ExpansionFailure, Interrupt, UnboundVariable};
use crate::interp::state::{ShellState, Value};

/// The element values plus their keys, as strings.
struct MultiValue {
    keys: Vec<String>,
    values: Vec<String>,
    /// Star-shaped (`$*`, `arr[*]`): quoted form joins into one field.
    star: bool,
    /// Positional parameters slice from $0 for `${@:0:n}`.
    positional: bool,
}

impl<'a> Interp<'a> {
    pub fn is_multi_parameter(&self, pe: &ParameterExpansion) -> bool {
        if matches!(pe.op, Some(ParamOp::ArrayKeys { .. }) | Some(ParamOp::NamePrefix { .. })) {
            return true;
        }
        if pe.name == "@" || pe.name == "*" {
            return true;
        }
        matches!(split_subscript(&pe.name), Some((_, "@")) | Some((_, "*")))
    }

    pub fn expand_multi_parameter(
        &self,
        state: &mut ShellState,
        pe: &ParameterExpansion,
        quoted: bool,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), Interrupt> {
        // Listings are their own shapes.
        match &pe.op {
            Some(ParamOp::ArrayKeys { name, star }) => {
                let multi = self.collect_array(state, name, *star)?;
                let keys = MultiValue {
                    values: multi.keys.clone(),
                    keys: multi.keys,
                    star: *star,
                    positional: false,
                };
                emit_values(state, &keys.values, keys.star, quoted, pieces);
                return Ok(());
            }
            Some(ParamOp::NamePrefix { prefix, star }) => {
                let mut names: Vec<String> = state
                    .env
                    .keys()
                    .filter(|name| name.starts_with(prefix.as_str()))
                    .cloned()
                    .collect();
                for scope in &state.scopes {
                    for (name, binding) in &scope.vars {
                        if binding.is_some() && name.starts_with(prefix.as_str()) {
                            names.push(name.clone());
                        }
                    }
                }
                names.sort();
                names.dedup();
                emit_values(state, &names, *star, quoted, pieces);
                return Ok(());
            }
            _ => {}
        }

        let multi = self.collect_values(state, &pe.name)?;

        match &pe.op {
            None => emit_values(state, &multi.values, multi.star, quoted, pieces),

            Some(ParamOp::Length) => {
                let count = multi.values.len().to_string();
                pieces.push(if quoted { Piece::quoted(count) } else { Piece::expansion(count) });
            }

            Some(ParamOp::Substring { offset, length }) => {
                let sliced = self.slice_values(state, &multi, offset, length.as_ref())?;
                emit_values(state, &sliced, multi.star, quoted, pieces);
            }

            Some(ParamOp::Default { word, check_empty }) => {
                let empty = multi.values.is_empty()
                    || (*check_empty && multi.values.iter().all(|v| v.is_empty()));
                if empty {
                    return self.expand_default_word(state, word, quoted, pieces);
                }
                emit_values(state, &multi.values, multi.star, quoted, pieces);
            }

            Some(ParamOp::Alternative { word, check_empty }) => {
                let empty = multi.values.is_empty()
                    || (*check_empty && multi.values.iter().all(|v| v.is_empty()));
                if !empty {
                    return self.expand_default_word(state, word, quoted, pieces);
                }
            }

            Some(ParamOp::ErrorIfUnset { word, .. }) => {
                if multi.values.is_empty() {
                    let message = match word {
                        Some(word) => self.expand_word_single(state, word)?,
                        None => "parameter not set".to_string(),
                    };
                    return Err(Interrupt::Expansion(ExpansionFailure::fatal(format!(
                        "{}: {}",
                        pe.name, message
                    ))));
                }
                emit_values(state, &multi.values, multi.star, quoted, pieces);
            }

            Some(ParamOp::AssignDefault { .. }) => {
                return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                    "{}: cannot assign in this way",
                    pe.name
                ))));
            }

            Some(ParamOp::RemovePattern { pattern, side, greedy }) => {
                let mut out = Vec::with_capacity(multi.values.len());
                for value in &multi.values {
                    out.push(self.apply_remove(state, value, pattern, *side, *greedy)?);
                }
                emit_values(state, &out, multi.star, quoted, pieces);
            }

            Some(ParamOp::ReplacePattern { pattern, replacement, all, anchor }) => {
                let mut out = Vec::with_capacity(multi.values.len());
                for value in &multi.values {
                    out.push(self.apply_replace(
                        state,
                        value,
                        pattern,
                        replacement.as_ref(),
                        *all,
                        *anchor,
                    )?);
                }
                emit_values(state, &out, multi.star, quoted, pieces);
            }

            Some(ParamOp::CaseConvert { upper, all, pattern }) => {
                let mut out = Vec::with_capacity(multi.values.len());
                for value in &multi.values {
                    out.push(self.apply_case(state, value, *upper, *all, pattern.as_ref())?);
                }
                emit_values(state, &out, multi.star, quoted, pieces);
            }

            Some(ParamOp::Transform(kind)) => {
                match kind {
                    TransformKind::Attributes | TransformKind::Declare => {
                        let base = pe.name.split('[').next().unwrap_or(&pe.name);
                        let text =
                            self.apply_transform(state, base, Some(String::new()), *kind)?;
                        pieces.push(if quoted { Piece::quoted(text) } else { Piece::expansion(text) });
                    }
                    TransformKind::Keyed | TransformKind::KeyValue => {
                        let mut out = Vec::with_capacity(multi.values.len());
                        for (key, value) in multi.keys.iter().zip(multi.values.iter()) {
                            out.push(format!("{} {}", key, quote::shell_quote(value)));
                        }
                        emit_values(state, &out, multi.star, quoted, pieces);
                    }
                    _ => {
                        let mut out = Vec::with_capacity(multi.values.len());
                        for value in &multi.values {
                            out.push(self.apply_transform(
                                state,
                                &pe.name,
                                Some(value.clone()),
                                *kind,
                            )?);
                        }
                        emit_values(state, &out, multi.star, quoted, pieces);
                    }
                }
            }

            Some(ParamOp::Indirect { .. }) => {
                return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                    "{}: bad substitution",
                    pe.name
                ))));
            }

            Some(ParamOp::LengthSliceError) => {
                return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                    "${{#{}}}: bad substitution",
                    pe.name
                ))));
            }

            Some(ParamOp::BadSubstitution { text }) => {
                return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                    "${{{}}}: bad substitution",
                    text
                ))));
            }

            Some(ParamOp::ArrayKeys { .. }) | Some(ParamOp::NamePrefix { .. }) => {
                unreachable!("handled above")
            }
        }
        Ok(())
    }

    fn expand_default_word(
        &self,
        state: &mut ShellState,
        word: &Word,
        quoted: bool,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), Interrupt> {
        if quoted {
            self.expand_quoted_parts(state, &word.parts, pieces)
        } else {
            let nested = self.expand_parts(state, &word.parts)?;
            pieces.extend(nested);
            Ok(())
        }
    }

    fn collect_values(&self, state: &mut ShellState, name: &str) -> Result<MultiValue, Interrupt> {
        if name == "@" || name == "*" {
            // Bash 5 does not treat empty $@/$* as unset under nounset.
            return Ok(MultiValue {
                keys: (1..=state.positional.len()).map(|i| i.to_string()).collect(),
                values: state.positional.clone(),
                star: name == "*",
                positional: true,
            });
        }
        match split_subscript(name) {
            Some((base, sub @ ("@" | "*"))) => {
                let star = sub == "*";
                let mut multi = self.collect_array(state, base, star)?;
                multi.star = star;
                Ok(multi)
            }
            _ => {
                // Shouldn't happen: non-multi names are routed elsewhere.
                let value = self.read_param(state, name)?;
                if value.is_none() && state.options.nounset {
                    return Err(Interrupt::Unbound(UnboundVariable::new(name)));
                }
                Ok(MultiValue {
                    keys: vec!["0".to_string()],
                    values: vec![value.unwrap_or_default()],
                    star: false,
                    positional: false,
                })
            }
        }
    }

    fn collect_array(
        &self,
        state: &mut ShellState,
        base: &str,
        star: bool,
    ) -> Result<MultiValue, Interrupt> {
        Ok(match state.get_var(base).map(|v| v.value.clone()) {
            Some(Value::Indexed(map)) => MultiValue {
                keys: map.keys().map(|k| k.to_string()).collect(),
                values: map.values().cloned().collect(),
                star,
                positional: false,
            },
            Some(Value::Associative(map)) => MultiValue {
                keys: map.keys().cloned().collect(),
                values: map.values().cloned().collect(),
                star,
                positional: false,
            },
            Some(Value::Scalar(s)) => MultiValue {
                keys: vec!["0".to_string()],
                values: vec![s],
                star,
                positional: false,
            },
            None => MultiValue { keys: Vec::new(), values: Vec::new(), star, positional: false },
        })
    }

    /// `${@:off:len}` / `${arr[@]:off:len}` — element slicing. For
    /// positionals, offset 0 names `$0`.
    fn slice_values(
        &self,
        state: &mut ShellState,
        multi: &MultiValue,
        offset: &crate::ast::types::ArithmeticExpression,
        length: Option<&crate::ast::types::ArithmeticExpression>,
    ) -> Result<Vec<String>, Interrupt> {
        // Positional slicing counts $0 at offset zero.
        let mut list = multi.values.clone();
        if multi.positional {
            list.insert(0, state.script_name.clone());
        }
        let len = list.len() as i64;

        let mut start = self.eval_arith(state, &offset.expr)?;
        if start < 0 {
            start += len;
        }
        if start < 0 || start > len {
            return Ok(Vec::new());
        }
        let start = start as usize;

        let take = match length {
            None => len as usize,
            Some(expr) => {
                let l = self.eval_arith(state, &expr.expr)?;
                if l < 0 {
                    let end = len + l;
                    if end < start as i64 {
                        return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                            "{}: substring expression < 0",
                            l
                        ))));
                    }
                    (end as usize).saturating_sub(start)
                } else {
                    l as usize
                }
            }
        };

        Ok(list.into_iter().skip(start).take(take).collect())
    }
}

/// Emit values with `@`/`*` quoting semantics.
pub fn emit_values(
    state: &ShellState,
    values: &[String],
    star: bool,
    quoted: bool,
    pieces: &mut Vec<Piece>,
) {
    if values.is_empty() {
        if quoted && star {
            pieces.push(Piece::quoted(""));
        }
        return;
    }

    if quoted && star {
        let ifs = state.ifs();
        let sep = ifs.chars().next().map(|c| c.to_string()).unwrap_or_default();
        pieces.push(Piece::quoted(values.join(&sep)));
        return;
    }

    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            pieces.push(Piece::Break);
        }
        if quoted {
            pieces.push(Piece::quoted(value.clone()));
        } else {
            pieces.push(Piece::expansion(value.clone()));
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
    fn quoted_at_keeps_fields() {
        let out = run("set -- 'a b' c; f() { echo $#; }; f \"$@\"");
        assert_eq!(out.stdout, "2\n");
    }

    #[test]
    fn unquoted_at_splits() {
        let out = run("set -- 'a b' c; f() { echo $#; }; f $@");
        assert_eq!(out.stdout, "3\n");
    }

    #[test]
    fn quoted_star_joins_with_first_ifs() {
        let out = run("set -- a b c; echo \"$*\"");
        assert_eq!(out.stdout, "a b c\n");
        let out = run("set -- a b c; IFS=:; echo \"$*\"");
        assert_eq!(out.stdout, "a:b:c\n");
    }

    #[test]
    fn at_with_affixes() {
        let out = run("set -- x y; f() { echo $#: $1 / $2; }; f \"pre$@post\"");
        assert_eq!(out.stdout, "2: prex / ypost\n");
    }

    #[test]
    fn empty_at_vanishes_quoted() {
        let out = run("set --; f() { echo $#; }; f \"$@\"");
        assert_eq!(out.stdout, "0\n");
    }

    #[test]
    fn empty_star_quoted_is_one_empty_field() {
        let out = run("set --; f() { echo $#; }; f \"$*\"");
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn array_at_and_star() {
        let out = run("arr=('a b' c); f() { echo $#; }; f \"${arr[@]}\"; f \"${arr[*]}\"; f ${arr[@]}");
        assert_eq!(out.stdout, "2\n1\n3\n");
    }

    #[test]
    fn array_count_and_slice() {
        let out = run("arr=(a b c); echo \"${arr[@]:1:2}  ${#arr[@]}\"");
        assert_eq!(out.stdout, "b c  3\n");
    }

    #[test]
    fn positional_slicing() {
        let out = run("set -- a b c d; echo ${@:2:2}");
        assert_eq!(out.stdout, "b c\n");
        let out = run("set -- a b c; echo ${@: -2}");
        assert_eq!(out.stdout, "b c\n");
        let out = run("set -- a b; echo ${@:0:1}");
        assert_eq!(out.stdout, "sandbash\n");
    }

    #[test]
    fn sparse_array_values_and_keys() {
        let out = run("a[2]=two; a[7]=seven; echo ${a[@]}; echo ${!a[@]}");
        assert_eq!(out.stdout, "two seven\n2 7\n");
    }

    #[test]
    fn associative_keys_in_order() {
        let out = run("declare -A m=([x]=1 [y]=2); echo ${!m[@]}");
        assert_eq!(out.stdout, "x y\n");
    }

    #[test]
    fn name_prefix_listing() {
        let out = run("prefix_one=1; prefix_two=2; echo ${!prefix_@}");
        assert_eq!(out.stdout, "prefix_one prefix_two\n");
    }

    #[test]
    fn pattern_ops_map_over_elements() {
        let out = run("a=(foo.c bar.c); echo ${a[@]%.c}");
        assert_eq!(out.stdout, "foo bar\n");
        let out = run("a=(aa ba); echo ${a[@]/a/X}");
        assert_eq!(out.stdout, "Xa bX\n");
        let out = run("a=(ab cd); echo ${a[@]^^}");
        assert_eq!(out.stdout, "AB CD\n");
    }

    #[test]
    fn at_default_when_no_params() {
        let out = run("set --; echo ${@:-fallback}");
        assert_eq!(out.stdout, "fallback\n");
        let out = run("set -- real; echo ${@:-fallback}");
        assert_eq!(out.stdout, "real\n");
    }

    #[test]
    fn at_q_transform() {
        let out = run("set -- 'a b' c; echo ${@@Q}");
        assert_eq!(out.stdout, "'a b' c\n");
    }

    #[test]
    fn star_unquoted_splits_like_at() {
        let out = run("set -- 'a b' c; f() { echo $#; }; f $*");
        assert_eq!(out.stdout, "3\n");
    }

    #[test]
    fn loop_over_quoted_at() {
        let out = run("set -- 'x y' z; for a in \"$@\"; do echo [$a]; done");
        assert_eq!(out.stdout, "[x y]\n[z]\n");
    }
}

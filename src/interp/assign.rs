//! Assignments: `x=v`, `x+=v`, `arr[i]=v`, `arr=( … )` and the temporary
//! `VAR=v cmd` prefixes. Unkeyed array-literal elements undergo the full
//! expansion pipeline, so `a=($x)` splits and globs.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::ast::types::{ArrayElement, Assignment, SimpleCommand, Word};
use crate::interp::engine::Interp;
use crate::interp::error::Interrupt;
use crate::interp::state::{ShellState, Value, VarFlags, Variable};
use crate::parser::word::{parse_word_parts, WordFlags};

/// Result of applying one assignment: shell errors (readonly, bad
/// subscript) are reported, not unwound.
pub enum AssignOutcome {
    Done,
    Failed(String),
}

impl<'a> Interp<'a> {
    pub fn apply_assignment(
        &self,
        state: &mut ShellState,
        assignment: &Assignment,
        export: bool,
    ) -> Result<AssignOutcome, Interrupt> {
        let name = match state.resolve_name(&assignment.name) {
            Ok(name) => name,
            Err(message) => return Ok(AssignOutcome::Failed(message)),
        };

        if let Some(ref elements) = assignment.array {
            let outcome = self.assign_array(state, &name, elements, assignment.append)?;
            self.mark_export(state, &name, export);
            return Ok(outcome);
        }

        if let Some(ref subscript) = assignment.index {
            let value = match &assignment.value {
                Some(word) => self.expand_word_single(state, word)?,
                None => String::new(),
            };
            let outcome =
                self.assign_element(state, &name, subscript, value, assignment.append)?;
            self.mark_export(state, &name, export);
            return Ok(outcome);
        }

        let mut value = match &assignment.value {
            Some(word) => self.expand_word_single(state, word)?,
            None => String::new(),
        };

        let flags = state.get_var(&name).map(|v| v.flags).unwrap_or_default();
        if flags.integer {
            value = match self.eval_arith_text(state, &value) {
                Ok(n) => n.to_string(),
                Err(Interrupt::Expansion(e)) => return Ok(AssignOutcome::Failed(e.message)),
                Err(other) => return Err(other),
            };
        }

        if assignment.append {
            match state.get_var(&name).map(|v| v.value.clone()) {
                Some(Value::Indexed(mut map)) => {
                    // `arr+=v` appends to element 0.
                    let entry = map.entry(0).or_default();
                    entry.push_str(&value);
                    if let Err(message) = self.write_array(state, &name, Value::Indexed(map)) {
                        return Ok(AssignOutcome::Failed(message));
                    }
                    self.mark_export(state, &name, export);
                    return Ok(AssignOutcome::Done);
                }
                Some(existing) => {
                    let base = existing.as_scalar();
                    value = if flags.integer {
                        let lhs = base.parse::<i64>().unwrap_or(0);
                        let rhs = value.parse::<i64>().unwrap_or(0);
                        lhs.wrapping_add(rhs).to_string()
                    } else {
                        format!("{}{}", base, value)
                    };
                }
                None => {}
            }
        }

        if let Err(message) = state.set_scalar(&name, value) {
            return Ok(AssignOutcome::Failed(message));
        }
        self.mark_export(state, &name, export);
        Ok(AssignOutcome::Done)
    }

    fn mark_export(&self, state: &mut ShellState, name: &str, export: bool) {
        if export {
            if let Some(var) = state.get_var_mut(name) {
                var.flags.exported = true;
            }
        }
    }

    fn write_array(&self, state: &mut ShellState, name: &str, value: Value) -> Result<(), String> {
        let flags = match state.get_var(name) {
            Some(existing) => {
                if existing.flags.readonly {
                    return Err(format!("{}: readonly variable", name));
                }
                existing.flags
            }
            None => VarFlags::default(),
        };
        state.write_binding(name, Variable { value, flags });
        Ok(())
    }

    /// `arr[sub]=value`: associative arrays take the subscript as a word,
    /// everything else evaluates it arithmetically (negative counts from
    /// the end).
    pub fn assign_element(
        &self,
        state: &mut ShellState,
        name: &str,
        subscript: &str,
        value: String,
        append: bool,
    ) -> Result<AssignOutcome, Interrupt> {
        let existing = state.get_var(name).map(|v| v.value.clone());
        match existing {
            Some(Value::Associative(mut map)) => {
                let key = self.expand_subscript_key(state, subscript)?;
                let slot = map.entry(key).or_default();
                if append {
                    slot.push_str(&value);
                } else {
                    *slot = value;
                }
                if let Err(message) = self.write_array(state, name, Value::Associative(map)) {
                    return Ok(AssignOutcome::Failed(message));
                }
                Ok(AssignOutcome::Done)
            }
            other => {
                let mut map = match other {
                    Some(Value::Indexed(map)) => map,
                    Some(Value::Scalar(s)) => {
                        let mut map = BTreeMap::new();
                        if !s.is_empty() {
                            map.insert(0, s);
                        }
                        map
                    }
                    _ => BTreeMap::new(),
                };
                let raw = self.eval_index(state, subscript)?;
                let index = if raw < 0 {
                    let len = map.keys().next_back().map(|&k| k + 1).unwrap_or(0);
                    let adjusted = len + raw;
                    if adjusted < 0 {
                        return Ok(AssignOutcome::Failed(format!(
                            "{}[{}]: bad array subscript",
                            name, subscript
                        )));
                    }
                    adjusted
                } else {
                    raw
                };
                let slot = map.entry(index).or_default();
                if append {
                    slot.push_str(&value);
                } else {
                    *slot = value;
                }
                if let Err(message) = self.write_array(state, name, Value::Indexed(map)) {
                    return Ok(AssignOutcome::Failed(message));
                }
                Ok(AssignOutcome::Done)
            }
        }
    }

    /// `arr=( … )` / `arr+=( … )`.
    fn assign_array(
        &self,
        state: &mut ShellState,
        name: &str,
        elements: &[ArrayElement],
        append: bool,
    ) -> Result<AssignOutcome, Interrupt> {
        let is_associative =
            matches!(state.get_var(name).map(|v| &v.value), Some(Value::Associative(_)));

        if is_associative {
            let mut map = if append {
                match state.get_var(name).map(|v| v.value.clone()) {
                    Some(Value::Associative(map)) => map,
                    _ => IndexMap::new(),
                }
            } else {
                IndexMap::new()
            };
            for element in elements {
                let value = self.expand_word_single(state, &element.value)?;
                match &element.key {
                    Some(key_text) => {
                        let key = self.expand_subscript_key(state, key_text)?;
                        map.insert(key, value);
                    }
                    None => {
                        return Ok(AssignOutcome::Failed(format!(
                            "{}: {}: must use subscript when assigning associative array",
                            name, value
                        )));
                    }
                }
            }
            if let Err(message) = self.write_array(state, name, Value::Associative(map)) {
                return Ok(AssignOutcome::Failed(message));
            }
            return Ok(AssignOutcome::Done);
        }

        let mut map = if append {
            match state.get_var(name).map(|v| v.value.clone()) {
                Some(Value::Indexed(map)) => map,
                Some(Value::Scalar(s)) => {
                    let mut map = BTreeMap::new();
                    map.insert(0, s);
                    map
                }
                _ => BTreeMap::new(),
            }
        } else {
            BTreeMap::new()
        };
        let mut next_index = map.keys().next_back().map(|&k| k + 1).unwrap_or(0);

        for element in elements {
            match &element.key {
                Some(key_text) => {
                    let index = self.eval_index(state, key_text)?;
                    let value = self.expand_word_single(state, &element.value)?;
                    map.insert(index, value);
                    next_index = index + 1;
                }
                None => {
                    // Unkeyed elements split and glob like command words.
                    let fields =
                        self.expand_words(state, std::slice::from_ref(&element.value))?;
                    for field in fields {
                        map.insert(next_index, field);
                        next_index += 1;
                    }
                }
            }
        }

        if let Err(message) = self.write_array(state, name, Value::Indexed(map)) {
            return Ok(AssignOutcome::Failed(message));
        }
        Ok(AssignOutcome::Done)
    }

    // =========================================================================
    // Subscript helpers
    // =========================================================================

    /// Arithmetic subscript evaluation for indexed arrays.
    pub fn eval_index(&self, state: &mut ShellState, text: &str) -> Result<i64, Interrupt> {
        self.eval_arith_text(state, text)
    }

    pub fn eval_arith_text(&self, state: &mut ShellState, text: &str) -> Result<i64, Interrupt> {
        self.limits.check_arith_length(text)?;
        let parsed = crate::parser::arith::parse_arithmetic(text);
        self.eval_arith(state, &parsed.expr)
    }

    /// Associative-array subscripts are words: `m[$k]`, `m[literal]`.
    pub fn expand_subscript_key(
        &self,
        state: &mut ShellState,
        text: &str,
    ) -> Result<String, Interrupt> {
        let flags = WordFlags { no_brace: true, ..Default::default() };
        let parts = match parse_word_parts(text, flags) {
            Ok(parts) => parts,
            Err(_) => return Ok(text.to_string()),
        };
        self.expand_word_single(state, &Word::new(parts))
    }

    // =========================================================================
    // Temporary prefixes
    // =========================================================================

    /// Apply `VAR=v` prefixes for one command, returning what to restore.
    pub fn apply_temp_assignments(
        &self,
        state: &mut ShellState,
        command: &SimpleCommand,
    ) -> Result<Vec<(String, Option<Variable>)>, Interrupt> {
        let mut saved = Vec::new();
        for assignment in &command.assignments {
            let name = state
                .resolve_name(&assignment.name)
                .unwrap_or_else(|_| assignment.name.clone());
            saved.push((name.clone(), state.get_var(&name).cloned()));
            match self.apply_assignment(state, assignment, true)? {
                AssignOutcome::Done => {}
                AssignOutcome::Failed(message) => {
                    // Put back what we already changed, then report.
                    let partial: Vec<_> = saved.drain(..).collect();
                    self.restore_temp_assignments(state, partial);
                    return Err(Interrupt::Expansion(
                        crate::interp::error::ExpansionFailure::new(message),
                    ));
                }
            }
        }
        Ok(saved)
    }

    pub fn restore_temp_assignments(
        &self,
        state: &mut ShellState,
        saved: Vec<(String, Option<Variable>)>,
    ) {
        for (name, previous) in saved.into_iter().rev() {
            match previous {
                Some(var) => state.write_binding(&name, var),
                None => {
                    let _ = state.unset_var(&name);
                }
            }
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
    fn scalar_append() {
        assert_eq!(run("x=ab; x+=cd; echo $x").stdout, "abcd\n");
    }

    #[test]
    fn array_literal_and_access() {
        let out = run("arr=(a b c); echo ${arr[0]} ${arr[2]}");
        assert_eq!(out.stdout, "a c\n");
    }

    #[test]
    fn array_literal_splits_expansions() {
        let out = run("x='one two'; arr=($x); echo ${#arr[@]}");
        assert_eq!(out.stdout, "2\n");
    }

    #[test]
    fn array_element_assignment() {
        let out = run("arr=(a b); arr[1]=B; echo ${arr[1]}");
        assert_eq!(out.stdout, "B\n");
    }

    #[test]
    fn sparse_indices() {
        let out = run("arr[5]=five; arr[2]=two; echo ${arr[@]}");
        assert_eq!(out.stdout, "two five\n");
    }

    #[test]
    fn negative_index_assignment() {
        let out = run("arr=(a b c); arr[-1]=Z; echo ${arr[2]}");
        assert_eq!(out.stdout, "Z\n");
    }

    #[test]
    fn keyed_array_literal() {
        let out = run("arr=([3]=three [1]=one); echo ${arr[3]}-${arr[1]}");
        assert_eq!(out.stdout, "three-one\n");
    }

    #[test]
    fn array_append_literal() {
        let out = run("arr=(a); arr+=(b c); echo ${arr[@]}");
        assert_eq!(out.stdout, "a b c\n");
    }

    #[test]
    fn scalar_becomes_array() {
        let out = run("x=zero; x[1]=one; echo ${x[0]} ${x[1]}");
        assert_eq!(out.stdout, "zero one\n");
    }

    #[test]
    fn arithmetic_subscripts() {
        let out = run("i=1; arr=(a b c); echo ${arr[i+1]}");
        assert_eq!(out.stdout, "c\n");
    }

    #[test]
    fn readonly_assignment_fails() {
        let out = run("readonly r=1; r=2; echo $?");
        assert!(out.stderr.contains("readonly"));
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn temp_prefix_exports_to_command() {
        // Temp prefix is visible to the command and gone afterwards.
        let out = run("f() { echo $inner; }; inner=seen f; echo [$inner]");
        assert_eq!(out.stdout, "seen\n[]\n");
    }

    #[test]
    fn assignment_value_no_word_splitting() {
        let out = run("x='a b'; y=$x; echo \"$y\"");
        assert_eq!(out.stdout, "a b\n");
    }
}

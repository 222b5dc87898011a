//! Declaration utilities: `declare`/`typeset`, `local`, `export`,
//! `readonly`, `unset`.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::expand::quote::declare_form;
use crate::interp::engine::Interp;
use crate::interp::error::Interrupt;
use crate::interp::state::{ExecResult, ShellState, Value, VarFlags, Variable};
use crate::parser::word::{parse_word_parts, WordFlags as ParseFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Declare,
    Local,
    Export,
    Readonly,
}

#[derive(Default, Clone, Copy)]
struct FlagSet {
    indexed: bool,
    associative: bool,
    integer: Option<bool>,
    lowercase: Option<bool>,
    uppercase: Option<bool>,
    nameref: Option<bool>,
    readonly: Option<bool>,
    exported: Option<bool>,
    global: bool,
    print: bool,
}

pub fn run_declare(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
    mode: Mode,
) -> Result<ExecResult, Interrupt> {
    let mut flags = FlagSet::default();
    match mode {
        Mode::Export => flags.exported = Some(true),
        Mode::Readonly => flags.readonly = Some(true),
        _ => {}
    }

    let mut operands = Vec::new();
    let mut past_options = false;
    for arg in args {
        if past_options || (!arg.starts_with('-') && !arg.starts_with('+')) {
            operands.push(arg.clone());
            continue;
        }
        if arg == "--" {
            past_options = true;
            continue;
        }
        let enable = arg.starts_with('-');
        for c in arg.chars().skip(1) {
            match c {
                'a' => flags.indexed = enable,
                'A' => flags.associative = enable,
                'i' => flags.integer = Some(enable),
                'l' => flags.lowercase = Some(enable),
                'u' => flags.uppercase = Some(enable),
                'n' => flags.nameref = Some(enable),
                'r' => flags.readonly = Some(enable),
                'x' => flags.exported = Some(enable),
                'g' => flags.global = true,
                'p' => flags.print = true,
                'f' | 'F' => {}
                other => {
                    return Ok(ExecResult::failure(
                        format!("sandbash: declare: -{}: invalid option\n", other),
                        2,
                    ))
                }
            }
        }
    }

    if flags.print || (operands.is_empty() && mode != Mode::Local) {
        return Ok(print_declarations(state, &operands, mode));
    }

    if mode == Mode::Local && state.scopes.is_empty() {
        return Ok(ExecResult::failure(
            "sandbash: local: can only be used in a function\n",
            1,
        ));
    }

    let mut stderr = String::new();
    let mut code = 0;

    for operand in &operands {
        if let Err(message) = declare_one(interp, state, operand, &flags, mode) {
            stderr.push_str(&format!("sandbash: {}\n", message));
            code = 1;
        }
    }

    Ok(ExecResult::new(String::new(), stderr, code))
}

fn declare_one(
    interp: &Interp<'_>,
    state: &mut ShellState,
    operand: &str,
    flags: &FlagSet,
    mode: Mode,
) -> Result<(), String> {
    let (reference, value_text, append) = split_operand(operand);
    let (name, subscript) = split_subscript(&reference);

    if !crate::parser::lexer::is_valid_name(name) {
        return Err(format!("declare: `{}': not a valid identifier", operand));
    }

    // Element form: delegate to the normal element assignment.
    if let Some(sub) = subscript {
        if let Some(text) = value_text {
            let value = expand_text(interp, state, &text)?;
            return match interp.assign_element(state, name, sub, value, append) {
                Ok(crate::interp::assign::AssignOutcome::Done) => Ok(()),
                Ok(crate::interp::assign::AssignOutcome::Failed(m)) => Err(m),
                Err(_) => Err(format!("declare: {}: expansion failed", operand)),
            };
        }
        return Ok(());
    }

    let local_target = mode == Mode::Local || (mode == Mode::Declare && !flags.global && state.in_function());

    // Start from the existing variable (in the target scope) or fresh.
    let existing: Option<Variable> = if local_target {
        state
            .scopes
            .last()
            .and_then(|scope| scope.vars.get(name).cloned())
            .flatten()
    } else {
        state.get_var(name).cloned()
    };

    if let Some(ref var) = existing {
        if var.flags.readonly && value_text.is_some() {
            return Err(format!("{}: readonly variable", name));
        }
    }

    let mut var = existing.unwrap_or(Variable { value: Value::scalar(""), flags: VarFlags::default() });

    if let Some(v) = flags.integer {
        var.flags.integer = v;
    }
    if let Some(v) = flags.lowercase {
        var.flags.lowercase = v;
        if v {
            var.flags.uppercase = false;
        }
    }
    if let Some(v) = flags.uppercase {
        var.flags.uppercase = v;
        if v {
            var.flags.lowercase = false;
        }
    }
    if let Some(v) = flags.nameref {
        var.flags.nameref = v;
    }
    if let Some(v) = flags.readonly {
        var.flags.readonly = v;
    }
    if let Some(v) = flags.exported {
        var.flags.exported = v;
    }

    // Shape conversion.
    if flags.associative && !matches!(var.value, Value::Associative(_)) {
        var.value = Value::Associative(IndexMap::new());
    } else if flags.indexed && !matches!(var.value, Value::Indexed(_)) {
        let mut map = BTreeMap::new();
        if let Value::Scalar(s) = &var.value {
            if !s.is_empty() {
                map.insert(0, s.clone());
            }
        }
        var.value = Value::Indexed(map);
    }

    if let Some(text) = value_text {
        if text.starts_with('(') && text.ends_with(')') {
            let items = parse_array_literal(&text[1..text.len() - 1]);
            if matches!(var.value, Value::Associative(_)) {
                let mut map = match (append, &var.value) {
                    (true, Value::Associative(m)) => m.clone(),
                    _ => IndexMap::new(),
                };
                for (key, item) in items {
                    let key = key.ok_or_else(|| {
                        format!("{}: must use subscript when assigning associative array", name)
                    })?;
                    let key = expand_text(interp, state, &key)?;
                    map.insert(key, expand_text(interp, state, &item)?);
                }
                var.value = Value::Associative(map);
            } else {
                let mut map = match (append, &var.value) {
                    (true, Value::Indexed(m)) => m.clone(),
                    _ => BTreeMap::new(),
                };
                let mut next = map.keys().next_back().map(|&k| k + 1).unwrap_or(0);
                for (key, item) in items {
                    let idx = match key {
                        Some(k) => {
                            let text = expand_text(interp, state, &k)?;
                            text.trim().parse::<i64>().unwrap_or(next)
                        }
                        None => next,
                    };
                    map.insert(idx, expand_text(interp, state, &item)?);
                    next = idx + 1;
                }
                var.value = Value::Indexed(map);
            }
        } else {
            let mut value = expand_text(interp, state, &text)?;
            if var.flags.integer {
                value = interp
                    .eval_arith_text(state, &value)
                    .map(|n| n.to_string())
                    .map_err(|_| format!("declare: {}: arithmetic evaluation failed", text))?;
            }
            if var.flags.lowercase {
                value = value.to_lowercase();
            } else if var.flags.uppercase {
                value = value.to_uppercase();
            }
            match &mut var.value {
                Value::Indexed(map) => {
                    if append {
                        let slot = map.entry(0).or_default();
                        slot.push_str(&value);
                    } else {
                        map.insert(0, value);
                    }
                }
                Value::Associative(map) => {
                    map.insert("0".to_string(), value);
                }
                Value::Scalar(current) => {
                    if append {
                        current.push_str(&value);
                    } else {
                        *current = value;
                    }
                }
            }
        }
    }

    if local_target {
        let _ = state.declare_local(name, Some(var));
    } else {
        state.write_binding(name, var);
    }
    Ok(())
}

fn expand_text(interp: &Interp<'_>, state: &mut ShellState, text: &str) -> Result<String, String> {
    let flags = ParseFlags { is_assignment: true, no_brace: true, ..Default::default() };
    let parts = parse_word_parts(text, flags).map_err(|e| e.to_string())?;
    interp
        .expand_word_single(state, &crate::ast::types::Word::new(parts))
        .map_err(|e| e.to_string())
}

/// Split `name[sub]±=value` into its reference, value and append flag.
fn split_operand(operand: &str) -> (String, Option<String>, bool) {
    let chars: Vec<char> = operand.chars().collect();
    let mut i = 0;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    if chars.get(i) == Some(&'[') {
        let mut depth = 1;
        i += 1;
        while i < chars.len() && depth > 0 {
            match chars[i] {
                '[' => depth += 1,
                ']' => depth -= 1,
                _ => {}
            }
            i += 1;
        }
    }
    let append = chars.get(i) == Some(&'+') && chars.get(i + 1) == Some(&'=');
    let eq = if append { i + 1 } else { i };
    if chars.get(eq) == Some(&'=') {
        let reference: String = chars[..i].iter().collect();
        let value: String = chars[eq + 1..].iter().collect();
        (reference, Some(value), append)
    } else {
        (operand.to_string(), None, false)
    }
}

fn split_subscript(reference: &str) -> (&str, Option<&str>) {
    match (reference.find('['), reference.rfind(']')) {
        (Some(open), Some(close)) if close == reference.len() - 1 && close > open => {
            (&reference[..open], Some(&reference[open + 1..close]))
        }
        _ => (reference, None),
    }
}

/// Split `(a [k]=v "c d")` into optionally-keyed raw items.
fn parse_array_literal(inner: &str) -> Vec<(Option<String>, String)> {
    let chars: Vec<char> = inner.chars().collect();
    let mut items = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }

        let mut key = None;
        if chars[i] == '[' {
            let mut depth = 1;
            let mut j = i + 1;
            while j < chars.len() && depth > 0 {
                match chars[j] {
                    '[' => depth += 1,
                    ']' => depth -= 1,
                    _ => {}
                }
                j += 1;
            }
            if depth == 0 && chars.get(j) == Some(&'=') {
                key = Some(chars[i + 1..j - 1].iter().collect::<String>());
                i = j + 1;
            }
        }

        let mut item = String::new();
        while i < chars.len() && !chars[i].is_whitespace() {
            match chars[i] {
                '\'' => {
                    item.push('\'');
                    i += 1;
                    while i < chars.len() {
                        item.push(chars[i]);
                        i += 1;
                        if chars[i - 1] == '\'' {
                            break;
                        }
                    }
                }
                '"' => {
                    item.push('"');
                    i += 1;
                    while i < chars.len() && chars[i] != '"' {
                        if chars[i] == '\\' && i + 1 < chars.len() {
                            item.push(chars[i]);
                            item.push(chars[i + 1]);
                            i += 2;
                        } else {
                            item.push(chars[i]);
                            i += 1;
                        }
                    }
                    if i < chars.len() {
                        item.push('"');
                        i += 1;
                    }
                }
                '\\' => {
                    item.push('\\');
                    if i + 1 < chars.len() {
                        item.push(chars[i + 1]);
                    }
                    i += 2;
                }
                c => {
                    item.push(c);
                    i += 1;
                }
            }
        }
        items.push((key, item));
    }
    items
}

fn print_declarations(state: &ShellState, operands: &[String], mode: Mode) -> ExecResult {
    let mut out = String::new();
    let mut code = 0;

    let emit = |out: &mut String, name: &str, var: &Variable| {
        let form = declare_form(name, &var.value, &var.flags);
        if form.starts_with("declare") {
            out.push_str(&form);
        } else {
            out.push_str(&format!("declare -- {}", form));
        }
        out.push('\n');
    };

    if operands.is_empty() {
        let mut names: Vec<&String> = state.env.keys().collect();
        names.sort();
        for name in names {
            let var = &state.env[name.as_str()];
            match mode {
                Mode::Export if !var.flags.exported => continue,
                Mode::Readonly if !var.flags.readonly => continue,
                _ => {}
            }
            emit(&mut out, name, var);
        }
    } else {
        for name in operands {
            match state.get_var(name) {
                Some(var) => emit(&mut out, name, var),
                None => {
                    code = 1;
                }
            }
        }
    }
    ExecResult::new(out, String::new(), code)
}

pub fn run_unset(
    interp: &Interp<'_>,
    state: &mut ShellState,
    args: &[String],
) -> Result<ExecResult, Interrupt> {
    let mut unset_function = false;
    let mut stderr = String::new();
    let mut code = 0;

    for arg in args {
        match arg.as_str() {
            "-f" => unset_function = true,
            "-v" => unset_function = false,
            name => {
                if unset_function {
                    state.functions.remove(name);
                    continue;
                }
                let (base, subscript) = split_subscript(name);
                if let Some(sub) = subscript {
                    match state.get_var(base).map(|v| v.value.clone()) {
                        Some(Value::Indexed(mut map)) => {
                            let idx = interp.eval_index(state, sub)?;
                            map.remove(&idx);
                            let flags = state.get_var(base).map(|v| v.flags).unwrap_or_default();
                            state.write_binding(base, Variable { value: Value::Indexed(map), flags });
                        }
                        Some(Value::Associative(mut map)) => {
                            let key = interp.expand_subscript_key(state, sub)?;
                            map.shift_remove(&key);
                            let flags = state.get_var(base).map(|v| v.flags).unwrap_or_default();
                            state
                                .write_binding(base, Variable { value: Value::Associative(map), flags });
                        }
                        _ => {}
                    }
                    continue;
                }
                if let Err(message) = state.unset_var(name) {
                    stderr.push_str(&format!("sandbash: unset: {}\n", message));
                    code = 1;
                }
            }
        }
    }

    Ok(ExecResult::new(String::new(), stderr, code))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn declare_scalar() {
        assert_eq!(run("declare x=5; echo $x").stdout, "5\n");
    }

    #[test]
    fn declare_integer_evaluates() {
        assert_eq!(run("declare -i n; n=2+3; echo $n").stdout, "5\n");
        assert_eq!(run("declare -i n='4*4'; echo $n").stdout, "16\n");
    }

    #[test]
    fn declare_case_flags() {
        assert_eq!(run("declare -l low=ABC; echo $low").stdout, "abc\n");
        assert_eq!(run("declare -u up=abc; echo $up").stdout, "ABC\n");
    }

    #[test]
    fn declare_array_argument() {
        assert_eq!(run("declare -a arr=(x y z); echo ${arr[1]}").stdout, "y\n");
    }

    #[test]
    fn declare_associative() {
        let out = run("declare -A m=([one]=1 [two]=2); echo ${m[two]}");
        assert_eq!(out.stdout, "2\n");
    }

    #[test]
    fn associative_without_declare_needs_subscripts() {
        let out = run("declare -A m; m[alpha]=a; echo ${m[alpha]}");
        assert_eq!(out.stdout, "a\n");
    }

    #[test]
    fn export_marks_variable() {
        let out = run("export E=1; declare -p E");
        assert!(out.stdout.contains("-x"));
    }

    #[test]
    fn readonly_blocks_later_writes() {
        let out = run("readonly R=1; R=2; echo $R");
        assert!(out.stderr.contains("readonly"));
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn nameref_declare() {
        let out = run("x=actual; declare -n ref=x; echo $ref; ref=changed; echo $x");
        assert_eq!(out.stdout, "actual\nchanged\n");
    }

    #[test]
    fn local_inside_function() {
        let out = run("x=g; f() { local x=l; echo $x; }; f; echo $x");
        assert_eq!(out.stdout, "l\ng\n");
    }

    #[test]
    fn local_outside_function_fails() {
        let out = run("local x=1; echo $?");
        assert!(out.stderr.contains("function"));
        assert_eq!(out.stdout, "1\n");
    }

    #[test]
    fn unset_variable_and_element() {
        assert_eq!(run("x=1; unset x; echo [${x-gone}]").stdout, "[gone]\n");
        assert_eq!(run("a=(1 2 3); unset 'a[1]'; echo ${a[@]}").stdout, "1 3\n");
    }

    #[test]
    fn unset_function() {
        let out = run("f() { echo hi; }; unset -f f; f");
        assert_eq!(out.exit_code, 127);
    }

    #[test]
    fn declare_p_prints_form() {
        let out = run("declare -i n=5; declare -p n");
        assert!(out.stdout.contains("declare -i n=5") || out.stdout.contains("declare -i n='5'"));
    }
}

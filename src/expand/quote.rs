//! `${var@X}` transforms and shell quoting.

use crate::interp::state::{Value, VarFlags};
use crate::parser::word::decode_ansi_c;

/// Quote a string for shell reuse, the way `${var@Q}` does: single
/// quotes when possible, `$'…'` when control characters force it.
pub fn shell_quote(text: &str) -> String {
    if text.is_empty() {
        return "''".to_string();
    }
    if text.chars().any(|c| c.is_control()) {
        let mut out = String::from("$'");
        for c in text.chars() {
            match c {
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                '\x07' => out.push_str("\\a"),
                '\x08' => out.push_str("\\b"),
                '\x0c' => out.push_str("\\f"),
                '\x0b' => out.push_str("\\v"),
                '\x1b' => out.push_str("\\E"),
                '\'' => out.push_str("\\'"),
                '\\' => out.push_str("\\\\"),
                c if c.is_control() => out.push_str(&format!("\\{:03o}", c as u32)),
                c => out.push(c),
            }
        }
        out.push('\'');
        return out;
    }
    if !text.contains('\'') {
        // Plain words need no quoting at all.
        let safe = text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_./:=-%+@^,".contains(c));
        if safe {
            return text.to_string();
        }
        return format!("'{}'", text);
    }
    format!("'{}'", text.replace('\'', "'\\''"))
}

/// `${var@E}` — run the value through ANSI-C escape decoding.
pub fn expand_escapes(text: &str) -> String {
    decode_ansi_c(text)
}

/// `${var@a}` — attribute letters in `declare` order.
pub fn attribute_letters(value: &Value, flags: &VarFlags) -> String {
    let mut out = String::new();
    match value {
        Value::Indexed(_) => out.push('a'),
        Value::Associative(_) => out.push('A'),
        Value::Scalar(_) => {}
    }
    if flags.integer {
        out.push('i');
    }
    if flags.lowercase {
        out.push('l');
    }
    if flags.nameref {
        out.push('n');
    }
    if flags.readonly {
        out.push('r');
    }
    if flags.uppercase {
        out.push('u');
    }
    if flags.exported {
        out.push('x');
    }
    out
}

/// `${var@A}` — a command that would recreate the variable.
pub fn declare_form(name: &str, value: &Value, flags: &VarFlags) -> String {
    let letters = attribute_letters(value, flags);
    match value {
        Value::Scalar(s) => {
            if letters.is_empty() {
                format!("{}={}", name, shell_quote(s))
            } else {
                format!("declare -{} {}={}", letters, name, shell_quote(s))
            }
        }
        Value::Indexed(map) => {
            let body: Vec<String> =
                map.iter().map(|(k, v)| format!("[{}]={}", k, shell_quote(v))).collect();
            let letters = if letters.is_empty() { "a".to_string() } else { letters };
            format!("declare -{} {}=({})", letters, name, body.join(" "))
        }
        Value::Associative(map) => {
            let body: Vec<String> =
                map.iter().map(|(k, v)| format!("[{}]={}", shell_quote(k), shell_quote(v))).collect();
            let letters = if letters.is_empty() { "A".to_string() } else { letters };
            format!("declare -{} {}=({})", letters, name, body.join(" "))
        }
    }
}

/// `${var@P}` — prompt expansion; the sandbox has no prompt state beyond
/// a handful of escapes.
pub fn prompt_expand(text: &str, cwd: &str, user: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() {
            match chars[i + 1] {
                'w' => out.push_str(cwd),
                'W' => out.push_str(cwd.rsplit('/').next().unwrap_or(cwd)),
                'u' => out.push_str(user),
                'h' | 'H' => out.push_str("localhost"),
                's' => out.push_str("sandbash"),
                '$' => out.push(if user == "root" { '#' } else { '$' }),
                'n' => out.push('\n'),
                '\\' => out.push('\\'),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// First-character uppercase for `${var@u}`.
pub fn upper_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn quote_plain_word_unchanged() {
        assert_eq!(shell_quote("hello"), "hello");
        assert_eq!(shell_quote("/usr/bin"), "/usr/bin");
    }

    #[test]
    fn quote_spaces() {
        assert_eq!(shell_quote("two words"), "'two words'");
    }

    #[test]
    fn quote_empty() {
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn quote_embedded_single_quote() {
        assert_eq!(shell_quote("don't"), "'don'\\''t'");
    }

    #[test]
    fn quote_control_chars_use_ansi() {
        assert_eq!(shell_quote("a\nb"), "$'a\\nb'");
        assert_eq!(shell_quote("tab\there"), "$'tab\\there'");
    }

    #[test]
    fn escape_expansion() {
        assert_eq!(expand_escapes("a\\tb"), "a\tb");
    }

    #[test]
    fn attributes() {
        let flags = VarFlags { integer: true, exported: true, ..Default::default() };
        assert_eq!(attribute_letters(&Value::scalar("1"), &flags), "ix");
        assert_eq!(attribute_letters(&Value::Indexed(BTreeMap::new()), &VarFlags::default()), "a");
    }

    #[test]
    fn declare_forms() {
        assert_eq!(declare_form("v", &Value::scalar("hi"), &VarFlags::default()), "v=hi");
        let mut map = BTreeMap::new();
        map.insert(0, "a b".to_string());
        assert_eq!(
            declare_form("arr", &Value::Indexed(map), &VarFlags::default()),
            "declare -a arr=([0]='a b')"
        );
    }

    #[test]
    fn prompt_escapes() {
        assert_eq!(prompt_expand("\\u@\\h:\\w\\$ ", "/tmp", "user"), "user@localhost:/tmp$ ");
    }

    #[test]
    fn upper_first_char() {
        assert_eq!(upper_first("hello"), "Hello");
        assert_eq!(upper_first(""), "");
    }
}

//! Parameter-expansion parser.
//!
//! Parses the text between `${` and `}` into a `ParameterExpansion`.
//! Unrecognized forms become `BadSubstitution` nodes that only raise an
//! error if the expansion is actually evaluated.

use crate::ast::types::{
    ParamOp, ParameterExpansion, PatternAnchor, PatternSide, TransformKind, Word,
};
use crate::parser::arith::parse_arithmetic;
use crate::parser::word::{parse_word_parts, WordFlags};
use crate::parser::ParseError;

const SPECIAL_PARAMS: &str = "@*#?$!-";

fn bad(text: &str) -> ParameterExpansion {
    ParameterExpansion {
        name: String::new(),
        op: Some(ParamOp::BadSubstitution { text: text.to_string() }),
    }
}

/// Parse the interior of `${…}`.
pub fn parse_braced_expansion(inner: &str) -> Result<ParameterExpansion, ParseError> {
    if inner.is_empty() {
        return Ok(bad(inner));
    }

    // ${#…} — length, or the `#` parameter itself.
    if let Some(rest) = inner.strip_prefix('#') {
        if rest.is_empty() {
            return Ok(ParameterExpansion::plain("#"));
        }
        let (name, after) = split_param_name(rest);
        if name.is_empty() {
            return Ok(bad(inner));
        }
        if after.is_empty() {
            return Ok(ParameterExpansion { name, op: Some(ParamOp::Length) });
        }
        // ${#v:1} and friends parse but always fail at expansion time.
        return Ok(ParameterExpansion { name, op: Some(ParamOp::LengthSliceError) });
    }

    // ${!…} — indirection, name-prefix listing, array keys.
    if let Some(rest) = inner.strip_prefix('!') {
        if rest.is_empty() {
            return Ok(ParameterExpansion::plain("!"));
        }
        if let Some(base) = rest.strip_suffix("[@]") {
            if crate::parser::lexer::is_valid_name(base) {
                return Ok(ParameterExpansion {
                    name: base.to_string(),
                    op: Some(ParamOp::ArrayKeys { name: base.to_string(), star: false }),
                });
            }
        }
        if let Some(base) = rest.strip_suffix("[*]") {
            if crate::parser::lexer::is_valid_name(base) {
                return Ok(ParameterExpansion {
                    name: base.to_string(),
                    op: Some(ParamOp::ArrayKeys { name: base.to_string(), star: true }),
                });
            }
        }
        if rest.len() > 1 {
            let (prefix, last) = rest.split_at(rest.len() - 1);
            if (last == "*" || last == "@") && crate::parser::lexer::is_valid_name(prefix) {
                return Ok(ParameterExpansion {
                    name: prefix.to_string(),
                    op: Some(ParamOp::NamePrefix { prefix: prefix.to_string(), star: last == "*" }),
                });
            }
        }
        let (name, after) = split_param_name(rest);
        if name.is_empty() {
            return Ok(bad(inner));
        }
        let inner_op = if after.is_empty() {
            None
        } else {
            match parse_operation(&name, after)? {
                Some(op) => Some(Box::new(op)),
                None => return Ok(bad(inner)),
            }
        };
        return Ok(ParameterExpansion { name, op: Some(ParamOp::Indirect { op: inner_op }) });
    }

    let (name, after) = split_param_name(inner);
    if name.is_empty() {
        return Ok(bad(inner));
    }
    if after.is_empty() {
        return Ok(ParameterExpansion { name, op: None });
    }
    match parse_operation(&name, after)? {
        Some(op) => Ok(ParameterExpansion { name, op: Some(op) }),
        None => Ok(bad(inner)),
    }
}

/// Split a parameter reference off the front: special character, digits,
/// or a name with an optional `[subscript]`.
fn split_param_name(text: &str) -> (String, &str) {
    let chars: Vec<char> = text.chars().collect();
    let first = match chars.first() {
        Some(&c) => c,
        None => return (String::new(), text),
    };

    if first.is_ascii_digit() {
        let end = chars.iter().position(|c| !c.is_ascii_digit()).unwrap_or(chars.len());
        let name: String = chars[..end].iter().collect();
        let len = name.len();
        return (name, &text[len..]);
    }

    if SPECIAL_PARAMS.contains(first) {
        return (first.to_string(), &text[first.len_utf8()..]);
    }

    if !(first.is_ascii_alphabetic() || first == '_') {
        return (String::new(), text);
    }

    let mut i = 1;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
        i += 1;
    }

    // Optional subscript, kept as part of the reference.
    if chars.get(i) == Some(&'[') {
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
        if depth == 0 {
            i = j;
        }
    }

    let name: String = chars[..i].iter().collect();
    let byte_len: usize = name.chars().map(|c| c.len_utf8()).sum();
    (name, &text[byte_len..])
}

fn op_word(text: &str) -> Result<Word, ParseError> {
    let flags = WordFlags { in_param_word: true, no_brace: true, ..Default::default() };
    Ok(Word::new(parse_word_parts(text, flags)?))
}

/// Parse the operation suffix after the parameter reference.
/// Returns `None` for unrecognized text (caller emits BadSubstitution).
fn parse_operation(name: &str, text: &str) -> Result<Option<ParamOp>, ParseError> {
    let _ = name;
    let chars: Vec<char> = text.chars().collect();

    match chars[0] {
        ':' => match chars.get(1) {
            Some(&'-') => Ok(Some(ParamOp::Default { word: op_word(&text[2..])?, check_empty: true })),
            Some(&'=') => {
                Ok(Some(ParamOp::AssignDefault { word: op_word(&text[2..])?, check_empty: true }))
            }
            Some(&'?') => Ok(Some(ParamOp::ErrorIfUnset {
                word: if text.len() > 2 { Some(op_word(&text[2..])?) } else { None },
                check_empty: true,
            })),
            Some(&'+') => {
                Ok(Some(ParamOp::Alternative { word: op_word(&text[2..])?, check_empty: true }))
            }
            _ => parse_substring(&text[1..]).map(Some),
        },
        '-' => Ok(Some(ParamOp::Default { word: op_word(&text[1..])?, check_empty: false })),
        '=' => Ok(Some(ParamOp::AssignDefault { word: op_word(&text[1..])?, check_empty: false })),
        '?' => Ok(Some(ParamOp::ErrorIfUnset {
            word: if text.len() > 1 { Some(op_word(&text[1..])?) } else { None },
            check_empty: false,
        })),
        '+' => Ok(Some(ParamOp::Alternative { word: op_word(&text[1..])?, check_empty: false })),
        '#' => {
            let (greedy, rest) = match text.strip_prefix("##") {
                Some(rest) => (true, rest),
                None => (false, &text[1..]),
            };
            Ok(Some(ParamOp::RemovePattern {
                pattern: pattern_word(rest)?,
                side: PatternSide::Prefix,
                greedy,
            }))
        }
        '%' => {
            let (greedy, rest) = match text.strip_prefix("%%") {
                Some(rest) => (true, rest),
                None => (false, &text[1..]),
            };
            Ok(Some(ParamOp::RemovePattern {
                pattern: pattern_word(rest)?,
                side: PatternSide::Suffix,
                greedy,
            }))
        }
        '/' => parse_replacement(text).map(Some),
        '^' => {
            let (all, rest) = match text.strip_prefix("^^") {
                Some(rest) => (true, rest),
                None => (false, &text[1..]),
            };
            Ok(Some(ParamOp::CaseConvert {
                upper: true,
                all,
                pattern: if rest.is_empty() { None } else { Some(pattern_word(rest)?) },
            }))
        }
        ',' => {
            let (all, rest) = match text.strip_prefix(",,") {
                Some(rest) => (true, rest),
                None => (false, &text[1..]),
            };
            Ok(Some(ParamOp::CaseConvert {
                upper: false,
                all,
                pattern: if rest.is_empty() { None } else { Some(pattern_word(rest)?) },
            }))
        }
        '@' => {
            if chars.len() == 2 {
                if let Some(kind) = TransformKind::from_letter(chars[1]) {
                    return Ok(Some(ParamOp::Transform(kind)));
                }
            }
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn pattern_word(text: &str) -> Result<Word, ParseError> {
    let flags = WordFlags { in_param_word: true, no_brace: true, ..Default::default() };
    Ok(Word::new(parse_word_parts(text, flags)?))
}

/// `:offset` / `:offset:length` — both sides are arithmetic.
fn parse_substring(text: &str) -> Result<ParamOp, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut depth = 0usize;
    let mut split = None;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '?' if depth == 0 => {
                // Skip the matching ':' of a bare ternary.
                if let Some(colon) = chars[i + 1..].iter().position(|&c| c == ':') {
                    i += colon + 1;
                }
            }
            ':' if depth == 0 => {
                split = Some(i);
                break;
            }
            _ => {}
        }
        i += 1;
    }

    let (offset_text, length_text) = match split {
        Some(idx) => {
            let offset: String = chars[..idx].iter().collect();
            let length: String = chars[idx + 1..].iter().collect();
            (offset, Some(length))
        }
        None => (text.to_string(), None),
    };

    let offset = parse_arithmetic(offset_text.trim());
    let length = length_text.map(|t| parse_arithmetic(t.trim()));
    Ok(ParamOp::Substring { offset, length })
}

/// `/pattern/replacement` with `//`, `/#`, `/%` prefixes.
fn parse_replacement(text: &str) -> Result<ParamOp, ParseError> {
    let (all, anchor, rest) = if let Some(rest) = text.strip_prefix("//") {
        (true, PatternAnchor::None, rest)
    } else if let Some(rest) = text.strip_prefix("/#") {
        (false, PatternAnchor::Start, rest)
    } else if let Some(rest) = text.strip_prefix("/%") {
        (false, PatternAnchor::End, rest)
    } else {
        (false, PatternAnchor::None, &text[1..])
    };

    let split = find_pattern_split(rest);
    let (pattern_text, replacement_text) = match split {
        Some(idx) => (&rest[..idx], Some(&rest[idx + 1..])),
        None => (rest, None),
    };

    let replacement = match replacement_text {
        Some(t) => Some(op_word(t)?),
        None => None,
    };
    Ok(ParamOp::ReplacePattern { pattern: pattern_word(pattern_text)?, replacement, all, anchor })
}

/// Byte index of the `/` separating pattern from replacement. The first
/// character is always pattern material, so `${x////c}` reads a `/`
/// pattern. Quotes and escapes hide separators.
fn find_pattern_split(text: &str) -> Option<usize> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    let mut consumed = false;
    let mut byte = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '/' && consumed {
            return Some(byte);
        }
        match c {
            '\\' => {
                byte += c.len_utf8() + chars.get(i + 1).map(|c| c.len_utf8()).unwrap_or(0);
                i += 2;
            }
            '\'' => {
                byte += c.len_utf8();
                i += 1;
                while i < chars.len() {
                    byte += chars[i].len_utf8();
                    i += 1;
                    if chars[i - 1] == '\'' {
                        break;
                    }
                }
            }
            '"' => {
                byte += c.len_utf8();
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        byte += chars[i].len_utf8() + chars[i + 1].len_utf8();
                        i += 2;
                    } else {
                        byte += chars[i].len_utf8();
                        i += 1;
                    }
                }
                if i < chars.len() {
                    byte += chars[i].len_utf8();
                    i += 1;
                }
            }
            _ => {
                byte += c.len_utf8();
                i += 1;
            }
        }
        consumed = true;
    }
    None
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::WordPart;

    fn parse(inner: &str) -> ParameterExpansion {
        parse_braced_expansion(inner).unwrap()
    }

    #[test]
    fn plain_name() {
        let pe = parse("HOME");
        assert_eq!(pe.name, "HOME");
        assert!(pe.op.is_none());
    }

    #[test]
    fn subscripted_name() {
        let pe = parse("arr[@]");
        assert_eq!(pe.name, "arr[@]");
        assert!(pe.op.is_none());
    }

    #[test]
    fn default_value_forms() {
        match parse("v:-fallback").op {
            Some(ParamOp::Default { check_empty: true, word }) => {
                assert_eq!(word.parts, vec![WordPart::Literal("fallback".into())]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse("v-x").op, Some(ParamOp::Default { check_empty: false, .. })));
        assert!(matches!(parse("v:=x").op, Some(ParamOp::AssignDefault { check_empty: true, .. })));
        assert!(matches!(parse("v:+x").op, Some(ParamOp::Alternative { check_empty: true, .. })));
        assert!(matches!(
            parse("v:?msg").op,
            Some(ParamOp::ErrorIfUnset { check_empty: true, word: Some(_) })
        ));
        assert!(matches!(
            parse("v?").op,
            Some(ParamOp::ErrorIfUnset { check_empty: false, word: None })
        ));
    }

    #[test]
    fn length_forms() {
        let pe = parse("#var");
        assert_eq!(pe.name, "var");
        assert!(matches!(pe.op, Some(ParamOp::Length)));

        let pe = parse("#arr[@]");
        assert_eq!(pe.name, "arr[@]");
        assert!(matches!(pe.op, Some(ParamOp::Length)));

        assert_eq!(parse("#").name, "#");
        assert!(matches!(parse("#v:1").op, Some(ParamOp::LengthSliceError)));
    }

    #[test]
    fn substring_forms() {
        match parse("v:2").op {
            Some(ParamOp::Substring { length: None, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
        match parse("v:2:3").op {
            Some(ParamOp::Substring { length: Some(_), .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
        // Negative offset needs the space to avoid `:-`.
        match parse("v: -1").op {
            Some(ParamOp::Substring { length: None, .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn pattern_removal_forms() {
        assert!(matches!(
            parse("v#pre").op,
            Some(ParamOp::RemovePattern { side: PatternSide::Prefix, greedy: false, .. })
        ));
        assert!(matches!(
            parse("v##pre").op,
            Some(ParamOp::RemovePattern { side: PatternSide::Prefix, greedy: true, .. })
        ));
        assert!(matches!(
            parse("v%suf").op,
            Some(ParamOp::RemovePattern { side: PatternSide::Suffix, greedy: false, .. })
        ));
        assert!(matches!(
            parse("v%%suf").op,
            Some(ParamOp::RemovePattern { side: PatternSide::Suffix, greedy: true, .. })
        ));
    }

    #[test]
    fn replacement_forms() {
        assert!(matches!(
            parse("v/a/b").op,
            Some(ParamOp::ReplacePattern { all: false, anchor: PatternAnchor::None, .. })
        ));
        assert!(matches!(parse("v//a/b").op, Some(ParamOp::ReplacePattern { all: true, .. })));
        assert!(matches!(
            parse("v/#a/b").op,
            Some(ParamOp::ReplacePattern { anchor: PatternAnchor::Start, .. })
        ));
        assert!(matches!(
            parse("v/%a/b").op,
            Some(ParamOp::ReplacePattern { anchor: PatternAnchor::End, .. })
        ));
        // Deleting: no replacement at all.
        assert!(matches!(
            parse("v/a").op,
            Some(ParamOp::ReplacePattern { replacement: None, .. })
        ));
    }

    #[test]
    fn slash_pattern_is_slash() {
        // ${x////c}: `//` = replace-all, pattern `/`, replacement `c`.
        match parse("x///c").op {
            Some(ParamOp::ReplacePattern { all: true, pattern, replacement: Some(rep), .. }) => {
                assert_eq!(pattern.parts, vec![WordPart::Literal("/".into())]);
                assert_eq!(rep.parts, vec![WordPart::Literal("c".into())]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn case_conversion_forms() {
        assert!(matches!(
            parse("v^").op,
            Some(ParamOp::CaseConvert { upper: true, all: false, pattern: None })
        ));
        assert!(matches!(parse("v^^").op, Some(ParamOp::CaseConvert { upper: true, all: true, .. })));
        assert!(matches!(
            parse("v,,").op,
            Some(ParamOp::CaseConvert { upper: false, all: true, .. })
        ));
        assert!(matches!(
            parse("v^^[ab]").op,
            Some(ParamOp::CaseConvert { pattern: Some(_), .. })
        ));
    }

    #[test]
    fn transforms() {
        assert!(matches!(parse("v@Q").op, Some(ParamOp::Transform(TransformKind::Quote))));
        assert!(matches!(parse("v@U").op, Some(ParamOp::Transform(TransformKind::Upper))));
        assert!(matches!(parse("v@z").op, Some(ParamOp::BadSubstitution { .. })));
    }

    #[test]
    fn indirection_forms() {
        let pe = parse("!ref");
        assert_eq!(pe.name, "ref");
        assert!(matches!(pe.op, Some(ParamOp::Indirect { op: None })));

        let pe = parse("!ref:-fallback");
        assert!(matches!(pe.op, Some(ParamOp::Indirect { op: Some(_) })));
    }

    #[test]
    fn name_prefix_listing() {
        let pe = parse("!BASH*");
        assert!(matches!(pe.op, Some(ParamOp::NamePrefix { star: true, .. })));
        let pe = parse("!BASH@");
        assert!(matches!(pe.op, Some(ParamOp::NamePrefix { star: false, .. })));
    }

    #[test]
    fn array_keys() {
        let pe = parse("!arr[@]");
        assert!(matches!(pe.op, Some(ParamOp::ArrayKeys { star: false, .. })));
        let pe = parse("!arr[*]");
        assert!(matches!(pe.op, Some(ParamOp::ArrayKeys { star: true, .. })));
    }

    #[test]
    fn bad_substitution() {
        assert!(matches!(parse("").op, Some(ParamOp::BadSubstitution { .. })));
        assert!(matches!(parse("v~x").op, Some(ParamOp::BadSubstitution { .. })));
    }

    #[test]
    fn positional_parameters() {
        assert_eq!(parse("10").name, "10");
        assert_eq!(parse("0").name, "0");
    }
}

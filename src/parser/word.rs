//! Word parser.
//!
//! Re-scans the raw text of a word token into `WordPart`s: quoting,
//! `$…` expansions, command/arithmetic/process substitution, globs and
//! extglobs, brace expansion and tilde prefixes. `${…}` interiors are
//! handed to the parameter-expansion parser, `$(…)` bodies back to the
//! command parser, `$((…))` to the arithmetic parser.

use crate::ast::types::{
    BraceItem, ParameterExpansion, ProcessSubDirection, Word, WordPart,
};
use crate::parser::arith::parse_arithmetic;
use crate::parser::expansion::parse_braced_expansion;
use crate::parser::{parse_nested, ParseError};

/// Context flags steering word-part recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordFlags {
    /// Word sits on the right-hand side of an assignment: tilde after
    /// `=`/`:` expands, brace expansion is off.
    pub is_assignment: bool,
    /// Right-hand side of `=~`: backslash escapes keep their backslash so
    /// the regex engine sees them.
    pub in_regex: bool,
    /// Brace expansion disabled ([[ ]], case patterns, assignment values).
    pub no_brace: bool,
    /// Here-document body: only `$`, backtick and `\$ \` \\` escapes are
    /// special; quotes are literal characters.
    pub heredoc: bool,
    /// Inside a `${…}` operation word: `\}` is an escaped brace.
    pub in_param_word: bool,
}

/// Parse raw word text using the quote hints the lexer attached.
pub fn parse_word(value: &str, quoted: bool, single_quoted: bool, flags: WordFlags) -> Result<Word, ParseError> {
    if single_quoted {
        return Ok(Word::new(vec![WordPart::SingleQuoted(value.to_string())]));
    }
    if quoted {
        return Ok(Word::new(vec![WordPart::DoubleQuoted(parse_double_quoted_inner(value)?)]));
    }
    Ok(Word::new(parse_word_parts(value, flags)?))
}

pub fn parse_word_parts(value: &str, flags: WordFlags) -> Result<Vec<WordPart>, ParseError> {
    let chars: Vec<char> = value.chars().collect();
    let mut parts: Vec<WordPart> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    macro_rules! flush {
        () => {
            if !literal.is_empty() {
                parts.push(WordPart::Literal(std::mem::take(&mut literal)));
            }
        };
    }

    while i < chars.len() {
        let c = chars[i];

        if flags.heredoc {
            match c {
                '\\' if matches!(chars.get(i + 1), Some(&'$') | Some(&'`') | Some(&'\\')) => {
                    literal.push(chars[i + 1]);
                    i += 2;
                }
                '\\' if chars.get(i + 1) == Some(&'\n') => {
                    i += 2;
                }
                '$' => {
                    flush!();
                    let (part, next) = parse_dollar(&chars, i, flags)?;
                    match part {
                        Some(p) => parts.push(p),
                        None => literal.push('$'),
                    }
                    i = next;
                }
                '`' => {
                    flush!();
                    let (part, next) = parse_backquoted(&chars, i)?;
                    parts.push(part);
                    i = next;
                }
                _ => {
                    literal.push(c);
                    i += 1;
                }
            }
            continue;
        }

        match c {
            '\\' => {
                flush!();
                match chars.get(i + 1) {
                    Some(&'\n') => i += 2,
                    Some(&next) => {
                        if flags.in_regex {
                            parts.push(WordPart::Escaped(format!("\\{}", next)));
                        } else {
                            parts.push(WordPart::Escaped(next.to_string()));
                        }
                        i += 2;
                    }
                    None => {
                        literal.push('\\');
                        i += 1;
                    }
                }
            }
            '\'' => {
                flush!();
                let close = find_single_quote_end(&chars, i + 1)
                    .ok_or_else(|| ParseError::message("unterminated single quote"))?;
                parts.push(WordPart::SingleQuoted(chars[i + 1..close].iter().collect()));
                i = close + 1;
            }
            '"' => {
                flush!();
                let close = find_double_quote_end(&chars, i + 1)
                    .ok_or_else(|| ParseError::message("unterminated double quote"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                parts.push(WordPart::DoubleQuoted(parse_double_quoted_inner(&inner)?));
                i = close + 1;
            }
            '$' => {
                flush!();
                let (part, next) = parse_dollar(&chars, i, flags)?;
                match part {
                    Some(p) => parts.push(p),
                    None => literal.push('$'),
                }
                i = next;
            }
            '`' => {
                flush!();
                let (part, next) = parse_backquoted(&chars, i)?;
                parts.push(part);
                i = next;
            }
            '~' if tilde_position(&parts, &literal, i, flags) => {
                let end = tilde_end(&chars, i, flags);
                let stop = chars.get(end).copied();
                if stop.is_none() || stop == Some('/') || (flags.is_assignment && stop == Some(':')) {
                    flush!();
                    let user: String = chars[i + 1..end].iter().collect();
                    parts.push(WordPart::Tilde(if user.is_empty() { None } else { Some(user) }));
                    i = end;
                } else {
                    literal.push('~');
                    i += 1;
                }
            }
            '<' | '>' if chars.get(i + 1) == Some(&'(') => {
                flush!();
                let close = find_paren_end(&chars, i + 1)
                    .ok_or_else(|| ParseError::message("unterminated process substitution"))?;
                let body: String = chars[i + 2..close].iter().collect();
                let direction = if c == '<' { ProcessSubDirection::Read } else { ProcessSubDirection::Write };
                parts.push(WordPart::ProcessSub { direction, body: parse_nested(&body)? });
                i = close + 1;
            }
            '@' | '+' | '!' if chars.get(i + 1) == Some(&'(') && !flags.in_regex => {
                flush!();
                let close = find_paren_end(&chars, i + 1)
                    .ok_or_else(|| ParseError::message("unterminated extended glob pattern"))?;
                parts.push(WordPart::Glob(chars[i..=close].iter().collect()));
                i = close + 1;
            }
            '*' | '?' if !flags.in_regex => {
                flush!();
                // `*(` / `?(` start an extglob group; a bare run is a glob.
                if chars.get(i + 1) == Some(&'(') {
                    let close = find_paren_end(&chars, i + 1)
                        .ok_or_else(|| ParseError::message("unterminated extended glob pattern"))?;
                    parts.push(WordPart::Glob(chars[i..=close].iter().collect()));
                    i = close + 1;
                } else {
                    let mut j = i;
                    while matches!(chars.get(j), Some(&'*') | Some(&'?')) && chars.get(j + 1) != Some(&'(') {
                        j += 1;
                    }
                    parts.push(WordPart::Glob(chars[i..j].iter().collect()));
                    i = j;
                }
            }
            '[' if !flags.in_regex => {
                if let Some(close) = find_char_class_end(&chars, i) {
                    flush!();
                    parts.push(WordPart::Glob(chars[i..=close].iter().collect()));
                    i = close + 1;
                } else {
                    literal.push('[');
                    i += 1;
                }
            }
            '{' if !flags.no_brace && !flags.is_assignment => {
                if let Some((item_parts, next)) = try_parse_brace(&chars, i, flags)? {
                    flush!();
                    parts.push(WordPart::Brace(item_parts));
                    i = next;
                } else {
                    literal.push('{');
                    i += 1;
                }
            }
            '}' if flags.in_param_word => {
                literal.push('}');
                i += 1;
            }
            _ => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        parts.push(WordPart::Literal(literal));
    }
    Ok(parts)
}

/// Parse the contents of a double-quoted span: `\$ \` \" \\ \<newline>`
/// drop the backslash, other escapes stay literal, `$…` and backticks
/// expand, everything else is literal text.
pub fn parse_double_quoted_inner(value: &str) -> Result<Vec<WordPart>, ParseError> {
    let chars: Vec<char> = value.chars().collect();
    let mut parts: Vec<WordPart> = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => match chars.get(i + 1).copied() {
                Some(next) if matches!(next, '$' | '`' | '"' | '\\') => {
                    if !literal.is_empty() {
                        parts.push(WordPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(WordPart::Escaped(next.to_string()));
                    i += 2;
                }
                Some('\n') => i += 2,
                _ => {
                    literal.push('\\');
                    i += 1;
                }
            },
            '$' => {
                if !literal.is_empty() {
                    parts.push(WordPart::Literal(std::mem::take(&mut literal)));
                }
                let (part, next) = parse_dollar(&chars, i, WordFlags::default())?;
                match part {
                    Some(p) => parts.push(p),
                    None => literal.push('$'),
                }
                i = next;
            }
            '`' => {
                if !literal.is_empty() {
                    parts.push(WordPart::Literal(std::mem::take(&mut literal)));
                }
                let (part, next) = parse_backquoted(&chars, i)?;
                parts.push(part);
                i = next;
            }
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        parts.push(WordPart::Literal(literal));
    }
    Ok(parts)
}

/// Parse a `$…` construct starting at `i` (pointing at the `$`).
/// Returns `(None, i+1)` when the dollar is literal.
fn parse_dollar(chars: &[char], i: usize, flags: WordFlags) -> Result<(Option<WordPart>, usize), ParseError> {
    match chars.get(i + 1).copied() {
        Some('\'') => {
            let close = find_ansi_quote_end(chars, i + 2)
                .ok_or_else(|| ParseError::message("unterminated $'…' quote"))?;
            let inner: String = chars[i + 2..close].iter().collect();
            Ok((Some(WordPart::SingleQuoted(decode_ansi_c(&inner))), close + 1))
        }
        Some('"') => {
            let close = find_double_quote_end(chars, i + 2)
                .ok_or_else(|| ParseError::message("unterminated $\"…\" quote"))?;
            let inner: String = chars[i + 2..close].iter().collect();
            Ok((Some(WordPart::DoubleQuoted(parse_double_quoted_inner(&inner)?)), close + 1))
        }
        Some('{') => {
            let close = find_brace_end(chars, i + 1)
                .ok_or_else(|| ParseError::message("unterminated parameter expansion"))?;
            let inner: String = chars[i + 2..close].iter().collect();
            let expansion = parse_braced_expansion(&inner)?;
            Ok((Some(WordPart::Parameter(expansion)), close + 1))
        }
        Some('(') => {
            if chars.get(i + 2) == Some(&'(') && dollar_dparen_is_arith(chars, i + 3) {
                // $(( … )) — the matching close is the `))` pair.
                let close = find_arith_end(chars, i + 3)
                    .ok_or_else(|| ParseError::message("unterminated arithmetic expansion"))?;
                let text: String = chars[i + 3..close].iter().collect();
                let expression = parse_arithmetic(&text);
                return Ok((Some(WordPart::ArithSub(expression)), close + 2));
            }
            let close = find_paren_end(chars, i + 1)
                .ok_or_else(|| ParseError::message("unterminated command substitution"))?;
            let body: String = chars[i + 2..close].iter().collect();
            Ok((Some(WordPart::CommandSub { body: parse_nested(&body)?, backquoted: false }), close + 1))
        }
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            let mut j = i + 1;
            while matches!(chars.get(j), Some(ch) if ch.is_ascii_alphanumeric() || *ch == '_') {
                j += 1;
            }
            let name: String = chars[i + 1..j].iter().collect();
            Ok((Some(WordPart::Parameter(ParameterExpansion::plain(name))), j))
        }
        Some(c) if c.is_ascii_digit() => {
            // Positional: a single digit; $12 is ${1}2.
            Ok((Some(WordPart::Parameter(ParameterExpansion::plain(c.to_string()))), i + 2))
        }
        Some(c) if "@*#?$!-".contains(c) => {
            let _ = flags;
            Ok((Some(WordPart::Parameter(ParameterExpansion::plain(c.to_string()))), i + 2))
        }
        _ => Ok((None, i + 1)),
    }
}

/// `` `cmd` `` — unescape ``\` \$ \\ `` then parse the body.
fn parse_backquoted(chars: &[char], i: usize) -> Result<(WordPart, usize), ParseError> {
    let mut j = i + 1;
    let mut body = String::new();
    loop {
        match chars.get(j).copied() {
            Some('`') => break,
            Some('\\') if matches!(chars.get(j + 1), Some(&'`') | Some(&'$') | Some(&'\\')) => {
                body.push(chars[j + 1]);
                j += 2;
            }
            Some(c) => {
                body.push(c);
                j += 1;
            }
            None => return Err(ParseError::message("unterminated backquote")),
        }
    }
    Ok((WordPart::CommandSub { body: parse_nested(&body)?, backquoted: true }, j + 1))
}

fn tilde_position(parts: &[WordPart], literal: &str, i: usize, flags: WordFlags) -> bool {
    if i == 0 && parts.is_empty() && literal.is_empty() {
        return true;
    }
    if flags.is_assignment {
        if let Some(prev) = literal.chars().last() {
            return prev == ':' || prev == '=';
        }
    }
    false
}

fn tilde_end(chars: &[char], start: usize, flags: WordFlags) -> usize {
    let mut i = start + 1;
    while let Some(&c) = chars.get(i) {
        if c == '/' || (flags.is_assignment && c == ':') {
            break;
        }
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
            i += 1;
        } else {
            break;
        }
    }
    i
}

// =============================================================================
// Scanners
// =============================================================================

fn find_single_quote_end(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len()).find(|&j| chars[j] == '\'')
}

/// Closing quote of `$'…'`; backslash escapes the next character.
fn find_ansi_quote_end(chars: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\'' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

/// Closing `"` of a double-quoted span, skipping escapes and embedded
/// `$(…)`, `${…}` and backtick constructs (which may contain quotes).
fn find_double_quote_end(chars: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '"' => return Some(j),
            '$' => match chars.get(j + 1) {
                Some(&'(') => {
                    j = find_paren_end(chars, j + 1)? + 1;
                }
                Some(&'{') => {
                    j = find_brace_end(chars, j + 1)? + 1;
                }
                _ => j += 1,
            },
            '`' => {
                j += 1;
                while j < chars.len() && chars[j] != '`' {
                    if chars[j] == '\\' {
                        j += 1;
                    }
                    j += 1;
                }
                j += 1;
            }
            _ => j += 1,
        }
    }
    None
}

/// Matching `)` for the `(` at `open`, quote- and nesting-aware.
pub fn find_paren_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    let mut depth = 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 1,
            '\'' => {
                j = find_single_quote_end(chars, j + 1)?;
            }
            '"' => {
                j = find_double_quote_end(chars, j + 1)?;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

/// Matching `}` for the `{` at `open`, quote- and nesting-aware.
pub fn find_brace_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    let mut depth = 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 1,
            '\'' => {
                j = find_single_quote_end(chars, j + 1)?;
            }
            '"' => {
                j = find_double_quote_end(chars, j + 1)?;
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

/// For `$((…))`: true when the first unmatched `)` is directly followed by
/// another `)` — otherwise `$( (…) …)` is nested subshells.
fn dollar_dparen_is_arith(chars: &[char], from: usize) -> bool {
    let mut j = from;
    let mut depth = 0usize;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 1,
            '\'' => match find_single_quote_end(chars, j + 1) {
                Some(end) => j = end,
                None => return true,
            },
            '(' => depth += 1,
            ')' => {
                if depth == 0 {
                    return chars.get(j + 1) == Some(&')');
                }
                depth -= 1;
            }
            _ => {}
        }
        j += 1;
    }
    true
}

/// Index of the first `)` of the closing `))` pair.
fn find_arith_end(chars: &[char], from: usize) -> Option<usize> {
    let mut j = from;
    let mut depth = 0usize;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 1,
            '(' => depth += 1,
            ')' => {
                if depth == 0 && chars.get(j + 1) == Some(&')') {
                    return Some(j);
                }
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
        j += 1;
    }
    None
}

/// Closing `]` of a glob character class, or `None` when the bracket is
/// not a valid class (expansion characters inside, unclosed, …).
pub fn find_char_class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if chars.get(j) == Some(&'^') || chars.get(j) == Some(&'!') {
        j += 1;
    }
    // A `]` directly after `[` or `[^` is literal.
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        match chars[j] {
            ']' => return Some(j),
            '"' | '$' | '`' | '\'' => return None,
            '[' if matches!(chars.get(j + 1), Some(&':') | Some(&'.') | Some(&'=')) => {
                let mark = chars[j + 1];
                let mut k = j + 2;
                while k + 1 < chars.len() {
                    if chars[k] == mark && chars[k + 1] == ']' {
                        break;
                    }
                    k += 1;
                }
                if k + 1 >= chars.len() {
                    return None;
                }
                j = k + 2;
            }
            '\\' => {
                // Escaped quotes mean shell escaping won; not a class.
                if matches!(chars.get(j + 1), Some(&'"') | Some(&'\'')) {
                    return None;
                }
                j += 2;
            }
            _ => j += 1,
        }
    }
    None
}

// =============================================================================
// Brace expansion
// =============================================================================

/// Attempt `{…}` at `open`. Returns the parsed items and the index past the
/// closing brace, or `None` when the braces are not an expansion.
fn try_parse_brace(
    chars: &[char],
    open: usize,
    flags: WordFlags,
) -> Result<Option<(Vec<BraceItem>, usize)>, ParseError> {
    let close = match find_brace_end(chars, open) {
        Some(c) => c,
        None => return Ok(None),
    };
    let inner: String = chars[open + 1..close].iter().collect();

    if let Some(range) = parse_brace_range(&inner) {
        return Ok(Some((vec![range], close + 1)));
    }

    let items = split_brace_items(&inner);
    if items.len() < 2 {
        return Ok(None);
    }
    let mut words = Vec::with_capacity(items.len());
    for item in items {
        let parts = parse_word_parts(&item, flags)?;
        words.push(BraceItem::Word(Word::new(parts)));
    }
    Ok(Some((words, close + 1)))
}

/// `{1..5}`, `{01..10..2}`, `{a..f}`.
fn parse_brace_range(inner: &str) -> Option<BraceItem> {
    let pieces: Vec<&str> = inner.split("..").collect();
    if pieces.len() != 2 && pieces.len() != 3 {
        return None;
    }
    let step: Option<i64> = if pieces.len() == 3 { Some(pieces[2].parse().ok()?) } else { None };

    if let (Ok(start), Ok(end)) = (pieces[0].parse::<i64>(), pieces[1].parse::<i64>()) {
        let pad = |s: &str| {
            let digits = s.strip_prefix('-').unwrap_or(s);
            if digits.len() > 1 && digits.starts_with('0') {
                s.len()
            } else {
                0
            }
        };
        let pad_width = pad(pieces[0]).max(pad(pieces[1]));
        return Some(BraceItem::NumberRange { start, end, step, pad_width });
    }

    let single_alpha = |s: &str| {
        let mut it = s.chars();
        match (it.next(), it.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
            _ => None,
        }
    };
    let start = single_alpha(pieces[0])?;
    let end = single_alpha(pieces[1])?;
    Some(BraceItem::CharRange { start, end, step })
}

/// Split brace-expansion content on top-level commas.
fn split_brace_items(inner: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut it = inner.chars().peekable();
    while let Some(c) = it.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(&next) = it.peek() {
                    current.push(next);
                    it.next();
                }
            }
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

// =============================================================================
// ANSI-C quoting
// =============================================================================

/// Decode the body of `$'…'`.
pub fn decode_ansi_c(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            'n' => {
                out.push('\n');
                i += 2;
            }
            't' => {
                out.push('\t');
                i += 2;
            }
            'r' => {
                out.push('\r');
                i += 2;
            }
            'a' => {
                out.push('\x07');
                i += 2;
            }
            'b' => {
                out.push('\x08');
                i += 2;
            }
            'e' | 'E' => {
                out.push('\x1b');
                i += 2;
            }
            'f' => {
                out.push('\x0c');
                i += 2;
            }
            'v' => {
                out.push('\x0b');
                i += 2;
            }
            '\\' => {
                out.push('\\');
                i += 2;
            }
            '\'' => {
                out.push('\'');
                i += 2;
            }
            '"' => {
                out.push('"');
                i += 2;
            }
            '?' => {
                out.push('?');
                i += 2;
            }
            'x' => {
                let hex: String = chars[i + 2..].iter().take(2).take_while(|c| c.is_ascii_hexdigit()).collect();
                if hex.is_empty() {
                    out.push_str("\\x");
                    i += 2;
                } else {
                    if let Ok(code) = u8::from_str_radix(&hex, 16) {
                        out.push(code as char);
                    }
                    i += 2 + hex.len();
                }
            }
            'u' => {
                let hex: String = chars[i + 2..].iter().take(4).take_while(|c| c.is_ascii_hexdigit()).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) if !hex.is_empty() => {
                        out.push(c);
                        i += 2 + hex.len();
                    }
                    _ => {
                        out.push_str("\\u");
                        i += 2;
                    }
                }
            }
            'U' => {
                let hex: String = chars[i + 2..].iter().take(8).take_while(|c| c.is_ascii_hexdigit()).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) if !hex.is_empty() => {
                        out.push(c);
                        i += 2 + hex.len();
                    }
                    _ => {
                        out.push_str("\\U");
                        i += 2;
                    }
                }
            }
            'c' => {
                // Control character: value of the next char masked to 5 bits.
                if let Some(&ctl) = chars.get(i + 2) {
                    out.push(((ctl as u8) & 0x1f) as char);
                    i += 3;
                } else {
                    out.push_str("\\c");
                    i += 2;
                }
            }
            '0'..='7' => {
                let octal: String =
                    chars[i + 1..].iter().take(3).take_while(|c| ('0'..='7').contains(*c)).collect();
                if let Ok(code) = u8::from_str_radix(&octal, 8) {
                    out.push(code as char);
                }
                i += 1 + octal.len();
            }
            other => {
                out.push('\\');
                out.push(other);
                i += 2;
            }
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(text: &str) -> Vec<WordPart> {
        parse_word_parts(text, WordFlags::default()).unwrap()
    }

    #[test]
    fn plain_literal() {
        assert_eq!(parts("hello"), vec![WordPart::Literal("hello".into())]);
    }

    #[test]
    fn simple_variable() {
        assert_eq!(
            parts("$HOME"),
            vec![WordPart::Parameter(ParameterExpansion::plain("HOME"))]
        );
    }

    #[test]
    fn variable_with_suffix() {
        assert_eq!(
            parts("$HOME/bin"),
            vec![
                WordPart::Parameter(ParameterExpansion::plain("HOME")),
                WordPart::Literal("/bin".into()),
            ]
        );
    }

    #[test]
    fn positional_is_single_digit() {
        assert_eq!(
            parts("$12"),
            vec![
                WordPart::Parameter(ParameterExpansion::plain("1")),
                WordPart::Literal("2".into()),
            ]
        );
    }

    #[test]
    fn escaped_dollar() {
        assert_eq!(
            parts("\\$x"),
            vec![WordPart::Escaped("$".into()), WordPart::Literal("x".into())]
        );
    }

    #[test]
    fn double_quoted_inner_parts() {
        let p = parts("\"a $b c\"");
        match &p[0] {
            WordPart::DoubleQuoted(inner) => {
                assert_eq!(inner.len(), 3);
                assert_eq!(inner[0], WordPart::Literal("a ".into()));
                assert!(matches!(&inner[1], WordPart::Parameter(pe) if pe.name == "b"));
            }
            other => panic!("expected DoubleQuoted, got {:?}", other),
        }
    }

    #[test]
    fn command_substitution() {
        let p = parts("$(echo hi)");
        assert!(matches!(&p[0], WordPart::CommandSub { backquoted: false, .. }));
    }

    #[test]
    fn backquoted_substitution() {
        let p = parts("`echo hi`");
        assert!(matches!(&p[0], WordPart::CommandSub { backquoted: true, .. }));
    }

    #[test]
    fn arithmetic_expansion() {
        let p = parts("$((1 + 2))");
        assert!(matches!(&p[0], WordPart::ArithSub(_)));
    }

    #[test]
    fn dollar_dparen_subshell_is_command_sub() {
        let p = parts("$((echo a); echo b)");
        assert!(matches!(&p[0], WordPart::CommandSub { .. }));
    }

    #[test]
    fn glob_parts() {
        assert_eq!(
            parts("*.txt"),
            vec![WordPart::Glob("*".into()), WordPart::Literal(".txt".into())]
        );
        assert_eq!(
            parts("a?b"),
            vec![
                WordPart::Literal("a".into()),
                WordPart::Glob("?".into()),
                WordPart::Literal("b".into()),
            ]
        );
    }

    #[test]
    fn character_class_glob() {
        assert_eq!(
            parts("[abc].txt"),
            vec![WordPart::Glob("[abc]".into()), WordPart::Literal(".txt".into())]
        );
    }

    #[test]
    fn invalid_class_stays_literal() {
        assert_eq!(parts("a[b"), vec![WordPart::Literal("a[b".into())]);
    }

    #[test]
    fn extglob_part() {
        assert_eq!(parts("@(a|b)"), vec![WordPart::Glob("@(a|b)".into())]);
        assert_eq!(parts("!(x)"), vec![WordPart::Glob("!(x)".into())]);
    }

    #[test]
    fn tilde_at_word_start() {
        assert_eq!(
            parts("~/docs"),
            vec![WordPart::Tilde(None), WordPart::Literal("/docs".into())]
        );
        assert_eq!(
            parts("~alice/docs"),
            vec![WordPart::Tilde(Some("alice".into())), WordPart::Literal("/docs".into())]
        );
    }

    #[test]
    fn tilde_mid_word_is_literal() {
        assert_eq!(parts("a~b"), vec![WordPart::Literal("a~b".into())]);
    }

    #[test]
    fn tilde_after_colon_in_assignment() {
        let flags = WordFlags { is_assignment: true, no_brace: true, ..Default::default() };
        let p = parse_word_parts("/bin:~/bin", flags).unwrap();
        assert_eq!(
            p,
            vec![
                WordPart::Literal("/bin:".into()),
                WordPart::Tilde(None),
                WordPart::Literal("/bin".into()),
            ]
        );
    }

    #[test]
    fn brace_list() {
        let p = parts("{a,b,c}");
        match &p[0] {
            WordPart::Brace(items) => assert_eq!(items.len(), 3),
            other => panic!("expected Brace, got {:?}", other),
        }
    }

    #[test]
    fn brace_numeric_range_with_padding() {
        let p = parts("{01..10}");
        match &p[0] {
            WordPart::Brace(items) => {
                assert_eq!(
                    items[0],
                    BraceItem::NumberRange { start: 1, end: 10, step: None, pad_width: 2 }
                );
            }
            other => panic!("expected Brace, got {:?}", other),
        }
    }

    #[test]
    fn brace_char_range() {
        let p = parts("{a..e..2}");
        match &p[0] {
            WordPart::Brace(items) => {
                assert_eq!(items[0], BraceItem::CharRange { start: 'a', end: 'e', step: Some(2) });
            }
            other => panic!("expected Brace, got {:?}", other),
        }
    }

    #[test]
    fn single_item_braces_are_literal() {
        assert_eq!(parts("{abc}"), vec![WordPart::Literal("{abc}".into())]);
    }

    #[test]
    fn process_substitution_part() {
        let p = parts("<(sort f)");
        assert!(matches!(&p[0], WordPart::ProcessSub { direction: ProcessSubDirection::Read, .. }));
        let p = parts(">(tee log)");
        assert!(matches!(&p[0], WordPart::ProcessSub { direction: ProcessSubDirection::Write, .. }));
    }

    #[test]
    fn ansi_c_basics() {
        assert_eq!(decode_ansi_c("a\\nb"), "a\nb");
        assert_eq!(decode_ansi_c("\\t"), "\t");
        assert_eq!(decode_ansi_c("\\x41"), "A");
        assert_eq!(decode_ansi_c("\\u00e9"), "é");
        assert_eq!(decode_ansi_c("\\101"), "A");
        assert_eq!(decode_ansi_c("\\ca"), "\u{1}");
    }

    #[test]
    fn ansi_c_word_part() {
        let p = parts("$'a\\tb'");
        assert_eq!(p, vec![WordPart::SingleQuoted("a\tb".into())]);
    }

    #[test]
    fn regex_flag_keeps_backslash() {
        let flags = WordFlags { in_regex: true, ..Default::default() };
        let p = parse_word_parts("\\.", flags).unwrap();
        assert_eq!(p, vec![WordPart::Escaped("\\.".into())]);
    }

    #[test]
    fn heredoc_mode_keeps_quotes_literal() {
        let flags = WordFlags { heredoc: true, ..Default::default() };
        let p = parse_word_parts("say 'hi' to $USER", flags).unwrap();
        assert_eq!(p[0], WordPart::Literal("say 'hi' to ".into()));
        assert!(matches!(&p[1], WordPart::Parameter(pe) if pe.name == "USER"));
    }

    #[test]
    fn special_parameters() {
        for special in ["@", "*", "#", "?", "$", "!", "-", "_"] {
            let p = parts(&format!("${}", special));
            assert!(matches!(&p[0], WordPart::Parameter(pe) if pe.name == special), "${special}");
        }
    }
}

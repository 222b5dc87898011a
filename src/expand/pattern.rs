//! Shell pattern compiler.
//!
//! Translates glob / extglob patterns into `regex_lite` source. One
//! compiler backs case patterns, `[[ == ]]`, `${v#…}`-family operations
//! and filesystem globbing. In pattern strings, `\x` always means a
//! literal `x`.
//!
//! `!(…)` has no lookahead-free general translation; a pattern that is a
//! single negated group is matched by negating the inner match, and an
//! embedded negated group degrades to `.*`.

use regex_lite::Regex;

#[derive(Debug, Clone, Copy)]
pub struct PatternOptions {
    /// Recognize extglob operators.
    pub extglob: bool,
    /// `*`/`?` refuse to cross `/` (filename matching).
    pub for_paths: bool,
    /// Compile `*` lazily (`.*?`) for shortest-match removal.
    pub lazy_star: bool,
    pub case_insensitive: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self { extglob: false, for_paths: false, lazy_star: false, case_insensitive: false }
    }
}

/// Escape text so the pattern compiler treats every character literally.
pub fn escape_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "*?[]\\()|!@+{}^$.".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Does the pattern contain an active (unescaped) glob operator?
pub fn has_glob_chars(pattern: &str, extglob: bool) -> bool {
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '*' | '?' | '[' => return true,
            '@' | '+' | '!' if extglob && chars.get(i + 1) == Some(&'(') => return true,
            _ => i += 1,
        }
    }
    false
}

/// Match `text` against a shell pattern. Anchored at both ends.
pub fn matches_pattern(text: &str, pattern: &str, opts: &PatternOptions) -> bool {
    // Whole-pattern negation gets special treatment (no lookahead).
    if opts.extglob {
        if let Some(inner) = whole_negated_group(pattern) {
            let inner_opts = PatternOptions { for_paths: false, ..*opts };
            let any = inner
                .split_branches()
                .iter()
                .any(|branch| matches_pattern(text, branch, &inner_opts));
            return !any;
        }
    }
    match compile_anchored(pattern, opts) {
        Some(regex) => regex.is_match(text),
        None => false,
    }
}

/// Compile to an anchored regex (`^…$`).
pub fn compile_anchored(pattern: &str, opts: &PatternOptions) -> Option<Regex> {
    let source = pattern_to_regex(pattern, opts)?;
    let prefix = if opts.case_insensitive { "(?is)" } else { "(?s)" };
    Regex::new(&format!("{}^{}$", prefix, source)).ok()
}

struct NegatedInner {
    body: String,
}

impl NegatedInner {
    fn split_branches(&self) -> Vec<String> {
        let chars: Vec<char> = self.body.chars().collect();
        let mut branches = Vec::new();
        let mut current = String::new();
        let mut depth = 0usize;
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '\\' => {
                    current.push(chars[i]);
                    if i + 1 < chars.len() {
                        current.push(chars[i + 1]);
                    }
                    i += 2;
                    continue;
                }
                '(' => {
                    depth += 1;
                    current.push('(');
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(')');
                }
                '|' if depth == 0 => {
                    branches.push(std::mem::take(&mut current));
                    i += 1;
                    continue;
                }
                c => current.push(c),
            }
            i += 1;
        }
        branches.push(current);
        branches
    }
}

/// `!(…)` covering the entire pattern.
fn whole_negated_group(pattern: &str) -> Option<NegatedInner> {
    let chars: Vec<char> = pattern.chars().collect();
    if chars.len() < 3 || chars[0] != '!' || chars[1] != '(' {
        return None;
    }
    let mut depth = 1;
    let mut i = 2;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }
    if depth == 0 && i == chars.len() - 1 {
        Some(NegatedInner { body: chars[2..i].iter().collect() })
    } else {
        None
    }
}

/// Translate a shell pattern into regex source (unanchored).
pub fn pattern_to_regex(pattern: &str, opts: &PatternOptions) -> Option<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    translate(&chars, &mut 0, &mut out, opts, false)?;
    Some(out)
}

fn regex_escape_char(c: char, out: &mut String) {
    if c.is_ascii_alphanumeric() || c == '_' || c == '/' || c == ' ' {
        out.push(c);
    } else {
        out.push('\\');
        out.push(c);
    }
}

/// Recursive translator; `in_group` stops at an unmatched `)`.
fn translate(
    chars: &[char],
    i: &mut usize,
    out: &mut String,
    opts: &PatternOptions,
    in_group: bool,
) -> Option<()> {
    let any = if opts.for_paths { "[^/]" } else { "." };
    while *i < chars.len() {
        let c = chars[*i];
        match c {
            '\\' => {
                *i += 1;
                if *i < chars.len() {
                    regex_escape_char(chars[*i], out);
                    *i += 1;
                } else {
                    out.push_str("\\\\");
                }
            }
            '*' => {
                // `**` under globstar crosses slashes; callers that walk
                // path segments handle `**` before compiling.
                if opts.extglob && chars.get(*i + 1) == Some(&'(') {
                    *i += 2;
                    out.push_str("(?:");
                    translate_group(chars, i, out, opts)?;
                    out.push_str(")*");
                } else {
                    while chars.get(*i) == Some(&'*') && !(opts.extglob && chars.get(*i + 1) == Some(&'(')) {
                        *i += 1;
                    }
                    out.push_str(any);
                    out.push('*');
                    if opts.lazy_star {
                        out.push('?');
                    }
                }
            }
            '?' => {
                if opts.extglob && chars.get(*i + 1) == Some(&'(') {
                    *i += 2;
                    out.push_str("(?:");
                    translate_group(chars, i, out, opts)?;
                    out.push_str(")?");
                } else {
                    out.push_str(any);
                    *i += 1;
                }
            }
            '@' if opts.extglob && chars.get(*i + 1) == Some(&'(') => {
                *i += 2;
                out.push_str("(?:");
                translate_group(chars, i, out, opts)?;
                out.push(')');
            }
            '+' if opts.extglob && chars.get(*i + 1) == Some(&'(') => {
                *i += 2;
                out.push_str("(?:");
                translate_group(chars, i, out, opts)?;
                out.push_str(")+");
            }
            '!' if opts.extglob && chars.get(*i + 1) == Some(&'(') => {
                // Embedded negation degrades to a wildcard.
                *i += 2;
                let mut scratch = String::new();
                translate_group(chars, i, &mut scratch, opts)?;
                out.push_str(".*");
            }
            '[' => {
                if let Some(end) = class_end(chars, *i) {
                    translate_class(&chars[*i..=end], out);
                    *i = end + 1;
                } else {
                    out.push_str("\\[");
                    *i += 1;
                }
            }
            ')' if in_group => return Some(()),
            '|' if in_group => {
                out.push('|');
                *i += 1;
            }
            _ => {
                regex_escape_char(c, out);
                *i += 1;
            }
        }
    }
    if in_group {
        // Unterminated group.
        return None;
    }
    Some(())
}

/// Translate the interior of an extglob group up to its closing `)`.
fn translate_group(chars: &[char], i: &mut usize, out: &mut String, opts: &PatternOptions) -> Option<()> {
    translate(chars, i, out, opts, true)?;
    if chars.get(*i) == Some(&')') {
        *i += 1;
        Some(())
    } else {
        None
    }
}

/// Closing `]` for the class opening at `open`.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if matches!(chars.get(j), Some(&'!') | Some(&'^')) {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        match chars[j] {
            ']' => return Some(j),
            '[' if matches!(chars.get(j + 1), Some(&':') | Some(&'.') | Some(&'=')) => {
                let mark = chars[j + 1];
                let mut k = j + 2;
                loop {
                    if k + 1 >= chars.len() {
                        return None;
                    }
                    if chars[k] == mark && chars[k + 1] == ']' {
                        break;
                    }
                    k += 1;
                }
                j = k + 2;
            }
            '\\' => j += 2,
            _ => j += 1,
        }
    }
    None
}

/// `[abc]`, `[!a-z]`, `[[:alpha:]]` → regex class.
fn translate_class(class: &[char], out: &mut String) {
    out.push('[');
    let mut j = 1;
    if matches!(class.get(1), Some(&'!') | Some(&'^')) {
        out.push('^');
        j = 2;
    }
    while j < class.len() - 1 {
        match class[j] {
            '[' if matches!(class.get(j + 1), Some(&':')) => {
                let rest: String = class[j + 2..].iter().collect();
                if let Some(end) = rest.find(":]") {
                    let name = &rest[..end];
                    out.push_str(posix_class(name));
                    j += 2 + end + 2;
                    continue;
                }
                out.push_str("\\[");
                j += 1;
            }
            '\\' => {
                out.push('\\');
                if j + 1 < class.len() - 1 {
                    out.push(class[j + 1]);
                    j += 2;
                } else {
                    out.push('\\');
                    j += 1;
                }
            }
            c @ ('^' | ']') => {
                out.push('\\');
                out.push(c);
                j += 1;
            }
            c => {
                out.push(c);
                j += 1;
            }
        }
    }
    out.push(']');
}

fn posix_class(name: &str) -> &'static str {
    match name {
        "alpha" => "a-zA-Z",
        "digit" => "0-9",
        "alnum" => "a-zA-Z0-9",
        "upper" => "A-Z",
        "lower" => "a-z",
        "space" => " \\t\\n\\r\\x0b\\x0c",
        "blank" => " \\t",
        "punct" => "!-/:-@\\[-`{-~",
        "xdigit" => "0-9a-fA-F",
        "cntrl" => "\\x00-\\x1f\\x7f",
        "graph" => "!-~",
        "print" => " -~",
        "word" => "a-zA-Z0-9_",
        _ => "",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(text: &str, pattern: &str) -> bool {
        matches_pattern(text, pattern, &PatternOptions::default())
    }

    fn ext(text: &str, pattern: &str) -> bool {
        matches_pattern(text, pattern, &PatternOptions { extglob: true, ..Default::default() })
    }

    #[test]
    fn star_and_question() {
        assert!(glob("hello.txt", "*.txt"));
        assert!(!glob("hello.md", "*.txt"));
        assert!(glob("ab", "a?"));
        assert!(!glob("abc", "a?"));
        assert!(glob("anything", "*"));
        assert!(glob("", "*"));
    }

    #[test]
    fn star_crosses_dots() {
        assert!(glob("a.b.c", "a*c"));
    }

    #[test]
    fn path_mode_star_stops_at_slash() {
        let opts = PatternOptions { for_paths: true, ..Default::default() };
        assert!(matches_pattern("ab", "a*", &opts));
        assert!(!matches_pattern("a/b", "a*", &opts));
    }

    #[test]
    fn character_classes() {
        assert!(glob("cat", "[bc]at"));
        assert!(!glob("rat", "[bc]at"));
        assert!(glob("rat", "[!bc]at"));
        assert!(glob("x9", "x[0-9]"));
        assert!(glob("xa", "x[[:alpha:]]"));
        assert!(!glob("x9", "x[[:alpha:]]"));
    }

    #[test]
    fn literal_bracket_when_unclosed() {
        assert!(glob("a[b", "a[b"));
    }

    #[test]
    fn escaped_meta_is_literal() {
        assert!(glob("a*b", "a\\*b"));
        assert!(!glob("axb", "a\\*b"));
    }

    #[test]
    fn extglob_alternation() {
        assert!(ext("foo", "@(foo|bar)"));
        assert!(ext("bar", "@(foo|bar)"));
        assert!(!ext("baz", "@(foo|bar)"));
    }

    #[test]
    fn extglob_repetition() {
        assert!(ext("", "*(ab)"));
        assert!(ext("abab", "*(ab)"));
        assert!(ext("ab", "+(ab)"));
        assert!(!ext("", "+(ab)"));
        assert!(ext("x", "?(x)"));
        assert!(ext("", "?(x)"));
        assert!(!ext("xx", "?(x)"));
    }

    #[test]
    fn extglob_negation_whole_pattern() {
        assert!(ext("c.rs", "!(*.txt|*.md)"));
        assert!(!ext("a.txt", "!(*.txt|*.md)"));
        assert!(!ext("b.md", "!(*.txt|*.md)"));
    }

    #[test]
    fn extglob_nested() {
        assert!(ext("abcd", "a@(b@(c|x))d"));
        assert!(!ext("abxd", "a@(b@(c|y))d"));
    }

    #[test]
    fn extglob_disabled_is_literalish() {
        // Without extglob, "@(foo)" has no group meaning.
        assert!(!glob("foo", "@(foo)"));
        assert!(glob("@(foo)", "@(foo)"));
    }

    #[test]
    fn lazy_star_for_shortest_match() {
        let opts = PatternOptions { lazy_star: true, ..Default::default() };
        let regex =
            Regex::new(&format!("^{}", pattern_to_regex("a*", &opts).unwrap())).unwrap();
        let m = regex.find("axxx").unwrap();
        assert_eq!(m.as_str(), "a");
    }

    #[test]
    fn case_insensitive_option() {
        let opts = PatternOptions { case_insensitive: true, ..Default::default() };
        assert!(matches_pattern("README.TXT", "*.txt", &opts));
    }

    #[test]
    fn has_glob_chars_detection() {
        assert!(has_glob_chars("*.txt", false));
        assert!(has_glob_chars("a?b", false));
        assert!(has_glob_chars("[ab]", false));
        assert!(!has_glob_chars("plain", false));
        assert!(!has_glob_chars("\\*literal", false));
        assert!(has_glob_chars("!(x)", true));
        assert!(!has_glob_chars("!(x)", false));
    }

    #[test]
    fn escape_round_trip() {
        let escaped = escape_pattern("a*b?c[d]");
        assert!(matches_pattern("a*b?c[d]", &escaped, &PatternOptions::default()));
        assert!(!matches_pattern("aXbYc1", &escaped, &PatternOptions::default()));
    }
}

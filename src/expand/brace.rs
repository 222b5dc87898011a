//! Brace expansion.
//!
//! Runs before everything else: a word containing `Brace` parts expands
//! into the cartesian product of its alternatives. Ranges honor step and
//! zero-padding; the output size is capped by the execution limits.

use crate::ast::types::{BraceItem, Word, WordPart};
use crate::interp::error::LimitExceeded;
use crate::interp::limits::ExecutionLimits;

/// Expand every brace alternative in `word`, outside-in. Words without
/// brace parts come back unchanged as a single entry.
pub fn expand_braces(word: &Word, limits: &ExecutionLimits) -> Result<Vec<Word>, LimitExceeded> {
    let mut results = vec![Vec::new()];

    for part in &word.parts {
        match part {
            WordPart::Brace(items) => {
                let mut alternatives: Vec<Vec<WordPart>> = Vec::new();
                for item in items {
                    match item {
                        BraceItem::Word(inner) => {
                            // Nested braces expand recursively.
                            for nested in expand_braces(inner, limits)? {
                                alternatives.push(nested.parts);
                            }
                        }
                        BraceItem::NumberRange { start, end, step, pad_width } => {
                            for text in number_range(*start, *end, *step, *pad_width, limits)? {
                                alternatives.push(vec![WordPart::Literal(text)]);
                            }
                        }
                        BraceItem::CharRange { start, end, step } => {
                            for c in char_range(*start, *end, *step, limits)? {
                                alternatives.push(vec![WordPart::Literal(c.to_string())]);
                            }
                        }
                    }
                }
                limits.check_brace_items(results.len().saturating_mul(alternatives.len().max(1)))?;

                let mut next = Vec::with_capacity(results.len() * alternatives.len());
                for prefix in &results {
                    for alt in &alternatives {
                        let mut combined = prefix.clone();
                        combined.extend(alt.iter().cloned());
                        next.push(combined);
                    }
                }
                results = next;
            }
            other => {
                for parts in &mut results {
                    parts.push(other.clone());
                }
            }
        }
    }

    Ok(results.into_iter().map(Word::new).collect())
}

fn number_range(
    start: i64,
    end: i64,
    step: Option<i64>,
    pad_width: usize,
    limits: &ExecutionLimits,
) -> Result<Vec<String>, LimitExceeded> {
    let stride = match step {
        Some(0) | None => 1,
        Some(s) => s.abs(),
    };
    let ascending = start <= end;
    let span = (end - start).unsigned_abs() / stride as u64 + 1;
    limits.check_brace_items(span as usize)?;

    let mut out = Vec::with_capacity(span as usize);
    let mut current = start;
    loop {
        let text = if pad_width > 0 {
            let sign = if current < 0 { "-" } else { "" };
            let digits = current.abs().to_string();
            let width = pad_width.saturating_sub(sign.len());
            format!("{}{:0>width$}", sign, digits, width = width)
        } else {
            current.to_string()
        };
        out.push(text);
        if ascending {
            current += stride;
            if current > end {
                break;
            }
        } else {
            current -= stride;
            if current < end {
                break;
            }
        }
    }
    Ok(out)
}

fn char_range(
    start: char,
    end: char,
    step: Option<i64>,
    limits: &ExecutionLimits,
) -> Result<Vec<char>, LimitExceeded> {
    let stride = match step {
        Some(0) | None => 1,
        Some(s) => s.abs() as u32,
    };
    let (a, b) = (start as u32, end as u32);
    let span = (a.abs_diff(b) / stride + 1) as usize;
    limits.check_brace_items(span)?;

    let mut out = Vec::with_capacity(span);
    if a <= b {
        let mut c = a;
        while c <= b {
            if let Some(ch) = char::from_u32(c) {
                out.push(ch);
            }
            c += stride;
        }
    } else {
        let mut c = a;
        loop {
            if let Some(ch) = char::from_u32(c) {
                out.push(ch);
            }
            if c < b + stride {
                break;
            }
            c -= stride;
        }
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::word::{parse_word_parts, WordFlags};

    fn expand(text: &str) -> Vec<String> {
        let word = Word::new(parse_word_parts(text, WordFlags::default()).unwrap());
        let limits = ExecutionLimits::default();
        expand_braces(&word, &limits)
            .unwrap()
            .into_iter()
            .map(|w| {
                w.parts
                    .iter()
                    .map(|p| match p {
                        WordPart::Literal(s) => s.clone(),
                        WordPart::SingleQuoted(s) => s.clone(),
                        other => panic!("unexpected part {:?}", other),
                    })
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn simple_list() {
        assert_eq!(expand("{a,b,c}"), vec!["a", "b", "c"]);
    }

    #[test]
    fn prefix_and_suffix() {
        assert_eq!(expand("x{a,b}y"), vec!["xay", "xby"]);
    }

    #[test]
    fn cartesian_product() {
        assert_eq!(expand("{a,b}{1,2}"), vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn nested_braces() {
        assert_eq!(expand("{a,{b,c},d}"), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn numeric_range() {
        assert_eq!(expand("{1..5}"), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(expand("{5..1}"), vec!["5", "4", "3", "2", "1"]);
    }

    #[test]
    fn numeric_range_with_step() {
        assert_eq!(expand("{1..10..3}"), vec!["1", "4", "7", "10"]);
        assert_eq!(expand("{10..1..3}"), vec!["10", "7", "4", "1"]);
    }

    #[test]
    fn zero_padded_range() {
        assert_eq!(expand("{01..03}"), vec!["01", "02", "03"]);
        assert_eq!(expand("{08..11}"), vec!["08", "09", "10", "11"]);
    }

    #[test]
    fn char_ranges() {
        assert_eq!(expand("{a..e}"), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(expand("{e..a..2}"), vec!["e", "c", "a"]);
    }

    #[test]
    fn no_braces_is_identity() {
        assert_eq!(expand("plain"), vec!["plain"]);
    }

    #[test]
    fn size_limit_enforced() {
        let word = Word::new(parse_word_parts("{1..100}", WordFlags::default()).unwrap());
        let limits = ExecutionLimits { max_brace_items: 50, ..Default::default() };
        assert!(expand_braces(&word, &limits).is_err());
    }
}

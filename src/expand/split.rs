//! IFS word splitting.
//!
//! Expanded words are sequences of segments labeled splittable or not:
//! quoted parts and literals join adjacent fields, unquoted expansion
//! results split on IFS. Whitespace IFS characters fold into one
//! delimiter; non-whitespace IFS characters each bound a field, with
//! empty fields preserved except a trailing one.

/// One expanded piece of a word, before field formation.
#[derive(Debug, Clone)]
pub struct Segment {
    /// The text this piece contributes.
    pub value: String,
    /// Pattern text for the glob stage: glob metacharacters are live
    /// here only where the source allowed them.
    pub pattern: String,
    /// Quoted pieces can anchor empty fields.
    pub quoted: bool,
    /// Subject to IFS splitting.
    pub splittable: bool,
}

impl Segment {
    pub fn quoted_text(value: impl Into<String>) -> Self {
        let value = value.into();
        let pattern = super::pattern::escape_pattern(&value);
        Self { value, pattern, quoted: true, splittable: false }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        let value = value.into();
        let pattern = super::pattern::escape_pattern(&value);
        Self { value, pattern, quoted: false, splittable: false }
    }

    pub fn expansion(value: impl Into<String>) -> Self {
        let value = value.into();
        Self { pattern: value.clone(), value, quoted: false, splittable: true }
    }

    pub fn glob(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        Self { value: pattern.clone(), pattern, quoted: false, splittable: false }
    }
}

/// A formed field: its text plus the parallel pattern text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Field {
    pub value: String,
    pub pattern: String,
}

impl Field {
    pub fn push_verbatim(&mut self, text: &str) {
        self.value.push_str(text);
        self.pattern.push_str(text);
    }

    fn push_pair(&mut self, value: &str, pattern: &str) {
        self.value.push_str(value);
        self.pattern.push_str(pattern);
    }

    fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct IfsSplit {
    pub pieces: Vec<String>,
    pub had_leading_delimiter: bool,
    pub had_trailing_delimiter: bool,
}

/// Split one string by IFS: whitespace members fold, non-whitespace
/// members delimit exactly one boundary each. A trailing empty field is
/// dropped but reported.
pub fn split_by_ifs(value: &str, ifs: &str) -> IfsSplit {
    if ifs.is_empty() {
        return IfsSplit {
            pieces: if value.is_empty() { Vec::new() } else { vec![value.to_string()] },
            had_leading_delimiter: false,
            had_trailing_delimiter: false,
        };
    }

    let chars: Vec<char> = value.chars().collect();
    let is_ifs = |c: char| ifs.contains(c);
    let is_ws = |c: char| is_ifs(c) && c.is_whitespace();
    let is_hard = |c: char| is_ifs(c) && !c.is_whitespace();

    let mut out = IfsSplit::default();
    let mut i = 0;

    out.had_leading_delimiter = chars.first().map(|&c| is_ifs(c)).unwrap_or(false);

    // Leading whitespace delimiters never make empty fields.
    while i < chars.len() && is_ws(chars[i]) {
        i += 1;
    }

    loop {
        if i >= chars.len() {
            break;
        }
        let mut piece = String::new();
        while i < chars.len() && !is_ifs(chars[i]) {
            piece.push(chars[i]);
            i += 1;
        }
        out.pieces.push(piece);
        if i >= chars.len() {
            break;
        }

        // One delimiter unit: ws* hard? ws*
        while i < chars.len() && is_ws(chars[i]) {
            i += 1;
        }
        if i < chars.len() && is_hard(chars[i]) {
            i += 1;
            while i < chars.len() && is_ws(chars[i]) {
                i += 1;
            }
        }
        if i >= chars.len() {
            out.had_trailing_delimiter = true;
            break;
        }
    }

    out
}

/// Form fields from segments, splitting only the splittable ones.
///
/// `$a"$b"` with `a="1 2"`, `b="3 4"` yields `1` and `23 4`: the first
/// fragment of a split joins the open field, the last opens the next
/// field, quoted text glues onto whatever field is open.
pub fn split_fields(segments: &[Segment], ifs: &str) -> Vec<Field> {
    if !segments.iter().any(|s| s.splittable) {
        let mut field = Field::default();
        let mut any_quoted = false;
        for segment in segments {
            field.push_pair(&segment.value, &segment.pattern);
            any_quoted |= segment.quoted;
        }
        if field.is_empty() && !any_quoted {
            return Vec::new();
        }
        return vec![field];
    }

    let mut fields: Vec<Field> = Vec::new();
    let mut current = Field::default();
    let mut field_open = false;
    let mut pending_break = false;
    let mut prev_quoted_empty = false;

    for segment in segments {
        if !segment.splittable {
            if pending_break {
                if segment.quoted && segment.value.is_empty() {
                    // A quoted empty after a trailing delimiter anchors
                    // its own empty field.
                    if field_open {
                        fields.push(std::mem::take(&mut current));
                    }
                    fields.push(Field::default());
                    current = Field::default();
                    field_open = false;
                    pending_break = false;
                    prev_quoted_empty = true;
                } else if !segment.value.is_empty() {
                    if field_open {
                        fields.push(std::mem::take(&mut current));
                    }
                    current = Field::default();
                    current.push_pair(&segment.value, &segment.pattern);
                    field_open = true;
                    pending_break = false;
                    prev_quoted_empty = false;
                }
            } else {
                current.push_pair(&segment.value, &segment.pattern);
                if segment.quoted || !segment.value.is_empty() {
                    field_open = true;
                }
                prev_quoted_empty = segment.quoted && segment.value.is_empty();
            }
            continue;
        }

        let split = split_by_ifs(&segment.value, ifs);

        if prev_quoted_empty && split.had_leading_delimiter && current.is_empty() {
            fields.push(std::mem::take(&mut current));
            field_open = false;
        }
        prev_quoted_empty = false;

        match split.pieces.len() {
            0 => {
                if split.had_trailing_delimiter || split.had_leading_delimiter {
                    pending_break = field_open;
                }
            }
            1 => {
                let piece = &split.pieces[0];
                if split.had_leading_delimiter && field_open && !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
                if pending_break {
                    if field_open {
                        fields.push(std::mem::take(&mut current));
                    }
                    pending_break = false;
                }
                current.push_pair(piece, piece);
                field_open = true;
                pending_break = split.had_trailing_delimiter;
            }
            _ => {
                if pending_break {
                    if field_open {
                        fields.push(std::mem::take(&mut current));
                    }
                    pending_break = false;
                }
                let mut pieces = split.pieces.into_iter();
                let first = pieces.next().unwrap();
                if split.had_leading_delimiter && field_open && !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
                current.push_pair(&first, &first);
                fields.push(std::mem::take(&mut current));

                let remaining: Vec<String> = pieces.collect();
                for piece in &remaining[..remaining.len() - 1] {
                    let mut field = Field::default();
                    field.push_pair(piece, piece);
                    fields.push(field);
                }
                let last = &remaining[remaining.len() - 1];
                current = Field::default();
                current.push_pair(last, last);
                field_open = true;
                pending_break = split.had_trailing_delimiter;
            }
        }
    }

    if !current.is_empty() || (field_open && !pending_break) {
        if !current.is_empty() || fields.is_empty() {
            fields.push(current);
        }
    }

    fields
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn values(fields: &[Field]) -> Vec<String> {
        fields.iter().map(|f| f.value.clone()).collect()
    }

    #[test]
    fn default_ifs_folds_whitespace() {
        let split = split_by_ifs("  a  b \t c ", " \t\n");
        assert_eq!(split.pieces, vec!["a", "b", "c"]);
        assert!(split.had_leading_delimiter);
        assert!(split.had_trailing_delimiter);
    }

    #[test]
    fn hard_delimiters_keep_empties() {
        let split = split_by_ifs("x:y::z", ":");
        assert_eq!(split.pieces, vec!["x", "y", "", "z"]);
    }

    #[test]
    fn leading_hard_delimiter_makes_empty_field() {
        let split = split_by_ifs(":a", ":");
        assert_eq!(split.pieces, vec!["", "a"]);
    }

    #[test]
    fn trailing_hard_delimiter_dropped() {
        let split = split_by_ifs("a:", ":");
        assert_eq!(split.pieces, vec!["a"]);
        assert!(split.had_trailing_delimiter);
    }

    #[test]
    fn mixed_whitespace_and_hard() {
        let split = split_by_ifs("a : b", ": ");
        assert_eq!(split.pieces, vec!["a", "b"]);
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        let split = split_by_ifs(" \t\n", " \t\n");
        assert!(split.pieces.is_empty());
    }

    #[test]
    fn empty_ifs_disables_splitting() {
        let split = split_by_ifs("a b c", "");
        assert_eq!(split.pieces, vec!["a b c"]);
    }

    #[test]
    fn no_splittable_segments_join() {
        let segments =
            vec![Segment::literal("hello"), Segment::quoted_text(" world")];
        assert_eq!(values(&split_fields(&segments, " \t\n")), vec!["hello world"]);
    }

    #[test]
    fn pure_empty_unquoted_word_vanishes() {
        let segments = vec![Segment::expansion("")];
        assert!(split_fields(&segments, " \t\n").is_empty());
    }

    #[test]
    fn quoted_empty_survives() {
        let segments = vec![Segment::quoted_text("")];
        assert_eq!(values(&split_fields(&segments, " \t\n")), vec![""]);
    }

    #[test]
    fn split_joins_quoted_suffix() {
        // $a"$b" with a="1 2" b="3 4" → ["1", "23 4"]
        let segments = vec![Segment::expansion("1 2"), Segment::quoted_text("3 4")];
        assert_eq!(values(&split_fields(&segments, " \t\n")), vec!["1", "23 4"]);
    }

    #[test]
    fn two_splittable_segments() {
        // $a$b with a="1 2" b="3 4" → ["1", "23", "4"]
        let segments = vec![Segment::expansion("1 2"), Segment::expansion("3 4")];
        assert_eq!(values(&split_fields(&segments, " \t\n")), vec!["1", "23", "4"]);
    }

    #[test]
    fn trailing_delimiter_breaks_next_join() {
        // $a"b" with a="x " → ["x", "b"]
        let segments = vec![Segment::expansion("x "), Segment::quoted_text("b")];
        assert_eq!(values(&split_fields(&segments, " \t\n")), vec!["x", "b"]);
    }

    #[test]
    fn leading_delimiter_detaches_from_prefix() {
        // "a"$b with b=" x" → ["a", "x"]
        let segments = vec![Segment::quoted_text("a"), Segment::expansion(" x")];
        assert_eq!(values(&split_fields(&segments, " \t\n")), vec!["a", "x"]);
    }

    #[test]
    fn literal_prefix_joins_first_fragment() {
        // pre$a with a="1 2" → ["pre1", "2"]
        let segments = vec![Segment::literal("pre"), Segment::expansion("1 2")];
        assert_eq!(values(&split_fields(&segments, " \t\n")), vec!["pre1", "2"]);
    }

    #[test]
    fn colon_ifs_scenario() {
        // IFS=:, $a with a="x:y::z" → [x] [y] [] [z]
        let segments = vec![Segment::expansion("x:y::z")];
        assert_eq!(values(&split_fields(&segments, ":")), vec!["x", "y", "", "z"]);
    }

    #[test]
    fn quoted_text_keeps_pattern_escaped() {
        let segments = vec![Segment::quoted_text("*")];
        let fields = split_fields(&segments, " \t\n");
        assert_eq!(fields[0].value, "*");
        assert_eq!(fields[0].pattern, "\\*");
    }

    #[test]
    fn expansion_keeps_pattern_live() {
        let segments = vec![Segment::expansion("*")];
        let fields = split_fields(&segments, " \t\n");
        assert_eq!(fields[0].pattern, "*");
    }
}

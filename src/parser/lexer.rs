//! Lexer.
//!
//! Splits shell source into a token stream. Words keep their raw text
//! (including embedded quotes and `$…` constructs) so the word parser can
//! re-scan them; a token that was entirely enclosed in one pair of quotes
//! is stripped and flagged instead. Here-document bodies are collected at
//! the first newline after the operator and attached to the `<<` token.

use std::collections::HashMap;

use lazy_static::lazy_static;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Eof,
    Newline,

    // Separators
    Semi,        // ;
    Amp,         // &
    DSemi,       // ;;
    SemiAnd,     // ;&
    DSemiAnd,    // ;;&

    // Connectives
    Pipe,    // |
    PipeAmp, // |&
    AndIf,   // &&
    OrIf,    // ||
    Bang,    // !

    // Redirections
    Less,      // <
    Great,     // >
    DGreat,    // >>
    DLess,     // <<
    DLessDash, // <<-
    TLess,     // <<<
    LessAnd,   // <&
    GreatAnd,  // >&
    LessGreat, // <>
    Clobber,   // >|
    AndGreat,  // &>
    AndDGreat, // &>>

    // Grouping
    LParen, // (
    RParen, // )
    LBrace, // {
    RBrace, // }

    // Compound delimiters
    CondStart, // [[
    CondEnd,   // ]]
    /// `((` — the token value carries the raw expression text up to the
    /// matching `))`.
    ArithStart,
    ArithEnd, // ))

    // Reserved words
    If,
    Then,
    Elif,
    Else,
    Fi,
    For,
    While,
    Until,
    Do,
    Done,
    Case,
    Esac,
    In,
    Function,
    Select,

    // Words
    Word,
    Name,       // valid identifier
    Number,     // digits directly before < or >
    Assignment, // NAME=…, NAME[sub]=…, NAME+=…
    FdVar,      // {name} directly before a redirection operator

    Comment,
}

impl TokenKind {
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            Self::If
                | Self::Then
                | Self::Elif
                | Self::Else
                | Self::Fi
                | Self::For
                | Self::While
                | Self::Until
                | Self::Do
                | Self::Done
                | Self::Case
                | Self::Esac
                | Self::In
                | Self::Function
                | Self::Select
        )
    }

    /// Tokens the command parser may treat as word material.
    pub fn is_wordlike(self) -> bool {
        matches!(self, Self::Word | Self::Name | Self::Number | Self::Assignment)
            || self.is_reserved()
    }

    pub fn is_redirect(self) -> bool {
        matches!(
            self,
            Self::Less
                | Self::Great
                | Self::DGreat
                | Self::DLess
                | Self::DLessDash
                | Self::TLess
                | Self::LessAnd
                | Self::GreatAnd
                | Self::LessGreat
                | Self::Clobber
                | Self::AndGreat
                | Self::AndDGreat
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// Whole token was double-quoted (quotes stripped).
    pub quoted: bool,
    /// Whole token was single-quoted (quotes stripped).
    pub single_quoted: bool,
    /// Body collected for a `<<` / `<<-` operator token.
    pub heredoc_body: Option<String>,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            start,
            end,
            line,
            column,
            quoted: false,
            single_quoted: false,
            heredoc_body: None,
        }
    }
}

/// Lexer failure, carrying the source position.
#[derive(Debug, Clone, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self { message: message.into(), line, column }
    }
}

#[derive(Debug, Clone)]
struct PendingHeredoc {
    delimiter: String,
    strip_tabs: bool,
    quoted: bool,
    /// Index of the `<<` token this body belongs to.
    token_index: usize,
}

lazy_static! {
    static ref RESERVED: HashMap<&'static str, TokenKind> = {
        let mut m = HashMap::new();
        m.insert("if", TokenKind::If);
        m.insert("then", TokenKind::Then);
        m.insert("elif", TokenKind::Elif);
        m.insert("else", TokenKind::Else);
        m.insert("fi", TokenKind::Fi);
        m.insert("for", TokenKind::For);
        m.insert("while", TokenKind::While);
        m.insert("until", TokenKind::Until);
        m.insert("do", TokenKind::Do);
        m.insert("done", TokenKind::Done);
        m.insert("case", TokenKind::Case);
        m.insert("esac", TokenKind::Esac);
        m.insert("in", TokenKind::In);
        m.insert("function", TokenKind::Function);
        m.insert("select", TokenKind::Select);
        m
    };
}

const THREE_CHAR_OPS: &[(&str, TokenKind)] = &[
    ("<<<", TokenKind::TLess),
    ("&>>", TokenKind::AndDGreat),
    (";;&", TokenKind::DSemiAnd),
];

const TWO_CHAR_OPS: &[(&str, TokenKind)] = &[
    ("&&", TokenKind::AndIf),
    ("||", TokenKind::OrIf),
    ("|&", TokenKind::PipeAmp),
    (">>", TokenKind::DGreat),
    ("<&", TokenKind::LessAnd),
    (">&", TokenKind::GreatAnd),
    ("<>", TokenKind::LessGreat),
    (">|", TokenKind::Clobber),
    ("&>", TokenKind::AndGreat),
    (";;", TokenKind::DSemi),
    (";&", TokenKind::SemiAnd),
    ("[[", TokenKind::CondStart),
    ("]]", TokenKind::CondEnd),
];

pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_metachar(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '|' | '&' | ';' | '(' | ')' | '<' | '>')
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    pending_heredocs: Vec<PendingHeredoc>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            pending_heredocs: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.input.len() {
            if !self.pending_heredocs.is_empty()
                && self.tokens.last().map(|t| t.kind) == Some(TokenKind::Newline)
            {
                self.collect_heredoc_bodies()?;
                continue;
            }

            self.skip_blanks();
            if self.pos >= self.input.len() {
                break;
            }

            if let Some(token) = self.next_token()? {
                self.tokens.push(token);
            }
        }

        if let Some(pending) = self.pending_heredocs.first() {
            // Input ended right after the heredoc line: treat the rest as body.
            if self.tokens.last().map(|t| t.kind) != Some(TokenKind::Newline) {
                return Err(LexError::new(
                    format!("here-document delimited by end-of-file (wanted `{}')", pending.delimiter),
                    self.line,
                    self.column,
                ));
            }
            self.collect_heredoc_bodies()?;
        }

        self.tokens.push(Token::new(TokenKind::Eof, "", self.pos, self.pos, self.line, self.column));
        Ok(self.tokens)
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        if let Some(c) = self.current() {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.current() {
            match c {
                ' ' | '\t' => self.bump(),
                '\\' if self.peek(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                _ => break,
            }
        }
    }

    fn emit(&self, kind: TokenKind, value: &str, start: usize, line: usize, column: usize) -> Token {
        Token::new(kind, value, start, self.pos, line, column)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        let c0 = match self.current() {
            Some(c) => c,
            None => return Ok(None),
        };
        let c1 = self.peek(1);
        let c2 = self.peek(2);

        // Comments only start a token; '#' inside a word stays literal.
        if c0 == '#' {
            while let Some(c) = self.current() {
                if c == '\n' {
                    break;
                }
                self.bump();
            }
            let text: String = self.input[start..self.pos].iter().collect();
            return Ok(Some(self.emit(TokenKind::Comment, &text, start, line, column)));
        }

        if c0 == '\n' {
            self.bump();
            return Ok(Some(self.emit(TokenKind::Newline, "\n", start, line, column)));
        }

        // Here-doc operators register a pending body before the token is built.
        if c0 == '<' && c1 == Some('<') && c2 == Some('-') {
            self.bump_n(3);
            self.register_heredoc(true);
            return Ok(Some(self.emit(TokenKind::DLessDash, "<<-", start, line, column)));
        }
        if c0 == '<' && c1 == Some('<') && c2 != Some('<') {
            self.bump_n(2);
            self.register_heredoc(false);
            return Ok(Some(self.emit(TokenKind::DLess, "<<", start, line, column)));
        }

        for (text, kind) in THREE_CHAR_OPS {
            let mut chars = text.chars();
            let (a, b, c) = (chars.next().unwrap(), chars.next().unwrap(), chars.next().unwrap());
            if c0 == a && c1 == Some(b) && c2 == Some(c) {
                self.bump_n(3);
                return Ok(Some(self.emit(*kind, text, start, line, column)));
            }
        }

        // Process substitution binds the operator into the word.
        if (c0 == '<' || c0 == '>') && c1 == Some('(') {
            return self.read_word(start, line, column).map(Some);
        }

        // (( — arithmetic start or two nested subshell opens. The whole
        // expression text is captured here so C-expression innards never
        // reach the token stream.
        if c0 == '(' && c1 == Some('(') {
            if self.dparen_reads_as_subshell() {
                self.bump();
                return Ok(Some(self.emit(TokenKind::LParen, "(", start, line, column)));
            }
            self.bump_n(2);
            let expr = self.consume_arith_interior(line, column)?;
            let mut open = self.emit(TokenKind::ArithStart, &expr, start, line, column);
            open.end = self.pos.saturating_sub(2);
            self.tokens.push(open);
            let close_start = self.pos.saturating_sub(2);
            return Ok(Some(self.emit(TokenKind::ArithEnd, "))", close_start, self.line, self.column)));
        }

        for (text, kind) in TWO_CHAR_OPS {
            let mut chars = text.chars();
            let (a, b) = (chars.next().unwrap(), chars.next().unwrap());
            if c0 == a && c1 == Some(b) {
                // [[ / ]] only at a word boundary.
                if matches!(kind, TokenKind::CondStart | TokenKind::CondEnd) {
                    if let Some(after) = c2 {
                        if !is_metachar(after) {
                            break;
                        }
                    }
                }
                self.bump_n(2);
                return Ok(Some(self.emit(*kind, text, start, line, column)));
            }
        }

        match c0 {
            '(' => {
                self.bump();
                return Ok(Some(self.emit(TokenKind::LParen, "(", start, line, column)));
            }
            ')' => {
                self.bump();
                return Ok(Some(self.emit(TokenKind::RParen, ")", start, line, column)));
            }
            ';' => {
                self.bump();
                return Ok(Some(self.emit(TokenKind::Semi, ";", start, line, column)));
            }
            '&' => {
                self.bump();
                return Ok(Some(self.emit(TokenKind::Amp, "&", start, line, column)));
            }
            '|' => {
                self.bump();
                return Ok(Some(self.emit(TokenKind::Pipe, "|", start, line, column)));
            }
            '<' => {
                self.bump();
                return Ok(Some(self.emit(TokenKind::Less, "<", start, line, column)));
            }
            '>' => {
                self.bump();
                return Ok(Some(self.emit(TokenKind::Great, ">", start, line, column)));
            }
            _ => {}
        }

        if c0 == '{' {
            // {name}>file — shell-allocated fd.
            if let Some((name, end)) = self.scan_fd_var() {
                self.bump_n(end - start);
                return Ok(Some(self.emit(TokenKind::FdVar, &name, start, line, column)));
            }
            // `{` opens a group only when standing alone.
            if matches!(c1, Some(' ') | Some('\t') | Some('\n') | None) {
                self.bump();
                return Ok(Some(self.emit(TokenKind::LBrace, "{", start, line, column)));
            }
            return self.read_word(start, line, column).map(Some);
        }

        if c0 == '}' && matches!(c1, Some(c) if is_metachar(c)) || (c0 == '}' && c1.is_none()) {
            self.bump();
            return Ok(Some(self.emit(TokenKind::RBrace, "}", start, line, column)));
        }

        if c0 == '!' {
            // `!` alone negates a pipeline; glued to text it is word material.
            if matches!(c1, Some(' ') | Some('\t') | Some('\n') | None) {
                self.bump();
                return Ok(Some(self.emit(TokenKind::Bang, "!", start, line, column)));
            }
        }

        self.read_word(start, line, column).map(Some)
    }

    /// `{name}` immediately before a redirection operator.
    fn scan_fd_var(&self) -> Option<(String, usize)> {
        let mut i = self.pos + 1;
        let mut name = String::new();
        while let Some(&c) = self.input.get(i) {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                i += 1;
            } else {
                break;
            }
        }
        if name.is_empty() || !is_valid_name(&name) || self.input.get(i) != Some(&'}') {
            return None;
        }
        match self.input.get(i + 1) {
            Some(&'<') | Some(&'>') => Some((name, i + 1)),
            _ => None,
        }
    }

    /// Decide whether `((` opens nested subshells rather than arithmetic:
    /// scan for the first unmatched `)` — if the very next character is `)`
    /// the construct closes with `))` and is arithmetic.
    fn dparen_reads_as_subshell(&self) -> bool {
        let mut i = self.pos + 2;
        let mut depth = 0usize;
        let mut single = false;
        let mut double = false;
        while let Some(&c) = self.input.get(i) {
            if single {
                if c == '\'' {
                    single = false;
                }
                i += 1;
                continue;
            }
            if double {
                if c == '\\' {
                    i += 2;
                    continue;
                }
                if c == '"' {
                    double = false;
                }
                i += 1;
                continue;
            }
            match c {
                '\'' => single = true,
                '"' => double = true,
                '\\' => {
                    i += 2;
                    continue;
                }
                '(' => depth += 1,
                ')' => {
                    if depth > 0 {
                        depth -= 1;
                    } else {
                        return self.input.get(i + 1) != Some(&')');
                    }
                }
                _ => {}
            }
            i += 1;
        }
        false
    }

    /// Consume text after `((` up to the matching `))`, returning the
    /// interior. A lone `)` at paren depth zero is kept literally; the
    /// arithmetic parser reports it if it is ever evaluated.
    fn consume_arith_interior(&mut self, line: usize, column: usize) -> Result<String, LexError> {
        let mut expr = String::new();
        let mut depth = 0usize;
        loop {
            match self.current() {
                Some('\'') => {
                    expr.push('\'');
                    self.bump();
                    while let Some(c) = self.current() {
                        expr.push(c);
                        self.bump();
                        if c == '\'' {
                            break;
                        }
                    }
                }
                Some('"') => {
                    expr.push('"');
                    self.bump();
                    while let Some(c) = self.current() {
                        if c == '\\' {
                            expr.push(c);
                            self.bump();
                            if let Some(next) = self.current() {
                                expr.push(next);
                                self.bump();
                            }
                            continue;
                        }
                        expr.push(c);
                        self.bump();
                        if c == '"' {
                            break;
                        }
                    }
                }
                Some('(') => {
                    depth += 1;
                    expr.push('(');
                    self.bump();
                }
                Some(')') => {
                    if depth == 0 && self.peek(1) == Some(')') {
                        self.bump_n(2);
                        return Ok(expr);
                    }
                    depth = depth.saturating_sub(1);
                    expr.push(')');
                    self.bump();
                }
                Some(c) => {
                    expr.push(c);
                    self.bump();
                }
                None => {
                    return Err(LexError::new("unterminated arithmetic command", line, column));
                }
            }
        }
    }

    fn register_heredoc(&mut self, strip_tabs: bool) {
        let mut i = self.pos;
        while matches!(self.input.get(i), Some(&' ') | Some(&'\t')) {
            i += 1;
        }
        let mut delimiter = String::new();
        let mut quoted = false;
        while let Some(&c) = self.input.get(i) {
            match c {
                '\'' | '"' => {
                    quoted = true;
                    let quote = c;
                    i += 1;
                    while let Some(&inner) = self.input.get(i) {
                        if inner == quote {
                            i += 1;
                            break;
                        }
                        delimiter.push(inner);
                        i += 1;
                    }
                }
                '\\' => {
                    quoted = true;
                    i += 1;
                    if let Some(&escaped) = self.input.get(i) {
                        delimiter.push(escaped);
                        i += 1;
                    }
                }
                c if is_metachar(c) => break,
                c => {
                    delimiter.push(c);
                    i += 1;
                }
            }
        }
        if !delimiter.is_empty() {
            self.pending_heredocs.push(PendingHeredoc {
                delimiter,
                strip_tabs,
                quoted,
                // The operator token is pushed right after this call.
                token_index: self.tokens.len(),
            });
        }
    }

    /// Read pending here-document bodies, in the order the operators
    /// appeared, and attach each to its operator token.
    fn collect_heredoc_bodies(&mut self) -> Result<(), LexError> {
        let pending: Vec<PendingHeredoc> = self.pending_heredocs.drain(..).collect();
        for heredoc in pending {
            let mut body = String::new();
            let mut found = false;
            while self.pos < self.input.len() {
                let line_start = self.pos;
                while self.pos < self.input.len() && self.input[self.pos] != '\n' {
                    self.bump();
                }
                let mut text: String = self.input[line_start..self.pos].iter().collect();
                if self.pos < self.input.len() {
                    self.bump(); // consume the newline
                }
                if heredoc.strip_tabs {
                    text = text.trim_start_matches('\t').to_string();
                }
                if text == heredoc.delimiter {
                    found = true;
                    break;
                }
                body.push_str(&text);
                body.push('\n');
            }
            if !found {
                return Err(LexError::new(
                    format!("here-document delimited by end-of-file (wanted `{}')", heredoc.delimiter),
                    self.line,
                    self.column,
                ));
            }
            if let Some(token) = self.tokens.get_mut(heredoc.token_index) {
                token.heredoc_body = Some(body);
                token.single_quoted = heredoc.quoted;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Word reading
    // =========================================================================

    fn read_word(&mut self, start: usize, line: usize, column: usize) -> Result<Token, LexError> {
        let mut raw = String::new();

        while let Some(c) = self.current() {
            match c {
                c if is_metachar(c) => {
                    // < and > glue onto words only through process substitution.
                    if (c == '<' || c == '>') && self.peek(1) == Some('(') {
                        raw.push(c);
                        self.bump();
                        self.consume_balanced_parens(&mut raw)?;
                        continue;
                    }
                    break;
                }
                '\\' => {
                    if self.peek(1) == Some('\n') {
                        self.bump();
                        self.bump();
                        continue;
                    }
                    raw.push('\\');
                    self.bump();
                    if let Some(escaped) = self.current() {
                        raw.push(escaped);
                        self.bump();
                    }
                }
                '\'' => self.consume_single_quoted(&mut raw)?,
                '"' => self.consume_double_quoted(&mut raw)?,
                '`' => self.consume_backquoted(&mut raw)?,
                '$' => self.consume_dollar(&mut raw)?,
                '(' => {
                    // Extglob operator: the `(` follows @ * + ? ! within the word.
                    let prev = raw.chars().last();
                    if matches!(prev, Some('@') | Some('*') | Some('+') | Some('?') | Some('!')) {
                        raw.push('(');
                        self.bump();
                        self.consume_extglob_tail(&mut raw)?;
                        continue;
                    }
                    break;
                }
                _ => {
                    raw.push(c);
                    self.bump();
                }
            }
        }

        let (value, quoted, single_quoted) = strip_whole_quotes(&raw);

        let kind = if !quoted && !single_quoted {
            self.classify_bare_word(&value)
        } else {
            TokenKind::Word
        };

        let mut token = self.emit(kind, &value, start, line, column);
        token.quoted = quoted;
        token.single_quoted = single_quoted;
        Ok(token)
    }

    fn classify_bare_word(&self, value: &str) -> TokenKind {
        if let Some(&kind) = RESERVED.get(value) {
            return kind;
        }
        if !value.is_empty()
            && value.chars().all(|c| c.is_ascii_digit())
            && matches!(self.current(), Some('<') | Some('>'))
        {
            return TokenKind::Number;
        }
        if is_assignment_word(value) {
            return TokenKind::Assignment;
        }
        if is_valid_name(value) {
            return TokenKind::Name;
        }
        TokenKind::Word
    }

    fn consume_single_quoted(&mut self, raw: &mut String) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        raw.push('\'');
        self.bump();
        loop {
            match self.current() {
                Some('\'') => {
                    raw.push('\'');
                    self.bump();
                    return Ok(());
                }
                Some(c) => {
                    raw.push(c);
                    self.bump();
                }
                None => return Err(LexError::new("unterminated single quote", line, column)),
            }
        }
    }

    fn consume_double_quoted(&mut self, raw: &mut String) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        raw.push('"');
        self.bump();
        loop {
            match self.current() {
                Some('"') => {
                    raw.push('"');
                    self.bump();
                    return Ok(());
                }
                Some('\\') => {
                    raw.push('\\');
                    self.bump();
                    if let Some(c) = self.current() {
                        raw.push(c);
                        self.bump();
                    }
                }
                Some('$') => self.consume_dollar(raw)?,
                Some('`') => self.consume_backquoted(raw)?,
                Some(c) => {
                    raw.push(c);
                    self.bump();
                }
                None => return Err(LexError::new("unterminated double quote", line, column)),
            }
        }
    }

    fn consume_backquoted(&mut self, raw: &mut String) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        raw.push('`');
        self.bump();
        loop {
            match self.current() {
                Some('`') => {
                    raw.push('`');
                    self.bump();
                    return Ok(());
                }
                Some('\\') => {
                    raw.push('\\');
                    self.bump();
                    if let Some(c) = self.current() {
                        raw.push(c);
                        self.bump();
                    }
                }
                Some(c) => {
                    raw.push(c);
                    self.bump();
                }
                None => return Err(LexError::new("unterminated backquote", line, column)),
            }
        }
    }

    /// Consume a `$` construct: `$var`, `${…}`, `$(…)`, `$((…))`, `$'…'`, `$"…"`.
    fn consume_dollar(&mut self, raw: &mut String) -> Result<(), LexError> {
        raw.push('$');
        self.bump();
        match self.current() {
            Some('\'') => {
                // ANSI-C quoting: backslash may escape the closing quote.
                let (line, column) = (self.line, self.column);
                raw.push('\'');
                self.bump();
                loop {
                    match self.current() {
                        Some('\'') => {
                            raw.push('\'');
                            self.bump();
                            return Ok(());
                        }
                        Some('\\') => {
                            raw.push('\\');
                            self.bump();
                            if let Some(c) = self.current() {
                                raw.push(c);
                                self.bump();
                            }
                        }
                        Some(c) => {
                            raw.push(c);
                            self.bump();
                        }
                        None => return Err(LexError::new("unterminated $'…' quote", line, column)),
                    }
                }
            }
            Some('"') => self.consume_double_quoted(raw),
            Some('{') => {
                let (line, column) = (self.line, self.column);
                raw.push('{');
                self.bump();
                let mut depth = 1;
                while depth > 0 {
                    match self.current() {
                        Some('\\') => {
                            raw.push('\\');
                            self.bump();
                            if let Some(c) = self.current() {
                                raw.push(c);
                                self.bump();
                            }
                        }
                        Some('\'') => self.consume_single_quoted(raw)?,
                        Some('"') => self.consume_double_quoted(raw)?,
                        Some('$') => self.consume_dollar(raw)?,
                        Some('`') => self.consume_backquoted(raw)?,
                        Some('{') => {
                            depth += 1;
                            raw.push('{');
                            self.bump();
                        }
                        Some('}') => {
                            depth -= 1;
                            raw.push('}');
                            self.bump();
                        }
                        Some(c) => {
                            raw.push(c);
                            self.bump();
                        }
                        None => {
                            return Err(LexError::new("unterminated parameter expansion", line, column))
                        }
                    }
                }
                Ok(())
            }
            Some('(') => self.consume_balanced_parens(raw),
            _ => Ok(()),
        }
    }

    /// Consume `(` … matching `)` with full quote awareness; used for
    /// `$(…)`, `$((…))`, `<(…)` and extglob tails.
    fn consume_balanced_parens(&mut self, raw: &mut String) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        raw.push('(');
        self.bump();
        let mut depth = 1;
        while depth > 0 {
            match self.current() {
                Some('\\') => {
                    raw.push('\\');
                    self.bump();
                    if let Some(c) = self.current() {
                        raw.push(c);
                        self.bump();
                    }
                }
                Some('\'') => self.consume_single_quoted(raw)?,
                Some('"') => self.consume_double_quoted(raw)?,
                Some('`') => self.consume_backquoted(raw)?,
                Some('#') => {
                    // Comment inside $( … ): runs to end of line.
                    let at_word_start = raw
                        .chars()
                        .last()
                        .map(|c| matches!(c, ' ' | '\t' | '\n' | '(' | ';' | '|' | '&'))
                        .unwrap_or(true);
                    raw.push('#');
                    self.bump();
                    if at_word_start {
                        while let Some(c) = self.current() {
                            if c == '\n' {
                                break;
                            }
                            raw.push(c);
                            self.bump();
                        }
                    }
                }
                Some('(') => {
                    depth += 1;
                    raw.push('(');
                    self.bump();
                }
                Some(')') => {
                    depth -= 1;
                    raw.push(')');
                    self.bump();
                }
                Some(c) => {
                    raw.push(c);
                    self.bump();
                }
                None => return Err(LexError::new("unterminated command substitution", line, column)),
            }
        }
        Ok(())
    }

    /// Finish an extglob group whose `X(` prefix is already in `raw`.
    fn consume_extglob_tail(&mut self, raw: &mut String) -> Result<(), LexError> {
        let (line, column) = (self.line, self.column);
        let mut depth = 1;
        while depth > 0 {
            match self.current() {
                Some('\\') => {
                    raw.push('\\');
                    self.bump();
                    if let Some(c) = self.current() {
                        raw.push(c);
                        self.bump();
                    }
                }
                Some('\'') => self.consume_single_quoted(raw)?,
                Some('"') => self.consume_double_quoted(raw)?,
                Some('$') => self.consume_dollar(raw)?,
                Some('(') => {
                    depth += 1;
                    raw.push('(');
                    self.bump();
                }
                Some(')') => {
                    depth -= 1;
                    raw.push(')');
                    self.bump();
                }
                Some(c) => {
                    raw.push(c);
                    self.bump();
                }
                None => return Err(LexError::new("unterminated extended glob pattern", line, column)),
            }
        }
        Ok(())
    }
}

/// Assignment-word shape: `name=…`, `name+=…`, `name[sub]=…`.
pub fn is_assignment_word(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    let mut i = 0;
    match chars.first() {
        Some(c) if c.is_ascii_alphabetic() || *c == '_' => i += 1,
        _ => return false,
    }
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '[' {
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
        if depth != 0 {
            return false;
        }
    }
    if i < chars.len() && chars[i] == '+' {
        i += 1;
    }
    i < chars.len() && chars[i] == '='
}

/// If the raw word is one quoted span covering the whole token, strip the
/// quotes and report which kind enclosed it. Mixed-quote words stay raw.
fn strip_whole_quotes(raw: &str) -> (String, bool, bool) {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() >= 2 {
        let first = chars[0];
        let last = chars[chars.len() - 1];
        if (first == '\'' || first == '"') && last == first {
            // The opening quote must close exactly at the end.
            let mut i = 1;
            while i < chars.len() - 1 {
                if first == '"' && chars[i] == '\\' {
                    i += 2;
                    continue;
                }
                if chars[i] == first {
                    return (raw.to_string(), false, false);
                }
                i += 1;
            }
            if i == chars.len() - 1 {
                let inner: String = chars[1..chars.len() - 1].iter().collect();
                return (inner, first == '"', first == '\'');
            }
        }
    }
    (raw.to_string(), false, false)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_command() {
        let tokens = lex("echo hello world");
        assert_eq!(tokens[0].kind, TokenKind::Name);
        assert_eq!(tokens[0].value, "echo");
        assert_eq!(tokens[1].value, "hello");
        assert_eq!(tokens[2].value, "world");
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("a && b || c | d |& e"),
            vec![
                TokenKind::Name,
                TokenKind::AndIf,
                TokenKind::Name,
                TokenKind::OrIf,
                TokenKind::Name,
                TokenKind::Pipe,
                TokenKind::Name,
                TokenKind::PipeAmp,
                TokenKind::Name,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn redirections() {
        assert_eq!(
            kinds("cmd >out 2>&1 <input >>log"),
            vec![
                TokenKind::Name,
                TokenKind::Great,
                TokenKind::Name,
                TokenKind::Number,
                TokenKind::GreatAnd,
                TokenKind::Word,
                TokenKind::Less,
                TokenKind::Name,
                TokenKind::DGreat,
                TokenKind::Name,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn whole_quoted_word_is_stripped() {
        let tokens = lex("echo 'single' \"double\"");
        assert_eq!(tokens[1].value, "single");
        assert!(tokens[1].single_quoted);
        let double = &tokens[2];
        assert_eq!(double.value, "double");
        assert!(double.quoted);
        assert!(!double.single_quoted);
    }

    #[test]
    fn mixed_quotes_keep_raw_text() {
        let tokens = lex("echo a'b'c");
        assert_eq!(tokens[1].value, "a'b'c");
        assert!(!tokens[1].quoted);
        assert!(!tokens[1].single_quoted);
    }

    #[test]
    fn command_substitution_stays_in_word() {
        let tokens = lex("echo $(ls | wc -l)");
        assert_eq!(tokens[1].value, "$(ls | wc -l)");
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn nested_command_substitution() {
        let tokens = lex("echo \"$(echo \"$(pwd)\")\"");
        assert_eq!(tokens.len(), 3);
        assert!(tokens[1].quoted);
    }

    #[test]
    fn assignment_words() {
        let tokens = lex("FOO=bar BAZ+=x arr[2]=v cmd");
        assert_eq!(tokens[0].kind, TokenKind::Assignment);
        assert_eq!(tokens[1].kind, TokenKind::Assignment);
        assert_eq!(tokens[2].kind, TokenKind::Assignment);
        assert_eq!(tokens[3].kind, TokenKind::Name);
    }

    #[test]
    fn reserved_words() {
        assert_eq!(
            kinds("if true; then echo hi; fi"),
            vec![
                TokenKind::If,
                TokenKind::Name,
                TokenKind::Semi,
                TokenKind::Then,
                TokenKind::Name,
                TokenKind::Name,
                TokenKind::Semi,
                TokenKind::Fi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn heredoc_body_attaches_to_operator() {
        let tokens = lex("cat <<EOF\nhello\nworld\nEOF\n");
        let op = tokens.iter().find(|t| t.kind == TokenKind::DLess).unwrap();
        assert_eq!(op.heredoc_body.as_deref(), Some("hello\nworld\n"));
        assert!(!op.single_quoted);
    }

    #[test]
    fn quoted_heredoc_delimiter() {
        let tokens = lex("cat <<'EOF'\n$HOME\nEOF\n");
        let op = tokens.iter().find(|t| t.kind == TokenKind::DLess).unwrap();
        assert_eq!(op.heredoc_body.as_deref(), Some("$HOME\n"));
        assert!(op.single_quoted);
    }

    #[test]
    fn heredoc_strip_tabs() {
        let tokens = lex("cat <<-EOF\n\thello\n\tEOF\n");
        let op = tokens.iter().find(|t| t.kind == TokenKind::DLessDash).unwrap();
        assert_eq!(op.heredoc_body.as_deref(), Some("hello\n"));
    }

    #[test]
    fn two_heredocs_in_order() {
        let tokens = lex("cat <<A <<B\none\nA\ntwo\nB\n");
        let bodies: Vec<_> = tokens.iter().filter_map(|t| t.heredoc_body.clone()).collect();
        assert_eq!(bodies, vec!["one\n".to_string(), "two\n".to_string()]);
    }

    #[test]
    fn unterminated_heredoc_is_error() {
        assert!(Lexer::new("cat <<EOF\nbody").tokenize().is_err());
    }

    #[test]
    fn comment_token() {
        let tokens = lex("echo hi # trailing\n");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Comment));
    }

    #[test]
    fn hash_inside_word_is_literal() {
        let tokens = lex("echo a#b");
        assert_eq!(tokens[1].value, "a#b");
    }

    #[test]
    fn line_continuation_joins_words() {
        let tokens = lex("echo ab\\\ncd");
        assert_eq!(tokens[1].value, "abcd");
    }

    #[test]
    fn arithmetic_command_captures_expression() {
        let tokens = lex("(( x + 1 ))");
        assert_eq!(tokens[0].kind, TokenKind::ArithStart);
        assert_eq!(tokens[0].value, " x + 1 ");
        assert_eq!(tokens[1].kind, TokenKind::ArithEnd);
        assert_eq!(tokens[2].kind, TokenKind::Eof);
    }

    #[test]
    fn arithmetic_command_with_inner_parens() {
        let tokens = lex("(( (1+2)*3 ))");
        assert_eq!(tokens[0].value, " (1+2)*3 ");
        assert_eq!(tokens[1].kind, TokenKind::ArithEnd);
    }

    #[test]
    fn nested_subshells_not_arithmetic() {
        let tokens = lex("((echo a); echo b)");
        assert_eq!(tokens[0].kind, TokenKind::LParen);
        assert_eq!(tokens[1].kind, TokenKind::LParen);
    }

    #[test]
    fn cond_command_tokens() {
        let tokens = lex("[[ -f file ]]");
        assert_eq!(tokens[0].kind, TokenKind::CondStart);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        assert_eq!(tokens[tokens.len() - 2].kind, TokenKind::CondEnd);
    }

    #[test]
    fn process_substitution_is_one_word() {
        let tokens = lex("diff <(sort a) <(sort b)");
        assert_eq!(tokens[1].value, "<(sort a)");
        assert_eq!(tokens[2].value, "<(sort b)");
    }

    #[test]
    fn fd_var_token() {
        let tokens = lex("exec {logfd}>out.txt");
        let fd = tokens.iter().find(|t| t.kind == TokenKind::FdVar).unwrap();
        assert_eq!(fd.value, "logfd");
    }

    #[test]
    fn unterminated_quote_is_error() {
        assert!(Lexer::new("echo 'oops").tokenize().is_err());
        assert!(Lexer::new("echo \"oops").tokenize().is_err());
    }

    #[test]
    fn extglob_word() {
        let tokens = lex("ls !(*.txt|*.md)");
        assert_eq!(tokens[1].value, "!(*.txt|*.md)");
    }

    #[test]
    fn number_only_before_redirect() {
        let tokens = lex("echo 2");
        assert_eq!(tokens[1].kind, TokenKind::Word);
        let tokens = lex("echo 2>err");
        assert_eq!(tokens[1].kind, TokenKind::Number);
    }
}

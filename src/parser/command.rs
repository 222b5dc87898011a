//! Command parser.
//!
//! Consumes the token stream and builds the AST: statements joined by
//! `&& || ; &`, pipelines, simple commands with assignment prefixes and
//! redirections, compound commands, function definitions and `[[ ]]`
//! conditional expressions.

use crate::ast::types::*;
use crate::parser::arith::parse_arithmetic;
use crate::parser::lexer::{is_valid_name, Token, TokenKind};
use crate::parser::word::{parse_word, parse_word_parts, WordFlags};
use crate::parser::ParseError;

pub struct Parser {
    source: Vec<char>,
    tokens: Vec<Token>,
    pos: usize,
}

/// Tokens that close an enclosing construct; a statement never starts here.
const CLOSERS: &[TokenKind] = &[
    TokenKind::Then,
    TokenKind::Do,
    TokenKind::Done,
    TokenKind::Fi,
    TokenKind::Elif,
    TokenKind::Else,
    TokenKind::Esac,
    TokenKind::RParen,
    TokenKind::RBrace,
    TokenKind::Eof,
];

impl Parser {
    pub fn new(source: &str, tokens: Vec<Token>) -> Self {
        let tokens = tokens.into_iter().filter(|t| t.kind != TokenKind::Comment).collect();
        Self { source: source.chars().collect(), tokens, pos: 0 }
    }

    pub fn parse_script(mut self) -> Result<Script, ParseError> {
        let statements = self.parse_statement_list(&[TokenKind::Eof])?;
        if self.current().kind != TokenKind::Eof {
            let t = self.current();
            return Err(ParseError::unexpected(t.value.clone(), t.line));
        }
        Ok(Script { statements })
    }

    // =========================================================================
    // Token plumbing
    // =========================================================================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.current().kind == kind {
            Ok(self.advance())
        } else {
            let t = self.current();
            let shown = if t.kind == TokenKind::Eof { "end of file".to_string() } else { t.value.clone() };
            Err(ParseError::unexpected(shown, t.line))
        }
    }

    fn skip_newlines(&mut self) {
        while self.current().kind == TokenKind::Newline {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.current().kind, TokenKind::Newline | TokenKind::Semi) {
            self.advance();
        }
    }

    /// Could the current token begin a command?
    fn starts_command(&self) -> bool {
        let t = self.current();
        if CLOSERS.contains(&t.kind) {
            return false;
        }
        match t.kind {
            TokenKind::Newline
            | TokenKind::Semi
            | TokenKind::Amp
            | TokenKind::Pipe
            | TokenKind::PipeAmp
            | TokenKind::AndIf
            | TokenKind::OrIf
            | TokenKind::DSemi
            | TokenKind::SemiAnd
            | TokenKind::DSemiAnd
            | TokenKind::In
            | TokenKind::CondEnd
            | TokenKind::ArithEnd => false,
            _ => true,
        }
    }

    fn source_slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.source.len());
        if start >= end {
            return String::new();
        }
        self.source[start..end].iter().collect()
    }

    fn word_from(&mut self, flags: WordFlags) -> Result<Word, ParseError> {
        let t = self.advance();
        parse_word(&t.value, t.quoted, t.single_quoted, flags)
    }

    // =========================================================================
    // Statements and pipelines
    // =========================================================================

    fn parse_statement_list(&mut self, terminators: &[TokenKind]) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            let t = self.current();
            if terminators.contains(&t.kind) || t.kind == TokenKind::Eof {
                break;
            }
            // Stray case terminators become deferred runtime errors.
            if matches!(t.kind, TokenKind::DSemi | TokenKind::SemiAnd | TokenKind::DSemiAnd) {
                let token = self.advance();
                statements.push(Statement {
                    pipelines: Vec::new(),
                    operators: Vec::new(),
                    background: false,
                    line: token.line,
                    deferred_error: Some(DeferredSyntaxError {
                        token: token.value.clone(),
                        message: format!("syntax error near unexpected token `{}'", token.value),
                    }),
                    source_text: None,
                });
                continue;
            }
            if !self.starts_command() {
                let t = self.current();
                return Err(ParseError::unexpected(t.value.clone(), t.line));
            }
            let before = self.pos;
            let statement = self.parse_statement()?;
            statements.push(statement);
            if self.pos == before {
                let t = self.current();
                return Err(ParseError::unexpected(t.value.clone(), t.line));
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let first = self.current().clone();
        let mut pipelines = Vec::new();
        let mut operators = Vec::new();
        let mut background = false;
        let mut last_end = first.end;

        loop {
            let pipeline = self.parse_pipeline()?;
            pipelines.push(pipeline);
            last_end = self.tokens[self.pos.saturating_sub(1)].end;

            match self.current().kind {
                TokenKind::AndIf => {
                    self.advance();
                    self.skip_newlines();
                    operators.push(ListOperator::And);
                }
                TokenKind::OrIf => {
                    self.advance();
                    self.skip_newlines();
                    operators.push(ListOperator::Or);
                }
                TokenKind::Semi => {
                    self.advance();
                    if self.starts_command() {
                        operators.push(ListOperator::Seq);
                    } else {
                        break;
                    }
                }
                TokenKind::Amp => {
                    self.advance();
                    background = true;
                    break;
                }
                _ => break,
            }
        }

        let source_text = Some(self.source_slice(first.start, last_end).trim().to_string());
        Ok(Statement {
            pipelines,
            operators,
            background,
            line: first.line,
            deferred_error: None,
            source_text,
        })
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let mut negated = false;
        while self.current().kind == TokenKind::Bang {
            self.advance();
            negated = !negated;
        }

        let mut commands = vec![self.parse_command()?];
        let mut stderr_pipes = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::Pipe => {
                    self.advance();
                    self.skip_newlines();
                    stderr_pipes.push(false);
                }
                TokenKind::PipeAmp => {
                    self.advance();
                    self.skip_newlines();
                    stderr_pipes.push(true);
                }
                _ => break,
            }
            commands.push(self.parse_command()?);
        }

        Ok(Pipeline { negated, commands, stderr_pipes })
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        match self.current().kind {
            TokenKind::If => self.parse_if().map(Command::Compound),
            TokenKind::While => self.parse_loop(false).map(Command::Compound),
            TokenKind::Until => self.parse_loop(true).map(Command::Compound),
            TokenKind::For => self.parse_for().map(Command::Compound),
            TokenKind::Case => self.parse_case().map(Command::Compound),
            TokenKind::Select => self.parse_select().map(Command::Compound),
            TokenKind::Function => self.parse_function_keyword(),
            TokenKind::LBrace => self.parse_group().map(Command::Compound),
            TokenKind::LParen => self.parse_subshell().map(Command::Compound),
            TokenKind::CondStart => self.parse_cond_command().map(Command::Compound),
            TokenKind::ArithStart => self.parse_arith_command().map(Command::Compound),
            TokenKind::Name | TokenKind::Word
                if self.peek(1).kind == TokenKind::LParen && self.peek(2).kind == TokenKind::RParen =>
            {
                self.parse_function_short()
            }
            _ => self.parse_simple_command().map(Command::Simple),
        }
    }

    fn parse_simple_command(&mut self) -> Result<SimpleCommand, ParseError> {
        let line = self.current().line;
        let mut assignments = Vec::new();
        let mut name: Option<Word> = None;
        let mut args = Vec::new();
        let mut redirections = Vec::new();

        loop {
            let t = self.current().clone();
            match t.kind {
                k if k.is_redirect() => {
                    redirections.push(self.parse_redirection(None, None)?);
                }
                TokenKind::Number if self.peek(1).kind.is_redirect() => {
                    let fd = t.value.parse::<i32>().ok();
                    self.advance();
                    redirections.push(self.parse_redirection(fd, None)?);
                }
                TokenKind::FdVar if self.peek(1).kind.is_redirect() => {
                    self.advance();
                    redirections.push(self.parse_redirection(None, Some(t.value.clone()))?);
                }
                TokenKind::Assignment if name.is_none() => {
                    assignments.push(self.parse_assignment()?);
                }
                TokenKind::Assignment
                    if t.value.ends_with('=')
                        && self.peek(1).kind == TokenKind::LParen
                        && self.peek(1).start == t.end =>
                {
                    // Declaration-utility argument (`declare arr=(a b)`):
                    // keep the raw text as one word for the builtin.
                    let start = t.start;
                    self.advance();
                    self.advance();
                    let mut depth = 1usize;
                    let mut end = t.end;
                    while depth > 0 {
                        let inner = self.current().clone();
                        match inner.kind {
                            TokenKind::LParen => depth += 1,
                            TokenKind::RParen => depth -= 1,
                            TokenKind::Eof => {
                                return Err(ParseError::unexpected("end of file", inner.line))
                            }
                            _ => {}
                        }
                        end = inner.end;
                        self.advance();
                    }
                    args.push(Word::literal(self.source_slice(start, end)));
                }
                k if k.is_wordlike() => {
                    let word = self.word_from(WordFlags::default())?;
                    if name.is_none() {
                        name = Some(word);
                    } else {
                        args.push(word);
                    }
                }
                _ => break,
            }
        }

        if assignments.is_empty() && name.is_none() && redirections.is_empty() {
            let t = self.current();
            return Err(ParseError::unexpected(t.value.clone(), t.line));
        }

        Ok(SimpleCommand { assignments, name, args, redirections, line })
    }

    /// Split an assignment token (`name=…`, `name[sub]+=…`) and parse the
    /// value word, or an `name=( … )` array literal from the next tokens.
    fn parse_assignment(&mut self) -> Result<Assignment, ParseError> {
        let token = self.advance();
        let raw = token.value.clone();
        let chars: Vec<char> = raw.chars().collect();

        let mut i = 0;
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
            i += 1;
        }
        let name: String = chars[..i].iter().collect();

        let mut index = None;
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
            index = Some(chars[i + 1..j - 1].iter().collect::<String>());
            i = j;
        }

        let append = chars.get(i) == Some(&'+');
        if append {
            i += 1;
        }
        // chars[i] is '='
        i += 1;
        let value_text: String = chars[i..].iter().collect();

        // `name=(` with the paren glued on: array literal.
        if value_text.is_empty()
            && self.current().kind == TokenKind::LParen
            && self.current().start == token.end
        {
            self.advance();
            let mut elements = Vec::new();
            loop {
                self.skip_newlines();
                let t = self.current().clone();
                if t.kind == TokenKind::RParen {
                    self.advance();
                    break;
                }
                if !t.kind.is_wordlike() {
                    return Err(ParseError::unexpected(t.value.clone(), t.line));
                }
                elements.push(self.parse_array_element()?);
            }
            return Ok(Assignment { name, index, value: None, append, array: Some(elements) });
        }

        let flags = WordFlags { is_assignment: true, no_brace: true, ..Default::default() };
        let value = parse_word(&value_text, token.quoted, token.single_quoted, flags)?;
        Ok(Assignment { name, index, value: Some(value), append, array: None })
    }

    /// One element of `name=( … )`, possibly `[key]=value`.
    fn parse_array_element(&mut self) -> Result<ArrayElement, ParseError> {
        let t = self.advance();
        let flags = WordFlags { is_assignment: true, no_brace: true, ..Default::default() };
        if !t.quoted && !t.single_quoted && t.value.starts_with('[') {
            let chars: Vec<char> = t.value.chars().collect();
            let mut depth = 1;
            let mut j = 1;
            while j < chars.len() && depth > 0 {
                match chars[j] {
                    '[' => depth += 1,
                    ']' => depth -= 1,
                    _ => {}
                }
                j += 1;
            }
            if depth == 0 && chars.get(j) == Some(&'=') {
                let key: String = chars[1..j - 1].iter().collect();
                let value_text: String = chars[j + 1..].iter().collect();
                let value = Word::new(parse_word_parts(&value_text, flags)?);
                return Ok(ArrayElement { key: Some(key), value });
            }
        }
        let value = parse_word(&t.value, t.quoted, t.single_quoted, flags)?;
        Ok(ArrayElement { key: None, value })
    }

    fn parse_redirection(
        &mut self,
        fd: Option<i32>,
        fd_var: Option<String>,
    ) -> Result<Redirection, ParseError> {
        let op_token = self.advance();
        let op = match op_token.kind {
            TokenKind::Less => RedirOp::In,
            TokenKind::Great => RedirOp::Out,
            TokenKind::DGreat => RedirOp::Append,
            TokenKind::Clobber => RedirOp::Clobber,
            TokenKind::LessGreat => RedirOp::InOut,
            TokenKind::LessAnd => RedirOp::DupIn,
            TokenKind::GreatAnd => RedirOp::DupOut,
            TokenKind::AndGreat => RedirOp::BothOut,
            TokenKind::AndDGreat => RedirOp::BothAppend,
            TokenKind::TLess => RedirOp::HereString,
            TokenKind::DLess | TokenKind::DLessDash => RedirOp::HereDoc,
            _ => {
                return Err(ParseError::unexpected(op_token.value.clone(), op_token.line));
            }
        };

        if op == RedirOp::HereDoc {
            let quoted = op_token.single_quoted;
            let body_text = op_token.heredoc_body.clone().unwrap_or_default();
            let delim = self.advance();
            let body = if quoted {
                Word::literal(body_text)
            } else {
                let flags = WordFlags { heredoc: true, ..Default::default() };
                Word::new(parse_word_parts(&body_text, flags)?)
            };
            return Ok(Redirection {
                fd,
                fd_var,
                op,
                target: RedirTarget::HereDoc(HereDoc {
                    delimiter: delim.value,
                    body,
                    quoted,
                    strip_tabs: op_token.kind == TokenKind::DLessDash,
                }),
            });
        }

        let t = self.current();
        if !t.kind.is_wordlike() {
            return Err(ParseError::unexpected(t.value.clone(), t.line));
        }
        let target = self.word_from(WordFlags::default())?;
        Ok(Redirection { fd, fd_var, op, target: RedirTarget::Word(target) })
    }

    fn parse_trailing_redirections(&mut self) -> Result<Vec<Redirection>, ParseError> {
        let mut redirections = Vec::new();
        loop {
            let t = self.current().clone();
            match t.kind {
                k if k.is_redirect() => redirections.push(self.parse_redirection(None, None)?),
                TokenKind::Number if self.peek(1).kind.is_redirect() => {
                    let fd = t.value.parse::<i32>().ok();
                    self.advance();
                    redirections.push(self.parse_redirection(fd, None)?);
                }
                TokenKind::FdVar if self.peek(1).kind.is_redirect() => {
                    self.advance();
                    redirections.push(self.parse_redirection(None, Some(t.value.clone()))?);
                }
                _ => break,
            }
        }
        Ok(redirections)
    }

    // =========================================================================
    // Compound commands
    // =========================================================================

    fn parse_if(&mut self) -> Result<CompoundCommand, ParseError> {
        self.expect(TokenKind::If)?;
        let mut clauses = Vec::new();
        let mut else_body = None;

        loop {
            let condition = self.parse_statement_list(&[TokenKind::Then])?;
            self.expect(TokenKind::Then)?;
            let body =
                self.parse_statement_list(&[TokenKind::Elif, TokenKind::Else, TokenKind::Fi])?;
            clauses.push(IfClause { condition, body });

            match self.current().kind {
                TokenKind::Elif => {
                    self.advance();
                }
                TokenKind::Else => {
                    self.advance();
                    else_body = Some(self.parse_statement_list(&[TokenKind::Fi])?);
                    self.expect(TokenKind::Fi)?;
                    break;
                }
                _ => {
                    self.expect(TokenKind::Fi)?;
                    break;
                }
            }
        }

        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommand::If(IfCommand { clauses, else_body, redirections }))
    }

    fn parse_loop(&mut self, until: bool) -> Result<CompoundCommand, ParseError> {
        self.advance(); // while / until
        let condition = self.parse_statement_list(&[TokenKind::Do])?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_statement_list(&[TokenKind::Done])?;
        self.expect(TokenKind::Done)?;
        let redirections = self.parse_trailing_redirections()?;
        let node = LoopCommand { condition, body, redirections };
        Ok(if until { CompoundCommand::Until(node) } else { CompoundCommand::While(node) })
    }

    fn parse_for(&mut self) -> Result<CompoundCommand, ParseError> {
        self.expect(TokenKind::For)?;

        if self.current().kind == TokenKind::ArithStart {
            let line = self.current().line;
            let header = self.advance();
            self.expect(TokenKind::ArithEnd)?;
            let sections = split_top_level_semicolons(&header.value);
            if sections.len() != 3 {
                return Err(ParseError::message(format!(
                    "syntax error: bad for loop header `(({}))'",
                    header.value
                )));
            }
            let part = |text: &str| {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(parse_arithmetic(trimmed))
                }
            };
            self.skip_separators();
            let body = self.parse_do_block()?;
            let redirections = self.parse_trailing_redirections()?;
            return Ok(CompoundCommand::ForArith(ForArithCommand {
                init: part(&sections[0]),
                condition: part(&sections[1]),
                update: part(&sections[2]),
                body,
                redirections,
                line,
            }));
        }

        let var_token = self.advance();
        if !is_valid_name(&var_token.value) {
            return Err(ParseError::unexpected(var_token.value.clone(), var_token.line));
        }
        self.skip_newlines();

        let mut words = None;
        if self.current().kind == TokenKind::In {
            self.advance();
            let mut list = Vec::new();
            while self.current().kind.is_wordlike() {
                list.push(self.word_from(WordFlags::default())?);
            }
            words = Some(list);
        }
        self.skip_separators();
        let body = self.parse_do_block()?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommand::For(ForCommand {
            variable: var_token.value,
            words,
            body,
            redirections,
        }))
    }

    fn parse_select(&mut self) -> Result<CompoundCommand, ParseError> {
        self.expect(TokenKind::Select)?;
        let var_token = self.advance();
        if !is_valid_name(&var_token.value) {
            return Err(ParseError::unexpected(var_token.value.clone(), var_token.line));
        }
        self.skip_newlines();
        let mut words = None;
        if self.current().kind == TokenKind::In {
            self.advance();
            let mut list = Vec::new();
            while self.current().kind.is_wordlike() {
                list.push(self.word_from(WordFlags::default())?);
            }
            words = Some(list);
        }
        self.skip_separators();
        let body = self.parse_do_block()?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommand::Select(SelectCommand {
            variable: var_token.value,
            words,
            body,
            redirections,
        }))
    }

    fn parse_do_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.skip_newlines();
        self.expect(TokenKind::Do)?;
        let body = self.parse_statement_list(&[TokenKind::Done])?;
        self.expect(TokenKind::Done)?;
        Ok(body)
    }

    fn parse_case(&mut self) -> Result<CompoundCommand, ParseError> {
        self.expect(TokenKind::Case)?;
        let subject = self.word_from(WordFlags::default())?;
        self.skip_newlines();
        self.expect(TokenKind::In)?;
        self.skip_newlines();

        let pattern_flags = WordFlags { no_brace: true, ..Default::default() };
        let mut arms = Vec::new();
        while self.current().kind != TokenKind::Esac {
            if self.current().kind == TokenKind::LParen {
                self.advance();
            }
            let mut patterns = vec![self.word_from(pattern_flags)?];
            while self.current().kind == TokenKind::Pipe {
                self.advance();
                patterns.push(self.word_from(pattern_flags)?);
            }
            self.expect(TokenKind::RParen)?;
            self.skip_newlines();
            let body = self.parse_statement_list(&[
                TokenKind::DSemi,
                TokenKind::SemiAnd,
                TokenKind::DSemiAnd,
                TokenKind::Esac,
            ])?;
            let terminator = match self.current().kind {
                TokenKind::DSemi => {
                    self.advance();
                    CaseTerminator::Break
                }
                TokenKind::SemiAnd => {
                    self.advance();
                    CaseTerminator::FallThrough
                }
                TokenKind::DSemiAnd => {
                    self.advance();
                    CaseTerminator::TestNext
                }
                _ => CaseTerminator::Break,
            };
            arms.push(CaseArm { patterns, body, terminator });
            self.skip_newlines();
        }
        self.expect(TokenKind::Esac)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommand::Case(CaseCommand { subject, arms, redirections }))
    }

    fn parse_group(&mut self) -> Result<CompoundCommand, ParseError> {
        self.expect(TokenKind::LBrace)?;
        let body = self.parse_statement_list(&[TokenKind::RBrace])?;
        self.expect(TokenKind::RBrace)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommand::Group(BlockCommand { body, redirections }))
    }

    fn parse_subshell(&mut self) -> Result<CompoundCommand, ParseError> {
        self.expect(TokenKind::LParen)?;
        let body = self.parse_statement_list(&[TokenKind::RParen])?;
        self.expect(TokenKind::RParen)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommand::Subshell(BlockCommand { body, redirections }))
    }

    fn parse_arith_command(&mut self) -> Result<CompoundCommand, ParseError> {
        let header = self.advance(); // ArithStart, value = expression text
        let line = header.line;
        self.expect(TokenKind::ArithEnd)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommand::Arith(ArithCommand {
            expression: parse_arithmetic(&header.value),
            redirections,
            line,
        }))
    }

    // =========================================================================
    // Function definitions
    // =========================================================================

    fn parse_function_keyword(&mut self) -> Result<Command, ParseError> {
        self.expect(TokenKind::Function)?;
        let name_token = self.advance();
        if !name_token.kind.is_wordlike() {
            return Err(ParseError::unexpected(name_token.value.clone(), name_token.line));
        }
        if self.current().kind == TokenKind::LParen && self.peek(1).kind == TokenKind::RParen {
            self.advance();
            self.advance();
        }
        self.finish_function(name_token.value)
    }

    fn parse_function_short(&mut self) -> Result<Command, ParseError> {
        let name_token = self.advance();
        self.expect(TokenKind::LParen)?;
        self.expect(TokenKind::RParen)?;
        self.finish_function(name_token.value)
    }

    fn finish_function(&mut self, name: String) -> Result<Command, ParseError> {
        self.skip_newlines();
        let body = match self.parse_command()? {
            Command::Compound(compound) => compound,
            _ => {
                let t = self.current();
                return Err(ParseError::unexpected(t.value.clone(), t.line));
            }
        };
        let redirections = self.parse_trailing_redirections()?;
        Ok(Command::Function(FunctionDef { name, body: Box::new(body), redirections }))
    }

    // =========================================================================
    // [[ ]] conditional expressions
    // =========================================================================

    fn parse_cond_command(&mut self) -> Result<CompoundCommand, ParseError> {
        let line = self.current().line;
        self.expect(TokenKind::CondStart)?;
        self.skip_newlines();
        let expression = self.parse_cond_or()?;
        self.skip_newlines();
        self.expect(TokenKind::CondEnd)?;
        let redirections = self.parse_trailing_redirections()?;
        Ok(CompoundCommand::Cond(CondCommand { expression, redirections, line }))
    }

    fn parse_cond_or(&mut self) -> Result<CondExpr, ParseError> {
        let mut left = self.parse_cond_and()?;
        loop {
            self.skip_newlines();
            if self.current().kind == TokenKind::OrIf {
                self.advance();
                self.skip_newlines();
                let right = self.parse_cond_and()?;
                left = CondExpr::Or(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_cond_and(&mut self) -> Result<CondExpr, ParseError> {
        let mut left = self.parse_cond_not()?;
        loop {
            self.skip_newlines();
            if self.current().kind == TokenKind::AndIf {
                self.advance();
                self.skip_newlines();
                let right = self.parse_cond_not()?;
                left = CondExpr::And(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_cond_not(&mut self) -> Result<CondExpr, ParseError> {
        self.skip_newlines();
        if self.current().kind == TokenKind::Bang {
            self.advance();
            let operand = self.parse_cond_not()?;
            return Ok(CondExpr::Not(Box::new(operand)));
        }
        if self.current().kind == TokenKind::LParen {
            self.advance();
            let inner = self.parse_cond_or()?;
            self.skip_newlines();
            self.expect(TokenKind::RParen)?;
            return Ok(CondExpr::Group(Box::new(inner)));
        }
        self.parse_cond_primary()
    }

    fn parse_cond_primary(&mut self) -> Result<CondExpr, ParseError> {
        let flags = WordFlags { no_brace: true, ..Default::default() };
        let t = self.current().clone();

        // Unary operator followed by an operand word.
        if t.kind == TokenKind::Word && !t.quoted && !t.single_quoted {
            if let Some(op) = CondUnaryOp::from_flag(&t.value) {
                if self.peek(1).kind.is_wordlike() {
                    self.advance();
                    let operand = self.word_from(flags)?;
                    return Ok(CondExpr::Unary { op, operand });
                }
            }
        }

        if !t.kind.is_wordlike() {
            return Err(ParseError::unexpected(t.value.clone(), t.line));
        }
        let lhs = self.word_from(flags)?;

        // Binary operator?
        let op_token = self.current().clone();
        let op = match op_token.kind {
            TokenKind::Less => Some(CondBinaryOp::Lt),
            TokenKind::Great => Some(CondBinaryOp::Gt),
            TokenKind::Word | TokenKind::Name if !op_token.quoted && !op_token.single_quoted => {
                CondBinaryOp::from_token(&op_token.value)
            }
            _ => None,
        };

        let op = match op {
            Some(op) => op,
            None => return Ok(CondExpr::Word(lhs)),
        };
        self.advance();

        if op == CondBinaryOp::Regex {
            let rhs = self.parse_regex_word()?;
            return Ok(CondExpr::Binary { op, lhs, rhs });
        }

        let t = self.current();
        if !t.kind.is_wordlike() {
            return Err(ParseError::unexpected(t.value.clone(), t.line));
        }
        let rhs = self.word_from(flags)?;
        Ok(CondExpr::Binary { op, lhs, rhs })
    }

    /// The right-hand side of `=~`. Regex grouping parens may contain
    /// spaces, so tokens are stitched back together from the source: a
    /// gap between tokens ends the pattern unless parens are open.
    fn parse_regex_word(&mut self) -> Result<Word, ParseError> {
        self.skip_newlines();
        let first = self.current().clone();
        if matches!(first.kind, TokenKind::CondEnd | TokenKind::Eof) {
            return Err(ParseError::unexpected(first.value.clone(), first.line));
        }

        let start = first.start;
        let mut end = first.start;
        let mut depth = 0usize;
        loop {
            let t = self.current().clone();
            let stops = matches!(
                t.kind,
                TokenKind::CondEnd | TokenKind::AndIf | TokenKind::OrIf | TokenKind::Eof | TokenKind::Newline
            );
            if stops {
                break;
            }
            if t.kind == TokenKind::RParen && depth == 0 {
                break;
            }
            if depth == 0 && t.start > end && end > start {
                // Whitespace outside parens terminates the regex.
                break;
            }
            match t.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
            end = t.end;
            self.advance();
        }

        let raw = self.source_slice(start, end);
        let flags = WordFlags { in_regex: true, no_brace: true, ..Default::default() };
        Ok(Word::new(parse_word_parts(&raw, flags)?))
    }
}

/// Split `init; cond; update` on top-level semicolons.
fn split_top_level_semicolons(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ';' if depth == 0 => sections.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    sections.push(current);
    sections
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn first_command(script: &Script) -> &Command {
        &script.statements[0].pipelines[0].commands[0]
    }

    fn simple(script: &Script) -> &SimpleCommand {
        match first_command(script) {
            Command::Simple(cmd) => cmd,
            other => panic!("expected simple command, got {:?}", other),
        }
    }

    #[test]
    fn parses_simple_command() {
        let script = parse("echo hello world").unwrap();
        let cmd = simple(&script);
        assert!(cmd.name.is_some());
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn parses_and_or_chain() {
        let script = parse("a && b || c").unwrap();
        let stmt = &script.statements[0];
        assert_eq!(stmt.pipelines.len(), 3);
        assert_eq!(stmt.operators, vec![ListOperator::And, ListOperator::Or]);
    }

    #[test]
    fn semicolon_joins_statement() {
        let script = parse("a; b").unwrap();
        assert_eq!(script.statements[0].pipelines.len(), 2);
        assert_eq!(script.statements[0].operators, vec![ListOperator::Seq]);
    }

    #[test]
    fn background_statement() {
        let script = parse("sleep 5 &").unwrap();
        assert!(script.statements[0].background);
    }

    #[test]
    fn pipeline_with_negation() {
        let script = parse("! a | b").unwrap();
        let pipeline = &script.statements[0].pipelines[0];
        assert!(pipeline.negated);
        assert_eq!(pipeline.commands.len(), 2);
        assert_eq!(pipeline.stderr_pipes, vec![false]);
    }

    #[test]
    fn stderr_pipe() {
        let script = parse("a |& b").unwrap();
        assert_eq!(script.statements[0].pipelines[0].stderr_pipes, vec![true]);
    }

    #[test]
    fn assignment_prefix() {
        let script = parse("FOO=bar cmd").unwrap();
        let cmd = simple(&script);
        assert_eq!(cmd.assignments.len(), 1);
        assert_eq!(cmd.assignments[0].name, "FOO");
        assert!(!cmd.assignments[0].append);
    }

    #[test]
    fn assignment_only_command() {
        let script = parse("FOO=bar").unwrap();
        let cmd = simple(&script);
        assert!(cmd.name.is_none());
        assert_eq!(cmd.assignments.len(), 1);
    }

    #[test]
    fn append_assignment() {
        let script = parse("FOO+=bar").unwrap();
        assert!(simple(&script).assignments[0].append);
    }

    #[test]
    fn subscript_assignment() {
        let script = parse("arr[2]=x").unwrap();
        let assignment = &simple(&script).assignments[0];
        assert_eq!(assignment.name, "arr");
        assert_eq!(assignment.index.as_deref(), Some("2"));
    }

    #[test]
    fn array_literal_assignment() {
        let script = parse("arr=(a b c)").unwrap();
        let assignment = &simple(&script).assignments[0];
        let elements = assignment.array.as_ref().unwrap();
        assert_eq!(elements.len(), 3);
        assert!(elements.iter().all(|e| e.key.is_none()));
    }

    #[test]
    fn keyed_array_literal() {
        let script = parse("declare -A m; m=([x]=1 [y]=2)").unwrap();
        let stmt = &script.statements[0];
        match &stmt.pipelines[1].commands[0] {
            Command::Simple(cmd) => {
                let elements = cmd.assignments[0].array.as_ref().unwrap();
                assert_eq!(elements[0].key.as_deref(), Some("x"));
                assert_eq!(elements[1].key.as_deref(), Some("y"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn redirections_bind_anywhere() {
        let script = parse(">out cmd arg 2>&1").unwrap();
        let cmd = simple(&script);
        assert_eq!(cmd.redirections.len(), 2);
        assert_eq!(cmd.redirections[1].fd, Some(2));
        assert_eq!(cmd.redirections[1].op, RedirOp::DupOut);
    }

    #[test]
    fn heredoc_redirection() {
        let script = parse("cat <<EOF\nline1\nline2\nEOF\n").unwrap();
        let cmd = simple(&script);
        match &cmd.redirections[0].target {
            RedirTarget::HereDoc(doc) => {
                assert_eq!(doc.delimiter, "EOF");
                assert!(!doc.quoted);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn if_statement() {
        let script = parse("if a; then b; elif c; then d; else e; fi").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::If(node)) => {
                assert_eq!(node.clauses.len(), 2);
                assert!(node.else_body.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn while_and_until() {
        let script = parse("while a; do b; done").unwrap();
        assert!(matches!(first_command(&script), Command::Compound(CompoundCommand::While(_))));
        let script = parse("until a; do b; done").unwrap();
        assert!(matches!(first_command(&script), Command::Compound(CompoundCommand::Until(_))));
    }

    #[test]
    fn for_in_list() {
        let script = parse("for i in a b c; do echo $i; done").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::For(node)) => {
                assert_eq!(node.variable, "i");
                assert_eq!(node.words.as_ref().unwrap().len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn for_without_list_iterates_args() {
        let script = parse("for i; do echo $i; done").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::For(node)) => assert!(node.words.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn c_style_for() {
        let script = parse("for ((i=0; i<5; i++)); do echo $i; done").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::ForArith(node)) => {
                assert!(node.init.is_some());
                assert!(node.condition.is_some());
                assert!(node.update.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn c_style_for_empty_sections() {
        let script = parse("for ((;;)); do break; done").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::ForArith(node)) => {
                assert!(node.init.is_none());
                assert!(node.condition.is_none());
                assert!(node.update.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn case_statement_terminators() {
        let script = parse("case $x in a) echo a;; b) echo b;& c) echo c;;& *) echo d;; esac").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::Case(node)) => {
                assert_eq!(node.arms.len(), 4);
                assert_eq!(node.arms[0].terminator, CaseTerminator::Break);
                assert_eq!(node.arms[1].terminator, CaseTerminator::FallThrough);
                assert_eq!(node.arms[2].terminator, CaseTerminator::TestNext);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn case_multiple_patterns() {
        let script = parse("case $x in a|b|c) echo hit;; esac").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::Case(node)) => {
                assert_eq!(node.arms[0].patterns.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn subshell_and_group() {
        let script = parse("(a; b)").unwrap();
        assert!(matches!(first_command(&script), Command::Compound(CompoundCommand::Subshell(_))));
        let script = parse("{ a; b; }").unwrap();
        assert!(matches!(first_command(&script), Command::Compound(CompoundCommand::Group(_))));
    }

    #[test]
    fn arithmetic_command() {
        let script = parse("(( x > 0 ))").unwrap();
        assert!(matches!(first_command(&script), Command::Compound(CompoundCommand::Arith(_))));
    }

    #[test]
    fn conditional_command() {
        let script = parse("[[ -f /etc/passwd && $x == y* ]]").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::Cond(node)) => {
                assert!(matches!(node.expression, CondExpr::And(_, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn conditional_regex() {
        let script = parse("[[ $x =~ ^(a|b)+$ ]]").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::Cond(node)) => match &node.expression {
                CondExpr::Binary { op: CondBinaryOp::Regex, rhs, .. } => {
                    assert!(!rhs.parts.is_empty());
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn conditional_negation_and_grouping() {
        let script = parse("[[ ! ( -z $a || -z $b ) ]]").unwrap();
        match first_command(&script) {
            Command::Compound(CompoundCommand::Cond(node)) => {
                assert!(matches!(node.expression, CondExpr::Not(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn function_definitions() {
        let script = parse("greet() { echo hi; }").unwrap();
        match first_command(&script) {
            Command::Function(def) => assert_eq!(def.name, "greet"),
            other => panic!("unexpected {:?}", other),
        }

        let script = parse("function greet { echo hi; }").unwrap();
        assert!(matches!(first_command(&script), Command::Function(_)));

        let script = parse("function greet() { echo hi; }").unwrap();
        assert!(matches!(first_command(&script), Command::Function(_)));
    }

    #[test]
    fn select_statement() {
        let script = parse("select x in a b; do echo $x; done").unwrap();
        assert!(matches!(first_command(&script), Command::Compound(CompoundCommand::Select(_))));
    }

    #[test]
    fn compound_redirections() {
        let script = parse("{ echo a; } >out.txt").unwrap();
        match first_command(&script) {
            Command::Compound(compound) => assert_eq!(compound.redirections().len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn deferred_error_for_stray_terminator() {
        let script = parse("echo ok\n;;\n").unwrap();
        assert!(script.statements[1].deferred_error.is_some());
    }

    #[test]
    fn unterminated_if_is_error() {
        assert!(parse("if true; then echo hi").is_err());
    }

    #[test]
    fn reserved_words_as_arguments() {
        let script = parse("echo if then done").unwrap();
        assert_eq!(simple(&script).args.len(), 3);
    }

    #[test]
    fn multiline_statements() {
        let script = parse("echo a\necho b\n\necho c\n").unwrap();
        assert_eq!(script.statements.len(), 3);
    }

    #[test]
    fn line_numbers_tracked() {
        let script = parse("echo a\necho b").unwrap();
        assert_eq!(script.statements[0].line, 1);
        assert_eq!(script.statements[1].line, 2);
    }

    #[test]
    fn input_cap_is_enforced() {
        let big = "echo hi\n".repeat(10);
        assert!(crate::parser::parse_with_limit(&big, 16).is_err());
    }
}

//! Shell script parser: lexer, word/expansion/arithmetic sub-parsers and
//! the command parser that assembles the AST.

pub mod arith;
pub mod command;
pub mod expansion;
pub mod lexer;
pub mod word;

pub use command::Parser;
pub use lexer::{Lexer, LexError, Token, TokenKind};

/// Hard ceiling on parser input, applied before tokenizing.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1_048_576;

/// Parser failure: fatal for the input, exit status 2.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("syntax error near unexpected token `{token}'")]
    UnexpectedToken { token: String, line: usize },
    #[error("{message}")]
    Message { message: String },
    #[error("script is too large ({size} bytes exceeds the {limit} byte limit)")]
    InputTooLarge { size: usize, limit: usize },
}

impl ParseError {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { message: text.into() }
    }

    pub fn unexpected(token: impl Into<String>, line: usize) -> Self {
        Self::UnexpectedToken { token: token.into(), line }
    }
}

/// Parse a script with the default input cap.
pub fn parse(source: &str) -> Result<crate::ast::Script, ParseError> {
    parse_with_limit(source, DEFAULT_MAX_INPUT_BYTES)
}

/// Parse a script, refusing inputs larger than `max_bytes`.
pub fn parse_with_limit(source: &str, max_bytes: usize) -> Result<crate::ast::Script, ParseError> {
    if source.len() > max_bytes {
        return Err(ParseError::InputTooLarge { size: source.len(), limit: max_bytes });
    }
    parse_nested(source)
}

/// Parse without the byte cap; used for substitution bodies, `eval` and
/// other re-entrant parses whose text is already inside a capped input.
pub(crate) fn parse_nested(source: &str) -> Result<crate::ast::Script, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(source, tokens).parse_script()
}

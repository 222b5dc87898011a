//! AST node types.
//!
//! The tree mirrors the POSIX shell grammar: a script is a list of
//! statements, a statement is a list of pipelines joined by `&& || ;`,
//! a pipeline is a list of commands joined by `|` or `|&`. Words stay
//! unexpanded until the interpreter walks them.

use std::fmt;

// =============================================================================
// SOURCE POSITIONS
// =============================================================================

/// A line/column pair into the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Start/end of a node in the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

// =============================================================================
// SCRIPT / STATEMENTS / PIPELINES
// =============================================================================

/// A complete parsed script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub statements: Vec<Statement>,
}

/// Pipelines joined by `&&`, `||` or `;`, optionally backgrounded with `&`.
///
/// `operators.len() == pipelines.len() - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub pipelines: Vec<Pipeline>,
    pub operators: Vec<ListOperator>,
    pub background: bool,
    pub line: usize,
    /// Syntax anomaly reported only if this statement is actually reached.
    pub deferred_error: Option<DeferredSyntaxError>,
    /// Raw source text, kept for `set -v`.
    pub source_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOperator {
    And, // &&
    Or,  // ||
    Seq, // ;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredSyntaxError {
    pub token: String,
    pub message: String,
}

/// Commands joined by `|` / `|&`, optionally negated with `!`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub negated: bool,
    pub commands: Vec<Command>,
    /// Per connector: true when the stage was joined with `|&`.
    /// `stderr_pipes.len() == commands.len() - 1`.
    pub stderr_pipes: Vec<bool>,
}

// =============================================================================
// COMMANDS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Simple(SimpleCommand),
    Compound(CompoundCommand),
    Function(FunctionDef),
}

/// `VAR=x cmd arg >out` — assignments, a name, arguments, redirections.
/// `name` is `None` for assignment-only commands.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleCommand {
    pub assignments: Vec<Assignment>,
    pub name: Option<Word>,
    pub args: Vec<Word>,
    pub redirections: Vec<Redirection>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompoundCommand {
    If(IfCommand),
    While(LoopCommand),
    Until(LoopCommand),
    For(ForCommand),
    ForArith(ForArithCommand),
    Case(CaseCommand),
    Select(SelectCommand),
    Subshell(BlockCommand),
    Group(BlockCommand),
    Arith(ArithCommand),
    Cond(CondCommand),
}

impl CompoundCommand {
    /// Redirections attached to the compound as a whole.
    pub fn redirections(&self) -> &[Redirection] {
        match self {
            Self::If(c) => &c.redirections,
            Self::While(c) | Self::Until(c) => &c.redirections,
            Self::For(c) => &c.redirections,
            Self::ForArith(c) => &c.redirections,
            Self::Case(c) => &c.redirections,
            Self::Select(c) => &c.redirections,
            Self::Subshell(c) | Self::Group(c) => &c.redirections,
            Self::Arith(c) => &c.redirections,
            Self::Cond(c) => &c.redirections,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfCommand {
    pub clauses: Vec<IfClause>,
    pub else_body: Option<Vec<Statement>>,
    pub redirections: Vec<Redirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfClause {
    pub condition: Vec<Statement>,
    pub body: Vec<Statement>,
}

/// Shared by `while` and `until`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopCommand {
    pub condition: Vec<Statement>,
    pub body: Vec<Statement>,
    pub redirections: Vec<Redirection>,
}

/// `for NAME [in WORDS]; do …; done`. `words == None` iterates `"$@"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForCommand {
    pub variable: String,
    pub words: Option<Vec<Word>>,
    pub body: Vec<Statement>,
    pub redirections: Vec<Redirection>,
}

/// `for (( init; cond; update )); do …; done`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForArithCommand {
    pub init: Option<ArithmeticExpression>,
    pub condition: Option<ArithmeticExpression>,
    pub update: Option<ArithmeticExpression>,
    pub body: Vec<Statement>,
    pub redirections: Vec<Redirection>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseCommand {
    pub subject: Word,
    pub arms: Vec<CaseArm>,
    pub redirections: Vec<Redirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub patterns: Vec<Word>,
    pub body: Vec<Statement>,
    pub terminator: CaseTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTerminator {
    /// `;;` — stop after this arm.
    Break,
    /// `;&` — run the next arm's body without matching.
    FallThrough,
    /// `;;&` — keep testing subsequent arms.
    TestNext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectCommand {
    pub variable: String,
    pub words: Option<Vec<Word>>,
    pub body: Vec<Statement>,
    pub redirections: Vec<Redirection>,
}

/// `( … )` and `{ …; }` share a shape; the variant decides isolation.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCommand {
    pub body: Vec<Statement>,
    pub redirections: Vec<Redirection>,
}

/// `(( expression ))` as a command.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithCommand {
    pub expression: ArithmeticExpression,
    pub redirections: Vec<Redirection>,
    pub line: usize,
}

/// `[[ expression ]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CondCommand {
    pub expression: CondExpr,
    pub redirections: Vec<Redirection>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub body: Box<CompoundCommand>,
    pub redirections: Vec<Redirection>,
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// `NAME=value`, `NAME+=value`, `NAME[sub]=value`, `NAME=( … )`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    /// Raw subscript text for `NAME[sub]=…`; evaluated at assignment time.
    pub index: Option<String>,
    pub value: Option<Word>,
    pub append: bool,
    /// Present for `NAME=( … )` compound assignments.
    pub array: Option<Vec<ArrayElement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayElement {
    /// Raw `[key]=` prefix text, if given.
    pub key: Option<String>,
    pub value: Word,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    /// Explicit fd (`2>`), when given.
    pub fd: Option<i32>,
    /// `{name}>file` — the shell allocates an fd and stores it in `name`.
    pub fd_var: Option<String>,
    pub op: RedirOp,
    pub target: RedirTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirOp {
    In,         // <
    Out,        // >
    Append,     // >>
    Clobber,    // >|
    InOut,      // <>
    DupIn,      // <&
    DupOut,     // >&
    BothOut,    // &>
    BothAppend, // &>>
    HereString, // <<<
    HereDoc,    // << and <<-
}

impl fmt::Display for RedirOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::In => "<",
            Self::Out => ">",
            Self::Append => ">>",
            Self::Clobber => ">|",
            Self::InOut => "<>",
            Self::DupIn => "<&",
            Self::DupOut => ">&",
            Self::BothOut => "&>",
            Self::BothAppend => "&>>",
            Self::HereString => "<<<",
            Self::HereDoc => "<<",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirTarget {
    Word(Word),
    HereDoc(HereDoc),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HereDoc {
    pub delimiter: String,
    /// Body parsed as a word; a single literal when the delimiter was quoted.
    pub body: Word,
    /// Quoted delimiter (`<<'EOF'`) suppresses expansion.
    pub quoted: bool,
    /// `<<-` strips leading tabs from body lines and the delimiter line.
    pub strip_tabs: bool,
}

// =============================================================================
// WORDS
// =============================================================================

/// One shell word: a sequence of parts that expand and re-join into fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

impl Word {
    pub fn new(parts: Vec<WordPart>) -> Self {
        Self { parts }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self { parts: vec![WordPart::Literal(text.into())] }
    }

    /// True when every part is quoted text (expansion cannot split it).
    pub fn is_fully_quoted(&self) -> bool {
        self.parts.iter().all(|p| {
            matches!(p, WordPart::SingleQuoted(_) | WordPart::DoubleQuoted(_) | WordPart::Escaped(_))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WordPart {
    /// Plain text with no special meaning.
    Literal(String),
    /// `\x` — the character survives expansion and globbing verbatim.
    Escaped(String),
    /// `'…'`.
    SingleQuoted(String),
    /// `"…"` — inner parts expand but never split.
    DoubleQuoted(Vec<WordPart>),
    /// `$name`, `${name…}`.
    Parameter(ParameterExpansion),
    /// `$(…)` or `` `…` ``.
    CommandSub { body: Script, backquoted: bool },
    /// `$((…))`.
    ArithSub(ArithmeticExpression),
    /// `<(…)` / `>(…)`.
    ProcessSub { direction: ProcessSubDirection, body: Script },
    /// Unquoted glob text: `*`, `?`, `[…]`, extglob operators.
    Glob(String),
    /// `{a,b}` / `{1..9}` items, expanded before everything else.
    Brace(Vec<BraceItem>),
    /// `~` or `~user` at a tilde-eligible position.
    Tilde(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSubDirection {
    /// `<(…)` — the command's output is readable at the substituted path.
    Read,
    /// `>(…)` — writes to the substituted path feed the command.
    Write,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BraceItem {
    Word(Word),
    /// `{1..10}` / `{01..10..2}`; `pad_width > 0` when endpoints were
    /// zero-padded.
    NumberRange { start: i64, end: i64, step: Option<i64>, pad_width: usize },
    /// `{a..f}` / `{a..z..3}`.
    CharRange { start: char, end: char, step: Option<i64> },
}

// =============================================================================
// PARAMETER EXPANSION
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterExpansion {
    /// Variable name, positional digit string, or special character
    /// (`@ * # ? $ ! 0 _`). May carry a subscript: `arr[@]`, `arr[expr]`.
    pub name: String,
    pub op: Option<ParamOp>,
}

impl ParameterExpansion {
    pub fn plain(name: impl Into<String>) -> Self {
        Self { name: name.into(), op: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamOp {
    /// `${v-w}` / `${v:-w}`.
    Default { word: Word, check_empty: bool },
    /// `${v=w}` / `${v:=w}`.
    AssignDefault { word: Word, check_empty: bool },
    /// `${v?w}` / `${v:?w}`.
    ErrorIfUnset { word: Option<Word>, check_empty: bool },
    /// `${v+w}` / `${v:+w}`.
    Alternative { word: Word, check_empty: bool },
    /// `${#v}`.
    Length,
    /// `${v:off}` / `${v:off:len}`.
    Substring { offset: ArithmeticExpression, length: Option<ArithmeticExpression> },
    /// `${v#p} ${v##p} ${v%p} ${v%%p}`.
    RemovePattern { pattern: Word, side: PatternSide, greedy: bool },
    /// `${v/p/r}` and friends.
    ReplacePattern { pattern: Word, replacement: Option<Word>, all: bool, anchor: PatternAnchor },
    /// `${v^} ${v^^} ${v,} ${v,,}` with optional filter pattern.
    CaseConvert { upper: bool, all: bool, pattern: Option<Word> },
    /// `${v@Q}`-family transforms.
    Transform(TransformKind),
    /// `${!v}` with an optional further operation on the target.
    Indirect { op: Option<Box<ParamOp>> },
    /// `${!prefix*}` / `${!prefix@}`.
    NamePrefix { prefix: String, star: bool },
    /// `${!arr[@]}` / `${!arr[*]}`.
    ArrayKeys { name: String, star: bool },
    /// `${#v:…}` — parses, always errors at expansion time.
    LengthSliceError,
    /// Anything unrecognized; raises "bad substitution" when reached.
    BadSubstitution { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSide {
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternAnchor {
    None,
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Quote,      // @Q
    Prompt,     // @P
    Attributes, // @a
    Declare,    // @A
    Escape,     // @E  (expand ANSI-C escapes)
    Keyed,      // @K
    KeyValue,   // @k
    UpperFirst, // @u
    Upper,      // @U
    Lower,      // @L
}

impl TransformKind {
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'Q' => Some(Self::Quote),
            'P' => Some(Self::Prompt),
            'a' => Some(Self::Attributes),
            'A' => Some(Self::Declare),
            'E' => Some(Self::Escape),
            'K' => Some(Self::Keyed),
            'k' => Some(Self::KeyValue),
            'u' => Some(Self::UpperFirst),
            'U' => Some(Self::Upper),
            'L' => Some(Self::Lower),
            _ => None,
        }
    }
}

// =============================================================================
// ARITHMETIC
// =============================================================================

/// A parsed arithmetic expression plus its original text (needed for
/// error messages and for `declare -i` re-evaluation).
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticExpression {
    pub expr: ArithExpr,
    pub source: String,
}

impl ArithmeticExpression {
    pub fn number(value: i64) -> Self {
        Self { expr: ArithExpr::Number(value), source: value.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Number(i64),
    /// `x` or `$x`; bare names recurse through integer-valued variables.
    Var { name: String, dollar: bool },
    /// `$?`, `$#`, `$$`, `$!`, positional `$1`…
    Special(String),
    /// `arr[expr]` or `assoc[key]` (string key for associative arrays).
    Element { array: String, index: Option<Box<ArithExpr>>, key: Option<String> },
    /// `x = e`, `x += e`, `arr[i] op= e`.
    Assign {
        op: ArithAssignOp,
        name: String,
        index: Option<Box<ArithExpr>>,
        key: Option<String>,
        value: Box<ArithExpr>,
    },
    /// Assignment through a name built at runtime (`$v = 3` where `v=x`).
    AssignDynamic { op: ArithAssignOp, target: Box<ArithExpr>, value: Box<ArithExpr> },
    /// Element access through a dynamic array name.
    ElementDynamic { name: Box<ArithExpr>, index: Box<ArithExpr> },
    Unary { op: ArithUnaryOp, operand: Box<ArithExpr>, prefix: bool },
    Binary { op: ArithBinaryOp, lhs: Box<ArithExpr>, rhs: Box<ArithExpr> },
    Ternary { cond: Box<ArithExpr>, then: Box<ArithExpr>, otherwise: Box<ArithExpr> },
    Group(Box<ArithExpr>),
    /// `$((…))` nested inside an arithmetic context.
    Nested(Box<ArithExpr>),
    /// `$(…)` inside arithmetic; the raw command text runs, output re-parses.
    CommandSub(String),
    /// `${…}` inside arithmetic; expanded textually then re-parsed.
    Braced(String),
    /// Adjacent `$x$y` pieces concatenated textually before numeric parse.
    Concat(Vec<ArithExpr>),
    /// `'c'` — legal in `(( ))`, an error in `$(( ))`.
    SingleQuoted(String),
    /// `a[1][2]` — parses, errors when evaluated.
    DoubleSubscript { array: String },
    /// Deferred parse failure, raised only if the expression runs.
    SyntaxError { token: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithAssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    Or,
    Xor,
}

// =============================================================================
// CONDITIONAL EXPRESSIONS ([[ ]])
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
    Not(Box<CondExpr>),
    And(Box<CondExpr>, Box<CondExpr>),
    Or(Box<CondExpr>, Box<CondExpr>),
    Group(Box<CondExpr>),
    Unary { op: CondUnaryOp, operand: Word },
    Binary { op: CondBinaryOp, lhs: Word, rhs: Word },
    /// A bare word: true when non-empty.
    Word(Word),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondUnaryOp {
    BlockSpecial,    // -b
    CharSpecial,     // -c
    Directory,       // -d
    Exists,          // -e
    RegularFile,     // -f
    Setgid,          // -g
    Symlink,         // -h and -L
    Sticky,          // -k
    Fifo,            // -p
    Readable,        // -r
    NonEmptyFile,    // -s
    Tty,             // -t
    Setuid,          // -u
    Writable,        // -w
    Executable,      // -x
    OwnedByGroup,    // -G
    ModifiedSince,   // -N
    OwnedByUser,     // -O
    Socket,          // -S
    ZeroLength,      // -z
    NonZeroLength,   // -n
    OptionEnabled,   // -o
    VarSet,          // -v
    VarNameref,      // -R
    FileExistsAlias, // -a (unary file-exists)
}

impl CondUnaryOp {
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-a" => Some(Self::FileExistsAlias),
            "-b" => Some(Self::BlockSpecial),
            "-c" => Some(Self::CharSpecial),
            "-d" => Some(Self::Directory),
            "-e" => Some(Self::Exists),
            "-f" => Some(Self::RegularFile),
            "-g" => Some(Self::Setgid),
            "-h" | "-L" => Some(Self::Symlink),
            "-k" => Some(Self::Sticky),
            "-p" => Some(Self::Fifo),
            "-r" => Some(Self::Readable),
            "-s" => Some(Self::NonEmptyFile),
            "-t" => Some(Self::Tty),
            "-u" => Some(Self::Setuid),
            "-w" => Some(Self::Writable),
            "-x" => Some(Self::Executable),
            "-G" => Some(Self::OwnedByGroup),
            "-N" => Some(Self::ModifiedSince),
            "-O" => Some(Self::OwnedByUser),
            "-S" => Some(Self::Socket),
            "-z" => Some(Self::ZeroLength),
            "-n" => Some(Self::NonZeroLength),
            "-o" => Some(Self::OptionEnabled),
            "-v" => Some(Self::VarSet),
            "-R" => Some(Self::VarNameref),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondBinaryOp {
    Eq,         // = and ==  (pattern match unless rhs quoted)
    Ne,         // !=
    Regex,      // =~
    Lt,         // <   (locale-free string compare)
    Gt,         // >
    NumEq,      // -eq
    NumNe,      // -ne
    NumLt,      // -lt
    NumLe,      // -le
    NumGt,      // -gt
    NumGe,      // -ge
    NewerThan,  // -nt
    OlderThan,  // -ot
    SameFile,   // -ef
}

impl CondBinaryOp {
    pub fn from_token(tok: &str) -> Option<Self> {
        match tok {
            "=" | "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "=~" => Some(Self::Regex),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "-eq" => Some(Self::NumEq),
            "-ne" => Some(Self::NumNe),
            "-lt" => Some(Self::NumLt),
            "-le" => Some(Self::NumLe),
            "-gt" => Some(Self::NumGt),
            "-ge" => Some(Self::NumGe),
            "-nt" => Some(Self::NewerThan),
            "-ot" => Some(Self::OlderThan),
            "-ef" => Some(Self::SameFile),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_literal_helper() {
        let w = Word::literal("hello");
        assert_eq!(w.parts, vec![WordPart::Literal("hello".to_string())]);
    }

    #[test]
    fn fully_quoted_word() {
        let quoted = Word::new(vec![
            WordPart::SingleQuoted("a".into()),
            WordPart::DoubleQuoted(vec![WordPart::Literal("b".into())]),
        ]);
        assert!(quoted.is_fully_quoted());

        let mixed = Word::new(vec![
            WordPart::SingleQuoted("a".into()),
            WordPart::Literal("b".into()),
        ]);
        assert!(!mixed.is_fully_quoted());
    }

    #[test]
    fn transform_kind_letters() {
        assert_eq!(TransformKind::from_letter('Q'), Some(TransformKind::Quote));
        assert_eq!(TransformKind::from_letter('k'), Some(TransformKind::KeyValue));
        assert_eq!(TransformKind::from_letter('K'), Some(TransformKind::Keyed));
        assert_eq!(TransformKind::from_letter('z'), None);
    }

    #[test]
    fn cond_ops_from_text() {
        assert_eq!(CondBinaryOp::from_token("=~"), Some(CondBinaryOp::Regex));
        assert_eq!(CondBinaryOp::from_token("-nt"), Some(CondBinaryOp::NewerThan));
        assert_eq!(CondUnaryOp::from_flag("-f"), Some(CondUnaryOp::RegularFile));
        assert_eq!(CondUnaryOp::from_flag("-q"), None);
    }

    #[test]
    fn redirection_operator_display() {
        assert_eq!(RedirOp::Append.to_string(), ">>");
        assert_eq!(RedirOp::BothOut.to_string(), "&>");
        assert_eq!(RedirOp::HereString.to_string(), "<<<");
    }
}

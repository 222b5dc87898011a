//! Control flow and runtime errors.
//!
//! `break`, `continue`, `return` and `exit` are modeled as error values
//! that unwind to the construct that handles them. Every variant carries
//! the stdout/stderr produced so far, so output survives the unwind:
//! handlers prepend their own accumulated output before re-raising.

use std::fmt;

/// Output carried through an unwind.
pub trait CarriesOutput {
    fn stdout(&self) -> &str;
    fn stderr(&self) -> &str;
    fn stdout_mut(&mut self) -> &mut String;
    fn stderr_mut(&mut self) -> &mut String;

    /// Prepend the current context's output before re-raising.
    fn prepend_output(&mut self, stdout: &str, stderr: &str) {
        if !stdout.is_empty() {
            let combined = format!("{}{}", stdout, self.stdout());
            *self.stdout_mut() = combined;
        }
        if !stderr.is_empty() {
            let combined = format!("{}{}", stderr, self.stderr());
            *self.stderr_mut() = combined;
        }
    }
}

macro_rules! carries_output {
    ($ty:ty) => {
        impl CarriesOutput for $ty {
            fn stdout(&self) -> &str {
                &self.stdout
            }
            fn stderr(&self) -> &str {
                &self.stderr
            }
            fn stdout_mut(&mut self) -> &mut String {
                &mut self.stdout
            }
            fn stderr_mut(&mut self) -> &mut String {
                &mut self.stderr
            }
        }
    };
}

/// `break n`.
#[derive(Debug, Clone, Default)]
pub struct LoopBreak {
    pub levels: u32,
    pub stdout: String,
    pub stderr: String,
}
carries_output!(LoopBreak);

/// `continue n`.
#[derive(Debug, Clone, Default)]
pub struct LoopContinue {
    pub levels: u32,
    pub stdout: String,
    pub stderr: String,
}
carries_output!(LoopContinue);

/// `return [code]`.
#[derive(Debug, Clone, Default)]
pub struct FunctionReturn {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}
carries_output!(FunctionReturn);

/// `exit [code]` — unwinds the whole script (or subshell).
#[derive(Debug, Clone, Default)]
pub struct ShellExit {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}
carries_output!(ShellExit);

/// `set -e` fired.
#[derive(Debug, Clone, Default)]
pub struct ErrexitAbort {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}
carries_output!(ErrexitAbort);

/// `set -u` read of an unset variable.
#[derive(Debug, Clone)]
pub struct UnboundVariable {
    pub name: String,
    pub stdout: String,
    pub stderr: String,
}
carries_output!(UnboundVariable);

impl UnboundVariable {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let stderr = format!("sandbash: {}: unbound variable\n", name);
        Self { name, stdout: String::new(), stderr }
    }
}

/// Expansion-time failure: bad substitution, `${v:?}`, arithmetic errors
/// at a reachable site, invalid regex.
#[derive(Debug, Clone)]
pub struct ExpansionFailure {
    pub message: String,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Fatal failures abort the surrounding script even without errexit
    /// (bash treats `${v:?}` and arithmetic syntax errors this way).
    pub fatal: bool,
}
carries_output!(ExpansionFailure);

impl ExpansionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let stderr = format!("sandbash: {}\n", message);
        Self { message, code: 1, stdout: String::new(), stderr, fatal: false }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        let mut e = Self::new(message);
        e.fatal = true;
        e
    }
}

/// `failglob` with no matches.
#[derive(Debug, Clone)]
pub struct GlobFailure {
    pub pattern: String,
    pub stdout: String,
    pub stderr: String,
}
carries_output!(GlobFailure);

impl GlobFailure {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let stderr = format!("sandbash: no match: {}\n", pattern);
        Self { pattern, stdout: String::new(), stderr }
    }
}

/// An execution budget was exceeded; always fatal, exit 137.
#[derive(Debug, Clone)]
pub struct LimitExceeded {
    pub message: String,
    pub stdout: String,
    pub stderr: String,
}
carries_output!(LimitExceeded);

impl LimitExceeded {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let stderr = format!("sandbash: {}\n", message);
        Self { message, stdout: String::new(), stderr }
    }
}

/// The interpreter's unwind channel.
#[derive(Debug, Clone)]
pub enum Interrupt {
    Break(LoopBreak),
    Continue(LoopContinue),
    Return(FunctionReturn),
    Exit(ShellExit),
    Errexit(ErrexitAbort),
    Unbound(UnboundVariable),
    Expansion(ExpansionFailure),
    Glob(GlobFailure),
    Limit(LimitExceeded),
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::Break(_) => write!(f, "break"),
            Interrupt::Continue(_) => write!(f, "continue"),
            Interrupt::Return(_) => write!(f, "return"),
            Interrupt::Exit(e) => write!(f, "exit {}", e.code),
            Interrupt::Errexit(e) => write!(f, "errexit: status {}", e.code),
            Interrupt::Unbound(e) => write!(f, "{}: unbound variable", e.name),
            Interrupt::Expansion(e) => write!(f, "{}", e.message),
            Interrupt::Glob(e) => write!(f, "no match: {}", e.pattern),
            Interrupt::Limit(e) => write!(f, "{}", e.message),
        }
    }
}

impl std::error::Error for Interrupt {}

impl Interrupt {
    pub fn carried(&mut self) -> &mut dyn CarriesOutput {
        match self {
            Interrupt::Break(e) => e,
            Interrupt::Continue(e) => e,
            Interrupt::Return(e) => e,
            Interrupt::Exit(e) => e,
            Interrupt::Errexit(e) => e,
            Interrupt::Unbound(e) => e,
            Interrupt::Expansion(e) => e,
            Interrupt::Glob(e) => e,
            Interrupt::Limit(e) => e,
        }
    }

    /// Prepend output, returning self for re-raising.
    pub fn with_output(mut self, stdout: &str, stderr: &str) -> Self {
        self.carried().prepend_output(stdout, stderr);
        self
    }

    /// The exit code the shell reports if this interrupt reaches the top.
    pub fn exit_code(&self) -> i32 {
        match self {
            Interrupt::Break(_) | Interrupt::Continue(_) => 0,
            Interrupt::Return(e) => e.code,
            Interrupt::Exit(e) => e.code,
            Interrupt::Errexit(e) => e.code,
            Interrupt::Unbound(_) => 1,
            Interrupt::Expansion(e) => e.code,
            Interrupt::Glob(_) => 1,
            Interrupt::Limit(_) => crate::interp::limits::LIMIT_EXIT_CODE,
        }
    }
}

impl From<LoopBreak> for Interrupt {
    fn from(e: LoopBreak) -> Self {
        Interrupt::Break(e)
    }
}
impl From<LoopContinue> for Interrupt {
    fn from(e: LoopContinue) -> Self {
        Interrupt::Continue(e)
    }
}
impl From<FunctionReturn> for Interrupt {
    fn from(e: FunctionReturn) -> Self {
        Interrupt::Return(e)
    }
}
impl From<ShellExit> for Interrupt {
    fn from(e: ShellExit) -> Self {
        Interrupt::Exit(e)
    }
}
impl From<ErrexitAbort> for Interrupt {
    fn from(e: ErrexitAbort) -> Self {
        Interrupt::Errexit(e)
    }
}
impl From<UnboundVariable> for Interrupt {
    fn from(e: UnboundVariable) -> Self {
        Interrupt::Unbound(e)
    }
}
impl From<ExpansionFailure> for Interrupt {
    fn from(e: ExpansionFailure) -> Self {
        Interrupt::Expansion(e)
    }
}
impl From<GlobFailure> for Interrupt {
    fn from(e: GlobFailure) -> Self {
        Interrupt::Glob(e)
    }
}
impl From<LimitExceeded> for Interrupt {
    fn from(e: LimitExceeded) -> Self {
        Interrupt::Limit(e)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_output_keeps_order() {
        let mut exit = ShellExit { code: 3, stdout: "late\n".into(), stderr: String::new() };
        exit.prepend_output("early\n", "");
        assert_eq!(exit.stdout, "early\nlate\n");
    }

    #[test]
    fn with_output_through_enum() {
        let interrupt = Interrupt::Exit(ShellExit { code: 0, stdout: "b".into(), stderr: "y".into() });
        let interrupt = interrupt.with_output("a", "x");
        match interrupt {
            Interrupt::Exit(e) => {
                assert_eq!(e.stdout, "ab");
                assert_eq!(e.stderr, "xy");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Interrupt::from(ShellExit { code: 7, ..Default::default() }).exit_code(), 7);
        assert_eq!(Interrupt::from(UnboundVariable::new("x")).exit_code(), 1);
        assert_eq!(Interrupt::from(LimitExceeded::new("too deep")).exit_code(), 137);
    }

    #[test]
    fn unbound_message_shape() {
        let e = UnboundVariable::new("FOO");
        assert_eq!(e.stderr, "sandbash: FOO: unbound variable\n");
    }
}

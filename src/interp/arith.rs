//! Arithmetic evaluation.
//!
//! 64-bit two's-complement with wraparound. Bare variable names recurse
//! through their values, so `x='y+1' y=2; echo $((x))` prints 3. Errors
//! (division by zero, negative exponent, deferred syntax errors) surface
//! only when the expression is actually evaluated.

use crate::ast::types::{ArithAssignOp, ArithBinaryOp, ArithExpr, ArithUnaryOp};
use crate::interp::engine::Interp;
use crate::interp::error::{ExpansionFailure, Interrupt};
use crate::interp::state::{ShellState, Value};

const MAX_ARITH_RECURSION: u32 = 64;

struct ArithCtx {
    depth: u32,
    /// `(( … ))` command context: single-quoted operands are tolerated.
    command: bool,
}

impl<'a> Interp<'a> {
    /// Evaluate in expansion context (`$((…))`, subscripts, offsets).
    pub fn eval_arith(&self, state: &mut ShellState, expr: &ArithExpr) -> Result<i64, Interrupt> {
        let mut ctx = ArithCtx { depth: 0, command: false };
        self.eval(state, expr, &mut ctx)
    }

    /// Evaluate in `(( … ))` command context.
    pub fn eval_arith_cmd(&self, state: &mut ShellState, expr: &ArithExpr) -> Result<i64, Interrupt> {
        let mut ctx = ArithCtx { depth: 0, command: true };
        self.eval(state, expr, &mut ctx)
    }

    fn eval(
        &self,
        state: &mut ShellState,
        expr: &ArithExpr,
        ctx: &mut ArithCtx,
    ) -> Result<i64, Interrupt> {
        ctx.depth += 1;
        if ctx.depth > MAX_ARITH_RECURSION {
            return Err(Interrupt::Expansion(ExpansionFailure::new(
                "expression recursion level exceeded",
            )));
        }
        let result = self.eval_inner(state, expr, ctx);
        ctx.depth -= 1;
        result
    }

    fn eval_inner(
        &self,
        state: &mut ShellState,
        expr: &ArithExpr,
        ctx: &mut ArithCtx,
    ) -> Result<i64, Interrupt> {
        match expr {
            ArithExpr::Number(n) => Ok(*n),

            ArithExpr::Var { name, .. } => {
                let text = state.get_scalar(name).unwrap_or_default();
                self.eval_text(state, &text, ctx)
            }

            ArithExpr::Special(name) => {
                let text = self.special_value(state, name);
                self.eval_text(state, &text, ctx)
            }

            ArithExpr::Element { array, index, key } => {
                let text = self.read_element(state, array, index.as_deref(), key.as_deref(), ctx)?;
                self.eval_text(state, &text, ctx)
            }

            ArithExpr::ElementDynamic { name, index } => {
                let array = self.piece_text(state, name, ctx)?;
                let idx = self.eval(state, index, ctx)?;
                let text =
                    self.read_element(state, &array, Some(&ArithExpr::Number(idx)), None, ctx)?;
                self.eval_text(state, &text, ctx)
            }

            ArithExpr::Assign { op, name, index, key, value } => {
                let rhs = self.eval(state, value, ctx)?;
                let new = if *op == ArithAssignOp::Assign {
                    rhs
                } else {
                    let current_text = match (index, key) {
                        (None, None) => state.get_scalar(name).unwrap_or_default(),
                        _ => self.read_element(state, name, index.as_deref(), key.as_deref(), ctx)?,
                    };
                    let current = self.eval_text(state, &current_text, ctx)?;
                    apply_compound_op(*op, current, rhs)
                        .map_err(|m| Interrupt::Expansion(ExpansionFailure::new(m)))?
                };
                self.store(state, name, index.as_deref(), key.as_deref(), new, ctx)?;
                Ok(new)
            }

            ArithExpr::AssignDynamic { op, target, value } => {
                let name = self.piece_text(state, target, ctx)?;
                let name = name.trim();
                if !crate::parser::lexer::is_valid_name(name) {
                    return Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                        "attempted assignment to non-variable (error token is \"{}\")",
                        name
                    ))));
                }
                let rhs = self.eval(state, value, ctx)?;
                let new = if *op == ArithAssignOp::Assign {
                    rhs
                } else {
                    let current_text = state.get_scalar(name).unwrap_or_default();
                    let current = self.eval_text(state, &current_text, ctx)?;
                    apply_compound_op(*op, current, rhs)
                        .map_err(|m| Interrupt::Expansion(ExpansionFailure::new(m)))?
                };
                self.store(state, name, None, None, new, ctx)?;
                Ok(new)
            }

            ArithExpr::Unary { op, operand, prefix } => match op {
                ArithUnaryOp::Plus => self.eval(state, operand, ctx),
                ArithUnaryOp::Minus => Ok(self.eval(state, operand, ctx)?.wrapping_neg()),
                ArithUnaryOp::Not => Ok((self.eval(state, operand, ctx)? == 0) as i64),
                ArithUnaryOp::BitNot => Ok(!self.eval(state, operand, ctx)?),
                ArithUnaryOp::Increment | ArithUnaryOp::Decrement => {
                    self.step(state, operand, *op, *prefix, ctx)
                }
            },

            ArithExpr::Binary { op, lhs, rhs } => self.binary(state, *op, lhs, rhs, ctx),

            ArithExpr::Ternary { cond, then, otherwise } => {
                if self.eval(state, cond, ctx)? != 0 {
                    self.eval(state, then, ctx)
                } else {
                    self.eval(state, otherwise, ctx)
                }
            }

            ArithExpr::Group(inner) | ArithExpr::Nested(inner) => self.eval(state, inner, ctx),

            ArithExpr::CommandSub(text) => {
                let output = self.run_command_sub_text(state, text)?;
                self.eval_text(state, &output, ctx)
            }

            ArithExpr::Braced(text) => {
                let value = self.expand_braced_text(state, text)?;
                self.eval_text(state, &value, ctx)
            }

            ArithExpr::Concat(pieces) => {
                let mut combined = String::new();
                for piece in pieces {
                    combined.push_str(&self.piece_text(state, piece, ctx)?);
                }
                self.eval_text(state, &combined, ctx)
            }

            ArithExpr::SingleQuoted(content) => {
                if ctx.command {
                    self.eval_text(state, content, ctx)
                } else {
                    Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                        "syntax error: operand expected (error token is \"'{}'\")",
                        content
                    ))))
                }
            }

            ArithExpr::DoubleSubscript { array } => {
                Err(Interrupt::Expansion(ExpansionFailure::new(format!(
                    "{}: bad array subscript",
                    array
                ))))
            }

            ArithExpr::SyntaxError { token, message } => {
                let text = if token.is_empty() {
                    message.clone()
                } else if message.contains("error token") {
                    message.clone()
                } else {
                    format!("{} (error token is \"{}\")", message, token)
                };
                Err(Interrupt::Expansion(ExpansionFailure::new(text)))
            }
        }
    }

    fn binary(
        &self,
        state: &mut ShellState,
        op: ArithBinaryOp,
        lhs: &ArithExpr,
        rhs: &ArithExpr,
        ctx: &mut ArithCtx,
    ) -> Result<i64, Interrupt> {
        // Short-circuit forms evaluate the right side conditionally.
        match op {
            ArithBinaryOp::LogicalAnd => {
                if self.eval(state, lhs, ctx)? == 0 {
                    return Ok(0);
                }
                return Ok((self.eval(state, rhs, ctx)? != 0) as i64);
            }
            ArithBinaryOp::LogicalOr => {
                if self.eval(state, lhs, ctx)? != 0 {
                    return Ok(1);
                }
                return Ok((self.eval(state, rhs, ctx)? != 0) as i64);
            }
            ArithBinaryOp::Comma => {
                self.eval(state, lhs, ctx)?;
                return self.eval(state, rhs, ctx);
            }
            _ => {}
        }

        let a = self.eval(state, lhs, ctx)?;
        let b = self.eval(state, rhs, ctx)?;
        let fail = |m: String| Interrupt::Expansion(ExpansionFailure::new(m));

        Ok(match op {
            ArithBinaryOp::Add => a.wrapping_add(b),
            ArithBinaryOp::Sub => a.wrapping_sub(b),
            ArithBinaryOp::Mul => a.wrapping_mul(b),
            ArithBinaryOp::Div => {
                if b == 0 {
                    return Err(fail("division by 0 (error token is \"0\")".to_string()));
                }
                a.wrapping_div(b)
            }
            ArithBinaryOp::Rem => {
                if b == 0 {
                    return Err(fail("division by 0 (error token is \"0\")".to_string()));
                }
                a.wrapping_rem(b)
            }
            ArithBinaryOp::Pow => {
                if b < 0 {
                    return Err(fail(format!("exponent less than 0 (error token is \"{}\")", b)));
                }
                let mut result: i64 = 1;
                let mut base = a;
                let mut exp = b as u64;
                while exp > 0 {
                    if exp & 1 == 1 {
                        result = result.wrapping_mul(base);
                    }
                    base = base.wrapping_mul(base);
                    exp >>= 1;
                }
                result
            }
            ArithBinaryOp::Shl => a.wrapping_shl((b & 63) as u32),
            ArithBinaryOp::Shr => a.wrapping_shr((b & 63) as u32),
            ArithBinaryOp::Lt => (a < b) as i64,
            ArithBinaryOp::Le => (a <= b) as i64,
            ArithBinaryOp::Gt => (a > b) as i64,
            ArithBinaryOp::Ge => (a >= b) as i64,
            ArithBinaryOp::Eq => (a == b) as i64,
            ArithBinaryOp::Ne => (a != b) as i64,
            ArithBinaryOp::BitAnd => a & b,
            ArithBinaryOp::BitOr => a | b,
            ArithBinaryOp::BitXor => a ^ b,
            ArithBinaryOp::LogicalAnd | ArithBinaryOp::LogicalOr | ArithBinaryOp::Comma => {
                unreachable!("handled above")
            }
        })
    }

    /// `++x` / `x--` — operand must name a storable location.
    fn step(
        &self,
        state: &mut ShellState,
        operand: &ArithExpr,
        op: ArithUnaryOp,
        prefix: bool,
        ctx: &mut ArithCtx,
    ) -> Result<i64, Interrupt> {
        let delta = if op == ArithUnaryOp::Increment { 1 } else { -1 };
        match operand {
            ArithExpr::Var { name, dollar: false } => {
                let text = state.get_scalar(name).unwrap_or_default();
                let old = self.eval_text(state, &text, ctx)?;
                let new = old.wrapping_add(delta);
                self.store(state, name, None, None, new, ctx)?;
                Ok(if prefix { new } else { old })
            }
            ArithExpr::Element { array, index, key } => {
                let text = self.read_element(state, array, index.as_deref(), key.as_deref(), ctx)?;
                let old = self.eval_text(state, &text, ctx)?;
                let new = old.wrapping_add(delta);
                self.store(state, array, index.as_deref(), key.as_deref(), new, ctx)?;
                Ok(if prefix { new } else { old })
            }
            // `++5` reduces to unary plus/minus chains in bash; mirror it.
            other => {
                let value = self.eval(state, other, ctx)?;
                Ok(value.wrapping_add(if prefix { delta } else { 0 }))
            }
        }
    }

    fn store(
        &self,
        state: &mut ShellState,
        name: &str,
        index: Option<&ArithExpr>,
        key: Option<&str>,
        value: i64,
        ctx: &mut ArithCtx,
    ) -> Result<(), Interrupt> {
        let is_assoc =
            matches!(state.get_var(name).map(|v| &v.value), Some(Value::Associative(_)));
        if index.is_none() && key.is_none() {
            return state
                .set_scalar(name, value.to_string())
                .map_err(|m| Interrupt::Expansion(ExpansionFailure::new(m)));
        }

        let subscript = if is_assoc {
            key.unwrap_or_default().to_string()
        } else {
            match index {
                Some(expr) => self.eval(state, expr, ctx)?.to_string(),
                None => key.unwrap_or_default().to_string(),
            }
        };
        match self.assign_element(state, name, &subscript, value.to_string(), false)? {
            crate::interp::assign::AssignOutcome::Done => Ok(()),
            crate::interp::assign::AssignOutcome::Failed(m) => {
                Err(Interrupt::Expansion(ExpansionFailure::new(m)))
            }
        }
    }

    fn read_element(
        &self,
        state: &mut ShellState,
        array: &str,
        index: Option<&ArithExpr>,
        key: Option<&str>,
        ctx: &mut ArithCtx,
    ) -> Result<String, Interrupt> {
        match state.get_var(array).map(|v| v.value.clone()) {
            Some(Value::Associative(map)) => {
                let key_text = match key {
                    Some(raw) => self.expand_subscript_key(state, raw)?,
                    None => String::new(),
                };
                Ok(map.get(&key_text).cloned().unwrap_or_default())
            }
            Some(Value::Indexed(map)) => {
                let idx = match index {
                    Some(expr) => self.eval(state, expr, ctx)?,
                    None => match key {
                        Some(raw) => self.eval_arith_text(state, raw)?,
                        None => 0,
                    },
                };
                let idx = if idx < 0 {
                    map.keys().next_back().map(|&k| k + 1).unwrap_or(0) + idx
                } else {
                    idx
                };
                Ok(map.get(&idx).cloned().unwrap_or_default())
            }
            Some(Value::Scalar(s)) => {
                let idx = match index {
                    Some(expr) => self.eval(state, expr, ctx)?,
                    None => 0,
                };
                Ok(if idx == 0 { s } else { String::new() })
            }
            None => Ok(String::new()),
        }
    }

    /// Textual operand → number, re-entering the parser for expressions.
    fn eval_text(
        &self,
        state: &mut ShellState,
        text: &str,
        ctx: &mut ArithCtx,
    ) -> Result<i64, Interrupt> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Ok(n);
        }
        let parsed = crate::parser::arith::parse_arithmetic(trimmed);
        self.eval(state, &parsed.expr, ctx)
    }

    /// A concat piece as text, before numeric interpretation.
    fn piece_text(
        &self,
        state: &mut ShellState,
        piece: &ArithExpr,
        ctx: &mut ArithCtx,
    ) -> Result<String, Interrupt> {
        match piece {
            ArithExpr::Var { name, dollar: true } => Ok(state.get_scalar(name).unwrap_or_default()),
            ArithExpr::Var { name, dollar: false } => Ok(name.clone()),
            ArithExpr::Braced(text) => self.expand_braced_text(state, text),
            ArithExpr::CommandSub(text) => self.run_command_sub_text(state, text),
            ArithExpr::Number(n) => Ok(n.to_string()),
            ArithExpr::Special(name) => Ok(self.special_value(state, name)),
            other => Ok(self.eval(state, other, ctx)?.to_string()),
        }
    }

    fn special_value(&self, state: &ShellState, name: &str) -> String {
        match name {
            "?" => state.last_exit_code.to_string(),
            "#" => state.positional.len().to_string(),
            "$" => state.shell_pid.to_string(),
            "!" => state.last_bg_pid.to_string(),
            "*" | "@" => state.positional.join(" "),
            digits if digits.chars().all(|c| c.is_ascii_digit()) => {
                let n: usize = digits.parse().unwrap_or(0);
                if n == 0 {
                    state.script_name.clone()
                } else {
                    state.positional.get(n - 1).cloned().unwrap_or_default()
                }
            }
            _ => String::new(),
        }
    }
}

fn apply_compound_op(op: ArithAssignOp, current: i64, rhs: i64) -> Result<i64, String> {
    Ok(match op {
        ArithAssignOp::Assign => rhs,
        ArithAssignOp::Add => current.wrapping_add(rhs),
        ArithAssignOp::Sub => current.wrapping_sub(rhs),
        ArithAssignOp::Mul => current.wrapping_mul(rhs),
        ArithAssignOp::Div => {
            if rhs == 0 {
                return Err("division by 0 (error token is \"0\")".to_string());
            }
            current.wrapping_div(rhs)
        }
        ArithAssignOp::Rem => {
            if rhs == 0 {
                return Err("division by 0 (error token is \"0\")".to_string());
            }
            current.wrapping_rem(rhs)
        }
        ArithAssignOp::Shl => current.wrapping_shl((rhs & 63) as u32),
        ArithAssignOp::Shr => current.wrapping_shr((rhs & 63) as u32),
        ArithAssignOp::And => current & rhs,
        ArithAssignOp::Or => current | rhs,
        ArithAssignOp::Xor => current ^ rhs,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::interp::testkit::run;

    #[test]
    fn basic_arithmetic() {
        assert_eq!(run("echo $((2 + 3 * 4))").stdout, "14\n");
        assert_eq!(run("echo $(( (2 + 3) * 4 ))").stdout, "20\n");
        assert_eq!(run("echo $((10 / 3)) $((10 % 3))").stdout, "3 1\n");
        assert_eq!(run("echo $((2 ** 10))").stdout, "1024\n");
    }

    #[test]
    fn mixed_bases() {
        assert_eq!(run("echo $(( 2#1010 + 16#FF ))").stdout, "265\n");
        assert_eq!(run("echo $((0x10)) $((010))").stdout, "16 8\n");
    }

    #[test]
    fn variables_recurse() {
        assert_eq!(run("x=5; echo $((x + 1))").stdout, "6\n");
        assert_eq!(run("y=2; x='y+1'; echo $((x))").stdout, "3\n");
        assert_eq!(run("echo $((unset_var + 1))").stdout, "1\n");
    }

    #[test]
    fn assignment_operators() {
        assert_eq!(run("x=1; echo $((x += 4)); echo $x").stdout, "5\n5\n");
        assert_eq!(run("x=8; : $((x /= 2)); echo $x").stdout, "4\n");
        assert_eq!(run("x=1; : $((x <<= 4)); echo $x").stdout, "16\n");
    }

    #[test]
    fn increment_and_decrement() {
        assert_eq!(run("x=5; echo $((x++)); echo $x").stdout, "5\n6\n");
        assert_eq!(run("x=5; echo $((++x)); echo $x").stdout, "6\n6\n");
        assert_eq!(run("x=5; echo $((x--)) $((--x))").stdout, "5 3\n");
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(run("echo $((3 > 2)) $((2 > 3))").stdout, "1 0\n");
        assert_eq!(run("echo $((1 && 2)) $((1 && 0)) $((0 || 3))").stdout, "1 0 1\n");
        assert_eq!(run("echo $((!0)) $((!7))").stdout, "1 0\n");
    }

    #[test]
    fn ternary_and_comma() {
        assert_eq!(run("echo $((1 ? 10 : 20)) $((0 ? 10 : 20))").stdout, "10 20\n");
        assert_eq!(run("echo $((1+1, 2+2))").stdout, "4\n");
    }

    #[test]
    fn bitwise() {
        assert_eq!(run("echo $((5 & 3)) $((5 | 3)) $((5 ^ 3)) $((~0))").stdout, "1 7 6 -1\n");
        assert_eq!(run("echo $((1 << 4)) $((256 >> 4))").stdout, "16 16\n");
    }

    #[test]
    fn division_by_zero_reports() {
        let out = run("echo $((1 / 0)); echo after:$?");
        assert!(out.stderr.contains("division by 0"));
        assert!(out.stdout.contains("after:1"));
    }

    #[test]
    fn negative_exponent_reports() {
        let out = run("echo $((2 ** -1))");
        assert!(out.stderr.contains("exponent less than 0"));
    }

    #[test]
    fn deferred_syntax_error_only_when_reached() {
        let out = run("if false; then echo $((2x)); fi; echo fine");
        assert_eq!(out.stdout, "fine\n");
        assert_eq!(out.stderr, "");

        let out = run("echo $((2x))");
        assert!(out.stderr.contains("error token"));
    }

    #[test]
    fn double_subscript_is_runtime_error() {
        let out = run("a=(1 2); echo $((a[0][1]))");
        assert!(out.stderr.contains("bad array subscript"));
    }

    #[test]
    fn array_elements_in_arithmetic() {
        assert_eq!(run("a=(10 20 30); echo $((a[1] + a[2]))").stdout, "50\n");
        assert_eq!(run("a=(1 2 3); i=2; echo $((a[i]))").stdout, "3\n");
    }

    #[test]
    fn special_parameters_in_arithmetic() {
        assert_eq!(run("set -- a b c; echo $(($# * 2))").stdout, "6\n");
        assert_eq!(run("false; echo $(($? + 1))").stdout, "2\n");
    }

    #[test]
    fn dollar_variables_substitute() {
        assert_eq!(run("x=7; echo $(($x + 1))").stdout, "8\n");
        assert_eq!(run("x=7; echo $((${x} * 2))").stdout, "14\n");
    }

    #[test]
    fn command_substitution_inside_arithmetic() {
        assert_eq!(run("echo $(( $(echo 21) * 2 ))").stdout, "42\n");
    }

    #[test]
    fn wraparound() {
        assert_eq!(
            run("echo $((9223372036854775807 + 1))").stdout,
            "-9223372036854775808\n"
        );
    }

    #[test]
    fn whitespace_and_empty() {
        assert_eq!(run("echo $(( ))").stdout, "0\n");
    }
}

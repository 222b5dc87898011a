//! Arithmetic parser.
//!
//! Recursive-descent parser for the C-like grammar of `$((…))`, `((…))`,
//! array subscripts and substring offsets. Parsing never fails: any
//! anomaly becomes a `SyntaxError` node that the evaluator raises only if
//! the expression is actually reached.

use crate::ast::types::{
    ArithAssignOp, ArithBinaryOp, ArithExpr, ArithUnaryOp, ArithmeticExpression,
};

/// Parse an arithmetic expression. The empty string evaluates to 0.
pub fn parse_arithmetic(input: &str) -> ArithmeticExpression {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ArithmeticExpression { expr: ArithExpr::Number(0), source: input.to_string() };
    }

    let mut parser = ArithParser::new(trimmed);
    let expr = parser.parse_comma();

    let expr = if let Some((token, message)) = parser.failed.take() {
        ArithExpr::SyntaxError { token, message }
    } else {
        parser.skip_ws();
        if parser.pos < parser.chars.len() {
            let tail: String = parser.chars[parser.pos..].iter().collect();
            ArithExpr::SyntaxError {
                token: tail.trim().to_string(),
                message: "syntax error in expression".to_string(),
            }
        } else {
            expr
        }
    };

    ArithmeticExpression { expr, source: input.to_string() }
}

struct ArithParser {
    chars: Vec<char>,
    pos: usize,
    failed: Option<(String, String)>,
}

impl ArithParser {
    fn new(input: &str) -> Self {
        Self { chars: strip_double_quotes(input).chars().collect(), pos: 0, failed: None }
    }

    fn fail(&mut self, token: impl Into<String>, message: impl Into<String>) -> ArithExpr {
        if self.failed.is_none() {
            self.failed = Some((token.into(), message.into()));
        }
        // Park the cursor so the caller unwinds without looping.
        self.pos = self.chars.len();
        ArithExpr::Number(0)
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.get(self.pos), Some(&' ') | Some(&'\t') | Some(&'\n')) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Consume `op` if it is next (after whitespace) and not a prefix of a
    /// longer operator in `blockers`.
    fn eat(&mut self, op: &str, blockers: &[&str]) -> bool {
        self.skip_ws();
        let op_chars: Vec<char> = op.chars().collect();
        for (i, &c) in op_chars.iter().enumerate() {
            if self.peek_at(i) != Some(c) {
                return false;
            }
        }
        for blocker in blockers {
            let b: Vec<char> = blocker.chars().collect();
            if b.len() > op_chars.len() {
                let matches_blocker =
                    b.iter().enumerate().all(|(i, &c)| self.peek_at(i) == Some(c));
                if matches_blocker {
                    return false;
                }
            }
        }
        self.pos += op_chars.len();
        true
    }

    // =========================================================================
    // Precedence ladder
    // =========================================================================

    fn parse_comma(&mut self) -> ArithExpr {
        let mut expr = self.parse_assignment();
        while self.eat(",", &[]) {
            let rhs = self.parse_assignment();
            expr = ArithExpr::Binary {
                op: ArithBinaryOp::Comma,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
        expr
    }

    fn parse_assignment(&mut self) -> ArithExpr {
        let lhs = self.parse_ternary();
        let op = self.peek_assign_op();
        if let Some((op, len)) = op {
            match assign_target(&lhs) {
                Some(Target::Named { name, index, key }) => {
                    self.pos += len;
                    let value = self.parse_assignment();
                    return ArithExpr::Assign { op, name, index, key, value: Box::new(value) };
                }
                Some(Target::Dynamic) => {
                    self.pos += len;
                    let value = self.parse_assignment();
                    return ArithExpr::AssignDynamic {
                        op,
                        target: Box::new(lhs),
                        value: Box::new(value),
                    };
                }
                None => {
                    return self.fail("=", "attempted assignment to non-variable");
                }
            }
        }
        lhs
    }

    /// An assignment operator at the cursor, with its length.
    fn peek_assign_op(&mut self) -> Option<(ArithAssignOp, usize)> {
        self.skip_ws();
        let c0 = self.peek()?;
        let c1 = self.peek_at(1);
        let c2 = self.peek_at(2);
        match (c0, c1, c2) {
            ('<', Some('<'), Some('=')) => Some((ArithAssignOp::Shl, 3)),
            ('>', Some('>'), Some('=')) => Some((ArithAssignOp::Shr, 3)),
            ('+', Some('='), _) => Some((ArithAssignOp::Add, 2)),
            ('-', Some('='), _) => Some((ArithAssignOp::Sub, 2)),
            ('*', Some('='), _) => Some((ArithAssignOp::Mul, 2)),
            ('/', Some('='), _) => Some((ArithAssignOp::Div, 2)),
            ('%', Some('='), _) => Some((ArithAssignOp::Rem, 2)),
            ('&', Some('='), _) => Some((ArithAssignOp::And, 2)),
            ('|', Some('='), _) => Some((ArithAssignOp::Or, 2)),
            ('^', Some('='), _) => Some((ArithAssignOp::Xor, 2)),
            ('=', next, _) if next != Some('=') => Some((ArithAssignOp::Assign, 1)),
            _ => None,
        }
    }

    fn parse_ternary(&mut self) -> ArithExpr {
        let cond = self.parse_logical_or();
        if self.eat("?", &[]) {
            let then = self.parse_assignment();
            if !self.eat(":", &[]) {
                return self.fail("?", "expected `:' in conditional expression");
            }
            let otherwise = self.parse_assignment();
            return ArithExpr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            };
        }
        cond
    }

    fn parse_logical_or(&mut self) -> ArithExpr {
        let mut expr = self.parse_logical_and();
        while self.eat("||", &[]) {
            let rhs = self.parse_logical_and();
            expr = binary(ArithBinaryOp::LogicalOr, expr, rhs);
        }
        expr
    }

    fn parse_logical_and(&mut self) -> ArithExpr {
        let mut expr = self.parse_bit_or();
        while self.eat("&&", &[]) {
            let rhs = self.parse_bit_or();
            expr = binary(ArithBinaryOp::LogicalAnd, expr, rhs);
        }
        expr
    }

    fn parse_bit_or(&mut self) -> ArithExpr {
        let mut expr = self.parse_bit_xor();
        while self.eat("|", &["||", "|="]) {
            let rhs = self.parse_bit_xor();
            expr = binary(ArithBinaryOp::BitOr, expr, rhs);
        }
        expr
    }

    fn parse_bit_xor(&mut self) -> ArithExpr {
        let mut expr = self.parse_bit_and();
        while self.eat("^", &["^="]) {
            let rhs = self.parse_bit_and();
            expr = binary(ArithBinaryOp::BitXor, expr, rhs);
        }
        expr
    }

    fn parse_bit_and(&mut self) -> ArithExpr {
        let mut expr = self.parse_equality();
        while self.eat("&", &["&&", "&="]) {
            let rhs = self.parse_equality();
            expr = binary(ArithBinaryOp::BitAnd, expr, rhs);
        }
        expr
    }

    fn parse_equality(&mut self) -> ArithExpr {
        let mut expr = self.parse_relational();
        loop {
            if self.eat("==", &[]) {
                let rhs = self.parse_relational();
                expr = binary(ArithBinaryOp::Eq, expr, rhs);
            } else if self.eat("!=", &[]) {
                let rhs = self.parse_relational();
                expr = binary(ArithBinaryOp::Ne, expr, rhs);
            } else {
                break;
            }
        }
        expr
    }

    fn parse_relational(&mut self) -> ArithExpr {
        let mut expr = self.parse_shift();
        loop {
            if self.eat("<=", &[]) {
                let rhs = self.parse_shift();
                expr = binary(ArithBinaryOp::Le, expr, rhs);
            } else if self.eat(">=", &[]) {
                let rhs = self.parse_shift();
                expr = binary(ArithBinaryOp::Ge, expr, rhs);
            } else if self.eat("<", &["<<", "<="]) {
                let rhs = self.parse_shift();
                expr = binary(ArithBinaryOp::Lt, expr, rhs);
            } else if self.eat(">", &[">>", ">="]) {
                let rhs = self.parse_shift();
                expr = binary(ArithBinaryOp::Gt, expr, rhs);
            } else {
                break;
            }
        }
        expr
    }

    fn parse_shift(&mut self) -> ArithExpr {
        let mut expr = self.parse_additive();
        loop {
            if self.eat("<<", &["<<="]) {
                let rhs = self.parse_additive();
                expr = binary(ArithBinaryOp::Shl, expr, rhs);
            } else if self.eat(">>", &[">>="]) {
                let rhs = self.parse_additive();
                expr = binary(ArithBinaryOp::Shr, expr, rhs);
            } else {
                break;
            }
        }
        expr
    }

    fn parse_additive(&mut self) -> ArithExpr {
        let mut expr = self.parse_multiplicative();
        loop {
            if self.eat("+", &["+=", "++"]) {
                let rhs = self.parse_multiplicative();
                expr = binary(ArithBinaryOp::Add, expr, rhs);
            } else if self.eat("-", &["-=", "--"]) {
                let rhs = self.parse_multiplicative();
                expr = binary(ArithBinaryOp::Sub, expr, rhs);
            } else {
                break;
            }
        }
        expr
    }

    fn parse_multiplicative(&mut self) -> ArithExpr {
        let mut expr = self.parse_power();
        loop {
            if self.eat("*", &["**", "*="]) {
                let rhs = self.parse_power();
                expr = binary(ArithBinaryOp::Mul, expr, rhs);
            } else if self.eat("/", &["/="]) {
                let rhs = self.parse_power();
                expr = binary(ArithBinaryOp::Div, expr, rhs);
            } else if self.eat("%", &["%="]) {
                let rhs = self.parse_power();
                expr = binary(ArithBinaryOp::Rem, expr, rhs);
            } else {
                break;
            }
        }
        expr
    }

    fn parse_power(&mut self) -> ArithExpr {
        let base = self.parse_unary();
        if self.eat("**", &[]) {
            // Right-associative.
            let exponent = self.parse_power();
            return binary(ArithBinaryOp::Pow, base, exponent);
        }
        base
    }

    fn parse_unary(&mut self) -> ArithExpr {
        self.skip_ws();
        if self.eat("++", &[]) {
            let operand = self.parse_unary();
            return ArithExpr::Unary {
                op: ArithUnaryOp::Increment,
                operand: Box::new(operand),
                prefix: true,
            };
        }
        if self.eat("--", &[]) {
            let operand = self.parse_unary();
            return ArithExpr::Unary {
                op: ArithUnaryOp::Decrement,
                operand: Box::new(operand),
                prefix: true,
            };
        }
        if self.eat("!", &["!="]) {
            let operand = self.parse_unary();
            return ArithExpr::Unary { op: ArithUnaryOp::Not, operand: Box::new(operand), prefix: true };
        }
        if self.eat("~", &[]) {
            let operand = self.parse_unary();
            return ArithExpr::Unary {
                op: ArithUnaryOp::BitNot,
                operand: Box::new(operand),
                prefix: true,
            };
        }
        if self.eat("+", &["+=", "++"]) {
            let operand = self.parse_unary();
            return ArithExpr::Unary { op: ArithUnaryOp::Plus, operand: Box::new(operand), prefix: true };
        }
        if self.eat("-", &["-=", "--"]) {
            let operand = self.parse_unary();
            return ArithExpr::Unary { op: ArithUnaryOp::Minus, operand: Box::new(operand), prefix: true };
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ArithExpr {
        let mut expr = self.parse_primary();

        // Textual concatenation: adjacent $-pieces with no whitespace.
        if is_concat_piece(&expr) {
            let mut pieces = vec![];
            while matches!(self.peek(), Some(c) if c == '$' || c.is_ascii_alphanumeric() || c == '_') {
                let next = self.parse_primary();
                let stop = !is_concat_piece(&next);
                pieces.push(next);
                if stop {
                    break;
                }
            }
            if !pieces.is_empty() {
                let mut all = vec![expr];
                all.extend(pieces);
                expr = ArithExpr::Concat(all);
            }
        }

        // Subscript on a dynamic name: $name[expr].
        if matches!(expr, ArithExpr::Var { dollar: true, .. } | ArithExpr::Braced(_) | ArithExpr::Concat(_))
            && self.peek() == Some('[')
        {
            self.pos += 1;
            let index = self.parse_comma();
            if !self.eat("]", &[]) {
                return self.fail("[", "expected `]'");
            }
            expr = ArithExpr::ElementDynamic { name: Box::new(expr), index: Box::new(index) };
        }

        loop {
            if self.eat("++", &[]) {
                expr = ArithExpr::Unary {
                    op: ArithUnaryOp::Increment,
                    operand: Box::new(expr),
                    prefix: false,
                };
            } else if self.eat("--", &[]) {
                expr = ArithExpr::Unary {
                    op: ArithUnaryOp::Decrement,
                    operand: Box::new(expr),
                    prefix: false,
                };
            } else {
                break;
            }
        }
        expr
    }

    fn parse_primary(&mut self) -> ArithExpr {
        self.skip_ws();
        let c = match self.peek() {
            Some(c) => c,
            None => return self.fail("", "unexpected end of expression"),
        };

        if c == '(' {
            self.pos += 1;
            let inner = self.parse_comma();
            if !self.eat(")", &[]) {
                return self.fail("(", "expected `)'");
            }
            return ArithExpr::Group(Box::new(inner));
        }

        if c == '\'' {
            let start = self.pos + 1;
            let mut j = start;
            while j < self.chars.len() && self.chars[j] != '\'' {
                j += 1;
            }
            if j >= self.chars.len() {
                return self.fail("'", "unterminated quoted string");
            }
            let content: String = self.chars[start..j].iter().collect();
            self.pos = j + 1;
            return ArithExpr::SingleQuoted(content);
        }

        if c == '$' {
            return self.parse_dollar_primary();
        }

        if c.is_ascii_digit() {
            return self.parse_number();
        }

        if c.is_ascii_alphabetic() || c == '_' {
            return self.parse_name_primary();
        }

        if c == '#' {
            return self.fail("#", "syntax error: operand expected");
        }

        self.fail(c.to_string(), "syntax error: operand expected")
    }

    fn parse_dollar_primary(&mut self) -> ArithExpr {
        // self.peek() == '$'
        match self.peek_at(1) {
            Some('{') => {
                let mut depth = 1;
                let mut j = self.pos + 2;
                while j < self.chars.len() && depth > 0 {
                    match self.chars[j] {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                if depth != 0 {
                    return self.fail("${", "unterminated parameter expansion");
                }
                let text: String = self.chars[self.pos + 2..j - 1].iter().collect();
                self.pos = j;
                ArithExpr::Braced(text)
            }
            Some('(') => {
                let nested = self.peek_at(2) == Some('(');
                let mut depth = 1;
                let mut j = self.pos + 2;
                while j < self.chars.len() && depth > 0 {
                    match self.chars[j] {
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                if depth != 0 {
                    return self.fail("$(", "unterminated substitution");
                }
                let text: String = self.chars[self.pos + 2..j - 1].iter().collect();
                self.pos = j;
                if nested && text.starts_with('(') && text.ends_with(')') {
                    let inner = &text[1..text.len() - 1];
                    return ArithExpr::Nested(Box::new(parse_arithmetic(inner).expr));
                }
                ArithExpr::CommandSub(text)
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut j = self.pos + 1;
                while matches!(self.chars.get(j), Some(ch) if ch.is_ascii_alphanumeric() || *ch == '_')
                {
                    j += 1;
                }
                let name: String = self.chars[self.pos + 1..j].iter().collect();
                self.pos = j;
                ArithExpr::Var { name, dollar: true }
            }
            Some(c) if c.is_ascii_digit() || "#?$!*@".contains(c) => {
                self.pos += 2;
                ArithExpr::Special(c.to_string())
            }
            _ => self.fail("$", "syntax error: operand expected"),
        }
    }

    fn parse_number(&mut self) -> ArithExpr {
        let start = self.pos;
        let mut j = self.pos;
        while matches!(self.chars.get(j), Some(ch) if ch.is_ascii_alphanumeric()) {
            j += 1;
        }

        // base#digits — digits may include letters, @ and _.
        if self.chars.get(j) == Some(&'#') {
            let base_text: String = self.chars[start..j].iter().collect();
            if let Ok(base) = base_text.parse::<u32>() {
                let digits_start = j + 1;
                let mut k = digits_start;
                while matches!(self.chars.get(k), Some(ch) if ch.is_ascii_alphanumeric() || *ch == '@' || *ch == '_')
                {
                    k += 1;
                }
                let digits: String = self.chars[digits_start..k].iter().collect();
                self.pos = k;
                return match parse_based_number(base, &digits) {
                    Ok(value) => ArithExpr::Number(value),
                    Err(message) => {
                        let token: String = self.chars[start..k].iter().collect();
                        self.fail(token, message)
                    }
                };
            }
        }

        let text: String = self.chars[start..j].iter().collect();
        self.pos = j;

        let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).map_err(|_| format!("value too great for base (error token is \"{}\")", text))
        } else if text.len() > 1 && text.starts_with('0') && text.chars().all(|c| c.is_ascii_digit()) {
            i64::from_str_radix(&text, 8).map_err(|_| format!("value too great for base (error token is \"{}\")", text))
        } else if text.chars().all(|c| c.is_ascii_digit()) {
            text.parse::<i64>().map_err(|_| format!("invalid number: {}", text))
        } else {
            Err(format!("value too great for base (error token is \"{}\")", text))
        };

        match parsed {
            Ok(value) => {
                // A number glued to a subscript (2[x]) is also malformed.
                if self.peek() == Some('[') {
                    return self.fail(text, "syntax error: invalid arithmetic operator");
                }
                ArithExpr::Number(value)
            }
            Err(message) => self.fail(text, message),
        }
    }

    fn parse_name_primary(&mut self) -> ArithExpr {
        let start = self.pos;
        let mut j = self.pos;
        while matches!(self.chars.get(j), Some(ch) if ch.is_ascii_alphanumeric() || *ch == '_') {
            j += 1;
        }
        let name: String = self.chars[start..j].iter().collect();
        self.pos = j;

        if self.peek() == Some('[') {
            let open = self.pos;
            let mut depth = 1;
            let mut k = open + 1;
            while k < self.chars.len() && depth > 0 {
                match self.chars[k] {
                    '[' => depth += 1,
                    ']' => depth -= 1,
                    _ => {}
                }
                k += 1;
            }
            if depth != 0 {
                return self.fail(name, "expected `]'");
            }
            let raw: String = self.chars[open + 1..k - 1].iter().collect();
            self.pos = k;

            // a[1][2] parses but errors when evaluated.
            if self.peek() == Some('[') {
                let mut d = 1;
                let mut m = self.pos + 1;
                while m < self.chars.len() && d > 0 {
                    match self.chars[m] {
                        '[' => d += 1,
                        ']' => d -= 1,
                        _ => {}
                    }
                    m += 1;
                }
                self.pos = m;
                return ArithExpr::DoubleSubscript { array: name };
            }

            let index_expr = parse_arithmetic(&raw);
            let index = match index_expr.expr {
                ArithExpr::SyntaxError { .. } => None,
                other => Some(Box::new(other)),
            };
            return ArithExpr::Element { array: name, index, key: Some(raw) };
        }

        ArithExpr::Var { name, dollar: false }
    }
}

enum Target {
    Named { name: String, index: Option<Box<ArithExpr>>, key: Option<String> },
    Dynamic,
}

fn assign_target(expr: &ArithExpr) -> Option<Target> {
    match expr {
        ArithExpr::Var { name, dollar: false } => {
            Some(Target::Named { name: name.clone(), index: None, key: None })
        }
        ArithExpr::Element { array, index, key } => Some(Target::Named {
            name: array.clone(),
            index: index.clone(),
            key: key.clone(),
        }),
        ArithExpr::Var { dollar: true, .. }
        | ArithExpr::Braced(_)
        | ArithExpr::Concat(_)
        | ArithExpr::ElementDynamic { .. } => Some(Target::Dynamic),
        ArithExpr::Group(inner) => assign_target(inner),
        _ => None,
    }
}

fn is_concat_piece(expr: &ArithExpr) -> bool {
    matches!(
        expr,
        ArithExpr::Var { dollar: true, .. } | ArithExpr::Braced(_) | ArithExpr::CommandSub(_)
    )
}

fn binary(op: ArithBinaryOp, lhs: ArithExpr, rhs: ArithExpr) -> ArithExpr {
    ArithExpr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
}

/// Digits for bases up to 64: 0-9, a-z, A-Z, @, _.
fn parse_based_number(base: u32, digits: &str) -> Result<i64, String> {
    if !(2..=64).contains(&base) {
        return Err(format!("invalid arithmetic base (error token is \"{}#{}\")", base, digits));
    }
    if digits.is_empty() {
        return Err(format!("invalid number (error token is \"{}#\")", base));
    }
    let mut value: i64 = 0;
    for c in digits.chars() {
        let digit = match c {
            '0'..='9' => c as i64 - '0' as i64,
            'a'..='z' => {
                // In bases ≤ 36 letters are case-insensitive.
                c as i64 - 'a' as i64 + 10
            }
            'A'..='Z' => {
                if base <= 36 {
                    c as i64 - 'A' as i64 + 10
                } else {
                    c as i64 - 'A' as i64 + 36
                }
            }
            '@' => 62,
            '_' => 63,
            _ => return Err(format!("invalid digit (error token is \"{}\")", c)),
        };
        if digit >= base as i64 {
            return Err(format!("value too great for base (error token is \"{}#{}\")", base, digits));
        }
        value = value.wrapping_mul(base as i64).wrapping_add(digit);
    }
    Ok(value)
}

/// Double-quoted substrings are text-substituted before parsing.
fn strip_double_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_single = false;
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                in_single = !in_single;
                out.push(c);
                i += 1;
            }
            '"' if !in_single => {
                i += 1;
            }
            '\\' if !in_single && chars.get(i + 1) == Some(&'"') => {
                out.push('"');
                i += 2;
            }
            _ => {
                out.push(c);
                i += 1;
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

    fn expr(input: &str) -> ArithExpr {
        parse_arithmetic(input).expr
    }

    #[test]
    fn number_literal() {
        assert_eq!(expr("42"), ArithExpr::Number(42));
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(expr(""), ArithExpr::Number(0));
        assert_eq!(expr("   "), ArithExpr::Number(0));
    }

    #[test]
    fn hex_and_octal() {
        assert_eq!(expr("0xff"), ArithExpr::Number(255));
        assert_eq!(expr("0X10"), ArithExpr::Number(16));
        assert_eq!(expr("010"), ArithExpr::Number(8));
    }

    #[test]
    fn based_numbers() {
        assert_eq!(expr("2#1010"), ArithExpr::Number(10));
        assert_eq!(expr("16#FF"), ArithExpr::Number(255));
        assert_eq!(expr("36#z"), ArithExpr::Number(35));
        assert_eq!(expr("64#@"), ArithExpr::Number(62));
        assert_eq!(expr("64#_"), ArithExpr::Number(63));
    }

    #[test]
    fn bad_base_digit_is_deferred() {
        assert!(matches!(expr("2#2"), ArithExpr::SyntaxError { .. }));
        assert!(matches!(expr("65#1"), ArithExpr::SyntaxError { .. }));
    }

    #[test]
    fn precedence_add_mul() {
        // 1 + 2 * 3 → 1 + (2 * 3)
        match expr("1 + 2 * 3") {
            ArithExpr::Binary { op: ArithBinaryOp::Add, rhs, .. } => {
                assert!(matches!(*rhs, ArithExpr::Binary { op: ArithBinaryOp::Mul, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn power_is_right_associative() {
        // 2 ** 3 ** 2 → 2 ** (3 ** 2)
        match expr("2 ** 3 ** 2") {
            ArithExpr::Binary { op: ArithBinaryOp::Pow, rhs, .. } => {
                assert!(matches!(*rhs, ArithExpr::Binary { op: ArithBinaryOp::Pow, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ternary() {
        assert!(matches!(expr("a ? 1 : 2"), ArithExpr::Ternary { .. }));
    }

    #[test]
    fn comma_sequences() {
        assert!(matches!(expr("1, 2"), ArithExpr::Binary { op: ArithBinaryOp::Comma, .. }));
    }

    #[test]
    fn assignment() {
        match expr("x = 5") {
            ArithExpr::Assign { op: ArithAssignOp::Assign, name, .. } => assert_eq!(name, "x"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(expr("x += 1"), ArithExpr::Assign { op: ArithAssignOp::Add, .. }));
        assert!(matches!(expr("x <<= 2"), ArithExpr::Assign { op: ArithAssignOp::Shl, .. }));
    }

    #[test]
    fn array_element_assignment() {
        match expr("a[3] = 7") {
            ArithExpr::Assign { name, index, .. } => {
                assert_eq!(name, "a");
                assert!(index.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn equality_not_assignment() {
        assert!(matches!(expr("x == 5"), ArithExpr::Binary { op: ArithBinaryOp::Eq, .. }));
    }

    #[test]
    fn pre_and_post_increment() {
        assert!(matches!(
            expr("++x"),
            ArithExpr::Unary { op: ArithUnaryOp::Increment, prefix: true, .. }
        ));
        assert!(matches!(
            expr("x++"),
            ArithExpr::Unary { op: ArithUnaryOp::Increment, prefix: false, .. }
        ));
        assert!(matches!(
            expr("x--"),
            ArithExpr::Unary { op: ArithUnaryOp::Decrement, prefix: false, .. }
        ));
    }

    #[test]
    fn unary_minus() {
        assert!(matches!(
            expr("-5"),
            ArithExpr::Unary { op: ArithUnaryOp::Minus, prefix: true, .. }
        ));
    }

    #[test]
    fn variables_with_and_without_dollar() {
        assert_eq!(expr("x"), ArithExpr::Var { name: "x".into(), dollar: false });
        assert_eq!(expr("$x"), ArithExpr::Var { name: "x".into(), dollar: true });
    }

    #[test]
    fn special_variables() {
        assert_eq!(expr("$?"), ArithExpr::Special("?".into()));
        assert_eq!(expr("$#"), ArithExpr::Special("#".into()));
    }

    #[test]
    fn array_element_access() {
        match expr("a[i+1]") {
            ArithExpr::Element { array, index, key } => {
                assert_eq!(array, "a");
                assert!(index.is_some());
                assert_eq!(key.as_deref(), Some("i+1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn double_subscript_is_deferred() {
        assert!(matches!(expr("a[1][2]"), ArithExpr::DoubleSubscript { .. }));
    }

    #[test]
    fn trailing_garbage_is_deferred() {
        assert!(matches!(expr("1 + 2 abc"), ArithExpr::SyntaxError { .. }));
        assert!(matches!(expr("42x"), ArithExpr::SyntaxError { .. }));
        assert!(matches!(expr("#"), ArithExpr::SyntaxError { .. }));
    }

    #[test]
    fn grouping() {
        match expr("(1 + 2) * 3") {
            ArithExpr::Binary { op: ArithBinaryOp::Mul, lhs, .. } => {
                assert!(matches!(*lhs, ArithExpr::Group(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn braced_expansion_text() {
        assert_eq!(expr("${x}"), ArithExpr::Braced("x".into()));
    }

    #[test]
    fn command_substitution_text() {
        assert_eq!(expr("$(echo 3)"), ArithExpr::CommandSub("echo 3".into()));
    }

    #[test]
    fn nested_arithmetic() {
        assert!(matches!(expr("$((1+2))"), ArithExpr::Nested(_)));
    }

    #[test]
    fn concat_of_dollar_pieces() {
        assert!(matches!(expr("$a$b"), ArithExpr::Concat(_)));
    }

    #[test]
    fn double_quotes_are_text() {
        assert_eq!(expr("\"5\" + 1"), expr("5 + 1"));
    }

    #[test]
    fn single_quote_primary() {
        assert_eq!(expr("'abc'"), ArithExpr::SingleQuoted("abc".into()));
    }

    #[test]
    fn logical_operators() {
        assert!(matches!(expr("1 && 0"), ArithExpr::Binary { op: ArithBinaryOp::LogicalAnd, .. }));
        assert!(matches!(expr("1 || 0"), ArithExpr::Binary { op: ArithBinaryOp::LogicalOr, .. }));
    }

    #[test]
    fn shift_and_bitwise() {
        assert!(matches!(expr("1 << 3"), ArithExpr::Binary { op: ArithBinaryOp::Shl, .. }));
        assert!(matches!(expr("5 & 3"), ArithExpr::Binary { op: ArithBinaryOp::BitAnd, .. }));
        assert!(matches!(expr("5 | 3"), ArithExpr::Binary { op: ArithBinaryOp::BitOr, .. }));
        assert!(matches!(expr("5 ^ 3"), ArithExpr::Binary { op: ArithBinaryOp::BitXor, .. }));
    }

    #[test]
    fn scenario_mixed_bases() {
        // 2#1010 + 16#FF = 10 + 255 = 265 once evaluated.
        match expr("2#1010 + 16#FF") {
            ArithExpr::Binary { op: ArithBinaryOp::Add, lhs, rhs } => {
                assert_eq!(*lhs, ArithExpr::Number(10));
                assert_eq!(*rhs, ArithExpr::Number(255));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

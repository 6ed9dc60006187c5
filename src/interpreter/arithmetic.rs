//! Arithmetic Evaluator
//!
//! Infix `$(( ... ))` evaluation over 64-bit signed integers with C
//! precedence and associativity. Identifiers resolve through the variable
//! store (unset names are 0); assignment operators and `++`/`--` write
//! back through the store. Overflow wraps (two's complement); division by
//! zero is an `ArithmeticError`.
//!
//! Untaken branches of `?:`, `&&`, and `||` are parsed but not evaluated,
//! so their side effects do not fire.

use crate::errors::ShellError;
use crate::shell::Shell;

/// Evaluate an arithmetic expression.
pub fn evaluate(shell: &mut Shell, expr: &str) -> Result<i64, ShellError> {
    let substituted = substitute_dollars(shell, expr);
    let tokens = tokenize(&substituted)?;
    let mut parser = ArithParser {
        shell,
        tokens,
        pos: 0,
        src: expr.to_string(),
    };
    let value = parser.parse_comma(true)?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected trailing tokens"));
    }
    Ok(value)
}

/// Evaluate for a truth test (`(( ... ))`, `while (( ... ))`): exit status
/// 0 when the value is non-zero.
pub fn evaluate_as_status(shell: &mut Shell, expr: &str) -> Result<i32, ShellError> {
    let value = evaluate(shell, expr)?;
    Ok(if value != 0 { 0 } else { 1 })
}

/// Replace `$NAME` / `${NAME}` with the variable's value before
/// tokenizing; arithmetic text is treated as if double-quoted.
fn substitute_dollars(shell: &Shell, expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' && i + 1 < chars.len() {
            let (name, end) = if chars[i + 1] == '{' {
                let mut j = i + 2;
                while j < chars.len() && chars[j] != '}' {
                    j += 1;
                }
                (chars[i + 2..j].iter().collect::<String>(), (j + 1).min(chars.len()))
            } else {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                (chars[i + 1..j].iter().collect::<String>(), j)
            };
            if !name.is_empty() {
                let value = shell.vars.get(&name).unwrap_or("0");
                out.push_str(if value.is_empty() { "0" } else { value });
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum ArithToken {
    Number(i64),
    Ident(String),
    Op(String),
}

fn tokenize(expr: &str) -> Result<Vec<ArithToken>, ShellError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    // multi-character operators, longest first
    const OPS: &[&str] = &[
        "<<=", ">>=", "**", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "++", "--", "+=",
        "-=", "*=", "/=", "%=", "&=", "^=", "|=", "+", "-", "*", "/", "%", "<", ">", "!", "~",
        "&", "^", "|", "?", ":", ",", "=", "(", ")",
    ];

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let mut j = i;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '#') {
                j += 1;
            }
            let text: String = chars[i..j].iter().collect();
            let value = parse_number(&text)
                .ok_or_else(|| ShellError::arithmetic(expr, format!("invalid number `{}'", text)))?;
            tokens.push(ArithToken::Number(value));
            i = j;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let mut j = i;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            tokens.push(ArithToken::Ident(chars[i..j].iter().collect()));
            i = j;
            continue;
        }
        let rest: String = chars[i..].iter().collect();
        let mut matched = false;
        for op in OPS {
            if rest.starts_with(op) {
                tokens.push(ArithToken::Op(op.to_string()));
                i += op.len();
                matched = true;
                break;
            }
        }
        if !matched {
            return Err(ShellError::arithmetic(
                expr,
                format!("unexpected character `{}'", c),
            ));
        }
    }
    Ok(tokens)
}

/// Decimal, hex (0x), and octal (leading 0) literals.
fn parse_number(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if text.len() > 1 && text.starts_with('0') {
        return i64::from_str_radix(&text[1..], 8).ok();
    }
    text.parse::<i64>().ok()
}

struct ArithParser<'a> {
    shell: &'a mut Shell,
    tokens: Vec<ArithToken>,
    pos: usize,
    src: String,
}

impl<'a> ArithParser<'a> {
    fn error(&self, message: impl Into<String>) -> ShellError {
        ShellError::arithmetic(self.src.clone(), message)
    }

    fn peek(&self) -> Option<&ArithToken> {
        self.tokens.get(self.pos)
    }

    fn peek_op(&self) -> Option<&str> {
        match self.peek() {
            Some(ArithToken::Op(op)) => Some(op.as_str()),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<ArithToken> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_op(&mut self, op: &str) -> Result<(), ShellError> {
        match self.advance() {
            Some(ArithToken::Op(t)) if t == op => Ok(()),
            _ => Err(self.error(format!("expected `{}'", op))),
        }
    }

    fn var_value(&self, name: &str) -> i64 {
        self.shell
            .vars
            .get(name)
            .and_then(parse_number_str)
            .unwrap_or(0)
    }

    fn assign(&mut self, name: &str, value: i64) -> Result<(), ShellError> {
        self.shell.vars.set(name, value.to_string())?;
        Ok(())
    }

    // comma: evaluate both, value is the last
    fn parse_comma(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut value = self.parse_assignment(eval)?;
        while self.peek_op() == Some(",") {
            self.advance();
            value = self.parse_assignment(eval)?;
        }
        Ok(value)
    }

    // assignment is right-associative and needs an identifier lhs
    fn parse_assignment(&mut self, eval: bool) -> Result<i64, ShellError> {
        if let Some(ArithToken::Ident(name)) = self.peek().cloned() {
            if let Some(ArithToken::Op(op)) = self.tokens.get(self.pos + 1) {
                let compound = matches!(
                    op.as_str(),
                    "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "<<=" | ">>=" | "&=" | "^=" | "|="
                );
                if compound {
                    let op = op.clone();
                    self.pos += 2;
                    let rhs = self.parse_assignment(eval)?;
                    if !eval {
                        return Ok(0);
                    }
                    let current = self.var_value(&name);
                    let value = match op.as_str() {
                        "=" => rhs,
                        "+=" => current.wrapping_add(rhs),
                        "-=" => current.wrapping_sub(rhs),
                        "*=" => current.wrapping_mul(rhs),
                        "/=" => self.checked_div(current, rhs)?,
                        "%=" => self.checked_rem(current, rhs)?,
                        "<<=" => current.wrapping_shl(rhs as u32),
                        ">>=" => current.wrapping_shr(rhs as u32),
                        "&=" => current & rhs,
                        "^=" => current ^ rhs,
                        "|=" => current | rhs,
                        _ => unreachable!(),
                    };
                    self.assign(&name, value)?;
                    return Ok(value);
                }
            }
        }
        self.parse_ternary(eval)
    }

    fn parse_ternary(&mut self, eval: bool) -> Result<i64, ShellError> {
        let cond = self.parse_logical_or(eval)?;
        if self.peek_op() == Some("?") {
            self.advance();
            let take_then = eval && cond != 0;
            let take_else = eval && cond == 0;
            let then_val = self.parse_assignment(take_then)?;
            self.expect_op(":")?;
            let else_val = self.parse_assignment(take_else)?;
            return Ok(if cond != 0 { then_val } else { else_val });
        }
        Ok(cond)
    }

    fn parse_logical_or(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_logical_and(eval)?;
        while self.peek_op() == Some("||") {
            self.advance();
            let rhs = self.parse_logical_and(eval && lhs == 0)?;
            lhs = i64::from(lhs != 0 || rhs != 0);
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_bit_or(eval)?;
        while self.peek_op() == Some("&&") {
            self.advance();
            let rhs = self.parse_bit_or(eval && lhs != 0)?;
            lhs = i64::from(lhs != 0 && rhs != 0);
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_bit_xor(eval)?;
        while self.peek_op() == Some("|") {
            self.advance();
            let rhs = self.parse_bit_xor(eval)?;
            lhs |= rhs;
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_bit_and(eval)?;
        while self.peek_op() == Some("^") {
            self.advance();
            let rhs = self.parse_bit_and(eval)?;
            lhs ^= rhs;
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_equality(eval)?;
        while self.peek_op() == Some("&") {
            self.advance();
            let rhs = self.parse_equality(eval)?;
            lhs &= rhs;
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_relational(eval)?;
        loop {
            let op = match self.peek_op() {
                Some("==") => "==",
                Some("!=") => "!=",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational(eval)?;
            lhs = match op {
                "==" => i64::from(lhs == rhs),
                _ => i64::from(lhs != rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_shift(eval)?;
        loop {
            let op = match self.peek_op() {
                Some("<") => "<",
                Some("<=") => "<=",
                Some(">") => ">",
                Some(">=") => ">=",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_shift(eval)?;
            lhs = match op {
                "<" => i64::from(lhs < rhs),
                "<=" => i64::from(lhs <= rhs),
                ">" => i64::from(lhs > rhs),
                _ => i64::from(lhs >= rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_additive(eval)?;
        loop {
            let op = match self.peek_op() {
                Some("<<") => "<<",
                Some(">>") => ">>",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive(eval)?;
            lhs = match op {
                "<<" => lhs.wrapping_shl(rhs as u32),
                _ => lhs.wrapping_shr(rhs as u32),
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_multiplicative(eval)?;
        loop {
            let op = match self.peek_op() {
                Some("+") => "+",
                Some("-") => "-",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative(eval)?;
            lhs = match op {
                "+" => lhs.wrapping_add(rhs),
                _ => lhs.wrapping_sub(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self, eval: bool) -> Result<i64, ShellError> {
        let mut lhs = self.parse_power(eval)?;
        loop {
            let op = match self.peek_op() {
                Some("*") => "*",
                Some("/") => "/",
                Some("%") => "%",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_power(eval)?;
            if !eval {
                continue;
            }
            lhs = match op {
                "*" => lhs.wrapping_mul(rhs),
                "/" => self.checked_div(lhs, rhs)?,
                _ => self.checked_rem(lhs, rhs)?,
            };
        }
        Ok(lhs)
    }

    // `**` is right-associative
    fn parse_power(&mut self, eval: bool) -> Result<i64, ShellError> {
        let base = self.parse_unary(eval)?;
        if self.peek_op() == Some("**") {
            self.advance();
            let exp = self.parse_power(eval)?;
            if !eval {
                return Ok(0);
            }
            if exp < 0 {
                return Err(self.error("exponent less than 0"));
            }
            return Ok(base.wrapping_pow(exp.min(u32::MAX as i64) as u32));
        }
        Ok(base)
    }

    fn parse_unary(&mut self, eval: bool) -> Result<i64, ShellError> {
        match self.peek_op() {
            Some("+") => {
                self.advance();
                self.parse_unary(eval)
            }
            Some("-") => {
                self.advance();
                Ok(self.parse_unary(eval)?.wrapping_neg())
            }
            Some("!") => {
                self.advance();
                Ok(i64::from(self.parse_unary(eval)? == 0))
            }
            Some("~") => {
                self.advance();
                Ok(!self.parse_unary(eval)?)
            }
            Some("++") | Some("--") => {
                let increment = self.peek_op() == Some("++");
                self.advance();
                match self.advance() {
                    Some(ArithToken::Ident(name)) => {
                        if !eval {
                            return Ok(0);
                        }
                        let delta = if increment { 1 } else { -1 };
                        let value = self.var_value(&name).wrapping_add(delta);
                        self.assign(&name, value)?;
                        Ok(value)
                    }
                    _ => Err(self.error(if increment {
                        "`++' needs a variable".to_string()
                    } else {
                        "`--' needs a variable".to_string()
                    })),
                }
            }
            _ => self.parse_postfix(eval),
        }
    }

    fn parse_postfix(&mut self, eval: bool) -> Result<i64, ShellError> {
        if let Some(ArithToken::Ident(name)) = self.peek().cloned() {
            if let Some(ArithToken::Op(op)) = self.tokens.get(self.pos + 1) {
                if op == "++" || op == "--" {
                    let op = op.clone();
                    self.pos += 2;
                    if !eval {
                        return Ok(0);
                    }
                    let value = self.var_value(&name);
                    let delta = if op == "++" { 1 } else { -1 };
                    self.assign(&name, value.wrapping_add(delta))?;
                    return Ok(value);
                }
            }
        }
        self.parse_primary(eval)
    }

    fn parse_primary(&mut self, eval: bool) -> Result<i64, ShellError> {
        match self.advance() {
            Some(ArithToken::Number(n)) => Ok(n),
            Some(ArithToken::Ident(name)) => {
                if eval {
                    Ok(self.var_value(&name))
                } else {
                    Ok(0)
                }
            }
            Some(ArithToken::Op(op)) if op == "(" => {
                let value = self.parse_comma(eval)?;
                self.expect_op(")")?;
                Ok(value)
            }
            Some(ArithToken::Op(op)) => Err(self.error(format!("unexpected `{}'", op))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn checked_div(&self, lhs: i64, rhs: i64) -> Result<i64, ShellError> {
        if rhs == 0 {
            return Err(self.error("division by 0"));
        }
        Ok(lhs.wrapping_div(rhs))
    }

    fn checked_rem(&self, lhs: i64, rhs: i64) -> Result<i64, ShellError> {
        if rhs == 0 {
            return Err(self.error("division by 0"));
        }
        Ok(lhs.wrapping_rem(rhs))
    }
}

fn parse_number_str(text: &str) -> Option<i64> {
    parse_number(text.trim())
}

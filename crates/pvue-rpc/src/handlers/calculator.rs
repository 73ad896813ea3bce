//! Scientific calculator example application.
//!
//! Every handler answers `{"success": true, "result": n}` or
//! `{"success": false, "error": "..."}`. Only arity errors surface as handler
//! errors.

use serde_json::{Value, json};

use crate::errors::HandlerError;
use crate::params::Params;
use crate::registry::HandlerRegistry;

/// Register `calculate`, `factorial`, `power` and `root`.
pub fn register(registry: &HandlerRegistry) {
    let _ = registry.register_fn("calculate", |p| {
        p.expect_len(1)?;
        Ok(outcome(p.str(0).map_err(|e| e.to_string()).and_then(|expr| {
            evaluate(expr).map(number)
        })))
    });
    let _ = registry.register_fn("factorial", |p| {
        p.expect_len(1)?;
        Ok(outcome(p.i64(0).map_err(|e| e.to_string()).and_then(factorial)))
    });
    let _ = registry.register_fn("power", |p| {
        p.expect_len(2)?;
        Ok(outcome(floats(&p).and_then(|(b, e)| checked(b.powf(e))).map(number)))
    });
    let _ = registry.register_fn("root", |p| {
        p.expect_len(2)?;
        Ok(outcome(floats(&p).and_then(|(b, n)| {
            if n == 0.0 {
                return Err("float division by zero".to_owned());
            }
            checked(b.powf(1.0 / n))
        }).map(number)))
    });
}

fn floats(p: &Params) -> Result<(f64, f64), String> {
    let a = p.f64(0).map_err(|e: HandlerError| e.to_string())?;
    let b = p.f64(1).map_err(|e| e.to_string())?;
    Ok((a, b))
}

fn outcome(result: Result<Value, String>) -> Value {
    match result {
        Ok(value) => json!({"success": true, "result": value}),
        Err(error) => json!({"success": false, "error": error}),
    }
}

/// Integral results that fit in an `i64` without loss are sent as integers.
#[allow(clippy::cast_possible_truncation)]
fn number(x: f64) -> Value {
    if x.fract() == 0.0 && x.abs() < 9.0e15 {
        json!(x as i64)
    } else {
        json!(x)
    }
}

fn checked(x: f64) -> Result<f64, String> {
    if x.is_nan() {
        Err("math domain error".to_owned())
    } else if x.is_infinite() {
        Err("math range error".to_owned())
    } else {
        Ok(x)
    }
}

/// `n!` as an exact integer up to `20!`, then as a float up to `170!`.
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn factorial(n: i64) -> Result<Value, String> {
    if n < 0 {
        return Err("factorial() not defined for negative values".to_owned());
    }
    let n = n as u64;
    if let Some(exact) = (1..=n).try_fold(1u64, u64::checked_mul) {
        return Ok(json!(exact));
    }
    if n > 170 {
        return Err("factorial() result too large".to_owned());
    }
    Ok(json!((1..=n).fold(1.0f64, |acc, k| acc * k as f64)))
}

// ── Expression evaluator ────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                let _ = chars.next();
            }
            '0'..='9' | '.' => {
                let mut lit = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        lit.push(d);
                        let _ = chars.next();
                    } else {
                        break;
                    }
                }
                let n = lit
                    .parse()
                    .map_err(|_| format!("invalid number '{lit}'"))?;
                tokens.push(Token::Num(n));
            }
            'π' => {
                let _ = chars.next();
                tokens.push(Token::Ident("pi".to_owned()));
            }
            c if c.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() {
                        name.push(d);
                        let _ = chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            '*' => {
                let _ = chars.next();
                if chars.peek() == Some(&'*') {
                    let _ = chars.next();
                    tokens.push(Token::Op('^'));
                } else {
                    tokens.push(Token::Op('*'));
                }
            }
            '+' | '-' | '/' | '%' | '^' => {
                let _ = chars.next();
                tokens.push(Token::Op(c));
            }
            '(' => {
                let _ = chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                let _ = chars.next();
                tokens.push(Token::RParen);
            }
            other => return Err(format!("invalid character '{other}'")),
        }
    }
    Ok(tokens)
}

/// Evaluate an arithmetic expression.
///
/// Supports `+ - * / % ^` (`**` as an alias of `^`), parentheses, the
/// functions `sin cos tan asin acos atan log ln sqrt`, and the constants
/// `pi`, `π` and `e`. `log` is base 10 and `ln` is natural.
pub fn evaluate(input: &str) -> Result<f64, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty expression".to_owned());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("invalid syntax".to_owned());
    }
    checked(value)
}

/// Deepest nesting of parentheses, signs and exponents `evaluate` accepts.
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut acc = self.term()?;
        while let Some(op) = self.eat_op(&['+', '-']) {
            let rhs = self.term()?;
            acc = if op == '+' { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut acc = self.unary()?;
        while let Some(op) = self.eat_op(&['*', '/', '%']) {
            let rhs = self.unary()?;
            acc = match op {
                '*' => acc * rhs,
                _ if rhs == 0.0 => return Err("division by zero".to_owned()),
                '/' => acc / rhs,
                _ => acc - rhs * (acc / rhs).floor(),
            };
        }
        Ok(acc)
    }

    // unary := ('+' | '-') unary | power
    //
    // Every recursive path (parentheses, function calls, sign chains,
    // exponent chains) passes through here, so the depth bound lives here.
    fn unary(&mut self) -> Result<f64, String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("expression too deeply nested".to_owned());
        }
        let value = match self.eat_op(&['+', '-']) {
            Some('-') => self.unary().map(|v| -v),
            Some(_) => self.unary(),
            None => self.power(),
        };
        self.depth -= 1;
        value
    }

    // power := atom ('^' unary)?
    fn power(&mut self) -> Result<f64, String> {
        let base = self.atom()?;
        if self.eat_op(&['^']).is_some() {
            let exponent = self.unary()?;
            return checked(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("missing ')'".to_owned()),
                }
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "pi" => Ok(std::f64::consts::PI),
                "e" => Ok(std::f64::consts::E),
                _ => {
                    let f = function(&name)?;
                    if self.next() != Some(Token::LParen) {
                        return Err(format!("expected '(' after '{name}'"));
                    }
                    let arg = self.expr()?;
                    if self.next() != Some(Token::RParen) {
                        return Err("missing ')'".to_owned());
                    }
                    f(arg)
                }
            },
            _ => Err("invalid syntax".to_owned()),
        }
    }
}

fn function(name: &str) -> Result<fn(f64) -> Result<f64, String>, String> {
    fn domain(ok: bool, value: f64) -> Result<f64, String> {
        if ok { checked(value) } else { Err("math domain error".to_owned()) }
    }
    let f: fn(f64) -> Result<f64, String> = match name {
        "sin" => |x: f64| checked(x.sin()),
        "cos" => |x: f64| checked(x.cos()),
        "tan" => |x: f64| checked(x.tan()),
        "asin" => |x: f64| domain((-1.0..=1.0).contains(&x), x.asin()),
        "acos" => |x: f64| domain((-1.0..=1.0).contains(&x), x.acos()),
        "atan" => |x: f64| checked(x.atan()),
        "log" => |x: f64| domain(x > 0.0, x.log10()),
        "ln" => |x: f64| domain(x > 0.0, x.ln()),
        "sqrt" => |x: f64| domain(x >= 0.0, x.sqrt()),
        other => return Err(format!("name '{other}' is not defined")),
    };
    Ok(f)
}

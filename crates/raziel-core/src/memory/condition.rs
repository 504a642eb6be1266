//! Lexer, recursive-descent parser and evaluator for the condition language
//! the in-memory store understands.
//!
//! Covers key conditions, filters and put conditions over top-level
//! attributes: comparisons, `BETWEEN`, `IN`, `AND`/`OR`/`NOT`, parentheses and
//! the functions `attribute_exists`, `attribute_not_exists`, `begins_with` and
//! `contains`. Keywords are case-insensitive.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use raziel_model::{AttributeValue, Item};

/// Errors produced while parsing or evaluating a condition.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    /// An unexpected token was encountered.
    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
    },
    /// A `#name` placeholder has no binding.
    #[error("Unresolved expression attribute name: {0}")]
    UnresolvedName(String),
    /// A `:value` placeholder has no binding.
    #[error("Unresolved expression attribute value: {0}")]
    UnresolvedValue(String),
    /// A function was called with the wrong arguments.
    #[error("Invalid operand for {function}: {message}")]
    InvalidOperand {
        /// Function name.
        function: &'static str,
        /// Explanation.
        message: &'static str,
    },
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// Built-in condition functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// `attribute_exists(path)`
    AttributeExists,
    /// `attribute_not_exists(path)`
    AttributeNotExists,
    /// `begins_with(path, operand)`
    BeginsWith,
    /// `contains(path, operand)`
    Contains,
}

impl Function {
    fn name(self) -> &'static str {
        match self {
            Self::AttributeExists => "attribute_exists",
            Self::AttributeNotExists => "attribute_not_exists",
            Self::BeginsWith => "begins_with",
            Self::Contains => "contains",
        }
    }
}

/// An operand: an attribute reference or a value placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Plain attribute name.
    Attribute(String),
    /// `#name` placeholder, without the `#`.
    Name(String),
    /// `:value` placeholder, without the `:`.
    Value(String),
}

/// A parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `a <op> b`
    Compare(Operand, CompareOp, Operand),
    /// `a BETWEEN lo AND hi`
    Between(Operand, Operand, Operand),
    /// `a IN (b, c, ...)`
    In(Operand, Vec<Operand>),
    /// `fn(args...)`
    Call(Function, Vec<Operand>),
    /// `a AND b`
    And(Box<Expr>, Box<Expr>),
    /// `a OR b`
    Or(Box<Expr>, Box<Expr>),
    /// `NOT a`
    Not(Box<Expr>),
}

impl Expr {
    /// Every conjunct of a chain of `AND`s.
    #[must_use]
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Self::And(l, r) => {
                let mut out = l.conjuncts();
                out.extend(r.conjuncts());
                out
            }
            other => vec![other],
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Name(String),
    Value(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Comma,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Between,
    In,
    Func(Function),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::Name(s) => write!(f, "#{s}"),
            Self::Value(s) => write!(f, ":{s}"),
            Self::Eq => f.write_str("'='"),
            Self::Ne => f.write_str("'<>'"),
            Self::Lt => f.write_str("'<'"),
            Self::Le => f.write_str("'<='"),
            Self::Gt => f.write_str("'>'"),
            Self::Ge => f.write_str("'>='"),
            Self::Comma => f.write_str("','"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::Between => f.write_str("BETWEEN"),
            Self::In => f.write_str("IN"),
            Self::Func(func) => f.write_str(func.name()),
            Self::Eof => f.write_str("EOF"),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ConditionError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self, tok: Token) -> Token {
        self.chars.next();
        tok
    }

    fn next_token(&mut self) -> Result<Token, ConditionError> {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }
        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };
        match ch {
            '#' | ':' => {
                self.chars.next();
                let ident = self.read_ident();
                if ident.is_empty() {
                    return Err(ConditionError::UnexpectedToken {
                        expected: format!("name after '{ch}'"),
                        found: "empty".to_owned(),
                    });
                }
                Ok(if ch == '#' {
                    Token::Name(ident)
                } else {
                    Token::Value(ident)
                })
            }
            '=' => Ok(self.bump(Token::Eq)),
            ',' => Ok(self.bump(Token::Comma)),
            '(' => Ok(self.bump(Token::LParen)),
            ')' => Ok(self.bump(Token::RParen)),
            '<' => {
                self.chars.next();
                Ok(match self.chars.peek() {
                    Some('=') => self.bump(Token::Le),
                    Some('>') => self.bump(Token::Ne),
                    _ => Token::Lt,
                })
            }
            '>' => {
                self.chars.next();
                Ok(match self.chars.peek() {
                    Some('=') => self.bump(Token::Ge),
                    _ => Token::Gt,
                })
            }
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_word()),
            _ => Err(ConditionError::UnexpectedToken {
                expected: "valid token".to_owned(),
                found: format!("'{ch}'"),
            }),
        }
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        s
    }

    fn read_word(&mut self) -> Token {
        let word = self.read_ident();
        match word.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "between" => Token::Between,
            "in" => Token::In,
            "attribute_exists" => Token::Func(Function::AttributeExists),
            "attribute_not_exists" => Token::Func(Function::AttributeNotExists),
            "begins_with" => Token::Func(Function::BeginsWith),
            "contains" => Token::Func(Function::Contains),
            _ => Token::Identifier(word),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ConditionError> {
        let tok = self.advance();
        if &tok == expected {
            Ok(())
        } else {
            Err(ConditionError::UnexpectedToken {
                expected: expected.to_string(),
                found: tok.to_string(),
            })
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            left = Expr::Or(Box::new(left), Box::new(self.parse_and()?));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            left = Expr::And(Box::new(left), Box::new(self.parse_not()?));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ConditionError> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ConditionError> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let expr = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::Func(func) => {
                self.advance();
                self.expect(&Token::LParen)?;
                let args = self.parse_operand_list()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Call(func, args))
            }
            _ => {
                let left = self.parse_operand()?;
                self.parse_postfix(left)
            }
        }
    }

    fn parse_postfix(&mut self, left: Operand) -> Result<Expr, ConditionError> {
        let op = match self.advance() {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            Token::Between => {
                let low = self.parse_operand()?;
                self.expect(&Token::And)?;
                let high = self.parse_operand()?;
                return Ok(Expr::Between(left, low, high));
            }
            Token::In => {
                self.expect(&Token::LParen)?;
                let list = self.parse_operand_list()?;
                self.expect(&Token::RParen)?;
                return Ok(Expr::In(left, list));
            }
            other => {
                return Err(ConditionError::UnexpectedToken {
                    expected: "comparison operator, BETWEEN, or IN".to_owned(),
                    found: other.to_string(),
                });
            }
        };
        Ok(Expr::Compare(left, op, self.parse_operand()?))
    }

    fn parse_operand_list(&mut self) -> Result<Vec<Operand>, ConditionError> {
        let mut list = vec![self.parse_operand()?];
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            list.push(self.parse_operand()?);
        }
        Ok(list)
    }

    fn parse_operand(&mut self) -> Result<Operand, ConditionError> {
        match self.advance() {
            Token::Identifier(name) => Ok(Operand::Attribute(name)),
            Token::Name(name) => Ok(Operand::Name(name)),
            Token::Value(name) => Ok(Operand::Value(name)),
            other => Err(ConditionError::UnexpectedToken {
                expected: "attribute name, #name or :value".to_owned(),
                found: other.to_string(),
            }),
        }
    }
}

/// Parse a condition expression.
pub fn parse(input: &str) -> Result<Expr, ConditionError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.advance() {
        Token::Eof => Ok(expr),
        other => Err(ConditionError::UnexpectedToken {
            expected: "end of expression".to_owned(),
            found: other.to_string(),
        }),
    }
}

/// Parse a comma-separated projection into attribute names, resolving `#name`
/// placeholders.
pub fn parse_projection(
    input: &str,
    names: &HashMap<String, String>,
) -> Result<Vec<String>, ConditionError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.starts_with('#') {
                names
                    .get(part)
                    .cloned()
                    .ok_or_else(|| ConditionError::UnresolvedName(part.to_owned()))
            } else {
                Ok(part.to_owned())
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Binds an item to the placeholder tables of one request.
#[derive(Debug)]
pub struct EvalContext<'a> {
    /// The item under test.
    pub item: &'a Item,
    /// `#name -> attribute`.
    pub names: &'a HashMap<String, String>,
    /// `:value -> value`.
    pub values: &'a HashMap<String, AttributeValue>,
}

impl EvalContext<'_> {
    /// Evaluate `expr` against the item.
    pub fn evaluate(&self, expr: &Expr) -> Result<bool, ConditionError> {
        match expr {
            Expr::Compare(left, op, right) => {
                let (Some(l), Some(r)) = (self.resolve(left)?, self.resolve(right)?) else {
                    return Ok(false);
                };
                Ok(compare(l, r).is_some_and(|ord| op_holds(*op, ord))
                    || is_ne_mismatch(*op, l, r))
            }
            Expr::Between(value, low, high) => {
                let (Some(v), Some(lo), Some(hi)) =
                    (self.resolve(value)?, self.resolve(low)?, self.resolve(high)?)
                else {
                    return Ok(false);
                };
                Ok(compare(v, lo).is_some_and(Ordering::is_ge)
                    && compare(v, hi).is_some_and(Ordering::is_le))
            }
            Expr::In(value, list) => {
                let Some(v) = self.resolve(value)? else {
                    return Ok(false);
                };
                for candidate in list {
                    let found = self.resolve(candidate)?;
                    if found.is_some_and(|c| compare(v, c) == Some(Ordering::Equal)) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Call(func, args) => self.call(*func, args),
            Expr::And(l, r) => Ok(self.evaluate(l)? && self.evaluate(r)?),
            Expr::Or(l, r) => Ok(self.evaluate(l)? || self.evaluate(r)?),
            Expr::Not(inner) => self.evaluate(inner).map(|v| !v),
        }
    }

    /// Check that every placeholder in `expr` is bound, without looking at
    /// the item.
    pub fn check_bindings(&self, expr: &Expr) -> Result<(), ConditionError> {
        let operands: Vec<&Operand> = match expr {
            Expr::Compare(l, _, r) => vec![l, r],
            Expr::Between(v, lo, hi) => vec![v, lo, hi],
            Expr::In(v, list) => std::iter::once(v).chain(list).collect(),
            Expr::Call(_, args) => args.iter().collect(),
            Expr::And(l, r) | Expr::Or(l, r) => {
                self.check_bindings(l)?;
                return self.check_bindings(r);
            }
            Expr::Not(inner) => return self.check_bindings(inner),
        };
        for operand in operands {
            if let Operand::Value(name) = operand {
                let placeholder = format!(":{name}");
                if !self.values.contains_key(&placeholder) {
                    return Err(ConditionError::UnresolvedValue(placeholder));
                }
            } else {
                self.attribute_name(operand)?;
            }
        }
        Ok(())
    }

    /// The attribute name an operand refers to, if it is a path.
    pub fn attribute_name<'o>(
        &'o self,
        operand: &'o Operand,
    ) -> Result<Option<&'o str>, ConditionError> {
        match operand {
            Operand::Attribute(name) => Ok(Some(name.as_str())),
            Operand::Name(name) => self
                .names
                .get(&format!("#{name}"))
                .map(|s| Some(s.as_str()))
                .ok_or_else(|| ConditionError::UnresolvedName(format!("#{name}"))),
            Operand::Value(_) => Ok(None),
        }
    }

    /// Resolve an operand to a value; `None` when the attribute is absent.
    pub fn resolve(&self, operand: &Operand) -> Result<Option<&AttributeValue>, ConditionError> {
        if let Operand::Value(name) = operand {
            return self
                .values
                .get(&format!(":{name}"))
                .map(Some)
                .ok_or_else(|| ConditionError::UnresolvedValue(format!(":{name}")));
        }
        Ok(self
            .attribute_name(operand)?
            .and_then(|name| self.item.get(name)))
    }

    fn call(&self, func: Function, args: &[Operand]) -> Result<bool, ConditionError> {
        match (func, args) {
            (Function::AttributeExists | Function::AttributeNotExists, [path]) => {
                let Some(name) = self.attribute_name(path)? else {
                    return Err(ConditionError::InvalidOperand {
                        function: func.name(),
                        message: "argument must be an attribute",
                    });
                };
                let exists = self.item.contains_key(name);
                Ok(exists == (func == Function::AttributeExists))
            }
            (Function::BeginsWith, [path, prefix]) => {
                Ok(match (self.resolve(path)?, self.resolve(prefix)?) {
                    (Some(AttributeValue::S(s)), Some(AttributeValue::S(p))) => {
                        s.starts_with(p.as_str())
                    }
                    (Some(AttributeValue::B(b)), Some(AttributeValue::B(p))) => b.starts_with(p),
                    _ => false,
                })
            }
            (Function::Contains, [path, operand]) => {
                let (Some(haystack), Some(needle)) = (self.resolve(path)?, self.resolve(operand)?)
                else {
                    return Ok(false);
                };
                Ok(match (haystack, needle) {
                    (AttributeValue::S(s), AttributeValue::S(n)) => s.contains(n.as_str()),
                    (AttributeValue::Ss(set), AttributeValue::S(n))
                    | (AttributeValue::Ns(set), AttributeValue::N(n)) => set.contains(n),
                    (AttributeValue::L(list), needle) => list.contains(needle),
                    _ => false,
                })
            }
            _ => Err(ConditionError::InvalidOperand {
                function: func.name(),
                message: "wrong number of arguments",
            }),
        }
    }
}

/// Order two scalars of the same type. Mixed types are unordered.
pub fn compare(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            a.parse::<f64>().ok()?.partial_cmp(&b.parse::<f64>().ok()?)
        }
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.cmp(b)),
        (AttributeValue::Bool(a), AttributeValue::Bool(b)) => (a == b).then_some(Ordering::Equal),
        (AttributeValue::Null(_), AttributeValue::Null(_)) => Some(Ordering::Equal),
        _ => (left == right).then_some(Ordering::Equal),
    }
}

fn op_holds(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Eq => ord.is_eq(),
        CompareOp::Ne => ord.is_ne(),
        CompareOp::Lt => ord.is_lt(),
        CompareOp::Le => ord.is_le(),
        CompareOp::Gt => ord.is_gt(),
        CompareOp::Ge => ord.is_ge(),
    }
}

/// `<>` holds between values that cannot be ordered against each other.
fn is_ne_mismatch(op: CompareOp, left: &AttributeValue, right: &AttributeValue) -> bool {
    op == CompareOp::Ne && compare(left, right).is_none()
}

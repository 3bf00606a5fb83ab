//! Restricted arithmetic formulas for component difficulty.
//!
//! A formula is a tiny expression language: numeric literals, the `x`
//! placeholder, `+ - * / **`, unary negation and parentheses. Nothing else
//! is accepted. Evaluation happens in three steps:
//!
//! 1. the placeholder is replaced textually by the current parameter,
//! 2. the resulting text is tokenized and parsed into an [`Expr`] tree,
//! 3. the tree is walked bottom-up against an [`OperatorTable`].
//!
//! ```
//! use spellcraft_core::formula::{evaluate, Formula};
//!
//! assert_eq!(evaluate("19/5").unwrap(), 3.8);
//! assert_eq!(Formula::new("x/2-10").dc(100).unwrap(), 40);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// The substitutable token in every formula.
pub const PLACEHOLDER: &str = "x";

/// Formula used when catalog data does not provide one.
pub const IDENTITY: &str = "x";

/// Parenthesis/unary nesting limit.
const MAX_DEPTH: usize = 64;

/// Token limit. Operator chains build a left-deep tree, so this bounds its depth.
const MAX_TOKENS: usize = 256;

/// Every operator-looking symbol the tokenizer recognizes, longest first.
///
/// Only `**`, `+`, `-`, `*` and `/` map to a [`BinaryOp`]; the rest are
/// recognized so they can be reported as unsupported instead of as garbage.
const OPERATOR_SYMBOLS: &[&str] = &[
    "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "+", "-", "*", "/", "%", "<", ">", "&", "|",
    "^", "~", "@", "=", "!",
];

/// Error type for formula parsing and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("Invalid formula '{formula}': {message}")]
    Parse { formula: String, message: String },
    #[error("Unsupported operator '{operator}' in formula '{formula}'")]
    UnsupportedOperator { formula: String, operator: String },
    #[error("No operator table entry for '{0}'")]
    UnmappedOperator(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Formula result {0} cannot be used as a difficulty")]
    OutOfRange(f64),
}

impl FormulaError {
    fn parse(formula: &str, message: impl Into<String>) -> Self {
        FormulaError::Parse {
            formula: formula.to_string(),
            message: message.into(),
        }
    }
}

/// Binary operators of the formula grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        match symbol {
            "+" => Some(BinaryOp::Add),
            "-" => Some(BinaryOp::Sub),
            "*" => Some(BinaryOp::Mul),
            "/" => Some(BinaryOp::Div),
            "**" => Some(BinaryOp::Pow),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Unary operators of the formula grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
        }
    }
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal (after substitution, the parameter is one too).
    Number(f64),
    /// A unary operation (e.g. `-(x+1)`).
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// A binary operation (e.g. `x*2`).
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Parse already-substituted formula text.
    pub fn parse(text: &str) -> Result<Expr, FormulaError> {
        let tokens = tokenize(text)?;
        Parser::new(text, tokens).parse()
    }

    /// Walk the tree bottom-up, dispatching every operator through `table`.
    pub fn eval(&self, table: &OperatorTable) -> Result<f64, FormulaError> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Unary { op, operand } => {
                let value = operand.eval(table)?;
                Ok(table.unary(*op)?(value))
            }
            Expr::Binary { op, left, right } => {
                let left = left.eval(table)?;
                let right = right.eval(table)?;
                table.binary(*op)?(left, right)
            }
        }
    }
}

// ============================================================================
// Operator tables
// ============================================================================

pub type BinaryFn = fn(f64, f64) -> Result<f64, FormulaError>;
pub type UnaryFn = fn(f64) -> f64;

fn add(left: f64, right: f64) -> Result<f64, FormulaError> {
    Ok(left + right)
}

fn sub(left: f64, right: f64) -> Result<f64, FormulaError> {
    Ok(left - right)
}

fn mul(left: f64, right: f64) -> Result<f64, FormulaError> {
    Ok(left * right)
}

fn div(left: f64, right: f64) -> Result<f64, FormulaError> {
    if right == 0.0 {
        return Err(FormulaError::DivisionByZero);
    }
    Ok(left / right)
}

fn pow(left: f64, right: f64) -> Result<f64, FormulaError> {
    Ok(left.powf(right))
}

fn neg(value: f64) -> f64 {
    -value
}

static STANDARD_OPERATORS: LazyLock<OperatorTable> = LazyLock::new(|| {
    OperatorTable::legacy_set().with_binary(BinaryOp::Pow, pow)
});

static LEGACY_OPERATORS: LazyLock<OperatorTable> = LazyLock::new(OperatorTable::legacy_set);

/// Mapping from operator to the function that applies it.
///
/// The parser accepts the full grammar; the table decides what a given
/// ruleset can actually evaluate. An operator missing from the table is an
/// error at evaluation time, never a silent default.
#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    binary: HashMap<BinaryOp, BinaryFn>,
    unary: HashMap<UnaryOp, UnaryFn>,
}

impl OperatorTable {
    /// A table with no operators at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `+ - * / **` and negation.
    pub fn standard() -> &'static OperatorTable {
        &STANDARD_OPERATORS
    }

    /// The pre-exponent ruleset: `+ - * /` and negation.
    pub fn legacy() -> &'static OperatorTable {
        &LEGACY_OPERATORS
    }

    fn legacy_set() -> Self {
        Self::empty()
            .with_binary(BinaryOp::Add, add)
            .with_binary(BinaryOp::Sub, sub)
            .with_binary(BinaryOp::Mul, mul)
            .with_binary(BinaryOp::Div, div)
            .with_unary(UnaryOp::Neg, neg)
    }

    pub fn with_binary(mut self, op: BinaryOp, apply: BinaryFn) -> Self {
        self.binary.insert(op, apply);
        self
    }

    pub fn with_unary(mut self, op: UnaryOp, apply: UnaryFn) -> Self {
        self.unary.insert(op, apply);
        self
    }

    pub fn without_binary(mut self, op: BinaryOp) -> Self {
        self.binary.remove(&op);
        self
    }

    pub fn binary(&self, op: BinaryOp) -> Result<BinaryFn, FormulaError> {
        self.binary
            .get(&op)
            .copied()
            .ok_or_else(|| FormulaError::UnmappedOperator(op.symbol().to_string()))
    }

    pub fn unary(&self, op: UnaryOp) -> Result<UnaryFn, FormulaError> {
        self.unary
            .get(&op)
            .copied()
            .ok_or_else(|| FormulaError::UnmappedOperator(format!("unary {}", op.symbol())))
    }

    pub fn supports(&self, op: BinaryOp) -> bool {
        self.binary.contains_key(&op)
    }
}

/// Serializable choice of operator table, stored with catalog configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperatorSet {
    #[default]
    Standard,
    Legacy,
}

impl OperatorSet {
    pub fn table(&self) -> &'static OperatorTable {
        match self {
            OperatorSet::Standard => OperatorTable::standard(),
            OperatorSet::Legacy => OperatorTable::legacy(),
        }
    }
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(BinaryOp),
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(ch) = text[pos..].chars().next() {
        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }

        match ch {
            '(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let len = text[pos..]
                    .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                    .unwrap_or(text.len() - pos);
                let literal = &text[pos..pos + len];
                let value: f64 = literal.parse().map_err(|_| {
                    FormulaError::parse(text, format!("invalid number '{literal}'"))
                })?;
                tokens.push(Token::Number(value));
                pos += len;
            }
            _ => {
                let rest = &text[pos..];
                let Some(symbol) = OPERATOR_SYMBOLS.iter().find(|s| rest.starts_with(**s)) else {
                    return Err(FormulaError::parse(
                        text,
                        format!("unexpected character '{ch}'"),
                    ));
                };
                let op = BinaryOp::from_symbol(symbol).ok_or_else(|| {
                    FormulaError::UnsupportedOperator {
                        formula: text.to_string(),
                        operator: symbol.to_string(),
                    }
                })?;
                tokens.push(Token::Op(op));
                pos += symbol.len();
            }
        }
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

/// Recursive-descent parser.
///
/// ```text
/// expr  := term (("+" | "-") term)*
/// term  := unary (("*" | "/") unary)*
/// unary := "-" unary | power
/// power := atom ("**" unary)?
/// atom  := NUMBER | "(" expr ")"
/// ```
///
/// `**` is right associative and binds tighter than a unary minus on its
/// left, so `-2**2` is `-4` and `2**-1` is `0.5`.
struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn parse(mut self) -> Result<Expr, FormulaError> {
        if self.tokens.is_empty() {
            return Err(self.error("empty formula"));
        }
        if self.tokens.len() > MAX_TOKENS {
            return Err(self.error(format!("formula too long ({} tokens)", self.tokens.len())));
        }
        let expr = self.expr()?;
        if let Some(token) = self.peek() {
            return Err(self.error(format!("unexpected {} after expression", describe(token))));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> FormulaError {
        FormulaError::parse(self.source, message)
    }

    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ (BinaryOp::Add | BinaryOp::Sub))) = self.peek() {
            self.advance();
            let right = self.term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        while let Some(Token::Op(op @ (BinaryOp::Mul | BinaryOp::Div))) = self.peek() {
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if let Some(Token::Op(BinaryOp::Sub)) = self.peek() {
            self.advance();
            self.descend()?;
            let operand = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.atom()?;
        if let Some(Token::Op(BinaryOp::Pow)) = self.peek() {
            self.advance();
            self.descend()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, FormulaError> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => Err(self.error(format!("expected ')', found {}", describe(token)))),
                    None => Err(self.error("unclosed '('")),
                }
            }
            Some(token) => Err(self.error(format!("expected a number, found {}", describe(token)))),
            None => Err(self.error("unexpected end of formula")),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe(token: Token) -> String {
    match token {
        Token::Number(value) => format!("number {value}"),
        Token::Op(op) => format!("operator '{op}'"),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
    }
}

// ============================================================================
// Formula
// ============================================================================

/// Formula text attached to a catalog component.
///
/// The text is kept verbatim and re-parsed on every evaluation, since the
/// placeholder is substituted before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Formula(String);

impl Formula {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The formula that evaluates to the parameter itself.
    pub fn identity() -> Self {
        Self(IDENTITY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank formulas pass the parameter through unchanged.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The formula text with the placeholder replaced by `x`.
    pub fn substitute(&self, x: i64) -> String {
        substitute(&self.0, PLACEHOLDER, x)
    }

    /// Parse the formula for parameter `x`.
    pub fn parse(&self, x: i64) -> Result<Expr, FormulaError> {
        Expr::parse(&self.substitute(x))
    }

    /// Evaluate with the standard operator table.
    pub fn evaluate(&self, x: i64) -> Result<f64, FormulaError> {
        self.evaluate_with(x, OperatorTable::standard())
    }

    pub fn evaluate_with(&self, x: i64, table: &OperatorTable) -> Result<f64, FormulaError> {
        if self.is_blank() {
            return Ok(x as f64);
        }
        self.parse(x)?.eval(table)
    }

    /// Evaluate and truncate to an integer difficulty.
    pub fn dc(&self, x: i64) -> Result<i64, FormulaError> {
        self.dc_with(x, OperatorTable::standard())
    }

    pub fn dc_with(&self, x: i64, table: &OperatorTable) -> Result<i64, FormulaError> {
        truncate(self.evaluate_with(x, table)?)
    }
}

impl Default for Formula {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Formula {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Formula {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// Replace every occurrence of `placeholder` in `text` by `value`.
///
/// This is a plain substring replace: a placeholder that also appears inside
/// a longer word is replaced there too.
pub fn substitute(text: &str, placeholder: &str, value: i64) -> String {
    text.replace(placeholder, &value.to_string())
}

/// Parse and evaluate formula text that contains no placeholder.
pub fn evaluate(text: &str) -> Result<f64, FormulaError> {
    Expr::parse(text)?.eval(OperatorTable::standard())
}

/// Truncate toward zero, rejecting values with no integer counterpart.
pub fn truncate(value: f64) -> Result<i64, FormulaError> {
    let truncated = value.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(FormulaError::OutOfRange(value));
    }
    Ok(truncated as i64)
}

// src/requirement/marker.rs

//! Environment markers
//!
//! Markers are boolean expressions over the target interpreter environment,
//! such as `python_version < "3.8" and sys_platform == "linux"`. Comparisons
//! between two version-like operands use specifier semantics, everything
//! else is compared as text.
//!
//! The `extra` variable is only defined while installing a specific extra,
//! which never happens during graph exploration. Before evaluation every
//! `extra` comparison is swapped for `python_version >= "0.0"` and the
//! referenced extra names are collected instead.

use crate::error::{Error, Result};
use crate::version::{Specifier, looks_like_version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Variables a marker may reference, including legacy dotted spellings
const KNOWN_VARIABLES: &[&str] = &[
    "implementation_name",
    "implementation_version",
    "os_name",
    "platform_machine",
    "platform_python_implementation",
    "platform_release",
    "platform_system",
    "platform_version",
    "python_full_version",
    "python_version",
    "sys_platform",
    "extra",
    "os.name",
    "sys.platform",
    "platform.version",
    "platform.machine",
    "platform.python_implementation",
    "python_implementation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerOperator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    Compatible,
    ArbitraryEqual,
    In,
    NotIn,
}

impl MarkerOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::Compatible => "~=",
            Self::ArbitraryEqual => "===",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "===" => Self::ArbitraryEqual,
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            "<=" => Self::LessOrEqual,
            ">=" => Self::GreaterOrEqual,
            "~=" => Self::Compatible,
            "<" => Self::LessThan,
            ">" => Self::GreaterThan,
            _ => return None,
        })
    }
}

impl fmt::Display for MarkerOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkerValue {
    Variable(String),
    Literal(String),
}

impl MarkerValue {
    fn is_variable(&self, name: &str) -> bool {
        matches!(self, Self::Variable(v) if v == name)
    }

    fn resolve<'a>(&'a self, environment: &'a MarkerEnvironment) -> Result<&'a str> {
        match self {
            Self::Literal(value) => Ok(value.as_str()),
            Self::Variable(name) => environment.get(name).ok_or_else(|| {
                Error::MarkerError(format!("undefined environment variable '{}'", name))
            }),
        }
    }
}

impl fmt::Display for MarkerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Variable(name) => f.write_str(name),
            Self::Literal(value) if value.contains('"') => write!(f, "'{}'", value),
            Self::Literal(value) => write!(f, "\"{}\"", value),
        }
    }
}

/// A single `left op right` comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarkerExpression {
    pub left: MarkerValue,
    pub operator: MarkerOperator,
    pub right: MarkerValue,
}

impl MarkerExpression {
    fn always_true() -> Self {
        Self {
            left: MarkerValue::Variable("python_version".to_string()),
            operator: MarkerOperator::GreaterOrEqual,
            right: MarkerValue::Literal("0.0".to_string()),
        }
    }

    fn evaluate(&self, environment: &MarkerEnvironment) -> Result<bool> {
        let lhs = self.left.resolve(environment)?;
        let rhs = self.right.resolve(environment)?;
        compare(lhs, self.operator, rhs)
    }
}

impl fmt::Display for MarkerExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.operator, self.right)
    }
}

fn compare(lhs: &str, operator: MarkerOperator, rhs: &str) -> Result<bool> {
    match operator {
        MarkerOperator::In => return Ok(rhs.contains(lhs)),
        MarkerOperator::NotIn => return Ok(!rhs.contains(lhs)),
        MarkerOperator::ArbitraryEqual => return Ok(lhs == rhs),
        _ => {}
    }

    if looks_like_version(lhs) && looks_like_version(rhs) {
        if let Ok(spec) = Specifier::parse(&format!("{}{}", operator, rhs)) {
            return Ok(spec.matches(lhs));
        }
    }

    match operator {
        MarkerOperator::Equal => Ok(lhs == rhs),
        MarkerOperator::NotEqual => Ok(lhs != rhs),
        MarkerOperator::LessThan => Ok(lhs < rhs),
        MarkerOperator::LessOrEqual => Ok(lhs <= rhs),
        MarkerOperator::GreaterThan => Ok(lhs > rhs),
        MarkerOperator::GreaterOrEqual => Ok(lhs >= rhs),
        _ => Err(Error::MarkerError(format!(
            "undefined comparison {:?} {} {:?}",
            lhs, operator, rhs
        ))),
    }
}

/// Parsed marker expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkerTree {
    Expression(MarkerExpression),
    And(Vec<MarkerTree>),
    Or(Vec<MarkerTree>),
}

impl MarkerTree {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = MarkerParser { tokens, pos: 0 };
        let tree = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            return Err(Error::MarkerError(format!(
                "unexpected token {:?} in marker '{}'",
                parser.tokens[parser.pos], text
            )));
        }
        Ok(tree)
    }

    pub fn evaluate(&self, environment: &MarkerEnvironment) -> Result<bool> {
        match self {
            Self::Expression(expr) => expr.evaluate(environment),
            Self::And(children) => {
                for child in children {
                    if !child.evaluate(environment)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(children) => {
                for child in children {
                    if child.evaluate(environment)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Copy of this tree with every `extra` comparison made always true
    ///
    /// Extra names found along the way are added to `extras`.
    pub fn without_extras(&self, extras: &mut BTreeSet<String>) -> MarkerTree {
        match self {
            Self::Expression(expr) => {
                let other = if expr.left.is_variable("extra") {
                    &expr.right
                } else if expr.right.is_variable("extra") {
                    &expr.left
                } else {
                    return self.clone();
                };
                if let MarkerValue::Literal(name) = other {
                    extras.insert(name.clone());
                }
                Self::Expression(MarkerExpression::always_true())
            }
            Self::And(children) => {
                Self::And(children.iter().map(|c| c.without_extras(extras)).collect())
            }
            Self::Or(children) => {
                Self::Or(children.iter().map(|c| c.without_extras(extras)).collect())
            }
        }
    }
}

impl fmt::Display for MarkerTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expr) => write!(f, "{}", expr),
            Self::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    match child {
                        Self::Or(_) => write!(f, "({})", child)?,
                        _ => write!(f, "{}", child)?,
                    }
                }
                Ok(())
            }
            Self::Or(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    write!(f, "{}", child)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Literal(String),
    Ident(String),
    Operator(MarkerOperator),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' | '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(Error::MarkerError(format!(
                        "unterminated string in marker '{}'",
                        text
                    )));
                }
                tokens.push(Token::Literal(value));
            }
            '=' | '!' | '<' | '>' | '~' => {
                let rest = &text[start..];
                let symbol = ["===", "==", "!=", "<=", ">=", "~=", "<", ">"]
                    .into_iter()
                    .find(|op| rest.starts_with(op))
                    .ok_or_else(|| {
                        Error::MarkerError(format!("invalid operator in marker '{}'", text))
                    })?;
                for _ in 0..symbol.len() {
                    chars.next();
                }
                if let Some(op) = MarkerOperator::from_symbol(symbol) {
                    tokens.push(Token::Operator(op));
                }
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(Error::MarkerError(format!(
                    "unexpected character '{}' in marker '{}'",
                    other, text
                )));
            }
        }
    }

    Ok(tokens)
}

struct MarkerParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl MarkerParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word == keyword)
    }

    fn parse_or(&mut self) -> Result<MarkerTree> {
        let mut children = vec![self.parse_and()?];
        while self.peek_keyword("or") {
            self.pos += 1;
            children.push(self.parse_and()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            MarkerTree::Or(children)
        })
    }

    fn parse_and(&mut self) -> Result<MarkerTree> {
        let mut children = vec![self.parse_atom()?];
        while self.peek_keyword("and") {
            self.pos += 1;
            children.push(self.parse_atom()?);
        }
        Ok(if children.len() == 1 {
            children.remove(0)
        } else {
            MarkerTree::And(children)
        })
    }

    fn parse_atom(&mut self) -> Result<MarkerTree> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let inner = self.parse_or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(Error::MarkerError("expected ')'".to_string())),
            };
        }

        let left = self.parse_value()?;
        let operator = self.parse_operator()?;
        let right = self.parse_value()?;
        Ok(MarkerTree::Expression(MarkerExpression {
            left,
            operator,
            right,
        }))
    }

    fn parse_value(&mut self) -> Result<MarkerValue> {
        match self.next() {
            Some(Token::Literal(value)) => Ok(MarkerValue::Literal(value)),
            Some(Token::Ident(name)) if KNOWN_VARIABLES.contains(&name.as_str()) => {
                Ok(MarkerValue::Variable(name))
            }
            Some(Token::Ident(name)) => Err(Error::MarkerError(format!(
                "unknown marker variable '{}'",
                name
            ))),
            Some(other) => Err(Error::MarkerError(format!(
                "expected marker variable or string, found {:?}",
                other
            ))),
            None => Err(Error::MarkerError(
                "expected marker variable or string, found end of input".to_string(),
            )),
        }
    }

    fn parse_operator(&mut self) -> Result<MarkerOperator> {
        match self.next() {
            Some(Token::Operator(op)) => Ok(op),
            Some(Token::Ident(word)) if word == "in" => Ok(MarkerOperator::In),
            Some(Token::Ident(word)) if word == "not" => match self.next() {
                Some(Token::Ident(next)) if next == "in" => Ok(MarkerOperator::NotIn),
                _ => Err(Error::MarkerError("expected 'in' after 'not'".to_string())),
            },
            other => Err(Error::MarkerError(format!(
                "expected marker operator, found {:?}",
                other
            ))),
        }
    }
}

/// Values of the marker variables for a target interpreter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerEnvironment {
    pub implementation_name: String,
    pub implementation_version: String,
    pub os_name: String,
    pub platform_machine: String,
    pub platform_python_implementation: String,
    pub platform_release: String,
    pub platform_system: String,
    pub platform_version: String,
    pub python_full_version: String,
    pub python_version: String,
    pub sys_platform: String,
}

impl MarkerEnvironment {
    /// Environment describing CPython `python_full_version` on this host
    ///
    /// Used when the interpreter cannot be asked directly.
    pub fn for_host(python_full_version: &str) -> Self {
        let python_version = python_full_version
            .split('.')
            .take(2)
            .collect::<Vec<_>>()
            .join(".");
        let (sys_platform, os_name, platform_system) = match std::env::consts::OS {
            "linux" => ("linux", "posix", "Linux"),
            "macos" => ("darwin", "posix", "Darwin"),
            "windows" => ("win32", "nt", "Windows"),
            other => (other, "posix", other),
        };
        Self {
            implementation_name: "cpython".to_string(),
            implementation_version: python_full_version.to_string(),
            os_name: os_name.to_string(),
            platform_machine: std::env::consts::ARCH.to_string(),
            platform_python_implementation: "CPython".to_string(),
            platform_release: String::new(),
            platform_system: platform_system.to_string(),
            platform_version: String::new(),
            python_full_version: python_full_version.to_string(),
            python_version,
            sys_platform: sys_platform.to_string(),
        }
    }

    /// Look up a marker variable, `None` for `extra` and unknown names
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "implementation_name" => &self.implementation_name,
            "implementation_version" => &self.implementation_version,
            "os_name" | "os.name" => &self.os_name,
            "platform_machine" | "platform.machine" => &self.platform_machine,
            "platform_python_implementation"
            | "platform.python_implementation"
            | "python_implementation" => &self.platform_python_implementation,
            "platform_release" => &self.platform_release,
            "platform_system" => &self.platform_system,
            "platform_version" | "platform.version" => &self.platform_version,
            "python_full_version" => &self.python_full_version,
            "python_version" => &self.python_version,
            "sys_platform" | "sys.platform" => &self.sys_platform,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Outcome of evaluating a requirement's marker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkerEvaluation {
    /// `None` when evaluation failed
    pub result: Option<bool>,
    /// Extra names referenced by the marker
    pub extras: BTreeSet<String>,
    /// Marker text with extras neutralized, set only on success
    pub evaluated: Option<String>,
    pub error: Option<String>,
}

/// Evaluate an optional marker, treating a missing one as true
pub fn evaluate_marker(
    marker: Option<&MarkerTree>,
    environment: &MarkerEnvironment,
) -> MarkerEvaluation {
    let Some(marker) = marker else {
        return MarkerEvaluation {
            result: Some(true),
            ..Default::default()
        };
    };

    let mut extras = BTreeSet::new();
    let neutral = marker.without_extras(&mut extras);
    match neutral.evaluate(environment) {
        Ok(result) => MarkerEvaluation {
            result: Some(result),
            extras,
            evaluated: Some(neutral.to_string()),
            error: None,
        },
        Err(e) => {
            warn!("Failed to evaluate marker {}: {}", marker, e);
            MarkerEvaluation {
                result: None,
                extras,
                evaluated: None,
                error: Some(e.to_string()),
            }
        }
    }
}

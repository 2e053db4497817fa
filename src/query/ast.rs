//! Target expression tree
//!
//! A parsed render target is a tree of function calls over path patterns and
//! literals. The tree is built once per target by the parser and owned by the
//! evaluation call that built it; nothing is shared across requests.
//!
//! Function dispatch is a closed set looked up by name at evaluation time
//! (see [`crate::query::functions`]); the tree itself carries names, not
//! function objects, so parsing needs no registry.
//!
//! `Display` re-serializes a tree back to function-call syntax; parsing that
//! output yields an equal tree, which is what function output names are built
//! from.

use std::collections::BTreeMap;
use std::fmt;

/// A node in a target expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Glob-style metric path pattern, resolved by the index at evaluation
    Path(String),
    /// Numeric literal argument
    Number(f64),
    /// Quoted string argument
    Text(String),
    /// Function application over child expressions
    Call(FunctionCall),
}

/// A function application node
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Function name, matched case-sensitively against the registry
    pub name: String,
    /// Positional arguments in declaration order
    pub args: Vec<Expression>,
    /// `key=value` arguments; sorted map keeps serialization stable
    pub named: BTreeMap<String, Literal>,
}

impl FunctionCall {
    /// Create a call with positional arguments only
    pub fn new(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            args,
            named: BTreeMap::new(),
        }
    }
}

/// Literal value usable as a named argument
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// Quoted string literal
    Text(String),
    /// Boolean literal
    Bool(bool),
}

impl Expression {
    /// Convenience constructor for a path pattern leaf
    pub fn path(pattern: impl Into<String>) -> Self {
        Expression::Path(pattern.into())
    }

    /// Convenience constructor for a call node
    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call(FunctionCall::new(name, args))
    }

    /// Whether any node in this tree is a path pattern
    pub fn has_paths(&self) -> bool {
        match self {
            Expression::Path(_) => true,
            Expression::Number(_) | Expression::Text(_) => false,
            Expression::Call(call) => call.args.iter().any(Expression::has_paths),
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        write!(f, "{}", value as i64)
    } else {
        write!(f, "{}", value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write_number(f, *n),
            Literal::Text(s) => write!(f, "'{}'", s),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        let mut first = true;
        for arg in &self.args {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{}", arg)?;
        }
        for (key, value) in &self.named {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{}={}", key, value)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Path(pattern) => write!(f, "{}", pattern),
            Expression::Number(n) => write_number(f, *n),
            Expression::Text(s) => write!(f, "'{}'", s),
            Expression::Call(call) => write!(f, "{}", call),
        }
    }
}

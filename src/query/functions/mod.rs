//! Series-transforming functions and their registry
//!
//! Every function a target expression can apply lives here as a closed,
//! enumerated set: a struct per function implementing [`GraphiteFunction`],
//! registered once at startup in a [`FunctionRegistry`]. There is no dynamic
//! registration and no reflection; after construction the registry is
//! read-only and safe to share across request tasks without locking.
//!
//! Functions are pure transforms over already-fetched series: they never
//! fetch data themselves. The evaluator validates an argument list against a
//! function's [`Signature`] before invoking it, so `apply` bodies can assume
//! arity and kinds are right.

mod combine;
mod decorate;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::query::error::{QueryError, QueryResult};
use crate::series::Series;

pub use combine::{AverageSeries, DivideSeries, SumSeries};
pub use decorate::{Dashed, SecondYAxis, Stacked};

/// A value produced by evaluating one expression node
#[derive(Debug, Clone)]
pub enum EvalValue {
    /// Series list from a path leaf or a function application
    Series(Vec<Series>),
    /// Numeric literal
    Number(f64),
    /// String literal
    Text(String),
}

impl EvalValue {
    /// The argument kind this value satisfies
    pub fn kind(&self) -> ArgKind {
        match self {
            EvalValue::Series(_) => ArgKind::Series,
            EvalValue::Number(_) => ArgKind::Number,
            EvalValue::Text(_) => ArgKind::Text,
        }
    }

    /// Unwrap a series list, panicking on kind mismatch
    ///
    /// Only called after signature validation, which guarantees the kind.
    pub(crate) fn into_series(self) -> Vec<Series> {
        match self {
            EvalValue::Series(list) => list,
            other => unreachable!("validated argument was not series: {:?}", other.kind()),
        }
    }
}

/// Kind of one argument position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A list of series (path leaf or nested call result)
    Series,
    /// A numeric literal
    Number,
    /// A string literal
    Text,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Series => write!(f, "series"),
            ArgKind::Number => write!(f, "number"),
            ArgKind::Text => write!(f, "string"),
        }
    }
}

/// Declared argument shape of a function
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    /// Required positional argument kinds
    pub positional: &'static [ArgKind],
    /// Kind accepted for any further arguments; `None` means exact arity
    pub variadic: Option<ArgKind>,
}

impl Signature {
    /// Human-readable form used in argument errors
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self.positional.iter().map(|k| k.to_string()).collect();
        if let Some(kind) = self.variadic {
            parts.push(format!("{}...", kind));
        }
        format!("({})", parts.join(", "))
    }

    /// Validate an argument list against this signature
    pub fn validate(&self, function: &str, args: &[EvalValue]) -> QueryResult<()> {
        let arity_ok = match self.variadic {
            Some(_) => args.len() >= self.positional.len(),
            None => args.len() == self.positional.len(),
        };

        let kinds_ok = arity_ok
            && args.iter().enumerate().all(|(i, arg)| {
                let expected = self
                    .positional
                    .get(i)
                    .copied()
                    .or(self.variadic)
                    .unwrap_or(ArgKind::Series);
                arg.kind() == expected
            });

        if arity_ok && kinds_ok {
            return Ok(());
        }

        let got: Vec<String> = args.iter().map(|a| a.kind().to_string()).collect();
        Err(QueryError::Argument {
            function: function.to_string(),
            expected: self.describe(),
            got: format!("({})", got.join(", ")),
        })
    }
}

/// A registered series-transforming function
pub trait GraphiteFunction: Send + Sync + fmt::Debug {
    /// Registry name, matched case-sensitively
    fn name(&self) -> &'static str;

    /// Declared argument shape, enforced by the evaluator before `apply`
    fn signature(&self) -> Signature;

    /// Apply the function to validated arguments
    ///
    /// `call_text` is the serialized call expression, used to label output
    /// series. The result list's length is the function's business; an
    /// aggregate collapses N inputs to 1.
    fn apply(&self, call_text: &str, args: Vec<EvalValue>) -> QueryResult<Vec<Series>>;
}

/// Name → function table, built once at startup
pub struct FunctionRegistry {
    functions: HashMap<&'static str, Arc<dyn GraphiteFunction>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Create a registry holding the full built-in set
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SumSeries));
        registry.register(Arc::new(AverageSeries));
        registry.register(Arc::new(DivideSeries));
        registry.register(Arc::new(Stacked));
        registry.register(Arc::new(Dashed));
        registry.register(Arc::new(SecondYAxis));
        registry
    }

    /// Register a function under its own name
    pub fn register(&mut self, function: Arc<dyn GraphiteFunction>) {
        self.functions.insert(function.name(), function);
    }

    /// Look up a function by exact, case-sensitive name
    ///
    /// This is the single error path for targets referencing nonexistent
    /// functions.
    pub fn resolve(&self, name: &str) -> QueryResult<Arc<dyn GraphiteFunction>> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownFunction(name.to_string()))
    }

    /// Registered names, unordered
    pub fn names(&self) -> Vec<&'static str> {
        self.functions.keys().copied().collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.len())
            .finish()
    }
}

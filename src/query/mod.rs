//! Target expression parsing, function evaluation and render assembly
//!
//! The pipeline for one render target:
//!
//! ```text
//! "divideSeries(sumSeries(host.*.req),sumSeries(host.*.err))"
//!        │ parser::parse
//!        ▼
//!   Expression tree (calls, path patterns, literals)
//!        │ Evaluator::evaluate  (resolve leaves, fetch, merge tiers)
//!        ▼
//!   Vec<Series>, aligned and named
//! ```
//!
//! Parsing is pure; all I/O happens in the evaluator through the collaborator
//! traits in [`crate::engine`]. Errors stay scoped to the one target that
//! produced them (see [`render`]).

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod render;

pub use ast::{Expression, FunctionCall, Literal};
pub use error::{QueryError, QueryResult};
pub use evaluator::Evaluator;
pub use functions::{FunctionRegistry, GraphiteFunction};
pub use render::{ReaderService, TargetResult};

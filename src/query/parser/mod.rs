//! Target expression parsing
//!
//! One dialect: Graphite function-call syntax over dotted glob paths.
//! Parsing is pure and never consults the function registry: unknown names
//! and arity mistakes are reported at evaluation time, where tenant and
//! expression context is available for uniform error reporting.

mod graphite;

pub use graphite::parse;

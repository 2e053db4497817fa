//! Combining functions: sum, average, divide
//!
//! All three reconcile their inputs onto a common grid first (coarsest step,
//! overlapping range) and then combine element-wise. The null-propagation
//! rule is strict: a gap in any operand gaps the output sample. None of these
//! functions opts into gap filling.

use crate::query::error::{QueryError, QueryResult};
use crate::query::functions::{ArgKind, EvalValue, GraphiteFunction, Signature};
use crate::series::{align, normalize, Series};

/// Collect every series out of a validated argument list
fn flatten(args: Vec<EvalValue>) -> Vec<Series> {
    args.into_iter()
        .flat_map(EvalValue::into_series)
        .collect()
}

/// Element-wise combination over normalized series
///
/// `combine` sees the sample from every input at one timestamp; it is only
/// called when all samples are present, per the null-propagation rule.
fn combine_rows(
    name: &str,
    normalized: &[Series],
    combine: impl Fn(&[f64]) -> f64,
) -> QueryResult<Vec<Series>> {
    let template = &normalized[0];
    let mut values = Vec::with_capacity(template.len());
    let mut row = Vec::with_capacity(normalized.len());

    for i in 0..template.len() {
        row.clear();
        for series in normalized {
            if let Some(v) = series.values[i] {
                row.push(v);
            }
        }
        if row.len() == normalized.len() {
            values.push(Some(combine(&row)));
        } else {
            values.push(None);
        }
    }

    let series = Series::new(name, template.start, template.end, template.step, values)?;
    Ok(vec![series])
}

/// `sumSeries(seriesList, ...)`: element-wise sum of all input series
///
/// An empty flattened input (every pattern matched nothing) yields an empty
/// result, not an error.
#[derive(Debug)]
pub struct SumSeries;

impl GraphiteFunction for SumSeries {
    fn name(&self) -> &'static str {
        "sumSeries"
    }

    fn signature(&self) -> Signature {
        Signature {
            positional: &[ArgKind::Series],
            variadic: Some(ArgKind::Series),
        }
    }

    fn apply(&self, call_text: &str, args: Vec<EvalValue>) -> QueryResult<Vec<Series>> {
        let flat = flatten(args);
        if flat.is_empty() {
            return Ok(Vec::new());
        }
        let normalized = normalize(&flat)?;
        combine_rows(call_text, &normalized, |row| row.iter().sum())
    }
}

/// `averageSeries(seriesList, ...)`: element-wise arithmetic mean
#[derive(Debug)]
pub struct AverageSeries;

impl GraphiteFunction for AverageSeries {
    fn name(&self) -> &'static str {
        "averageSeries"
    }

    fn signature(&self) -> Signature {
        Signature {
            positional: &[ArgKind::Series],
            variadic: Some(ArgKind::Series),
        }
    }

    fn apply(&self, call_text: &str, args: Vec<EvalValue>) -> QueryResult<Vec<Series>> {
        let flat = flatten(args);
        if flat.is_empty() {
            return Ok(Vec::new());
        }
        let normalized = normalize(&flat)?;
        combine_rows(call_text, &normalized, |row| {
            row.iter().sum::<f64>() / row.len() as f64
        })
    }
}

/// `divideSeries(dividendSeriesList, divisorSeries)`
///
/// Pairs the sole divisor against each dividend positionally; output order
/// matches dividend order. A sample is a gap when either operand is a gap or
/// the divisor sample is zero; no infinity or NaN ever reaches the caller.
#[derive(Debug)]
pub struct DivideSeries;

impl GraphiteFunction for DivideSeries {
    fn name(&self) -> &'static str {
        "divideSeries"
    }

    fn signature(&self) -> Signature {
        Signature {
            positional: &[ArgKind::Series, ArgKind::Series],
            variadic: None,
        }
    }

    fn apply(&self, _call_text: &str, args: Vec<EvalValue>) -> QueryResult<Vec<Series>> {
        let mut iter = args.into_iter();
        let dividends = iter.next().map(EvalValue::into_series).unwrap_or_default();
        let divisors = iter.next().map(EvalValue::into_series).unwrap_or_default();

        if divisors.len() != 1 {
            return Err(QueryError::Argument {
                function: self.name().to_string(),
                expected: "exactly one divisor series".to_string(),
                got: format!("{} series", divisors.len()),
            });
        }
        let divisor = &divisors[0];

        let mut output = Vec::with_capacity(dividends.len());
        for dividend in &dividends {
            let (num, den) = align(dividend, divisor)?;
            let values = num
                .values
                .iter()
                .zip(&den.values)
                .map(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) if *b != 0.0 => Some(a / b),
                    _ => None,
                })
                .collect();
            let name = format!("divideSeries({},{})", dividend.name, divisor.name);
            output.push(Series::new(name, num.start, num.end, num.step, values)?);
        }
        Ok(output)
    }
}

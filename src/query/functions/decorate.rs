//! Display-only functions
//!
//! These are pass-through transforms: they attach rendering metadata to each
//! input series and must never alter sample values, steps or ranges.

use crate::query::error::QueryResult;
use crate::query::functions::{ArgKind, EvalValue, GraphiteFunction, Signature};
use crate::series::Series;

const SINGLE_SERIES: Signature = Signature {
    positional: &[ArgKind::Series],
    variadic: None,
};

fn decorate(args: Vec<EvalValue>, set: impl Fn(&mut Series)) -> QueryResult<Vec<Series>> {
    let mut list = args
        .into_iter()
        .next()
        .map(EvalValue::into_series)
        .unwrap_or_default();
    for series in &mut list {
        set(series);
    }
    Ok(list)
}

/// `stacked(seriesList)`: mark every series for stacked rendering
#[derive(Debug)]
pub struct Stacked;

impl GraphiteFunction for Stacked {
    fn name(&self) -> &'static str {
        "stacked"
    }

    fn signature(&self) -> Signature {
        SINGLE_SERIES
    }

    fn apply(&self, _call_text: &str, args: Vec<EvalValue>) -> QueryResult<Vec<Series>> {
        decorate(args, |s| s.render.stacked = true)
    }
}

/// `dashed(seriesList)`: mark every series for dashed rendering
#[derive(Debug)]
pub struct Dashed;

impl GraphiteFunction for Dashed {
    fn name(&self) -> &'static str {
        "dashed"
    }

    fn signature(&self) -> Signature {
        SINGLE_SERIES
    }

    fn apply(&self, _call_text: &str, args: Vec<EvalValue>) -> QueryResult<Vec<Series>> {
        decorate(args, |s| s.render.dashed = true)
    }
}

/// `secondYAxis(seriesList)`: plot every series on the secondary Y axis
#[derive(Debug)]
pub struct SecondYAxis;

impl GraphiteFunction for SecondYAxis {
    fn name(&self) -> &'static str {
        "secondYAxis"
    }

    fn signature(&self) -> Signature {
        SINGLE_SERIES
    }

    fn apply(&self, _call_text: &str, args: Vec<EvalValue>) -> QueryResult<Vec<Series>> {
        decorate(args, |s| s.render.second_y_axis = true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Vec<EvalValue> {
        let a = Series::from_values("a", 0, 60, vec![Some(1.0), Some(2.0)]).unwrap();
        let b = Series::from_values("b", 0, 60, vec![None, Some(4.0)]).unwrap();
        vec![EvalValue::Series(vec![a, b])]
    }

    #[test]
    fn test_stacked_sets_only_its_flag() {
        let out = Stacked.apply("stacked(x)", fixture()).unwrap();
        assert_eq!(out.len(), 2);
        for series in &out {
            assert!(series.render.stacked);
            assert!(!series.render.dashed);
            assert!(!series.render.second_y_axis);
        }
    }

    #[test]
    fn test_values_and_names_untouched() {
        let out = Dashed.apply("dashed(x)", fixture()).unwrap();
        assert_eq!(out[0].name, "a");
        assert_eq!(out[0].values, vec![Some(1.0), Some(2.0)]);
        assert_eq!(out[1].values, vec![None, Some(4.0)]);
        assert!(out.iter().all(|s| s.render.dashed));
    }

    #[test]
    fn test_second_y_axis() {
        let out = SecondYAxis.apply("secondYAxis(x)", fixture()).unwrap();
        assert!(out.iter().all(|s| s.render.second_y_axis));
    }

    #[test]
    fn test_decorations_compose() {
        let once = Stacked.apply("stacked(x)", fixture()).unwrap();
        let twice = Dashed
            .apply("dashed(stacked(x))", vec![EvalValue::Series(once)])
            .unwrap();
        assert!(twice.iter().all(|s| s.render.stacked && s.render.dashed));
    }
}

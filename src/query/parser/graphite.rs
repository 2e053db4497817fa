//! Graphite target expression parser
//!
//! Parses render target strings into [`Expression`] trees.
//!
//! # Supported Syntax
//!
//! ```text
//! # Bare path patterns
//! host.web1.cpu
//! host.*.cpu
//! host.{web1,web2}.cpu[0-9]
//!
//! # Function calls, arbitrarily nested
//! sumSeries(host.*.requests)
//! divideSeries(sumSeries(host.*.req),sumSeries(host.*.err))
//!
//! # Literal and named arguments
//! dashed(host.web1.cpu, 5)
//! secondYAxis(host.web1.cpu, align='right')
//! ```
//!
//! Failures carry the byte offset where parsing stopped and a description of
//! what was expected.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0},
    combinator::{cut, map, recognize},
    multi::{many1, separated_list1},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

use crate::query::ast::{Expression, FunctionCall, Literal};
use crate::query::error::{QueryError, QueryResult};

/// Parse a target string into an expression tree
///
/// Pure function: no I/O, no registry lookups. Surrounding whitespace is
/// ignored; anything else left over after a complete expression is an error.
pub fn parse(input: &str) -> QueryResult<Expression> {
    if input.trim().is_empty() {
        return Err(QueryError::Syntax {
            position: 0,
            expected: "an expression".to_string(),
        });
    }

    let (rest, expr) =
        match terminated(preceded(multispace0, expression), multispace0).parse(input) {
            Ok(ok) => ok,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                return Err(syntax_error(input, e.input));
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(QueryError::Syntax {
                    position: input.len(),
                    expected: "more input".to_string(),
                });
            }
        };

    if !rest.is_empty() {
        return Err(QueryError::Syntax {
            position: input.len() - rest.len(),
            expected: "end of expression".to_string(),
        });
    }
    Ok(expr)
}

fn syntax_error(original: &str, remaining: &str) -> QueryError {
    let position = original.len() - remaining.len();
    let expected = match remaining.chars().next() {
        None => "closing ')'".to_string(),
        Some(')') => "an argument".to_string(),
        Some(c) => format!("an expression (found '{}')", c),
    };
    QueryError::Syntax { position, expected }
}

// ============================================================================
// Grammar
// ============================================================================

/// One argument slot: positional expression or `key=value`
enum Arg {
    Positional(Expression),
    Named(String, Literal),
}

fn expression(input: &str) -> IResult<&str, Expression> {
    alt((
        function_call,
        map(quoted_string, |s: &str| Expression::Text(s.to_string())),
        path_or_number,
    ))
    .parse(input)
}

/// Parse `name(arg, arg, ...)`
///
/// Once the opening parenthesis is seen the parse is committed (`cut`), so a
/// malformed argument list reports its own error instead of backtracking into
/// a bogus path parse.
fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, _) = (multispace0, char('(')).parse(input)?;
    let (input, args) =
        cut(separated_list1((multispace0, char(',')), argument)).parse(input)?;
    let (input, _) = cut((multispace0, char(')'))).parse(input)?;

    let mut call = FunctionCall::new(name, Vec::with_capacity(args.len()));
    for arg in args {
        match arg {
            Arg::Positional(expr) => call.args.push(expr),
            Arg::Named(key, value) => {
                call.named.insert(key, value);
            }
        }
    }
    Ok((input, Expression::Call(call)))
}

fn argument(input: &str) -> IResult<&str, Arg> {
    preceded(
        multispace0,
        alt((
            map(named_arg, |(key, value)| Arg::Named(key, value)),
            map(expression, Arg::Positional),
        )),
    )
    .parse(input)
}

fn named_arg(input: &str) -> IResult<&str, (String, Literal)> {
    let (input, key) = identifier(input)?;
    let (input, _) = (multispace0, char('='), multispace0).parse(input)?;
    let (input, value) = named_literal(input)?;
    Ok((input, (key.to_string(), value)))
}

fn named_literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(quoted_string, |s: &str| Literal::Text(s.to_string())),
        map(tag("true"), |_| Literal::Bool(true)),
        map(tag("false"), |_| Literal::Bool(false)),
        map(number, Literal::Number),
    ))
    .parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize((
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn quoted_string(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))
    .parse(input)
}

/// Characters legal in a path pattern outside brace groups
fn is_plain_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '*' | '?' | '[' | ']')
}

fn brace_group(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('{'),
        take_while1(|c: char| is_plain_path_char(c) || c == ','),
        char('}'),
    ))
    .parse(input)
}

fn path_token(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((take_while1(is_plain_path_char), brace_group)))).parse(input)
}

/// A bare token is a number literal when it reads as one, a path otherwise
///
/// The leading-character check keeps segments like `nan` or `inf` from being
/// swallowed by float parsing.
fn path_or_number(input: &str) -> IResult<&str, Expression> {
    map(path_token, |token: &str| {
        let numeric_start = token
            .chars()
            .next()
            .map(|c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.')
            .unwrap_or(false);
        match token.parse::<f64>() {
            Ok(n) if numeric_start => Expression::Number(n),
            _ => Expression::Path(token.to_string()),
        }
    })
    .parse(input)
}

fn number(input: &str) -> IResult<&str, f64> {
    let (rest, token) = take_while1(|c: char| {
        c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')
    })(input)?;
    match token.parse::<f64>() {
        Ok(value) => Ok((rest, value)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Float,
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_path() {
        let expr = parse("host.web1.cpu").unwrap();
        assert_eq!(expr, Expression::path("host.web1.cpu"));
    }

    #[test]
    fn test_parse_glob_path() {
        let expr = parse("host.{web1,web2}.cpu[0-9].*").unwrap();
        assert_eq!(expr, Expression::path("host.{web1,web2}.cpu[0-9].*"));
    }

    #[test]
    fn test_parse_simple_call() {
        let expr = parse("sumSeries(host.*.requests)").unwrap();
        assert_eq!(
            expr,
            Expression::call("sumSeries", vec![Expression::path("host.*.requests")])
        );
    }

    #[test]
    fn test_parse_nested_call() {
        let expr = parse("divideSeries(sumSeries(host.*.req),sumSeries(host.*.err))").unwrap();
        match expr {
            Expression::Call(call) => {
                assert_eq!(call.name, "divideSeries");
                assert_eq!(call.args.len(), 2);
                assert!(matches!(call.args[0], Expression::Call(_)));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_whitespace_and_literals() {
        let expr = parse("dashed( host.web1.cpu , 5 )").unwrap();
        assert_eq!(
            expr,
            Expression::call(
                "dashed",
                vec![Expression::path("host.web1.cpu"), Expression::Number(5.0)]
            )
        );
    }

    #[test]
    fn test_parse_string_argument() {
        let expr = parse("alias(host.web1.cpu,'cpu load')").unwrap();
        match expr {
            Expression::Call(call) => {
                assert_eq!(call.args[1], Expression::Text("cpu load".to_string()));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_named_argument() {
        let expr = parse("dashed(host.web1.cpu,dashLength=10)").unwrap();
        match expr {
            Expression::Call(call) => {
                assert_eq!(call.args.len(), 1);
                assert_eq!(call.named["dashLength"], Literal::Number(10.0));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_negative_number() {
        let expr = parse("scale(host.web1.cpu,-1.5)").unwrap();
        match expr {
            Expression::Call(call) => {
                assert_eq!(call.args[1], Expression::Number(-1.5));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_unbalanced_parens() {
        let err = parse("sumSeries(host.*.requests").unwrap_err();
        match err {
            QueryError::Syntax { position, .. } => assert_eq!(position, 25),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_argument_list() {
        let err = parse("sumSeries()").unwrap_err();
        match err {
            QueryError::Syntax { position, expected } => {
                assert_eq!(position, 10);
                assert!(expected.contains("argument"));
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_illegal_character_in_path() {
        let err = parse("host.web$.cpu").unwrap_err();
        match err {
            QueryError::Syntax { position, .. } => assert_eq!(position, 8),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_garbage() {
        let err = parse("host.cpu)").unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").unwrap_err().is_syntax());
        assert!(parse("   ").unwrap_err().is_syntax());
    }

    #[test]
    fn test_numeric_looking_segment_stays_path() {
        // A leading digit with path structure is a path, not a number
        let expr = parse("5xx.count").unwrap();
        assert_eq!(expr, Expression::path("5xx.count"));

        // Bare reserved float words are paths too
        let expr = parse("sumSeries(nan.rate)").unwrap();
        match expr {
            Expression::Call(call) => {
                assert_eq!(call.args[0], Expression::path("nan.rate"));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_roundtrip_through_display() {
        let inputs = [
            "host.*.cpu",
            "sumSeries(host.*.requests)",
            "divideSeries(sumSeries(host.*.req),sumSeries(host.*.err))",
            "dashed(stacked(host.{a,b}.load),5)",
            "secondYAxis(host.web1.mem)",
        ];
        for input in inputs {
            let once = parse(input).unwrap();
            let again = parse(&once.to_string()).unwrap();
            assert_eq!(once, again, "round-trip failed for {}", input);
        }
    }
}

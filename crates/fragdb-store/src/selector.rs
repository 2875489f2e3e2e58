//! Path selectors understood by the in-memory store.
//!
//! A small subset of the path language:
//!
//! - `/a/b[@key='x']`: absolute xpath. Without a predicate on the last step it
//!   also matches every list entry `/a/b[@...]`.
//! - `//name`: any fragment whose last step is `name`.
//! - `//name[@leaf='v' and @other=3]`: as above, with leaf-value equality.
//!
//! Predicate values are single- or double-quoted strings (with backslash escapes)
//! or numbers.

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_while1};
use nom::character::complete::{char as pchar, multispace0, multispace1};
use nom::combinator::{all_consuming, map, opt};
use nom::multi::{many1, separated_list1};
use nom::number::complete::recognize_float;
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::IResult;
use serde_json::{Map, Value};

use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSelector {
    Absolute {
        xpath: String,
        /// Whether the last step already carries a predicate.
        keyed: bool,
    },
    Descendant {
        name: String,
        leaves: Vec<(String, String)>,
    },
}

impl PathSelector {
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let invalid = |reason: String| StoreError::InvalidPath {
            path: path.to_string(),
            reason,
        };

        let path = path.trim();
        if path.is_empty() {
            return Err(invalid("empty path".to_string()));
        }
        if !path.starts_with('/') {
            return Err(invalid("path must start with '/'".to_string()));
        }

        if path.starts_with("//") {
            let step = finish(all_consuming(descendant)(path)).map_err(invalid)?;
            return Ok(PathSelector::Descendant {
                name: step.name.to_string(),
                leaves: step.leaves.unwrap_or_default(),
            });
        }
        if path == "/" {
            return Ok(PathSelector::Absolute {
                xpath: path.to_string(),
                keyed: false,
            });
        }

        let steps = finish(all_consuming(absolute)(path)).map_err(invalid)?;
        Ok(PathSelector::Absolute {
            xpath: path.to_string(),
            keyed: steps.last().is_some_and(|step| step.leaves.is_some()),
        })
    }

    /// Whether a fragment with this xpath and attribute document matches.
    pub fn matches(&self, xpath: &str, attributes: Option<&str>) -> bool {
        match self {
            PathSelector::Absolute {
                xpath: selector,
                keyed,
            } => {
                xpath == selector
                    || (!keyed
                        && xpath
                            .strip_prefix(selector.as_str())
                            .is_some_and(|rest| rest.starts_with("[@")))
            }
            PathSelector::Descendant { name, leaves } => {
                if last_step_name(xpath) != Some(name.as_str()) {
                    return false;
                }
                if leaves.is_empty() {
                    return true;
                }
                let Some(attributes) = attributes else {
                    return false;
                };
                match serde_json::from_str::<Map<String, Value>>(attributes) {
                    Ok(map) => leaves
                        .iter()
                        .all(|(leaf, expected)| map.get(leaf).is_some_and(|v| leaf_equals(v, expected))),
                    Err(err) => {
                        tracing::warn!(
                            xpath,
                            error = %err,
                            "skipping fragment with unreadable attributes"
                        );
                        false
                    }
                }
            }
        }
    }
}

// ============================================================================
// Grammar
// ============================================================================

/// One `name[@leaf=value and ...]` step.
#[derive(Debug)]
struct Step<'a> {
    name: &'a str,
    leaves: Option<Vec<(String, String)>>,
}

fn finish<T>(result: IResult<&str, T>) -> Result<T, String> {
    match result {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) if e.input.is_empty() => {
            Err("unexpected end of path".to_string())
        }
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(format!("unexpected input at '{}'", e.input))
        }
        Err(nom::Err::Incomplete(_)) => Err("incomplete path".to_string()),
    }
}

fn absolute(input: &str) -> IResult<&str, Vec<Step<'_>>> {
    many1(preceded(pchar('/'), step))(input)
}

fn descendant(input: &str) -> IResult<&str, Step<'_>> {
    preceded(tag("//"), step)(input)
}

fn step(input: &str) -> IResult<&str, Step<'_>> {
    map(pair(name, opt(predicate)), |(name, leaves)| Step { name, leaves })(input)
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))(input)
}

fn predicate(input: &str) -> IResult<&str, Vec<(String, String)>> {
    delimited(
        pair(pchar('['), multispace0),
        separated_list1(delimited(multispace1, tag("and"), multispace1), term),
        pair(multispace0, pchar(']')),
    )(input)
}

fn term(input: &str) -> IResult<&str, (String, String)> {
    map(
        separated_pair(preceded(pchar('@'), name), ws(pchar('=')), leaf_value),
        |(leaf, value)| (leaf.to_string(), value),
    )(input)
}

fn leaf_value(input: &str) -> IResult<&str, String> {
    alt((
        single_string_lit,
        string_lit,
        map(recognize_float, |n: &str| n.to_string()),
    ))(input)
}

fn string_lit(input: &str) -> IResult<&str, String> {
    let esc = escaped_transform(
        is_not("\\\""),
        '\\',
        alt((map(tag("\\"), |_| "\\"), map(tag("\""), |_| "\""))),
    );
    delimited(pchar('"'), map(opt(esc), Option::unwrap_or_default), pchar('"'))(input)
}

fn single_string_lit(input: &str) -> IResult<&str, String> {
    let esc = escaped_transform(
        is_not("\\'"),
        '\\',
        alt((map(tag("\\"), |_| "\\"), map(tag("'"), |_| "'"))),
    );
    delimited(pchar('\''), map(opt(esc), Option::unwrap_or_default), pchar('\''))(input)
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

// ============================================================================
// Matching
// ============================================================================

/// Name of the last step of a stored xpath, `None` if it is not a plain path.
fn last_step_name(xpath: &str) -> Option<&str> {
    let (_, steps) = all_consuming(absolute)(xpath).ok()?;
    steps.last().map(|step| step.name)
}

fn leaf_equals(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        Value::Number(n) => n.to_string() == expected,
        Value::Bool(b) => b.to_string() == expected,
        Value::Array(items) => items.iter().any(|item| leaf_equals(item, expected)),
        _ => false,
    }
}

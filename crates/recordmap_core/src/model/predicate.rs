//! Record filter expressions.
//!
//! # Responsibility
//! - Describe "the same logical record" for dedup and retrieval.
//! - Evaluate against a [`Record`] identically in every store backend.
//!
//! # Invariants
//! - A missing field evaluates as `Null`.
//! - Ordering comparisons between non-comparable kinds are false, never errors.
//! - `Matches` is anchored to the whole field text.
//! - `And([])` is true and `Or([])` is false.
//! - Every `Matches` pattern must compile on its own; it is validated before
//!   any record is evaluated.

use crate::model::record::Record;
use crate::model::value::FieldValue;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Filter expression over record fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, FieldValue),
    Ne(String, FieldValue),
    Lt(String, FieldValue),
    Le(String, FieldValue),
    Gt(String, FieldValue),
    Ge(String, FieldValue),
    IsNull(String),
    In(String, Vec<FieldValue>),
    Contains(String, String),
    StartsWith(String, String),
    /// Regular expression matched against the whole text value.
    Matches(String, String),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Predicate evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateError {
    InvalidPattern { pattern: String, message: String },
}

impl Display for PredicateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPattern { pattern, message } => {
                write!(f, "invalid match pattern `{pattern}`: {message}")
            }
        }
    }
}

impl Error for PredicateError {}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Ne(field.into(), value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Lt(field.into(), value.into())
    }

    pub fn le(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Le(field.into(), value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Gt(field.into(), value.into())
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Ge(field.into(), value.into())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull(field.into())
    }

    pub fn one_of<V: Into<FieldValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains(field.into(), needle.into())
    }

    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::StartsWith(field.into(), prefix.into())
    }

    pub fn matches(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Matches(field.into(), pattern.into())
    }

    /// Combines this predicate with another one; flattens nested `And`.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Alternates this predicate with another one; flattens nested `Or`.
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluates this predicate against one record.
    ///
    /// # Errors
    /// - Returns `InvalidPattern` when a `Matches` pattern does not compile.
    pub fn evaluate(&self, record: &Record) -> Result<bool, PredicateError> {
        Ok(self.compile()?.matches(record))
    }

    /// Compiles every `Matches` pattern once for repeated evaluation.
    ///
    /// # Errors
    /// - Returns `InvalidPattern` for the first pattern that does not compile,
    ///   whether or not evaluation would reach it.
    pub fn compile(&self) -> Result<CompiledPredicate<'_>, PredicateError> {
        let mut patterns = HashMap::new();
        self.collect_patterns(&mut patterns)?;
        Ok(CompiledPredicate {
            predicate: self,
            patterns,
        })
    }

    fn collect_patterns<'a>(
        &'a self,
        patterns: &mut HashMap<&'a str, Regex>,
    ) -> Result<(), PredicateError> {
        match self {
            Self::Matches(_, pattern) => {
                if !patterns.contains_key(pattern.as_str()) {
                    patterns.insert(pattern.as_str(), compile_anchored(pattern)?);
                }
            }
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_patterns(patterns)?;
                }
            }
            Self::Not(inner) => inner.collect_patterns(patterns)?,
            _ => {}
        }
        Ok(())
    }

    fn evaluate_with(&self, record: &Record, patterns: &HashMap<&str, Regex>) -> bool {
        match self {
            Self::Eq(field, value) => record.value(field).loosely_equals(value),
            Self::Ne(field, value) => !record.value(field).loosely_equals(value),
            Self::Lt(field, value) => ordering_is(record.value(field), value, Ordering::is_lt),
            Self::Le(field, value) => ordering_is(record.value(field), value, Ordering::is_le),
            Self::Gt(field, value) => ordering_is(record.value(field), value, Ordering::is_gt),
            Self::Ge(field, value) => ordering_is(record.value(field), value, Ordering::is_ge),
            Self::IsNull(field) => record.value(field).is_null(),
            Self::In(field, values) => {
                let actual = record.value(field);
                values.iter().any(|value| actual.loosely_equals(value))
            }
            Self::Contains(field, needle) => record
                .value(field)
                .as_str()
                .is_some_and(|text| text.contains(needle.as_str())),
            Self::StartsWith(field, prefix) => record
                .value(field)
                .as_str()
                .is_some_and(|text| text.starts_with(prefix.as_str())),
            Self::Matches(field, pattern) => match patterns.get(pattern.as_str()) {
                Some(regex) => record
                    .value(field)
                    .as_str()
                    .is_some_and(|text| regex.is_match(text)),
                None => false,
            },
            Self::And(parts) => parts.iter().all(|part| part.evaluate_with(record, patterns)),
            Self::Or(parts) => parts.iter().any(|part| part.evaluate_with(record, patterns)),
            Self::Not(inner) => !inner.evaluate_with(record, patterns),
        }
    }
}

/// A predicate whose `Matches` patterns are already compiled.
#[derive(Debug)]
pub struct CompiledPredicate<'a> {
    predicate: &'a Predicate,
    patterns: HashMap<&'a str, Regex>,
}

impl CompiledPredicate<'_> {
    pub fn matches(&self, record: &Record) -> bool {
        self.predicate.evaluate_with(record, &self.patterns)
    }
}

fn ordering_is(actual: &FieldValue, expected: &FieldValue, accept: fn(Ordering) -> bool) -> bool {
    actual.compare(expected).is_some_and(accept)
}

fn compile_anchored(pattern: &str) -> Result<Regex, PredicateError> {
    let invalid = |err: regex::Error| PredicateError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    };
    // Validate alone first: an unbalanced pattern could close the anchor group.
    Regex::new(pattern).map_err(invalid)?;
    Regex::new(&format!("^(?:{pattern})$")).map_err(invalid)
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq(field, value) => write!(f, "{field} == {value}"),
            Self::Ne(field, value) => write!(f, "{field} != {value}"),
            Self::Lt(field, value) => write!(f, "{field} < {value}"),
            Self::Le(field, value) => write!(f, "{field} <= {value}"),
            Self::Gt(field, value) => write!(f, "{field} > {value}"),
            Self::Ge(field, value) => write!(f, "{field} >= {value}"),
            Self::IsNull(field) => write!(f, "{field} IS NULL"),
            Self::In(field, values) => {
                write!(f, "{field} IN [")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Self::Contains(field, needle) => write!(f, "{field} CONTAINS {needle:?}"),
            Self::StartsWith(field, prefix) => write!(f, "{field} BEGINSWITH {prefix:?}"),
            Self::Matches(field, pattern) => write!(f, "{field} MATCHES {pattern:?}"),
            Self::And(parts) => write_joined(f, parts, " AND ", "TRUE"),
            Self::Or(parts) => write_joined(f, parts, " OR ", "FALSE"),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

fn write_joined(
    f: &mut Formatter<'_>,
    parts: &[Predicate],
    separator: &str,
    empty: &str,
) -> std::fmt::Result {
    if parts.is_empty() {
        return write!(f, "{empty}");
    }
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            write!(f, "{separator}")?;
        }
        write!(f, "({part})")?;
    }
    Ok(())
}

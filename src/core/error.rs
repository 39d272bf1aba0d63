//! Core capability errors (parsing and validating domain atoms).
//!
//! These are bounded and stable: they describe refused input, never library
//! implementation details.

use thiserror::Error;

/// Invalid entity or status identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} id `{raw}` is invalid: {reason}")]
pub struct InvalidId {
    pub kind: &'static str,
    pub raw: String,
    pub reason: String,
}

/// Generic range violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field} value {value} out of range {min}..={max}")]
pub struct RangeError {
    pub field: &'static str,
    pub value: i64,
    pub min: i64,
    pub max: i64,
}

/// A scalar (date, tag, kind, rank) that failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field} `{raw}` is invalid: {reason}")]
pub struct InvalidValue {
    pub field: &'static str,
    pub raw: String,
    pub reason: String,
}

impl InvalidValue {
    pub fn new(field: &'static str, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

/// Canonical error enum for the core capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    InvalidValue(#[from] InvalidValue),
}

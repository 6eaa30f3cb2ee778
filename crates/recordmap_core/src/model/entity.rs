//! Entity name rules shared by every store backend.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Longest entity name a store accepts.
pub const ENTITY_NAME_MAX_CHARS: usize = 64;

static ENTITY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid entity name regex"));

/// Entity name validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityNameError {
    Empty,
    TooLong(String),
    InvalidCharacters(String),
}

impl Display for EntityNameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "entity name must not be empty"),
            Self::TooLong(name) => write!(
                f,
                "entity name `{name}` exceeds {ENTITY_NAME_MAX_CHARS} characters"
            ),
            Self::InvalidCharacters(name) => write!(
                f,
                "entity name `{name}` must match [A-Za-z_][A-Za-z0-9_]*"
            ),
        }
    }
}

impl Error for EntityNameError {}

/// Validates one entity name and returns it trimmed.
pub fn validate_entity_name(name: &str) -> Result<&str, EntityNameError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EntityNameError::Empty);
    }
    if trimmed.chars().count() > ENTITY_NAME_MAX_CHARS {
        return Err(EntityNameError::TooLong(trimmed.to_string()));
    }
    if !ENTITY_NAME_RE.is_match(trimmed) {
        return Err(EntityNameError::InvalidCharacters(trimmed.to_string()));
    }
    Ok(trimmed)
}

//! Store capability consumed by the mapping engine.
//!
//! # Responsibility
//! - Define the minimal contract a persistence backend must expose:
//!   fetch, blank-record creation, delete and commit of one changeset.
//! - Provide the error taxonomy shared by every backend.
//!
//! # Invariants
//! - `create_blank` and `delete` only touch the pending changeset.
//! - `fetch` sees pending creates and hides pending deletes.
//! - Only `commit` makes the changeset durable; a failed commit is returned,
//!   never turned into a process abort.

use crate::db::DbError;
use crate::model::entity::EntityNameError;
use crate::model::predicate::{Predicate, PredicateError};
use crate::model::record::Record;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

/// Persistence capability backing the mapping engine.
///
/// Implementations are driven from one thread against one changeset.
pub trait StoreAccess {
    /// Returns records of `entity`, filtered by `predicate` when present.
    fn fetch(&self, entity: &str, predicate: Option<&Predicate>) -> Result<Vec<Record>, FetchError>;

    /// Creates an empty record of `entity` inside the pending changeset.
    fn create_blank(&mut self, entity: &str) -> Result<&mut Record, UnknownEntityError>;

    /// Marks one record for removal in the pending changeset.
    fn delete(&mut self, record: &Record);

    /// Returns whether the pending changeset holds any create or delete.
    fn has_changes(&self) -> bool;

    /// Durably applies the pending changeset.
    fn commit(&mut self) -> Result<(), CommitError>;
}

/// Query execution failures.
#[derive(Debug)]
pub enum FetchError {
    UnknownEntity(String),
    InvalidPredicate(PredicateError),
    InvalidData(String),
    Db(DbError),
    /// Backend temporarily refused the query.
    Unavailable(String),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(entity) => write!(f, "unknown entity type: {entity}"),
            Self::InvalidPredicate(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "fetch unavailable: {message}"),
        }
    }
}

impl Error for FetchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPredicate(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::UnknownEntity(_) | Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<PredicateError> for FetchError {
    fn from(value: PredicateError) -> Self {
        Self::InvalidPredicate(value)
    }
}

impl From<DbError> for FetchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for FetchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// The store has no entity type registered under this name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEntityError(pub String);

impl UnknownEntityError {
    pub fn entity(&self) -> &str {
        &self.0
    }
}

impl Display for UnknownEntityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity type is not registered in the store: {}", self.0)
    }
}

impl Error for UnknownEntityError {}

/// The pending changeset could not be applied.
#[derive(Debug)]
pub enum CommitError {
    Db(DbError),
    InvalidData(String),
    Unavailable(String),
}

impl Display for CommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "commit failed: {err}"),
            Self::InvalidData(message) => write!(f, "commit failed: {message}"),
            Self::Unavailable(message) => write!(f, "commit unavailable: {message}"),
        }
    }
}

impl Error for CommitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for CommitError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CommitError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Entity registration failures.
#[derive(Debug)]
pub enum SchemaError {
    InvalidEntityName(EntityNameError),
    Db(DbError),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEntityName(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEntityName(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<EntityNameError> for SchemaError {
    fn from(value: EntityNameError) -> Self {
        Self::InvalidEntityName(value)
    }
}

impl From<DbError> for SchemaError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SchemaError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Applies an optional predicate to candidate records in order.
///
/// Patterns are compiled once per call, before any record is examined.
pub(crate) fn filter_records(
    records: impl IntoIterator<Item = Record>,
    predicate: Option<&Predicate>,
) -> Result<Vec<Record>, PredicateError> {
    let compiled = predicate.map(Predicate::compile).transpose()?;
    Ok(records
        .into_iter()
        .filter(|record| compiled.as_ref().map_or(true, |c| c.matches(record)))
        .collect())
}

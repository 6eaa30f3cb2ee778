//! Mapping engine: dedup-before-insert, cascading insert and conditional delete.
//!
//! # Responsibility
//! - Translate `Mappable` models into store fetch/create/delete calls.
//! - Batch one top-level insert or delete (full cascade included) into one
//!   commit of the store changeset.
//!
//! # Invariants
//! - At most one store commit per top-level `insert`/`delete` call.
//! - A model whose predicate matches an existing record is never inserted.
//! - A model without a predicate is always inserted (dedup disabled).
//! - Cascade failures are isolated per branch; staged creates of other
//!   branches are still committed. There is no partial rollback.
//! - "Nothing found" and "nothing to delete" are outcomes, not errors.

use crate::logging::sanitize_message;
use crate::mapping::mappable::{DecodeError, FromRecord, Mappable};
use crate::model::predicate::Predicate;
use crate::model::record::{Record, RecordId};
use crate::store::{CommitError, FetchError, StoreAccess, UnknownEntityError};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const PREDICATE_LOG_MAX_CHARS: usize = 160;

pub type MappingResult<T> = Result<T, MappingError>;

/// Mapping-level error for top-level engine calls.
#[derive(Debug)]
pub enum MappingError {
    Fetch(FetchError),
    Commit(CommitError),
    /// Raised only when `EngineOptions::require_uniqueness_predicate` is set.
    MissingUniquenessPredicate {
        entity: String,
    },
    EntityMismatch {
        expected: String,
        actual: String,
    },
    Decode(DecodeError),
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{err}"),
            Self::Commit(err) => write!(f, "{err}"),
            Self::MissingUniquenessPredicate { entity } => {
                write!(f, "model for entity {entity} declares no uniqueness predicate")
            }
            Self::EntityMismatch { expected, actual } => {
                write!(f, "typed retrieval expects entity {expected}, model maps {actual}")
            }
            Self::Decode(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MappingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Commit(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::MissingUniquenessPredicate { .. } | Self::EntityMismatch { .. } => None,
        }
    }
}

impl From<FetchError> for MappingError {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}

impl From<CommitError> for MappingError {
    fn from(value: CommitError) -> Self {
        Self::Commit(value)
    }
}

impl From<DecodeError> for MappingError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Engine behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Rejects predicate-less models instead of inserting them unconditionally.
    pub require_uniqueness_predicate: bool,
    /// Deepest relationship level visited by a cascade (root is depth 0).
    pub max_cascade_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            require_uniqueness_predicate: false,
            max_cascade_depth: 32,
        }
    }
}

/// Why a model produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The model maps to no entity type.
    NoEntityType,
    /// The store has no such entity type registered.
    UnknownEntity(String),
    /// The dedup lookup failed; the branch was not inserted.
    FetchFailed(String),
    MissingUniquenessPredicate,
    DepthExceeded(usize),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoEntityType => write!(f, "no_entity_type"),
            Self::UnknownEntity(_) => write!(f, "unknown_entity"),
            Self::FetchFailed(_) => write!(f, "fetch_failed"),
            Self::MissingUniquenessPredicate => write!(f, "missing_uniqueness_predicate"),
            Self::DepthExceeded(_) => write!(f, "depth_exceeded"),
        }
    }
}

/// One record staged by a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRecord {
    pub id: RecordId,
    pub entity: String,
    /// Relationship depth; the top-level model is depth 0.
    pub depth: usize,
}

/// One related model that was not inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedInsert {
    pub entity: Option<String>,
    pub depth: usize,
    pub reason: SkipReason,
}

/// Summary of one committed cascading insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertReport {
    /// Created records in creation (depth-first) order; the first is the root.
    pub created: Vec<CreatedRecord>,
    /// Related models that already existed and were left untouched.
    pub deduplicated: usize,
    pub skipped: Vec<SkippedInsert>,
}

impl InsertReport {
    pub fn root(&self) -> Option<&CreatedRecord> {
        self.created.first()
    }

    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}

/// Result of a top-level insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Records matching the uniqueness predicate already exist; nothing changed.
    AlreadyPresent { matched: usize },
    /// Nothing was staged or committed.
    Skipped(SkipReason),
    /// The model (and its cascade) was created and committed.
    Inserted(InsertReport),
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }

    pub fn report(&self) -> Option<&InsertReport> {
        match self {
            Self::Inserted(report) => Some(report),
            _ => None,
        }
    }

    pub fn created_count(&self) -> usize {
        self.report().map_or(0, InsertReport::created_count)
    }
}

/// Result of a top-level delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    NothingToDelete,
    Deleted { count: usize },
}

impl DeleteOutcome {
    pub fn deleted_count(&self) -> usize {
        match self {
            Self::NothingToDelete => 0,
            Self::Deleted { count } => *count,
        }
    }
}

enum Staged {
    Present(usize),
    Skipped(SkipReason),
    Created,
}

/// Generic persistence mapper over one store changeset.
///
/// Write paths take `&mut self`; one engine serves one thread of work.
pub struct MappingEngine<S: StoreAccess> {
    store: S,
    options: EngineOptions,
}

impl<S: StoreAccess> MappingEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, EngineOptions::default())
    }

    pub fn with_options(store: S, options: EngineOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Returns the records matching a model.
    ///
    /// A model without entity type yields no records. A model without
    /// predicate yields every record of its entity type.
    ///
    /// # Errors
    /// - Store fetch failures are logged and returned unchanged, so callers
    ///   can tell "nothing found" from "query failed".
    pub fn retrieve<M: Mappable + ?Sized>(&self, model: &M) -> Result<Vec<Record>, FetchError> {
        let Some(entity) = model.entity_type() else {
            debug!("event=mapping_retrieve module=mapping status=noop reason=no_entity_type");
            return Ok(Vec::new());
        };

        let predicate = model.uniqueness_predicate();
        match self.store.fetch(entity, predicate.as_ref()) {
            Ok(records) => {
                debug!(
                    "event=mapping_retrieve module=mapping status=ok entity={} matched={}",
                    entity,
                    records.len()
                );
                Ok(records)
            }
            Err(err) => {
                error!(
                    "event=mapping_retrieve module=mapping status=error entity={} predicate={} error={}",
                    entity,
                    describe_predicate(predicate.as_ref()),
                    err
                );
                Err(err)
            }
        }
    }

    /// Like [`Self::retrieve`], but a failed fetch reads as "nothing found".
    pub fn retrieve_or_empty<M: Mappable + ?Sized>(&self, model: &M) -> Vec<Record> {
        self.retrieve(model).unwrap_or_else(|_| Vec::new())
    }

    /// Retrieves matching records decoded as `T`.
    ///
    /// # Errors
    /// - `EntityMismatch` when the model maps another entity than `T::ENTITY`.
    /// - `Fetch` / `Decode` for store or decoding failures.
    pub fn retrieve_as<T, M>(&self, model: &M) -> MappingResult<Vec<T>>
    where
        T: FromRecord,
        M: Mappable + ?Sized,
    {
        let Some(entity) = model.entity_type() else {
            return Ok(Vec::new());
        };
        if entity != T::ENTITY {
            return Err(MappingError::EntityMismatch {
                expected: T::ENTITY.to_string(),
                actual: entity.to_string(),
            });
        }

        let records = self.retrieve(model)?;
        let decoded = records
            .iter()
            .map(T::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(decoded)
    }

    /// Creates a blank record of `entity` in the pending changeset.
    ///
    /// Nothing is committed; pair with [`Self::commit`].
    pub fn create(&mut self, entity: &str) -> Result<&mut Record, UnknownEntityError> {
        match self.store.create_blank(entity) {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!(
                    "event=mapping_create module=mapping status=error entity={} error_code=unknown_entity",
                    entity
                );
                Err(err)
            }
        }
    }

    /// Commits pending changes, if any. Returns whether a commit happened.
    pub fn commit(&mut self) -> MappingResult<bool> {
        if !self.store.has_changes() {
            debug!("event=mapping_commit module=mapping status=noop reason=no_changes");
            return Ok(false);
        }
        self.commit_changeset()?;
        Ok(true)
    }

    /// Inserts a model and its related models unless it already exists.
    ///
    /// Flow: dedup lookup → blank record → `populate` → depth-first cascade
    /// over `related_models` → one commit.
    ///
    /// # Errors
    /// - `Fetch` when the top-level dedup lookup fails; nothing is staged.
    /// - `Commit` when the changeset cannot be applied.
    /// - `MissingUniquenessPredicate` only in strict predicate mode.
    pub fn insert<M: Mappable + ?Sized>(&mut self, model: &M) -> MappingResult<InsertOutcome> {
        let started_at = Instant::now();
        let entity = model.entity_type().unwrap_or("-").to_string();
        let mut report = InsertReport::default();

        match self.stage(model, 0, &mut report) {
            Ok(Staged::Present(matched)) => {
                info!(
                    "event=mapping_insert module=mapping status=noop reason=duplicate entity={} matched={}",
                    entity, matched
                );
                Ok(InsertOutcome::AlreadyPresent { matched })
            }
            Ok(Staged::Skipped(SkipReason::MissingUniquenessPredicate)) => {
                warn!(
                    "event=mapping_insert module=mapping status=error entity={} error_code=missing_uniqueness_predicate",
                    entity
                );
                Err(MappingError::MissingUniquenessPredicate { entity })
            }
            Ok(Staged::Skipped(reason)) => {
                warn!(
                    "event=mapping_insert module=mapping status=noop reason={} entity={}",
                    reason, entity
                );
                Ok(InsertOutcome::Skipped(reason))
            }
            Ok(Staged::Created) => {
                self.commit_changeset()?;
                info!(
                    "event=mapping_insert module=mapping status=ok entity={} created={} deduplicated={} skipped={} duration_ms={}",
                    entity,
                    report.created.len(),
                    report.deduplicated,
                    report.skipped.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(InsertOutcome::Inserted(report))
            }
            Err(err) => {
                error!(
                    "event=mapping_insert module=mapping status=error entity={} error_code=fetch_failed error={}",
                    entity, err
                );
                Err(MappingError::Fetch(err))
            }
        }
    }

    /// Deletes every record matching a model, then commits once.
    ///
    /// # Errors
    /// - `Fetch` when the lookup fails; nothing is deleted.
    /// - `Commit` when the changeset cannot be applied.
    pub fn delete<M: Mappable + ?Sized>(&mut self, model: &M) -> MappingResult<DeleteOutcome> {
        let entity = model.entity_type().unwrap_or("-").to_string();
        let records = match self.retrieve(model) {
            Ok(records) => records,
            Err(FetchError::UnknownEntity(_)) => {
                warn!(
                    "event=mapping_delete module=mapping status=noop reason=unknown_entity entity={}",
                    entity
                );
                return Ok(DeleteOutcome::NothingToDelete);
            }
            Err(err) => return Err(MappingError::Fetch(err)),
        };

        if records.is_empty() {
            info!(
                "event=mapping_delete module=mapping status=noop reason=no_matching_records entity={}",
                entity
            );
            return Ok(DeleteOutcome::NothingToDelete);
        }

        for record in &records {
            self.store.delete(record);
        }
        self.commit_changeset()?;

        info!(
            "event=mapping_delete module=mapping status=ok entity={} deleted={}",
            entity,
            records.len()
        );
        Ok(DeleteOutcome::Deleted {
            count: records.len(),
        })
    }

    fn stage<M: Mappable + ?Sized>(
        &mut self,
        model: &M,
        depth: usize,
        report: &mut InsertReport,
    ) -> Result<Staged, FetchError> {
        let Some(entity) = model.entity_type() else {
            return Ok(Staged::Skipped(SkipReason::NoEntityType));
        };
        if depth > self.options.max_cascade_depth {
            return Ok(Staged::Skipped(SkipReason::DepthExceeded(depth)));
        }

        match model.uniqueness_predicate() {
            Some(predicate) => match self.store.fetch(entity, Some(&predicate)) {
                Ok(existing) if !existing.is_empty() => {
                    return Ok(Staged::Present(existing.len()));
                }
                Ok(_) => {}
                Err(FetchError::UnknownEntity(name)) => {
                    return Ok(Staged::Skipped(SkipReason::UnknownEntity(name)));
                }
                Err(err) => return Err(err),
            },
            None if self.options.require_uniqueness_predicate => {
                return Ok(Staged::Skipped(SkipReason::MissingUniquenessPredicate));
            }
            None => {
                debug!(
                    "event=mapping_stage module=mapping status=start entity={} depth={} dedup=disabled",
                    entity, depth
                );
            }
        }

        let record = match self.store.create_blank(entity) {
            Ok(record) => record,
            Err(err) => return Ok(Staged::Skipped(SkipReason::UnknownEntity(err.0))),
        };
        model.populate(record);
        report.created.push(CreatedRecord {
            id: record.id(),
            entity: entity.to_string(),
            depth,
        });

        for group in model.related_models() {
            for child in group {
                self.cascade(child.as_ref(), depth + 1, report);
            }
        }

        Ok(Staged::Created)
    }

    fn cascade(&mut self, child: &dyn Mappable, depth: usize, report: &mut InsertReport) {
        let entity = child.entity_type().map(str::to_string);
        let reason = match self.stage(child, depth, report) {
            Ok(Staged::Created) => return,
            Ok(Staged::Present(matched)) => {
                debug!(
                    "event=mapping_cascade module=mapping status=noop reason=duplicate entity={} depth={} matched={}",
                    entity.as_deref().unwrap_or("-"),
                    depth,
                    matched
                );
                report.deduplicated += 1;
                return;
            }
            Ok(Staged::Skipped(reason)) => reason,
            Err(err) => SkipReason::FetchFailed(err.to_string()),
        };

        warn!(
            "event=mapping_cascade module=mapping status=noop reason={} entity={} depth={}",
            reason,
            entity.as_deref().unwrap_or("-"),
            depth
        );
        report.skipped.push(SkippedInsert {
            entity,
            depth,
            reason,
        });
    }

    fn commit_changeset(&mut self) -> Result<(), CommitError> {
        self.store.commit().map_err(|err| {
            error!(
                "event=mapping_commit module=mapping status=error error_code=commit_failed error={}",
                err
            );
            err
        })
    }
}

fn describe_predicate(predicate: Option<&Predicate>) -> String {
    predicate.map_or_else(
        || "none".to_string(),
        |predicate| sanitize_message(&predicate.to_string(), PREDICATE_LOG_MAX_CHARS),
    )
}

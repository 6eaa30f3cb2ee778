//! In-memory store backend.
//!
//! # Responsibility
//! - Back the mapping engine without any I/O, mainly for tests.
//! - Count fetch/commit calls and inject fetch or commit failures.
//!
//! # Invariants
//! - Committed records keep insertion order.
//! - A failed commit leaves the pending changeset untouched.

use crate::model::entity::validate_entity_name;
use crate::model::predicate::Predicate;
use crate::model::record::{Record, RecordId};
use crate::store::{
    filter_records, CommitError, FetchError, SchemaError, StoreAccess, UnknownEntityError,
};
use log::debug;
use std::cell::Cell;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Map-backed store with one pending changeset.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entities: BTreeSet<String>,
    committed: Vec<Record>,
    pending_creates: Vec<Record>,
    pending_deletes: BTreeSet<RecordId>,
    failing_fetches: BTreeSet<String>,
    fail_next_commit: bool,
    commit_count: usize,
    fetch_count: Cell<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given entity types registered.
    ///
    /// # Errors
    /// - Returns `InvalidEntityName` for the first name that fails validation.
    pub fn with_entities<I, N>(entities: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut store = Self::new();
        for entity in entities {
            store.register_entity(entity.as_ref())?;
        }
        Ok(store)
    }

    /// Registers one entity type. Registering twice is a no-op.
    pub fn register_entity(&mut self, name: &str) -> Result<(), SchemaError> {
        let name = validate_entity_name(name)?;
        self.entities.insert(name.to_string());
        Ok(())
    }

    /// Returns registered entity names sorted by name.
    pub fn entities(&self) -> Vec<String> {
        self.entities.iter().cloned().collect()
    }

    /// Returns committed records of one entity in insertion order.
    pub fn committed_records(&self, entity: &str) -> Vec<&Record> {
        self.committed
            .iter()
            .filter(|record| record.entity() == entity)
            .collect()
    }

    /// Returns the number of committed records of one entity.
    pub fn record_count(&self, entity: &str) -> usize {
        self.committed_records(entity).len()
    }

    /// Returns the number of pending creates plus pending deletes.
    pub fn pending_len(&self) -> usize {
        self.pending_creates.len() + self.pending_deletes.len()
    }

    /// Returns how many times `commit` was called, failed attempts included.
    pub fn commit_count(&self) -> usize {
        self.commit_count
    }

    /// Returns how many times `fetch` was called.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.get()
    }

    /// Makes every later fetch of `entity` fail with `FetchError::Unavailable`.
    pub fn fail_fetches(&mut self, entity: &str) {
        self.failing_fetches.insert(entity.to_string());
    }

    /// Clears fetch failures injected by [`Self::fail_fetches`].
    pub fn restore_fetches(&mut self) {
        self.failing_fetches.clear();
    }

    /// Makes the next `commit` call fail once with `CommitError::Unavailable`.
    pub fn fail_next_commit(&mut self) {
        self.fail_next_commit = true;
    }
}

impl StoreAccess for InMemoryStore {
    fn fetch(&self, entity: &str, predicate: Option<&Predicate>) -> Result<Vec<Record>, FetchError> {
        self.fetch_count.set(self.fetch_count.get() + 1);

        if self.failing_fetches.contains(entity) {
            return Err(FetchError::Unavailable(format!(
                "injected fetch failure for {entity}"
            )));
        }
        if !self.entities.contains(entity) {
            return Err(FetchError::UnknownEntity(entity.to_string()));
        }

        let candidates = self
            .committed
            .iter()
            .filter(|record| !self.pending_deletes.contains(&record.id()))
            .chain(self.pending_creates.iter())
            .filter(|record| record.entity() == entity)
            .cloned();

        Ok(filter_records(candidates, predicate)?)
    }

    fn create_blank(&mut self, entity: &str) -> Result<&mut Record, UnknownEntityError> {
        if !self.entities.contains(entity) {
            return Err(UnknownEntityError(entity.to_string()));
        }

        let index = self.pending_creates.len();
        self.pending_creates.push(Record::new(Uuid::new_v4(), entity));
        Ok(&mut self.pending_creates[index])
    }

    fn delete(&mut self, record: &Record) {
        let id = record.id();
        let before = self.pending_creates.len();
        self.pending_creates.retain(|pending| pending.id() != id);
        if self.pending_creates.len() == before {
            self.pending_deletes.insert(id);
        }
    }

    fn has_changes(&self) -> bool {
        !self.pending_creates.is_empty() || !self.pending_deletes.is_empty()
    }

    fn commit(&mut self) -> Result<(), CommitError> {
        self.commit_count += 1;

        if self.fail_next_commit {
            self.fail_next_commit = false;
            return Err(CommitError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }

        let created = self.pending_creates.len();
        let deleted = self.pending_deletes.len();
        let pending_deletes = std::mem::take(&mut self.pending_deletes);
        self.committed
            .retain(|record| !pending_deletes.contains(&record.id()));
        self.committed.append(&mut self.pending_creates);

        debug!(
            "event=store_commit module=store backend=memory status=ok created={} deleted={}",
            created, deleted
        );
        Ok(())
    }
}

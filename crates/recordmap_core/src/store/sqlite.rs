//! SQLite store backend.
//!
//! # Responsibility
//! - Persist records of registered entities in one `records` table.
//! - Buffer creates/deletes in memory and apply them in one transaction.
//!
//! # Invariants
//! - Entity registration is immediate and idempotent; it is not part of the
//!   pending changeset.
//! - Fetch results are ordered by insertion (committed rows first, then
//!   pending creates).
//! - A failed commit rolls back the SQLite transaction and keeps the
//!   changeset pending.
//! - Non-finite reals are rejected at commit; they have no JSON encoding.

use crate::db::{bootstrap_connection, open_db, open_db_in_memory, DbResult};
use crate::model::entity::validate_entity_name;
use crate::model::predicate::Predicate;
use crate::model::record::{FieldMap, Record, RecordId};
use crate::model::value::FieldValue;
use crate::store::{
    filter_records, CommitError, FetchError, SchemaError, StoreAccess, UnknownEntityError,
};
use log::{debug, error};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;
use std::path::Path;
use uuid::Uuid;

/// SQLite-backed record store with one pending changeset.
pub struct SqliteStore {
    conn: Connection,
    entities: BTreeSet<String>,
    pending_creates: Vec<Record>,
    pending_deletes: BTreeSet<RecordId>,
}

impl SqliteStore {
    /// Opens (or creates) a store file and loads registered entities.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::load(open_db(path)?)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::load(open_db_in_memory()?)
    }

    /// Wraps a caller-opened connection after bootstrapping it.
    pub fn from_connection(mut conn: Connection) -> DbResult<Self> {
        bootstrap_connection(&mut conn)?;
        Self::load(conn)
    }

    fn load(conn: Connection) -> DbResult<Self> {
        let entities = {
            let mut stmt = conn.prepare("SELECT name FROM entities ORDER BY name ASC;")?;
            let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
            names.collect::<rusqlite::Result<BTreeSet<String>>>()?
        };

        Ok(Self {
            conn,
            entities,
            pending_creates: Vec::new(),
            pending_deletes: BTreeSet::new(),
        })
    }

    /// Registers one entity type. Registering twice is a no-op.
    pub fn register_entity(&mut self, name: &str) -> Result<(), SchemaError> {
        let name = validate_entity_name(name)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO entities (name) VALUES (?1);",
            [name],
        )?;
        self.entities.insert(name.to_string());
        Ok(())
    }

    /// Returns registered entity names sorted by name.
    pub fn entities(&self) -> Vec<String> {
        self.entities.iter().cloned().collect()
    }

    /// Returns the number of committed rows for one entity.
    pub fn record_count(&self, entity: &str) -> Result<usize, FetchError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE entity = ?1;",
            [entity],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| FetchError::InvalidData(format!("negative row count {count}")))
    }

    /// Returns the underlying connection for inspection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn committed_records(&self, entity: &str) -> Result<Vec<Record>, FetchError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, entity, fields
             FROM records
             WHERE entity = ?1
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([entity])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let record = parse_record_row(row)?;
            if !self.pending_deletes.contains(&record.id()) {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn apply_changeset(&mut self) -> Result<(), CommitError> {
        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO records (id, entity, fields) VALUES (?1, ?2, ?3);",
            )?;
            for record in &self.pending_creates {
                reject_non_finite(record)?;
                let fields = serde_json::to_string(record.fields()).map_err(|err| {
                    CommitError::InvalidData(format!(
                        "cannot encode fields of record {}: {err}",
                        record.id()
                    ))
                })?;
                insert.execute(params![record.id().to_string(), record.entity(), fields])?;
            }

            let mut delete = tx.prepare_cached("DELETE FROM records WHERE id = ?1;")?;
            for id in &self.pending_deletes {
                delete.execute([id.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl StoreAccess for SqliteStore {
    fn fetch(&self, entity: &str, predicate: Option<&Predicate>) -> Result<Vec<Record>, FetchError> {
        if !self.entities.contains(entity) {
            return Err(FetchError::UnknownEntity(entity.to_string()));
        }

        let committed = self.committed_records(entity)?;
        let pending = self
            .pending_creates
            .iter()
            .filter(|record| record.entity() == entity)
            .cloned();

        Ok(filter_records(committed.into_iter().chain(pending), predicate)?)
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
        let created = self.pending_creates.len();
        let deleted = self.pending_deletes.len();

        if let Err(err) = self.apply_changeset() {
            error!(
                "event=store_commit module=store backend=sqlite status=error created={} deleted={} error={}",
                created, deleted, err
            );
            return Err(err);
        }

        self.pending_creates.clear();
        self.pending_deletes.clear();
        debug!(
            "event=store_commit module=store backend=sqlite status=ok created={} deleted={}",
            created, deleted
        );
        Ok(())
    }
}

/// JSON has no NaN or infinity; encoding them would read back as `Null`.
fn reject_non_finite(record: &Record) -> Result<(), CommitError> {
    let non_finite = record
        .fields()
        .iter()
        .find(|(_, value)| matches!(value, FieldValue::Real(real) if !real.is_finite()));
    match non_finite {
        Some((field, value)) => Err(CommitError::InvalidData(format!(
            "record {} field `{field}` holds non-finite real {value}",
            record.id()
        ))),
        None => Ok(()),
    }
}

fn parse_record_row(row: &Row<'_>) -> Result<Record, FetchError> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        FetchError::InvalidData(format!("invalid uuid value `{id_text}` in records.id"))
    })?;

    let entity: String = row.get("entity")?;
    let fields_text: String = row.get("fields")?;
    let fields: FieldMap = serde_json::from_str(&fields_text).map_err(|err| {
        FetchError::InvalidData(format!("invalid fields json for record {id}: {err}"))
    })?;

    Ok(Record::with_fields(id, entity, fields))
}

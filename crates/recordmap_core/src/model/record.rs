//! Store-owned record handle.
//!
//! # Responsibility
//! - Carry one persisted (or pending) entity instance between a store and
//!   the models that populate or decode it.
//!
//! # Invariants
//! - `id` is allocated by the store and never changes.
//! - `entity` is the registered entity name the record was created for.
//! - Field names are unique; setting an existing field replaces its value.

use crate::model::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier allocated by the store for every record.
pub type RecordId = Uuid;

/// Field map persisted for one record, ordered by field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

static NULL_VALUE: FieldValue = FieldValue::Null;

/// One entity instance owned by a store.
///
/// Mapping code receives records from a store; only store implementations
/// construct them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    entity: String,
    fields: FieldMap,
}

impl Record {
    /// Creates an empty record. Intended for store implementations.
    pub fn new(id: RecordId, entity: impl Into<String>) -> Self {
        Self::with_fields(id, entity, FieldMap::new())
    }

    /// Rebuilds a record from persisted state. Intended for store implementations.
    pub fn with_fields(id: RecordId, entity: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id,
            entity: entity.into(),
            fields,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Sets one field, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Returns a field value, or `None` when the field was never set.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Returns a field value, treating missing fields as `Null`.
    pub fn value(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&NULL_VALUE)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Returns whether no field has been written yet.
    pub fn is_blank(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Record;
    use crate::model::value::FieldValue;
    use uuid::Uuid;

    #[test]
    fn new_record_is_blank_and_missing_fields_read_as_null() {
        let record = Record::new(Uuid::new_v4(), "Person");
        assert!(record.is_blank());
        assert_eq!(record.get("name"), None);
        assert_eq!(record.value("name"), &FieldValue::Null);
    }

    #[test]
    fn set_replaces_existing_value() {
        let mut record = Record::new(Uuid::new_v4(), "Person");
        record.set("name", "ada").set("age", 36);
        record.set("name", "grace");

        assert_eq!(record.fields().len(), 2);
        assert_eq!(record.value("name").as_str(), Some("grace"));
        assert_eq!(record.value("age").as_i64(), Some(36));
    }
}

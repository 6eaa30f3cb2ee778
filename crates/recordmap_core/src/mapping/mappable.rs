//! Model-side contracts for mapping and typed decoding.

use crate::model::predicate::Predicate;
use crate::model::record::Record;
use crate::model::value::FieldValue;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Ordered groups of related models cascaded after their parent.
pub type RelatedModels<'a> = Vec<Vec<Box<dyn Mappable + 'a>>>;

/// A domain model that can describe and populate its own store record.
///
/// # Contract
/// - `entity_type` names a registered store entity, or `None` when the model
///   has no direct record (insert/delete are then no-ops).
/// - `uniqueness_predicate` identifies "the same logical record". `None`
///   disables dedup: every insert of such a model creates a new record.
/// - `populate` writes field values onto a freshly created blank record. It
///   is also the only place parent/child linkage happens: the engine never
///   links records, so a child that references its parent must carry the
///   parent's key (or any other join value) and write it here.
/// - `related_models` lists children inserted depth-first after this model's
///   record, group order then item order. Grouping has no other meaning.
pub trait Mappable {
    fn entity_type(&self) -> Option<&str>;

    fn uniqueness_predicate(&self) -> Option<Predicate>;

    fn populate(&self, record: &mut Record);

    fn related_models(&self) -> RelatedModels<'_> {
        Vec::new()
    }
}

impl<M: Mappable + ?Sized> Mappable for &M {
    fn entity_type(&self) -> Option<&str> {
        (**self).entity_type()
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        (**self).uniqueness_predicate()
    }

    fn populate(&self, record: &mut Record) {
        (**self).populate(record);
    }

    fn related_models(&self) -> RelatedModels<'_> {
        (**self).related_models()
    }
}

impl<M: Mappable + ?Sized> Mappable for Box<M> {
    fn entity_type(&self) -> Option<&str> {
        (**self).entity_type()
    }

    fn uniqueness_predicate(&self) -> Option<Predicate> {
        (**self).uniqueness_predicate()
    }

    fn populate(&self, record: &mut Record) {
        (**self).populate(record);
    }

    fn related_models(&self) -> RelatedModels<'_> {
        (**self).related_models()
    }
}

/// A typed view decoded from records of one store entity.
pub trait FromRecord: Sized {
    /// Store entity name this type decodes.
    const ENTITY: &'static str;

    fn from_record(record: &Record) -> Result<Self, DecodeError>;
}

/// Record decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    MissingField {
        entity: String,
        field: String,
    },
    WrongType {
        entity: String,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { entity, field } => {
                write!(f, "{entity}.{field} is missing")
            }
            Self::WrongType {
                entity,
                field,
                expected,
                actual,
            } => write!(f, "{entity}.{field} expected {expected}, found {actual}"),
        }
    }
}

impl Error for DecodeError {}

/// Reads a required text field.
pub fn text_field(record: &Record, field: &str) -> Result<String, DecodeError> {
    match required(record, field)? {
        FieldValue::Text(value) => Ok(value.clone()),
        other => Err(wrong_type(record, field, "text", other)),
    }
}

/// Reads a text field that may be missing or null.
pub fn optional_text_field(record: &Record, field: &str) -> Result<Option<String>, DecodeError> {
    match record.value(field) {
        FieldValue::Null => Ok(None),
        FieldValue::Text(value) => Ok(Some(value.clone())),
        other => Err(wrong_type(record, field, "text", other)),
    }
}

/// Reads a required integer field.
pub fn integer_field(record: &Record, field: &str) -> Result<i64, DecodeError> {
    match required(record, field)? {
        FieldValue::Integer(value) => Ok(*value),
        other => Err(wrong_type(record, field, "integer", other)),
    }
}

/// Reads a required boolean field.
pub fn bool_field(record: &Record, field: &str) -> Result<bool, DecodeError> {
    match required(record, field)? {
        FieldValue::Bool(value) => Ok(*value),
        other => Err(wrong_type(record, field, "bool", other)),
    }
}

fn required<'r>(record: &'r Record, field: &str) -> Result<&'r FieldValue, DecodeError> {
    match record.get(field) {
        Some(FieldValue::Null) | None => Err(DecodeError::MissingField {
            entity: record.entity().to_string(),
            field: field.to_string(),
        }),
        Some(value) => Ok(value),
    }
}

fn wrong_type(
    record: &Record,
    field: &str,
    expected: &'static str,
    actual: &FieldValue,
) -> DecodeError {
    DecodeError::WrongType {
        entity: record.entity().to_string(),
        field: field.to_string(),
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::{integer_field, optional_text_field, text_field, DecodeError};
    use crate::model::record::Record;
    use uuid::Uuid;

    #[test]
    fn field_readers_report_missing_and_mistyped_fields() {
        let mut record = Record::new(Uuid::new_v4(), "Person");
        record.set("name", "ada").set("age", "old");

        assert_eq!(text_field(&record, "name").unwrap(), "ada");
        assert_eq!(optional_text_field(&record, "nickname").unwrap(), None);
        assert_eq!(
            text_field(&record, "email"),
            Err(DecodeError::MissingField {
                entity: "Person".to_string(),
                field: "email".to_string(),
            })
        );
        assert!(matches!(
            integer_field(&record, "age"),
            Err(DecodeError::WrongType {
                expected: "integer",
                actual: "text",
                ..
            })
        ));
    }
}

//! Generic persistence mapping for self-describing domain models.
//!
//! Models implement [`Mappable`]; [`MappingEngine`] turns them into
//! deduplicated, cascading inserts and conditional deletes against any
//! [`StoreAccess`] backend, committing once per top-level call.

pub mod db;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use mapping::engine::{
    CreatedRecord, DeleteOutcome, EngineOptions, InsertOutcome, InsertReport, MappingEngine,
    MappingError, MappingResult, SkipReason, SkippedInsert,
};
pub use mapping::mappable::{
    bool_field, integer_field, optional_text_field, text_field, DecodeError, FromRecord,
    Mappable, RelatedModels,
};
pub use model::entity::{validate_entity_name, EntityNameError};
pub use model::predicate::{CompiledPredicate, Predicate, PredicateError};
pub use model::record::{FieldMap, Record, RecordId};
pub use model::value::FieldValue;
pub use store::memory::InMemoryStore;
pub use store::sqlite::SqliteStore;
pub use store::{CommitError, FetchError, SchemaError, StoreAccess, UnknownEntityError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

//! Store-neutral data model shared by stores and the mapping engine.
//!
//! # Responsibility
//! - Define records, field values and filter predicates.
//! - Keep entity naming rules in one place for every backend.
//!
//! # Invariants
//! - Records are identified by store-allocated `RecordId` values.
//! - Predicates evaluate the same way regardless of backend.

pub mod entity;
pub mod predicate;
pub mod record;
pub mod value;

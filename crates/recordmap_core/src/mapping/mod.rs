//! Mapping layer between domain models and a record store.
//!
//! # Responsibility
//! - Define the `Mappable` contract domain models implement.
//! - Run dedup, cascading insert and conditional delete over `StoreAccess`.
//!
//! # Invariants
//! - The engine never links parent and child records; models do it in
//!   `Mappable::populate`.
//! - One commit per top-level insert/delete.

pub mod engine;
pub mod mappable;

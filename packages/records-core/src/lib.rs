//! Core entity store for playbook records.
//!
//! Provides the record and playbook entities, the serializer/validator that
//! turns wire payloads into validated entities, the transactional store and
//! its snapshot persistence.

pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod persistence;
pub mod query;
pub mod serializer;

pub use database::Database;
pub use entity::{NewPlaybook, NewRecord, Playbook, Record, RecordChanges, RecordType};
pub use error::{DbError, ValidationErrors};

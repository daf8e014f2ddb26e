//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts over entity tables.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Entity::validate()` before persistence.
//! - Constraint failures surface as [`RepoError::Constraint`], not raw SQLite
//!   errors, so callers can map them to client errors.

pub mod entity_repo;

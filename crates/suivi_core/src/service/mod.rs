//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and search index calls into use-case level APIs.
//! - Keep HTTP layers decoupled from storage details.

pub mod entity_service;
pub mod merge_patch;

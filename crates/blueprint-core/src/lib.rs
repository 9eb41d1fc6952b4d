//! Blueprint Core Library
//!
//! This crate provides the core functionality for Blueprint, including:
//! - Blueprint metadata and version lifecycle (draft, published, archived, deprecated)
//! - Inheritance resolution of entity-type fields
//! - Compilation of a version into a fingerprinted, read-only artifact
//! - Storage (SQLite)

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::blueprint::{
        BlueprintService, CompiledBlueprint, DefinitionStore, VersionStatus,
    };
    pub use crate::error::{Error, Result};
    pub use crate::infrastructure::blueprint::SqliteDefinitionStore;
    pub use crate::storage::{Database, DatabaseConfig};
}

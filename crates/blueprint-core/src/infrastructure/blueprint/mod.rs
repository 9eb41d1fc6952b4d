//! Blueprint infrastructure implementations
//!
//! Concrete SQLite implementation of the definition store trait.

mod repository;

pub use repository::SqliteDefinitionStore;

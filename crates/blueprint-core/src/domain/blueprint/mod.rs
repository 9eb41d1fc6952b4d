//! Blueprint domain module
//!
//! A blueprint is a named, versioned schema for a knowledge base: entity
//! types with fields and single inheritance, relationship types with
//! attributes, plus view templates, MOCs and an extraction profile that are
//! carried through untouched.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      BlueprintService                         │
//! │   VersionManager ── numbering, lifecycle, compile target      │
//! │   BlueprintCompiler ── InheritanceResolver ── fingerprint     │
//! │   published artifact cache                                    │
//! └──────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 DefinitionStore (SQLite)                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blueprint_core::domain::blueprint::BlueprintService;
//! use blueprint_core::infrastructure::blueprint::SqliteDefinitionStore;
//!
//! let service = BlueprintService::new(Arc::new(SqliteDefinitionStore::new(pool)));
//! let meta = service.create_blueprint("Fantasy", None, vec![], false).await?;
//! let draft = service.create_draft(&meta.id).await?;
//! service.publish(&draft.id).await?;
//!
//! let compiled = service.compile(&meta.id, None).await?;
//! println!("{} entity types, fingerprint {}", compiled.entity_types.len(), compiled.fingerprint);
//! ```

mod bundle;
mod compiled;
mod compiler;
mod definitions;
mod event;
mod meta;
mod repository;
mod resolver;
mod service;
mod version;

pub use bundle::{
    BundleAttribute, BundleEntityType, BundleExtractionProfile, BundleField, BundleIgnoreEntry,
    BundleLabelMapping, BundleMoc, BundleRelationshipType, BundleViewTemplate, DefinitionBundle,
    ImportSummary,
};
pub use compiled::{
    CompiledBlueprint, CompiledEntityType, CompiledExtractionProfile, CompiledRelationshipType,
    IntegrityWarning,
};
pub use compiler::{with_store_timeout, BlueprintCompiler};
pub use definitions::{
    Cardinality, EntityKind, EntityTypeDef, ExtractionProfile, FieldDataType, FieldDef,
    IgnoreEntry, LabelMapping, MocDef, RelationshipAttributeDef, RelationshipDirection,
    RelationshipTypeDef, ViewTemplateDef,
};
pub use event::BlueprintEvent;
pub use meta::{BlueprintMeta, BlueprintVersion, VersionStatus};
pub use repository::{DefinitionSet, DefinitionStore};
pub use resolver::{InheritanceResolver, ResolvedFields, MAX_INHERITANCE_DEPTH};
pub use service::BlueprintService;
pub use version::{VersionManager, EVENT_LOG_CAPACITY};

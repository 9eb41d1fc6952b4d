//! Definition store trait
//!
//! Pure CRUD over blueprint metadata, versions and the per-version
//! definitions. No business rules live behind this trait; the version
//! manager and compiler own those.

use async_trait::async_trait;

use crate::error::Result;

use super::definitions::{
    EntityTypeDef, ExtractionProfile, FieldDef, IgnoreEntry, LabelMapping, MocDef,
    RelationshipAttributeDef, RelationshipTypeDef, ViewTemplateDef,
};
use super::meta::{BlueprintMeta, BlueprintVersion, VersionStatus};

/// Definitions of one version, written as a single unit
///
/// Parents come before children in every list so a store can insert in
/// order without deferring foreign keys.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSet {
    pub entity_types: Vec<EntityTypeDef>,
    pub fields: Vec<FieldDef>,
    pub relationship_types: Vec<RelationshipTypeDef>,
    pub attributes: Vec<RelationshipAttributeDef>,
    pub view_templates: Vec<ViewTemplateDef>,
    pub mocs: Vec<MocDef>,
    pub extraction_profile: Option<ExtractionProfile>,
    pub label_mappings: Vec<LabelMapping>,
    pub ignore_entries: Vec<IgnoreEntry>,
}

/// Storage backend for blueprint definitions
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    // ========== Blueprint Operations ==========

    /// Insert or update blueprint metadata
    async fn save_blueprint_meta(&self, meta: &BlueprintMeta) -> Result<()>;

    /// Get blueprint metadata by ID
    async fn get_blueprint_meta(&self, id: &str) -> Result<Option<BlueprintMeta>>;

    /// List all blueprints
    async fn list_blueprints(&self) -> Result<Vec<BlueprintMeta>>;

    // ========== Version Operations ==========

    /// Insert a new version
    ///
    /// Fails with `Error::VersionConflict` when the blueprint already has a
    /// version with the same number.
    async fn insert_version(&self, version: &BlueprintVersion) -> Result<()>;

    /// Get a version by ID
    async fn get_version(&self, id: &str) -> Result<Option<BlueprintVersion>>;

    /// List versions of a blueprint, ordered by version number ascending
    async fn list_versions(&self, blueprint_id: &str) -> Result<Vec<BlueprintVersion>>;

    /// Highest version number for a blueprint, `None` if it has no versions
    async fn max_version_number(&self, blueprint_id: &str) -> Result<Option<i64>>;

    /// Persist a status change (and `published_at`) if the stored status
    /// still equals `expected`
    ///
    /// Returns `false` when nothing was updated, either because the version
    /// is gone or because another writer moved it first.
    async fn update_version_status(
        &self,
        id: &str,
        expected: VersionStatus,
        status: VersionStatus,
        published_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<bool>;

    /// Insert a version together with its definitions, all or nothing
    ///
    /// Fails with `Error::VersionConflict` like `insert_version`.
    async fn insert_version_with_definitions(
        &self,
        version: &BlueprintVersion,
        definitions: &DefinitionSet,
    ) -> Result<()>;

    /// Write a batch of definitions into existing versions, all or nothing
    async fn save_definitions(&self, definitions: &DefinitionSet) -> Result<()>;

    // ========== Entity Type Operations ==========

    async fn save_entity_type(&self, entity_type: &EntityTypeDef) -> Result<()>;

    async fn list_entity_types(&self, version_id: &str) -> Result<Vec<EntityTypeDef>>;

    async fn save_field(&self, field: &FieldDef) -> Result<()>;

    /// Own fields of an entity type, ordered by `display_order` ascending
    async fn list_fields(&self, entity_type_id: &str) -> Result<Vec<FieldDef>>;

    // ========== Relationship Operations ==========

    async fn save_relationship_type(&self, relationship_type: &RelationshipTypeDef) -> Result<()>;

    async fn list_relationship_types(&self, version_id: &str) -> Result<Vec<RelationshipTypeDef>>;

    async fn save_relationship_attribute(&self, attribute: &RelationshipAttributeDef)
    -> Result<()>;

    async fn list_relationship_attributes(
        &self,
        relationship_type_id: &str,
    ) -> Result<Vec<RelationshipAttributeDef>>;

    // ========== View Operations ==========

    async fn save_view_template(&self, view: &ViewTemplateDef) -> Result<()>;

    async fn list_view_templates(&self, version_id: &str) -> Result<Vec<ViewTemplateDef>>;

    async fn save_moc(&self, moc: &MocDef) -> Result<()>;

    async fn list_mocs(&self, version_id: &str) -> Result<Vec<MocDef>>;

    // ========== Extraction Operations ==========

    async fn save_extraction_profile(&self, profile: &ExtractionProfile) -> Result<()>;

    async fn get_extraction_profile(&self, version_id: &str) -> Result<Option<ExtractionProfile>>;

    async fn save_label_mapping(&self, mapping: &LabelMapping) -> Result<()>;

    /// Label mappings of a profile, ordered by priority ascending
    async fn list_label_mappings(&self, profile_id: &str) -> Result<Vec<LabelMapping>>;

    async fn save_ignore_entry(&self, entry: &IgnoreEntry) -> Result<()>;

    async fn list_ignore_entries(&self, profile_id: &str) -> Result<Vec<IgnoreEntry>>;
}

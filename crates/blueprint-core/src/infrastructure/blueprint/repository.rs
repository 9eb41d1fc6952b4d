//! SQLite implementation of the DefinitionStore

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::domain::blueprint::{
    BlueprintMeta, BlueprintVersion, Cardinality, DefinitionSet, DefinitionStore, EntityKind,
    EntityTypeDef, ExtractionProfile, FieldDataType, FieldDef, IgnoreEntry, LabelMapping, MocDef,
    RelationshipAttributeDef, RelationshipDirection, RelationshipTypeDef, VersionStatus,
    ViewTemplateDef,
};
use crate::error::{Error, Result};

/// SQLite implementation of the definition store
#[derive(Clone)]
pub struct SqliteDefinitionStore {
    pool: SqlitePool,
}

impl SqliteDefinitionStore {
    /// Create a new SQLite definition store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid {} timestamp '{}': {}", column, value, e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(value: Option<&str>) -> Result<Option<T>> {
    value.map(serde_json::from_str).transpose().map_err(Error::from)
}

#[async_trait]
impl DefinitionStore for SqliteDefinitionStore {
    // ========== Blueprint Operations ==========

    async fn save_blueprint_meta(&self, meta: &BlueprintMeta) -> Result<()> {
        let tags_json = serde_json::to_string(&meta.tags)?;

        sqlx::query(
            r#"
            INSERT INTO blueprints (id, name, description, tags, is_system, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                tags = excluded.tags,
                is_system = excluded.is_system,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&meta.id)
        .bind(&meta.name)
        .bind(&meta.description)
        .bind(&tags_json)
        .bind(meta.is_system)
        .bind(meta.created_at.to_rfc3339())
        .bind(meta.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(blueprint_id = %meta.id, name = %meta.name, "Blueprint saved");
        Ok(())
    }

    async fn get_blueprint_meta(&self, id: &str) -> Result<Option<BlueprintMeta>> {
        let row: Option<BlueprintRow> = sqlx::query_as("SELECT * FROM blueprints WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_meta()).transpose()
    }

    async fn list_blueprints(&self) -> Result<Vec<BlueprintMeta>> {
        let rows: Vec<BlueprintRow> = sqlx::query_as("SELECT * FROM blueprints ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.into_meta()).collect()
    }

    // ========== Version Operations ==========

    async fn insert_version(&self, version: &BlueprintVersion) -> Result<()> {
        write_version(&self.pool, version).await
    }

    async fn get_version(&self, id: &str) -> Result<Option<BlueprintVersion>> {
        let row: Option<VersionRow> =
            sqlx::query_as("SELECT * FROM blueprint_versions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.into_version()).transpose()
    }

    async fn list_versions(&self, blueprint_id: &str) -> Result<Vec<BlueprintVersion>> {
        let rows: Vec<VersionRow> = sqlx::query_as(
            "SELECT * FROM blueprint_versions WHERE blueprint_id = ? ORDER BY version_number",
        )
        .bind(blueprint_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_version()).collect()
    }

    async fn max_version_number(&self, blueprint_id: &str) -> Result<Option<i64>> {
        let (max,): (Option<i64>,) = sqlx::query_as(
            "SELECT MAX(version_number) FROM blueprint_versions WHERE blueprint_id = ?",
        )
        .bind(blueprint_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(max)
    }

    async fn update_version_status(
        &self,
        id: &str,
        expected: VersionStatus,
        status: VersionStatus,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE blueprint_versions SET status = ?, published_at = ? WHERE id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(published_at.map(|t| t.to_rfc3339()))
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        debug!(version_id = %id, from = %expected, to = %status, updated, "Version status update");
        Ok(updated)
    }

    async fn insert_version_with_definitions(
        &self,
        version: &BlueprintVersion,
        definitions: &DefinitionSet,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_version(&mut *tx, version).await?;
        write_definitions(&mut *tx, definitions).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_definitions(&self, definitions: &DefinitionSet) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_definitions(&mut *tx, definitions).await?;
        tx.commit().await?;
        Ok(())
    }

    // ========== Entity Type Operations ==========

    async fn save_entity_type(&self, entity_type: &EntityTypeDef) -> Result<()> {
        write_entity_type(&self.pool, entity_type).await
    }

    async fn list_entity_types(&self, version_id: &str) -> Result<Vec<EntityTypeDef>> {
        let rows: Vec<EntityTypeRow> = sqlx::query_as(
            "SELECT * FROM entity_types WHERE version_id = ? ORDER BY entity_kind, id",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EntityTypeRow::into_definition).collect())
    }

    async fn save_field(&self, field: &FieldDef) -> Result<()> {
        write_field(&self.pool, field).await
    }

    async fn list_fields(&self, entity_type_id: &str) -> Result<Vec<FieldDef>> {
        let rows: Vec<FieldRow> = sqlx::query_as(
            r#"
            SELECT * FROM field_defs
            WHERE entity_type_id = ?
            ORDER BY display_order, field_name, id
            "#,
        )
        .bind(entity_type_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_definition()).collect()
    }

    // ========== Relationship Operations ==========

    async fn save_relationship_type(&self, relationship_type: &RelationshipTypeDef) -> Result<()> {
        write_relationship_type(&self.pool, relationship_type).await
    }

    async fn list_relationship_types(&self, version_id: &str) -> Result<Vec<RelationshipTypeDef>> {
        let rows: Vec<RelationshipTypeRow> = sqlx::query_as(
            "SELECT * FROM relationship_types WHERE version_id = ? ORDER BY relationship_name, id",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_definition()).collect()
    }

    async fn save_relationship_attribute(
        &self,
        attribute: &RelationshipAttributeDef,
    ) -> Result<()> {
        write_relationship_attribute(&self.pool, attribute).await
    }

    async fn list_relationship_attributes(
        &self,
        relationship_type_id: &str,
    ) -> Result<Vec<RelationshipAttributeDef>> {
        let rows: Vec<RelationshipAttributeRow> = sqlx::query_as(
            r#"
            SELECT * FROM relationship_attributes
            WHERE relationship_type_id = ?
            ORDER BY attribute_name, id
            "#,
        )
        .bind(relationship_type_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(RelationshipAttributeRow::into_definition)
            .collect())
    }

    // ========== View Operations ==========

    async fn save_view_template(&self, view: &ViewTemplateDef) -> Result<()> {
        write_view_template(&self.pool, view).await
    }

    async fn list_view_templates(&self, version_id: &str) -> Result<Vec<ViewTemplateDef>> {
        let rows: Vec<ViewTemplateRow> = sqlx::query_as(
            "SELECT * FROM view_templates WHERE version_id = ? ORDER BY name, id",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_definition()).collect()
    }

    async fn save_moc(&self, moc: &MocDef) -> Result<()> {
        write_moc(&self.pool, moc).await
    }

    async fn list_mocs(&self, version_id: &str) -> Result<Vec<MocDef>> {
        let rows: Vec<MocRow> =
            sqlx::query_as("SELECT * FROM mocs WHERE version_id = ? ORDER BY name, id")
                .bind(version_id)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|r| r.into_definition()).collect()
    }

    // ========== Extraction Operations ==========

    async fn save_extraction_profile(&self, profile: &ExtractionProfile) -> Result<()> {
        write_extraction_profile(&self.pool, profile).await
    }

    async fn get_extraction_profile(&self, version_id: &str) -> Result<Option<ExtractionProfile>> {
        let row: Option<ExtractionProfileRow> =
            sqlx::query_as("SELECT * FROM extraction_profiles WHERE version_id = ?")
                .bind(version_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(ExtractionProfileRow::into_profile))
    }

    async fn save_label_mapping(&self, mapping: &LabelMapping) -> Result<()> {
        write_label_mapping(&self.pool, mapping).await
    }

    async fn list_label_mappings(&self, profile_id: &str) -> Result<Vec<LabelMapping>> {
        let rows: Vec<LabelMappingRow> = sqlx::query_as(
            "SELECT * FROM label_mappings WHERE profile_id = ? ORDER BY priority, ner_label, id",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LabelMappingRow::into_mapping).collect())
    }

    async fn save_ignore_entry(&self, entry: &IgnoreEntry) -> Result<()> {
        write_ignore_entry(&self.pool, entry).await
    }

    async fn list_ignore_entries(&self, profile_id: &str) -> Result<Vec<IgnoreEntry>> {
        let rows: Vec<IgnoreEntryRow> = sqlx::query_as(
            "SELECT * FROM ignore_entries WHERE profile_id = ? ORDER BY term, id",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(IgnoreEntryRow::into_entry).collect())
    }
}

// ========== Writes ==========
//
// Each write takes any executor so the same statement runs against the pool
// or inside a transaction.

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Write a whole definition set on one connection, parents first
async fn write_definitions(conn: &mut SqliteConnection, definitions: &DefinitionSet) -> Result<()> {
    for entity_type in &definitions.entity_types {
        write_entity_type(&mut *conn, entity_type).await?;
    }
    for field in &definitions.fields {
        write_field(&mut *conn, field).await?;
    }
    for relationship_type in &definitions.relationship_types {
        write_relationship_type(&mut *conn, relationship_type).await?;
    }
    for attribute in &definitions.attributes {
        write_relationship_attribute(&mut *conn, attribute).await?;
    }
    for view in &definitions.view_templates {
        write_view_template(&mut *conn, view).await?;
    }
    for moc in &definitions.mocs {
        write_moc(&mut *conn, moc).await?;
    }
    if let Some(profile) = &definitions.extraction_profile {
        write_extraction_profile(&mut *conn, profile).await?;
    }
    for mapping in &definitions.label_mappings {
        write_label_mapping(&mut *conn, mapping).await?;
    }
    for entry in &definitions.ignore_entries {
        write_ignore_entry(&mut *conn, entry).await?;
    }

    debug!(
        entity_types = definitions.entity_types.len(),
        fields = definitions.fields.len(),
        relationship_types = definitions.relationship_types.len(),
        "Definition set written"
    );
    Ok(())
}

async fn write_version<'e, E>(executor: E, version: &BlueprintVersion) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO blueprint_versions (
            id, blueprint_id, version_number, status, notes, created_at, published_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&version.id)
    .bind(&version.blueprint_id)
    .bind(version.version_number)
    .bind(version.status.as_str())
    .bind(&version.notes)
    .bind(version.created_at.to_rfc3339())
    .bind(version.published_at.map(|t| t.to_rfc3339()))
    .execute(executor)
    .await;

    match result {
        Err(err) if is_unique_violation(&err) => Err(Error::VersionConflict {
            blueprint_id: version.blueprint_id.clone(),
            version_number: version.version_number,
        }),
        Err(err) => Err(err.into()),
        Ok(_) => {
            debug!(
                version_id = %version.id,
                blueprint_id = %version.blueprint_id,
                version_number = version.version_number,
                "Version inserted"
            );
            Ok(())
        }
    }
}

async fn write_entity_type<'e, E>(executor: E, entity_type: &EntityTypeDef) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO entity_types (
            id, version_id, entity_kind, display_name, description, parent_type_id, is_abstract
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            entity_kind = excluded.entity_kind,
            display_name = excluded.display_name,
            description = excluded.description,
            parent_type_id = excluded.parent_type_id,
            is_abstract = excluded.is_abstract
        "#,
    )
    .bind(&entity_type.id)
    .bind(&entity_type.version_id)
    .bind(entity_type.entity_kind.as_str())
    .bind(&entity_type.display_name)
    .bind(&entity_type.description)
    .bind(&entity_type.parent_type_id)
    .bind(entity_type.is_abstract)
    .execute(executor)
    .await?;

    debug!(entity_type_id = %entity_type.id, kind = %entity_type.entity_kind, "Entity type saved");
    Ok(())
}

async fn write_field<'e, E>(executor: E, field: &FieldDef) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let validation_json = field
        .validation
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO field_defs (
            id, entity_type_id, field_name, display_label, data_type,
            is_required, display_order, default_value, validation
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            field_name = excluded.field_name,
            display_label = excluded.display_label,
            data_type = excluded.data_type,
            is_required = excluded.is_required,
            display_order = excluded.display_order,
            default_value = excluded.default_value,
            validation = excluded.validation
        "#,
    )
    .bind(&field.id)
    .bind(&field.entity_type_id)
    .bind(&field.field_name)
    .bind(&field.display_label)
    .bind(field.data_type.as_str())
    .bind(field.is_required)
    .bind(field.display_order)
    .bind(&field.default_value)
    .bind(&validation_json)
    .execute(executor)
    .await?;

    debug!(field_id = %field.id, field_name = %field.field_name, "Field saved");
    Ok(())
}

async fn write_relationship_type<'e, E>(
    executor: E,
    relationship_type: &RelationshipTypeDef,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO relationship_types (
            id, version_id, relationship_name, display_label, source_entity_kind,
            target_entity_kind, direction, cardinality, reverse_label
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            relationship_name = excluded.relationship_name,
            display_label = excluded.display_label,
            source_entity_kind = excluded.source_entity_kind,
            target_entity_kind = excluded.target_entity_kind,
            direction = excluded.direction,
            cardinality = excluded.cardinality,
            reverse_label = excluded.reverse_label
        "#,
    )
    .bind(&relationship_type.id)
    .bind(&relationship_type.version_id)
    .bind(&relationship_type.relationship_name)
    .bind(&relationship_type.display_label)
    .bind(relationship_type.source_entity_kind.as_str())
    .bind(relationship_type.target_entity_kind.as_str())
    .bind(relationship_type.direction.as_str())
    .bind(relationship_type.cardinality.as_str())
    .bind(&relationship_type.reverse_label)
    .execute(executor)
    .await?;

    debug!(
        relationship_type_id = %relationship_type.id,
        name = %relationship_type.relationship_name,
        "Relationship type saved"
    );
    Ok(())
}

async fn write_relationship_attribute<'e, E>(
    executor: E,
    attribute: &RelationshipAttributeDef,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO relationship_attributes (
            id, relationship_type_id, attribute_name, data_type, is_required
        ) VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            attribute_name = excluded.attribute_name,
            data_type = excluded.data_type,
            is_required = excluded.is_required
        "#,
    )
    .bind(&attribute.id)
    .bind(&attribute.relationship_type_id)
    .bind(&attribute.attribute_name)
    .bind(attribute.data_type.as_str())
    .bind(attribute.is_required)
    .execute(executor)
    .await?;
    Ok(())
}

async fn write_view_template<'e, E>(executor: E, view: &ViewTemplateDef) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let config_json = serde_json::to_string(&view.config)?;

    sqlx::query(
        r#"
        INSERT INTO view_templates (id, version_id, name, entity_kind, config)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            entity_kind = excluded.entity_kind,
            config = excluded.config
        "#,
    )
    .bind(&view.id)
    .bind(&view.version_id)
    .bind(&view.name)
    .bind(view.entity_kind.as_ref().map(|k| k.as_str().to_string()))
    .bind(&config_json)
    .execute(executor)
    .await?;
    Ok(())
}

async fn write_moc<'e, E>(executor: E, moc: &MocDef) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let kinds_json = serde_json::to_string(&moc.entity_kinds)?;
    let config_json = serde_json::to_string(&moc.config)?;

    sqlx::query(
        r#"
        INSERT INTO mocs (id, version_id, name, entity_kinds, config)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            entity_kinds = excluded.entity_kinds,
            config = excluded.config
        "#,
    )
    .bind(&moc.id)
    .bind(&moc.version_id)
    .bind(&moc.name)
    .bind(&kinds_json)
    .bind(&config_json)
    .execute(executor)
    .await?;
    Ok(())
}

/// A version holds at most one profile; a second one is `InvalidInput`
async fn write_extraction_profile<'e, E>(executor: E, profile: &ExtractionProfile) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO extraction_profiles (id, version_id, name, enabled, confidence_threshold)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            enabled = excluded.enabled,
            confidence_threshold = excluded.confidence_threshold
        "#,
    )
    .bind(&profile.id)
    .bind(&profile.version_id)
    .bind(&profile.name)
    .bind(profile.enabled)
    .bind(profile.confidence_threshold)
    .execute(executor)
    .await;

    match result {
        Err(err) if is_unique_violation(&err) => Err(Error::InvalidInput(format!(
            "Version '{}' already has an extraction profile",
            profile.version_id
        ))),
        Err(err) => Err(err.into()),
        Ok(_) => Ok(()),
    }
}

async fn write_label_mapping<'e, E>(executor: E, mapping: &LabelMapping) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO label_mappings (id, profile_id, ner_label, entity_kind, priority)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            ner_label = excluded.ner_label,
            entity_kind = excluded.entity_kind,
            priority = excluded.priority
        "#,
    )
    .bind(&mapping.id)
    .bind(&mapping.profile_id)
    .bind(&mapping.ner_label)
    .bind(mapping.entity_kind.as_str())
    .bind(mapping.priority)
    .execute(executor)
    .await?;
    Ok(())
}

async fn write_ignore_entry<'e, E>(executor: E, entry: &IgnoreEntry) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO ignore_entries (id, profile_id, term, case_sensitive)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            term = excluded.term,
            case_sensitive = excluded.case_sensitive
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.profile_id)
    .bind(&entry.term)
    .bind(entry.case_sensitive)
    .execute(executor)
    .await?;
    Ok(())
}

// ========== Row Types ==========

#[derive(Debug, FromRow)]
struct BlueprintRow {
    id: String,
    name: String,
    description: Option<String>,
    tags: String,
    is_system: bool,
    created_at: String,
    updated_at: String,
}

impl BlueprintRow {
    fn into_meta(self) -> Result<BlueprintMeta> {
        let tags: BTreeSet<String> = parse_json(Some(&self.tags))?.unwrap_or_default();

        Ok(BlueprintMeta {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            id: self.id,
            name: self.name,
            description: self.description,
            tags,
            is_system: self.is_system,
        })
    }
}

#[derive(Debug, FromRow)]
struct VersionRow {
    id: String,
    blueprint_id: String,
    version_number: i64,
    status: String,
    notes: Option<String>,
    created_at: String,
    published_at: Option<String>,
}

impl VersionRow {
    fn into_version(self) -> Result<BlueprintVersion> {
        let status = VersionStatus::parse(&self.status)
            .ok_or_else(|| Error::Other(format!("Invalid version status: {}", self.status)))?;
        let published_at = self
            .published_at
            .as_deref()
            .map(|t| parse_timestamp("published_at", t))
            .transpose()?;

        Ok(BlueprintVersion {
            created_at: parse_timestamp("created_at", &self.created_at)?,
            id: self.id,
            blueprint_id: self.blueprint_id,
            version_number: self.version_number,
            status,
            notes: self.notes,
            published_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EntityTypeRow {
    id: String,
    version_id: String,
    entity_kind: String,
    display_name: String,
    description: Option<String>,
    parent_type_id: Option<String>,
    is_abstract: bool,
}

impl EntityTypeRow {
    fn into_definition(self) -> EntityTypeDef {
        EntityTypeDef {
            id: self.id,
            version_id: self.version_id,
            entity_kind: EntityKind::parse(&self.entity_kind),
            display_name: self.display_name,
            description: self.description,
            parent_type_id: self.parent_type_id,
            is_abstract: self.is_abstract,
        }
    }
}

#[derive(Debug, FromRow)]
struct FieldRow {
    id: String,
    entity_type_id: String,
    field_name: String,
    display_label: String,
    data_type: String,
    is_required: bool,
    display_order: i64,
    default_value: Option<String>,
    validation: Option<String>,
}

impl FieldRow {
    fn into_definition(self) -> Result<FieldDef> {
        Ok(FieldDef {
            validation: parse_json(self.validation.as_deref())?,
            id: self.id,
            entity_type_id: self.entity_type_id,
            field_name: self.field_name,
            display_label: self.display_label,
            data_type: FieldDataType::parse(&self.data_type),
            is_required: self.is_required,
            display_order: self.display_order,
            default_value: self.default_value,
        })
    }
}

#[derive(Debug, FromRow)]
struct RelationshipTypeRow {
    id: String,
    version_id: String,
    relationship_name: String,
    display_label: String,
    source_entity_kind: String,
    target_entity_kind: String,
    direction: String,
    cardinality: String,
    reverse_label: Option<String>,
}

impl RelationshipTypeRow {
    fn into_definition(self) -> Result<RelationshipTypeDef> {
        let direction = RelationshipDirection::parse(&self.direction)
            .ok_or_else(|| Error::Other(format!("Invalid direction: {}", self.direction)))?;
        let cardinality = Cardinality::parse(&self.cardinality)
            .ok_or_else(|| Error::Other(format!("Invalid cardinality: {}", self.cardinality)))?;

        Ok(RelationshipTypeDef {
            id: self.id,
            version_id: self.version_id,
            relationship_name: self.relationship_name,
            display_label: self.display_label,
            source_entity_kind: EntityKind::parse(&self.source_entity_kind),
            target_entity_kind: EntityKind::parse(&self.target_entity_kind),
            direction,
            cardinality,
            reverse_label: self.reverse_label,
        })
    }
}

#[derive(Debug, FromRow)]
struct RelationshipAttributeRow {
    id: String,
    relationship_type_id: String,
    attribute_name: String,
    data_type: String,
    is_required: bool,
}

impl RelationshipAttributeRow {
    fn into_definition(self) -> RelationshipAttributeDef {
        RelationshipAttributeDef {
            id: self.id,
            relationship_type_id: self.relationship_type_id,
            attribute_name: self.attribute_name,
            data_type: FieldDataType::parse(&self.data_type),
            is_required: self.is_required,
        }
    }
}

#[derive(Debug, FromRow)]
struct ViewTemplateRow {
    id: String,
    version_id: String,
    name: String,
    entity_kind: Option<String>,
    config: String,
}

impl ViewTemplateRow {
    fn into_definition(self) -> Result<ViewTemplateDef> {
        Ok(ViewTemplateDef {
            config: serde_json::from_str(&self.config)?,
            id: self.id,
            version_id: self.version_id,
            name: self.name,
            entity_kind: self.entity_kind.as_deref().map(EntityKind::parse),
        })
    }
}

#[derive(Debug, FromRow)]
struct MocRow {
    id: String,
    version_id: String,
    name: String,
    entity_kinds: String,
    config: String,
}

impl MocRow {
    fn into_definition(self) -> Result<MocDef> {
        Ok(MocDef {
            entity_kinds: serde_json::from_str(&self.entity_kinds)?,
            config: serde_json::from_str(&self.config)?,
            id: self.id,
            version_id: self.version_id,
            name: self.name,
        })
    }
}

#[derive(Debug, FromRow)]
struct ExtractionProfileRow {
    id: String,
    version_id: String,
    name: String,
    enabled: bool,
    confidence_threshold: f64,
}

impl ExtractionProfileRow {
    fn into_profile(self) -> ExtractionProfile {
        ExtractionProfile {
            id: self.id,
            version_id: self.version_id,
            name: self.name,
            enabled: self.enabled,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

#[derive(Debug, FromRow)]
struct LabelMappingRow {
    id: String,
    profile_id: String,
    ner_label: String,
    entity_kind: String,
    priority: i64,
}

impl LabelMappingRow {
    fn into_mapping(self) -> LabelMapping {
        LabelMapping {
            id: self.id,
            profile_id: self.profile_id,
            ner_label: self.ner_label,
            entity_kind: EntityKind::parse(&self.entity_kind),
            priority: self.priority,
        }
    }
}

#[derive(Debug, FromRow)]
struct IgnoreEntryRow {
    id: String,
    profile_id: String,
    term: String,
    case_sensitive: bool,
}

impl IgnoreEntryRow {
    fn into_entry(self) -> IgnoreEntry {
        IgnoreEntry {
            id: self.id,
            profile_id: self.profile_id,
            term: self.term,
            case_sensitive: self.case_sensitive,
        }
    }
}

//! Version manager
//!
//! Assigns version numbers, drives the draft -> published -> archived /
//! deprecated state machine and decides which version a compile targets.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::event::BlueprintEvent;
use super::meta::{BlueprintVersion, VersionStatus};
use super::repository::{DefinitionSet, DefinitionStore};

/// Attempts at claiming a version number before giving up
const MAX_CREATE_ATTEMPTS: usize = 5;

/// Attempts at a status change when other writers keep moving the version
const MAX_TRANSITION_ATTEMPTS: usize = 5;

/// Events kept in memory; older ones are dropped first
pub const EVENT_LOG_CAPACITY: usize = 512;

/// Manages blueprint versions on top of a definition store
pub struct VersionManager<S: DefinitionStore> {
    store: Arc<S>,
    events: Mutex<VecDeque<BlueprintEvent>>,
    event_capacity: usize,
}

impl<S: DefinitionStore> VersionManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            events: Mutex::new(VecDeque::new()),
            event_capacity: EVENT_LOG_CAPACITY,
        }
    }

    /// Keep at most `capacity` events (minimum 1)
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Next free version number: 1 for a fresh blueprint, else max + 1
    ///
    /// Always read from the store, never cached.
    pub async fn next_version_number(&self, blueprint_id: &str) -> Result<i64> {
        let max = self.store.max_version_number(blueprint_id).await?;
        Ok(max.map_or(1, |n| n + 1))
    }

    /// Create a new empty draft version
    pub async fn create_draft(&self, blueprint_id: &str) -> Result<BlueprintVersion> {
        let version = BlueprintVersion::draft(blueprint_id, 0);
        self.create_version(version, None, None).await
    }

    /// Claim the next number for `version` and insert it, with `definitions`
    /// in the same unit of work when given
    async fn create_version(
        &self,
        mut version: BlueprintVersion,
        forked_from: Option<&str>,
        definitions: Option<&DefinitionSet>,
    ) -> Result<BlueprintVersion> {
        let blueprint_id = version.blueprint_id.clone();
        if self.store.get_blueprint_meta(&blueprint_id).await?.is_none() {
            return Err(Error::BlueprintNotFound(blueprint_id));
        }

        let mut last_conflict = None;
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let number = self.next_version_number(&blueprint_id).await?;
            version.version_number = number;

            let inserted = match definitions {
                Some(definitions) => {
                    self.store
                        .insert_version_with_definitions(&version, definitions)
                        .await
                }
                None => self.store.insert_version(&version).await,
            };

            match inserted {
                Ok(()) => {
                    info!(
                        blueprint_id = %blueprint_id,
                        version_id = %version.id,
                        version_number = number,
                        "Draft version created"
                    );
                    self.record_event(BlueprintEvent::version_created(
                        &blueprint_id,
                        &version.id,
                        number,
                        forked_from,
                    ))
                    .await;
                    return Ok(version);
                }
                Err(err @ Error::VersionConflict { .. }) => {
                    debug!(
                        blueprint_id = %blueprint_id,
                        version_number = number,
                        attempt,
                        "Version number taken concurrently, retrying"
                    );
                    last_conflict = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_conflict.unwrap_or_else(|| {
            Error::Other(format!(
                "Could not allocate a version number for blueprint '{}'",
                blueprint_id
            ))
        }))
    }

    /// Create a new draft that copies every definition of `source_version_id`
    ///
    /// Ids are fresh; parent references are remapped to the copies. A parent
    /// reference that was already dangling is copied verbatim. The draft and
    /// its definitions are written together: a failed fork leaves nothing.
    pub async fn fork_draft(&self, source_version_id: &str) -> Result<BlueprintVersion> {
        let source = self
            .store
            .get_version(source_version_id)
            .await?
            .ok_or_else(|| Error::VersionNotFound(source_version_id.to_string()))?;

        let draft = BlueprintVersion::draft(&source.blueprint_id, 0);
        let definitions = self.copy_definitions(&source.id, &draft.id).await?;
        let draft = self
            .create_version(draft, Some(&source.id), Some(&definitions))
            .await?;

        info!(
            source_version_id = %source.id,
            version_id = %draft.id,
            entity_types = definitions.entity_types.len(),
            "Draft forked"
        );
        Ok(draft)
    }

    /// Read every definition of `source_id`, re-keyed for `target_id`
    async fn copy_definitions(&self, source_id: &str, target_id: &str) -> Result<DefinitionSet> {
        let store = &self.store;
        let mut copy = DefinitionSet::default();

        let entity_types = store.list_entity_types(source_id).await?;
        let id_map: HashMap<String, String> = entity_types
            .iter()
            .map(|t| (t.id.clone(), Uuid::new_v4().to_string()))
            .collect();

        for entity_type in &entity_types {
            let new_id = id_map[&entity_type.id].clone();
            for field in store.list_fields(&entity_type.id).await? {
                let mut field = field;
                field.id = Uuid::new_v4().to_string();
                field.entity_type_id = new_id.clone();
                copy.fields.push(field);
            }

            let mut entity_copy = entity_type.clone();
            entity_copy.id = new_id;
            entity_copy.version_id = target_id.to_string();
            entity_copy.parent_type_id = entity_type
                .parent_type_id
                .as_ref()
                .map(|pid| id_map.get(pid).cloned().unwrap_or_else(|| pid.clone()));
            copy.entity_types.push(entity_copy);
        }

        for relationship in store.list_relationship_types(source_id).await? {
            let attributes = store.list_relationship_attributes(&relationship.id).await?;
            let mut relationship = relationship;
            relationship.id = Uuid::new_v4().to_string();
            relationship.version_id = target_id.to_string();

            for attribute in attributes {
                let mut attribute = attribute;
                attribute.id = Uuid::new_v4().to_string();
                attribute.relationship_type_id = relationship.id.clone();
                copy.attributes.push(attribute);
            }
            copy.relationship_types.push(relationship);
        }

        for view in store.list_view_templates(source_id).await? {
            let mut view = view;
            view.id = Uuid::new_v4().to_string();
            view.version_id = target_id.to_string();
            copy.view_templates.push(view);
        }

        for moc in store.list_mocs(source_id).await? {
            let mut moc = moc;
            moc.id = Uuid::new_v4().to_string();
            moc.version_id = target_id.to_string();
            copy.mocs.push(moc);
        }

        if let Some(profile) = store.get_extraction_profile(source_id).await? {
            let mappings = store.list_label_mappings(&profile.id).await?;
            let ignore = store.list_ignore_entries(&profile.id).await?;

            let mut profile = profile;
            profile.id = Uuid::new_v4().to_string();
            profile.version_id = target_id.to_string();

            for mapping in mappings {
                let mut mapping = mapping;
                mapping.id = Uuid::new_v4().to_string();
                mapping.profile_id = profile.id.clone();
                copy.label_mappings.push(mapping);
            }
            for entry in ignore {
                let mut entry = entry;
                entry.id = Uuid::new_v4().to_string();
                entry.profile_id = profile.id.clone();
                copy.ignore_entries.push(entry);
            }
            copy.extraction_profile = Some(profile);
        }

        Ok(copy)
    }

    /// Pick the version to compile
    ///
    /// An explicit id is used verbatim. Otherwise the highest-numbered
    /// published version wins, falling back to the highest-numbered version
    /// of any status.
    pub async fn resolve_version_for_compile(
        &self,
        blueprint_id: &str,
        explicit_version_id: Option<&str>,
    ) -> Result<BlueprintVersion> {
        if let Some(version_id) = explicit_version_id {
            return self
                .store
                .get_version(version_id)
                .await?
                .ok_or_else(|| Error::VersionNotFound(version_id.to_string()));
        }

        let versions = self.store.list_versions(blueprint_id).await?;
        let latest_published = versions
            .iter()
            .filter(|v| v.status == VersionStatus::Published)
            .max_by_key(|v| v.version_number);
        let latest_any = versions.iter().max_by_key(|v| v.version_number);

        match latest_published.or(latest_any) {
            Some(version) => Ok(version.clone()),
            None if self.store.get_blueprint_meta(blueprint_id).await?.is_none() => {
                Err(Error::BlueprintNotFound(blueprint_id.to_string()))
            }
            None => Err(Error::NoVersions(blueprint_id.to_string())),
        }
    }

    /// Publish a draft, stamping `published_at`
    ///
    /// Publishing an already-published version is a no-op and returns it
    /// unchanged.
    pub async fn publish(&self, version_id: &str) -> Result<BlueprintVersion> {
        self.transition(version_id, VersionStatus::Published).await
    }

    pub async fn archive(&self, version_id: &str) -> Result<BlueprintVersion> {
        self.transition(version_id, VersionStatus::Archived).await
    }

    pub async fn deprecate(&self, version_id: &str) -> Result<BlueprintVersion> {
        self.transition(version_id, VersionStatus::Deprecated).await
    }

    /// Move a version to `next`
    ///
    /// The store update only applies while the version still has the status
    /// it was read with. When another writer got there first the version is
    /// re-read: already at `next` is a no-op, anything else is re-checked
    /// against the state machine.
    async fn transition(&self, version_id: &str, next: VersionStatus) -> Result<BlueprintVersion> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let mut version = self
                .store
                .get_version(version_id)
                .await?
                .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))?;

            if version.status == next {
                debug!(version_id = %version_id, status = %next, "Version already in target status");
                return Ok(version);
            }

            let previous = version.status;
            version.transition(next, Utc::now())?;
            let updated = self
                .store
                .update_version_status(&version.id, previous, version.status, version.published_at)
                .await?;

            if !updated {
                debug!(
                    version_id = %version_id,
                    from = %previous,
                    to = %next,
                    attempt,
                    "Version changed concurrently, re-reading"
                );
                continue;
            }

            info!(
                version_id = %version.id,
                from = %previous,
                to = %next,
                "Version status changed"
            );
            self.record_event(BlueprintEvent::status_changed(&version.id, previous, next))
                .await;
            return Ok(version);
        }

        Err(Error::Other(format!(
            "Version '{}' kept changing while moving it to {}",
            version_id, next
        )))
    }

    /// Snapshot of recorded events, oldest first
    pub async fn events(&self) -> Vec<BlueprintEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    /// Record an event raised elsewhere (e.g. by the compiler)
    pub async fn record_event(&self, event: BlueprintEvent) {
        let mut events = self.events.lock().await;
        while events.len() >= self.event_capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub async fn clear_events(&self) {
        self.events.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blueprint::definitions::{
        EntityKind, EntityTypeDef, ExtractionProfile, FieldDataType, FieldDef, LabelMapping,
        RelationshipAttributeDef, RelationshipTypeDef,
    };
    use crate::domain::blueprint::meta::BlueprintMeta;
    use crate::infrastructure::blueprint::SqliteDefinitionStore;
    use crate::storage::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (VersionManager<SqliteDefinitionStore>, Arc<SqliteDefinitionStore>, BlueprintMeta) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let store = Arc::new(SqliteDefinitionStore::new(pool));
        let meta = BlueprintMeta::new("World");
        store.save_blueprint_meta(&meta).await.unwrap();
        (VersionManager::new(store.clone()), store, meta)
    }

    #[tokio::test]
    async fn test_first_version_is_one() {
        let (manager, _, meta) = setup().await;
        assert_eq!(manager.next_version_number(&meta.id).await.unwrap(), 1);

        let v1 = manager.create_draft(&meta.id).await.unwrap();
        assert_eq!(v1.version_number, 1);
        assert_eq!(v1.status, VersionStatus::Draft);
        assert!(v1.published_at.is_none());
    }

    #[tokio::test]
    async fn test_version_numbers_increase() {
        let (manager, _, meta) = setup().await;
        for _ in 0..3 {
            manager.create_draft(&meta.id).await.unwrap();
        }
        let v4 = manager.create_draft(&meta.id).await.unwrap();
        assert_eq!(v4.version_number, 4);
    }

    #[tokio::test]
    async fn test_create_draft_unknown_blueprint() {
        let (manager, _, _) = setup().await;
        let err = manager.create_draft("nope").await.unwrap_err();
        assert!(matches!(err, Error::BlueprintNotFound(_)));
    }

    #[tokio::test]
    async fn test_taken_number_is_skipped() {
        let (manager, store, meta) = setup().await;
        // Another writer claims number 1 behind the manager's back.
        store
            .insert_version(&BlueprintVersion::draft(&meta.id, 1))
            .await
            .unwrap();
        let err = store
            .insert_version(&BlueprintVersion::draft(&meta.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VersionConflict { version_number: 1, .. }));

        let version = manager.create_draft(&meta.id).await.unwrap();
        assert_eq!(version.version_number, 2);
    }

    #[tokio::test]
    async fn test_publish_sets_published_at_once() {
        let (manager, store, meta) = setup().await;
        let draft = manager.create_draft(&meta.id).await.unwrap();

        let published = manager.publish(&draft.id).await.unwrap();
        assert_eq!(published.status, VersionStatus::Published);
        let stamp = published.published_at.expect("published_at set");

        let again = manager.publish(&draft.id).await.unwrap();
        assert_eq!(again.published_at, Some(stamp));

        let stored = store.get_version(&draft.id).await.unwrap().unwrap();
        assert_eq!(stored.published_at, Some(stamp));

        let events = manager.events().await;
        assert_eq!(
            events
                .iter()
                .filter(|e| e.event_type_name() == "version_status_changed")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_archive_requires_published() {
        let (manager, _, meta) = setup().await;
        let draft = manager.create_draft(&meta.id).await.unwrap();

        let err = manager.archive(&draft.id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));

        manager.publish(&draft.id).await.unwrap();
        let deprecated = manager.deprecate(&draft.id).await.unwrap();
        assert_eq!(deprecated.status, VersionStatus::Deprecated);
        assert!(deprecated.published_at.is_some());

        let archived = manager.archive(&draft.id).await.unwrap();
        assert_eq!(archived.status, VersionStatus::Archived);
        assert!(archived.published_at.is_some());
    }

    #[tokio::test]
    async fn test_resolve_prefers_latest_published() {
        let (manager, _, meta) = setup().await;
        let v1 = manager.create_draft(&meta.id).await.unwrap();
        let v2 = manager.create_draft(&meta.id).await.unwrap();
        let _v3 = manager.create_draft(&meta.id).await.unwrap();
        manager.publish(&v1.id).await.unwrap();
        manager.publish(&v2.id).await.unwrap();

        let chosen = manager.resolve_version_for_compile(&meta.id, None).await.unwrap();
        assert_eq!(chosen.id, v2.id);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_latest_any() {
        let (manager, _, meta) = setup().await;
        manager.create_draft(&meta.id).await.unwrap();
        let v2 = manager.create_draft(&meta.id).await.unwrap();

        let chosen = manager.resolve_version_for_compile(&meta.id, None).await.unwrap();
        assert_eq!(chosen.id, v2.id);
    }

    #[tokio::test]
    async fn test_resolve_explicit_and_missing() {
        let (manager, _, meta) = setup().await;
        let err = manager
            .resolve_version_for_compile(&meta.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoVersions(_)));

        let err = manager
            .resolve_version_for_compile("unknown", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BlueprintNotFound(_)));

        let v1 = manager.create_draft(&meta.id).await.unwrap();
        manager.create_draft(&meta.id).await.unwrap();
        let chosen = manager
            .resolve_version_for_compile(&meta.id, Some(&v1.id))
            .await
            .unwrap();
        assert_eq!(chosen.id, v1.id);

        let err = manager
            .resolve_version_for_compile(&meta.id, Some("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::VersionNotFound(_)));
    }

    #[tokio::test]
    async fn test_fork_copies_and_remaps() {
        let (manager, store, meta) = setup().await;
        let v1 = manager.create_draft(&meta.id).await.unwrap();

        let base = EntityTypeDef::new(&v1.id, EntityKind::Character);
        let hero = EntityTypeDef::new(&v1.id, EntityKind::Custom("HERO".into())).with_parent(&base.id);
        let orphan = EntityTypeDef::new(&v1.id, EntityKind::Item).with_parent("gone");
        for t in [&base, &hero, &orphan] {
            store.save_entity_type(t).await.unwrap();
        }
        store
            .save_field(&FieldDef::new(&base.id, "name", FieldDataType::Text))
            .await
            .unwrap();
        let rel = RelationshipTypeDef::new(&v1.id, "knows", EntityKind::Character, EntityKind::Character);
        store.save_relationship_type(&rel).await.unwrap();
        store
            .save_relationship_attribute(&RelationshipAttributeDef::new(&rel.id, "since", FieldDataType::Date))
            .await
            .unwrap();
        let profile = ExtractionProfile::new(&v1.id, "default");
        store.save_extraction_profile(&profile).await.unwrap();
        store
            .save_label_mapping(&LabelMapping::new(&profile.id, "PER", EntityKind::Character, 1))
            .await
            .unwrap();
        manager.publish(&v1.id).await.unwrap();

        let v2 = manager.fork_draft(&v1.id).await.unwrap();
        assert_eq!(v2.version_number, 2);
        assert_eq!(v2.status, VersionStatus::Draft);

        let copied = store.list_entity_types(&v2.id).await.unwrap();
        assert_eq!(copied.len(), 3);
        let copied_base = copied.iter().find(|t| t.entity_kind == EntityKind::Character).unwrap();
        let copied_hero = copied
            .iter()
            .find(|t| t.entity_kind == EntityKind::Custom("HERO".into()))
            .unwrap();
        let copied_orphan = copied.iter().find(|t| t.entity_kind == EntityKind::Item).unwrap();
        assert_ne!(copied_base.id, base.id);
        assert_eq!(copied_hero.parent_type_id.as_deref(), Some(copied_base.id.as_str()));
        assert_eq!(copied_orphan.parent_type_id.as_deref(), Some("gone"));
        assert_eq!(store.list_fields(&copied_base.id).await.unwrap().len(), 1);

        let rels = store.list_relationship_types(&v2.id).await.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(
            store.list_relationship_attributes(&rels[0].id).await.unwrap().len(),
            1
        );

        let copied_profile = store.get_extraction_profile(&v2.id).await.unwrap().unwrap();
        assert_eq!(
            store.list_label_mappings(&copied_profile.id).await.unwrap().len(),
            1
        );

        // Source untouched.
        assert_eq!(store.list_entity_types(&v1.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_publish_stamps_once() {
        let (manager, store, meta) = setup().await;
        let draft = manager.create_draft(&meta.id).await.unwrap();

        let (a, b) = tokio::join!(manager.publish(&draft.id), manager.publish(&draft.id));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(a.published_at.is_some());
        assert_eq!(a.published_at, b.published_at);

        let stored = store.get_version(&draft.id).await.unwrap().unwrap();
        assert_eq!(stored.published_at, a.published_at);
        assert_eq!(
            manager
                .events()
                .await
                .iter()
                .filter(|e| e.event_type_name() == "version_status_changed")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_stale_manager_does_not_restamp() {
        let (manager, store, meta) = setup().await;
        let other = VersionManager::new(store.clone());
        let draft = manager.create_draft(&meta.id).await.unwrap();

        let first = manager.publish(&draft.id).await.unwrap();
        let late = other.publish(&draft.id).await.unwrap();
        assert_eq!(late.published_at, first.published_at);
        assert!(other.events().await.is_empty());

        let stored = store.get_version(&draft.id).await.unwrap().unwrap();
        assert_eq!(stored.published_at, first.published_at);
    }

    #[tokio::test]
    async fn test_event_log_drops_oldest() {
        let (_, store, meta) = setup().await;
        let manager = VersionManager::new(store).with_event_capacity(3);

        for _ in 0..5 {
            manager.create_draft(&meta.id).await.unwrap();
        }

        let numbers: Vec<i64> = manager
            .events()
            .await
            .iter()
            .filter_map(|e| match e {
                BlueprintEvent::VersionCreated { version_number, .. } => Some(*version_number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_fork_records_source() {
        let (manager, _, meta) = setup().await;
        let v1 = manager.create_draft(&meta.id).await.unwrap();
        let v2 = manager.fork_draft(&v1.id).await.unwrap();

        let forked = manager.events().await.into_iter().find_map(|e| match e {
            BlueprintEvent::VersionCreated { version_id, forked_from, .. } if version_id == v2.id => {
                forked_from
            }
            _ => None,
        });
        assert_eq!(forked.as_deref(), Some(v1.id.as_str()));
    }
}

//! Blueprint compiler
//!
//! Turns the stored definitions of one version into a [`CompiledBlueprint`].
//! Compiling is a pure read-and-transform: it never writes to the store.
//!
//! Only a missing version or blueprint fails the call. Anomalies inside the
//! version (dangling parents, cycles, over-deep chains, unknown relationship
//! endpoints, misfiled attributes) degrade locally and are reported through
//! `CompiledBlueprint::diagnostics`.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::compiled::{
    CompiledBlueprint, CompiledEntityType, CompiledExtractionProfile, CompiledRelationshipType,
    IntegrityWarning,
};
use super::definitions::{EntityKind, FieldDef};
use super::repository::DefinitionStore;
use super::resolver::{InheritanceResolver, MAX_INHERITANCE_DEPTH};

/// Run a store call, failing with `StoreTimeout` once `limit` elapses
///
/// `None` waits indefinitely.
pub async fn with_store_timeout<T, F>(
    limit: Option<Duration>,
    operation: &'static str,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| Error::StoreTimeout {
                operation,
                secs: limit.as_secs(),
            })?,
        None => call.await,
    }
}

/// Compiles blueprint versions read from a definition store
pub struct BlueprintCompiler<S: DefinitionStore> {
    store: Arc<S>,
    max_depth: usize,
    store_timeout: Option<Duration>,
}

impl<S: DefinitionStore> BlueprintCompiler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_depth: MAX_INHERITANCE_DEPTH,
            store_timeout: None,
        }
    }

    /// Override the inheritance depth bound
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Bound every store call; `Duration::ZERO` disables the bound
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    async fn fetch<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_store_timeout(self.store_timeout, operation, call).await
    }

    /// Compile one version
    pub async fn compile(&self, version_id: &str) -> Result<CompiledBlueprint> {
        let store = &self.store;

        let version = self
            .fetch("get_version", store.get_version(version_id))
            .await?
            .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))?;

        let meta = self
            .fetch("get_blueprint_meta", store.get_blueprint_meta(&version.blueprint_id))
            .await?
            .ok_or_else(|| Error::BlueprintNotFound(version.blueprint_id.clone()))?;

        debug!(
            blueprint_id = %meta.id,
            version_id = %version.id,
            version_number = version.version_number,
            "Compiling blueprint version"
        );

        // Entity types and their own fields
        let definitions = self
            .fetch("list_entity_types", store.list_entity_types(&version.id))
            .await?;
        let mut own_fields: HashMap<String, Vec<FieldDef>> = HashMap::new();
        for definition in &definitions {
            let fields = self
                .fetch("list_fields", store.list_fields(&definition.id))
                .await?;
            own_fields.insert(definition.id.clone(), fields);
        }

        let (entity_types, mut diagnostics) = {
            let mut resolver =
                InheritanceResolver::new(&definitions, &own_fields).with_max_depth(self.max_depth);
            let compiled: Vec<CompiledEntityType> = definitions
                .iter()
                .map(|definition| {
                    let resolved = resolver.resolve(&definition.id);
                    CompiledEntityType {
                        definition: definition.clone(),
                        fields: resolved.fields,
                        lineage: resolved.lineage,
                        parent: None,
                        children: Vec::new(),
                    }
                })
                .collect();
            (compiled, resolver.into_warnings())
        };

        // Relationship types with their attributes
        let known_kinds: BTreeSet<&EntityKind> =
            definitions.iter().map(|t| &t.entity_kind).collect();
        let relationship_defs = self
            .fetch("list_relationship_types", store.list_relationship_types(&version.id))
            .await?;
        let mut relationship_types = Vec::with_capacity(relationship_defs.len());

        for definition in relationship_defs {
            let mut attributes = Vec::new();
            for attribute in self
                .fetch(
                    "list_relationship_attributes",
                    store.list_relationship_attributes(&definition.id),
                )
                .await?
            {
                if attribute.relationship_type_id == definition.id {
                    attributes.push(attribute);
                } else {
                    diagnostics.push(IntegrityWarning::OrphanedRelationshipAttribute {
                        attribute_id: attribute.id,
                        relationship_type_id: definition.id.clone(),
                    });
                }
            }

            let mut endpoints = vec![&definition.source_entity_kind];
            if definition.target_entity_kind != definition.source_entity_kind {
                endpoints.push(&definition.target_entity_kind);
            }
            for kind in endpoints {
                if !known_kinds.contains(kind) {
                    diagnostics.push(IntegrityWarning::UnknownRelationshipEndpoint {
                        relationship_type_id: definition.id.clone(),
                        entity_kind: kind.clone(),
                    });
                }
            }

            relationship_types.push(CompiledRelationshipType {
                definition,
                attributes,
            });
        }

        // Pass-through definitions
        let view_templates = self
            .fetch("list_view_templates", store.list_view_templates(&version.id))
            .await?;
        let mocs = self
            .fetch("list_mocs", store.list_mocs(&version.id))
            .await?;

        let extraction_profile = match self
            .fetch("get_extraction_profile", store.get_extraction_profile(&version.id))
            .await?
        {
            Some(profile) => {
                let label_mappings = self
                    .fetch("list_label_mappings", store.list_label_mappings(&profile.id))
                    .await?;
                let ignore_list = self
                    .fetch("list_ignore_entries", store.list_ignore_entries(&profile.id))
                    .await?;
                Some(CompiledExtractionProfile {
                    profile,
                    label_mappings,
                    ignore_list,
                })
            }
            None => None,
        };

        for warning in diagnostics.iter().filter(|w| {
            matches!(
                w,
                IntegrityWarning::OrphanedRelationshipAttribute { .. }
                    | IntegrityWarning::UnknownRelationshipEndpoint { .. }
            )
        }) {
            warn!(
                version_id = %version.id,
                subject_id = %warning.subject_id(),
                "Relationship degraded: {}", warning
            );
        }

        let mut compiled = CompiledBlueprint {
            meta,
            version,
            entity_types,
            relationship_types,
            view_templates,
            mocs,
            extraction_profile,
            fingerprint: String::new(),
            diagnostics,
        };
        compiled.rebuild_navigation();
        compiled.fingerprint = compiled.compute_fingerprint()?;

        info!(
            blueprint_id = %compiled.meta.id,
            version_id = %compiled.version.id,
            entity_types = compiled.entity_types.len(),
            relationship_types = compiled.relationship_types.len(),
            warnings = compiled.diagnostics.len(),
            fingerprint = %compiled.fingerprint,
            "Blueprint compiled"
        );

        Ok(compiled)
    }
}

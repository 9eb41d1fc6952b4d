//! Blueprint service
//!
//! Front door for callers: composes the version manager and compiler over
//! one definition store and caches compiled artifacts of published versions.
//! Drafts are recompiled on every request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::CompilerConfig;
use crate::error::{Error, Result};

use super::bundle::{DefinitionBundle, ImportSummary};
use super::compiled::CompiledBlueprint;
use super::compiler::BlueprintCompiler;
use super::event::BlueprintEvent;
use super::meta::{BlueprintMeta, BlueprintVersion, VersionStatus};
use super::repository::DefinitionStore;
use super::version::VersionManager;

/// High-level blueprint operations
pub struct BlueprintService<S: DefinitionStore> {
    store: Arc<S>,
    versions: VersionManager<S>,
    compiler: BlueprintCompiler<S>,
    /// Compiled published versions keyed by version id
    cache: RwLock<HashMap<String, Arc<CompiledBlueprint>>>,
    cache_published: bool,
}

impl<S: DefinitionStore> BlueprintService<S> {
    /// Create a service with default compiler settings
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, &CompilerConfig::default())
    }

    /// Create a service using the `[compiler]` configuration section
    pub fn with_config(store: Arc<S>, config: &CompilerConfig) -> Self {
        let compiler = BlueprintCompiler::new(store.clone())
            .with_max_depth(config.max_inheritance_depth)
            .with_store_timeout(Duration::from_secs(config.store_timeout_secs));

        Self {
            versions: VersionManager::new(store.clone()),
            compiler,
            store,
            cache: RwLock::new(HashMap::new()),
            cache_published: config.cache_published,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn versions(&self) -> &VersionManager<S> {
        &self.versions
    }

    // ========== Blueprints ==========

    /// Create and persist a new blueprint
    pub async fn create_blueprint(
        &self,
        name: &str,
        description: Option<&str>,
        tags: Vec<String>,
        is_system: bool,
    ) -> Result<BlueprintMeta> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Blueprint name cannot be empty".into()));
        }

        let mut meta = BlueprintMeta::new(name).with_tags(tags);
        if let Some(description) = description {
            meta = meta.with_description(description);
        }
        if is_system {
            meta = meta.system();
        }
        self.store.save_blueprint_meta(&meta).await?;

        info!(blueprint_id = %meta.id, name = %meta.name, "Blueprint created");
        self.versions
            .record_event(BlueprintEvent::BlueprintCreated {
                blueprint_id: meta.id.clone(),
                name: meta.name.clone(),
                timestamp: Utc::now(),
            })
            .await;

        Ok(meta)
    }

    pub async fn get_blueprint(&self, blueprint_id: &str) -> Result<BlueprintMeta> {
        self.store
            .get_blueprint_meta(blueprint_id)
            .await?
            .ok_or_else(|| Error::BlueprintNotFound(blueprint_id.to_string()))
    }

    pub async fn list_blueprints(&self) -> Result<Vec<BlueprintMeta>> {
        self.store.list_blueprints().await
    }

    // ========== Versions ==========

    /// List a blueprint's versions, oldest first
    pub async fn list_versions(&self, blueprint_id: &str) -> Result<Vec<BlueprintVersion>> {
        self.get_blueprint(blueprint_id).await?;
        self.store.list_versions(blueprint_id).await
    }

    pub async fn create_draft(&self, blueprint_id: &str) -> Result<BlueprintVersion> {
        self.versions.create_draft(blueprint_id).await
    }

    pub async fn fork_draft(&self, source_version_id: &str) -> Result<BlueprintVersion> {
        self.versions.fork_draft(source_version_id).await
    }

    pub async fn publish(&self, version_id: &str) -> Result<BlueprintVersion> {
        let version = self.versions.publish(version_id).await?;
        self.invalidate(version_id).await;
        Ok(version)
    }

    pub async fn archive(&self, version_id: &str) -> Result<BlueprintVersion> {
        let version = self.versions.archive(version_id).await?;
        self.invalidate(version_id).await;
        Ok(version)
    }

    pub async fn deprecate(&self, version_id: &str) -> Result<BlueprintVersion> {
        let version = self.versions.deprecate(version_id).await?;
        self.invalidate(version_id).await;
        Ok(version)
    }

    /// Write a bundle's definitions into a draft version
    ///
    /// All or nothing: a failing definition leaves the draft as it was.
    pub async fn import_bundle(
        &self,
        version_id: &str,
        bundle: &DefinitionBundle,
    ) -> Result<ImportSummary> {
        let version = self
            .store
            .get_version(version_id)
            .await?
            .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))?;
        version.ensure_editable()?;

        let definitions = bundle.resolve(&version.id)?;
        self.store.save_definitions(&definitions).await?;

        let summary = ImportSummary::of(&definitions);
        info!(
            version_id = %version.id,
            entity_types = summary.entity_types,
            fields = summary.fields,
            relationship_types = summary.relationship_types,
            "Bundle imported"
        );
        Ok(summary)
    }

    // ========== Compilation ==========

    /// Compile the version picked for `blueprint_id`
    ///
    /// See [`VersionManager::resolve_version_for_compile`] for how the
    /// version is chosen.
    pub async fn compile(
        &self,
        blueprint_id: &str,
        explicit_version_id: Option<&str>,
    ) -> Result<Arc<CompiledBlueprint>> {
        let version = self
            .versions
            .resolve_version_for_compile(blueprint_id, explicit_version_id)
            .await?;
        self.compile_resolved(&version).await
    }

    /// Compile a specific version
    pub async fn compile_version(&self, version_id: &str) -> Result<Arc<CompiledBlueprint>> {
        let version = self
            .store
            .get_version(version_id)
            .await?
            .ok_or_else(|| Error::VersionNotFound(version_id.to_string()))?;
        self.compile_resolved(&version).await
    }

    async fn compile_resolved(&self, version: &BlueprintVersion) -> Result<Arc<CompiledBlueprint>> {
        let cacheable = self.cache_published && version.status == VersionStatus::Published;

        if cacheable {
            if let Some(hit) = self.cache.read().await.get(&version.id) {
                debug!(version_id = %version.id, "Compiled blueprint cache hit");
                return Ok(hit.clone());
            }
        }

        let compiled = Arc::new(self.compiler.compile(&version.id).await?);
        self.versions
            .record_event(BlueprintEvent::VersionCompiled {
                version_id: version.id.clone(),
                fingerprint: compiled.fingerprint.clone(),
                warning_count: compiled.diagnostics.len(),
                timestamp: Utc::now(),
            })
            .await;

        // Only cache what was still published when read.
        if cacheable && compiled.version.status == VersionStatus::Published {
            self.cache
                .write()
                .await
                .insert(version.id.clone(), compiled.clone());
        }

        Ok(compiled)
    }

    /// Drop a cached artifact
    pub async fn invalidate(&self, version_id: &str) {
        if self.cache.write().await.remove(version_id).is_some() {
            debug!(version_id = %version_id, "Compiled blueprint evicted");
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    /// Number of cached artifacts
    pub async fn cached(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn events(&self) -> Vec<BlueprintEvent> {
        self.versions.events().await
    }
}

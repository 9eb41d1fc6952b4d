//! Compiled blueprint artifact
//!
//! The flattened, read-only snapshot of one blueprint version. Entity types
//! live in a flat arena (`CompiledBlueprint::entity_types`); parent/child
//! navigation is by index and is never serialized, so `parent_type_id`
//! stays the single source of truth for inheritance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

use super::definitions::{
    EntityKind, EntityTypeDef, ExtractionProfile, FieldDef, IgnoreEntry, LabelMapping, MocDef,
    RelationshipAttributeDef, RelationshipTypeDef, ViewTemplateDef,
};
use super::meta::{BlueprintMeta, BlueprintVersion};

/// An entity type with its inheritance-resolved field list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledEntityType {
    #[serde(flatten)]
    pub definition: EntityTypeDef,
    /// Effective fields, most-derived definition per name, sorted by
    /// `display_order` then `field_name`
    pub fields: Vec<FieldDef>,
    /// Ancestor ids whose fields were merged, nearest first
    pub lineage: Vec<String>,
    /// Arena index of the resolved parent
    #[serde(skip)]
    pub parent: Option<usize>,
    /// Arena indices of direct children
    #[serde(skip)]
    pub children: Vec<usize>,
}

impl CompiledEntityType {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn kind(&self) -> &EntityKind {
        &self.definition.entity_kind
    }

    /// Look up an effective field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.field_name == name)
    }

    /// Whether the effective field `name` comes from an ancestor
    pub fn is_inherited(&self, name: &str) -> bool {
        self.field(name)
            .is_some_and(|f| f.entity_type_id != self.definition.id)
    }

    /// Fields declared on this type itself
    pub fn own_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|f| f.entity_type_id == self.definition.id)
    }
}

/// A relationship type with its attributes attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledRelationshipType {
    #[serde(flatten)]
    pub definition: RelationshipTypeDef,
    pub attributes: Vec<RelationshipAttributeDef>,
}

/// Extraction profile with its label mappings and ignore list nested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledExtractionProfile {
    #[serde(flatten)]
    pub profile: ExtractionProfile,
    pub label_mappings: Vec<LabelMapping>,
    pub ignore_list: Vec<IgnoreEntry>,
}

/// Non-fatal data anomaly found while compiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// `parent_type_id` points at nothing in this version
    DanglingParent {
        entity_type_id: String,
        parent_type_id: String,
    },
    /// Ancestry longer than the depth bound; the rest was not inherited
    InheritanceDepthExceeded {
        entity_type_id: String,
        max_depth: usize,
    },
    /// Parent chain loops back on itself
    InheritanceCycle {
        entity_type_id: String,
        cycle: Vec<String>,
    },
    /// Relationship references an entity kind no type in the version has
    UnknownRelationshipEndpoint {
        relationship_type_id: String,
        entity_kind: EntityKind,
    },
    /// Attribute returned for a relationship type it does not belong to
    OrphanedRelationshipAttribute {
        attribute_id: String,
        relationship_type_id: String,
    },
}

impl IntegrityWarning {
    /// Id of the definition the warning is about
    pub fn subject_id(&self) -> &str {
        match self {
            Self::DanglingParent { entity_type_id, .. }
            | Self::InheritanceDepthExceeded { entity_type_id, .. }
            | Self::InheritanceCycle { entity_type_id, .. } => entity_type_id,
            Self::UnknownRelationshipEndpoint {
                relationship_type_id,
                ..
            } => relationship_type_id,
            Self::OrphanedRelationshipAttribute { attribute_id, .. } => attribute_id,
        }
    }
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingParent {
                entity_type_id,
                parent_type_id,
            } => write!(
                f,
                "entity type {} references missing parent {}; treated as root",
                entity_type_id, parent_type_id
            ),
            Self::InheritanceDepthExceeded {
                entity_type_id,
                max_depth,
            } => write!(
                f,
                "entity type {} has more than {} ancestors; deeper fields not inherited",
                entity_type_id, max_depth
            ),
            Self::InheritanceCycle {
                entity_type_id,
                cycle,
            } => write!(
                f,
                "entity type {} is part of an inheritance cycle ({})",
                entity_type_id,
                cycle.join(" -> ")
            ),
            Self::UnknownRelationshipEndpoint {
                relationship_type_id,
                entity_kind,
            } => write!(
                f,
                "relationship type {} references unknown entity kind {}",
                relationship_type_id, entity_kind
            ),
            Self::OrphanedRelationshipAttribute {
                attribute_id,
                relationship_type_id,
            } => write!(
                f,
                "attribute {} does not belong to relationship type {}; dropped",
                attribute_id, relationship_type_id
            ),
        }
    }
}

/// Fully resolved blueprint for one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledBlueprint {
    pub meta: BlueprintMeta,
    pub version: BlueprintVersion,
    pub entity_types: Vec<CompiledEntityType>,
    pub relationship_types: Vec<CompiledRelationshipType>,
    pub view_templates: Vec<ViewTemplateDef>,
    pub mocs: Vec<MocDef>,
    pub extraction_profile: Option<CompiledExtractionProfile>,
    /// Hex SHA-256 over the content above
    pub fingerprint: String,
    /// Not part of the fingerprint
    pub diagnostics: Vec<IntegrityWarning>,
}

/// Borrowed view of everything the fingerprint covers
#[derive(Serialize)]
struct FingerprintContent<'a> {
    meta: &'a BlueprintMeta,
    version: &'a BlueprintVersion,
    entity_types: &'a [CompiledEntityType],
    relationship_types: &'a [CompiledRelationshipType],
    view_templates: &'a [ViewTemplateDef],
    mocs: &'a [MocDef],
    extraction_profile: &'a Option<CompiledExtractionProfile>,
}

impl CompiledBlueprint {
    /// Compute the content fingerprint
    ///
    /// serde_json emits struct fields in declaration order and JSON objects
    /// sorted by key, so equal content always hashes to the same digest.
    pub fn compute_fingerprint(&self) -> Result<String> {
        let content = FingerprintContent {
            meta: &self.meta,
            version: &self.version,
            entity_types: &self.entity_types,
            relationship_types: &self.relationship_types,
            view_templates: &self.view_templates,
            mocs: &self.mocs,
            extraction_profile: &self.extraction_profile,
        };
        let bytes = serde_json::to_vec(&content)?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Whether the stored fingerprint still matches the content
    pub fn verify_fingerprint(&self) -> Result<bool> {
        Ok(self.compute_fingerprint()? == self.fingerprint)
    }

    /// Rebuild the parent/child arena indices from `parent_type_id`
    ///
    /// Needed after deserializing, since the indices are not serialized.
    pub fn rebuild_navigation(&mut self) {
        let index: HashMap<String, usize> = self
            .entity_types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.definition.id.clone(), i))
            .collect();

        for entity_type in &mut self.entity_types {
            entity_type.parent = None;
            entity_type.children.clear();
        }

        for child in 0..self.entity_types.len() {
            let parent = self.entity_types[child]
                .definition
                .parent_type_id
                .as_ref()
                .and_then(|pid| index.get(pid).copied())
                .filter(|&p| p != child);
            if let Some(parent) = parent {
                self.entity_types[child].parent = Some(parent);
                self.entity_types[parent].children.push(child);
            }
        }
    }

    /// Find a compiled entity type by id
    pub fn entity_type(&self, id: &str) -> Option<&CompiledEntityType> {
        self.entity_types.iter().find(|t| t.definition.id == id)
    }

    /// First entity type with the given kind
    pub fn entity_type_by_kind(&self, kind: &EntityKind) -> Option<&CompiledEntityType> {
        self.entity_types
            .iter()
            .find(|t| &t.definition.entity_kind == kind)
    }

    /// Parent of the entity type at `index`
    pub fn parent_of(&self, index: usize) -> Option<&CompiledEntityType> {
        self.entity_types
            .get(index)
            .and_then(|t| t.parent)
            .and_then(|p| self.entity_types.get(p))
    }

    /// Direct children of the entity type at `index`
    pub fn children_of(&self, index: usize) -> impl Iterator<Item = &CompiledEntityType> {
        self.entity_types
            .get(index)
            .map(|t| t.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|&c| self.entity_types.get(c))
    }

    /// Entity types that can be instantiated
    pub fn concrete_entity_types(&self) -> impl Iterator<Item = &CompiledEntityType> {
        self.entity_types.iter().filter(|t| !t.definition.is_abstract)
    }

    /// Relationship types with `kind` as source or target
    pub fn relationship_types_for_kind<'a>(
        &'a self,
        kind: &'a EntityKind,
    ) -> impl Iterator<Item = &'a CompiledRelationshipType> + 'a {
        self.relationship_types.iter().filter(move |r| {
            &r.definition.source_entity_kind == kind || &r.definition.target_entity_kind == kind
        })
    }
}

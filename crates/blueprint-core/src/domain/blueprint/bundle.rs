//! Definition bundles
//!
//! A bundle is a JSON document describing a set of definitions to write into
//! a draft version in one go. Bundles carry no ids: entity types name their
//! parent by `entity_kind`, and fields, attributes, mappings and ignore
//! entries are nested under their owner.
//!
//! ```json
//! {
//!   "entity_types": [
//!     { "entity_kind": "CHARACTER", "is_abstract": true,
//!       "fields": [{ "name": "name", "data_type": "text", "required": true }] },
//!     { "entity_kind": "HERO", "parent": "CHARACTER",
//!       "fields": [{ "name": "quest", "data_type": "long_text" }] }
//!   ],
//!   "relationship_types": [
//!     { "name": "ally_of", "source": "HERO", "target": "CHARACTER",
//!       "attributes": [{ "name": "since", "data_type": "date" }] }
//!   ]
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::definitions::{
    Cardinality, EntityKind, EntityTypeDef, ExtractionProfile, FieldDataType, FieldDef,
    IgnoreEntry, LabelMapping, MocDef, RelationshipAttributeDef, RelationshipDirection,
    RelationshipTypeDef, ViewTemplateDef,
};
use super::repository::DefinitionSet;

/// Top-level bundle document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionBundle {
    #[serde(default)]
    pub entity_types: Vec<BundleEntityType>,
    #[serde(default)]
    pub relationship_types: Vec<BundleRelationshipType>,
    #[serde(default)]
    pub view_templates: Vec<BundleViewTemplate>,
    #[serde(default)]
    pub mocs: Vec<BundleMoc>,
    #[serde(default)]
    pub extraction_profile: Option<BundleExtractionProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleEntityType {
    pub entity_kind: EntityKind,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Kind of another entity type in the same bundle
    #[serde(default)]
    pub parent: Option<EntityKind>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub fields: Vec<BundleField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleField {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub data_type: FieldDataType,
    #[serde(default)]
    pub required: bool,
    /// Defaults to the field's position in the list
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub validation: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleRelationshipType {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    pub source: EntityKind,
    pub target: EntityKind,
    #[serde(default = "default_direction")]
    pub direction: RelationshipDirection,
    #[serde(default = "default_cardinality")]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub reverse_label: Option<String>,
    #[serde(default)]
    pub attributes: Vec<BundleAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleAttribute {
    pub name: String,
    pub data_type: FieldDataType,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleViewTemplate {
    pub name: String,
    #[serde(default)]
    pub entity_kind: Option<EntityKind>,
    #[serde(default = "empty_config")]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleMoc {
    pub name: String,
    #[serde(default)]
    pub entity_kinds: Vec<EntityKind>,
    #[serde(default = "empty_config")]
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleExtractionProfile {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub label_mappings: Vec<BundleLabelMapping>,
    #[serde(default)]
    pub ignore: Vec<BundleIgnoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleLabelMapping {
    pub ner_label: String,
    pub entity_kind: EntityKind,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleIgnoreEntry {
    pub term: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

fn default_direction() -> RelationshipDirection {
    RelationshipDirection::Directed
}

fn default_cardinality() -> Cardinality {
    Cardinality::ManyToMany
}

fn default_enabled() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.5
}

fn empty_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Counts of what an import wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub entity_types: usize,
    pub fields: usize,
    pub relationship_types: usize,
    pub attributes: usize,
    pub view_templates: usize,
    pub mocs: usize,
    pub extraction_profile: bool,
    pub label_mappings: usize,
    pub ignore_entries: usize,
}

impl DefinitionBundle {
    /// Parse a bundle from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Assign ids for `version_id` and link parents by kind
    ///
    /// Fails with `InvalidInput` when two entity types share a kind or a
    /// parent kind names no entity type in the bundle.
    pub fn resolve(&self, version_id: &str) -> Result<DefinitionSet> {
        let mut resolved = DefinitionSet::default();

        let mut ids_by_kind: HashMap<&EntityKind, String> = HashMap::new();
        for bundle_type in &self.entity_types {
            let mut definition = EntityTypeDef::new(version_id, bundle_type.entity_kind.clone());
            if let Some(name) = &bundle_type.display_name {
                definition = definition.with_display_name(name);
            }
            if let Some(description) = &bundle_type.description {
                definition = definition.with_description(description);
            }
            if bundle_type.is_abstract {
                definition = definition.abstract_type();
            }

            if ids_by_kind
                .insert(&bundle_type.entity_kind, definition.id.clone())
                .is_some()
            {
                return Err(Error::InvalidInput(format!(
                    "Entity kind {} appears more than once in the bundle",
                    bundle_type.entity_kind
                )));
            }

            for (position, field) in bundle_type.fields.iter().enumerate() {
                let mut def = FieldDef::new(&definition.id, &field.name, field.data_type.clone())
                    .with_order(field.order.unwrap_or(position as i64));
                if let Some(label) = &field.label {
                    def = def.with_label(label);
                }
                if field.required {
                    def = def.required();
                }
                if let Some(value) = &field.default_value {
                    def = def.with_default(value);
                }
                if let Some(validation) = &field.validation {
                    def = def.with_validation(validation.clone());
                }
                resolved.fields.push(def);
            }

            resolved.entity_types.push(definition);
        }

        for (definition, bundle_type) in resolved.entity_types.iter_mut().zip(&self.entity_types) {
            if let Some(parent_kind) = &bundle_type.parent {
                let parent_id = ids_by_kind.get(parent_kind).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "Entity type {} names unknown parent kind {}",
                        bundle_type.entity_kind, parent_kind
                    ))
                })?;
                definition.parent_type_id = Some(parent_id.clone());
            }
        }

        for bundle_rel in &self.relationship_types {
            let mut definition = RelationshipTypeDef::new(
                version_id,
                &bundle_rel.name,
                bundle_rel.source.clone(),
                bundle_rel.target.clone(),
            )
            .with_direction(bundle_rel.direction)
            .with_cardinality(bundle_rel.cardinality);
            if let Some(label) = &bundle_rel.label {
                definition.display_label = label.clone();
            }
            if let Some(reverse) = &bundle_rel.reverse_label {
                definition = definition.with_reverse_label(reverse);
            }

            for attribute in &bundle_rel.attributes {
                let mut def = RelationshipAttributeDef::new(
                    &definition.id,
                    &attribute.name,
                    attribute.data_type.clone(),
                );
                if attribute.required {
                    def = def.required();
                }
                resolved.attributes.push(def);
            }
            resolved.relationship_types.push(definition);
        }

        for view in &self.view_templates {
            let mut def = ViewTemplateDef::new(version_id, &view.name, view.config.clone());
            if let Some(kind) = &view.entity_kind {
                def = def.for_kind(kind.clone());
            }
            resolved.view_templates.push(def);
        }

        for moc in &self.mocs {
            resolved.mocs.push(MocDef::new(
                version_id,
                &moc.name,
                moc.entity_kinds.clone(),
                moc.config.clone(),
            ));
        }

        if let Some(bundle_profile) = &self.extraction_profile {
            let mut profile = ExtractionProfile::new(version_id, &bundle_profile.name)
                .with_threshold(bundle_profile.confidence_threshold);
            profile.enabled = bundle_profile.enabled;

            for mapping in &bundle_profile.label_mappings {
                resolved.label_mappings.push(LabelMapping::new(
                    &profile.id,
                    &mapping.ner_label,
                    mapping.entity_kind.clone(),
                    mapping.priority,
                ));
            }
            for entry in &bundle_profile.ignore {
                let mut ignore = IgnoreEntry::new(&profile.id, &entry.term);
                ignore.case_sensitive = entry.case_sensitive;
                resolved.ignore_entries.push(ignore);
            }
            resolved.extraction_profile = Some(profile);
        }

        Ok(resolved)
    }
}

impl ImportSummary {
    /// Counts for a resolved bundle
    pub fn of(definitions: &DefinitionSet) -> Self {
        Self {
            entity_types: definitions.entity_types.len(),
            fields: definitions.fields.len(),
            relationship_types: definitions.relationship_types.len(),
            attributes: definitions.attributes.len(),
            view_templates: definitions.view_templates.len(),
            mocs: definitions.mocs.len(),
            extraction_profile: definitions.extraction_profile.is_some(),
            label_mappings: definitions.label_mappings.len(),
            ignore_entries: definitions.ignore_entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "entity_types": [
            {
                "entity_kind": "character",
                "is_abstract": true,
                "fields": [
                    { "name": "name", "data_type": "text", "required": true },
                    { "name": "age", "data_type": "number" }
                ]
            },
            {
                "entity_kind": "HERO",
                "parent": "CHARACTER",
                "fields": [{ "name": "age", "data_type": "string", "order": 5 }]
            }
        ],
        "relationship_types": [
            {
                "name": "ally_of",
                "source": "HERO",
                "target": "CHARACTER",
                "cardinality": "one_to_many",
                "attributes": [
                    { "name": "since", "data_type": "date" },
                    { "name": "trust", "data_type": "number", "required": true }
                ]
            }
        ],
        "mocs": [{ "name": "Cast", "entity_kinds": ["CHARACTER", "HERO"] }],
        "extraction_profile": {
            "name": "default",
            "label_mappings": [{ "ner_label": "PER", "entity_kind": "CHARACTER" }],
            "ignore": [{ "term": "Chapter" }]
        }
    }"#;

    #[test]
    fn test_resolve_links_parents_by_kind() {
        let bundle = DefinitionBundle::from_json(SAMPLE).unwrap();
        let resolved = bundle.resolve("v1").unwrap();

        assert_eq!(resolved.entity_types.len(), 2);
        let character = &resolved.entity_types[0];
        let hero = &resolved.entity_types[1];
        assert_eq!(character.entity_kind, EntityKind::Character);
        assert!(character.is_abstract);
        assert_eq!(hero.parent_type_id.as_deref(), Some(character.id.as_str()));
        assert!(resolved.entity_types.iter().all(|t| t.version_id == "v1"));
    }

    #[test]
    fn test_resolve_field_order_defaults_to_position() {
        let resolved = DefinitionBundle::from_json(SAMPLE)
            .unwrap()
            .resolve("v1")
            .unwrap();

        let orders: Vec<(&str, i64)> = resolved
            .fields
            .iter()
            .map(|f| (f.field_name.as_str(), f.display_order))
            .collect();
        assert_eq!(orders, vec![("name", 0), ("age", 1), ("age", 5)]);
        assert!(resolved.fields[0].is_required);
    }

    #[test]
    fn test_resolve_relationships_and_profile() {
        let resolved = DefinitionBundle::from_json(SAMPLE)
            .unwrap()
            .resolve("v1")
            .unwrap();

        let rel = &resolved.relationship_types[0];
        assert_eq!(rel.cardinality, Cardinality::OneToMany);
        assert_eq!(rel.direction, RelationshipDirection::Directed);
        assert_eq!(resolved.attributes.len(), 2);
        assert!(resolved
            .attributes
            .iter()
            .all(|a| a.relationship_type_id == rel.id));

        let profile = resolved.extraction_profile.as_ref().unwrap();
        assert!(profile.enabled);
        assert_eq!(resolved.label_mappings[0].profile_id, profile.id);
        assert_eq!(resolved.ignore_entries[0].term, "Chapter");
        assert_eq!(resolved.mocs[0].entity_kinds.len(), 2);
    }

    #[test]
    fn test_unknown_parent_kind_rejected() {
        let bundle = DefinitionBundle::from_json(
            r#"{"entity_types": [{"entity_kind": "HERO", "parent": "PERSON"}]}"#,
        )
        .unwrap();
        let err = bundle.resolve("v1").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let bundle = DefinitionBundle::from_json(
            r#"{"entity_types": [{"entity_kind": "ITEM"}, {"entity_kind": "item"}]}"#,
        )
        .unwrap();
        assert!(matches!(bundle.resolve("v1"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        assert!(DefinitionBundle::from_json(r#"{"entitytypes": []}"#).is_err());
    }

    #[test]
    fn test_unknown_nested_keys_rejected() {
        let misspelled = [
            r#"{"entity_types": [{"entity_kind": "ITEM", "abstract": true}]}"#,
            r#"{"entity_types": [{"entity_kind": "ITEM",
                "fields": [{"name": "n", "data_type": "text", "requird": true}]}]}"#,
            r#"{"relationship_types": [{"name": "r", "source": "A", "target": "B",
                "cardinalty": "one_to_one"}]}"#,
            r#"{"relationship_types": [{"name": "r", "source": "A", "target": "B",
                "attributes": [{"name": "since", "data_type": "date", "optional": true}]}]}"#,
            r#"{"view_templates": [{"name": "v", "kind": "ITEM"}]}"#,
            r#"{"mocs": [{"name": "m", "kinds": ["ITEM"]}]}"#,
            r#"{"extraction_profile": {"name": "p", "threshold": 0.9}}"#,
            r#"{"extraction_profile": {"name": "p",
                "label_mappings": [{"ner_label": "PER", "entity_kind": "CHARACTER", "prio": 1}]}}"#,
            r#"{"extraction_profile": {"name": "p", "ignore": [{"term": "x", "case": true}]}}"#,
        ];
        for json in misspelled {
            assert!(
                matches!(DefinitionBundle::from_json(json), Err(Error::Serialization(_))),
                "accepted: {}",
                json
            );
        }
    }

    #[test]
    fn test_import_summary_counts() {
        let resolved = DefinitionBundle::from_json(SAMPLE)
            .unwrap()
            .resolve("v1")
            .unwrap();
        let summary = ImportSummary::of(&resolved);
        assert_eq!(summary.entity_types, 2);
        assert_eq!(summary.fields, 3);
        assert_eq!(summary.attributes, 2);
        assert!(summary.extraction_profile);
        assert_eq!(summary.ignore_entries, 1);
    }
}

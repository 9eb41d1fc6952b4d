//! Schema definition types
//!
//! These are the stored building blocks of a blueprint version: entity types
//! and their fields, relationship types and their attributes, plus the
//! pass-through view templates, MOCs and extraction configuration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Category tag of an entity type (e.g. `CHARACTER`)
///
/// Known kinds are fixed; anything else is kept as `Custom` with the tag
/// normalized to uppercase so comparisons stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityKind {
    Character,
    Location,
    Organization,
    Item,
    Event,
    Concept,
    Custom(String),
}

impl EntityKind {
    /// Get the string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Character => "CHARACTER",
            Self::Location => "LOCATION",
            Self::Organization => "ORGANIZATION",
            Self::Item => "ITEM",
            Self::Event => "EVENT",
            Self::Concept => "CONCEPT",
            Self::Custom(tag) => tag,
        }
    }

    /// Parse from string, falling back to a custom kind
    pub fn parse(s: &str) -> Self {
        let tag = s.trim().to_uppercase();
        match tag.as_str() {
            "CHARACTER" => Self::Character,
            "LOCATION" => Self::Location,
            "ORGANIZATION" | "ORG" => Self::Organization,
            "ITEM" => Self::Item,
            "EVENT" => Self::Event,
            "CONCEPT" => Self::Concept,
            _ => Self::Custom(tag),
        }
    }

    /// Whether this is a user-defined kind
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl From<String> for EntityKind {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data type of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldDataType {
    Text,
    LongText,
    Number,
    Boolean,
    Date,
    Select,
    MultiSelect,
    Reference,
    Url,
    Custom(String),
}

impl FieldDataType {
    /// Get the string representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::LongText => "long_text",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Select => "select",
            Self::MultiSelect => "multi_select",
            Self::Reference => "reference",
            Self::Url => "url",
            Self::Custom(name) => name,
        }
    }

    /// Parse from string, falling back to a custom type
    pub fn parse(s: &str) -> Self {
        let name = s.trim().to_lowercase();
        match name.as_str() {
            "text" | "string" => Self::Text,
            "long_text" | "longtext" | "markdown" => Self::LongText,
            "number" | "integer" | "float" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "date" | "datetime" => Self::Date,
            "select" | "enum" => Self::Select,
            "multi_select" | "multiselect" | "tags" => Self::MultiSelect,
            "reference" | "ref" => Self::Reference,
            "url" | "link" => Self::Url,
            _ => Self::Custom(name),
        }
    }
}

impl From<String> for FieldDataType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<FieldDataType> for String {
    fn from(data_type: FieldDataType) -> Self {
        data_type.as_str().to_string()
    }
}

impl std::fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entity type defined in a blueprint version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeDef {
    pub id: String,
    pub version_id: String,
    pub entity_kind: EntityKind,
    pub display_name: String,
    pub description: Option<String>,
    /// Single-inheritance parent within the same version
    pub parent_type_id: Option<String>,
    pub is_abstract: bool,
}

impl EntityTypeDef {
    /// Create a new entity type for a version
    pub fn new(version_id: impl Into<String>, entity_kind: EntityKind) -> Self {
        let display_name = entity_kind.as_str().to_string();
        Self {
            id: new_id(),
            version_id: version_id.into(),
            entity_kind,
            display_name,
            description: None,
            parent_type_id: None,
            is_abstract: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the parent type id
    pub fn with_parent(mut self, parent_type_id: impl Into<String>) -> Self {
        self.parent_type_id = Some(parent_type_id.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

/// A field owned by one entity type
///
/// `field_name` is the merge key: a descendant field with the same name
/// replaces the inherited one entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: String,
    pub entity_type_id: String,
    pub field_name: String,
    pub display_label: String,
    pub data_type: FieldDataType,
    pub is_required: bool,
    pub display_order: i64,
    pub default_value: Option<String>,
    /// Free-form validation/options payload (select options, min/max, ...)
    pub validation: Option<serde_json::Value>,
}

impl FieldDef {
    /// Create a new field on an entity type
    pub fn new(
        entity_type_id: impl Into<String>,
        field_name: impl Into<String>,
        data_type: FieldDataType,
    ) -> Self {
        let field_name = field_name.into();
        Self {
            id: new_id(),
            entity_type_id: entity_type_id.into(),
            display_label: field_name.clone(),
            field_name,
            data_type,
            is_required: false,
            display_order: 0,
            default_value: None,
            validation: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.display_label = label.into();
        self
    }

    pub fn with_order(mut self, display_order: i64) -> Self {
        self.display_order = display_order;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_validation(mut self, validation: serde_json::Value) -> Self {
        self.validation = Some(validation);
        self
    }
}

/// Direction of a relationship type (descriptive only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipDirection {
    Directed,
    Undirected,
    Bidirectional,
}

impl RelationshipDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directed => "directed",
            Self::Undirected => "undirected",
            Self::Bidirectional => "bidirectional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "directed" => Some(Self::Directed),
            "undirected" => Some(Self::Undirected),
            "bidirectional" | "both" => Some(Self::Bidirectional),
            _ => None,
        }
    }
}

/// Cardinality of a relationship type (not enforced by the compiler)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "one_to_one" | "1:1" => Some(Self::OneToOne),
            "one_to_many" | "1:n" => Some(Self::OneToMany),
            "many_to_one" | "n:1" => Some(Self::ManyToOne),
            "many_to_many" | "n:n" => Some(Self::ManyToMany),
            _ => None,
        }
    }
}

/// A typed relationship between two entity kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipTypeDef {
    pub id: String,
    pub version_id: String,
    pub relationship_name: String,
    pub display_label: String,
    pub source_entity_kind: EntityKind,
    pub target_entity_kind: EntityKind,
    pub direction: RelationshipDirection,
    pub cardinality: Cardinality,
    /// Label shown when traversing target -> source
    pub reverse_label: Option<String>,
}

impl RelationshipTypeDef {
    pub fn new(
        version_id: impl Into<String>,
        relationship_name: impl Into<String>,
        source_entity_kind: EntityKind,
        target_entity_kind: EntityKind,
    ) -> Self {
        let relationship_name = relationship_name.into();
        Self {
            id: new_id(),
            version_id: version_id.into(),
            display_label: relationship_name.clone(),
            relationship_name,
            source_entity_kind,
            target_entity_kind,
            direction: RelationshipDirection::Directed,
            cardinality: Cardinality::ManyToMany,
            reverse_label: None,
        }
    }

    pub fn with_direction(mut self, direction: RelationshipDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn with_reverse_label(mut self, label: impl Into<String>) -> Self {
        self.reverse_label = Some(label.into());
        self
    }
}

/// An attribute carried by every edge of a relationship type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipAttributeDef {
    pub id: String,
    pub relationship_type_id: String,
    pub attribute_name: String,
    pub data_type: FieldDataType,
    pub is_required: bool,
}

impl RelationshipAttributeDef {
    pub fn new(
        relationship_type_id: impl Into<String>,
        attribute_name: impl Into<String>,
        data_type: FieldDataType,
    ) -> Self {
        Self {
            id: new_id(),
            relationship_type_id: relationship_type_id.into(),
            attribute_name: attribute_name.into(),
            data_type,
            is_required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}

/// View template (opaque layout configuration)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewTemplateDef {
    pub id: String,
    pub version_id: String,
    pub name: String,
    pub entity_kind: Option<EntityKind>,
    pub config: serde_json::Value,
}

impl ViewTemplateDef {
    pub fn new(
        version_id: impl Into<String>,
        name: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            id: new_id(),
            version_id: version_id.into(),
            name: name.into(),
            entity_kind: None,
            config,
        }
    }

    pub fn for_kind(mut self, kind: EntityKind) -> Self {
        self.entity_kind = Some(kind);
        self
    }
}

/// Map of Content: a saved grouping/filter/sort over entities of given kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MocDef {
    pub id: String,
    pub version_id: String,
    pub name: String,
    pub entity_kinds: Vec<EntityKind>,
    pub config: serde_json::Value,
}

impl MocDef {
    pub fn new(
        version_id: impl Into<String>,
        name: impl Into<String>,
        entity_kinds: Vec<EntityKind>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            id: new_id(),
            version_id: version_id.into(),
            name: name.into(),
            entity_kinds,
            config,
        }
    }
}

/// NER extraction profile attached to a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionProfile {
    pub id: String,
    pub version_id: String,
    pub name: String,
    pub enabled: bool,
    pub confidence_threshold: f64,
}

impl ExtractionProfile {
    pub fn new(version_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            version_id: version_id.into(),
            name: name.into(),
            enabled: true,
            confidence_threshold: 0.5,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Maps an NER label onto an entity kind; lower priority wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub id: String,
    pub profile_id: String,
    pub ner_label: String,
    pub entity_kind: EntityKind,
    pub priority: i64,
}

impl LabelMapping {
    pub fn new(
        profile_id: impl Into<String>,
        ner_label: impl Into<String>,
        entity_kind: EntityKind,
        priority: i64,
    ) -> Self {
        Self {
            id: new_id(),
            profile_id: profile_id.into(),
            ner_label: ner_label.into(),
            entity_kind,
            priority,
        }
    }
}

/// Term the extractor must never emit as an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoreEntry {
    pub id: String,
    pub profile_id: String,
    pub term: String,
    pub case_sensitive: bool,
}

impl IgnoreEntry {
    pub fn new(profile_id: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            profile_id: profile_id.into(),
            term: term.into(),
            case_sensitive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!(EntityKind::parse("character"), EntityKind::Character);
        assert_eq!(EntityKind::parse(" Org "), EntityKind::Organization);
        assert_eq!(
            EntityKind::parse("spaceship"),
            EntityKind::Custom("SPACESHIP".into())
        );
        assert!(EntityKind::parse("spaceship").is_custom());
    }

    #[test]
    fn test_entity_kind_serde_as_string() {
        let json = serde_json::to_string(&EntityKind::Custom("FACTION".into())).unwrap();
        assert_eq!(json, "\"FACTION\"");

        let kind: EntityKind = serde_json::from_str("\"location\"").unwrap();
        assert_eq!(kind, EntityKind::Location);
    }

    #[test]
    fn test_field_data_type_aliases() {
        assert_eq!(FieldDataType::parse("string"), FieldDataType::Text);
        assert_eq!(FieldDataType::parse("INTEGER"), FieldDataType::Number);
        assert_eq!(
            FieldDataType::parse("color"),
            FieldDataType::Custom("color".into())
        );
        assert_eq!(FieldDataType::MultiSelect.as_str(), "multi_select");
    }

    #[test]
    fn test_entity_type_builder() {
        let parent = EntityTypeDef::new("v1", EntityKind::Character).abstract_type();
        let child = EntityTypeDef::new("v1", EntityKind::Custom("HERO".into()))
            .with_display_name("Hero")
            .with_parent(&parent.id);

        assert!(parent.is_abstract);
        assert_eq!(child.parent_type_id.as_deref(), Some(parent.id.as_str()));
        assert_eq!(child.display_name, "Hero");
        assert_ne!(parent.id, child.id);
    }

    #[test]
    fn test_field_defaults_label_to_name() {
        let field = FieldDef::new("t1", "age", FieldDataType::Number).with_order(3);
        assert_eq!(field.display_label, "age");
        assert_eq!(field.display_order, 3);
        assert!(!field.is_required);
    }

    #[test]
    fn test_relationship_enums_parse() {
        assert_eq!(
            RelationshipDirection::parse("both"),
            Some(RelationshipDirection::Bidirectional)
        );
        assert_eq!(Cardinality::parse("1:n"), Some(Cardinality::OneToMany));
        assert_eq!(Cardinality::parse("lots"), None);
    }

    #[test]
    fn test_extraction_threshold_clamped() {
        let profile = ExtractionProfile::new("v1", "default").with_threshold(1.7);
        assert_eq!(profile.confidence_threshold, 1.0);
    }
}

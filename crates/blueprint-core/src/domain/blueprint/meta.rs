//! Blueprint metadata and version records

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A named, versioned schema definition for a knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintMeta {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    /// Shipped with the application rather than authored by a user
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlueprintMeta {
    /// Create a new blueprint
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            tags: BTreeSet::new(),
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add tags; duplicates collapse
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// Lifecycle status of a blueprint version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Published,
    Archived,
    Deprecated,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
            Self::Deprecated => "deprecated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            "deprecated" => Some(Self::Deprecated),
            _ => None,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// draft -> published -> {archived, deprecated}; deprecated -> archived.
    pub fn can_transition_to(&self, next: VersionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Published)
                | (Self::Published, Self::Archived)
                | (Self::Published, Self::Deprecated)
                | (Self::Deprecated, Self::Archived)
        )
    }

    /// Only drafts accept definition edits
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One numbered version of a blueprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintVersion {
    pub id: String,
    pub blueprint_id: String,
    /// Strictly increasing per blueprint, starting at 1
    pub version_number: i64,
    pub status: VersionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set once at draft -> published, never cleared
    pub published_at: Option<DateTime<Utc>>,
}

impl BlueprintVersion {
    /// Create a new draft version record
    pub fn draft(blueprint_id: impl Into<String>, version_number: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            blueprint_id: blueprint_id.into(),
            version_number,
            status: VersionStatus::Draft,
            notes: None,
            created_at: Utc::now(),
            published_at: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Move to `next`, stamping `published_at` on the draft -> published edge
    pub fn transition(&mut self, next: VersionStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if next == VersionStatus::Published && self.published_at.is_none() {
            self.published_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    /// Fail unless the version still accepts edits
    pub fn ensure_editable(&self) -> Result<()> {
        if self.status.is_editable() {
            Ok(())
        } else {
            Err(Error::VersionNotEditable {
                id: self.id.clone(),
                status: self.status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_tags_deduplicate() {
        let meta = BlueprintMeta::new("Fantasy World").with_tags(["rpg", "fantasy", "rpg"]);
        assert_eq!(meta.tags.len(), 2);
        assert!(!meta.is_system);
    }

    #[test]
    fn test_status_transitions() {
        use VersionStatus::*;
        assert!(Draft.can_transition_to(Published));
        assert!(Published.can_transition_to(Archived));
        assert!(Published.can_transition_to(Deprecated));
        assert!(Deprecated.can_transition_to(Archived));

        assert!(!Draft.can_transition_to(Archived));
        assert!(!Published.can_transition_to(Draft));
        assert!(!Archived.can_transition_to(Published));
        assert!(!Published.can_transition_to(Published));
    }

    #[test]
    fn test_publish_stamps_once() {
        let mut version = BlueprintVersion::draft("bp", 1);
        let first = Utc::now();
        version.transition(VersionStatus::Published, first).unwrap();
        assert_eq!(version.published_at, Some(first));

        let later = first + chrono::Duration::seconds(30);
        version.transition(VersionStatus::Deprecated, later).unwrap();
        version.transition(VersionStatus::Archived, later).unwrap();
        assert_eq!(version.published_at, Some(first));
        assert_eq!(version.status, VersionStatus::Archived);
    }

    #[test]
    fn test_invalid_transition_error() {
        let mut version = BlueprintVersion::draft("bp", 1);
        let err = version
            .transition(VersionStatus::Archived, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(version.status, VersionStatus::Draft);
    }

    #[test]
    fn test_ensure_editable() {
        let mut version = BlueprintVersion::draft("bp", 1);
        assert!(version.ensure_editable().is_ok());
        version
            .transition(VersionStatus::Published, Utc::now())
            .unwrap();
        assert!(matches!(
            version.ensure_editable(),
            Err(Error::VersionNotEditable { .. })
        ));
    }
}

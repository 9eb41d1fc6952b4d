//! Domain events for blueprint versions
//!
//! Events are recorded by the version manager and compiler for audit trails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::meta::VersionStatus;

/// Events that can occur in the blueprint lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BlueprintEvent {
    /// A blueprint was created
    BlueprintCreated {
        blueprint_id: String,
        name: String,
        timestamp: DateTime<Utc>,
    },
    /// A new draft version was created
    VersionCreated {
        blueprint_id: String,
        version_id: String,
        version_number: i64,
        forked_from: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// A version changed status
    VersionStatusChanged {
        version_id: String,
        from: VersionStatus,
        to: VersionStatus,
        timestamp: DateTime<Utc>,
    },
    /// A version was compiled
    VersionCompiled {
        version_id: String,
        fingerprint: String,
        warning_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl BlueprintEvent {
    pub fn version_created(
        blueprint_id: &str,
        version_id: &str,
        version_number: i64,
        forked_from: Option<&str>,
    ) -> Self {
        Self::VersionCreated {
            blueprint_id: blueprint_id.to_string(),
            version_id: version_id.to_string(),
            version_number,
            forked_from: forked_from.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    pub fn status_changed(version_id: &str, from: VersionStatus, to: VersionStatus) -> Self {
        Self::VersionStatusChanged {
            version_id: version_id.to_string(),
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::BlueprintCreated { timestamp, .. }
            | Self::VersionCreated { timestamp, .. }
            | Self::VersionStatusChanged { timestamp, .. }
            | Self::VersionCompiled { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name
    pub fn event_type_name(&self) -> &'static str {
        match self {
            Self::BlueprintCreated { .. } => "blueprint_created",
            Self::VersionCreated { .. } => "version_created",
            Self::VersionStatusChanged { .. } => "version_status_changed",
            Self::VersionCompiled { .. } => "version_compiled",
        }
    }
}

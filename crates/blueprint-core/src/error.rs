//! Error types for Blueprint

use thiserror::Error;

/// Result type alias using Blueprint's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Blueprint error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Lookup errors (E001-E099)
    #[error("Blueprint '{0}' not found. Run `blueprint blueprints list` to see all blueprints.")]
    BlueprintNotFound(String),

    #[error("Blueprint version '{0}' not found.")]
    VersionNotFound(String),

    #[error("Blueprint '{0}' has no versions. Create one with `blueprint versions create {0}`.")]
    NoVersions(String),

    // Store errors (E100-E199)
    #[error("Definition store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Definition store call '{operation}' timed out after {secs} seconds")]
    StoreTimeout { operation: &'static str, secs: u64 },

    // Version lifecycle errors (E200-E299)
    #[error("Version number {version_number} is already taken for blueprint '{blueprint_id}'")]
    VersionConflict {
        blueprint_id: String,
        version_number: i64,
    },

    #[error("Cannot move a version from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    #[error("Version '{id}' is {status} and can no longer be edited. Fork a new draft with `blueprint versions create --from {id}`.")]
    VersionNotEditable { id: String, status: String },

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::BlueprintNotFound(_) => "E001",
            Self::VersionNotFound(_) => "E002",
            Self::NoVersions(_) => "E003",
            Self::StoreUnavailable(_) => "E100",
            Self::StoreTimeout { .. } => "E101",
            Self::VersionConflict { .. } => "E200",
            Self::InvalidTransition { .. } => "E201",
            Self::VersionNotEditable { .. } => "E202",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Serialization(_) => "E801",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::BlueprintNotFound(_) => Some("blueprint blueprints list".to_string()),
            Self::VersionNotFound(_) | Self::NoVersions(_) => {
                Some("blueprint versions list <blueprint-id>".to_string())
            }
            Self::StoreTimeout { .. } => {
                Some("blueprint config set compiler.store_timeout_secs <secs>".to_string())
            }
            Self::VersionNotEditable { id, .. } => {
                Some(format!("blueprint versions create <blueprint-id> --from {}", id))
            }
            Self::ConfigError(_) => Some("blueprint config list".to_string()),
            _ => None,
        }
    }

    /// Whether this is a missing version/blueprint lookup
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BlueprintNotFound(_) | Self::VersionNotFound(_) | Self::NoVersions(_)
        )
    }

    /// Whether retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::StoreTimeout { .. } | Self::VersionConflict { .. }
        )
    }
}

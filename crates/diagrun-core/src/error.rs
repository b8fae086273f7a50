//! Error taxonomy for profile lifecycle and run orchestration.

use thiserror::Error;

use crate::validation::ValidationIssue;

/// Errors produced by the schema migration pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// No migrator produces the version the profile needs next.
    #[error("no migrator registered for schema version {version} (profile '{profile_id}')")]
    MissingMigrator { profile_id: String, version: u32 },

    /// Two migrators claim the same target version.
    #[error("a migrator targeting schema version {version} is already registered")]
    DuplicateMigrator { version: u32 },

    /// A migrator was handed a profile it cannot advance by exactly one step,
    /// or did not land on its own target.
    #[error("migrator for schema version {target} cannot apply to a profile at version {found}")]
    StepMismatch { target: u32, found: u32 },
}

/// Result alias for migration operations.
pub type MigrationResult<T> = std::result::Result<T, MigrationError>;

/// Errors produced while building a Test Unit registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("a test unit is already registered for type '{0}'")]
    Duplicate(String),

    #[error("test unit type tag must not be empty")]
    EmptyTypeTag,
}

/// Errors that stop a profile from being loaded. Nothing runs when one of
/// these is returned.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("profile parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("profile signature mismatch: expected {expected}, computed {actual}")]
    SignatureMismatch { expected: String, actual: String },

    #[error("profile schema version {found} is newer than supported version {current}")]
    UnsupportedVersion { found: u32, current: u32 },

    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("profile is invalid: {}", format_issues(issues))]
    Invalid { issues: Vec<ValidationIssue> },
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias for profile loading.
pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

/// Errors that abort a run without producing a report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The run's cancellation token fired.
    #[error("run cancelled")]
    Cancelled,

    /// A Test Unit raised instead of returning a result.
    #[error("test unit for '{test_id}' faulted: {source}")]
    UnitFault {
        test_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_migrator_names_version_and_profile() {
        let err = MigrationError::MissingMigrator {
            profile_id: "p-1".to_string(),
            version: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("version 2"));
        assert!(msg.contains("p-1"));
    }

    #[test]
    fn test_invalid_profile_lists_every_issue() {
        let err = ProfileError::Invalid {
            issues: vec![
                ValidationIssue::EmptyProfileName,
                ValidationIssue::MissingDependency {
                    test_id: "a".to_string(),
                    missing: "b".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("profile name must not be empty"));
        assert!(msg.contains("missing dependency 'b'"));
    }

    #[test]
    fn test_unit_fault_display() {
        let err = EngineError::UnitFault {
            test_id: "dns".to_string(),
            source: anyhow::anyhow!("resolver panicked"),
        };
        assert!(err.to_string().contains("dns"));
        assert!(err.to_string().contains("resolver panicked"));
        assert!(!err.is_cancelled());
        assert!(EngineError::Cancelled.is_cancelled());
    }
}

//! Profile loading: JSON → signature check → migration → validation.
//!
//! [`ValidatedProfile`] can only be obtained by passing every lifecycle
//! step, so the orchestration engine never sees an unmigrated or invalid
//! profile.

use std::ops::Deref;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ProfileError, ProfileResult};
use crate::migration::MigrationPipeline;
use crate::model::Profile;
use crate::signature::verify_signature;
use crate::validation::ProfileValidator;

/// A profile that is migrated to the pipeline's target and free of
/// validation issues.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedProfile(Profile);

impl ValidatedProfile {
    /// Migrate and validate with the default pipeline.
    pub fn new(profile: Profile) -> ProfileResult<Self> {
        Self::with_pipeline(profile, &MigrationPipeline::default())
    }

    /// Migrate with `pipeline`, then validate.
    pub fn with_pipeline(profile: Profile, pipeline: &MigrationPipeline) -> ProfileResult<Self> {
        if profile.schema_version > pipeline.target_version() {
            return Err(ProfileError::UnsupportedVersion {
                found: profile.schema_version,
                current: pipeline.target_version(),
            });
        }

        let migrated = pipeline.migrate(profile)?;
        let report = ProfileValidator::validate(&migrated);
        if !report.is_valid() {
            return Err(ProfileError::Invalid {
                issues: report.issues,
            });
        }
        Ok(Self(migrated))
    }

    pub fn profile(&self) -> &Profile {
        &self.0
    }

    pub fn into_inner(self) -> Profile {
        self.0
    }
}

impl Deref for ValidatedProfile {
    type Target = Profile;

    fn deref(&self) -> &Profile {
        &self.0
    }
}

/// Reads persisted profiles and drives them through the lifecycle.
#[derive(Default)]
pub struct ProfileLoader {
    pipeline: MigrationPipeline,
}

impl ProfileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipeline(pipeline: MigrationPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &MigrationPipeline {
        &self.pipeline
    }

    /// Parse JSON and verify the integrity signature, without migrating.
    pub fn parse(&self, json: &str) -> ProfileResult<Profile> {
        let profile: Profile = serde_json::from_str(json)?;
        verify_signature(&profile)?;
        debug!(
            profile_id = %profile.id,
            schema_version = profile.schema_version,
            tests = profile.tests.len(),
            "parsed profile"
        );
        Ok(profile)
    }

    /// Parse and migrate, skipping validation.
    pub fn migrate_str(&self, json: &str) -> ProfileResult<Profile> {
        let profile = self.parse(json)?;
        if profile.schema_version > self.pipeline.target_version() {
            return Err(ProfileError::UnsupportedVersion {
                found: profile.schema_version,
                current: self.pipeline.target_version(),
            });
        }
        Ok(self.pipeline.migrate(profile)?)
    }

    /// Full lifecycle from a JSON string.
    pub fn load_str(&self, json: &str) -> ProfileResult<ValidatedProfile> {
        let profile = self.parse(json)?;
        ValidatedProfile::with_pipeline(profile, &self.pipeline)
    }

    /// Full lifecycle from a file on disk.
    pub fn load_path(&self, path: impl AsRef<Path>) -> ProfileResult<ValidatedProfile> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let profile = self.load_str(&json)?;
        info!(
            path = %path.display(),
            profile_id = %profile.id,
            tests = profile.tests.len(),
            "loaded profile"
        );
        Ok(profile)
    }
}

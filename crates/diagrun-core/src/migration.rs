//! Schema migration pipeline for persisted profiles.
//!
//! Each [`Migrator`] advances a profile by exactly one schema version. The
//! [`MigrationPipeline`] looks up the migrator whose target is `current + 1`
//! and applies it until the profile reaches the pipeline's target.
//!
//! Steps are additive only: a migrator adds fields with safe defaults and
//! never removes or reinterprets existing ones. Re-running against a profile
//! already at (or past) a migrator's target is a no-op.
//!
//! Version history:
//! - v1: initial format
//! - v2: `runSettings.interTestDelayMs` (defaults to 0)
//! - v3: per-test `dependsOn` (defaults to `[]`)

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{MigrationError, MigrationResult};
use crate::model::Profile;
use crate::obs::emit_profile_migrated;

/// Schema version produced by the default pipeline.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// A single step of schema evolution.
pub trait Migrator: Send + Sync {
    /// Version this migrator produces.
    fn target_version(&self) -> u32;

    /// The additive transformation. Only called on a profile sitting at
    /// `target_version() - 1`; must not touch `schema_version`.
    fn apply(&self, profile: &mut Profile);

    /// True when the profile is older than this migrator's target.
    fn needs_migration(&self, profile: &Profile) -> bool {
        profile.schema_version < self.target_version()
    }

    /// Advance `profile` by one version.
    ///
    /// Returns the profile untouched when it does not need this step, and
    /// refuses profiles more than one version behind.
    fn migrate(&self, mut profile: Profile) -> MigrationResult<Profile> {
        if !self.needs_migration(&profile) {
            return Ok(profile);
        }
        let target = self.target_version();
        if profile.schema_version + 1 != target {
            return Err(MigrationError::StepMismatch {
                target,
                found: profile.schema_version,
            });
        }
        self.apply(&mut profile);
        profile.schema_version = target;
        Ok(profile)
    }
}

/// v1 → v2: introduce the inter-test pacing delay.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterTestDelayMigrator;

impl Migrator for InterTestDelayMigrator {
    fn target_version(&self) -> u32 {
        2
    }

    fn apply(&self, profile: &mut Profile) {
        profile.run_settings.inter_test_delay_ms.get_or_insert(0);
    }
}

/// v2 → v3: introduce per-test predecessor lists.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependsOnMigrator;

impl Migrator for DependsOnMigrator {
    fn target_version(&self) -> u32 {
        3
    }

    fn apply(&self, profile: &mut Profile) {
        for test in &mut profile.tests {
            test.depends_on.get_or_insert_with(Vec::new);
        }
    }
}

/// Ordered chain of single-step migrators keyed by target version.
pub struct MigrationPipeline {
    target: u32,
    migrators: BTreeMap<u32, Box<dyn Migrator>>,
}

impl MigrationPipeline {
    /// An empty pipeline that migrates towards `target`.
    pub fn new(target: u32) -> Self {
        Self {
            target,
            migrators: BTreeMap::new(),
        }
    }

    /// The pipeline for [`CURRENT_SCHEMA_VERSION`] with every built-in step.
    pub fn with_default_migrators() -> Self {
        let mut pipeline = Self::new(CURRENT_SCHEMA_VERSION);
        pipeline.migrators.insert(2, Box::new(InterTestDelayMigrator));
        pipeline.migrators.insert(3, Box::new(DependsOnMigrator));
        pipeline
    }

    /// Register a migrator. Each target version may be claimed once.
    pub fn register(&mut self, migrator: Box<dyn Migrator>) -> MigrationResult<()> {
        let version = migrator.target_version();
        if self.migrators.contains_key(&version) {
            return Err(MigrationError::DuplicateMigrator { version });
        }
        self.migrators.insert(version, migrator);
        Ok(())
    }

    pub fn target_version(&self) -> u32 {
        self.target
    }

    /// True iff the profile is older than the pipeline's target.
    pub fn needs_migration(&self, profile: &Profile) -> bool {
        profile.schema_version < self.target
    }

    /// Migrate `profile` up to the target version, one step at a time.
    ///
    /// A profile that needs no migration is returned as-is.
    pub fn migrate(&self, mut profile: Profile) -> MigrationResult<Profile> {
        while self.needs_migration(&profile) {
            let from = profile.schema_version;
            let next = from + 1;
            let migrator =
                self.migrators
                    .get(&next)
                    .ok_or_else(|| MigrationError::MissingMigrator {
                        profile_id: profile.id.clone(),
                        version: next,
                    })?;

            debug!(profile_id = %profile.id, from, to = next, "applying migrator");
            profile = migrator.migrate(profile)?;
            if profile.schema_version != next {
                return Err(MigrationError::StepMismatch {
                    target: next,
                    found: profile.schema_version,
                });
            }
            emit_profile_migrated(&profile.id, from, next);
        }
        Ok(profile)
    }
}

impl Default for MigrationPipeline {
    fn default() -> Self {
        Self::with_default_migrators()
    }
}

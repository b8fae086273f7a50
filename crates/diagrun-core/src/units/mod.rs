//! Built-in Test Units.

mod command;

use std::sync::Arc;

pub use command::{CommandUnit, COMMAND_TYPE};

use crate::error::RegistryError;
use crate::registry::TestUnitRegistry;

/// Registry holding every built-in unit.
pub fn default_registry() -> Result<TestUnitRegistry, RegistryError> {
    TestUnitRegistry::new().with_unit(COMMAND_TYPE, Arc::new(CommandUnit))
}

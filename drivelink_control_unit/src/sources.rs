//! Where joint limits come from.
//!
//! Bundles the machine description and the parameter store, and knows the
//! two ways limits are composed from them:
//!
//! - **baseline** (bring-up): `description.merge(global)`, tightening
//! - **controller layer** (prepare): `description.apply(global).apply(local)`,
//!   later layer wins; `local` is the controller's own namespace

use drivelink_common::consts::GLOBAL_NAMESPACE;
use drivelink_common::error::ConfigParseError;
use drivelink_common::limits::source::{
    read_from_config, read_from_description, ConfigStore, DescriptionSource,
};
use drivelink_common::limits::store::{MachineDescription, TomlConfigStore};
use drivelink_common::limits::Limits;

/// Description source and config store of one machine.
pub struct LimitSources {
    description: Box<dyn DescriptionSource + Send + Sync>,
    store: Box<dyn ConfigStore + Send + Sync>,
}

impl LimitSources {
    /// Combine a description source and a config store.
    pub fn new(
        description: Box<dyn DescriptionSource + Send + Sync>,
        store: Box<dyn ConfigStore + Send + Sync>,
    ) -> Self {
        Self { description, store }
    }

    /// No description, empty store: every joint is unlimited.
    pub fn empty() -> Self {
        Self::new(
            Box::new(MachineDescription::default()),
            Box::new(TomlConfigStore::default()),
        )
    }

    /// Description source.
    pub fn description(&self) -> &dyn DescriptionSource {
        self.description.as_ref()
    }

    /// Parameter store.
    pub fn store(&self) -> &dyn ConfigStore {
        self.store.as_ref()
    }

    /// Authoritative baseline of `joint`.
    ///
    /// # Errors
    ///
    /// `ConfigParseError` if the global limit entry of `joint` is malformed.
    pub fn baseline(&self, joint: &str) -> Result<Limits, ConfigParseError> {
        let desc = read_from_description(self.description(), joint);
        let global = read_from_config(self.store(), joint, GLOBAL_NAMESPACE, true)?;
        Ok(desc.merge(&global))
    }

    /// Limits `controller` asks for on `joint`.
    ///
    /// # Errors
    ///
    /// `ConfigParseError` if the global or the controller's entry is malformed.
    pub fn controller_layer(&self, joint: &str, controller: &str) -> Result<Limits, ConfigParseError> {
        let desc = read_from_description(self.description(), joint);
        let global = read_from_config(self.store(), joint, GLOBAL_NAMESPACE, true)?;
        let local = read_from_config(self.store(), joint, controller, true)?;
        Ok(desc.apply(&global).apply(&local))
    }
}

impl Default for LimitSources {
    fn default() -> Self {
        Self::empty()
    }
}

//! TOML-backed limit sources.
//!
//! - [`TomlConfigStore`] - parameter tree addressed by `/`-separated paths
//! - [`MachineDescription`] - per-joint bounds from a description file
//!
//! ```toml
//! # limits store
//! [joint_limits.elbow]
//! has_velocity_limits = true
//! max_velocity = 1.5
//!
//! [pick_controller.joint_limits.elbow]
//! has_velocity_limits = true
//! max_velocity = 0.5
//! ```
//!
//! ```toml
//! # machine description
//! [joints.elbow]
//! lower = -2.0
//! upper = 2.0
//! velocity = 3.0
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use toml::{Table, Value};

use super::source::{full_key, ConfigStore, DescriptionSource, JointDescription};
use crate::config::{ConfigError, ConfigLoader};
use crate::error::ConfigParseError;

// ─── Config Store ───────────────────────────────────────────────────

/// Parameter store over a TOML table.
#[derive(Debug, Clone, Default)]
pub struct TomlConfigStore {
    root: Table,
}

impl TomlConfigStore {
    /// Wrap a parsed table.
    pub fn new(root: Table) -> Self {
        Self { root }
    }

    /// Load a store file.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the file is missing or not valid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Table::load(path).map(Self::new)
    }

    /// Parse a store from a TOML document.
    ///
    /// # Errors
    ///
    /// `ConfigError::ParseError` for invalid TOML.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Table::load_str(content).map(Self::new)
    }

    fn lookup(&self, namespace: &str, key: &str) -> Option<&Value> {
        let path = full_key(namespace, key);
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut value = self.root.get(first)?;
        for segment in segments {
            value = value.as_table()?.get(segment)?;
        }
        Some(value)
    }
}

impl ConfigStore for TomlConfigStore {
    fn get_scalar(&self, namespace: &str, key: &str) -> Result<Option<f64>, ConfigParseError> {
        match self.lookup(namespace, key) {
            None => Ok(None),
            Some(Value::Float(f)) => Ok(Some(*f)),
            Some(Value::Integer(i)) => Ok(Some(*i as f64)),
            Some(_) => Err(ConfigParseError::NotNumeric {
                key: full_key(namespace, key),
            }),
        }
    }

    fn get_bool(&self, namespace: &str, key: &str) -> Result<Option<bool>, ConfigParseError> {
        match self.lookup(namespace, key) {
            None => Ok(None),
            Some(Value::Boolean(b)) => Ok(Some(*b)),
            Some(_) => Err(ConfigParseError::NotBoolean {
                key: full_key(namespace, key),
            }),
        }
    }
}

// ─── Machine Description ────────────────────────────────────────────

/// One joint entry of the description file.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct JointEntry {
    /// Lower position bound.
    #[serde(default)]
    pub lower: Option<f64>,
    /// Upper position bound.
    #[serde(default)]
    pub upper: Option<f64>,
    /// Velocity bound.
    #[serde(default)]
    pub velocity: Option<f64>,
    /// Effort bound.
    #[serde(default)]
    pub effort: Option<f64>,
    /// Continuous joints have no position bounds.
    #[serde(default)]
    pub continuous: bool,
}

/// Description file: joint name to bounds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MachineDescription {
    /// Joints by name.
    #[serde(default)]
    pub joints: BTreeMap<String, JointEntry>,
}

impl DescriptionSource for MachineDescription {
    fn joint_description(&self, joint: &str) -> Option<JointDescription> {
        let entry = self.joints.get(joint)?;
        let position = match (entry.continuous, entry.lower, entry.upper) {
            (false, Some(lower), Some(upper)) => Some((lower, upper)),
            _ => None,
        };
        Some(JointDescription {
            position,
            velocity: entry.velocity,
            effort: entry.effort,
        })
    }
}

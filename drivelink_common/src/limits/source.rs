//! Limit sources: the machine description and the configuration store.
//!
//! Both are collaborators behind traits; [`read_from_description`] and
//! [`read_from_config`] turn what they report into a [`Limits`] value.
//!
//! Configuration keys follow the ROS `joint_limits` layout:
//!
//! ```text
//! <namespace>/joint_limits/<joint>/has_velocity_limits = true
//! <namespace>/joint_limits/<joint>/max_velocity        = 1.5
//! ```
//!
//! A value only counts when its `has_*` switch is `true`; it is then
//! required.

use tracing::debug;

use super::{Limits, SoftLimits};
use crate::consts::JOINT_LIMITS_KEY;
use crate::error::ConfigParseError;

/// What the machine description knows about one joint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointDescription {
    /// `(lower, upper)` position bounds; `None` for continuous joints.
    pub position: Option<(f64, f64)>,
    /// Velocity magnitude bound.
    pub velocity: Option<f64>,
    /// Effort magnitude bound.
    pub effort: Option<f64>,
}

/// Source of per-joint description data.
pub trait DescriptionSource {
    /// Description of `joint`, `None` if the joint is unknown.
    fn joint_description(&self, joint: &str) -> Option<JointDescription>;
}

/// Hierarchical scalar/boolean parameter store.
///
/// Keys are `/`-separated paths relative to `namespace`. The empty
/// namespace addresses the store root.
pub trait ConfigStore {
    /// Numeric value at `namespace/key`.
    ///
    /// # Errors
    ///
    /// `ConfigParseError::NotNumeric` if the value exists but is not a number.
    fn get_scalar(&self, namespace: &str, key: &str) -> Result<Option<f64>, ConfigParseError>;

    /// Boolean value at `namespace/key`.
    ///
    /// # Errors
    ///
    /// `ConfigParseError::NotBoolean` if the value exists but is not a boolean.
    fn get_bool(&self, namespace: &str, key: &str) -> Result<Option<bool>, ConfigParseError>;
}

/// Join namespace and key into the full path used in error messages.
pub fn full_key(namespace: &str, key: &str) -> String {
    let ns = namespace.trim_matches('/');
    if ns.is_empty() {
        key.to_string()
    } else {
        format!("{ns}/{key}")
    }
}

/// Limits reported by the description for `joint`.
///
/// Never fails: an unknown joint or a missing field leaves the
/// corresponding limit unconfigured.
pub fn read_from_description(source: &dyn DescriptionSource, joint: &str) -> Limits {
    let Some(desc) = source.joint_description(joint) else {
        debug!(joint, "no description entry");
        return Limits::new();
    };
    let mut limits = Limits::new();
    if let Some((lower, upper)) = desc.position {
        limits.set_position(lower, upper);
    }
    if let Some(v) = desc.velocity {
        limits.set_velocity(v);
    }
    if let Some(e) = desc.effort {
        limits.set_effort(e);
    }
    limits
}

/// Limits stored for `joint` under `namespace`.
///
/// Soft-limit parameters are read only when `include_soft` is set.
///
/// # Errors
///
/// `ConfigParseError` when a present field is malformed: not a number or
/// boolean, missing while its switch is on, an inverted range, a negative
/// magnitude, or soft limits without position limits.
pub fn read_from_config(
    store: &dyn ConfigStore,
    joint: &str,
    namespace: &str,
    include_soft: bool,
) -> Result<Limits, ConfigParseError> {
    let reader = JointKeys {
        store,
        namespace,
        prefix: format!("{JOINT_LIMITS_KEY}/{joint}"),
    };
    let mut limits = Limits::new();

    if reader.enabled("has_position_limits")? {
        let min = reader.required("min_position")?;
        let max = reader.required("max_position")?;
        if min > max {
            return Err(ConfigParseError::InvertedRange {
                joint: joint.to_string(),
                what: "position",
                min,
                max,
            });
        }
        limits.set_position(min, max);
    }
    if reader.enabled("has_velocity_limits")? {
        limits.set_velocity(reader.magnitude("max_velocity")?);
    }
    if reader.enabled("has_acceleration_limits")? {
        limits.set_acceleration(reader.magnitude("max_acceleration")?);
    }
    if reader.enabled("has_jerk_limits")? {
        limits.set_jerk(reader.magnitude("max_jerk")?);
    }
    if reader.enabled("has_effort_limits")? {
        limits.set_effort(reader.magnitude("max_effort")?);
    }
    if include_soft && reader.enabled("has_soft_limits")? {
        let k_position = reader.magnitude("k_position")?;
        let k_velocity = reader.magnitude("k_velocity")?;
        let min = reader.required("soft_lower_limit")?;
        let max = reader.required("soft_upper_limit")?;
        if min > max {
            return Err(ConfigParseError::InvertedRange {
                joint: joint.to_string(),
                what: "soft",
                min,
                max,
            });
        }
        limits.set_soft(SoftLimits::new(k_position, min, max, k_velocity));
    }

    if !limits.valid() {
        return Err(ConfigParseError::SoftWithoutPosition {
            joint: joint.to_string(),
        });
    }
    Ok(limits)
}

/// Key reader scoped to one joint's limit table.
struct JointKeys<'a> {
    store: &'a dyn ConfigStore,
    namespace: &'a str,
    prefix: String,
}

impl JointKeys<'_> {
    fn key(&self, field: &str) -> String {
        format!("{}/{field}", self.prefix)
    }

    fn enabled(&self, switch: &str) -> Result<bool, ConfigParseError> {
        Ok(self
            .store
            .get_bool(self.namespace, &self.key(switch))?
            .unwrap_or(false))
    }

    fn required(&self, field: &str) -> Result<f64, ConfigParseError> {
        let key = self.key(field);
        self.store
            .get_scalar(self.namespace, &key)?
            .ok_or_else(|| ConfigParseError::Missing {
                key: full_key(self.namespace, &key),
            })
    }

    fn magnitude(&self, field: &str) -> Result<f64, ConfigParseError> {
        let value = self.required(field)?;
        if value < 0.0 {
            return Err(ConfigParseError::NegativeBound {
                key: full_key(self.namespace, &self.key(field)),
                value,
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore {
        scalars: HashMap<String, f64>,
        bools: HashMap<String, bool>,
        broken: Vec<String>,
    }

    impl MapStore {
        fn scalar(mut self, key: &str, v: f64) -> Self {
            self.scalars.insert(key.to_string(), v);
            self
        }
        fn flag(mut self, key: &str, v: bool) -> Self {
            self.bools.insert(key.to_string(), v);
            self
        }
    }

    impl ConfigStore for MapStore {
        fn get_scalar(&self, ns: &str, key: &str) -> Result<Option<f64>, ConfigParseError> {
            let k = full_key(ns, key);
            if self.broken.contains(&k) {
                return Err(ConfigParseError::NotNumeric { key: k });
            }
            Ok(self.scalars.get(&k).copied())
        }
        fn get_bool(&self, ns: &str, key: &str) -> Result<Option<bool>, ConfigParseError> {
            Ok(self.bools.get(&full_key(ns, key)).copied())
        }
    }

    struct OneJoint(JointDescription);

    impl DescriptionSource for OneJoint {
        fn joint_description(&self, joint: &str) -> Option<JointDescription> {
            (joint == "elbow").then_some(self.0)
        }
    }

    // ── description ──

    #[test]
    fn description_fields_become_limits() {
        let src = OneJoint(JointDescription {
            position: Some((-1.0, 1.0)),
            velocity: Some(2.0),
            effort: None,
        });
        let l = read_from_description(&src, "elbow");
        assert_eq!(l, Limits::new().with_position(-1.0, 1.0).with_velocity(2.0));
        assert!(read_from_description(&src, "wrist").is_empty());
    }

    // ── config ──

    #[test]
    fn config_reads_enabled_fields_only() {
        let store = MapStore::default()
            .flag("arm/joint_limits/elbow/has_velocity_limits", true)
            .scalar("arm/joint_limits/elbow/max_velocity", 1.5)
            .flag("arm/joint_limits/elbow/has_effort_limits", false)
            .scalar("arm/joint_limits/elbow/max_effort", 10.0);
        let l = read_from_config(&store, "elbow", "arm", false).unwrap();
        assert_eq!(l, Limits::new().with_velocity(1.5));
    }

    #[test]
    fn config_global_namespace() {
        let store = MapStore::default()
            .flag("joint_limits/elbow/has_position_limits", true)
            .scalar("joint_limits/elbow/min_position", -0.5)
            .scalar("joint_limits/elbow/max_position", 0.5);
        let l = read_from_config(&store, "elbow", "", true).unwrap();
        assert_eq!(l.position(), Some((-0.5, 0.5)));
    }

    #[test]
    fn config_missing_value_is_error() {
        let store = MapStore::default().flag("joint_limits/elbow/has_jerk_limits", true);
        assert_eq!(
            read_from_config(&store, "elbow", "", false),
            Err(ConfigParseError::Missing {
                key: "joint_limits/elbow/max_jerk".to_string()
            })
        );
    }

    #[test]
    fn config_inverted_and_negative() {
        let store = MapStore::default()
            .flag("joint_limits/elbow/has_position_limits", true)
            .scalar("joint_limits/elbow/min_position", 1.0)
            .scalar("joint_limits/elbow/max_position", -1.0);
        assert!(matches!(
            read_from_config(&store, "elbow", "", false),
            Err(ConfigParseError::InvertedRange { what: "position", .. })
        ));

        let store = MapStore::default()
            .flag("joint_limits/elbow/has_acceleration_limits", true)
            .scalar("joint_limits/elbow/max_acceleration", -3.0);
        assert!(matches!(
            read_from_config(&store, "elbow", "", false),
            Err(ConfigParseError::NegativeBound { value, .. }) if value == -3.0
        ));
    }

    #[test]
    fn config_not_numeric_propagates() {
        let mut store = MapStore::default().flag("joint_limits/elbow/has_velocity_limits", true);
        store.broken.push("joint_limits/elbow/max_velocity".to_string());
        assert!(matches!(
            read_from_config(&store, "elbow", "", false),
            Err(ConfigParseError::NotNumeric { .. })
        ));
    }

    #[test]
    fn config_soft_limits() {
        let store = MapStore::default()
            .flag("joint_limits/elbow/has_soft_limits", true)
            .scalar("joint_limits/elbow/k_position", 10.0)
            .scalar("joint_limits/elbow/k_velocity", 2.0)
            .scalar("joint_limits/elbow/soft_lower_limit", -0.9)
            .scalar("joint_limits/elbow/soft_upper_limit", 0.9);

        // skipped unless requested
        assert!(read_from_config(&store, "elbow", "", false).unwrap().is_empty());

        // soft without position
        assert!(matches!(
            read_from_config(&store, "elbow", "", true),
            Err(ConfigParseError::SoftWithoutPosition { .. })
        ));

        let store = store
            .flag("joint_limits/elbow/has_position_limits", true)
            .scalar("joint_limits/elbow/min_position", -1.0)
            .scalar("joint_limits/elbow/max_position", 1.0);
        let l = read_from_config(&store, "elbow", "", true).unwrap();
        assert_eq!(l.soft(), Some(SoftLimits::new(10.0, -0.9, 0.9, 2.0)));
    }

    #[test]
    fn full_key_joins_namespaces() {
        assert_eq!(full_key("", "a/b"), "a/b");
        assert_eq!(full_key("/ctrl/", "a"), "ctrl/a");
    }
}

//! Unit conversion between joint units (rad, rad/s, Nm) and device units.
//!
//! Converters are opaque to the rest of the control unit: `evaluate` maps a
//! value, `reset` drops whatever memory the converter keeps.

use serde::{Deserialize, Serialize};

/// Joint-unit to device-unit mapping (or back).
pub trait UnitConverter: Send {
    /// Convert one value.
    fn evaluate(&mut self, input: f64) -> f64;

    /// Clear internal memory.
    fn reset(&mut self);
}

/// Linear conversion parameters, as written in the config file.
///
/// ```toml
/// pos_to_device = { scale = 57295.78, round = true }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Multiplier.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Added after scaling.
    #[serde(default)]
    pub offset: f64,
    /// Round half to even after conversion.
    #[serde(default)]
    pub round: bool,
    /// Exponential smoothing factor in `(0, 1]`; `None` disables smoothing.
    #[serde(default)]
    pub smoothing: Option<f64>,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self::identity()
    }
}

impl ConversionConfig {
    /// `y = x`.
    pub const fn identity() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            round: false,
            smoothing: None,
        }
    }

    /// rad → milli-degree, rounded.
    pub const fn rad_to_millideg() -> Self {
        Self {
            scale: 1000.0 * 180.0 / core::f64::consts::PI,
            offset: 0.0,
            round: true,
            smoothing: None,
        }
    }

    /// milli-degree → rad.
    pub const fn millideg_to_rad() -> Self {
        Self {
            scale: core::f64::consts::PI / (180.0 * 1000.0),
            offset: 0.0,
            round: false,
            smoothing: None,
        }
    }
}

/// `y = round?(smooth?(scale * x + offset))`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConverter {
    config: ConversionConfig,
    memory: Option<f64>,
}

impl LinearConverter {
    /// Build from parameters.
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            memory: None,
        }
    }
}

impl UnitConverter for LinearConverter {
    fn evaluate(&mut self, input: f64) -> f64 {
        let mut y = self.config.scale * input + self.config.offset;
        if let Some(alpha) = self.config.smoothing.filter(|a| *a > 0.0 && *a <= 1.0) {
            y = match self.memory {
                Some(prev) => prev + alpha * (y - prev),
                None => y,
            };
            self.memory = Some(y);
        }
        if self.config.round {
            y = y.round_ties_even();
        }
        y
    }

    fn reset(&mut self) {
        self.memory = None;
    }
}

/// The six converters of one joint.
pub struct JointConverters {
    /// Position command to device.
    pub pos_to_device: Box<dyn UnitConverter>,
    /// Velocity command to device.
    pub vel_to_device: Box<dyn UnitConverter>,
    /// Effort command to device.
    pub eff_to_device: Box<dyn UnitConverter>,
    /// Position feedback from device.
    pub pos_from_device: Box<dyn UnitConverter>,
    /// Velocity feedback from device.
    pub vel_from_device: Box<dyn UnitConverter>,
    /// Effort feedback from device.
    pub eff_from_device: Box<dyn UnitConverter>,
}

impl JointConverters {
    /// Linear converters built from config; missing entries use the defaults.
    pub fn from_config(cfg: &JointConversionConfig) -> Self {
        let defaults = JointConversionConfig::default();
        let pick = |c: Option<ConversionConfig>, d: Option<ConversionConfig>| -> Box<dyn UnitConverter> {
            Box::new(LinearConverter::new(
                c.or(d).unwrap_or_else(ConversionConfig::identity),
            ))
        };
        Self {
            pos_to_device: pick(cfg.pos_to_device, defaults.pos_to_device),
            vel_to_device: pick(cfg.vel_to_device, defaults.vel_to_device),
            eff_to_device: pick(cfg.eff_to_device, defaults.eff_to_device),
            pos_from_device: pick(cfg.pos_from_device, defaults.pos_from_device),
            vel_from_device: pick(cfg.vel_from_device, defaults.vel_from_device),
            eff_from_device: pick(cfg.eff_from_device, defaults.eff_from_device),
        }
    }

    /// All six converters pass values through unchanged.
    pub fn identity() -> Self {
        let id = || -> Box<dyn UnitConverter> {
            Box::new(LinearConverter::new(ConversionConfig::identity()))
        };
        Self {
            pos_to_device: id(),
            vel_to_device: id(),
            eff_to_device: id(),
            pos_from_device: id(),
            vel_from_device: id(),
            eff_from_device: id(),
        }
    }

    /// Reset every converter.
    pub fn reset(&mut self) {
        self.pos_to_device.reset();
        self.vel_to_device.reset();
        self.eff_to_device.reset();
        self.pos_from_device.reset();
        self.vel_from_device.reset();
        self.eff_from_device.reset();
    }
}

impl Default for JointConverters {
    fn default() -> Self {
        Self::from_config(&JointConversionConfig::default())
    }
}

/// Per-joint conversion section of the config file.
///
/// Defaults: position and velocity in milli-degree, effort unscaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointConversionConfig {
    /// Position command to device.
    #[serde(default)]
    pub pos_to_device: Option<ConversionConfig>,
    /// Velocity command to device.
    #[serde(default)]
    pub vel_to_device: Option<ConversionConfig>,
    /// Effort command to device.
    #[serde(default)]
    pub eff_to_device: Option<ConversionConfig>,
    /// Position feedback from device.
    #[serde(default)]
    pub pos_from_device: Option<ConversionConfig>,
    /// Velocity feedback from device.
    #[serde(default)]
    pub vel_from_device: Option<ConversionConfig>,
    /// Effort feedback from device.
    #[serde(default)]
    pub eff_from_device: Option<ConversionConfig>,
}

impl Default for JointConversionConfig {
    fn default() -> Self {
        Self {
            pos_to_device: Some(ConversionConfig::rad_to_millideg()),
            vel_to_device: Some(ConversionConfig::rad_to_millideg()),
            eff_to_device: Some(ConversionConfig::identity()),
            pos_from_device: Some(ConversionConfig::millideg_to_rad()),
            vel_from_device: Some(ConversionConfig::millideg_to_rad()),
            eff_from_device: Some(ConversionConfig::identity()),
        }
    }
}

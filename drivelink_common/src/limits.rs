//! Per-joint limit model.
//!
//! A [`Limits`] value describes the position, velocity, acceleration, jerk,
//! effort and soft-limit constraints of one joint. Only fields whose flag is
//! set in [`LimitFlags`] impose a constraint; everything else is ignored.
//!
//! Two combination operators fold limit sources together:
//!
//! | Operator | Semantics | Order |
//! |----------|-----------|-------|
//! | [`Limits::merge`] | intersection, tighter bound wins, flags unioned | commutative, idempotent |
//! | [`Limits::apply`] | override, present fields replace, absent inherit | later call wins |
//!
//! `merge` builds the authoritative per-joint baseline from description and
//! configuration. `apply` layers controller-specific limits on top of each
//! other without touching the baseline.
//!
//! # Submodules
//!
//! - [`bounds`] - clamping and soft-limit shaping arithmetic
//! - [`source`] - description and configuration-store collaborators
//! - [`store`] - TOML-backed collaborator implementations

pub mod bounds;
pub mod source;
pub mod store;

use bitflags::bitflags;

use self::bounds::{clamp_checked, clamp_symmetric_checked, soft_velocity_bounds};

bitflags! {
    /// Which fields of a [`Limits`] value are configured.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LimitFlags: u8 {
        /// `min_position` / `max_position`.
        const POSITION     = 1 << 0;
        /// `max_velocity`.
        const VELOCITY     = 1 << 1;
        /// `max_acceleration`.
        const ACCELERATION = 1 << 2;
        /// `max_jerk`.
        const JERK         = 1 << 3;
        /// `max_effort`.
        const EFFORT       = 1 << 4;
        /// Soft-limit shaping parameters.
        const SOFT         = 1 << 5;
    }
}

/// Soft-limit shaping parameters.
///
/// `k_position` controls how sharply the velocity bound falls off near the
/// position limits; `k_velocity` converts velocity error into an effort
/// bound in effort mode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SoftLimits {
    /// Position gain of the velocity shaping curve.
    pub k_position: f64,
    /// Soft lower position limit.
    pub min_position: f64,
    /// Soft upper position limit.
    pub max_position: f64,
    /// Velocity gain of the effort bound.
    pub k_velocity: f64,
}

impl SoftLimits {
    /// Construct soft-limit parameters.
    #[inline]
    pub const fn new(k_position: f64, min_position: f64, max_position: f64, k_velocity: f64) -> Self {
        Self {
            k_position,
            min_position,
            max_position,
            k_velocity,
        }
    }
}

// ─── Limits ─────────────────────────────────────────────────────────

/// Constraint set of one joint.
///
/// Equality compares only configured fields: two values with the same flags
/// are equal when every configured field matches, whatever the
/// unconfigured storage holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    flags: LimitFlags,
    min_position: f64,
    max_position: f64,
    max_velocity: f64,
    max_acceleration: f64,
    max_jerk: f64,
    max_effort: f64,
    soft: SoftLimits,
}

impl Limits {
    /// Empty limit set: nothing configured, nothing enforced.
    #[inline]
    pub const fn new() -> Self {
        Self {
            flags: LimitFlags::empty(),
            min_position: 0.0,
            max_position: 0.0,
            max_velocity: 0.0,
            max_acceleration: 0.0,
            max_jerk: 0.0,
            max_effort: 0.0,
            soft: SoftLimits::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    // ── builders ──

    /// With position limits `[min, max]`.
    #[inline]
    pub const fn with_position(mut self, min: f64, max: f64) -> Self {
        self.set_position(min, max);
        self
    }

    /// With velocity magnitude bound.
    #[inline]
    pub const fn with_velocity(mut self, max: f64) -> Self {
        self.set_velocity(max);
        self
    }

    /// With acceleration magnitude bound.
    #[inline]
    pub const fn with_acceleration(mut self, max: f64) -> Self {
        self.set_acceleration(max);
        self
    }

    /// With jerk magnitude bound.
    #[inline]
    pub const fn with_jerk(mut self, max: f64) -> Self {
        self.set_jerk(max);
        self
    }

    /// With effort magnitude bound.
    #[inline]
    pub const fn with_effort(mut self, max: f64) -> Self {
        self.set_effort(max);
        self
    }

    /// With soft-limit shaping.
    #[inline]
    pub const fn with_soft(mut self, soft: SoftLimits) -> Self {
        self.set_soft(soft);
        self
    }

    // ── setters ──

    /// Configure position limits.
    #[inline]
    pub const fn set_position(&mut self, min: f64, max: f64) {
        self.min_position = min;
        self.max_position = max;
        self.flags = self.flags.union(LimitFlags::POSITION);
    }

    /// Configure the velocity bound.
    #[inline]
    pub const fn set_velocity(&mut self, max: f64) {
        self.max_velocity = max;
        self.flags = self.flags.union(LimitFlags::VELOCITY);
    }

    /// Configure the acceleration bound.
    #[inline]
    pub const fn set_acceleration(&mut self, max: f64) {
        self.max_acceleration = max;
        self.flags = self.flags.union(LimitFlags::ACCELERATION);
    }

    /// Configure the jerk bound.
    #[inline]
    pub const fn set_jerk(&mut self, max: f64) {
        self.max_jerk = max;
        self.flags = self.flags.union(LimitFlags::JERK);
    }

    /// Configure the effort bound.
    #[inline]
    pub const fn set_effort(&mut self, max: f64) {
        self.max_effort = max;
        self.flags = self.flags.union(LimitFlags::EFFORT);
    }

    /// Configure soft-limit shaping.
    #[inline]
    pub const fn set_soft(&mut self, soft: SoftLimits) {
        self.soft = soft;
        self.flags = self.flags.union(LimitFlags::SOFT);
    }

    // ── accessors ──

    /// Configured fields.
    #[inline]
    pub const fn flags(&self) -> LimitFlags {
        self.flags
    }

    /// Whether all of `flags` are configured.
    #[inline]
    pub const fn has(&self, flags: LimitFlags) -> bool {
        self.flags.contains(flags)
    }

    /// Whether nothing is configured.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Position range, if configured.
    #[inline]
    pub const fn position(&self) -> Option<(f64, f64)> {
        if self.has(LimitFlags::POSITION) {
            Some((self.min_position, self.max_position))
        } else {
            None
        }
    }

    /// Velocity bound, if configured.
    #[inline]
    pub const fn max_velocity(&self) -> Option<f64> {
        if self.has(LimitFlags::VELOCITY) {
            Some(self.max_velocity)
        } else {
            None
        }
    }

    /// Acceleration bound, if configured.
    #[inline]
    pub const fn max_acceleration(&self) -> Option<f64> {
        if self.has(LimitFlags::ACCELERATION) {
            Some(self.max_acceleration)
        } else {
            None
        }
    }

    /// Jerk bound, if configured.
    #[inline]
    pub const fn max_jerk(&self) -> Option<f64> {
        if self.has(LimitFlags::JERK) {
            Some(self.max_jerk)
        } else {
            None
        }
    }

    /// Effort bound, if configured.
    #[inline]
    pub const fn max_effort(&self) -> Option<f64> {
        if self.has(LimitFlags::EFFORT) {
            Some(self.max_effort)
        } else {
            None
        }
    }

    /// Soft-limit parameters, if configured.
    #[inline]
    pub const fn soft(&self) -> Option<SoftLimits> {
        if self.has(LimitFlags::SOFT) {
            Some(self.soft)
        } else {
            None
        }
    }

    /// False when soft limits are configured without position limits.
    #[inline]
    pub const fn valid(&self) -> bool {
        !self.has(LimitFlags::SOFT) || self.has(LimitFlags::POSITION)
    }

    // ── combination ──

    /// Intersection of two limit sets.
    ///
    /// For each field configured in either operand the tighter bound wins:
    /// larger minimum, smaller maximum, smaller magnitude. Soft parameters
    /// tighten field by field (smaller gains, narrower range). A field
    /// configured in only one operand carries through unchanged. Flags are
    /// unioned.
    ///
    /// Disjoint position ranges produce an inverted range; enforcement then
    /// pins the joint to the upper bound.
    #[must_use]
    pub fn merge(&self, other: &Limits) -> Limits {
        let mut out = *self;
        if let Some((min, max)) = other.position() {
            match self.position() {
                Some((own_min, own_max)) => out.set_position(own_min.max(min), own_max.min(max)),
                None => out.set_position(min, max),
            }
        }
        if let Some(v) = other.max_velocity() {
            out.set_velocity(self.max_velocity().map_or(v, |own| own.min(v)));
        }
        if let Some(a) = other.max_acceleration() {
            out.set_acceleration(self.max_acceleration().map_or(a, |own| own.min(a)));
        }
        if let Some(j) = other.max_jerk() {
            out.set_jerk(self.max_jerk().map_or(j, |own| own.min(j)));
        }
        if let Some(e) = other.max_effort() {
            out.set_effort(self.max_effort().map_or(e, |own| own.min(e)));
        }
        if let Some(s) = other.soft() {
            out.set_soft(match self.soft() {
                Some(own) => SoftLimits {
                    k_position: own.k_position.min(s.k_position),
                    min_position: own.min_position.max(s.min_position),
                    max_position: own.max_position.min(s.max_position),
                    k_velocity: own.k_velocity.min(s.k_velocity),
                },
                None => s,
            });
        }
        out
    }

    /// Layer `over` on top of `self`.
    ///
    /// Every field configured in `over` replaces the corresponding field
    /// outright; fields absent in `over` are inherited. Order-dependent:
    /// `a.apply(b).apply(c)` lets `c` win over `b` over `a`.
    #[must_use]
    pub fn apply(&self, over: &Limits) -> Limits {
        let mut out = *self;
        if let Some((min, max)) = over.position() {
            out.set_position(min, max);
        }
        if let Some(v) = over.max_velocity() {
            out.set_velocity(v);
        }
        if let Some(a) = over.max_acceleration() {
            out.set_acceleration(a);
        }
        if let Some(j) = over.max_jerk() {
            out.set_jerk(j);
        }
        if let Some(e) = over.max_effort() {
            out.set_effort(e);
        }
        if let Some(s) = over.soft() {
            out.set_soft(s);
        }
        out
    }

    // ── checked limiting ──

    /// Clamp a position to the position range.
    pub fn limit_position_checked(&self, pos: f64) -> (f64, bool) {
        match self.position() {
            Some((min, max)) => clamp_checked(pos, min, max),
            None => (pos, false),
        }
    }

    /// Clamp a velocity to the velocity bound.
    pub fn limit_velocity_checked(&self, vel: f64) -> (f64, bool) {
        match self.max_velocity() {
            Some(max) => clamp_symmetric_checked(vel, max),
            None => (vel, false),
        }
    }

    /// Clamp an acceleration to the acceleration bound.
    pub fn limit_acceleration_checked(&self, acc: f64) -> (f64, bool) {
        match self.max_acceleration() {
            Some(max) => clamp_symmetric_checked(acc, max),
            None => (acc, false),
        }
    }

    /// Clamp a jerk to the jerk bound.
    pub fn limit_jerk_checked(&self, jerk: f64) -> (f64, bool) {
        match self.max_jerk() {
            Some(max) => clamp_symmetric_checked(jerk, max),
            None => (jerk, false),
        }
    }

    /// Clamp an effort to the effort bound.
    pub fn limit_effort_checked(&self, eff: f64) -> (f64, bool) {
        match self.max_effort() {
            Some(max) => clamp_symmetric_checked(eff, max),
            None => (eff, false),
        }
    }

    // ── soft limits ──

    /// Instantaneous soft velocity bounds `(lower, upper)` at `pos`.
    ///
    /// The shaping range is the hard position range intersected with the
    /// soft range. `None` unless soft, position and velocity limits are all
    /// configured.
    pub fn velocity_soft_bounds(&self, pos: f64) -> Option<(f64, f64)> {
        let soft = self.soft()?;
        let (min, max) = self.position()?;
        let vmax = self.max_velocity()?;
        let lo = min.max(soft.min_position);
        let hi = max.min(soft.max_position);
        Some(soft_velocity_bounds(pos, lo, hi, soft.k_position, vmax))
    }

    /// Clamp `vel` to the soft velocity bounds at `pos`.
    pub fn limit_velocity_with_soft_bounds(&self, vel: f64, pos: f64) -> (f64, bool) {
        match self.velocity_soft_bounds(pos) {
            Some((lo, hi)) => clamp_checked(vel, lo, hi),
            None => (vel, false),
        }
    }

    /// Soft effort bounds `(lower, upper)` at `(pos, vel)`.
    ///
    /// Each bound is `-k_velocity * (vel - v_bound)` for the matching soft
    /// velocity bound, clamped to the effort bound.
    pub fn effort_soft_bounds(&self, pos: f64, vel: f64) -> Option<(f64, f64)> {
        let soft = self.soft()?;
        let emax = self.max_effort()?;
        let (vlo, vhi) = self.velocity_soft_bounds(pos)?;
        let lo = clamp_symmetric_checked(-soft.k_velocity * (vel - vlo), emax).0;
        let hi = clamp_symmetric_checked(-soft.k_velocity * (vel - vhi), emax).0;
        Some((lo, hi))
    }

    // ── stop on limit ──

    /// Zero a velocity or effort command that drives further out of the
    /// position range while the joint already sits at or beyond a bound.
    pub fn stop_on_position_limit(&self, cmd: f64, current_pos: f64) -> (f64, bool) {
        match self.position() {
            Some((min, max)) if (current_pos >= max && cmd > 0.0) || (current_pos <= min && cmd < 0.0) => {
                (0.0, true)
            }
            _ => (cmd, false),
        }
    }

    /// Bound a position command `cmd` is replaced with when the joint,
    /// moving at `vel` from `pos`, would cross it within `period` seconds
    /// and `cmd` does not retreat from it.
    pub fn position_stop_target(&self, cmd: f64, pos: f64, vel: f64, period: f64) -> Option<f64> {
        let (min, max) = self.position()?;
        let predicted = pos + vel * period;
        if predicted > max && cmd >= pos {
            Some(max)
        } else if predicted < min && cmd <= pos {
            Some(min)
        } else {
            None
        }
    }
}

impl PartialEq for Limits {
    fn eq(&self, other: &Self) -> bool {
        self.flags == other.flags
            && self.position() == other.position()
            && self.max_velocity() == other.max_velocity()
            && self.max_acceleration() == other.max_acceleration()
            && self.max_jerk() == other.max_jerk()
            && self.max_effort() == other.max_effort()
            && self.soft() == other.soft()
    }
}

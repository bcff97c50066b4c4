//! Bound clamping and soft-limit shaping.
//!
//! Pure `f64` arithmetic, no allocation, safe to call from the RT cycle.
//! None of these functions panic, including for NaN inputs (`f64::clamp`
//! would panic on an inverted range, so plain comparisons are used).

/// Clamp `value` to `[lo, hi]`.
#[inline]
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    clamp_checked(value, lo, hi).0
}

/// Clamp `value` to `[lo, hi]` and report whether clamping occurred.
///
/// Returns `(value, false)` iff `lo <= value <= hi`; otherwise the nearest
/// bound and `true`. NaN lies outside every range and maps to `lo`.
#[inline]
pub fn clamp_checked(value: f64, lo: f64, hi: f64) -> (f64, bool) {
    if value > hi {
        (hi, true)
    } else if value >= lo {
        (value, false)
    } else {
        (lo, true)
    }
}

/// Clamp `value` to `[-magnitude, magnitude]`.
#[inline]
pub fn clamp_symmetric_checked(value: f64, magnitude: f64) -> (f64, bool) {
    clamp_checked(value, -magnitude, magnitude)
}

/// Soft-limit shaping curve over the normalized distance `d`.
///
/// `f(0) = 0`, `f(1) = 1`, strictly increasing, concave for `k > 0` so the
/// bound stays near full magnitude away from the limit and falls off close
/// to it. Negative `d` (past the limit) yields a negative value. `k <= 0`
/// degrades to the linear ramp.
#[inline]
pub fn soft_shaping(d: f64, k: f64) -> f64 {
    if k <= 0.0 || !k.is_finite() {
        return d;
    }
    (1.0 - (-k * d).exp()) / (1.0 - (-k).exp())
}

/// Velocity bounds at `pos` inside the shaping range `[lo, hi]`.
///
/// At the midpoint both bounds equal `vmax` in magnitude; they shrink
/// toward zero as `pos` nears either end and push back (change sign) once
/// `pos` is past it. Each bound is clamped to `[-vmax, vmax]`. A degenerate
/// range (`hi <= lo`) pins the joint: `(0, 0)`.
pub fn soft_velocity_bounds(pos: f64, lo: f64, hi: f64, k: f64, vmax: f64) -> (f64, f64) {
    let half = 0.5 * (hi - lo);
    if half <= 0.0 || !half.is_finite() {
        return (0.0, 0.0);
    }
    let d_upper = (hi - pos) / half;
    let d_lower = (pos - lo) / half;
    let upper = clamp(vmax * soft_shaping(d_upper, k), -vmax, vmax);
    let lower = clamp(-vmax * soft_shaping(d_lower, k), -vmax, vmax);
    (lower, upper)
}

//! Per-cycle limit enforcement.
//!
//! One `JointLimiter` per joint, keyed by the active [`CommandChannel`].
//! Each cycle it takes the proposed command for that channel together with
//! the measured joint state and returns the command that may reach the
//! actuator, plus whether anything was clamped.
//!
//! ## Pipeline
//!
//! | Step | Position | Velocity | Effort |
//! |------|----------|----------|--------|
//! | 1 | soft velocity bounds on implied velocity | soft velocity bounds | soft effort bounds |
//! | 2 | velocity bound on implied velocity | stop on limit | stop on limit |
//! | 3 | acceleration (two-sample history) | jerk (two-sample history) | hard effort bound |
//! | 4 | stop on predicted overshoot unless retreating | acceleration | |
//! | 5 | hard position bound | hard velocity bound | |
//!
//! The rate-limiting baseline `c0` is the previous returned command, or
//! the measured value of the channel's quantity when there is none (after
//! construction, recovery or a channel change). The history holds the last
//! two returned commands, so jerk and acceleration limiting never allocate.
//!
//! Non-finite commands are replaced by `c0` and reported as clamped.

use drivelink_common::limits::bounds::clamp_checked;
use drivelink_common::limits::Limits;
use drivelink_common::mode::CommandChannel;
use heapless::HistoryBuffer;

/// Measured joint state in joint units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointFeedback {
    /// Position [rad or m].
    pub position: f64,
    /// Velocity [rad/s or m/s].
    pub velocity: f64,
    /// Effort [Nm or N].
    pub effort: f64,
}

/// Stateful per-joint command limiter.
#[derive(Debug)]
pub struct JointLimiter {
    channel: CommandChannel,
    history: HistoryBuffer<f64, 2>,
    stop_on_limit: bool,
}

impl JointLimiter {
    /// Limiter for `channel` with empty history.
    pub fn new(channel: CommandChannel, stop_on_limit: bool) -> Self {
        Self {
            channel,
            history: HistoryBuffer::new(),
            stop_on_limit,
        }
    }

    /// Active channel.
    #[inline]
    pub fn channel(&self) -> CommandChannel {
        self.channel
    }

    /// Switch channel. Clears the history.
    pub fn set_channel(&mut self, channel: CommandChannel) {
        self.channel = channel;
        self.recover();
    }

    /// Whether stop-on-limit is enabled.
    #[inline]
    pub fn stop_on_limit(&self) -> bool {
        self.stop_on_limit
    }

    /// Previous returned command.
    #[inline]
    pub fn last_command(&self) -> Option<f64> {
        self.history.recent().copied()
    }

    /// Drop the command history; the next cycle starts from the measured state.
    pub fn recover(&mut self) {
        self.history.clear();
    }

    /// Limit `cmd` for one cycle of `period` seconds.
    ///
    /// Returns the command to forward and whether any bound changed it.
    /// With `CommandChannel::None` the command passes through untouched.
    pub fn enforce(
        &mut self,
        period: f64,
        limits: &Limits,
        measured: &JointFeedback,
        cmd: f64,
    ) -> (f64, bool) {
        let out = match self.channel {
            CommandChannel::None => return (cmd, false),
            CommandChannel::Position => self.enforce_position(period, limits, measured, cmd),
            CommandChannel::Velocity => self.enforce_velocity(period, limits, measured, cmd),
            CommandChannel::Effort => self.enforce_effort(limits, measured, cmd),
        };
        self.history.write(out.0);
        out
    }

    /// `(c0, c1)`: previous and previous-but-one command.
    fn history_pair(&self, measured: f64) -> (f64, Option<f64>) {
        let c0 = self.last_command().unwrap_or(measured);
        let c1 = if self.history.len() == 2 {
            self.history.oldest_ordered().next().copied()
        } else {
            None
        };
        (c0, c1)
    }

    fn enforce_position(
        &self,
        period: f64,
        limits: &Limits,
        measured: &JointFeedback,
        cmd: f64,
    ) -> (f64, bool) {
        let (c0, c1) = self.history_pair(measured.position);
        let (mut pos, mut clamped) = sanitize(cmd, c0);

        if period > 0.0 {
            let mut vel = (pos - c0) / period;
            let mut limited = false;
            let (v, c) = limits.limit_velocity_with_soft_bounds(vel, measured.position);
            vel = v;
            limited |= c;
            let (v, c) = limits.limit_velocity_checked(vel);
            vel = v;
            limited |= c;
            if let (Some(acc), Some(c1)) = (limits.max_acceleration(), c1) {
                let prev_vel = (c0 - c1) / period;
                let dv = acc * period;
                let (v, c) = clamp_checked(vel, prev_vel - dv, prev_vel + dv);
                vel = v;
                limited |= c;
            }
            if limited {
                pos = c0 + vel * period;
                clamped = true;
            }

            if self.stop_on_limit {
                if let Some(bound) =
                    limits.position_stop_target(pos, measured.position, measured.velocity, period)
                {
                    clamped |= pos != bound;
                    pos = bound;
                }
            }
        }

        let (p, c) = limits.limit_position_checked(pos);
        (p, clamped | c)
    }

    fn enforce_velocity(
        &self,
        period: f64,
        limits: &Limits,
        measured: &JointFeedback,
        cmd: f64,
    ) -> (f64, bool) {
        let (c0, c1) = self.history_pair(measured.velocity);
        let (mut vel, mut clamped) = sanitize(cmd, c0);

        let (v, c) = limits.limit_velocity_with_soft_bounds(vel, measured.position);
        vel = v;
        clamped |= c;

        if self.stop_on_limit {
            let (v, c) = limits.stop_on_position_limit(vel, measured.position);
            vel = v;
            clamped |= c;
        }

        if period > 0.0 {
            if let (Some(jerk), Some(c1)) = (limits.max_jerk(), c1) {
                let acc = (vel - c0) / period;
                let prev_acc = (c0 - c1) / period;
                let da = jerk * period;
                let (a, c) = clamp_checked(acc, prev_acc - da, prev_acc + da);
                if c {
                    vel = c0 + a * period;
                    clamped = true;
                }
            }
            if let Some(acc) = limits.max_acceleration() {
                let dv = acc * period;
                let (v, c) = clamp_checked(vel, c0 - dv, c0 + dv);
                vel = v;
                clamped |= c;
            }
        }

        let (v, c) = limits.limit_velocity_checked(vel);
        (v, clamped | c)
    }

    fn enforce_effort(&self, limits: &Limits, measured: &JointFeedback, cmd: f64) -> (f64, bool) {
        let c0 = self.last_command().unwrap_or(measured.effort);
        let (mut eff, mut clamped) = sanitize(cmd, c0);

        if let Some((lo, hi)) = limits.effort_soft_bounds(measured.position, measured.velocity) {
            let (e, c) = clamp_checked(eff, lo, hi);
            eff = e;
            clamped |= c;
        }

        if self.stop_on_limit {
            let (e, c) = limits.stop_on_position_limit(eff, measured.position);
            eff = e;
            clamped |= c;
        }

        let (e, c) = limits.limit_effort_checked(eff);
        (e, clamped | c)
    }
}

/// Replace a non-finite command by the hold value.
#[inline]
fn sanitize(cmd: f64, hold: f64) -> (f64, bool) {
    if cmd.is_finite() { (cmd, false) } else { (hold, true) }
}

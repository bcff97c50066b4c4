//! Deterministic cycle: read → write, paced at a fixed period.
//!
//! ## RT Setup Sequence
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. Prefault stack pages.
//! 3. `sched_setaffinity`: pin to the configured CPU core.
//! 4. `sched_setscheduler(SCHED_FIFO, prio)`.
//!
//! Every step is a no-op without the `rt` feature.
//!
//! ## Cycle Loop
//! With `rt`, absolute-time sleep on `CLOCK_MONOTONIC`; otherwise
//! `std::thread::sleep` for the remainder of the period. Between cycles the
//! runner drains controller stop requests queued by the stop dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

use crate::control::ControlLayer;
use crate::error::CycleError;
use crate::layer::{LayerState, LayerStatus};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing and clamping statistics.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of overruns detected.
    pub overruns: u64,
    /// Maximum wake-up latency [ns].
    pub max_latency_ns: i64,
    /// Commands clamped, summed over all joints and cycles.
    pub clamped_commands: u64,
    /// Cycles with at least one clamped command.
    pub clamped_cycles: u64,
}

impl CycleStats {
    /// Zeroed stats.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
            clamped_commands: 0,
            clamped_cycles: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns += duration_ns;
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Record how many joints were clamped in one cycle.
    #[inline]
    pub fn record_clamps(&mut self, clamped: u32) {
        if clamped > 0 {
            self.clamped_commands += u64::from(clamped);
            self.clamped_cycles += 1;
        }
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), CycleError> {
    use nix::sys::mman::{mlockall, MlockallFlags};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| CycleError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), CycleError> {
    Ok(())
}

/// Touch 256 KiB of stack so the cycle never faults it in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), CycleError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpuset = CpuSet::new();
    cpuset
        .set(cpu)
        .map_err(|e| CycleError::RtSetup(format!("CpuSet::set({cpu}) failed: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)
        .map_err(|e| CycleError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), CycleError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), CycleError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(CycleError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), CycleError> {
    Ok(())
}

/// Full RT setup. Call on the cycle thread before [`CycleRunner::run`].
///
/// # Errors
///
/// `CycleError::RtSetup` if a system call fails.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), CycleError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    Ok(())
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Owns the control layer and paces its cycle.
pub struct CycleRunner {
    layer: ControlLayer,
    cycle_time: Duration,
    running: Arc<AtomicBool>,
    stop_requests: Option<UnboundedReceiver<Vec<String>>>,
    last_status: LayerStatus,
    last_write: Option<Instant>,
}

impl CycleRunner {
    /// Runner at `cycle_time`; the loop exits once `running` is cleared.
    pub fn new(layer: ControlLayer, cycle_time: Duration, running: Arc<AtomicBool>) -> Self {
        Self {
            layer,
            cycle_time,
            running,
            stop_requests: None,
            last_status: LayerStatus::Ok,
            last_write: None,
        }
    }

    /// Apply controller stop requests arriving on `rx` between cycles.
    #[must_use]
    pub fn with_stop_requests(mut self, rx: UnboundedReceiver<Vec<String>>) -> Self {
        self.stop_requests = Some(rx);
        self
    }

    /// The control layer.
    pub fn layer(&self) -> &ControlLayer {
        &self.layer
    }

    /// The control layer, mutable.
    pub fn layer_mut(&mut self) -> &mut ControlLayer {
        &mut self.layer
    }

    /// Give the control layer back.
    pub fn into_layer(self) -> ControlLayer {
        self.layer
    }

    /// Run until the running flag is cleared, then do one `Shutdown` cycle.
    ///
    /// # Errors
    ///
    /// `CycleError::RtSetup` if the monotonic clock cannot be read.
    pub fn run(&mut self) -> Result<(), CycleError> {
        info!(cycle_us = self.cycle_time.as_micros() as u64, "cycle loop started");

        #[cfg(feature = "rt")]
        self.run_rt_loop()?;

        #[cfg(not(feature = "rt"))]
        self.run_sim_loop();

        self.step(LayerState::Shutdown);
        self.layer.shutdown();
        let stats = self.layer.stats();
        info!(
            cycles = stats.cycle_count,
            overruns = stats.overruns,
            avg_ns = stats.avg_cycle_ns(),
            max_ns = stats.max_cycle_ns,
            clamped = stats.clamped_commands,
            "cycle loop stopped"
        );
        Ok(())
    }

    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self) -> Result<(), CycleError> {
        use nix::time::{clock_gettime, clock_nanosleep, ClockId, ClockNanosleepFlags};

        let clock = ClockId::CLOCK_MONOTONIC;
        let cycle_ns = self.cycle_time.as_nanos() as i64;
        let mut next_wake = clock_gettime(clock)
            .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

        while self.running.load(Ordering::Acquire) {
            next_wake = timespec_add_ns(next_wake, cycle_ns);

            let cycle_start = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;
            self.step(LayerState::Ready);
            let cycle_end = clock_gettime(clock)
                .map_err(|e| CycleError::RtSetup(format!("clock_gettime: {e}")))?;

            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start);
            let latency_ns = timespec_diff_ns(&cycle_start, &next_wake).abs();
            self.record_timing(duration_ns, latency_ns);

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(())
    }

    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self) {
        while self.running.load(Ordering::Acquire) {
            let cycle_start = Instant::now();
            self.step(LayerState::Ready);
            let elapsed = cycle_start.elapsed();
            self.record_timing(elapsed.as_nanos() as i64, 0);

            if let Some(remaining) = self.cycle_time.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }
    }

    fn record_timing(&mut self, duration_ns: i64, latency_ns: i64) {
        let budget_ns = self.cycle_time.as_nanos() as i64;
        let stats = self.layer.stats_mut();
        stats.record(duration_ns, latency_ns);
        if duration_ns > budget_ns {
            stats.overruns += 1;
        }
    }

    /// One cycle: pending stop requests, then read → write.
    pub fn step(&mut self, state: LayerState) -> LayerStatus {
        self.drain_stop_requests();

        let now = Instant::now();
        let period = self
            .last_write
            .map_or(self.cycle_time, |last| now.duration_since(last));
        self.last_write = Some(now);

        let status = self
            .layer
            .read(state)
            .worst(self.layer.write(state, period, false));
        if status != self.last_status {
            match status {
                LayerStatus::Ok => info!("control layer status ok"),
                LayerStatus::Warn(msg) => warn!(msg, "control layer degraded"),
                LayerStatus::Error(msg) => error!(msg, "control layer error"),
            }
            self.last_status = status;
        }
        status
    }

    fn drain_stop_requests(&mut self) {
        let Some(rx) = self.stop_requests.as_mut() else {
            return;
        };
        while let Ok(names) = rx.try_recv() {
            match self.layer.stop_controllers(&names) {
                Ok(_) => info!(controllers = ?names, "stop request applied"),
                Err(e) => error!(controllers = ?names, error = %e, "stop request failed"),
            }
        }
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    while nanos < 0 {
        secs -= 1;
        nanos += 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}

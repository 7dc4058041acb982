//! Lock-free tick counters.
//!
//! The tick loop updates these with atomic operations; the console reads
//! them at its own pace.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::{Duration, Instant};
use voxelcraft_engine::world::tick_driver::TickReport;

/// Tick duration above which the tick counts as overrun (one 20 Hz slot).
pub const TICK_BUDGET: Duration = Duration::from_millis(50);

/// Atomic tick counters.
pub struct Metrics {
    // Monotonic counters
    ticks: AtomicU64,
    tick_ns_sum: AtomicU64,
    scheduled_run: AtomicU64,
    chunks_unloaded: AtomicU64,
    chunks_saved: AtomicU64,
    nights_skipped: AtomicU64,
    faults: AtomicU64,

    // Tick duration histogram buckets
    hist_under_1ms: AtomicU64,
    hist_1_10ms: AtomicU64,
    hist_10_50ms: AtomicU64,
    hist_over_50ms: AtomicU64,

    // Gauges
    scheduled_pending: AtomicU64,
    light_pending: AtomicU64,

    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            tick_ns_sum: AtomicU64::new(0),
            scheduled_run: AtomicU64::new(0),
            chunks_unloaded: AtomicU64::new(0),
            chunks_saved: AtomicU64::new(0),
            nights_skipped: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            hist_under_1ms: AtomicU64::new(0),
            hist_1_10ms: AtomicU64::new(0),
            hist_10_50ms: AtomicU64::new(0),
            hist_over_50ms: AtomicU64::new(0),
            scheduled_pending: AtomicU64::new(0),
            light_pending: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Called after each successful world tick.
    pub fn record_tick(&self, report: &TickReport, duration: Duration) {
        self.ticks.fetch_add(1, Relaxed);
        self.tick_ns_sum.fetch_add(duration.as_nanos() as u64, Relaxed);
        self.scheduled_run.fetch_add(report.scheduled_run as u64, Relaxed);
        self.chunks_unloaded.fetch_add(report.chunks_unloaded as u64, Relaxed);
        self.chunks_saved.fetch_add(report.chunks_saved as u64, Relaxed);
        if report.night_skipped {
            self.nights_skipped.fetch_add(1, Relaxed);
        }
        self.scheduled_pending.store(report.scheduled_pending as u64, Relaxed);
        self.light_pending.store(report.light_pending as u64, Relaxed);

        let bucket = match duration.as_millis() {
            0 => &self.hist_under_1ms,
            1..=9 => &self.hist_1_10ms,
            10..=49 => &self.hist_10_50ms,
            _ => &self.hist_over_50ms,
        };
        bucket.fetch_add(1, Relaxed);
    }

    /// Called when a tick surfaced a storage fault.
    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Relaxed);
    }

    /// Read all counters into a serializable snapshot.
    pub fn snapshot(&self, chunks_loaded: usize, players: usize) -> MetricsSnapshot {
        let ticks = self.ticks.load(Relaxed);
        let ns = self.tick_ns_sum.load(Relaxed);
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            ticks,
            mean_tick_ms: if ticks == 0 {
                0.0
            } else {
                ns as f64 / ticks as f64 / 1_000_000.0
            },
            scheduled_run: self.scheduled_run.load(Relaxed),
            scheduled_pending: self.scheduled_pending.load(Relaxed),
            light_pending: self.light_pending.load(Relaxed),
            chunks_loaded: chunks_loaded as u64,
            chunks_unloaded: self.chunks_unloaded.load(Relaxed),
            chunks_saved: self.chunks_saved.load(Relaxed),
            nights_skipped: self.nights_skipped.load(Relaxed),
            faults: self.faults.load(Relaxed),
            players: players as u64,
            hist: [
                self.hist_under_1ms.load(Relaxed),
                self.hist_1_10ms.load(Relaxed),
                self.hist_10_50ms.load(Relaxed),
                self.hist_over_50ms.load(Relaxed),
            ],
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of all metrics at a point in time.
#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub ticks: u64,
    pub mean_tick_ms: f64,
    pub scheduled_run: u64,
    pub scheduled_pending: u64,
    pub light_pending: u64,
    pub chunks_loaded: u64,
    pub chunks_unloaded: u64,
    pub chunks_saved: u64,
    pub nights_skipped: u64,
    pub faults: u64,
    pub players: u64,
    /// `[<1ms, 1-10ms, 10-50ms, >50ms]`
    pub hist: [u64; 4],
}

impl MetricsSnapshot {
    /// Share of ticks that ran past [`TICK_BUDGET`].
    pub fn overrun_ratio(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.hist[3] as f64 / self.ticks as f64
        }
    }
}

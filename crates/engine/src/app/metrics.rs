use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use super::TickReport;

static POISON_WARNING_EMITTED: AtomicBool = AtomicBool::new(false);

fn note_poisoned_metrics_lock(operation: &'static str) {
    if POISON_WARNING_EMITTED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics_lock_poisoned");
    }
}

/// Rates over the last metrics interval plus running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    pub ticks_total: u64,
    pub failures_total: u64,
    pub events_in_interval: u32,
}

/// Shared read side of the loop metrics.
#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                note_poisoned_metrics_lock("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                note_poisoned_metrics_lock("write");
                *poisoned.into_inner() = snapshot;
            }
        }
    }
}

/// Collects frames and tick reports between snapshots. Time is supplied by the
/// caller so headless runs can use a virtual clock.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    ticks: u32,
    events: u32,
    frame_time_sum: Duration,
    ticks_total: u64,
    failures_total: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, started_at: Instant) -> Self {
        Self {
            interval_start: started_at,
            interval,
            frames: 0,
            ticks: 0,
            events: 0,
            frame_time_sum: Duration::ZERO,
            ticks_total: 0,
            failures_total: 0,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self, report: &TickReport) {
        self.ticks = self.ticks.saturating_add(1);
        self.events = self.events.saturating_add(report.events.total);
        self.ticks_total = self.ticks_total.saturating_add(1);
        self.failures_total = self.failures_total.saturating_add(report.failures as u64);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            ticks_total: self.ticks_total,
            failures_total: self.failures_total,
            events_in_interval: self.events,
        };

        self.interval_start = now;
        self.frames = 0;
        self.ticks = 0;
        self.events = 0;
        self.frame_time_sum = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;
    use std::thread;

    use super::*;
    use crate::behavior::BehaviorEventCounts;

    fn poison_lock(lock: &RwLock<LoopMetricsSnapshot>) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = lock.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    fn report(failures: usize, events: u32) -> TickReport {
        TickReport {
            failures,
            events: BehaviorEventCounts {
                total: events,
                ..BehaviorEventCounts::default()
            },
            ..TickReport::default()
        }
    }

    #[test]
    fn snapshot_reports_rates_and_running_totals() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);

        accumulator.record_frame(Duration::from_millis(16));
        accumulator.record_frame(Duration::from_millis(16));
        accumulator.record_tick(&report(0, 3));
        accumulator.record_tick(&report(1, 2));

        let snapshot = accumulator
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");
        assert!((snapshot.fps - 2.0).abs() < 0.05);
        assert!((snapshot.tps - 2.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 16.0).abs() < 0.001);
        assert_eq!(snapshot.events_in_interval, 5);
        assert_eq!(snapshot.failures_total, 1);

        accumulator.record_tick(&report(0, 0));
        let next = accumulator
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second snapshot");
        assert_eq!(next.ticks_total, 3);
        assert_eq!(next.events_in_interval, 0);
        assert_eq!(next.failures_total, 1);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let base = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), base);
        accumulator.record_frame(Duration::from_millis(16));

        assert!(accumulator
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn handle_recovers_after_poison_without_panic() {
        let handle = MetricsHandle::default();
        poison_lock(handle.snapshot.as_ref());
        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());

        let expected = LoopMetricsSnapshot {
            fps: 60.0,
            tps: 1.0,
            ticks_total: 42,
            ..LoopMetricsSnapshot::default()
        };
        handle.publish(expected);
        assert_eq!(handle.snapshot(), expected);
    }
}

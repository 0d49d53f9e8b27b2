use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::metrics::MetricsAccumulator;
use super::{MetricsHandle, Simulation};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub target_fps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// `None` runs until the process is stopped.
    pub max_ticks: Option<u64>,
    /// Pace frames against the wall clock instead of a virtual one.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 1,
            target_fps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: Some(600),
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks_run: u64,
    pub frames: u64,
    pub failures: u64,
    pub clamp_events: u64,
}

/// Drives `simulation` with a fixed-timestep accumulator: ticks at
/// `target_tps`, motion once per frame at `target_fps`.
pub fn run_headless(
    simulation: &mut Simulation,
    config: &LoopConfig,
    metrics_handle: &MetricsHandle,
) -> LoopSummary {
    let target_tps = config.target_tps.max(1);
    let target_fps = config.target_fps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let frame_dt = Duration::from_secs_f64(1.0 / target_fps as f64);

    info!(
        target_tps,
        target_fps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        max_ticks = ?config.max_ticks,
        realtime = config.realtime,
        start_tick = simulation.tick(),
        "loop_config"
    );

    let started_at = Instant::now();
    let mut clock = started_at;
    let mut last_frame_instant = started_at;
    let mut accumulator = Duration::ZERO;
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, started_at);
    let mut summary = LoopSummary::default();

    while !tick_limit_reached(&summary, config.max_ticks) {
        let raw_frame_dt = if config.realtime {
            let now = Instant::now();
            let elapsed = now.saturating_duration_since(last_frame_instant);
            last_frame_instant = now;
            clock = now;
            elapsed
        } else {
            clock += frame_dt;
            frame_dt
        };

        let clamped_frame_dt = clamp_frame_delta(raw_frame_dt, max_frame_delta);
        accumulator = accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let report = simulation.step_tick();
            debug!(
                tick = report.tick,
                characters = report.characters,
                failures = report.failures,
                events = report.events.total,
                "tick_completed"
            );
            metrics_accumulator.record_tick(&report);
            summary.ticks_run = summary.ticks_run.saturating_add(1);
            summary.failures = summary.failures.saturating_add(report.failures as u64);
            if tick_limit_reached(&summary, config.max_ticks) {
                break;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            summary.clamp_events = summary.clamp_events.saturating_add(1);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        simulation.advance_frame(clamped_frame_dt.as_secs_f32());
        summary.frames = summary.frames.saturating_add(1);
        metrics_accumulator.record_frame(raw_frame_dt);

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(clock) {
            metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                ticks = snapshot.ticks_total,
                failures = snapshot.failures_total,
                events = snapshot.events_in_interval,
                entity_count = simulation.world().entity_count(),
                "loop_metrics"
            );
        }

        if config.realtime {
            let frame_elapsed = Instant::now().saturating_duration_since(last_frame_instant);
            let cap_sleep = compute_cap_sleep(frame_elapsed, frame_dt);
            if cap_sleep > Duration::ZERO {
                thread::sleep(cap_sleep);
            }
        }
    }

    info!(
        ticks_run = summary.ticks_run,
        frames = summary.frames,
        failures = summary.failures,
        clamp_events = summary.clamp_events,
        "loop_finished"
    );
    summary
}

fn tick_limit_reached(summary: &LoopSummary, max_ticks: Option<u64>) -> bool {
    max_ticks.is_some_and(|max| summary.ticks_run >= max)
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    // Anything still at or above one tick is backlog the frame cap refused.
    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_cap_sleep(elapsed: Duration, target: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

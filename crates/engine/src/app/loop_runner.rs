use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use super::metrics::{LoopMetricsSnapshot, TickWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Fixed-step game state driven by [`run_headless`].
pub trait Simulation {
    type Error: std::error::Error + Send + Sync + 'static;

    fn update(&mut self, fixed_dt_seconds: f32) -> Result<LoopControl, Self::Error>;

    fn shutdown(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleeps between frames so simulated time tracks the wall clock.
    RealTime,
    /// Runs one fixed step per frame back to back.
    Unpaced,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub pacing: Pacing,
    /// Hard stop after this many ticks; `None` runs until the simulation exits.
    pub max_total_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            pacing: Pacing::RealTime,
            max_total_ticks: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoopError<E: std::error::Error + 'static> {
    #[error("simulation failed on tick {tick}: {source}")]
    Tick {
        tick: u64,
        #[source]
        source: E,
    },
    #[error("simulation shutdown failed: {0}")]
    Shutdown(#[source] E),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopSummary {
    pub ticks_run: u64,
    pub dropped_backlog: Duration,
    /// Throughput over the last, possibly partial, reporting window.
    pub final_metrics: Option<LoopMetricsSnapshot>,
}

/// Drives `simulation` until it exits or the tick limit is reached.
///
/// `shutdown` runs on every exit path, including after a failed tick; the
/// tick error takes precedence over a shutdown error.
pub fn run_headless<S: Simulation>(
    config: &LoopConfig,
    simulation: &mut S,
) -> Result<LoopSummary, LoopError<S::Error>> {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        pacing = ?config.pacing,
        "loop_config"
    );

    let mut summary = LoopSummary::default();
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_window = TickWindow::open(metrics_log_interval, last_frame_instant);

    'frames: loop {
        let now = Instant::now();
        let frame_dt = match config.pacing {
            Pacing::RealTime => {
                let raw = now.saturating_duration_since(last_frame_instant);
                clamp_frame_delta(raw, max_frame_delta)
            }
            Pacing::Unpaced => fixed_dt,
        };
        last_frame_instant = now;
        accumulator = accumulator.saturating_add(frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if config
                .max_total_ticks
                .is_some_and(|limit| summary.ticks_run >= limit)
            {
                info!(ticks_run = summary.ticks_run, "tick_limit_reached");
                break 'frames;
            }

            let tick_start = Instant::now();
            let control = match simulation.update(fixed_dt_seconds) {
                Ok(control) => control,
                Err(source) => {
                    if let Err(shutdown_error) = simulation.shutdown() {
                        warn!(error = %shutdown_error, "shutdown_after_tick_error_failed");
                    }
                    return Err(LoopError::Tick {
                        tick: summary.ticks_run,
                        source,
                    });
                }
            };
            summary.ticks_run += 1;
            metrics_window.record(Instant::now().saturating_duration_since(tick_start));

            if control == LoopControl::Exit {
                info!(ticks_run = summary.ticks_run, "shutdown_requested");
                break 'frames;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            summary.dropped_backlog = summary
                .dropped_backlog
                .saturating_add(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_window.close_if_due(Instant::now()) {
            summary.final_metrics = Some(snapshot);
            info!(
                tps = snapshot.tps,
                mean_tick_ms = snapshot.mean_tick_ms,
                slowest_tick_ms = snapshot.slowest_tick_ms,
                total_ticks = summary.ticks_run,
                "loop_metrics"
            );
        }

        if config.pacing == Pacing::RealTime {
            let sleep = fixed_dt.saturating_sub(accumulator);
            if sleep > Duration::ZERO {
                thread::sleep(sleep);
            }
        }
    }

    if let Some(snapshot) = metrics_window.close(Instant::now()) {
        summary.final_metrics = Some(snapshot);
    }
    simulation.shutdown().map_err(LoopError::Shutdown)?;
    info!(ticks_run = summary.ticks_run, "shutdown");
    Ok(summary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPlan {
    pub ticks_to_run: u32,
    pub remaining_accumulator: Duration,
    pub dropped_backlog: Duration,
}

pub fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

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

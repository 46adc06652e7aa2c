use std::time::{Duration, Instant};

/// Tick throughput over one reporting window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub mean_tick_ms: f32,
    pub slowest_tick_ms: f32,
}

#[derive(Debug)]
pub(crate) struct TickWindow {
    opened_at: Instant,
    length: Duration,
    ticks: u32,
    busy: Duration,
    slowest: Duration,
}

impl TickWindow {
    pub(crate) fn open(length: Duration, now: Instant) -> Self {
        Self {
            opened_at: now,
            length,
            ticks: 0,
            busy: Duration::ZERO,
            slowest: Duration::ZERO,
        }
    }

    pub(crate) fn record(&mut self, tick_time: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.busy = self.busy.saturating_add(tick_time);
        self.slowest = self.slowest.max(tick_time);
    }

    /// Closes the window once `length` has passed and starts the next one.
    pub(crate) fn close_if_due(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        if now.saturating_duration_since(self.opened_at) < self.length {
            return None;
        }
        self.close(now)
    }

    /// Closes the window regardless of its length. `None` if no tick landed in it.
    pub(crate) fn close(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let span = now.saturating_duration_since(self.opened_at);
        let next = Self::open(self.length, now);
        let finished = std::mem::replace(self, next);
        if finished.ticks == 0 {
            return None;
        }

        let ticks = finished.ticks as f32;
        Some(LoopMetricsSnapshot {
            tps: ticks / span.as_secs_f32().max(f32::EPSILON),
            mean_tick_ms: finished.busy.as_secs_f32() * 1000.0 / ticks,
            slowest_tick_ms: finished.slowest.as_secs_f32() * 1000.0,
        })
    }
}

use std::time::Duration;

/// Coalesces save requests into one write per debounce window. The window
/// opens on the first request and the timer only moves when `advance` is
/// called, once per tick.
#[derive(Debug, Clone)]
pub struct SaveScheduler {
    debounce: Duration,
    elapsed: Duration,
    pending: bool,
}

impl SaveScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            elapsed: Duration::ZERO,
            pending: false,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn request(&mut self) {
        if !self.pending {
            self.pending = true;
            self.elapsed = Duration::ZERO;
        }
    }

    /// Returns `true` when the pending save is due; the request is consumed.
    pub fn advance(&mut self, dt: Duration) -> bool {
        if !self.pending {
            return false;
        }
        self.elapsed = self.elapsed.saturating_add(dt);
        if self.elapsed < self.debounce {
            return false;
        }
        self.clear();
        true
    }

    /// Consumes a pending request immediately, for flushing on suspend.
    pub fn take_pending(&mut self) -> bool {
        let pending = self.pending;
        self.clear();
        pending
    }

    pub fn clear(&mut self) {
        self.pending = false;
        self.elapsed = Duration::ZERO;
    }
}

/// Restartable countdown for the overall race clock.
///
/// Reaching zero clamps the remaining time, stops the timer and reports
/// the expiry once. Only `reset` re-arms it.
#[derive(Debug, Clone, Default)]
pub struct RaceTimer {
    is_running: bool,
    is_expired: bool,
    remaining_ms: u64,
    previous_tick_ms: Option<u64>,
}

impl RaceTimer {
    pub fn new(starting_ms: u64) -> Self {
        Self {
            remaining_ms: starting_ms,
            ..Self::default()
        }
    }

    /// Resume counting down. An expired timer stays stopped until reset.
    pub fn start(&mut self, now_ms: u64) {
        if self.is_running || self.is_expired {
            return;
        }
        self.is_running = true;
        self.previous_tick_ms = Some(now_ms);
    }

    /// Fold in the time up to `now_ms` and freeze.
    ///
    /// Returns `true` when that final fold expired the timer.
    pub fn pause(&mut self, now_ms: u64) -> bool {
        if !self.is_running {
            return false;
        }
        let expired = self.tick(now_ms);
        self.is_running = false;
        self.previous_tick_ms = None;
        expired
    }

    pub fn reset(&mut self, starting_ms: u64) {
        self.remaining_ms = starting_ms;
        self.is_running = false;
        self.is_expired = false;
        self.previous_tick_ms = None;
    }

    /// # Advance the countdown
    /// subtract the wall-clock time since the previous tick
    ///
    /// ## Arguments
    /// * `now_ms` - the current clock reading
    ///
    /// ## Returns
    /// * `bool` - true exactly once, on the tick that brought the clock to zero
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if !self.is_running {
            return false;
        }
        let previous = self.previous_tick_ms.unwrap_or(now_ms);
        let delta = now_ms.saturating_sub(previous);
        self.previous_tick_ms = Some(now_ms);

        if delta < self.remaining_ms {
            self.remaining_ms -= delta;
            return false;
        }

        self.remaining_ms = 0;
        self.is_expired = true;
        self.is_running = false;
        self.previous_tick_ms = None;
        true
    }

    pub fn current_time_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired
    }
}

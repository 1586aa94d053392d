/// Restartable stopwatch for the lap currently being driven.
///
/// Elapsed time is accumulated from the difference between consecutive
/// tick timestamps, so a late tick never loses time.
#[derive(Debug, Clone, Default)]
pub struct LapTimer {
    is_running: bool,
    elapsed_ms: u64,
    previous_tick_ms: Option<u64>,
}

impl LapTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume counting from the held elapsed value.
    pub fn start(&mut self, now_ms: u64) {
        if self.is_running {
            return;
        }
        self.is_running = true;
        self.previous_tick_ms = Some(now_ms);
    }

    /// Fold in the time up to `now_ms` and freeze.
    pub fn pause(&mut self, now_ms: u64) {
        if !self.is_running {
            return;
        }
        self.tick(now_ms);
        self.is_running = false;
        self.previous_tick_ms = None;
    }

    /// Set the elapsed value and stop running.
    pub fn reset(&mut self, starting_ms: u64) {
        self.elapsed_ms = starting_ms;
        self.is_running = false;
        self.previous_tick_ms = None;
    }

    pub fn tick(&mut self, now_ms: u64) {
        if !self.is_running {
            return;
        }
        let previous = self.previous_tick_ms.unwrap_or(now_ms);
        self.elapsed_ms += now_ms.saturating_sub(previous);
        self.previous_tick_ms = Some(now_ms);
    }

    pub fn current_time_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_up_from_wall_clock_deltas() {
        let mut timer = LapTimer::new();
        timer.start(1000);
        timer.tick(1010);
        timer.tick(1035); // late tick
        timer.tick(1040);
        assert_eq!(timer.current_time_ms(), 40);
        assert!(timer.is_running());
    }

    #[test]
    fn freezes_at_pause_instant() {
        let mut timer = LapTimer::new();
        timer.start(0);
        timer.tick(500);
        timer.pause(730);
        assert_eq!(timer.current_time_ms(), 730);

        timer.tick(5000);
        assert_eq!(timer.current_time_ms(), 730);
        assert!(!timer.is_running());

        timer.start(6000);
        timer.tick(6270);
        assert_eq!(timer.current_time_ms(), 1000);
    }

    #[test]
    fn never_decreases_while_running() {
        let mut timer = LapTimer::new();
        timer.start(100);
        let mut last = 0;
        for now in [100, 90, 150, 150, 400, 399, 1000] {
            timer.tick(now);
            assert!(timer.current_time_ms() >= last);
            last = timer.current_time_ms();
        }
    }

    #[test]
    fn reset_stops_and_sets_value() {
        let mut timer = LapTimer::new();
        timer.start(0);
        timer.tick(200);
        timer.reset(45_000);
        assert!(!timer.is_running());
        assert_eq!(timer.current_time_ms(), 45_000);

        timer.start(1000);
        timer.tick(1500);
        assert_eq!(timer.current_time_ms(), 45_500);
    }

    #[test]
    fn start_while_running_keeps_segment() {
        let mut timer = LapTimer::new();
        timer.start(0);
        timer.start(300);
        timer.tick(400);
        assert_eq!(timer.current_time_ms(), 400);
    }
}

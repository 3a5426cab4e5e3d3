use std::time::{Duration, Instant};

/// Quiet-period tracker for the control loop.
///
/// Idle until an interesting event arrives, then Armed. Every further event
/// pushes the deadline out again, so a burst produces one trigger that fires
/// `min_wait` after its *last* event. Time is always passed in.
#[derive(Debug)]
pub struct Debounce {
    min_wait: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(min_wait: Duration) -> Self {
        Self {
            min_wait,
            last: None,
        }
    }

    /// Record an interesting event (Idle/Armed -> Armed).
    pub fn arm(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Whether a run should be triggered at `now`. Does not change state;
    /// the trigger is cleared with [`Debounce::disarm`] once consumed.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.min_wait,
            None => false,
        }
    }

    /// Armed -> Idle. Called when the run trigger is consumed.
    pub fn disarm(&mut self) {
        self.last = None;
    }

    pub fn is_armed(&self) -> bool {
        self.last.is_some()
    }

    /// Polling interval for the loop: a quarter of the quiet period, so the
    /// added latency is bounded by `min_wait / 4`.
    pub fn tick_interval(&self) -> Duration {
        (self.min_wait / 4).max(Duration::from_millis(1))
    }
}

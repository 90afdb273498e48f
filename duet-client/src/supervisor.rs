use std::time::Duration;
use tokio::time::Instant;

/// Owns the timing side of one call: negotiation deadline, elapsed clock, and the
/// exactly-once teardown guard.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    negotiation_deadline: Duration,
    negotiation_started: Option<Instant>,
    clock_started: Option<Instant>,
    final_elapsed: Option<Duration>,
    torn_down: bool,
}

impl ConnectionSupervisor {
    pub fn new(negotiation_deadline: Duration) -> Self {
        Self {
            negotiation_deadline,
            negotiation_started: None,
            clock_started: None,
            final_elapsed: None,
            torn_down: false,
        }
    }

    /// Start the negotiation deadline. Later calls keep the first start.
    pub fn arm(&mut self, now: Instant) {
        if self.negotiation_started.is_none() {
            self.negotiation_started = Some(now);
        }
    }

    /// Instant at which an unconnected member is forced to Failed, while that can still happen.
    pub fn deadline(&self) -> Option<Instant> {
        if self.clock_started.is_some() || self.torn_down {
            return None;
        }
        self.negotiation_started
            .map(|started| started + self.negotiation_deadline)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    /// Start the elapsed clock on reaching Connected. Returns false if already started.
    pub fn start_clock(&mut self, now: Instant) -> bool {
        if self.clock_started.is_some() || self.torn_down {
            return false;
        }
        self.clock_started = Some(now);
        true
    }

    /// Stop the clock. Returns the call duration the first time, `None` afterwards
    /// or if the call never connected.
    pub fn stop_clock(&mut self, now: Instant) -> Option<Duration> {
        let started = self.clock_started?;
        if self.final_elapsed.is_some() {
            return None;
        }
        let elapsed = now.saturating_duration_since(started);
        self.final_elapsed = Some(elapsed);
        Some(elapsed)
    }

    pub fn is_running(&self) -> bool {
        self.clock_started.is_some() && self.final_elapsed.is_none()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match (self.clock_started, self.final_elapsed) {
            (_, Some(elapsed)) => elapsed,
            (Some(started), None) => now.saturating_duration_since(started),
            (None, None) => Duration::ZERO,
        }
    }

    /// Claims the single teardown. Returns true only for the first caller.
    pub fn begin_teardown(&mut self) -> bool {
        !std::mem::replace(&mut self.torn_down, true)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

/// Render whole seconds as `MM:SS`; minutes keep growing past 59.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

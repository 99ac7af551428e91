/// State of the one-shot emission clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    /// Never armed.
    #[default]
    Idle,
    /// A firing is pending for the next deferred pass.
    Armed,
    /// The last pending firing has been delivered.
    Fired,
    /// Torn down; never fires again.
    Cancelled,
}

/// Deferred one-shot trigger owned by an envelope object.
///
/// `arm` schedules a zero-delay firing; the host's deferred pass calls
/// `fire`. Arming while already armed keeps a single pending firing, like
/// re-setting a clock before it went off.
///
/// # Example
/// ```
/// use ep_dsp::scheduler::{ClockState, EmissionScheduler};
///
/// let mut clock = EmissionScheduler::new();
/// clock.arm();
/// assert!(clock.is_armed());
/// assert!(clock.fire());
/// assert!(!clock.fire());
/// assert_eq!(clock.state(), ClockState::Fired);
/// ```
#[derive(Debug, Default)]
pub struct EmissionScheduler {
    state: ClockState,
    armed_count: u64,
    fired_count: u64,
}

impl EmissionScheduler {
    /// Create an idle clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a firing for the next deferred pass. No-op once cancelled.
    pub fn arm(&mut self) {
        if self.state == ClockState::Cancelled {
            return;
        }
        self.state = ClockState::Armed;
        self.armed_count += 1;
    }

    /// Consume the pending firing, if any. Returns `true` if the caller must emit.
    pub fn fire(&mut self) -> bool {
        if self.state != ClockState::Armed {
            return false;
        }
        self.state = ClockState::Fired;
        self.fired_count += 1;
        true
    }

    /// Drop any pending firing and refuse further arming.
    pub fn cancel(&mut self) {
        if self.state == ClockState::Armed {
            log::debug!("envpeak~ : émission en attente annulée");
        }
        self.state = ClockState::Cancelled;
    }

    /// `true` if a firing is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state == ClockState::Armed
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Number of `arm` calls accepted.
    #[must_use]
    pub fn armed_count(&self) -> u64 {
        self.armed_count
    }

    /// Number of firings delivered.
    #[must_use]
    pub fn fired_count(&self) -> u64 {
        self.fired_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_clock_does_not_fire() {
        let mut clock = EmissionScheduler::new();
        assert_eq!(clock.state(), ClockState::Idle);
        assert!(!clock.fire());
    }

    #[test]
    fn rearming_coalesces() {
        let mut clock = EmissionScheduler::new();
        clock.arm();
        clock.arm();
        assert!(clock.fire());
        assert!(!clock.fire());
        assert_eq!(clock.armed_count(), 2);
        assert_eq!(clock.fired_count(), 1);
    }

    #[test]
    fn cancel_drops_pending_and_blocks_rearm() {
        let mut clock = EmissionScheduler::new();
        clock.arm();
        clock.cancel();
        assert!(!clock.fire());
        clock.arm();
        assert!(!clock.is_armed());
        assert_eq!(clock.state(), ClockState::Cancelled);
    }

    #[test]
    fn fired_clock_can_be_rearmed() {
        let mut clock = EmissionScheduler::new();
        clock.arm();
        assert!(clock.fire());
        clock.arm();
        assert!(clock.fire());
        assert_eq!(clock.fired_count(), 2);
    }
}

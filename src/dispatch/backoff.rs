use std::fmt;
use std::time::{Duration, Instant};

/// Longest wait `next_run_at` hands out when the delay overflows the clock.
const FARTHEST_RUN: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Decides when the next dispatch tick runs.
///
/// Additive increase on transport-health failures, capped at `ceiling`;
/// straight back to `base` after any successful send.
///
/// ```text
/// failures in a row    delay (base=10s, step=30s, ceiling=300s)
/// ──────────────────────────────────────────────────────────────
///        0                 10s
///        1                 40s
///        2                 70s
///       ...
///       10                300s   (stays there until a send succeeds)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffTrigger {
    base: Duration,
    current: Duration,
    step: Duration,
    ceiling: Duration,
}

impl Default for BackoffTrigger {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(10),
            Duration::from_secs(30),
            Duration::from_secs(300),
        )
    }
}

impl fmt::Display for BackoffTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackoffTrigger(current={}s, base={}s, step={}s, ceiling={}s)",
            self.current.as_secs(),
            self.base.as_secs(),
            self.step.as_secs(),
            self.ceiling.as_secs()
        )
    }
}

impl BackoffTrigger {
    /// A ceiling below `base` is raised to `base`.
    pub fn new(base: Duration, step: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            current: base,
            step,
            ceiling: ceiling.max(base),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn current_delay(&self) -> Duration {
        self.current
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// When the next tick is due: `current_delay` after the last completion,
    /// or after `now` when nothing has completed yet. A delay too large for
    /// the platform clock is cut to one year from that point.
    pub fn next_run_at(&self, last_completion: Option<Instant>, now: Instant) -> Instant {
        let from = last_completion.unwrap_or(now);
        from
            .checked_add(self.current)
            .or_else(|| from.checked_add(FARTHEST_RUN))
            .unwrap_or(from)
    }

    /// Back off one step. Saturates at the ceiling.
    pub fn increase(&mut self) {
        self.current = self.current.saturating_add(self.step).min(self.ceiling);
    }

    /// Return to the base delay.
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    pub fn is_backing_off(&self) -> bool {
        self.current > self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn defaults() {
        let trigger = BackoffTrigger::default();
        assert_eq!(trigger.base(), secs(10));
        assert_eq!(trigger.current_delay(), secs(10));
        assert_eq!(trigger.step(), secs(30));
        assert_eq!(trigger.ceiling(), secs(300));
        assert!(!trigger.is_backing_off());
    }

    #[test]
    fn increase_is_additive() {
        let mut trigger = BackoffTrigger::default();
        trigger.increase();
        assert_eq!(trigger.current_delay(), secs(40));
        trigger.increase();
        assert_eq!(trigger.current_delay(), secs(70));
        assert!(trigger.is_backing_off());
    }

    #[test]
    fn increase_saturates_at_ceiling() {
        let mut trigger = BackoffTrigger::default();
        for _ in 0..100 {
            trigger.increase();
            assert!(trigger.current_delay() <= trigger.ceiling());
        }
        assert_eq!(trigger.current_delay(), secs(300));
    }

    #[test]
    fn reset_restores_base_after_any_number_of_increases() {
        let mut trigger = BackoffTrigger::default();
        for _ in 0..7 {
            trigger.increase();
        }
        trigger.reset();
        assert_eq!(trigger.current_delay(), secs(10));
    }

    #[test]
    fn ceiling_never_below_base() {
        let mut trigger = BackoffTrigger::new(secs(60), secs(30), secs(10));
        assert_eq!(trigger.ceiling(), secs(60));
        trigger.increase();
        assert_eq!(trigger.current_delay(), secs(60));
    }

    #[test]
    fn next_run_counts_from_last_completion() {
        let mut trigger = BackoffTrigger::default();
        let now = Instant::now();
        let completed = now - secs(5);

        assert_eq!(trigger.next_run_at(Some(completed), now), completed + secs(10));
        trigger.increase();
        assert_eq!(trigger.next_run_at(Some(completed), now), completed + secs(40));
    }

    #[test]
    fn first_run_counts_from_now() {
        let trigger = BackoffTrigger::default();
        let now = Instant::now();
        assert_eq!(trigger.next_run_at(None, now), now + secs(10));
    }

    #[test]
    fn huge_delay_does_not_overflow_the_clock() {
        let trigger = BackoffTrigger::new(Duration::MAX, secs(30), Duration::MAX);
        let now = Instant::now();
        assert_eq!(trigger.next_run_at(None, now), now + FARTHEST_RUN);
    }

    #[test]
    fn display_format() {
        let display = BackoffTrigger::default().to_string();
        assert!(display.contains("current=10s"));
        assert!(display.contains("ceiling=300s"));
    }
}

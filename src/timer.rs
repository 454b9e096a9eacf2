//! Cancellable single-shot deadlines.
//!
//! Nothing here runs on its own: the owner stores a [`Deadline`] and the event
//! loop asks it whether it is due. Dropping the owner drops the deadline, so a
//! disposed window can never be woken up.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// Arms the deadline `delay` after `now`, replacing any earlier schedule.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.at = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.at = None;
    }

    pub fn is_pending(&self) -> bool {
        self.at.is_some()
    }

    pub fn at(&self) -> Option<Instant> {
        self.at
    }

    /// Disarms and returns true when the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.at {
            Some(at) if at <= now => {
                self.at = None;
                true
            }
            _ => false,
        }
    }
}

/// Bounded short-delay polling for a container that has not been laid out.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    deadline: Deadline,
    attempts: u8,
    limit: u8,
    delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Scheduled { attempt: u8 },
    Exhausted,
}

impl RetryBudget {
    pub fn new(limit: u8, delay: Duration) -> Self {
        Self {
            deadline: Deadline::default(),
            attempts: 0,
            limit,
            delay,
        }
    }

    pub fn schedule(&mut self, now: Instant) -> RetryOutcome {
        if self.attempts >= self.limit {
            self.deadline.cancel();
            return RetryOutcome::Exhausted;
        }
        self.attempts += 1;
        self.deadline.schedule(now, self.delay);
        RetryOutcome::Scheduled {
            attempt: self.attempts,
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.deadline.cancel();
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        self.deadline.fire(now)
    }

    pub fn at(&self) -> Option<Instant> {
        self.deadline.at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_fires_once_after_due() {
        let t0 = Instant::now();
        let mut d = Deadline::default();
        d.schedule(t0, Duration::from_millis(20));
        assert!(!d.fire(t0 + Duration::from_millis(19)));
        assert!(d.fire(t0 + Duration::from_millis(20)));
        assert!(!d.fire(t0 + Duration::from_millis(40)));
    }

    #[test]
    fn reschedule_pushes_deadline_out() {
        let t0 = Instant::now();
        let mut d = Deadline::default();
        d.schedule(t0, Duration::from_millis(200));
        d.schedule(t0 + Duration::from_millis(150), Duration::from_millis(200));
        assert!(!d.fire(t0 + Duration::from_millis(200)));
        assert!(d.fire(t0 + Duration::from_millis(350)));
    }

    #[test]
    fn cancelled_deadline_never_fires() {
        let t0 = Instant::now();
        let mut d = Deadline::default();
        d.schedule(t0, Duration::ZERO);
        d.cancel();
        assert!(!d.fire(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn retry_budget_is_bounded() {
        let t0 = Instant::now();
        let mut budget = RetryBudget::new(2, Duration::from_millis(50));
        assert_eq!(budget.schedule(t0), RetryOutcome::Scheduled { attempt: 1 });
        assert_eq!(budget.schedule(t0), RetryOutcome::Scheduled { attempt: 2 });
        assert_eq!(budget.schedule(t0), RetryOutcome::Exhausted);
        budget.reset();
        assert_eq!(budget.attempts(), 0);
    }
}

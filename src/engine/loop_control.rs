use std::time::Duration;

use tokio::time::Instant;

use crate::engine::state::StopReason;

/// Step and wall-clock budget for one run, plus the consecutive-failure count.
pub struct LoopController {
    max_steps: usize,
    max_duration: Option<Duration>,
    start_time: Instant,
    steps_taken: usize,
    consecutive_failures: u32,
}

impl LoopController {
    pub fn new(max_steps: usize, max_duration: Option<Duration>) -> Self {
        Self {
            max_steps,
            max_duration,
            start_time: Instant::now(),
            steps_taken: 0,
            consecutive_failures: 0,
        }
    }

    pub fn record_step(&mut self, success: bool) {
        self.steps_taken += 1;
        if success {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn reset_failures(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Reason to end the run before starting another step, if any.
    pub fn should_stop(&self) -> Option<StopReason> {
        if self.steps_taken >= self.max_steps {
            return Some(StopReason::StepBudget);
        }
        match self.max_duration {
            Some(limit) if self.start_time.elapsed() >= limit => Some(StopReason::TimeBudget),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_budget() {
        let mut ctrl = LoopController::new(2, None);
        assert_eq!(ctrl.should_stop(), None);
        ctrl.record_step(true);
        ctrl.record_step(false);
        assert_eq!(ctrl.should_stop(), Some(StopReason::StepBudget));
        assert_eq!(ctrl.steps_taken(), 2);
    }

    #[test]
    fn test_zero_steps_stops_immediately() {
        assert_eq!(LoopController::new(0, None).should_stop(), Some(StopReason::StepBudget));
    }

    #[test]
    fn test_consecutive_failures_reset_on_success() {
        let mut ctrl = LoopController::new(10, None);
        ctrl.record_step(false);
        ctrl.record_step(false);
        assert_eq!(ctrl.consecutive_failures(), 2);
        ctrl.record_step(true);
        assert_eq!(ctrl.consecutive_failures(), 0);
        ctrl.record_step(false);
        ctrl.reset_failures();
        assert_eq!(ctrl.consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_budget() {
        let ctrl = LoopController::new(100, Some(Duration::from_secs(30)));
        assert_eq!(ctrl.should_stop(), None);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(ctrl.should_stop(), Some(StopReason::TimeBudget));
    }
}

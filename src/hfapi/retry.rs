use std::time::Duration;

/// Retry schedule for the inference call: a bounded number of attempts with
/// exponentially growing pauses in between. Kept separate from the call
/// itself so the schedule can be exercised without a transport.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            backoff: 2,
        }
    }
}

impl RetryPolicy {
    /// Pause before the next attempt, given how many attempts have failed so
    /// far (1-based).
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        self.initial_delay * self.backoff.pow(failed_attempts - 1)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::RetryPolicy;

    #[test]
    fn test_default_schedule_doubles() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..policy.max_attempts)
            .map(|n| policy.delay_after(n).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 16]);
    }

    #[test]
    fn test_custom_schedule() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            backoff: 3,
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(300));
    }
}

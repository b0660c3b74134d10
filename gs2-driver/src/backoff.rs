/// Linear backoff with a capped multiplier, used when the acquisition
/// thread loses the serial link.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RetryPolicy {
    base_ms: u64,
    cap: u32,
}

/// Waits applied between failed reads before reopening the port.
pub(crate) const RECONNECT_POLICY: RetryPolicy = RetryPolicy {
    base_ms: 100,
    cap: 100,
};

/// Waits applied between failed attempts to reopen the port itself.
pub(crate) const REOPEN_POLICY: RetryPolicy = RetryPolicy {
    base_ms: 200,
    cap: 25,
};

impl RetryPolicy {
    /// Delay before the given 1-based attempt, in milliseconds.
    pub(crate) fn delay_ms(&self, attempt: u32) -> u64 {
        self.base_ms * u64::from(attempt.min(self.cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_linearly_then_caps() {
        assert_eq!(RECONNECT_POLICY.delay_ms(1), 100);
        assert_eq!(RECONNECT_POLICY.delay_ms(7), 700);
        assert_eq!(RECONNECT_POLICY.delay_ms(100), 10_000);
        assert_eq!(RECONNECT_POLICY.delay_ms(5_000), 10_000);
    }

    #[test]
    fn test_reopen_policy_cap() {
        assert_eq!(REOPEN_POLICY.delay_ms(25), 5_000);
        assert_eq!(REOPEN_POLICY.delay_ms(26), 5_000);
    }
}

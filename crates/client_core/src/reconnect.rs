use std::time::Duration;

pub const DEFAULT_RECONNECT_INITIAL: Duration = Duration::from_millis(500);
pub const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(10);
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// What a chat session does when its real-time connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Log the drop and close the session.
    Never,
    /// Retry with exponential backoff, `initial * 2^attempt` capped at `max`,
    /// for at most `max_attempts` consecutive failures.
    Backoff {
        initial: Duration,
        max: Duration,
        max_attempts: u32,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Backoff {
            initial: DEFAULT_RECONNECT_INITIAL,
            max: DEFAULT_RECONNECT_MAX,
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `attempt` (zero based), or
    /// `None` once the policy gives up.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Never => None,
            Self::Backoff {
                initial,
                max,
                max_attempts,
            } => {
                if attempt >= max_attempts {
                    return None;
                }
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                Some(initial.saturating_mul(factor).min(max))
            }
        }
    }

    pub fn allows_reconnect(&self) -> bool {
        self.delay_for(0).is_some()
    }
}

#[cfg(test)]
#[path = "tests/reconnect_tests.rs"]
mod tests;

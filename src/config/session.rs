//! Retry policy for joins and sends

/// Join attempts before giving up
pub const JOIN_MAX_ATTEMPTS: u8 = 5;

/// Backoff after the first failed join attempt, in milliseconds
pub const JOIN_INITIAL_BACKOFF_MS: u32 = 1_000;

/// Send attempts before giving up
pub const SEND_MAX_ATTEMPTS: u8 = 3;

/// Fixed wait between send attempts, in milliseconds
pub const SEND_RETRY_DELAY_MS: u32 = 3_000;

/// Failed sends in a row after which the session is dropped
pub const REJOIN_THRESHOLD: u8 = 3;

/// Subband used for the first join attempt (TTN US915 listens on subband 2)
pub const DEFAULT_SUBBAND: u8 = 2;

/// Session manager configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    /// Join attempts before giving up
    pub join_max_attempts: u8,
    /// Backoff after the first failed join attempt; doubles per failure
    pub join_initial_backoff_ms: u32,
    /// Send attempts before giving up
    pub send_max_attempts: u8,
    /// Fixed wait between send attempts
    pub send_retry_delay_ms: u32,
    /// Failed sends in a row after which the session is dropped
    pub rejoin_threshold: u8,
    /// Subband tried on the first join attempt
    pub default_subband: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_max_attempts: JOIN_MAX_ATTEMPTS,
            join_initial_backoff_ms: JOIN_INITIAL_BACKOFF_MS,
            send_max_attempts: SEND_MAX_ATTEMPTS,
            send_retry_delay_ms: SEND_RETRY_DELAY_MS,
            rejoin_threshold: REJOIN_THRESHOLD,
            default_subband: DEFAULT_SUBBAND,
        }
    }
}

impl SessionConfig {
    /// Configuration with the firmware defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of join attempts (at least one)
    pub fn with_join_attempts(mut self, attempts: u8) -> Self {
        self.join_max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff after the first failed join attempt
    pub fn with_join_backoff_ms(mut self, ms: u32) -> Self {
        self.join_initial_backoff_ms = ms;
        self
    }

    /// Set the number of send attempts (at least one)
    pub fn with_send_attempts(mut self, attempts: u8) -> Self {
        self.send_max_attempts = attempts.max(1);
        self
    }

    /// Set the wait between send attempts
    pub fn with_send_retry_delay_ms(mut self, ms: u32) -> Self {
        self.send_retry_delay_ms = ms;
        self
    }

    /// Set how many failed sends in a row drop the session
    pub fn with_rejoin_threshold(mut self, threshold: u8) -> Self {
        self.rejoin_threshold = threshold.max(1);
        self
    }

    /// Set the subband tried on the first join attempt
    pub fn with_default_subband(mut self, subband: u8) -> Self {
        self.default_subband = subband;
        self
    }

    /// Backoff to wait after failed join attempt `attempt` (1-based).
    ///
    /// `None` after the final attempt.
    pub fn join_backoff_ms(&self, attempt: u8) -> Option<u32> {
        if attempt == 0 || attempt >= self.join_max_attempts {
            return None;
        }
        let shift = u32::from(attempt - 1).min(31);
        Some(self.join_initial_backoff_ms.saturating_mul(1 << shift))
    }
}

//! Send failure classification
//!
//! Maps a transport failure to what the session manager does next. This table
//! is the only place send-retry policy is decided.

use super::region::{rotated_subband, BandKind};
use crate::config::session::SEND_MAX_ATTEMPTS;
use crate::radio::traits::ErrorKind;

/// What to do after a failed send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryAction {
    /// Retry unchanged
    Retry,
    /// Switch to `subband`, then retry
    RotateChannelAndRetry {
        /// Subband for the next attempt
        subband: u8,
    },
    /// Drop the session, join again, then retry
    RejoinAndRetry,
    /// Give up
    Fail,
}

/// Classify a failure on send attempt `attempt` (1-based) with the default
/// budget of three attempts.
pub fn classify(kind: ErrorKind, band: BandKind, attempt: u8) -> RecoveryAction {
    classify_with_limit(kind, band, attempt, SEND_MAX_ATTEMPTS)
}

/// Classify a failure on send attempt `attempt` out of `max_attempts`.
pub fn classify_with_limit(
    kind: ErrorKind,
    band: BandKind,
    attempt: u8,
    max_attempts: u8,
) -> RecoveryAction {
    let attempts_remain = attempt < max_attempts;

    match (kind, band) {
        (ErrorKind::TxTimeout, _) => RecoveryAction::Retry,
        (ErrorKind::NetworkNotJoined, _) => RecoveryAction::RejoinAndRetry,
        (ErrorKind::NoChannelAvailable, BandKind::SubbandPlan) => {
            RecoveryAction::RotateChannelAndRetry {
                subband: rotated_subband(attempt),
            }
        }
        (ErrorKind::NoChannelAvailable, BandKind::FixedPlan) | (ErrorKind::Other, _) => {
            if attempts_remain {
                RecoveryAction::Retry
            } else {
                RecoveryAction::Fail
            }
        }
    }
}

//! LoRaWAN session policy
//!
//! This module contains the network-facing policy pieces, including:
//! - Regional channel plans and subband selection
//! - Send failure classification

/// Send failure classification
pub mod recovery;

/// Regional channel plans
pub mod region;

pub use recovery::{classify, classify_with_limit, RecoveryAction};
pub use region::{Band, BandKind, ChannelPlan, ConfigError};

//! Device and session configuration
//!
//! This module contains types for configuring a LoRaWAN session. It includes:
//! - Device credentials (JoinEUI, DevEUI, keys)
//! - Session state and the activation state machine
//! - Join and send retry policy

/// Credentials and session state
pub mod device;

/// Retry policy
pub mod session;

pub use device::{ActivationState, Credentials, SessionState};
pub use session::SessionConfig;

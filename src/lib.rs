//! LoRaWAN session management in Rust
//!
//! This crate provides the join and retry logic that sits on top of a LoRaWAN
//! radio/MAC stack. The stack itself is supplied through the
//! [`radio::traits::Transport`] trait; this crate decides how often to try,
//! how long to wait, which subband to use next and when a session is lost.
//!
//! # Features
//! - OTAA join with exponential backoff and subband rotation
//! - Uplinks with classified retries and automatic rejoin
//! - Single-slot downlink mailbox with a registered observer
//! - Configurable regions (US915 subband plans, EU868 fixed plans)
//! - Blocking, single-threaded, `no_std` unless the `std` feature is on, no unsafe code
//! - Optional `defmt` logging
//!
//! # Example
//! ```no_run
//! use lorawan_session::{
//!     config::{device::{AESKey, Credentials}, session::SessionConfig},
//!     device::SessionManager,
//!     lorawan::region::Band,
//! };
//!
//! # fn run<T, D>(transport: T, delay: D)
//! # where
//! #     T: lorawan_session::radio::Transport,
//! #     D: embedded_hal::blocking::delay::DelayMs<u32>,
//! # {
//! let mut session = SessionManager::new(transport, delay, Band::Us915, SessionConfig::new())
//!     .with_downlink_observer(|payload: &[u8], port: u8| {
//!         // hand the command to the application
//!         let _ = (payload, port);
//!     });
//!
//! session.begin().ok();
//! session.set_credentials(Credentials::from_u64(
//!     0x0000_0000_0000_0001,
//!     0x70B3_D57E_D800_41B2,
//!     AESKey::new([0x00; 16]),
//!     AESKey::new([0x00; 16]),
//! ));
//!
//! if session.join().is_ok() {
//!     session.send(b"Hello, LoRaWAN!", 1, false).ok();
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[macro_use]
mod fmt;

/// Device credentials, session state and retry policy
pub mod config;

/// Session manager and downlink dispatch
pub mod device;

/// Channel plans and failure classification
pub mod lorawan;

/// Transport abstraction
pub mod radio;

pub use device::{InitError, JoinFailure, SendFailure, SessionManager};

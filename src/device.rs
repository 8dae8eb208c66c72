//! High-level LoRaWAN session interface
//!
//! This module provides the session manager: it joins the network with
//! backoff and subband rotation, sends uplinks with classified retries, and
//! hands downlinks to the dispatcher.

use embedded_hal::blocking::delay::DelayMs;

use crate::{
    config::{
        device::{ActivationState, Credentials, SessionState},
        session::SessionConfig,
    },
    lorawan::{
        recovery::{classify_with_limit, RecoveryAction},
        region::{rotated_subband, Band, ChannelPlan},
    },
    radio::traits::{
        SendOutcome, StatusCode, Transport, TransportError, RX_BUFFER_SIZE,
    },
};

/// Downlink mailbox and observer
pub mod downlink;

use downlink::{DownlinkDispatcher, DownlinkMessage, DownlinkObserver, NoObserver};

/// Transport initialization failed with the given status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InitError(pub i16);

/// Join failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinFailure {
    /// `begin` has not succeeded yet
    NotInitialized,
    /// Every attempt failed; carries the last transport code
    AttemptsExhausted(i16),
}

/// Send failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendFailure {
    /// Not joined and the join before sending failed
    NotJoined,
    /// The network dropped the session and joining again failed
    RejoinFailed,
    /// Every attempt failed; carries the last transport code
    AttemptsExhausted(i16),
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "transport initialization failed, code {}", self.0)
    }
}

impl core::fmt::Display for JoinFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JoinFailure::NotInitialized => f.write_str("transport not initialized"),
            JoinFailure::AttemptsExhausted(code) => {
                write!(f, "all join attempts failed, last code {}", code)
            }
        }
    }
}

impl core::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SendFailure::NotJoined => f.write_str("not joined to a network"),
            SendFailure::RejoinFailed => f.write_str("rejoin after lost session failed"),
            SendFailure::AttemptsExhausted(code) => {
                write!(f, "all transmission attempts failed, last code {}", code)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InitError {}
#[cfg(feature = "std")]
impl std::error::Error for JoinFailure {}
#[cfg(feature = "std")]
impl std::error::Error for SendFailure {}

/// LoRaWAN session manager
///
/// Sole owner of the transport, the delay provider, the channel plan and the
/// session state. All operations block the caller until done, including the
/// waits between attempts.
pub struct SessionManager<T: Transport, D: DelayMs<u32>, O: DownlinkObserver = NoObserver> {
    /// Radio and MAC stack
    transport: T,
    /// Blocking delay used between attempts
    delay: D,
    /// Retry policy
    config: SessionConfig,
    /// OTAA credentials
    credentials: Credentials,
    /// Active channel plan
    plan: ChannelPlan,
    /// Activation state and link metrics
    state: SessionState,
    /// Downlink mailbox
    downlinks: DownlinkDispatcher<O>,
    /// Whether `begin` succeeded
    initialized: bool,
}

impl<T: Transport, D: DelayMs<u32>> SessionManager<T, D, NoObserver> {
    /// Create a session manager for `band`
    pub fn new(transport: T, delay: D, band: Band, config: SessionConfig) -> Self {
        info!(
            "frequency band {=str} ({=u8}), default subband {=u8}",
            band.name(),
            band.number(),
            config.default_subband
        );

        Self {
            transport,
            delay,
            config,
            credentials: Credentials::default(),
            plan: ChannelPlan::new(band, config.default_subband),
            state: SessionState::new(),
            downlinks: DownlinkDispatcher::new(),
            initialized: false,
        }
    }
}

impl<T: Transport, D: DelayMs<u32>, O: DownlinkObserver> SessionManager<T, D, O> {
    /// Register the observer told about every accepted downlink
    pub fn with_downlink_observer<P: DownlinkObserver>(self, observer: P) -> SessionManager<T, D, P> {
        SessionManager {
            transport: self.transport,
            delay: self.delay,
            config: self.config,
            credentials: self.credentials,
            plan: self.plan,
            state: self.state,
            downlinks: self.downlinks.register_observer(observer),
            initialized: self.initialized,
        }
    }

    /// Initialize the transport
    pub fn begin(&mut self) -> Result<(), InitError> {
        self.state.last_error_code = StatusCode::NONE;

        match self.transport.initialize() {
            Ok(()) => {
                info!("transport initialized for {=str}", self.plan.band().name());
                self.initialized = true;
                Ok(())
            }
            Err(e) => {
                let code = e.code();
                error!("transport initialization failed, code {=i16}", code);
                self.state.last_error_code = code;
                self.initialized = false;
                Err(InitError(code))
            }
        }
    }

    /// Set the credentials used by the next join
    pub fn set_credentials(&mut self, credentials: Credentials) {
        let app = credentials.app_key.check_value();
        let nwk = credentials.nwk_key.check_value();
        info!(
            "credentials set, AppKey KCV {=[u8]:x}, NwkKey KCV {=[u8]:x}",
            &app[..],
            &nwk[..]
        );
        if self.state.is_joined() {
            debug!("new credentials apply from the next join");
        }
        self.credentials = credentials;
    }

    /// Join the network with OTAA.
    ///
    /// Attempt 1 uses the configured default subband, later attempts rotate
    /// through `1 + (attempt mod 8)`. Failed attempts back off exponentially.
    pub fn join(&mut self) -> Result<(), JoinFailure> {
        if !self.initialized {
            error!("join requested before transport initialization");
            self.state.last_error_code = StatusCode::INVALID_STATE;
            return Err(JoinFailure::NotInitialized);
        }

        let max_attempts = self.config.join_max_attempts;
        let mut last_code = StatusCode::NONE;

        for attempt in 1..=max_attempts {
            info!("OTAA join attempt {=u8} of {=u8}", attempt, max_attempts);

            let subband = if attempt == 1 {
                self.config.default_subband
            } else {
                rotated_subband(attempt)
            };
            if self.plan.configure_subband(subband).is_err() {
                warn!("continuing with current channel configuration");
            }

            match nb::block!(self.transport.activate(&self.credentials, &self.plan)) {
                Ok(outcome) => {
                    info!("joined ({})", outcome);
                    self.state.last_error_code = outcome.code();
                    self.state.on_join_success();

                    let data_rate = self.plan.reliable_data_rate();
                    if let Err(e) = self.transport.set_data_rate(data_rate) {
                        warn!("could not set DR{=u8}, code {=i16}", data_rate, e.code());
                    } else {
                        debug!("data rate set to DR{=u8}", data_rate);
                    }
                    return Ok(());
                }
                Err(e) => {
                    last_code = e.code();
                    self.state.last_error_code = last_code;
                    warn!("join failed, code {=i16}", last_code);

                    if let Some(backoff) = self.config.join_backoff_ms(attempt) {
                        info!("retrying join in {=u32} ms", backoff);
                        self.delay.delay_ms(backoff);
                    }
                }
            }
        }

        error!("all join attempts failed");
        self.state.on_join_failure();
        Err(JoinFailure::AttemptsExhausted(last_code))
    }

    /// Send an uplink and collect any downlink.
    ///
    /// Joins first if no session exists. Failed attempts are classified and
    /// retried after a fixed delay; enough failed calls in a row drop the
    /// session so the next call joins again.
    pub fn send(
        &mut self,
        payload: &[u8],
        port: u8,
        confirmed: bool,
    ) -> Result<Option<DownlinkMessage>, SendFailure> {
        if !self.state.is_joined() {
            warn!("not joined, attempting to join before sending");
            if self.join().is_err() {
                error!("join failed, cannot send");
                return Err(SendFailure::NotJoined);
            }
        }

        let max_attempts = self.config.send_max_attempts;
        let mut rx_buffer = [0u8; RX_BUFFER_SIZE];
        let mut last_code = StatusCode::NONE;
        let mut rejoin_failed = false;

        for attempt in 1..=max_attempts {
            info!(
                "sending {=usize} bytes on port {=u8} (attempt {=u8} of {=u8})",
                payload.len(),
                port,
                attempt,
                max_attempts
            );

            let result = nb::block!(self.transport.send_receive(
                payload,
                port,
                confirmed,
                &mut rx_buffer
            ));

            let e = match result {
                Ok(outcome) => return Ok(self.complete_send(outcome, &rx_buffer)),
                Err(e) => e,
            };

            last_code = e.code();
            self.state.last_error_code = last_code;
            warn!("send failed, code {=i16}", last_code);

            let action = classify_with_limit(e.kind(), self.plan.kind(), attempt, max_attempts);
            let retry = match action {
                RecoveryAction::Retry => true,
                RecoveryAction::RotateChannelAndRetry { subband } => {
                    info!("no channel available, trying subband {=u8}", subband);
                    self.plan.configure_subband(subband).is_ok()
                }
                RecoveryAction::RejoinAndRetry => {
                    warn!("network session lost, rejoining");
                    self.state.on_not_joined();
                    match self.join() {
                        Ok(()) => true,
                        Err(_) => {
                            error!("rejoin failed, giving up on this uplink");
                            rejoin_failed = true;
                            false
                        }
                    }
                }
                RecoveryAction::Fail => false,
            };

            if !retry || attempt == max_attempts {
                break;
            }

            info!(
                "retrying in {=u32} ms (attempt {=u8} of {=u8})",
                self.config.send_retry_delay_ms,
                attempt + 1,
                max_attempts
            );
            self.delay.delay_ms(self.config.send_retry_delay_ms);
        }

        let failures = self.state.record_tx_failure();
        if failures >= self.config.rejoin_threshold {
            warn!("{=u8} failed uplinks in a row, rejoining on next send", failures);
            self.state.force_rejoin();
        }

        if rejoin_failed {
            Err(SendFailure::RejoinFailed)
        } else {
            error!("all transmission attempts failed");
            Err(SendFailure::AttemptsExhausted(last_code))
        }
    }

    /// Send a UTF-8 string
    pub fn send_str(
        &mut self,
        text: &str,
        port: u8,
        confirmed: bool,
    ) -> Result<Option<DownlinkMessage>, SendFailure> {
        self.send(text.as_bytes(), port, confirmed)
    }

    fn complete_send(&mut self, outcome: SendOutcome, rx_buffer: &[u8]) -> Option<DownlinkMessage> {
        self.state.last_error_code = outcome.code();
        self.state.record_tx_success();

        match self.transport.signal_quality() {
            Ok(quality) => {
                self.state.last_rssi = quality.rssi;
                self.state.last_snr = quality.snr;
            }
            Err(e) => warn!("could not read signal quality, code {=i16}", e.code()),
        }

        let (window, port, len) = match outcome {
            SendOutcome::Sent => {
                info!("uplink sent");
                return None;
            }
            SendOutcome::NoDownlink => {
                info!("uplink sent, no downlink");
                return None;
            }
            SendOutcome::Downlink { window, port, len } => (window, port, len),
        };

        info!("downlink in RX{=u8}", window.number());
        let Some(payload) = rx_buffer.get(..len) else {
            error!("transport reported {=usize} bytes, receive buffer holds {=usize}", len, rx_buffer.len());
            return None;
        };

        match self.downlinks.on_downlink(payload, port) {
            Ok(()) => self.downlinks.latest().cloned(),
            Err(_) => None,
        }
    }

    /// Drop the session; the next send joins again
    pub fn force_rejoin(&mut self) {
        info!("session dropped, rejoining on next send");
        self.state.force_rejoin();
    }

    /// Whether a network session is established
    pub fn is_joined(&self) -> bool {
        self.state.is_joined()
    }

    /// Current activation state
    pub fn activation_state(&self) -> ActivationState {
        self.state.activation()
    }

    /// Raw code of the last transport interaction
    pub fn last_error_code(&self) -> i16 {
        self.state.last_error_code
    }

    /// RSSI of the last successful exchange in dBm
    pub fn last_rssi(&self) -> f32 {
        self.state.last_rssi
    }

    /// SNR of the last successful exchange in dB
    pub fn last_snr(&self) -> f32 {
        self.state.last_snr
    }

    /// Failed send calls since the last successful one
    pub fn consecutive_tx_errors(&self) -> u8 {
        self.state.consecutive_tx_errors
    }

    /// Active channel plan
    pub fn channel_plan(&self) -> &ChannelPlan {
        &self.plan
    }

    /// Credentials used by the next join
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Retry policy
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Downlink mailbox
    pub fn downlinks(&self) -> &DownlinkDispatcher<O> {
        &self.downlinks
    }

    /// Take the pending downlink, if any
    pub fn take_downlink(&mut self) -> Option<DownlinkMessage> {
        self.downlinks.take()
    }

    /// Most recent downlink, whether or not it was taken
    pub fn latest_downlink(&self) -> Option<&DownlinkMessage> {
        self.downlinks.latest()
    }

    /// Transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport and delay provider
    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }
}

use crate::config::device::Credentials;
use crate::lorawan::region::ChannelPlan;

/// Receive buffer size handed to the transport for downlinks
pub const RX_BUFFER_SIZE: usize = 256;

/// Classification of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// The radio did not finish transmitting in time
    TxTimeout,
    /// The network no longer knows this device
    NetworkNotJoined,
    /// No enabled channel supports the requested data rate
    NoChannelAvailable,
    /// Anything else
    Other,
}

/// Error reported by a transport
pub trait TransportError: core::fmt::Debug {
    /// Raw status code, as the driver reports it
    fn code(&self) -> i16;

    /// Classification used for recovery decisions
    fn kind(&self) -> ErrorKind;
}

/// RadioLib-style numeric status code
///
/// Negative values are errors, `0` is success. Drivers that speak in raw codes
/// can use this directly as their error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusCode(pub i16);

impl StatusCode {
    /// Success
    pub const NONE: i16 = 0;
    /// Operation not valid in the current state
    pub const INVALID_STATE: i16 = -1;
    /// Transmission timed out
    pub const TX_TIMEOUT: i16 = -5;
    /// Network session missing
    pub const NETWORK_NOT_JOINED: i16 = -1101;
    /// No channel available for the data rate
    pub const NO_CHANNEL_AVAILABLE: i16 = -1106;
    /// Uplink sent, nothing came back
    pub const NO_DOWNLINK: i16 = -1116;
    /// Join succeeded and started a new session
    pub const NEW_SESSION: i16 = -1118;
}

impl TransportError for StatusCode {
    fn code(&self) -> i16 {
        self.0
    }

    fn kind(&self) -> ErrorKind {
        match self.0 {
            StatusCode::TX_TIMEOUT => ErrorKind::TxTimeout,
            StatusCode::NETWORK_NOT_JOINED => ErrorKind::NetworkNotJoined,
            StatusCode::NO_CHANNEL_AVAILABLE => ErrorKind::NoChannelAvailable,
            _ => ErrorKind::Other,
        }
    }
}

/// Successful activation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivationOutcome {
    /// Joined
    Joined,
    /// Joined, and the network started a new session
    NewSession,
}

impl ActivationOutcome {
    /// Status code the driver reports for this outcome
    pub fn code(&self) -> i16 {
        match self {
            ActivationOutcome::Joined => StatusCode::NONE,
            ActivationOutcome::NewSession => StatusCode::NEW_SESSION,
        }
    }
}

/// Receive window a downlink arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxWindow {
    /// First receive window
    Rx1,
    /// Second receive window
    Rx2,
}

impl RxWindow {
    /// Window number (1 or 2)
    pub fn number(&self) -> u8 {
        match self {
            RxWindow::Rx1 => 1,
            RxWindow::Rx2 => 2,
        }
    }
}

/// Successful uplink result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendOutcome {
    /// Uplink sent
    Sent,
    /// Uplink sent, receive windows stayed empty
    NoDownlink,
    /// Uplink sent and `len` bytes of downlink were written to the receive buffer
    Downlink {
        /// Window the downlink arrived in
        window: RxWindow,
        /// Application port of the downlink
        port: u8,
        /// Downlink length
        len: usize,
    },
}

impl SendOutcome {
    /// Status code the driver reports for this outcome
    pub fn code(&self) -> i16 {
        match self {
            SendOutcome::Sent => StatusCode::NONE,
            SendOutcome::NoDownlink => StatusCode::NO_DOWNLINK,
            SendOutcome::Downlink { window, .. } => i16::from(window.number()),
        }
    }
}

/// Signal quality of the last received frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalQuality {
    /// RSSI in dBm
    pub rssi: f32,
    /// SNR in dB
    pub snr: f32,
}

/// LoRaWAN transport capability
///
/// Implemented by the radio driver and MAC stack. Framing, encryption and
/// channel tables live behind this trait. Long-running operations may return
/// `nb::Error::WouldBlock`; the session manager polls them to completion.
pub trait Transport {
    /// Error type for transport operations
    type Error: TransportError;

    /// Bring up the radio
    fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Run an OTAA join with the given credentials on the given channel plan
    fn activate(
        &mut self,
        credentials: &Credentials,
        plan: &ChannelPlan,
    ) -> nb::Result<ActivationOutcome, Self::Error>;

    /// Send an uplink and listen for a downlink.
    ///
    /// Any downlink is written to the start of `rx_buffer`.
    fn send_receive(
        &mut self,
        payload: &[u8],
        port: u8,
        confirmed: bool,
        rx_buffer: &mut [u8],
    ) -> nb::Result<SendOutcome, Self::Error>;

    /// Set the uplink data rate index
    fn set_data_rate(&mut self, index: u8) -> Result<(), Self::Error>;

    /// Signal quality of the last received frame
    fn signal_quality(&mut self) -> Result<SignalQuality, Self::Error>;
}

//! Downlink delivery
//!
//! A single-slot mailbox: the latest downlink overwrites whatever the consumer
//! has not taken yet. One observer is told about every accepted downlink.

use heapless::Vec;

/// Default downlink capacity, equal to the transport receive buffer
pub const DEFAULT_DOWNLINK_CAPACITY: usize = crate::radio::traits::RX_BUFFER_SIZE;

/// Downlink buffer error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Payload longer than the buffer capacity
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Buffer capacity
        capacity: usize,
    },
}

impl core::fmt::Display for BufferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BufferError::PayloadTooLarge { len, capacity } => {
                write!(f, "downlink of {} bytes exceeds {} byte buffer", len, capacity)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BufferError {}

/// A received downlink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkMessage<const N: usize = DEFAULT_DOWNLINK_CAPACITY> {
    payload: Vec<u8, N>,
    port: u8,
}

impl<const N: usize> DownlinkMessage<N> {
    /// Copy `payload` into a new message
    pub fn new(payload: &[u8], port: u8) -> Result<Self, BufferError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(payload)
            .map_err(|_| BufferError::PayloadTooLarge {
                len: payload.len(),
                capacity: N,
            })?;
        Ok(Self { payload: buf, port })
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Application port
    pub fn port(&self) -> u8 {
        self.port
    }

    /// Payload length
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Receiver of downlink notifications
pub trait DownlinkObserver {
    /// Called synchronously for every accepted downlink
    fn on_downlink(&mut self, payload: &[u8], port: u8);
}

/// Observer that ignores every downlink
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObserver;

impl DownlinkObserver for NoObserver {
    fn on_downlink(&mut self, _payload: &[u8], _port: u8) {}
}

impl<F> DownlinkObserver for F
where
    F: FnMut(&[u8], u8),
{
    fn on_downlink(&mut self, payload: &[u8], port: u8) {
        self(payload, port)
    }
}

/// Stores the latest downlink and notifies the observer
pub struct DownlinkDispatcher<O: DownlinkObserver = NoObserver, const N: usize = DEFAULT_DOWNLINK_CAPACITY> {
    /// Latest downlink
    latest: Option<DownlinkMessage<N>>,
    /// Whether `latest` has not been taken yet
    received: bool,
    /// Registered observer
    observer: O,
}

impl<const N: usize> DownlinkDispatcher<NoObserver, N> {
    /// Dispatcher without an observer
    pub fn new() -> Self {
        Self::with_observer(NoObserver)
    }
}

impl<const N: usize> Default for DownlinkDispatcher<NoObserver, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: DownlinkObserver, const N: usize> DownlinkDispatcher<O, N> {
    /// Dispatcher notifying `observer`
    pub fn with_observer(observer: O) -> Self {
        Self {
            latest: None,
            received: false,
            observer,
        }
    }

    /// Replace the observer, keeping any stored message
    pub fn register_observer<P: DownlinkObserver>(self, observer: P) -> DownlinkDispatcher<P, N> {
        DownlinkDispatcher {
            latest: self.latest,
            received: self.received,
            observer,
        }
    }

    /// Buffer capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Accept a downlink.
    ///
    /// Oversized payloads are discarded whole and the stored message is left
    /// as it was.
    pub fn on_downlink(&mut self, payload: &[u8], port: u8) -> Result<(), BufferError> {
        let message = match DownlinkMessage::new(payload, port) {
            Ok(message) => message,
            Err(e) => {
                error!(
                    "discarding {=usize} byte downlink on port {=u8}, buffer holds {=usize}",
                    payload.len(),
                    port,
                    N
                );
                return Err(e);
            }
        };

        if self.received {
            warn!("overwriting unread downlink");
        }
        info!("downlink of {=usize} bytes on port {=u8}", payload.len(), port);

        self.latest = Some(message);
        self.received = true;
        self.observer.on_downlink(payload, port);
        Ok(())
    }

    /// Whether a downlink is waiting to be taken
    pub fn has_pending(&self) -> bool {
        self.received
    }

    /// Latest downlink, whether or not it was taken
    pub fn latest(&self) -> Option<&DownlinkMessage<N>> {
        self.latest.as_ref()
    }

    /// Take the pending downlink, if any
    pub fn take(&mut self) -> Option<DownlinkMessage<N>> {
        if !self.received {
            return None;
        }
        self.received = false;
        self.latest.clone()
    }
}

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

/// EUI-64 (8 bytes)
pub type EUI64 = [u8; 8];

/// Length of a key check value in bytes
pub const KCV_SIZE: usize = 3;

/// AES-128 key (16 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct AESKey([u8; 16]);

impl AESKey {
    /// Wrap raw key bytes
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Key check value: the first three bytes of the key's encryption of an
    /// all-zero block.
    ///
    /// Lets a key be compared against the network console without the key
    /// itself ever appearing in a log.
    pub fn check_value(&self) -> [u8; KCV_SIZE] {
        let cipher = Aes128::new(GenericArray::from_slice(&self.0));
        let mut block = GenericArray::from([0u8; 16]);
        cipher.encrypt_block(&mut block);

        let mut kcv = [0u8; KCV_SIZE];
        kcv.copy_from_slice(&block[..KCV_SIZE]);
        kcv
    }
}

// Keys never print their bytes.
impl core::fmt::Debug for AESKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kcv = self.check_value();
        write!(f, "AESKey(kcv={:02X}{:02X}{:02X})", kcv[0], kcv[1], kcv[2])
    }
}

impl From<[u8; 16]> for AESKey {
    fn from(bytes: [u8; 16]) -> Self {
        Self::new(bytes)
    }
}

/// OTAA credentials for a device
///
/// Applied to the transport before every join attempt. Replacing them only
/// takes effect on the next join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Credentials {
    /// Join EUI (formerly AppEUI)
    pub join_eui: EUI64,
    /// Device EUI (unique device identifier)
    pub dev_eui: EUI64,
    /// Application key
    pub app_key: AESKey,
    /// Network key (equal to the application key on LoRaWAN 1.0.x networks)
    pub nwk_key: AESKey,
}

impl Credentials {
    /// Create credentials from their raw parts
    pub fn new(join_eui: EUI64, dev_eui: EUI64, app_key: AESKey, nwk_key: AESKey) -> Self {
        Self {
            join_eui,
            dev_eui,
            app_key,
            nwk_key,
        }
    }

    /// Create credentials from EUIs given as integers, most significant byte first
    pub fn from_u64(join_eui: u64, dev_eui: u64, app_key: AESKey, nwk_key: AESKey) -> Self {
        Self::new(join_eui.to_be_bytes(), dev_eui.to_be_bytes(), app_key, nwk_key)
    }

    /// True until real credentials have been supplied
    pub fn is_unset(&self) -> bool {
        *self == Self::default()
    }
}

/// Two-state activation machine
///
/// `Disjoined -> Joined` only through a successful join. `Joined -> Disjoined`
/// through a forced rejoin or an observed not-joined transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivationState {
    /// No usable network session
    #[default]
    Disjoined,
    /// Activated through OTAA
    Joined,
}

/// Session state owned by the session manager
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Current activation state
    activation: ActivationState,
    /// Raw code of the last transport interaction
    pub last_error_code: i16,
    /// RSSI of the last successful exchange in dBm
    pub last_rssi: f32,
    /// SNR of the last successful exchange in dB
    pub last_snr: f32,
    /// Failed send calls since the last successful send
    pub consecutive_tx_errors: u8,
}

impl SessionState {
    /// Fresh, disjoined session state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current activation state
    pub fn activation(&self) -> ActivationState {
        self.activation
    }

    /// Whether a network session is established
    pub fn is_joined(&self) -> bool {
        self.activation == ActivationState::Joined
    }

    /// Transition taken after a successful activation
    pub(crate) fn on_join_success(&mut self) {
        self.activation = ActivationState::Joined;
    }

    /// Transition taken when joining ran out of attempts
    pub(crate) fn on_join_failure(&mut self) {
        self.activation = ActivationState::Disjoined;
    }

    /// Transition taken when the transport reports the session is gone
    pub(crate) fn on_not_joined(&mut self) {
        self.activation = ActivationState::Disjoined;
    }

    /// Transition taken when too many sends failed in a row
    pub(crate) fn force_rejoin(&mut self) {
        self.activation = ActivationState::Disjoined;
    }

    /// Record a successful send
    pub(crate) fn record_tx_success(&mut self) {
        self.consecutive_tx_errors = 0;
    }

    /// Record a failed send, returning the updated count
    pub(crate) fn record_tx_failure(&mut self) -> u8 {
        self.consecutive_tx_errors = self.consecutive_tx_errors.saturating_add(1);
        self.consecutive_tx_errors
    }
}

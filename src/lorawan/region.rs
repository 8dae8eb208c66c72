/// Lowest valid subband index
pub const MIN_SUBBAND: u8 = 1;
/// Highest valid subband index
pub const MAX_SUBBAND: u8 = 8;

/// Most robust data rate (DR0: SF10/125 kHz on US915)
pub const DR0: u8 = 0;
/// Second most robust data rate (DR1: SF9/125 kHz on EU868)
pub const DR1: u8 = 1;

/// Regional band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Band {
    /// EU868, fixed default channels
    Eu868,
    /// US915, 64 + 8 uplink channels grouped into 8 subbands
    Us915,
    /// Any other band, identified by its band number
    Custom(u8),
}

/// Whether a band's channels are grouped into selectable subbands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BandKind {
    /// Fixed channel plan, nothing to select
    FixedPlan,
    /// Channel plan split into subbands 1-8
    SubbandPlan,
}

impl Band {
    /// Band from its driver band number (1 = EU868, 2 = US915)
    pub fn from_number(number: u8) -> Self {
        match number {
            1 => Band::Eu868,
            2 => Band::Us915,
            n => Band::Custom(n),
        }
    }

    /// Driver band number
    pub fn number(&self) -> u8 {
        match self {
            Band::Eu868 => 1,
            Band::Us915 => 2,
            Band::Custom(n) => *n,
        }
    }

    /// Human readable band name
    pub fn name(&self) -> &'static str {
        match self {
            Band::Eu868 => "EU868",
            Band::Us915 => "US915",
            Band::Custom(_) => "Custom",
        }
    }

    /// Channel plan structure of the band
    pub fn kind(&self) -> BandKind {
        match self {
            Band::Us915 => BandKind::SubbandPlan,
            _ => BandKind::FixedPlan,
        }
    }
}

/// Channel plan configuration error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Subband outside 1-8
    InvalidSubband(u8),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::InvalidSubband(s) => write!(f, "invalid subband {}, must be 1-8", s),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Subband to try for a rotation step.
///
/// Yields `1 + (attempt mod 8)`, always inside 1-8.
pub fn rotated_subband(attempt: u8) -> u8 {
    MIN_SUBBAND + (attempt % MAX_SUBBAND)
}

/// Active channel plan
///
/// Records which subband the device intends to use. The plan is handed to the
/// transport on activation; nothing here touches the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelPlan {
    band: Band,
    subband: u8,
}

impl ChannelPlan {
    /// Create a channel plan with an initial subband.
    ///
    /// The subband is not validated here; a bad value surfaces when the first
    /// join tries to configure it.
    pub fn new(band: Band, subband: u8) -> Self {
        Self { band, subband }
    }

    /// Configured band
    pub fn band(&self) -> Band {
        self.band
    }

    /// Channel plan structure of the configured band
    pub fn kind(&self) -> BandKind {
        self.band.kind()
    }

    /// Active subband, `None` for fixed plans
    pub fn subband(&self) -> Option<u8> {
        match self.kind() {
            BandKind::SubbandPlan => Some(self.subband),
            BandKind::FixedPlan => None,
        }
    }

    /// Select the subband used by the next activation.
    ///
    /// A no-op returning `Ok` for fixed plans.
    pub fn configure_subband(&mut self, target: u8) -> Result<(), ConfigError> {
        if self.kind() == BandKind::FixedPlan {
            debug!("subband configuration only applies to subband plans");
            return Ok(());
        }

        if !(MIN_SUBBAND..=MAX_SUBBAND).contains(&target) {
            warn!("invalid subband {=u8}, must be 1-8", target);
            return Err(ConfigError::InvalidSubband(target));
        }

        if self.subband != target {
            info!("switching to subband {=u8}", target);
        }
        self.subband = target;
        Ok(())
    }

    /// Data rate used right after joining
    pub fn reliable_data_rate(&self) -> u8 {
        match self.kind() {
            BandKind::SubbandPlan => DR0,
            BandKind::FixedPlan => DR1,
        }
    }
}

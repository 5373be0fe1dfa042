//! Decoder configuration and its layout in the configuration store.
//!
//! The configuration lives in configuration variables (CVs) in external
//! storage. It is read once at boot and rewritten only by the programming
//! procedure, which then restarts the decoder so the fresh values are
//! always the ones in effect.
//!
//! # CV Layout
//!
//! | Field | CV | Default | Notes |
//! |-------|----|---------|-------|
//! | [`CvField::AddressLow`] | 513 | `0x01` | low 6 address bits |
//! | [`CvField::Version`] | 519 | `0x07` | read only |
//! | [`CvField::VendorId`] | 520 | `0x0D` | initialization marker |
//! | [`CvField::AddressHigh`] | 521 | `0x80` | high 3 bits, bit 7 = unprogrammed |
//! | [`CvField::Activation`] | 532 | `1` | `0` = "-", `1` = "+" |
//! | [`CvField::RoundRobinNear`] | 533 | `15` | relays 1-8 |
//! | [`CvField::RoundRobinFar`] | 534 | `7` | relays 9-16 |
//! | [`CvField::RoundRobinInterval`] | 535 | `6` | seconds, `0` treated as `1` |
//! | [`CvField::Mode`] | 536 | `0` | see [`RelayMode`] |
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::config::{DecoderConfig, RelayMode, RoundRobinMask};
//!
//! let config = DecoderConfig::default()
//!     .with_mode(RelayMode::Independent)
//!     .with_round_robin_near(RoundRobinMask::new(0))
//!     .with_round_robin_interval(0);
//!
//! // Degenerate values are normalized so the scheduler never stalls
//! assert_eq!(config.round_robin_near.bits(), 0b0000_0001);
//! assert_eq!(config.round_robin_interval_secs, 1);
//! ```

use log::debug;

use crate::commands::Operation;
use crate::traits::ConfigStore;

/// Value of [`CvField::VendorId`] once the store has been initialized.
pub const VENDOR_ID: u8 = 0x0D;

/// Firmware version reported in [`CvField::Version`].
pub const VERSION: u8 = 0x07;

/// Bit in [`CvField::AddressHigh`] marking the decoder as unprogrammed.
pub const UNPROGRAMMED_FLAG: u8 = 0x80;

/// Number of the first CV in the store; field offsets are relative to it.
pub const FIRST_CV: u16 = 513;

// ============================================================================
// CV fields
// ============================================================================

/// Named configuration variables used by the relay decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CvField {
    /// Decoder address, low 6 bits.
    AddressLow,
    /// Firmware version.
    Version,
    /// Vendor identifier, doubles as the "store initialized" marker.
    VendorId,
    /// Decoder address, high 3 bits plus the unprogrammed flag.
    AddressHigh,
    /// Which polarity activates a relay.
    Activation,
    /// Round-robin participation mask for relays 1-8.
    RoundRobinNear,
    /// Round-robin participation mask for relays 9-16.
    RoundRobinFar,
    /// Round-robin interval in seconds.
    RoundRobinInterval,
    /// Relay behaviour mode.
    Mode,
}

impl CvField {
    /// Every field, in store order.
    pub const ALL: [CvField; 9] = [
        CvField::AddressLow,
        CvField::Version,
        CvField::VendorId,
        CvField::AddressHigh,
        CvField::Activation,
        CvField::RoundRobinNear,
        CvField::RoundRobinFar,
        CvField::RoundRobinInterval,
        CvField::Mode,
    ];

    /// The CV number.
    pub const fn cv(&self) -> u16 {
        match self {
            CvField::AddressLow => 513,
            CvField::Version => 519,
            CvField::VendorId => 520,
            CvField::AddressHigh => 521,
            CvField::Activation => 532,
            CvField::RoundRobinNear => 533,
            CvField::RoundRobinFar => 534,
            CvField::RoundRobinInterval => 535,
            CvField::Mode => 536,
        }
    }

    /// Byte offset of the field in the store.
    #[inline]
    pub const fn offset(&self) -> usize {
        (self.cv() - FIRST_CV) as usize
    }

    /// Factory default value.
    pub const fn default_value(&self) -> u8 {
        match self {
            CvField::AddressLow => 0x01,
            CvField::Version => VERSION,
            CvField::VendorId => VENDOR_ID,
            CvField::AddressHigh => UNPROGRAMMED_FLAG,
            CvField::Activation => 1,
            CvField::RoundRobinNear => 15,
            CvField::RoundRobinFar => 7,
            CvField::RoundRobinInterval => 6,
            CvField::Mode => 0,
        }
    }

    /// Short lowercase name, used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CvField::AddressLow => "addr_low",
            CvField::Version => "version",
            CvField::VendorId => "vendor_id",
            CvField::AddressHigh => "addr_high",
            CvField::Activation => "activation",
            CvField::RoundRobinNear => "rr_near",
            CvField::RoundRobinFar => "rr_far",
            CvField::RoundRobinInterval => "rr_interval",
            CvField::Mode => "mode",
        }
    }
}

// ============================================================================
// Relay mode
// ============================================================================

/// How direct relay commands are interpreted.
///
/// The same mode applies to both banks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RelayMode {
    /// Mode 0: activate sets one relay and releases the rest of its bank;
    /// release is ignored, except on the last relay where it starts
    /// round-robin.
    #[default]
    Exclusive,
    /// Mode 1: like [`Exclusive`](Self::Exclusive), but release clears the relay.
    ExclusiveRelease,
    /// Mode 2: every relay is switched on its own; several may be set.
    Independent,
    /// Mode 3: relays cycle autonomously; direct commands are disabled.
    RoundRobin,
    /// Any other stored value. Treated like [`RoundRobin`](Self::RoundRobin).
    Reserved(u8),
}

impl RelayMode {
    /// Decode a stored mode byte.
    ///
    /// ```
    /// use dcc_relay_decoder::config::RelayMode;
    ///
    /// assert_eq!(RelayMode::from_cv(1), RelayMode::ExclusiveRelease);
    /// assert_eq!(RelayMode::from_cv(9), RelayMode::Reserved(9));
    /// assert_eq!(RelayMode::Reserved(9).to_cv(), 9);
    /// ```
    pub const fn from_cv(value: u8) -> Self {
        match value {
            0 => RelayMode::Exclusive,
            1 => RelayMode::ExclusiveRelease,
            2 => RelayMode::Independent,
            3 => RelayMode::RoundRobin,
            other => RelayMode::Reserved(other),
        }
    }

    /// Encode for storage.
    pub const fn to_cv(&self) -> u8 {
        match self {
            RelayMode::Exclusive => 0,
            RelayMode::ExclusiveRelease => 1,
            RelayMode::Independent => 2,
            RelayMode::RoundRobin => 3,
            RelayMode::Reserved(value) => *value,
        }
    }

    /// Whether the engine acts on direct relay commands in this mode.
    pub const fn accepts_direct_commands(&self) -> bool {
        matches!(
            self,
            RelayMode::Exclusive | RelayMode::ExclusiveRelease | RelayMode::Independent
        )
    }

    /// Whether round-robin runs from boot in this mode.
    pub const fn starts_in_round_robin(&self) -> bool {
        !self.accepts_direct_commands()
    }
}

// ============================================================================
// Round-robin mask
// ============================================================================

/// Set of relays in a bank that take part in round-robin.
///
/// Bit `i` enables position `i` of the cycle. An all-zero mask is
/// normalized to position 0 only, so there is always something to light.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoundRobinMask(u8);

impl RoundRobinMask {
    /// Creates a normalized mask.
    pub const fn new(bits: u8) -> Self {
        if bits == 0 {
            Self(0b0000_0001)
        } else {
            Self(bits)
        }
    }

    /// Raw mask bits, never zero.
    #[inline]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether cycle position `index` is enabled.
    #[inline]
    pub const fn contains(&self, index: u8) -> bool {
        index < 8 && self.0 & (1 << index) != 0
    }
}

impl Default for RoundRobinMask {
    fn default() -> Self {
        Self::new(0)
    }
}

// ============================================================================
// Decoder address
// ============================================================================

/// The 9-bit accessory decoder address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderAddress {
    /// Address value (`0..512`).
    pub value: u16,
    /// False until the address has been assigned by programming.
    pub programmed: bool,
}

impl DecoderAddress {
    /// Largest valid address.
    pub const MAX: u16 = 0x1FF;

    /// A programmed address, truncated to 9 bits.
    pub const fn new(value: u16) -> Self {
        Self {
            value: value & Self::MAX,
            programmed: true,
        }
    }

    /// Decode from the low and high address CVs.
    pub const fn from_cv(low: u8, high: u8) -> Self {
        Self {
            value: ((high as u16 & 0b111) << 6) | (low as u16 & 0b11_1111),
            programmed: high & UNPROGRAMMED_FLAG == 0,
        }
    }

    /// Encode as `(low, high)` CV values.
    pub const fn to_cv(&self) -> (u8, u8) {
        let low = (self.value & 0b11_1111) as u8;
        let high = ((self.value >> 6) & 0b111) as u8;
        if self.programmed {
            (low, high)
        } else {
            (low, high | UNPROGRAMMED_FLAG)
        }
    }
}

impl Default for DecoderAddress {
    fn default() -> Self {
        Self::from_cv(
            CvField::AddressLow.default_value(),
            CvField::AddressHigh.default_value(),
        )
    }
}

// ============================================================================
// Decoder config
// ============================================================================

/// Complete relay decoder configuration.
///
/// `Default` gives the factory values.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderConfig {
    /// Decoder address.
    pub address: DecoderAddress,
    /// Polarity that activates a relay.
    pub activation: Operation,
    /// Relay behaviour mode.
    pub mode: RelayMode,
    /// Round-robin mask for relays 1-8.
    pub round_robin_near: RoundRobinMask,
    /// Round-robin mask for relays 9-16.
    pub round_robin_far: RoundRobinMask,
    /// Seconds between round-robin steps, at least 1.
    pub round_robin_interval_secs: u8,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            address: DecoderAddress::default(),
            activation: Operation::from_bit(CvField::Activation.default_value()),
            mode: RelayMode::from_cv(CvField::Mode.default_value()),
            round_robin_near: RoundRobinMask::new(CvField::RoundRobinNear.default_value()),
            round_robin_far: RoundRobinMask::new(CvField::RoundRobinFar.default_value()),
            round_robin_interval_secs: CvField::RoundRobinInterval.default_value(),
        }
    }
}

impl DecoderConfig {
    /// Read and normalize the configuration from `store`.
    pub fn load<S: ConfigStore>(store: &mut S) -> Result<Self, S::Error> {
        let low = store.read_byte(CvField::AddressLow)?;
        let high = store.read_byte(CvField::AddressHigh)?;
        Ok(Self {
            address: DecoderAddress::from_cv(low, high),
            activation: Operation::from_bit(store.read_byte(CvField::Activation)?),
            mode: RelayMode::from_cv(store.read_byte(CvField::Mode)?),
            round_robin_near: RoundRobinMask::new(store.read_byte(CvField::RoundRobinNear)?),
            round_robin_far: RoundRobinMask::new(store.read_byte(CvField::RoundRobinFar)?),
            round_robin_interval_secs: store.read_byte(CvField::RoundRobinInterval)?.max(1),
        })
    }

    /// Set the decoder address
    pub fn with_address(mut self, address: DecoderAddress) -> Self {
        self.address = address;
        self
    }

    /// Set the activating polarity
    pub fn with_activation(mut self, activation: Operation) -> Self {
        self.activation = activation;
        self
    }

    /// Set the relay mode
    pub fn with_mode(mut self, mode: RelayMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the near bank round-robin mask
    pub fn with_round_robin_near(mut self, mask: RoundRobinMask) -> Self {
        self.round_robin_near = mask;
        self
    }

    /// Set the far bank round-robin mask
    pub fn with_round_robin_far(mut self, mask: RoundRobinMask) -> Self {
        self.round_robin_far = mask;
        self
    }

    /// Set the round-robin interval; `0` becomes `1`
    pub fn with_round_robin_interval(mut self, secs: u8) -> Self {
        self.round_robin_interval_secs = secs.max(1);
        self
    }

    /// Write every field of this configuration to `store`.
    pub fn store<S: ConfigStore>(&self, store: &mut S) -> Result<(), S::Error> {
        let (low, high) = self.address.to_cv();
        store.write_byte(CvField::AddressLow, low)?;
        store.write_byte(CvField::AddressHigh, high)?;
        store.write_byte(CvField::Activation, self.activation.bit())?;
        store.write_byte(CvField::RoundRobinNear, self.round_robin_near.bits())?;
        store.write_byte(CvField::RoundRobinFar, self.round_robin_far.bits())?;
        store.write_byte(CvField::RoundRobinInterval, self.round_robin_interval_secs)?;
        store.write_byte(CvField::Mode, self.mode.to_cv())
    }
}

/// Write every field's factory default to `store`.
///
/// Completion is not awaited; poll [`ConfigStore::is_ready`] afterwards.
pub fn write_factory_defaults<S: ConfigStore>(store: &mut S) -> Result<(), S::Error> {
    for field in CvField::ALL {
        debug!(
            "factory default cv{} {} = {:#04x}",
            field.cv(),
            field.as_str(),
            field.default_value()
        );
        store.write_byte(field, field.default_value())?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockStore;

    #[test]
    fn default_config_matches_factory_values() {
        let config = DecoderConfig::default();
        assert_eq!(config.address.value, 1);
        assert!(!config.address.programmed);
        assert_eq!(config.activation, Operation::Plus);
        assert_eq!(config.mode, RelayMode::Exclusive);
        assert_eq!(config.round_robin_near.bits(), 15);
        assert_eq!(config.round_robin_far.bits(), 7);
        assert_eq!(config.round_robin_interval_secs, 6);
    }

    #[test]
    fn cv_offsets_follow_cv_numbers() {
        assert_eq!(CvField::AddressLow.offset(), 0);
        assert_eq!(CvField::VendorId.offset(), 7);
        assert_eq!(CvField::AddressHigh.offset(), 8);
        assert_eq!(CvField::Mode.offset(), 23);
    }

    // =========================================================================
    // RoundRobinMask Tests
    // =========================================================================

    #[test]
    fn empty_mask_normalized_to_first_relay() {
        let mask = RoundRobinMask::new(0);
        assert_eq!(mask.bits(), 1);
        assert!(mask.contains(0));
        assert!(!mask.contains(1));
    }

    #[test]
    fn mask_contains() {
        let mask = RoundRobinMask::new(0b0000_0101);
        assert!(mask.contains(0));
        assert!(!mask.contains(1));
        assert!(mask.contains(2));
        assert!(!mask.contains(8));
    }

    // =========================================================================
    // RelayMode Tests
    // =========================================================================

    #[test]
    fn relay_mode_direct_commands() {
        assert!(RelayMode::Exclusive.accepts_direct_commands());
        assert!(RelayMode::ExclusiveRelease.accepts_direct_commands());
        assert!(RelayMode::Independent.accepts_direct_commands());
        assert!(!RelayMode::RoundRobin.accepts_direct_commands());
        assert!(!RelayMode::Reserved(4).accepts_direct_commands());
        assert!(RelayMode::Reserved(200).starts_in_round_robin());
    }

    #[test]
    fn relay_mode_cv_round_trip() {
        for value in 0..=255u8 {
            assert_eq!(RelayMode::from_cv(value).to_cv(), value);
        }
    }

    // =========================================================================
    // DecoderAddress Tests
    // =========================================================================

    #[test]
    fn address_split_across_cvs() {
        let address = DecoderAddress::new(0x1C5);
        assert_eq!(address.to_cv(), (0x05, 0x07));
        assert_eq!(DecoderAddress::from_cv(0x05, 0x07), address);
    }

    #[test]
    fn unprogrammed_flag_detected() {
        let address = DecoderAddress::from_cv(0x01, 0x80);
        assert!(!address.programmed);
        assert_eq!(address.value, 1);
        assert_eq!(address.to_cv(), (0x01, 0x80));
    }

    #[test]
    fn address_truncated_to_nine_bits() {
        assert_eq!(DecoderAddress::new(0x3FF).value, 0x1FF);
    }

    // =========================================================================
    // Store Tests
    // =========================================================================

    #[test]
    fn load_normalizes_stored_values() {
        let mut store = MockStore::factory();
        store.set(CvField::RoundRobinNear, 0);
        store.set(CvField::RoundRobinInterval, 0);
        store.set(CvField::Mode, 2);
        store.set(CvField::Activation, 0);

        let config = DecoderConfig::load(&mut store).unwrap();
        assert_eq!(config.round_robin_near.bits(), 1);
        assert_eq!(config.round_robin_interval_secs, 1);
        assert_eq!(config.mode, RelayMode::Independent);
        assert_eq!(config.activation, Operation::Minus);
    }

    #[test]
    fn store_then_load_preserves_config() {
        let mut store = MockStore::blank();
        let config = DecoderConfig::default()
            .with_address(DecoderAddress::new(42))
            .with_activation(Operation::Minus)
            .with_mode(RelayMode::RoundRobin)
            .with_round_robin_far(RoundRobinMask::new(0xF0))
            .with_round_robin_interval(3);
        config.store(&mut store).unwrap();

        assert_eq!(DecoderConfig::load(&mut store).unwrap(), config);
    }

    #[test]
    fn factory_defaults_written_for_every_field() {
        let mut store = MockStore::blank();
        write_factory_defaults(&mut store).unwrap();
        for field in CvField::ALL {
            assert_eq!(store.get(field), field.default_value());
        }
        assert_eq!(store.get(CvField::VendorId), VENDOR_ID);
    }
}

//! Accessory command types and dispatch outcomes.
//!
//! The DCC bit-level decoder hands the core a [`RawCommand`]: the decoder
//! address of the packet plus a command field already reduced to this
//! decoder's 16-output block. This module splits that field into its parts
//! and defines the outcomes the relay engine reports back.
//!
//! # Command Layout
//!
//! ```text
//!  bit:   4   3   2   1   0
//!        [ relay index   ][op]
//! ```
//!
//! - bit 0: [`Operation`] (`0` = "-", `1` = "+")
//! - bits 1..4: relay index `0..15`
//!
//! Values above 31 belong to another decoder and are dropped.
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::{Bank, Operation, RelayCommand};
//!
//! let cmd = RelayCommand::from_raw(0b1_0011).unwrap();
//! assert_eq!(cmd.operation(), Operation::Plus);
//! assert_eq!(cmd.relay_index(), 9);
//!
//! // Relays 8..15 are wired in reverse on the far bank
//! let target = cmd.target();
//! assert_eq!(target.bank, Bank::Far);
//! assert_eq!(target.index, 6);
//!
//! assert!(RelayCommand::from_raw(32).is_none());
//! ```

/// Number of outputs in one relay bank.
pub const RELAYS_PER_BANK: u8 = 8;

/// Largest command value that still addresses this decoder's block.
pub const MAX_LOCAL_COMMAND: u16 = 0b1_1111;

// ============================================================================
// Raw decoded message
// ============================================================================

/// A decoded accessory message as delivered by the DCC receiver.
///
/// `address` is the 9-bit accessory decoder address carried by the packet.
/// `command` is the command field relative to this decoder's address block:
/// bit 0 is the operation, the remaining bits select the output. During
/// programming only the low three bits are meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawCommand {
    /// Accessory decoder address of the packet.
    pub address: u16,
    /// Command field relative to this decoder's block.
    pub command: u16,
}

impl RawCommand {
    /// Creates a raw command.
    pub const fn new(address: u16, command: u16) -> Self {
        Self { address, command }
    }

    /// Operation bit of the command field.
    #[inline]
    pub const fn operation(&self) -> Operation {
        Operation::from_bit(self.command as u8)
    }

    /// Mode selector used while programming: bits 1..2 of the command.
    #[inline]
    pub const fn mode_field(&self) -> u8 {
        ((self.command & 0b111) >> 1) as u8
    }
}

/// Result of classifying a message against this decoder's address.
///
/// Provided by the DCC receiver, which knows the configured address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MessageClass {
    /// Not an accessory packet at all.
    NotAccessory,
    /// Accessory packet for an address below this decoder's block.
    Foreign,
    /// Accessory packet for exactly this decoder's base address.
    OwnAddress,
    /// Accessory packet at or above this decoder's base address.
    OwnAddressOrHigher,
}

impl MessageClass {
    /// True for any accessory packet, regardless of address.
    ///
    /// The programming procedure accepts these.
    #[inline]
    pub const fn is_accessory(&self) -> bool {
        !matches!(self, MessageClass::NotAccessory)
    }

    /// True if the packet should be handed to the relay engine.
    #[inline]
    pub const fn is_dispatchable(&self) -> bool {
        matches!(
            self,
            MessageClass::OwnAddress | MessageClass::OwnAddressOrHigher
        )
    }
}

// ============================================================================
// Operation polarity
// ============================================================================

/// Command polarity, the "+" and "-" keys on a handheld.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Operation {
    /// The "-" key (bit value 0).
    Minus,
    /// The "+" key (bit value 1).
    #[default]
    Plus,
}

impl Operation {
    /// Decode from the lowest bit of `bits`.
    #[inline]
    pub const fn from_bit(bits: u8) -> Self {
        if bits & 1 == 1 {
            Operation::Plus
        } else {
            Operation::Minus
        }
    }

    /// Encoded bit value.
    #[inline]
    pub const fn bit(&self) -> u8 {
        match self {
            Operation::Minus => 0,
            Operation::Plus => 1,
        }
    }

    /// Returns the key symbol.
    ///
    /// ```
    /// use dcc_relay_decoder::Operation;
    ///
    /// assert_eq!(Operation::Plus.as_str(), "+");
    /// assert_eq!(Operation::Minus.as_str(), "-");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Minus => "-",
            Operation::Plus => "+",
        }
    }
}

// ============================================================================
// Relay addressing
// ============================================================================

/// One of the two relay banks on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Bank {
    /// Relays 1-8, next to the indicator LED.
    Near,
    /// Relays 9-16, next to the output connector. Wired in reverse order.
    Far,
}

impl Bank {
    /// Both banks, near first.
    pub const ALL: [Bank; 2] = [Bank::Near, Bank::Far];
}

/// A single physical relay output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelayTarget {
    /// Bank the relay belongs to.
    pub bank: Bank,
    /// Physical index within the bank (`0..8`).
    pub index: u8,
}

impl RelayTarget {
    /// True for the far bank's first physical output, i.e. logical relay 15.
    #[inline]
    pub const fn is_last_relay(&self) -> bool {
        matches!(self.bank, Bank::Far) && self.index == 0
    }
}

/// The 5-bit relay command: relay index plus operation.
///
/// Two `RelayCommand`s compare equal only if both relay and polarity match,
/// which is what duplicate suppression keys on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelayCommand(u8);

impl RelayCommand {
    /// Accepts a local command value, rejecting anything above 31.
    pub const fn from_raw(command: u16) -> Option<Self> {
        if command > MAX_LOCAL_COMMAND {
            None
        } else {
            Some(Self(command as u8))
        }
    }

    /// Builds a command for `relay` (`0..16`) with the given operation.
    pub const fn new(relay: u8, operation: Operation) -> Option<Self> {
        if relay >= 2 * RELAYS_PER_BANK {
            None
        } else {
            Some(Self((relay << 1) | operation.bit()))
        }
    }

    /// The raw 5-bit value.
    #[inline]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Operation bit.
    #[inline]
    pub const fn operation(&self) -> Operation {
        Operation::from_bit(self.0)
    }

    /// Logical relay index `0..16`.
    #[inline]
    pub const fn relay_index(&self) -> u8 {
        self.0 >> 1
    }

    /// Physical output addressed by this command.
    pub const fn target(&self) -> RelayTarget {
        let relay = self.relay_index();
        if relay < RELAYS_PER_BANK {
            RelayTarget {
                bank: Bank::Near,
                index: relay,
            }
        } else {
            RelayTarget {
                bank: Bank::Far,
                index: 15 - relay,
            }
        }
    }
}

// ============================================================================
// Dispatch outcomes
// ============================================================================

/// What the relay engine did with a command.
///
/// None of these are failures: commands for other decoders, retransmissions
/// and polarity the mode ignores are all expected traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RelayOutcome {
    /// Command value above 31, addressed to another decoder.
    NotOurs,
    /// Exact repeat of the previous command.
    Duplicate,
    /// Relay was set.
    Activated {
        /// The relay that was set.
        target: RelayTarget,
        /// Whether the rest of the bank was released first.
        exclusive: bool,
    },
    /// Relay was released.
    Released {
        /// The relay that was released.
        target: RelayTarget,
    },
    /// The mode ignores this polarity.
    Ignored {
        /// The relay the command addressed.
        target: RelayTarget,
    },
    /// The "last relay" release switched the decoder to round-robin.
    RoundRobinEngaged,
    /// The mode does not accept direct relay commands.
    DirectDisabled,
}

impl RelayOutcome {
    /// True if relay outputs were touched.
    pub const fn changed_outputs(&self) -> bool {
        matches!(
            self,
            RelayOutcome::Activated { .. } | RelayOutcome::Released { .. }
        )
    }
}

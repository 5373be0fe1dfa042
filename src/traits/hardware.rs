//! Hardware abstraction traits for relay outputs and the programming panel.
//!
//! These are the narrow seams between the decoder logic and the board. The
//! relay engine and round-robin scheduler only ever see [`RelayOutputs`];
//! the programming procedure only sees [`ControlPanel`].
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`RelayOutputs`] | Set/clear relays in the two banks |
//! | [`ControlPanel`] | Programming button and indicator LED |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. With the `embedded-hal` feature,
//! `hal::gpio` binds both traits to digital pins.
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::traits::RelayOutputs;
//! use dcc_relay_decoder::hal::MockRelays;
//! use dcc_relay_decoder::Bank;
//!
//! let mut relays = MockRelays::new();
//! relays.set_relay(Bank::Near, 3).unwrap();
//! relays.set_relay(Bank::Near, 5).unwrap();
//! relays.clear_relay(Bank::Near, 3).unwrap();
//!
//! assert_eq!(relays.banks.near.bits(), 0b0010_0000);
//! ```

use crate::commands::{Bank, RELAYS_PER_BANK};

/// Relay bank driver.
///
/// Two independent groups of eight outputs. Indices are physical positions
/// `0..8` within the bank; the wiring reversal of the far bank has already
/// been applied by the caller.
///
/// # Implementation Notes
///
/// - Setting an already-set relay and clearing an already-clear relay must
///   be harmless
/// - `clear_bank` has a default built from `clear_relay`; override it when
///   the hardware can write the whole bank at once
pub trait RelayOutputs {
    /// Error type for output operations.
    type Error;

    /// Energize relay `index` in `bank`.
    fn set_relay(&mut self, bank: Bank, index: u8) -> Result<(), Self::Error>;

    /// Release relay `index` in `bank`.
    fn clear_relay(&mut self, bank: Bank, index: u8) -> Result<(), Self::Error>;

    /// Release every relay in `bank`.
    fn clear_bank(&mut self, bank: Bank) -> Result<(), Self::Error> {
        for index in 0..RELAYS_PER_BANK {
            self.clear_relay(bank, index)?;
        }
        Ok(())
    }

    /// Release every relay on the board.
    fn clear_all(&mut self) -> Result<(), Self::Error> {
        for bank in Bank::ALL {
            self.clear_bank(bank)?;
        }
        Ok(())
    }
}

/// Programming button and status indicator.
///
/// # Implementation Notes
///
/// - `is_button_pressed` reports the raw, undebounced level; debouncing is
///   done by the programming controller against the tick counter
/// - The flash sequencer itself runs elsewhere (usually in the tick
///   interrupt); `flash_fast` only requests a pattern
pub trait ControlPanel {
    /// Returns true while the programming button is held down.
    fn is_button_pressed(&mut self) -> bool;

    /// Turn the indicator on steadily.
    fn indicator_on(&mut self);

    /// Turn the indicator off, cancelling any flash pattern.
    fn indicator_off(&mut self);

    /// Request `count` short flashes followed by a pause, repeating.
    fn flash_fast(&mut self, count: u8);
}

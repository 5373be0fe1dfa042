//! In-memory image of the two relay banks.
//!
//! [`RelayBanks`] is the relay bank state as the rest of the crate sees it:
//! two 8-bit vectors, one bit per relay. It implements [`RelayOutputs`]
//! itself, so it can serve as a shadow register or as a test double. A
//! port-based board can write [`BankState::bits`] straight to its output
//! register.

use core::convert::Infallible;

use heapless::Vec;

use crate::commands::{Bank, RELAYS_PER_BANK};
use crate::traits::RelayOutputs;

/// The eight relays of one bank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BankState(u8);

impl BankState {
    /// A bank with the given bits set.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw bit image, bit `i` = relay `i`.
    #[inline]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether relay `index` is energized.
    #[inline]
    pub const fn is_set(&self, index: u8) -> bool {
        index < RELAYS_PER_BANK && self.0 & (1 << index) != 0
    }

    /// Number of energized relays.
    #[inline]
    pub const fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Indices of energized relays, ascending.
    ///
    /// ```
    /// use dcc_relay_decoder::relays::BankState;
    ///
    /// let bank = BankState::from_bits(0b1000_0101);
    /// assert_eq!(bank.active().as_slice(), &[0, 2, 7]);
    /// ```
    pub fn active(&self) -> Vec<u8, 8> {
        let mut out = Vec::new();
        for index in (0..RELAYS_PER_BANK).filter(|&i| self.is_set(i)) {
            // Capacity matches RELAYS_PER_BANK
            let _ = out.push(index);
        }
        out
    }

    fn set(&mut self, index: u8) {
        if index < RELAYS_PER_BANK {
            self.0 |= 1 << index;
        }
    }

    fn clear(&mut self, index: u8) {
        if index < RELAYS_PER_BANK {
            self.0 &= !(1 << index);
        }
    }
}

/// Both relay banks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelayBanks {
    /// Relays 1-8.
    pub near: BankState,
    /// Relays 9-16, physical order.
    pub far: BankState,
}

impl RelayBanks {
    /// Both banks released.
    pub const fn new() -> Self {
        Self {
            near: BankState(0),
            far: BankState(0),
        }
    }

    /// State of `bank`.
    pub const fn bank(&self, bank: Bank) -> BankState {
        match bank {
            Bank::Near => self.near,
            Bank::Far => self.far,
        }
    }

    fn bank_mut(&mut self, bank: Bank) -> &mut BankState {
        match bank {
            Bank::Near => &mut self.near,
            Bank::Far => &mut self.far,
        }
    }
}

impl RelayOutputs for RelayBanks {
    type Error = Infallible;

    fn set_relay(&mut self, bank: Bank, index: u8) -> Result<(), Infallible> {
        self.bank_mut(bank).set(index);
        Ok(())
    }

    fn clear_relay(&mut self, bank: Bank, index: u8) -> Result<(), Infallible> {
        self.bank_mut(bank).clear(index);
        Ok(())
    }

    fn clear_bank(&mut self, bank: Bank) -> Result<(), Infallible> {
        *self.bank_mut(bank) = BankState(0);
        Ok(())
    }
}

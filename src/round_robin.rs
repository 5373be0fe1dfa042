//! Round-robin relay cycling.
//!
//! Every configured interval, each bank moves its single lit relay one step
//! forward through the positions enabled in its [`RoundRobinMask`]. The
//! scheduler is polled from the main loop; extra polls within an interval
//! cost nothing.
//!
//! # Far Bank Order
//!
//! Mask bit `i` of the far bank refers to relay `9 + i`. That relay is wired
//! at physical index `7 - i`, so the far bank lights `7 - cursor`.
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::round_robin::RoundRobinScheduler;
//! use dcc_relay_decoder::config::RoundRobinMask;
//! use dcc_relay_decoder::relays::RelayBanks;
//!
//! let mut scheduler = RoundRobinScheduler::new(
//!     RoundRobinMask::new(0b0000_0101),
//!     RoundRobinMask::new(0b0000_0001),
//!     1,
//!     0,
//! );
//! let mut banks = RelayBanks::new();
//!
//! let step = scheduler.tick(1, true, &mut banks).unwrap().unwrap();
//! assert_eq!(step.near, 0);
//! assert_eq!(step.far, 7);
//!
//! // Same second: nothing happens
//! assert!(scheduler.tick(1, true, &mut banks).unwrap().is_none());
//!
//! let step = scheduler.tick(2, true, &mut banks).unwrap().unwrap();
//! assert_eq!(step.near, 2);
//! ```

use log::debug;

use crate::commands::{Bank, RELAYS_PER_BANK};
use crate::config::{DecoderConfig, RoundRobinMask};
use crate::traits::RelayOutputs;

/// Physical relays lit by one round-robin step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoundRobinStep {
    /// Index lit in the near bank.
    pub near: u8,
    /// Physical index lit in the far bank.
    pub far: u8,
}

/// Cursor over one bank's enabled positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cursor {
    mask: RoundRobinMask,
    next: u8,
}

impl Cursor {
    const fn new(mask: RoundRobinMask) -> Self {
        Self { mask, next: 0 }
    }

    /// Position to light now; the cursor then moves past it.
    fn advance(&mut self) -> u8 {
        // A normalized mask has at least one bit, so this ends within 8 steps
        while !self.mask.contains(self.next) {
            self.next = (self.next + 1) % RELAYS_PER_BANK;
        }
        let position = self.next;
        self.next = (self.next + 1) % RELAYS_PER_BANK;
        position
    }
}

/// Interval-driven relay cycler for both banks.
#[derive(Clone, Debug)]
pub struct RoundRobinScheduler {
    near: Cursor,
    far: Cursor,
    interval_secs: u32,
    last_fired: u32,
}

impl RoundRobinScheduler {
    /// Create a scheduler.
    ///
    /// `now_secs` is the current seconds counter; the first step happens
    /// `interval_secs` later. An interval of `0` is treated as `1`.
    pub fn new(
        near: RoundRobinMask,
        far: RoundRobinMask,
        interval_secs: u8,
        now_secs: u32,
    ) -> Self {
        Self {
            near: Cursor::new(near),
            far: Cursor::new(far),
            interval_secs: u32::from(interval_secs.max(1)),
            last_fired: now_secs,
        }
    }

    /// Create a scheduler from a loaded configuration.
    pub fn from_config(config: &DecoderConfig, now_secs: u32) -> Self {
        Self::new(
            config.round_robin_near,
            config.round_robin_far,
            config.round_robin_interval_secs,
            now_secs,
        )
    }

    /// Poll the scheduler.
    ///
    /// Fires at most once per interval. The interval timer runs whether or
    /// not round-robin is `active`; relays are only touched when it is.
    /// Returns the lit relays when a step was taken.
    pub fn tick<R: RelayOutputs>(
        &mut self,
        now_secs: u32,
        active: bool,
        relays: &mut R,
    ) -> Result<Option<RoundRobinStep>, R::Error> {
        if now_secs.wrapping_sub(self.last_fired) < self.interval_secs {
            return Ok(None);
        }
        self.last_fired = now_secs;

        if !active {
            return Ok(None);
        }

        relays.clear_bank(Bank::Far)?;
        let far = (RELAYS_PER_BANK - 1) - self.far.advance();
        relays.set_relay(Bank::Far, far)?;

        relays.clear_bank(Bank::Near)?;
        let near = self.near.advance();
        relays.set_relay(Bank::Near, near)?;

        debug!("round-robin step: near {} far {}", near, far);
        Ok(Some(RoundRobinStep { near, far }))
    }

    /// Next cycle positions `(near, far)` to be considered.
    pub fn cursors(&self) -> (u8, u8) {
        (self.near.next, self.far.next)
    }

    /// Seconds between steps.
    pub fn interval_secs(&self) -> u32 {
        self.interval_secs
    }
}

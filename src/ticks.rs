//! Interrupt-driven tick and seconds counters.
//!
//! The periodic timer interrupt calls [`TickCounters::on_tick`] every
//! [`TICK_PERIOD_US`]. The main loop reads both counters through
//! [`TickSource::snapshot`]. The seconds counter is wider than a single
//! machine word on small targets, so every access happens inside a
//! `critical_section`.
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::ticks::{TickCounters, TICKS_PER_SECOND};
//! use dcc_relay_decoder::traits::TickSource;
//!
//! static TICKS: TickCounters = TickCounters::new();
//!
//! // In the timer interrupt:
//! for _ in 0..TICKS_PER_SECOND {
//!     TICKS.on_tick();
//! }
//!
//! // In the main loop:
//! let now = TICKS.snapshot();
//! assert_eq!(now.seconds, 1);
//! assert_eq!(now.ticks, TICKS_PER_SECOND as u8);
//! ```

use core::cell::Cell;

use critical_section::Mutex;

use crate::traits::{TickSnapshot, TickSource};

/// Fine tick period in microseconds.
pub const TICK_PERIOD_US: u32 = 20_000;

/// Fine ticks per second.
pub const TICKS_PER_SECOND: u32 = 1_000_000 / TICK_PERIOD_US;

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    ticks: u8,
    sub_second: u32,
    seconds: u32,
}

/// Shared counters, advanced from interrupt context.
pub struct TickCounters {
    inner: Mutex<Cell<Counters>>,
}

impl TickCounters {
    /// Counters at zero. `const` so it can back a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(Counters {
                ticks: 0,
                sub_second: 0,
                seconds: 0,
            })),
        }
    }

    /// Advance by one tick. Call from the timer interrupt.
    pub fn on_tick(&self) {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let mut c = cell.get();
            c.ticks = c.ticks.wrapping_add(1);
            c.sub_second += 1;
            if c.sub_second >= TICKS_PER_SECOND {
                c.sub_second = 0;
                c.seconds = c.seconds.wrapping_add(1);
            }
            cell.set(c);
        });
    }
}

impl Default for TickCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for TickCounters {
    fn snapshot(&self) -> TickSnapshot {
        critical_section::with(|cs| {
            let c = self.inner.borrow(cs).get();
            TickSnapshot::new(c.ticks, c.seconds)
        })
    }
}

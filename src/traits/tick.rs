//! Tick source trait.
//!
//! Two free-running counters from the periodic timer: a fine 8-bit tick
//! (nominally 20 ms) for debouncing and a coarser seconds counter for
//! round-robin pacing. Both wrap; compare them with `wrapping_sub`.

/// A consistent reading of both counters.
///
/// # Example
///
/// ```rust
/// use dcc_relay_decoder::traits::TickSnapshot;
///
/// let earlier = TickSnapshot::new(250, 10);
/// let later = TickSnapshot::new(4, 11);
///
/// // Wraparound is handled by unsigned differences
/// assert_eq!(later.ticks_since(earlier.ticks), 10);
/// assert_eq!(later.seconds_since(earlier.seconds), 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickSnapshot {
    /// Fine tick counter.
    pub ticks: u8,
    /// Seconds counter.
    pub seconds: u32,
}

impl TickSnapshot {
    /// Creates a snapshot from raw counter values.
    pub const fn new(ticks: u8, seconds: u32) -> Self {
        Self { ticks, seconds }
    }

    /// Ticks elapsed since `mark`.
    #[inline]
    pub const fn ticks_since(&self, mark: u8) -> u8 {
        self.ticks.wrapping_sub(mark)
    }

    /// Seconds elapsed since `mark`.
    #[inline]
    pub const fn seconds_since(&self, mark: u32) -> u32 {
        self.seconds.wrapping_sub(mark)
    }
}

/// Time source for the main loop.
///
/// Implementations must read both counters atomically with respect to the
/// interrupt that advances them.
pub trait TickSource {
    /// Read both counters.
    fn snapshot(&self) -> TickSnapshot;
}

//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for every collaborator trait, so the
//! whole decoder can run on a desktop.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockRelays`] | [`RelayOutputs`] | Relay bank image plus call counts |
//! | [`MockStore`] | [`ConfigStore`] | CV cells with write log and latency |
//! | [`MockDcc`] | [`MessageSource`] | Queued accessory messages |
//! | [`MockPanel`] | [`ControlPanel`] | Button level, indicator and flash requests |
//! | [`MockTicks`] | [`TickSource`] | Controllable tick counters |
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::Decoder;
//! use dcc_relay_decoder::hal::{MockDcc, MockPanel, MockRelays, MockStore, MockTicks};
//! use dcc_relay_decoder::{Operation, RawCommand, RelayCommand};
//!
//! let ticks = MockTicks::new();
//! let mut decoder = Decoder::new(
//!     MockRelays::new(),
//!     MockStore::factory(),
//!     MockDcc::new(),
//!     MockPanel::new(),
//! );
//! decoder.run_boot(&ticks).unwrap();
//!
//! // Default address is 1; "+" on relay 4
//! let cmd = RelayCommand::new(4, Operation::Plus).unwrap();
//! decoder.messages_mut().send(RawCommand::new(1, cmd.bits().into()));
//! decoder.run_once(&ticks).unwrap();
//!
//! assert!(decoder.relays().banks.near.is_set(4));
//! ```
//!
//! [`RelayOutputs`]: crate::traits::RelayOutputs
//! [`ConfigStore`]: crate::traits::ConfigStore
//! [`MessageSource`]: crate::traits::MessageSource
//! [`ControlPanel`]: crate::traits::ControlPanel
//! [`TickSource`]: crate::traits::TickSource

use std::cell::Cell;
use std::collections::VecDeque;

use crate::commands::{Bank, MessageClass, RawCommand};
use crate::config::{CvField, DecoderAddress};
use crate::relays::RelayBanks;
use crate::ticks::{TickCounters, TICKS_PER_SECOND};
use crate::traits::{
    ConfigStore, ControlPanel, MessageSource, RelayOutputs, TickSnapshot, TickSource,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Mock relay driver.
///
/// Keeps the bank image in [`RelayBanks`] and counts calls. Set `fail` to
/// make every call return `Err(())`.
///
/// # Example
///
/// ```rust
/// use dcc_relay_decoder::hal::MockRelays;
/// use dcc_relay_decoder::traits::RelayOutputs;
/// use dcc_relay_decoder::Bank;
///
/// let mut relays = MockRelays::new();
/// relays.set_relay(Bank::Far, 7).unwrap();
/// relays.clear_bank(Bank::Near).unwrap();
///
/// assert!(relays.banks.far.is_set(7));
/// assert_eq!(relays.set_count, 1);
/// assert_eq!(relays.bank_clears, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockRelays {
    /// Current relay image.
    pub banks: RelayBanks,
    /// Number of `set_relay` calls.
    pub set_count: usize,
    /// Number of `clear_relay` calls.
    pub clear_count: usize,
    /// Number of `clear_bank` calls.
    pub bank_clears: usize,
    /// When true, every call fails.
    pub fail: bool,
}

impl MockRelays {
    /// Creates a mock with every relay released.
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self) -> Result<(), ()> {
        if self.fail {
            Err(())
        } else {
            Ok(())
        }
    }
}

impl RelayOutputs for MockRelays {
    type Error = ();

    fn set_relay(&mut self, bank: Bank, index: u8) -> Result<(), ()> {
        self.check()?;
        self.set_count += 1;
        // RelayBanks never fails
        let _ = self.banks.set_relay(bank, index);
        Ok(())
    }

    fn clear_relay(&mut self, bank: Bank, index: u8) -> Result<(), ()> {
        self.check()?;
        self.clear_count += 1;
        let _ = self.banks.clear_relay(bank, index);
        Ok(())
    }

    fn clear_bank(&mut self, bank: Bank) -> Result<(), ()> {
        self.check()?;
        self.bank_clears += 1;
        let _ = self.banks.clear_bank(bank);
        Ok(())
    }
}

/// Mock configuration store.
///
/// Cells hold `0xFF` until written, like erased EEPROM.
///
/// Each write makes the store busy for `write_latency` calls to
/// `is_ready`. `stuck` keeps it busy forever; `read_only` records writes
/// without storing them; `fail_writes` rejects them. `fail_after = Some(n)`
/// accepts `n` more writes and rejects the rest.
///
/// # Example
///
/// ```rust
/// use dcc_relay_decoder::hal::MockStore;
/// use dcc_relay_decoder::config::CvField;
/// use dcc_relay_decoder::traits::ConfigStore;
///
/// let mut store = MockStore::factory();
/// assert_eq!(store.read_byte(CvField::VendorId).unwrap(), 0x0D);
///
/// store.write_latency = 1;
/// store.write_byte(CvField::Mode, 2).unwrap();
/// assert!(!store.is_ready());
/// assert!(store.is_ready());
/// assert_eq!(store.writes, [(CvField::Mode, 2)]);
/// ```
#[derive(Debug)]
pub struct MockStore {
    cells: [u8; CELLS],
    busy: Cell<u32>,
    /// Every accepted write, in order.
    pub writes: Vec<(CvField, u8)>,
    /// Number of accepted writes.
    pub write_count: usize,
    /// `is_ready` calls that report busy after each write.
    pub write_latency: u32,
    /// When true, the store never becomes ready.
    pub stuck: bool,
    /// When true, writes are logged but not stored.
    pub read_only: bool,
    /// When true, writes return `Err(())`.
    pub fail_writes: bool,
    /// Writes still accepted before every further write fails.
    pub fail_after: Option<usize>,
}

const CELLS: usize = CvField::Mode.offset() + 1;

impl MockStore {
    /// An erased store: every cell `0xFF`.
    pub fn blank() -> Self {
        Self {
            cells: [0xFF; CELLS],
            busy: Cell::new(0),
            writes: Vec::new(),
            write_count: 0,
            write_latency: 0,
            stuck: false,
            read_only: false,
            fail_writes: false,
            fail_after: None,
        }
    }

    /// A store holding factory defaults.
    pub fn factory() -> Self {
        let mut store = Self::blank();
        for field in CvField::ALL {
            store.set(field, field.default_value());
        }
        store
    }

    /// Set a cell directly, without logging a write.
    pub fn set(&mut self, field: CvField, value: u8) {
        self.cells[field.offset()] = value;
    }

    /// Read a cell directly.
    pub fn get(&self, field: CvField) -> u8 {
        self.cells[field.offset()]
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::factory()
    }
}

impl ConfigStore for MockStore {
    type Error = ();

    fn read_byte(&mut self, field: CvField) -> Result<u8, ()> {
        Ok(self.get(field))
    }

    fn write_byte(&mut self, field: CvField, value: u8) -> Result<(), ()> {
        if self.fail_writes {
            return Err(());
        }
        match self.fail_after {
            Some(0) => return Err(()),
            Some(n) => self.fail_after = Some(n - 1),
            None => {}
        }
        if !self.read_only {
            self.set(field, value);
        }
        self.writes.push((field, value));
        self.write_count += 1;
        self.busy.set(self.write_latency);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        if self.stuck {
            return false;
        }
        match self.busy.get() {
            0 => true,
            n => {
                self.busy.set(n - 1);
                false
            }
        }
    }
}

/// Mock DCC receiver.
///
/// Messages queued with [`push`](Self::push) carry an explicit class.
/// Messages queued with [`send`](Self::send) are classified against the
/// address given to [`configure`](MessageSource::configure): the same
/// address is `OwnAddress`, a higher one `OwnAddressOrHigher`, a lower one
/// `Foreign`.
///
/// # Example
///
/// ```rust
/// use dcc_relay_decoder::hal::MockDcc;
/// use dcc_relay_decoder::traits::MessageSource;
/// use dcc_relay_decoder::config::DecoderAddress;
/// use dcc_relay_decoder::{MessageClass, RawCommand};
///
/// let mut dcc = MockDcc::new();
/// dcc.configure(DecoderAddress::new(10));
/// dcc.send(RawCommand::new(9, 1));
///
/// let msg = dcc.take_message().unwrap();
/// assert_eq!(dcc.classify(&msg), MessageClass::Foreign);
/// assert!(!dcc.message_available());
/// ```
#[derive(Debug, Default)]
pub struct MockDcc {
    queue: VecDeque<(RawCommand, Option<MessageClass>)>,
    last: Option<(RawCommand, MessageClass)>,
    /// Address passed to the last `configure` call.
    pub address: Option<DecoderAddress>,
    /// Number of messages taken.
    pub taken: usize,
}

impl MockDcc {
    /// Creates an empty receiver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message with a fixed classification.
    pub fn push(&mut self, message: RawCommand, class: MessageClass) {
        self.queue.push_back((message, Some(class)));
    }

    /// Queue an accessory message, classified by address.
    pub fn send(&mut self, message: RawCommand) {
        self.queue.push_back((message, None));
    }

    /// Messages still queued.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn classify_by_address(&self, message: &RawCommand) -> MessageClass {
        let own = self.address.map_or(0, |a| a.value);
        match message.address {
            a if a == own => MessageClass::OwnAddress,
            a if a > own => MessageClass::OwnAddressOrHigher,
            _ => MessageClass::Foreign,
        }
    }
}

impl MessageSource for MockDcc {
    fn message_available(&self) -> bool {
        !self.queue.is_empty()
    }

    fn take_message(&mut self) -> Option<RawCommand> {
        let (message, class) = self.queue.pop_front()?;
        let class = class.unwrap_or_else(|| self.classify_by_address(&message));
        self.last = Some((message, class));
        self.taken += 1;
        Some(message)
    }

    fn classify(&self, message: &RawCommand) -> MessageClass {
        match self.last {
            Some((last, class)) if last == *message => class,
            _ => self.classify_by_address(message),
        }
    }

    fn configure(&mut self, address: DecoderAddress) {
        self.address = Some(address);
    }
}

/// Mock programming button and indicator.
///
/// # Example
///
/// ```rust
/// use dcc_relay_decoder::hal::MockPanel;
/// use dcc_relay_decoder::traits::ControlPanel;
///
/// let mut panel = MockPanel::new();
/// panel.press();
/// assert!(panel.is_button_pressed());
///
/// panel.flash_fast(5);
/// assert_eq!(panel.last_flash(), Some(5));
/// panel.indicator_off();
/// assert_eq!(panel.last_flash(), None);
/// ```
#[derive(Debug, Default)]
pub struct MockPanel {
    /// Raw button level.
    pub pressed: bool,
    /// Steady indicator state.
    pub indicator: bool,
    /// Active flash request, cleared by `indicator_on`/`indicator_off`.
    pub flashing: Option<u8>,
    /// Every flash request, in order.
    pub flash_requests: Vec<u8>,
    /// Number of button reads.
    pub button_reads: usize,
}

impl MockPanel {
    /// Creates a panel with the button released and indicator off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the button down.
    pub fn press(&mut self) {
        self.pressed = true;
    }

    /// Let go of the button.
    pub fn release(&mut self) {
        self.pressed = false;
    }

    /// The flash pattern currently requested.
    pub fn last_flash(&self) -> Option<u8> {
        self.flashing
    }
}

impl ControlPanel for MockPanel {
    fn is_button_pressed(&mut self) -> bool {
        self.button_reads += 1;
        self.pressed
    }

    fn indicator_on(&mut self) {
        self.indicator = true;
        self.flashing = None;
    }

    fn indicator_off(&mut self) {
        self.indicator = false;
        self.flashing = None;
    }

    fn flash_fast(&mut self, count: u8) {
        self.indicator = false;
        self.flashing = Some(count);
        self.flash_requests.push(count);
    }
}

/// Mock tick source.
///
/// Wraps a real [`TickCounters`] and drives it by hand.
///
/// # Example
///
/// ```rust
/// use dcc_relay_decoder::hal::MockTicks;
/// use dcc_relay_decoder::traits::TickSource;
///
/// let ticks = MockTicks::new();
/// ticks.advance(3);
/// assert_eq!(ticks.snapshot().ticks, 3);
///
/// ticks.advance_secs(2);
/// assert_eq!(ticks.snapshot().seconds, 2);
/// ```
#[derive(Default)]
pub struct MockTicks {
    counters: TickCounters,
}

impl MockTicks {
    /// Counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `ticks` timer interrupts.
    pub fn advance(&self, ticks: u32) {
        for _ in 0..ticks {
            self.counters.on_tick();
        }
    }

    /// Advance by whole seconds.
    pub fn advance_secs(&self, secs: u32) {
        self.advance(secs * TICKS_PER_SECOND);
    }
}

impl TickSource for MockTicks {
    fn snapshot(&self) -> TickSnapshot {
        self.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // MockRelays Tests
    // =========================================================================

    #[test]
    fn mock_relays_default() {
        let relays = MockRelays::new();
        assert_eq!(relays.banks, RelayBanks::new());
        assert_eq!(relays.set_count, 0);
        assert!(!relays.fail);
    }

    #[test]
    fn mock_relays_failure() {
        let mut relays = MockRelays::new();
        relays.fail = true;
        assert_eq!(relays.set_relay(Bank::Near, 0), Err(()));
        assert_eq!(relays.clear_all(), Err(()));
        assert_eq!(relays.banks, RelayBanks::new());
    }

    #[test]
    fn mock_relays_clear_all_uses_bank_clears() {
        let mut relays = MockRelays::new();
        relays.set_relay(Bank::Near, 1).unwrap();
        relays.set_relay(Bank::Far, 2).unwrap();
        relays.clear_all().unwrap();
        assert_eq!(relays.banks, RelayBanks::new());
        assert_eq!(relays.bank_clears, 2);
        assert_eq!(relays.clear_count, 0);
    }

    // =========================================================================
    // MockStore Tests
    // =========================================================================

    #[test]
    fn blank_store_reads_erased() {
        let mut store = MockStore::blank();
        for field in CvField::ALL {
            assert_eq!(store.read_byte(field).unwrap(), 0xFF);
        }
    }

    #[test]
    fn read_only_store_logs_but_keeps_value() {
        let mut store = MockStore::blank();
        store.read_only = true;
        store.write_byte(CvField::VendorId, 0x0D).unwrap();
        assert_eq!(store.get(CvField::VendorId), 0xFF);
        assert_eq!(store.write_count, 1);
    }

    #[test]
    fn stuck_store_never_ready() {
        let mut store = MockStore::factory();
        store.stuck = true;
        for _ in 0..10 {
            assert!(!store.is_ready());
        }
    }

    #[test]
    fn failing_store_rejects_writes() {
        let mut store = MockStore::factory();
        store.fail_writes = true;
        assert_eq!(store.write_byte(CvField::Mode, 1), Err(()));
        assert!(store.writes.is_empty());
    }

    #[test]
    fn fail_after_accepts_then_rejects() {
        let mut store = MockStore::factory();
        store.fail_after = Some(2);
        assert_eq!(store.write_byte(CvField::AddressLow, 4), Ok(()));
        assert_eq!(store.write_byte(CvField::AddressHigh, 0), Ok(()));
        assert_eq!(store.write_byte(CvField::Mode, 1), Err(()));
        assert_eq!(store.write_count, 2);
        assert_eq!(store.get(CvField::Mode), 0);
    }

    // =========================================================================
    // MockDcc Tests
    // =========================================================================

    #[test]
    fn dcc_classifies_by_configured_address() {
        let mut dcc = MockDcc::new();
        dcc.configure(DecoderAddress::new(5));
        for (address, class) in [
            (5, MessageClass::OwnAddress),
            (6, MessageClass::OwnAddressOrHigher),
            (4, MessageClass::Foreign),
        ] {
            dcc.send(RawCommand::new(address, 0));
            let msg = dcc.take_message().unwrap();
            assert_eq!(dcc.classify(&msg), class);
        }
    }

    #[test]
    fn dcc_explicit_class_wins() {
        let mut dcc = MockDcc::new();
        dcc.configure(DecoderAddress::new(5));
        dcc.push(RawCommand::new(5, 0), MessageClass::NotAccessory);
        let msg = dcc.take_message().unwrap();
        assert_eq!(dcc.classify(&msg), MessageClass::NotAccessory);
    }

    #[test]
    fn dcc_messages_in_fifo_order() {
        let mut dcc = MockDcc::new();
        dcc.send(RawCommand::new(1, 2));
        dcc.send(RawCommand::new(1, 3));
        assert_eq!(dcc.take_message().unwrap().command, 2);
        assert_eq!(dcc.take_message().unwrap().command, 3);
        assert!(dcc.take_message().is_none());
        assert_eq!(dcc.taken, 2);
    }

    // =========================================================================
    // MockPanel Tests
    // =========================================================================

    #[test]
    fn panel_indicator_cancels_flash() {
        let mut panel = MockPanel::new();
        panel.flash_fast(5);
        panel.indicator_on();
        assert!(panel.indicator);
        assert_eq!(panel.last_flash(), None);
        assert_eq!(panel.flash_requests, [5]);
    }

    // =========================================================================
    // MockTicks Tests
    // =========================================================================

    #[test]
    fn ticks_advance_seconds() {
        let ticks = MockTicks::new();
        ticks.advance_secs(3);
        let now = ticks.snapshot();
        assert_eq!(now.seconds, 3);
        assert_eq!(now.ticks, (3 * TICKS_PER_SECOND) as u8);
    }
}

//! Integration tests for the decoder main loop

use dcc_relay_decoder::{
    config::VENDOR_ID,
    hal::{MockDcc, MockPanel, MockRelays, MockStore, MockTicks},
    programming::DEBOUNCE_TICKS,
    CvField, Decoder, MessageClass, Operation, PollReport, ProgrammingEvent, ProgrammingState,
    RawCommand, RelayCommand, RelayMode, RelayOutcome,
};

struct Harness {
    decoder: Decoder<MockRelays, MockStore, MockDcc, MockPanel>,
    clock: MockTicks,
}

impl Harness {
    fn boot(store: MockStore) -> Self {
        let mut decoder = Decoder::new(MockRelays::new(), store, MockDcc::new(), MockPanel::new());
        let clock = MockTicks::new();
        decoder.run_boot(&clock).unwrap();
        Self { decoder, clock }
    }

    fn with_mode(address: u16, mode: RelayMode) -> Self {
        let mut store = MockStore::factory();
        store.set(CvField::AddressLow, (address & 0x3F) as u8);
        store.set(CvField::AddressHigh, (address >> 6) as u8);
        store.set(CvField::Mode, mode.to_cv());
        Self::boot(store)
    }

    /// Advance one tick and poll once.
    fn tick(&mut self) -> PollReport {
        self.clock.advance(1);
        self.decoder.run_once(&self.clock).unwrap()
    }

    fn ticks(&mut self, n: u32) -> Vec<PollReport> {
        (0..n).map(|_| self.tick()).collect()
    }

    fn send(&mut self, relay: u8, op: Operation) -> PollReport {
        let address = self.decoder.config().address.value;
        let cmd = RelayCommand::new(relay, op).unwrap();
        self.decoder
            .messages_mut()
            .send(RawCommand::new(address, cmd.bits().into()));
        self.tick()
    }

    /// Walk the button procedure up to listening.
    fn start_programming(&mut self) {
        let settle = u32::from(DEBOUNCE_TICKS) + 1;
        self.decoder.panel_mut().press();
        self.ticks(settle + 1);
        assert!(self.decoder.panel().indicator);
        self.decoder.panel_mut().release();
        self.ticks(settle + 1);
        assert_eq!(self.decoder.programming_state(), ProgrammingState::Listening);
    }

    fn near(&self) -> u8 {
        self.decoder.relays().banks.near.bits()
    }

    fn far(&self) -> u8 {
        self.decoder.relays().banks.far.bits()
    }
}

// ============================================================================
// Boot
// ============================================================================

#[test]
fn first_boot_initializes_blank_store() {
    let h = Harness::boot(MockStore::blank());

    let store = h.decoder.store();
    for field in CvField::ALL {
        assert_eq!(store.get(field), field.default_value());
    }
    assert_eq!(store.get(CvField::VendorId), VENDOR_ID);
    assert_eq!(h.decoder.restart_count(), 1);
    assert!(!h.decoder.config().address.programmed);
    assert_eq!(h.decoder.panel().last_flash(), Some(5));
}

#[test]
fn boot_is_repeatable() {
    let mut h = Harness::with_mode(9, RelayMode::Independent);
    let first = h.decoder.config().clone();
    let report = h.decoder.run_boot(&h.clock).unwrap();
    assert_eq!(report.config, first);
    assert!(!report.factory_reset);
}

// ============================================================================
// Programming
// ============================================================================

#[test]
fn programming_sets_address_polarity_and_mode() {
    let mut h = Harness::boot(MockStore::factory());
    h.start_programming();

    // Address 5, "+" on output pair 1
    h.decoder
        .messages_mut()
        .push(RawCommand::new(5, 0b011), MessageClass::Foreign);
    let report = h.tick();

    assert!(matches!(
        report.programming,
        Some(ProgrammingEvent::Applied(_))
    ));
    assert!(report.restarted);

    let store = h.decoder.store();
    assert_eq!(store.get(CvField::AddressLow), 5);
    assert_eq!(store.get(CvField::AddressHigh), 0);
    assert_eq!(store.get(CvField::Activation), 1);
    assert_eq!(store.get(CvField::Mode), 1);

    let config = h.decoder.config();
    assert_eq!(config.address.value, 5);
    assert!(config.address.programmed);
    assert_eq!(config.mode, RelayMode::ExclusiveRelease);
    assert_eq!(h.decoder.restart_count(), 1);
    assert!(!h.decoder.panel().indicator);
    assert_eq!(h.decoder.messages_mut().address.map(|a| a.value), Some(5));
}

#[test]
fn programming_minus_polarity_inverts_activation() {
    let mut h = Harness::boot(MockStore::factory());
    h.start_programming();
    h.decoder
        .messages_mut()
        .push(RawCommand::new(20, 0b100), MessageClass::OwnAddressOrHigher);
    h.tick();

    assert_eq!(h.decoder.config().activation, Operation::Minus);
    assert_eq!(h.decoder.config().mode, RelayMode::Independent);

    // "-" now activates
    h.send(3, Operation::Minus);
    assert_eq!(h.near(), 0b0000_1000);
    h.send(3, Operation::Plus);
    assert_eq!(h.near(), 0);
}

#[test]
fn aborted_programming_changes_nothing() {
    let mut h = Harness::with_mode(7, RelayMode::Independent);
    let before = h.decoder.config().clone();
    h.start_programming();

    h.decoder.panel_mut().press();
    h.ticks(u32::from(DEBOUNCE_TICKS) + 1);
    h.decoder.panel_mut().release();
    let events: Vec<_> = h
        .ticks(u32::from(DEBOUNCE_TICKS) + 2)
        .into_iter()
        .filter_map(|r| r.programming)
        .collect();

    assert!(events.contains(&ProgrammingEvent::Abandoned));
    assert_eq!(h.decoder.programming_state(), ProgrammingState::Idle);
    assert_eq!(h.decoder.config(), &before);
    assert_eq!(h.decoder.store().write_count, 0);
    assert_eq!(h.decoder.restart_count(), 0);
}

#[test]
fn non_accessory_traffic_ignored_while_listening() {
    let mut h = Harness::boot(MockStore::factory());
    h.start_programming();
    h.decoder
        .messages_mut()
        .push(RawCommand::new(5, 0b011), MessageClass::NotAccessory);

    let report = h.tick();
    assert_eq!(
        report.programming,
        Some(ProgrammingEvent::Ignored(MessageClass::NotAccessory))
    );
    assert_eq!(h.decoder.programming_state(), ProgrammingState::Listening);
}

#[test]
fn dispatch_paused_during_programming() {
    let mut h = Harness::with_mode(3, RelayMode::Independent);
    h.decoder.panel_mut().press();
    h.tick();

    // The message stays queued while the press is being debounced
    let cmd = RelayCommand::new(0, Operation::Plus).unwrap();
    h.decoder
        .messages_mut()
        .push(RawCommand::new(3, cmd.bits().into()), MessageClass::OwnAddress);
    let report = h.tick();

    assert_eq!(report.dispatch, None);
    assert_eq!(h.near(), 0);
    assert_eq!(h.decoder.messages_mut().pending(), 1);
}

#[test]
fn round_robin_paused_during_programming() {
    let mut h = Harness::with_mode(3, RelayMode::RoundRobin);
    h.start_programming();

    let interval = u32::from(h.decoder.config().round_robin_interval_secs);
    let steps = h
        .ticks(interval * 3 * 50)
        .into_iter()
        .filter(|r| r.round_robin.is_some())
        .count();
    assert_eq!(steps, 0);
}

#[test]
fn slow_store_still_applies() {
    let mut h = Harness::boot(MockStore::factory());
    h.start_programming();
    h.decoder.store_mut().write_latency = 10;
    h.decoder
        .messages_mut()
        .push(RawCommand::new(5, 0b001), MessageClass::OwnAddress);

    let restarted = h.ticks(20).iter().any(|r| r.restarted);
    assert!(restarted);
    assert_eq!(h.decoder.config().address.value, 5);
}

#[test]
fn stuck_store_reports_timeout_and_recovers() {
    let mut h = Harness::boot(MockStore::factory());
    h.start_programming();
    h.decoder.store_mut().stuck = true;
    h.decoder
        .messages_mut()
        .push(RawCommand::new(5, 0b001), MessageClass::OwnAddress);

    let mut timed_out = false;
    for _ in 0..200 {
        h.clock.advance(1);
        if let Err(e) = h.decoder.run_once(&h.clock) {
            assert_eq!(e, dcc_relay_decoder::Error::StoreTimeout);
            timed_out = true;
            break;
        }
    }
    assert!(timed_out);
    assert_eq!(h.decoder.programming_state(), ProgrammingState::Idle);
    assert!(!h.decoder.panel().indicator);
}

#[test]
fn failed_programming_write_returns_to_normal_operation() {
    let mut h = Harness::with_mode(7, RelayMode::Independent);
    h.start_programming();
    h.decoder.store_mut().fail_after = Some(1);
    h.decoder
        .messages_mut()
        .push(RawCommand::new(5, 0b011), MessageClass::OwnAddress);

    h.clock.advance(1);
    let result = h.decoder.run_once(&h.clock);
    assert_eq!(result, Err(dcc_relay_decoder::Error::Store(())));
    assert_eq!(h.decoder.programming_state(), ProgrammingState::Idle);
    assert!(!h.decoder.panel().indicator);

    // The running configuration is untouched and commands dispatch again
    h.decoder.store_mut().fail_after = None;
    assert_eq!(h.decoder.config().address.value, 7);
    h.send(2, Operation::Plus);
    assert_eq!(h.near(), 0b0000_0100);
}

// ============================================================================
// Relay Modes
// ============================================================================

#[test]
fn mode_zero_keeps_one_relay_per_bank() {
    let mut h = Harness::with_mode(3, RelayMode::Exclusive);
    h.send(1, Operation::Plus);
    h.send(4, Operation::Plus);
    h.send(12, Operation::Plus);

    assert_eq!(h.near(), 0b0001_0000);
    // Relay index 12 is far physical index 3
    assert_eq!(h.far(), 0b0000_1000);

    // Release is ignored in mode 0
    h.send(4, Operation::Minus);
    assert_eq!(h.near(), 0b0001_0000);
}

#[test]
fn mode_zero_last_relay_release_starts_round_robin() {
    let mut h = Harness::with_mode(3, RelayMode::Exclusive);
    h.send(2, Operation::Plus);

    let report = h.send(15, Operation::Minus);
    assert_eq!(report.dispatch, Some(RelayOutcome::RoundRobinEngaged));
    assert!(h.decoder.engine().round_robin_active());

    let steps = h
        .ticks(6 * 50)
        .into_iter()
        .filter_map(|r| r.round_robin)
        .count();
    assert_eq!(steps, 1);
    assert_eq!(h.near().count_ones(), 1);
    assert_eq!(h.far().count_ones(), 1);

    // Any activation stops it again
    h.send(5, Operation::Plus);
    assert!(!h.decoder.engine().round_robin_active());
}

#[test]
fn mode_one_release_clears_relay() {
    let mut h = Harness::with_mode(3, RelayMode::ExclusiveRelease);
    h.send(6, Operation::Plus);
    assert_eq!(h.near(), 0b0100_0000);
    h.send(6, Operation::Minus);
    assert_eq!(h.near(), 0);
}

#[test]
fn mode_two_allows_many_relays() {
    let mut h = Harness::with_mode(3, RelayMode::Independent);
    for relay in [0, 2, 4, 8, 15] {
        h.send(relay, Operation::Plus);
    }
    assert_eq!(h.near(), 0b0001_0101);
    // Relays 8 and 15 are far physical 7 and 0
    assert_eq!(h.far(), 0b1000_0001);
}

#[test]
fn mode_three_ignores_direct_commands_and_cycles() {
    let mut h = Harness::with_mode(3, RelayMode::RoundRobin);
    let report = h.send(2, Operation::Plus);
    assert_eq!(report.dispatch, Some(RelayOutcome::DirectDisabled));

    let steps: Vec<_> = h
        .ticks(18 * 50)
        .into_iter()
        .filter_map(|r| r.round_robin)
        .collect();

    // Factory masks: near 0b1111, far 0b0111
    let near: Vec<u8> = steps.iter().map(|s| s.near).collect();
    let far: Vec<u8> = steps.iter().map(|s| s.far).collect();
    assert_eq!(near, [0, 1, 2]);
    assert_eq!(far, [7, 6, 5]);
}

#[test]
fn retransmission_applied_once() {
    let mut h = Harness::with_mode(3, RelayMode::Independent);
    assert!(h.send(1, Operation::Plus).dispatch.unwrap().changed_outputs());
    assert_eq!(
        h.send(1, Operation::Plus).dispatch,
        Some(RelayOutcome::Duplicate)
    );
    assert_eq!(h.decoder.relays().set_count, 1);
}

#[test]
fn foreign_traffic_never_touches_relays() {
    let mut h = Harness::with_mode(10, RelayMode::Independent);
    for address in [0, 1, 9] {
        h.decoder
            .messages_mut()
            .send(RawCommand::new(address, 1));
        let report = h.tick();
        assert_eq!(report.message, Some(MessageClass::Foreign));
        assert_eq!(report.dispatch, None);
    }
    assert_eq!(h.decoder.relays().set_count, 0);
}

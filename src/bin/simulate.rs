//! Desktop simulation of a relay decoder session.
//!
//! Runs the decoder core against the mock HAL at the real tick rate (one
//! loop pass per 20 ms tick) and walks through a scripted session:
//!
//! - First boot on a blank store (factory defaults, unprogrammed flash)
//! - Programming address 5 in mode 1 with the button procedure
//! - A few relay commands
//! - Reprogramming to round-robin and letting it cycle
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin simulate
//! RUST_LOG=debug cargo run --bin simulate
//! ```

use anyhow::{anyhow, Result};
use log::{LevelFilter, Log, Metadata, Record};

use dcc_relay_decoder::hal::{MockDcc, MockPanel, MockRelays, MockStore, MockTicks};
use dcc_relay_decoder::programming::DEBOUNCE_TICKS;
use dcc_relay_decoder::{Decoder, Operation, RawCommand, RelayBanks, RelayCommand};

type SimDecoder = Decoder<MockRelays, MockStore, MockDcc, MockPanel>;

/// Address the scripted session programs.
const ADDRESS: u16 = 5;

struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{:<5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

fn init_logging() -> Result<()> {
    let level = match std::env::var("RUST_LOG").as_deref() {
        Ok("trace") => LevelFilter::Trace,
        Ok("debug") => LevelFilter::Debug,
        Ok("warn") => LevelFilter::Warn,
        Ok("error") => LevelFilter::Error,
        _ => LevelFilter::Info,
    };
    log::set_logger(&LOGGER).map_err(|e| anyhow!("logger: {e}"))?;
    log::set_max_level(level);
    Ok(())
}

/// Run the main loop for `ticks` timer ticks.
fn run(decoder: &mut SimDecoder, clock: &MockTicks, ticks: u32) -> Result<()> {
    for _ in 0..ticks {
        clock.advance(1);
        let report = decoder.run_once(clock).map_err(|e| anyhow!("{e}"))?;
        if let Some(step) = report.round_robin {
            println!(
                "  round-robin: near {} far {} -> {}",
                step.near,
                step.far,
                banks(&decoder.relays().banks)
            );
        }
        if report.restarted {
            println!("  restarted with {:?}", decoder.config());
        }
    }
    Ok(())
}

/// Press, hold, release, then send `message` while the decoder listens.
fn program(decoder: &mut SimDecoder, clock: &MockTicks, message: RawCommand) -> Result<()> {
    let debounce = u32::from(DEBOUNCE_TICKS) + 1;
    decoder.panel_mut().press();
    run(decoder, clock, debounce + 2)?;
    decoder.panel_mut().release();
    run(decoder, clock, debounce + 2)?;
    decoder.messages_mut().send(message);
    run(decoder, clock, 2)
}

fn send(decoder: &mut SimDecoder, clock: &MockTicks, relay: u8, op: Operation) -> Result<()> {
    let cmd = RelayCommand::new(relay, op).ok_or_else(|| anyhow!("bad relay {relay}"))?;
    decoder
        .messages_mut()
        .send(RawCommand::new(ADDRESS, cmd.bits().into()));
    run(decoder, clock, 1)?;
    println!(
        "  relay {:>2} {} -> {}",
        relay + 1,
        op.as_str(),
        banks(&decoder.relays().banks)
    );
    Ok(())
}

fn banks(banks: &RelayBanks) -> String {
    format!("near {:08b} far {:08b}", banks.near.bits(), banks.far.bits())
}

fn main() -> Result<()> {
    init_logging()?;

    let clock = MockTicks::new();
    let mut decoder = Decoder::new(
        MockRelays::new(),
        MockStore::blank(),
        MockDcc::new(),
        MockPanel::new(),
    );

    println!("== first boot");
    let report = decoder.run_boot(&clock).map_err(|e| anyhow!("{e}"))?;
    println!(
        "  factory reset: {}, unprogrammed: {}, flashing: {:?}",
        report.factory_reset,
        report.unprogrammed,
        decoder.panel().last_flash()
    );

    println!("== program address {ADDRESS}, mode 1");
    // "+" on output pair 1: command bits 0b011
    program(&mut decoder, &clock, RawCommand::new(ADDRESS, 0b011))?;

    println!("== relay commands");
    send(&mut decoder, &clock, 0, Operation::Plus)?;
    send(&mut decoder, &clock, 0, Operation::Plus)?;
    send(&mut decoder, &clock, 3, Operation::Plus)?;
    send(&mut decoder, &clock, 3, Operation::Minus)?;
    send(&mut decoder, &clock, 10, Operation::Plus)?;

    println!("== program mode 3 (round-robin)");
    program(&mut decoder, &clock, RawCommand::new(ADDRESS, 0b111))?;

    let secs = u32::from(decoder.config().round_robin_interval_secs) * 4;
    run(&mut decoder, &clock, secs * dcc_relay_decoder::ticks::TICKS_PER_SECOND)?;

    println!("== done after {} restarts", decoder.restart_count());
    Ok(())
}

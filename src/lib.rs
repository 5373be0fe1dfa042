//! # dcc-relay-decoder
//!
//! Core of a DCC accessory decoder that drives two banks of eight relays.
//!
//! ## Features
//!
//! - **Relay modes**: exclusive, exclusive with release, independent, and
//!   autonomous round-robin
//! - **Round-robin cycling**: per-bank participation masks with a
//!   configurable interval, wraparound-safe
//! - **Button programming**: press, release, send any accessory command;
//!   the decoder adopts its address, polarity and mode
//! - **Self-initializing store**: factory defaults are written when the
//!   vendor marker is missing
//! - **Hardware abstraction**: relays, store, receiver, panel and ticks are
//!   all traits, so the core runs on a desktop against mocks
//!
//! ## Architecture
//!
//! - `traits` - Collaborator abstractions
//! - `commands` - Accessory message and relay command types
//! - `config` - CV layout and decoder configuration
//! - `engine` - Relay mode state machine
//! - `round_robin` - Interval-driven relay cycling
//! - `programming` - Button-triggered programming procedure
//! - `decoder` - Main loop tying everything together
//! - `hal` - Concrete implementations (mock for testing, GPIO for boards)
//!
//! ## Example
//!
//! ```rust
//! use dcc_relay_decoder::{
//!     Decoder, Operation, RawCommand, RelayCommand,
//!     hal::{MockDcc, MockPanel, MockRelays, MockStore},
//!     traits::TickSnapshot,
//! };
//!
//! let mut decoder = Decoder::new(
//!     MockRelays::new(),
//!     MockStore::factory(),
//!     MockDcc::new(),
//!     MockPanel::new(),
//! );
//! decoder.boot(TickSnapshot::default()).unwrap();
//!
//! // "+" on relay 2 of decoder address 1
//! let cmd = RelayCommand::new(2, Operation::Plus).unwrap();
//! decoder.messages_mut().send(RawCommand::new(1, cmd.bits().into()));
//! decoder.poll(TickSnapshot::default()).unwrap();
//!
//! assert!(decoder.relays().banks.near.is_set(2));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

/// Accessory message and relay command types.
pub mod commands;
/// Decoder configuration and CV layout.
pub mod config;
/// Main loop coordinating the engine, scheduler and programming.
pub mod decoder;
/// Relay mode command interpretation.
pub mod engine;
/// Decoder error type.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Button-triggered local programming.
pub mod programming;
/// In-memory relay bank image.
pub mod relays;
/// Round-robin relay cycling.
pub mod round_robin;
/// Interrupt-driven tick counters.
pub mod ticks;
/// Collaborator traits for hardware, storage, DCC input and time.
pub mod traits;

// Re-exports for convenience
pub use commands::{
    Bank, MessageClass, Operation, RawCommand, RelayCommand, RelayOutcome, RelayTarget,
};
pub use config::{CvField, DecoderAddress, DecoderConfig, RelayMode, RoundRobinMask};
pub use decoder::{BootReport, Decoder, DecoderError, PollReport};
pub use engine::RelayModeEngine;
pub use error::Error;
pub use programming::{NewSettings, ProgrammingController, ProgrammingEvent, ProgrammingState};
pub use relays::{BankState, RelayBanks};
pub use round_robin::{RoundRobinScheduler, RoundRobinStep};
pub use ticks::TickCounters;
pub use traits::{
    ConfigStore, ControlPanel, MessageSource, RelayOutputs, TickSnapshot, TickSource,
};

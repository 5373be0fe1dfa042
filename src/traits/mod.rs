//! Trait definitions for the decoder's external collaborators.
//!
//! This module defines the seams that let the decoder core:
//! - Run on different boards (GPIO binding, desktop mocks)
//! - Receive commands from any DCC receiver implementation
//! - Keep its configuration in any byte store
//!
//! # Submodules
//!
//! - `hardware`: Relay outputs, programming button and indicator
//! - `storage`: Persistent configuration store
//! - `dcc`: Decoded accessory message source
//! - `tick`: Periodic tick and seconds counters
//!
//! # Hardware Abstraction
//!
//! The key traits are:
//!
//! - [`RelayOutputs`]: Two banks of eight relays
//! - [`ControlPanel`]: Programming button and indicator LED
//! - [`ConfigStore`]: CV storage with asynchronous write completion
//! - [`MessageSource`]: Decoded accessory commands
//! - [`TickSource`]: Interrupt-driven time base

pub mod dcc;
pub mod hardware;
pub mod storage;
pub mod tick;

pub use dcc::*;
pub use hardware::*;
pub use storage::*;
pub use tick::*;

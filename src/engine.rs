//! Relay mode engine: turns accessory commands into relay state.
//!
//! [`RelayModeEngine::apply`] is called once for every dispatchable
//! message. It filters foreign commands and retransmissions, routes the
//! command to a bank, then acts according to the configured [`RelayMode`].
//!
//! # Mode Table
//!
//! | Mode | Activate | Release |
//! |------|----------|---------|
//! | `Exclusive` | clear bank, stop round-robin, set relay | ignored; on relay 15 start round-robin |
//! | `ExclusiveRelease` | clear bank, set relay | clear relay |
//! | `Independent` | set relay | clear relay |
//! | `RoundRobin` / `Reserved` | disabled | disabled |
//!
//! "Activate" means the command's polarity equals the configured
//! activation polarity.
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::engine::RelayModeEngine;
//! use dcc_relay_decoder::config::RelayMode;
//! use dcc_relay_decoder::relays::RelayBanks;
//! use dcc_relay_decoder::{Operation, RelayCommand, RelayOutcome};
//!
//! let mut engine = RelayModeEngine::new(RelayMode::Exclusive, Operation::Plus);
//! let mut banks = RelayBanks::new();
//!
//! // "+" on relay 2 sets it
//! let cmd = RelayCommand::new(2, Operation::Plus).unwrap();
//! engine.apply(cmd.bits().into(), &mut banks).unwrap();
//! assert!(banks.near.is_set(2));
//!
//! // The command station repeats itself; the repeat is dropped
//! let outcome = engine.apply(cmd.bits().into(), &mut banks).unwrap();
//! assert_eq!(outcome, RelayOutcome::Duplicate);
//!
//! // "-" on the last relay switches to round-robin
//! let cmd = RelayCommand::new(15, Operation::Minus).unwrap();
//! engine.apply(cmd.bits().into(), &mut banks).unwrap();
//! assert!(engine.round_robin_active());
//! ```

use log::debug;

use crate::commands::{Operation, RelayCommand, RelayOutcome, RelayTarget};
use crate::config::{DecoderConfig, RelayMode};
use crate::traits::RelayOutputs;

/// Command interpretation state machine.
///
/// Owns the command session state: the last accepted command and the
/// round-robin flag the scheduler consumes.
#[derive(Clone, Debug)]
pub struct RelayModeEngine {
    mode: RelayMode,
    activation: Operation,
    previous: Option<RelayCommand>,
    round_robin_active: bool,
}

impl RelayModeEngine {
    /// Create an engine for `mode`, activating on `activation`.
    ///
    /// Round-robin starts active for modes without direct commands.
    pub fn new(mode: RelayMode, activation: Operation) -> Self {
        Self {
            mode,
            activation,
            previous: None,
            round_robin_active: mode.starts_in_round_robin(),
        }
    }

    /// Create an engine from a loaded configuration.
    pub fn from_config(config: &DecoderConfig) -> Self {
        Self::new(config.mode, config.activation)
    }

    /// Apply one command to the relay banks.
    ///
    /// `command` is the local command field; values above 31 are another
    /// decoder's and are dropped with no side effect.
    pub fn apply<R: RelayOutputs>(
        &mut self,
        command: u16,
        relays: &mut R,
    ) -> Result<RelayOutcome, R::Error> {
        let Some(cmd) = RelayCommand::from_raw(command) else {
            return Ok(RelayOutcome::NotOurs);
        };

        if self.previous == Some(cmd) {
            return Ok(RelayOutcome::Duplicate);
        }
        self.previous = Some(cmd);

        let target = cmd.target();
        let activate = cmd.operation() == self.activation;

        let outcome = match (self.mode, activate) {
            (RelayMode::Exclusive, true) => {
                self.round_robin_active = false;
                self.activate_exclusive(target, relays)?
            }
            (RelayMode::Exclusive, false) => {
                if target.is_last_relay() {
                    self.round_robin_active = true;
                    RelayOutcome::RoundRobinEngaged
                } else {
                    RelayOutcome::Ignored { target }
                }
            }
            (RelayMode::ExclusiveRelease, true) => self.activate_exclusive(target, relays)?,
            (RelayMode::Independent, true) => {
                relays.set_relay(target.bank, target.index)?;
                RelayOutcome::Activated {
                    target,
                    exclusive: false,
                }
            }
            (RelayMode::ExclusiveRelease | RelayMode::Independent, false) => {
                relays.clear_relay(target.bank, target.index)?;
                RelayOutcome::Released { target }
            }
            (RelayMode::RoundRobin | RelayMode::Reserved(_), _) => RelayOutcome::DirectDisabled,
        };

        debug!(
            "relay {} {} -> {:?}",
            cmd.relay_index() + 1,
            cmd.operation().as_str(),
            outcome
        );
        Ok(outcome)
    }

    fn activate_exclusive<R: RelayOutputs>(
        &mut self,
        target: RelayTarget,
        relays: &mut R,
    ) -> Result<RelayOutcome, R::Error> {
        relays.clear_bank(target.bank)?;
        relays.set_relay(target.bank, target.index)?;
        Ok(RelayOutcome::Activated {
            target,
            exclusive: true,
        })
    }

    /// Whether the scheduler should cycle relays.
    pub fn round_robin_active(&self) -> bool {
        self.round_robin_active
    }

    /// The configured mode.
    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    /// The configured activation polarity.
    pub fn activation(&self) -> Operation {
        self.activation
    }

    /// The last command accepted, if any.
    pub fn previous_command(&self) -> Option<RelayCommand> {
        self.previous
    }
}

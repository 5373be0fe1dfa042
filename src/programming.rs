//! Button-triggered local programming.
//!
//! The operator presses the programming button, releases it, then sends any
//! accessory command from the command station. The address of that command
//! becomes the decoder address, its polarity becomes the activation
//! polarity, and its output pair selects the relay mode. The decoder then
//! restarts so the new configuration is loaded from scratch.
//!
//! # States
//!
//! ```text
//! Idle ──press──▶ DebouncePress ──still pressed──▶ AwaitRelease ──▶ DebounceRelease ──▶ Listening
//!   ▲                  │ released (noise)                                                 │    │
//!   └──────────────────┘                                              accessory command ─┘    │ press
//!   ▲                                                                          ▼              ▼
//!   └────── Applied / StoreTimeout ◀──────────────────────────────── Committing   AbortDebounce
//!   ▲                                                                                         │
//!   └──────── AbortDebounceRelease ◀──────── AbortAwaitRelease ◀──────────────────────────────┘
//! ```
//!
//! The controller never blocks. Each [`ProgrammingController::poll`] does one
//! step against the tick counter. While a session is in progress the decoder
//! stops dispatching commands and pauses round-robin.
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::programming::{ProgrammingController, ProgrammingEvent, DEBOUNCE_TICKS};
//! use dcc_relay_decoder::hal::{MockDcc, MockPanel, MockStore};
//! use dcc_relay_decoder::config::{CvField, RelayMode};
//! use dcc_relay_decoder::{MessageClass, RawCommand};
//!
//! let mut controller = ProgrammingController::new();
//! let mut dcc = MockDcc::new();
//! let mut panel = MockPanel::new();
//! let mut store = MockStore::factory();
//! let mut now = 0u8;
//!
//! let mut step = |c: &mut ProgrammingController, dcc: &mut MockDcc, panel: &mut MockPanel, store: &mut MockStore| {
//!     now = now.wrapping_add(DEBOUNCE_TICKS);
//!     c.poll(now, dcc, panel, store).unwrap()
//! };
//!
//! panel.press();
//! step(&mut controller, &mut dcc, &mut panel, &mut store); // debounce starts
//! assert_eq!(step(&mut controller, &mut dcc, &mut panel, &mut store), ProgrammingEvent::Started);
//! panel.release();
//! step(&mut controller, &mut dcc, &mut panel, &mut store); // release seen
//! step(&mut controller, &mut dcc, &mut panel, &mut store); // release debounced
//!
//! // Address 5, "+" on output pair 1 => mode 1
//! dcc.push(RawCommand::new(5, 0b011), MessageClass::Foreign);
//! let event = step(&mut controller, &mut dcc, &mut panel, &mut store);
//! assert!(matches!(event, ProgrammingEvent::Applied(_)));
//! assert_eq!(store.get(CvField::AddressLow), 5);
//! assert_eq!(store.get(CvField::Mode), RelayMode::ExclusiveRelease.to_cv());
//! ```

use log::{error, info, warn};

use crate::commands::{MessageClass, Operation, RawCommand};
use crate::config::{CvField, DecoderAddress, RelayMode};
use crate::ticks::TICK_PERIOD_US;
use crate::traits::{ConfigStore, ControlPanel, MessageSource};

/// Debounce window in ticks (50 ms, at least one tick).
pub const DEBOUNCE_TICKS: u8 = {
    let ticks = 50_000 / TICK_PERIOD_US;
    if ticks == 0 {
        1
    } else {
        ticks as u8
    }
};

/// How long to wait for the store to finish writing, in ticks (2 s).
pub const STORE_READY_TIMEOUT_TICKS: u8 = 100;

/// Settings derived from the command received while listening.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewSettings {
    /// New decoder address.
    pub address: DecoderAddress,
    /// New activation polarity.
    pub activation: Operation,
    /// New relay mode (`0..=3`).
    pub mode: RelayMode,
}

impl NewSettings {
    /// Derive settings from a received accessory command.
    ///
    /// ```
    /// use dcc_relay_decoder::programming::NewSettings;
    /// use dcc_relay_decoder::config::RelayMode;
    /// use dcc_relay_decoder::{Operation, RawCommand};
    ///
    /// let settings = NewSettings::from_command(&RawCommand::new(12, 0b100));
    /// assert_eq!(settings.address.value, 12);
    /// assert_eq!(settings.activation, Operation::Minus);
    /// assert_eq!(settings.mode, RelayMode::Independent);
    /// ```
    pub fn from_command(message: &RawCommand) -> Self {
        Self {
            address: DecoderAddress::new(message.address),
            activation: message.operation(),
            mode: RelayMode::from_cv(message.mode_field()),
        }
    }

    /// Issue the writes: address low, address high, polarity, mode.
    pub fn write<S: ConfigStore>(&self, store: &mut S) -> Result<(), S::Error> {
        let (low, high) = self.address.to_cv();
        store.write_byte(CvField::AddressLow, low)?;
        store.write_byte(CvField::AddressHigh, high)?;
        store.write_byte(CvField::Activation, self.activation.bit())?;
        store.write_byte(CvField::Mode, self.mode.to_cv())
    }
}

/// Where the programming session stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ProgrammingState {
    /// Normal operation.
    #[default]
    Idle,
    /// Button seen pressed at tick `since`; waiting out the debounce window.
    DebouncePress {
        /// Tick the press was first seen.
        since: u8,
    },
    /// Press confirmed, indicator on, waiting for release.
    AwaitRelease,
    /// Button released at tick `since`; waiting out the debounce window.
    DebounceRelease {
        /// Tick the release was seen.
        since: u8,
    },
    /// Waiting for an accessory command.
    Listening,
    /// Writes issued at tick `since`; waiting for the store.
    Committing {
        /// Settings being written.
        settings: NewSettings,
        /// Tick the writes were issued.
        since: u8,
    },
    /// Abort press seen at tick `since`; debouncing.
    AbortDebounce {
        /// Tick the abort press was seen.
        since: u8,
    },
    /// Abort press confirmed, waiting for release.
    AbortAwaitRelease,
    /// Abort release seen at tick `since`; debouncing.
    AbortDebounceRelease {
        /// Tick the release was seen.
        since: u8,
    },
}

/// Result of one controller step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgrammingEvent {
    /// No session in progress.
    Inactive,
    /// Session in progress, nothing notable this step.
    Pending,
    /// Press did not survive debouncing; back to idle.
    Noise,
    /// Press confirmed; indicator on.
    Started,
    /// A message arrived while listening but was not an accessory command.
    Ignored(MessageClass),
    /// Settings written; waiting for the store to finish.
    Writing(NewSettings),
    /// Settings persisted. The decoder must restart.
    Applied(NewSettings),
    /// Operator aborted with a second press; nothing changed.
    Abandoned,
    /// The store never reported ready after writing.
    StoreTimeout,
}

/// Programming procedure state machine.
#[derive(Clone, Debug, Default)]
pub struct ProgrammingController {
    state: ProgrammingState,
}

impl ProgrammingController {
    /// A controller in [`ProgrammingState::Idle`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ProgrammingState {
        self.state
    }

    /// True when no session is in progress.
    pub fn is_idle(&self) -> bool {
        self.state == ProgrammingState::Idle
    }

    /// Start debouncing a button press seen at tick `now`.
    ///
    /// Does nothing if a session is already in progress.
    pub fn begin(&mut self, now: u8) {
        if self.is_idle() {
            self.state = ProgrammingState::DebouncePress { since: now };
        }
    }

    /// Drop any session in progress.
    pub fn reset(&mut self) {
        self.state = ProgrammingState::Idle;
    }

    /// Advance the session by one step at tick `now`.
    pub fn poll<M, P, S>(
        &mut self,
        now: u8,
        messages: &mut M,
        panel: &mut P,
        store: &mut S,
    ) -> Result<ProgrammingEvent, S::Error>
    where
        M: MessageSource,
        P: ControlPanel,
        S: ConfigStore,
    {
        let elapsed = |since: u8| now.wrapping_sub(since);

        let event = match self.state {
            ProgrammingState::Idle => {
                if panel.is_button_pressed() {
                    self.state = ProgrammingState::DebouncePress { since: now };
                    ProgrammingEvent::Pending
                } else {
                    ProgrammingEvent::Inactive
                }
            }

            ProgrammingState::DebouncePress { since } => {
                if elapsed(since) < DEBOUNCE_TICKS {
                    ProgrammingEvent::Pending
                } else if panel.is_button_pressed() {
                    panel.indicator_on();
                    self.state = ProgrammingState::AwaitRelease;
                    info!("programming: button confirmed");
                    ProgrammingEvent::Started
                } else {
                    self.state = ProgrammingState::Idle;
                    ProgrammingEvent::Noise
                }
            }

            ProgrammingState::AwaitRelease => {
                if !panel.is_button_pressed() {
                    self.state = ProgrammingState::DebounceRelease { since: now };
                }
                ProgrammingEvent::Pending
            }

            ProgrammingState::DebounceRelease { since } => {
                if elapsed(since) >= DEBOUNCE_TICKS {
                    self.state = ProgrammingState::Listening;
                    info!("programming: listening for accessory command");
                }
                ProgrammingEvent::Pending
            }

            ProgrammingState::Listening => {
                if panel.is_button_pressed() {
                    panel.indicator_off();
                    self.state = ProgrammingState::AbortDebounce { since: now };
                    ProgrammingEvent::Pending
                } else if !messages.message_available() {
                    ProgrammingEvent::Pending
                } else {
                    match messages.take_message() {
                        Some(message) => self.accept(message, now, messages, panel, store)?,
                        None => ProgrammingEvent::Pending,
                    }
                }
            }

            ProgrammingState::Committing { settings, since } => {
                if store.is_ready() {
                    self.finish(settings, panel)
                } else if elapsed(since) >= STORE_READY_TIMEOUT_TICKS {
                    panel.indicator_off();
                    self.state = ProgrammingState::Idle;
                    ProgrammingEvent::StoreTimeout
                } else {
                    ProgrammingEvent::Pending
                }
            }

            ProgrammingState::AbortDebounce { since } => {
                if elapsed(since) >= DEBOUNCE_TICKS {
                    self.state = ProgrammingState::AbortAwaitRelease;
                }
                ProgrammingEvent::Pending
            }

            ProgrammingState::AbortAwaitRelease => {
                if !panel.is_button_pressed() {
                    self.state = ProgrammingState::AbortDebounceRelease { since: now };
                }
                ProgrammingEvent::Pending
            }

            ProgrammingState::AbortDebounceRelease { since } => {
                if elapsed(since) >= DEBOUNCE_TICKS {
                    self.state = ProgrammingState::Idle;
                    warn!("programming: abandoned, configuration unchanged");
                    ProgrammingEvent::Abandoned
                } else {
                    ProgrammingEvent::Pending
                }
            }
        };

        Ok(event)
    }

    fn accept<M, P, S>(
        &mut self,
        message: RawCommand,
        now: u8,
        messages: &M,
        panel: &mut P,
        store: &mut S,
    ) -> Result<ProgrammingEvent, S::Error>
    where
        M: MessageSource,
        P: ControlPanel,
        S: ConfigStore,
    {
        let class = messages.classify(&message);
        if !class.is_accessory() {
            return Ok(ProgrammingEvent::Ignored(class));
        }

        let settings = NewSettings::from_command(&message);
        info!(
            "programming: address {} activation {} mode {}",
            settings.address.value,
            settings.activation.as_str(),
            settings.mode.to_cv()
        );
        if let Err(e) = settings.write(store) {
            panel.indicator_off();
            self.state = ProgrammingState::Idle;
            error!("programming: config write failed, session dropped");
            return Err(e);
        }

        if store.is_ready() {
            Ok(self.finish(settings, panel))
        } else {
            self.state = ProgrammingState::Committing {
                settings,
                since: now,
            };
            Ok(ProgrammingEvent::Writing(settings))
        }
    }

    fn finish<P: ControlPanel>(&mut self, settings: NewSettings, panel: &mut P) -> ProgrammingEvent {
        panel.indicator_off();
        self.state = ProgrammingState::Idle;
        ProgrammingEvent::Applied(settings)
    }
}

//! The decoder main loop.
//!
//! [`Decoder`] owns the four collaborators (relay driver, configuration
//! store, DCC receiver, control panel) together with the relay engine, the
//! round-robin scheduler and the programming controller. The board's main
//! loop calls [`Decoder::poll`] as fast as it likes; each call does at most
//! one step of every activity and never blocks.
//!
//! # Poll Order
//!
//! 1. A programming session in progress is stepped and nothing else runs.
//! 2. Otherwise a waiting message is taken and, if it is for this decoder,
//!    applied to the relays.
//! 3. A button press starts a programming session.
//! 4. Otherwise the round-robin scheduler is ticked.
//!
//! # Example
//!
//! ```rust
//! use dcc_relay_decoder::Decoder;
//! use dcc_relay_decoder::hal::{MockDcc, MockPanel, MockRelays, MockStore};
//! use dcc_relay_decoder::traits::TickSnapshot;
//!
//! let mut decoder = Decoder::new(
//!     MockRelays::new(),
//!     MockStore::blank(),
//!     MockDcc::new(),
//!     MockPanel::new(),
//! );
//!
//! // A blank store is initialized with factory defaults on first boot
//! let report = decoder.boot(TickSnapshot::default()).unwrap();
//! assert!(report.factory_reset);
//! assert!(report.unprogrammed);
//! assert_eq!(decoder.panel().last_flash(), Some(5));
//! ```

use log::{debug, error, info, warn};

use crate::commands::{MessageClass, RelayOutcome};
use crate::config::{write_factory_defaults, CvField, DecoderConfig, VENDOR_ID};
use crate::engine::RelayModeEngine;
use crate::error::Error;
use crate::programming::{ProgrammingController, ProgrammingEvent, ProgrammingState};
use crate::round_robin::{RoundRobinScheduler, RoundRobinStep};
use crate::traits::{
    ConfigStore, ControlPanel, MessageSource, RelayOutputs, TickSnapshot, TickSource,
};

/// Fast flashes signalling an unprogrammed decoder.
pub const UNPROGRAMMED_FLASHES: u8 = 5;

/// Ticks allowed for factory defaults to land at boot (2 s).
pub const BOOT_STORE_READY_TICKS: u32 = 100;

/// `is_ready` polls allowed for factory defaults when [`Decoder::boot`] has
/// no clock to measure the wait with.
pub const BOOT_STORE_READY_POLLS: u32 = 100_000;

/// Error type of a [`Decoder`] over relay driver `R` and store `S`.
pub type DecoderError<R, S> = Error<<R as RelayOutputs>::Error, <S as ConfigStore>::Error>;

/// What [`Decoder::boot`] found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootReport {
    /// The configuration now in effect.
    pub config: DecoderConfig,
    /// Factory defaults were written because the vendor marker was missing.
    pub factory_reset: bool,
    /// The address has never been programmed.
    pub unprogrammed: bool,
}

/// What one [`Decoder::poll`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Class of the message taken for dispatch, if any.
    pub message: Option<MessageClass>,
    /// Engine outcome, if the message was for this decoder.
    pub dispatch: Option<RelayOutcome>,
    /// Round-robin step taken, if any.
    pub round_robin: Option<RoundRobinStep>,
    /// Programming controller result, if a session is in progress.
    pub programming: Option<ProgrammingEvent>,
    /// The decoder restarted with new settings.
    pub restarted: bool,
}

/// DCC relay decoder.
pub struct Decoder<R, S, M, P> {
    relays: R,
    store: S,
    messages: M,
    panel: P,
    config: DecoderConfig,
    engine: RelayModeEngine,
    scheduler: RoundRobinScheduler,
    programming: ProgrammingController,
    restarts: u32,
}

impl<R, S, M, P> Decoder<R, S, M, P>
where
    R: RelayOutputs,
    S: ConfigStore,
    M: MessageSource,
    P: ControlPanel,
{
    /// Assemble a decoder. Call [`boot`](Self::boot) before polling.
    pub fn new(relays: R, store: S, messages: M, panel: P) -> Self {
        let config = DecoderConfig::default();
        Self {
            relays,
            store,
            messages,
            panel,
            engine: RelayModeEngine::from_config(&config),
            scheduler: RoundRobinScheduler::from_config(&config, 0),
            programming: ProgrammingController::new(),
            config,
            restarts: 0,
        }
    }

    /// Load the configuration and start normal operation.
    ///
    /// If the vendor marker is missing, factory defaults are written and the
    /// decoder restarts once. A store that still lacks the marker afterwards
    /// fails with [`Error::StoreUninitialized`].
    ///
    /// With only a snapshot there is no clock to time the factory reset
    /// against, so the store wait is capped at [`BOOT_STORE_READY_POLLS`]
    /// instead. Prefer [`run_boot`](Self::run_boot) on hardware.
    pub fn boot(&mut self, now: TickSnapshot) -> Result<BootReport, DecoderError<R, S>> {
        self.boot_with(now, None)
    }

    /// [`boot`](Self::boot) using a snapshot from `clock`.
    ///
    /// A factory reset waits at most [`BOOT_STORE_READY_TICKS`] of `clock`
    /// for the store to finish.
    pub fn run_boot(&mut self, clock: &impl TickSource) -> Result<BootReport, DecoderError<R, S>> {
        self.boot_with(clock.snapshot(), Some(clock as &dyn TickSource))
    }

    fn boot_with(
        &mut self,
        now: TickSnapshot,
        clock: Option<&dyn TickSource>,
    ) -> Result<BootReport, DecoderError<R, S>> {
        let mut factory_reset = false;
        loop {
            let vendor = self
                .store
                .read_byte(CvField::VendorId)
                .map_err(Error::Store)?;
            if vendor == VENDOR_ID {
                break;
            }
            if factory_reset {
                error!("vendor id still {:#04x} after factory reset", vendor);
                return Err(Error::StoreUninitialized);
            }

            warn!("vendor id {:#04x} invalid, writing factory defaults", vendor);
            self.factory_reset()?;
            self.wait_store_ready(clock)?;
            self.shutdown()?;
            self.restarts = self.restarts.wrapping_add(1);
            factory_reset = true;
        }

        self.config = DecoderConfig::load(&mut self.store).map_err(Error::Store)?;
        self.messages.configure(self.config.address);
        self.engine = RelayModeEngine::from_config(&self.config);
        self.scheduler = RoundRobinScheduler::from_config(&self.config, now.seconds);
        self.programming.reset();

        let unprogrammed = !self.config.address.programmed;
        if unprogrammed {
            warn!("decoder address not programmed");
            self.panel.flash_fast(UNPROGRAMMED_FLASHES);
        }

        info!(
            "booted: address {} mode {} activation {} round-robin {:#04x}/{:#04x} every {}s",
            self.config.address.value,
            self.config.mode.to_cv(),
            self.config.activation.as_str(),
            self.config.round_robin_near.bits(),
            self.config.round_robin_far.bits(),
            self.config.round_robin_interval_secs
        );

        Ok(BootReport {
            config: self.config.clone(),
            factory_reset,
            unprogrammed,
        })
    }

    /// Run one pass of the main loop at `now`.
    pub fn poll(&mut self, now: TickSnapshot) -> Result<PollReport, DecoderError<R, S>> {
        let mut report = PollReport::default();

        if !self.programming.is_idle() {
            let event = self
                .programming
                .poll(now.ticks, &mut self.messages, &mut self.panel, &mut self.store)
                .map_err(Error::Store)?;
            report.programming = Some(event);

            match event {
                ProgrammingEvent::Applied(settings) => {
                    info!(
                        "new settings stored (address {}), restarting",
                        settings.address.value
                    );
                    self.restart(now)?;
                    report.restarted = true;
                }
                ProgrammingEvent::StoreTimeout => {
                    error!("config store not ready after programming writes");
                    return Err(Error::StoreTimeout);
                }
                ProgrammingEvent::Noise => debug!("programming button noise ignored"),
                _ => {}
            }
            return Ok(report);
        }

        if self.messages.message_available() {
            if let Some(message) = self.messages.take_message() {
                let class = self.messages.classify(&message);
                report.message = Some(class);
                if class.is_dispatchable() {
                    let outcome = self
                        .engine
                        .apply(message.command, &mut self.relays)
                        .map_err(Error::Relay)?;
                    report.dispatch = Some(outcome);
                }
            }
        }

        if self.panel.is_button_pressed() {
            self.programming.begin(now.ticks);
            report.programming = Some(ProgrammingEvent::Pending);
        } else {
            report.round_robin = self
                .scheduler
                .tick(
                    now.seconds,
                    self.engine.round_robin_active(),
                    &mut self.relays,
                )
                .map_err(Error::Relay)?;
        }

        Ok(report)
    }

    /// [`poll`](Self::poll) using a snapshot from `clock`.
    pub fn run_once(&mut self, clock: &impl TickSource) -> Result<PollReport, DecoderError<R, S>> {
        self.poll(clock.snapshot())
    }

    /// Restart from scratch: release every relay, drop all session state and
    /// boot again.
    pub fn restart(&mut self, now: TickSnapshot) -> Result<BootReport, DecoderError<R, S>> {
        self.shutdown()?;
        self.restarts = self.restarts.wrapping_add(1);
        self.boot(now)
    }

    /// Write factory defaults to every field.
    ///
    /// Takes effect at the next [`restart`](Self::restart).
    pub fn factory_reset(&mut self) -> Result<(), DecoderError<R, S>> {
        write_factory_defaults(&mut self.store).map_err(Error::Store)
    }

    fn shutdown(&mut self) -> Result<(), DecoderError<R, S>> {
        critical_section::with(|_| -> Result<(), DecoderError<R, S>> {
            self.relays.clear_all().map_err(Error::Relay)?;
            self.panel.indicator_off();
            self.engine = RelayModeEngine::from_config(&self.config);
            self.programming.reset();
            Ok(())
        })
    }

    fn wait_store_ready(
        &mut self,
        clock: Option<&dyn TickSource>,
    ) -> Result<(), DecoderError<R, S>> {
        match clock {
            Some(clock) => {
                let mut mark = clock.snapshot().ticks;
                let mut elapsed = 0u32;
                while elapsed < BOOT_STORE_READY_TICKS {
                    if self.store.is_ready() {
                        return Ok(());
                    }
                    let now = clock.snapshot();
                    elapsed += u32::from(now.ticks_since(mark));
                    mark = now.ticks;
                }
            }
            None => {
                for _ in 0..BOOT_STORE_READY_POLLS {
                    if self.store.is_ready() {
                        return Ok(());
                    }
                }
            }
        }
        error!("config store not ready after factory reset");
        Err(Error::StoreTimeout)
    }

    /// The configuration in effect.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// The relay mode engine.
    pub fn engine(&self) -> &RelayModeEngine {
        &self.engine
    }

    /// The round-robin scheduler.
    pub fn scheduler(&self) -> &RoundRobinScheduler {
        &self.scheduler
    }

    /// Programming session state.
    pub fn programming_state(&self) -> ProgrammingState {
        self.programming.state()
    }

    /// Restarts since construction, including the factory reset at boot.
    pub fn restart_count(&self) -> u32 {
        self.restarts
    }

    /// The relay driver.
    pub fn relays(&self) -> &R {
        &self.relays
    }

    /// The relay driver, mutably.
    pub fn relays_mut(&mut self) -> &mut R {
        &mut self.relays
    }

    /// The configuration store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration store, mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// The message source, mutably.
    pub fn messages_mut(&mut self) -> &mut M {
        &mut self.messages
    }

    /// The control panel.
    pub fn panel(&self) -> &P {
        &self.panel
    }

    /// The control panel, mutably.
    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }

    /// Take the collaborators back.
    pub fn into_parts(self) -> (R, S, M, P) {
        (self.relays, self.store, self.messages, self.panel)
    }
}

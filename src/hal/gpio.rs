//! Relay banks and programming panel on `embedded-hal` digital pins.
//!
//! Works with any HAL that implements the `embedded-hal` 1.0 digital traits.
//!
//! # Wiring
//!
//! - Relay drivers: sixteen push-pull outputs, high = energized
//! - Programming button: input with pull-up, pressed = low
//! - Indicator LED: output, high = lit
//!
//! The LED pin belongs to the timer interrupt. [`GpioPanel`] goes to the
//! decoder and only writes the shared [`IndicatorState`]; [`IndicatorLed`]
//! plays that state on the pin every tick.

use core::cell::Cell;

use critical_section::Mutex;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::commands::{Bank, RELAYS_PER_BANK};
use crate::traits::{ControlPanel, RelayOutputs};

const BANK_SIZE: usize = RELAYS_PER_BANK as usize;

/// Ticks the LED is lit for each fast flash (120 ms).
pub const FLASH_ON_TICKS: u16 = 6;

/// Ticks the LED is dark between fast flashes (240 ms).
pub const FLASH_OFF_TICKS: u16 = 12;

/// Ticks of darkness after each burst of flashes (700 ms).
pub const FLASH_PAUSE_TICKS: u16 = 35;

/// Sixteen relay driver pins.
///
/// `near[i]` drives near bank index `i`; `far[i]` drives far bank
/// physical index `i`.
///
/// # Example
///
/// ```ignore
/// use dcc_relay_decoder::hal::gpio::GpioRelays;
///
/// let relays = GpioRelays::new(
///     [p.d2, p.d3, p.d4, p.d5, p.d6, p.d7, p.d8, p.d9],
///     [p.a0, p.a1, p.a2, p.a3, p.a4, p.a5, p.d10, p.d11],
/// );
/// ```
pub struct GpioRelays<PIN> {
    near: [PIN; BANK_SIZE],
    far: [PIN; BANK_SIZE],
}

impl<PIN: OutputPin> GpioRelays<PIN> {
    /// Take ownership of the relay pins.
    pub fn new(near: [PIN; BANK_SIZE], far: [PIN; BANK_SIZE]) -> Self {
        Self { near, far }
    }

    fn pin(&mut self, bank: Bank, index: u8) -> Option<&mut PIN> {
        let pins = match bank {
            Bank::Near => &mut self.near,
            Bank::Far => &mut self.far,
        };
        pins.get_mut(usize::from(index))
    }

    /// Release the pins.
    pub fn release(self) -> ([PIN; BANK_SIZE], [PIN; BANK_SIZE]) {
        (self.near, self.far)
    }
}

impl<PIN: OutputPin> RelayOutputs for GpioRelays<PIN> {
    type Error = PIN::Error;

    fn set_relay(&mut self, bank: Bank, index: u8) -> Result<(), Self::Error> {
        match self.pin(bank, index) {
            Some(pin) => pin.set_high(),
            None => Ok(()),
        }
    }

    fn clear_relay(&mut self, bank: Bank, index: u8) -> Result<(), Self::Error> {
        match self.pin(bank, index) {
            Some(pin) => pin.set_low(),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Indicator {
    Off,
    On,
    Flashing { count: u8, step: u16 },
}

/// Indicator LED state shared between the main loop and the timer interrupt.
///
/// [`GpioPanel`] writes it from the main loop; [`IndicatorLed::on_tick`]
/// plays it from the timer interrupt. Every access is a short
/// `critical_section`, like [`TickCounters`](crate::ticks::TickCounters).
pub struct IndicatorState {
    inner: Mutex<Cell<Indicator>>,
}

impl IndicatorState {
    /// LED off. `const` so it can back a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(Indicator::Off)),
        }
    }

    fn set(&self, indicator: Indicator) {
        critical_section::with(|cs| self.inner.borrow(cs).set(indicator));
    }

    /// The flash count currently requested, if flashing.
    pub fn flash_request(&self) -> Option<u8> {
        match critical_section::with(|cs| self.inner.borrow(cs).get()) {
            Indicator::Flashing { count, .. } => Some(count),
            _ => None,
        }
    }

    /// Advance the pattern by one tick and return whether the LED is lit.
    pub fn on_tick(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            match cell.get() {
                Indicator::Off => false,
                Indicator::On => true,
                Indicator::Flashing { count, step } => {
                    let flash = FLASH_ON_TICKS + FLASH_OFF_TICKS;
                    let burst = u16::from(count) * flash;
                    let lit = step < burst && step % flash < FLASH_ON_TICKS;
                    cell.set(Indicator::Flashing {
                        count,
                        step: (step + 1) % (burst + FLASH_PAUSE_TICKS),
                    });
                    lit
                }
            }
        })
    }
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Indicator LED pin, driven from the timer interrupt.
///
/// # Example
///
/// ```ignore
/// use dcc_relay_decoder::hal::gpio::{IndicatorLed, IndicatorState};
///
/// static INDICATOR: IndicatorState = IndicatorState::new();
/// static LED: Mutex<RefCell<Option<IndicatorLed<'static, Led>>>> =
///     Mutex::new(RefCell::new(None));
///
/// #[interrupt]
/// fn TIMER1_COMPA() {
///     TICKS.on_tick();
///     critical_section::with(|cs| {
///         if let Some(led) = LED.borrow_ref_mut(cs).as_mut() {
///             led.on_tick();
///         }
///     });
/// }
/// ```
pub struct IndicatorLed<'a, LED> {
    led: LED,
    state: &'a IndicatorState,
}

impl<'a, LED: OutputPin> IndicatorLed<'a, LED> {
    /// Take ownership of the LED pin and switch it off.
    pub fn new(mut led: LED, state: &'a IndicatorState) -> Self {
        // A failed LED write only affects the indicator
        let _ = led.set_low();
        Self { led, state }
    }

    /// Advance the pattern by one tick and drive the pin.
    pub fn on_tick(&mut self) {
        let _ = if self.state.on_tick() {
            self.led.set_high()
        } else {
            self.led.set_low()
        };
    }

    /// Release the pin.
    pub fn release(self) -> LED {
        self.led
    }
}

/// Programming button plus a handle on the indicator.
///
/// Indicator requests take effect at the next [`IndicatorLed::on_tick`].
pub struct GpioPanel<'a, BTN> {
    button: BTN,
    indicator: &'a IndicatorState,
}

impl<'a, BTN: InputPin> GpioPanel<'a, BTN> {
    /// Take ownership of the button pin.
    pub fn new(button: BTN, indicator: &'a IndicatorState) -> Self {
        Self { button, indicator }
    }

    /// Release the pin.
    pub fn release(self) -> BTN {
        self.button
    }
}

impl<BTN: InputPin> ControlPanel for GpioPanel<'_, BTN> {
    fn is_button_pressed(&mut self) -> bool {
        // Active low; an unreadable pin counts as released
        self.button.is_low().unwrap_or(false)
    }

    fn indicator_on(&mut self) {
        self.indicator.set(Indicator::On);
    }

    fn indicator_off(&mut self) {
        self.indicator.set(Indicator::Off);
    }

    fn flash_fast(&mut self, count: u8) {
        self.indicator.set(Indicator::Flashing {
            count: count.max(1),
            step: 0,
        });
    }
}

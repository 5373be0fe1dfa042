//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development (requires `std`)
//! - `gpio`: Relay banks, button and LED on `embedded-hal` digital pins
//!   (requires `embedded-hal` feature)

#[cfg(feature = "std")]
pub mod mock;

#[cfg(feature = "embedded-hal")]
pub mod gpio;

#[cfg(feature = "std")]
pub use mock::*;

#[cfg(feature = "embedded-hal")]
pub use gpio::*;

//! Decoded command source trait.
//!
//! The bit-level DCC receiver runs outside this crate. It turns the track
//! signal into accessory packets and exposes them one at a time through
//! [`MessageSource`].

use crate::commands::{MessageClass, RawCommand};
use crate::config::DecoderAddress;

/// Source of decoded accessory messages.
///
/// A hardware decoder usually buffers a single pending message; the trait
/// does not require more.
pub trait MessageSource {
    /// Returns true if a decoded message is waiting.
    fn message_available(&self) -> bool;

    /// Take the waiting message, if any.
    fn take_message(&mut self) -> Option<RawCommand>;

    /// Classify `message` against this decoder's address.
    fn classify(&self, message: &RawCommand) -> MessageClass;

    /// Inform the receiver of the decoder address loaded at boot.
    ///
    /// Receivers that read the address themselves can ignore this.
    fn configure(&mut self, _address: DecoderAddress) {}
}

//! Configuration store trait.
//!
//! Byte-addressable persistent storage (EEPROM on AVR boards)
//! holding the decoder's CVs. Writes may complete asynchronously; callers
//! poll [`ConfigStore::is_ready`] before relying on a write having landed.

use crate::config::CvField;

/// Named persistent byte storage.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use dcc_relay_decoder::config::CvField;
/// use dcc_relay_decoder::traits::ConfigStore;
///
/// struct Eeprom { /* peripheral handle */ }
///
/// impl ConfigStore for Eeprom {
///     type Error = core::convert::Infallible;
///
///     fn read_byte(&mut self, field: CvField) -> Result<u8, Self::Error> {
///         Ok(eeprom_read(field.offset()))
///     }
///
///     fn write_byte(&mut self, field: CvField, value: u8) -> Result<(), Self::Error> {
///         eeprom_write(field.offset(), value);
///         Ok(())
///     }
///
///     fn is_ready(&self) -> bool {
///         eeprom_idle()
///     }
/// }
/// ```
pub trait ConfigStore {
    /// Error type for storage access.
    type Error;

    /// Read the current value of `field`.
    fn read_byte(&mut self, field: CvField) -> Result<u8, Self::Error>;

    /// Start writing `value` to `field`.
    fn write_byte(&mut self, field: CvField, value: u8) -> Result<(), Self::Error>;

    /// True once every started write has completed.
    fn is_ready(&self) -> bool;
}

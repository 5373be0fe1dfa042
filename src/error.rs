//! Decoder error type.
//!
//! The decoder is generic over its relay driver and configuration store, so
//! errors from either are carried through unchanged. The two remaining
//! variants are the decoder's own failure conditions.

use core::fmt;

/// Every fallible decoder operation returns this type.
///
/// `R` is the relay driver's error, `S` the configuration store's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<R, S> {
    /// A relay output could not be driven.
    Relay(R),
    /// The configuration store failed a read or write.
    Store(S),
    /// The store did not report ready after programming writes.
    StoreTimeout,
    /// The vendor marker was still missing after writing factory defaults.
    StoreUninitialized,
}

impl<R, S> Error<R, S> {
    /// Whether this error came from the configuration store.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::StoreTimeout | Self::StoreUninitialized
        )
    }
}

impl<R: fmt::Debug, S: fmt::Debug> fmt::Display for Error<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay(e) => write!(f, "relay output: {e:?}"),
            Self::Store(e) => write!(f, "config store: {e:?}"),
            Self::StoreTimeout => write!(f, "config store did not become ready"),
            Self::StoreUninitialized => write!(f, "config store rejected factory defaults"),
        }
    }
}

#[cfg(feature = "std")]
impl<R: fmt::Debug, S: fmt::Debug> std::error::Error for Error<R, S> {}

#[cfg(test)]
mod tests {
    use super::*;

    type TestError = Error<(), &'static str>;

    #[test]
    fn display_includes_source() {
        let err: TestError = Error::Store("bad cell");
        assert_eq!(err.to_string(), "config store: \"bad cell\"");

        let err: TestError = Error::Relay(());
        assert_eq!(err.to_string(), "relay output: ()");
    }

    #[test]
    fn store_errors_classified() {
        assert!(TestError::StoreTimeout.is_store_error());
        assert!(TestError::StoreUninitialized.is_store_error());
        assert!(TestError::Store("x").is_store_error());
        assert!(!TestError::Relay(()).is_store_error());
    }
}

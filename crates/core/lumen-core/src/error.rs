//! Firmware-wide error type.
//!
//! Every fallible firmware operation returns [`Result`]. The variants mirror
//! the error codes of the supervisor binary interface so that a failure can be
//! handed back to the caller of a firmware call unchanged (see
//! [`Error::code`]).

use core::fmt;

/// Convenience alias used throughout the firmware crates.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors reported by firmware drivers and subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// Generic failure with no better classification.
    Failed,
    /// The caller passed a missing or malformed argument.
    InvalidArgument,
    /// An object with the same identifier is already registered.
    AlreadyExists,
    /// A fixed-capacity table or pool is full.
    OutOfSpace,
    /// The target does not implement the requested capability.
    NotSupported,
    /// No driver is available for the requested device.
    NotImplemented,
    /// A driver probed the device and declined it.
    NoSuchDevice,
    /// The peripheral did not acknowledge a transfer.
    IoError,
    /// A status bit never settled within the polling budget.
    Timeout,
    /// A node or property lookup found nothing.
    NotFound,
}

impl Error {
    /// Returns the negative ABI error code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Failed => -1,
            Self::NotSupported => -2,
            Self::InvalidArgument => -3,
            Self::AlreadyExists => -6,
            Self::NoSuchDevice => -1000,
            Self::NotImplemented => -1001,
            Self::Timeout => -1002,
            Self::IoError => -1003,
            Self::OutOfSpace => -1005,
            Self::NotFound => -1008,
        }
    }

    /// Decodes an ABI error code.
    ///
    /// Returns `None` for `0` (success) and for codes this firmware never
    /// produces.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::Failed,
            -2 => Self::NotSupported,
            -3 => Self::InvalidArgument,
            -6 => Self::AlreadyExists,
            -1000 => Self::NoSuchDevice,
            -1001 => Self::NotImplemented,
            -1002 => Self::Timeout,
            -1003 => Self::IoError,
            -1005 => Self::OutOfSpace,
            -1008 => Self::NotFound,
            _ => return None,
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => f.write_str("operation failed"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::AlreadyExists => f.write_str("already exists"),
            Self::OutOfSpace => f.write_str("out of space"),
            Self::NotSupported => f.write_str("operation not supported"),
            Self::NotImplemented => f.write_str("no driver implemented"),
            Self::NoSuchDevice => f.write_str("no such device"),
            Self::IoError => f.write_str("I/O error"),
            Self::Timeout => f.write_str("timed out"),
            Self::NotFound => f.write_str("not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Error; 10] = [
        Error::Failed,
        Error::InvalidArgument,
        Error::AlreadyExists,
        Error::OutOfSpace,
        Error::NotSupported,
        Error::NotImplemented,
        Error::NoSuchDevice,
        Error::IoError,
        Error::Timeout,
        Error::NotFound,
    ];

    #[test]
    fn codes_are_negative_and_decode_back() {
        for err in ALL {
            assert!(err.code() < 0, "{err:?}");
            assert_eq!(Error::from_code(err.code()), Some(err));
        }
    }

    #[test]
    fn unknown_codes_do_not_decode() {
        assert_eq!(Error::from_code(0), None);
        assert_eq!(Error::from_code(-4), None);
        assert_eq!(Error::from_code(42), None);
    }

    #[test]
    fn display_messages() {
        assert_eq!(format!("{}", Error::Timeout), "timed out");
        assert_eq!(format!("{}", Error::IoError), "I/O error");
        assert_eq!(
            format!("{}", Error::NotSupported),
            "operation not supported"
        );
    }
}

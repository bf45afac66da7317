//! I2C adapter contract.

use core::fmt;

use lumen_core::{Error, Result};

/// Identifies the controller family (driver) that produced an adapter.
///
/// Compared by value; two adapters with equal families were built by the
/// same driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerFamily(&'static str);

impl ControllerFamily {
    /// Creates a family tag.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the family name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ControllerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

bitflags::bitflags! {
    /// Operations an adapter implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        /// [`I2cAdapter::configure`] is implemented.
        const CONFIGURE = 1 << 0;
        /// [`I2cAdapter::send`] is implemented.
        const SEND      = 1 << 1;
        /// [`I2cAdapter::read`] is implemented.
        const READ      = 1 << 2;
    }
}

/// One I2C bus instance.
///
/// Adapters live for the rest of firmware execution once registered, so the
/// registry holds them as `&'static dyn I2cAdapter`. Callers go through the
/// registry dispatch, which consults [`capabilities`](Self::capabilities)
/// before invoking an operation.
pub trait I2cAdapter: Sync {
    /// Registry identifier; the bus node's description-tree offset.
    fn id(&self) -> i32;

    /// Family of the driver that created this adapter.
    fn family(&self) -> ControllerFamily;

    /// Operations this adapter implements.
    fn capabilities(&self) -> Capabilities;

    /// Brings the controller into a usable state.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] unless overridden.
    fn configure(&self) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Writes `value` to `register` of the device at 7-bit `address`.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] unless overridden; implementations report bus
    /// failures such as [`Error::IoError`] or [`Error::Timeout`].
    fn send(&self, address: u8, register: u8, value: u8) -> Result<()> {
        let _ = (address, register, value);
        Err(Error::NotSupported)
    }

    /// Reads `register` of the device at 7-bit `address`.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    fn read(&self, address: u8, register: u8) -> Result<u8> {
        let _ = (address, register);
        Err(Error::NotSupported)
    }
}

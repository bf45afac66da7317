//! Fixed-capacity adapter directory and capability dispatch.
//!
//! The registry only tracks which adapters exist. The dispatch functions
//! ([`configure`], [`send`], [`read`]) check that an adapter is present and
//! implements the requested operation, then hand protocol results back
//! unchanged.

use lumen_core::{Error, Result};
use lumen_driver_api::{Capabilities, I2cAdapter};

/// Number of adapter slots.
pub const ADAPTER_REGISTRY_CAPACITY: usize = 16;

/// Directory of registered adapters keyed by [`I2cAdapter::id`].
pub struct AdapterRegistry {
    slots: [Option<&'static dyn I2cAdapter>; ADAPTER_REGISTRY_CAPACITY],
}

impl AdapterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [None; ADAPTER_REGISTRY_CAPACITY],
        }
    }

    /// Returns the adapter registered under `id`.
    #[must_use]
    pub fn find(&self, id: i32) -> Option<&'static dyn I2cAdapter> {
        self.iter().find(|a| a.id() == id)
    }

    /// Registers `adapter` in the first free slot.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `adapter` is `None`
    /// - [`Error::AlreadyExists`] if its id is already registered
    /// - [`Error::OutOfSpace`] if every slot is taken
    pub fn add(&mut self, adapter: Option<&'static dyn I2cAdapter>) -> Result<()> {
        let adapter = adapter.ok_or(Error::InvalidArgument)?;
        if self.find(adapter.id()).is_some() {
            return Err(Error::AlreadyExists);
        }

        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(Error::OutOfSpace)?;
        *slot = Some(adapter);
        lumen_core::fwdebug!("i2c: adapter {} ({}) registered", adapter.id(), adapter.family());
        Ok(())
    }

    /// Clears the slot holding exactly `adapter`. No-op if it is absent or
    /// not registered.
    pub fn remove(&mut self, adapter: Option<&dyn I2cAdapter>) {
        let Some(adapter) = adapter else { return };

        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.is_some_and(|a| same_adapter(a, adapter)))
        {
            *slot = None;
            lumen_core::fwdebug!("i2c: adapter {} removed", adapter.id());
        }
    }

    /// Returns `true` if no free slot is left.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Returns the number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over registered adapters in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &'static dyn I2cAdapter> + '_ {
        self.slots.iter().flatten().copied()
    }
}

/// Compares adapters by address, ignoring vtables.
pub(crate) fn same_adapter(a: &dyn I2cAdapter, b: &dyn I2cAdapter) -> bool {
    core::ptr::addr_eq(core::ptr::from_ref(a), core::ptr::from_ref(b))
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures `adapter`. Succeeds without doing anything if the adapter has
/// no configure operation.
///
/// # Errors
///
/// [`Error::InvalidArgument`] for `None`; otherwise the adapter's result.
pub fn configure(adapter: Option<&dyn I2cAdapter>) -> Result<()> {
    let adapter = adapter.ok_or(Error::InvalidArgument)?;
    if !adapter.capabilities().contains(Capabilities::CONFIGURE) {
        return Ok(());
    }
    adapter.configure()
}

/// Writes `value` to `register` of the device at `address` on `adapter`.
///
/// # Errors
///
/// [`Error::InvalidArgument`] for `None`, [`Error::NotSupported`] if the
/// adapter cannot send; otherwise the adapter's result.
pub fn send(adapter: Option<&dyn I2cAdapter>, address: u8, register: u8, value: u8) -> Result<()> {
    let adapter = adapter.ok_or(Error::InvalidArgument)?;
    if !adapter.capabilities().contains(Capabilities::SEND) {
        return Err(Error::NotSupported);
    }
    adapter.send(address, register, value)
}

/// Reads `register` of the device at `address` on `adapter`.
///
/// # Errors
///
/// [`Error::InvalidArgument`] for `None`, [`Error::NotSupported`] if the
/// adapter cannot read; otherwise the adapter's result.
pub fn read(adapter: Option<&dyn I2cAdapter>, address: u8, register: u8) -> Result<u8> {
    let adapter = adapter.ok_or(Error::InvalidArgument)?;
    if !adapter.capabilities().contains(Capabilities::READ) {
        return Err(Error::NotSupported);
    }
    adapter.read(address, register)
}

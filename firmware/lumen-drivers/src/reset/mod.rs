//! System reset facility.
//!
//! One [`SystemResetDevice`] is active at a time. Reset drivers are listed in
//! [`RESET_DRIVERS`] and bound by [`probe_all`], which walks the description
//! tree once; the last device a driver returns becomes the active one.

pub mod da9063;

use lumen_core::sync::SpinLock;
use lumen_core::{Error, Result};
use lumen_driver_api::{DeviceTree, NodeOffset, ResetReason, ResetType, SystemResetDevice};

use crate::i2c::I2cSubsystem;

/// What a reset driver initializer gets to work with.
pub struct ResetProbeContext<'a> {
    /// Description tree being probed.
    pub tree: &'a dyn DeviceTree,
    /// The matched node.
    pub node: NodeOffset,
    /// Compatible string from the driver's match table that selected it.
    pub matched: &'static str,
    /// I2C subsystem for drivers that sit behind an I2C bus.
    pub i2c: &'a I2cSubsystem,
}

/// A reset driver: match table plus initializer.
///
/// `init` returns the device to install, or
/// [`Error::NoSuchDevice`] to decline the node.
pub struct ResetDriverEntry {
    /// Driver name.
    pub name: &'static str,
    /// Compatible strings this driver binds to.
    pub match_table: &'static [&'static str],
    /// Initializer for a matched node.
    pub init: fn(&ResetProbeContext<'_>) -> Result<&'static dyn SystemResetDevice>,
}

/// Reset drivers known to the firmware, tried in order for every node.
pub static RESET_DRIVERS: &[&ResetDriverEntry] = &[&da9063::DA9063_RESET_DRIVER];

/// Active reset device plus the driver catalog that can replace it.
pub struct ResetFacility {
    device: SpinLock<Option<&'static dyn SystemResetDevice>>,
    catalog: &'static [&'static ResetDriverEntry],
}

impl ResetFacility {
    /// Creates a facility with no active device.
    #[must_use]
    pub const fn new(catalog: &'static [&'static ResetDriverEntry]) -> Self {
        Self {
            device: SpinLock::new(None),
            catalog,
        }
    }

    /// Makes `device` the active reset device.
    pub fn set_device(&self, device: &'static dyn SystemResetDevice) {
        lumen_core::fwinfo!("reset: using {}", device.name());
        *self.device.lock() = Some(device);
    }

    /// Returns the active reset device.
    #[must_use]
    pub fn device(&self) -> Option<&'static dyn SystemResetDevice> {
        *self.device.lock()
    }

    /// Resets the system through the active device.
    ///
    /// Returns only if the request was refused: [`Error::NotSupported`] when
    /// there is no device or it cannot handle `kind`.
    pub fn system_reset(&self, kind: ResetType, reason: ResetReason) -> Error {
        match self.device() {
            Some(device) if device.can_handle(kind, reason) => device.reset(kind, reason),
            _ => Error::NotSupported,
        }
    }

    /// [`system_reset`](Self::system_reset) with raw call arguments.
    ///
    /// Reserved type or reason values give [`Error::InvalidArgument`].
    pub fn system_reset_raw(&self, kind: u32, reason: u32) -> Error {
        match (ResetType::from_raw(kind), ResetReason::from_raw(reason)) {
            (Some(kind), Some(reason)) => self.system_reset(kind, reason),
            _ => Error::InvalidArgument,
        }
    }

    /// Walks every node of `tree` and runs the first catalog driver that
    /// matches and accepts it. Returns the number of devices bound.
    ///
    /// # Errors
    ///
    /// The first initializer error other than [`Error::NoSuchDevice`].
    pub fn probe_all(&self, tree: &dyn DeviceTree, i2c: &I2cSubsystem) -> Result<usize> {
        let mut bound = 0;
        let mut cursor = tree.next_node(None);

        while let Some(node) = cursor {
            for entry in self.catalog {
                let Some(matched) = tree.match_compatible(node, entry.match_table) else {
                    continue;
                };

                let ctx = ResetProbeContext {
                    tree,
                    node,
                    matched,
                    i2c,
                };
                match (entry.init)(&ctx) {
                    Ok(device) => {
                        self.set_device(device);
                        bound += 1;
                        break;
                    }
                    Err(Error::NoSuchDevice) => {
                        lumen_core::fwdebug!("reset: {} declined node {}", entry.name, node);
                    }
                    Err(e) => {
                        lumen_core::fwerr!("reset: {} failed on node {}: {}", entry.name, node, e);
                        return Err(e);
                    }
                }
            }
            cursor = tree.next_node(Some(node));
        }

        Ok(bound)
    }
}

static FACILITY: ResetFacility = ResetFacility::new(RESET_DRIVERS);

/// Returns the firmware-wide reset facility.
#[must_use]
pub fn facility() -> &'static ResetFacility {
    &FACILITY
}

/// Makes `device` the firmware-wide reset device.
pub fn set_device(device: &'static dyn SystemResetDevice) {
    FACILITY.set_device(device);
}

/// Returns the firmware-wide reset device.
#[must_use]
pub fn device() -> Option<&'static dyn SystemResetDevice> {
    FACILITY.device()
}

/// Resets the system through the firmware-wide reset device. Returns only
/// if the request was refused.
pub fn system_reset(kind: ResetType, reason: ResetReason) -> Error {
    FACILITY.system_reset(kind, reason)
}

/// Binds reset drivers for `tree` against the firmware-wide I2C subsystem.
///
/// # Errors
///
/// See [`ResetFacility::probe_all`].
pub fn probe_all(tree: &dyn DeviceTree) -> Result<usize> {
    FACILITY.probe_all(tree, crate::i2c::subsystem())
}

/// Parks the hart for good.
pub(crate) fn park() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

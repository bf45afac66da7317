//! I2C subsystem: adapter registry, controller driver catalog and bus binding.
//!
//! Controller drivers are listed in [`I2C_DRIVERS`]. Consumers (PMIC reset
//! drivers, for instance) ask [`I2cSubsystem::get_adapter`] for the adapter of
//! a bus node; the first request for a node runs the matching driver's
//! initializer, which registers the new adapter through its probe context.

mod binding;
pub mod registry;
pub mod sifive;

use lumen_core::Result;
use lumen_core::sync::SpinLock;
use lumen_driver_api::{ControllerFamily, DeviceTree, I2cAdapter, NodeOffset};

pub use registry::{ADAPTER_REGISTRY_CAPACITY, AdapterRegistry, configure, read, send};

// ── Driver catalog ──────────────────────────────────────────────────────

/// What a controller initializer gets to work with.
pub struct I2cProbeContext<'a> {
    /// Description tree being probed.
    pub tree: &'a dyn DeviceTree,
    /// The bus node; becomes the adapter id.
    pub node: NodeOffset,
    /// Compatible string from the driver's match table that selected it.
    pub matched: &'static str,
    /// Registry the initializer registers its adapter into.
    pub registry: &'a mut AdapterRegistry,
}

/// A controller driver: match table plus initializer.
///
/// `init` reports [`Error::NoSuchDevice`](lumen_core::Error::NoSuchDevice)
/// to decline a matched node, letting the next catalog entry try.
pub struct I2cDriverEntry {
    /// Driver name.
    pub name: &'static str,
    /// Family tag carried by every adapter this driver creates.
    pub family: ControllerFamily,
    /// Compatible strings this driver binds to.
    pub match_table: &'static [&'static str],
    /// Initializer for a matched bus node.
    pub init: fn(&mut I2cProbeContext<'_>) -> Result<()>,
}

/// Controller drivers known to the firmware, tried in order.
pub static I2C_DRIVERS: &[&I2cDriverEntry] = &[&sifive::SIFIVE_I2C_DRIVER];

// ── Subsystem ───────────────────────────────────────────────────────────

/// Registry and catalog, shared by every caller of the I2C subsystem.
pub struct I2cSubsystem {
    registry: SpinLock<AdapterRegistry>,
    catalog: &'static [&'static I2cDriverEntry],
}

impl I2cSubsystem {
    /// Creates a subsystem with an empty registry.
    #[must_use]
    pub const fn new(catalog: &'static [&'static I2cDriverEntry]) -> Self {
        Self {
            registry: SpinLock::new(AdapterRegistry::new()),
            catalog,
        }
    }

    /// Returns the adapter registered under `id`.
    #[must_use]
    pub fn find(&self, id: i32) -> Option<&'static dyn I2cAdapter> {
        self.registry.lock().find(id)
    }

    /// Registers `adapter`. See [`AdapterRegistry::add`].
    ///
    /// # Errors
    ///
    /// Same as [`AdapterRegistry::add`].
    pub fn add(&self, adapter: Option<&'static dyn I2cAdapter>) -> Result<()> {
        self.registry.lock().add(adapter)
    }

    /// Unregisters `adapter`. See [`AdapterRegistry::remove`].
    pub fn remove(&self, adapter: Option<&dyn I2cAdapter>) {
        self.registry.lock().remove(adapter);
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn adapter_count(&self) -> usize {
        self.registry.lock().len()
    }
}

static SUBSYSTEM: I2cSubsystem = I2cSubsystem::new(I2C_DRIVERS);

/// Returns the firmware-wide I2C subsystem.
#[must_use]
pub fn subsystem() -> &'static I2cSubsystem {
    &SUBSYSTEM
}

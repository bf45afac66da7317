//! Binding bus nodes to controller drivers.

use lumen_core::{Error, Result};
use lumen_driver_api::{DeviceTree, I2cAdapter, NodeOffset};

use super::{I2cProbeContext, I2cSubsystem};

impl I2cSubsystem {
    /// Runs the first catalog driver that matches `bus` and accepts it.
    ///
    /// Entries whose match table misses `bus` are skipped, as are entries
    /// whose initializer declines with [`Error::NoSuchDevice`].
    ///
    /// # Errors
    ///
    /// - [`Error::NotImplemented`] if no entry both matches and accepts
    /// - any other initializer error, unchanged
    pub fn resolve_and_init(&self, tree: &dyn DeviceTree, bus: NodeOffset) -> Result<()> {
        for entry in self.catalog {
            let Some(matched) = tree.match_compatible(bus, entry.match_table) else {
                continue;
            };

            let mut registry = self.registry.lock();
            let mut ctx = I2cProbeContext {
                tree,
                node: bus,
                matched,
                registry: &mut *registry,
            };
            match (entry.init)(&mut ctx) {
                Ok(()) => {
                    lumen_core::fwinfo!("i2c: node {} bound to {} ({})", bus, entry.name, matched);
                    return Ok(());
                }
                Err(Error::NoSuchDevice) => {
                    lumen_core::fwdebug!("i2c: {} declined node {}", entry.name, bus);
                }
                Err(e) => {
                    lumen_core::fwwarn!("i2c: {} failed on node {}: {}", entry.name, bus, e);
                    return Err(e);
                }
            }
        }

        Err(Error::NotImplemented)
    }

    /// Returns the adapter for bus node `bus`, initializing the controller
    /// on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for a negative `bus`
    /// - [`Error::NotImplemented`] if no driver produces an adapter for
    ///   `bus`, or the registered adapter's family is not in the catalog
    /// - initializer errors from [`resolve_and_init`](Self::resolve_and_init)
    pub fn get_adapter(
        &self,
        tree: &dyn DeviceTree,
        bus: NodeOffset,
    ) -> Result<&'static dyn I2cAdapter> {
        if bus < 0 {
            return Err(Error::InvalidArgument);
        }

        let adapter = match self.find(bus) {
            Some(adapter) => adapter,
            None => {
                self.resolve_and_init(tree, bus)?;
                self.find(bus).ok_or(Error::NotImplemented)?
            }
        };

        if !self.catalog.iter().any(|e| e.family == adapter.family()) {
            lumen_core::fwdebug!("i2c: adapter {} has unknown family {}", bus, adapter.family());
            return Err(Error::NotImplemented);
        }

        Ok(adapter)
    }
}

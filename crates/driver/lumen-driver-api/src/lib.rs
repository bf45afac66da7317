//! Driver contracts for lumen firmware.
//!
//! - [`I2cAdapter`]: one I2C bus instance and its byte-transaction
//!   capabilities.
//! - [`DeviceTree`]: the narrow view of the hardware description tree that
//!   drivers consume during probe.
//! - [`SystemResetDevice`]: a platform shutdown / reboot handler.

#![cfg_attr(not(test), no_std)]

pub mod i2c;
pub mod reset;
pub mod tree;

pub use i2c::{Capabilities, ControllerFamily, I2cAdapter};
pub use reset::{ResetReason, ResetType, SystemResetDevice};
pub use tree::{DeviceTree, NodeOffset};

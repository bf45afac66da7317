//! Boot-time drivers for lumen firmware.
//!
//! - [`i2c`]: the adapter registry, the controller driver catalog that binds
//!   description-tree bus nodes to adapters, and the SiFive I2C controller.
//! - [`reset`]: the system reset facility and the DA9063 PMIC reset driver,
//!   which reaches its chip through an I2C adapter.

#![cfg_attr(not(test), no_std)]

pub mod i2c;
pub mod reset;

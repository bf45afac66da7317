//! Core library for the lumen boot firmware.
//!
//! Provides the firmware-wide [`Error`] type, the leveled logging macros
//! (`fwinfo!`, `fwwarn!`, ...) and the lock-free-before-scheduler
//! synchronization primitives used for process-wide driver state.

#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod log;
pub mod sync;

pub use error::{Error, Result};

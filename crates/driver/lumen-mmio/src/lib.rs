//! Typed register block abstractions.
//!
//! [`register_block!`] turns a declarative register map into a struct whose
//! accessors go through the [`RegisterIo`] trait. In firmware the backend is
//! [`Mmio`], which performs volatile loads and stores at `base + offset`; the
//! only `unsafe` point is constructing it. With the `mock` feature, host tests
//! substitute [`mock::MockIo`], which records every access and serves scripted
//! read values.
//!
//! # Example
//!
//! ```ignore
//! use lumen_mmio::register_block;
//!
//! register_block! {
//!     /// OpenCores-style I2C master.
//!     pub OcI2cRegs {
//!         [0x00; u32; rw] prescale_lo,
//!         [0x0C; u32; wo] transmit,
//!         [0x0C; u32; ro] receive,
//!     }
//! }
//!
//! let regs = unsafe { OcI2cRegs::new(0x1004_0000) };
//! regs.set_transmit(0xA0);
//! ```

#![cfg_attr(not(test), no_std)]

#[cfg(any(test, feature = "mock"))]
extern crate alloc;

// Lets the generated `::lumen_mmio::` paths resolve inside this crate's tests.
extern crate self as lumen_mmio;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use lumen_mmio_macros::register_block;

/// Width-typed register access at a byte offset from a block base.
///
/// Implementations take `&self`; backends that need to mutate state (the
/// recording mock) use interior mutability.
pub trait RegisterIo {
    /// Reads an 8-bit register.
    fn read_u8(&self, offset: usize) -> u8;
    /// Reads a 16-bit register.
    fn read_u16(&self, offset: usize) -> u16;
    /// Reads a 32-bit register.
    fn read_u32(&self, offset: usize) -> u32;
    /// Reads a 64-bit register.
    fn read_u64(&self, offset: usize) -> u64;
    /// Writes an 8-bit register.
    fn write_u8(&self, offset: usize, value: u8);
    /// Writes a 16-bit register.
    fn write_u16(&self, offset: usize, value: u16);
    /// Writes a 32-bit register.
    fn write_u32(&self, offset: usize, value: u32);
    /// Writes a 64-bit register.
    fn write_u64(&self, offset: usize, value: u64);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    fn read_u8(&self, offset: usize) -> u8 {
        (**self).read_u8(offset)
    }
    fn read_u16(&self, offset: usize) -> u16 {
        (**self).read_u16(offset)
    }
    fn read_u32(&self, offset: usize) -> u32 {
        (**self).read_u32(offset)
    }
    fn read_u64(&self, offset: usize) -> u64 {
        (**self).read_u64(offset)
    }
    fn write_u8(&self, offset: usize, value: u8) {
        (**self).write_u8(offset, value);
    }
    fn write_u16(&self, offset: usize, value: u16) {
        (**self).write_u16(offset, value);
    }
    fn write_u32(&self, offset: usize, value: u32) {
        (**self).write_u32(offset, value);
    }
    fn write_u64(&self, offset: usize, value: u64) {
        (**self).write_u64(offset, value);
    }
}

/// Volatile memory-mapped register backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Creates a backend for the register window at `base`.
    ///
    /// # Safety
    ///
    /// Every offset later accessed through this backend must address a
    /// device register (or otherwise valid memory) of the accessed width.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Returns the base address of the register window.
    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }

    #[inline]
    fn read<T: Copy>(&self, offset: usize) -> T {
        // SAFETY: the constructor's contract covers every register offset.
        unsafe { core::ptr::read_volatile((self.base + offset) as *const T) }
    }

    #[inline]
    fn write<T: Copy>(&self, offset: usize, value: T) {
        // SAFETY: the constructor's contract covers every register offset.
        unsafe { core::ptr::write_volatile((self.base + offset) as *mut T, value) }
    }
}

impl RegisterIo for Mmio {
    fn read_u8(&self, offset: usize) -> u8 {
        self.read(offset)
    }
    fn read_u16(&self, offset: usize) -> u16 {
        self.read(offset)
    }
    fn read_u32(&self, offset: usize) -> u32 {
        self.read(offset)
    }
    fn read_u64(&self, offset: usize) -> u64 {
        self.read(offset)
    }
    fn write_u8(&self, offset: usize, value: u8) {
        self.write(offset, value);
    }
    fn write_u16(&self, offset: usize, value: u16) {
        self.write(offset, value);
    }
    fn write_u32(&self, offset: usize, value: u32) {
        self.write(offset, value);
    }
    fn write_u64(&self, offset: usize, value: u64) {
        self.write(offset, value);
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Access, MockIo};
    use super::*;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        struct Ctrl: u32 {
            const ENABLE = 1 << 7;
            const IRQ    = 1 << 6;
        }
    }

    register_block! {
        /// Test block with aliased registers.
        TestRegs {
            [0x00; u32; rw] ctrl => Ctrl,
            [0x04; u8; wo] tx,
            [0x04; u8; ro] rx,
            [0x08; u64; ro] counter,
        }
    }

    #[test]
    fn accessors_hit_declared_offsets() {
        let mock = MockIo::new();
        mock.push_read(0x04, 0x5A);
        let regs = TestRegs::with_io(&mock);

        regs.set_ctrl(Ctrl::ENABLE);
        regs.set_tx(0x11);
        assert_eq!(regs.rx(), 0x5A);

        assert_eq!(
            mock.accesses(),
            [
                Access::Write {
                    offset: 0x00,
                    value: 0x80
                },
                Access::Write {
                    offset: 0x04,
                    value: 0x11
                },
                Access::Read { offset: 0x04 },
            ]
        );
    }

    #[test]
    fn bitflags_reads_retain_unknown_bits() {
        let mock = MockIo::new();
        mock.set_default(0x00, 0x8000_00C0);
        let regs = TestRegs::with_io(&mock);
        let ctrl = regs.ctrl();
        assert!(ctrl.contains(Ctrl::ENABLE | Ctrl::IRQ));
        assert_eq!(ctrl.bits(), 0x8000_00C0);
    }

    #[test]
    fn mmio_backend_reads_and_writes_memory() {
        let mut window = [0u64; 2];
        window[1] = 0xDEAD_BEEF_0000_0001;
        // SAFETY: `window` outlives the accessor and covers offsets 0..16.
        let regs = unsafe { TestRegs::new(window.as_mut_ptr() as usize) };
        assert_eq!(regs.counter(), 0xDEAD_BEEF_0000_0001);
        regs.set_ctrl(Ctrl::IRQ);
        assert_eq!(regs.ctrl(), Ctrl::IRQ);
        assert_eq!(regs.io().base(), window.as_ptr() as usize);
    }
}

//! Set-once storage slot.
//!
//! [`OnceSlot`] backs fixed-capacity instance pools: a driver fills a slot
//! exactly once during probe and then hands out `&'static` references to the
//! stored value for the rest of firmware execution.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const FULL: u8 = 2;

/// A slot that can be written exactly once.
pub struct OnceSlot<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the value is written once before `FULL` is published with Release
// ordering and only read after observing `FULL` with Acquire ordering.
unsafe impl<T: Send + Sync> Send for OnceSlot<T> {}
unsafe impl<T: Send + Sync> Sync for OnceSlot<T> {}

impl<T> OnceSlot<T> {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Stores `value` and returns a reference to it.
    ///
    /// # Errors
    ///
    /// Gives `value` back if the slot was already filled (or is being filled).
    pub fn set(&self, value: T) -> Result<&T, T> {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }

        // SAFETY: the EMPTY -> WRITING transition grants exclusive write access.
        let stored = unsafe { (*self.value.get()).write(value) };
        self.state.store(FULL, Ordering::Release);
        Ok(stored)
    }

    /// Returns the stored value, if any.
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == FULL {
            // SAFETY: FULL is only published after the value was written.
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    /// Returns `true` once a value has been stored.
    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::Acquire) == FULL
    }
}

impl<T> Default for OnceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for OnceSlot<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == FULL {
            // SAFETY: FULL means the value is initialized, and `&mut self`
            // guarantees no outstanding references.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

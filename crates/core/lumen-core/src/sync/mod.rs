//! Synchronization primitives for process-wide firmware state.
//!
//! Firmware runs its driver phase on a single hart with interrupts off, but
//! the tables these primitives guard live in `static` items, so they still
//! need `Sync` wrappers that are const-constructible and allocation-free.

mod once;
mod spinlock;

pub use once::OnceSlot;
pub use spinlock::{SpinLock, SpinLockGuard};

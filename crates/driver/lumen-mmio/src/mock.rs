//! Recording register backend for host tests.
//!
//! [`MockIo`] logs every register access in order. Reads are served from a
//! per-offset FIFO of scripted values first, then from a per-offset default
//! (zero unless set). Values are stored widened to `u64` and truncated to the
//! accessed width.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use lumen_core::sync::SpinLock;

use crate::RegisterIo;

/// One recorded register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// A read at `offset`.
    Read {
        /// Byte offset from the block base.
        offset: usize,
    },
    /// A write of `value` at `offset`.
    Write {
        /// Byte offset from the block base.
        offset: usize,
        /// Written value, zero-extended.
        value: u64,
    },
}

struct State {
    log: Vec<Access>,
    scripted: BTreeMap<usize, VecDeque<u64>>,
    defaults: BTreeMap<usize, u64>,
}

/// A [`RegisterIo`] backend that records accesses and replays scripted reads.
pub struct MockIo {
    state: SpinLock<State>,
}

impl MockIo {
    /// Creates a mock with an empty log and all registers reading zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SpinLock::new(State {
                log: Vec::new(),
                scripted: BTreeMap::new(),
                defaults: BTreeMap::new(),
            }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Queues `value` to be returned by the next unscripted read at `offset`.
    pub fn push_read(&self, offset: usize, value: u64) {
        self.with_state(|s| s.scripted.entry(offset).or_default().push_back(value));
    }

    /// Queues several reads at `offset`, returned in order.
    pub fn push_reads(&self, offset: usize, values: &[u64]) {
        self.with_state(|s| {
            s.scripted
                .entry(offset)
                .or_default()
                .extend(values.iter().copied());
        });
    }

    /// Sets the value returned at `offset` once its script is exhausted.
    pub fn set_default(&self, offset: usize, value: u64) {
        self.with_state(|s| {
            s.defaults.insert(offset, value);
        });
    }

    /// Returns a copy of the full access log.
    #[must_use]
    pub fn accesses(&self) -> Vec<Access> {
        self.with_state(|s| s.log.clone())
    }

    /// Returns the values written at `offset`, in order.
    #[must_use]
    pub fn writes_at(&self, offset: usize) -> Vec<u64> {
        self.with_state(|s| {
            s.log
                .iter()
                .filter_map(|a| match *a {
                    Access::Write { offset: o, value } if o == offset => Some(value),
                    _ => None,
                })
                .collect()
        })
    }

    /// Returns every written value, in order, regardless of offset.
    #[must_use]
    pub fn writes(&self) -> Vec<(usize, u64)> {
        self.with_state(|s| {
            s.log
                .iter()
                .filter_map(|a| match *a {
                    Access::Write { offset, value } => Some((offset, value)),
                    Access::Read { .. } => None,
                })
                .collect()
        })
    }

    /// Returns how many reads hit `offset`.
    #[must_use]
    pub fn reads_at(&self, offset: usize) -> usize {
        self.with_state(|s| {
            s.log
                .iter()
                .filter(|a| matches!(a, Access::Read { offset: o } if *o == offset))
                .count()
        })
    }

    /// Clears the access log, keeping scripts and defaults.
    pub fn clear_log(&self) {
        self.with_state(|s| s.log.clear());
    }

    fn read(&self, offset: usize) -> u64 {
        self.with_state(|s| {
            s.log.push(Access::Read { offset });
            s.scripted
                .get_mut(&offset)
                .and_then(VecDeque::pop_front)
                .or_else(|| s.defaults.get(&offset).copied())
                .unwrap_or(0)
        })
    }

    fn write(&self, offset: usize, value: u64) {
        self.with_state(|s| s.log.push(Access::Write { offset, value }));
    }
}

impl Default for MockIo {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)]
impl RegisterIo for MockIo {
    fn read_u8(&self, offset: usize) -> u8 {
        self.read(offset) as u8
    }
    fn read_u16(&self, offset: usize) -> u16 {
        self.read(offset) as u16
    }
    fn read_u32(&self, offset: usize) -> u32 {
        self.read(offset) as u32
    }
    fn read_u64(&self, offset: usize) -> u64 {
        self.read(offset)
    }
    fn write_u8(&self, offset: usize, value: u8) {
        self.write(offset, value.into());
    }
    fn write_u16(&self, offset: usize, value: u16) {
        self.write(offset, value.into());
    }
    fn write_u32(&self, offset: usize, value: u32) {
        self.write(offset, value.into());
    }
    fn write_u64(&self, offset: usize, value: u64) {
        self.write(offset, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_then_default() {
        let io = MockIo::new();
        io.push_reads(0x10, &[2, 2]);
        io.set_default(0x10, 0);
        assert_eq!(io.read_u32(0x10), 2);
        assert_eq!(io.read_u32(0x10), 2);
        assert_eq!(io.read_u32(0x10), 0);
        assert_eq!(io.reads_at(0x10), 3);
    }

    #[test]
    fn reads_truncate_to_width() {
        let io = MockIo::new();
        io.set_default(0, 0x1_2345);
        assert_eq!(io.read_u8(0), 0x45);
        assert_eq!(io.read_u16(0), 0x2345);
    }

    #[test]
    fn writes_are_filtered_by_offset() {
        let io = MockIo::new();
        io.write_u8(0x0C, 0xB0);
        io.write_u8(0x10, 0x90);
        io.write_u8(0x0C, 0x81);
        assert_eq!(io.writes_at(0x0C), [0xB0, 0x81]);
        assert_eq!(io.writes(), [(0x0C, 0xB0), (0x10, 0x90), (0x0C, 0x81)]);
        io.clear_log();
        assert!(io.accesses().is_empty());
    }
}

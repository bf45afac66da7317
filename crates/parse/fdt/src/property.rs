//! Node properties.

use crate::node::{FDT_NOP, FDT_PROP, align4, read_be32_at, str_from_offset};

/// One `name = value` property of a node.
#[derive(Debug, Clone, Copy)]
pub struct FdtProperty<'a> {
    name: &'a str,
    data: &'a [u8],
}

impl<'a> FdtProperty<'a> {
    pub(crate) fn new(name: &'a str, data: &'a [u8]) -> Self {
        Self { name, data }
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Raw value bytes.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// First cell of the value, e.g. `#address-cells`.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        read_be32_at(self.data, 0)
    }

    /// Number of complete 32-bit cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.data.len() / 4
    }

    /// Reads a 1- or 2-cell number (as used by `reg`) beginning at cell
    /// `start`. A zero-cell read gives `Some(0)`.
    ///
    /// Returns `None` past the end of the value or for `count > 2`.
    #[must_use]
    pub fn read_cells(&self, start: usize, count: usize) -> Option<u64> {
        let hi_cell = |i: usize| read_be32_at(self.data, i.checked_mul(4)?).map(u64::from);
        match count {
            0 => Some(0),
            1 => hi_cell(start),
            2 => Some((hi_cell(start)? << 32) | hi_cell(start.checked_add(1)?)?),
            _ => None,
        }
    }

    /// Splits a string-list value (`compatible`, `reg-names`, ...).
    #[must_use]
    pub fn as_str_list(&self) -> StrListIter<'a> {
        StrListIter { rest: self.data }
    }
}

/// Strings of a NUL-separated list; stops at the first empty or non-UTF-8
/// entry.
pub struct StrListIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for StrListIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let (head, tail) = match self.rest.iter().position(|&b| b == 0) {
            Some(nul) => (self.rest.get(..nul)?, self.rest.get(nul + 1..)?),
            None => (self.rest, &[][..]),
        };
        self.rest = tail;
        if head.is_empty() {
            self.rest = &[];
            return None;
        }
        core::str::from_utf8(head).ok()
    }
}

/// Walks the property tokens at the start of a node's content.
pub struct PropertyIter<'a> {
    struct_block: &'a [u8],
    strings_block: &'a [u8],
    offset: usize,
}

impl<'a> PropertyIter<'a> {
    pub(crate) fn new(struct_block: &'a [u8], strings_block: &'a [u8], offset: usize) -> Self {
        Self {
            struct_block,
            strings_block,
            offset,
        }
    }

    /// Offset of the first token that is not a property or a NOP, once the
    /// iterator is exhausted.
    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    /// Decodes the property whose `FDT_PROP` tag sits at `self.offset`.
    fn take_prop(&mut self) -> Option<FdtProperty<'a>> {
        let header = self.offset.checked_add(4)?;
        let len = usize::try_from(read_be32_at(self.struct_block, header)?).ok()?;
        let name_off = usize::try_from(read_be32_at(self.struct_block, header + 4)?).ok()?;

        let start = header + 8;
        let end = start.checked_add(len)?;
        let data = self.struct_block.get(start..end)?;
        let name = str_from_offset(self.strings_block, name_off)?;

        self.offset = align4(end);
        Some(FdtProperty::new(name, data))
    }
}

impl<'a> Iterator for PropertyIter<'a> {
    type Item = FdtProperty<'a>;

    fn next(&mut self) -> Option<FdtProperty<'a>> {
        loop {
            match read_be32_at(self.struct_block, self.offset)? {
                FDT_NOP => self.offset += 4,
                FDT_PROP => return self.take_prop(),
                _ => return None,
            }
        }
    }
}

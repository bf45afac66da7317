//! In-memory DTB construction for host tests.
//!
//! ```ignore
//! let mut b = DtbBuilder::default();
//! b.begin("")
//!     .begin("i2c@10030000")
//!     .prop_str("compatible", "sifive,i2c0")
//!     .prop("reg", &cells(&[0x0, 0x1003_0000, 0x1000]))
//!     .end()
//!     .end();
//! let dtb = b.finish();
//! ```

use alloc::vec::Vec;

use crate::header::{FDT_HEADER_SIZE, FDT_MAGIC};
use crate::node::{FDT_BEGIN_NODE, FDT_END, FDT_END_NODE, FDT_NOP, FDT_PROP};

/// Encodes `vals` as big-endian cells.
#[must_use]
pub fn cells(vals: &[u32]) -> Vec<u8> {
    vals.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn push_be32(v: &mut Vec<u8>, val: u32) {
    v.extend_from_slice(&val.to_be_bytes());
}

fn pad4(v: &mut Vec<u8>) {
    while v.len() % 4 != 0 {
        v.push(0);
    }
}

#[allow(clippy::cast_possible_truncation)]
fn len32(len: usize) -> u32 {
    len as u32
}

/// Structure-block writer with an interned strings table.
#[derive(Debug, Default)]
pub struct DtbBuilder {
    st: Vec<u8>,
    strings: Vec<u8>,
}

impl DtbBuilder {
    /// Opens a node.
    pub fn begin(&mut self, name: &str) -> &mut Self {
        push_be32(&mut self.st, FDT_BEGIN_NODE);
        self.st.extend_from_slice(name.as_bytes());
        self.st.push(0);
        pad4(&mut self.st);
        self
    }

    /// Closes the innermost open node.
    pub fn end(&mut self) -> &mut Self {
        push_be32(&mut self.st, FDT_END_NODE);
        self
    }

    /// Emits a `FDT_NOP` token.
    pub fn nop(&mut self) -> &mut Self {
        push_be32(&mut self.st, FDT_NOP);
        self
    }

    /// Emits a property with a raw value.
    pub fn prop(&mut self, name: &str, data: &[u8]) -> &mut Self {
        let nameoff = self.intern(name);
        push_be32(&mut self.st, FDT_PROP);
        push_be32(&mut self.st, len32(data.len()));
        push_be32(&mut self.st, nameoff);
        self.st.extend_from_slice(data);
        pad4(&mut self.st);
        self
    }

    /// Emits a NUL-terminated string property.
    pub fn prop_str(&mut self, name: &str, value: &str) -> &mut Self {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.prop(name, &data)
    }

    /// Emits a one-cell property.
    pub fn prop_u32(&mut self, name: &str, value: u32) -> &mut Self {
        self.prop(name, &value.to_be_bytes())
    }

    fn intern(&mut self, name: &str) -> u32 {
        let mut off = 0;
        for s in self.strings.split(|&b| b == 0) {
            if s == name.as_bytes() {
                return len32(off);
            }
            off += s.len() + 1;
        }
        let off = len32(self.strings.len());
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        off
    }

    /// Terminates the structure block and returns the complete blob.
    #[must_use]
    pub fn finish(&mut self) -> Vec<u8> {
        push_be32(&mut self.st, FDT_END);

        let rsv_off = FDT_HEADER_SIZE;
        let struct_off = rsv_off + 16;
        let strings_off = struct_off + self.st.len();
        let total = strings_off + self.strings.len();

        let mut dtb = Vec::with_capacity(total);
        for word in [
            FDT_MAGIC,
            len32(total),
            len32(struct_off),
            len32(strings_off),
            len32(rsv_off),
            17,
            16,
            0,
            len32(self.strings.len()),
            len32(self.st.len()),
        ] {
            push_be32(&mut dtb, word);
        }
        // Empty memory reservation map.
        dtb.extend_from_slice(&[0; 16]);
        dtb.extend_from_slice(&self.st);
        dtb.extend_from_slice(&self.strings);
        dtb
    }
}

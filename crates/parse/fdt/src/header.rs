//! DTB header decoding.

use crate::FdtError;
use crate::node::read_be32_at;

/// FDT magic number.
pub const FDT_MAGIC: u32 = 0xd00d_feed;

/// Minimum `last_comp_version` accepted.
pub const FDT_MIN_COMPAT_VERSION: u32 = 16;

/// Size of the v17 header in bytes (ten big-endian words).
pub const FDT_HEADER_SIZE: usize = 40;

/// Decoded FDT header, fields in native endianness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtHeader {
    /// Must be [`FDT_MAGIC`].
    pub magic: u32,
    /// Total size of the blob in bytes.
    pub totalsize: u32,
    /// Offset of the structure block.
    pub off_dt_struct: u32,
    /// Offset of the strings block.
    pub off_dt_strings: u32,
    /// Offset of the memory reservation block.
    pub off_mem_rsvmap: u32,
    /// Blob version.
    pub version: u32,
    /// Oldest version this blob is compatible with.
    pub last_comp_version: u32,
    /// Physical id of the boot hart.
    pub boot_cpuid_phys: u32,
    /// Length of the strings block.
    pub size_dt_strings: u32,
    /// Length of the structure block.
    pub size_dt_struct: u32,
}

impl FdtHeader {
    /// Decodes the header at the start of `data`.
    ///
    /// Only checks that enough bytes are present; semantic validation is done
    /// by [`Fdt::parse`](crate::Fdt::parse).
    ///
    /// # Errors
    ///
    /// [`FdtError::TruncatedData`] if `data` is shorter than the header.
    pub fn read(data: &[u8]) -> Result<Self, FdtError> {
        if data.len() < FDT_HEADER_SIZE {
            return Err(FdtError::TruncatedData);
        }
        let word = |i: usize| read_be32_at(data, i * 4).ok_or(FdtError::TruncatedData);

        Ok(Self {
            magic: word(0)?,
            totalsize: word(1)?,
            off_dt_struct: word(2)?,
            off_dt_strings: word(3)?,
            off_mem_rsvmap: word(4)?,
            version: word(5)?,
            last_comp_version: word(6)?,
            boot_cpuid_phys: word(7)?,
            size_dt_strings: word(8)?,
            size_dt_struct: word(9)?,
        })
    }
}

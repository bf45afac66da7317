//! `lumen-fdt`: a `no_std` flattened device tree (DTB) reader.
//!
//! Zero-copy access to the nodes and properties of a DTB blob handed to the
//! firmware by the previous boot stage. Nodes are addressed the libfdt way,
//! by the byte offset of their `FDT_BEGIN_NODE` token in the structure block,
//! so an offset is a stable identifier for a node for the whole boot.
//!
//! ```ignore
//! let fdt = Fdt::parse(dtb)?;
//! for node in fdt.nodes() {
//!     if node.is_compatible("sifive,i2c0") {
//!         let (base, _size) = fdt.node_reg(node.offset(), 0)?;
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]

#[cfg(any(test, feature = "builder"))]
extern crate alloc;

#[cfg(any(test, feature = "builder"))]
pub mod builder;
pub mod header;
pub mod node;
pub mod property;

use core::fmt;

pub use header::FdtHeader;
pub use node::{ChildIter, FdtNode, NodeIter};
pub use property::{FdtProperty, PropertyIter, StrListIter};

use header::{FDT_MAGIC, FDT_MIN_COMPAT_VERSION};
use node::NodeWalk;

/// Errors reported while parsing or querying a DTB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdtError {
    /// The magic number was not `0xd00dfeed`.
    InvalidMagic,
    /// `last_comp_version` is below 16.
    UnsupportedVersion,
    /// The blob is shorter than the header or a declared block.
    TruncatedData,
    /// A structural invariant was violated.
    InvalidStructure,
    /// The offset does not identify a node.
    BadOffset,
    /// The requested node or property does not exist.
    NotFound,
    /// A property value is malformed (e.g. unsupported cell count).
    BadValue,
}

impl fmt::Display for FdtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMagic => f.write_str("bad DTB magic"),
            Self::UnsupportedVersion => f.write_str("unsupported DTB version"),
            Self::TruncatedData => f.write_str("truncated DTB"),
            Self::InvalidStructure => f.write_str("malformed DTB structure"),
            Self::BadOffset => f.write_str("offset is not a node"),
            Self::NotFound => f.write_str("node or property not found"),
            Self::BadValue => f.write_str("malformed property value"),
        }
    }
}

impl From<FdtError> for lumen_core::Error {
    fn from(err: FdtError) -> Self {
        match err {
            FdtError::BadOffset => Self::InvalidArgument,
            FdtError::NotFound => Self::NotFound,
            FdtError::InvalidMagic
            | FdtError::UnsupportedVersion
            | FdtError::TruncatedData
            | FdtError::InvalidStructure
            | FdtError::BadValue => Self::Failed,
        }
    }
}

/// Parsed flattened device tree borrowing the raw blob.
pub struct Fdt<'a> {
    data: &'a [u8],
    struct_block: &'a [u8],
    strings_block: &'a [u8],
    root: FdtNode<'a>,
    boot_cpuid: u32,
}

impl<'a> Fdt<'a> {
    /// Parses and validates a DTB blob.
    ///
    /// # Errors
    ///
    /// Returns an [`FdtError`] if the header is bad, a block lies outside the
    /// blob, or the structure block does not start with the root node.
    pub fn parse(data: &'a [u8]) -> Result<Self, FdtError> {
        let hdr = FdtHeader::read(data)?;

        if hdr.magic != FDT_MAGIC {
            return Err(FdtError::InvalidMagic);
        }
        if hdr.last_comp_version < FDT_MIN_COMPAT_VERSION {
            return Err(FdtError::UnsupportedVersion);
        }

        let total_size = hdr.totalsize as usize;
        if data.len() < total_size {
            return Err(FdtError::TruncatedData);
        }

        let block = move |off: u32, len: u32| -> Result<&'a [u8], FdtError> {
            let start = off as usize;
            let end = start
                .checked_add(len as usize)
                .ok_or(FdtError::InvalidStructure)?;
            if end > total_size {
                return Err(FdtError::TruncatedData);
            }
            data.get(start..end).ok_or(FdtError::TruncatedData)
        };
        let struct_block = block(hdr.off_dt_struct, hdr.size_dt_struct)?;
        let strings_block = block(hdr.off_dt_strings, hdr.size_dt_strings)?;

        let root = node::node_at_token(struct_block, strings_block, 0)
            .ok_or(FdtError::InvalidStructure)?;

        Ok(Self {
            data: &data[..total_size],
            struct_block,
            strings_block,
            root,
            boot_cpuid: hdr.boot_cpuid_phys,
        })
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> FdtNode<'a> {
        self.root
    }

    /// Returns the node whose token sits at `offset`.
    ///
    /// # Errors
    ///
    /// [`FdtError::BadOffset`] if no node starts at `offset`.
    pub fn node_at(&self, offset: usize) -> Result<FdtNode<'a>, FdtError> {
        self.nodes()
            .find(|n| n.offset() == offset)
            .ok_or(FdtError::BadOffset)
    }

    /// Returns the offset of the node enclosing the node at `offset`.
    ///
    /// # Errors
    ///
    /// [`FdtError::BadOffset`] if `offset` is not a node,
    /// [`FdtError::NotFound`] for the root.
    pub fn parent_offset(&self, offset: usize) -> Result<usize, FdtError> {
        let mut stack_top: Option<usize> = None;
        let mut path = [0usize; MAX_DEPTH];

        for (depth, node) in NodeWalk::new(self.struct_block, self.strings_block) {
            if depth >= MAX_DEPTH {
                return Err(FdtError::InvalidStructure);
            }
            path[depth] = node.offset();
            if node.offset() == offset {
                stack_top = Some(depth);
                break;
            }
        }

        match stack_top {
            None => Err(FdtError::BadOffset),
            Some(0) => Err(FdtError::NotFound),
            Some(depth) => Ok(path[depth - 1]),
        }
    }

    /// Returns `(address, size)` of the `index`-th `reg` entry of the node
    /// at `offset`, decoded with the parent's `#address-cells` and
    /// `#size-cells`.
    ///
    /// # Errors
    ///
    /// [`FdtError::BadOffset`] for a bad offset, [`FdtError::NotFound`] for
    /// the root, a missing `reg` or an out-of-range index, and
    /// [`FdtError::BadValue`] for cell counts above 2.
    pub fn node_reg(&self, offset: usize, index: usize) -> Result<(u64, u64), FdtError> {
        let node = self.node_at(offset)?;
        let parent = self.node_at(self.parent_offset(offset)?)?;

        let addr_cells = parent.address_cells() as usize;
        let size_cells = parent.size_cells() as usize;
        if addr_cells > 2 || size_cells > 2 {
            return Err(FdtError::BadValue);
        }

        let reg = node.property("reg").ok_or(FdtError::NotFound)?;
        let stride = addr_cells + size_cells;
        if stride == 0 {
            return Err(FdtError::BadValue);
        }
        let first = index.checked_mul(stride).ok_or(FdtError::NotFound)?;
        if first + stride > reg.cell_count() {
            return Err(FdtError::NotFound);
        }

        let address = reg.read_cells(first, addr_cells).ok_or(FdtError::BadValue)?;
        let size = reg
            .read_cells(first + addr_cells, size_cells)
            .ok_or(FdtError::BadValue)?;
        Ok((address, size))
    }

    /// Returns a depth-first iterator over every node, root first.
    #[must_use]
    pub fn nodes(&self) -> NodeIter<'a> {
        NodeIter {
            walk: NodeWalk::new(self.struct_block, self.strings_block),
        }
    }

    /// Finds a node by absolute path (e.g. `"/soc/i2c@10030000"`).
    #[must_use]
    pub fn find_node(&self, path: &str) -> Option<FdtNode<'a>> {
        path.split('/')
            .filter(|c| !c.is_empty())
            .try_fold(self.root(), |node, component| node.find_child(component))
    }

    /// Returns the physical id of the boot hart.
    #[must_use]
    pub fn boot_cpuid(&self) -> u32 {
        self.boot_cpuid
    }

    /// Returns the blob size in bytes.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.data.len()
    }
}

/// Deepest nesting `parent_offset` tracks.
const MAX_DEPTH: usize = 32;

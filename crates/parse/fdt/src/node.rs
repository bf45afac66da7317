//! Nodes and structure-block token walking.
//!
//! A node is identified by the byte offset of its `FDT_BEGIN_NODE` token in
//! the structure block. The root node is at offset 0.

use crate::property::{FdtProperty, PropertyIter};

pub(crate) const FDT_BEGIN_NODE: u32 = 0x0000_0001;
pub(crate) const FDT_END_NODE: u32 = 0x0000_0002;
pub(crate) const FDT_PROP: u32 = 0x0000_0003;
pub(crate) const FDT_NOP: u32 = 0x0000_0004;
#[cfg_attr(not(any(test, feature = "builder")), allow(dead_code))]
pub(crate) const FDT_END: u32 = 0x0000_0009;

/// `#address-cells` assumed when the property is absent.
pub const DEFAULT_ADDRESS_CELLS: u32 = 2;
/// `#size-cells` assumed when the property is absent.
pub const DEFAULT_SIZE_CELLS: u32 = 1;

/// Reads a big-endian `u32` at `offset` in `data`.
pub(crate) fn read_be32_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = data.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// Rounds `offset` up to the next 4-byte boundary.
pub(crate) fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}

/// Extracts a NUL-terminated UTF-8 string starting at `offset`.
pub(crate) fn str_from_offset(data: &[u8], offset: usize) -> Option<&str> {
    let bytes = data.get(offset..)?;
    let end = bytes.iter().position(|&b| b == 0)?;
    core::str::from_utf8(&bytes[..end]).ok()
}

/// Decodes the node whose `FDT_BEGIN_NODE` token is at `offset`.
pub(crate) fn node_at_token<'a>(
    struct_block: &'a [u8],
    strings_block: &'a [u8],
    offset: usize,
) -> Option<FdtNode<'a>> {
    if offset % 4 != 0 || read_be32_at(struct_block, offset)? != FDT_BEGIN_NODE {
        return None;
    }
    let name_start = offset + 4;
    let name = str_from_offset(struct_block, name_start)?;
    Some(FdtNode {
        struct_block,
        strings_block,
        name,
        offset,
        content_offset: align4(name_start + name.len() + 1),
    })
}

/// Returns the offset right after a property token starting at `offset`
/// (which points just past the `FDT_PROP` tag).
fn skip_prop(struct_block: &[u8], offset: usize) -> Option<usize> {
    let len = read_be32_at(struct_block, offset)? as usize;
    Some(align4(offset + 8 + len))
}

/// Skips a node subtree whose content starts at `offset`. Returns the
/// offset right after the matching `FDT_END_NODE`.
fn skip_node_subtree(struct_block: &[u8], mut offset: usize) -> Option<usize> {
    let mut depth: u32 = 1;
    while depth > 0 {
        let tag = read_be32_at(struct_block, offset)?;
        offset += 4;

        match tag {
            FDT_BEGIN_NODE => {
                let name_end = struct_block.get(offset..)?.iter().position(|&b| b == 0)?;
                offset = align4(offset + name_end + 1);
                depth += 1;
            }
            FDT_END_NODE => depth -= 1,
            FDT_PROP => offset = skip_prop(struct_block, offset)?,
            FDT_NOP => {}
            _ => return None,
        }
    }
    Some(offset)
}

/// A node in the flattened device tree.
#[derive(Clone, Copy)]
pub struct FdtNode<'a> {
    struct_block: &'a [u8],
    strings_block: &'a [u8],
    name: &'a str,
    offset: usize,
    content_offset: usize,
}

impl core::fmt::Debug for FdtNode<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FdtNode")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

impl<'a> FdtNode<'a> {
    /// Returns the node name (e.g. `"i2c@10030000"`, `""` for the root).
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Returns the structure-block offset identifying this node.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns an iterator over the node's properties.
    #[must_use]
    pub fn properties(&self) -> PropertyIter<'a> {
        PropertyIter::new(self.struct_block, self.strings_block, self.content_offset)
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<FdtProperty<'a>> {
        self.properties().find(|p| p.name() == name)
    }

    /// Returns an iterator over the direct children.
    #[must_use]
    pub fn children(&self) -> ChildIter<'a> {
        let mut props = self.properties();
        while props.next().is_some() {}
        ChildIter {
            struct_block: self.struct_block,
            strings_block: self.strings_block,
            offset: props.offset(),
        }
    }

    /// Finds a direct child by name.
    #[must_use]
    pub fn find_child(&self, name: &str) -> Option<FdtNode<'a>> {
        self.children().find(|n| n.name() == name)
    }

    /// Returns `true` if `compatible` appears in this node's `compatible` list.
    #[must_use]
    pub fn is_compatible(&self, compatible: &str) -> bool {
        self.property("compatible")
            .is_some_and(|p| p.as_str_list().any(|s| s == compatible))
    }

    /// Returns the index of the first `table` entry this node is compatible
    /// with.
    ///
    /// Table order decides, not the order of the node's own `compatible`
    /// list.
    #[must_use]
    pub fn compatible_match(&self, table: &[&str]) -> Option<usize> {
        let prop = self.property("compatible")?;
        table
            .iter()
            .position(|want| prop.as_str_list().any(|have| have == *want))
    }

    /// Searches the subtree below this node for the first node compatible
    /// with `compatible`.
    #[must_use]
    pub fn find_compatible(&self, compatible: &str) -> Option<FdtNode<'a>> {
        for child in self.children() {
            if child.is_compatible(compatible) {
                return Some(child);
            }
            if let Some(found) = child.find_compatible(compatible) {
                return Some(found);
            }
        }
        None
    }

    /// `#address-cells` this node declares for its children.
    #[must_use]
    pub fn address_cells(&self) -> u32 {
        self.property("#address-cells")
            .and_then(|p| p.as_u32())
            .unwrap_or(DEFAULT_ADDRESS_CELLS)
    }

    /// `#size-cells` this node declares for its children.
    #[must_use]
    pub fn size_cells(&self) -> u32 {
        self.property("#size-cells")
            .and_then(|p| p.as_u32())
            .unwrap_or(DEFAULT_SIZE_CELLS)
    }
}

/// Iterator over the direct children of a node.
pub struct ChildIter<'a> {
    struct_block: &'a [u8],
    strings_block: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = FdtNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match read_be32_at(self.struct_block, self.offset)? {
                FDT_BEGIN_NODE => {
                    let node = node_at_token(self.struct_block, self.strings_block, self.offset)?;
                    self.offset = skip_node_subtree(self.struct_block, node.content_offset)?;
                    return Some(node);
                }
                FDT_NOP => self.offset += 4,
                _ => return None,
            }
        }
    }
}

/// Depth-first walk over every node, yielding `(depth, node)` with the root
/// at depth 0.
pub(crate) struct NodeWalk<'a> {
    struct_block: &'a [u8],
    strings_block: &'a [u8],
    offset: usize,
    depth: usize,
    done: bool,
}

impl<'a> NodeWalk<'a> {
    pub(crate) fn new(struct_block: &'a [u8], strings_block: &'a [u8]) -> Self {
        Self {
            struct_block,
            strings_block,
            offset: 0,
            depth: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for NodeWalk<'a> {
    type Item = (usize, FdtNode<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let Some(tag) = read_be32_at(self.struct_block, self.offset) else {
                self.done = true;
                break;
            };
            match tag {
                FDT_BEGIN_NODE => {
                    let Some(node) =
                        node_at_token(self.struct_block, self.strings_block, self.offset)
                    else {
                        self.done = true;
                        break;
                    };
                    let depth = self.depth;
                    self.depth += 1;
                    self.offset = node.content_offset;
                    return Some((depth, node));
                }
                FDT_END_NODE => {
                    self.offset += 4;
                    match self.depth.checked_sub(1) {
                        Some(d) => self.depth = d,
                        None => self.done = true,
                    }
                }
                FDT_PROP => match skip_prop(self.struct_block, self.offset + 4) {
                    Some(next) => self.offset = next,
                    None => self.done = true,
                },
                FDT_NOP => self.offset += 4,
                _ => self.done = true,
            }
        }
        None
    }
}

/// Iterator over every node of the tree in depth-first order.
pub struct NodeIter<'a> {
    pub(crate) walk: NodeWalk<'a>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = FdtNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.walk.next().map(|(_, node)| node)
    }
}

//! Description-tree access during probe.
//!
//! Drivers never walk the blob themselves; they ask [`DeviceTree`] for the
//! few facts a probe needs. Node offsets are `i32` to match the firmware ABI,
//! where a negative value is an error code rather than a node.

use lumen_core::{Error, Result};
use lumen_fdt::Fdt;

/// Offset of a node in the description tree.
pub type NodeOffset = i32;

/// The description-tree queries drivers depend on.
pub trait DeviceTree {
    /// Returns `(address, size)` of the `index`-th `reg` entry of `node`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a negative or non-node offset,
    /// [`Error::NotFound`] when the entry is missing.
    fn node_reg(&self, node: NodeOffset, index: usize) -> Result<(u64, u64)>;

    /// Returns the first `table` entry that `node` is compatible with.
    fn match_compatible<'t>(&self, node: NodeOffset, table: &[&'t str]) -> Option<&'t str>;

    /// Returns the parent of `node`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a bad offset, [`Error::NotFound`] for
    /// the root.
    fn parent_offset(&self, node: NodeOffset) -> Result<NodeOffset>;

    /// Returns the node after `prev` in depth-first order, or the root when
    /// `prev` is `None`.
    fn next_node(&self, prev: Option<NodeOffset>) -> Option<NodeOffset>;
}

fn to_usize(node: NodeOffset) -> Result<usize> {
    usize::try_from(node).map_err(|_| Error::InvalidArgument)
}

fn to_offset(offset: usize) -> Option<NodeOffset> {
    NodeOffset::try_from(offset).ok()
}

impl DeviceTree for Fdt<'_> {
    fn node_reg(&self, node: NodeOffset, index: usize) -> Result<(u64, u64)> {
        Ok(Fdt::node_reg(self, to_usize(node)?, index)?)
    }

    fn match_compatible<'t>(&self, node: NodeOffset, table: &[&'t str]) -> Option<&'t str> {
        let node = self.node_at(to_usize(node).ok()?).ok()?;
        node.compatible_match(table).and_then(|i| table.get(i).copied())
    }

    fn parent_offset(&self, node: NodeOffset) -> Result<NodeOffset> {
        let parent = Fdt::parent_offset(self, to_usize(node)?)?;
        to_offset(parent).ok_or(Error::Failed)
    }

    fn next_node(&self, prev: Option<NodeOffset>) -> Option<NodeOffset> {
        let mut nodes = self.nodes();
        if let Some(prev) = prev {
            let prev = usize::try_from(prev).ok()?;
            nodes.find(|n| n.offset() == prev)?;
        }
        to_offset(nodes.next()?.offset())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_fdt::builder::{DtbBuilder, cells};

    fn bus_dtb() -> Vec<u8> {
        let mut b = DtbBuilder::default();
        b.begin("")
            .begin("i2c@10030000")
            .prop_str("compatible", "sifive,i2c0")
            .prop("reg", &cells(&[0x0, 0x1003_0000, 0x1000]))
            .prop_u32("#address-cells", 1)
            .prop_u32("#size-cells", 0)
            .begin("pmic@58")
            .prop_str("compatible", "dlg,da9063")
            .prop_u32("reg", 0x58)
            .end()
            .end()
            .end();
        b.finish()
    }

    fn offsets(tree: &dyn DeviceTree) -> Vec<NodeOffset> {
        let mut out = Vec::new();
        let mut cur = tree.next_node(None);
        while let Some(off) = cur {
            out.push(off);
            cur = tree.next_node(Some(off));
        }
        out
    }

    #[test]
    fn walks_every_node() {
        let dtb = bus_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let all = offsets(&fdt);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], 0);
    }

    #[test]
    fn reg_parent_and_match() {
        let dtb = bus_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let tree: &dyn DeviceTree = &fdt;
        let [_, bus, pmic] = offsets(tree)[..] else {
            panic!("unexpected node count");
        };

        assert_eq!(tree.node_reg(bus, 0), Ok((0x1003_0000, 0x1000)));
        assert_eq!(tree.node_reg(pmic, 0), Ok((0x58, 0)));
        assert_eq!(tree.parent_offset(pmic), Ok(bus));
        assert_eq!(
            tree.match_compatible(bus, &["dlg,da9063", "sifive,i2c0"]),
            Some("sifive,i2c0")
        );
        assert_eq!(tree.match_compatible(pmic, &["sifive,i2c0"]), None);
    }

    #[test]
    fn negative_offsets_are_invalid() {
        let dtb = bus_dtb();
        let fdt = Fdt::parse(&dtb).unwrap();
        let tree: &dyn DeviceTree = &fdt;
        assert_eq!(tree.node_reg(-1, 0), Err(Error::InvalidArgument));
        assert_eq!(tree.parent_offset(-3), Err(Error::InvalidArgument));
        assert_eq!(tree.match_compatible(-1, &["sifive,i2c0"]), None);
        assert_eq!(tree.parent_offset(0), Err(Error::NotFound));
    }
}

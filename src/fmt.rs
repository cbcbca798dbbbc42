//! Structural `Debug` formatting for both trees.
//!
//! The rendering exposes the actual node structure (including routeless
//! interior nodes and skip labels), so two trees format identically iff they
//! are built identically.

use std::fmt::{Debug, Formatter, Result};

use crate::bits;
use crate::prefix_tree::{IpPrefixTree, Node as BitNode};
use crate::radix_tree::{IpRadixTree, Node as RadixNode};

impl Debug for IpPrefixTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("IpPrefixTree")
            .field("family", &self.family)
            .field("root", &DebugBitNode(&self.root))
            .finish()
    }
}

struct DebugBitNode<'a>(&'a BitNode);

impl Debug for DebugBitNode<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let mut m = f.debug_map();
        if !self.0.routes.is_empty() {
            m.entry(&"routes", &self.0.routes);
        }
        for (slot, edge) in self.0.children.iter().zip(["0", "1"]) {
            if let Some(child) = slot {
                m.entry(&edge, &DebugBitNode(child));
            }
        }
        m.finish()
    }
}

impl Debug for IpRadixTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.debug_struct("IpRadixTree")
            .field("family", &self.family)
            .field("root", &DebugRadixNode(&self.root))
            .finish()
    }
}

struct DebugRadixNode<'a>(&'a RadixNode);

impl Debug for DebugRadixNode<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let label: String = (0..self.0.label_len)
            .map(|i| if bits::bit_at(self.0.label, i) { '1' } else { '0' })
            .collect();
        let mut m = f.debug_map();
        m.entry(&"label", &label);
        if !self.0.routes.is_empty() {
            m.entry(&"routes", &self.0.routes);
        }
        for (slot, edge) in self.0.children.iter().zip(["0", "1"]) {
            if let Some(child) = slot {
                m.entry(&edge, &DebugRadixNode(child));
            }
        }
        m.finish()
    }
}

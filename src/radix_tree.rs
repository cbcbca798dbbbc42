//! Implementation of the path-compressed PATRICIA trie.
//!
//! Each node carries a *skip label*: the bits between the parent's branching
//! decision and the node itself, stored left-aligned in a `u128`. The child
//! slot index encodes the branching bit, so a child's label covers the bits
//! *after* it. Invariant (root excepted): every node carries routes or has
//! two children; deletion collapses routeless single-child nodes into their
//! child.

use log::{debug, trace};

use crate::{
    addr::{self, Decoded},
    bits,
    error::RibError,
    route::{self, Route},
    Attrs, Family, RoutingTable,
};

#[derive(Clone)]
pub(crate) struct Node {
    /// Skip label bits, left-aligned and masked to `label_len`.
    pub(crate) label: u128,
    pub(crate) label_len: u8,
    pub(crate) routes: Vec<Route>,
    pub(crate) children: [Option<Box<Node>>; 2],
}

/// Where a walk for an exact prefix ended up.
enum Found<'a> {
    /// The prefix ends exactly at this node's boundary.
    AtNode(&'a Node),
    /// The prefix ends inside this node's label (which agrees with it): the
    /// position carries no routes of its own, but the node is its subtree.
    InLabel(&'a Node),
}

impl Node {
    fn new(label: u128, label_len: u8) -> Self {
        Self {
            label,
            label_len,
            routes: Vec::new(),
            children: [None, None],
        }
    }

    /// A leaf holding the remainder of `decoded` after `depth` edge bits.
    fn leaf(decoded: &Decoded, depth: u8, route: Route) -> Self {
        let label_len = decoded.len - depth;
        let label = bits::mask_to_len(bits::shl(decoded.bits, depth), label_len);
        let mut node = Self::new(label, label_len);
        node.routes.push(route);
        node
    }

    fn child(&self, right: bool) -> Option<&Node> {
        self.children[right as usize].as_deref()
    }

    fn child_count(&self) -> usize {
        self.children.iter().flatten().count()
    }

    fn is_dead(&self) -> bool {
        self.routes.is_empty() && self.children.iter().all(Option::is_none)
    }

    /// Split the label at `at`: this node becomes an intermediate holding the
    /// first `at` label bits, with the old node (keeping routes, children and
    /// the label remainder) pushed down into the slot of label bit `at`.
    fn split(&mut self, at: u8) {
        debug_assert!(at < self.label_len);
        let slot = bits::bit_at(self.label, at) as usize;
        let tail_len = self.label_len - at - 1;
        let tail = bits::mask_to_len(bits::shl(self.label, at + 1), tail_len);
        let mut lower = Node::new(tail, tail_len);
        lower.routes = std::mem::take(&mut self.routes);
        lower.children = std::mem::take(&mut self.children);
        self.label = bits::mask_to_len(self.label, at);
        self.label_len = at;
        self.children[slot] = Some(Box::new(lower));
    }

    /// Absorb the only child: the label grows by the branching bit plus the
    /// child's label, and routes/children are taken over from the child.
    fn collapse(&mut self) {
        debug_assert!(self.routes.is_empty());
        debug_assert_eq!(self.child_count(), 1);
        let slot = self.children.iter().position(Option::is_some).unwrap();
        let child = self.children[slot].take().unwrap();
        let label = bits::splice(self.label, self.label_len, slot == 1, child.label);
        let label_len = self.label_len + 1 + child.label_len;
        *self = *child;
        self.label = label;
        self.label_len = label_len;
    }

    /// Re-establish path compression for the child in `slot` after routes
    /// were removed below it.
    fn restore(&mut self, slot: usize) {
        if let Some(child) = self.children[slot].as_mut() {
            if child.is_dead() {
                self.children[slot] = None;
            } else if child.routes.is_empty() && child.child_count() == 1 {
                child.collapse();
            }
        }
    }

    /// Append filtered copies of every route at or below this node.
    fn collect(&self, filter: &Attrs, out: &mut Vec<Route>) {
        route::collect_filtered(out, &self.routes, filter);
        for child in self.children.iter().flatten() {
            child.collect(filter, out);
        }
    }

    fn collect_wildcard(
        &self,
        depth: u8,
        address: u128,
        wildcard: u128,
        width: u8,
        filter: &Attrs,
        out: &mut Vec<Route>,
    ) {
        // every non-wildcard label position must agree with the address
        let diff = (self.label ^ bits::shl(address, depth)) & !bits::shl(wildcard, depth);
        if bits::mask_to_len(diff, self.label_len) != 0 {
            return;
        }
        route::collect_filtered(out, &self.routes, filter);
        let end = depth + self.label_len;
        if end == width {
            return;
        }
        for slot in [false, true] {
            if bits::bit_at(wildcard, end) || bits::bit_at(address, end) == slot {
                if let Some(child) = self.child(slot) {
                    child.collect_wildcard(end + 1, address, wildcard, width, filter, out);
                }
            }
        }
    }

    fn remove_at(
        &mut self,
        decoded: &Decoded,
        depth: u8,
        filter: &Attrs,
    ) -> Result<Vec<Route>, RibError> {
        let take = self.label_len.min(decoded.len - depth);
        if bits::common_prefix_len(decoded.bits, depth, self.label, 0, take) < self.label_len {
            // the prefix diverges from or ends inside the label
            return Err(RibError::UnknownPrefix(decoded.text()));
        }
        let depth = depth + self.label_len;
        if depth == decoded.len {
            if self.routes.is_empty() {
                return Err(RibError::UnknownPrefix(decoded.text()));
            }
            if filter.is_empty() {
                return Ok(std::mem::take(&mut self.routes));
            }
            let (removed, kept): (Vec<Route>, Vec<Route>) = std::mem::take(&mut self.routes)
                .into_iter()
                .partition(|r| r.attrs().contains_all(filter));
            self.routes = kept;
            if removed.is_empty() {
                return Err(RibError::NoMatchingRoute {
                    prefix: decoded.text(),
                });
            }
            return Ok(removed);
        }
        let slot = bits::bit_at(decoded.bits, depth) as usize;
        let removed = self.children[slot]
            .as_mut()
            .ok_or_else(|| RibError::UnknownPrefix(decoded.text()))?
            .remove_at(decoded, depth + 1, filter)?;
        self.restore(slot);
        Ok(removed)
    }

    /// Drop every route matching `filter` at or below this node, pruning and
    /// re-compressing the subtree. Returns the number of removed routes.
    fn flush_node(&mut self, filter: &Attrs) -> usize {
        let before = self.routes.len();
        self.routes.retain(|r| !r.attrs().contains_all(filter));
        let mut removed = before - self.routes.len();
        for slot in 0..2 {
            if let Some(child) = self.children[slot].as_mut() {
                removed += child.flush_node(filter);
            }
            self.restore(slot);
        }
        removed
    }

    fn flush_at(&mut self, decoded: &Decoded, depth: u8, filter: &Attrs) -> usize {
        let take = self.label_len.min(decoded.len - depth);
        if bits::common_prefix_len(decoded.bits, depth, self.label, 0, take) < take {
            return 0;
        }
        if depth + self.label_len >= decoded.len {
            // the subtree root lies at this node or inside its label
            return self.flush_node(filter);
        }
        let depth = depth + self.label_len;
        let slot = bits::bit_at(decoded.bits, depth) as usize;
        let Some(child) = self.children[slot].as_mut() else {
            return 0;
        };
        let removed = child.flush_at(decoded, depth + 1, filter);
        self.restore(slot);
        removed
    }
}

/// An IP routing table backed by a PATRICIA trie.
#[derive(Clone)]
pub struct IpRadixTree {
    pub(crate) family: Family,
    pub(crate) root: Node,
    count: usize,
}

impl Default for IpRadixTree {
    fn default() -> Self {
        Self::new(Family::Ipv6)
    }
}

impl IpRadixTree {
    fn decode(&self, text: &str) -> Result<Decoded, RibError> {
        let decoded = addr::decode(text)?;
        if decoded.family != self.family {
            return Err(RibError::FamilyMismatch {
                prefix: text.to_string(),
                family: self.family,
            });
        }
        Ok(decoded)
    }

    fn decode_address(&self, text: &str) -> Result<u128, RibError> {
        let (family, bits) = addr::decode_address(text)?;
        if family != self.family {
            return Err(RibError::FamilyMismatch {
                prefix: text.to_string(),
                family: self.family,
            });
        }
        Ok(bits)
    }

    /// Walk towards the exact position of `decoded`.
    fn locate(&self, decoded: &Decoded) -> Option<Found<'_>> {
        let mut node = &self.root;
        let mut depth = 0u8;
        loop {
            let take = node.label_len.min(decoded.len - depth);
            if bits::common_prefix_len(decoded.bits, depth, node.label, 0, take) < take {
                return None;
            }
            if depth + node.label_len >= decoded.len {
                return Some(if depth + node.label_len == decoded.len {
                    Found::AtNode(node)
                } else {
                    Found::InLabel(node)
                });
            }
            depth += node.label_len;
            node = node.child(bits::bit_at(decoded.bits, depth))?;
            depth += 1;
        }
    }
}

impl RoutingTable for IpRadixTree {
    fn new(family: Family) -> Self {
        Self {
            family,
            root: Node::new(0, 0),
            count: 0,
        }
    }

    fn family(&self) -> Family {
        self.family
    }

    fn len(&self) -> usize {
        self.count
    }

    fn add(&mut self, prefix: &str, attrs: Attrs) -> Result<Route, RibError> {
        let decoded = self.decode(prefix)?;
        let route = Route::from_decoded(&decoded, attrs);
        trace!("installed {route} in the {} table", self.family);
        let mut node = &mut self.root;
        let mut depth = 0u8;
        loop {
            let take = node.label_len.min(decoded.len - depth);
            let common = bits::common_prefix_len(decoded.bits, depth, node.label, 0, take);
            if common < node.label_len {
                // the prefix diverges from or ends inside the label
                node.split(common);
                if depth + common == decoded.len {
                    // the prefix ends at the split point, so the new
                    // intermediate node is the terminal itself
                    node.routes.push(route.clone());
                } else {
                    let slot = bits::bit_at(decoded.bits, depth + common) as usize;
                    debug_assert!(node.children[slot].is_none());
                    node.children[slot] =
                        Some(Box::new(Node::leaf(&decoded, depth + common + 1, route.clone())));
                }
                break;
            }
            depth += node.label_len;
            if depth == decoded.len {
                node.routes.push(route.clone());
                break;
            }
            let slot = bits::bit_at(decoded.bits, depth) as usize;
            if node.children[slot].is_some() {
                node = node.children[slot].as_deref_mut().unwrap();
                depth += 1;
            } else {
                node.children[slot] = Some(Box::new(Node::leaf(&decoded, depth + 1, route.clone())));
                break;
            }
        }
        self.count += 1;
        Ok(route)
    }

    fn get(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut node = &self.root;
        let mut depth = 0u8;
        let mut best: Option<&[Route]> = None;
        loop {
            if node.label_len > decoded.len - depth {
                break;
            }
            let common =
                bits::common_prefix_len(decoded.bits, depth, node.label, 0, node.label_len);
            if common < node.label_len {
                break;
            }
            depth += node.label_len;
            if !node.routes.is_empty() {
                best = Some(node.routes.as_slice());
            }
            if depth == decoded.len {
                break;
            }
            match node.child(bits::bit_at(decoded.bits, depth)) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }
        Ok(route::filtered(best.unwrap_or(&[]), filter))
    }

    fn show(&self, filter: &Attrs) -> Vec<Route> {
        let mut out = Vec::new();
        self.root.collect(filter, &mut out);
        route::sort_by_prefix(&mut out);
        out
    }

    fn show_exact(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        Ok(match self.locate(&decoded) {
            Some(Found::AtNode(node)) => route::filtered(&node.routes, filter),
            _ => Vec::new(),
        })
    }

    fn show_subtree(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut out = Vec::new();
        if let Some(Found::AtNode(node) | Found::InLabel(node)) = self.locate(&decoded) {
            node.collect(filter, &mut out);
        }
        route::sort_by_prefix(&mut out);
        Ok(out)
    }

    fn parent(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut node = &self.root;
        let mut depth = 0u8;
        let mut ancestor: Option<&[Route]> = None;
        loop {
            let take = node.label_len.min(decoded.len - depth);
            if bits::common_prefix_len(decoded.bits, depth, node.label, 0, take) < node.label_len {
                // absent, or a position inside a label: no routes of its own
                return Ok(Vec::new());
            }
            depth += node.label_len;
            if depth == decoded.len {
                if node.routes.is_empty() {
                    return Ok(Vec::new());
                }
                return Ok(route::filtered(ancestor.unwrap_or(&[]), filter));
            }
            if !node.routes.is_empty() {
                ancestor = Some(node.routes.as_slice());
            }
            match node.child(bits::bit_at(decoded.bits, depth)) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => return Ok(Vec::new()),
            }
        }
    }

    fn children(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut out = Vec::new();
        if let Some(Found::AtNode(node) | Found::InLabel(node)) = self.locate(&decoded) {
            node.collect(filter, &mut out);
            out.retain(|r| r.len > decoded.len);
        }
        route::sort_by_prefix(&mut out);
        Ok(out)
    }

    fn cover(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut out = Vec::new();
        let mut node = &self.root;
        let mut depth = 0u8;
        loop {
            if node.label_len > decoded.len - depth {
                break;
            }
            let common =
                bits::common_prefix_len(decoded.bits, depth, node.label, 0, node.label_len);
            if common < node.label_len {
                break;
            }
            depth += node.label_len;
            route::collect_filtered(&mut out, &node.routes, filter);
            if depth == decoded.len {
                break;
            }
            match node.child(bits::bit_at(decoded.bits, depth)) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }
        route::sort_by_prefix(&mut out);
        Ok(out)
    }

    fn wildcard_match(
        &self,
        address: &str,
        wildcard: &str,
        filter: &Attrs,
    ) -> Result<Vec<Route>, RibError> {
        let address = self.decode_address(address)?;
        let wildcard = self.decode_address(wildcard)?;
        let mut out = Vec::new();
        self.root
            .collect_wildcard(0, address, wildcard, self.family.width(), filter, &mut out);
        route::sort_by_prefix(&mut out);
        Ok(out)
    }

    fn delete(&mut self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let removed = self.root.remove_at(&decoded, 0, filter)?;
        self.count -= removed.len();
        debug!("removed {} route(s) for {}", removed.len(), decoded.text());
        Ok(removed)
    }

    fn flush(&mut self, filter: &Attrs) -> usize {
        let removed = if filter.is_empty() {
            self.root = Node::new(0, 0);
            std::mem::take(&mut self.count)
        } else {
            let removed = self.root.flush_node(filter);
            self.count -= removed;
            removed
        };
        debug!("flushed {removed} route(s) from the {} table", self.family);
        removed
    }

    fn flush_subtree(&mut self, prefix: &str, filter: &Attrs) -> Result<usize, RibError> {
        let decoded = self.decode(prefix)?;
        let removed = self.root.flush_at(&decoded, 0, filter);
        self.count -= removed;
        Ok(removed)
    }

    fn routes(&self) -> Vec<Route> {
        let mut out = Vec::new();
        self.root.collect(&Attrs::new(), &mut out);
        route::sort_most_specific(&mut out);
        out
    }
}

impl<'a> IntoIterator for &'a IpRadixTree {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes().into_iter()
    }
}

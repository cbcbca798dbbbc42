//! Implementation of the binary prefix tree.

use log::{debug, trace};

use crate::{
    addr::{self, Decoded},
    bits,
    error::RibError,
    route::{self, Route},
    Attrs, Family, RoutingTable,
};

/// One node per prefix bit. A node is kept in the tree iff it carries routes
/// or some descendant does.
#[derive(Clone, Default)]
pub(crate) struct Node {
    pub(crate) routes: Vec<Route>,
    pub(crate) children: [Option<Box<Node>>; 2],
}

impl Node {
    fn child(&self, right: bool) -> Option<&Node> {
        self.children[right as usize].as_deref()
    }

    fn is_dead(&self) -> bool {
        self.routes.is_empty() && self.children.iter().all(Option::is_none)
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
        route::collect_filtered(out, &self.routes, filter);
        if depth == width {
            return;
        }
        for slot in [false, true] {
            if bits::bit_at(wildcard, depth) || bits::bit_at(address, depth) == slot {
                if let Some(child) = self.child(slot) {
                    child.collect_wildcard(depth + 1, address, wildcard, width, filter, out);
                }
            }
        }
    }

    /// Remove routes at the node `decoded` points to, pruning emptied nodes
    /// on the way back up.
    fn remove_at(
        &mut self,
        decoded: &Decoded,
        depth: u8,
        filter: &Attrs,
    ) -> Result<Vec<Route>, RibError> {
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
            Ok(removed)
        } else {
            let slot = bits::bit_at(decoded.bits, depth) as usize;
            let child = self.children[slot]
                .as_mut()
                .ok_or_else(|| RibError::UnknownPrefix(decoded.text()))?;
            let removed = child.remove_at(decoded, depth + 1, filter)?;
            if child.is_dead() {
                self.children[slot] = None;
            }
            Ok(removed)
        }
    }

    /// Drop every route matching `filter` at or below this node and prune
    /// emptied subtrees. Returns the number of removed routes.
    fn flush_node(&mut self, filter: &Attrs) -> usize {
        let before = self.routes.len();
        self.routes.retain(|r| !r.attrs().contains_all(filter));
        let mut removed = before - self.routes.len();
        for slot in 0..2 {
            if let Some(child) = self.children[slot].as_mut() {
                removed += child.flush_node(filter);
                if child.is_dead() {
                    self.children[slot] = None;
                }
            }
        }
        removed
    }

    fn flush_at(&mut self, decoded: &Decoded, depth: u8, filter: &Attrs) -> usize {
        if depth == decoded.len {
            return self.flush_node(filter);
        }
        let slot = bits::bit_at(decoded.bits, depth) as usize;
        let Some(child) = self.children[slot].as_mut() else {
            return 0;
        };
        let removed = child.flush_at(decoded, depth + 1, filter);
        if child.is_dead() {
            self.children[slot] = None;
        }
        removed
    }
}

/// An IP routing table backed by a full binary trie.
#[derive(Clone)]
pub struct IpPrefixTree {
    pub(crate) family: Family,
    pub(crate) root: Node,
    count: usize,
}

impl Default for IpPrefixTree {
    fn default() -> Self {
        Self::new(Family::Ipv4)
    }
}

impl IpPrefixTree {
    /// Decode `text` and check it against the table's family.
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

    /// The node at exactly `decoded`, if the path to it exists.
    fn locate(&self, decoded: &Decoded) -> Option<&Node> {
        let mut node = &self.root;
        for i in 0..decoded.len {
            node = node.child(bits::bit_at(decoded.bits, i))?;
        }
        Some(node)
    }
}

impl RoutingTable for IpPrefixTree {
    fn new(family: Family) -> Self {
        Self {
            family,
            root: Node::default(),
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
        let mut node = &mut self.root;
        for i in 0..decoded.len {
            let slot = bits::bit_at(decoded.bits, i) as usize;
            node = &mut **node.children[slot].get_or_insert_with(Box::default);
        }
        let route = Route::from_decoded(&decoded, attrs);
        trace!("installed {route} in the {} table", self.family);
        node.routes.push(route.clone());
        self.count += 1;
        Ok(route)
    }

    fn get(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut node = &self.root;
        let mut best: Option<&[Route]> = (!node.routes.is_empty()).then_some(node.routes.as_slice());
        for i in 0..decoded.len {
            match node.child(bits::bit_at(decoded.bits, i)) {
                Some(child) => {
                    node = child;
                    if !node.routes.is_empty() {
                        best = Some(node.routes.as_slice());
                    }
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
            Some(node) => route::filtered(&node.routes, filter),
            None => Vec::new(),
        })
    }

    fn show_subtree(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut out = Vec::new();
        if let Some(node) = self.locate(&decoded) {
            node.collect(filter, &mut out);
        }
        route::sort_by_prefix(&mut out);
        Ok(out)
    }

    fn parent(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut node = &self.root;
        let mut ancestor: Option<&[Route]> = None;
        for i in 0..decoded.len {
            if !node.routes.is_empty() {
                ancestor = Some(node.routes.as_slice());
            }
            match node.child(bits::bit_at(decoded.bits, i)) {
                Some(child) => node = child,
                None => return Ok(Vec::new()),
            }
        }
        if node.routes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(route::filtered(ancestor.unwrap_or(&[]), filter))
    }

    fn children(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError> {
        let decoded = self.decode(prefix)?;
        let mut out = Vec::new();
        if let Some(node) = self.locate(&decoded) {
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
        route::collect_filtered(&mut out, &node.routes, filter);
        for i in 0..decoded.len {
            match node.child(bits::bit_at(decoded.bits, i)) {
                Some(child) => {
                    node = child;
                    route::collect_filtered(&mut out, &node.routes, filter);
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
            self.root = Node::default();
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

impl<'a> IntoIterator for &'a IpPrefixTree {
    type Item = Route;
    type IntoIter = std::vec::IntoIter<Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes().into_iter()
    }
}

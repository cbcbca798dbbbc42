//! This crate provides an in-memory IP routing table (RIB). Prefixes of one
//! address family are stored together with attribute-bearing [`Route`]
//! records, and the table answers prefix-based queries: longest-match lookup,
//! exact match, subtree enumeration, ancestor/descendant queries,
//! wildcard-mask matching, and attribute-filtered deletion.
//!
//! # Description of the Trees
//!
//! Two interchangeable tree structures implement the [`RoutingTable`] trait:
//!
//! - [`IpPrefixTree`]: a full binary trie where every edge represents one bit
//!   of the prefix. Simple and fast, at the cost of one node per prefix bit.
//! - [`IpRadixTree`]: a path-compressed PATRICIA trie (radix 2). Chains of
//!   single-child nodes are collapsed into a *skip label* (a bit string plus
//!   its length); a node's children diverge at the bit following the label.
//!   Inserting may *split* a node whose label diverges from the new prefix,
//!   and deleting *collapses* routeless single-child nodes back into their
//!   child.
//!
//! Fed the same operations, both trees return identical results; the radix
//! tree just spends less memory on deep, sparse prefix sets.
//!
//! # Operations on the table
//!
//! A table is bound to one address family at construction. All prefix
//! arguments are plain text: CIDR (`"192.168.1.0/24"`, `"2a01:db8::/32"`) or
//! bare addresses, which are treated as host prefixes. Host bits are masked
//! away, so adding `192.168.1.5/24` installs `192.168.1.0/24`.
//!
//! ```
//! use ip_rib::{attrs, Family, IpPrefixTree, RoutingTable};
//!
//! let mut rib = IpPrefixTree::new(Family::Ipv4);
//! rib.add("192.168.1.0/24", attrs! { via = "10.0.0.1" })?;
//! rib.add("192.168.1.0/25", attrs! {})?;
//!
//! // longest match wins
//! let found = rib.get("192.168.1.1", &attrs! {})?;
//! assert_eq!(found[0].prefix(), "192.168.1.0/25");
//! let found = rib.get("192.168.1.128", &attrs! {})?;
//! assert_eq!(found[0].prefix(), "192.168.1.0/24");
//! # Ok::<(), ip_rib::RibError>(())
//! ```
//!
//! One prefix may hold several routes; queries take an attribute filter that
//! restricts the result to routes carrying all of the given attributes.

mod addr;
mod bits;
mod error;
mod fmt;
mod prefix_tree;
mod radix_tree;
mod route;
#[cfg(feature = "serde")]
mod serde;

#[cfg(test)]
mod fuzzing;

pub use error::RibError;
pub use prefix_tree::IpPrefixTree;
pub use radix_tree::IpRadixTree;
pub use route::{Attrs, Route, Value};

use std::fmt::Display;

/// The address family a table is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Family {
    /// IPv4, 32-bit prefixes.
    Ipv4,
    /// IPv6, 128-bit prefixes.
    Ipv6,
}

impl Family {
    /// The prefix bit-width of the family.
    pub fn width(self) -> u8 {
        match self {
            Family::Ipv4 => 32,
            Family::Ipv6 => 128,
        }
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Ipv4 => f.write_str("IPv4"),
            Family::Ipv6 => f.write_str("IPv6"),
        }
    }
}

/// The operations shared by both tree implementations.
///
/// All prefix-taking methods accept CIDR text or bare addresses of the
/// table's family; parsing failures surface as [`RibError::InvalidPrefix`]
/// and prefixes of the other family as [`RibError::FamilyMismatch`]. Queries
/// hand out owned [`Route`] copies; the lists of the named query methods are
/// sorted by network address, then prefix length, then insertion order.
pub trait RoutingTable {
    /// Create an empty table bound to `family`.
    fn new(family: Family) -> Self
    where
        Self: Sized;

    /// The family this table is bound to.
    fn family(&self) -> Family;

    /// Number of installed routes.
    fn len(&self) -> usize;

    /// Returns `true` if no routes are installed.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Install a route at `prefix` and return a copy of it.
    ///
    /// Adding never overwrites: the same prefix can hold any number of
    /// routes, including routes with identical attributes.
    fn add(&mut self, prefix: &str, attrs: Attrs) -> Result<Route, RibError>;

    /// Longest-prefix match.
    ///
    /// Walks towards `prefix` (a bare address is looked up as a host prefix)
    /// and returns the routes of the deepest route-bearing node on the walk,
    /// filtered by `filter`; the empty list if nothing matches.
    fn get(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError>;

    /// All installed routes passing `filter`, sorted.
    fn show(&self, filter: &Attrs) -> Vec<Route>;

    /// The routes attached exactly at `prefix` (no longest-match), filtered.
    /// Returns the empty list if the prefix is not installed.
    fn show_exact(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError>;

    /// All routes at or below `prefix`, filtered and sorted.
    fn show_subtree(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError>;

    /// The routes of the closest strict ancestor of `prefix` that carries
    /// routes. Returns the empty list if `prefix` itself carries no routes or
    /// no such ancestor exists.
    fn parent(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError>;

    /// The routes of every strict descendant of `prefix`, filtered and
    /// sorted; `prefix`'s own routes are excluded.
    fn children(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError>;

    /// Every route whose prefix equals or properly contains `prefix`,
    /// filtered and sorted.
    ///
    /// ```
    /// use ip_rib::{attrs, Family, IpRadixTree, RoutingTable};
    ///
    /// let mut rib = IpRadixTree::new(Family::Ipv4);
    /// rib.add("10.0.0.0/8", attrs! {})?;
    /// rib.add("10.1.0.0/16", attrs! {})?;
    /// rib.add("10.2.0.0/16", attrs! {})?;
    /// let covering = rib.cover("10.1.1.0/24", &attrs! {})?;
    /// let prefixes: Vec<&str> = covering.iter().map(|r| r.prefix()).collect();
    /// assert_eq!(prefixes, ["10.0.0.0/8", "10.1.0.0/16"]);
    /// # Ok::<(), ip_rib::RibError>(())
    /// ```
    fn cover(&self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError>;

    /// Wildcard-mask match: collect the routes of every node reachable from
    /// the root when a set bit of `wildcard` allows both child branches and a
    /// clear bit follows the corresponding bit of `address`. The mask is a
    /// plain bit vector of the family width; set bits need not be contiguous.
    fn wildcard_match(
        &self,
        address: &str,
        wildcard: &str,
        filter: &Attrs,
    ) -> Result<Vec<Route>, RibError>;

    /// Remove routes attached exactly at `prefix` and return them.
    ///
    /// With an empty `filter` every route at the node is removed; otherwise
    /// only those carrying all filter attributes ([`RibError::NoMatchingRoute`]
    /// if none do). Fails with [`RibError::UnknownPrefix`] if the prefix is
    /// not installed. Emptied nodes are pruned from the tree.
    fn delete(&mut self, prefix: &str, filter: &Attrs) -> Result<Vec<Route>, RibError>;

    /// Remove every route passing `filter` anywhere in the table and return
    /// how many were removed. An empty `filter` clears the table.
    fn flush(&mut self, filter: &Attrs) -> usize;

    /// Like [`RoutingTable::flush`], restricted to the subtree rooted at
    /// `prefix` (inclusive). A prefix with no installed subtree is a no-op.
    fn flush_subtree(&mut self, prefix: &str, filter: &Attrs) -> Result<usize, RibError>;

    /// All installed routes, most specific first (descending prefix length,
    /// insertion order within one length).
    fn routes(&self) -> Vec<Route>;

    /// Returns `true` iff a longest-match lookup for `address` finds a route.
    fn contains(&self, address: &str) -> Result<bool, RibError> {
        Ok(!self.get(address, &Attrs::new())?.is_empty())
    }
}

//! Route records and their attribute maps.

use std::cmp::Reverse;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use itertools::Itertools;

use crate::{
    addr::{self, Decoded},
    error::RibError,
    Family,
};

/// The attribute name reserved for the route's own prefix.
const PREFIX_ATTR: &str = "prefix";

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Free-form text, e.g. a next-hop or an interface name.
    Str(String),
    /// A number, e.g. a metric.
    Int(i64),
    /// A flag.
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => s.fmt(f),
            Value::Int(i) => i.fmt(f),
            Value::Bool(b) => b.fmt(f),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// An insertion-ordered `name -> value` attribute map.
///
/// Used both for the attributes stored on a [`Route`] and as the filter
/// argument of the query operations. An empty map used as a filter matches
/// every route.
///
/// ```
/// use ip_rib::{attrs, Value};
///
/// let a = attrs! { via = "10.0.0.1", metric = 20 };
/// assert_eq!(a.get("via"), Some(&Value::Str("10.0.0.1".to_string())));
/// assert_eq!(a.get("metric"), Some(&Value::Int(20)));
/// assert!(a.contains_all(&attrs! { via = "10.0.0.1" }));
/// assert!(!a.contains_all(&attrs! { via = "10.0.0.2" }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attrs {
    pairs: Vec<(String, Value)>,
}

impl Attrs {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if the map holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Add an attribute, or replace it in place if the name already exists.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.pairs.push((name.to_string(), value)),
        }
    }

    /// Builder-style [`Attrs::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Remove an attribute, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let i = self.pairs.iter().position(|(k, _)| k == name)?;
        Some(self.pairs.remove(i).1)
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if every pair of `other` is present in `self` with an
    /// equal value. Extra attributes in `self` are irrelevant; an empty
    /// `other` always matches.
    pub fn contains_all(&self, other: &Attrs) -> bool {
        other.iter().all(|(k, v)| self.get(k) == Some(v))
    }
}

impl fmt::Display for Attrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iter().map(|(k, v)| format!("{k}={v}")).join(", "))
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Attrs {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut attrs = Attrs::new();
        for (k, v) in iter {
            attrs.set(&k.into(), v);
        }
        attrs
    }
}

/// Build an [`Attrs`] map from `name = value` pairs.
///
/// ```
/// use ip_rib::attrs;
///
/// let a = attrs! { via = "10.0.0.1", dev = "eth0" };
/// assert_eq!(a.len(), 2);
/// assert!(attrs! {}.is_empty());
/// ```
#[macro_export]
macro_rules! attrs {
    ($($name:ident = $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut attrs = $crate::Attrs::new();
        $(attrs.set(stringify!($name), $value);)*
        attrs
    }};
}

/// A route record: an immutable prefix plus free-form attributes.
///
/// Routes are created by [`RoutingTable::add`](crate::RoutingTable::add) (or
/// [`Route::new`]) and handed out by queries as owned copies. Equality is
/// identity, not structure: copies of one stored route compare equal, while
/// two routes built from identical inputs do not.
///
/// ```
/// use ip_rib::{attrs, Route};
///
/// let route = Route::new("8.8.8.8/32", attrs! { via = "192.168.1.1" })?;
/// assert_eq!(route.to_string(), "Route(prefix=8.8.8.8/32, via=192.168.1.1)");
/// assert_eq!(route.prefix(), "8.8.8.8/32");
/// # Ok::<(), ip_rib::RibError>(())
/// ```
#[derive(Clone)]
pub struct Route {
    id: u64,
    prefix: String,
    pub(crate) family: Family,
    pub(crate) bits: u128,
    pub(crate) len: u8,
    attrs: Attrs,
}

impl Route {
    /// Create a detached route. The prefix is canonicalized (host bits
    /// masked, bare addresses become host prefixes) and fixed from then on.
    pub fn new(prefix: &str, attrs: Attrs) -> Result<Self, RibError> {
        Ok(Self::from_decoded(&addr::decode(prefix)?, attrs))
    }

    pub(crate) fn from_decoded(decoded: &Decoded, attrs: Attrs) -> Self {
        Self {
            id: NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed),
            prefix: decoded.text(),
            family: decoded.family,
            bits: decoded.bits,
            len: decoded.len,
            attrs,
        }
    }

    /// The canonical prefix text, e.g. `192.168.1.0/24`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// The address family of the prefix.
    pub fn family(&self) -> Family {
        self.family
    }

    /// The route's attributes.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Look up a single attribute.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Add or replace an attribute. Writing `prefix` fails with
    /// [`RibError::ImmutableAttribute`].
    pub fn set_attr(&mut self, name: &str, value: impl Into<Value>) -> Result<(), RibError> {
        if name == PREFIX_ATTR {
            return Err(RibError::ImmutableAttribute);
        }
        self.attrs.set(name, value);
        Ok(())
    }

    /// Remove an attribute, returning its value. Removing `prefix` fails with
    /// [`RibError::ImmutableAttribute`].
    pub fn remove_attr(&mut self, name: &str) -> Result<Option<Value>, RibError> {
        if name == PREFIX_ATTR {
            return Err(RibError::ImmutableAttribute);
        }
        Ok(self.attrs.remove(name))
    }

    /// The route as ordered `(name, value)` pairs, with the prefix first.
    pub fn pairs(&self) -> Vec<(String, Value)> {
        let mut pairs = vec![(PREFIX_ATTR.to_string(), Value::Str(self.prefix.clone()))];
        pairs.extend(self.attrs.iter().map(|(k, v)| (k.to_string(), v.clone())));
        pairs
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Route {}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route(prefix={}", self.prefix)?;
        for (name, value) in self.attrs.iter() {
            write!(f, ", {name}={value}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Sort for query results: network bits, then prefix length, then insertion
/// order.
pub(crate) fn sort_by_prefix(routes: &mut [Route]) {
    routes.sort_by_key(|r| (r.bits, r.len, r.id));
}

/// Sort for iteration: most specific first, then insertion order.
pub(crate) fn sort_most_specific(routes: &mut [Route]) {
    routes.sort_by_key(|r| (Reverse(r.len), r.id));
}

/// Copies of the routes in `src` whose attributes satisfy `filter`.
pub(crate) fn filtered(src: &[Route], filter: &Attrs) -> Vec<Route> {
    src.iter()
        .filter(|r| r.attrs.contains_all(filter))
        .cloned()
        .collect()
}

/// Append filtered copies of `src` to `out`.
pub(crate) fn collect_filtered(out: &mut Vec<Route>, src: &[Route], filter: &Attrs) {
    out.extend(src.iter().filter(|r| r.attrs.contains_all(filter)).cloned());
}

//! Serialization and Deserialization implementation.
//!
//! A [`Route`] serializes as its mapping form (`prefix` first, then the
//! attributes in insertion order); a tree serializes as its family plus the
//! sorted route list and is rebuilt by re-inserting on deserialization.

use ::serde::de::{self, MapAccess, Visitor};
use ::serde::ser::SerializeMap;
use ::serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Attrs, Family, IpPrefixTree, IpRadixTree, Route, RoutingTable, Value};

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValueVisitor;

        impl Visitor<'_> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a string, an integer, or a boolean")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
                Ok(Value::Str(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
                Ok(Value::Str(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
                Ok(Value::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
                i64::try_from(v)
                    .map(Value::Int)
                    .map_err(|_| E::custom("integer attribute out of range"))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
                Ok(Value::Bool(v))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

impl Serialize for Attrs {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Attrs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AttrsVisitor;

        impl<'de> Visitor<'de> for AttrsVisitor {
            type Value = Attrs;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an attribute map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Attrs, A::Error> {
                let mut attrs = Attrs::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    attrs.set(&name, value);
                }
                Ok(attrs)
            }
        }

        deserializer.deserialize_map(AttrsVisitor)
    }
}

impl Serialize for Route {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.attrs().len() + 1))?;
        for (name, value) in self.pairs() {
            map.serialize_entry(&name, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Route {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RouteVisitor;

        impl<'de> Visitor<'de> for RouteVisitor {
            type Value = Route;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a route map with a prefix entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Route, A::Error> {
                let mut prefix: Option<String> = None;
                let mut attrs = Attrs::new();
                while let Some(name) = access.next_key::<String>()? {
                    if name == "prefix" {
                        prefix = Some(access.next_value()?);
                    } else {
                        attrs.set(&name, access.next_value::<Value>()?);
                    }
                }
                let prefix = prefix.ok_or_else(|| de::Error::missing_field("prefix"))?;
                Route::new(&prefix, attrs).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_map(RouteVisitor)
    }
}

impl Serialize for IpPrefixTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (self.family(), self.show(&Attrs::new())).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IpPrefixTree {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (family, routes) = <(Family, Vec<Route>)>::deserialize(deserializer)?;
        rebuild(family, routes).map_err(de::Error::custom)
    }
}

impl Serialize for IpRadixTree {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (self.family(), self.show(&Attrs::new())).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IpRadixTree {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (family, routes) = <(Family, Vec<Route>)>::deserialize(deserializer)?;
        rebuild(family, routes).map_err(de::Error::custom)
    }
}

fn rebuild<T: RoutingTable>(family: Family, routes: Vec<Route>) -> Result<T, crate::RibError> {
    let mut table = T::new(family);
    for route in routes {
        table.add(route.prefix(), route.attrs().clone())?;
    }
    Ok(table)
}

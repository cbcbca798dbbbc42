//! Textual prefix codec built on top of [`ipnet`].
//!
//! Every prefix-taking operation funnels through [`decode`], which accepts
//! CIDR text of either family as well as bare addresses (treated as host
//! prefixes), masks the host bits, and normalizes the network bits into a
//! left-aligned `u128` word.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use crate::{error::RibError, Family};

/// A parsed and canonicalized prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Decoded {
    pub(crate) family: Family,
    /// Network bits, left-aligned and masked to `len`.
    pub(crate) bits: u128,
    pub(crate) len: u8,
}

impl Decoded {
    /// Canonical text: the masked network address followed by `/len`.
    pub(crate) fn text(&self) -> String {
        format(self.family, self.bits, self.len)
    }
}

/// Parse CIDR text or a bare address. Bare addresses decode as host prefixes
/// (`/32` and `/128` respectively). Host bits are masked away.
pub(crate) fn decode(text: &str) -> Result<Decoded, RibError> {
    let invalid = || RibError::InvalidPrefix(text.to_string());
    let net: IpNet = if text.contains('/') {
        text.parse().map_err(|_| invalid())?
    } else {
        IpNet::from(text.parse::<IpAddr>().map_err(|_| invalid())?)
    };
    Ok(match net.trunc() {
        IpNet::V4(n) => Decoded {
            family: Family::Ipv4,
            bits: (u32::from(n.network()) as u128) << 96,
            len: n.prefix_len(),
        },
        IpNet::V6(n) => Decoded {
            family: Family::Ipv6,
            bits: u128::from(n.network()),
            len: n.prefix_len(),
        },
    })
}

/// Parse a bare address (no `/len`), as used for wildcard queries, into its
/// family and left-aligned bits.
pub(crate) fn decode_address(text: &str) -> Result<(Family, u128), RibError> {
    match text.parse::<IpAddr>() {
        Ok(IpAddr::V4(a)) => Ok((Family::Ipv4, (u32::from(a) as u128) << 96)),
        Ok(IpAddr::V6(a)) => Ok((Family::Ipv6, u128::from(a))),
        Err(_) => Err(RibError::InvalidPrefix(text.to_string())),
    }
}

/// Render left-aligned network bits back into canonical CIDR text.
pub(crate) fn format(family: Family, bits: u128, len: u8) -> String {
    match family {
        Family::Ipv4 => Ipv4Net::new(Ipv4Addr::from((bits >> 96) as u32), len)
            .unwrap()
            .to_string(),
        Family::Ipv6 => Ipv6Net::new(Ipv6Addr::from(bits), len).unwrap().to_string(),
    }
}

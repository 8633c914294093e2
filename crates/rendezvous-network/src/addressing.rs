//! Deterministic IPv4 addressing.
//!
//! Every instance derives its address from its global sequence number alone,
//! so no instance ever has to negotiate an address and any instance can
//! compute a peer's address from the peer's sequence number.
//!
//! The host part is `global_seq + HOST_OFFSET`. The offset keeps the first
//! 256 host addresses of the subnet free for gateways and infrastructure.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::InvalidSubnetSnafu;
use crate::error::NetworkError;

/// Host addresses reserved at the bottom of every subnet.
pub const HOST_OFFSET: u32 = 256;

/// An IPv4 subnet in CIDR form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet {
    base: Ipv4Addr,
    prefix_len: u8,
}

impl Subnet {
    /// Subnet from a base address and prefix length.
    ///
    /// Host bits set in `base` are cleared.
    pub fn new(base: Ipv4Addr, prefix_len: u8) -> Result<Self, NetworkError> {
        if prefix_len > 32 {
            return InvalidSubnetSnafu {
                input: format!("{base}/{prefix_len}"),
                reason: "prefix length exceeds 32",
            }
            .fail();
        }
        let netmask = netmask_bits(prefix_len);
        Ok(Self {
            base: Ipv4Addr::from(u32::from(base) & netmask),
            prefix_len,
        })
    }

    /// Network address.
    pub fn base(&self) -> Ipv4Addr {
        self.base
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Network mask as an integer.
    pub fn netmask(&self) -> u32 {
        netmask_bits(self.prefix_len)
    }

    /// Host mask as an integer.
    pub fn hostmask(&self) -> u32 {
        !self.netmask()
    }

    /// Number of global sequence numbers, counting from 0, that map to
    /// distinct addresses below the broadcast address.
    pub fn capacity(&self) -> u64 {
        let host_space = u64::from(self.hostmask()) + 1;
        host_space.saturating_sub(u64::from(HOST_OFFSET) + 1)
    }

    /// True if every global sequence number up to `max_global_seq` gets a
    /// distinct address.
    pub fn can_address(&self, max_global_seq: u32) -> bool {
        u64::from(max_global_seq) < self.capacity()
    }

    /// True if `addr` is inside this subnet.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.netmask() == u32::from(self.base)
    }
}

impl Default for Subnet {
    /// `10.42.0.0/16`.
    fn default() -> Self {
        Self {
            base: Ipv4Addr::new(10, 42, 0, 0),
            prefix_len: 16,
        }
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.prefix_len)
    }
}

impl FromStr for Subnet {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s.trim().split_once('/').ok_or_else(|| {
            InvalidSubnetSnafu {
                input: s,
                reason: "expected <address>/<prefix length>",
            }
            .build()
        })?;
        let base: Ipv4Addr = addr.parse().map_err(|_| {
            InvalidSubnetSnafu {
                input: s,
                reason: format!("'{addr}' is not an IPv4 address"),
            }
            .build()
        })?;
        let prefix_len: u8 = len.parse().map_err(|_| {
            InvalidSubnetSnafu {
                input: s,
                reason: format!("'{len}' is not a prefix length"),
            }
            .build()
        })?;
        Subnet::new(base, prefix_len)
    }
}

impl TryFrom<String> for Subnet {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subnet> for String {
    fn from(subnet: Subnet) -> Self {
        subnet.to_string()
    }
}

/// Address of the instance with `global_seq` in `subnet`.
///
/// Pure and total. Distinct sequence numbers below
/// [`Subnet::capacity`] always get distinct addresses.
pub fn assign_address(subnet: &Subnet, global_seq: u32) -> Ipv4Addr {
    let host = global_seq.wrapping_add(HOST_OFFSET) & subnet.hostmask();
    Ipv4Addr::from(u32::from(subnet.base) | host)
}

fn netmask_bits(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        len => u32::MAX << (32 - u32::from(len.min(32))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_address_packs_low_octets() {
        let subnet: Subnet = "10.42.0.0/16".parse().unwrap();
        assert_eq!(assign_address(&subnet, 1), Ipv4Addr::new(10, 42, 1, 1));
        assert_eq!(assign_address(&subnet, 4), Ipv4Addr::new(10, 42, 1, 4));
        assert_eq!(assign_address(&subnet, 300), Ipv4Addr::new(10, 42, 2, 44));
    }

    #[test]
    fn test_parse_clears_host_bits() {
        let subnet: Subnet = "192.168.7.9/16".parse().unwrap();
        assert_eq!(subnet.base(), Ipv4Addr::new(192, 168, 0, 0));
        assert_eq!(subnet.to_string(), "192.168.0.0/16");
    }

    #[test]
    fn test_parse_errors() {
        assert!("10.0.0.0".parse::<Subnet>().is_err());
        assert!("10.0.0/8".parse::<Subnet>().is_err());
        assert!("10.0.0.0/33".parse::<Subnet>().is_err());
        assert!("10.0.0.0/x".parse::<Subnet>().is_err());
    }

    #[test]
    fn test_capacity() {
        let slash16: Subnet = "10.0.0.0/16".parse().unwrap();
        assert_eq!(slash16.capacity(), 65_536 - 257);
        assert!(slash16.can_address(1_000));

        // A /24 has no room past the reserved block.
        let slash24: Subnet = "10.0.0.0/24".parse().unwrap();
        assert_eq!(slash24.capacity(), 0);
        assert!(!slash24.can_address(1));

        let slash0 = Subnet::new(Ipv4Addr::UNSPECIFIED, 0).unwrap();
        assert_eq!(slash0.capacity(), (1u64 << 32) - 257);
    }

    #[test]
    fn test_assigned_addresses_stay_in_subnet() {
        let subnet: Subnet = "172.16.0.0/20".parse().unwrap();
        for seq in 0..subnet.capacity() as u32 {
            assert!(subnet.contains(assign_address(&subnet, seq)));
        }
    }

    #[test]
    fn test_serde_as_string() {
        let subnet: Subnet = "10.1.0.0/16".parse().unwrap();
        let json = serde_json::to_string(&subnet).unwrap();
        assert_eq!(json, "\"10.1.0.0/16\"");
        assert_eq!(serde_json::from_str::<Subnet>(&json).unwrap(), subnet);
        assert!(serde_json::from_str::<Subnet>("\"nope\"").is_err());
    }
}

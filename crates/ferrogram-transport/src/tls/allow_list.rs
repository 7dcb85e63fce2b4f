//! IPv4 allow-list applied before any byte of a connection is read.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use thiserror::Error;

/// An allow-list entry that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid allow-list entry `{0}` (expected `a.b.c.d` or `a.b.c.d/n`)")]
pub struct AllowEntryError(pub String);

/// An IPv4 network in CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix: u8,
}

impl Subnet {
    /// Builds a subnet; host bits of `network` are cleared.
    pub fn new(network: Ipv4Addr, prefix: u8) -> Option<Self> {
        (prefix <= 32).then(|| Self {
            network: Ipv4Addr::from(u32::from(network) & Self::mask(prefix)),
            prefix,
        })
    }

    fn mask(prefix: u8) -> u32 {
        match prefix {
            0 => 0,
            p => u32::MAX << (32 - u32::from(p)),
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & Self::mask(self.prefix) == u32::from(self.network)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// One allowed host or subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllowEntry {
    Host(Ipv4Addr),
    Subnet(Subnet),
}

impl AllowEntry {
    pub fn permits(&self, addr: Ipv4Addr) -> bool {
        match self {
            Self::Host(host) => *host == addr,
            Self::Subnet(subnet) => subnet.contains(addr),
        }
    }
}

impl FromStr for AllowEntry {
    type Err = AllowEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || AllowEntryError(s.to_string());
        match s.split_once('/') {
            None => s.parse().map(Self::Host).map_err(|_| invalid()),
            Some((addr, prefix)) => {
                let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
                let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
                Subnet::new(addr, prefix).map(Self::Subnet).ok_or_else(invalid)
            }
        }
    }
}

impl fmt::Display for AllowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(host) => fmt::Display::fmt(host, f),
            Self::Subnet(subnet) => fmt::Display::fmt(subnet, f),
        }
    }
}

/// Hosts and subnets allowed to connect. Empty means everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<AllowEntry>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses every entry, failing on the first invalid one.
    pub fn parse<I, S>(entries: I) -> Result<Self, AllowEntryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entries
            .into_iter()
            .map(|entry| entry.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()
            .map(|entries| Self { entries })
    }

    pub fn push(&mut self, entry: AllowEntry) {
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    pub fn extend(&mut self, other: &AllowList) {
        for entry in &other.entries {
            self.push(*entry);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AllowEntry] {
        &self.entries
    }

    /// Returns true if `peer` may connect.
    ///
    /// IPv4-mapped IPv6 peers are checked by their IPv4 address; other IPv6
    /// peers are only admitted by an empty list.
    pub fn permits(&self, peer: IpAddr) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        let v4 = match peer {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => v4,
                None => return false,
            },
        };
        self.entries.iter().any(|entry| entry.permits(v4))
    }
}

impl FromIterator<AllowEntry> for AllowList {
    fn from_iter<I: IntoIterator<Item = AllowEntry>>(iter: I) -> Self {
        let mut list = Self::new();
        for entry in iter {
            list.push(entry);
        }
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_subnet_membership() {
        let list = AllowList::parse(["10.0.0.0/8"]).unwrap();
        assert!(list.permits(ip("10.0.0.5")));

        let list = AllowList::parse(["192.168.0.0/16"]).unwrap();
        assert!(!list.permits(ip("10.0.0.5")));
    }

    #[test]
    fn test_empty_list_accepts_everyone() {
        let list = AllowList::new();
        assert!(list.permits(ip("10.0.0.5")));
        assert!(list.permits(ip("2001:db8::1")));
    }

    #[test]
    fn test_host_entry_is_exact() {
        let list = AllowList::parse(["91.108.4.7"]).unwrap();
        assert!(list.permits(ip("91.108.4.7")));
        assert!(!list.permits(ip("91.108.4.8")));
    }

    #[test]
    fn test_ipv4_mapped_peer_uses_its_ipv4_address() {
        let list = AllowList::parse(["149.154.160.0/20"]).unwrap();
        let mapped = IpAddr::V6(Ipv4Addr::new(149, 154, 167, 99).to_ipv6_mapped());
        assert!(list.permits(mapped));
        assert!(!list.permits(IpAddr::V6(Ipv6Addr::LOCALHOST)));
    }

    #[test]
    fn test_network_host_bits_are_cleared() {
        let entry: AllowEntry = "149.154.167.1/20".parse().unwrap();
        assert_eq!(entry.to_string(), "149.154.160.0/20");
        assert!(entry.permits(Ipv4Addr::new(149, 154, 175, 255)));
        assert!(!entry.permits(Ipv4Addr::new(149, 154, 176, 0)));
    }

    #[test]
    fn test_prefix_zero_and_thirty_two() {
        let any: AllowEntry = "0.0.0.0/0".parse().unwrap();
        assert!(any.permits(Ipv4Addr::new(8, 8, 8, 8)));
        let one: AllowEntry = "1.2.3.4/32".parse().unwrap();
        assert!(one.permits(Ipv4Addr::new(1, 2, 3, 4)));
        assert!(!one.permits(Ipv4Addr::new(1, 2, 3, 5)));
    }

    #[test]
    fn test_invalid_entries() {
        for bad in ["", "10.0.0.0/33", "10.0.0/8", "example.org", "::1", "1.2.3.4/x"] {
            assert!(bad.parse::<AllowEntry>().is_err(), "{bad}");
        }
        assert_eq!(
            AllowList::parse(["10.0.0.0/8", "nope"]).unwrap_err(),
            AllowEntryError("nope".into())
        );
    }

    #[test]
    fn test_duplicates_are_collapsed() {
        let mut list = AllowList::parse(["10.0.0.0/8"]).unwrap();
        list.extend(&AllowList::parse(["10.1.0.0/8", "1.1.1.1"]).unwrap());
        assert_eq!(list.entries().len(), 2);
    }
}

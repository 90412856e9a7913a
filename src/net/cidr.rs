use crate::errors::ScanError;
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Parse CIDR network notation (e.g., "192.168.1.0/24").
/// A bare address is treated as a /32 and host bits are cleared.
pub fn parse_cidr(network: &str) -> Result<Ipv4Network, ScanError> {
    let network = network.trim();
    let parsed = if network.contains('/') {
        Ipv4Network::from_str(network)
            .map_err(|e| ScanError::InvalidNetwork(format!("{}: {}", network, e)))?
    } else {
        let ip = Ipv4Addr::from_str(network)
            .map_err(|e| ScanError::InvalidNetwork(format!("{}: {}", network, e)))?;
        Ipv4Network::new(ip, 32)?
    };
    Ok(Ipv4Network::new(parsed.network(), parsed.prefix())?)
}

/// Number of addresses inside the network, including network and broadcast
pub fn address_count(network: Ipv4Network) -> u64 {
    1u64 << (32 - u32::from(network.prefix()))
}

/// Number of scannable hosts `host_addresses` yields
pub fn host_count(network: Ipv4Network) -> u64 {
    match network.prefix() {
        32 => 1,
        31 => 2,
        _ => address_count(network) - 2,
    }
}

/// Ordered scannable addresses of a network.
///
/// /32 yields the address itself, /31 yields both point-to-point ends, and
/// every other prefix skips the network and directed broadcast addresses.
pub fn host_addresses(network: Ipv4Network) -> impl Iterator<Item = Ipv4Addr> {
    let first = u32::from(network.network());
    let last = u32::from(network.broadcast());
    let (start, end) = match network.prefix() {
        31 | 32 => (first, last),
        _ => (first + 1, last - 1),
    };
    (start..=end).map(Ipv4Addr::from)
}

/// True when the two networks share at least one address
pub fn overlaps(a: Ipv4Network, b: Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

//! Local network oracle: attached IPv4 subnets, our own addresses and the
//! default gateway.

use super::cidr::overlaps;
use super::mac::normalize_mac;
use super::platform::PlatformAdapter;
use crate::errors::ScanError;
use ipnetwork::Ipv4Network;
use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use std::net::Ipv4Addr;
use tracing::{debug, warn};

/// One IPv4 address bound to a local interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInterface {
    pub name: String,
    pub ip: Ipv4Addr,
    pub network: Ipv4Network,
    pub mac: Option<String>,
}

/// Snapshot of the host's interfaces plus its default route
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    interfaces: Vec<LocalInterface>,
    gateway: Option<Ipv4Addr>,
}

impl LocalNetwork {
    pub fn new(interfaces: Vec<LocalInterface>, gateway: Option<Ipv4Addr>) -> Self {
        Self {
            interfaces,
            gateway,
        }
    }

    /// Read interfaces and gateway from the OS. Unavailable data becomes
    /// "unknown" instead of an error.
    pub async fn detect(adapter: &dyn PlatformAdapter) -> Self {
        let interfaces = match list_interfaces() {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "cannot list network interfaces");
                Vec::new()
            }
        };
        let gateway = adapter.default_gateway().await;
        debug!(interfaces = interfaces.len(), gateway = ?gateway, "local network detected");
        Self::new(interfaces, gateway)
    }

    pub fn interfaces(&self) -> &[LocalInterface] {
        &self.interfaces
    }

    pub fn local_networks(&self) -> Vec<Ipv4Network> {
        let mut nets: Vec<Ipv4Network> = self.interfaces.iter().map(|i| i.network).collect();
        nets.dedup();
        nets
    }

    pub fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    /// True iff `target` overlaps any attached subnet
    pub fn is_local_subnet(&self, target: Ipv4Network) -> bool {
        self.interfaces.iter().any(|i| overlaps(i.network, target))
    }

    /// Our own address inside `target`, if any
    pub fn local_ip_in(&self, target: Ipv4Network) -> Option<Ipv4Addr> {
        self.interface_in(target).map(|i| i.ip)
    }

    /// MAC of the interface facing `target`, else of the first interface that has one
    pub fn local_mac_in(&self, target: Ipv4Network) -> Option<String> {
        self.interface_in(target)
            .and_then(|i| i.mac.clone())
            .or_else(|| self.local_mac())
    }

    pub fn local_mac(&self) -> Option<String> {
        self.interfaces.iter().find_map(|i| i.mac.clone())
    }

    fn interface_in(&self, target: Ipv4Network) -> Option<&LocalInterface> {
        self.interfaces.iter().find(|i| target.contains(i.ip))
    }
}

/// Non-loopback IPv4 interfaces with their subnets
pub fn list_interfaces() -> Result<Vec<LocalInterface>, ScanError> {
    let mut out = Vec::new();
    for interface in NetworkInterface::show()? {
        for addr in &interface.addr {
            let Addr::V4(v4) = addr else { continue };
            if v4.ip.is_loopback() || v4.ip.is_unspecified() || v4.ip.is_link_local() {
                continue;
            }
            let prefix = v4
                .netmask
                .map(|mask| u32::from(mask).count_ones() as u8)
                .unwrap_or(24);
            let network = Ipv4Network::new(v4.ip, prefix)
                .and_then(|n| Ipv4Network::new(n.network(), prefix))?;
            out.push(LocalInterface {
                name: interface.name.clone(),
                ip: v4.ip,
                network,
                mac: interface
                    .mac_addr
                    .as_deref()
                    .and_then(normalize_mac)
                    .filter(|m| m != "00:00:00:00:00:00"),
            });
        }
    }
    Ok(out)
}

/// Get the network CIDR for a specific interface name. An unknown name is
/// an input error; failing to list interfaces at all is not.
pub fn network_for_interface(interface_name: &str) -> Result<Ipv4Network, ScanError> {
    interface_network(&list_interfaces()?, interface_name)
}

pub fn interface_network(interfaces: &[LocalInterface], name: &str) -> Result<Ipv4Network, ScanError> {
    interfaces
        .iter()
        .find(|i| i.name == name)
        .map(|i| i.network)
        .ok_or_else(|| {
            ScanError::InvalidNetwork(format!(
                "'{}' is neither a CIDR nor an interface with an IPv4 address",
                name
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn oracle() -> LocalNetwork {
        LocalNetwork::new(
            vec![LocalInterface {
                name: "eth0".into(),
                ip: Ipv4Addr::new(192, 168, 1, 50),
                network: Ipv4Network::from_str("192.168.1.0/24").unwrap(),
                mac: Some("3c:97:0e:00:00:01".into()),
            }],
            Some(Ipv4Addr::new(192, 168, 1, 1)),
        )
    }

    #[test]
    fn local_subnet_overlap() {
        let o = oracle();
        assert!(o.is_local_subnet(Ipv4Network::from_str("192.168.1.0/26").unwrap()));
        assert!(o.is_local_subnet(Ipv4Network::from_str("192.168.0.0/16").unwrap()));
        assert!(!o.is_local_subnet(Ipv4Network::from_str("10.0.0.0/24").unwrap()));
    }

    #[test]
    fn local_ip_only_inside_target() {
        let o = oracle();
        assert_eq!(
            o.local_ip_in(Ipv4Network::from_str("192.168.1.0/24").unwrap()),
            Some(Ipv4Addr::new(192, 168, 1, 50))
        );
        assert_eq!(o.local_ip_in(Ipv4Network::from_str("192.168.1.0/27").unwrap()), None);
        assert_eq!(o.default_gateway(), Some(Ipv4Addr::new(192, 168, 1, 1)));
    }

    #[test]
    fn unknown_interface_is_input_error() {
        let o = oracle();
        assert_eq!(
            interface_network(o.interfaces(), "eth0").unwrap(),
            Ipv4Network::from_str("192.168.1.0/24").unwrap()
        );
        let err = interface_network(o.interfaces(), "eth99").unwrap_err();
        assert!(matches!(err, ScanError::InvalidNetwork(_)));
        assert!(err.is_input_error());
    }
}

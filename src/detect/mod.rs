use crate::model::HostnameSource;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;

// Submodule declarations
pub mod classify;
pub mod hostname;
pub mod http;
pub mod netbios;
pub mod wire;

pub use hostname::{LlmnrProbe, MdnsProbe, NetbiosProbe, ReverseDnsProbe};

/// Hostname probe trait
///
/// Each probe implements one way of asking the network what a host is
/// called (reverse DNS, NetBIOS, LLMNR, mDNS). Probes never fail loudly:
/// a timeout, a refusal or a malformed answer are all "no name".
#[async_trait]
pub trait HostnameProbe: Send + Sync {
    /// Source tag recorded when this probe produces the name
    fn source(&self) -> HostnameSource;

    /// Ask for the name of `ip`, giving up after `wait`
    async fn lookup(&self, ip: Ipv4Addr, wait: Duration) -> Option<String>;
}

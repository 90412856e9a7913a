//! Address generation, local network facts and the low-level probes.

pub mod arp;
pub mod cidr;
pub mod interface;
pub mod mac;
pub mod ping;
pub mod platform;
pub mod tcp;

pub use arp::ArpEntry;
pub use cidr::{host_addresses, host_count, parse_cidr};
pub use interface::{LocalInterface, LocalNetwork};
pub use platform::{PlatformAdapter, SystemAdapter};
pub use tcp::{tcp_connect, ConnectResult, PortState};

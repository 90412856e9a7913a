//! lanwatch - LAN discovery and live host monitoring
//!
//! This library provides:
//! - Host discovery strategies (ARP, hybrid, TCP fast/conservative/thorough)
//! - A device store tracking presence, uptime and flaps across scans
//! - Hostname resolution over DNS, NetBIOS, LLMNR and mDNS
//! - MAC vendor lookup and device classification
//! - A periodic scan scheduler and an interactive terminal monitor

pub mod budget;
pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod detect;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod inspect;
pub mod model;
pub mod net;
pub mod output;
pub mod resolver;
pub mod scheduler;
pub mod store;
pub mod tui;
pub mod view;

// Re-export commonly used types for convenience
pub use budget::{BudgetLimiter, ThreadBudget};
pub use config::ScanConfig;
pub use db::VendorDb;
pub use discovery::{DiscoveryContext, DiscoveryMode, DiscoveryStrategy};
pub use engine::NetworkScanner;
pub use errors::ScanError;
pub use filter::{Filter, FilterError};
pub use model::{DeviceRecord, DeviceStatus, DeviceType, HostObservation, HostnameSource};
pub use resolver::HostnameResolver;
pub use scheduler::{ScanEvent, ScanScheduler, SchedulerConfig, SchedulerHandle};
pub use store::{DeviceStore, StoreSnapshot};

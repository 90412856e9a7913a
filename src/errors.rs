use thiserror::Error;

/// Error types for discovery, monitoring and inspection
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Invalid port specification: {0}")]
    InvalidPortSpec(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] crate::filter::FilterError),

    #[error("Platform adapter error: {0}")]
    Adapter(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network Interface Error: {0}")]
    NetworkInterfaceWrapped(#[from] network_interface::Error),

    #[error("Network Interface Error: {0}")]
    NetworkInterfaceCustom(String),

    #[error("Error: {0}")]
    Other(String),
}

impl ScanError {
    /// True for errors caused by user input rather than the environment.
    /// The binary maps these to exit status 2.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidNetwork(_)
                | Self::InvalidPortSpec(_)
                | Self::InvalidArgument(_)
                | Self::InvalidFilter(_)
                | Self::Config(_)
        )
    }
}

impl From<ipnetwork::IpNetworkError> for ScanError {
    fn from(err: ipnetwork::IpNetworkError) -> Self {
        Self::InvalidNetwork(err.to_string())
    }
}

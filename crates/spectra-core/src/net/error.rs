//! Transport error types

use thiserror::Error;

/// Errors that can occur in the network transport layer
#[derive(Error, Debug)]
pub enum NetError {
    /// Endpoint string did not resolve to a usable address
    #[error("failed to resolve target address '{addr}': {source}")]
    AddressResolution {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Endpoint resolved to no addresses at all
    #[error("no usable address for '{0}'")]
    NoAddress(String),

    /// Could not bind/connect the datagram socket
    #[error("failed to connect datagram socket to '{addr}': {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Send on a sender that was already closed
    #[error("datagram sender is closed")]
    Closed,

    /// Datagram write failed
    #[error("failed to send datagram: {source}")]
    Send {
        #[source]
        source: std::io::Error,
    },
}

impl NetError {
    /// True for the transient "connection refused" case (ICMP port
    /// unreachable surfaced on a connected datagram socket).
    pub fn is_connection_refused(&self) -> bool {
        matches!(
            self,
            NetError::Send { source } if source.kind() == std::io::ErrorKind::ConnectionRefused
        )
    }
}

/// Result type for transport operations
pub type NetResult<T> = Result<T, NetError>;

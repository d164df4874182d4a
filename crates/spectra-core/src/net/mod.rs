//! Network transport: datagram sender and periodic magnitude publisher
//!
//! The publisher depends only on the [`Transport`] trait, keeping the
//! wire format independent of the concrete sink and giving tests a seam
//! to capture frames.

mod error;
mod publisher;
mod sender;

pub use error::{NetError, NetResult};
pub use publisher::{Publisher, DEFAULT_INTERVAL, HEADER_LEN};
pub use sender::UdpSender;

/// Write-only sink for analysis records. Implementations must be
/// thread-safe; `send` is called from the publisher worker, `close`
/// possibly from a control thread.
pub trait Transport: Send + Sync {
    /// Transmit one datagram-sized record.
    fn send(&self, data: &[u8]) -> NetResult<()>;

    /// Release the sink. Must tolerate repeated calls.
    fn close(&self) -> NetResult<()>;
}

//! Connected UDP datagram sender
//!
//! The socket is "connected" to its target at construction so every
//! send is a plain write with no destination lookup, and the OS can
//! surface ICMP port-unreachable as `ConnectionRefused` on the next
//! write. That error is expected whenever no consumer is listening
//! (e.g. across visualizer restarts), so its logging can be suppressed
//! here — the policy lives in the sender, not in callers.

use std::net::{ToSocketAddrs, UdpSocket};

use parking_lot::Mutex;

use super::error::{NetError, NetResult};
use super::Transport;

/// UDP sender bound to a fixed remote endpoint.
pub struct UdpSender {
    /// Socket handle; taken on close. The mutex makes concurrent
    /// send/close safe and is only ever held for one syscall.
    socket: Mutex<Option<UdpSocket>>,
    suppress_refused: bool,
}

impl UdpSender {
    /// Resolve `endpoint` ("host:port"), create a connected datagram
    /// socket, and log the resolved address. With `suppress_refused`
    /// set, transient connection-refused errors are kept out of the
    /// error log (they are still returned to the caller).
    pub fn connect(endpoint: &str, suppress_refused: bool) -> NetResult<UdpSender> {
        let addr = endpoint
            .to_socket_addrs()
            .map_err(|e| NetError::AddressResolution {
                addr: endpoint.to_string(),
                source: e,
            })?
            .next()
            .ok_or_else(|| NetError::NoAddress(endpoint.to_string()))?;

        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)
            .and_then(|s| s.connect(addr).map(|_| s))
            .map_err(|e| NetError::Dial {
                addr: endpoint.to_string(),
                source: e,
            })?;

        log::info!(
            "net: datagram sender connected to {} (suppress refused: {})",
            addr,
            suppress_refused
        );

        Ok(UdpSender {
            socket: Mutex::new(Some(socket)),
            suppress_refused,
        })
    }
}

impl Transport for UdpSender {
    /// Write one datagram. Errors are logged here (de-noised for
    /// connection refused) and returned.
    fn send(&self, data: &[u8]) -> NetResult<()> {
        let result = {
            let guard = self.socket.lock();
            let socket = guard.as_ref().ok_or(NetError::Closed)?;
            socket.send(data)
        };

        match result {
            Ok(_) => Ok(()),
            Err(source) => {
                let err = NetError::Send { source };
                if err.is_connection_refused() {
                    if self.suppress_refused {
                        log::debug!("net: send error (connection refused): {}", err);
                    } else {
                        log::error!("net: send error (connection refused): {}", err);
                    }
                } else {
                    log::error!("net: send error: {}", err);
                }
                Err(err)
            }
        }
    }

    /// Close the socket. Safe to call repeatedly and concurrently with
    /// `send`; only the first call does anything.
    fn close(&self) -> NetResult<()> {
        let mut guard = self.socket.lock();
        match guard.take() {
            Some(socket) => {
                if let Ok(peer) = socket.peer_addr() {
                    log::info!("net: closing datagram sender to {}", peer);
                }
                Ok(())
            }
            None => {
                log::debug!("net: close called but sender already closed");
                Ok(())
            }
        }
    }
}

impl Drop for UdpSender {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

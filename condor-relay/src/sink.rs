//! Outbound UDP sink
//!
//! Sends converted datagrams from an ephemeral local port to the configured
//! destination.

use crate::error::BridgeError;
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// UDP sink
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    addr: SocketAddr,
}

impl UdpSink {
    /// Resolve `host:port` and open an unbound socket of the matching family
    pub async fn open(host: &str, port: u16) -> Result<Self, BridgeError> {
        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| BridgeError::Resolve {
                host: host.to_string(),
                port,
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| BridgeError::Resolve {
                host: host.to_string(),
                port,
                reason: "no addresses found".to_string(),
            })?;

        let local = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|source| BridgeError::Bind {
                addr: local.to_string(),
                source,
            })?;

        Ok(Self { socket, addr })
    }

    pub fn destination(&self) -> SocketAddr {
        self.addr
    }

    pub async fn send(&self, payload: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(payload, self.addr).await?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {} of {} bytes", sent, payload.len()),
            ));
        }
        Ok(())
    }
}

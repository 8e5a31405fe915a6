//! UDP transport: bound (server-style, listens on all comers) or connected
//! (client-style, fixed peer). §4.1 notes that the connect-mode variant
//! learns its peer from the first inbound packet; we model that directly
//! rather than requiring the caller to pre-resolve a peer address.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use super::Transport;

pub struct UdpTransport {
    socket: UdpSocket,
    /// `None` until the first inbound packet arrives in bound mode, or
    /// immediately `Some` for a pre-connected socket (§6 Output links).
    peer: Option<SocketAddr>,
    name: String,
    recv_buf: [u8; 65536],
}

impl UdpTransport {
    /// Bound, unconnected socket: used for masters addressed as bare
    /// `host:port` (§6) and for the `--out` fan-out sink, which sends
    /// without ever learning a peer from an inbound packet.
    pub async fn bind(addr: &str, connect_peer: bool) -> Result<Self> {
        let bind_addr = if connect_peer { "0.0.0.0:0" } else { addr };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .with_context(|| format!("binding udp socket at {bind_addr}"))?;

        let peer = if connect_peer {
            let resolved: SocketAddr = tokio::net::lookup_host(addr)
                .await
                .with_context(|| format!("resolving {addr}"))?
                .next()
                .with_context(|| format!("no address for {addr}"))?;
            socket.connect(resolved).await?;
            Some(resolved)
        } else {
            None
        };

        Ok(Self {
            socket,
            peer,
            name: format!("udp:{addr}"),
            recv_buf: [0u8; 65536],
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn recv(&mut self) -> Result<Vec<u8>> {
        match self.socket.try_recv_from(&mut self.recv_buf) {
            Ok((n, from)) => {
                if self.peer.is_none() {
                    self.socket.connect(from).await.ok();
                    self.peer = Some(from);
                }
                Ok(self.recv_buf[..n].to_vec())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match self.peer {
            Some(peer) => {
                self.socket.send_to(bytes, peer).await?;
            }
            None => {
                // No peer learned yet; drop silently, matching "best effort".
            }
        }
        Ok(())
    }

    async fn readable(&mut self) {
        let _ = self.socket.readable().await;
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

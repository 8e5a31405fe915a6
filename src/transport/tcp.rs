//! TCP client transport (`tcp:host:port` master URIs, §6). Grounded on the
//! teacher's `tcp_socket.rs` read/write handling, minus the multi-client
//! listener machinery this proxy never needs (a master is one peer).

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use super::Transport;

pub struct TcpTransport {
    stream: TcpStream,
    name: String,
}

impl TcpTransport {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connecting tcp to {addr}"))?;
        stream.set_nodelay(true).ok();

        // Telemetry links sit on flaky radio-to-ground bridges; a generous
        // receive buffer avoids extra syscalls re-reading small bursts.
        let std_stream = stream.into_std()?;
        let socket = socket2::Socket::from(std_stream.try_clone()?);
        let _ = socket.set_recv_buffer_size(64 * 1024);
        let _ = socket.set_send_buffer_size(64 * 1024);
        let stream = TcpStream::from_std(std_stream)?;

        Ok(Self {
            stream,
            name: format!("tcp:{addr}"),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn recv(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; 4096];
        match self.stream.try_read(&mut buf) {
            Ok(0) => Err(anyhow::anyhow!("tcp connection {} closed", self.name)),
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn readable(&mut self) {
        let _ = self.stream.readable().await;
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.stream.shutdown().await;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

//! Spawned child process transport (`<path>.elf` master URIs, §6): pipes
//! the child's stdin/stdout as the bidirectional byte channel, used for
//! SITL-style vehicle simulators launched in-process. Uses
//! `tokio::process` for non-blocking child I/O.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout};

use super::Transport;

pub struct ChildTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    name: String,
}

impl ChildTransport {
    pub fn spawn(path: &str) -> Result<Self> {
        let mut child = tokio::process::Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawning child process {path}"))?;

        let stdin = child.stdin.take().context("child has no stdin")?;
        let stdout = child.stdout.take().context("child has no stdout")?;

        Ok(Self {
            child,
            stdin,
            stdout,
            name: format!("child:{path}"),
        })
    }
}

#[async_trait]
impl Transport for ChildTransport {
    async fn recv(&mut self) -> Result<Vec<u8>> {
        let mut buf = [0u8; 4096];
        match self.stdout.try_read(&mut buf) {
            Ok(0) => Ok(Vec::new()),
            Ok(n) => Ok(buf[..n].to_vec()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stdin.write_all(bytes).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn readable(&mut self) {
        let _ = self.stdout.readable().await;
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.child.start_kill();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

//! RC channel override vector (§3) and the SITL raw-RC sink (§6).

use anyhow::Result;

use crate::transport::{Transport, UdpTransport};

/// Eight 16-bit override values. Zero means "no override"; `0xFFFF` means
/// "release" per the wire protocol's own convention (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideVector(pub [u16; 8]);

impl Default for OverrideVector {
    fn default() -> Self {
        Self([0; 8])
    }
}

impl OverrideVector {
    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }

    pub fn set_channel(&mut self, channel: usize, value: u16) {
        if channel >= 1 && channel <= 8 {
            self.0[channel - 1] = value;
        }
    }
}

/// `--sitl host:port`: a raw UDP sink for the override vector, packed as
/// eight little-endian `uint16`s — a distinct wire shape from the protocol
/// frames, per §6.
pub struct SitlOutput {
    socket: UdpTransport,
}

impl SitlOutput {
    pub async fn connect(addr: &str) -> Result<Self> {
        Ok(Self {
            socket: UdpTransport::bind(addr, true).await?,
        })
    }

    pub async fn send(&mut self, overrides: &OverrideVector) -> Result<()> {
        let mut buf = Vec::with_capacity(16);
        for v in overrides.0 {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        self.socket.send(&buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector_is_all_zero() {
        assert!(OverrideVector::default().is_all_zero());
    }

    #[test]
    fn setting_a_channel_clears_all_zero() {
        let mut v = OverrideVector::default();
        v.set_channel(3, 1500);
        assert!(!v.is_all_zero());
        assert_eq!(v.0[2], 1500);
    }

    #[test]
    fn out_of_range_channel_is_ignored() {
        let mut v = OverrideVector::default();
        v.set_channel(9, 1500);
        assert!(v.is_all_zero());
    }
}

//! Error taxonomy for the proxy (§7 of the design).
//!
//! The engine never unwinds: every handler recovers locally and reports
//! through this enum where the caller needs to distinguish failure kinds
//! (to decide whether to mark a link errored, retry, or just log and move
//! on). Most call sites still bubble an `anyhow::Error` upward for display;
//! `EngineError` is for the handful of places that branch on *which* kind of
//! failure occurred.

use thiserror::Error;

/// The five error kinds named by the design: transport I/O, frame parsing,
/// protocol timeouts, filesystem access, and unrecoverable-but-survivable
/// faults (no usable link at all).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error on link {link}: {source}")]
    Transport {
        link: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse frame: {0}")]
    Parse(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no usable link available")]
    Fatal,
}

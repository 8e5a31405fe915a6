//! Log Journal (§4.8): two append-only files fed by bounded-never-blocks
//! queues and drained by a dedicated worker — a background task owns the
//! file handles and periodically flushes, while the producer side never
//! waits on disk.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

/// One queued parsed-log record: an already-framed record per §4.8's
/// layout (timestamp with link bits folded in, followed by frame bytes).
pub type ParsedRecord = Vec<u8>;
/// One queued raw-log chunk: bytes exactly as received from a link.
pub type RawChunk = Vec<u8>;

/// Builds the §4.8 parsed-log record: an 8-byte big-endian microsecond
/// timestamp with its low 2 bits overwritten by `link_num & 0x3`, followed
/// by the raw frame bytes.
pub fn frame_record(usec: u64, link_num: usize, frame_bytes: &[u8]) -> ParsedRecord {
    let mut header = (usec & !0x3u64).to_be_bytes();
    header[7] |= (link_num as u8) & 0x3;
    let mut record = Vec::with_capacity(8 + frame_bytes.len());
    record.extend_from_slice(&header);
    record.extend_from_slice(frame_bytes);
    record
}

/// Splits a parsed-log record back into `(usec_with_link_bits_masked_out,
/// link_num, frame_bytes)`, as used by the round-trip test in §8.
pub fn parse_record(record: &[u8]) -> Option<(u64, u8, &[u8])> {
    if record.len() < 8 {
        return None;
    }
    let header = u64::from_be_bytes(record[0..8].try_into().unwrap());
    let link_num = (header & 0x3) as u8;
    let usec = header & !0x3u64;
    Some((usec, link_num, &record[8..]))
}

/// Producer-side handle the engine enqueues into; cloning is cheap (it's
/// just three `mpsc::UnboundedSender`s) so every link can hold one.
#[derive(Clone)]
pub struct JournalHandle {
    parsed_tx: mpsc::UnboundedSender<ParsedRecord>,
    raw_tx: mpsc::UnboundedSender<RawChunk>,
    status_tx: mpsc::UnboundedSender<String>,
}

impl JournalHandle {
    /// Never blocks: an unbounded channel send only fails if the worker has
    /// already shut down, which we treat as "nothing left to log to".
    pub fn enqueue_parsed(&self, record: ParsedRecord) {
        let _ = self.parsed_tx.send(record);
    }

    pub fn enqueue_raw(&self, chunk: RawChunk) {
        let _ = self.raw_tx.send(chunk);
    }

    /// Queues a fresh `status.txt` snapshot (§4.7/§4.8's 1Hz status write).
    /// Only the latest snapshot queued between drains survives; it's a
    /// point-in-time mirror, not a log.
    pub fn enqueue_status(&self, snapshot: String) {
        let _ = self.status_tx.send(snapshot);
    }
}

/// Owns the open file descriptors; runs on a dedicated blocking task.
pub struct JournalWorker {
    parsed_file: std::fs::File,
    raw_file: std::fs::File,
    status_path: PathBuf,
    parsed_rx: mpsc::UnboundedReceiver<ParsedRecord>,
    raw_rx: mpsc::UnboundedReceiver<RawChunk>,
    status_rx: mpsc::UnboundedReceiver<String>,
}

impl JournalWorker {
    /// `append` switches from truncate to append per `--append-log` (§6).
    /// `status_path` is overwritten (not appended) on every snapshot.
    pub fn open(parsed_path: &Path, raw_path: &Path, status_path: &Path, append: bool) -> Result<(JournalHandle, Self)> {
        let mut opts = std::fs::OpenOptions::new();
        opts.write(true).create(true);
        if append {
            opts.append(true);
        } else {
            opts.truncate(true);
        }
        let parsed_file = opts
            .open(parsed_path)
            .with_context(|| format!("opening parsed log {}", parsed_path.display()))?;
        let raw_file = opts
            .open(raw_path)
            .with_context(|| format!("opening raw log {}", raw_path.display()))?;

        let (parsed_tx, parsed_rx) = mpsc::unbounded_channel();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();

        Ok((
            JournalHandle {
                parsed_tx,
                raw_tx,
                status_tx,
            },
            Self {
                parsed_file,
                raw_file,
                status_path: status_path.to_path_buf(),
                parsed_rx,
                raw_rx,
                status_rx,
            },
        ))
    }

    /// Drains one iteration: blocks on the raw queue for at least one item,
    /// then drains everything else non-blocking, then flushes both files
    /// (§4.8). The status snapshot queue is drained to its last entry and
    /// written over `status.txt` whole, since it's a mirror, not a log.
    /// Returns `false` once both log producer halves have dropped, signaling
    /// the worker can exit.
    pub async fn drain_once(&mut self) -> bool {
        let first = match self.raw_rx.recv().await {
            Some(chunk) => chunk,
            None => return false,
        };
        let _ = self.raw_file.write_all(&first);
        while let Ok(chunk) = self.raw_rx.try_recv() {
            let _ = self.raw_file.write_all(&chunk);
        }
        while let Ok(record) = self.parsed_rx.try_recv() {
            let _ = self.parsed_file.write_all(&record);
        }
        let _ = self.raw_file.flush();
        let _ = self.parsed_file.flush();

        let mut latest_status = None;
        while let Ok(snapshot) = self.status_rx.try_recv() {
            latest_status = Some(snapshot);
        }
        if let Some(snapshot) = latest_status {
            let _ = std::fs::write(&self.status_path, snapshot);
        }

        true
    }
}

/// Where logs live for a given aircraft/flight combination (§6): under
/// `<aircraft>/logs/YYYY-MM-DD/flightNNN/`, `NNN` the smallest unused
/// integer starting at 1, bailing past 9999.
pub fn next_flight_dir(aircraft_root: &Path, date: &str) -> Result<PathBuf> {
    let day_dir = aircraft_root.join("logs").join(date);
    std::fs::create_dir_all(&day_dir)?;
    for n in 1..=9999u32 {
        let candidate = day_dir.join(format!("flight{n}"));
        if !candidate.exists() {
            std::fs::create_dir_all(&candidate)?;
            return Ok(candidate);
        }
    }
    anyhow::bail!("flight index exceeded 9999 under {}", day_dir.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trips_and_preserves_link_bits() {
        let record = frame_record(0x00000000_12345678, 3, b"hello");
        let (usec, link_num, bytes) = parse_record(&record).unwrap();
        assert_eq!(link_num, 3);
        assert_eq!(bytes, b"hello");
        // The low 2 bits of the original timestamp are not recoverable;
        // only that they've been replaced with the link number.
        assert_eq!(usec & 0x3, 0);
    }

    #[test]
    fn link_num_is_masked_to_two_bits() {
        let record = frame_record(0, 7, b"x");
        let (_, link_num, _) = parse_record(&record).unwrap();
        assert_eq!(link_num, 3); // 7 & 0x3
    }

    #[tokio::test]
    async fn worker_drains_and_flushes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let parsed_path = dir.path().join("mav.log");
        let raw_path = dir.path().join("mav.log.raw");
        let status_path = dir.path().join("status.txt");
        let (handle, mut worker) = JournalWorker::open(&parsed_path, &raw_path, &status_path, false).unwrap();

        handle.enqueue_raw(b"raw-bytes".to_vec());
        handle.enqueue_parsed(frame_record(100, 0, b"frame"));
        drop(handle);

        assert!(worker.drain_once().await);
        assert!(!worker.drain_once().await);

        let raw_contents = std::fs::read(&raw_path).unwrap();
        assert_eq!(raw_contents, b"raw-bytes");
        let parsed_contents = std::fs::read(&parsed_path).unwrap();
        assert!(parsed_contents.ends_with(b"frame"));
    }

    #[tokio::test]
    async fn status_snapshot_overwrites_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let parsed_path = dir.path().join("mav.log");
        let raw_path = dir.path().join("mav.log.raw");
        let status_path = dir.path().join("status.txt");
        let (handle, mut worker) = JournalWorker::open(&parsed_path, &raw_path, &status_path, false).unwrap();

        handle.enqueue_status("first\n".to_string());
        handle.enqueue_raw(b"x".to_vec());
        assert!(worker.drain_once().await);
        assert_eq!(std::fs::read_to_string(&status_path).unwrap(), "first\n");

        handle.enqueue_status("second\n".to_string());
        handle.enqueue_raw(b"x".to_vec());
        assert!(worker.drain_once().await);
        assert_eq!(std::fs::read_to_string(&status_path).unwrap(), "second\n");
    }

    #[test]
    fn next_flight_dir_picks_smallest_unused_index() {
        let dir = tempfile::tempdir().unwrap();
        let d1 = next_flight_dir(dir.path(), "2026-07-26").unwrap();
        assert!(d1.ends_with("flight1"));
        let d2 = next_flight_dir(dir.path(), "2026-07-26").unwrap();
        assert!(d2.ends_with("flight2"));
    }
}

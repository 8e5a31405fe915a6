//! Waypoint Loader (§3) and the upload/download state machines (§4.5, §4.10).

use std::time::{Duration, Instant};

use anyhow::{Context, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub seq: u16,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub command: u16,
}

/// One-shot operation the loader is currently servicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointOp {
    List,
    Save,
    Upload,
}

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Ordered waypoint list plus the bookkeeping the download/upload state
/// machines need. Reused across operations; cleared at the start of each
/// download (§3).
#[derive(Default)]
pub struct WaypointLoader {
    pub waypoints: Vec<Waypoint>,
    pub expected_count: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub op: Option<WaypointOp>,
    pub save_filename: Option<String>,
    last_activity: Option<Instant>,
}

impl WaypointLoader {
    pub fn count(&self) -> u16 {
        self.waypoints.len() as u16
    }

    pub fn wp(&self, seq: u16) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.seq == seq)
    }

    /// `wp list` / `wp save <file>`: start a download.
    pub fn begin_download(&mut self, op: WaypointOp, save_filename: Option<String>) {
        self.waypoints.clear();
        self.expected_count = 0;
        self.op = Some(op);
        self.save_filename = save_filename;
    }

    /// MISSION_COUNT/WAYPOINT_COUNT handler (§4.5): only valid mid-download.
    pub fn on_count(&mut self, count: u16) -> bool {
        if self.op.is_none() {
            return false;
        }
        self.waypoints.clear();
        self.expected_count = count;
        true
    }

    /// MISSION_ITEM/WAYPOINT handler (§4.5). Returns `Some(next_seq)` if
    /// another item should be requested, or `None` if the download just
    /// finished (caller checks `self.op` to see whether it finished or the
    /// item was a duplicate/out-of-order drop — use [`WaypointLoader::append_outcome`]
    /// for that distinction instead in the dispatch code).
    pub fn append(&mut self, wp: Waypoint) -> AppendOutcome {
        let current_count = self.count();
        if wp.seq > current_count {
            return AppendOutcome::OutOfOrder;
        }
        if wp.seq < current_count {
            return AppendOutcome::Duplicate;
        }
        self.waypoints.push(wp);
        if self.count() < self.expected_count {
            AppendOutcome::NeedMore(self.count())
        } else {
            let op = self.op.take();
            AppendOutcome::Done(op)
        }
    }

    /// `wp load <file>`: loaded waypoints (via the external file loader,
    /// out of scope) are handed in ready to upload.
    pub fn begin_upload(&mut self, waypoints: Vec<Waypoint>) {
        self.waypoints = waypoints;
        self.op = Some(WaypointOp::Upload);
        self.last_activity = Some(Instant::now());
    }

    pub fn is_uploading(&self) -> bool {
        self.op == Some(WaypointOp::Upload)
    }

    /// WAYPOINT_REQUEST/MISSION_REQUEST handler during upload (§4.10).
    pub fn on_request(&mut self, seq: u16) -> UploadRequestOutcome {
        if !self.is_uploading() {
            return UploadRequestOutcome::NotUploading;
        }
        if self
            .last_activity
            .map(|t| t.elapsed() > UPLOAD_TIMEOUT)
            .unwrap_or(false)
        {
            self.op = None;
            return UploadRequestOutcome::Abandoned;
        }
        if seq >= self.count() {
            return UploadRequestOutcome::BadSeq;
        }
        self.last_activity = Some(Instant::now());
        let done = seq + 1 == self.count();
        if done {
            self.op = None;
        }
        UploadRequestOutcome::Send { seq, done }
    }
}

/// Reads a waypoint file in a trivial line-based format: `seq x y z command`,
/// whitespace-separated, blank lines and `#`-prefixed comments ignored.
/// Parsing the real QGC/mavproxy waypoint file dialect is out of scope (§1);
/// this exists so `wp load` has something concrete to drive the upload state
/// machine with.
pub fn load_trivial_waypoint_file(path: &str) -> Result<Vec<Waypoint>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading waypoint file {path}"))?;
    let mut waypoints = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 5 {
            anyhow::bail!("malformed waypoint line: {line:?}");
        }
        waypoints.push(Waypoint {
            seq: fields[0].parse().with_context(|| format!("bad seq in {line:?}"))?,
            x: fields[1].parse().with_context(|| format!("bad x in {line:?}"))?,
            y: fields[2].parse().with_context(|| format!("bad y in {line:?}"))?,
            z: fields[3].parse().with_context(|| format!("bad z in {line:?}"))?,
            command: fields[4].parse().with_context(|| format!("bad command in {line:?}"))?,
        });
    }
    Ok(waypoints)
}

#[derive(Debug)]
pub enum AppendOutcome {
    OutOfOrder,
    Duplicate,
    NeedMore(u16),
    Done(Option<WaypointOp>),
}

#[derive(Debug)]
pub enum UploadRequestOutcome {
    NotUploading,
    Abandoned,
    BadSeq,
    Send { seq: u16, done: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(seq: u16) -> Waypoint {
        Waypoint {
            seq,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            command: 16,
        }
    }

    #[test]
    fn download_sequence_appends_in_order_and_finishes() {
        let mut loader = WaypointLoader::default();
        loader.begin_download(WaypointOp::List, None);
        loader.on_count(2);
        assert!(matches!(loader.append(wp(0)), AppendOutcome::NeedMore(1)));
        assert!(matches!(loader.append(wp(1)), AppendOutcome::Done(Some(WaypointOp::List))));
        assert_eq!(loader.count(), 2);
    }

    #[test]
    fn duplicate_and_out_of_order_items_are_dropped() {
        let mut loader = WaypointLoader::default();
        loader.begin_download(WaypointOp::List, None);
        loader.on_count(2);
        loader.append(wp(0));
        assert!(matches!(loader.append(wp(0)), AppendOutcome::Duplicate));
        assert!(matches!(loader.append(wp(5)), AppendOutcome::OutOfOrder));
    }

    #[test]
    fn count_message_is_ignored_without_an_active_op() {
        let mut loader = WaypointLoader::default();
        assert!(!loader.on_count(5));
    }

    #[test]
    fn upload_serves_requests_in_sequence_and_completes() {
        let mut loader = WaypointLoader::default();
        loader.begin_upload(vec![wp(0), wp(1), wp(2)]);
        assert!(matches!(
            loader.on_request(0),
            UploadRequestOutcome::Send { seq: 0, done: false }
        ));
        assert!(matches!(
            loader.on_request(1),
            UploadRequestOutcome::Send { seq: 1, done: false }
        ));
        assert!(matches!(
            loader.on_request(2),
            UploadRequestOutcome::Send { seq: 2, done: true }
        ));
        assert!(!loader.is_uploading());
    }

    #[test]
    fn upload_request_for_out_of_range_seq_is_rejected() {
        let mut loader = WaypointLoader::default();
        loader.begin_upload(vec![wp(0)]);
        assert!(matches!(loader.on_request(5), UploadRequestOutcome::BadSeq));
    }

    #[test]
    fn trivial_waypoint_file_parses_lines_and_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ten_wp.txt");
        std::fs::write(&path, "# a comment\n0 1.0 2.0 3.0 16\n\n1 4.0 5.0 6.0 16\n").unwrap();
        let wps = load_trivial_waypoint_file(path.to_str().unwrap()).unwrap();
        assert_eq!(wps.len(), 2);
        assert_eq!(wps[0], Waypoint { seq: 0, x: 1.0, y: 2.0, z: 3.0, command: 16 });
        assert_eq!(wps[1], Waypoint { seq: 1, x: 4.0, y: 5.0, z: 6.0, command: 16 });
    }

    #[test]
    fn stale_upload_is_abandoned_after_ten_seconds() {
        let mut loader = WaypointLoader::default();
        loader.begin_upload(vec![wp(0), wp(1)]);
        loader.last_activity = Some(Instant::now() - Duration::from_secs(11));
        assert!(matches!(loader.on_request(0), UploadRequestOutcome::Abandoned));
        assert!(!loader.is_uploading());
    }
}

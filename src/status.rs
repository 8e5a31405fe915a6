//! Status Mirror (§3): a live snapshot of last-seen messages plus the
//! rolling fields several handlers consult across dispatches.

use std::collections::HashMap;
use std::time::Instant;

use crate::codec::Frame;

pub struct StatusMirror {
    pub last_message: HashMap<String, Frame>,
    pub count: HashMap<String, u64>,

    /// Both -1 until the first heartbeat, per §3's pairing invariant.
    pub target_system: i32,
    pub target_component: i32,

    pub flight_mode: Option<String>,
    pub last_announced_altitude: Option<f64>,
    pub last_announced_distance: Option<i64>,
    pub last_waypoint_current: Option<u16>,
    pub gps_has_fix: bool,

    pub setup_mode: bool,
    pub loading_waypoints: bool,
    pub loading_waypoint_last_activity: Option<Instant>,

    pub last_heartbeat: Option<Instant>,
    pub heartbeat_error: bool,

    pub mav_error: u64,
}

impl Default for StatusMirror {
    fn default() -> Self {
        Self {
            last_message: HashMap::new(),
            count: HashMap::new(),
            target_system: -1,
            target_component: -1,
            flight_mode: None,
            last_announced_altitude: None,
            last_announced_distance: None,
            last_waypoint_current: None,
            gps_has_fix: false,
            setup_mode: false,
            loading_waypoints: false,
            loading_waypoint_last_activity: None,
            last_heartbeat: None,
            heartbeat_error: false,
            mav_error: 0,
        }
    }
}

/// Minimal APM-copter-style numeric mode → name table, used to announce
/// flight-mode changes off `HEARTBEAT.custom_mode` (§4.5). PX4's distinct
/// custom-mode encoding is out of scope.
pub fn flight_mode_name(custom_mode: u32) -> &'static str {
    match custom_mode {
        0 => "STABILIZE",
        1 => "ACRO",
        2 => "ALT_HOLD",
        3 => "AUTO",
        4 => "GUIDED",
        5 => "LOITER",
        6 => "RTL",
        7 => "CIRCLE",
        9 => "LAND",
        _ => "UNKNOWN",
    }
}

impl StatusMirror {
    /// §3's pairing invariant: both fields are set together from a heartbeat
    /// source, or both remain -1.
    pub fn adopt_heartbeat_source(&mut self, src_system: u8, src_component: u8) -> bool {
        let changed = self.target_system != src_system as i32
            || self.target_component != src_component as i32;
        if changed {
            self.target_system = src_system as i32;
            self.target_component = src_component as i32;
        }
        changed
    }

    /// §4.5: update the mirror for every dispatched message, run after the
    /// type-specific handler regardless of outcome.
    pub fn record(&mut self, frame: &Frame) {
        let type_name = frame.type_name().to_string();
        *self.count.entry(type_name.clone()).or_insert(0) += 1;
        self.last_message.insert(type_name, frame.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireMessage;

    #[test]
    fn adopts_heartbeat_source_once() {
        let mut status = StatusMirror::default();
        assert_eq!(status.target_system, -1);
        assert!(status.adopt_heartbeat_source(1, 2));
        assert_eq!(status.target_system, 1);
        assert_eq!(status.target_component, 2);
        assert!(!status.adopt_heartbeat_source(1, 2));
    }

    #[test]
    fn record_counts_and_mirrors_last_message() {
        let mut status = StatusMirror::default();
        let frame = Frame {
            src_system: 1,
            src_component: 1,
            usec: None,
            body: WireMessage::StatusText {
                severity: 1,
                text: "hi".into(),
            },
        };
        status.record(&frame);
        status.record(&frame);
        assert_eq!(status.count["STATUSTEXT"], 2);
        assert!(status.last_message.contains_key("STATUSTEXT"));
    }
}

//! Frame codec seam.
//!
//! The wire codec for individual protocol frames is out of scope (§1): in a
//! real deployment this module would wrap an external MAVLink serialization
//! library. No available crate for that exists in this build, so rather
//! than fabricate an unlisted dependency we give the rest of the engine a
//! small, honestly-named [`FrameCodec`] trait and one concrete
//! implementation ([`SimpleCodec`]) that frames messages with `bincode`.
//! Swapping in a real MAVLink codec means implementing this trait; nothing
//! else in the engine would need to change.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One entry per message "logical type" the engine's dispatch table (§4.5)
/// understands, plus a catch-all for anything else and a slot for frames
/// the codec itself rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WireMessage {
    Heartbeat {
        base_mode: u8,
        custom_mode: u32,
        autopilot: u8,
    },
    StatusText {
        severity: u8,
        text: String,
    },
    ParamValue {
        param_id: String,
        param_value: f32,
        param_index: u16,
        param_count: u16,
    },
    ServoOutputRaw {
        servo_raw: [u16; 8],
    },
    WaypointCount {
        count: u16,
    },
    Waypoint {
        seq: u16,
        x: f32,
        y: f32,
        z: f32,
        command: u16,
    },
    WaypointRequest {
        seq: u16,
    },
    WaypointCurrent {
        seq: u16,
    },
    SysStatus {
        battery_remaining: i8,
        onboard_control_sensors_health: u32,
    },
    VfrHud {
        alt: f32,
    },
    RcChannelsRaw {
        chan_raw: [u16; 8],
        rssi: u8,
    },
    NavControllerOutput {
        wp_dist: u16,
    },
    ApAdc {
        adc2: u16,
    },
    GpsRaw {
        fix_type: u8,
    },
    /// Outbound: clears the vehicle's mission prior to an upload (§4.10).
    WaypointClearAll,
    /// Outbound `param_set` request; distinct from the inbound acknowledging
    /// `PARAM_VALUE` (§4.13).
    ParamSet {
        param_id: String,
        param_value: f32,
    },
    /// Outbound RC override; distinct from the inbound telemetry type
    /// `SERVO_OUTPUT_RAW` it used to be conflated with (§4.9).
    RcChannelsOverride {
        chan_raw: [u16; 8],
    },
    /// Outbound arm/disarm command (§6's `arm`/`disarm`).
    CommandArmDisarm {
        arm: bool,
    },
    /// Outbound flight-mode change (§6's mode words).
    SetMode {
        base_mode: u8,
        custom_mode: u32,
    },
    /// A message type the dispatch table does not special-case; carries its
    /// name so the "got unknown" print (§4.5) can mention it.
    Unknown {
        type_name: String,
    },
    /// Data the codec could not parse as a frame at all.
    BadData {
        bytes: Vec<u8>,
    },
}

impl WireMessage {
    /// Stable key used by the Status Mirror (§3) and by the handler table.
    pub fn type_name(&self) -> &str {
        match self {
            WireMessage::Heartbeat { .. } => "HEARTBEAT",
            WireMessage::StatusText { .. } => "STATUSTEXT",
            WireMessage::ParamValue { .. } => "PARAM_VALUE",
            WireMessage::ServoOutputRaw { .. } => "SERVO_OUTPUT_RAW",
            WireMessage::WaypointCount { .. } => "MISSION_COUNT",
            WireMessage::Waypoint { .. } => "MISSION_ITEM",
            WireMessage::WaypointRequest { .. } => "MISSION_REQUEST",
            WireMessage::WaypointCurrent { .. } => "MISSION_CURRENT",
            WireMessage::SysStatus { .. } => "SYS_STATUS",
            WireMessage::VfrHud { .. } => "VFR_HUD",
            WireMessage::RcChannelsRaw { .. } => "RC_CHANNELS_RAW",
            WireMessage::NavControllerOutput { .. } => "NAV_CONTROLLER_OUTPUT",
            WireMessage::ApAdc { .. } => "AP_ADC",
            WireMessage::GpsRaw { .. } => "GPS_RAW",
            WireMessage::WaypointClearAll => "MISSION_CLEAR_ALL",
            WireMessage::ParamSet { .. } => "PARAM_SET",
            WireMessage::RcChannelsOverride { .. } => "RC_CHANNELS_OVERRIDE",
            WireMessage::CommandArmDisarm { .. } => "COMMAND_ARM_DISARM",
            WireMessage::SetMode { .. } => "SET_MODE",
            WireMessage::Unknown { type_name } => type_name,
            WireMessage::BadData { .. } => "BAD_DATA",
        }
    }

    pub fn is_bad_data(&self) -> bool {
        matches!(self, WireMessage::BadData { .. })
    }
}

/// A decoded frame plus the envelope fields every message variant carries
/// whether or not the inner type names them explicitly. `usec` is `None`
/// for variants that do not carry a timestamp on the wire (this mirrors the
/// design note that field presence is a property of the variant, decided by
/// the codec at decode time, not probed at runtime).
#[derive(Debug, Clone)]
pub struct Frame {
    pub src_system: u8,
    pub src_component: u8,
    pub usec: Option<u64>,
    pub body: WireMessage,
}

impl Frame {
    pub fn type_name(&self) -> &str {
        self.body.type_name()
    }
}

/// Converts raw bytes to/from [`Frame`]s. Implementations own any internal
/// buffering needed to reassemble frames split across `recv()` calls.
pub trait FrameCodec: Send {
    /// Feed newly received bytes in; returns zero or more fully decoded
    /// frames. Must never block and must never panic on garbage input —
    /// unparsable spans become `WireMessage::BadData` frames instead of an
    /// `Err`, matching §4.5's "bad data" counting path.
    fn feed(&mut self, bytes: &[u8]) -> Vec<Frame>;

    /// Serialize a frame back to wire bytes, e.g. for re-posting a message
    /// into a link's own history (§4.2) or mirroring it to an Output link.
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EngineError>;
}

/// Length-prefixed bincode framing: `[u32 little-endian length][bincode(WireMessage envelope)]`.
#[derive(Default)]
pub struct SimpleCodec {
    buf: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    src_system: u8,
    src_component: u8,
    usec: Option<u64>,
    body: WireMessage,
}

impl SimpleCodec {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }
}

impl FrameCodec for SimpleCodec {
    fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();

        loop {
            if self.buf.len() < 4 {
                break;
            }
            let len = u32::from_le_bytes(self.buf[0..4].try_into().unwrap()) as usize;
            if len > 16 * 1024 * 1024 {
                // Clearly not a real frame boundary; drop one byte and resync,
                // reporting the skipped byte as bad data.
                out.push(Frame {
                    src_system: 0,
                    src_component: 0,
                    usec: None,
                    body: WireMessage::BadData {
                        bytes: self.buf.drain(0..1).collect(),
                    },
                });
                continue;
            }
            if self.buf.len() < 4 + len {
                break;
            }
            let payload: Vec<u8> = self.buf.drain(0..4 + len).skip(4).collect();
            match bincode::deserialize::<WireEnvelope>(&payload) {
                Ok(env) => out.push(Frame {
                    src_system: env.src_system,
                    src_component: env.src_component,
                    usec: env.usec,
                    body: env.body,
                }),
                Err(_) => out.push(Frame {
                    src_system: 0,
                    src_component: 0,
                    usec: None,
                    body: WireMessage::BadData { bytes: payload },
                }),
            }
        }

        out
    }

    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, EngineError> {
        let env = WireEnvelope {
            src_system: frame.src_system,
            src_component: frame.src_component,
            usec: frame.usec,
            body: frame.body.clone(),
        };
        let payload = bincode::serialize(&env).map_err(|e| EngineError::Parse(e.to_string()))?;
        let len = payload.len() as u32;
        let mut out = Vec::with_capacity(4 + payload.len());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_heartbeat() {
        let codec = SimpleCodec::new();
        let frame = Frame {
            src_system: 1,
            src_component: 2,
            usec: Some(42),
            body: WireMessage::Heartbeat {
                base_mode: 0,
                custom_mode: 0,
                autopilot: 3,
            },
        };
        let bytes = codec.encode(&frame).unwrap();

        let mut decoder = SimpleCodec::new();
        let decoded = decoder.feed(&bytes);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].src_system, 1);
        assert_eq!(decoded[0].usec, Some(42));
        assert_eq!(decoded[0].type_name(), "HEARTBEAT");
    }

    #[test]
    fn reassembles_split_frames() {
        let codec = SimpleCodec::new();
        let frame = Frame {
            src_system: 1,
            src_component: 1,
            usec: None,
            body: WireMessage::StatusText {
                severity: 6,
                text: "boot".into(),
            },
        };
        let bytes = codec.encode(&frame).unwrap();
        let (first, second) = bytes.split_at(bytes.len() / 2);

        let mut decoder = SimpleCodec::new();
        assert!(decoder.feed(first).is_empty());
        let decoded = decoder.feed(second);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].type_name(), "STATUSTEXT");
    }

    #[test]
    fn garbage_becomes_bad_data() {
        let mut decoder = SimpleCodec::new();
        let mut len = 4u32.to_le_bytes().to_vec();
        len.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        let decoded = decoder.feed(&len);
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].body.is_bad_data());
    }
}

//! Live-tunable settings (§6), plus a `defaults` module for their starting
//! values.

/// Default configuration values.
pub mod defaults {
    pub const STREAMRATE: i64 = 4;
    pub const SOURCE_SYSTEM: i64 = 255;
    pub const BAUDRATE: u32 = 115200;
}

/// All operator-tunable named integers from §6's settings table. Mutation
/// is always by name (`set <name> <value>`), so storage is a flat struct
/// with a name-indexed getter/setter rather than a `HashMap<String, i64>` —
/// the set of names is fixed and known at compile time.
#[derive(Debug, Clone)]
pub struct Settings {
    pub link: i64,
    pub altreadout: i64,
    pub distreadout: i64,
    pub battreadout: i64,
    pub basealtitude: i64,
    pub heartbeat: i64,
    pub numcells: i64,
    pub speech: i64,
    pub mavfwd: i64,
    pub streamrate: i64,
    pub streamrate2: i64,
    pub heartbeatreport: i64,
    pub radiosetup: i64,
    pub rc1mul: i64,
    pub rc2mul: i64,
    pub rc4mul: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            link: 1,
            altreadout: 10,
            distreadout: 200,
            battreadout: 0,
            basealtitude: -1,
            heartbeat: 1,
            numcells: 0,
            speech: 0,
            mavfwd: 1,
            streamrate: defaults::STREAMRATE,
            streamrate2: defaults::STREAMRATE,
            heartbeatreport: 1,
            radiosetup: 0,
            rc1mul: 1,
            rc2mul: 1,
            rc4mul: 1,
        }
    }
}

impl Settings {
    pub fn get(&self, name: &str) -> Option<i64> {
        Some(match name {
            "link" => self.link,
            "altreadout" => self.altreadout,
            "distreadout" => self.distreadout,
            "battreadout" => self.battreadout,
            "basealtitude" => self.basealtitude,
            "heartbeat" => self.heartbeat,
            "numcells" => self.numcells,
            "speech" => self.speech,
            "mavfwd" => self.mavfwd,
            "streamrate" => self.streamrate,
            "streamrate2" => self.streamrate2,
            "heartbeatreport" => self.heartbeatreport,
            "radiosetup" => self.radiosetup,
            "rc1mul" => self.rc1mul,
            "rc2mul" => self.rc2mul,
            "rc4mul" => self.rc4mul,
            _ => return None,
        })
    }

    pub fn set(&mut self, name: &str, value: i64) -> bool {
        match name {
            "link" => self.link = value,
            "altreadout" => self.altreadout = value,
            "distreadout" => self.distreadout = value,
            "battreadout" => self.battreadout = value,
            "basealtitude" => self.basealtitude = value,
            "heartbeat" => self.heartbeat = value,
            "numcells" => self.numcells = value,
            "speech" => self.speech = value,
            "mavfwd" => self.mavfwd = value,
            "streamrate" => self.streamrate = value,
            "streamrate2" => self.streamrate2 = value,
            "heartbeatreport" => self.heartbeatreport = value,
            "radiosetup" => self.radiosetup = value,
            "rc1mul" => self.rc1mul = value,
            "rc2mul" => self.rc2mul = value,
            "rc4mul" => self.rc4mul = value,
            _ => return false,
        }
        true
    }

    pub fn all(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("link", self.link),
            ("altreadout", self.altreadout),
            ("distreadout", self.distreadout),
            ("battreadout", self.battreadout),
            ("basealtitude", self.basealtitude),
            ("heartbeat", self.heartbeat),
            ("numcells", self.numcells),
            ("speech", self.speech),
            ("mavfwd", self.mavfwd),
            ("streamrate", self.streamrate),
            ("streamrate2", self.streamrate2),
            ("heartbeatreport", self.heartbeatreport),
            ("radiosetup", self.radiosetup),
            ("rc1mul", self.rc1mul),
            ("rc2mul", self.rc2mul),
            ("rc4mul", self.rc4mul),
        ]
    }
}

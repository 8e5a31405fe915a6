//! Command-line interface (§6): flags controlling links, outputs, logging,
//! and the fixed (non-`set`table) protocol parameters.

use clap::builder::styling::{AnsiColor, Styles};
use clap::Parser;

/// Matches clap v3's default coloring.
fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Ground-control link-multiplexing proxy.
///
/// Bridges one or more autopilot links to any number of ground-side
/// consumers, handling link failover, a journaled record of everything seen,
/// and an interactive operator command surface on stdin.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None, styles = styles())]
pub struct Args {
    /// Autopilot link to connect to (repeatable). First one given is the
    /// preferred/master link. Accepts `tcp:host:port`, `host:port` (UDP),
    /// a serial device path, or a path ending in `.elf` (spawn as a child
    /// process and talk over its stdio).
    #[arg(long = "master", help_heading = "Links", required = true, num_args = 1..)]
    pub master: Vec<String>,

    /// Ground-side consumer to fan traffic out to (repeatable).
    #[arg(long = "out", help_heading = "Links")]
    pub out: Vec<String>,

    /// Serial baud rate for any serial master links.
    #[arg(long, default_value_t = crate::settings::defaults::BAUDRATE, help_heading = "Links")]
    pub baudrate: u32,

    /// Do not raise DTR when closing a serial link.
    #[arg(long, help_heading = "Links")]
    pub nodtr: bool,

    /// `host:port` of a SITL instance to receive raw RC-override packets on,
    /// instead of folding overrides into protocol frames on the master link.
    #[arg(long, help_heading = "Links")]
    pub sitl: Option<String>,

    /// Path to the parsed-log file. The companion raw log is the same path
    /// with `.raw` appended. Defaults to a dated `<aircraft>/logs/...` path
    /// when `--aircraft` is given, else `mav.log` in the working directory.
    #[arg(long, help_heading = "Logging")]
    pub logfile: Option<String>,

    /// Append to existing log files instead of truncating them.
    #[arg(long, help_heading = "Logging")]
    pub append_log: bool,

    /// Aircraft name, used to select the dated log directory.
    #[arg(long, help_heading = "Logging")]
    pub aircraft: Option<String>,

    /// Initial value for the `streamrate` setting.
    #[arg(long, default_value_t = crate::settings::defaults::STREAMRATE, help_heading = "Protocol")]
    pub streamrate: i64,

    /// Source system id this proxy identifies itself as.
    #[arg(long, default_value_t = crate::settings::defaults::SOURCE_SYSTEM, help_heading = "Protocol")]
    pub source_system: i64,

    /// Fixed target system id; -1 to adopt it from the first heartbeat seen.
    #[arg(long, default_value_t = -1, help_heading = "Protocol")]
    pub target_system: i64,

    /// Fixed target component id; -1 to adopt it from the first heartbeat seen.
    #[arg(long, default_value_t = -1, help_heading = "Protocol")]
    pub target_component: i64,

    /// Initial battery cell count.
    #[arg(long, default_value_t = 0, help_heading = "Protocol")]
    pub num_cells: i64,

    /// Start in setup mode (raw pass-through to the master link).
    #[arg(long, help_heading = "Protocol")]
    pub setup: bool,

    /// Announce battery/status text over a speech interface (no-op here;
    /// accepted for compatibility with existing operator habits).
    #[arg(long, help_heading = "Protocol")]
    pub speech: bool,

    /// Use the legacy 1.0 wire dialect instead of 2.0 framing.
    #[arg(long, help_heading = "Protocol")]
    pub mav10: bool,

    /// Treat `SERVO_OUTPUT_RAW` as four quadcopter motor throttles (scaled
    /// against `RC3`'s limits) instead of fixed-wing aileron/elevator/rudder/throttle.
    #[arg(long, help_heading = "Protocol")]
    pub quadcopter: bool,

    /// Print every dropped/unparsable frame instead of warning once per link.
    #[arg(long, help_heading = "Output and Logging")]
    pub show_errors: bool,

    /// Write the detailed log to this file or "stderr" instead of the
    /// default dated log file.
    #[arg(long, help_heading = "Output and Logging")]
    pub log_file: Option<String>,

    /// Silence user-facing informational output on stdout.
    #[arg(short = 'q', long, help_heading = "Output and Logging")]
    pub quiet: bool,

    /// Increase diagnostic log verbosity on stderr/log file.
    ///  -v: debug
    ///  -vv and above: trace
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "Output and Logging")]
    pub verbose: u8,
}

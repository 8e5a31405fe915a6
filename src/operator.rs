//! Operator Command Surface (§4.*, §6): parses operator lines into a typed
//! command the engine then applies. Parsing is pure and independently
//! testable; side effects live in `engine.rs` since they need engine state
//! (current master, waypoint loader, settings, ...).

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    Switch(u8),
    Rc { channel: u8, pwm: i32 },
    WpList,
    WpLoad(String),
    WpSave(String),
    WpSet(u16),
    WpClear,
    ParamFetch,
    ParamSet { name: String, value: f32 },
    ParamShow,
    ParamSave(String),
    ParamLoad(String),
    Setup,
    SetupExit,
    SetupLine(String),
    Reset,
    Status(Option<String>),
    Trim,
    Mode(FlightModeCommand),
    Set { name: Option<String>, value: Option<i64> },
    Bat,
    Link,
    Up(Option<f64>),
    Arm,
    Disarm,
    Accelcal,
    CompassCal,
    Help,
    Unknown(String),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightModeCommand {
    Auto,
    Manual,
    Loiter,
    Rtl,
    Ground,
}

/// Parses one operator line. In setup mode the caller must not route
/// through this parser at all (§6: "any line is written verbatim ... the
/// literal line `.` exits setup") — that's handled directly by the engine
/// before reaching general dispatch; [`OperatorCommand::SetupLine`] and
/// [`OperatorCommand::SetupExit`] exist for that caller to use explicitly.
pub fn parse_line(line: &str) -> OperatorCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return OperatorCommand::Empty;
    }
    let mut parts = trimmed.split_whitespace();
    let cmd = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    match cmd {
        "switch" => args
            .first()
            .and_then(|v| v.parse().ok())
            .map(OperatorCommand::Switch)
            .unwrap_or(OperatorCommand::Unknown(trimmed.to_string())),
        "rc" => {
            if args.len() == 2 {
                match (args[0].parse::<u8>(), args[1].parse::<i32>()) {
                    (Ok(channel), Ok(pwm)) => OperatorCommand::Rc { channel, pwm },
                    _ => OperatorCommand::Unknown(trimmed.to_string()),
                }
            } else {
                OperatorCommand::Unknown(trimmed.to_string())
            }
        }
        "wp" => match args.first().copied() {
            Some("list") => OperatorCommand::WpList,
            Some("load") if args.len() == 2 => OperatorCommand::WpLoad(args[1].to_string()),
            Some("save") if args.len() == 2 => OperatorCommand::WpSave(args[1].to_string()),
            Some("set") if args.len() == 2 => args[1]
                .parse()
                .map(OperatorCommand::WpSet)
                .unwrap_or(OperatorCommand::Unknown(trimmed.to_string())),
            Some("clear") => OperatorCommand::WpClear,
            _ => OperatorCommand::Unknown(trimmed.to_string()),
        },
        "param" => match args.first().copied() {
            Some("fetch") => OperatorCommand::ParamFetch,
            Some("show") => OperatorCommand::ParamShow,
            Some("set") if args.len() == 3 => match args[2].parse::<f32>() {
                Ok(value) => OperatorCommand::ParamSet {
                    name: args[1].to_string(),
                    value,
                },
                Err(_) => OperatorCommand::Unknown(trimmed.to_string()),
            },
            Some("save") if args.len() == 2 => OperatorCommand::ParamSave(args[1].to_string()),
            Some("load") if args.len() == 2 => OperatorCommand::ParamLoad(args[1].to_string()),
            _ => OperatorCommand::Unknown(trimmed.to_string()),
        },
        "setup" => OperatorCommand::Setup,
        "reset" => OperatorCommand::Reset,
        "status" => OperatorCommand::Status(args.first().map(|s| s.to_string())),
        "trim" => OperatorCommand::Trim,
        "auto" => OperatorCommand::Mode(FlightModeCommand::Auto),
        "manual" => OperatorCommand::Mode(FlightModeCommand::Manual),
        "loiter" => OperatorCommand::Mode(FlightModeCommand::Loiter),
        "rtl" => OperatorCommand::Mode(FlightModeCommand::Rtl),
        "ground" => OperatorCommand::Mode(FlightModeCommand::Ground),
        "set" => OperatorCommand::Set {
            name: args.first().map(|s| s.to_string()),
            value: args.get(1).and_then(|v| v.parse().ok()),
        },
        "bat" => OperatorCommand::Bat,
        "link" => OperatorCommand::Link,
        "up" => OperatorCommand::Up(args.first().and_then(|v| v.parse().ok())),
        "arm" => OperatorCommand::Arm,
        "disarm" => OperatorCommand::Disarm,
        "accelcal" => OperatorCommand::Accelcal,
        "compassmot" | "compasscal" => OperatorCommand::CompassCal,
        "help" => OperatorCommand::Help,
        _ => OperatorCommand::Unknown(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_switch() {
        assert_eq!(parse_line("switch 3"), OperatorCommand::Switch(3));
    }

    #[test]
    fn parses_rc_with_negative_one_as_release_pwm() {
        assert_eq!(
            parse_line("rc 1 -1"),
            OperatorCommand::Rc {
                channel: 1,
                pwm: -1
            }
        );
    }

    #[test]
    fn parses_wp_load() {
        assert_eq!(
            parse_line("wp load ten_wp.txt"),
            OperatorCommand::WpLoad("ten_wp.txt".to_string())
        );
    }

    #[test]
    fn parses_param_set() {
        assert_eq!(
            parse_line("param set FOO 1.5"),
            OperatorCommand::ParamSet {
                name: "FOO".to_string(),
                value: 1.5
            }
        );
    }

    #[test]
    fn blank_line_is_empty() {
        assert_eq!(parse_line("   "), OperatorCommand::Empty);
    }

    #[test]
    fn unrecognized_command_is_unknown() {
        assert_eq!(
            parse_line("frobnicate"),
            OperatorCommand::Unknown("frobnicate".to_string())
        );
    }

    #[test]
    fn parses_flight_mode_words() {
        assert_eq!(parse_line("auto"), OperatorCommand::Mode(FlightModeCommand::Auto));
        assert_eq!(parse_line("rtl"), OperatorCommand::Mode(FlightModeCommand::Rtl));
    }
}

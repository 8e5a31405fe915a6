//! Stdout log formatting: whole-line color by level, no timestamp or level
//! tag clutter on the user-facing stream. Uses plain ANSI escapes rather
//! than a coloring crate (see DESIGN.md) since that's all this needs.

use std::fmt;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

const RESET: &str = "\x1b[0m";
const WHITE: &str = "\x1b[37m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const PURPLE: &str = "\x1b[35m";

pub struct ColorizedFormatter;

impl<S, N> FormatEvent<S, N> for ColorizedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut buffer = String::new();
        let mut buf_writer = Writer::new(&mut buffer);
        ctx.format_fields(buf_writer.by_ref(), event)?;

        let color = match *event.metadata().level() {
            Level::INFO => WHITE,
            Level::WARN => YELLOW,
            Level::ERROR => RED,
            Level::DEBUG => BLUE,
            Level::TRACE => PURPLE,
        };

        writeln!(writer, "{color}{buffer}{RESET}")
    }
}

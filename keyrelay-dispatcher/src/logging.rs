//! Log sink setup
//!
//! Every event is written as one line:
//!
//! ```text
//! 2025-03-01T12:00:00.123456Z - keyrelay_dispatcher::worker - INFO - API response: status 200, resp {"status":"OK"}
//! ```
//!
//! The four fields are separated by `" - "` so that the
//! [`analysis`](crate::analysis) module can split them back out. Warnings are
//! spelled `WARNING`.

use anyhow::Result;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

/// Separator between the fields of a log line
pub const FIELD_SEPARATOR: &str = " - ";

/// Event formatter producing `<time> - <target> - <LEVEL> - <message>`
#[derive(Debug, Default, Clone)]
pub struct LineFormat {
    timer: SystemTime,
}

pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        self.timer.format_time(&mut writer)?;
        write!(
            writer,
            "{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}",
            meta.target(),
            level_name(meta.level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber
///
/// `level` seeds the filter for both workspace crates; `RUST_LOG` directives
/// are honored on top. With `log_file` set, lines are appended to that file
/// as well as written to stdout.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("keyrelay_dispatcher={level}").parse()?)
        .add_directive(format!("keyrelay={level}").parse()?);

    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(std::io::stdout.and(Arc::new(file)))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .event_format(LineFormat::default())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

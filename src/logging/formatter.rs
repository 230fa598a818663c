//! Compact single-line event formatter for terminal output.
//!
//! `HH:MM:SS.mmm LEVEL target: span{fields}: message key=value ...`

use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;
use yansi::{Paint, Style};

pub struct CustomPrettyFormatter;

fn level_style(level: &Level) -> Style {
    match *level {
        Level::ERROR => Style::new().red().bold(),
        Level::WARN => Style::new().yellow().bold(),
        Level::INFO => Style::new().green(),
        Level::DEBUG => Style::new().blue(),
        Level::TRACE => Style::new().magenta(),
    }
}

impl<S, N> FormatEvent<S, N> for CustomPrettyFormatter
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
        let ansi = writer.has_ansi_escapes();
        let styled = |style: Style| if ansi { style } else { Style::new() };
        let meta = event.metadata();

        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
        write!(writer, "{} ", timestamp.paint(styled(Style::new().dim())))?;
        write!(
            writer,
            "{:>5} ",
            meta.level().as_str().paint(styled(level_style(meta.level())))
        )?;
        write!(writer, "{}: ", meta.target().paint(styled(Style::new().dim())))?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name().paint(styled(Style::new().bold())))?;
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>()
                    && !fields.is_empty()
                {
                    write!(writer, "{{{fields}}}")?;
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

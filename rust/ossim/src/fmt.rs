//! Compact formatting helpers for log output.

use std::cell::Cell;
use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::types::Tick;

thread_local! {
    static SIM_TICK: Cell<Tick> = const { Cell::new(0) };
}

/// Current simulated tick as last published by the engine on this thread.
pub fn sim_tick() -> Tick {
    SIM_TICK.with(|t| t.get())
}

/// Publish the simulated tick for the log formatter. Called by the engine
/// at the top of every loop iteration.
pub fn set_sim_tick(tick: Tick) {
    SIM_TICK.with(|t| t.set(tick));
}

/// Format a number with underscore-separated groups of three digits.
pub fn fmt_grouped(v: u64) -> String {
    let digits = v.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('_');
        }
        out.push(c);
    }
    out
}

/// Tick stamp for log lines: grouped digits, right-aligned in 9 columns.
///
/// - `[        0]`
/// - `[   12_345]`
pub struct FmtTick(pub Tick);

impl fmt::Display for FmtTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>9}]", fmt_grouped(self.0))
    }
}

/// `tracing_subscriber` event format that stamps each line with the
/// simulated tick instead of wall-clock time.
pub struct SimFormat;

impl<S, N> FormatEvent<S, N> for SimFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{} ", FmtTick(sim_tick()))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::ERROR => "\x1b[31m",
                Level::WARN => "\x1b[33m",
                Level::INFO => "\x1b[32m",
                Level::DEBUG => "\x1b[34m",
                Level::TRACE => "\x1b[35m",
            };
            write!(writer, "{color}{level:>5}\x1b[0m ")?;
        } else {
            write!(writer, "{level:>5} ")?;
        }

        let mut line = LogLine::default();
        event.record(&mut line);
        let message = line
            .message
            .as_deref()
            .unwrap_or_else(|| event.metadata().target());
        writeln!(writer, "{message}{}", line.fields)
    }
}

/// Message and ` key=value` pairs of one event, rendered as they are
/// visited. Reals get two decimals; strings with spaces are quoted.
#[derive(Default)]
struct LogLine {
    message: Option<String>,
    fields: String,
}

impl LogLine {
    fn push(&mut self, field: &Field, value: impl fmt::Display) {
        use std::fmt::Write as _;
        let _ = write!(self.fields, " {}={value}", field.name());
    }
}

impl Visit for LogLine {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            self.push(field, format_args!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else if value.contains(char::is_whitespace) {
            self.push(field, format_args!("{value:?}"));
        } else {
            self.push(field, value);
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, format_args!("{value:.2}"));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value);
    }
}

//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use tracing::Level;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Target for stage headers.
pub(crate) const STAGE_TARGET: &str = "dotkit::stage";
/// Target for dry-run lines, also used directly by actions.
pub(crate) const DRY_RUN_TARGET: &str = "dotkit::dry_run";

/// How a single event is rendered, shared by the console and the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Stage,
    DryRun,
    Error,
    Warn,
    Info,
    Debug,
}

impl LineKind {
    fn of(event: &tracing::Event<'_>) -> Self {
        let metadata = event.metadata();
        match (*metadata.level(), metadata.target()) {
            (Level::ERROR, _) => Self::Error,
            (Level::WARN, _) => Self::Warn,
            (Level::INFO, STAGE_TARGET) => Self::Stage,
            (Level::INFO, DRY_RUN_TARGET) => Self::DryRun,
            (Level::INFO, _) => Self::Info,
            _ => Self::Debug,
        }
    }

    /// Plain-text tag written in front of the message in the log file.
    const fn file_tag(self) -> &'static str {
        match self {
            Self::Stage => "==> ",
            Self::DryRun => "    [dry run] ",
            Self::Error => "    [error] ",
            Self::Warn => "    [warn] ",
            Self::Info => "    ",
            Self::Debug => "    [debug] ",
        }
    }
}

/// Collects the `message` field of an event.
#[derive(Default)]
struct Message(String);

impl tracing::field::Visit for Message {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }
}

fn message(event: &tracing::Event<'_>) -> String {
    let mut visitor = Message::default();
    event.record(&mut visitor);
    visitor.0
}

/// Appends every event at `DEBUG` and above to the per-command log file,
/// timestamped and with ANSI codes stripped.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Open `<cache>/dotkit/<command>.log` for appending and write a run
    /// separator.
    ///
    /// Returns `None` if the file cannot be opened; logging then goes to the
    /// console only.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()?;
        let version = option_env!("DOTKIT_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
        writeln!(
            file,
            "\n--- dotkit {version} {command} started {} ---",
            format_utc_datetime()
        )
        .ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let kind = LineKind::of(event);
        let line = format!(
            "[{}] {}{}",
            format_utc_time(),
            kind.file_tag(),
            strip_ansi(&message(event))
        );
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// Console formatter: bold `==>` stage headers, yellow dry-run lines, dim
/// debug lines, coloured warning and error prefixes.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let msg = message(event);
        match LineKind::of(event) {
            LineKind::Stage => writeln!(writer, "\x1b[1;36m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            LineKind::DryRun => writeln!(writer, "  \x1b[33m[dry run]\x1b[0m {msg}"),
            LineKind::Error => writeln!(writer, "\x1b[1;31merror:\x1b[0m {msg}"),
            LineKind::Warn => writeln!(writer, "\x1b[33mwarning:\x1b[0m {msg}"),
            LineKind::Info => writeln!(writer, "  {msg}"),
            LineKind::Debug => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Install the global subscriber for a run of `command`.
///
/// Warnings and errors go to stderr and everything else to stdout, filtered
/// at `INFO` (or `DEBUG` when `verbose`). The file layer always records
/// `DEBUG` and above. Call once, before any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let make_writer = std::io::stderr
        .with_max_level(Level::WARN)
        .and(std::io::stdout.with_min_level(Level::INFO));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(ConsoleFormatter)
                .with_writer(make_writer)
                .with_filter(console_level),
        )
        .with(FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG)))
        .init();
}

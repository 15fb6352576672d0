/// Structured logging for the river-flow reconciliation service
///
/// Provides context-rich logging with source tags, optional context ids
/// (a year, a file path), timestamps, and severity levels. There is no
/// global logger: a `Logger` is built once and passed by reference to every
/// component, so tests can capture output with a `MemorySink`.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The WAPDA river-flow page (live or replayed).
    Wapda,
    /// The persisted CSV file.
    Csv,
    /// The reconciliation engine.
    Merge,
    System,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Wapda => write!(f, "WAPDA"),
            Source::Csv => write!(f, "CSV"),
            Source::Merge => write!(f, "MERGE"),
            Source::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the requested year simply has no table yet
    Expected,
    /// Unexpected failure - network trouble or a changed page layout
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a fetch failure based on its error message.
pub fn classify_fetch_failure(error_message: &str) -> FailureType {
    if error_message.contains("No replay page") {
        FailureType::Expected
    } else if error_message.contains("HTTP") || error_message.contains("timed out") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for formatted log entries.
pub trait LogSink: Send {
    fn write_entry(&self, level: LogLevel, entry: &str, short: &str);
}

/// Writes to stdout/stderr. Warnings and errors go to stderr.
pub struct ConsoleSink {
    /// Whether to print the full timestamped entry or just the message
    pub timestamps: bool,
}

impl LogSink for ConsoleSink {
    fn write_entry(&self, level: LogLevel, entry: &str, short: &str) {
        if self.timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", entry),
                _ => println!("{}", entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}", short),
                LogLevel::Warning => eprintln!("   ⚠ {}", short),
                LogLevel::Info => println!("   {}", short),
                LogLevel::Debug => println!("   [DEBUG] {}", short),
            }
        }
    }
}

/// Appends timestamped entries to a file.
pub struct FileSink {
    pub path: String,
}

impl FileSink {
    fn append(&self, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

impl LogSink for FileSink {
    fn write_entry(&self, _level: LogLevel, entry: &str, _short: &str) {
        if let Err(e) = self.append(entry) {
            eprintln!("Failed to write to log file {}: {}", self.path, e);
        }
    }
}

/// Keeps entries in memory. Clones share the same buffer, so a test can
/// hand one clone to the logger and read from the other.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured entries without timestamps, e.g. `"INFO MERGE: saved"`.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().map(|(_, l)| l.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn count_at(&self, level: LogLevel) -> usize {
        match self.lines.lock() {
            Ok(lines) => lines.iter().filter(|(l, _)| *l == level).count(),
            Err(_) => 0,
        }
    }
}

impl LogSink for MemorySink {
    fn write_entry(&self, level: LogLevel, _entry: &str, short: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, format!("{} {}", level, short)));
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

pub struct Logger {
    /// Minimum log level to emit
    min_level: LogLevel,
    sinks: Vec<Box<dyn LogSink>>,
}

impl Logger {
    pub fn new(min_level: LogLevel) -> Self {
        Logger {
            min_level,
            sinks: Vec::new(),
        }
    }

    /// A logger that drops everything.
    pub fn silent() -> Self {
        Logger::new(LogLevel::Error)
    }

    /// Console logger plus an optional log file, as used by the binary.
    pub fn console(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) -> Self {
        let mut logger = Logger::new(min_level).with_sink(ConsoleSink {
            timestamps: console_timestamps,
        });
        if let Some(path) = log_file {
            logger = logger.with_sink(FileSink {
                path: path.to_string(),
            });
        }
        logger
    }

    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn log(&self, level: LogLevel, source: Source, context: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let context_part = context.map(|c| format!(" [{}]", c)).unwrap_or_default();
        let short = format!("{}{}: {}", source, context_part, message);
        let entry = format!("{} {} {}", timestamp, level, short);

        for sink in &self.sinks {
            sink.write_entry(level, &entry, &short);
        }
    }

    pub fn info(&self, source: Source, context: Option<&str>, message: &str) {
        self.log(LogLevel::Info, source, context, message);
    }

    pub fn warn(&self, source: Source, context: Option<&str>, message: &str) {
        self.log(LogLevel::Warning, source, context, message);
    }

    pub fn error(&self, source: Source, context: Option<&str>, message: &str) {
        self.log(LogLevel::Error, source, context, message);
    }

    pub fn debug(&self, source: Source, context: Option<&str>, message: &str) {
        self.log(LogLevel::Debug, source, context, message);
    }

    /// Log a fetch failure with automatic classification
    pub fn fetch_failure(&self, year: i32, err: &dyn std::error::Error) {
        let error_msg = err.to_string();
        let failure_type = classify_fetch_failure(&error_msg);
        let context = year.to_string();
        let message = format!("fetch failed [{}]: {}", failure_type, error_msg);

        match failure_type {
            FailureType::Expected => self.debug(Source::Wapda, Some(&context), &message),
            FailureType::Unexpected => self.error(Source::Wapda, Some(&context), &message),
            FailureType::Unknown => self.warn(Source::Wapda, Some(&context), &message),
        }

        // Walk the cause chain so the whole failure lands in the log.
        let mut cause = err.source();
        while let Some(inner) = cause {
            self.debug(Source::Wapda, Some(&context), &format!("caused by: {}", inner));
            cause = inner.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parses_config_names() {
        assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_memory_sink_captures_entries_above_min_level() {
        let sink = MemorySink::new();
        let logger = Logger::new(LogLevel::Info).with_sink(sink.clone());

        logger.debug(Source::Merge, None, "hidden");
        logger.info(Source::Csv, Some("riverflow.csv"), "loaded 10 rows");
        logger.warn(Source::Merge, None, "careful");

        assert_eq!(
            sink.lines(),
            vec![
                "INFO CSV [riverflow.csv]: loaded 10 rows".to_string(),
                "WARN MERGE: careful".to_string(),
            ]
        );
        assert_eq!(sink.count_at(LogLevel::Warning), 1);
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(classify_fetch_failure("HTTP error: 503"), FailureType::Unexpected);
        assert_eq!(classify_fetch_failure("request timed out"), FailureType::Unexpected);
        assert_eq!(
            classify_fetch_failure("No replay page for 2024"),
            FailureType::Expected
        );
        assert_eq!(classify_fetch_failure("No table on page"), FailureType::Unknown);
    }

    #[test]
    fn test_fetch_failure_logs_at_classified_level() {
        let sink = MemorySink::new();
        let logger = Logger::new(LogLevel::Debug).with_sink(sink.clone());
        let err: Box<dyn std::error::Error> = "HTTP error: 500".into();

        logger.fetch_failure(2024, err.as_ref());

        assert_eq!(sink.count_at(LogLevel::Error), 1);
        assert!(sink.contains("WAPDA [2024]: fetch failed [UNEXPECTED]"));
    }
}

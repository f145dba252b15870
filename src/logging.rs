//! Date-rotated file logging
//!
//! The crate logs through `tracing`. [`init`] installs a subscriber that
//! writes to `<directory>/<YYYYMMDD><suffix>`, starting a new file when the
//! local date changes and deleting files older than the retention window.
//! Failures to write or clean up log files are ignored.

use crate::core::error::{DatabaseError, Result};
use chrono::{Local, NaiveDate};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;

pub const DEFAULT_LOG_DIRECTORY: &str = "./logs";
pub const DEFAULT_FILE_SUFFIX: &str = "_Log.log";
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

const DATE_STAMP_FORMAT: &str = "%Y%m%d";

/// Where log files go and how long they are kept
///
/// Setters never fail: an invalid value leaves the default in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    directory: PathBuf,
    file_suffix: String,
    retention_days: u32,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            file_suffix: DEFAULT_FILE_SUFFIX.to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl LogSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory for log files; empty input keeps the default
    #[must_use]
    pub fn directory(mut self, directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();
        self.directory = if directory.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_LOG_DIRECTORY)
        } else {
            directory.to_path_buf()
        };
        self
    }

    /// File name suffix after the date stamp
    ///
    /// Blank suffixes and suffixes containing path separators keep the
    /// default.
    #[must_use]
    pub fn file_suffix(mut self, suffix: &str) -> Self {
        let valid = !suffix.trim().is_empty() && !suffix.contains(['/', '\\']);
        self.file_suffix = if valid {
            suffix.to_string()
        } else {
            DEFAULT_FILE_SUFFIX.to_string()
        };
        self
    }

    /// Days to keep log files; zero or negative keeps the default
    #[must_use]
    pub fn retention_days(mut self, days: i64) -> Self {
        self.retention_days = u32::try_from(days)
            .ok()
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_RETENTION_DAYS);
        self
    }

    pub fn log_directory(&self) -> &Path {
        &self.directory
    }

    pub fn suffix(&self) -> &str {
        &self.file_suffix
    }

    pub fn retention(&self) -> u32 {
        self.retention_days
    }

    /// Log file for `date`
    pub fn file_path_for(&self, date: NaiveDate) -> PathBuf {
        self.directory
            .join(format!("{}{}", date.format(DATE_STAMP_FORMAT), self.file_suffix))
    }
}

/// Severity of a message passed to [`write_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Error,
    Debug,
    Warning,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
        }
    }

    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emit one message at `level`
pub fn write_message(level: LogLevel, text: &str) {
    match level {
        LogLevel::Error => tracing::error!("{}", text),
        LogLevel::Debug => tracing::debug!("{}", text),
        LogLevel::Warning => tracing::warn!("{}", text),
        LogLevel::Info => tracing::info!("{}", text),
    }
}

/// Emit an error with its chain of causes
pub fn write_error(error: &dyn std::error::Error) {
    let mut causes = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }

    if causes.is_empty() {
        tracing::error!(error = %error, "error");
    } else {
        tracing::error!(error = %error, caused_by = %causes.join(": "), "error");
    }
}

/// [`MakeWriter`] appending to the current day's log file
#[derive(Debug)]
pub struct DailyFileWriter {
    settings: LogSettings,
    last_cleanup: Mutex<Option<NaiveDate>>,
}

impl DailyFileWriter {
    pub fn new(settings: LogSettings) -> Self {
        Self {
            settings,
            last_cleanup: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }

    fn open_for(&self, today: NaiveDate) -> Option<File> {
        {
            let mut last = self.last_cleanup.lock();
            if *last != Some(today) {
                *last = Some(today);
                cleanup_expired(&self.settings, today);
            }
        }

        fs::create_dir_all(&self.settings.directory).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.settings.file_path_for(today))
            .ok()
    }
}

impl<'a> MakeWriter<'a> for DailyFileWriter {
    type Writer = LogFile;

    fn make_writer(&'a self) -> Self::Writer {
        LogFile(self.open_for(Local::now().date_naive()))
    }
}

/// One write handle to a log file; swallows I/O failures
#[derive(Debug)]
pub struct LogFile(Option<File>);

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = self.0.as_mut() {
            if file.write_all(buf).is_err() {
                self.0 = None;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.0.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

/// Delete log files dated more than the retention window before `today`
///
/// Only files named `<YYYYMMDD><suffix>` are considered. Returns how many
/// were removed.
pub fn cleanup_expired(settings: &LogSettings, today: NaiveDate) -> usize {
    let Some(cutoff) = today.checked_sub_days(chrono::Days::new(settings.retention_days as u64))
    else {
        return 0;
    };
    let Ok(entries) = fs::read_dir(&settings.directory) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(stamp) = name.strip_suffix(settings.file_suffix.as_str()) else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(stamp, DATE_STAMP_FORMAT) else {
            continue;
        };
        if date < cutoff && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Install the global subscriber writing to daily log files
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init(settings: &LogSettings) -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(DailyFileWriter::new(settings.clone()))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .map_err(|e| DatabaseError::other(format!("failed to install log subscriber: {}", e)))
}

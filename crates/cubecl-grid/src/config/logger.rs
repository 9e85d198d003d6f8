use super::GlobalConfig;
use super::dispatch::DispatchLogLevel;
use core::fmt::Display;
use std::sync::Arc;

#[cfg(std_io)]
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::PathBuf,
};

/// Configuration for logging in CubeCL, parameterized by a log level type.
///
/// Note that you can use multiple outputs at the same time.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(bound = "")]
pub struct LoggerConfig<L: LogLevel> {
    /// Path to the log file, if file logging is enabled (requires `std` feature).
    #[serde(default)]
    #[cfg(std_io)]
    pub file: Option<PathBuf>,

    /// Whether to append to the log file (true) or overwrite it (false). Defaults to true.
    #[serde(default = "append_default")]
    pub append: bool,

    /// Whether to log to standard output.
    #[serde(default)]
    pub stdout: bool,

    /// Whether to log to standard error.
    #[serde(default)]
    pub stderr: bool,

    /// Optional crate-level logging configuration (e.g., info, debug, trace).
    #[serde(default)]
    pub log: Option<LogCrateLevel>,

    /// The log level for this logger, determining verbosity.
    #[serde(default)]
    pub level: L,
}

impl<L: LogLevel> Default for LoggerConfig<L> {
    fn default() -> Self {
        Self {
            #[cfg(std_io)]
            file: None,
            append: true,
            stdout: false,
            stderr: false,
            log: None,
            level: L::default(),
        }
    }
}

/// Log levels using the `log` crate.
///
/// This enum defines verbosity levels for crate-level logging.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum LogCrateLevel {
    /// Logs informational messages.
    #[default]
    #[serde(rename = "info")]
    Info,

    /// Logs debugging messages.
    #[serde(rename = "debug")]
    Debug,

    /// Logs trace-level messages.
    #[serde(rename = "trace")]
    Trace,
}

fn append_default() -> bool {
    true
}

/// Trait for types that can be used as log levels in `LoggerConfig`.
pub trait LogLevel:
    serde::de::DeserializeOwned + serde::Serialize + Clone + Copy + core::fmt::Debug + Default
{
}

/// Routes dispatch reports to every configured output.
#[derive(Debug)]
pub struct Logger {
    loggers: Vec<LoggerKind>,
    level: DispatchLogLevel,
    /// Global configuration the logger was created from.
    pub config: Arc<GlobalConfig>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a new `Logger` instance based on the global configuration.
    ///
    /// Note that creating a logger is quite expensive.
    pub fn new() -> Self {
        Self::from_config(GlobalConfig::get())
    }

    /// Creates a new `Logger` from the provided configuration.
    pub fn from_config(config: Arc<GlobalConfig>) -> Self {
        let settings = &config.dispatch.logger;
        let level = settings.level;
        let mut loggers = Vec::new();

        if level != DispatchLogLevel::Disabled {
            #[cfg(std_io)]
            if let Some(file) = &settings.file {
                match FileLogger::new(file, settings.append) {
                    Ok(logger) => loggers.push(LoggerKind::File(logger)),
                    Err(err) => log::warn!("Can't open log file {}: {err}", file.display()),
                }
            }

            if settings.stdout {
                loggers.push(LoggerKind::Stdout);
            }

            if settings.stderr {
                loggers.push(LoggerKind::Stderr);
            }

            if let Some(level) = settings.log {
                loggers.push(LoggerKind::Log(level));
            }
        }

        Self {
            loggers,
            level,
            config,
        }
    }

    /// Returns the current dispatch log level.
    pub fn log_level_dispatch(&self) -> DispatchLogLevel {
        self.level
    }

    /// Whether messages logged at `level` reach at least one output.
    pub fn is_enabled(&self, level: DispatchLogLevel) -> bool {
        let rank = |level: DispatchLogLevel| match level {
            DispatchLogLevel::Disabled => 0,
            DispatchLogLevel::Basic => 1,
            DispatchLogLevel::Full => 2,
        };

        !self.loggers.is_empty()
            && level != DispatchLogLevel::Disabled
            && rank(level) <= rank(self.level)
    }

    /// Logs a dispatch message at `level`, directing it to all configured outputs.
    pub fn log_dispatch<S: Display>(&mut self, level: DispatchLogLevel, msg: &S) {
        if !self.is_enabled(level) {
            return;
        }

        for logger in self.loggers.iter_mut() {
            logger.log(msg);
        }
    }
}

/// Represents different types of loggers.
#[derive(Debug)]
enum LoggerKind {
    /// Logs to a file.
    #[cfg(std_io)]
    File(FileLogger),

    /// Logs to standard output.
    Stdout,

    /// Logs to standard error.
    Stderr,

    /// Logs using the `log` crate with a specified level.
    Log(LogCrateLevel),
}

impl LoggerKind {
    fn log<S: Display>(&mut self, msg: &S) {
        match self {
            #[cfg(std_io)]
            LoggerKind::File(file_logger) => file_logger.log(msg),
            LoggerKind::Stdout => println!("{msg}"),
            LoggerKind::Stderr => eprintln!("{msg}"),
            LoggerKind::Log(level) => match level {
                LogCrateLevel::Info => log::info!("{msg}"),
                LogCrateLevel::Debug => log::debug!("{msg}"),
                LogCrateLevel::Trace => log::trace!("{msg}"),
            },
        }
    }
}

/// Logger that writes messages to a file.
#[derive(Debug)]
#[cfg(std_io)]
struct FileLogger {
    writer: BufWriter<File>,
}

#[cfg(std_io)]
impl FileLogger {
    // Creates a new file logger.
    fn new(path: &PathBuf, append: bool) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .append(append)
            .truncate(!append)
            .create(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    // Logs a message to the file, flushing the buffer to ensure immediate write.
    fn log<S: Display>(&mut self, msg: &S) {
        let written = writeln!(self.writer, "{msg}").and_then(|_| self.writer.flush());

        if let Err(err) = written {
            log::warn!("Can't write to the dispatch log file: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: DispatchLogLevel, stdout: bool) -> Arc<GlobalConfig> {
        let mut config = GlobalConfig::default();
        config.dispatch.logger.level = level;
        config.dispatch.logger.stdout = stdout;
        Arc::new(config)
    }

    #[test]
    fn disabled_logger_has_no_output() {
        let logger = Logger::from_config(config(DispatchLogLevel::Disabled, true));

        assert!(!logger.is_enabled(DispatchLogLevel::Basic));
        assert!(!logger.is_enabled(DispatchLogLevel::Full));
    }

    #[test]
    fn levels_are_ordered() {
        let logger = Logger::from_config(config(DispatchLogLevel::Basic, true));

        assert!(logger.is_enabled(DispatchLogLevel::Basic));
        assert!(!logger.is_enabled(DispatchLogLevel::Full));
        assert!(!logger.is_enabled(DispatchLogLevel::Disabled));
    }

    #[test]
    fn level_without_output_is_disabled() {
        let logger = Logger::from_config(config(DispatchLogLevel::Full, false));

        assert!(!logger.is_enabled(DispatchLogLevel::Basic));
    }

    #[cfg(std_io)]
    #[test]
    fn file_logger_writes_messages() {
        let path = std::env::temp_dir().join(format!("cubecl-grid-logger-{}.log", std::process::id()));
        let mut config = GlobalConfig::default();
        config.dispatch.logger.level = DispatchLogLevel::Full;
        config.dispatch.logger.file = Some(path.clone());
        config.dispatch.logger.append = false;

        let mut logger = Logger::from_config(Arc::new(config));
        logger.log_dispatch(DispatchLogLevel::Basic, &"dispatch histogram");
        drop(logger);

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(content, "dispatch histogram\n");
    }
}

//! Process logging setup driven by resolved parameters.
//!
//! Levels follow the familiar VERBOSE..CRITICAL scale and map onto tracing
//! levels. Output goes to stdout (`-`) or is appended to a file.

use crate::cli::CliValues;
use crate::error::{ParamError, Result};
use crate::resolved::Resolved;
use crate::value::Value;
use clap::ValueEnum;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Parameter that, when declared in the defaults, controls the log level.
pub const LOG_LEVEL_PARAM: &str = "log_level";
/// Parameter that, when declared in the defaults, controls the log target.
pub const LOG_PATH_PARAM: &str = "log_path";

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, ValueEnum)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Verbose,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Verbose => "VERBOSE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// Parse a level name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(s, true).ok()
    }

    pub fn to_tracing(self) -> Level {
        match self {
            LogLevel::Verbose => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error | LogLevel::Critical => Level::ERROR,
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    File(PathBuf),
}

impl LogTarget {
    pub fn parse(s: &str) -> Self {
        match s {
            "-" => LogTarget::Stdout,
            path => LogTarget::File(PathBuf::from(path)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub target: LogTarget,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            target: LogTarget::Stdout,
        }
    }
}

impl LogSettings {
    /// Settings from the resolved parameters when they declare
    /// `log_level`/`log_path`, otherwise from the logging flags.
    pub fn from_resolved(resolved: &Resolved, cli: &CliValues) -> Result<Self> {
        let level = match resolved.get(LOG_LEVEL_PARAM) {
            Some(Value::Str(s)) => {
                LogLevel::parse(s).ok_or_else(|| ParamError::UnsupportedLogLevel(s.clone()))?
            }
            Some(other) => return Err(ParamError::UnsupportedLogLevel(other.to_literal())),
            None => cli.log_level().unwrap_or_default(),
        };
        let target = match resolved.get(LOG_PATH_PARAM) {
            Some(Value::Str(s)) => LogTarget::parse(s),
            _ => cli.log_path().map_or(LogTarget::Stdout, LogTarget::parse),
        };
        Ok(Self { level, target })
    }
}

/// Install the global tracing subscriber. `RUST_LOG`, when set, takes
/// precedence over the configured level.
pub fn init_logging(settings: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.to_tracing().as_str()));

    match &settings.target {
        LogTarget::Stdout => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineOptions};
    use crate::script::ScriptEnv;

    fn resolve(defaults: &str, cli: &CliValues) -> Resolved {
        let options = EngineOptions::default().with_env(ScriptEnv::empty());
        Engine::new(defaults, options).unwrap().resolve(cli).unwrap()
    }

    #[test]
    fn test_level_parse_ignores_case() {
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("Verbose"), Some(LogLevel::Verbose));
        assert_eq!(LogLevel::parse("LOUD"), None);
    }

    #[test]
    fn test_level_to_tracing() {
        assert_eq!(LogLevel::Verbose.to_tracing(), Level::TRACE);
        assert_eq!(LogLevel::Warning.to_tracing(), Level::WARN);
        assert_eq!(LogLevel::Critical.to_tracing(), Level::ERROR);
    }

    #[test]
    fn test_target_parse() {
        assert_eq!(LogTarget::parse("-"), LogTarget::Stdout);
        assert_eq!(
            LogTarget::parse("/tmp/run.log"),
            LogTarget::File(PathBuf::from("/tmp/run.log"))
        );
    }

    #[test]
    fn test_settings_from_flags_when_not_declared() {
        let cli = CliValues::new()
            .with_log_level(LogLevel::Debug)
            .with_log_path("run.log");
        let resolved = resolve("x = 1", &cli);
        let settings = LogSettings::from_resolved(&resolved, &cli).unwrap();
        assert_eq!(settings.level, LogLevel::Debug);
        assert_eq!(settings.target, LogTarget::File(PathBuf::from("run.log")));
    }

    #[test]
    fn test_settings_default() {
        let cli = CliValues::new();
        let resolved = resolve("x = 1", &cli);
        assert_eq!(
            LogSettings::from_resolved(&resolved, &cli).unwrap(),
            LogSettings::default()
        );
    }

    #[test]
    fn test_settings_from_declared_parameters() {
        let cli = CliValues::new().with_log_level(LogLevel::Error);
        let resolved = resolve("log_level = \"debug\"\nlog_path = \"-\"", &cli);
        let settings = LogSettings::from_resolved(&resolved, &cli).unwrap();
        assert_eq!(settings.level, LogLevel::Debug);
        assert_eq!(settings.target, LogTarget::Stdout);
    }

    #[test]
    fn test_unsupported_level() {
        let cli = CliValues::new();
        let resolved = resolve("log_level = \"LOUD\"", &cli);
        let err = LogSettings::from_resolved(&resolved, &cli).unwrap_err();
        assert!(matches!(err, ParamError::UnsupportedLogLevel(ref s) if s == "LOUD"));
    }
}

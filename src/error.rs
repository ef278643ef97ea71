//! Structured error types for parameter resolution.

use crate::script::ScriptError;
use crate::value::ParamKind;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Script evaluation
    SchemaExecution,
    ConfigExecution,

    // Validation
    InvalidParameter,
    TypeMismatch,
    UnsupportedLogLevel,

    // Environment
    ConfigRead,

    // Caller errors
    PipelineOrder,
    FrozenParameter,
    Usage,
}

/// Which layer supplied a value that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    ConfigFile,
    OverrideRule,
    CommandLine,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::ConfigFile => write!(f, "configuration file"),
            Origin::OverrideRule => write!(f, "override rule"),
            Origin::CommandLine => write!(f, "command line"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamError {
    /// The compiled-in default parameters failed to evaluate.
    #[error("default parameters failed to evaluate: {source}")]
    SchemaExecution {
        #[source]
        source: ScriptError,
    },

    /// A configuration file failed to evaluate. Carries the raw text.
    #[error("configuration file {path} failed to evaluate: {source}\n--- {path} ---\n{text}")]
    ConfigExecution {
        path: String,
        text: String,
        #[source]
        source: ScriptError,
    },

    #[error("Invalid parameter in configuration file {path}: {key}")]
    UnknownConfigKey { key: String, path: String },

    #[error("Invalid parameter in override rule ({trigger} == {trigger_value}): unknown target {target}")]
    UnknownOverrideTarget {
        trigger: String,
        trigger_value: String,
        target: String,
    },

    #[error("Invalid parameter on command line: {0}")]
    UnknownCliParameter(String),

    #[error("Type mismatch for parameter {key} from {origin}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: ParamKind,
        found: ParamKind,
        origin: Origin,
    },

    #[error("Invalid log level: {0}")]
    UnsupportedLogLevel(String),

    #[error("cannot read configuration file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline stage {attempted} is not allowed after {current}")]
    PipelineOrder {
        attempted: &'static str,
        current: &'static str,
    },

    #[error("parameter {0} was resolved by the pipeline and cannot be replaced")]
    FrozenParameter(String),

    #[error(transparent)]
    Usage(#[from] clap::Error),
}

impl ParamError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ParamError::SchemaExecution { .. } => ErrorCode::SchemaExecution,
            ParamError::ConfigExecution { .. } => ErrorCode::ConfigExecution,
            ParamError::UnknownConfigKey { .. }
            | ParamError::UnknownOverrideTarget { .. }
            | ParamError::UnknownCliParameter(_) => ErrorCode::InvalidParameter,
            ParamError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            ParamError::UnsupportedLogLevel(_) => ErrorCode::UnsupportedLogLevel,
            ParamError::ConfigRead { .. } => ErrorCode::ConfigRead,
            ParamError::PipelineOrder { .. } => ErrorCode::PipelineOrder,
            ParamError::FrozenParameter(_) => ErrorCode::FrozenParameter,
            ParamError::Usage(_) => ErrorCode::Usage,
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ParamError::Usage(err) => err.exit_code(),
            _ => 1,
        }
    }

    pub fn type_mismatch(key: &str, expected: ParamKind, found: ParamKind, origin: Origin) -> Self {
        ParamError::TypeMismatch {
            key: key.to_string(),
            expected,
            found,
            origin,
        }
    }
}

/// Result type for parameter resolution.
pub type Result<T> = std::result::Result<T, ParamError>;

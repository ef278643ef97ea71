//! Layered, typed program parameters.
//!
//! Parameters are declared by a default script, optionally overridden by a
//! configuration script, then by the command line. `when` rules in either
//! script force dependent parameters once a trigger takes a given value.
//!
//! - [`script`] - the restricted parameter language
//! - [`schema`] - parameter names, kinds and defaults from the default script
//! - [`config`] - loading a configuration file against the schema
//! - [`overrides`] - conditional override rules
//! - [`engine`] - the staged resolution pipeline
//! - [`cli`] - flags derived from the schema
//! - [`stack`] - one-call startup for binaries

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod overrides;
pub mod resolved;
pub mod schema;
pub mod script;
pub mod stack;
pub mod value;

pub use cli::{CliOptions, CliOutcome, CliValues};
pub use config::UnknownKeyPolicy;
pub use engine::{Engine, EngineOptions, Stage};
pub use error::{ErrorCode, Origin, ParamError, Result};
pub use overrides::{OverrideRegistry, OverrideRule};
pub use resolved::Resolved;
pub use schema::{ParameterSpec, Schema};
pub use script::ScriptEnv;
pub use stack::{ParamStack, Ready, Startup};
pub use value::{ParamKind, Value};

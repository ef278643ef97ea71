//! External configuration layer.
//!
//! A configuration file is a parameter script evaluated in its own
//! namespace. Its bindings override defaults for parameters the schema
//! already declares; any other top-level binding is an unknown key and is
//! handled according to [`UnknownKeyPolicy`]. `when` rules declared in the
//! file join the engine's override registry.
//!
//! ## Placeholder
//! - `__FILE__` - replaced in the raw text with the file's logical name
//!   (its file stem) before evaluation, e.g. `log_path = "logs/__FILE__.log"`

mod loader;
mod merge;

pub use loader::{ConfigLayer, FILE_PLACEHOLDER, load_config_file, load_config_source, logical_name};
pub use merge::{merge_layer, overlay};

use serde::{Deserialize, Serialize};

/// Behavior for configuration keys the schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKeyPolicy {
    /// Reject the file with an invalid-parameter error (default).
    #[default]
    Strict,
    /// Warn and admit the key as an extra parameter.
    Lenient,
}

//! Loading and validating a configuration file against the schema.

use super::UnknownKeyPolicy;
use crate::error::{Origin, ParamError, Result};
use crate::overrides::OverrideRule;
use crate::schema::{Schema, is_reserved};
use crate::script::{self, ScriptEnv};
use crate::value::Value;
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, warn};

/// Token replaced with the file's logical name before evaluation.
pub const FILE_PLACEHOLDER: &str = "__FILE__";

/// Values, extras and rules produced by one configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigLayer {
    /// Path the layer was loaded from, for diagnostics.
    pub path: String,
    /// Overrides for schema parameters, already in their declared kinds.
    pub values: IndexMap<String, Value>,
    /// Admitted keys the schema does not declare (lenient policy only).
    pub extras: IndexMap<String, Value>,
    /// Override rules declared by the file.
    pub rules: Vec<OverrideRule>,
}

impl ConfigLayer {
    pub fn extra_names(&self) -> impl Iterator<Item = &str> {
        self.extras.keys().map(String::as_str)
    }
}

/// Logical name of a config file: its file stem (`site.params` -> `site`).
pub fn logical_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Read and evaluate a configuration file.
pub fn load_config_file(
    path: &Path,
    schema: &Schema,
    policy: UnknownKeyPolicy,
    env: &ScriptEnv,
) -> Result<ConfigLayer> {
    let text = std::fs::read_to_string(path).map_err(|source| ParamError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_source(
        &path.display().to_string(),
        &logical_name(path),
        &text,
        schema,
        policy,
        env,
    )
}

/// Evaluate configuration text that has already been read.
///
/// `path` is only used in diagnostics; `name` replaces [`FILE_PLACEHOLDER`].
pub fn load_config_source(
    path: &str,
    name: &str,
    text: &str,
    schema: &Schema,
    policy: UnknownKeyPolicy,
    env: &ScriptEnv,
) -> Result<ConfigLayer> {
    let source = text.replace(FILE_PLACEHOLDER, name);
    let evaluation = script::run(&source, env).map_err(|err| ParamError::ConfigExecution {
        path: path.to_string(),
        text: text.to_string(),
        source: err,
    })?;

    let mut layer = ConfigLayer {
        path: path.to_string(),
        rules: evaluation.rules,
        ..Default::default()
    };

    for (key, value) in evaluation.bindings {
        if is_reserved(&key) {
            continue;
        }
        match schema.get(&key) {
            Some(spec) => {
                let value = spec.kind.coerce(value).map_err(|v| {
                    ParamError::type_mismatch(&key, spec.kind, v.kind(), Origin::ConfigFile)
                })?;
                layer.values.insert(key, value);
            }
            None => match policy {
                UnknownKeyPolicy::Strict => {
                    return Err(ParamError::UnknownConfigKey {
                        key,
                        path: path.to_string(),
                    });
                }
                UnknownKeyPolicy::Lenient => {
                    warn!(key = %key, path = %path, "Admitting parameter not declared in defaults");
                    layer.extras.insert(key, value);
                }
            },
        }
    }

    debug!(
        path = %path,
        values = layer.values.len(),
        extras = layer.extras.len(),
        rules = layer.rules.len(),
        "Loaded configuration layer"
    );
    Ok(layer)
}

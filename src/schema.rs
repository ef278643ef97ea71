//! Schema inference from the default parameter source.
//!
//! The default source is evaluated once; every top-level binding that
//! survives evaluation becomes a parameter whose kind is the kind of its
//! value. Names starting with [`RESERVED_PREFIX`] are script-local helpers
//! and never become parameters.

use crate::error::{ParamError, Result};
use crate::overrides::OverrideRule;
use crate::script::{self, ScriptEnv};
use crate::value::{ParamKind, Value};
use indexmap::IndexMap;
use tracing::debug;

/// Bindings with this prefix stay private to the script that made them.
pub const RESERVED_PREFIX: &str = "__";

pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Declared parameter: name, kind and default value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Value,
}

/// Parameters in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    params: IndexMap<String, ParameterSpec>,
}

impl Schema {
    /// Build a schema from evaluated bindings, skipping reserved names.
    pub fn from_bindings(bindings: &IndexMap<String, Value>) -> Self {
        let params = bindings
            .iter()
            .filter(|(name, _)| !is_reserved(name))
            .map(|(name, value)| {
                let spec = ParameterSpec {
                    name: name.clone(),
                    kind: value.kind(),
                    default: value.clone(),
                };
                (name.clone(), spec)
            })
            .collect();
        Self { params }
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Default values, in declaration order.
    pub fn defaults(&self) -> IndexMap<String, Value> {
        self.params
            .iter()
            .map(|(name, spec)| (name.clone(), spec.default.clone()))
            .collect()
    }
}

/// Evaluate the default source into a schema plus the override rules it
/// declares.
pub fn infer(source: &str, env: &ScriptEnv) -> Result<(Schema, Vec<OverrideRule>)> {
    let evaluation =
        script::run(source, env).map_err(|source| ParamError::SchemaExecution { source })?;
    let schema = Schema::from_bindings(&evaluation.bindings);
    debug!(
        params = schema.len(),
        rules = evaluation.rules.len(),
        "Inferred parameter schema"
    );
    Ok((schema, evaluation.rules))
}

//! The resolution pipeline.
//!
//! ```text
//! INIT -> SCHEMA_BUILT -> (CONFIG_MERGED) -> OVERRIDES_APPLIED_1
//!      -> CLI_MERGED -> OVERRIDES_APPLIED_2 -> READY
//! ```
//!
//! Each [`Engine`] owns its schema, rule registry and values. Stages only
//! move forward; calling one out of order is [`ParamError::PipelineOrder`].

use crate::cli::CliValues;
use crate::config::{self, UnknownKeyPolicy};
use crate::error::{Origin, ParamError, Result};
use crate::overrides::{AppliedOverride, OverrideRegistry};
use crate::resolved::Resolved;
use crate::schema::{self, Schema};
use crate::script::ScriptEnv;
use crate::value::Value;
use indexmap::IndexMap;
use std::path::Path;
use tracing::debug;

/// Pipeline position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    SchemaBuilt,
    ConfigMerged,
    OverridesApplied1,
    CliMerged,
    OverridesApplied2,
    Ready,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "INIT",
            Stage::SchemaBuilt => "SCHEMA_BUILT",
            Stage::ConfigMerged => "CONFIG_MERGED",
            Stage::OverridesApplied1 => "OVERRIDES_APPLIED_1",
            Stage::CliMerged => "CLI_MERGED",
            Stage::OverridesApplied2 => "OVERRIDES_APPLIED_2",
            Stage::Ready => "READY",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub policy: UnknownKeyPolicy,
    pub env: ScriptEnv,
}

impl EngineOptions {
    pub fn with_policy(mut self, policy: UnknownKeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_env(mut self, env: ScriptEnv) -> Self {
        self.env = env;
        self
    }
}

/// One resolution run.
#[derive(Debug)]
pub struct Engine {
    schema: Schema,
    registry: OverrideRegistry,
    values: IndexMap<String, Value>,
    options: EngineOptions,
    stage: Stage,
}

impl Engine {
    /// Evaluate the default source and seed the values with its defaults.
    pub fn new(defaults: &str, options: EngineOptions) -> Result<Self> {
        let (schema, rules) = schema::infer(defaults, &options.env)?;
        let mut registry = OverrideRegistry::new();
        registry.extend(rules);
        let values = schema.defaults();
        debug!(
            params = schema.len(),
            rules = registry.len(),
            stage = %Stage::SchemaBuilt,
            "Engine initialized"
        );
        Ok(Self {
            schema,
            registry,
            values,
            options,
            stage: Stage::SchemaBuilt,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn registry(&self) -> &OverrideRegistry {
        &self.registry
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Current values, including admitted extras.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    fn require(&self, attempted: Stage, allowed: &[Stage]) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(ParamError::PipelineOrder {
                attempted: attempted.as_str(),
                current: self.stage.as_str(),
            })
        }
    }

    fn advance(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "Pipeline stage");
        self.stage = stage;
    }

    /// Read a configuration file and merge it.
    pub fn merge_config_file(&mut self, path: &Path) -> Result<()> {
        self.require(Stage::ConfigMerged, &[Stage::SchemaBuilt])?;
        let layer =
            config::load_config_file(path, &self.schema, self.options.policy, &self.options.env)?;
        self.absorb(layer);
        Ok(())
    }

    /// Merge configuration text that was obtained elsewhere.
    pub fn merge_config_source(&mut self, path: &str, name: &str, text: &str) -> Result<()> {
        self.require(Stage::ConfigMerged, &[Stage::SchemaBuilt])?;
        let layer = config::load_config_source(
            path,
            name,
            text,
            &self.schema,
            self.options.policy,
            &self.options.env,
        )?;
        self.absorb(layer);
        Ok(())
    }

    fn absorb(&mut self, layer: config::ConfigLayer) {
        config::merge_layer(&mut self.values, &layer);
        self.registry.extend(layer.rules);
        self.advance(Stage::ConfigMerged);
    }

    /// Run the next override pass. The first pass follows the config layer
    /// (or the defaults), the second follows the command line.
    pub fn apply_overrides(&mut self) -> Result<Vec<AppliedOverride>> {
        let next = match self.stage {
            Stage::SchemaBuilt | Stage::ConfigMerged => Stage::OverridesApplied1,
            Stage::CliMerged => Stage::OverridesApplied2,
            current => {
                return Err(ParamError::PipelineOrder {
                    attempted: "OVERRIDES_APPLIED",
                    current: current.as_str(),
                });
            }
        };
        let applied = self.registry.apply(&mut self.values, &self.schema)?;
        self.advance(next);
        Ok(applied)
    }

    /// Overwrite every explicitly set command-line value.
    ///
    /// Values must already carry their declared kind. Nothing is written
    /// if any value is rejected.
    pub fn merge_cli(&mut self, cli: &CliValues) -> Result<()> {
        self.require(Stage::CliMerged, &[Stage::OverridesApplied1])?;
        for (key, value) in cli.values() {
            let spec = self
                .schema
                .get(key)
                .ok_or_else(|| ParamError::UnknownCliParameter(key.clone()))?;
            let found = value.kind();
            if spec.kind.is_scalar() && found != spec.kind {
                return Err(ParamError::type_mismatch(
                    key,
                    spec.kind,
                    found,
                    Origin::CommandLine,
                ));
            }
        }
        for (key, value) in cli.values() {
            debug!(key = %key, value = %value.to_literal(), "Command-line override");
            self.values.insert(key.clone(), value.clone());
        }
        self.advance(Stage::CliMerged);
        Ok(())
    }

    /// Freeze the values.
    pub fn finish(mut self) -> Result<Resolved> {
        self.require(Stage::Ready, &[Stage::OverridesApplied2])?;
        self.advance(Stage::Ready);
        Ok(Resolved::new(self.schema, self.values))
    }

    /// Run every remaining stage. The config file named by `cli`, if any,
    /// is merged before the first override pass.
    pub fn resolve(mut self, cli: &CliValues) -> Result<Resolved> {
        if let Some(path) = cli.config_path() {
            self.merge_config_file(path)?;
        }
        self.apply_overrides()?;
        self.merge_cli(cli)?;
        self.apply_overrides()?;
        self.finish()
    }
}

//! Conditional overrides: "when parameter T equals V, force parameter X to Y".
//!
//! Rules are indexed `trigger -> trigger value -> target -> target value`.
//! Application runs in passes. Every pass reads trigger values from a
//! snapshot taken at the start of the pass, so a value written by one rule
//! cannot fire another rule in the same pass. The pipeline runs exactly two
//! passes (after the config layer and after the command line); a chain of
//! three dependent triggers is therefore not guaranteed to settle.

use crate::error::{Origin, ParamError, Result};
use crate::schema::Schema;
use crate::value::Value;
use indexmap::IndexMap;
use tracing::debug;

/// A single conditional override.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideRule {
    pub trigger: String,
    pub trigger_value: Value,
    pub target: String,
    pub target_value: Value,
}

impl OverrideRule {
    pub fn new(
        trigger: impl Into<String>,
        trigger_value: impl Into<Value>,
        target: impl Into<String>,
        target_value: impl Into<Value>,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            trigger_value: trigger_value.into(),
            target: target.into(),
            target_value: target_value.into(),
        }
    }
}

/// Targets forced when a trigger holds one particular value.
#[derive(Debug, Clone, PartialEq)]
struct TriggerCase {
    value: Value,
    targets: IndexMap<String, Value>,
}

/// A write produced by a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOverride {
    pub trigger: String,
    pub target: String,
    pub value: Value,
}

/// Registry of override rules.
///
/// Order is first-registration order at every level: triggers, then values
/// within a trigger, then targets within a value. Re-registering an existing
/// `(trigger, value, target)` replaces the target value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideRegistry {
    triggers: IndexMap<String, Vec<TriggerCase>>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule: OverrideRule) {
        let cases = self.triggers.entry(rule.trigger).or_default();
        match cases.iter_mut().find(|c| c.value.matches(&rule.trigger_value)) {
            Some(case) => {
                case.targets.insert(rule.target, rule.target_value);
            }
            None => {
                let mut targets = IndexMap::new();
                targets.insert(rule.target, rule.target_value);
                cases.push(TriggerCase {
                    value: rule.trigger_value,
                    targets,
                });
            }
        }
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = OverrideRule>) {
        for rule in rules {
            self.register(rule);
        }
    }

    /// Number of distinct `(trigger, value, target)` rules.
    pub fn len(&self) -> usize {
        self.triggers
            .values()
            .flat_map(|cases| cases.iter())
            .map(|case| case.targets.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All rules in application order.
    pub fn rules(&self) -> Vec<OverrideRule> {
        let mut out = Vec::new();
        for (trigger, cases) in &self.triggers {
            for case in cases {
                for (target, value) in &case.targets {
                    out.push(OverrideRule::new(
                        trigger.clone(),
                        case.value.clone(),
                        target.clone(),
                        value.clone(),
                    ));
                }
            }
        }
        out
    }

    /// Run one pass over `values`.
    ///
    /// Targets must already be present in `values` (schema parameters or
    /// admitted extras). Schema targets are checked against their declared
    /// kind. Nothing is written if any matching rule is invalid.
    pub fn apply(
        &self,
        values: &mut IndexMap<String, Value>,
        schema: &Schema,
    ) -> Result<Vec<AppliedOverride>> {
        let mut writes = Vec::new();

        for (trigger, cases) in &self.triggers {
            let Some(current) = values.get(trigger) else {
                debug!(trigger = %trigger, "Override trigger is not a known parameter");
                continue;
            };
            for case in cases.iter().filter(|c| current.matches(&c.value)) {
                for (target, value) in &case.targets {
                    if !values.contains_key(target) {
                        return Err(ParamError::UnknownOverrideTarget {
                            trigger: trigger.clone(),
                            trigger_value: case.value.to_literal(),
                            target: target.clone(),
                        });
                    }
                    let value = match schema.get(target) {
                        Some(spec) => spec.kind.coerce(value.clone()).map_err(|v| {
                            ParamError::type_mismatch(
                                target,
                                spec.kind,
                                v.kind(),
                                Origin::OverrideRule,
                            )
                        })?,
                        None => value.clone(),
                    };
                    writes.push(AppliedOverride {
                        trigger: trigger.clone(),
                        target: target.clone(),
                        value,
                    });
                }
            }
        }

        for write in &writes {
            debug!(
                trigger = %write.trigger,
                target = %write.target,
                value = %write.value.to_literal(),
                "Applying override"
            );
            values.insert(write.target.clone(), write.value.clone());
        }
        Ok(writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptEnv;

    fn schema_and_values(source: &str) -> (Schema, IndexMap<String, Value>) {
        let (schema, _) = crate::schema::infer(source, &ScriptEnv::empty()).unwrap();
        let values = schema.defaults();
        (schema, values)
    }

    #[test]
    fn test_matching_trigger_overwrites_targets() {
        let (schema, mut values) =
            schema_and_values("model = \"GFS5\"\nexpected_file_size = 1e8\nforecast_hours = 24");
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("model", "GFS5", "expected_file_size", 2e8));
        registry.register(OverrideRule::new("model", "GFS5", "forecast_hours", 48i64));
        registry.register(OverrideRule::new("model", "GFS4", "forecast_hours", 36i64));

        let applied = registry.apply(&mut values, &schema).unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(values["expected_file_size"], Value::Float(2e8));
        assert_eq!(values["forecast_hours"], Value::Int(48));
    }

    #[test]
    fn test_reregistering_replaces_in_place() {
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("m", "a", "x", 1i64));
        registry.register(OverrideRule::new("m", "a", "y", 2i64));
        registry.register(OverrideRule::new("m", "a", "x", 3i64));
        assert_eq!(registry.len(), 2);
        let rules = registry.rules();
        assert_eq!(rules[0].target, "x");
        assert_eq!(rules[0].target_value, Value::Int(3));
        assert_eq!(rules[1].target, "y");
    }

    #[test]
    fn test_two_triggers_later_registration_wins() {
        let (schema, mut values) = schema_and_values("a = true\nb = true\nx = 0");
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("a", true, "x", 1i64));
        registry.register(OverrideRule::new("b", true, "x", 2i64));
        registry.apply(&mut values, &schema).unwrap();
        assert_eq!(values["x"], Value::Int(2));

        // Same rules, opposite trigger registration order.
        let (schema, mut values) = schema_and_values("a = true\nb = true\nx = 0");
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("b", true, "x", 2i64));
        registry.register(OverrideRule::new("a", true, "x", 1i64));
        registry.apply(&mut values, &schema).unwrap();
        assert_eq!(values["x"], Value::Int(1));
    }

    #[test]
    fn test_pass_reads_snapshot_of_triggers() {
        // a -> b -> c: the write to b must not fire b's rule in the same pass.
        let (schema, mut values) = schema_and_values("a = 1\nb = 0\nc = 0");
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("b", 1i64, "c", 1i64));
        registry.register(OverrideRule::new("a", 1i64, "b", 1i64));

        registry.apply(&mut values, &schema).unwrap();
        assert_eq!(values["b"], Value::Int(1));
        assert_eq!(values["c"], Value::Int(0));

        registry.apply(&mut values, &schema).unwrap();
        assert_eq!(values["c"], Value::Int(1));
    }

    #[test]
    fn test_unknown_target_is_invalid_parameter() {
        let (schema, mut values) = schema_and_values("model = \"GFS5\"");
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("model", "GFS5", "nope", 1i64));
        let err = registry.apply(&mut values, &schema).unwrap_err();
        assert!(matches!(err, ParamError::UnknownOverrideTarget { ref target, .. } if target == "nope"));
        assert!(!values.contains_key("nope"));
    }

    #[test]
    fn test_unknown_target_ignored_when_trigger_does_not_match() {
        let (schema, mut values) = schema_and_values("model = \"GFS3\"");
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("model", "GFS5", "nope", 1i64));
        assert!(registry.apply(&mut values, &schema).unwrap().is_empty());
    }

    #[test]
    fn test_target_kind_checked() {
        let (schema, mut values) = schema_and_values("model = \"GFS5\"\nhours = 24");
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("model", "GFS5", "hours", "many"));
        let err = registry.apply(&mut values, &schema).unwrap_err();
        assert!(matches!(err, ParamError::TypeMismatch { .. }));
        assert_eq!(values["hours"], Value::Int(24));
    }

    #[test]
    fn test_int_target_widens_into_float_parameter() {
        let (schema, mut values) = schema_and_values("model = \"GFS5\"\nsize = 1e8");
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("model", "GFS5", "size", 200000000i64));
        registry.apply(&mut values, &schema).unwrap();
        assert_eq!(values["size"], Value::Float(2e8));
    }

    #[test]
    fn test_extra_targets_are_not_type_checked() {
        let (schema, mut values) = schema_and_values("model = \"GFS5\"");
        values.insert("site".to_string(), Value::Int(1));
        let mut registry = OverrideRegistry::new();
        registry.register(OverrideRule::new("model", "GFS5", "site", "boulder"));
        registry.apply(&mut values, &schema).unwrap();
        assert_eq!(values["site"], Value::from("boulder"));
    }
}

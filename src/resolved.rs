//! The frozen result of resolution.

use crate::error::{ParamError, Result};
use crate::schema::Schema;
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::ops::Index;

/// Resolved parameters.
///
/// Pipeline-resolved entries (schema parameters and admitted extras) are
/// immutable. Callers may attach derived values with
/// [`insert_derived`](Self::insert_derived); those are never validated.
/// Shared reads across threads are fine; mutation needs external
/// synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    schema: Schema,
    values: IndexMap<String, Value>,
    derived: IndexMap<String, Value>,
}

impl Resolved {
    pub(crate) fn new(schema: Schema, values: IndexMap<String, Value>) -> Self {
        Self {
            schema,
            values,
            derived: IndexMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).or_else(|| self.derived.get(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_float)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Keys admitted from a config file that the schema does not declare.
    pub fn extras(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .filter(|k| !self.schema.contains(k))
            .map(String::as_str)
    }

    /// Pipeline-resolved entries followed by derived entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values
            .iter()
            .chain(self.derived.iter())
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Pipeline-resolved entries only.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Attach a caller-computed value. Returns the previous derived value.
    pub fn insert_derived(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(ParamError::FrozenParameter(key));
        }
        Ok(self.derived.insert(key, value.into()))
    }

    /// Pipeline-resolved entries as script text. Loading the output as a
    /// configuration file reproduces the same values.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.values {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(&value.to_literal());
            out.push('\n');
        }
        out
    }

    /// Every entry as `name : value` lines.
    pub fn params_string(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{} : {}\n", k, v))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(k, v)| {
                let json = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                (k.to_string(), json)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Panics if `key` is absent.
impl Index<&str> for Resolved {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        match self.get(key) {
            Some(v) => v,
            None => panic!("no parameter named `{}`", key),
        }
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.params_string())
    }
}

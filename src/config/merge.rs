//! Layer merging.
//!
//! Parameters are flat scalars, so a merge is key-by-key: keys in the
//! overlay replace keys in the base, new keys are appended after existing
//! ones, and existing keys keep their position.

use super::ConfigLayer;
use crate::value::Value;
use indexmap::IndexMap;

/// Merge `overlay` into `base`, with `overlay` taking precedence.
///
/// # Example
/// ```
/// use indexmap::IndexMap;
/// use paramstack::Value;
/// use paramstack::config::overlay;
///
/// let mut base: IndexMap<String, Value> = IndexMap::new();
/// base.insert("hours".into(), Value::Int(24));
/// base.insert("model".into(), Value::from("GFS3"));
///
/// let mut top = IndexMap::new();
/// top.insert("hours".into(), Value::Int(48));
/// overlay(&mut base, top);
///
/// assert_eq!(base["hours"], Value::Int(48));
/// assert_eq!(base.get_index(0).unwrap().0, "hours");
/// ```
pub fn overlay(base: &mut IndexMap<String, Value>, overlay: IndexMap<String, Value>) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}

/// Merge a configuration layer: schema values first, then admitted extras.
pub fn merge_layer(base: &mut IndexMap<String, Value>, layer: &ConfigLayer) {
    overlay(base, layer.values.clone());
    overlay(base, layer.extras.clone());
}

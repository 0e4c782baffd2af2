//! Deep merge for Helm value trees
//!
//! Value trees are `serde_json::Value`: scalars, lists, or nested maps.
//! The merge rule is deliberately small: when both sides hold a map the
//! merge recurses per key, in every other case the override replaces the
//! base wholesale. Lists are never merged element-wise.
//!
//! Chained merges are right-biased and order-dependent:
//! `merge(merge(a, b), c)` is not in general `merge(a, merge(b, c))`.
//! Callers must apply layers in precedence order (global values first,
//! component values on top, ignore-flag short-circuiting the global layer).

use serde_json::{Map, Value};

/// Merge `override_` onto `base`, returning the merged tree.
///
/// Keys present only in `base` are preserved; keys present only in
/// `override_` are added; keys present in both recurse when both values
/// are maps and are replaced by the override otherwise.
pub fn merge(base: &Value, override_: &Value) -> Value {
    match (base, override_) {
        (Value::Object(b), Value::Object(o)) => Value::Object(merge_maps(b, o)),
        (_, o) => o.clone(),
    }
}

/// Merge two JSON maps, with `override_` taking precedence.
pub fn merge_maps(base: &Map<String, Value>, override_: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    for (key, value) in override_ {
        match (out.get(key), value) {
            (Some(Value::Object(b)), Value::Object(o)) => {
                let merged = merge_maps(b, o);
                out.insert(key.clone(), Value::Object(merged));
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    out
}

/// Merge an optional layered pair, treating absent layers as empty trees.
///
/// Convenience for the planner: `global` then `component` on top. Returns
/// an empty map when both layers are absent.
pub fn merge_layers(global: Option<&Value>, component: Option<&Value>) -> Value {
    let empty = Value::Object(Map::new());
    let base = global.unwrap_or(&empty);
    let over = component.unwrap_or(&empty);
    merge(base, over)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_nested_trees() {
        let base = json!({"a": 1, "b": {"x": 1, "y": 2}});
        let over = json!({"b": {"y": 9, "z": 3}});
        assert_eq!(
            merge(&base, &over),
            json!({"a": 1, "b": {"x": 1, "y": 9, "z": 3}})
        );
    }

    #[test]
    fn test_lists_replace_wholesale() {
        let base = json!({"a": [1, 2]});
        let over = json!({"a": [3]});
        assert_eq!(merge(&base, &over), json!({"a": [3]}));
    }

    #[test]
    fn test_scalar_replaces_tree() {
        let base = json!({"a": {"nested": true}});
        let over = json!({"a": "flat"});
        assert_eq!(merge(&base, &over), json!({"a": "flat"}));
    }

    #[test]
    fn test_tree_replaces_scalar() {
        let base = json!({"a": "flat"});
        let over = json!({"a": {"nested": true}});
        assert_eq!(merge(&base, &over), json!({"a": {"nested": true}}));
    }

    #[test]
    fn test_base_only_keys_preserved() {
        let base = json!({"keep": "me", "shared": 1});
        let over = json!({"shared": 2});
        assert_eq!(merge(&base, &over), json!({"keep": "me", "shared": 2}));
    }

    #[test]
    fn test_chained_merge_is_order_dependent() {
        // Right-biased chains differ depending on grouping: the layer
        // order global -> component is fixed at the call sites.
        let a = json!({"k": {"x": 1}});
        let b = json!({"k": "scalar"});
        let c = json!({"k": {"y": 2}});

        let left = merge(&merge(&a, &b), &c);
        let right = merge(&a, &merge(&b, &c));
        assert_eq!(left, json!({"k": {"y": 2}}));
        assert_eq!(right, json!({"k": {"x": 1, "y": 2}}));
        assert_ne!(left, right);
    }

    #[test]
    fn test_merge_layers_absent_sides() {
        assert_eq!(merge_layers(None, None), json!({}));
        let global = json!({"g": 1});
        assert_eq!(merge_layers(Some(&global), None), json!({"g": 1}));
        let comp = json!({"c": 2});
        assert_eq!(
            merge_layers(Some(&global), Some(&comp)),
            json!({"g": 1, "c": 2})
        );
    }
}

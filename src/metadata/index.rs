//! Secondary indexes over metadata properties: an unordered hash index
//! for equality/membership lookups and an order-preserving sorted index
//! for range queries (§4.2).
//!
//! Both indexes map `field_name -> Vec<EntityId>` under the hood via the
//! redb multimap tables defined in [`crate::storage::schema`]; this module
//! only owns the *key encoding* used to pack `(field, value)` into the
//! multimap key and the value-type dispatch that decides which index(es)
//! a given `serde_json::Value` should be written into.

use serde_json::Value;

use crate::storage::schema::{encode_index_key, index_field_range_end, index_field_range_start};

/// Which index (or both) a property value should be written into.
///
/// Strings, booleans and null are hash-indexed only (no meaningful
/// ordering). Numbers are written to both: the hash index for equality,
/// the sorted index for range queries. Arrays and objects are not
/// indexed at all — filtering over them falls back to a full scan.
#[derive(Debug, PartialEq, Eq)]
pub enum IndexTarget {
    HashOnly,
    HashAndSorted,
    None,
}

/// Decides how a single metadata property value should be indexed.
///
/// Called on already-flattened leaves (see [`flatten_leaves`]): an
/// object is only ever passed here if it sat past the depth limit and
/// was flattened no further, in which case it falls back to `None` like
/// any other unindexed shape.
pub fn index_target(value: &Value) -> IndexTarget {
    match value {
        Value::Number(_) => IndexTarget::HashAndSorted,
        Value::String(_) | Value::Bool(_) | Value::Null => IndexTarget::HashOnly,
        Value::Array(_) | Value::Object(_) => IndexTarget::None,
    }
}

/// Depth limit for [`flatten_leaves`] (§4.2): a nested object more than
/// this many levels deep has its remaining subtree indexed as an opaque,
/// unindexed value rather than walked further.
pub const DOT_PATH_DEPTH_LIMIT: usize = 16;

/// Walks `value`, writing `(dot.path, leaf_value)` pairs into `out` for
/// every leaf reachable within `depth_remaining` levels of nested
/// objects. A bare top-level scalar is its own single-element leaf.
///
/// `{"address": {"city": "NYC", "zip": 10001}}` flattens under field
/// `"address"` to `[("address.city", "NYC"), ("address.zip", 10001)]`.
/// Arrays are left intact — they're indexed (or not) as a single value
/// by [`index_target`], not recursed into.
pub fn flatten_leaves<'a>(field: &str, value: &'a Value, depth_remaining: usize, out: &mut Vec<(String, &'a Value)>) {
    match value {
        Value::Object(map) if depth_remaining > 0 => {
            for (key, nested) in map {
                let path = format!("{field}.{key}");
                flatten_leaves(&path, nested, depth_remaining - 1, out);
            }
        }
        _ => out.push((field.to_string(), value)),
    }
}

/// Encodes a `serde_json::Value` into an order-preserving byte sequence
/// suitable for the sorted index.
///
/// Only called for values where [`index_target`] returns
/// [`IndexTarget::HashAndSorted`] or [`IndexTarget::HashOnly`] — numbers
/// get a big-endian sign-flipped encoding that preserves numeric
/// ordering; strings and bools use their natural byte/discriminant
/// ordering.
pub fn encode_sortable_value(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            Some(encode_f64_sortable(f).to_vec())
        }
        Value::String(s) => Some(s.as_bytes().to_vec()),
        Value::Bool(b) => Some(vec![*b as u8]),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Encodes a value for the hash index: just its canonical JSON bytes.
/// Unlike the sorted index this doesn't need to preserve ordering, only
/// equality, so plain serialization is enough.
pub fn encode_hashable_value(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Encodes an `f64` into 8 bytes such that unsigned big-endian byte
/// comparison matches the floating-point total order.
///
/// IEEE-754 bit patterns already sort correctly for positive numbers
/// under unsigned integer comparison; negative numbers sort in reverse
/// since their sign bit is set. Flipping the sign bit for positives and
/// all bits for negatives fixes both cases.
fn encode_f64_sortable(f: f64) -> [u8; 8] {
    let bits = f.to_bits();
    let flipped = if bits & (1 << 63) != 0 { !bits } else { bits | (1 << 63) };
    flipped.to_be_bytes()
}

/// Builds the hash-index key for `field == value`.
pub fn hash_index_key(field: &str, value: &Value) -> Vec<u8> {
    encode_index_key(field, &encode_hashable_value(value))
}

/// Builds the sorted-index key for `field == value`, if `value` is
/// sortable.
pub fn sorted_index_key(field: &str, value: &Value) -> Option<Vec<u8>> {
    encode_sortable_value(value).map(|bytes| encode_index_key(field, &bytes))
}

/// Builds the `(start, end)` byte range covering every sorted-index entry
/// for `field`, for a full-field scan with no value bound.
pub fn sorted_index_field_range(field: &str) -> (Vec<u8>, Vec<u8>) {
    (index_field_range_start(field), index_field_range_end(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_target_dispatch() {
        assert_eq!(index_target(&json!(42)), IndexTarget::HashAndSorted);
        assert_eq!(index_target(&json!(4.2)), IndexTarget::HashAndSorted);
        assert_eq!(index_target(&json!("x")), IndexTarget::HashOnly);
        assert_eq!(index_target(&json!(true)), IndexTarget::HashOnly);
        assert_eq!(index_target(&Value::Null), IndexTarget::HashOnly);
        assert_eq!(index_target(&json!([1, 2])), IndexTarget::None);
        assert_eq!(index_target(&json!({"a": 1})), IndexTarget::None);
    }

    #[test]
    fn test_f64_sortable_encoding_preserves_order() {
        let values = [-100.0, -1.5, -0.001, 0.0, 0.001, 1.5, 100.0];
        let mut encoded: Vec<[u8; 8]> = values.iter().map(|v| encode_f64_sortable(*v)).collect();
        let sorted_encoded = {
            let mut v = encoded.clone();
            v.sort();
            v
        };
        encoded.sort();
        assert_eq!(encoded, sorted_encoded);
        for w in encoded.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn test_sorted_index_key_none_for_unsortable() {
        assert!(sorted_index_key("field", &json!([1, 2])).is_none());
        assert!(sorted_index_key("field", &json!({"a": 1})).is_none());
    }

    #[test]
    fn test_sorted_index_key_some_for_number_and_string() {
        assert!(sorted_index_key("field", &json!(1)).is_some());
        assert!(sorted_index_key("field", &json!("x")).is_some());
    }

    #[test]
    fn test_flatten_leaves_walks_nested_objects_to_dot_paths() {
        let value = json!({"city": "NYC", "zip": 10001});
        let mut out = Vec::new();
        flatten_leaves("address", &value, DOT_PATH_DEPTH_LIMIT, &mut out);
        let paths: Vec<&str> = out.iter().map(|(p, _)| p.as_str()).collect();
        assert!(paths.contains(&"address.city"));
        assert!(paths.contains(&"address.zip"));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_flatten_leaves_scalar_is_its_own_leaf() {
        let value = json!("ml");
        let mut out = Vec::new();
        flatten_leaves("topic", &value, DOT_PATH_DEPTH_LIMIT, &mut out);
        assert_eq!(out, vec![("topic".to_string(), &value)]);
    }

    #[test]
    fn test_flatten_leaves_deeply_nested_object() {
        let value = json!({"a": {"b": {"c": 1}}});
        let mut out = Vec::new();
        flatten_leaves("x", &value, DOT_PATH_DEPTH_LIMIT, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "x.a.b.c");
    }

    #[test]
    fn test_flatten_leaves_respects_depth_limit() {
        let value = json!({"a": {"b": 1}});
        let mut out = Vec::new();
        flatten_leaves("x", &value, 1, &mut out);
        // depth_remaining hits 0 one level down from "x.a" -> "x.a" itself
        // still recurses (depth_remaining=1 going in), but "x.a.b" does not.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "x.a.b");

        let mut out_zero = Vec::new();
        flatten_leaves("x", &value, 0, &mut out_zero);
        assert_eq!(out_zero.len(), 1);
        assert_eq!(out_zero[0].0, "x");
        assert_eq!(out_zero[0].1, &value);
    }

    #[test]
    fn test_field_range_contains_keys_for_field_only() {
        let (start, end) = sorted_index_field_range("age");
        let key = sorted_index_key("age", &json!(30)).unwrap();
        assert!(key.as_slice() >= start.as_slice());
        assert!(key.as_slice() < end.as_slice());

        let other_field_key = sorted_index_key("ageless", &json!(30)).unwrap();
        assert!(other_field_key.as_slice() >= end.as_slice());
    }
}

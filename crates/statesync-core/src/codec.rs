//! Lossless conversion between [`StateValue`] and the JSON wire document.
//!
//! JSON has no native associative-map, set or date. Those are written as tagged
//! objects carrying the reserved [`TYPE_KEY`] discriminator:
//!
//! ```text
//! Map  -> {"__type": "Map", "<key>": <value>, ...}
//! Set  -> {"__type": "Set", "values": [<member>, ...]}
//! Date -> {"__type": "Date", "value": "<RFC 3339>"}
//! ```
//!
//! Objects and maps whose own keys include `__type` cannot be told apart from
//! a tagged node and fail to encode.
//!
//! Depth is counted in JSON nesting levels of the document (a set costs two:
//! its tagged object and its `values` array). [`MAX_DEPTH`] stays below the
//! 128-level limit of the `serde_json` parser, so every document that encodes
//! also parses back from its text.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};
use crate::value::StateValue;

/// Reserved discriminator key of tagged nodes.
pub const TYPE_KEY: &str = "__type";

const MAP_TAG: &str = "Map";
const SET_TAG: &str = "Set";
const DATE_TAG: &str = "Date";
const SET_VALUES_KEY: &str = "values";
const DATE_VALUE_KEY: &str = "value";

/// JSON nesting limit for both directions.
pub const MAX_DEPTH: usize = 120;

/// Encode a container value into a wire document.
pub fn encode(value: &StateValue) -> SyncResult<Value> {
    encode_at(value, 0)
}

/// Decode a wire document into a container value.
pub fn decode(doc: &Value) -> SyncResult<StateValue> {
    decode_at(doc, 0)
}

/// Level of a JSON container opened inside `depth` enclosing ones.
fn nest(depth: usize, too_deep: fn(String) -> SyncError) -> SyncResult<usize> {
    let level = depth + 1;
    if level > MAX_DEPTH {
        return Err(too_deep(format!(
            "nested deeper than {} JSON levels",
            MAX_DEPTH
        )));
    }
    Ok(level)
}

fn encode_at(value: &StateValue, depth: usize) -> SyncResult<Value> {
    let open = |depth| nest(depth, SyncError::Encoding);

    Ok(match value {
        StateValue::Null => Value::Null,
        StateValue::Bool(b) => Value::Bool(*b),
        StateValue::Number(n) => Value::Number(n.clone()),
        StateValue::String(s) => Value::String(s.clone()),
        StateValue::Date(date) => {
            open(depth)?;
            let mut tagged = tagged(DATE_TAG);
            tagged.insert(
                DATE_VALUE_KEY.to_string(),
                Value::String(date.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            );
            Value::Object(tagged)
        }
        StateValue::Array(items) => {
            let level = open(depth)?;
            Value::Array(
                items
                    .iter()
                    .map(|item| encode_at(item, level))
                    .collect::<SyncResult<_>>()?,
            )
        }
        StateValue::Object(entries) => Value::Object(encode_entries(entries, open(depth)?)?),
        StateValue::Map(entries) => {
            let mut tagged = tagged(MAP_TAG);
            tagged.extend(encode_entries(entries, open(depth)?)?);
            Value::Object(tagged)
        }
        StateValue::Set(members) => {
            let level = open(open(depth)?)?;
            let mut tagged = tagged(SET_TAG);
            let values = members
                .iter()
                .map(|member| encode_at(member, level))
                .collect::<SyncResult<_>>()?;
            tagged.insert(SET_VALUES_KEY.to_string(), Value::Array(values));
            Value::Object(tagged)
        }
    })
}

fn tagged(tag: &str) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert(TYPE_KEY.to_string(), Value::String(tag.to_string()));
    object
}

/// Encode the entries of an object opened at `level`.
fn encode_entries(
    entries: &BTreeMap<String, StateValue>,
    level: usize,
) -> SyncResult<Map<String, Value>> {
    if entries.contains_key(TYPE_KEY) {
        return Err(SyncError::Encoding(format!(
            "key '{}' collides with the type discriminator",
            TYPE_KEY
        )));
    }
    entries
        .iter()
        .map(|(key, value)| Ok((key.clone(), encode_at(value, level)?)))
        .collect()
}

fn decode_at(doc: &Value, depth: usize) -> SyncResult<StateValue> {
    let open = |depth| nest(depth, SyncError::Decoding);

    Ok(match doc {
        Value::Null => StateValue::Null,
        Value::Bool(b) => StateValue::Bool(*b),
        Value::Number(n) => StateValue::Number(n.clone()),
        Value::String(s) => StateValue::String(s.clone()),
        Value::Array(items) => {
            let level = open(depth)?;
            StateValue::Array(
                items
                    .iter()
                    .map(|item| decode_at(item, level))
                    .collect::<SyncResult<_>>()?,
            )
        }
        Value::Object(object) => match object.get(TYPE_KEY) {
            None => StateValue::Object(decode_entries(object, open(depth)?)?),
            Some(Value::String(tag)) => decode_tagged(tag, object, open(depth)?)?,
            Some(other) => {
                return Err(SyncError::Decoding(format!(
                    "type discriminator must be a string, got {}",
                    other
                )))
            }
        },
    })
}

/// Decode a tagged object opened at `level`.
fn decode_tagged(tag: &str, object: &Map<String, Value>, level: usize) -> SyncResult<StateValue> {
    match tag {
        MAP_TAG => Ok(StateValue::Map(decode_entries(object, level)?)),
        SET_TAG => {
            let values = object
                .get(SET_VALUES_KEY)
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    SyncError::Decoding("set node is missing its 'values' array".to_string())
                })?;
            let values_level = nest(level, SyncError::Decoding)?;
            let members = values
                .iter()
                .map(|member| decode_at(member, values_level))
                .collect::<SyncResult<Vec<_>>>()?;
            Ok(StateValue::set(members))
        }
        DATE_TAG => {
            let raw = object
                .get(DATE_VALUE_KEY)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    SyncError::Decoding("date node is missing its 'value' string".to_string())
                })?;
            let date = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| SyncError::Decoding(format!("invalid date '{}': {}", raw, e)))?;
            Ok(StateValue::Date(date.with_timezone(&Utc)))
        }
        other => Err(SyncError::Decoding(format!("unknown type tag '{}'", other))),
    }
}

/// Decode the entries of an object opened at `level`, skipping the discriminator.
fn decode_entries(
    object: &Map<String, Value>,
    level: usize,
) -> SyncResult<BTreeMap<String, StateValue>> {
    object
        .iter()
        .filter(|(key, _)| key.as_str() != TYPE_KEY)
        .map(|(key, value)| Ok((key.clone(), decode_at(value, level)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_state() -> StateValue {
        let counts = StateValue::map(vec![
            ("the".to_string(), StateValue::from(12)),
            ("of".to_string(), StateValue::from(7)),
        ]);
        let seen = StateValue::set(vec!["alpha".into(), "beta".into()]);
        let updated = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        vec![
            ("counts".to_string(), counts),
            ("seen".to_string(), seen),
            ("updatedAt".to_string(), StateValue::Date(updated)),
            (
                "history".to_string(),
                StateValue::Array(vec![StateValue::set(vec![StateValue::map(vec![(
                    "nested".to_string(),
                    StateValue::Null,
                )])])]),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_encode_tags_containers() {
        let doc = encode(&sample_state()).unwrap();

        assert_eq!(doc["counts"], json!({"__type": "Map", "the": 12, "of": 7}));
        assert_eq!(doc["seen"], json!({"__type": "Set", "values": ["alpha", "beta"]}));
        assert_eq!(
            doc["updatedAt"],
            json!({"__type": "Date", "value": "2024-03-01T12:30:00Z"})
        );
    }

    #[test]
    fn test_round_trip_nested() {
        let state = sample_state();
        let decoded = decode(&encode(&state).unwrap()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_round_trip_through_text() {
        let state = sample_state();
        let text = serde_json::to_string(&encode(&state).unwrap()).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(decode(&parsed).unwrap(), state);
    }

    #[test]
    fn test_decode_set_deduplicates() {
        let decoded = decode(&json!({"__type": "Set", "values": [1, 2, 1]})).unwrap();
        match decoded {
            StateValue::Set(members) => assert_eq!(members.len(), 2),
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_plain_json() {
        let decoded = decode(&json!({"a": [1, "x", null], "b": {"c": true}})).unwrap();
        let b: StateValue = vec![("c".to_string(), StateValue::from(true))]
            .into_iter()
            .collect();
        let expected: StateValue = vec![
            (
                "a".to_string(),
                StateValue::Array(vec![1.into(), "x".into(), StateValue::Null]),
            ),
            ("b".to_string(), b),
        ]
        .into_iter()
        .collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_decode_malformed_nodes() {
        let err = decode(&json!({"__type": "Set", "values": 3})).unwrap_err();
        assert!(matches!(err, SyncError::Decoding(_)));

        let err = decode(&json!({"__type": "Date", "value": "yesterday"})).unwrap_err();
        assert!(err.to_string().contains("invalid date"));

        let err = decode(&json!({"__type": "Tree"})).unwrap_err();
        assert!(err.to_string().contains("unknown type tag"));

        let err = decode(&json!({"__type": 4})).unwrap_err();
        assert!(matches!(err, SyncError::Decoding(_)));
    }

    fn nested_arrays(levels: usize) -> StateValue {
        (0..levels).fold(StateValue::Null, |inner, _| StateValue::Array(vec![inner]))
    }

    fn nested_sets(levels: usize) -> StateValue {
        (0..levels).fold(StateValue::from(1), |inner, _| StateValue::set(vec![inner]))
    }

    #[test]
    fn test_encode_rejects_excessive_depth() {
        assert!(encode(&nested_arrays(MAX_DEPTH)).is_ok());
        let err = encode(&nested_arrays(MAX_DEPTH + 1)).unwrap_err();
        assert!(matches!(err, SyncError::Encoding(_)));

        // Each set opens two JSON levels.
        assert!(encode(&nested_sets(MAX_DEPTH / 2)).is_ok());
        let err = encode(&nested_sets(MAX_DEPTH / 2 + 1)).unwrap_err();
        assert!(matches!(err, SyncError::Encoding(_)));
    }

    #[test]
    fn test_deepest_document_parses_back_from_text() {
        let state: StateValue = vec![
            ("sets".to_string(), StateValue::Array(vec![nested_sets((MAX_DEPTH - 2) / 2)])),
            ("arrays".to_string(), nested_arrays(MAX_DEPTH - 1)),
        ]
        .into_iter()
        .collect();

        let text = serde_json::to_string(&encode(&state).unwrap()).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(decode(&parsed).unwrap(), state);
    }

    #[test]
    fn test_decode_rejects_excessive_depth() {
        let doc = (0..=MAX_DEPTH).fold(Value::Null, |inner, _| Value::Array(vec![inner]));
        let err = decode(&doc).unwrap_err();
        assert!(matches!(err, SyncError::Decoding(_)));
    }

    #[test]
    fn test_encode_rejects_type_key_collision() {
        let value = StateValue::map(vec![(TYPE_KEY.to_string(), StateValue::Null)]);
        assert!(matches!(encode(&value), Err(SyncError::Encoding(_))));

        let value: StateValue = vec![(TYPE_KEY.to_string(), StateValue::from("Set"))]
            .into_iter()
            .collect();
        assert!(matches!(encode(&value), Err(SyncError::Encoding(_))));
    }

    fn arb_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,6}"
    }

    fn arb_state() -> impl Strategy<Value = StateValue> {
        let leaf = prop_oneof![
            Just(StateValue::Null),
            any::<bool>().prop_map(StateValue::from),
            any::<i64>().prop_map(StateValue::from),
            "[ -~]{0,12}".prop_map(StateValue::from),
            (0i64..4_000_000_000).prop_map(|secs| {
                StateValue::Date(Utc.timestamp_opt(secs, 0).unwrap())
            }),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(StateValue::Array),
                prop::collection::btree_map(arb_key(), inner.clone(), 0..6)
                    .prop_map(StateValue::Object),
                prop::collection::btree_map(arb_key(), inner.clone(), 0..6)
                    .prop_map(StateValue::Map),
                prop::collection::vec(inner, 0..6).prop_map(StateValue::set),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(state in arb_state()) {
            let decoded = decode(&encode(&state).unwrap()).unwrap();
            prop_assert_eq!(decoded, state);
        }
    }
}

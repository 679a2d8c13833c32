use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Number;

/// A value held by a host container.
///
/// Plain JSON shapes plus the three kinds JSON cannot express on its own:
/// dates, associative maps and uniqueness sets. `codec` converts between this
/// model and the wire document stored remotely.
#[derive(Debug, Clone)]
pub enum StateValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<StateValue>),
    /// Plain object.
    Object(BTreeMap<String, StateValue>),
    /// Associative map container.
    Map(BTreeMap<String, StateValue>),
    /// Uniqueness set. Build with [`StateValue::set`] to de-duplicate members.
    Set(Vec<StateValue>),
}

impl StateValue {
    /// An empty plain object, the default shape of a container root.
    pub fn object() -> Self {
        StateValue::Object(BTreeMap::new())
    }

    /// Build a set, keeping the first occurrence of equal members.
    pub fn set(members: impl IntoIterator<Item = StateValue>) -> Self {
        let mut unique: Vec<StateValue> = Vec::new();
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        StateValue::Set(unique)
    }

    pub fn map(entries: impl IntoIterator<Item = (String, StateValue)>) -> Self {
        StateValue::Map(entries.into_iter().collect())
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, StateValue>> {
        match self {
            StateValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, StateValue>> {
        match self {
            StateValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key of a plain object.
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Shallow-merge the top-level keys of `patch` into `self`.
    ///
    /// Non-object receivers are replaced by the patch wholesale.
    pub fn merge(&mut self, patch: StateValue) {
        match (self, patch) {
            (StateValue::Object(target), StateValue::Object(entries)) => target.extend(entries),
            (receiver, patch) => *receiver = patch,
        }
    }
}

impl Default for StateValue {
    fn default() -> Self {
        StateValue::Null
    }
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StateValue::Null, StateValue::Null) => true,
            (StateValue::Bool(a), StateValue::Bool(b)) => a == b,
            (StateValue::Number(a), StateValue::Number(b)) => a == b,
            (StateValue::String(a), StateValue::String(b)) => a == b,
            (StateValue::Date(a), StateValue::Date(b)) => a == b,
            (StateValue::Array(a), StateValue::Array(b)) => a == b,
            (StateValue::Object(a), StateValue::Object(b)) => a == b,
            (StateValue::Map(a), StateValue::Map(b)) => a == b,
            // Sets compare by membership, not insertion order.
            (StateValue::Set(a), StateValue::Set(b)) => {
                a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
            }
            _ => false,
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        StateValue::Number(value.into())
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Number(value.into())
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::String(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::String(value)
    }
}

impl From<DateTime<Utc>> for StateValue {
    fn from(value: DateTime<Utc>) -> Self {
        StateValue::Date(value)
    }
}

impl From<Vec<StateValue>> for StateValue {
    fn from(value: Vec<StateValue>) -> Self {
        StateValue::Array(value)
    }
}

impl FromIterator<(String, StateValue)> for StateValue {
    fn from_iter<I: IntoIterator<Item = (String, StateValue)>>(iter: I) -> Self {
        StateValue::Object(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_deduplicates_keeping_first() {
        let set = StateValue::set(vec!["a".into(), "b".into(), "a".into()]);
        match set {
            StateValue::Set(members) => {
                assert_eq!(members, vec![StateValue::from("a"), StateValue::from("b")])
            }
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let a = StateValue::set(vec![1.into(), 2.into()]);
        let b = StateValue::set(vec![2.into(), 1.into()]);
        assert_eq!(a, b);
        assert_ne!(a, StateValue::set(vec![1.into()]));
    }

    #[test]
    fn test_map_and_object_are_distinct() {
        let entries = vec![("k".to_string(), StateValue::from(1))];
        let map = StateValue::map(entries.clone());
        let object: StateValue = entries.into_iter().collect();
        assert_ne!(map, object);
    }

    #[test]
    fn test_merge_keeps_untouched_keys() {
        let mut base: StateValue = vec![
            ("a".to_string(), StateValue::from(1)),
            ("b".to_string(), StateValue::from(2)),
        ]
        .into_iter()
        .collect();
        let patch: StateValue = vec![("b".to_string(), StateValue::from(3))].into_iter().collect();
        base.merge(patch);
        assert_eq!(base.get("a"), Some(&StateValue::from(1)));
        assert_eq!(base.get("b"), Some(&StateValue::from(3)));
    }
}

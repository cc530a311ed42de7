use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub type SessionState = Arc<dyn SessionStateType + Send + Sync + 'static>;

/// Per-session key-value store backing the `context` location.
pub trait SessionStateType: Send + Sync + Debug {
    /// Gets the value associated with a key, if present.
    fn get(&self, key: &str) -> Option<StateValue>;

    /// Sets or replaces the value for a key.
    fn set(&self, key: String, value: StateValue);

    fn contains(&self, key: &str) -> bool;

    fn remove(&self, key: &str);

    /// Clears all keys from the session.
    fn clear(&self);

    /// Returns all key-value pairs in the session.
    fn all(&self) -> Vec<(String, StateValue)>;
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StateValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    List(Vec<StateValue>),
    #[schemars(with = "HashMap<String, StateValue>")]
    Map(DashMap<String, StateValue>),
    Null,
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        use StateValue::*;
        match (self, other) {
            (String(a), String(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Null, Null) => true,
            (Map(a), Map(b)) => {
                let a_map: HashMap<_, _> = a.iter().map(|r| (r.key().clone(), r.value().clone())).collect();
                let b_map: HashMap<_, _> = b.iter().map(|r| (r.key().clone(), r.value().clone())).collect();
                a_map == b_map
            }
            _ => false,
        }
    }
}

impl StateValue {
    pub fn as_str(&self) -> Option<&str> {
        if let StateValue::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let StateValue::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn as_map(&self) -> Option<&DashMap<String, StateValue>> {
        if let StateValue::Map(m) = self {
            Some(m)
        } else {
            None
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            StateValue::String(s) => json!(s),
            StateValue::Integer(i) => json!(i),
            StateValue::Number(n) => json!(n),
            StateValue::Boolean(b) => json!(b),
            StateValue::List(l) => json!(l.iter().map(|v| v.to_json()).collect::<Vec<_>>()),
            StateValue::Map(m) => {
                let mut map = serde_json::Map::new();
                for r in m.iter() {
                    map.insert(r.key().clone(), r.value().to_json());
                }
                Value::Object(map)
            }
            StateValue::Null => Value::Null,
        }
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => StateValue::String(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => StateValue::Integer(i),
                None => n.as_f64().map(StateValue::Number).unwrap_or(StateValue::Null),
            },
            Value::Bool(b) => StateValue::Boolean(b),
            Value::Array(a) => StateValue::List(a.into_iter().map(StateValue::from).collect()),
            Value::Object(o) => StateValue::Map(o.into_iter().map(|(k, v)| (k, StateValue::from(v))).collect()),
            Value::Null => StateValue::Null,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryState {
    store: Arc<DashMap<String, StateValue>>,
}

impl InMemoryState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SessionStateType for InMemoryState {
    fn get(&self, key: &str) -> Option<StateValue> {
        self.store.get(key).map(|v| v.clone())
    }

    fn set(&self, key: String, value: StateValue) {
        self.store.insert(key, value);
    }

    fn contains(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    fn remove(&self, key: &str) {
        self.store.remove(key);
    }

    fn clear(&self) {
        self.store.clear();
    }

    fn all(&self) -> Vec<(String, StateValue)> {
        self.store
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trips_through_state_value() {
        let original = json!({
            "success": true,
            "count": 3,
            "ratio": 0.5,
            "records": [{"id": "rec1", "fields": {}}],
            "status": null
        });

        let state = StateValue::from(original.clone());
        assert_eq!(state.to_json(), original);
    }

    #[test]
    fn integers_stay_integers() {
        let state = StateValue::from(json!(42));
        assert_eq!(state, StateValue::Integer(42));
        assert_eq!(state.to_json(), json!(42));
    }

    #[test]
    fn accessors() {
        assert_eq!(StateValue::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(StateValue::Boolean(true).as_bool(), Some(true));
        assert_eq!(StateValue::Null.as_str(), None);
        assert!(StateValue::from(json!({"a": 1})).as_map().is_some());
    }

    #[test]
    fn in_memory_state_set_get_remove() {
        let state = InMemoryState::new();
        state.set("x".to_string(), StateValue::Integer(1));
        assert!(state.contains("x"));
        assert_eq!(state.get("x"), Some(StateValue::Integer(1)));

        state.remove("x");
        assert_eq!(state.get("x"), None);

        state.set("y".to_string(), StateValue::Null);
        state.clear();
        assert!(state.all().is_empty());
    }
}

//! State records and typed accessors over them
//!
//! A record is a JSON object keyed by attribute name. `null` and absent
//! keys both mean "unset"; nested single blocks are nested objects.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type State = Map<String, Value>;

/// Typed reads and writes on a [`State`] record
pub trait StateExt {
    fn get_str(&self, key: &str) -> Option<&str>;
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_block(&self, key: &str) -> Option<&State>;
    fn get_string_list(&self, key: &str) -> Vec<String>;
    fn get_string_map(&self, key: &str) -> BTreeMap<String, String>;
    fn is_set(&self, key: &str) -> bool;

    fn set_value(&mut self, key: &str, value: impl Into<Value>);
    fn set_opt_str(&mut self, key: &str, value: Option<&str>);
    fn set_string_list(&mut self, key: &str, values: &[String]);
    fn set_string_map(&mut self, key: &str, values: &BTreeMap<String, String>);
    fn set_block(&mut self, key: &str, block: Option<State>);
}

impl StateExt for State {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn get_block(&self, key: &str) -> Option<&State> {
        self.get(key).and_then(Value::as_object)
    }

    fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key)
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    fn set_value(&mut self, key: &str, value: impl Into<Value>) {
        self.insert(key.to_string(), value.into());
    }

    fn set_opt_str(&mut self, key: &str, value: Option<&str>) {
        let value = value.map_or(Value::Null, |s| Value::String(s.to_string()));
        self.insert(key.to_string(), value);
    }

    fn set_string_list(&mut self, key: &str, values: &[String]) {
        let values = values.iter().cloned().map(Value::String).collect();
        self.insert(key.to_string(), Value::Array(values));
    }

    fn set_string_map(&mut self, key: &str, values: &BTreeMap<String, String>) {
        let map = values
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self.insert(key.to_string(), Value::Object(map));
    }

    fn set_block(&mut self, key: &str, block: Option<State>) {
        self.insert(key.to_string(), block.map_or(Value::Null, Value::Object));
    }
}

/// Returns the non-empty string at `key`; empty strings count as unset
pub fn non_empty<'a>(state: &'a State, key: &str) -> Option<&'a str> {
    state.get_str(key).filter(|s| !s.is_empty())
}

/// `value` is null, an empty string, an empty list or an empty object
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_empty_value),
        _ => false,
    }
}

/// Builds a [`State`] from `key => value` pairs
#[macro_export]
macro_rules! state {
    () => { $crate::State::new() };
    ($($key:expr => $value:tt),+ $(,)?) => {{
        let mut state = $crate::State::new();
        $( state.insert(($key).to_string(), ::serde_json::json!($value)); )+
        state
    }};
}

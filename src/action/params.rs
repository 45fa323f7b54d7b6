use super::definition::ParamSchema;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Parameter values of an action.
///
/// Every declared name has an entry; `None` marks a declared parameter with no value. Absent
/// values are skipped on serialization, so they never reach the wire or the storage key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionParams(BTreeMap<String, Option<Value>>);

impl ActionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace semantics: each schema name takes `config[name]` or becomes absent. Names
    /// outside the schema are ignored.
    pub fn from_schema(schema: &ParamSchema, config: &Map<String, Value>) -> Self {
        Self(
            schema
                .names()
                .map(|name| (name.to_string(), config.get(name).cloned()))
                .collect(),
        )
    }

    /// Value of `name`; `None` when undeclared or absent
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).and_then(Option::as_ref)
    }

    /// Whether `name` has an entry, with or without a value
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<Value>) {
        self.0.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    /// Entries that carry a value
    pub fn defined(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object of the defined entries
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.defined()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }
}

impl Serialize for ActionParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let defined: Vec<_> = self.defined().collect();
        let mut map = serializer.serialize_map(Some(defined.len()))?;
        for (name, value) in defined {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<Value>)> for ActionParams {
    fn from_iter<T: IntoIterator<Item = (K, Option<Value>)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

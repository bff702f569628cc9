//! Process variables: the typed name/value map exchanged with the engine.
//!
//! The engine's wire shape is `{"name": {"value": ..., "type": "String"}}`.
//! Handlers work with the plain [`Value`] enum; serialization to and from the
//! wire shape happens here so nothing else needs to know about it.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single typed variable value.
///
/// Integer covers the engine's Short/Integer/Long types; the distinction only
/// matters inside the engine's own type system.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    /// Raw bytes; base64 text on the wire.
    Bytes(Vec<u8>),
    /// Structured payload; a JSON-encoded string on the wire.
    Json(serde_json::Value),
}

impl Value {
    /// Engine type name used when serializing.
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Double(_) => "Double",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Json(_) => "Json",
        }
    }

    /// Plain JSON representation (no type tag), used for typed decoding.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Double(d) => serde_json::Value::from(*d),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(BASE64.encode(b)),
            Value::Json(v) => v.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

/// Wire representation of one variable: `{"value": ..., "type": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
struct WireValue {
    value: serde_json::Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        let wire = match value {
            // The engine expects Json payloads as an encoded string.
            Value::Json(v) => serde_json::Value::String(v.to_string()),
            other => other.to_json(),
        };
        WireValue {
            value: wire,
            kind: Some(value.type_name().to_string()),
        }
    }
}

impl WireValue {
    fn into_value(self) -> Result<Value, String> {
        let kind = self.kind.as_deref().unwrap_or("").to_ascii_lowercase();
        match kind.as_str() {
            "boolean" => self
                .value
                .as_bool()
                .map(Value::Boolean)
                .ok_or_else(|| "expected a boolean value".to_string()),
            "short" | "integer" | "long" => self
                .value
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| "expected an integer value".to_string()),
            "double" | "float" => self
                .value
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| "expected a numeric value".to_string()),
            "string" => match self.value {
                serde_json::Value::String(s) => Ok(Value::String(s)),
                serde_json::Value::Null => Ok(Value::Null),
                other => Err(format!("expected a string value, got {other}")),
            },
            "bytes" | "file" => match self.value {
                serde_json::Value::String(s) => BASE64
                    .decode(s.as_bytes())
                    .map(Value::Bytes)
                    .map_err(|e| format!("invalid base64: {e}")),
                other => Err(format!("expected base64 text, got {other}")),
            },
            "json" | "object" => match self.value {
                // Json arrives as an encoded string, but tolerate inline JSON.
                serde_json::Value::String(s) => serde_json::from_str(&s)
                    .map(Value::Json)
                    .map_err(|e| format!("invalid json payload: {e}")),
                other => Ok(Value::Json(other)),
            },
            "null" => Ok(Value::Null),
            // No (or unknown) type tag: infer from the JSON shape.
            _ => Ok(match self.value {
                serde_json::Value::Null => Value::Null,
                serde_json::Value::Bool(b) => Value::Boolean(b),
                serde_json::Value::Number(n) => {
                    if let Some(i) = n.as_i64() {
                        Value::Integer(i)
                    } else {
                        Value::Double(n.as_f64().unwrap_or_default())
                    }
                }
                serde_json::Value::String(s) => Value::String(s),
                other => Value::Json(other),
            }),
        }
    }
}

/// Name → value map for a claim's input or a handler's output.
///
/// Input maps are read-only from the handler's point of view; handlers build
/// a fresh map for output. BTreeMap keeps serialization order stable, which
/// makes request bodies deterministic in tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables(BTreeMap<String, Value>);

impl Variables {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder-style insert of a binary value.
    pub fn with_bytes(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.0.insert(name.into(), Value::Bytes(bytes));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Decode the whole map into a typed payload.
    ///
    /// Used by the typed handler layer: the map is flattened to a plain JSON
    /// object first, so payload structs derive `Deserialize` as usual.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(object))
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Variables {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire: BTreeMap<&String, WireValue> = self
            .0
            .iter()
            .map(|(name, value)| (name, WireValue::from(value)))
            .collect();
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Variables {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = BTreeMap::<String, WireValue>::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        for (name, value) in wire {
            let value = value
                .into_value()
                .map_err(|e| serde::de::Error::custom(format!("variable '{name}': {e}")))?;
            map.insert(name, value);
        }
        Ok(Self(map))
    }
}

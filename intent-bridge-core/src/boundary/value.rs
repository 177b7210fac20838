//! Untyped values crossing the host boundary.

use std::collections::BTreeMap;
use std::sync::Arc;

/// A callable supplied by the host. Receives the callback payload as JSON.
#[derive(Clone)]
pub struct HostFunction(Arc<dyn Fn(serde_json::Value) + Send + Sync>);

impl HostFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, arg: serde_json::Value) {
        (self.0)(arg)
    }
}

impl std::fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[Function]")
    }
}

impl PartialEq for HostFunction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<HostValue>),
    Object(BTreeMap<String, HostValue>),
    Function(HostFunction),
}

impl HostValue {
    pub fn object<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HostValue)>,
    {
        Self::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) | Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&HostFunction> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Field lookup on objects; `None` for everything else.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            Self::Object(fields) => fields.get(key),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => {
                Self::Object(fields.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<HostFunction> for HostValue {
    fn from(value: HostFunction) -> Self {
        Self::Function(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_objects_convert_recursively() {
        let value = HostValue::from(serde_json::json!({
            "key": "abc",
            "region": "westus",
            "retries": 3,
            "tags": ["a", null],
        }));

        assert_eq!(value.get("key").and_then(HostValue::as_str), Some("abc"));
        assert_eq!(value.get("retries"), Some(&HostValue::Number(3.0)));
        assert_eq!(
            value.get("tags"),
            Some(&HostValue::Array(vec!["a".into(), HostValue::Null]))
        );
        assert_eq!(value.type_name(), "object");
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = HostFunction::new(|_| {});
        let g = HostFunction::new(|_| {});
        assert_eq!(HostValue::from(f.clone()), HostValue::Function(f.clone()));
        assert_ne!(HostValue::from(f), HostValue::from(g));
    }
}

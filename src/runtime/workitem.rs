use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload travelling through the expression tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workitem {
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Workitem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Overlays `other`'s fields on top of this workitem.
    pub fn merge(&mut self, other: Workitem) {
        for (k, v) in other.fields {
            self.fields.insert(k, v);
        }
    }
}

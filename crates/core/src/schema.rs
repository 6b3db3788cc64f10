//! Argument schema descriptors exposed to the model.
//!
//! A small closed set of JSON-Schema shapes. Serializing a [`SchemaType`]
//! yields the JSON Schema object the chat-completions API expects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One node of an argument schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaType {
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Boolean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Array {
        items: Box<SchemaType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Object(ObjectSchema),
}

impl SchemaType {
    pub fn string(description: impl Into<String>) -> Self {
        Self::String {
            description: Some(description.into()),
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::Number {
            description: Some(description.into()),
        }
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::Integer {
            description: Some(description.into()),
        }
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::Boolean {
            description: Some(description.into()),
        }
    }

    pub fn array(items: SchemaType, description: impl Into<String>) -> Self {
        Self::Array {
            items: Box::new(items),
            description: Some(description.into()),
        }
    }

    /// Render as a JSON Schema value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// An object with named properties and a required-field list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, SchemaType>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ObjectSchema {
    /// An object with no properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property the model must supply.
    pub fn required_property(mut self, name: impl Into<String>, schema: SchemaType) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }

    /// Add a property the model may omit.
    pub fn optional_property(mut self, name: impl Into<String>, schema: SchemaType) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    /// Names of required properties missing from `value`.
    pub fn missing_required<'a>(&'a self, value: &serde_json::Value) -> Vec<&'a str> {
        self.required
            .iter()
            .filter(|name| value.get(name.as_str()).is_none_or(|v| v.is_null()))
            .map(String::as_str)
            .collect()
    }
}

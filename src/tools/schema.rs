// ABOUTME: JSON Schema subset used to describe tool parameters to the model
// ABOUTME: Serializes into the `parameters` field of a Gemini function declaration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Object schema for a tool's arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Always `object`
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Argument properties by name
    pub properties: BTreeMap<String, PropertySchema>,
    /// Names of required arguments
    pub required: Vec<String>,
}

impl JsonSchema {
    /// Object schema with the given properties and required names
    #[must_use]
    pub fn object(properties: Vec<(&str, PropertySchema)>, required: &[&str]) -> Self {
        Self {
            schema_type: "object".to_owned(),
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.to_owned(), schema))
                .collect(),
            required: required.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    /// Schema for a tool without arguments
    #[must_use]
    pub fn empty() -> Self {
        Self::object(Vec::new(), &[])
    }

    /// JSON value for a function declaration
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Schema of one argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    /// JSON type name
    #[serde(rename = "type")]
    pub property_type: String,
    /// Human-readable description for the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Allowed values
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl PropertySchema {
    fn typed(property_type: &str, description: &str) -> Self {
        Self {
            property_type: property_type.to_owned(),
            description: Some(description.to_owned()),
            enum_values: None,
        }
    }

    /// String argument
    #[must_use]
    pub fn string(description: &str) -> Self {
        Self::typed("string", description)
    }

    /// Integer argument
    #[must_use]
    pub fn integer(description: &str) -> Self {
        Self::typed("integer", description)
    }

    /// Restrict to a fixed set of values
    #[must_use]
    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| (*v).to_owned()).collect());
        self
    }
}

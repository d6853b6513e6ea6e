//! Immutable error context carried alongside a failure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed metadata value attached to an [`ErrorContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Flag(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<u32> for MetadataValue {
    fn from(value: u32) -> Self {
        MetadataValue::Integer(i64::from(value))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        MetadataValue::List(value)
    }
}

/// Where and when an error happened.
///
/// Created fresh at each call site and never mutated afterwards; the
/// builder is the only way to attach optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    component: String,
    operation: String,
    user_id: Option<String>,
    session_id: Option<String>,
    timestamp: DateTime<Utc>,
    metadata: BTreeMap<String, MetadataValue>,
}

impl ErrorContext {
    /// Create a context with no optional fields
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::builder(component, operation).build()
    }

    pub fn builder(component: impl Into<String>, operation: impl Into<String>) -> ErrorContextBuilder {
        ErrorContextBuilder {
            component: component.into(),
            operation: operation.into(),
            user_id: None,
            session_id: None,
            timestamp: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetadataValue> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// `component.operation`, used as a log label
    pub fn label(&self) -> String {
        format!("{}.{}", self.component, self.operation)
    }
}

/// Builder for [`ErrorContext`]
#[derive(Debug, Clone)]
pub struct ErrorContextBuilder {
    component: String,
    operation: String,
    user_id: Option<String>,
    session_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    metadata: BTreeMap<String, MetadataValue>,
}

impl ErrorContextBuilder {
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Override the capture time (defaults to now)
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ErrorContext {
        ErrorContext {
            component: self.component,
            operation: self.operation,
            user_id: self.user_id,
            session_id: self.session_id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            metadata: self.metadata,
        }
    }
}

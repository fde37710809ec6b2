//! Multi-valued HTTP header map carried on fetch results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Response headers, preserving every value seen for a repeated name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpHeaders {
    values: HashMap<String, Vec<String>>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    /// First value recorded for the name, if any.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values recorded for the name, in insertion order.
    pub fn all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

//! Connection descriptors
//!
//! A descriptor is an opaque bag of attributes (`host`, `user`, `password`,
//! `dbname`, plus anything a particular handler understands). The queue,
//! runner and facade only pass descriptors through; handlers interpret them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, HandlerResult};

/// Attributes describing how to reach one database
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionDescriptor {
    attributes: BTreeMap<String, String>,
}

impl ConnectionDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Fetch an attribute a handler cannot work without
    pub fn require(&self, key: &str) -> HandlerResult<&str> {
        self.get(key).ok_or_else(|| {
            HandlerError::invalid_connection(format!("missing '{}' attribute", key))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for ConnectionDescriptor
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// Passwords never end up in logs.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.attributes {
            if key == "password" {
                map.entry(key, &"***");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

//! Provide a [`Context`] for a request.
//!
//! The caller builds one per request (or shares one, treated as read-only by
//! resolvers) and the pipeline threads it untouched to the executor, which
//! makes it available to every resolver.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json_bytes::Value;

use crate::BoxError;

/// Holds [`Context`] entries.
pub type Entries = Arc<DashMap<String, Value>>;

/// A key→JSON bag threaded opaquely from the request to every resolver.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct Context {
    entries: Entries,
}

impl Context {
    pub fn new() -> Self {
        Context {
            entries: Default::default(),
        }
    }

    pub fn get<K, V>(&self, key: K) -> Result<Option<V>, BoxError>
    where
        K: Into<String>,
        V: for<'de> serde::Deserialize<'de>,
    {
        self.entries
            .get(&key.into())
            .map(|v| serde_json_bytes::from_value(v.value().clone()))
            .transpose()
            .map_err(|e| e.into())
    }

    pub fn insert<K, V>(&self, key: K, value: V) -> Result<Option<V>, BoxError>
    where
        K: Into<String>,
        V: for<'de> serde::Deserialize<'de> + Serialize,
    {
        match serde_json_bytes::to_value(value) {
            Ok(value) => self
                .entries
                .insert(key.into(), value)
                .map(serde_json_bytes::from_value)
                .transpose()
                .map_err(|e| e.into()),
            Err(e) => Err(e.into()),
        }
    }
}

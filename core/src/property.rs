//! Per-input-context properties.
//!
//! The host keeps one property object per input context, keyed by a name
//! registered once at addon construction. A `PropertyFactory` pairs that key
//! with a producer and owns the live objects; releasing a context drops its
//! property, which is where per-context resources get freed.

use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, Result};

use crate::input_context::InputContextId;

/// Registry of property keys known to the host.
#[derive(Debug, Default)]
pub struct InputContextManager {
    keys: HashSet<String>,
}

impl InputContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property key. Keys are unique per host instance.
    pub fn register_property(&mut self, key: &str) -> Result<()> {
        if !self.keys.insert(key.to_string()) {
            bail!("input context property {:?} is already registered", key);
        }
        Ok(())
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Creates and owns one `S` per input context.
pub struct PropertyFactory<S> {
    key: String,
    producer: Box<dyn Fn(InputContextId) -> S>,
    properties: BTreeMap<InputContextId, S>,
}

impl<S> PropertyFactory<S> {
    pub fn new<F>(key: impl Into<String>, producer: F) -> Self
    where
        F: Fn(InputContextId) -> S + 'static,
    {
        Self {
            key: key.into(),
            producer: Box::new(producer),
            properties: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Create the property for a newly bound context. Binding an already
    /// bound context keeps the existing property.
    pub fn bind(&mut self, ic: InputContextId) -> &mut S {
        let producer = &self.producer;
        self.properties.entry(ic).or_insert_with(|| producer(ic))
    }

    /// Live property for `ic`, created on first use.
    pub fn property_for(&mut self, ic: InputContextId) -> &mut S {
        self.bind(ic)
    }

    pub fn get(&self, ic: InputContextId) -> Option<&S> {
        self.properties.get(&ic)
    }

    /// Destroy the property of a released context.
    pub fn release(&mut self, ic: InputContextId) -> Option<S> {
        self.properties.remove(&ic)
    }

    pub fn contains(&self, ic: InputContextId) -> bool {
        self.properties.contains_key(&ic)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<S> std::fmt::Debug for PropertyFactory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyFactory")
            .field("key", &self.key)
            .field("live", &self.properties.len())
            .finish()
    }
}

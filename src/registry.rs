//! Producer registry.
//!
//! Compiled code cannot serialize arbitrary callables, so stages reference a
//! statically registered producer by string key; the persisted form of a
//! callable is its key plus a captured configuration blob (see
//! [`crate::codec::CallableRef`]). The registry is an explicitly injected
//! collaborator of [`crate::Pipeline::run`] — there is no process-global
//! table.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::{PipelineError, Result};

/// The lazy fan-out sequence a producer returns. Values are drained one at
/// a time; the sequence may be empty or unbounded.
pub type Produced = Box<dyn Iterator<Item = Value>>;

/// One call into a producer. Built fresh for every invocation — producers
/// may consume it freely without affecting later calls.
#[derive(Clone, Debug, Default)]
pub struct Invocation {
    /// Captured configuration blob from the stage's callable reference.
    pub captured: Value,
    /// Positional values, previous-stage result prepended when present.
    pub args: Vec<Value>,
    /// Keyword values: declared stage kwargs plus retrieved entries.
    pub kwargs: Map<String, Value>,
}

impl Invocation {
    /// Positional value at `index`, or `Null` when absent.
    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }

    /// Keyword value under `name`, or `Null` when absent.
    pub fn kwarg(&self, name: &str) -> &Value {
        self.kwargs.get(name).unwrap_or(&Value::Null)
    }
}

/// A registered producer: takes one invocation, returns a lazy sequence of
/// produced values.
pub type Producer = Arc<dyn Fn(Invocation) -> Result<Produced> + Send + Sync>;

/// Key → producer table consulted at execution time.
#[derive(Clone, Default)]
pub struct Registry {
    producers: HashMap<String, Producer>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a producer under `key`, replacing any previous entry.
    pub fn register<F>(&mut self, key: impl Into<String>, producer: F)
    where
        F: Fn(Invocation) -> Result<Produced> + Send + Sync + 'static,
    {
        let _ = self.producers.insert(key.into(), Arc::new(producer));
    }

    /// Look up the producer for `key`.
    pub(crate) fn resolve(&self, key: &str) -> Result<&Producer> {
        self.producers
            .get(key)
            .ok_or_else(|| PipelineError::Configuration(format!("unknown producer key {key:?}")))
    }

    /// Resolve `key` and invoke its producer with `invocation`.
    pub fn invoke(&self, key: &str, invocation: Invocation) -> Result<Produced> {
        let producer = self.resolve(key)?;
        producer.as_ref()(invocation)
    }

    /// Whether `key` has a registered producer.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.producers.contains_key(key)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.producers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Registry").field("keys", &keys).finish()
    }
}

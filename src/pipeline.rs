//! Pipeline definition and builder surface.
//!
//! A [`Pipeline`] is an ordered, append-only stage list plus a configuration
//! map. The codec tier is derived from the configuration — a `storeDir`
//! entry selects content-addressed files (tier 2), `codec = "blob"` selects
//! serialized blobs (tier 1), anything else the in-memory tier — so the
//! serialized form of a definition is exactly `{config, pipes}` at every
//! nesting level.
//!
//! ```rust,ignore
//! let mut registry = Registry::new();
//! registry.register("produce", |inv| { /* yield inv.arg(0) */ });
//! registry.register("repeat", |inv| { /* yield prev, `times` times */ });
//!
//! let out = Pipeline::new()
//!     .pipe(Call::new("produce").arg(json!("hello")))?
//!     .pipe(Call::new("repeat").kwarg("times", json!(3)))?
//!     .run(&registry, None)?;
//! assert_eq!(out, vec![json!("hello"); 3]);
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{CallableRef, Codec};
use crate::errors::Result;
use crate::exec::SegmentExecutor;
use crate::registry::Registry;
use crate::stage::Stage;

/// Configuration key naming the tier-2 store directory.
pub const CONFIG_STORE_DIR: &str = "storeDir";
/// Configuration key selecting the codec tier when no directory is set.
pub const CONFIG_CODEC: &str = "codec";

/// An ordered pipeline definition.
///
/// Built by chaining [`pipe`](Self::pipe) / [`nest`](Self::nest) /
/// [`save`](Self::save); stages are appended, never mutated, reordered, or
/// removed. Execution ([`run`](Self::run)) walks the list depth-first,
/// fanning out over every produced value and flattening all branch results
/// into one ordered collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Wire", into = "Wire")]
pub struct Pipeline {
    config: Map<String, Value>,
    pipes: Vec<Stage>,
    codec: Codec,
}

impl Pipeline {
    /// Empty definition with the in-memory codec (tier 0).
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Map::new())
    }

    /// Empty definition with the serialized-blob codec (tier 1).
    #[must_use]
    pub fn blob() -> Self {
        let mut config = Map::new();
        let _ = config.insert(CONFIG_CODEC.into(), Value::String("blob".into()));
        Self::with_config(config)
    }

    /// Empty definition with the content-addressed file codec (tier 2).
    ///
    /// `dir` is created on first dump if missing; it must remain intact for
    /// later loads and restores.
    #[must_use]
    pub fn local(dir: impl AsRef<Path>) -> Self {
        let mut config = Map::new();
        let _ = config.insert(
            CONFIG_STORE_DIR.into(),
            Value::String(dir.as_ref().to_string_lossy().into_owned()),
        );
        Self::with_config(config)
    }

    /// Empty definition around an arbitrary configuration map. The codec is
    /// derived from the map; unrelated entries are preserved verbatim
    /// through snapshots.
    #[must_use]
    pub fn with_config(config: Map<String, Value>) -> Self {
        let codec = codec_from_config(&config);
        Self {
            config,
            pipes: Vec::new(),
            codec,
        }
    }

    /// Insert a configuration entry, re-deriving the codec.
    #[must_use]
    pub fn configure(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self.config.insert(key.into(), value);
        self.codec = codec_from_config(&self.config);
        self
    }

    /// Append a producer stage.
    ///
    /// The callable is dumped through the definition's codec here, at
    /// definition time — the tier-2 file write is why this can fail.
    pub fn pipe(mut self, call: Call) -> Result<Self> {
        let token = self.codec.dump(&call.callable)?;
        self.pipes.push(Stage::Func {
            token,
            args: call.args,
            kwargs: call.kwargs,
            retrieve: call.retrieve,
        });
        Ok(self)
    }

    /// Append an embedded sub-pipeline stage. The sub-pipeline keeps its own
    /// configuration and codec and runs with its own value store.
    #[must_use]
    pub fn nest(mut self, pipeline: Pipeline) -> Self {
        self.pipes.push(Stage::Nest { pipeline });
        self
    }

    /// Append a stage saving the previous value under `name`.
    #[must_use]
    pub fn save(mut self, name: impl Into<String>) -> Self {
        self.pipes.push(Stage::Save { name: name.into() });
        self
    }

    /// Execute the definition and return the flattened, ordered results.
    ///
    /// `initial` seeds the previous value; producers are resolved through
    /// `registry`. Every call gets a fresh value store. A mid-run failure
    /// aborts the whole run with the failing stage's position and kind.
    pub fn run(&self, registry: &Registry, initial: Option<Value>) -> Result<Vec<Value>> {
        SegmentExecutor::new(&self.codec, registry).run(&self.pipes, initial)
    }

    /// The configuration map.
    #[must_use]
    pub fn config(&self) -> &Map<String, Value> {
        &self.config
    }

    /// The ordered stage list.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.pipes
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    /// Whether the definition has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// The codec derived from the configuration.
    pub(crate) fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Rebuild a definition from a configuration map and a raw stage list.
    pub(crate) fn from_parts(config: Map<String, Value>, pipes: Vec<Stage>) -> Self {
        let codec = codec_from_config(&config);
        Self {
            config,
            pipes,
            codec,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn codec_from_config(config: &Map<String, Value>) -> Codec {
    if let Some(Value::String(dir)) = config.get(CONFIG_STORE_DIR) {
        Codec::File {
            dir: PathBuf::from(dir),
        }
    } else if matches!(config.get(CONFIG_CODEC), Some(Value::String(tier)) if tier == "blob") {
        Codec::Blob
    } else {
        Codec::Inline
    }
}

/// Wire form of a definition: exactly `{config, pipes}`.
#[derive(Serialize, Deserialize)]
struct Wire {
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(default)]
    pipes: Vec<Stage>,
}

impl From<Wire> for Pipeline {
    fn from(wire: Wire) -> Self {
        Self::from_parts(wire.config, wire.pipes)
    }
}

impl From<Pipeline> for Wire {
    fn from(pipeline: Pipeline) -> Self {
        Self {
            config: pipeline.config,
            pipes: pipeline.pipes,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Call builder
// ─────────────────────────────────────────────────────────────────────────────

/// Argument builder for [`Pipeline::pipe`].
///
/// Names a registered producer and collects its captured blob, declared
/// positional and keyword arguments, and the store names to retrieve into
/// the keyword arguments at invocation time.
#[derive(Clone, Debug, PartialEq)]
pub struct Call {
    callable: CallableRef,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
    retrieve: Vec<String>,
}

impl Call {
    /// Call the producer registered under `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            callable: CallableRef::new(key),
            args: Vec::new(),
            kwargs: Map::new(),
            retrieve: Vec::new(),
        }
    }

    /// Attach a captured configuration blob, persisted with the callable.
    #[must_use]
    pub fn captured(mut self, value: Value) -> Self {
        self.callable.captured = value;
        self
    }

    /// Append a declared positional argument.
    #[must_use]
    pub fn arg(mut self, value: Value) -> Self {
        self.args.push(value);
        self
    }

    /// Declare a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: Value) -> Self {
        let _ = self.kwargs.insert(name.into(), value);
        self
    }

    /// Retrieve the store entry `name` into the keyword arguments at
    /// invocation time. Fails the run if nothing was saved under `name` by
    /// then.
    #[must_use]
    pub fn retrieve(mut self, name: impl Into<String>) -> Self {
        self.retrieve.push(name.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! # cascade
//!
//! Lazy fan-out pipeline engine with persistable stage definitions.
//!
//! A pipeline is an ordered list of stages. Each producer stage yields zero
//! or more values lazily, and every produced value drives an independent
//! recursive execution of the remaining stages; branch results are flattened
//! into one ordered output collection. Definitions support nested
//! sub-pipelines, a run-scoped named value store, three callable-codec tiers
//! (in-memory, serialized blob, content-addressed file), and whole-pipeline
//! snapshots that can be restored and re-run in another process.
//!
//! ## Module Overview
//!
//! - [`pipeline`] — [`Pipeline`] definition and builder (`pipe`/`nest`/`save`/`run`)
//! - [`registry`] — [`Registry`] mapping string keys to statically registered producers
//! - [`stage`] — the closed [`Stage`] tagged variant
//! - [`codec`] — [`Codec`] tiers turning callable refs into transportable tokens
//! - [`store`] — [`ValueStore`], run-scoped named intermediate values
//! - `exec` — the fan-out/flatten segment executor (crate-internal)
//! - [`snapshot`] — binary and textual whole-pipeline snapshots
//! - [`errors`] — [`PipelineError`] taxonomy
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cascade::{Call, Pipeline, Registry};
//! use serde_json::json;
//!
//! let mut registry = Registry::new();
//! registry.register("range", |inv| {
//!     let n = inv.arg(0).as_u64().unwrap_or(0);
//!     Ok(Box::new((0..n).map(|i| json!(i))) as cascade::Produced)
//! });
//! registry.register("double", |inv| {
//!     let n = inv.arg(0).as_i64().unwrap_or(0);
//!     Ok(Box::new(std::iter::once(json!(n * 2))) as cascade::Produced)
//! });
//!
//! let out = Pipeline::new()
//!     .pipe(Call::new("range").arg(json!(3)))?
//!     .pipe(Call::new("double"))?
//!     .run(&registry, None)?;
//! assert_eq!(out, vec![json!(0), json!(2), json!(4)]);
//! # Ok::<(), cascade::PipelineError>(())
//! ```
//!
//! Execution is single-threaded and strictly sequential; producers are
//! drained one value at a time, so peak in-flight state is proportional to
//! recursion depth times local branching, not total output size.

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;
mod exec;
pub mod pipeline;
pub mod registry;
pub mod snapshot;
pub mod stage;
pub mod store;

pub use codec::{CallableRef, Codec, Token};
pub use errors::{PipelineError, Result};
pub use pipeline::{CONFIG_CODEC, CONFIG_STORE_DIR, Call, Pipeline};
pub use registry::{Invocation, Produced, Producer, Registry};
pub use stage::{Stage, StageKind};
pub use store::ValueStore;

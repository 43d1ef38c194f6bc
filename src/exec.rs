//! Segment executor — the fan-out/flatten recursion.
//!
//! A stage list is interpreted depth-first: the head stage produces zero or
//! more values, and each value drives a full recursive execution of the
//! remaining stages before the next value is requested. Results are
//! appended in branch-completion order, so output order is a deterministic
//! function of stage order and each producer's own production order, and
//! peak in-flight state stays proportional to recursion depth times local
//! branching rather than total combinatorial output.

use serde_json::Value;

use crate::codec::Codec;
use crate::errors::Result;
use crate::registry::{Invocation, Registry};
use crate::stage::{Stage, StageKind};
use crate::store::ValueStore;

/// Interpreter for one definition's stage list.
///
/// Holds the definition's codec and the injected producer registry; the
/// value store and output collection live for a single top-level run.
pub(crate) struct SegmentExecutor<'a> {
    codec: &'a Codec,
    registry: &'a Registry,
}

impl<'a> SegmentExecutor<'a> {
    pub(crate) fn new(codec: &'a Codec, registry: &'a Registry) -> Self {
        Self { codec, registry }
    }

    /// Execute `stages` with `initial` as the starting previous value and
    /// return the flattened, ordered results. A fresh value store is
    /// created per call.
    pub(crate) fn run(&self, stages: &[Stage], initial: Option<Value>) -> Result<Vec<Value>> {
        let mut store = ValueStore::new();
        let mut out = Vec::new();
        self.segment(stages, 0, initial, &mut store, &mut out)?;
        Ok(out)
    }

    /// One recursion step. `index` is the absolute position of the head
    /// stage in the definition, carried for error context. Errors raised
    /// while handling the head stage are wrapped with its position; errors
    /// propagating out of the continuation already carry their own.
    fn segment(
        &self,
        stages: &[Stage],
        index: usize,
        prev: Option<Value>,
        store: &mut ValueStore,
        out: &mut Vec<Value>,
    ) -> Result<()> {
        let Some((stage, rest)) = stages.split_first() else {
            // Terminal: the branch yields its previous value exactly once.
            out.push(prev.unwrap_or(Value::Null));
            return Ok(());
        };
        tracing::trace!(index, kind = %stage.kind(), "executing stage");

        match stage {
            Stage::Func {
                token,
                args,
                kwargs,
                retrieve,
            } => {
                let callable = self
                    .codec
                    .load(token)
                    .map_err(|e| e.at_stage(index, StageKind::Func))?;

                // A fresh argument set per invocation: declared stage
                // arguments are never mutated.
                let mut call_args = Vec::with_capacity(args.len() + 1);
                if let Some(value) = &prev {
                    call_args.push(value.clone());
                }
                call_args.extend(args.iter().cloned());

                let mut call_kwargs = kwargs.clone();
                for name in retrieve {
                    let value = store
                        .get(name)
                        .map_err(|e| e.at_stage(index, StageKind::Func))?
                        .clone();
                    let _ = call_kwargs.insert(name.clone(), value);
                }

                let produced = self
                    .registry
                    .invoke(
                        &callable.key,
                        Invocation {
                            captured: callable.captured,
                            args: call_args,
                            kwargs: call_kwargs,
                        },
                    )
                    .map_err(|e| e.at_stage(index, StageKind::Func))?;

                // Drain lazily: fully flatten one branch before requesting
                // the producer's next value. Zero yields prune the branch.
                for value in produced {
                    self.segment(rest, index + 1, Some(value), store, out)?;
                }
            }
            Stage::Nest { pipeline } => {
                let results = pipeline
                    .run(self.registry, prev)
                    .map_err(|e| e.at_stage(index, StageKind::Nest))?;
                for value in results {
                    self.segment(rest, index + 1, Some(value), store, out)?;
                }
            }
            Stage::Save { name } => {
                store.save(name, prev.clone().unwrap_or(Value::Null));
                self.segment(rest, index + 1, prev, store, out)?;
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CallableRef, Token};
    use crate::errors::PipelineError;
    use crate::registry::Produced;
    use assert_matches::assert_matches;
    use serde_json::{Map, json};

    fn func(key: &str, args: Vec<Value>) -> Stage {
        Stage::Func {
            token: Token::Inline {
                callable: CallableRef::new(key),
            },
            args,
            kwargs: Map::new(),
            retrieve: Vec::new(),
        }
    }

    fn func_retrieving(key: &str, args: Vec<Value>, retrieve: &[&str]) -> Stage {
        Stage::Func {
            token: Token::Inline {
                callable: CallableRef::new(key),
            },
            args,
            kwargs: Map::new(),
            retrieve: retrieve.iter().map(ToString::to_string).collect(),
        }
    }

    fn test_registry() -> Registry {
        let mut registry = Registry::new();
        // Yields each declared argument in order, ignoring the previous value.
        registry.register("emit", |inv: Invocation| {
            Ok(Box::new(inv.args.into_iter().skip(1)) as Produced)
        });
        // Yields each argument, previous value included.
        registry.register("emit_all", |inv: Invocation| {
            Ok(Box::new(inv.args.into_iter()) as Produced)
        });
        // Yields the previous value `times` times.
        registry.register("repeat", |inv: Invocation| {
            let value = inv.arg(0).clone();
            let times = inv.args.get(1).and_then(Value::as_u64).unwrap_or(1);
            Ok(Box::new(std::iter::repeat_n(value, times as usize)) as Produced)
        });
        // Yields 0..n.
        registry.register("range", |inv: Invocation| {
            let n = inv.arg(0).as_u64().unwrap_or(0);
            Ok(Box::new((0..n).map(|i| json!(i))) as Produced)
        });
        // Yields nothing.
        registry.register("drop", |_| Ok(Box::new(std::iter::empty()) as Produced));
        // Yields the kwarg named by its first argument.
        registry.register("read_kwarg", |inv: Invocation| {
            let name = inv.arg(1).as_str().unwrap_or_default();
            Ok(Box::new(std::iter::once(inv.kwarg(name).clone())) as Produced)
        });
        registry
    }

    fn run(stages: &[Stage], initial: Option<Value>) -> Result<Vec<Value>> {
        let registry = test_registry();
        SegmentExecutor::new(&Codec::Inline, &registry).run(stages, initial)
    }

    #[test]
    fn empty_stage_list_yields_initial_once() {
        assert_eq!(run(&[], Some(json!("v"))).unwrap(), vec![json!("v")]);
        assert_eq!(run(&[], None).unwrap(), vec![Value::Null]);
    }

    #[test]
    fn single_producer_yields_in_production_order() {
        let stages = [func("emit_all", vec![json!("a"), json!("b"), json!("c")])];
        assert_eq!(
            run(&stages, None).unwrap(),
            vec![json!("a"), json!("b"), json!("c")]
        );
    }

    #[test]
    fn chained_fanout_is_m_times_n_in_outer_inner_order() {
        let stages = [
            func("emit_all", vec![json!(1), json!(2)]),
            func("emit", vec![json!("x"), json!("y"), json!("z")]),
        ];
        let out = run(&stages, None).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(
            out,
            vec![
                json!("x"),
                json!("y"),
                json!("z"),
                json!("x"),
                json!("y"),
                json!("z")
            ]
        );
    }

    #[test]
    fn zero_yield_producer_prunes_the_branch() {
        let stages = [
            func("emit_all", vec![json!(1), json!(2)]),
            func("drop", Vec::new()),
            func("repeat", vec![json!(5)]),
        ];
        assert_eq!(run(&stages, None).unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn save_retains_value_at_save_point() {
        // Save "x" while prev is 7, change prev, then read "x" back.
        let stages = [
            func("emit_all", vec![json!(7)]),
            Stage::Save { name: "x".into() },
            func("emit", vec![json!("other")]),
            func_retrieving("read_kwarg", vec![json!("x")], &["x"]),
        ];
        assert_eq!(run(&stages, None).unwrap(), vec![json!(7)]);
    }

    #[test]
    fn save_has_exactly_one_continuation() {
        let stages = [
            func("emit_all", vec![json!(1), json!(2)]),
            Stage::Save { name: "x".into() },
        ];
        assert_eq!(run(&stages, None).unwrap(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn missing_retrieve_name_is_lookup_at_stage() {
        let stages = [func_retrieving("read_kwarg", Vec::new(), &["never_saved"])];
        let err = run(&stages, None).unwrap_err();
        assert_matches!(
            err,
            PipelineError::Stage {
                index: 0,
                kind: StageKind::Func,
                ..
            }
        );
        assert_matches!(err.root_cause(), PipelineError::Lookup(name) if name == "never_saved");
    }

    #[test]
    fn unknown_producer_reports_stage_position() {
        let stages = [func("emit_all", vec![json!(1)]), func("nonexistent", Vec::new())];
        let err = run(&stages, None).unwrap_err();
        assert_matches!(
            err,
            PipelineError::Stage {
                index: 1,
                kind: StageKind::Func,
                ..
            }
        );
        assert_matches!(err.root_cause(), PipelineError::Configuration(_));
    }

    #[test]
    fn value_store_is_per_run() {
        let registry = test_registry();
        let executor = SegmentExecutor::new(&Codec::Inline, &registry);
        let save = [
            func("emit_all", vec![json!(1)]),
            Stage::Save { name: "x".into() },
        ];
        let _ = executor.run(&save, None).unwrap();

        let read = [func_retrieving("read_kwarg", vec![json!("x")], &["x"])];
        let err = executor.run(&read, None).unwrap_err();
        assert_matches!(err.root_cause(), PipelineError::Lookup(_));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let stages = [
            func("range", vec![json!(3)]),
            func("repeat", vec![json!(2)]),
        ];
        let first = run(&stages, None).unwrap();
        let second = run(&stages, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![json!(0), json!(0), json!(1), json!(1), json!(2), json!(2)]);
    }
}

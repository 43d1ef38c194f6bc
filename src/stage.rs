//! Stage model — the closed tagged variant a definition is built from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::Token;
use crate::pipeline::Pipeline;

/// One unit of pipeline work.
///
/// Appended by the builder, never mutated or reordered afterwards. The
/// serialized form is tagged by `type`, so a textual snapshot record reads
/// `{"type": "func", ...}` / `{"type": "nest", ...}` / `{"type": "save", ...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Stage {
    /// Invoke a producer; every produced value fans out into an independent
    /// continuation of the remaining stages.
    Func {
        /// Persisted callable, in whatever tier the definition's codec uses.
        token: Token,
        /// Declared positional arguments.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Value>,
        /// Declared keyword arguments.
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        kwargs: Map<String, Value>,
        /// Names to pull from the value store into the keyword arguments at
        /// invocation time.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        retrieve: Vec<String>,
    },
    /// Run an embedded sub-pipeline to completion, then fan out over its
    /// results.
    Nest {
        /// The embedded definition. Independent of the parent: it gets its
        /// own value store and only inherits the previous value.
        pipeline: Pipeline,
    },
    /// Save the previous value under a name; exactly one continuation.
    Save {
        /// Store entry name.
        name: String,
    },
}

impl Stage {
    /// The stage's kind tag, for error context.
    #[must_use]
    pub fn kind(&self) -> StageKind {
        match self {
            Self::Func { .. } => StageKind::Func,
            Self::Nest { .. } => StageKind::Nest,
            Self::Save { .. } => StageKind::Save,
        }
    }
}

/// Kind tag of a [`Stage`], carried in error context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Producer invocation.
    Func,
    /// Embedded sub-pipeline.
    Nest,
    /// Value-store write.
    Save,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Func => write!(f, "func"),
            Self::Nest => write!(f, "nest"),
            Self::Save => write!(f, "save"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CallableRef;
    use serde_json::json;

    #[test]
    fn func_stage_serde_is_type_tagged() {
        let stage = Stage::Func {
            token: Token::File { path: "p_ab".into() },
            args: vec![json!(3)],
            kwargs: Map::new(),
            retrieve: vec!["x".into()],
        };
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "func",
                "token": {"tier": "file", "path": "p_ab"},
                "args": [3],
                "retrieve": ["x"]
            })
        );
        let back: Stage = serde_json::from_value(json).unwrap();
        assert_eq!(back, stage);
    }

    #[test]
    fn save_stage_roundtrip() {
        let stage = Stage::Save { name: "x".into() };
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json, json!({"type": "save", "name": "x"}));
    }

    #[test]
    fn unknown_tag_fails_to_decode() {
        let result: Result<Stage, _> = serde_json::from_value(json!({"type": "teleport"}));
        assert!(result.is_err());
    }

    #[test]
    fn kind_matches_variant() {
        let func = Stage::Func {
            token: Token::Inline {
                callable: CallableRef::new("p"),
            },
            args: Vec::new(),
            kwargs: Map::new(),
            retrieve: Vec::new(),
        };
        assert_eq!(func.kind(), StageKind::Func);
        assert_eq!(Stage::Save { name: "n".into() }.kind(), StageKind::Save);
        assert_eq!(StageKind::Nest.to_string(), "nest");
    }
}

//! Error types for pipeline definition, execution, and persistence.

use std::path::PathBuf;

use crate::stage::StageKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by `run`, codec dump/load, and snapshot operations.
///
/// A mid-run failure aborts the whole run; no partial results are returned.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Definition or environment problem: unknown producer key, a file
    /// token without a configured store directory, or a token path that
    /// would escape it.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A retrieve name that has never been saved at this point in the run.
    #[error("no value saved under {0:?}")]
    Lookup(String),

    /// Persisted-callable file missing or unreadable on load, or directory
    /// or file unwritable on dump.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path of the file or directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Snapshot or blob bytes that cannot be represented or decoded, or a
    /// textual snapshot holding a token that is not text-representable.
    #[error("format error: {0}")]
    Format(String),

    /// Position context added at the failing stage.
    #[error("stage {index} ({kind}): {source}")]
    Stage {
        /// Absolute index of the failing stage in its definition.
        index: usize,
        /// Kind of the failing stage.
        kind: StageKind,
        /// Underlying failure.
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap this error with the position and kind of the failing stage.
    #[must_use]
    pub(crate) fn at_stage(self, index: usize, kind: StageKind) -> Self {
        Self::Stage {
            index,
            kind,
            source: Box::new(self),
        }
    }

    /// The innermost error under any `Stage` context frames.
    pub fn root_cause(&self) -> &PipelineError {
        match self {
            Self::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_context_formats_position_and_kind() {
        let err = PipelineError::Lookup("x".into()).at_stage(2, StageKind::Func);
        assert_eq!(err.to_string(), "stage 2 (func): no value saved under \"x\"");
    }

    #[test]
    fn root_cause_unwraps_nested_stage_frames() {
        let err = PipelineError::Configuration("unknown producer".into())
            .at_stage(0, StageKind::Func)
            .at_stage(3, StageKind::Nest);
        assert_matches::assert_matches!(err.root_cause(), PipelineError::Configuration(_));
    }
}

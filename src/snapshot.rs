//! Whole-pipeline snapshots.
//!
//! Two formats, both deferring callable loading to execution time:
//!
//! - **Binary** ([`Pipeline::to_bytes`] / [`Pipeline::from_bytes`]): an
//!   opaque encoding of the raw ordered stage list, tier-agnostic — inline,
//!   blob, and file tokens all round-trip exactly. The reloading side
//!   supplies the configuration (and with it the codec), and tokens are not
//!   re-validated.
//! - **Textual** ([`Pipeline::to_json`] / [`Pipeline::from_json`]): a
//!   structured `{"config": ..., "pipes": [...]}` document of JSON-safe
//!   values. Only valid when every callable token in the definition,
//!   nested pipelines included, is a content-addressed file path.

use serde_json::{Map, Value};

use crate::codec::Token;
use crate::errors::{PipelineError, Result};
use crate::pipeline::Pipeline;
use crate::stage::{Stage, StageKind};

impl Pipeline {
    /// Snapshot the raw stage list as opaque bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = serde_json::to_vec(self.stages())?;
        tracing::debug!(stages = self.len(), bytes = bytes.len(), "binary snapshot");
        Ok(bytes)
    }

    /// Rebuild a definition from a binary snapshot.
    ///
    /// `config` supplies the codec the stages were dumped with; file tokens
    /// resolve against its store directory at execution time.
    pub fn from_bytes(config: Map<String, Value>, bytes: &[u8]) -> Result<Self> {
        let pipes: Vec<Stage> = serde_json::from_slice(bytes)?;
        tracing::debug!(stages = pipes.len(), "restored binary snapshot");
        Ok(Self::from_parts(config, pipes))
    }

    /// Snapshot the definition as a `{"config", "pipes"}` document.
    ///
    /// Fails with a `Format` error naming the offending stage when any
    /// callable token — nested pipelines included — is not a tier-2 file
    /// path.
    pub fn to_json(&self) -> Result<String> {
        ensure_text_representable(self.stages())?;
        let doc = serde_json::to_string(self)?;
        tracing::debug!(stages = self.len(), "textual snapshot");
        Ok(doc)
    }

    /// Rebuild a definition from a textual snapshot.
    ///
    /// The reconstructed definition carries the document's configuration
    /// and stage list; callables are loaded lazily at execution time, so
    /// the backing store directory must still be intact when the pipeline
    /// runs.
    pub fn from_json(doc: &str) -> Result<Self> {
        let pipeline: Self = serde_json::from_str(doc)?;
        tracing::debug!(stages = pipeline.len(), "restored textual snapshot");
        Ok(pipeline)
    }
}

fn ensure_text_representable(stages: &[Stage]) -> Result<()> {
    for (index, stage) in stages.iter().enumerate() {
        match stage {
            Stage::Func { token, .. } => match token {
                Token::File { .. } => {}
                Token::Inline { .. } | Token::Blob { .. } => {
                    return Err(PipelineError::Format(
                        "callable token is not text-representable; \
                         only file-addressed callables can be snapshotted textually"
                            .into(),
                    )
                    .at_stage(index, StageKind::Func));
                }
            },
            Stage::Nest { pipeline } => ensure_text_representable(pipeline.stages())
                .map_err(|e| e.at_stage(index, StageKind::Nest))?,
            Stage::Save { .. } => {}
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

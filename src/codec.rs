//! Callable codec — three tiers trading transportability for simplicity.
//!
//! A stage callable is a [`CallableRef`]: a registry key plus a captured
//! configuration blob. The codec turns a ref into a transportable [`Token`]
//! at definition time (`dump`) and back at execution time (`load`):
//!
//! - **Inline** (tier 0): the token embeds the ref directly; valid within
//!   one process, not transportable.
//! - **Blob** (tier 1): the ref is encoded to opaque bytes, so a whole
//!   definition moves between processes as one self-contained unit.
//! - **File** (tier 2): the encoded bytes are written to a content-addressed
//!   file `<key>_<sha256-hex>` under a configured directory and the token
//!   stores only that short name. Identical content hashes to the same path,
//!   so re-dumping is an idempotent overwrite and equal callables share one
//!   file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{PipelineError, Result};

/// A serializable reference to a registered producer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallableRef {
    /// Registry key of the producer.
    pub key: String,
    /// Captured configuration blob passed to every invocation.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub captured: Value,
}

impl CallableRef {
    /// Reference the producer registered under `key` with no captured blob.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            captured: Value::Null,
        }
    }
}

/// The persisted form of a stage callable, tagged by codec tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "lowercase")]
pub enum Token {
    /// Tier 0: direct in-memory reference.
    Inline {
        /// The referenced callable.
        callable: CallableRef,
    },
    /// Tier 1: opaque encoded bytes.
    Blob {
        /// Encoded callable content.
        bytes: Vec<u8>,
    },
    /// Tier 2: short file name under the codec's store directory.
    File {
        /// File name, `<key>_<hex-digest>` or `<hex-digest>`.
        path: String,
    },
}

/// Encoder/decoder between callable refs and tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Codec {
    /// Tier 0 — identity.
    Inline,
    /// Tier 1 — serialized blob.
    Blob,
    /// Tier 2 — content-addressed files under `dir`. `dump` creates the
    /// directory if missing; `load` requires it to be readable.
    File {
        /// Store directory holding one file per distinct callable content.
        dir: PathBuf,
    },
}

impl Codec {
    /// Encode `callable` into this tier's token.
    pub fn dump(&self, callable: &CallableRef) -> Result<Token> {
        match self {
            Self::Inline => Ok(Token::Inline {
                callable: callable.clone(),
            }),
            Self::Blob => Ok(Token::Blob {
                bytes: serde_json::to_vec(callable)?,
            }),
            Self::File { dir } => dump_file(dir, callable),
        }
    }

    /// Decode `token` back into a callable ref.
    ///
    /// Inline and blob tokens decode under any codec; file tokens need a
    /// configured store directory.
    pub fn load(&self, token: &Token) -> Result<CallableRef> {
        match token {
            Token::Inline { callable } => Ok(callable.clone()),
            Token::Blob { bytes } => Ok(serde_json::from_slice(bytes)?),
            Token::File { path } => match self {
                Self::File { dir } => load_file(dir, path),
                Self::Inline | Self::Blob => Err(PipelineError::Configuration(format!(
                    "file token {path:?} requires a configured store directory"
                ))),
            },
        }
    }
}

fn dump_file(dir: &Path, callable: &CallableRef) -> Result<Token> {
    let bytes = serde_json::to_vec(callable)?;
    let digest = hex_sha256(&bytes);

    fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    if is_plain_name(&callable.key) {
        let name = format!("{}_{digest}", callable.key);
        match fs::write(dir.join(&name), &bytes) {
            Ok(()) => {
                tracing::debug!(name, "dumped callable");
                return Ok(Token::File { path: name });
            }
            Err(error) => {
                tracing::debug!(%error, name, "named write failed, falling back to digest path");
            }
        }
    }

    fs::write(dir.join(&digest), &bytes).map_err(|source| PipelineError::Io {
        path: dir.join(&digest),
        source,
    })?;
    tracing::debug!(name = %digest, "dumped callable");
    Ok(Token::File { path: digest })
}

fn load_file(dir: &Path, path: &str) -> Result<CallableRef> {
    if !is_plain_name(path) {
        return Err(PipelineError::Configuration(format!(
            "token path {path:?} escapes the store directory"
        )));
    }
    let full = dir.join(path);
    let bytes = fs::read(&full).map_err(|source| PipelineError::Io { path: full, source })?;
    tracing::debug!(name = %path, "loaded callable");
    Ok(serde_json::from_slice(&bytes)?)
}

/// Whether `name` is usable as a single file-name component.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Transform backend trait and shared types.
//!
//! The [`TransformBackend`] trait is the seam between the decision layer and
//! the tools that actually rewrite bytes (transpilers, Sass/Less compilers,
//! minifiers, image optimizers). The pipeline only decides *which* stages
//! run and in what order; a backend decides *how* each stage is done.
//!
//! The production implementation is
//! [`BuiltinBackend`](super::builtin::BuiltinBackend).

use crate::chain::Stage;
use crate::types::{BuildMode, OutputKind, SourceAsset};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Input is not valid UTF-8")]
    NotUtf8,
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Per-asset inputs a stage may need besides the bytes.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub asset: &'a SourceAsset,
    pub mode: BuildMode,
    /// Prefix for rewritten `url(...)` references, e.g. `"dist/"` when
    /// styles are injected into a page one directory above the assets.
    pub url_prefix: &'a str,
}

/// Trait for transform backends.
///
/// Backends must implement every [`Stage`]; a stage with nothing to do
/// returns its input unchanged.
pub trait TransformBackend: Sync {
    fn apply(
        &self,
        stage: Stage,
        input: Vec<u8>,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, BackendError>;

    /// Minify an assembled production chunk, before its name is hashed.
    /// The default leaves the chunk untouched.
    fn minify_chunk(&self, _kind: OutputKind, input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        Ok(input)
    }
}

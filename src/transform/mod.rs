//! Transform execution.
//!
//! | Piece | Role |
//! |---|---|
//! | [`TransformBackend`] | trait every stage implementation goes through |
//! | [`BuiltinBackend`] | the default implementation, no external tools |
//! | [`run_chain`] | feeds one asset through its resolved chain |
//!
//! A failing stage is reported with the asset path and the stage name; the
//! asset is never skipped silently.

pub mod backend;
pub mod builtin;
pub mod minify;

pub use backend::{BackendError, StageContext, TransformBackend};
pub use builtin::BuiltinBackend;

use crate::chain::{Stage, TransformChain};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("Stage '{stage}' failed for {path}: {source}")]
pub struct TransformError {
    pub path: PathBuf,
    pub stage: Stage,
    #[source]
    pub source: BackendError,
}

/// Run `input` through every stage of `chain` that applies to the asset.
pub fn run_chain(
    backend: &impl TransformBackend,
    chain: &TransformChain,
    input: Vec<u8>,
    ctx: &StageContext<'_>,
) -> Result<Vec<u8>, TransformError> {
    chain
        .stages_for(ctx.asset)
        .into_iter()
        .try_fold(input, |bytes, stage| {
            backend
                .apply(stage, bytes, ctx)
                .map_err(|source| TransformError {
                    path: ctx.asset.path.clone(),
                    stage,
                    source,
                })
        })
}

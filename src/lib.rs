//! # pagepack
//!
//! A front-end asset build tool for two kinds of output:
//!
//! - **SPA**: a single-page application whose source tree is bundled into
//!   content-hashed script and stylesheet chunks, linked from a shell
//!   document (`build.html`).
//! - **Variant**: a self-contained page (a campaign landing page, a demo)
//!   whose scripts and styles are inlined into one HTML file named after the
//!   variant directory.
//!
//! # Architecture
//!
//! ```text
//! locate → scan → transform (parallel) → chunk → name → compose → emit → hook
//! ```
//!
//! Every source file is classified by extension into an asset class. The
//! class and the build mode select a transform chain (preprocess, transpile,
//! minify, compress, ...). Transformed scripts and styles are grouped into
//! vendor and main chunks, named (content hashes in production), and
//! composed into either a linked shell or a single inline document. The
//! result is staged and swapped into the output directory in one step, so a
//! failed build never leaves a half-written output behind.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`classify`] | File extension → asset class, vendor detection |
//! | [`chain`] | Transform chain table per (class, mode) |
//! | [`transform`] | Stage execution: the `TransformBackend` trait and built-in stages |
//! | [`scan`] | Walks a source root into classified assets and pass-through files |
//! | [`chunk`] | Groups transformed assets into vendor/main chunks |
//! | [`naming`] | Output names: stable in development, content-hashed in production |
//! | [`shell`] | Tag injection into the HTML template, document minification |
//! | [`compose`] | Linked or inline artifact sets, output name uniqueness |
//! | [`emit`] | Staged, all-or-nothing writes to the output root |
//! | [`variant`] | Variant path → variant identifier |
//! | [`pipeline`] | `Pipeline`, `Builder`, locations, build plans and reports |
//! | [`hooks`] | Post-build hook trait and the external-command hook |
//! | [`server`] | Development HTTP server with a readiness signal |
//! | [`reload`] | Live reload WebSocket endpoint and its page client |
//! | [`watch`] | Debounced watch-and-rebuild loop |
//! | [`config`] | `pagepack.toml` loading, merging and validation |
//! | [`logger`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//! | [`types`] | Shared types: build mode, layout, asset descriptors |
//!
//! # Design Decisions
//!
//! ## Deterministic output
//!
//! Transforms run on rayon's pool but results are collected in scan order.
//! Chunk contents, hashes and names depend only on the source tree and the
//! configuration, so building twice gives byte-identical output.
//!
//! ## Pluggable stages
//!
//! Pipelines talk to stages through [`transform::TransformBackend`]. The
//! built-in backend is pure Rust with no external tools (oxc and
//! lightningcss handle minification); tests swap in a
//! recording mock, and a backend driving external tools can be dropped in
//! without touching the pipeline.

pub mod chain;
pub mod chunk;
pub mod classify;
pub mod compose;
pub mod config;
pub mod emit;
pub mod hooks;
pub mod logger;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod reload;
pub mod scan;
pub mod server;
pub mod shell;
pub mod transform;
pub mod types;
pub mod variant;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;

//! Transform chain resolution.
//!
//! A [`TransformChain`] is the ordered list of stages one asset passes
//! through before it becomes part of the output. The chain is a pure
//! function of (asset class, build mode) plus global [`ChainOptions`]; there
//! is no per-file state. Per-file decisions are limited to two things:
//!
//! - the stylesheet dialect, which the preprocess stage reads from the path
//! - the vendor exclusion, applied by [`TransformChain::stages_for`]
//!
//! ```text
//! Stylesheet  dev   preprocess → resolve-urls → inject-style-tag
//!             prod  preprocess → resolve-urls → extract-to-file → minify
//! Script      any   transpile          (skipped for vendor code)
//! Template    any   compile-template
//! Image       any   copy [→ compress]  (compress off by default)
//! Font        any   copy-fixed-name
//! ```
//!
//! Stage order matters: URLs are resolved on preprocessed CSS, and the final
//! CSS is emitted (injected or extracted) only after that.

use crate::classify::AssetClass;
use crate::types::{BuildMode, OutputKind, SourceAsset};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Compile Less/Scss down to CSS. Dialect comes from the asset path.
    Preprocess,
    /// Rewrite relative `url(...)` references to their output location.
    ResolveUrls,
    /// Wrap CSS in a script that appends a `<style>` tag at runtime.
    InjectStyleTag,
    /// Keep CSS as CSS so it lands in its own stylesheet chunk.
    ExtractToFile,
    Minify,
    /// Transpile to the target syntax.
    Transpile,
    /// Compile markup templates into a script module.
    CompileTemplate,
    Copy,
    Compress,
    /// Copy under the original file name, never hashed.
    CopyFixedName,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::ResolveUrls => "resolve-urls",
            Stage::InjectStyleTag => "inject-style-tag",
            Stage::ExtractToFile => "extract-to-file",
            Stage::Minify => "minify",
            Stage::Transpile => "transpile",
            Stage::CompileTemplate => "compile-template",
            Stage::Copy => "copy",
            Stage::Compress => "compress",
            Stage::CopyFixedName => "copy-fixed-name",
        }
    }

    /// Stages that never run on code under a vendor directory.
    fn skipped_for_vendor(self) -> bool {
        self == Stage::Transpile
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build-wide switches that shape chains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainOptions {
    /// Append a compression stage to image chains.
    pub compress_images: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformChain {
    class: AssetClass,
    mode: BuildMode,
    stages: Vec<Stage>,
}

impl TransformChain {
    pub fn class(&self) -> AssetClass {
        self.class
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stages that actually run for one asset, after the vendor exclusion.
    pub fn stages_for(&self, asset: &SourceAsset) -> Vec<Stage> {
        self.stages
            .iter()
            .copied()
            .filter(|stage| !(asset.vendor && stage.skipped_for_vendor()))
            .collect()
    }

    /// What the final stage produces.
    pub fn emits(&self) -> OutputKind {
        match self.class {
            AssetClass::Script | AssetClass::Template => OutputKind::Script,
            AssetClass::Stylesheet => {
                if self.stages.contains(&Stage::InjectStyleTag) {
                    OutputKind::Script
                } else {
                    OutputKind::Stylesheet
                }
            }
            AssetClass::Image | AssetClass::Font => OutputKind::File,
        }
    }
}

impl fmt::Display for TransformChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        write!(f, "{}", names.join(" → "))
    }
}

/// Resolve the chain for an asset class under a build mode.
pub fn resolve_chain(class: AssetClass, mode: BuildMode, options: &ChainOptions) -> TransformChain {
    let stages = match (class, mode) {
        (AssetClass::Stylesheet, BuildMode::Development) => vec![
            Stage::Preprocess,
            Stage::ResolveUrls,
            Stage::InjectStyleTag,
        ],
        (AssetClass::Stylesheet, BuildMode::Production) => vec![
            Stage::Preprocess,
            Stage::ResolveUrls,
            Stage::ExtractToFile,
            Stage::Minify,
        ],
        (AssetClass::Script, _) => vec![Stage::Transpile],
        (AssetClass::Template, _) => vec![Stage::CompileTemplate],
        (AssetClass::Image, _) => {
            if options.compress_images {
                vec![Stage::Copy, Stage::Compress]
            } else {
                vec![Stage::Copy]
            }
        }
        (AssetClass::Font, _) => vec![Stage::CopyFixedName],
    };
    TransformChain {
        class,
        mode,
        stages,
    }
}

/// Every (class, mode) chain, resolved once per build.
#[derive(Debug, Clone)]
pub struct ChainTable {
    development: Vec<TransformChain>,
    production: Vec<TransformChain>,
}

impl ChainTable {
    pub fn new(options: &ChainOptions) -> Self {
        let resolve_all = |mode| {
            AssetClass::ALL
                .iter()
                .map(|&class| resolve_chain(class, mode, options))
                .collect()
        };
        Self {
            development: resolve_all(BuildMode::Development),
            production: resolve_all(BuildMode::Production),
        }
    }

    pub fn get(&self, class: AssetClass, mode: BuildMode) -> &TransformChain {
        let chains = match mode {
            BuildMode::Development => &self.development,
            BuildMode::Production => &self.production,
        };
        // Indexed in `AssetClass::ALL` declaration order.
        &chains[class as usize]
    }
}

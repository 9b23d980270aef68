//! Shared types used across the pipeline stages.
//!
//! Build mode and layout are two separate axes. The SPA pipeline always
//! produces a [`Layout::Linked`] artifact and varies [`BuildMode`]; the
//! variant pipeline always produces [`Layout::Inline`] and has a build mode
//! of its own. They are never folded into one enum.

use crate::classify::AssetClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    pub fn is_dev(self) -> bool {
        self == BuildMode::Development
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => f.write_str("development"),
            BuildMode::Production => f.write_str("production"),
        }
    }
}

/// How script and style output relates to the HTML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Embedded directly in the document.
    Inline,
    /// Written as separate files the document links to.
    Linked,
}

/// A classified file found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAsset {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated.
    pub rel_path: String,
    pub class: AssetClass,
    /// Lives under a vendor directory (`node_modules` by default).
    pub vendor: bool,
}

impl SourceAsset {
    /// File stem without directories or extension.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("asset")
    }
}

/// One output of a build run, before and after naming.
///
/// `output_name` starts empty and is filled in by
/// [`crate::naming::assign_names`]. `source_path` is relative to the source
/// root for copied files and the logical chunk path (`main.js`,
/// `vendor.css`) for bundles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub source_path: PathBuf,
    /// `None` for files copied through unclassified.
    pub class: Option<AssetClass>,
    pub kind: OutputKind,
    pub output_name: String,
    pub content_hash: Option<String>,
}

/// Role of an output inside the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Concatenated script chunk.
    Script,
    /// Extracted stylesheet chunk.
    Stylesheet,
    /// Image or font copied next to the document.
    File,
    /// Unclassified file copied through untouched.
    Raw,
}

impl OutputKind {
    pub fn is_embeddable(self) -> bool {
        matches!(self, OutputKind::Script | OutputKind::Stylesheet)
    }
}

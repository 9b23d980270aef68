//! Source tree scanning.
//!
//! Walks the source root and classifies every file. The result is sorted by
//! relative path so everything downstream (chain execution order, chunk
//! concatenation, naming) is independent of directory iteration order.
//!
//! ## What is skipped
//!
//! - hidden files and directories (`.git`, `.DS_Store`, editor swap files)
//! - the shell template and any output directory nested inside the source
//!   root (a variant's `dist/` lives inside the variant directory)
//!
//! ## Vendor code
//!
//! A file is vendor code when any directory on its relative path is one of
//! the configured vendor directories (`node_modules` by default).
//!
//! ## Unrecognized files
//!
//! Files [`classify`] rejects are either collected as pass-through copies or
//! abort the scan, depending on [`UnknownAssetPolicy`].

use crate::classify::{self, ClassificationError, UnknownAssetPolicy};
use crate::types::SourceAsset;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source directory not found: {0}")]
    MissingRoot(PathBuf),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub unknown: UnknownAssetPolicy,
    pub vendor_dirs: Vec<String>,
    /// Absolute paths (files or directories) left out of the scan.
    pub exclude: Vec<PathBuf>,
}

/// A file copied into the output without classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassThrough {
    pub path: PathBuf,
    pub rel_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub assets: Vec<SourceAsset>,
    pub passthrough: Vec<PassThrough>,
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

fn slash_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a relative path runs through a vendor directory.
pub fn is_vendor(rel_path: &str, vendor_dirs: &[String]) -> bool {
    let mut dirs = rel_path.split('/').collect::<Vec<_>>();
    dirs.pop(); // file name
    dirs.iter().any(|d| vendor_dirs.iter().any(|v| v == d))
}

pub fn scan(root: &Path, options: &ScanOptions) -> Result<ScanResult, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let hidden = entry.file_name().to_str().is_some_and(is_hidden);
            let excluded = options.exclude.iter().any(|ex| entry.path() == ex);
            !hidden && !excluded
        });

    let mut result = ScanResult::default();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let rel_path = slash_relative(&path, root);

        match classify::classify(&path) {
            Ok(class) => result.assets.push(SourceAsset {
                vendor: is_vendor(&rel_path, &options.vendor_dirs),
                path,
                rel_path,
                class,
            }),
            Err(err) => match options.unknown {
                UnknownAssetPolicy::Copy => {
                    tracing::debug!(file = %rel_path, "passing through unclassified file");
                    result.passthrough.push(PassThrough { path, rel_path });
                }
                UnknownAssetPolicy::Reject => return Err(err.into()),
            },
        }
    }

    result.assets.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    result.passthrough.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::AssetClass;
    use crate::test_helpers::write_tree;
    use tempfile::TempDir;

    fn options() -> ScanOptions {
        ScanOptions {
            unknown: UnknownAssetPolicy::Copy,
            vendor_dirs: vec!["node_modules".into()],
            exclude: Vec::new(),
        }
    }

    fn rel_paths(result: &ScanResult) -> Vec<&str> {
        result.assets.iter().map(|a| a.rel_path.as_str()).collect()
    }

    #[test]
    fn finds_and_classifies_all_assets() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                ("main.js", "go()"),
                ("styles/site.scss", "body{}"),
                ("img/logo.png", "png"),
                ("fonts/icons.woff2", "woff"),
                ("App.vue", "<template/>"),
            ],
        );
        let result = scan(tmp.path(), &options()).unwrap();
        assert_eq!(
            rel_paths(&result),
            vec![
                "App.vue",
                "fonts/icons.woff2",
                "img/logo.png",
                "main.js",
                "styles/site.scss"
            ]
        );
        let classes: Vec<AssetClass> = result.assets.iter().map(|a| a.class).collect();
        assert_eq!(
            classes,
            vec![
                AssetClass::Template,
                AssetClass::Font,
                AssetClass::Image,
                AssetClass::Script,
                AssetClass::Stylesheet
            ]
        );
    }

    #[test]
    fn hidden_files_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[("main.js", ""), (".eslintrc.js", ""), (".cache/x.js", "")],
        );
        let result = scan(tmp.path(), &options()).unwrap();
        assert_eq!(rel_paths(&result), vec!["main.js"]);
    }

    #[test]
    fn excluded_paths_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[
                ("js/main.js", ""),
                ("html/index.html", "<html></html>"),
                ("dist/old.js", ""),
            ],
        );
        let mut opts = options();
        opts.exclude = vec![tmp.path().join("html/index.html"), tmp.path().join("dist")];
        let result = scan(tmp.path(), &opts).unwrap();
        assert_eq!(rel_paths(&result), vec!["js/main.js"]);
    }

    #[test]
    fn vendor_files_are_flagged() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            tmp.path(),
            &[("main.js", ""), ("node_modules/vue/vue.js", "")],
        );
        let result = scan(tmp.path(), &options()).unwrap();
        let vendor: Vec<bool> = result.assets.iter().map(|a| a.vendor).collect();
        assert_eq!(vendor, vec![false, true]);
    }

    #[test]
    fn vendor_predicate_matches_directories_only() {
        let dirs = vec!["node_modules".to_string()];
        assert!(is_vendor("node_modules/a/b.js", &dirs));
        assert!(is_vendor("lib/node_modules/x.js", &dirs));
        assert!(!is_vendor("node_modules.js", &dirs));
        assert!(!is_vendor("src/main.js", &dirs));
    }

    #[test]
    fn unknown_files_pass_through_by_default() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("main.js", ""), ("robots.txt", "User-agent: *")]);
        let result = scan(tmp.path(), &options()).unwrap();
        assert_eq!(result.passthrough.len(), 1);
        assert_eq!(result.passthrough[0].rel_path, "robots.txt");
    }

    #[test]
    fn unknown_files_rejected_when_configured() {
        let tmp = TempDir::new().unwrap();
        write_tree(tmp.path(), &[("main.js", ""), ("notes.md", "# hi")]);
        let mut opts = options();
        opts.unknown = UnknownAssetPolicy::Reject;
        let err = scan(tmp.path(), &opts).unwrap_err();
        assert!(matches!(err, ScanError::Classification(_)));
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = scan(&tmp.path().join("absent"), &options()).unwrap_err();
        assert!(matches!(err, ScanError::MissingRoot(_)));
    }
}

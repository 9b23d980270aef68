//! Shared test utilities for the pagepack test suite.
//!
//! Provides fixture builders for source trees and lookup helpers for built
//! artifacts.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_tree(tmp.path(), &[("www/src/main.js", "go()")]);
//! ```

use std::path::{Path, PathBuf};

use crate::compose::{ArtifactSet, OutputFile};

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `(relative path, contents)` pairs under `root`, creating parents.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
    }
}

/// All files under `root`, as sorted `/`-separated relative paths.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    files.sort();
    files
}

// =========================================================================
// Artifact lookups, panicking with a clear message on miss
// =========================================================================

/// Find an output file by exact relative path. Panics if not found.
pub fn find_file<'a>(artifacts: &'a ArtifactSet, rel_path: &str) -> &'a OutputFile {
    artifacts
        .files()
        .iter()
        .find(|f| f.rel_path == Path::new(rel_path))
        .unwrap_or_else(|| {
            let paths: Vec<&PathBuf> = artifacts.files().iter().map(|f| &f.rel_path).collect();
            panic!("output '{rel_path}' not found. Available: {paths:?}")
        })
}

/// Output file contents as UTF-8.
pub fn text(file: &OutputFile) -> &str {
    std::str::from_utf8(&file.bytes).unwrap()
}

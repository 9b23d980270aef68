//! Writing artifacts to disk.
//!
//! A build never writes into its output root directly. Files go to a hidden
//! staging directory inside the root first; only when every file has been
//! written are the artifact's top-level entries (`dist/`, `build.html`)
//! swapped into place. Anything else in the output root (the SPA source tree
//! lives in `www/src`) is left alone.
//!
//! If writing fails the staging directory is removed and the previous
//! output is untouched. If a swap fails halfway, entries already moved aside
//! are restored.

use crate::compose::ArtifactSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Staging directory name inside the output root.
pub const STAGING_DIR: &str = ".pagepack-staging";
/// Where replaced entries wait until the swap completes.
pub const RETIRED_DIR: &str = ".pagepack-retired";

fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn write_staged(staging: &Path, artifacts: &ArtifactSet) -> io::Result<()> {
    remove_path(staging)?;
    fs::create_dir_all(staging)?;
    for file in artifacts.files() {
        let path = staging.join(&file.rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &file.bytes)?;
    }
    Ok(())
}

/// Move each staged entry into `root`, retiring what it replaces.
fn swap(root: &Path, staging: &Path, entries: &[PathBuf]) -> io::Result<()> {
    let retired = root.join(RETIRED_DIR);
    remove_path(&retired)?;
    fs::create_dir_all(&retired)?;

    let mut moved_aside: Vec<&PathBuf> = Vec::new();
    let mut placed: Vec<&PathBuf> = Vec::new();
    let result: io::Result<()> = entries.iter().try_for_each(|entry| {
        let target = root.join(entry);
        if fs::symlink_metadata(&target).is_ok() {
            fs::rename(&target, retired.join(entry))?;
            moved_aside.push(entry);
        }
        fs::rename(staging.join(entry), &target)?;
        placed.push(entry);
        Ok(())
    });

    if let Err(err) = result {
        for entry in placed {
            let _ = remove_path(&root.join(entry));
        }
        for entry in moved_aside {
            let _ = fs::rename(retired.join(entry), root.join(entry));
        }
        let _ = remove_path(&retired);
        return Err(err);
    }
    remove_path(&retired)
}

/// Write an artifact into `root` through staging. Returns the absolute
/// paths of every written file, in artifact order.
pub fn write_artifacts(root: &Path, artifacts: &ArtifactSet) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(root)?;
    let staging = root.join(STAGING_DIR);

    let staged = write_staged(&staging, artifacts)
        .and_then(|()| swap(root, &staging, &artifacts.top_level_entries()));
    let cleanup = remove_path(&staging);
    staged?;
    cleanup?;

    tracing::debug!(root = %root.display(), files = artifacts.files().len(), "artifact written");
    Ok(artifacts
        .files()
        .iter()
        .map(|f| root.join(&f.rel_path))
        .collect())
}

//! Output naming policy.
//!
//! Names are derived from the descriptor and the mode, never from build
//! order, so the same bytes under the same mode always produce the same name.
//!
//! | Output | Linked, production | Linked, development | Inline |
//! |---|---|---|---|
//! | script chunk | `main.<hash>.min.js` | `main.min.js` | embedded |
//! | stylesheet chunk | `main.<hash>.min.css` | `main.min.css` | embedded |
//! | image | `images/logo.png` | `images/logo.png` | `images/logo.png` |
//! | font | `fonts/icons.woff2` | `fonts/icons.woff2` | `fonts/icons.woff2` |
//! | unclassified file | relative path kept | relative path kept | relative path kept |
//!
//! The hash is the first [`HASH_LEN`] hex characters of the SHA-256 of the
//! final (transformed, concatenated) bytes. Development names stay fixed so
//! dev-server URLs survive rebuilds.

use crate::classify::AssetClass;
use crate::types::{AssetDescriptor, BuildMode, Layout, OutputKind};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Hex characters of the content hash kept in file names.
pub const HASH_LEN: usize = 20;

/// Subdirectory for font files.
pub const FONTS_DIR: &str = "fonts";

/// Subdirectory for image files.
pub const IMAGES_DIR: &str = "images";

/// Truncated SHA-256 hex digest of output bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..HASH_LEN].to_string()
}

fn extension_for(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::Stylesheet => "css",
        _ => "js",
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `/`-joined relative path, regardless of platform.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Subdirectory a copied file of this class lands in.
pub fn file_subdir(class: Option<AssetClass>) -> &'static str {
    match class {
        Some(AssetClass::Font) => FONTS_DIR,
        _ => IMAGES_DIR,
    }
}

/// Compute the output name for a descriptor.
///
/// A production descriptor without a content hash falls back to the fixed
/// development name.
pub fn name_for(descriptor: &AssetDescriptor, mode: BuildMode, layout: Layout) -> String {
    match descriptor.kind {
        OutputKind::Script | OutputKind::Stylesheet => {
            let stem = descriptor
                .source_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "main".to_string());
            let ext = extension_for(descriptor.kind);
            match (mode, layout, &descriptor.content_hash) {
                (BuildMode::Production, Layout::Linked, Some(hash)) => {
                    format!("{stem}.{hash}.min.{ext}")
                }
                _ => format!("{stem}.min.{ext}"),
            }
        }
        OutputKind::File => format!(
            "{}/{}",
            file_subdir(descriptor.class),
            file_name(&descriptor.source_path)
        ),
        OutputKind::Raw => slash_path(&descriptor.source_path),
    }
}

/// Fill in `content_hash` and `output_name` for every descriptor.
///
/// `contents` is parallel to `descriptors`.
pub fn assign_names(
    descriptors: &mut [AssetDescriptor],
    contents: &[Vec<u8>],
    mode: BuildMode,
    layout: Layout,
) {
    for (descriptor, bytes) in descriptors.iter_mut().zip(contents) {
        if descriptor.kind.is_embeddable() {
            descriptor.content_hash = Some(content_hash(bytes));
        }
        descriptor.output_name = name_for(descriptor, mode, layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn chunk(name: &str, kind: OutputKind, bytes: &[u8]) -> AssetDescriptor {
        AssetDescriptor {
            source_path: PathBuf::from(name),
            class: Some(if kind == OutputKind::Stylesheet {
                AssetClass::Stylesheet
            } else {
                AssetClass::Script
            }),
            kind,
            output_name: String::new(),
            content_hash: Some(content_hash(bytes)),
        }
    }

    fn file(path: &str, class: AssetClass) -> AssetDescriptor {
        AssetDescriptor {
            source_path: PathBuf::from(path),
            class: Some(class),
            kind: OutputKind::File,
            output_name: String::new(),
            content_hash: None,
        }
    }

    #[test]
    fn hash_is_truncated_hex() {
        let hash = content_hash(b"console.log(1)");
        assert_eq!(hash.len(), HASH_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn production_linked_embeds_hash() {
        let d = chunk("main.js", OutputKind::Script, b"a()");
        let name = name_for(&d, BuildMode::Production, Layout::Linked);
        let hash = content_hash(b"a()");
        assert_eq!(name, format!("main.{hash}.min.js"));
    }

    #[test]
    fn development_name_is_fixed() {
        let d = chunk("main.css", OutputKind::Stylesheet, b"body{}");
        assert_eq!(
            name_for(&d, BuildMode::Development, Layout::Linked),
            "main.min.css"
        );
    }

    #[test]
    fn naming_is_deterministic() {
        let a = chunk("main.js", OutputKind::Script, b"same bytes");
        let b = chunk("main.js", OutputKind::Script, b"same bytes");
        for mode in [BuildMode::Development, BuildMode::Production] {
            assert_eq!(
                name_for(&a, mode, Layout::Linked),
                name_for(&b, mode, Layout::Linked)
            );
        }
    }

    #[test]
    fn production_name_changes_with_content() {
        let before = chunk("main.js", OutputKind::Script, b"v1");
        let after = chunk("main.js", OutputKind::Script, b"v2");
        assert_ne!(
            name_for(&before, BuildMode::Production, Layout::Linked),
            name_for(&after, BuildMode::Production, Layout::Linked)
        );
    }

    #[test]
    fn development_name_stable_across_content_changes() {
        let before = chunk("main.js", OutputKind::Script, b"v1");
        let after = chunk("main.js", OutputKind::Script, b"v2");
        assert_eq!(
            name_for(&before, BuildMode::Development, Layout::Linked),
            name_for(&after, BuildMode::Development, Layout::Linked)
        );
    }

    #[test]
    fn production_differs_from_development() {
        let d = chunk("vendor.js", OutputKind::Script, b"lib");
        assert_ne!(
            name_for(&d, BuildMode::Production, Layout::Linked),
            name_for(&d, BuildMode::Development, Layout::Linked)
        );
    }

    #[test]
    fn inline_layout_never_hashes() {
        let d = chunk("main.js", OutputKind::Script, b"a()");
        assert_eq!(
            name_for(&d, BuildMode::Production, Layout::Inline),
            "main.min.js"
        );
    }

    #[test]
    fn production_without_hash_falls_back_to_fixed() {
        let mut d = chunk("main.js", OutputKind::Script, b"a()");
        d.content_hash = None;
        assert_eq!(
            name_for(&d, BuildMode::Production, Layout::Linked),
            "main.min.js"
        );
    }

    #[test]
    fn fonts_and_images_keep_their_file_names() {
        let font = file("assets/icons.woff2", AssetClass::Font);
        let image = file("img/logo.png", AssetClass::Image);
        for mode in [BuildMode::Development, BuildMode::Production] {
            assert_eq!(name_for(&font, mode, Layout::Linked), "fonts/icons.woff2");
            assert_eq!(name_for(&image, mode, Layout::Inline), "images/logo.png");
        }
    }

    #[test]
    fn raw_files_keep_relative_path() {
        let raw = AssetDescriptor {
            source_path: PathBuf::from("data/config.json"),
            class: None,
            kind: OutputKind::Raw,
            output_name: String::new(),
            content_hash: None,
        };
        assert_eq!(
            name_for(&raw, BuildMode::Production, Layout::Linked),
            "data/config.json"
        );
    }

    #[test]
    fn assign_names_hashes_bundles_only() {
        let mut descriptors = vec![
            AssetDescriptor {
                content_hash: None,
                ..chunk("main.js", OutputKind::Script, b"")
            },
            file("logo.svg", AssetClass::Image),
        ];
        let contents = vec![b"x()".to_vec(), b"<svg/>".to_vec()];
        assign_names(
            &mut descriptors,
            &contents,
            BuildMode::Production,
            Layout::Linked,
        );
        assert_eq!(
            descriptors[0].content_hash.as_deref(),
            Some(content_hash(b"x()").as_str())
        );
        assert!(descriptors[0].output_name.ends_with(".min.js"));
        assert_eq!(descriptors[1].content_hash, None);
        assert_eq!(descriptors[1].output_name, "images/logo.svg");
    }
}

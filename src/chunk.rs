//! Code splitting.
//!
//! Groups transformed assets into the units that get named and written:
//!
//! - first-party script output (scripts, compiled templates, injected
//!   styles) → the main script chunk, named after the entry
//! - script output from vendor directories → the `vendor` script chunk
//! - extracted stylesheets → main/vendor stylesheet chunks, same split
//! - images and fonts → one file each
//! - unclassified files → one raw copy each
//!
//! Inside a chunk, members keep scan order except the entry script, which is
//! always last so every other module has been evaluated when it runs.
//! Vendor code is split out so it can be cached independently of the
//! application code, which changes far more often.

use crate::scan::PassThrough;
use crate::types::{AssetDescriptor, BuildMode, OutputKind, SourceAsset};
use std::path::PathBuf;

/// Name of the third-party chunk.
pub const VENDOR_CHUNK: &str = "vendor";

/// One asset after its transform chain ran.
#[derive(Debug, Clone)]
pub struct TransformedAsset {
    pub asset: SourceAsset,
    /// What the chain emitted.
    pub kind: OutputKind,
    pub bytes: Vec<u8>,
}

/// An unnamed output unit: descriptor plus final bytes.
#[derive(Debug, Clone)]
pub struct Unit {
    pub descriptor: AssetDescriptor,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct ChunkBuilder {
    members: Vec<TransformedAsset>,
}

impl ChunkBuilder {
    fn into_unit(self, name: &str, kind: OutputKind, mode: BuildMode) -> Option<Unit> {
        let first = self.members.first()?;
        let class = first.asset.class;
        let ext = if kind == OutputKind::Stylesheet { "css" } else { "js" };

        let mut bytes = Vec::new();
        for member in &self.members {
            if mode.is_dev() {
                let banner = if kind == OutputKind::Stylesheet {
                    format!("/* {} */\n", member.asset.rel_path)
                } else {
                    format!("// {}\n", member.asset.rel_path)
                };
                bytes.extend_from_slice(banner.as_bytes());
            }
            bytes.extend_from_slice(&member.bytes);
            if !member.bytes.ends_with(b"\n") {
                bytes.push(b'\n');
            }
        }

        Some(Unit {
            descriptor: AssetDescriptor {
                source_path: PathBuf::from(format!("{name}.{ext}")),
                class: Some(class),
                kind,
                output_name: String::new(),
                content_hash: None,
            },
            bytes,
        })
    }
}

/// Split transformed assets into named-to-be output units.
///
/// `entry_rel` is the entry script's path relative to the source root;
/// `main_name` names the first-party chunks.
pub fn split_chunks(
    transformed: Vec<TransformedAsset>,
    passthrough: &[(PassThrough, Vec<u8>)],
    entry_rel: &str,
    main_name: &str,
    mode: BuildMode,
) -> Vec<Unit> {
    let mut vendor_js = ChunkBuilder::default();
    let mut main_js = ChunkBuilder::default();
    let mut vendor_css = ChunkBuilder::default();
    let mut main_css = ChunkBuilder::default();
    let mut entry = None;
    let mut files = Vec::new();

    for item in transformed {
        match (item.kind, item.asset.vendor) {
            (OutputKind::Script, _) if item.asset.rel_path == entry_rel => entry = Some(item),
            (OutputKind::Script, true) => vendor_js.members.push(item),
            (OutputKind::Script, false) => main_js.members.push(item),
            (OutputKind::Stylesheet, true) => vendor_css.members.push(item),
            (OutputKind::Stylesheet, false) => main_css.members.push(item),
            (OutputKind::File | OutputKind::Raw, _) => files.push(Unit {
                descriptor: AssetDescriptor {
                    source_path: PathBuf::from(&item.asset.rel_path),
                    class: Some(item.asset.class),
                    kind: OutputKind::File,
                    output_name: String::new(),
                    content_hash: None,
                },
                bytes: item.bytes,
            }),
        }
    }
    main_js.members.extend(entry);

    let mut units: Vec<Unit> = [
        vendor_js.into_unit(VENDOR_CHUNK, OutputKind::Script, mode),
        main_js.into_unit(main_name, OutputKind::Script, mode),
        vendor_css.into_unit(VENDOR_CHUNK, OutputKind::Stylesheet, mode),
        main_css.into_unit(main_name, OutputKind::Stylesheet, mode),
    ]
    .into_iter()
    .flatten()
    .collect();

    units.extend(files);
    units.extend(passthrough.iter().map(|(file, bytes)| Unit {
        descriptor: AssetDescriptor {
            source_path: PathBuf::from(&file.rel_path),
            class: None,
            kind: OutputKind::Raw,
            output_name: String::new(),
            content_hash: None,
        },
        bytes: bytes.clone(),
    }));
    units
}

//! Artifact composition.
//!
//! Turns named output units into an [`ArtifactSet`]: the complete list of
//! files one build writes, relative to its output root.
//!
//! ## Linked
//!
//! ```text
//! build.html                      shell, links everything below
//! dist/vendor.<hash>.min.js
//! dist/main.<hash>.min.js
//! dist/main.<hash>.min.css
//! dist/images/logo.png
//! dist/fonts/icons.woff2
//! ```
//!
//! Stylesheets are linked in `<head>`, scripts before `</body>` with the
//! vendor chunk first so application code can rely on it.
//!
//! ## Inline
//!
//! ```text
//! holiday.html                    every script and stylesheet embedded
//! images/logo.png
//! fonts/icons.woff2
//! ```

use crate::chunk::{Unit, VENDOR_CHUNK};
use crate::shell::{self, Tags};
use crate::types::{AssetDescriptor, Layout, OutputKind};
use crate::variant::VariantId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Output name '{name}' produced by both {first} and {second}")]
    NameCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Variant '{variant}' has no script or stylesheet content to inline")]
    EmptyBundle { variant: String },
}

/// One file of an artifact, relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub rel_path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Everything one build writes.
#[derive(Debug, Clone)]
pub enum ArtifactSet {
    /// Shell document plus the separate files it links to. `files` includes
    /// the shell.
    Linked { shell: PathBuf, files: Vec<OutputFile> },
    /// One self-contained document plus images and fonts. `files` includes
    /// the document.
    Inline { document: PathBuf, files: Vec<OutputFile> },
}

impl ArtifactSet {
    pub fn files(&self) -> &[OutputFile] {
        match self {
            ArtifactSet::Linked { files, .. } | ArtifactSet::Inline { files, .. } => files,
        }
    }

    /// The HTML entry point, relative to the output root.
    pub fn document(&self) -> &Path {
        match self {
            ArtifactSet::Linked { shell, .. } => shell,
            ArtifactSet::Inline { document, .. } => document,
        }
    }

    pub fn layout(&self) -> Layout {
        match self {
            ArtifactSet::Linked { .. } => Layout::Linked,
            ArtifactSet::Inline { .. } => Layout::Inline,
        }
    }

    /// Top-level entries of the output root this artifact owns. Writing the
    /// artifact replaces exactly these.
    pub fn top_level_entries(&self) -> Vec<PathBuf> {
        let mut entries: Vec<PathBuf> = self
            .files()
            .iter()
            .filter_map(|f| f.rel_path.components().next())
            .map(|c| PathBuf::from(c.as_os_str()))
            .collect();
        entries.sort();
        entries.dedup();
        entries
    }
}

/// Document settings for composition.
#[derive(Debug, Clone)]
pub struct DocumentSpec<'a> {
    /// Document path relative to the output root (`build.html`,
    /// `holiday.html`).
    pub name: String,
    /// Template contents, when the project has one.
    pub template: Option<&'a str>,
    pub title: &'a str,
    /// Directory (relative to the output root) linked files are written to.
    /// Empty for inline output.
    pub assets_dir: &'a str,
    /// Run the document through [`shell::minify_html`].
    pub minify: bool,
}

fn join_rel(dir: &str, name: &str) -> PathBuf {
    if dir.is_empty() {
        PathBuf::from(name)
    } else {
        Path::new(dir).join(name)
    }
}

fn url_for(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{name}", dir.trim_end_matches('/'))
    }
}

/// Reject two outputs sharing a path.
fn check_unique(files: &[OutputFile], sources: &[&Path]) -> Result<(), ComposeError> {
    let mut seen: HashMap<&Path, &Path> = HashMap::new();
    for (file, &source) in files.iter().zip(sources) {
        if let Some(first) = seen.insert(file.rel_path.as_path(), source) {
            return Err(ComposeError::NameCollision {
                name: file.rel_path.to_string_lossy().into_owned(),
                first: first.to_path_buf(),
                second: source.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn is_vendor_chunk(descriptor: &AssetDescriptor) -> bool {
    descriptor
        .source_path
        .file_stem()
        .is_some_and(|s| s == VENDOR_CHUNK)
}

/// Bundled units sorted for linking/embedding: vendor chunk first.
fn bundled<'a>(units: &'a [Unit], kind: OutputKind) -> Vec<&'a Unit> {
    let mut selected: Vec<&Unit> = units.iter().filter(|u| u.descriptor.kind == kind).collect();
    selected.sort_by_key(|u| !is_vendor_chunk(&u.descriptor));
    selected
}

/// Compose named units into an artifact.
///
/// Every unit must already carry its `output_name`. `variant` is only used
/// for error reporting in inline mode.
pub fn compose(
    units: Vec<Unit>,
    layout: Layout,
    document: &DocumentSpec<'_>,
    variant: Option<&VariantId>,
) -> Result<ArtifactSet, ComposeError> {
    let styles = bundled(&units, OutputKind::Stylesheet);
    let scripts = bundled(&units, OutputKind::Script);
    let doc_path = PathBuf::from(&document.name);

    let tags = match layout {
        Layout::Linked => Tags::linked(
            &styles
                .iter()
                .map(|u| url_for(document.assets_dir, &u.descriptor.output_name))
                .collect::<Vec<_>>(),
            &scripts
                .iter()
                .map(|u| url_for(document.assets_dir, &u.descriptor.output_name))
                .collect::<Vec<_>>(),
        ),
        Layout::Inline => {
            if styles.is_empty() && scripts.is_empty() {
                return Err(ComposeError::EmptyBundle {
                    variant: variant.map(|v| v.to_string()).unwrap_or_default(),
                });
            }
            let text = |u: &&Unit| String::from_utf8_lossy(&u.bytes).into_owned();
            let style_text: Vec<String> = styles.iter().map(text).collect();
            let script_text: Vec<String> = scripts.iter().map(text).collect();
            Tags::inline(
                &style_text.iter().map(String::as_str).collect::<Vec<_>>(),
                &script_text.iter().map(String::as_str).collect::<Vec<_>>(),
            )
        }
    };

    let mut html = shell::render(document.template, document.title, &tags);
    if document.minify {
        html = shell::minify_html(&html);
    }

    let mut files = vec![OutputFile {
        rel_path: doc_path.clone(),
        bytes: html.into_bytes(),
    }];
    let mut sources: Vec<&Path> = vec![Path::new(&document.name)];
    for unit in &units {
        if layout == Layout::Inline && unit.descriptor.kind.is_embeddable() {
            continue;
        }
        files.push(OutputFile {
            rel_path: join_rel(document.assets_dir, &unit.descriptor.output_name),
            bytes: unit.bytes.clone(),
        });
        sources.push(unit.descriptor.source_path.as_path());
    }
    check_unique(&files, &sources)?;

    Ok(match layout {
        Layout::Linked => ArtifactSet::Linked {
            shell: doc_path,
            files,
        },
        Layout::Inline => ArtifactSet::Inline {
            document: doc_path,
            files,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::AssetClass;
    use crate::test_helpers::{find_file, text};
    use crate::variant::resolve_variant;

    fn unit(source: &str, kind: OutputKind, name: &str, body: &str) -> Unit {
        Unit {
            descriptor: AssetDescriptor {
                source_path: PathBuf::from(source),
                class: Some(match kind {
                    OutputKind::Stylesheet => AssetClass::Stylesheet,
                    OutputKind::Script => AssetClass::Script,
                    _ => AssetClass::Image,
                }),
                kind,
                output_name: name.to_string(),
                content_hash: None,
            },
            bytes: body.as_bytes().to_vec(),
        }
    }

    fn spa_doc() -> DocumentSpec<'static> {
        DocumentSpec {
            name: "build.html".into(),
            template: None,
            title: "App",
            assets_dir: "dist",
            minify: false,
        }
    }

    fn variant_doc() -> DocumentSpec<'static> {
        DocumentSpec {
            name: "holiday.html".into(),
            template: Some("<html><head></head><body></body></html>"),
            title: "Campaign",
            assets_dir: "",
            minify: false,
        }
    }

    #[test]
    fn linked_shell_links_vendor_before_main() {
        let artifacts = compose(
            vec![
                unit("main.js", OutputKind::Script, "main.aaa.min.js", "m()"),
                unit("vendor.js", OutputKind::Script, "vendor.bbb.min.js", "v()"),
                unit("main.css", OutputKind::Stylesheet, "main.ccc.min.css", "a{}"),
            ],
            Layout::Linked,
            &spa_doc(),
            None,
        )
        .unwrap();

        let shell = text(find_file(&artifacts, "build.html"));
        let vendor = shell.find("dist/vendor.bbb.min.js").unwrap();
        let main = shell.find("dist/main.aaa.min.js").unwrap();
        assert!(vendor < main);
        assert!(shell.contains("href=\"dist/main.ccc.min.css\""));

        assert_eq!(text(find_file(&artifacts, "dist/main.aaa.min.js")), "m()");
        assert_eq!(artifacts.document(), Path::new("build.html"));
        assert_eq!(artifacts.files().len(), 4);
    }

    #[test]
    fn linked_files_land_under_assets_dir() {
        let artifacts = compose(
            vec![
                unit("main.js", OutputKind::Script, "main.min.js", "m()"),
                unit("img/logo.png", OutputKind::File, "images/logo.png", "png"),
            ],
            Layout::Linked,
            &spa_doc(),
            None,
        )
        .unwrap();
        find_file(&artifacts, "dist/images/logo.png");
        assert_eq!(
            artifacts.top_level_entries(),
            vec![PathBuf::from("build.html"), PathBuf::from("dist")]
        );
    }

    #[test]
    fn duplicate_names_collide() {
        let err = compose(
            vec![
                unit("a/logo.png", OutputKind::File, "images/logo.png", "1"),
                unit("b/logo.png", OutputKind::File, "images/logo.png", "2"),
            ],
            Layout::Linked,
            &spa_doc(),
            None,
        )
        .unwrap_err();
        match err {
            ComposeError::NameCollision { name, first, second } => {
                assert_eq!(name, "dist/images/logo.png");
                assert_eq!(first, PathBuf::from("a/logo.png"));
                assert_eq!(second, PathBuf::from("b/logo.png"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn inline_embeds_everything_into_one_document() {
        let variant = resolve_variant("campaigns/holiday/", true).unwrap();
        let artifacts = compose(
            vec![
                unit("main.js", OutputKind::Script, "main.min.js", "go()"),
                unit("main.css", OutputKind::Stylesheet, "main.min.css", "p{}"),
                unit("img/sun.png", OutputKind::File, "images/sun.png", "png"),
            ],
            Layout::Inline,
            &variant_doc(),
            Some(&variant),
        )
        .unwrap();

        let paths: Vec<&Path> = artifacts.files().iter().map(|f| f.rel_path.as_path()).collect();
        assert_eq!(paths, vec![Path::new("holiday.html"), Path::new("images/sun.png")]);

        let doc = text(find_file(&artifacts, "holiday.html"));
        assert_eq!(
            doc,
            "<html><head><style>p{}</style></head><body><script>go()</script></body></html>"
        );
    }

    #[test]
    fn inline_vendor_script_runs_first() {
        let variant = resolve_variant("x", true).unwrap();
        let artifacts = compose(
            vec![
                unit("main.js", OutputKind::Script, "main.min.js", "main()"),
                unit("vendor.js", OutputKind::Script, "vendor.min.js", "lib()"),
            ],
            Layout::Inline,
            &variant_doc(),
            Some(&variant),
        )
        .unwrap();
        let doc = text(find_file(&artifacts, "holiday.html"));
        assert!(doc.find("lib()").unwrap() < doc.find("main()").unwrap());
    }

    #[test]
    fn inline_without_bundled_content_is_empty() {
        let variant = resolve_variant("campaigns/holiday", true).unwrap();
        let err = compose(
            vec![unit("img/sun.png", OutputKind::File, "images/sun.png", "png")],
            Layout::Inline,
            &variant_doc(),
            Some(&variant),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::EmptyBundle { ref variant } if variant == "holiday"));
    }

    #[test]
    fn minified_document() {
        let mut doc = spa_doc();
        doc.template = Some("<html>\n  <!-- c -->\n  <body>\n  </body>\n</html>");
        doc.minify = true;
        let artifacts = compose(
            vec![unit("main.js", OutputKind::Script, "main.min.js", "m()")],
            Layout::Linked,
            &doc,
            None,
        )
        .unwrap();
        let shell = text(find_file(&artifacts, "build.html"));
        assert_eq!(
            shell,
            "<html><body><script src=dist/main.min.js></script></body></html>"
        );
    }
}

//! Build orchestration.
//!
//! A [`Pipeline`] says *what* to build; a [`Builder`] runs it against a
//! project root and configuration:
//!
//! ```text
//! locate → scan → transform (parallel) → chunk → name → compose → emit → hook
//! ```
//!
//! Every input is an explicit parameter. Nothing below `main` reads the
//! process environment or the command line.
//!
//! ## Locations
//!
//! | | SPA | Variant |
//! |---|---|---|
//! | source root | `<root>/www/src` | `<root>/<variant path>` |
//! | entry | `main.js` | `js/main.js` |
//! | template | `template.html` | `html/index.html` |
//! | output root | `<root>/www` | `<source root>/dist` |
//! | document | `build.html` | `<variant id>.html` |
//! | layout | linked, files under `dist/` | inline |
//!
//! The template and the output directory are excluded from the scan so a
//! variant's previous `dist/` never feeds its next build.
//!
//! ## Ordering
//!
//! Transforms run on rayon's pool, but results are collected in scan order
//! (sorted relative paths). Chunk contents, hashes and names therefore never
//! depend on which worker finished first, and building the same tree twice
//! produces identical output.

use crate::chain::{ChainOptions, ChainTable, Stage};
use crate::chunk::{self, TransformedAsset, Unit};
use crate::classify::{AssetClass, ClassificationError};
use crate::compose::{self, ArtifactSet, ComposeError, DocumentSpec};
use crate::config::{BuildConfig, ConfigError};
use crate::emit;
use crate::hooks::{HookContext, HookError, NoopHook, PostBuildHook};
use crate::naming;
use crate::scan::{self, ScanError, ScanOptions};
use crate::transform::{
    self, BackendError, BuiltinBackend, StageContext, TransformBackend, TransformError,
};
use crate::types::{BuildMode, Layout, OutputKind};
use crate::variant::{VariantError, VariantId, resolve_variant};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error("Invalid variant path: {0:?}")]
    InvalidVariantPath(String),
    #[error("Output name '{name}' produced by both {first} and {second}")]
    NameCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Variant '{variant}' has no script or stylesheet content to inline")]
    EmptyBundle { variant: String },
    #[error(transparent)]
    TransformStage(#[from] TransformError),
    #[error("Minifying the chunk led by {path} failed: {source}")]
    ChunkMinify {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Source not found: {0}")]
    MissingSource(PathBuf),
    #[error("Post-build hook failed: {0}")]
    Hook(#[from] HookError),
}

impl From<VariantError> for BuildError {
    fn from(err: VariantError) -> Self {
        match err {
            VariantError::InvalidVariantPath(path) => BuildError::InvalidVariantPath(path),
        }
    }
}

impl From<ComposeError> for BuildError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::NameCollision {
                name,
                first,
                second,
            } => BuildError::NameCollision {
                name,
                first,
                second,
            },
            ComposeError::EmptyBundle { variant } => BuildError::EmptyBundle { variant },
        }
    }
}

impl From<ScanError> for BuildError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::MissingRoot(path) => BuildError::MissingSource(path),
            ScanError::Walk(e) => BuildError::Io(e.into()),
            ScanError::Classification(e) => BuildError::Classification(e),
        }
    }
}

/// What to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pipeline {
    /// Code-split bundle with a linking shell.
    Spa { mode: BuildMode },
    /// One self-contained document for the variant at `path`, relative to
    /// the project root.
    Variant { path: String, mode: BuildMode },
}

impl Pipeline {
    pub fn mode(&self) -> BuildMode {
        match self {
            Pipeline::Spa { mode } | Pipeline::Variant { mode, .. } => *mode,
        }
    }

    pub fn layout(&self) -> Layout {
        match self {
            Pipeline::Spa { .. } => Layout::Linked,
            Pipeline::Variant { .. } => Layout::Inline,
        }
    }

    /// Development SPA builds are served and rebuilt on change.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            Pipeline::Spa {
                mode: BuildMode::Development
            }
        )
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::Spa { mode } => write!(f, "spa ({mode})"),
            Pipeline::Variant { path, mode } => write!(f, "variant {path} ({mode})"),
        }
    }
}

/// Resolved filesystem locations and document settings of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    pub source_root: PathBuf,
    pub entry: PathBuf,
    pub template: PathBuf,
    pub output_root: PathBuf,
    /// Document path relative to `output_root`.
    pub document: String,
    /// Subdirectory of `output_root` for linked files; empty when inline.
    pub assets_dir: String,
    /// Prefix for `url(...)` references rewritten in stylesheets.
    pub url_prefix: String,
    /// Name of the first-party chunks, from the entry's stem.
    pub main_name: String,
    pub title: String,
    pub minify_document: bool,
    pub variant: Option<VariantId>,
}

impl Locations {
    /// Paths under the source root that are never treated as assets.
    fn scan_exclusions(&self) -> Vec<PathBuf> {
        let mut exclude = vec![self.template.clone()];
        if self.assets_dir.is_empty() {
            exclude.push(self.output_root.clone());
        } else {
            exclude.push(self.output_root.join(&self.assets_dir));
            exclude.push(self.output_root.join(&self.document));
        }
        exclude
    }

    /// Entry path relative to the source root, `/`-separated.
    fn entry_rel(&self) -> String {
        self.entry
            .strip_prefix(&self.source_root)
            .unwrap_or(&self.entry)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn stem_of(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string())
}

/// Work out where a pipeline reads and writes. The variant identifier is
/// resolved first, so an invalid variant path fails before any file I/O.
pub fn locate(
    pipeline: &Pipeline,
    root: &Path,
    config: &BuildConfig,
) -> Result<Locations, BuildError> {
    match pipeline {
        Pipeline::Spa { mode } => {
            let spa = &config.spa;
            let source_root = root.join(&spa.source_dir);
            let assets_dir = spa.assets_dir.trim_matches('/').to_string();
            Ok(Locations {
                entry: source_root.join(&spa.entry),
                template: source_root.join(&spa.template),
                source_root,
                output_root: root.join(&spa.output_dir),
                document: spa.shell.clone(),
                // Injected styles live in the shell, one level above the assets.
                url_prefix: if mode.is_dev() {
                    format!("{assets_dir}/")
                } else {
                    String::new()
                },
                assets_dir,
                main_name: stem_of(&spa.entry),
                title: spa.title.clone(),
                minify_document: !mode.is_dev() && spa.minify_shell,
                variant: None,
            })
        }
        Pipeline::Variant { path, .. } => {
            let variant_cfg = &config.variant;
            let id = resolve_variant(path, variant_cfg.trailing_separator_fallback)?;
            let source_root = root.join(path.trim_end_matches(['/', '\\']));
            Ok(Locations {
                entry: source_root.join(&variant_cfg.entry),
                template: source_root.join(&variant_cfg.template),
                output_root: source_root.join(&variant_cfg.output_subdir),
                source_root,
                document: id.document_name(),
                assets_dir: String::new(),
                url_prefix: String::new(),
                main_name: stem_of(&variant_cfg.entry),
                title: variant_cfg.title.clone(),
                minify_document: false,
                variant: Some(id),
            })
        }
    }
}

/// One file of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    /// Relative to the output root.
    pub rel_path: PathBuf,
    pub size: usize,
}

/// Summary of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub pipeline: Pipeline,
    pub output_root: PathBuf,
    /// Absolute path of the shell or variant document.
    pub document: PathBuf,
    pub variant: Option<VariantId>,
    /// Number of classified source assets.
    pub assets: usize,
    /// Number of unclassified files copied through.
    pub passthrough: usize,
    pub files: Vec<ReportFile>,
}

/// One planned asset, as shown by `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAsset {
    pub rel_path: String,
    pub class: AssetClass,
    pub vendor: bool,
    pub stages: Vec<Stage>,
    pub emits: OutputKind,
}

/// What a build would do, without running any stage.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub pipeline: Pipeline,
    pub locations: Locations,
    pub assets: Vec<PlannedAsset>,
    pub passthrough: Vec<String>,
    pub has_template: bool,
}

/// Lifecycle of a [`Builder`].
///
/// ```text
/// Idle → Building → Ready | Failed
///        ↑________________|      (watch mode: next change)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Building,
    Ready,
    Failed,
}

fn scan_options(config: &BuildConfig, locations: &Locations) -> ScanOptions {
    ScanOptions {
        unknown: config.assets.unknown,
        vendor_dirs: config.assets.vendor_dirs.clone(),
        exclude: locations.scan_exclusions(),
    }
}

/// Classify and resolve chains for every source file without transforming
/// or writing anything.
pub fn plan(
    pipeline: &Pipeline,
    root: &Path,
    config: &BuildConfig,
) -> Result<BuildPlan, BuildError> {
    let locations = locate(pipeline, root, config)?;
    let scanned = scan::scan(&locations.source_root, &scan_options(config, &locations))?;
    let table = ChainTable::new(&ChainOptions {
        compress_images: config.images.compress,
    });
    let mode = pipeline.mode();

    let assets = scanned
        .assets
        .iter()
        .map(|asset| {
            let chain = table.get(asset.class, mode);
            PlannedAsset {
                rel_path: asset.rel_path.clone(),
                class: asset.class,
                vendor: asset.vendor,
                stages: chain.stages_for(asset),
                emits: chain.emits(),
            }
        })
        .collect();

    Ok(BuildPlan {
        pipeline: pipeline.clone(),
        has_template: locations.template.is_file(),
        locations,
        assets,
        passthrough: scanned.passthrough.into_iter().map(|p| p.rel_path).collect(),
    })
}

/// Runs builds of one pipeline and tracks their state.
pub struct Builder<B: TransformBackend = BuiltinBackend> {
    pipeline: Pipeline,
    root: PathBuf,
    config: BuildConfig,
    backend: B,
    hook: Box<dyn PostBuildHook>,
    chains: ChainTable,
    state: BuildState,
}

impl Builder<BuiltinBackend> {
    pub fn new(pipeline: Pipeline, root: impl Into<PathBuf>, config: BuildConfig) -> Self {
        Self::with_backend(pipeline, root, config, BuiltinBackend::new())
    }
}

impl<B: TransformBackend> Builder<B> {
    /// Build with a specific backend (allows testing with mock).
    pub fn with_backend(
        pipeline: Pipeline,
        root: impl Into<PathBuf>,
        config: BuildConfig,
        backend: B,
    ) -> Self {
        let chains = ChainTable::new(&ChainOptions {
            compress_images: config.images.compress,
        });
        Self {
            pipeline,
            root: root.into(),
            config,
            backend,
            hook: Box::new(NoopHook),
            chains,
            state: BuildState::Idle,
        }
    }

    pub fn with_hook(mut self, hook: Box<dyn PostBuildHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn locations(&self) -> Result<Locations, BuildError> {
        locate(&self.pipeline, &self.root, &self.config)
    }

    /// Run one build. The state ends up `Ready` or `Failed`; on failure the
    /// previous output is left in place.
    pub fn build(&mut self) -> Result<BuildReport, BuildError> {
        self.state = BuildState::Building;
        tracing::info!(pipeline = %self.pipeline, "build started");
        let result = self.run();
        self.state = match &result {
            Ok(report) => {
                tracing::info!(
                    document = %report.document.display(),
                    files = report.files.len(),
                    "build finished"
                );
                BuildState::Ready
            }
            Err(err) => {
                tracing::debug!(error = %err, "build failed");
                BuildState::Failed
            }
        };
        result
    }

    fn run(&self) -> Result<BuildReport, BuildError> {
        let locations = self.locations()?;
        let mode = self.pipeline.mode();
        let layout = self.pipeline.layout();

        if !locations.source_root.is_dir() {
            return Err(BuildError::MissingSource(locations.source_root));
        }
        if !locations.entry.is_file() {
            return Err(BuildError::MissingSource(locations.entry));
        }

        let scanned = scan::scan(
            &locations.source_root,
            &scan_options(&self.config, &locations),
        )?;
        tracing::debug!(
            assets = scanned.assets.len(),
            passthrough = scanned.passthrough.len(),
            "scanned {}",
            locations.source_root.display()
        );

        let transformed: Vec<TransformedAsset> = scanned
            .assets
            .par_iter()
            .map(|asset| -> Result<TransformedAsset, BuildError> {
                let chain = self.chains.get(asset.class, mode);
                let input = std::fs::read(&asset.path)?;
                let ctx = StageContext {
                    asset,
                    mode,
                    url_prefix: &locations.url_prefix,
                };
                let bytes = transform::run_chain(&self.backend, chain, input, &ctx)?;
                tracing::debug!(asset = %asset.rel_path, chain = %chain, "transformed");
                Ok(TransformedAsset {
                    asset: asset.clone(),
                    kind: chain.emits(),
                    bytes,
                })
            })
            .collect::<Result<_, _>>()?;

        let passthrough = scanned
            .passthrough
            .iter()
            .map(|file| std::fs::read(&file.path).map(|bytes| (file.clone(), bytes)))
            .collect::<Result<Vec<_>, _>>()?;

        let units = chunk::split_chunks(
            transformed,
            &passthrough,
            &locations.entry_rel(),
            &locations.main_name,
            mode,
        );
        let units = if mode.is_dev() {
            units
        } else {
            self.minify_units(units)?
        };
        let units = name_units(units, mode, layout);

        let template = match std::fs::read_to_string(&locations.template) {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        let artifacts = compose::compose(
            units,
            layout,
            &DocumentSpec {
                name: locations.document.clone(),
                template: template.as_deref(),
                title: &locations.title,
                assets_dir: &locations.assets_dir,
                minify: locations.minify_document,
            },
            locations.variant.as_ref(),
        )?;

        let written = emit::write_artifacts(&locations.output_root, &artifacts)?;
        let document = locations.output_root.join(artifacts.document());

        self.hook.after_build(&HookContext {
            output_root: &locations.output_root,
            written: &written,
            document: document.clone(),
            variant: locations.variant.as_ref(),
            mode,
        })?;

        Ok(BuildReport {
            pipeline: self.pipeline.clone(),
            document,
            variant: locations.variant.clone(),
            assets: scanned.assets.len(),
            passthrough: scanned.passthrough.len(),
            files: report_files(&artifacts),
            output_root: locations.output_root,
        })
    }
}

impl<B: TransformBackend> Builder<B> {
    /// Production chunks go through the backend's chunk minifier once
    /// assembled, so the content hash covers the minified bytes.
    fn minify_units(&self, units: Vec<Unit>) -> Result<Vec<Unit>, BuildError> {
        units
            .into_iter()
            .map(|unit| {
                let Unit { descriptor, bytes } = unit;
                let before = bytes.len();
                let bytes = self
                    .backend
                    .minify_chunk(descriptor.kind, bytes)
                    .map_err(|source| BuildError::ChunkMinify {
                        path: descriptor.source_path.clone(),
                        source,
                    })?;
                if bytes.len() != before {
                    tracing::debug!(
                        chunk = %descriptor.source_path.display(),
                        before,
                        after = bytes.len(),
                        "minified chunk"
                    );
                }
                Ok(Unit { descriptor, bytes })
            })
            .collect()
    }
}

fn name_units(units: Vec<Unit>, mode: BuildMode, layout: Layout) -> Vec<Unit> {
    let (mut descriptors, contents): (Vec<_>, Vec<_>) = units
        .into_iter()
        .map(|unit| (unit.descriptor, unit.bytes))
        .unzip();
    naming::assign_names(&mut descriptors, &contents, mode, layout);
    descriptors
        .into_iter()
        .zip(contents)
        .map(|(descriptor, bytes)| Unit { descriptor, bytes })
        .collect()
}

fn report_files(artifacts: &ArtifactSet) -> Vec<ReportFile> {
    artifacts
        .files()
        .iter()
        .map(|f| ReportFile {
            rel_path: f.rel_path.clone(),
            size: f.bytes.len(),
        })
        .collect()
}

/// Build once with the built-in backend and the configured hook.
pub fn run_build(
    pipeline: Pipeline,
    root: &Path,
    config: BuildConfig,
) -> Result<BuildReport, BuildError> {
    let hook = crate::hooks::from_config(&config.hooks.post_build, root);
    Builder::new(pipeline, root, config).with_hook(hook).build()
}

//! Build configuration module.
//!
//! Handles loading, validating, and merging `pagepack.toml`. Stock defaults
//! are the base layer; the project file overrides only the keys it sets, and
//! command-line flags override both.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── pagepack.toml            # Optional, next to the sources
//! ├── www/
//! │   ├── src/                 # SPA sources (main.js, template.html, ...)
//! │   ├── build.html           # SPA shell (generated)
//! │   └── dist/                # SPA assets (generated)
//! └── campaigns/
//!     └── holiday/             # A variant: js/main.js, html/index.html
//!         └── dist/holiday.html
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [spa]
//! source_dir = "www/src"     # Source root of the single-page app
//! entry = "main.js"          # Entry script, relative to source_dir
//! template = "template.html" # Shell template, relative to source_dir
//! output_dir = "www"         # Where the shell is written
//! assets_dir = "dist"        # Asset subdirectory of output_dir
//! shell = "build.html"       # Shell file name
//! title = "App"              # Title when no template exists
//! minify_shell = true        # Minify the shell in production
//!
//! [variant]
//! entry = "js/main.js"
//! template = "html/index.html"
//! output_subdir = "dist"
//! trailing_separator_fallback = true
//! mode = "development"
//! title = "Campaign"
//!
//! [assets]
//! unknown = "copy"           # "copy" or "reject"
//! vendor_dirs = ["node_modules"]
//!
//! [images]
//! compress = false
//!
//! [server]
//! host = "localhost"
//! port = 3000
//! open_browser = true
//! ready_timeout_secs = 30
//! live_reload = true
//! reload_port = 35729
//!
//! [watch]
//! debounce_ms = 200
//!
//! [hooks]
//! post_build = []            # Command + args run after output is written
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::classify::UnknownAssetPolicy;
use crate::types::BuildMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the project root.
pub const CONFIG_FILENAME: &str = "pagepack.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration loaded from `pagepack.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Single-page application pipeline.
    pub spa: SpaConfig,
    /// Per-variant inlined pipeline.
    pub variant: VariantConfig,
    /// Classification and vendor handling.
    pub assets: AssetsConfig,
    /// Image chain switches.
    pub images: ImagesConfig,
    /// Development server.
    pub server: ServerConfig,
    /// Watch loop.
    pub watch: WatchConfig,
    /// Post-build hook.
    pub hooks: HooksConfig,
    /// Parallel transform settings.
    pub processing: ProcessingConfig,
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Validation(msg.into()));

        if self.spa.entry.trim().is_empty() {
            return invalid("spa.entry must not be empty");
        }
        if self.variant.entry.trim().is_empty() {
            return invalid("variant.entry must not be empty");
        }
        if !is_plain_relative(&self.spa.assets_dir) {
            return invalid("spa.assets_dir must be a non-empty relative path");
        }
        if !is_plain_relative(&self.variant.output_subdir) {
            return invalid("variant.output_subdir must be a non-empty relative path");
        }
        if !self.spa.shell.ends_with(".html") || self.spa.shell.contains(['/', '\\']) {
            return invalid("spa.shell must be a bare file name ending in .html");
        }
        if self.assets.vendor_dirs.iter().any(|d| d.trim().is_empty()) {
            return invalid("assets.vendor_dirs entries must not be empty");
        }
        if self.server.host.trim().is_empty() {
            return invalid("server.host must not be empty");
        }
        if self.server.live_reload && self.server.reload_port == self.server.port {
            return invalid("server.reload_port must differ from server.port");
        }
        if self.watch.debounce_ms > 10_000 {
            return invalid("watch.debounce_ms must be at most 10000");
        }
        if self.processing.max_processes == Some(0) {
            return invalid("processing.max_processes must be at least 1");
        }
        Ok(())
    }
}

/// Relative, non-empty, and free of `..` components.
fn is_plain_relative(path: &str) -> bool {
    let p = Path::new(path);
    !path.trim().is_empty()
        && p.is_relative()
        && p
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpaConfig {
    /// Source root, relative to the project root.
    pub source_dir: PathBuf,
    /// Entry script, relative to `source_dir`. Its stem names the main chunk.
    pub entry: String,
    /// Shell template, relative to `source_dir`. A missing template falls
    /// back to a generated document.
    pub template: String,
    /// Directory receiving the shell, relative to the project root.
    pub output_dir: PathBuf,
    /// Asset subdirectory of `output_dir`.
    pub assets_dir: String,
    /// Shell file name.
    pub shell: String,
    /// Document title when no template exists.
    pub title: String,
    /// Minify the shell in production: comments, whitespace, attribute quotes.
    pub minify_shell: bool,
}

impl Default for SpaConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("www/src"),
            entry: "main.js".to_string(),
            template: "template.html".to_string(),
            output_dir: PathBuf::from("www"),
            assets_dir: "dist".to_string(),
            shell: "build.html".to_string(),
            title: "App".to_string(),
            minify_shell: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantConfig {
    /// Entry script, relative to the variant directory.
    pub entry: String,
    /// Document template, relative to the variant directory.
    pub template: String,
    /// Output subdirectory of the variant directory.
    pub output_subdir: String,
    /// Take the second-to-last segment when the variant path ends in a
    /// separator. When off, such paths are rejected.
    pub trailing_separator_fallback: bool,
    /// Build mode for variant builds unless overridden on the command line.
    pub mode: BuildMode,
    /// Document title when no template exists.
    pub title: String,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            entry: "js/main.js".to_string(),
            template: "html/index.html".to_string(),
            output_subdir: "dist".to_string(),
            trailing_separator_fallback: true,
            mode: BuildMode::Development,
            title: "Campaign".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// What to do with files no asset class matches.
    pub unknown: UnknownAssetPolicy,
    /// Directory names whose contents count as third-party code: split into
    /// the vendor chunk and never transpiled.
    pub vendor_dirs: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            unknown: UnknownAssetPolicy::Copy,
            vendor_dirs: vec!["node_modules".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Add a compression stage to image chains.
    pub compress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Open the shell in a browser once the server is listening.
    pub open_browser: bool,
    /// How long to wait for the server to report readiness before giving up
    /// on the browser. Absent means wait indefinitely.
    pub ready_timeout_secs: Option<u64>,
    /// Reload open pages after each successful rebuild.
    pub live_reload: bool,
    /// WebSocket port for live reload; the next free port is used when taken.
    pub reload_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            open_browser: true,
            ready_timeout_secs: Some(30),
            live_reload: true,
            reload_port: 35729,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period after the last change before a rebuild starts.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HooksConfig {
    /// Command and arguments run after every successful build.
    pub post_build: Vec<String>,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel transform workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(BuildConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `pagepack.toml` from the project root, or from an explicit path.
///
/// An explicit path that does not exist is an error; a missing default file
/// just means stock defaults.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<BuildConfig, ConfigError> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", path.display()),
                )));
            }
            path.to_path_buf()
        }
        None => root.join(CONFIG_FILENAME),
    };
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(&path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `pagepack.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pagepack configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Single-page application pipeline (`pagepack build`, `pagepack serve`)
# ---------------------------------------------------------------------------
[spa]
# Source root, relative to the project root.
source_dir = "www/src"
# Entry script, relative to source_dir. Its stem names the main chunk.
entry = "main.js"
# Shell template, relative to source_dir. Tags are injected before
# </head> and </body>. Without a template a plain document is generated.
template = "template.html"
# Directory receiving the shell.
output_dir = "www"
# Asset subdirectory of output_dir (scripts, styles, fonts/, images/).
assets_dir = "dist"
# Shell file name.
shell = "build.html"
# Document title when no template exists.
title = "App"
# Minify the shell in production builds (comments, whitespace, quotes).
minify_shell = true

# ---------------------------------------------------------------------------
# Variant pipeline (`pagepack variant <path>`)
# ---------------------------------------------------------------------------
[variant]
# Entry script and template, relative to the variant directory.
entry = "js/main.js"
template = "html/index.html"
# Output directory inside the variant directory. The document is
# <output_subdir>/<variant>.html.
output_subdir = "dist"
# "campaigns/summer/" names the variant "summer". Set to false to reject
# variant paths that end in a separator instead.
trailing_separator_fallback = true
# "development" or "production".
mode = "development"
title = "Campaign"

# ---------------------------------------------------------------------------
# Assets
# ---------------------------------------------------------------------------
[assets]
# Files with an unrecognized extension: "copy" passes them through,
# "reject" fails the build.
unknown = "copy"
# Third-party code: bundled into the vendor chunk, never transpiled.
vendor_dirs = ["node_modules"]

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[images]
# Run the compression stage on images.
compress = false

# ---------------------------------------------------------------------------
# Development server
# ---------------------------------------------------------------------------
[server]
host = "localhost"
port = 3000
# Open the shell in a browser once the server is listening.
open_browser = true
# Give up waiting for readiness after this many seconds (the server keeps
# running; only the browser is not opened). Comment out to wait forever.
ready_timeout_secs = 30
# Reload open pages after each successful rebuild, over a WebSocket on
# reload_port (or the next free port).
live_reload = true
reload_port = 35729

# ---------------------------------------------------------------------------
# Watch mode
# ---------------------------------------------------------------------------
[watch]
debounce_ms = 200

# ---------------------------------------------------------------------------
# Hooks
# ---------------------------------------------------------------------------
[hooks]
# Command run after every successful build, e.g. ["./deploy.sh", "--quick"].
# Receives PAGEPACK_OUTPUT_DIR, PAGEPACK_DOCUMENT, PAGEPACK_VARIANT and
# PAGEPACK_MODE in its environment.
post_build = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel transform workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_conventional_layout() {
        let config = BuildConfig::default();
        assert_eq!(config.spa.source_dir, PathBuf::from("www/src"));
        assert_eq!(config.spa.entry, "main.js");
        assert_eq!(config.spa.shell, "build.html");
        assert_eq!(config.variant.entry, "js/main.js");
        assert_eq!(config.variant.template, "html/index.html");
        assert_eq!(config.variant.mode, BuildMode::Development);
    }

    #[test]
    fn image_compression_defaults_off() {
        assert!(!BuildConfig::default().images.compress);
    }

    #[test]
    fn trailing_separator_fallback_defaults_on() {
        assert!(BuildConfig::default().variant.trailing_separator_fallback);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[server]
port = 8080
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.spa.assets_dir, "dist");
    }

    #[test]
    fn parse_enums() {
        let toml = r#"
[assets]
unknown = "reject"

[variant]
mode = "production"
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.assets.unknown, UnknownAssetPolicy::Reject);
        assert_eq!(config.variant.mode, BuildMode::Production);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path(), None).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[images]
compress = true

[assets]
vendor_dirs = ["node_modules", "bower_components"]
"#,
        )
        .unwrap();

        let config = load_config(tmp.path(), None).unwrap();
        assert!(config.images.compress);
        assert_eq!(
            config.assets.vendor_dirs,
            vec!["node_modules", "bower_components"]
        );
        assert_eq!(config.watch.debounce_ms, 200);
    }

    #[test]
    fn load_config_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ci.toml");
        fs::write(&path, "[server]\nopen_browser = false\n").unwrap();

        let config = load_config(tmp.path(), Some(&path)).unwrap();
        assert!(!config.server.open_browser);
    }

    #[test]
    fn load_config_missing_explicit_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(tmp.path(), Some(&tmp.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[spa\nentry = ").unwrap();
        assert!(matches!(
            load_config(tmp.path(), None),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[images]\ncompres = true\n",
        )
        .unwrap();
        assert!(load_config(tmp.path(), None).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<BuildConfig, _> = toml::from_str("[bundler]\nfast = true\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // merge tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_nested_tables() {
        let base: toml::Value =
            toml::from_str("[server]\nhost = \"localhost\"\nport = 3000").unwrap();
        let overlay: toml::Value = toml::from_str("[server]\nport = 4000").unwrap();
        let merged = merge_toml(base, overlay);
        let server = merged.get("server").unwrap();
        assert_eq!(server.get("host").unwrap().as_str(), Some("localhost"));
        assert_eq!(server.get("port").unwrap().as_integer(), Some(4000));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("dirs = [\"a\", \"b\"]").unwrap();
        let overlay: toml::Value = toml::from_str("dirs = [\"c\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("dirs").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn resolve_config_with_overlay_keeps_defaults() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[spa]\nshell = \"index.html\"").unwrap();
        let config = resolve_config(base, Some(overlay)).unwrap();
        assert_eq!(config.spa.shell, "index.html");
        assert_eq!(config.spa.entry, "main.js");
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_escaping_assets_dir() {
        let mut config = BuildConfig::default();
        config.spa.assets_dir = "../dist".into();
        assert!(config.validate().is_err());
        config.spa.assets_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_shell_with_directory() {
        let mut config = BuildConfig::default();
        config.spa.shell = "pages/build.html".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("spa.shell"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = BuildConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_vendor_dir() {
        let mut config = BuildConfig::default();
        config.assets.vendor_dirs.push(" ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_reload_port_shared_with_server() {
        let mut config = BuildConfig::default();
        config.server.reload_port = config.server.port;
        assert!(config.validate().is_err());
        config.server.live_reload = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[watch]\ndebounce_ms = 60000\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path(), None),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: BuildConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = BuildConfig::default();
        assert_eq!(config.spa.source_dir, defaults.spa.source_dir);
        assert_eq!(config.variant.output_subdir, defaults.variant.output_subdir);
        assert_eq!(config.server.ready_timeout_secs, Some(30));
        assert_eq!(config.assets.unknown, UnknownAssetPolicy::Copy);
        assert!(config.hooks.post_build.is_empty());
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[spa]",
            "[variant]",
            "[assets]",
            "[images]",
            "[server]",
            "[watch]",
            "[hooks]",
            "[processing]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_is_table() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        assert!(val.get("spa").is_some());
        assert!(val.get("server").is_some());
    }
}

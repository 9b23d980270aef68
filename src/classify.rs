//! Asset classification by file extension.
//!
//! Every source file belongs to exactly one [`AssetClass`], decided once from
//! its extension and never reassigned. The class picks the transform chain
//! (see [`crate::chain`]) and where the output ends up.
//!
//! | Class | Extensions |
//! |---|---|
//! | Script | `js` |
//! | Stylesheet | `css`, `scss`, `less` |
//! | Template | `vue`, `html` |
//! | Image | `gif`, `png`, `jpg`, `jpeg`, `svg` |
//! | Font | `ttf`, `eot`, `woff`, `woff2` |
//!
//! Matching is case-insensitive. Files with any other extension are an error
//! here; the scanner decides whether that error is fatal or whether the file
//! is copied through untouched (see [`UnknownAssetPolicy`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unrecognized asset type: {path}")]
pub struct ClassificationError {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Script,
    Stylesheet,
    Template,
    Image,
    Font,
}

impl AssetClass {
    pub const ALL: [AssetClass; 5] = [
        AssetClass::Script,
        AssetClass::Stylesheet,
        AssetClass::Template,
        AssetClass::Image,
        AssetClass::Font,
    ];

    /// Scripts, stylesheets and compiled templates end up in a bundle;
    /// images and fonts stay separate files.
    pub fn is_bundled(self) -> bool {
        matches!(
            self,
            AssetClass::Script | AssetClass::Stylesheet | AssetClass::Template
        )
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetClass::Script => "script",
            AssetClass::Stylesheet => "stylesheet",
            AssetClass::Template => "template",
            AssetClass::Image => "image",
            AssetClass::Font => "font",
        };
        f.write_str(label)
    }
}

/// Stylesheet source dialect, taken from the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleDialect {
    Css,
    Scss,
    Less,
}

impl fmt::Display for StyleDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StyleDialect::Css => "css",
            StyleDialect::Scss => "scss",
            StyleDialect::Less => "less",
        };
        f.write_str(label)
    }
}

/// What the scanner does with a file [`classify`] rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownAssetPolicy {
    /// Copy the file into the output unchanged.
    #[default]
    Copy,
    /// Abort the build.
    Reject,
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Classify a source file by its extension.
pub fn classify(path: &Path) -> Result<AssetClass, ClassificationError> {
    let class = match lowercase_extension(path).as_deref() {
        Some("js") => AssetClass::Script,
        Some("css" | "scss" | "less") => AssetClass::Stylesheet,
        Some("vue" | "html") => AssetClass::Template,
        Some("gif" | "png" | "jpg" | "jpeg" | "svg") => AssetClass::Image,
        Some("ttf" | "eot" | "woff" | "woff2") => AssetClass::Font,
        _ => {
            return Err(ClassificationError {
                path: path.to_path_buf(),
            });
        }
    };
    Ok(class)
}

/// Dialect of a stylesheet path. Non-stylesheets yield `None`.
pub fn style_dialect(path: &Path) -> Option<StyleDialect> {
    match lowercase_extension(path).as_deref() {
        Some("css") => Some(StyleDialect::Css),
        Some("scss") => Some(StyleDialect::Scss),
        Some("less") => Some(StyleDialect::Less),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(name: &str) -> AssetClass {
        classify(Path::new(name)).unwrap()
    }

    #[test]
    fn scripts() {
        assert_eq!(class_of("main.js"), AssetClass::Script);
        assert_eq!(class_of("js/vendor/lib.min.js"), AssetClass::Script);
    }

    #[test]
    fn stylesheets_in_every_dialect() {
        assert_eq!(class_of("style.css"), AssetClass::Stylesheet);
        assert_eq!(class_of("style.scss"), AssetClass::Stylesheet);
        assert_eq!(class_of("style.less"), AssetClass::Stylesheet);
    }

    #[test]
    fn templates() {
        assert_eq!(class_of("App.vue"), AssetClass::Template);
        assert_eq!(class_of("partials/card.html"), AssetClass::Template);
    }

    #[test]
    fn images() {
        for name in ["a.gif", "a.png", "a.jpg", "a.jpeg", "a.svg"] {
            assert_eq!(class_of(name), AssetClass::Image, "{name}");
        }
    }

    #[test]
    fn fonts() {
        for name in ["a.ttf", "a.eot", "a.woff", "a.woff2"] {
            assert_eq!(class_of(name), AssetClass::Font, "{name}");
        }
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(class_of("LOGO.PNG"), AssetClass::Image);
        assert_eq!(class_of("Main.JS"), AssetClass::Script);
        assert_eq!(class_of("theme.SCSS"), AssetClass::Stylesheet);
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let err = classify(Path::new("notes.txt")).unwrap_err();
        assert_eq!(err.path, PathBuf::from("notes.txt"));
    }

    #[test]
    fn missing_extension_is_an_error() {
        assert!(classify(Path::new("Makefile")).is_err());
    }

    #[test]
    fn only_the_last_extension_counts() {
        assert!(classify(Path::new("main.js.map")).is_err());
        assert_eq!(class_of("archive.tar.svg"), AssetClass::Image);
    }

    #[test]
    fn dialect_follows_extension() {
        assert_eq!(style_dialect(Path::new("a.less")), Some(StyleDialect::Less));
        assert_eq!(style_dialect(Path::new("a.SCSS")), Some(StyleDialect::Scss));
        assert_eq!(style_dialect(Path::new("a.css")), Some(StyleDialect::Css));
        assert_eq!(style_dialect(Path::new("a.js")), None);
    }
}

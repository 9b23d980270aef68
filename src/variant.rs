//! Variant identifier resolution.
//!
//! A variant build is keyed by a path such as `campaigns/holiday/`. The
//! identifier is the last path segment, which names the single output
//! document (`holiday.html`). Campaign paths arrive both with and without a
//! trailing separator, so an empty last segment falls back to the one before
//! it. The fallback can be switched off, in which case a trailing separator
//! is rejected.
//!
//! - `"campaigns/summer"` → `summer`
//! - `"campaigns/summer/"` → `summer`
//! - `"summer"` → `summer`
//! - `"/"`, `""`, `"a//"` → [`VariantError::InvalidVariantPath`]

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariantError {
    #[error("Variant path yields no usable identifier: {0:?}")]
    InvalidVariantPath(String),
}

/// Non-empty name of a variant build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantId(String);

impl VariantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the inlined output document.
    pub fn document_name(&self) -> String {
        format!("{}.html", self.0)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Derive the variant identifier from a variant path.
///
/// `trailing_fallback` enables the second-to-last segment fallback for
/// paths ending in a separator.
pub fn resolve_variant(path: &str, trailing_fallback: bool) -> Result<VariantId, VariantError> {
    let invalid = || VariantError::InvalidVariantPath(path.to_string());
    let segments: Vec<&str> = path.split(is_separator).collect();

    let mut candidate = segments.last().copied().unwrap_or_default();
    if candidate.is_empty() && trailing_fallback && segments.len() >= 2 {
        candidate = segments[segments.len() - 2];
    }

    // `.` and `..` would name a file outside the variant directory.
    if candidate.is_empty() || candidate == "." || candidate == ".." {
        return Err(invalid());
    }
    Ok(VariantId(candidate.to_string()))
}

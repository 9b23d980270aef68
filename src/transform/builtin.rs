//! Built-in transform backend.
//!
//! Lightweight, deterministic implementations of every stage so a build
//! produces usable output without external tools:
//!
//! | Stage | Built-in behavior |
//! |---|---|
//! | preprocess | drops `//` comments from Less/Scss; plain CSS untouched |
//! | resolve-urls | rewrites relative image/font `url(...)` to `images/` / `fonts/` |
//! | inject-style-tag | wraps CSS in a script that appends a `<style>` element |
//! | extract-to-file | no-op; the chain's emitted kind routes the CSS |
//! | minify | lightningcss on stylesheets; scripts wait for their chunk |
//! | transpile | passes source through, newline-terminated |
//! | compile-template | registers the markup as a string in a global template map |
//! | copy / copy-fixed-name | passes bytes through |
//! | compress | strips comments and indentation from SVG; other formats untouched |
//!
//! Production script chunks are minified with oxc once concatenated, through
//! [`TransformBackend::minify_chunk`].
//!
//! Anything beyond this (real Sass/Less compilation, syntax lowering, image
//! recompression) belongs in another [`TransformBackend`].

use super::backend::{BackendError, StageContext, TransformBackend};
use super::minify;
use crate::chain::Stage;
use crate::classify::{self, AssetClass, StyleDialect};
use crate::naming::file_subdir;
use crate::types::OutputKind;
use std::path::Path;

/// Global object compiled templates register themselves on.
pub const TEMPLATE_REGISTRY: &str = "window.__pagepackTemplates";

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinBackend;

impl BuiltinBackend {
    pub fn new() -> Self {
        Self
    }
}

impl TransformBackend for BuiltinBackend {
    fn apply(
        &self,
        stage: Stage,
        input: Vec<u8>,
        ctx: &StageContext<'_>,
    ) -> Result<Vec<u8>, BackendError> {
        let asset = ctx.asset;
        let output = match stage {
            Stage::Preprocess => {
                let source = into_text(input)?;
                let css = match classify::style_dialect(&asset.path) {
                    Some(StyleDialect::Less | StyleDialect::Scss) => strip_line_comments(&source),
                    _ => source,
                };
                css.into_bytes()
            }
            Stage::ResolveUrls => resolve_urls(&into_text(input)?, ctx.url_prefix).into_bytes(),
            Stage::InjectStyleTag => {
                inject_style_tag(&into_text(input)?, &asset.rel_path)?.into_bytes()
            }
            Stage::Minify if asset.class == AssetClass::Stylesheet => {
                minify::minify_css(&into_text(input)?)?.into_bytes()
            }
            Stage::Transpile => {
                let mut source = into_text(input)?;
                if !source.ends_with('\n') {
                    source.push('\n');
                }
                source.into_bytes()
            }
            Stage::CompileTemplate => {
                compile_template(&into_text(input)?, &asset.rel_path)?.into_bytes()
            }
            Stage::Compress if is_svg(&asset.path) => compress_svg(&into_text(input)?).into_bytes(),
            Stage::ExtractToFile
            | Stage::Minify
            | Stage::Copy
            | Stage::CopyFixedName
            | Stage::Compress => input,
        };
        Ok(output)
    }

    fn minify_chunk(&self, kind: OutputKind, input: Vec<u8>) -> Result<Vec<u8>, BackendError> {
        match kind {
            OutputKind::Script => Ok(minify::minify_js(&into_text(input)?)?.into_bytes()),
            _ => Ok(input),
        }
    }
}

fn into_text(input: Vec<u8>) -> Result<String, BackendError> {
    String::from_utf8(input).map_err(|_| BackendError::NotUtf8)
}

fn js_string(value: &str) -> Result<String, BackendError> {
    serde_json::to_string(value).map_err(|e| BackendError::ProcessingFailed(e.to_string()))
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Drop `//` comments. Strings, `url(...)` arguments and block comments
/// are left alone; lines left empty by a cut are dropped.
fn strip_line_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut in_block = false;
    for line in source.lines() {
        match line_comment_start(line, &mut in_block) {
            Some(cut) => {
                let kept = line[..cut].trim_end();
                if !kept.is_empty() {
                    out.push_str(kept);
                    out.push('\n');
                }
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

/// Byte offset of a `//` comment in `line`, if any. `in_block` carries an
/// open `/* */` comment across lines.
fn line_comment_start(line: &str, in_block: &mut bool) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut in_url = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        if *in_block {
            if b == b'*' && next == Some(b'/') {
                *in_block = false;
                i += 1;
            }
        } else if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else if in_url {
            if b == b')' {
                in_url = false;
            }
        } else {
            match (b, next) {
                (b'"' | b'\'', _) => quote = Some(b),
                (b'(', _) => {
                    in_url = line
                        .get(i.saturating_sub(3)..i)
                        .is_some_and(|s| s.eq_ignore_ascii_case("url"));
                }
                (b'/', Some(b'*')) => {
                    *in_block = true;
                    i += 1;
                }
                (b'/', Some(b'/')) => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn is_external_url(url: &str) -> bool {
    url.is_empty()
        || url.starts_with('/')
        || url.starts_with('#')
        || url.starts_with("data:")
        || url.contains("://")
}

/// Rewrite one `url(...)` argument. Returns it untouched unless it points
/// at a relative image or font.
fn rewrite_url(raw: &str, prefix: &str) -> String {
    let trimmed = raw.trim();
    let (quote, inner) = match trimmed.chars().next() {
        Some(q @ ('"' | '\'')) if trimmed.len() >= 2 && trimmed.ends_with(q) => {
            (Some(q), &trimmed[1..trimmed.len() - 1])
        }
        _ => (None, trimmed),
    };
    if is_external_url(inner) {
        return raw.to_string();
    }

    // Font URLs often carry `?#iefix` or `#font-id` suffixes.
    let split = inner.find(['?', '#']).unwrap_or(inner.len());
    let (path_part, suffix) = inner.split_at(split);
    let path = Path::new(path_part);
    let class = match classify::classify(path) {
        Ok(class @ (AssetClass::Image | AssetClass::Font)) => class,
        _ => return raw.to_string(),
    };
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return raw.to_string();
    };

    let rewritten = format!("{prefix}{}/{name}{suffix}", file_subdir(Some(class)));
    match quote {
        Some(q) => format!("{q}{rewritten}{q}"),
        None => rewritten,
    }
}

/// Point relative image/font references at their output location.
pub(crate) fn resolve_urls(css: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(pos) = rest.find("url(") {
        let (before, after) = rest.split_at(pos + 4);
        out.push_str(before);
        let Some(end) = after.find(')') else {
            rest = after;
            break;
        };
        out.push_str(&rewrite_url(&after[..end], prefix));
        rest = &after[end..];
    }
    out.push_str(rest);
    out
}

fn inject_style_tag(css: &str, source: &str) -> Result<String, BackendError> {
    Ok(format!(
        "(function(){{var s=document.createElement(\"style\");\
         s.setAttribute(\"data-source\",{});\
         s.textContent={};\
         document.head.appendChild(s);}})();\n",
        js_string(source)?,
        js_string(css)?
    ))
}

fn compile_template(markup: &str, source: &str) -> Result<String, BackendError> {
    Ok(format!(
        "({TEMPLATE_REGISTRY} = {TEMPLATE_REGISTRY} || {{}})[{}] = {};\n",
        js_string(source)?,
        js_string(markup)?
    ))
}

fn compress_svg(svg: &str) -> String {
    let mut stripped = String::with_capacity(svg.len());
    let mut rest = svg;
    while let Some(start) = rest.find("<!--") {
        stripped.push_str(&rest[..start]);
        rest = match rest[start..].find("-->") {
            Some(end) => &rest[start + end + 3..],
            None => "",
        };
    }
    stripped.push_str(rest);

    let mut out = String::with_capacity(stripped.len());
    for line in stripped.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !out.is_empty() && !(out.ends_with('>') && line.starts_with('<')) {
            out.push(' ');
        }
        out.push_str(line);
    }
    out
}

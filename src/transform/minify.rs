//! Script and stylesheet minification.
//!
//! oxc handles scripts, lightningcss handles stylesheets. Scripts are parsed
//! with script (not module) semantics: chunks are plain concatenations whose
//! top-level bindings are shared globals, so top-level names are neither
//! mangled nor dropped.

use super::backend::BackendError;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

/// Minify a script chunk.
pub fn minify_js(source: &str) -> Result<String, BackendError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if let Some(first) = ret.errors.first() {
        return Err(BackendError::ProcessingFailed(format!(
            "script does not parse: {first}"
        )));
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify a stylesheet.
pub fn minify_css(source: &str) -> Result<String, BackendError> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default())
        .map_err(|e| BackendError::ProcessingFailed(format!("stylesheet does not parse: {e}")))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| BackendError::ProcessingFailed(e.to_string()))?;
    Ok(result.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_loses_comments_and_indentation() {
        let source = "// a long explanatory comment\nfunction   add(first,   second) {\n    return first + second;\n}\nwindow.total = add(1, 2);\n";
        let out = minify_js(source).unwrap();
        assert!(!out.contains("explanatory"));
        assert!(!out.contains("\n    "));
        assert!(!out.contains("   "));
        assert!(out.len() < source.len());
        assert!(out.contains("window.total"));
    }

    #[test]
    fn js_keeps_top_level_names_shared_between_chunks() {
        let out = minify_js("var sharedLibrary = { ready: true };\n").unwrap();
        assert!(out.contains("sharedLibrary"));
    }

    #[test]
    fn js_syntax_error_is_reported() {
        let err = minify_js("function (").unwrap_err();
        assert!(err.to_string().contains("does not parse"));
    }

    #[test]
    fn css_collapses_whitespace_and_comments() {
        let css = "/* banner */\nbody {\n  color: red;\n  margin: 0 auto;\n}\n\na > b ,  c { x: y; }";
        let out = minify_css(css).unwrap();
        assert!(!out.contains("banner"));
        assert!(!out.contains('\n'));
        assert!(out.contains("body{"));
        assert!(out.contains("margin:0 auto"));
        assert!(out.contains("a>b,c{"));
    }

    #[test]
    fn css_preserves_strings() {
        let out = minify_css("a::before { content: \"  /* kept */  \"; }").unwrap();
        assert!(out.contains("\"  /* kept */  \""));
    }

    #[test]
    fn css_keeps_descendant_pseudo_space() {
        let out = minify_css("a :hover { color: red }").unwrap();
        assert!(out.starts_with("a :hover{"));
    }
}

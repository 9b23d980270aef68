//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! ## Build
//!
//! ```text
//! Built spa (production) → www
//!     build.html (412 B)
//!     dist/main.3f2a…min.js (18.2 KB)
//! 12 assets, 1 pass-through, 4 files
//! ```
//!
//! ## Check
//!
//! ```text
//! Plan: variant campaigns/holiday/ (development)
//!     Source: campaigns/holiday
//!     Output: campaigns/holiday/dist/holiday.html
//!     Template: html/index.html
//! Assets
//! 001 js/main.js [script]
//!     transpile → script
//! 002 node_modules/lib/lib.js [script, vendor]
//!     (no stages) → script
//! Pass-through
//! 001 robots.txt
//! ```

use crate::pipeline::{BuildPlan, BuildReport};
use crate::types::OutputKind;
use serde_json::json;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte size.
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn kind_label(kind: OutputKind) -> &'static str {
    match kind {
        OutputKind::Script => "script",
        OutputKind::Stylesheet => "stylesheet",
        OutputKind::File => "file",
        OutputKind::Raw => "raw",
    }
}

fn slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip `root` from `path` for display, when possible.
fn display_rel(path: &Path, root: &Path) -> String {
    slash(path.strip_prefix(root).unwrap_or(path))
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_report(report: &BuildReport, project_root: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "Built {} → {}",
        report.pipeline,
        display_rel(&report.output_root, project_root)
    )];
    for file in &report.files {
        lines.push(format!(
            "{}{} ({})",
            indent(1),
            slash(&file.rel_path),
            format_size(file.size)
        ));
    }
    lines.push(format!(
        "{}, {}, {}",
        plural(report.assets, "asset", "assets"),
        plural(report.passthrough, "pass-through", "pass-through"),
        plural(report.files.len(), "file", "files"),
    ));
    lines
}

pub fn print_build_report(report: &BuildReport, project_root: &Path) {
    for line in format_build_report(report, project_root) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_plan(plan: &BuildPlan, project_root: &Path) -> Vec<String> {
    let loc = &plan.locations;
    let mut lines = vec![
        format!("Plan: {}", plan.pipeline),
        format!("{}Source: {}", indent(1), display_rel(&loc.source_root, project_root)),
        format!(
            "{}Output: {}",
            indent(1),
            display_rel(&loc.output_root.join(&loc.document), project_root)
        ),
    ];
    let template = if plan.has_template {
        display_rel(&loc.template, &loc.source_root)
    } else {
        "none (generated document)".to_string()
    };
    lines.push(format!("{}Template: {}", indent(1), template));

    lines.push("Assets".to_string());
    for (i, asset) in plan.assets.iter().enumerate() {
        let tags = if asset.vendor {
            format!("{}, vendor", asset.class)
        } else {
            asset.class.to_string()
        };
        lines.push(format!("{} {} [{}]", format_index(i + 1), asset.rel_path, tags));

        let stages = if asset.stages.is_empty() {
            "(no stages)".to_string()
        } else {
            asset
                .stages
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(" → ")
        };
        lines.push(format!("{}{} → {}", indent(1), stages, kind_label(asset.emits)));
    }

    if !plan.passthrough.is_empty() {
        lines.push("Pass-through".to_string());
        for (i, rel) in plan.passthrough.iter().enumerate() {
            lines.push(format!("{} {}", format_index(i + 1), rel));
        }
    }
    lines
}

pub fn print_plan(plan: &BuildPlan, project_root: &Path) {
    for line in format_plan(plan, project_root) {
        println!("{}", line);
    }
}

/// Machine-readable form of a plan, for `check --json`.
pub fn plan_json(plan: &BuildPlan) -> serde_json::Value {
    let loc = &plan.locations;
    json!({
        "pipeline": plan.pipeline.to_string(),
        "mode": plan.pipeline.mode(),
        "source_root": loc.source_root,
        "output_root": loc.output_root,
        "document": loc.document,
        "variant": loc.variant.as_ref().map(|v| v.as_str()),
        "template": plan.has_template.then(|| &loc.template),
        "assets": plan.assets.iter().map(|a| json!({
            "path": a.rel_path,
            "class": a.class,
            "vendor": a.vendor,
            "stages": a.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "emits": kind_label(a.emits),
        })).collect::<Vec<_>>(),
        "passthrough": plan.passthrough,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Stage;
    use crate::classify::AssetClass;
    use crate::config::BuildConfig;
    use crate::pipeline::{Pipeline, PlannedAsset, ReportFile, locate};
    use crate::types::BuildMode;
    use std::path::PathBuf;

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    fn report() -> BuildReport {
        BuildReport {
            pipeline: Pipeline::Spa {
                mode: BuildMode::Production,
            },
            output_root: PathBuf::from("/p/www"),
            document: PathBuf::from("/p/www/build.html"),
            variant: None,
            assets: 3,
            passthrough: 1,
            files: vec![
                ReportFile {
                    rel_path: PathBuf::from("build.html"),
                    size: 412,
                },
                ReportFile {
                    rel_path: PathBuf::from("dist/main.min.js"),
                    size: 2048,
                },
            ],
        }
    }

    #[test]
    fn build_report_lines() {
        let lines = format_build_report(&report(), Path::new("/p"));
        assert_eq!(
            lines,
            vec![
                "Built spa (production) → www",
                "    build.html (412 B)",
                "    dist/main.min.js (2.0 KB)",
                "3 assets, 1 pass-through, 2 files",
            ]
        );
    }

    fn plan() -> BuildPlan {
        let pipeline = Pipeline::Variant {
            path: "campaigns/holiday/".into(),
            mode: BuildMode::Development,
        };
        let locations = locate(&pipeline, Path::new("/p"), &BuildConfig::default()).unwrap();
        BuildPlan {
            pipeline,
            locations,
            assets: vec![
                PlannedAsset {
                    rel_path: "js/main.js".into(),
                    class: AssetClass::Script,
                    vendor: false,
                    stages: vec![Stage::Transpile],
                    emits: OutputKind::Script,
                },
                PlannedAsset {
                    rel_path: "node_modules/lib/lib.js".into(),
                    class: AssetClass::Script,
                    vendor: true,
                    stages: vec![],
                    emits: OutputKind::Script,
                },
            ],
            passthrough: vec!["robots.txt".into()],
            has_template: true,
        }
    }

    #[test]
    fn plan_lines() {
        let lines = format_plan(&plan(), Path::new("/p"));
        assert_eq!(
            lines,
            vec![
                "Plan: variant campaigns/holiday/ (development)",
                "    Source: campaigns/holiday",
                "    Output: campaigns/holiday/dist/holiday.html",
                "    Template: html/index.html",
                "Assets",
                "001 js/main.js [script]",
                "    transpile → script",
                "002 node_modules/lib/lib.js [script, vendor]",
                "    (no stages) → script",
                "Pass-through",
                "001 robots.txt",
            ]
        );
    }

    #[test]
    fn plan_without_template() {
        let mut plan = plan();
        plan.has_template = false;
        let lines = format_plan(&plan, Path::new("/p"));
        assert_eq!(lines[3], "    Template: none (generated document)");
    }

    #[test]
    fn plan_as_json() {
        let value = plan_json(&plan());
        assert_eq!(value["mode"], "development");
        assert_eq!(value["variant"], "holiday");
        assert_eq!(value["assets"][0]["stages"][0], "transpile");
        assert_eq!(value["assets"][1]["vendor"], true);
        assert_eq!(value["assets"][0]["class"], "script");
        assert_eq!(value["passthrough"][0], "robots.txt");
    }
}

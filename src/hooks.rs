//! Post-build hooks.
//!
//! A hook runs after every successful build with a [`HookContext`]
//! describing what was written. The default [`NoopHook`] only logs. With
//! `[hooks] post_build` configured, a [`CommandHook`] runs an external
//! command with the context exported as environment variables:
//!
//! | Variable | Value |
//! |---|---|
//! | `PAGEPACK_OUTPUT_DIR` | absolute output root |
//! | `PAGEPACK_DOCUMENT` | absolute path of the shell or variant document |
//! | `PAGEPACK_VARIANT` | variant identifier, empty for SPA builds |
//! | `PAGEPACK_MODE` | `development` or `production` |
//!
//! `$PAGEPACK_*` references inside the command arguments are substituted too.

use crate::types::BuildMode;
use crate::variant::VariantId;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookError {
    #[error("Failed to start hook `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Hook `{command}` exited with {status}")]
    Failed { command: String, status: String },
}

/// What a finished build produced.
#[derive(Debug, Clone)]
pub struct HookContext<'a> {
    pub output_root: &'a Path,
    pub written: &'a [PathBuf],
    pub document: PathBuf,
    pub variant: Option<&'a VariantId>,
    pub mode: BuildMode,
}

impl HookContext<'_> {
    /// The `PAGEPACK_*` variables for this build.
    pub fn env_vars(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("PAGEPACK_OUTPUT_DIR", self.output_root.display().to_string()),
            ("PAGEPACK_DOCUMENT", self.document.display().to_string()),
            (
                "PAGEPACK_VARIANT",
                self.variant.map(|v| v.to_string()).unwrap_or_default(),
            ),
            ("PAGEPACK_MODE", self.mode.to_string()),
        ])
    }
}

pub trait PostBuildHook: Send + Sync {
    fn after_build(&self, ctx: &HookContext<'_>) -> Result<(), HookError>;
}

/// Logs the build and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl PostBuildHook for NoopHook {
    fn after_build(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        tracing::debug!(
            document = %ctx.document.display(),
            files = ctx.written.len(),
            "post-build hook: nothing configured"
        );
        Ok(())
    }
}

/// Runs an external command after each build.
#[derive(Debug, Clone)]
pub struct CommandHook {
    command: Vec<String>,
    cwd: PathBuf,
}

impl CommandHook {
    /// `None` when `command` is empty.
    pub fn new(command: Vec<String>, cwd: impl Into<PathBuf>) -> Option<Self> {
        if command.is_empty() {
            return None;
        }
        Some(Self {
            command,
            cwd: cwd.into(),
        })
    }
}

/// Replace `$NAME` references with their values.
pub fn resolve_args(args: &[String], vars: &BTreeMap<&'static str, String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            // Reverse order substitutes `$A_B` before its prefix `$A`.
            vars.iter().rev().fold(arg.clone(), |acc, (key, value)| {
                acc.replace(&format!("${key}"), value)
            })
        })
        .collect()
}

impl PostBuildHook for CommandHook {
    fn after_build(&self, ctx: &HookContext<'_>) -> Result<(), HookError> {
        let vars = ctx.env_vars();
        let args = resolve_args(&self.command, &vars);
        let command_line = args.join(" ");
        let Some((program, rest)) = args.split_first() else {
            return Ok(());
        };

        tracing::info!(command = %command_line, "running post-build hook");
        let status = Command::new(program)
            .args(rest)
            .current_dir(&self.cwd)
            .envs(&vars)
            .status()
            .map_err(|source| HookError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(HookError::Failed {
                command: command_line,
                status: status.to_string(),
            })
        }
    }
}

/// The hook configured by `[hooks] post_build`, or the no-op default.
pub fn from_config(post_build: &[String], cwd: &Path) -> Box<dyn PostBuildHook> {
    match CommandHook::new(post_build.to_vec(), cwd) {
        Some(hook) => Box::new(hook),
        None => Box::new(NoopHook),
    }
}

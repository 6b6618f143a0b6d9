//! # Target Resolver Module / 目标解析模块
//!
//! Expands glob patterns into a deduplicated, ordered list of run targets,
//! classifies each as a binary script or a package directory, and turns
//! them into spawnable tasks. Resolution is the planning stage: it
//! completes, or fails fatally, before any process is spawned, so partial
//! results are never merged from a run that could not be classified.
//!
//! 将 glob 模式展开为去重且有序的运行目标列表，将每个目标分类为二进制
//! 脚本或包目录，并将其转换为可派生的任务。解析是计划阶段：它在任何
//! 进程派生之前完成或致命失败，因此不会从无法分类的运行中合并部分结果。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::core::config::RunConfig;
use crate::core::models::{PackageManifest, Target, TargetKind, Task, TaskKind, TaskMeta};
use crate::core::script::{
    self, ScriptPattern, common_prefix_len, is_degenerate_command, label_prefix,
    match_script_names,
};
use crate::infra::fs;

/// File extension marking a target as a binary script.
const SCRIPT_EXT: &str = "js";

/// Fatal, pre-spawn resolution failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid glob pattern {pattern:?}")]
    BadPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("failed to expand glob pattern {pattern:?}")]
    Expand {
        pattern: String,
        #[source]
        source: glob::GlobError,
    },
    #[error("unsupported target: {0}")]
    UnsupportedTarget(PathBuf),
}

/// Resolves the configured patterns all the way to the ordered task list.
pub async fn resolve_tasks(config: &RunConfig) -> Result<Vec<Task>> {
    let targets = resolve_targets(config)?;
    let mut tasks = Vec::new();

    for target in &targets {
        match target.kind {
            TargetKind::Binary => {
                tasks.push(Task {
                    kind: TaskKind::Binary {
                        file: target.path.clone(),
                    },
                    meta: TaskMeta {
                        name: target.name.clone(),
                        prefix: String::new(),
                    },
                });
            }
            TargetKind::Package => {
                let manifest = fs::load_manifest(&target.path).await?;
                tasks.extend(package_tasks(target, &manifest, config));
            }
        }
    }

    debug!(targets = targets.len(), tasks = tasks.len(), "resolved");
    Ok(tasks)
}

/// Expands every pattern against the base directory, deduplicates by
/// absolute path preserving first-seen order, and classifies each result.
pub fn resolve_targets(config: &RunConfig) -> Result<Vec<Target>> {
    let basedir = fs::canonicalized(&config.basedir)
        .with_context(|| format!("failed to resolve base directory {:?}", config.basedir))?;

    let mut defaults = Vec::new();
    let patterns = if config.patterns.is_empty() {
        defaults.push(".".to_string());
        &defaults
    } else {
        &config.patterns
    };

    let mut targets: Vec<Target> = Vec::new();

    for pattern in patterns {
        let full = basedir.join(pattern);
        let matches =
            glob::glob(&full.to_string_lossy()).map_err(|source| ResolveError::BadPattern {
                pattern: pattern.clone(),
                source,
            })?;

        for entry in matches {
            let path = entry.map_err(|source| ResolveError::Expand {
                pattern: pattern.clone(),
                source,
            })?;
            let path = fs::canonicalized(&path)
                .with_context(|| format!("failed to resolve target {path:?}"))?;

            let (path, kind) = classify(path)?;
            if targets.iter().any(|t| t.path == path) {
                continue;
            }

            let name = path
                .strip_prefix(&basedir)
                .map(|rel| rel.to_string_lossy().into_owned())
                .unwrap_or_else(|_| path.to_string_lossy().into_owned());

            debug!(path = %path.display(), ?kind, "target");
            targets.push(Target { path, kind, name });
        }
    }

    Ok(targets)
}

/// Classifies one expanded path. A `package.json` file stands for its
/// directory; anything that is neither a script nor a package is fatal.
fn classify(path: PathBuf) -> Result<(PathBuf, TargetKind), ResolveError> {
    if path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXT) {
        return Ok((path, TargetKind::Binary));
    }
    if path.file_name().and_then(|n| n.to_str()) == Some("package.json") {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or(path);
        return Ok((dir, TargetKind::Package));
    }
    if fs::has_manifest(&path) {
        return Ok((path, TargetKind::Package));
    }
    Err(ResolveError::UnsupportedTarget(path))
}

/// Applies the script matcher to one package, yielding zero or more script
/// tasks plus, possibly, one trailing missing task for unmatched patterns.
pub fn package_tasks(
    target: &Target,
    manifest: &PackageManifest,
    config: &RunConfig,
) -> Vec<Task> {
    let patterns: Vec<ScriptPattern> = config.run.iter().map(|p| ScriptPattern::new(p)).collect();
    let names: Vec<&str> = manifest.scripts.keys().map(String::as_str).collect();
    let matched = match_script_names(&patterns, &names);
    let strip = common_prefix_len(&matched.run);
    let package_name = manifest.name.as_deref();

    let mut tasks = Vec::new();

    for name in &matched.run {
        let subtitle = &name[strip.min(name.len())..];
        let prefix = label_prefix(&target.name, package_name, subtitle);
        let command = manifest.scripts.get(name).and_then(|v| v.as_str());

        if is_degenerate_command(command) {
            let reason = script::degenerate_reason(name);
            debug!(script = name.as_str(), "degenerate script");
            tasks.push(Task {
                kind: TaskKind::Missing { reason },
                meta: TaskMeta {
                    name: target.name.clone(),
                    prefix,
                },
            });
        } else {
            tasks.push(Task {
                kind: TaskKind::Script {
                    dir: target.path.clone(),
                    script: name.clone(),
                },
                meta: TaskMeta {
                    name: target.name.clone(),
                    prefix,
                },
            });
        }
    }

    if !matched.unmatched.is_empty() {
        let reason = script::unmatched_reason(&matched.unmatched);
        debug!(%reason, "unmatched run patterns");
        tasks.push(Task {
            kind: TaskKind::Missing { reason },
            meta: TaskMeta {
                name: target.name.clone(),
                prefix: label_prefix(&target.name, package_name, ""),
            },
        });
    }

    tasks
}

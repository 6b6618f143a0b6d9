//! # Data Models Module / 数据模型模块
//!
//! Core data structures shared across the resolver, the execution unit and
//! the merge engine: run targets, spawnable tasks and the final summary.
//!
//! 解析器、执行单元和合并引擎共享的核心数据结构：
//! 运行目标、可派生的任务和最终摘要。

use serde::Deserialize;
use std::path::PathBuf;

/// How a resolved target is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// A single script file, run with the configured interpreter.
    Binary,
    /// An npm-style package directory with a `package.json` manifest.
    Package,
}

/// One deduplicated run target produced by the resolver.
///
/// `name` is the path relative to the glob base directory; it identifies the
/// target in synthesized failure text and is empty for the base directory
/// itself.
#[derive(Debug, Clone)]
pub struct Target {
    pub path: PathBuf,
    pub kind: TargetKind,
    pub name: String,
}

/// Display metadata attached to every task.
#[derive(Debug, Clone)]
pub struct TaskMeta {
    /// Target name used when synthesizing "exited with code" assertions.
    pub name: String,
    /// Label prefix applied to passed-through comments, `"pkg › sub › "`
    /// form, empty when the task needs no distinguishing label.
    pub prefix: String,
}

/// What to spawn for a task, if anything.
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// Run a script file with the configured interpreter.
    Binary { file: PathBuf },
    /// Run a declared package script via `npm run`.
    Script { dir: PathBuf, script: String },
    /// Nothing to spawn; the merge engine emits one synthetic outcome.
    Missing { reason: String },
}

/// One unit of execution in resolution order. A binary target yields exactly
/// one task; a package target yields one per matched script plus, possibly,
/// one trailing missing task.
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: TaskKind,
    pub meta: TaskMeta,
}

impl Task {
    pub fn is_missing(&self) -> bool {
        matches!(self.kind, TaskKind::Missing { .. })
    }
}

/// The subset of `package.json` the matcher needs. Script order is
/// significant, so the map preserves declaration order.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scripts: serde_json::Map<String, serde_json::Value>,
}

/// Aggregated counters for a completed merge, returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Final global assertion id, including synthesized assertions.
    pub tests: u64,
    pub passed: u64,
    pub failed: u64,
    /// False if any task's own TAP summary was not-ok.
    pub ok: bool,
}

impl RunSummary {
    /// The process exit contract: 0 iff the merged document ends in `# ok`.
    pub fn exit_code(&self) -> u8 {
        if self.ok && self.failed == 0 { 0 } else { 1 }
    }
}

//! # File System Operations Module / 文件系统操作模块
//!
//! Path resolution and package manifest access for the resolver.
//!
//! 为解析器提供路径解析和包清单访问。

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::core::models::PackageManifest;

/// Canonicalizes a path, which also verifies that it exists.
pub fn canonicalized(path: &Path) -> std::io::Result<PathBuf> {
    std::fs::canonicalize(path)
}

/// Whether a directory carries a `package.json` manifest.
pub fn has_manifest(dir: &Path) -> bool {
    dir.join("package.json").is_file()
}

/// Reads and parses a package directory's manifest. Failures here are
/// fatal resolution errors; they happen before anything is spawned.
pub async fn load_manifest(dir: &Path) -> Result<PackageManifest> {
    let path = dir.join("package.json");
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read manifest {path:?}"))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse manifest {path:?}"))
}

//! # Run Configuration Module / 运行配置模块
//!
//! The resolved configuration record handed to the merge engine. Flag
//! parsing, aliasing and help text live in the CLI layer; by the time a
//! `RunConfig` exists every value is concrete.
//!
//! 传递给合并引擎的已解析配置记录。标志解析、别名和帮助文本位于 CLI 层；
//! 当 `RunConfig` 存在时，每个值都已是具体的。

use std::path::PathBuf;

/// Environment variable carrying the verbose flag into nested invocations.
pub const ENV_VERBOSE: &str = "TAP_MUX_VERBOSE";
/// Environment variable carrying the ignore-missing flag into nested invocations.
pub const ENV_IGNORE_MISSING: &str = "TAP_MUX_IGNORE_MISSING";
/// Environment variable carrying the fail-fast flag into nested invocations.
pub const ENV_FAIL_FAST: &str = "TAP_MUX_FAIL_FAST";

/// Fully resolved settings for one merge run.
///
/// Defaults mirror the conventional invocation: merge the `test` script of
/// the package in the working directory, running `.js` targets with `node`.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Glob patterns naming the targets to run, in declared order.
    pub patterns: Vec<String>,
    /// Script-name patterns applied to each package target, in declared order.
    pub run: Vec<String>,
    /// Working directory for binary targets.
    pub cwd: PathBuf,
    /// Base directory against which glob patterns are expanded.
    pub basedir: PathBuf,
    /// Interpreter used to run binary script targets.
    pub binary: String,
    /// Pass child stderr through and enable diagnostics on our own stderr.
    pub verbose: bool,
    /// Stop merging further task output after the first nonzero exit.
    pub fail_fast: bool,
    /// Treat unmatched or degenerate package scripts as skipped, not failed.
    pub ignore_missing: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            patterns: vec![".".to_string()],
            run: vec!["test".to_string()],
            cwd: PathBuf::from("."),
            basedir: PathBuf::from("."),
            binary: "node".to_string(),
            verbose: false,
            fail_fast: false,
            ignore_missing: false,
        }
    }
}

impl RunConfig {
    /// The environment triple appended to every child process, so a nested
    /// invocation behaves consistently with its parent. Pure environment
    /// propagation, not shared state.
    pub fn child_env(&self) -> [(&'static str, String); 3] {
        [
            (ENV_VERBOSE, self.verbose.to_string()),
            (ENV_IGNORE_MISSING, self.ignore_missing.to_string()),
            (ENV_FAIL_FAST, self.fail_fast.to_string()),
        ]
    }
}

/// Parses the string-boolean convention used by the inherited environment
/// variables: `"true"` (any case) and `"1"` are true, everything else false.
pub fn is_true(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}

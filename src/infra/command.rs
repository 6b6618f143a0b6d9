//! # Command Construction Module / 命令构造模块
//!
//! Builds the `tokio::process::Command` for each spawnable task with the
//! stdio, cwd and environment policy the merge engine relies on.
//!
//! 为每个可派生任务构建 `tokio::process::Command`，并应用合并引擎
//! 所依赖的 stdio、cwd 和环境策略。

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::core::config::RunConfig;

/// Command for a binary script target: `<interpreter> <file>`, run from the
/// configured working directory.
pub fn binary_command(file: &Path, config: &RunConfig) -> Command {
    let mut cmd = Command::new(&config.binary);
    cmd.arg(file);
    cmd.current_dir(&config.cwd);
    configure(&mut cmd, config);
    cmd
}

/// Command for a package script: `npm run -s --no-progress <script>`, run
/// from the package directory so npm resolves the right manifest. The `-s`
/// and `--no-progress` flags silence npm's banner and progress output,
/// which would otherwise corrupt the TAP stream.
pub fn script_command(dir: &Path, script: &str, config: &RunConfig) -> Command {
    let mut cmd = Command::new("npm");
    cmd.args(["run", "-s", "--no-progress", script]);
    cmd.current_dir(dir);
    configure(&mut cmd, config);
    cmd
}

/// Shared policy: stdin closed, stdout piped to the parser, stderr passed
/// through only in verbose mode. `kill_on_drop` makes dropping an
/// abandoned task a best-effort abort of its child.
fn configure(cmd: &mut Command, config: &RunConfig) {
    cmd.kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(if config.verbose {
            Stdio::inherit()
        } else {
            Stdio::null()
        });

    for (key, value) in config.child_env() {
        cmd.env(key, value);
    }
}

#![allow(dead_code)]
// Shared test helpers for integration tests
use std::fs;
use std::path::{Path, PathBuf};

/// Writes a `.js` fixture that is really a POSIX shell script emitting the
/// given TAP lines. Tests run these with `--binary sh`, so no Node
/// toolchain is needed.
pub fn write_tap_script(dir: &Path, name: &str, tap: &str, exit_code: i32) -> PathBuf {
    write_delayed_tap_script(dir, name, tap, exit_code, 0)
}

/// Same as [`write_tap_script`], sleeping first so a task deliberately
/// finishes after its siblings.
pub fn write_delayed_tap_script(
    dir: &Path,
    name: &str,
    tap: &str,
    exit_code: i32,
    delay_secs: u32,
) -> PathBuf {
    let mut script = String::new();
    if delay_secs > 0 {
        script.push_str(&format!("sleep {delay_secs}\n"));
    }
    script.push_str("cat <<'EOF'\n");
    script.push_str(tap);
    if !tap.ends_with('\n') {
        script.push('\n');
    }
    script.push_str("EOF\n");
    script.push_str(&format!("exit {exit_code}\n"));

    let path = dir.join(name);
    fs::write(&path, script).expect("failed to write fixture script");
    path
}

/// Writes a minimal `package.json` with the given name and scripts, in
/// declaration order.
pub fn write_package(dir: &Path, package_name: Option<&str>, scripts: &[(&str, &str)]) {
    let mut script_map = serde_json::Map::new();
    for (name, command) in scripts {
        script_map.insert((*name).to_string(), serde_json::Value::String((*command).to_string()));
    }

    let mut manifest = serde_json::Map::new();
    if let Some(name) = package_name {
        manifest.insert("name".to_string(), serde_json::Value::String(name.to_string()));
    }
    manifest.insert("scripts".to_string(), serde_json::Value::Object(script_map));

    let json = serde_json::to_string_pretty(&serde_json::Value::Object(manifest))
        .expect("failed to serialize manifest");
    fs::write(dir.join("package.json"), json).expect("failed to write package.json");
}

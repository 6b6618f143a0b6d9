//! End-to-end tests of the merge engine against real child processes.
//!
//! Fixture "binaries" are shell scripts run with `binary = "sh"`, so the
//! full spawn → parse → multiplex → aggregate pipeline is exercised
//! without any Node toolchain.

mod common;

use tempfile::tempdir;

use tap_mux::core::config::RunConfig;
use tap_mux::core::merge;
use tap_mux::core::models::{RunSummary, Task, TaskKind, TaskMeta};

fn sh_config(basedir: &std::path::Path, patterns: &[&str]) -> RunConfig {
    RunConfig {
        patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
        basedir: basedir.to_path_buf(),
        binary: "sh".to_string(),
        ..RunConfig::default()
    }
}

async fn merge_to_string(config: &RunConfig) -> (String, RunSummary) {
    let mut out = Vec::new();
    let summary = merge::run(config, &mut out).await.expect("merge failed");
    (String::from_utf8(out).expect("output not utf-8"), summary)
}

#[tokio::test]
async fn single_passing_binary_produces_the_canonical_document() {
    let dir = tempdir().unwrap();
    common::write_tap_script(dir.path(), "a.js", "1..1\nok 1 x\n", 0);

    let config = sh_config(dir.path(), &["a.js"]);
    let (output, summary) = merge_to_string(&config).await;

    assert_eq!(
        output,
        "TAP version 13\nok 1 x\n1..1\n# tests 1\n# pass 1\n\n# ok\n"
    );
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn empty_expansion_produces_an_empty_passing_document() {
    let dir = tempdir().unwrap();
    let config = sh_config(dir.path(), &["*.js"]);
    let (output, summary) = merge_to_string(&config).await;

    assert_eq!(output, "TAP version 13\n1..0\n# tests 0\n# pass 0\n\n# ok\n");
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn output_follows_resolution_order_not_completion_order() {
    let dir = tempdir().unwrap();
    // The first task finishes well after the second; its output must still
    // come first, renumbered first.
    common::write_delayed_tap_script(dir.path(), "slow.js", "1..1\nok 1 slow\n", 0, 1);
    common::write_tap_script(dir.path(), "fast.js", "1..1\nok 1 fast\n", 0);

    let config = sh_config(dir.path(), &["slow.js", "fast.js"]);
    let (output, summary) = merge_to_string(&config).await;

    assert_eq!(
        output,
        "TAP version 13\nok 1 slow\nok 2 fast\n1..2\n# tests 2\n# pass 2\n\n# ok\n"
    );
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn reruns_are_byte_identical() {
    let dir = tempdir().unwrap();
    common::write_tap_script(dir.path(), "a.js", "1..2\nok 1 a\nok 2 b\n", 0);
    common::write_tap_script(dir.path(), "b.js", "1..1\nok 1 c\n", 0);

    let config = sh_config(dir.path(), &["a.js", "b.js"]);
    let (first, _) = merge_to_string(&config).await;
    let (second, _) = merge_to_string(&config).await;

    assert_eq!(first, second);
}

mod crash_synthesis {
    use super::*;

    #[tokio::test]
    async fn uncovered_nonzero_exit_becomes_one_failure() {
        let dir = tempdir().unwrap();
        common::write_tap_script(dir.path(), "crash.js", "1..1\nok 1 x\n", 1);

        let config = sh_config(dir.path(), &["crash.js"]);
        let (output, summary) = merge_to_string(&config).await;

        assert_eq!(
            output,
            "TAP version 13\nok 1 x\nnot ok 2 crash.js exited with code 1\n\
             1..2\n# tests 2\n# pass 1\n# fail 1\n"
        );
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn a_crash_after_a_failing_trailer_is_not_double_counted() {
        let dir = tempdir().unwrap();
        common::write_tap_script(dir.path(), "fail.js", "1..2\nok 1 a\nnot ok 2 b\n", 1);

        let config = sh_config(dir.path(), &["fail.js"]);
        let (output, summary) = merge_to_string(&config).await;

        assert_eq!(
            output,
            "TAP version 13\nok 1 a\nnot ok 2 b\n1..2\n# tests 2\n# pass 1\n# fail 1\n"
        );
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn a_silent_crash_cannot_vanish() {
        let dir = tempdir().unwrap();
        common::write_tap_script(dir.path(), "empty.js", "", 3);

        let config = sh_config(dir.path(), &["empty.js"]);
        let (output, summary) = merge_to_string(&config).await;

        assert_eq!(
            output,
            "TAP version 13\nnot ok 1 empty.js exited with code 3\n\
             1..1\n# tests 1\n# pass 0\n# fail 1\n"
        );
        assert_eq!(summary.exit_code(), 1);
    }
}

#[tokio::test]
async fn fail_fast_withholds_later_tasks_from_the_document() {
    let dir = tempdir().unwrap();
    common::write_tap_script(dir.path(), "bad.js", "1..1\nnot ok 1 bad\n", 1);
    common::write_tap_script(dir.path(), "good.js", "1..1\nok 1 good\n", 0);

    let mut config = sh_config(dir.path(), &["bad.js", "good.js"]);
    config.fail_fast = true;

    let (output, summary) = merge_to_string(&config).await;

    assert_eq!(
        output,
        "TAP version 13\nnot ok 1 bad\n1..1\n# tests 1\n# pass 0\n# fail 1\n"
    );
    assert_eq!(summary.exit_code(), 1);
}

mod missing_scripts {
    use super::*;

    #[tokio::test]
    async fn an_unmatched_pattern_fails_by_default() {
        let dir = tempdir().unwrap();
        common::write_package(dir.path(), Some("pkg"), &[("build", "true")]);

        let mut config = sh_config(dir.path(), &["."]);
        config.run = vec!["nope".to_string()];

        let (output, summary) = merge_to_string(&config).await;

        assert_eq!(
            output,
            "TAP version 13\n# -\nnot ok 1 # TODO no npm script(s) matching \"nope\"\n\
             1..1\n# tests 1\n# pass 0\n# fail 1\n"
        );
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn ignore_missing_downgrades_to_a_skip() {
        let dir = tempdir().unwrap();
        common::write_package(dir.path(), Some("pkg"), &[("build", "true")]);

        let mut config = sh_config(dir.path(), &["."]);
        config.run = vec!["nope".to_string()];
        config.ignore_missing = true;

        let (output, summary) = merge_to_string(&config).await;

        assert_eq!(
            output,
            "TAP version 13\n# -\nok 1 # skip no npm script(s) matching \"nope\"\n\
             1..1\n# tests 1\n# pass 1\n\n# ok\n"
        );
        assert_eq!(summary.exit_code(), 0);
    }
}

mod formatting {
    use super::*;

    /// Builds a binary task by hand so a label prefix can be attached
    /// without going through a package manifest.
    fn prefixed_task(file: std::path::PathBuf, name: &str, prefix: &str) -> Task {
        Task {
            kind: TaskKind::Binary { file },
            meta: TaskMeta {
                name: name.to_string(),
                prefix: prefix.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn comments_gain_the_task_prefix_and_trailers_are_filtered() {
        let dir = tempdir().unwrap();
        let file = common::write_tap_script(
            dir.path(),
            "a.js",
            "# name\nok 1 test\n1..1\n# tests 1\n# pass 1\n# ok\n",
            0,
        );

        let config = sh_config(dir.path(), &[]);
        let tasks = vec![prefixed_task(file, "a.js", ":a › ")];

        let mut out = Vec::new();
        let summary = merge::merge_tasks(&config, tasks, &mut out).await.unwrap();
        let output = String::from_utf8(out).unwrap();

        assert_eq!(
            output,
            "TAP version 13\n# :a › name\nok 1 test\n1..1\n# tests 1\n# pass 1\n\n# ok\n"
        );
        assert_eq!(summary.exit_code(), 0);
    }

    #[tokio::test]
    async fn diagnostic_blocks_are_reindented_beneath_their_assertion() {
        let dir = tempdir().unwrap();
        common::write_tap_script(
            dir.path(),
            "fail.js",
            "1..1\nnot ok 1 fail\n  ---\n    operator: ok\n    expected: true\n  ...\n",
            1,
        );

        let config = sh_config(dir.path(), &["fail.js"]);
        let (output, summary) = merge_to_string(&config).await;

        assert_eq!(
            output,
            "TAP version 13\nnot ok 1 fail\n  ---\n    operator: ok\n    expected: true\n  ...\n\
             1..1\n# tests 1\n# pass 0\n# fail 1\n"
        );
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn a_plan_count_mismatch_gets_one_synthetic_failure() {
        let dir = tempdir().unwrap();
        common::write_tap_script(dir.path(), "short.js", "1..2\nok 1 x\n", 0);

        let config = sh_config(dir.path(), &["short.js"]);
        let (output, summary) = merge_to_string(&config).await;

        assert_eq!(
            output,
            "TAP version 13\nok 1 x\nnot ok 2 plan != count\n\
             1..2\n# tests 2\n# pass 1\n# fail 1\n"
        );
        assert_eq!(summary.exit_code(), 1);
    }

    #[tokio::test]
    async fn a_bailout_poisons_the_run_without_counting_a_failure() {
        let dir = tempdir().unwrap();
        common::write_tap_script(dir.path(), "bail.js", "ok 1 x\nBail out! broken\n", 0);

        let config = sh_config(dir.path(), &["bail.js"]);
        let (output, summary) = merge_to_string(&config).await;

        assert_eq!(
            output,
            "TAP version 13\nok 1 x\nBail out! broken\n1..1\n# tests 1\n# pass 1\n# fail 0\n"
        );
        assert_eq!(summary.exit_code(), 1);
    }
}

// src/cli.rs
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::{env, path::PathBuf};

use crate::core::config::{self, RunConfig};
use crate::core::merge;

fn build_cli() -> Command {
    Command::new("tap-mux")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Merge TAP output of multiple test scripts and npm package scripts into a single document")
        .arg(
            Arg::new("patterns")
                .help("Glob patterns of targets to run: .js files or package directories")
                .value_name("PATTERN")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("run")
                .short('r')
                .long("run")
                .help("Pattern(s) matched against declared package scripts (default: test)")
                .value_name("PATTERN")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("binary")
                .long("binary")
                .visible_alias("bin")
                .help("Interpreter used to run .js targets")
                .value_name("BINARY")
                .default_value("node")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("cwd")
                .short('c')
                .long("cwd")
                .help("Working directory for binary targets")
                .value_name("DIR")
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("basedir")
                .short('b')
                .long("basedir")
                .help("Base directory against which glob patterns are expanded")
                .value_name("DIR")
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .short('e')
                .long("verbose")
                .visible_alias("stderr")
                .help("Pass child stderr through and enable diagnostics")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("fail-fast")
                .short('f')
                .long("fail-fast")
                .help("Stop merging further task output after the first failure")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("ignore-missing")
                .short('i')
                .long("ignore-missing")
                .help("Report missing package scripts as skipped instead of failed")
                .action(ArgAction::SetTrue),
        )
}

/// Parses the command line, runs the merge against stdout and returns the
/// process exit code.
pub async fn run() -> Result<u8> {
    let matches = build_cli().get_matches();

    let patterns = matches
        .get_many::<String>("patterns")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    let run = matches
        .get_many::<String>("run")
        .map(|v| v.cloned().collect())
        .unwrap_or_else(|| vec!["test".to_string()]);

    let config = RunConfig {
        patterns,
        run,
        cwd: matches.get_one::<PathBuf>("cwd").cloned().unwrap_or_default(),
        basedir: matches
            .get_one::<PathBuf>("basedir")
            .cloned()
            .unwrap_or_default(),
        binary: matches
            .get_one::<String>("binary")
            .cloned()
            .unwrap_or_else(|| "node".to_string()),
        verbose: flag_or_env(&matches, "verbose", config::ENV_VERBOSE),
        fail_fast: flag_or_env(&matches, "fail-fast", config::ENV_FAIL_FAST),
        ignore_missing: flag_or_env(&matches, "ignore-missing", config::ENV_IGNORE_MISSING),
    };

    if config.verbose {
        init_tracing();
    }

    let mut stdout = tokio::io::stdout();
    let summary = merge::run(&config, &mut stdout).await?;
    Ok(summary.exit_code())
}

/// A boolean option is on when its flag was given, or when the inherited
/// environment variable from a parent invocation says so.
fn flag_or_env(matches: &clap::ArgMatches, id: &str, key: &str) -> bool {
    matches.get_flag(id)
        || env::var(key)
            .map(|value| config::is_true(&value))
            .unwrap_or(false)
}

/// Diagnostics go to stderr so the document on stdout stays untouched;
/// without verbose, stderr stays silent and no subscriber is installed.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tap_mux=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

//! # Execution Unit Module / 执行单元模块
//!
//! Spawns one child process per task and pumps its stdout through the TAP
//! parser into a bounded per-task event channel. All tasks spawn up front
//! and run concurrently; ordering is restored downstream by the
//! multiplexer, and the bounded channels give it backpressure over these
//! producers.
//!
//! 为每个任务派生一个子进程，并将其 stdout 通过 TAP 解析器泵入有界的
//! 每任务事件通道。所有任务预先派生并发运行；顺序由下游的多路复用器
//! 恢复，有界通道为其提供对这些生产者的背压。

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::config::RunConfig;
use crate::core::models::{Task, TaskKind, TaskMeta};
use crate::core::tap::{TapEvent, TapParser};
use crate::infra::command;

/// Per-task event buffer; producers suspend once the multiplexer stops
/// draining them.
const EVENT_BUFFER: usize = 64;

/// Trailer comments every task emits about itself (`# ok`, `# tests N`,
/// `# pass N`, `# fail N`). The merge engine re-synthesizes these globally,
/// so the per-task copies are filtered out.
static TRAILER_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#\s+(ok|((tests|pass|fail)\s+\d+))\s*$").unwrap());

/// One task's event source as seen by the multiplexer.
pub enum TaskSource {
    /// A spawned child feeding events through its channel.
    Child(mpsc::Receiver<TapEvent>),
    /// A synthetic no-spawn outcome, emitted once.
    Missing(Option<String>),
}

/// A task's metadata plus its event source, in resolution order.
pub struct TaskStream {
    pub meta: TaskMeta,
    pub source: TaskSource,
}

/// Starts a task. Spawnable tasks get a reader spawned immediately;
/// missing tasks carry their reason and never touch the process table.
pub fn spawn_task(task: Task, config: &RunConfig, token: CancellationToken) -> TaskStream {
    let Task { kind, meta } = task;

    let cmd = match kind {
        TaskKind::Missing { reason } => {
            return TaskStream {
                meta,
                source: TaskSource::Missing(Some(reason)),
            };
        }
        TaskKind::Binary { file } => {
            debug!(binary = config.binary.as_str(), file = %file.display(), "spawn");
            command::binary_command(&file, config)
        }
        TaskKind::Script { dir, script } => {
            debug!(script = script.as_str(), dir = %dir.display(), "spawn npm run");
            command::script_command(&dir, &script, config)
        }
    };

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(pump(cmd, meta.clone(), tx, token));

    TaskStream {
        meta,
        source: TaskSource::Child(rx),
    }
}

/// Reads one child's stdout to completion, then reports its exit. The
/// parser adapter layer lives here: trailer comments are dropped, surviving
/// comments gain the task's label prefix, and blank extras disappear.
async fn pump(
    mut cmd: Command,
    meta: TaskMeta,
    tx: mpsc::Sender<TapEvent>,
    token: CancellationToken,
) {
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = tx
                .send(TapEvent::SpawnFailed {
                    error: e.to_string(),
                })
                .await;
            return;
        }
    };

    let Some(stdout) = child.stdout.take() else {
        let _ = tx
            .send(TapEvent::SpawnFailed {
                error: "failed to capture stdout".to_string(),
            })
            .await;
        return;
    };

    let mut parser = TapParser::new();
    let mut lines = BufReader::new(stdout).lines();
    let mut events = Vec::new();
    let mut nested_reported = false;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                // Merge aborted; dropping the child kills it best-effort.
                return;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => parser.feed(&line, &mut events),
                    // A read error ends the stream the same way EOF does.
                    Ok(None) | Err(_) => break,
                }
                if parser.saw_nested() && !nested_reported {
                    nested_reported = true;
                    warn!(task = meta.name.as_str(), "nested TAP documents are not supported; passing lines through");
                }
                if !forward(&mut events, &meta, &tx).await {
                    return;
                }
            }
        }
    }

    parser.finish(&mut events);
    if !forward(&mut events, &meta, &tx).await {
        return;
    }

    let code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(_) => -1,
    };
    let _ = tx.send(TapEvent::Exited { code }).await;
}

/// Applies the adapter filters and sends the drained events. Returns false
/// once the receiver is gone, which tells the pump to stop reading.
async fn forward(events: &mut Vec<TapEvent>, meta: &TaskMeta, tx: &mpsc::Sender<TapEvent>) -> bool {
    for event in events.drain(..) {
        let event = match event {
            TapEvent::Comment(comment) => {
                if TRAILER_COMMENT.is_match(&comment) {
                    continue;
                }
                TapEvent::Comment(prefixed(&comment, &meta.prefix))
            }
            TapEvent::Extra(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                TapEvent::Extra(line)
            }
            other => other,
        };
        if tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}

/// Rewrites `# comment` to `# <prefix>comment`, leaving unlabeled tasks'
/// comments untouched.
fn prefixed(comment: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return comment.to_string();
    }
    let rest = comment.strip_prefix('#').unwrap_or(comment);
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    format!("# {prefix}{rest}")
}

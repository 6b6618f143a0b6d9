//! # Merge Engine Module / 合并引擎模块
//!
//! The aggregation engine: consumes the multiplexer's ordered event stream,
//! assigns the single global sequence of assertion ids, accumulates the
//! run's counters and formats the merged TAP document. One dispatch loop,
//! one `RunState` writer; partial failures become document content rather
//! than aborting the merge.
//!
//! 聚合引擎：消费多路复用器的有序事件流，分配全局唯一的断言 id 序列，
//! 累积运行计数器并格式化合并后的 TAP 文档。一个分发循环、一个
//! `RunState` 写入者；局部失败成为文档内容而不会中止合并。

use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::core::config::RunConfig;
use crate::core::execution::{self, TaskStream};
use crate::core::models::{RunSummary, Task, TaskMeta};
use crate::core::mux::OrderedMux;
use crate::core::resolver;
use crate::core::tap::{TapAssertion, TapEvent, TapPlan, TaskSummary};

/// Resolves the configured targets and merges their output into `out`.
/// This is the library entry point; the CLI passes stdout.
pub async fn run<W>(config: &RunConfig, out: &mut W) -> Result<RunSummary>
where
    W: AsyncWrite + Unpin,
{
    let tasks = resolver::resolve_tasks(config).await?;
    merge_tasks(config, tasks, out).await
}

/// Spawns every task up front and merges their event streams in resolution
/// order. Each invocation owns its `RunState`, so independent merges can
/// run side by side in one process.
pub async fn merge_tasks<W>(config: &RunConfig, tasks: Vec<Task>, out: &mut W) -> Result<RunSummary>
where
    W: AsyncWrite + Unpin,
{
    let token = CancellationToken::new();
    let streams: Vec<TaskStream> = tasks
        .into_iter()
        .map(|task| execution::spawn_task(task, config, token.clone()))
        .collect();

    let mut state = RunState::new(config.fail_fast, config.ignore_missing);
    write_line(out, "TAP version 13").await?;

    let mut mux = OrderedMux::new(streams);
    while let Some((meta, event)) = mux.next_event().await {
        state.dispatch(meta, event, out).await?;
        if state.aborted {
            // Cooperative fail-fast: stop merging, tell producers to stop
            // reading. In-flight children are not waited for.
            token.cancel();
            break;
        }
    }

    state.finalize(out).await?;
    out.flush().await?;
    Ok(state.summary())
}

/// Mutable state of one merge run. Single writer: only the dispatch loop
/// above touches it, which the ordered stream guarantees by construction.
struct RunState {
    fail_fast: bool,
    ignore_missing: bool,
    /// Last assigned global id; ids are gapless and 1-based.
    id: u64,
    planned: u64,
    passed: u64,
    failed: u64,
    ok: bool,
    aborted: bool,
    /// Failing assertions seen in the current task.
    task_failed: u64,
    /// Whether the current task delivered plan-backed assertions.
    task_had_tests: bool,
}

impl RunState {
    fn new(fail_fast: bool, ignore_missing: bool) -> Self {
        Self {
            fail_fast,
            ignore_missing,
            id: 0,
            planned: 0,
            passed: 0,
            failed: 0,
            ok: true,
            aborted: false,
            task_failed: 0,
            task_had_tests: false,
        }
    }

    async fn dispatch<W>(&mut self, meta: &TaskMeta, event: TapEvent, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        match event {
            TapEvent::Assertion(assertion) => self.on_assertion(assertion, out).await,
            TapEvent::Comment(comment) => write_line(out, &comment).await,
            TapEvent::Extra(line) => write_line(out, &line).await,
            TapEvent::Bailout(reason) => write_line(out, &format!("Bail out! {reason}")).await,
            TapEvent::PlanComplete(summary) => {
                self.on_plan_complete(summary);
                Ok(())
            }
            TapEvent::Exited { code } => self.on_exited(meta, code, out).await,
            TapEvent::SpawnFailed { error } => self.on_spawn_failed(meta, &error, out).await,
            TapEvent::Missing { reason } => self.on_missing(meta, &reason, out).await,
        }
    }

    /// Renumbers one assertion into the global sequence. Counters are not
    /// touched here; they fold in per task summary, so a task is counted
    /// exactly once.
    async fn on_assertion<W>(&mut self, assertion: TapAssertion, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.id += 1;
        if !assertion.ok {
            self.task_failed += 1;
        }

        let mut line = String::new();
        line.push_str(if assertion.ok { "ok" } else { "not ok" });
        line.push_str(&format!(" {}", self.id));
        if !assertion.name.is_empty() {
            line.push(' ');
            line.push_str(&assertion.name);
        }
        push_directive(&mut line, "skip", assertion.skip.as_deref());
        push_directive(&mut line, "todo", assertion.todo.as_deref());
        write_line(out, &line).await?;

        if let Some(diag) = assertion.diag {
            write_line(out, "  ---").await?;
            for inner in diag {
                write_line(out, &format!("    {inner}")).await?;
            }
            write_line(out, "  ...").await?;
        }
        Ok(())
    }

    /// Folds a completed task's totals into the run counters. A task that
    /// never planned (it errored first) gets a plan synthesized from its
    /// observed count.
    fn on_plan_complete(&mut self, summary: TaskSummary) {
        let plan = summary.plan.unwrap_or(TapPlan {
            start: 1,
            end: summary.count,
        });
        if summary.plan.is_some() && summary.count > 0 {
            self.task_had_tests = true;
        }

        self.planned += plan.len();
        self.passed += summary.pass;
        self.failed += summary.fail();
        if !summary.ok {
            self.ok = false;
        }
    }

    /// A nonzero exit that no failing assertion accounts for becomes one
    /// synthetic failure, so silent crashes cannot vanish from the
    /// document; a crash after a normal failing trailer is not counted
    /// twice.
    async fn on_exited<W>(&mut self, meta: &TaskMeta, code: i32, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if code != 0 {
            if !self.task_had_tests || self.task_failed == 0 {
                self.fail(&format!("{} exited with code {}", meta.name, code), out)
                    .await?;
            }
            if self.fail_fast {
                self.aborted = true;
            }
        }
        self.end_task();
        Ok(())
    }

    async fn on_spawn_failed<W>(&mut self, meta: &TaskMeta, error: &str, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.fail(&format!("{} failed to spawn: {error}", meta.name), out)
            .await?;
        if self.fail_fast {
            self.aborted = true;
        }
        self.end_task();
        Ok(())
    }

    /// One assertion for a task that never spawned: skipped when missing
    /// scripts are ignored, a failing TODO otherwise.
    async fn on_missing<W>(&mut self, meta: &TaskMeta, reason: &str, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        write_line(out, &format!("# {}-", meta.prefix)).await?;

        let id = self.assign(self.ignore_missing);
        let line = if self.ignore_missing {
            format!("ok {id} # skip {reason}")
        } else {
            format!("not ok {id} # TODO {reason}")
        };
        write_line(out, &line).await?;
        self.end_task();
        Ok(())
    }

    /// Closes the document: reconciles the plan, emits the trailer.
    async fn finalize<W>(&mut self, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if self.planned != self.id {
            self.fail("plan != count", out).await?;
        }

        write_line(out, &format!("1..{}", self.id)).await?;
        write_line(out, &format!("# tests {}", self.id)).await?;
        write_line(out, &format!("# pass {}", self.passed)).await?;

        if self.ok && self.failed == 0 {
            write_line(out, "").await?;
            write_line(out, "# ok").await?;
        } else {
            write_line(out, &format!("# fail {}", self.failed)).await?;
        }
        Ok(())
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            tests: self.id,
            passed: self.passed,
            failed: self.failed,
            ok: self.ok,
        }
    }

    /// Assigns an id to a synthetic assertion, counting it immediately
    /// (synthetics have no task summary to fold in later).
    fn assign(&mut self, pass: bool) -> u64 {
        self.planned += 1;
        if pass {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.id += 1;
        self.id
    }

    async fn fail<W>(&mut self, message: &str, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let id = self.assign(false);
        write_line(out, &format!("not ok {id} {}", message.trim())).await
    }

    fn end_task(&mut self) {
        self.task_failed = 0;
        self.task_had_tests = false;
    }
}

fn push_directive(line: &mut String, keyword: &str, directive: Option<&str>) {
    if let Some(message) = directive {
        line.push_str(" # ");
        line.push_str(keyword);
        if !message.is_empty() {
            line.push(' ');
            line.push_str(message);
        }
    }
}

async fn write_line<W>(out: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}

//! # TAP Parser Module / TAP 解析器模块
//!
//! An incremental, line-oriented parser for the Test Anything Protocol.
//! Each child's stdout is fed through one `TapParser`, which emits a small
//! closed set of [`TapEvent`] variants in arrival order; the merge engine
//! consumes them through a single dispatch loop.
//!
//! 面向行的增量 TAP 协议解析器。每个子进程的 stdout 都通过一个
//! `TapParser`，它按到达顺序发出一组封闭的 [`TapEvent`] 变体；
//! 合并引擎通过单个分发循环消费它们。

/// Declared range of expected assertion ids for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapPlan {
    pub start: u64,
    pub end: u64,
}

impl TapPlan {
    /// Number of assertions the plan declares; `1..0` declares none.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// One parsed assertion line, with any attached diagnostic block.
///
/// The child's own id is discarded at parse time; the merge engine assigns
/// the global id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapAssertion {
    pub ok: bool,
    /// Assertion name, empty when the line carried none.
    pub name: String,
    /// `# skip` directive; `Some("")` for a bare directive.
    pub skip: Option<String>,
    /// `# todo` directive; `Some("")` for a bare directive.
    pub todo: Option<String>,
    /// Dedented inner lines of the YAML diagnostic block, if one followed.
    pub diag: Option<Vec<String>>,
}

/// Totals for one task's stream, emitted once the stream ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
    /// Observed assertion count.
    pub count: u64,
    /// Assertions whose ok flag was set.
    pub pass: u64,
    /// False on any failed assertion, a bailout, or a plan/count mismatch.
    pub ok: bool,
    /// The declared plan, absent when the task never planned.
    pub plan: Option<TapPlan>,
}

impl TaskSummary {
    pub fn fail(&self) -> u64 {
        self.count - self.pass
    }
}

/// The closed event set flowing from each task to the merge engine.
///
/// The first five variants come from the parser; the rest are produced by
/// the execution unit (`Exited`, `SpawnFailed`) and the resolver
/// (`Missing`) so that every task outcome travels the same ordered stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapEvent {
    Assertion(TapAssertion),
    /// A passed-through comment line, already label-prefixed.
    Comment(String),
    /// A non-protocol line passed through verbatim.
    Extra(String),
    Bailout(String),
    PlanComplete(TaskSummary),
    /// The child exited; always the final event of a spawned task.
    Exited { code: i32 },
    /// The child could not be spawned at all.
    SpawnFailed { error: String },
    /// Synthetic no-spawn task: unmatched patterns or a degenerate script.
    Missing { reason: String },
}

/// Open diagnostic block state.
#[derive(Debug)]
struct DiagBlock {
    indent: String,
    lines: Vec<String>,
}

/// Incremental parser state for one task's stream.
#[derive(Debug, Default)]
pub struct TapParser {
    pending: Option<TapAssertion>,
    diag: Option<DiagBlock>,
    count: u64,
    pass: u64,
    fail: u64,
    plan: Option<TapPlan>,
    bailed: bool,
    nested: bool,
}

impl TapParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once an indented TAP sub-document has been detected. Nested
    /// documents are not merged; their lines pass through as extra output.
    pub fn saw_nested(&self) -> bool {
        self.nested
    }

    /// Feeds one line, appending any events it produces. An assertion is
    /// held back until the next line decides whether a diagnostic block
    /// belongs to it.
    pub fn feed(&mut self, line: &str, out: &mut Vec<TapEvent>) {
        if let Some(block) = self.diag.as_mut() {
            let trimmed = line.trim();
            if trimmed == "..." && line.starts_with(block.indent.as_str()) {
                let block = self.diag.take().unwrap();
                if let Some(assertion) = self.pending.as_mut() {
                    assertion.diag = Some(block.lines);
                }
                self.flush_pending(out);
            } else {
                block.lines.push(dedent(line, &block.indent));
            }
            return;
        }

        let indented = line.starts_with([' ', '\t']);
        let trimmed = line.trim();

        // An indented `---` right after an assertion opens its diagnostics.
        if indented && trimmed == "---" && self.pending.is_some() {
            let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
            self.diag = Some(DiagBlock {
                indent,
                lines: Vec::new(),
            });
            return;
        }

        self.flush_pending(out);

        if indented {
            // Indented protocol lines are a nested TAP document.
            if parse_assertion(trimmed).is_some() || parse_plan(trimmed).is_some() {
                self.nested = true;
            }
            out.push(TapEvent::Extra(line.to_string()));
            return;
        }

        if trimmed.is_empty() || is_version_header(line) {
            return;
        }

        if let Some(assertion) = parse_assertion(line) {
            self.count += 1;
            if assertion.ok {
                self.pass += 1;
            } else {
                self.fail += 1;
            }
            self.pending = Some(assertion);
        } else if let Some(plan) = parse_plan(line) {
            // The first plan wins; a trailing duplicate is ignored.
            self.plan.get_or_insert(plan);
        } else if let Some(reason) = line.strip_prefix("Bail out!") {
            self.bailed = true;
            out.push(TapEvent::Bailout(reason.trim().to_string()));
        } else if line.starts_with('#') {
            out.push(TapEvent::Comment(trimmed.to_string()));
        } else {
            out.push(TapEvent::Extra(line.to_string()));
        }
    }

    /// Ends the stream: flushes held state and emits `PlanComplete`.
    pub fn finish(&mut self, out: &mut Vec<TapEvent>) {
        if let Some(block) = self.diag.take() {
            // Unterminated diagnostic block; keep what was captured.
            if let Some(assertion) = self.pending.as_mut() {
                assertion.diag = Some(block.lines);
            }
        }
        self.flush_pending(out);

        let plan_ok = self.plan.is_none_or(|p| p.len() == self.count);
        out.push(TapEvent::PlanComplete(TaskSummary {
            count: self.count,
            pass: self.pass,
            ok: self.fail == 0 && !self.bailed && plan_ok,
            plan: self.plan,
        }));
    }

    fn flush_pending(&mut self, out: &mut Vec<TapEvent>) {
        if let Some(assertion) = self.pending.take() {
            out.push(TapEvent::Assertion(assertion));
        }
    }
}

fn is_version_header(line: &str) -> bool {
    line.strip_prefix("TAP version ")
        .is_some_and(|v| !v.trim().is_empty() && v.trim().chars().all(|c| c.is_ascii_digit()))
}

/// Strips a closed block's base indentation plus the conventional two extra
/// spaces of its content lines.
fn dedent(line: &str, indent: &str) -> String {
    let two_deeper = format!("{indent}  ");
    line.strip_prefix(two_deeper.as_str())
        .or_else(|| line.strip_prefix(indent))
        .unwrap_or(line.trim_start())
        .to_string()
}

/// Parses `ok` / `not ok` lines: optional id, optional `- ` marker, name up
/// to an unescaped `#`, then `skip`/`todo` directives (case-insensitive).
fn parse_assertion(line: &str) -> Option<TapAssertion> {
    let (ok, rest) = if let Some(rest) = line.strip_prefix("not ok") {
        (false, rest)
    } else if let Some(rest) = line.strip_prefix("ok") {
        (true, rest)
    } else {
        return None;
    };

    // Reject words like "okay"; the keyword must end the line or be
    // followed by whitespace.
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }

    // Consume the child's own id only when it stands alone; a name that
    // merely begins with digits stays intact.
    let rest = rest.trim_start();
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let after = &rest[digits..];
    let rest = if digits > 0 && (after.is_empty() || after.starts_with([' ', '\t', '#'])) {
        after
    } else {
        rest
    };
    let rest = rest.trim_start();
    let rest = rest.strip_prefix("- ").unwrap_or(rest);

    let (name_part, directive_part) = match rest.split_once('#') {
        Some((name, directive)) => (name, Some(directive)),
        None => (rest, None),
    };

    let mut assertion = TapAssertion {
        ok,
        name: name_part.trim().to_string(),
        ..TapAssertion::default()
    };

    if let Some(directive) = directive_part {
        let directive = directive.trim();
        let keyword = directive.get(..4).unwrap_or_default();
        let bounded = match directive.len() {
            0..4 => false,
            4 => true,
            _ => directive.as_bytes()[4].is_ascii_whitespace(),
        };
        if bounded && keyword.eq_ignore_ascii_case("skip") {
            assertion.skip = Some(directive[4..].trim().to_string());
        } else if bounded && keyword.eq_ignore_ascii_case("todo") {
            assertion.todo = Some(directive[4..].trim().to_string());
        }
    }

    Some(assertion)
}

/// Parses a `start..end` plan line, tolerating a trailing comment.
fn parse_plan(line: &str) -> Option<TapPlan> {
    let body = match line.split_once('#') {
        Some((body, _)) => body.trim(),
        None => line.trim(),
    };
    let (start, end) = body.split_once("..")?;
    let start: u64 = start.trim().parse().ok()?;
    let end: u64 = end.trim().parse().ok()?;
    Some(TapPlan { start, end })
}

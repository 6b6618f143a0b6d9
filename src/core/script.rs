//! # Script Matcher Module / 脚本匹配模块
//!
//! Matches run patterns against the script names a package declares. Script
//! names form a `:`-delimited namespace (`test:unit:fast`), so this is a
//! dedicated path matcher, not filesystem globbing: the separator differs
//! and `**` spans namespace levels, not directories.
//!
//! 将运行模式与包声明的脚本名称进行匹配。脚本名称构成以 `:` 分隔的
//! 命名空间（`test:unit:fast`），因此这是一个专用的路径匹配器，而非
//! 文件系统通配：分隔符不同，且 `**` 跨越的是命名空间层级而非目录。

/// Separator used when composing task label prefixes.
pub const SEP: &str = " › ";

/// The placeholder npm writes into a fresh `package.json`; running it is
/// always a failure, so it is treated the same as a missing command.
const DEFAULT_NPM_TEST: &str = "echo \"Error: no test specified\" && exit 1";

/// A compiled run pattern. Holds one segment list per brace alternative.
#[derive(Debug, Clone)]
pub struct ScriptPattern {
    raw: String,
    alternatives: Vec<Vec<String>>,
}

impl ScriptPattern {
    pub fn new(pattern: &str) -> Self {
        let alternatives = expand_braces(pattern)
            .into_iter()
            .map(|alt| segments(&alt))
            .collect();
        Self {
            raw: pattern.to_string(),
            alternatives,
        }
    }

    /// The pattern as written, for "no npm script(s) matching" reporting.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern matches the given declared script name.
    pub fn matches(&self, name: &str) -> bool {
        let name_segments = segments(name);
        self.alternatives
            .iter()
            .any(|alt| match_segments(alt, &name_segments))
    }
}

/// Outcome of matching all run patterns against one package's script names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMatch {
    /// Deduplicated matched names, first-match order across all patterns.
    pub run: Vec<String>,
    /// Patterns that matched nothing, in declared order.
    pub unmatched: Vec<String>,
}

/// Matches every pattern against every declared script name, accumulating
/// matches per pattern in declared order.
pub fn match_script_names(patterns: &[ScriptPattern], names: &[&str]) -> ScriptMatch {
    let mut run: Vec<String> = Vec::new();
    let mut unmatched = Vec::new();

    for pattern in patterns {
        let mut hit = false;
        for name in names {
            if pattern.matches(name) {
                hit = true;
                if !run.iter().any(|r| r == name) {
                    run.push((*name).to_string());
                }
            }
        }
        if !hit {
            unmatched.push(pattern.raw().to_string());
        }
    }

    ScriptMatch { run, unmatched }
}

/// Longest common literal prefix of the matched names, in bytes. A single
/// match is its own prefix, so its subtitle strips to empty.
pub fn common_prefix_len(names: &[String]) -> usize {
    let Some(first) = names.first() else {
        return 0;
    };
    let mut len = first.len();
    for name in &names[1..] {
        let shared = first
            .bytes()
            .zip(name.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        len = len.min(shared);
    }
    // Back off to a char boundary; the shared bytes are identical across
    // all names, so a boundary in one is a boundary in every name.
    while !first.is_char_boundary(len) {
        len -= 1;
    }
    len
}

/// A command that cannot meaningfully run: absent, non-string, blank, or
/// npm's auto-generated failing placeholder.
pub fn is_degenerate_command(command: Option<&str>) -> bool {
    match command {
        None => true,
        Some(cmd) => {
            let cmd = cmd.trim();
            cmd.is_empty() || cmd == DEFAULT_NPM_TEST
        }
    }
}

/// Composes a task's comment-label prefix from the parts that carry
/// information. The package name (or its relative path) is included only
/// when the package is not the run's base directory itself.
pub fn label_prefix(relative: &str, package_name: Option<&str>, subtitle: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    if !relative.is_empty() {
        parts.push(package_name.filter(|n| !n.is_empty()).unwrap_or(relative));
    }
    if !subtitle.is_empty() {
        parts.push(subtitle);
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{}{}", parts.join(SEP), SEP)
    }
}

/// Formats the reason attached to the synthetic task for unmatched patterns.
pub fn unmatched_reason(patterns: &[String]) -> String {
    let quoted: Vec<String> = patterns.iter().map(|p| format!("{p:?}")).collect();
    format!("no npm script(s) matching {}", quoted.join(", "))
}

/// Formats the reason attached to a degenerate script's synthetic task.
pub fn degenerate_reason(script: &str) -> String {
    format!("undefined, empty or invalid npm script {script:?}")
}

/// Splits a script name or pattern into namespace segments. `:`, `/` and
/// `\` are interchangeable separators; runs of them collapse.
fn segments(name: &str) -> Vec<String> {
    name.split(|c| c == ':' || c == '/' || c == '\\')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expands brace alternation groups (`a:{b,c}` → `a:b`, `a:c`). One level,
/// no nesting; multiple groups expand left to right.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let Some(close) = pattern[open..].find('}').map(|i| open + i) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];

    pattern[open + 1..close]
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}

/// Segment-list matching. `**` as a whole segment consumes one or more name
/// segments (descendants only); `*` within a segment spans any substring.
fn match_segments(pattern: &[String], name: &[String]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((head, rest)) if head == "**" => {
            (1..=name.len()).any(|taken| match_segments(rest, &name[taken..]))
        }
        Some((head, rest)) => match name.split_first() {
            Some((first, remaining)) => {
                segment_matches(head, first) && match_segments(rest, remaining)
            }
            None => false,
        },
    }
}

/// Single-segment wildcard matching, `*` only.
fn segment_matches(pattern: &str, text: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == text,
        Some((before, after)) => {
            text.len() >= before.len()
                && text.starts_with(before)
                && suffix_matches(after, &text[before.len()..])
        }
    }
}

/// Matches the remainder of a segment pattern after a `*`, letting the star
/// absorb any run of characters.
fn suffix_matches(pattern: &str, text: &str) -> bool {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .any(|skip| segment_matches(pattern, &text[skip..]))
}

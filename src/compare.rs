//! Divergence reporting over two on-disk renderings.
//!
//! Two comparators implement the same capability: one decides (CI gate), one
//! hands the pair to a human in an external viewer (development workflow).
use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use std::process::Command;

use crate::toolchain::split_command;

/// Maximum differing lines quoted in a diff before truncation.
const MAX_DIFF_LINES: usize = 20;

/// Decidable comparison outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Matched,
    Diverged { diff: String },
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Matched => write!(f, "matched"),
            Verdict::Diverged { .. } => write!(f, "diverged"),
        }
    }
}

/// Reports the difference between the expected rendering and the round-trip
/// rendering. Returns `None` when the comparison is not decidable (the
/// interactive viewer reports to a human, not to the harness).
pub trait Comparator {
    fn compare(&self, expected: &Path, actual: &Path) -> Result<Option<Verdict>>;
}

/// Programmatic equality check suitable for automated gating.
///
/// Line endings are normalized before comparison so a CRLF-writing toolchain
/// does not diverge from an LF round-trip on every line.
pub struct EqualityComparator;

impl Comparator for EqualityComparator {
    fn compare(&self, expected: &Path, actual: &Path) -> Result<Option<Verdict>> {
        let expected_text = read_normalized(expected)?;
        let actual_text = read_normalized(actual)?;
        if expected_text == actual_text {
            return Ok(Some(Verdict::Matched));
        }
        let diff = render_line_diff(&expected_text, &actual_text);
        Ok(Some(Verdict::Diverged { diff }))
    }
}

/// Launches an external visual diff tool on the two files and blocks until
/// the user closes it.
pub struct InteractiveComparator {
    argv: Vec<String>,
}

impl InteractiveComparator {
    pub fn from_command(command: &str) -> Result<Self> {
        let argv = split_command(command, "diff tool")?;
        Ok(Self { argv })
    }
}

impl Comparator for InteractiveComparator {
    fn compare(&self, expected: &Path, actual: &Path) -> Result<Option<Verdict>> {
        let program = which::which(&self.argv[0])
            .with_context(|| format!("resolve diff tool: {}", self.argv[0]))?;
        let status = Command::new(program)
            .args(&self.argv[1..])
            .arg(expected)
            .arg(actual)
            .status()
            .with_context(|| format!("launch diff tool: {}", self.argv[0]))?;
        // Many viewers exit non-zero to signal "files differ"; the verdict
        // belongs to the reviewer either way, so only spawn failures are
        // errors here.
        if !status.success() {
            tracing::warn!(%status, tool = %self.argv[0], "diff tool exited non-zero");
        }
        Ok(None)
    }
}

fn read_normalized(path: &Path) -> Result<String> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(normalize_line_endings(&text))
}

pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Render a bounded line-oriented diff: `-` lines come from the expected
/// rendering, `+` lines from the round-trip rendering.
///
/// The diff is anchored on the common prefix and suffix, so a single inserted
/// or deleted line shows as one line instead of shifting everything after it.
fn render_line_diff(expected: &str, actual: &str) -> String {
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();

    let mut prefix = 0;
    while prefix < expected_lines.len()
        && prefix < actual_lines.len()
        && expected_lines[prefix] == actual_lines[prefix]
    {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < expected_lines.len() - prefix
        && suffix < actual_lines.len() - prefix
        && expected_lines[expected_lines.len() - 1 - suffix]
            == actual_lines[actual_lines.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mut out = String::new();
    let mut shown = 0;
    let mut truncated = false;
    for (idx, line) in expected_lines[prefix..expected_lines.len() - suffix]
        .iter()
        .enumerate()
    {
        if shown == MAX_DIFF_LINES {
            truncated = true;
            break;
        }
        out.push_str(&format!("{:>5} -{line}\n", prefix + idx + 1));
        shown += 1;
    }
    for (idx, line) in actual_lines[prefix..actual_lines.len() - suffix]
        .iter()
        .enumerate()
    {
        if shown == MAX_DIFF_LINES {
            truncated = true;
            break;
        }
        out.push_str(&format!("{:>5} +{line}\n", prefix + idx + 1));
        shown += 1;
    }
    if truncated {
        out.push_str("[... diff truncated ...]\n");
    }

    if out.is_empty() {
        // Same lines, different line endings or trailing newline.
        out.push_str("renderings differ only in line endings or trailing newline\n");
    }
    out
}

//! Run controller: build once, discover once, then drive each input through
//! the pipeline and comparator, isolating per-input failures.
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::compare::{Comparator, Verdict};
use crate::pipeline::{run_pipeline, ScratchSlots};
use crate::toolchain::Toolchain;

/// Terminal state of one input's run.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum InputStatus {
    /// Expected and round-trip renderings are identical.
    Matched,
    /// The renderings differ; `diff` is the bounded line diff.
    Diverged { diff: String },
    /// Interactive comparison; the verdict belongs to the human reviewer.
    Reviewed,
    /// A toolchain invocation or the comparator failed for this input.
    Failed { detail: String },
}

#[derive(Serialize, Debug, Clone)]
pub struct InputOutcome {
    pub input: PathBuf,
    #[serde(flatten)]
    pub status: InputStatus,
}

/// Machine-readable result of a whole harness run.
#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub profile: String,
    pub matched: usize,
    pub diverged: usize,
    pub reviewed: usize,
    pub failed: usize,
    pub outcomes: Vec<InputOutcome>,
}

impl RunReport {
    /// Overall verdict for automated gating: every input must have matched.
    /// Reviewed outcomes are excluded since they carry no decision.
    pub fn success(&self) -> bool {
        self.failed == 0 && self.diverged == 0
    }
}

/// Process every input in order. A failing input is recorded and logged, and
/// the batch moves on; only harness-level errors propagate.
pub fn run_all(
    toolchain: &dyn Toolchain,
    comparator: &dyn Comparator,
    inputs: &[PathBuf],
    profile: &str,
    slots: &ScratchSlots,
) -> Result<RunReport> {
    let mut outcomes = Vec::with_capacity(inputs.len());
    for input in inputs {
        let status = run_one(toolchain, comparator, input, profile, slots);
        match &status {
            InputStatus::Matched => println!("  {} matched", input.display()),
            InputStatus::Diverged { diff } => {
                println!("  {} DIVERGED", input.display());
                print!("{diff}");
            }
            InputStatus::Reviewed => println!("  {} reviewed", input.display()),
            InputStatus::Failed { detail } => {
                tracing::error!(input = %input.display(), detail = %detail, "input failed");
                println!("  {} FAILED: {detail}", input.display());
            }
        }
        outcomes.push(InputOutcome {
            input: input.clone(),
            status,
        });
    }

    let mut report = RunReport {
        profile: profile.to_string(),
        matched: 0,
        diverged: 0,
        reviewed: 0,
        failed: 0,
        outcomes,
    };
    for outcome in &report.outcomes {
        match outcome.status {
            InputStatus::Matched => report.matched += 1,
            InputStatus::Diverged { .. } => report.diverged += 1,
            InputStatus::Reviewed => report.reviewed += 1,
            InputStatus::Failed { .. } => report.failed += 1,
        }
    }
    Ok(report)
}

fn run_one(
    toolchain: &dyn Toolchain,
    comparator: &dyn Comparator,
    input: &Path,
    profile: &str,
    slots: &ScratchSlots,
) -> InputStatus {
    if let Err(err) = run_pipeline(toolchain, input, profile, slots) {
        return InputStatus::Failed {
            detail: format!("{err:#}"),
        };
    }
    println!("Comparing {}", input.display());
    match comparator.compare(&slots.expected, &slots.roundtrip) {
        Ok(Some(Verdict::Matched)) => InputStatus::Matched,
        Ok(Some(Verdict::Diverged { diff })) => InputStatus::Diverged { diff },
        Ok(None) => InputStatus::Reviewed,
        Err(err) => InputStatus::Failed {
            detail: format!("{err:#}"),
        },
    }
}

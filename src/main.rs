use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

mod cli;
mod compare;
mod discover;
mod pipeline;
mod run;
mod toolchain;

use cli::{Command, CompareArgs, RootArgs, RunArgs};
use compare::{Comparator, EqualityComparator, InteractiveComparator, Verdict};
use discover::discover_inputs;
use pipeline::ScratchSlots;
use run::{run_all, RunReport};
use toolchain::{build_toolchain, CommandToolchain};

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = RootArgs::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Compare(args) => cmd_compare(args),
    }
}

fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    if !args.skip_build {
        build_toolchain(&args.build_cmd, args.fail_on_build_error)?;
    }

    let inputs = discover_inputs(&args.inputs, &args.tests_dir, &args.extension)?;
    if inputs.is_empty() {
        println!("No inputs found; nothing to check.");
        return Ok(ExitCode::SUCCESS);
    }

    let toolchain =
        CommandToolchain::from_command(&args.toolchain, Duration::from_secs(args.timeout_secs))?;
    let comparator: Box<dyn Comparator> = if args.interactive {
        Box::new(InteractiveComparator::from_command(&args.diff_tool)?)
    } else {
        Box::new(EqualityComparator)
    };

    let scratch = Scratch::create(args.scratch_dir.as_deref(), args.keep_artifacts)?;
    let report = run_all(
        &toolchain,
        comparator.as_ref(),
        &inputs,
        &args.profile,
        scratch.slots(),
    )?;

    if let Some(out) = &args.out {
        write_json(out, &report)?;
        println!("Wrote run report to {}", out.display());
    }
    println!(
        "{} matched, {} diverged, {} reviewed, {} failed across {} inputs",
        report.matched,
        report.diverged,
        report.reviewed,
        report.failed,
        report.outcomes.len()
    );
    scratch.finish();

    Ok(exit_code_for(&report, args.interactive))
}

fn cmd_compare(args: CompareArgs) -> Result<ExitCode> {
    let comparator: Box<dyn Comparator> = if args.interactive {
        Box::new(InteractiveComparator::from_command(&args.diff_tool)?)
    } else {
        Box::new(EqualityComparator)
    };
    match comparator.compare(&args.expected, &args.actual)? {
        Some(verdict) => {
            println!("{verdict}");
            if let Verdict::Diverged { diff } = &verdict {
                print!("{diff}");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::SUCCESS),
    }
}

/// Automated runs gate on every input matching; interactive runs only gate on
/// hard failures since verdicts belong to the reviewer.
fn exit_code_for(report: &RunReport, interactive: bool) -> ExitCode {
    let ok = if interactive {
        report.failed == 0
    } else {
        report.success()
    };
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Scratch directory lifecycle: a fresh temp dir per run by default so
/// concurrent runs cannot share slots, or a caller-fixed dir for inspection.
enum Scratch {
    Temp {
        dir: tempfile::TempDir,
        slots: ScratchSlots,
        keep: bool,
    },
    Fixed {
        slots: ScratchSlots,
        keep: bool,
    },
}

impl Scratch {
    fn create(fixed_dir: Option<&Path>, keep: bool) -> Result<Self> {
        match fixed_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("create scratch dir {}", dir.display()))?;
                Ok(Scratch::Fixed {
                    slots: ScratchSlots::in_dir(dir),
                    keep,
                })
            }
            None => {
                let dir = tempfile::TempDir::new().context("create scratch temp dir")?;
                let slots = ScratchSlots::in_dir(dir.path());
                Ok(Scratch::Temp { dir, slots, keep })
            }
        }
    }

    fn slots(&self) -> &ScratchSlots {
        match self {
            Scratch::Temp { slots, .. } | Scratch::Fixed { slots, .. } => slots,
        }
    }

    fn finish(self) {
        match self {
            Scratch::Temp { dir, keep, .. } => {
                if keep {
                    let path = dir.keep();
                    println!("Scratch artifacts kept in {}", path.display());
                }
                // Dropping the TempDir otherwise removes it.
            }
            Scratch::Fixed { slots, keep } => {
                if !keep {
                    slots.cleanup();
                }
            }
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn fixed_scratch_cleanup_removes_slot_files_unless_kept() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = root.path().join("scratch");

        let scratch = Scratch::create(Some(&dir), false).unwrap();
        let reference = scratch.slots().reference.clone();
        fs::write(&reference, "rendering").unwrap();
        scratch.finish();
        assert!(!reference.exists());
        assert!(dir.exists());

        let scratch = Scratch::create(Some(&dir), true).unwrap();
        let reference = scratch.slots().reference.clone();
        fs::write(&reference, "rendering").unwrap();
        scratch.finish();
        assert!(reference.exists());
    }

    #[test]
    fn temp_scratch_is_removed_on_finish() {
        let scratch = Scratch::create(None, false).unwrap();
        let dir = scratch.slots().reference.parent().unwrap().to_path_buf();
        assert!(dir.exists());
        scratch.finish();
        assert!(!dir.exists());
    }

    #[test]
    fn kept_temp_scratch_survives_finish() {
        let scratch = Scratch::create(None, true).unwrap();
        let dir = scratch.slots().reference.parent().unwrap().to_path_buf();
        scratch.finish();
        assert!(dir.exists());
        fs::remove_dir_all(dir).unwrap();
    }
}

//! CLI argument parsing for the round-trip harness.
//!
//! The CLI is intentionally thin: it wires configuration into the run
//! controller without embedding policy, so the same pipeline serves both the
//! manual-inspection workflow and automated regression gating.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default command prefix for the decompiler/preview toolchain.
pub const DEFAULT_TOOLCHAIN: &str = "dotnet run --no-build --project CLI";

/// Default build command run once before any input is processed.
pub const DEFAULT_BUILD_CMD: &str = "dotnet build";

/// Default external visual diff tool for interactive comparison.
pub const DEFAULT_DIFF_TOOL: &str = "code --diff --wait";

/// Default comparison output profile.
pub const DEFAULT_PROFILE: &str = "mattscript";

/// Root CLI entrypoint for the harness.
#[derive(Parser, Debug)]
#[command(
    name = "dcheck",
    version,
    about = "Differential round-trip harness for an event-script decompiler",
    after_help = "Commands:\n  run [INPUTS]...              Decompile, preview-round-trip, and compare each input\n  compare <EXPECTED> <ACTUAL>  Re-run just the comparison on two renderings\n\nExamples:\n  dcheck run\n  dcheck run Tests/m10.emevd.dcx --profile mattscript\n  dcheck run --interactive --keep-artifacts --scratch-dir Tests\n  dcheck run --out report.json\n  dcheck compare Tests/.check.js Tests/.out.js",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level harness commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Compare(CompareArgs),
}

/// Run command inputs for a full harness pass.
#[derive(Parser, Debug)]
#[command(about = "Run the decompile/preview round-trip over a set of inputs")]
pub struct RunArgs {
    /// Explicit input artifacts; defaults to scanning the tests directory
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Directory scanned for inputs when none are given explicitly
    #[arg(long, value_name = "DIR", default_value = "Tests")]
    pub tests_dir: PathBuf,

    /// Input file extension matched during the scan
    #[arg(long, value_name = "EXT", default_value = "dcx")]
    pub extension: String,

    /// Comparison output profile passed to decompile and preview
    #[arg(long, value_name = "NAME", default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Command prefix for the decompiler/preview toolchain
    #[arg(long, value_name = "CMD", default_value = DEFAULT_TOOLCHAIN)]
    pub toolchain: String,

    /// Build command run once before processing inputs
    #[arg(long, value_name = "CMD", default_value = DEFAULT_BUILD_CMD)]
    pub build_cmd: String,

    /// Skip the toolchain build step entirely
    #[arg(long, conflicts_with = "fail_on_build_error")]
    pub skip_build: bool,

    /// Abort the run if the toolchain build fails
    #[arg(long)]
    pub fail_on_build_error: bool,

    /// Inspect divergences in an external diff viewer instead of deciding
    #[arg(long)]
    pub interactive: bool,

    /// External diff tool launched in interactive mode
    #[arg(long, value_name = "CMD", default_value = DEFAULT_DIFF_TOOL)]
    pub diff_tool: String,

    /// Directory for scratch renderings; defaults to a fresh temp dir
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Leave scratch renderings on disk after the run
    #[arg(long)]
    pub keep_artifacts: bool,

    /// Wall-clock timeout per toolchain invocation, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub timeout_secs: u64,

    /// Output path for a machine-readable run report
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Compare command inputs for re-inspecting two existing renderings.
#[derive(Parser, Debug)]
#[command(about = "Compare two rendering files without re-running the pipeline")]
pub struct CompareArgs {
    /// Expected rendering (direct decompile under the comparison profile)
    #[arg(value_name = "EXPECTED")]
    pub expected: PathBuf,

    /// Actual rendering (preview round-trip output)
    #[arg(value_name = "ACTUAL")]
    pub actual: PathBuf,

    /// Inspect in an external diff viewer instead of deciding
    #[arg(long)]
    pub interactive: bool,

    /// External diff tool launched in interactive mode
    #[arg(long, value_name = "CMD", default_value = DEFAULT_DIFF_TOOL)]
    pub diff_tool: String,
}

//! External toolchain invocations.
//!
//! The decompiler/preview executable is isolated behind the [`Toolchain`]
//! capability so the pipeline and run controller depend only on its
//! command-line contract, not on how the toolchain is built or hosted.
use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Capability interface over the external decompiler/preview executable.
///
/// Both operations fail with the invocation's captured stderr on non-zero
/// exit; neither interprets the rendering text it moves around.
pub trait Toolchain {
    /// Decompile `input` to `output`. An absent profile selects the
    /// toolchain's default dialect.
    fn decompile(&self, input: &Path, output: &Path, profile: Option<&str>) -> Result<()>;

    /// Re-serialize a previously decompiled rendering under `profile`,
    /// returning the toolchain's stdout.
    fn preview(&self, input: &Path, profile: &str) -> Result<String>;
}

/// Subprocess-backed [`Toolchain`] built from a user-supplied command prefix.
pub struct CommandToolchain {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandToolchain {
    pub fn from_command(command: &str, timeout: Duration) -> Result<Self> {
        let argv = split_command(command, "toolchain")?;
        Ok(Self { argv, timeout })
    }

    fn run_step(&self, step: &str, args: &[String]) -> Result<Capture> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        cmd.args(args);

        let start = Instant::now();
        let capture = run_with_timeout(cmd, self.timeout)
            .with_context(|| format!("invoke {} via {}", step, self.argv[0]))?;
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            step,
            elapsed_ms,
            stdout_bytes = capture.stdout.len(),
            stderr_bytes = capture.stderr.len(),
            "toolchain invocation complete"
        );

        if capture.timed_out {
            return Err(anyhow!(
                "{step} timed out after {}s",
                self.timeout.as_secs()
            ));
        }
        let status = capture
            .status
            .ok_or_else(|| anyhow!("{step} terminated without exit status"))?;
        if !status.success() {
            let stderr = String::from_utf8_lossy(&capture.stderr);
            return Err(anyhow!(
                "{step} failed with status {}: {}",
                status,
                stderr.trim()
            ));
        }
        Ok(capture)
    }
}

impl Toolchain for CommandToolchain {
    fn decompile(&self, input: &Path, output: &Path, profile: Option<&str>) -> Result<()> {
        let mut args = vec![
            "decompile".to_string(),
            path_to_string(input, "input")?,
            path_to_string(output, "output")?,
        ];
        if let Some(profile) = profile {
            args.push(format!("--profile={profile}"));
        }
        self.run_step("decompile", &args)?;
        Ok(())
    }

    fn preview(&self, input: &Path, profile: &str) -> Result<String> {
        let args = vec![
            "preview".to_string(),
            format!("--profile={profile}"),
            path_to_string(input, "input")?,
        ];
        let capture = self.run_step("preview", &args)?;
        Ok(String::from_utf8_lossy(&capture.stdout).into_owned())
    }
}

/// Build the external toolchain once, before any input is processed.
///
/// The build tool streams its own output; the harness consumes only the exit
/// status. A failing build is logged and tolerated unless `fail_on_error` is
/// set, matching the manual workflow where stale binaries still run.
pub fn build_toolchain(build_cmd: &str, fail_on_error: bool) -> Result<()> {
    let argv = split_command(build_cmd, "build")?;
    println!("Building toolchain: {build_cmd}");

    let status = Command::new(&argv[0])
        .args(&argv[1..])
        .status()
        .with_context(|| format!("spawn build command: {}", argv[0]))?;
    if status.success() {
        return Ok(());
    }
    if fail_on_error {
        return Err(anyhow!("toolchain build failed with status {status}"));
    }
    tracing::warn!(%status, "toolchain build failed; continuing with existing binaries");
    Ok(())
}

/// Split a user-supplied command string into argv.
pub fn split_command(command: &str, label: &str) -> Result<Vec<String>> {
    let argv =
        shell_words::split(command).with_context(|| format!("parse {label} command: {command}"))?;
    if argv.is_empty() {
        return Err(anyhow!("{label} command is empty"));
    }
    Ok(argv)
}

#[derive(Debug)]
struct Capture {
    status: Option<ExitStatus>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    timed_out: bool,
}

/// Run a command with piped output under a wall-clock deadline.
///
/// Reader threads drain both pipes so a chatty child cannot deadlock against
/// a full pipe buffer while the parent polls `try_wait`.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<Capture> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || drain(stdout));
    let stderr_reader = std::thread::spawn(move || drain(stderr));

    let deadline = Instant::now() + timeout;
    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait().context("poll toolchain child")? {
            break Some(status);
        }
        if Instant::now() >= deadline {
            timed_out = true;
            child.kill().ok();
            child.wait().ok();
            break None;
        }
        std::thread::sleep(Duration::from_millis(25));
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();
    Ok(Capture {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn drain(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).ok();
    }
    buf
}

fn path_to_string(path: &Path, label: &str) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{label} path is not valid UTF-8"))
}

//! The per-input round-trip pipeline.
//!
//! Each input is decompiled twice (default dialect and comparison profile),
//! then the default-dialect rendering is pushed back through the preview
//! re-serializer. Direct decompilation and preview round-trip must agree for
//! the comparison profile; the two on-disk renderings feed the comparator.
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::toolchain::Toolchain;

/// The three harness-owned slot paths holding one input's renderings.
///
/// Slots are passed explicitly rather than being fixed globals so each run
/// (or each parallel test) can own a disjoint scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchSlots {
    /// Rendering A: decompile under the toolchain's default dialect.
    pub reference: PathBuf,
    /// Rendering B: decompile under the comparison profile (ground truth).
    pub expected: PathBuf,
    /// Rendering C: preview round-trip of the reference rendering.
    pub roundtrip: PathBuf,
}

impl ScratchSlots {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            reference: dir.join(".new.js"),
            expected: dir.join(".check.js"),
            roundtrip: dir.join(".out.js"),
        }
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.reference, &self.expected, &self.roundtrip]
    }

    /// Remove any slot content left by a previous input, so a partial
    /// pipeline can never be compared against stale renderings.
    pub fn clear(&self) -> Result<()> {
        for path in self.paths() {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(err).with_context(|| format!("clear slot {}", path.display()))
                }
            }
        }
        Ok(())
    }

    /// Remove slot files at end of run. Missing files are fine; interactive
    /// runs often delete nothing because the viewer already closed over them.
    pub fn cleanup(&self) {
        for path in self.paths() {
            if let Err(err) = fs::remove_file(path) {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), %err, "failed to remove scratch file");
                }
            }
        }
    }
}

/// Run the three-step pipeline for one input, leaving the `expected` and
/// `roundtrip` slots on disk for the comparator.
///
/// Any step exiting non-zero aborts this input's pipeline with the captured
/// stderr in the error; the caller decides whether the batch continues.
pub fn run_pipeline(
    toolchain: &dyn Toolchain,
    input: &Path,
    profile: &str,
    slots: &ScratchSlots,
) -> Result<()> {
    slots.clear()?;

    println!("Decompiling {}", input.display());
    toolchain.decompile(input, &slots.reference, None)?;
    toolchain.decompile(input, &slots.expected, Some(profile))?;

    println!("Previewing {}", input.display());
    let roundtrip = toolchain.preview(&slots.reference, profile)?;
    // Byte-exact write: newline handling is the comparator's business.
    fs::write(&slots.roundtrip, roundtrip.as_bytes())
        .with_context(|| format!("write {}", slots.roundtrip.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Stub toolchain that renders deterministic text derived from the input
    /// name, with an optional failure step.
    struct StubToolchain {
        fail_decompile_for: Option<String>,
        preview_suffix: String,
        calls: RefCell<Vec<String>>,
    }

    impl StubToolchain {
        fn consistent() -> Self {
            Self {
                fail_decompile_for: None,
                preview_suffix: String::new(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Toolchain for StubToolchain {
        fn decompile(&self, input: &Path, output: &Path, profile: Option<&str>) -> Result<()> {
            let name = input.file_name().unwrap().to_string_lossy().into_owned();
            self.calls
                .borrow_mut()
                .push(format!("decompile {name} profile={profile:?}"));
            if self.fail_decompile_for.as_deref() == Some(name.as_str()) {
                return Err(anyhow!("decompile failed with status 2: bad header in {name}"));
            }
            let dialect = profile.unwrap_or("default");
            fs::write(output, format!("// {name} as {dialect}\n"))?;
            Ok(())
        }

        fn preview(&self, input: &Path, profile: &str) -> Result<String> {
            self.calls.borrow_mut().push(format!("preview {profile}"));
            let reference = fs::read_to_string(input)?;
            // Re-render the default-dialect text the way decompile-with-profile
            // would have, modulo the configured divergence suffix.
            let rendered = reference.replace("as default", &format!("as {profile}"));
            Ok(format!("{rendered}{}", self.preview_suffix))
        }
    }

    #[test]
    fn pipeline_fills_all_three_slots() {
        let dir = TempDir::new().unwrap();
        let slots = ScratchSlots::in_dir(dir.path());
        let input = dir.path().join("m10.dcx");
        fs::write(&input, b"\x00").unwrap();

        let toolchain = StubToolchain::consistent();
        run_pipeline(&toolchain, &input, "mattscript", &slots).unwrap();

        assert_eq!(
            fs::read_to_string(&slots.reference).unwrap(),
            "// m10.dcx as default\n"
        );
        assert_eq!(
            fs::read_to_string(&slots.expected).unwrap(),
            "// m10.dcx as mattscript\n"
        );
        assert_eq!(
            fs::read_to_string(&slots.roundtrip).unwrap(),
            "// m10.dcx as mattscript\n"
        );

        let calls = toolchain.calls.borrow();
        assert_eq!(calls.len(), 3, "{calls:?}");
        assert!(calls[0].contains("profile=None"), "{calls:?}");
        assert!(calls[1].contains("profile=Some(\"mattscript\")"), "{calls:?}");
        assert_eq!(calls[2], "preview mattscript");
    }

    #[test]
    fn slots_are_overwritten_between_inputs() {
        let dir = TempDir::new().unwrap();
        let slots = ScratchSlots::in_dir(dir.path());
        for path in slots.paths() {
            fs::write(path, "stale rendering from a previous input\n").unwrap();
        }

        let input = dir.path().join("m12.dcx");
        fs::write(&input, b"\x00").unwrap();
        let toolchain = StubToolchain::consistent();
        run_pipeline(&toolchain, &input, "mattscript", &slots).unwrap();

        for path in slots.paths() {
            let content = fs::read_to_string(path).unwrap();
            assert!(content.contains("m12.dcx"), "stale content in {path:?}");
        }
    }

    #[test]
    fn failed_decompile_leaves_no_stale_comparison_pair() {
        let dir = TempDir::new().unwrap();
        let slots = ScratchSlots::in_dir(dir.path());
        for path in slots.paths() {
            fs::write(path, "stale\n").unwrap();
        }

        let input = dir.path().join("broken.dcx");
        fs::write(&input, b"\x00").unwrap();
        let toolchain = StubToolchain {
            fail_decompile_for: Some("broken.dcx".to_string()),
            preview_suffix: String::new(),
            calls: RefCell::new(Vec::new()),
        };
        let err = run_pipeline(&toolchain, &input, "mattscript", &slots).unwrap_err();
        assert!(err.to_string().contains("bad header"));
        // Cleared up front, so nothing stale survives the failure.
        assert!(!slots.expected.exists());
        assert!(!slots.roundtrip.exists());
    }

    #[test]
    fn cleanup_tolerates_missing_files() {
        let dir = TempDir::new().unwrap();
        let slots = ScratchSlots::in_dir(dir.path());
        fs::write(&slots.expected, "x").unwrap();
        slots.cleanup();
        for path in slots.paths() {
            assert!(!path.exists());
        }
    }
}

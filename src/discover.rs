//! Input discovery for the harness.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve the set of input artifacts for a run.
///
/// Explicit paths win and keep their caller order. Otherwise the tests
/// directory is scanned for files with the given extension, sorted so batch
/// order is stable across filesystems. Zero inputs is a valid, empty result.
pub fn discover_inputs(
    explicit: &[PathBuf],
    tests_dir: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    scan_dir(tests_dir, extension)
}

fn scan_dir(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).with_context(|| format!("scan {}", dir.display()))?;
    let mut inputs = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read entry under {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

//! Invoking the C toolchain on generated engine source.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{CompileError, Result};

/// A compiled engine binary, kept alive by its temporary directory.
///
/// Dropping the value removes the directory and the binary with it, so the
/// handle must outlive any process spawned from [`path`](Self::path).
#[derive(Debug)]
pub struct Executable {
    _dir: tempfile::TempDir,
    binary: PathBuf,
}

impl Executable {
    /// Path of the engine binary.
    pub fn path(&self) -> &Path {
        &self.binary
    }
}

/// Writes `source` into a fresh temp dir and compiles it with gcc.
///
/// Generated code is expected to be warning-clean; the build runs with
/// `-Wall -Werror` and any diagnostic fails the compile with the compiler's
/// stderr carried verbatim.
pub(crate) fn build(source: &str) -> Result<Executable> {
    let dir = tempfile::TempDir::with_prefix("telar-engine-")?;
    let source_path = dir.path().join("engine.c");
    let binary = dir.path().join("engine");
    std::fs::write(&source_path, source)?;

    let output = Command::new("gcc")
        .args(["-std=c11", "-Wall", "-Werror", "-O3", "-o"])
        .arg(&binary)
        .arg(&source_path)
        .args(["-lm", "-ljack", "-lpthread"])
        .output()?;

    if !output.status.success() {
        return Err(CompileError::Toolchain {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    tracing::info!(binary = %binary.display(), "compiled engine binary");
    Ok(Executable { _dir: dir, binary })
}

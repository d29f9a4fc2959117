use crate::tool::MetadataTool;
use anyhow::{bail, Context, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// exiftool driven as a subprocess, one invocation per file operation.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Version string reported by `-ver`.
    pub fn probe(&self) -> Result<String> {
        let output = self.run(&[OsStr::new("-ver")])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, args: &[&OsStr]) -> Result<Output> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .with_context(|| format!("failed to run {}", self.program.display()))?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output)
    }
}

impl MetadataTool for ExifTool {
    fn name(&self) -> &str {
        "exiftool"
    }

    fn read_capture_time(&self, path: &Path) -> Result<Option<String>> {
        let output = self.run(&[
            OsStr::new("-s3"),
            OsStr::new("-DateTimeOriginal"),
            path.as_os_str(),
        ])?;
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        let assignment = file_name_assignment(to)?;
        self.run(&[OsStr::new("-q"), assignment.as_os_str(), from.as_os_str()])
            .with_context(|| format!("failed to rename {} -> {}", from.display(), to.display()))?;
        Ok(())
    }

    fn write_sidecar(&self, target: &Path, sidecar: &Path, title: &str) -> Result<()> {
        let assignment = format!("-XMP-dc:Title={}", title);
        self.run(&[
            OsStr::new("-q"),
            OsStr::new("-o"),
            sidecar.as_os_str(),
            OsStr::new(&assignment),
            target.as_os_str(),
        ])
        .with_context(|| format!("failed to write sidecar: {}", sidecar.display()))?;
        Ok(())
    }
}

/// `-FileName=<name>` with `%` doubled, since exiftool expands `%d`, `%f`,
/// `%e` and `%c` in new file names.
fn file_name_assignment(to: &Path) -> Result<OsString> {
    let file_name = to
        .file_name()
        .with_context(|| format!("rename target has no file name: {}", to.display()))?;
    let file_name = file_name
        .to_str()
        .with_context(|| format!("rename target is not valid UTF-8: {}", to.display()))?;
    Ok(OsString::from(format!("-FileName={}", file_name.replace('%', "%%"))))
}

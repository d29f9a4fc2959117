use crate::exif_reader::read_date_time_original;
use crate::exiftool::ExifTool;
use crate::xmp_sidecar::write_title_sidecar;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Authority for capture metadata and for the single-file mutations the
/// engine orchestrates. Each call is assumed atomic for its one file.
pub trait MetadataTool: Send + Sync {
    fn name(&self) -> &str;

    /// Raw `DateTimeOriginal`, or `None` when the file has none.
    fn read_capture_time(&self, path: &Path) -> Result<Option<String>>;

    /// Renames `from` to `to` in place. Both live in the same directory.
    fn rename_file(&self, from: &Path, to: &Path) -> Result<()>;

    /// Creates `sidecar` next to `target` with `Title = title`.
    fn write_sidecar(&self, target: &Path, sidecar: &Path, title: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Auto,
    Exiftool,
    Native,
}

impl FromStr for ToolKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "exiftool" => Ok(Self::Exiftool),
            "native" => Ok(Self::Native),
            other => bail!("unknown metadata tool '{}' (expected auto|exiftool|native)", other),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Exiftool => "exiftool",
            Self::Native => "native",
        })
    }
}

/// `Auto` prefers exiftool when it answers `-ver`.
pub fn select_tool(kind: ToolKind, exiftool_path: &str) -> Result<Box<dyn MetadataTool>> {
    match kind {
        ToolKind::Exiftool => {
            let tool = ExifTool::new(exiftool_path);
            let version = tool.probe()?;
            log::info!("using exiftool {}", version);
            Ok(Box::new(tool))
        }
        ToolKind::Native => Ok(Box::new(NativeTool)),
        ToolKind::Auto => {
            let tool = ExifTool::new(exiftool_path);
            match tool.probe() {
                Ok(version) => {
                    log::info!("using exiftool {}", version);
                    Ok(Box::new(tool))
                }
                Err(err) => {
                    log::warn!("exiftool unavailable, using built-in reader: {:#}", err);
                    Ok(Box::new(NativeTool))
                }
            }
        }
    }
}

/// In-process implementation: kamadak-exif for reading, std::fs for renames,
/// a minimal XMP packet for sidecars.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTool;

impl MetadataTool for NativeTool {
    fn name(&self) -> &str {
        "native"
    }

    fn read_capture_time(&self, path: &Path) -> Result<Option<String>> {
        read_date_time_original(path)
    }

    fn rename_file(&self, from: &Path, to: &Path) -> Result<()> {
        if to.exists() {
            bail!("rename target already exists: {}", to.display());
        }
        fs::rename(from, to)
            .with_context(|| format!("failed to rename {} -> {}", from.display(), to.display()))
    }

    fn write_sidecar(&self, _target: &Path, sidecar: &Path, title: &str) -> Result<()> {
        if sidecar.exists() {
            bail!("sidecar already exists: {}", sidecar.display());
        }
        write_title_sidecar(sidecar, title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmp_sidecar::read_sidecar_title;
    use tempfile::tempdir;

    #[test]
    fn tool_kind_parses_case_insensitively() {
        assert_eq!("EXIFTOOL".parse::<ToolKind>().expect("parse"), ToolKind::Exiftool);
        assert_eq!("native".parse::<ToolKind>().expect("parse"), ToolKind::Native);
        assert!("magick".parse::<ToolKind>().is_err());
    }

    #[test]
    fn native_rename_refuses_to_clobber() {
        let temp = tempdir().expect("tempdir");
        let a = temp.path().join("a.jpg");
        let b = temp.path().join("b.jpg");
        fs::write(&a, b"A").expect("write a");
        fs::write(&b, b"B").expect("write b");

        let err = NativeTool.rename_file(&a, &b).expect_err("must refuse");
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read(&b).expect("read b"), b"B");
    }

    #[test]
    fn native_sidecar_carries_title() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("a.jpg");
        let sidecar = temp.path().join("a.jpg.xmp");
        fs::write(&target, b"A").expect("write");

        NativeTool
            .write_sidecar(&target, &sidecar, "Original: x.jpg")
            .expect("write sidecar");
        assert_eq!(
            read_sidecar_title(&sidecar).expect("read").as_deref(),
            Some("Original: x.jpg")
        );
    }

    #[test]
    fn select_native_never_probes() {
        let tool = select_tool(ToolKind::Native, "/definitely/not/exiftool").expect("select");
        assert_eq!(tool.name(), "native");
    }

    #[test]
    fn select_auto_falls_back_without_exiftool() {
        let tool = select_tool(ToolKind::Auto, "/definitely/not/exiftool").expect("select");
        assert_eq!(tool.name(), "native");
    }
}

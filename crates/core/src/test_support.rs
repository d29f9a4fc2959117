use crate::tool::MetadataTool;
use crate::xmp_sidecar::write_title_sidecar;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Treats a file's own text as its `DateTimeOriginal`, so fixtures need no
/// real images and the capture time follows the file through renames.
pub(crate) struct ContentTool;

impl MetadataTool for ContentTool {
    fn name(&self) -> &str {
        "content"
    }

    fn read_capture_time(&self, path: &Path) -> Result<Option<String>> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture: {}", path.display()))?;
        let raw = raw.trim();
        Ok(Some(raw.to_string()).filter(|v| !v.is_empty()))
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

/// Creates `dir/name` holding `capture_time` as its body.
pub(crate) fn write_media(dir: &Path, name: &str, capture_time: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dirs must be creatable");
    }
    fs::write(&path, capture_time).expect("fixture must be writable");
    path
}

/// Smallest JPEG kamadak-exif accepts: SOI, one APP1 holding a big-endian
/// TIFF block whose Exif IFD carries `DateTimeOriginal`, EOI.
pub(crate) fn exif_jpeg(date_time_original: &str) -> Vec<u8> {
    let mut value = date_time_original.as_bytes().to_vec();
    value.push(0);

    const IFD0: u32 = 8;
    const EXIF_IFD: u32 = IFD0 + 18;
    const VALUE_AT: u32 = EXIF_IFD + 18;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2a");
    tiff.extend_from_slice(&IFD0.to_be_bytes());
    // IFD0: ExifIFDPointer (LONG)
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x8769u16.to_be_bytes());
    tiff.extend_from_slice(&4u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&EXIF_IFD.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    // Exif IFD: DateTimeOriginal (ASCII)
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x9003u16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&(value.len() as u32).to_be_bytes());
    tiff.extend_from_slice(&VALUE_AT.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(&value);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\x00\x00");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

/// Fujifilm RAF shell whose header points at `jpeg` as the embedded preview.
pub(crate) fn raf_wrapping(jpeg: &[u8]) -> Vec<u8> {
    const PREVIEW_AT: u32 = 100;
    let mut raf = vec![0u8; PREVIEW_AT as usize];
    raf[..16].copy_from_slice(b"FUJIFILMCCD-RAW ");
    raf[84..88].copy_from_slice(&PREVIEW_AT.to_be_bytes());
    raf[88..92].copy_from_slice(&(jpeg.len() as u32).to_be_bytes());
    raf.extend_from_slice(jpeg);
    raf
}

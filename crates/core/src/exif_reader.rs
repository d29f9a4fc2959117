use anyhow::{bail, Context, Result};
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

const DATE_TAGS: &[Tag] = &[Tag::DateTimeOriginal];

/// Fujifilm RAF files open with this magic and carry EXIF only inside an
/// embedded JPEG preview.
const RAF_MAGIC: &[u8] = b"FUJIFILMCCD-RAW ";
/// Big-endian `(offset, length)` of the embedded JPEG.
const RAF_JPEG_POINTER: usize = 84;
const RAF_HEADER_LEN: usize = RAF_JPEG_POINTER + 8;

/// Raw `DateTimeOriginal` as the EXIF block renders it, or `None` when the
/// container has EXIF but no such field.
pub fn read_date_time_original(path: &Path) -> Result<Option<String>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open file for EXIF: {}", path.display()))?;
    let mut buf = BufReader::new(file);

    let mut header = Vec::with_capacity(RAF_HEADER_LEN);
    (&mut buf)
        .take(RAF_HEADER_LEN as u64)
        .read_to_end(&mut header)
        .with_context(|| format!("failed to read header: {}", path.display()))?;

    let parsed = if header.starts_with(RAF_MAGIC) {
        let jpeg = raf_embedded_jpeg(&mut buf, &header)
            .with_context(|| format!("failed to locate RAF preview: {}", path.display()))?;
        Reader::new().read_from_container(&mut Cursor::new(jpeg))
    } else {
        buf.seek(SeekFrom::Start(0))
            .with_context(|| format!("failed to rewind: {}", path.display()))?;
        Reader::new().read_from_container(&mut buf)
    };

    let exif = match parsed {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(err) => {
            return Err(anyhow::Error::from(err)
                .context(format!("failed to parse EXIF: {}", path.display())))
        }
    };

    let value = DATE_TAGS.iter().find_map(|tag| {
        exif.get_field(*tag, In::PRIMARY)
            .map(|field| field.display_value().to_string())
    });

    Ok(value
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty()))
}

fn raf_embedded_jpeg<R: Read + Seek>(reader: &mut R, header: &[u8]) -> Result<Vec<u8>> {
    if header.len() < RAF_HEADER_LEN {
        bail!("truncated RAF header");
    }
    let offset = u32::from_be_bytes(header[RAF_JPEG_POINTER..RAF_JPEG_POINTER + 4].try_into()?);
    let length = u32::from_be_bytes(header[RAF_JPEG_POINTER + 4..RAF_HEADER_LEN].try_into()?);

    reader.seek(SeekFrom::Start(u64::from(offset)))?;
    let mut jpeg = Vec::new();
    reader.take(u64::from(length)).read_to_end(&mut jpeg)?;
    if jpeg.len() != length as usize {
        bail!(
            "RAF preview runs past end of file ({} of {} bytes)",
            jpeg.len(),
            length
        );
    }
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::read_date_time_original;
    use crate::test_support::{exif_jpeg, raf_wrapping};
    use crate::timestamp::Timestamp;
    use std::fs;
    use tempfile::tempdir;

    const MOMENT: &str = "2024:09:24 14:23:12";

    #[test]
    fn reads_date_time_original_from_jpeg() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("DSCF0001.JPG");
        fs::write(&path, exif_jpeg(MOMENT)).expect("write");

        let raw = read_date_time_original(&path).expect("read");
        assert_eq!(raw.as_deref(), Some("2024-09-24 14:23:12"));
        let parsed = raw.as_deref().and_then(Timestamp::parse).expect("parse");
        assert_eq!(parsed.canonical(), "2024-09-24_142312");
    }

    #[test]
    fn reads_date_time_original_from_raf_preview() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("DSCF0001.RAF");
        fs::write(&path, raf_wrapping(&exif_jpeg(MOMENT))).expect("write");

        let raw = read_date_time_original(&path).expect("read");
        assert_eq!(raw.as_deref(), Some("2024-09-24 14:23:12"));
        let parsed = raw.as_deref().and_then(Timestamp::parse).expect("parse");
        assert_eq!(parsed.canonical(), "2024-09-24_142312");
    }

    #[test]
    fn truncated_raf_preview_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("cut.RAF");
        let mut body = raf_wrapping(&exif_jpeg(MOMENT));
        body.truncate(body.len() - 10);
        fs::write(&path, body).expect("write");

        let err = read_date_time_original(&path).expect_err("must fail");
        assert!(err.to_string().contains("RAF preview"));
    }

    #[test]
    fn non_image_file_is_an_error_or_missing() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("fake.jpg");
        fs::write(&path, b"not really a jpeg").expect("write");

        match read_date_time_original(&path) {
            Ok(value) => assert!(value.is_none()),
            Err(err) => assert!(err.to_string().contains("EXIF")),
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let err = read_date_time_original(&temp.path().join("gone.jpg")).expect_err("must fail");
        assert!(err.to_string().contains("failed to open"));
    }
}

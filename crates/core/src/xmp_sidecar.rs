use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const SIDECAR_EXTENSION: &str = "xmp";
pub const ORIGINAL_PREFIX: &str = "Original: ";

/// `<file>.<ext>.xmp`, i.e. the whole file name plus `.xmp`.
pub fn sidecar_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|v| v.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    target.with_file_name(name)
}

pub fn is_sidecar(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(SIDECAR_EXTENSION))
        .unwrap_or(false)
}

pub fn original_title(original_name: &str) -> String {
    format!("{}{}", ORIGINAL_PREFIX, original_name)
}

/// Writes a minimal XMP packet whose `dc:title` carries `title`.
pub fn write_title_sidecar(sidecar: &Path, title: &str) -> Result<()> {
    let body = format!(
        concat!(
            "<?xpacket begin='\u{feff}' id='W5M0MpCehiHzreSzNTczkc9d'?>\n",
            "<x:xmpmeta xmlns:x='adobe:ns:meta/'>\n",
            " <rdf:RDF xmlns:rdf='http://www.w3.org/1999/02/22-rdf-syntax-ns#'>\n",
            "  <rdf:Description rdf:about='' xmlns:dc='http://purl.org/dc/elements/1.1/'>\n",
            "   <dc:title>\n",
            "    <rdf:Alt>\n",
            "     <rdf:li xml:lang='x-default'>{}</rdf:li>\n",
            "    </rdf:Alt>\n",
            "   </dc:title>\n",
            "  </rdf:Description>\n",
            " </rdf:RDF>\n",
            "</x:xmpmeta>\n",
            "<?xpacket end='w'?>\n"
        ),
        xml_escape(title)
    );
    fs::write(sidecar, body)
        .with_context(|| format!("failed to write sidecar: {}", sidecar.display()))
}

/// `dc:title` text of an XMP sidecar, whichever tool wrote it.
pub fn read_sidecar_title(sidecar: &Path) -> Result<Option<String>> {
    let xml = fs::read_to_string(sidecar)
        .with_context(|| format!("failed to read sidecar: {}", sidecar.display()))?;
    Ok(find_title(&xml))
}

/// Value recorded after `Original: `, if the sidecar carries one.
pub fn read_sidecar_original(sidecar: &Path) -> Result<Option<String>> {
    Ok(read_sidecar_title(sidecar)?
        .and_then(|title| title.strip_prefix(ORIGINAL_PREFIX).map(str::to_string)))
}

fn find_title(xml: &str) -> Option<String> {
    let mut cursor = 0usize;

    while let Some(start) = xml[cursor..].find('<') {
        let start = cursor + start;
        let end = start + xml[start..].find('>')?;
        let raw_tag = &xml[start + 1..end];
        cursor = end + 1;

        if raw_tag.starts_with('/') || raw_tag.starts_with('?') || raw_tag.starts_with('!') {
            continue;
        }

        let tag_name = raw_tag
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        if normalize_tag_name(tag_name) != "title" {
            continue;
        }
        if let Some(value) = attribute_value(raw_tag, "title") {
            return Some(value);
        }
        if raw_tag.ends_with('/') {
            continue;
        }

        let close_tag = format!("</{}>", tag_name);
        let close_pos = end + 1 + xml[end + 1..].find(&close_tag)?;
        let text = strip_tags(&xml[end + 1..close_pos]);
        let text = text.trim();
        if !text.is_empty() {
            return Some(html_unescape_basic(text));
        }
    }

    None
}

fn attribute_value(raw_tag: &str, wanted: &str) -> Option<String> {
    raw_tag.split_whitespace().skip(1).find_map(|attr| {
        let (name, value) = attr.split_once('=')?;
        if normalize_tag_name(name) != wanted {
            return None;
        }
        let value = value.trim_end_matches('/').trim_matches(|c| c == '"' || c == '\'');
        Some(html_unescape_basic(value))
    })
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn normalize_tag_name(tag: &str) -> String {
    tag.rsplit(':')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn html_unescape_basic(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

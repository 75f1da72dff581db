//! Write the attachments reached by a walk to disk.

use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::error::WalkError;
use crate::legacy::sniff::extension_for;
use crate::model::part::Part;
use crate::walker::Sink;

/// A [`Sink`] that saves attachments, images, special parts, UU-encoded
/// files and nested messages into one directory.
///
/// Inline text and HTML bodies are not written. Export failures never stop
/// the walk; they are collected in [`failures`](Self::failures).
#[derive(Debug)]
pub struct AttachmentExporter {
    output_dir: PathBuf,
    max_filename_len: usize,
    written: Vec<PathBuf>,
    failures: Vec<(String, WalkError)>,
}

impl AttachmentExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(output_dir, &ExportConfig::default())
    }

    pub fn with_config(output_dir: impl Into<PathBuf>, config: &ExportConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_filename_len: config.max_filename_len,
            written: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Files written so far, in walk order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Parts that could not be written, with their address.
    pub fn failures(&self) -> &[(String, WalkError)] {
        &self.failures
    }

    fn export(&mut self, part: &Part, id: &str, data: &[u8]) {
        let name = file_name_for(part, id, self.max_filename_len);
        match write_unique(&self.output_dir, &name, data) {
            Ok(path) => {
                tracing::debug!(address = %id, path = %path.display(), "Exported part");
                self.written.push(path);
            }
            Err(e) => {
                tracing::warn!(address = %id, error = %e, "Failed to export part");
                self.failures.push((id.to_string(), e));
            }
        }
    }

    fn export_leaf(&mut self, part: &Part, id: &str) {
        match part.as_bytes() {
            Some(data) => self.export(part, id, data),
            None => tracing::debug!(address = %id, "Part has no payload, skipped"),
        }
    }
}

impl Sink for AttachmentExporter {
    fn on_inline_uu_attachment(&mut self, part: &Part, id: &str) -> bool {
        self.export_leaf(part, id);
        true
    }

    fn on_attachment(&mut self, part: &Part, id: &str, _inline: bool) -> bool {
        self.export_leaf(part, id);
        true
    }

    fn on_image(&mut self, part: &Part, id: &str, _content_id: Option<&str>) -> bool {
        self.export_leaf(part, id);
        true
    }

    fn on_special_part(&mut self, part: &Part, id: &str) -> bool {
        self.export_leaf(part, id);
        true
    }

    fn on_nested_message(&mut self, part: &Part, id: &str, nested: &Part) -> bool {
        match part.source().or_else(|| nested.source()) {
            Some(raw) => self.export(part, id, raw),
            None => tracing::debug!(address = %id, "Nested message has no raw source, skipped"),
        }
        true
    }
}

/// File name for a part: its own name if any, else `part_<address>.<ext>`.
pub fn file_name_for(part: &Part, id: &str, max_len: usize) -> String {
    match part.file_name().filter(|n| !n.trim().is_empty()) {
        Some(name) => sanitize_filename_part(base_name(name), max_len),
        None => {
            let ext = extension_for(part.content_type()).unwrap_or("bin");
            let stem = sanitize_filename_part(&format!("part_{id}"), max_len);
            format!("{stem}.{ext}")
        }
    }
}

/// Drop any directory components a sender put into the name.
fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Sanitize a string for use in a filename.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        sanitized
    }
}

fn write_unique(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf, WalkError> {
    std::fs::create_dir_all(dir).map_err(|e| WalkError::io(dir, e))?;
    // Never overwrite; append a counter instead
    let path = unique_path(&dir.join(name));
    std::fs::write(&path, data).map_err(|e| WalkError::io(&path, e))?;
    Ok(path)
}

/// If `path` already exists, append a counter to make it unique.
fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parent = path.parent().unwrap_or(Path::new("."));

    for i in 1..1000 {
        let candidate = if ext.is_empty() {
            parent.join(format!("{stem}_{i}"))
        } else {
            parent.join(format!("{stem}_{i}.{ext}"))
        };
        if !candidate.exists() {
            return candidate;
        }
    }

    // Fallback, very unlikely
    parent.join(format!("{stem}_dup.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content_type::{ContentType, Disposition};

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename_part("hello world", 20), "hello_world");
        assert_eq!(
            sanitize_filename_part("user@example.com", 30),
            "user@example.com"
        );
        assert_eq!(sanitize_filename_part("a/b\\c:d*e", 20), "a_b_c_d_e");
        assert_eq!(sanitize_filename_part("", 20), "unknown");
        assert_eq!(sanitize_filename_part("..", 20), "unknown");
    }

    #[test]
    fn test_file_name_for() {
        let named = Part::leaf(ContentType::parse("application/pdf"), Vec::new())
            .with_file_name("../../etc/report 1.pdf");
        assert_eq!(file_name_for(&named, "2", 150), "report_1.pdf");
        let unnamed = Part::leaf(ContentType::parse("image/png"), Vec::new());
        assert_eq!(file_name_for(&unnamed, "1.2", 150), "part_1.2.png");
        let unknown = Part::leaf(ContentType::parse("application/x-thing"), Vec::new());
        assert_eq!(file_name_for(&unknown, "3", 150), "part_3.bin");
    }

    #[test]
    fn test_unique_names_on_collision() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut exporter = AttachmentExporter::new(dir.path());
        let part = Part::leaf(ContentType::parse("text/plain"), b"one".to_vec())
            .with_file_name("notes.txt")
            .with_disposition(Disposition::Attachment);
        exporter.on_attachment(&part, "1", false);
        exporter.on_attachment(&part, "2", false);
        assert_eq!(exporter.written().len(), 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("notes_1.txt").exists());
        assert!(exporter.failures().is_empty());
    }

    #[test]
    fn test_nested_message_uses_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut exporter = AttachmentExporter::new(dir.path().join("out"));
        let inner = Part::text(ContentType::text_plain(), "x").into_message();
        let raw = b"Subject: hi\r\n\r\nx\r\n".to_vec();
        let wrapper = Part::message(inner.clone()).with_source(raw.clone());
        exporter.on_nested_message(&wrapper, "2", wrapper.as_nested_message().unwrap());
        let path = &exporter.written()[0];
        assert!(path.ends_with("part_2.eml"));
        assert_eq!(std::fs::read(path).unwrap(), raw);
    }
}

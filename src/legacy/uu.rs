//! Detection and extraction of UU-encoded files embedded in plain text.
//!
//! A segment looks like:
//!
//! ```text
//! begin 644 name.ext
//! M<61 encoded bytes per line>
//! `
//! end
//! ```
//!
//! Segments that do not decode cleanly or never reach their `end` line are
//! left in the text; detection never reports a false positive.

use crate::model::content_type::{ContentType, Disposition};
use crate::model::part::Part;

use super::sniff::guess_content_type;

/// One file extracted from a UU segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuFile {
    /// File name from the `begin` line.
    pub file_name: String,
    /// Unix permission bits from the `begin` line.
    pub mode: u32,
    pub data: Vec<u8>,
}

impl UuFile {
    /// Media type guessed from the file name.
    pub fn content_type(&self) -> ContentType {
        guess_content_type(Some(&self.file_name))
    }

    /// Present the file as an attachment part.
    pub fn to_part(&self) -> Part {
        Part::leaf(self.content_type(), self.data.clone())
            .with_file_name(self.file_name.clone())
            .with_disposition(Disposition::Attachment)
    }
}

/// Result of splitting a text that contained UU segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuDecoded {
    /// The text with every decoded segment removed.
    pub clean_text: String,
    /// Decoded files, in order of appearance.
    pub files: Vec<UuFile>,
}

/// Split UU-encoded files out of `text`.
///
/// Returns `None` if the text holds no complete, valid segment.
pub fn decode(text: &str) -> Option<UuDecoded> {
    if !text.contains("begin ") {
        return None;
    }

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut clean_text = String::with_capacity(text.len());
    let mut files = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if let Some((mode, file_name)) = parse_begin_line(strip_eol(lines[i])) {
            if let Some((data, consumed)) = decode_segment(&lines[i + 1..]) {
                files.push(UuFile {
                    file_name,
                    mode,
                    data,
                });
                i += 1 + consumed;
                continue;
            }
        }
        clean_text.push_str(lines[i]);
        i += 1;
    }

    if files.is_empty() {
        None
    } else {
        Some(UuDecoded { clean_text, files })
    }
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Parse `begin <octal mode> <file name>`.
fn parse_begin_line(line: &str) -> Option<(u32, String)> {
    let rest = line.strip_prefix("begin ")?;
    let (mode, name) = rest.trim_start().split_once(' ')?;
    if !(3..=4).contains(&mode.len()) || !mode.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((u32::from_str_radix(mode, 8).ok()?, name.to_string()))
}

/// Decode body lines up to and including `end`.
///
/// Returns the data and the number of lines consumed, or `None` if the
/// segment is malformed or unterminated.
fn decode_segment(lines: &[&str]) -> Option<(Vec<u8>, usize)> {
    let mut data = Vec::new();
    for (idx, raw) in lines.iter().enumerate() {
        let line = strip_eol(raw);
        if line.trim_end() == "end" {
            return Some((data, idx + 1));
        }
        decode_line(line, &mut data)?;
    }
    None
}

/// Decode one encoded line, appending to `out`.
fn decode_line(line: &str, out: &mut Vec<u8>) -> Option<()> {
    let bytes = line.as_bytes();
    let Some((&len_char, encoded)) = bytes.split_first() else {
        // Blank line: zero-length record
        return Some(());
    };
    let len = sextet(len_char)? as usize;
    if len == 0 {
        return Some(());
    }

    let needed = len.div_ceil(3) * 4;
    // Encoders may strip trailing spaces; those stand for zero sextets.
    if encoded.len() > needed + 2 {
        return None;
    }
    let mut chars = encoded.to_vec();
    chars.resize(needed.max(encoded.len()), b' ');

    let start = out.len();
    for quad in chars[..needed].chunks(4) {
        let a = sextet(quad[0])?;
        let b = sextet(quad[1])?;
        let c = sextet(quad[2])?;
        let d = sextet(quad[3])?;
        out.push((a << 2) | (b >> 4));
        out.push((b << 4) | (c >> 2));
        out.push((c << 6) | d);
    }
    out.truncate(start + len);
    Some(())
}

/// Value of one UU character; only `' '..='`'` are valid.
fn sextet(c: u8) -> Option<u8> {
    if (0x20..=0x60).contains(&c) {
        Some((c - 0x20) & 0x3F)
    } else {
        None
    }
}

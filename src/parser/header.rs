//! RFC 5322 header handling: unfolding, encoded-words (RFC 2047) and dates.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use crate::model::part::{decode_charset, Header};

/// Base64 engine that tolerates missing padding and trailing bits, both
/// common in hand-rolled mailers.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// How many times a header is re-decoded when decoding reveals further
/// encoded-words (double-encoded subjects).
const MAX_DECODE_PASSES: usize = 3;

/// Parse a raw header block into fields, stopping at the first blank line.
///
/// Folded lines are joined with a single space; names keep their spelling.
pub fn parse_header_block(raw: &[u8]) -> Vec<Header> {
    let text = decode_header_bytes(raw);
    let mut result: Vec<Header> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.value.push(' ');
                last.value.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim();
            if !name.is_empty() {
                result.push(Header::new(name, line[colon_pos + 1..].trim()));
            }
        }
        // Lines without a colon that are not continuations are skipped
    }

    result
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Decode a header that may carry several layers of encoded-words.
///
/// Legacy clients glue encoded-words to surrounding text, split a multi-byte
/// character across two words, or encode an already encoded value. All of
/// those are undone here.
///
/// Example: `"=?iso-8859-1?Q?caf=E9?="` → `"café"`
pub fn decode_multi_encoded(input: &str) -> String {
    let mut current = input.to_string();
    for _ in 0..MAX_DECODE_PASSES {
        let next = decode_encoded_words(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

enum Segment {
    Plain(String),
    Encoded { charset: String, bytes: Vec<u8> },
}

/// Decode the RFC 2047 encoded-words of a header value in one pass.
///
/// Whitespace between adjacent encoded-words is dropped (RFC 2047 §6.2) and
/// adjacent words in the same charset are joined before charset decoding.
/// Words that fail to decode are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut segments: Vec<Segment> = Vec::new();
    let mut remaining = input;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let after_start = &remaining[start + 2..];

        match try_decode_one_word(after_start) {
            Some(word) => {
                let last_encoded = matches!(segments.last(), Some(Segment::Encoded { .. }));
                if !(last_encoded && before.trim().is_empty()) {
                    push_plain(&mut segments, before);
                }
                match segments.last_mut() {
                    Some(Segment::Encoded { charset, bytes })
                        if before.trim().is_empty()
                            && charset.eq_ignore_ascii_case(&word.charset) =>
                    {
                        bytes.extend_from_slice(&word.bytes);
                    }
                    _ => segments.push(Segment::Encoded {
                        charset: word.charset,
                        bytes: word.bytes,
                    }),
                }
                remaining = &after_start[word.consumed..];
            }
            None => {
                push_plain(&mut segments, before);
                push_plain(&mut segments, "=?");
                remaining = after_start;
            }
        }
    }
    push_plain(&mut segments, remaining);

    let mut result = String::with_capacity(input.len());
    for segment in segments {
        match segment {
            Segment::Plain(text) => result.push_str(&text),
            Segment::Encoded { charset, bytes } => {
                result.push_str(&decode_word_charset(&charset, &bytes))
            }
        }
    }
    result
}

fn push_plain(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    match segments.last_mut() {
        Some(Segment::Plain(prev)) => prev.push_str(text),
        _ => segments.push(Segment::Plain(text.to_string())),
    }
}

struct DecodedWord {
    charset: String,
    bytes: Vec<u8>,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return None;
    }

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let bytes = match encoding {
        "B" | "b" => decode_base64_lenient(encoded_text.as_bytes())?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or(charset).to_string();

    Some(DecodedWord {
        charset,
        bytes,
        consumed: first_q + 1 + second_q + 1 + end + 2,
    })
}

/// Decode base64, ignoring whitespace and line breaks.
pub(crate) fn decode_base64_lenient(input: &[u8]) -> Option<Vec<u8>> {
    let compact: Vec<u8> = input
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(compact).ok()
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match hex_byte(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Value of two ASCII hex digits.
pub(crate) fn hex_byte(hi: u8, lo: u8) -> Option<u8> {
    let digit = |c: u8| (c as char).to_digit(16);
    Some((digit(hi)? * 16 + digit(lo)?) as u8)
}

fn decode_word_charset(charset: &str, bytes: &[u8]) -> String {
    match decode_charset(charset, bytes) {
        Ok(text) => text.into_owned(),
        Err(_) => {
            warn!(charset = charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Strip surrounding `<` `>` (Message-ID, Content-ID).
pub fn strip_angle_brackets(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(trimmed)
        .trim()
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Drop a trailing comment such as "(CET)" and the day-of-week prefix
    let no_comment = match trimmed.find('(') {
        Some(pos) => trimmed[..pos].trim(),
        None => trimmed,
    };
    let no_dow = strip_day_of_week(no_comment);
    let with_offset = replace_named_tz(&no_dow);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];

    for candidate in [&no_dow, &with_offset] {
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Date stamped by a relay in a `Received` header (the part after the last `;`).
pub fn parse_received_date(received: &str) -> Option<DateTime<Utc>> {
    let (_, date) = received.rsplit_once(';')?;
    parse_date(date)
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim_start_matches(',').trim().to_string();
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(&format!(" {name}")) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}

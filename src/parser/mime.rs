//! Raw message bytes → [`Part`] tree, using `mail-parser` for the MIME structure.
//!
//! Leaf payloads are kept transfer-decoded but not charset-decoded, so the
//! walker's charset resolution (declared charset, else configured default)
//! is the one that counts.

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{MessageParser, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::{Result, WalkError};
use crate::model::content_type::{ContentType, Disposition};
use crate::model::part::Part;

use super::header::{decode_base64_lenient, hex_byte, parse_header_block, strip_angle_brackets};

/// Maximum depth for recursive conversion (to prevent stack overflow on adversarial input).
const MAX_DEPTH: usize = 64;

/// Parse a complete raw message (headers + body) into a message [`Part`].
///
/// A leading mbox `From ` line and a UTF-8 BOM are skipped.
pub fn parse_message(raw_message: &[u8]) -> Result<Part> {
    let message_bytes = skip_from_line(raw_message);
    if message_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(WalkError::InvalidMessage("empty input".into()));
    }

    let parser = MessageParser::default();
    let msg = parser
        .parse(message_bytes)
        .ok_or_else(|| WalkError::InvalidMessage("no MIME structure found".into()))?;

    Ok(convert_message(&msg, 0))
}

/// Read and parse an `.eml` file (or a single-message mbox).
pub fn parse_message_file(path: impl AsRef<std::path::Path>) -> Result<Part> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| WalkError::io(path, e))?;
    parse_message(&data)
}

/// Convert a parsed message; its root part becomes a message [`Part`].
fn convert_message(msg: &mail_parser::Message<'_>, depth: usize) -> Part {
    match msg.parts.first() {
        Some(root) => convert_part(msg, root, depth).into_message(),
        None => Part::leaf(ContentType::text_plain(), Vec::new()).into_message(),
    }
}

fn convert_part(
    msg: &mail_parser::Message<'_>,
    part: &mail_parser::MessagePart<'_>,
    depth: usize,
) -> Part {
    let raw = msg.raw_message.as_ref();
    let headers = match raw.get(part.offset_header..part.offset_body) {
        Some(block) => parse_header_block(block),
        None => {
            warn!(
                offset_header = part.offset_header,
                offset_body = part.offset_body,
                "Header block out of range, part headers dropped"
            );
            Vec::new()
        }
    };

    let content_type = part
        .content_type()
        .map(convert_content_type)
        .unwrap_or_else(|| default_content_type(&part.body));

    let built = match &part.body {
        PartType::Multipart(ids) if depth < MAX_DEPTH => {
            let children = ids
                .iter()
                .filter_map(|&id| msg.parts.get(id))
                .map(|child| convert_part(msg, child, depth + 1))
                .collect();
            Part::multipart(content_type, children).with_size(Some(part.raw_len() as u64))
        }
        PartType::Message(nested) if depth < MAX_DEPTH => {
            let inner = convert_message(nested, depth + 1);
            let wrapper = Part::message(inner)
                .with_content_type(content_type)
                .with_size(Some(part.raw_len() as u64));
            match raw.get(part.offset_body..part.offset_end) {
                Some(source) => wrapper.with_source(decode_transfer(
                    source,
                    part.content_transfer_encoding(),
                )),
                None => wrapper,
            }
        }
        PartType::Text(text) | PartType::Html(text) => {
            match raw.get(part.offset_body..part.offset_end) {
                Some(body) => Part::leaf(
                    content_type,
                    decode_transfer(body, part.content_transfer_encoding()),
                ),
                None => Part::text(content_type, text.as_ref()),
            }
        }
        _ => Part::leaf(content_type, part.contents().to_vec()),
    };

    let mut built = built.with_headers(headers);
    if let Some(disposition) = part.content_disposition() {
        built = built.with_disposition(Disposition::parse(disposition.ctype()));
    }
    if let Some(name) = part.attachment_name() {
        built = built.with_file_name(name);
    }
    if let Some(cid) = part.content_id() {
        built = built.with_content_id(strip_angle_brackets(cid));
    }
    built
}

fn convert_content_type(ct: &mail_parser::ContentType<'_>) -> ContentType {
    let mut out = match ct.subtype() {
        Some(sub) => ContentType::new(ct.ctype(), sub),
        None => ContentType::parse(ct.ctype()),
    };
    for name in ["charset", "name", "format", "method", "boundary", "report-type"] {
        if let Some(value) = ct.attribute(name) {
            out = out.with_param(name, value);
        }
    }
    out
}

/// Content type implied by the body when no header is present.
fn default_content_type(body: &PartType<'_>) -> ContentType {
    match body {
        PartType::Html(_) => ContentType::new("text", "html"),
        PartType::Multipart(_) => ContentType::new("multipart", "mixed"),
        PartType::Message(_) => ContentType::new("message", "rfc822"),
        PartType::Binary(_) | PartType::InlineBinary(_) => ContentType::octet_stream(),
        PartType::Text(_) => ContentType::text_plain(),
    }
}

/// Undo a Content-Transfer-Encoding. Unknown encodings pass through.
///
/// mail-parser's decoders run first; bodies they reject get a lenient pass
/// so a single stray character does not lose the whole part.
pub fn decode_transfer(body: &[u8], encoding: Option<&str>) -> Vec<u8> {
    match encoding.map(|e| e.trim().to_ascii_lowercase()).as_deref() {
        Some("base64") => base64_decode(body)
            .or_else(|| decode_base64_lenient(body))
            .unwrap_or_else(|| {
                warn!("Invalid base64 body, keeping raw bytes");
                body.to_vec()
            }),
        Some("quoted-printable") => quoted_printable_decode(body).unwrap_or_else(|| {
            debug!("Malformed quoted-printable body, decoding leniently");
            decode_quoted_printable_lenient(body)
        }),
        _ => body.to_vec(),
    }
}

/// Quoted-printable decoding that keeps invalid escapes verbatim.
fn decode_quoted_printable_lenient(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] != b'=' {
            out.push(input[i]);
            i += 1;
            continue;
        }
        // Soft line break, possibly with trailing whitespace after the `=`
        let ws = input[i + 1..]
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        match &input[i + 1 + ws..] {
            [b'\r', b'\n', ..] => {
                i += 3 + ws;
                continue;
            }
            [b'\n', ..] => {
                i += 2 + ws;
                continue;
            }
            _ => {}
        }
        match input.get(i + 1..i + 3).and_then(|h| hex_byte(h[0], h[1])) {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}

/// Skip the `From ` separator line at the start of mbox messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_decode_quoted_printable() {
        let qp = |body: &[u8]| decode_transfer(body, Some("quoted-printable"));
        assert_eq!(qp(b"caf=E9 =\r\nau lait"), b"caf\xE9 au lait");
        assert_eq!(qp(b"a=3Db=\nc"), b"a=bc");
        assert_eq!(qp(b"soft = \r\nbreak"), b"soft break");
        assert_eq!(qp(b"100=%"), b"100=%");
    }

    #[test]
    fn test_lenient_quoted_printable_soft_break_with_whitespace() {
        assert_eq!(decode_quoted_printable_lenient(b"x=% =  \r\ny"), b"x=% y");
        assert_eq!(decode_quoted_printable_lenient(b"=41=\t\nB"), b"AB");
    }

    #[test]
    fn test_decode_transfer_base64() {
        assert_eq!(decode_transfer(b"aGVs\r\nbG8=\r\n", Some("BASE64")), b"hello");
        assert_eq!(decode_transfer(b"plain", Some("7bit")), b"plain");
        assert_eq!(decode_transfer(b"plain", None), b"plain");
    }

    #[test]
    fn test_parse_simple_message() {
        let raw = b"From: a@x\r\nSubject: hi\r\nContent-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\r\ncaf=E9\r\n";
        let part = parse_message(raw).unwrap();
        assert!(part.is_message());
        assert_eq!(part.content_type().base_type(), "text/plain");
        assert_eq!(part.header("subject"), Some("hi"));
        let text = part.as_text(part.content_type().charset().unwrap()).unwrap();
        assert_eq!(text.trim_end(), "café");
    }

    #[test]
    fn test_parse_multipart_message() {
        let raw = b"From: a@x\r\nContent-Type: multipart/mixed; boundary=\"b1\"\r\n\r\n\
--b1\r\nContent-Type: text/plain\r\n\r\nhello\r\n\
--b1\r\nContent-Type: application/pdf\r\nContent-Disposition: attachment; filename=\"doc.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\r\nJVBERg==\r\n--b1--\r\n";
        let part = parse_message(raw).unwrap();
        assert!(part.is_multipart());
        assert_eq!(part.child_count(), 2);
        let pdf = part.child(1).unwrap();
        assert_eq!(pdf.file_name(), Some("doc.pdf"));
        assert_eq!(pdf.disposition(), Some(&Disposition::Attachment));
        assert_eq!(pdf.as_bytes(), Some(&b"%PDF"[..]));
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(matches!(
            parse_message(b"  \r\n"),
            Err(WalkError::InvalidMessage(_))
        ));
    }
}

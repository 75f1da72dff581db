//! Decoded TNEF streams to MIME-shaped parts.

use chrono::{DateTime, Utc};

use crate::legacy::sniff::content_type_for_file_name;
use crate::model::content_type::{ContentType, Disposition};
use crate::model::part::{Header, Part};

use super::mapi::*;
use super::reader::{read_message, TnefAttachment, TnefMessage};
use super::{rtf, TnefError};

/// Convert a decoded stream according to its message class.
pub fn to_parts(
    msg: &TnefMessage,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<Part>, TnefError> {
    match msg.class() {
        Some(class) if is_contact(class) => Ok(contact_parts(msg)),
        Some(class) if is_read_receipt(class) => Ok(receipt_parts(msg, class)),
        _ => generic_parts(msg, depth, max_depth),
    }
}

fn is_contact(class: &str) -> bool {
    let class = class.to_ascii_lowercase();
    class == "ipm.contact" || class.starts_with("ipm.contact.")
}

fn is_read_receipt(class: &str) -> bool {
    let class = class.to_ascii_uppercase();
    class.starts_with("REPORT.") && (class.ends_with(".IPNRN") || class.ends_with(".IPNNRN"))
}

fn utf8_text(sub: &str) -> ContentType {
    ContentType::new("text", sub).with_param("charset", "utf-8")
}

fn body_text(msg: &TnefMessage) -> Option<String> {
    msg.body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .or_else(|| msg.props.string(PR_BODY))
        .map(str::to_string)
}

// ── Contacts ────────────────────────────────────────────────────

fn contact_parts(msg: &TnefMessage) -> Vec<Part> {
    let mut parts = Vec::new();
    if let Some(body) = body_text(msg) {
        parts.push(Part::text(utf8_text("plain"), body));
    }
    let name = msg
        .props
        .string(PR_DISPLAY_NAME)
        .or(msg.subject.as_deref())
        .unwrap_or("contact");
    parts.push(
        Part::text(utf8_text("vcard"), vcard(&msg.props, name))
            .with_file_name(format!("{name}.vcf")),
    );
    parts
}

/// Render contact properties as a vCard 3.0 record.
pub fn vcard(props: &MapiProps, display_name: &str) -> String {
    let get = |id: u16| escape_vcard(props.string(id).unwrap_or_default());
    let mut lines = vec![
        "BEGIN:VCARD".to_string(),
        "VERSION:3.0".to_string(),
        format!(
            "N:{};{};{};{};{}",
            get(PR_SURNAME),
            get(PR_GIVEN_NAME),
            get(PR_MIDDLE_NAME),
            get(PR_DISPLAY_NAME_PREFIX),
            get(PR_GENERATION)
        ),
        format!("FN:{}", escape_vcard(display_name)),
    ];

    let company = props.string(PR_COMPANY_NAME);
    let department = props.string(PR_DEPARTMENT_NAME);
    if company.is_some() || department.is_some() {
        lines.push(format!("ORG:{};{}", get(PR_COMPANY_NAME), get(PR_DEPARTMENT_NAME)));
    }
    if let Some(title) = props.string(PR_TITLE) {
        lines.push(format!("TITLE:{}", escape_vcard(title)));
    }
    for (id, kind) in [
        (PR_BUSINESS_TELEPHONE, "WORK,VOICE"),
        (PR_HOME_TELEPHONE, "HOME,VOICE"),
        (PR_MOBILE_TELEPHONE, "CELL,VOICE"),
        (PR_BUSINESS_FAX, "WORK,FAX"),
    ] {
        if let Some(number) = props.string(id) {
            lines.push(format!("TEL;TYPE={kind}:{}", escape_vcard(number)));
        }
    }
    for lid in LID_EMAIL_ADDRESSES {
        if let Some(email) = props.named_string(lid) {
            lines.push(format!("EMAIL;TYPE=INTERNET:{}", escape_vcard(email)));
        }
    }
    let address = [
        PR_STREET_ADDRESS,
        PR_LOCALITY,
        PR_STATE_OR_PROVINCE,
        PR_POSTAL_CODE,
        PR_COUNTRY,
    ];
    if address.iter().any(|&id| props.string(id).is_some()) {
        let fields: Vec<String> = address.iter().map(|&id| get(id)).collect();
        lines.push(format!("ADR;TYPE=WORK:;;{}", fields.join(";")));
    }
    if let Some(url) = props
        .string(PR_BUSINESS_HOME_PAGE)
        .or_else(|| props.string(PR_PERSONAL_HOME_PAGE))
    {
        lines.push(format!("URL:{}", escape_vcard(url)));
    }
    if let Some(birthday) = props.time(PR_BIRTHDAY) {
        lines.push(format!("BDAY:{}", birthday.format("%Y-%m-%d")));
    }
    lines.push("END:VCARD".to_string());

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

fn escape_vcard(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.trim().chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

// ── Read receipts ───────────────────────────────────────────────

fn receipt_parts(msg: &TnefMessage, class: &str) -> Vec<Part> {
    let props = &msg.props;
    let read = !class.to_ascii_uppercase().ends_with(".IPNNRN");
    let recipient = props
        .string(PR_RECEIVED_BY_EMAIL_ADDRESS)
        .or_else(|| props.string(PR_SENDER_EMAIL_ADDRESS))
        .unwrap_or_default();
    let recipient_name = props
        .string(PR_DISPLAY_TO)
        .or_else(|| props.string(PR_SENDER_NAME))
        .unwrap_or(recipient);
    let subject = props
        .string(PR_ORIGINAL_SUBJECT)
        .or(msg.subject.as_deref())
        .unwrap_or_default();

    let mut text = format!("Your message\r\n\r\n  To: {recipient_name}\r\n  Subject: {subject}\r\n");
    if let Some(sent) = props.time(PR_ORIGINAL_SUBMIT_TIME) {
        text.push_str(&format!("  Sent: {}\r\n", format_date(sent)));
    }
    text.push_str("\r\n");
    let when = props
        .time(PR_RECEIPT_TIME)
        .or(msg.date_sent)
        .map(|t| format!(" on {}", format_date(t)))
        .unwrap_or_default();
    if read {
        text.push_str(&format!("was read{when}.\r\n"));
    } else {
        text.push_str(&format!("was deleted without being read{when}.\r\n"));
    }

    let mut report = String::new();
    if !recipient.is_empty() {
        report.push_str(&format!("Final-Recipient: rfc822;{recipient}\r\n"));
    }
    if let Some(id) = props.string(PR_IN_REPLY_TO_ID) {
        report.push_str(&format!("Original-Message-ID: {id}\r\n"));
    }
    let disposition = if read { "displayed" } else { "deleted" };
    report.push_str(&format!(
        "Disposition: manual-action/MDN-sent-manually; {disposition}\r\n"
    ));

    vec![
        Part::text(utf8_text("plain"), text),
        Part::text(ContentType::new("message", "disposition-notification"), report),
    ]
}

fn format_date(t: DateTime<Utc>) -> String {
    t.to_rfc2822()
}

// ── Generic messages ────────────────────────────────────────────

fn generic_parts(
    msg: &TnefMessage,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<Part>, TnefError> {
    let mut parts = Vec::new();

    if let Some(body) = body_text(msg) {
        parts.push(Part::text(utf8_text("plain"), body));
    }
    match msg.props.get(PR_BODY_HTML) {
        Some(MapiValue::String(html)) => parts.push(Part::text(utf8_text("html"), html.clone())),
        Some(MapiValue::Binary(html)) => {
            let (html, _, _) = msg.encoding().decode(html);
            parts.push(Part::text(utf8_text("html"), html.into_owned()));
        }
        _ => {}
    }
    if let Some(compressed) = msg.props.binary(PR_RTF_COMPRESSED) {
        let rtf = rtf::decompress(compressed)?;
        parts.push(
            Part::leaf(ContentType::new("text", "rtf"), rtf)
                .with_file_name("body.rtf")
                .with_disposition(Disposition::Attachment),
        );
    }
    for attachment in &msg.attachments {
        parts.push(attachment_part(attachment, depth, max_depth)?);
    }
    Ok(parts)
}

fn attachment_part(
    att: &TnefAttachment,
    depth: usize,
    max_depth: usize,
) -> Result<Part, TnefError> {
    let props = &att.props;
    let name = props
        .string(PR_ATTACH_LONG_FILENAME)
        .or_else(|| props.string(PR_ATTACH_FILENAME))
        .or(att.title.as_deref())
        .or(att.transport_name.as_deref())
        .map(str::to_string);

    if props.int(PR_ATTACH_METHOD) == Some(ATTACH_EMBEDDED_MSG) {
        let data = props
            .binary(PR_ATTACH_DATA)
            .or(att.data.as_deref())
            .ok_or_else(|| TnefError::Malformed("embedded message without data".into()))?;
        let inner = embedded_message(data, depth + 1, max_depth)?;
        return Ok(Part::message(inner));
    }

    let data = att
        .data
        .clone()
        .or_else(|| props.binary(PR_ATTACH_DATA).map(<[u8]>::to_vec))
        .unwrap_or_default();
    let content_type = props
        .string(PR_ATTACH_MIME_TAG)
        .map(ContentType::parse)
        .or_else(|| name.as_deref().and_then(content_type_for_file_name))
        .unwrap_or_else(ContentType::octet_stream);

    let is_eml = name
        .as_deref()
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(".eml"));
    if content_type.base_type() == "message/rfc822" || is_eml {
        if let Ok(inner) = crate::parser::mime::parse_message(&data) {
            let mut part = Part::message(inner).with_source(data);
            if let Some(name) = name {
                part = part.with_file_name(name);
            }
            return Ok(part);
        }
    }

    let mut part = Part::leaf(content_type, data).with_disposition(Disposition::Attachment);
    if let Some(name) = name {
        part = part.with_file_name(name);
    }
    if let Some(cid) = props.string(PR_ATTACH_CONTENT_ID) {
        part = part.with_content_id(cid.trim_matches(['<', '>']));
    }
    Ok(part)
}

/// An embedded MAPI message: its own TNEF stream, presented as a message part.
fn embedded_message(data: &[u8], depth: usize, max_depth: usize) -> Result<Part, TnefError> {
    if depth > max_depth {
        return Err(TnefError::TooDeep(max_depth));
    }
    let msg = read_message(data)?;
    let mut parts = to_parts(&msg, depth, max_depth)?;
    let body = match parts.len() {
        0 => Part::text(utf8_text("plain"), ""),
        1 => parts.remove(0),
        _ => Part::multipart(ContentType::new("multipart", "mixed"), parts),
    };

    let mut headers = Vec::new();
    let sender = msg.props.string(PR_SENDER_EMAIL_ADDRESS);
    match (msg.props.string(PR_SENDER_NAME), sender) {
        (Some(name), Some(email)) => headers.push(Header::new("From", format!("\"{name}\" <{email}>"))),
        (None, Some(email)) => headers.push(Header::new("From", email)),
        _ => {}
    }
    if let Some(to) = msg.props.string(PR_DISPLAY_TO) {
        headers.push(Header::new("To", to));
    }
    if let Some(subject) = msg.subject.as_deref().or_else(|| msg.props.string(PR_SUBJECT)) {
        headers.push(Header::new("Subject", subject));
    }
    if let Some(date) = msg.date_sent {
        headers.push(Header::new("Date", format_date(date)));
    }
    if let Some(id) = msg.message_id.as_deref() {
        headers.push(Header::new("Message-ID", id));
    }
    Ok(body.with_headers(headers))
}

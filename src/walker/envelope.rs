//! Envelope Extractor: message-level fields of a (possibly nested) message.

use tracing::debug;

use crate::model::address::EmailAddress;
use crate::model::envelope::{color_label, Envelope, Flags, MessageMeta, Priority};
use crate::model::part::Part;
use crate::parser::header::{
    decode_encoded_words, decode_multi_encoded, parse_date, parse_received_date,
    strip_angle_brackets,
};

use super::sink::Sink;

/// Build the envelope of a message part.
///
/// Store metadata attached to the part wins; otherwise flags, keywords and
/// the received date are derived from headers.
pub fn extract(part: &Part) -> Envelope {
    let default_meta = MessageMeta::default();
    let meta = part.meta().unwrap_or(&default_meta);

    let flags = meta.flags.unwrap_or_else(|| {
        ["Status", "X-Status"]
            .iter()
            .filter_map(|name| part.header(name))
            .fold(Flags::empty(), |acc, value| acc | Flags::from_status(value))
    });

    let user_flags = if meta.user_flags.is_empty() {
        keywords(part)
    } else {
        meta.user_flags.clone()
    };

    let received_date = meta
        .received_date
        .or_else(|| part.header("Received").and_then(parse_received_date));

    Envelope {
        from: addresses(part, "From"),
        to: addresses(part, "To"),
        cc: addresses(part, "Cc"),
        bcc: addresses(part, "Bcc"),
        subject: part
            .header("Subject")
            .map(decode_multi_encoded)
            .unwrap_or_default(),
        sent_date: part.header("Date").and_then(parse_date),
        received_date,
        flags,
        color_label: color_label(&user_flags),
        user_flags,
        priority: priority(part),
        content_id: part
            .header("Content-ID")
            .map(|cid| strip_angle_brackets(cid).to_string()),
        headers: part.headers().to_vec(),
    }
}

/// Message-ID without angle brackets, used to label decode errors.
pub fn message_id(part: &Part) -> Option<String> {
    part.header("Message-ID")
        .map(|id| strip_angle_brackets(id).to_string())
        .filter(|id| !id.is_empty())
}

/// Fire the envelope callbacks in their fixed order.
///
/// Return values are ignored: envelope extraction always runs to the end.
pub fn emit<S: Sink + ?Sized>(envelope: &Envelope, sink: &mut S) {
    debug!(
        subject = %envelope.subject,
        headers = envelope.headers.len(),
        "Emitting envelope"
    );
    sink.on_from(&envelope.from);
    sink.on_to(&envelope.to);
    sink.on_cc(&envelope.cc);
    sink.on_bcc(&envelope.bcc);
    sink.on_subject(&envelope.subject);
    if let Some(date) = envelope.sent_date {
        sink.on_sent_date(date);
    }
    if let Some(date) = envelope.received_date {
        sink.on_received_date(date);
    }
    sink.on_system_flags(envelope.flags);
    sink.on_user_flags(&envelope.user_flags);
    sink.on_color_label(envelope.color_label);
    sink.on_priority(envelope.priority);
    if let Some(cid) = &envelope.content_id {
        sink.on_content_id(cid);
    }
    sink.on_headers(&envelope.headers);
}

/// All addresses of every occurrence of `name`, display names decoded.
fn addresses(part: &Part, name: &str) -> Vec<EmailAddress> {
    part.header_all(name)
        .flat_map(EmailAddress::parse_list)
        .map(|mut addr| {
            if addr.display_name.contains("=?") {
                addr.display_name = decode_encoded_words(&addr.display_name);
            }
            addr
        })
        .filter(|addr| !addr.is_empty())
        .collect()
}

/// User flags from `Keywords` / `X-Keywords` (comma or space separated).
fn keywords(part: &Part) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in part
        .header_all("Keywords")
        .chain(part.header_all("X-Keywords"))
    {
        for word in value.split([',', ' ', '\t']) {
            let word = word.trim();
            if !word.is_empty() && !out.iter().any(|k| k == word) {
                out.push(word.to_string());
            }
        }
    }
    out
}

fn priority(part: &Part) -> Priority {
    part.header("X-Priority")
        .and_then(Priority::from_x_priority)
        .or_else(|| part.header("Importance").and_then(Priority::from_importance))
        .or_else(|| part.header("Priority").and_then(Priority::from_importance))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content_type::ContentType;

    fn message(headers: &[(&str, &str)]) -> Part {
        let mut part = Part::text(ContentType::text_plain(), "body");
        for (name, value) in headers {
            part = part.with_header(*name, *value);
        }
        part.into_message()
    }

    #[test]
    fn test_extract_from_headers() {
        let part = message(&[
            ("From", "=?utf-8?Q?Jos=C3=A9?= <jose@example.com>"),
            ("To", "a@x, \"B, Bee\" <b@x>"),
            ("Subject", "=?iso-8859-1?Q?caf=E9?="),
            ("Date", "Mon, 1 Jan 2024 10:00:00 +0000"),
            ("Status", "RO"),
            ("X-Keywords", "$Work, $cl_2"),
            ("X-Priority", "1 (Highest)"),
            ("Content-ID", "<root@x>"),
        ]);
        let env = extract(&part);
        assert_eq!(env.from, vec![EmailAddress::new("José", "jose@example.com")]);
        assert_eq!(env.to.len(), 2);
        assert_eq!(env.to[1].display_name, "B, Bee");
        assert_eq!(env.subject, "café");
        assert!(env.sent_date.is_some());
        assert_eq!(env.flags, Flags::SEEN);
        assert_eq!(env.user_flags, vec!["$Work", "$cl_2"]);
        assert_eq!(env.color_label, 2);
        assert_eq!(env.priority, Priority::Highest);
        assert_eq!(env.content_id.as_deref(), Some("root@x"));
        assert_eq!(env.headers.len(), 8);
    }

    #[test]
    fn test_meta_wins_over_headers() {
        let meta = MessageMeta {
            flags: Some(Flags::FLAGGED),
            user_flags: vec!["$cl_5".to_string()],
            received_date: None,
        };
        let part = message(&[("Status", "RO")]).with_meta(meta);
        let env = extract(&part);
        assert_eq!(env.flags, Flags::FLAGGED);
        assert_eq!(env.color_label, 5);
    }

    #[test]
    fn test_defaults_for_bare_message() {
        let env = extract(&message(&[]));
        assert!(env.from.is_empty());
        assert_eq!(env.subject, "");
        assert_eq!(env.flags, Flags::empty());
        assert_eq!(env.priority, Priority::Normal);
        assert!(env.content_id.is_none());
    }

    #[derive(Default)]
    struct Order {
        calls: Vec<&'static str>,
    }

    impl Sink for Order {
        fn on_from(&mut self, _: &[EmailAddress]) -> bool {
            self.calls.push("from");
            false
        }
        fn on_subject(&mut self, _: &str) -> bool {
            self.calls.push("subject");
            false
        }
        fn on_sent_date(&mut self, _: chrono::DateTime<chrono::Utc>) -> bool {
            self.calls.push("sent");
            false
        }
        fn on_priority(&mut self, _: Priority) -> bool {
            self.calls.push("priority");
            false
        }
        fn on_content_id(&mut self, _: &str) -> bool {
            self.calls.push("cid");
            false
        }
        fn on_headers(&mut self, _: &[crate::model::part::Header]) -> bool {
            self.calls.push("headers");
            false
        }
    }

    #[test]
    fn test_emit_ignores_stop_and_keeps_order() {
        let part = message(&[("From", "a@x"), ("Subject", "s")]);
        let mut sink = Order::default();
        emit(&extract(&part), &mut sink);
        // No Date and no Content-ID: those callbacks are skipped
        assert_eq!(sink.calls, vec!["from", "subject", "priority", "headers"]);
    }
}

//! A sink that records every event as a serializable value.

use std::fmt;

use chrono::{DateTime, Utc};
use humansize::{format_size, DECIMAL};
use serde::Serialize;

use crate::model::address::EmailAddress;
use crate::model::envelope::{Flags, Priority};
use crate::model::part::{Header, Part};

use super::sink::Sink;

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    From {
        addresses: Vec<String>,
    },
    To {
        addresses: Vec<String>,
    },
    Cc {
        addresses: Vec<String>,
    },
    Bcc {
        addresses: Vec<String>,
    },
    Subject {
        subject: String,
    },
    SentDate {
        date: DateTime<Utc>,
    },
    ReceivedDate {
        date: DateTime<Utc>,
    },
    SystemFlags {
        flags: Flags,
    },
    UserFlags {
        flags: Vec<String>,
    },
    ColorLabel {
        label: u8,
    },
    Priority {
        priority: Priority,
    },
    ContentId {
        content_id: String,
    },
    Headers {
        headers: Vec<Header>,
    },
    InlineText {
        id: String,
        content_type: String,
        text: String,
    },
    InlineUuAttachment {
        id: String,
        file_name: Option<String>,
        size: Option<u64>,
    },
    InlineHtml {
        id: String,
        html: String,
    },
    Attachment {
        id: String,
        content_type: String,
        file_name: Option<String>,
        size: Option<u64>,
        inline: bool,
    },
    Multipart {
        id: String,
        content_type: String,
        count: usize,
    },
    Image {
        id: String,
        content_type: String,
        file_name: Option<String>,
        content_id: Option<String>,
        size: Option<u64>,
    },
    NestedMessage {
        id: String,
        subject: Option<String>,
    },
    SpecialPart {
        id: String,
        content_type: String,
        file_name: Option<String>,
    },
    MessageEnd,
}

impl Event {
    /// Address of a body event, `None` for envelope events.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::InlineText { id, .. }
            | Self::InlineUuAttachment { id, .. }
            | Self::InlineHtml { id, .. }
            | Self::Attachment { id, .. }
            | Self::Multipart { id, .. }
            | Self::Image { id, .. }
            | Self::NestedMessage { id, .. }
            | Self::SpecialPart { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn is_body(&self) -> bool {
        self.id().is_some()
    }

    /// Short kind name, as used in the JSON `event` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::From { .. } => "from",
            Self::To { .. } => "to",
            Self::Cc { .. } => "cc",
            Self::Bcc { .. } => "bcc",
            Self::Subject { .. } => "subject",
            Self::SentDate { .. } => "sent_date",
            Self::ReceivedDate { .. } => "received_date",
            Self::SystemFlags { .. } => "system_flags",
            Self::UserFlags { .. } => "user_flags",
            Self::ColorLabel { .. } => "color_label",
            Self::Priority { .. } => "priority",
            Self::ContentId { .. } => "content_id",
            Self::Headers { .. } => "headers",
            Self::InlineText { .. } => "inline_text",
            Self::InlineUuAttachment { .. } => "inline_uu_attachment",
            Self::InlineHtml { .. } => "inline_html",
            Self::Attachment { .. } => "attachment",
            Self::Multipart { .. } => "multipart",
            Self::Image { .. } => "image",
            Self::NestedMessage { .. } => "nested_message",
            Self::SpecialPart { .. } => "special_part",
            Self::MessageEnd => "message_end",
        }
    }
}

fn size_label(size: Option<u64>) -> String {
    size.map(|s| format_size(s, DECIMAL)).unwrap_or_else(|| "?".to_string())
}

fn join(addresses: &[String]) -> String {
    addresses.join(", ")
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From { addresses } => write!(f, "From: {}", join(addresses)),
            Self::To { addresses } => write!(f, "To: {}", join(addresses)),
            Self::Cc { addresses } => write!(f, "Cc: {}", join(addresses)),
            Self::Bcc { addresses } => write!(f, "Bcc: {}", join(addresses)),
            Self::Subject { subject } => write!(f, "Subject: {subject}"),
            Self::SentDate { date } => write!(f, "Date: {}", date.to_rfc2822()),
            Self::ReceivedDate { date } => write!(f, "Received: {}", date.to_rfc2822()),
            Self::SystemFlags { flags } => write!(f, "Flags: {flags:?}"),
            Self::UserFlags { flags } => write!(f, "Keywords: {}", flags.join(" ")),
            Self::ColorLabel { label } => write!(f, "Color label: {label}"),
            Self::Priority { priority } => write!(f, "Priority: {priority:?}"),
            Self::ContentId { content_id } => write!(f, "Content-ID: {content_id}"),
            Self::Headers { headers } => write!(f, "Headers: {}", headers.len()),
            Self::InlineText {
                id,
                content_type,
                text,
            } => write!(f, "[{id}] {content_type} inline, {} chars", text.chars().count()),
            Self::InlineUuAttachment {
                id,
                file_name,
                size,
            } => write!(
                f,
                "[{id}] uuencoded {} ({})",
                file_name.as_deref().unwrap_or("-"),
                size_label(*size)
            ),
            Self::InlineHtml { id, html } => {
                write!(f, "[{id}] text/html inline, {} chars", html.chars().count())
            }
            Self::Attachment {
                id,
                content_type,
                file_name,
                size,
                inline,
            } => write!(
                f,
                "[{id}] {content_type} {} {} ({})",
                if *inline { "inline" } else { "attachment" },
                file_name.as_deref().unwrap_or("-"),
                size_label(*size)
            ),
            Self::Multipart {
                id,
                content_type,
                count,
            } => write!(f, "[{id}] {content_type} with {count} parts"),
            Self::Image {
                id,
                content_type,
                file_name,
                content_id,
                size,
            } => {
                write!(
                    f,
                    "[{id}] {content_type} image {} ({})",
                    file_name.as_deref().unwrap_or("-"),
                    size_label(*size)
                )?;
                if let Some(cid) = content_id {
                    write!(f, " cid:{cid}")?;
                }
                Ok(())
            }
            Self::NestedMessage { id, subject } => write!(
                f,
                "[{id}] message/rfc822 \"{}\"",
                subject.as_deref().unwrap_or("")
            ),
            Self::SpecialPart {
                id,
                content_type,
                file_name,
            } => write!(
                f,
                "[{id}] {content_type} special {}",
                file_name.as_deref().unwrap_or("-")
            ),
            Self::MessageEnd => write!(f, "End of message"),
        }
    }
}

/// Records events, optionally stopping after a number of body events.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
    stop_after: Option<usize>,
    body_events: usize,
    keep_nested: bool,
    nested: Vec<(String, Part)>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the walker to stop once `n` body events have been recorded.
    pub fn stop_after(mut self, n: usize) -> Self {
        self.stop_after = Some(n);
        self
    }

    /// Keep a copy of every nested message reported, with its address.
    pub fn keep_nested(mut self) -> Self {
        self.keep_nested = true;
        self
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Recorded body events only.
    pub fn body_events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_body())
    }

    /// Nested messages kept by [`keep_nested`](Self::keep_nested).
    pub fn take_nested(&mut self) -> Vec<(String, Part)> {
        std::mem::take(&mut self.nested)
    }

    fn envelope(&mut self, event: Event) -> bool {
        self.events.push(event);
        true
    }

    fn body(&mut self, event: Event) -> bool {
        self.events.push(event);
        self.body_events += 1;
        self.stop_after.is_none_or(|n| self.body_events < n)
    }
}

fn address_strings(addresses: &[EmailAddress]) -> Vec<String> {
    addresses.iter().map(EmailAddress::display).collect()
}

impl Sink for EventLog {
    fn on_from(&mut self, from: &[EmailAddress]) -> bool {
        self.envelope(Event::From {
            addresses: address_strings(from),
        })
    }

    fn on_to(&mut self, to: &[EmailAddress]) -> bool {
        self.envelope(Event::To {
            addresses: address_strings(to),
        })
    }

    fn on_cc(&mut self, cc: &[EmailAddress]) -> bool {
        self.envelope(Event::Cc {
            addresses: address_strings(cc),
        })
    }

    fn on_bcc(&mut self, bcc: &[EmailAddress]) -> bool {
        self.envelope(Event::Bcc {
            addresses: address_strings(bcc),
        })
    }

    fn on_subject(&mut self, subject: &str) -> bool {
        self.envelope(Event::Subject {
            subject: subject.to_string(),
        })
    }

    fn on_sent_date(&mut self, date: DateTime<Utc>) -> bool {
        self.envelope(Event::SentDate { date })
    }

    fn on_received_date(&mut self, date: DateTime<Utc>) -> bool {
        self.envelope(Event::ReceivedDate { date })
    }

    fn on_system_flags(&mut self, flags: Flags) -> bool {
        self.envelope(Event::SystemFlags { flags })
    }

    fn on_user_flags(&mut self, flags: &[String]) -> bool {
        self.envelope(Event::UserFlags {
            flags: flags.to_vec(),
        })
    }

    fn on_color_label(&mut self, label: u8) -> bool {
        self.envelope(Event::ColorLabel { label })
    }

    fn on_priority(&mut self, priority: Priority) -> bool {
        self.envelope(Event::Priority { priority })
    }

    fn on_content_id(&mut self, content_id: &str) -> bool {
        self.envelope(Event::ContentId {
            content_id: content_id.to_string(),
        })
    }

    fn on_headers(&mut self, headers: &[Header]) -> bool {
        self.envelope(Event::Headers {
            headers: headers.to_vec(),
        })
    }

    fn on_inline_plain_text(&mut self, part: &Part, id: &str, text: &str) -> bool {
        self.body(Event::InlineText {
            id: id.to_string(),
            content_type: part.content_type().base_type(),
            text: text.to_string(),
        })
    }

    fn on_inline_uu_attachment(&mut self, part: &Part, id: &str) -> bool {
        self.body(Event::InlineUuAttachment {
            id: id.to_string(),
            file_name: part.file_name().map(str::to_string),
            size: part.size(),
        })
    }

    fn on_inline_html(&mut self, _part: &Part, id: &str, html: &str) -> bool {
        self.body(Event::InlineHtml {
            id: id.to_string(),
            html: html.to_string(),
        })
    }

    fn on_attachment(&mut self, part: &Part, id: &str, inline: bool) -> bool {
        self.body(Event::Attachment {
            id: id.to_string(),
            content_type: part.content_type().base_type(),
            file_name: part.file_name().map(str::to_string),
            size: part.size(),
            inline,
        })
    }

    fn on_multipart(&mut self, part: &Part, id: &str, count: usize) -> bool {
        self.body(Event::Multipart {
            id: id.to_string(),
            content_type: part.content_type().base_type(),
            count,
        })
    }

    fn on_image(&mut self, part: &Part, id: &str, content_id: Option<&str>) -> bool {
        self.body(Event::Image {
            id: id.to_string(),
            content_type: part.content_type().base_type(),
            file_name: part.file_name().map(str::to_string),
            content_id: content_id.map(str::to_string),
            size: part.size(),
        })
    }

    fn on_nested_message(&mut self, _part: &Part, id: &str, nested: &Part) -> bool {
        if self.keep_nested {
            self.nested.push((id.to_string(), nested.clone()));
        }
        self.body(Event::NestedMessage {
            id: id.to_string(),
            subject: nested.header("Subject").map(str::to_string),
        })
    }

    fn on_special_part(&mut self, part: &Part, id: &str) -> bool {
        self.body(Event::SpecialPart {
            id: id.to_string(),
            content_type: part.content_type().base_type(),
            file_name: part.file_name().map(str::to_string),
        })
    }

    fn on_message_end(&mut self) {
        self.events.push(Event::MessageEnd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content_type::ContentType;

    #[test]
    fn test_stop_budget() {
        let part = Part::text(ContentType::text_plain(), "x");
        let mut log = EventLog::new().stop_after(2);
        assert!(log.on_subject("envelope events do not count"));
        assert!(log.on_attachment(&part, "1", false));
        assert!(!log.on_attachment(&part, "2", false));
        assert_eq!(log.body_events().count(), 2);
        assert_eq!(log.events().len(), 3);
    }

    #[test]
    fn test_event_json_shape() {
        let event = Event::Multipart {
            id: "1".to_string(),
            content_type: "multipart/mixed".to_string(),
            count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "multipart");
        assert_eq!(json["id"], "1");
        assert_eq!(json["count"], 2);
        assert_eq!(event.kind(), "multipart");
    }

    #[test]
    fn test_display_attachment() {
        let event = Event::Attachment {
            id: "2".to_string(),
            content_type: "application/pdf".to_string(),
            file_name: Some("a.pdf".to_string()),
            size: Some(2000),
            inline: false,
        };
        assert_eq!(event.to_string(), "[2] application/pdf attachment a.pdf (2 kB)");
    }

    #[test]
    fn test_keep_nested() {
        let inner = Part::text(ContentType::text_plain(), "x")
            .with_header("Subject", "Inner")
            .into_message();
        let wrapper = Part::message(inner.clone());
        let mut log = EventLog::new().keep_nested();
        log.on_nested_message(&wrapper, "3", &inner);
        let nested = log.take_nested();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].0, "3");
        assert!(matches!(
            &log.events()[0],
            Event::NestedMessage { subject: Some(s), .. } if s == "Inner"
        ));
    }
}

//! The event sink driven by [`MessageWalker`](super::MessageWalker).
//!
//! Every method returns `true` to continue and `false` to stop. Body events
//! stop the walk immediately; envelope events cannot stop it (their return
//! value is ignored). All methods default to "continue" so a sink only
//! implements what it cares about.

use chrono::{DateTime, Utc};

use crate::model::address::EmailAddress;
use crate::model::envelope::{Flags, Priority};
use crate::model::part::{Header, Part};

#[allow(unused_variables)]
pub trait Sink {
    // ── Envelope ────────────────────────────────────────────────

    fn on_from(&mut self, from: &[EmailAddress]) -> bool {
        true
    }

    fn on_to(&mut self, to: &[EmailAddress]) -> bool {
        true
    }

    fn on_cc(&mut self, cc: &[EmailAddress]) -> bool {
        true
    }

    fn on_bcc(&mut self, bcc: &[EmailAddress]) -> bool {
        true
    }

    /// Subject with encoded words decoded.
    fn on_subject(&mut self, subject: &str) -> bool {
        true
    }

    fn on_sent_date(&mut self, date: DateTime<Utc>) -> bool {
        true
    }

    fn on_received_date(&mut self, date: DateTime<Utc>) -> bool {
        true
    }

    fn on_system_flags(&mut self, flags: Flags) -> bool {
        true
    }

    fn on_user_flags(&mut self, flags: &[String]) -> bool {
        true
    }

    /// Color label, 0 when none is set.
    fn on_color_label(&mut self, label: u8) -> bool {
        true
    }

    fn on_priority(&mut self, priority: Priority) -> bool {
        true
    }

    fn on_content_id(&mut self, content_id: &str) -> bool {
        true
    }

    fn on_headers(&mut self, headers: &[Header]) -> bool {
        true
    }

    // ── Body ────────────────────────────────────────────────────

    /// Inline `text/plain` or `text/enriched`, decoded. When UU-encoded
    /// files were split out, `text` is what remains.
    fn on_inline_plain_text(&mut self, part: &Part, id: &str, text: &str) -> bool {
        true
    }

    /// A file split out of an inline plain-text part.
    fn on_inline_uu_attachment(&mut self, part: &Part, id: &str) -> bool {
        true
    }

    fn on_inline_html(&mut self, part: &Part, id: &str, html: &str) -> bool {
        true
    }

    /// A part without a more specific event. `inline` reflects the
    /// disposition and file name.
    fn on_attachment(&mut self, part: &Part, id: &str, inline: bool) -> bool {
        true
    }

    /// A multipart container, before its `count` children are visited.
    fn on_multipart(&mut self, part: &Part, id: &str, count: usize) -> bool {
        true
    }

    fn on_image(&mut self, part: &Part, id: &str, content_id: Option<&str>) -> bool {
        true
    }

    /// An encapsulated message. It is not walked; pass `nested` to
    /// [`MessageWalker::parse_with_prefix`](super::MessageWalker::parse_with_prefix)
    /// to descend into it.
    fn on_nested_message(&mut self, part: &Part, id: &str, nested: &Part) -> bool {
        true
    }

    /// Delivery reports, read receipts, `text/rfc822-headers`, cards and calendars.
    fn on_special_part(&mut self, part: &Part, id: &str) -> bool {
        true
    }

    /// Called once when the walk ends, whether it completed or was stopped.
    fn on_message_end(&mut self) {}
}

//! The Structural Walker.
//!
//! [`MessageWalker::parse`] emits the envelope of a message part, then
//! visits the part tree depth-first, left to right. Each part is classified
//! once by [`MessageWalker::classify`] and reported to the [`Sink`] under a
//! dotted address. A sink returning `false` from a body event stops the walk.
//!
//! Addressing follows IMAP conventions: the first multipart container met
//! does not open an addressing level. It is reported under its parent's
//! address (empty for a top-level message) and its children are `1`, `2`, …
//! A nested multipart at `2` has children `2.1`, `2.2`, …

pub mod address;
pub mod envelope;
pub mod record;
pub mod sink;

use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::error::{Result, WalkError};
use crate::legacy::{is_tnef, tnef, uu};
use crate::model::content_type::Disposition;
use crate::model::part::Part;
use crate::parser::mime::parse_message;

pub use address::{identifier, PartAddress};
pub use record::{Event, EventLog};
pub use sink::Sink;

/// Media types reported through [`Sink::on_special_part`].
const SPECIAL_TYPES: &[&str] = &[
    "message/delivery-status",
    "message/disposition-notification",
    "text/rfc822-headers",
    "text/*card",
    "text/*calendar",
];

/// Walker settings; see [`ParserConfig`].
#[derive(Debug, Clone)]
pub struct WalkerOptions {
    pub default_charset: String,
    pub max_depth: usize,
    pub split_uuencode: bool,
    pub decode_tnef: bool,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        Self::from(&ParserConfig::default())
    }
}

impl From<&ParserConfig> for WalkerOptions {
    fn from(config: &ParserConfig) -> Self {
        Self {
            default_charset: config.default_charset.clone(),
            max_depth: config.max_depth,
            split_uuencode: config.split_uuencode,
            decode_tnef: config.decode_tnef,
        }
    }
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Every part was visited.
    Completed,
    /// The sink asked to stop.
    Stopped,
}

/// Classification of one part. Order of the checks in
/// [`MessageWalker::classify`] decides which kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Tnef,
    InlineText,
    TextAttachment,
    InlineHtml,
    HtmlAttachment,
    Multipart,
    Image,
    NestedMessage,
    Special,
    Attachment { inline: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Stopped,
}

/// State of one `parse` call.
struct ParseSession {
    state: State,
    /// The first multipart reuses its parent's prefix; set once that happened.
    multipart_prefix_consumed: bool,
    message_id: Option<String>,
}

impl ParseSession {
    fn new(message_id: Option<String>) -> Self {
        Self {
            state: State::Running,
            multipart_prefix_consumed: false,
            message_id,
        }
    }

    fn is_stopped(&self) -> bool {
        self.state == State::Stopped
    }

    /// Record a sink's answer; `false` moves to `Stopped` for good.
    fn resume(&mut self, keep_going: bool) -> bool {
        if !keep_going {
            self.state = State::Stopped;
        }
        keep_going
    }
}

/// Walks part trees and drives a [`Sink`].
///
/// The walker holds no per-call state and can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct MessageWalker {
    options: WalkerOptions,
}

impl MessageWalker {
    pub fn new(options: WalkerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &WalkerOptions {
        &self.options
    }

    /// Walk `root` with addresses starting at `1`.
    pub fn parse<S: Sink + ?Sized>(&self, root: &Part, sink: &mut S) -> Result<WalkOutcome> {
        self.parse_with_prefix(root, "", sink)
    }

    /// Walk `root` with every address below `prefix`.
    ///
    /// Used to descend into a nested message reported at address `prefix`
    /// so its parts keep globally unique addresses.
    pub fn parse_with_prefix<S: Sink + ?Sized>(
        &self,
        root: &Part,
        prefix: &str,
        sink: &mut S,
    ) -> Result<WalkOutcome> {
        let mut session = ParseSession::new(envelope::message_id(root));

        if root.is_message() {
            envelope::emit(&envelope::extract(root), sink);
        }
        self.visit(root, prefix, 1, 0, &mut session, sink)?;
        sink.on_message_end();

        Ok(if session.is_stopped() {
            WalkOutcome::Stopped
        } else {
            WalkOutcome::Completed
        })
    }

    /// Decide how a part is reported. First match wins.
    pub fn classify(&self, part: &Part) -> PartKind {
        let ct = part.content_type();
        let inline = is_inline(part);
        let plain = ct.matches("text/plain") || ct.matches("text/enriched");
        let html = ct.matches("text/html");

        if self.options.decode_tnef && is_tnef(part) {
            PartKind::Tnef
        } else if plain && inline {
            PartKind::InlineText
        } else if plain {
            PartKind::TextAttachment
        } else if html && inline {
            PartKind::InlineHtml
        } else if html {
            PartKind::HtmlAttachment
        } else if ct.matches("multipart/*") || part.is_multipart() {
            PartKind::Multipart
        } else if ct.matches("image/*") {
            PartKind::Image
        } else if ct.matches("message/rfc822") {
            PartKind::NestedMessage
        } else if SPECIAL_TYPES.iter().any(|pattern| ct.matches(pattern)) {
            PartKind::Special
        } else {
            PartKind::Attachment { inline }
        }
    }

    /// Visit `part` at slot `count` below `prefix`; returns the next free slot.
    fn visit<S: Sink + ?Sized>(
        &self,
        part: &Part,
        prefix: &str,
        count: u32,
        depth: usize,
        session: &mut ParseSession,
        sink: &mut S,
    ) -> Result<u32> {
        let id = identifier(Some(prefix), count);
        if depth > self.options.max_depth {
            return Err(WalkError::structural(
                id,
                format!("nesting deeper than {}", self.options.max_depth),
            ));
        }

        let kind = self.classify(part);
        debug!(
            address = %id,
            content_type = %part.content_type().base_type(),
            ?kind,
            "Visiting part"
        );

        match kind {
            PartKind::Tnef => return self.visit_tnef(part, prefix, count, depth, session, sink),
            PartKind::InlineText => return self.visit_plain_text(part, prefix, count, session, sink),
            PartKind::InlineHtml => {
                let html = self.text_of(part, &id, session)?;
                session.resume(sink.on_inline_html(part, &id, &html));
            }
            PartKind::TextAttachment | PartKind::HtmlAttachment => {
                session.resume(sink.on_attachment(part, &id, false));
            }
            PartKind::Attachment { inline } => {
                session.resume(sink.on_attachment(part, &id, inline));
            }
            PartKind::Multipart => {
                self.visit_multipart(part, prefix, count, depth, session, sink)?;
            }
            PartKind::Image => {
                session.resume(sink.on_image(part, &id, part.content_id()));
            }
            PartKind::NestedMessage => self.visit_nested(part, &id, session, sink),
            PartKind::Special => {
                session.resume(sink.on_special_part(part, &id));
            }
        }
        Ok(count + 1)
    }

    fn visit_multipart<S: Sink + ?Sized>(
        &self,
        part: &Part,
        prefix: &str,
        count: u32,
        depth: usize,
        session: &mut ParseSession,
        sink: &mut S,
    ) -> Result<()> {
        // The first multipart is addressed by its parent, so its children
        // stay at the parent's level.
        let reuses_prefix = !session.multipart_prefix_consumed;
        session.multipart_prefix_consumed = true;
        let id = if reuses_prefix {
            prefix.to_string()
        } else {
            identifier(Some(prefix), count)
        };

        let children = part.children();
        if children.is_empty() {
            return Err(WalkError::structural(id, "multipart without children"));
        }
        if !session.resume(sink.on_multipart(part, &id, children.len())) {
            return Ok(());
        }

        let mut next = 1;
        for child in children {
            next = self.visit(child, &id, next, depth + 1, session, sink)?;
            if session.is_stopped() {
                break;
            }
        }
        Ok(())
    }

    /// Inline plain text, split into clean text plus UU files when it carries any.
    fn visit_plain_text<S: Sink + ?Sized>(
        &self,
        part: &Part,
        prefix: &str,
        count: u32,
        session: &mut ParseSession,
        sink: &mut S,
    ) -> Result<u32> {
        let id = identifier(Some(prefix), count);
        let text = self.text_of(part, &id, session)?;

        let split = if self.options.split_uuencode {
            uu::decode(&text)
        } else {
            None
        };
        let Some(split) = split else {
            session.resume(sink.on_inline_plain_text(part, &id, &text));
            return Ok(count + 1);
        };

        debug!(address = %id, files = split.files.len(), "Split UU-encoded files from text");
        let mut next = count + 1;
        if !session.resume(sink.on_inline_plain_text(part, &id, &split.clean_text)) {
            return Ok(next);
        }
        for file in &split.files {
            let uu_id = identifier(Some(prefix), next);
            next += 1;
            if !session.resume(sink.on_inline_uu_attachment(&file.to_part(), &uu_id)) {
                break;
            }
        }
        Ok(next)
    }

    /// Expanded TNEF parts take consecutive slots under the same prefix.
    fn visit_tnef<S: Sink + ?Sized>(
        &self,
        part: &Part,
        prefix: &str,
        count: u32,
        depth: usize,
        session: &mut ParseSession,
        sink: &mut S,
    ) -> Result<u32> {
        let id = identifier(Some(prefix), count);
        let expanded = part
            .as_bytes()
            .ok_or_else(|| tnef::TnefError::Malformed("container has no payload".into()))
            .and_then(|data| tnef::expand(data, self.options.max_depth));

        match expanded {
            Ok(parts) if !parts.is_empty() => {
                debug!(address = %id, parts = parts.len(), "Expanded TNEF container");
                let mut next = count;
                for sub in &parts {
                    next = self.visit(sub, prefix, next, depth + 1, session, sink)?;
                    if session.is_stopped() {
                        break;
                    }
                }
                Ok(next)
            }
            Ok(_) => {
                debug!(address = %id, "Empty TNEF container, reporting as attachment");
                session.resume(sink.on_attachment(part, &id, is_inline(part)));
                Ok(count + 1)
            }
            Err(e) => {
                warn!(
                    address = %id,
                    error = %e,
                    "TNEF container could not be decoded, reporting as attachment"
                );
                session.resume(sink.on_attachment(part, &id, is_inline(part)));
                Ok(count + 1)
            }
        }
    }

    fn visit_nested<S: Sink + ?Sized>(
        &self,
        part: &Part,
        id: &str,
        session: &mut ParseSession,
        sink: &mut S,
    ) {
        if let Some(nested) = part.as_nested_message() {
            session.resume(sink.on_nested_message(part, id, nested));
            return;
        }
        // The MIME layer left it as bytes (e.g. an encoded message/rfc822)
        match part.as_bytes().map(parse_message) {
            Some(Ok(nested)) => {
                session.resume(sink.on_nested_message(part, id, &nested));
            }
            _ => {
                warn!(address = %id, "Unreadable message/rfc822 part, reporting as attachment");
                session.resume(sink.on_attachment(part, id, is_inline(part)));
            }
        }
    }

    /// Decode a leaf as text with its declared charset, else the default.
    fn text_of(&self, part: &Part, id: &str, session: &ParseSession) -> Result<String> {
        let charset = part
            .content_type()
            .charset()
            .unwrap_or(&self.options.default_charset);
        part.as_text(charset).map_err(|e| WalkError::ContentDecode {
            address: id.to_string(),
            message_id: session.message_id.clone(),
            reason: e.to_string(),
        })
    }
}

/// Inline means no attachment-style disposition and no file name.
pub fn is_inline(part: &Part) -> bool {
    matches!(part.disposition(), None | Some(Disposition::Inline)) && part.file_name().is_none()
}

/// Walk `root` with default options.
pub fn parse<S: Sink + ?Sized>(root: &Part, sink: &mut S) -> Result<WalkOutcome> {
    MessageWalker::default().parse(root, sink)
}

//! The Part Model: one node of a message's MIME tree.
//!
//! Parts are built once by the MIME layer ([`crate::parser::mime`]) or by
//! the legacy adapters, and are read-only afterwards. The walker only
//! queries them.

use std::borrow::Cow;

use crate::error::{Result, WalkError};

use super::content_type::{ContentType, Disposition};
use super::envelope::MessageMeta;

/// One raw header field. Names keep their original spelling; lookups are
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Payload of a part.
#[derive(Debug, Clone)]
pub enum Body {
    /// Transfer-decoded bytes, still in the part's charset.
    Bytes(Vec<u8>),
    /// Text that the MIME layer already converted to UTF-8.
    Text(String),
    /// Children of a multipart container, in document order.
    Multipart(Vec<Part>),
    /// An encapsulated `message/rfc822`.
    Message(Box<Part>),
}

/// A node of the MIME tree: exactly one of multipart container,
/// message container or leaf.
#[derive(Debug, Clone)]
pub struct Part {
    content_type: ContentType,
    disposition: Option<Disposition>,
    file_name: Option<String>,
    content_id: Option<String>,
    size: Option<u64>,
    headers: Vec<Header>,
    body: Body,
    /// Present when this part is a complete message (top-level or nested).
    message: Option<MessageMeta>,
    /// Original bytes of an encapsulated message, when known.
    source: Option<Vec<u8>>,
}

impl Part {
    /// A leaf part holding `data`.
    pub fn leaf(content_type: ContentType, data: Vec<u8>) -> Self {
        let size = Some(data.len() as u64);
        Self {
            content_type,
            disposition: None,
            file_name: None,
            content_id: None,
            size,
            headers: Vec::new(),
            body: Body::Bytes(data),
            message: None,
            source: None,
        }
    }

    /// A leaf part holding already decoded text.
    pub fn text(content_type: ContentType, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut part = Self::leaf(content_type, Vec::new());
        part.size = Some(text.len() as u64);
        part.body = Body::Text(text);
        part
    }

    /// A multipart container. `content_type` should be `multipart/*`.
    pub fn multipart(content_type: ContentType, children: Vec<Part>) -> Self {
        Self {
            content_type,
            disposition: None,
            file_name: None,
            content_id: None,
            size: None,
            headers: Vec::new(),
            body: Body::Multipart(children),
            message: None,
            source: None,
        }
    }

    /// A `message/rfc822` container wrapping a complete message.
    pub fn message(inner: Part) -> Self {
        Self {
            content_type: ContentType::new("message", "rfc822"),
            disposition: None,
            file_name: None,
            content_id: None,
            size: inner.size,
            headers: Vec::new(),
            body: Body::Message(Box::new(inner.into_message())),
            message: None,
            source: None,
        }
    }

    /// Mark this part as a complete message so the walker extracts its envelope.
    pub fn into_message(mut self) -> Self {
        if self.message.is_none() {
            self.message = Some(MessageMeta::default());
        }
        self
    }

    /// Attach store-level metadata (flags, received date) to a message part.
    pub fn with_meta(mut self, meta: MessageMeta) -> Self {
        self.message = Some(meta);
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_content_id(mut self, cid: impl Into<String>) -> Self {
        self.content_id = Some(cid.into());
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_headers(mut self, headers: Vec<Header>) -> Self {
        self.headers = headers;
        self
    }

    /// Keep the raw RFC 5322 bytes of an encapsulated message.
    pub fn with_source(mut self, raw: Vec<u8>) -> Self {
        self.source = Some(raw);
        self
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn disposition(&self) -> Option<&Disposition> {
        self.disposition.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Decoded size in bytes, `None` when unknown.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Content-ID without angle brackets.
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// First value of a header (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// All values of a header, in order of appearance.
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// `true` when this part is a complete message with an envelope.
    pub fn is_message(&self) -> bool {
        self.message.is_some()
    }

    /// Store-level metadata of a message part.
    pub fn meta(&self) -> Option<&MessageMeta> {
        self.message.as_ref()
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }

    /// Number of children (0 for anything but a multipart).
    pub fn child_count(&self) -> usize {
        match &self.body {
            Body::Multipart(children) => children.len(),
            _ => 0,
        }
    }

    /// Child at `index` (0-based, document order).
    pub fn child(&self, index: usize) -> Option<&Part> {
        match &self.body {
            Body::Multipart(children) => children.get(index),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Part] {
        match &self.body {
            Body::Multipart(children) => children,
            _ => &[],
        }
    }

    /// Raw payload of a leaf part.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Bytes(data) => Some(data),
            Body::Text(text) => Some(text.as_bytes()),
            Body::Multipart(_) | Body::Message(_) => None,
        }
    }

    /// Decode a leaf payload as text using the `charset` label.
    ///
    /// Text the MIME layer already decoded is returned as is.
    pub fn as_text(&self, charset: &str) -> Result<String> {
        match &self.body {
            Body::Text(text) => Ok(text.clone()),
            Body::Bytes(data) => decode_charset(charset, data).map(Cow::into_owned),
            Body::Multipart(_) | Body::Message(_) => Err(WalkError::InvalidMessage(format!(
                "{} is a container, not a text part",
                self.content_type.base_type()
            ))),
        }
    }

    /// Raw bytes of an encapsulated message, if the builder kept them.
    pub fn source(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }

    /// The encapsulated message of a `message/rfc822` part.
    pub fn as_nested_message(&self) -> Option<&Part> {
        match &self.body {
            Body::Message(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Decode `data` with the encoding named by `charset`.
pub fn decode_charset<'a>(charset: &str, data: &'a [u8]) -> Result<Cow<'a, str>> {
    let label = charset.trim().trim_matches('"');
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
        .ok_or_else(|| WalkError::UnsupportedCharset(label.to_string()))?;
    let (decoded, _, _) = encoding.decode(data);
    Ok(decoded)
}

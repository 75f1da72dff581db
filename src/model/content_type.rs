//! MIME media types and content dispositions (RFC 2045 §5, RFC 2183).

use std::fmt;

/// A MIME media type with its parameters.
///
/// Type, subtype and parameter names are stored lowercase; parameter
/// values keep their original case.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ContentType {
    primary: String,
    sub: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    /// Build a content type from its two halves, without parameters.
    pub fn new(primary: &str, sub: &str) -> Self {
        Self {
            primary: primary.trim().to_lowercase(),
            sub: sub.trim().to_lowercase(),
            params: Vec::new(),
        }
    }

    /// Parse a `Content-Type` header value such as `text/plain; charset="utf-8"`.
    ///
    /// A missing or malformed media type yields `text/plain` (RFC 2045 §5.2).
    pub fn parse(raw: &str) -> Self {
        let mut pieces = split_params(raw).into_iter();
        let media = pieces.next().unwrap_or_default();
        let mut ct = match media.split_once('/') {
            Some((primary, sub)) if !primary.trim().is_empty() && !sub.trim().is_empty() => {
                Self::new(primary, sub)
            }
            _ => Self::text_plain(),
        };
        for piece in pieces {
            if let Some((name, value)) = piece.split_once('=') {
                ct.params
                    .push((name.trim().to_lowercase(), unquote(value.trim())));
            }
        }
        ct
    }

    /// `text/plain`, the default media type.
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// `application/octet-stream`, the generic binary fallback.
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// Add (or replace) a parameter.
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        let name = name.to_lowercase();
        self.params.retain(|(k, _)| *k != name);
        self.params.push((name, value.to_string()));
        self
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn sub(&self) -> &str {
        &self.sub
    }

    /// `type/subtype` without parameters.
    pub fn base_type(&self) -> String {
        format!("{}/{}", self.primary, self.sub)
    }

    /// Look up a parameter by (case-insensitive) name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The declared `charset` parameter, if any.
    pub fn charset(&self) -> Option<&str> {
        self.param("charset").filter(|c| !c.trim().is_empty())
    }

    /// Match against a pattern like `text/plain`, `multipart/*` or `text/*card`.
    ///
    /// A `*` in the subtype matches any run of characters.
    pub fn matches(&self, pattern: &str) -> bool {
        let Some((primary, sub)) = pattern.split_once('/') else {
            return false;
        };
        if !primary.eq_ignore_ascii_case(&self.primary) {
            return false;
        }
        match sub.split_once('*') {
            None => sub.eq_ignore_ascii_case(&self.sub),
            Some((prefix, suffix)) => {
                self.sub.len() >= prefix.len() + suffix.len()
                    && self.sub.starts_with(&prefix.to_lowercase())
                    && self.sub.ends_with(&suffix.to_lowercase())
            }
        }
    }
}

impl Default for ContentType {
    fn default() -> Self {
        Self::text_plain()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary, self.sub)?;
        for (name, value) in &self.params {
            write!(f, "; {name}=\"{value}\"")?;
        }
        Ok(())
    }
}

/// Value of a `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Disposition {
    Inline,
    Attachment,
    /// Any other token, lowercased.
    Other(String),
}

impl Disposition {
    /// Parse the disposition type from a header value (parameters are ignored).
    pub fn parse(raw: &str) -> Self {
        let token = raw.split(';').next().unwrap_or("").trim().to_lowercase();
        match token.as_str() {
            "inline" => Self::Inline,
            "attachment" => Self::Attachment,
            _ => Self::Other(token),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
            Self::Other(s) => s,
        }
    }
}

/// Split a header value on `;` outside of double quotes.
fn split_params(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => out.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    out.push(current);
    out
}

fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].replace("\\\"", "\"")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_params() {
        let ct = ContentType::parse("Text/Plain; charset=\"ISO-8859-1\"; format=flowed");
        assert_eq!(ct.base_type(), "text/plain");
        assert_eq!(ct.charset(), Some("ISO-8859-1"));
        assert_eq!(ct.param("FORMAT"), Some("flowed"));
    }

    #[test]
    fn test_parse_quoted_semicolon() {
        let ct = ContentType::parse("application/pdf; name=\"a;b.pdf\"");
        assert_eq!(ct.param("name"), Some("a;b.pdf"));
    }

    #[test]
    fn test_parse_garbage_defaults_to_text_plain() {
        assert_eq!(ContentType::parse("garbage").base_type(), "text/plain");
        assert_eq!(ContentType::parse("").base_type(), "text/plain");
    }

    #[test]
    fn test_empty_charset_is_none() {
        let ct = ContentType::parse("text/plain; charset=\"\"");
        assert_eq!(ct.charset(), None);
    }

    #[test]
    fn test_matches_patterns() {
        let vcard = ContentType::parse("text/x-vcard");
        assert!(vcard.matches("text/*card"));
        assert!(!vcard.matches("text/*calendar"));
        assert!(ContentType::parse("text/calendar").matches("text/*calendar"));
        assert!(ContentType::parse("multipart/mixed").matches("multipart/*"));
        assert!(ContentType::parse("image/PNG").matches("image/*"));
        assert!(!ContentType::parse("text/html").matches("text/plain"));
    }

    #[test]
    fn test_disposition_parse() {
        assert_eq!(
            Disposition::parse("attachment; filename=\"x.pdf\""),
            Disposition::Attachment
        );
        assert_eq!(Disposition::parse("INLINE"), Disposition::Inline);
        assert_eq!(
            Disposition::parse("form-data"),
            Disposition::Other("form-data".to_string())
        );
    }
}

//! Email address parsing for envelope headers (RFC 5322 §3.4).

/// A parsed mailbox.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
        }
    }

    /// Parse a single mailbox.
    ///
    /// Accepts `user@domain`, `<user@domain>`, `Name <user@domain>`,
    /// `"Quoted, Name" <user@domain>` and the obsolete `user@domain (Name)`.
    /// Anything else is kept verbatim as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self::new(
                    strip_quotes(&trimmed[..open]),
                    trimmed[open + 1..close].trim(),
                );
            }
        }

        if let (Some(open), true) = (trimmed.find('('), trimmed.ends_with(')')) {
            let address = trimmed[..open].trim();
            if address.contains('@') {
                return Self::new(
                    strip_quotes(&trimmed[open + 1..trimmed.len() - 1]),
                    address,
                );
            }
        }

        Self::new("", trimmed)
    }

    /// Parse a comma-separated address list.
    ///
    /// Quoted commas are respected and group syntax (`Team: a@b, c@d;`) is
    /// flattened into its members.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        let mut flush = |segment: &mut String| {
            let addr = Self::parse(segment);
            if !addr.is_empty() {
                results.push(addr);
            }
            segment.clear();
        };

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                // Group display name: drop it, keep the members.
                ':' if !in_quotes && !in_angle => current.clear(),
                ',' | ';' if !in_quotes && !in_angle => flush(&mut current),
                _ => current.push(ch),
            }
        }
        flush(&mut current);

        results
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>");
        assert_eq!(addr.address, "user1@example.com");
        assert_eq!(addr.display_name, "User One");
    }

    #[test]
    fn test_parse_comment_name() {
        let addr = EmailAddress::parse("user@example.com (Old Style)");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "Old Style");
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = EmailAddress::parse_list("\"Last, First\" <a@b.com>, other@c.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Last, First");
        assert_eq!(list[1].address, "other@c.com");
    }

    #[test]
    fn test_parse_list_group() {
        let list = EmailAddress::parse_list("Team: a@b.com, C <c@d.com>;, solo@e.com");
        let addrs: Vec<&str> = list.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(addrs, vec!["a@b.com", "c@d.com", "solo@e.com"]);
    }

    #[test]
    fn test_parse_list_empty_group() {
        assert!(EmailAddress::parse_list("undisclosed-recipients:;").is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            EmailAddress::new("Alice", "alice@example.com").display(),
            "Alice <alice@example.com>"
        );
        assert_eq!(EmailAddress::new("", "a@x").to_string(), "a@x");
    }
}

//! Message-level metadata: flags, priority and the assembled envelope.

use bitflags::bitflags;
use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::part::Header;

bitflags! {
    /// System flags of a stored message.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct Flags: u32 {
        const ANSWERED = 1 << 0;
        const DELETED = 1 << 1;
        const DRAFT = 1 << 2;
        const FLAGGED = 1 << 3;
        const RECENT = 1 << 4;
        const SEEN = 1 << 5;
        const USER = 1 << 6;
        const SPAM = 1 << 7;
        const FORWARDED = 1 << 8;
        const READ_ACK = 1 << 9;
    }
}

impl Flags {
    /// Flags encoded in mbox `Status` / `X-Status` header values
    /// (`R` seen, `O` old, `A` answered, `F` flagged, `D` deleted, `T` draft).
    pub fn from_status(value: &str) -> Self {
        let mut flags = Self::empty();
        for ch in value.chars() {
            match ch {
                'R' => flags |= Self::SEEN,
                'A' => flags |= Self::ANSWERED,
                'F' => flags |= Self::FLAGGED,
                'D' => flags |= Self::DELETED,
                'T' => flags |= Self::DRAFT,
                _ => {}
            }
        }
        flags
    }
}

/// Message priority, as in `X-Priority` (1 = highest … 5 = lowest).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Priority {
    Highest,
    High,
    #[default]
    Normal,
    Low,
    Lowest,
}

impl Priority {
    pub fn from_level(level: u8) -> Self {
        match level {
            0 | 1 => Self::Highest,
            2 => Self::High,
            3 => Self::Normal,
            4 => Self::Low,
            _ => Self::Lowest,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Self::Highest => 1,
            Self::High => 2,
            Self::Normal => 3,
            Self::Low => 4,
            Self::Lowest => 5,
        }
    }

    /// Parse an `X-Priority` value such as `"2 (High)"`.
    pub fn from_x_priority(value: &str) -> Option<Self> {
        let digits: String = value
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse::<u8>().ok().map(Self::from_level)
    }

    /// Parse an `Importance` / `Priority` value (`high`, `urgent`, `low`, …).
    pub fn from_importance(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" | "urgent" => Some(Self::High),
            "normal" => Some(Self::Normal),
            "low" | "non-urgent" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Store-level metadata that does not live in the message bytes.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageMeta {
    /// System flags, `None` to derive them from `Status` headers.
    pub flags: Option<Flags>,
    /// User-defined flag names (keywords).
    pub user_flags: Vec<String>,
    /// Date the message arrived in the store.
    pub received_date: Option<DateTime<Utc>>,
}

/// Prefix of the user flag carrying a color label (`$cl_3` → label 3).
pub const COLOR_LABEL_PREFIX: &str = "$cl_";

/// Extract the color label from a list of user flags; 0 means none.
pub fn color_label(user_flags: &[String]) -> u8 {
    user_flags
        .iter()
        .filter_map(|f| f.strip_prefix(COLOR_LABEL_PREFIX))
        .filter_map(|n| n.parse::<u8>().ok())
        .next_back()
        .unwrap_or(0)
}

/// Everything the Envelope Extractor reports about one message.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub subject: String,
    pub sent_date: Option<DateTime<Utc>>,
    pub received_date: Option<DateTime<Utc>>,
    pub flags: Flags,
    pub user_flags: Vec<String>,
    pub color_label: u8,
    pub priority: Priority,
    pub content_id: Option<String>,
    pub headers: Vec<Header>,
}

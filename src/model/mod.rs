//! Core data model: the Part tree, media types, envelope and addresses.

pub mod address;
pub mod content_type;
pub mod envelope;
pub mod part;

pub use address::EmailAddress;
pub use content_type::{ContentType, Disposition};
pub use envelope::{Envelope, Flags, MessageMeta, Priority};
pub use part::{Body, Header, Part};

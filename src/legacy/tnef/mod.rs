//! TNEF (`winmail.dat`) containers.
//!
//! [`expand`] turns a container into a flat list of ordinary parts: a vCard
//! for contacts, a text part plus a disposition notification for read
//! receipts, and body/RTF/attachments/embedded messages for everything else.
//! Any error means the caller should treat the container as an opaque
//! attachment.

mod convert;
pub mod mapi;
pub mod reader;
pub mod rtf;

use thiserror::Error;

use crate::model::part::Part;

pub use convert::vcard;
pub use reader::{read_message, TnefMessage};

#[derive(Debug, Error)]
pub enum TnefError {
    #[error("not a TNEF stream (signature {0:#010x})")]
    BadSignature(u32),

    #[error("TNEF stream truncated at offset {offset}")]
    Truncated { offset: u64 },

    #[error("checksum mismatch in attribute {id:#010x}")]
    Checksum { id: u32 },

    #[error("malformed TNEF data: {0}")]
    Malformed(String),

    #[error("embedded messages nested deeper than {0}")]
    TooDeep(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Expand a TNEF container into MIME-shaped parts.
///
/// `max_depth` bounds the nesting of embedded messages.
pub fn expand(data: &[u8], max_depth: usize) -> Result<Vec<Part>, TnefError> {
    let message = reader::read_message(data)?;
    convert::to_parts(&message, 0, max_depth)
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Builders for synthetic TNEF streams.

    use super::mapi::{PT_BINARY, PT_LONG, PT_OBJECT, PT_STRING8, PT_SYSTIME, PT_UNICODE};
    use super::reader::{checksum_of, LVL_ATTACHMENT, LVL_MESSAGE, TNEF_SIGNATURE};

    pub struct TnefBuilder {
        buf: Vec<u8>,
    }

    impl TnefBuilder {
        pub fn new() -> Self {
            let mut buf = Vec::new();
            buf.extend_from_slice(&TNEF_SIGNATURE.to_le_bytes());
            buf.extend_from_slice(&0x0001u16.to_le_bytes());
            Self { buf }
        }

        fn attr(mut self, level: u8, id: u32, data: &[u8]) -> Self {
            self.buf.push(level);
            self.buf.extend_from_slice(&id.to_le_bytes());
            self.buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
            self.buf.extend_from_slice(data);
            self.buf.extend_from_slice(&checksum_of(data).to_le_bytes());
            self
        }

        pub fn message_attr(self, id: u32, data: &[u8]) -> Self {
            self.attr(LVL_MESSAGE, id, data)
        }

        pub fn attachment_attr(self, id: u32, data: &[u8]) -> Self {
            self.attr(LVL_ATTACHMENT, id, data)
        }

        pub fn build(self) -> Vec<u8> {
            self.buf
        }
    }

    pub struct PropsBuilder {
        count: u32,
        buf: Vec<u8>,
    }

    impl PropsBuilder {
        pub fn new() -> Self {
            Self {
                count: 0,
                buf: Vec::new(),
            }
        }

        fn tag(mut self, prop_type: u16, id: u16) -> Self {
            self.count += 1;
            self.buf.extend_from_slice(&prop_type.to_le_bytes());
            self.buf.extend_from_slice(&id.to_le_bytes());
            self
        }

        fn variable(mut self, data: &[u8]) -> Self {
            self.buf.extend_from_slice(&1u32.to_le_bytes());
            self.buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
            self.buf.extend_from_slice(data);
            let pad = (4 - data.len() % 4) % 4;
            self.buf.extend(std::iter::repeat(0u8).take(pad));
            self
        }

        pub fn string8(self, id: u16, value: &str) -> Self {
            self.string8_raw(id, value.as_bytes())
        }

        pub fn string8_raw(self, id: u16, value: &[u8]) -> Self {
            let mut data = value.to_vec();
            data.push(0);
            self.tag(PT_STRING8, id).variable(&data)
        }

        pub fn unicode(self, id: u16, value: &str) -> Self {
            self.tag(PT_UNICODE, id).variable(&utf16z(value))
        }

        pub fn named_unicode(mut self, lid: u32, value: &str) -> Self {
            self = self.tag(PT_UNICODE, 0x8000);
            self.buf.extend_from_slice(&[0u8; 16]);
            self.buf.extend_from_slice(&0u32.to_le_bytes());
            self.buf.extend_from_slice(&lid.to_le_bytes());
            self.variable(&utf16z(value))
        }

        pub fn long(mut self, id: u16, value: i32) -> Self {
            self = self.tag(PT_LONG, id);
            self.buf.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub fn systime(mut self, id: u16, ticks: u64) -> Self {
            self = self.tag(PT_SYSTIME, id);
            self.buf.extend_from_slice(&ticks.to_le_bytes());
            self
        }

        pub fn binary(self, id: u16, value: &[u8]) -> Self {
            self.tag(PT_BINARY, id).variable(value)
        }

        pub fn object(self, id: u16, value: &[u8]) -> Self {
            let mut data = vec![0u8; 16];
            data.extend_from_slice(value);
            self.tag(PT_OBJECT, id).variable(&data)
        }

        pub fn build(self) -> Vec<u8> {
            let mut out = self.count.to_le_bytes().to_vec();
            out.extend_from_slice(&self.buf);
            out
        }
    }

    fn utf16z(value: &str) -> Vec<u8> {
        value
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::reader::{ATT_BODY, ATT_MESSAGE_CLASS};
    use super::testutil::TnefBuilder;
    use super::*;

    #[test]
    fn test_expand_plain_note() {
        let data = TnefBuilder::new()
            .message_attr(ATT_MESSAGE_CLASS, b"IPM.Note\0")
            .message_attr(ATT_BODY, b"Body text\0")
            .build();
        let parts = expand(&data, 4).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].as_text("utf-8").unwrap(), "Body text");
    }

    #[test]
    fn test_expand_rejects_garbage() {
        assert!(expand(b"not tnef at all", 4).is_err());
        assert!(expand(&[], 4).is_err());
    }
}

//! MAPI property blocks carried by `attMAPIProps` and `attAttachment`.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};

use super::TnefError;

// Property types
pub const PT_SHORT: u16 = 0x0002;
pub const PT_LONG: u16 = 0x0003;
pub const PT_FLOAT: u16 = 0x0004;
pub const PT_DOUBLE: u16 = 0x0005;
pub const PT_CURRENCY: u16 = 0x0006;
pub const PT_APPTIME: u16 = 0x0007;
pub const PT_ERROR: u16 = 0x000A;
pub const PT_BOOLEAN: u16 = 0x000B;
pub const PT_OBJECT: u16 = 0x000D;
pub const PT_I8: u16 = 0x0014;
pub const PT_STRING8: u16 = 0x001E;
pub const PT_UNICODE: u16 = 0x001F;
pub const PT_SYSTIME: u16 = 0x0040;
pub const PT_CLSID: u16 = 0x0048;
pub const PT_BINARY: u16 = 0x0102;
pub const MV_FLAG: u16 = 0x1000;

// Message properties
pub const PR_MESSAGE_CLASS: u16 = 0x001A;
pub const PR_SUBJECT: u16 = 0x0037;
pub const PR_BODY: u16 = 0x1000;
pub const PR_RTF_COMPRESSED: u16 = 0x1009;
pub const PR_BODY_HTML: u16 = 0x1013;

// Attachment properties
pub const PR_ATTACH_DATA: u16 = 0x3701;
pub const PR_ATTACH_FILENAME: u16 = 0x3704;
pub const PR_ATTACH_METHOD: u16 = 0x3705;
pub const PR_ATTACH_LONG_FILENAME: u16 = 0x3707;
pub const PR_ATTACH_MIME_TAG: u16 = 0x370E;
pub const PR_ATTACH_CONTENT_ID: u16 = 0x3712;
pub const ATTACH_EMBEDDED_MSG: i64 = 5;

// Read receipt properties
pub const PR_RECEIPT_TIME: u16 = 0x002A;
pub const PR_ORIGINAL_SUBJECT: u16 = 0x0049;
pub const PR_ORIGINAL_SUBMIT_TIME: u16 = 0x004E;
pub const PR_RECEIVED_BY_EMAIL_ADDRESS: u16 = 0x0076;
pub const PR_SENDER_NAME: u16 = 0x0C1A;
pub const PR_SENDER_EMAIL_ADDRESS: u16 = 0x0C1F;
pub const PR_DISPLAY_TO: u16 = 0x0E04;
pub const PR_IN_REPLY_TO_ID: u16 = 0x1042;

// Contact properties
pub const PR_DISPLAY_NAME: u16 = 0x3001;
pub const PR_GENERATION: u16 = 0x3A05;
pub const PR_GIVEN_NAME: u16 = 0x3A06;
pub const PR_BUSINESS_TELEPHONE: u16 = 0x3A08;
pub const PR_HOME_TELEPHONE: u16 = 0x3A09;
pub const PR_SURNAME: u16 = 0x3A11;
pub const PR_COMPANY_NAME: u16 = 0x3A16;
pub const PR_TITLE: u16 = 0x3A17;
pub const PR_DEPARTMENT_NAME: u16 = 0x3A18;
pub const PR_MOBILE_TELEPHONE: u16 = 0x3A1C;
pub const PR_BUSINESS_FAX: u16 = 0x3A24;
pub const PR_COUNTRY: u16 = 0x3A26;
pub const PR_LOCALITY: u16 = 0x3A27;
pub const PR_STATE_OR_PROVINCE: u16 = 0x3A28;
pub const PR_STREET_ADDRESS: u16 = 0x3A29;
pub const PR_POSTAL_CODE: u16 = 0x3A2A;
pub const PR_BIRTHDAY: u16 = 0x3A42;
pub const PR_MIDDLE_NAME: u16 = 0x3A44;
pub const PR_DISPLAY_NAME_PREFIX: u16 = 0x3A45;
pub const PR_PERSONAL_HOME_PAGE: u16 = 0x3A50;
pub const PR_BUSINESS_HOME_PAGE: u16 = 0x3A51;

/// Named-property LIDs of the three contact e-mail addresses.
pub const LID_EMAIL_ADDRESSES: [u32; 3] = [0x8083, 0x8093, 0x80A3];

/// Seconds between 1601-01-01 and 1970-01-01.
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

/// Name of a named property (id >= 0x8000).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropName {
    Lid([u8; 16], u32),
    Name([u8; 16], String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapiValue {
    Int(i64),
    Bool(bool),
    Float(f64),
    Time(DateTime<Utc>),
    String(String),
    Binary(Vec<u8>),
    Guid([u8; 16]),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapiProp {
    pub id: u16,
    pub prop_type: u16,
    pub name: Option<PropName>,
    pub values: Vec<MapiValue>,
}

impl MapiProp {
    pub fn first(&self) -> Option<&MapiValue> {
        self.values.first()
    }
}

/// A property list; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapiProps(Vec<MapiProp>);

impl MapiProps {
    pub fn extend(&mut self, other: MapiProps) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapiProp> {
        self.0.iter()
    }

    /// First unnamed property with this id.
    pub fn get(&self, id: u16) -> Option<&MapiValue> {
        self.0
            .iter()
            .find(|p| p.id == id && p.name.is_none())
            .and_then(MapiProp::first)
    }

    /// First named property with this LID.
    pub fn get_named(&self, lid: u32) -> Option<&MapiValue> {
        self.0
            .iter()
            .find(|p| matches!(p.name, Some(PropName::Lid(_, l)) if l == lid))
            .and_then(MapiProp::first)
    }

    /// Non-empty string value.
    pub fn string(&self, id: u16) -> Option<&str> {
        value_str(self.get(id)?)
    }

    pub fn named_string(&self, lid: u32) -> Option<&str> {
        value_str(self.get_named(lid)?)
    }

    pub fn binary(&self, id: u16) -> Option<&[u8]> {
        match self.get(id)? {
            MapiValue::Binary(data) => Some(data),
            MapiValue::String(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    pub fn int(&self, id: u16) -> Option<i64> {
        match self.get(id)? {
            MapiValue::Int(v) => Some(*v),
            MapiValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn time(&self, id: u16) -> Option<DateTime<Utc>> {
        match self.get(id)? {
            MapiValue::Time(t) => Some(*t),
            _ => None,
        }
    }
}

fn value_str(value: &MapiValue) -> Option<&str> {
    match value {
        MapiValue::String(s) if !s.trim().is_empty() => Some(s.trim_end_matches('\0')),
        _ => None,
    }
}

/// Decode a property block. 8-bit strings use `encoding`.
pub fn read_props(
    data: &[u8],
    encoding: &'static encoding_rs::Encoding,
) -> Result<MapiProps, TnefError> {
    let mut cursor = Cursor::new(data);
    let count = cursor.read_u32::<LittleEndian>()?;
    let mut props = Vec::with_capacity(count.min(1024) as usize);

    for _ in 0..count {
        let prop_type = cursor.read_u16::<LittleEndian>()?;
        let id = cursor.read_u16::<LittleEndian>()?;
        let name = if id >= 0x8000 {
            Some(read_prop_name(&mut cursor)?)
        } else {
            None
        };

        let base_type = prop_type & !MV_FLAG;
        let multi = prop_type & MV_FLAG != 0;
        let values = if multi || is_variable(base_type) {
            let n = cursor.read_u32::<LittleEndian>()?;
            let mut values = Vec::with_capacity(n.min(1024) as usize);
            for _ in 0..n {
                values.push(read_value(&mut cursor, base_type, encoding)?);
            }
            values
        } else {
            vec![read_value(&mut cursor, base_type, encoding)?]
        };

        props.push(MapiProp {
            id,
            prop_type,
            name,
            values,
        });
    }
    Ok(MapiProps(props))
}

fn is_variable(base_type: u16) -> bool {
    matches!(base_type, PT_STRING8 | PT_UNICODE | PT_BINARY | PT_OBJECT)
}

fn read_prop_name(cursor: &mut Cursor<&[u8]>) -> Result<PropName, TnefError> {
    let mut guid = [0u8; 16];
    cursor.read_exact(&mut guid)?;
    match cursor.read_u32::<LittleEndian>()? {
        0 => Ok(PropName::Lid(guid, cursor.read_u32::<LittleEndian>()?)),
        1 => {
            let len = cursor.read_u32::<LittleEndian>()? as usize;
            let raw = read_padded(cursor, len)?;
            Ok(PropName::Name(guid, decode_utf16le(&raw)))
        }
        kind => Err(TnefError::Malformed(format!(
            "unknown property name kind {kind}"
        ))),
    }
}

fn read_value(
    cursor: &mut Cursor<&[u8]>,
    base_type: u16,
    encoding: &'static encoding_rs::Encoding,
) -> Result<MapiValue, TnefError> {
    let value = match base_type {
        PT_SHORT => {
            let v = cursor.read_i16::<LittleEndian>()?;
            cursor.read_u16::<LittleEndian>()?;
            MapiValue::Int(i64::from(v))
        }
        PT_LONG | PT_ERROR => MapiValue::Int(i64::from(cursor.read_i32::<LittleEndian>()?)),
        PT_BOOLEAN => MapiValue::Bool(cursor.read_u32::<LittleEndian>()? != 0),
        PT_FLOAT => MapiValue::Float(f64::from(cursor.read_f32::<LittleEndian>()?)),
        PT_DOUBLE | PT_APPTIME => MapiValue::Float(cursor.read_f64::<LittleEndian>()?),
        PT_CURRENCY | PT_I8 => MapiValue::Int(cursor.read_i64::<LittleEndian>()?),
        PT_SYSTIME => {
            let ticks = cursor.read_u64::<LittleEndian>()?;
            match filetime_to_utc(ticks) {
                Some(t) => MapiValue::Time(t),
                None => MapiValue::Int(ticks as i64),
            }
        }
        PT_CLSID => {
            let mut guid = [0u8; 16];
            cursor.read_exact(&mut guid)?;
            MapiValue::Guid(guid)
        }
        PT_STRING8 => {
            let len = cursor.read_u32::<LittleEndian>()? as usize;
            let raw = read_padded(cursor, len)?;
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            MapiValue::String(encoding.decode(&raw[..end]).0.into_owned())
        }
        PT_UNICODE => {
            let len = cursor.read_u32::<LittleEndian>()? as usize;
            let raw = read_padded(cursor, len)?;
            MapiValue::String(decode_utf16le(&raw))
        }
        PT_BINARY => {
            let len = cursor.read_u32::<LittleEndian>()? as usize;
            MapiValue::Binary(read_padded(cursor, len)?)
        }
        PT_OBJECT => {
            let len = cursor.read_u32::<LittleEndian>()? as usize;
            let raw = read_padded(cursor, len)?;
            // The object data starts with the interface id
            MapiValue::Binary(raw.get(16..).unwrap_or_default().to_vec())
        }
        other => {
            return Err(TnefError::Malformed(format!(
                "unsupported property type {other:#06x}"
            )))
        }
    };
    Ok(value)
}

/// Read `len` bytes and skip the padding to the next 4-byte boundary.
fn read_padded(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>, TnefError> {
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if len > remaining {
        return Err(TnefError::Truncated {
            offset: cursor.position(),
        });
    }
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    let pad = (4 - len % 4) % 4;
    let skip = pad.min(cursor.get_ref().len().saturating_sub(cursor.position() as usize));
    cursor.set_position(cursor.position() + skip as u64);
    Ok(buf)
}

/// UTF-16LE to `String`, stopping at the first NUL.
pub fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// FILETIME (100 ns ticks since 1601) to UTC.
pub fn filetime_to_utc(ticks: u64) -> Option<DateTime<Utc>> {
    let secs = (ticks / 10_000_000) as i64 - FILETIME_EPOCH_OFFSET;
    let nanos = ((ticks % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::super::testutil::PropsBuilder;
    use super::*;

    #[test]
    fn test_read_string_and_long() {
        let data = PropsBuilder::new()
            .string8(PR_SUBJECT, "Hello")
            .long(PR_ATTACH_METHOD, 5)
            .unicode(PR_DISPLAY_NAME, "Zoë")
            .build();
        let props = read_props(&data, encoding_rs::WINDOWS_1252).unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(props.string(PR_SUBJECT), Some("Hello"));
        assert_eq!(props.int(PR_ATTACH_METHOD), Some(5));
        assert_eq!(props.string(PR_DISPLAY_NAME), Some("Zoë"));
        assert!(props.string(PR_BODY).is_none());
    }

    #[test]
    fn test_read_binary_and_named() {
        let data = PropsBuilder::new()
            .binary(PR_ATTACH_DATA, &[1, 2, 3, 4, 5])
            .named_unicode(0x8083, "jane@example.com")
            .systime(PR_RECEIPT_TIME, 133_485_408_000_000_000)
            .build();
        let props = read_props(&data, encoding_rs::WINDOWS_1252).unwrap();
        assert_eq!(props.binary(PR_ATTACH_DATA), Some(&[1u8, 2, 3, 4, 5][..]));
        assert_eq!(props.named_string(0x8083), Some("jane@example.com"));
        let t = props.time(PR_RECEIPT_TIME).unwrap();
        assert_eq!(t.format("%Y-%m-%d").to_string(), "2024-01-01");
    }

    #[test]
    fn test_string8_uses_code_page() {
        let data = PropsBuilder::new().string8_raw(PR_SUBJECT, &[b'c', b'a', b'f', 0xE9]).build();
        let props = read_props(&data, encoding_rs::WINDOWS_1252).unwrap();
        assert_eq!(props.string(PR_SUBJECT), Some("café"));
    }

    #[test]
    fn test_truncated_block() {
        let mut data = PropsBuilder::new().string8(PR_SUBJECT, "Hello world").build();
        data.truncate(data.len() - 8);
        assert!(read_props(&data, encoding_rs::WINDOWS_1252).is_err());
    }

    #[test]
    fn test_filetime_epoch() {
        let t = filetime_to_utc(116_444_736_000_000_000).unwrap();
        assert_eq!(t.timestamp(), 0);
    }
}

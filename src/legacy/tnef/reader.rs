//! TNEF attribute stream reader.
//!
//! Layout: a 4-byte signature, a 2-byte legacy key, then a sequence of
//! attributes `level:u8 id:u32 length:u32 data[length] checksum:u16`, all
//! little-endian. The checksum is the 16-bit sum of the data bytes.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, NaiveDate, Utc};

use super::mapi::{self, MapiProps};
use super::TnefError;

pub const TNEF_SIGNATURE: u32 = 0x223E_9F78;

pub const LVL_MESSAGE: u8 = 0x01;
pub const LVL_ATTACHMENT: u8 = 0x02;

// Attribute ids (type in the high word, id in the low word)
pub const ATT_FROM: u32 = 0x0000_8000;
pub const ATT_SUBJECT: u32 = 0x0001_8004;
pub const ATT_DATE_SENT: u32 = 0x0003_8005;
pub const ATT_DATE_RECD: u32 = 0x0003_8006;
pub const ATT_MESSAGE_CLASS: u32 = 0x0007_8008;
pub const ATT_MESSAGE_ID: u32 = 0x0001_8009;
pub const ATT_BODY: u32 = 0x0002_800C;
pub const ATT_PRIORITY: u32 = 0x0004_800D;
pub const ATT_ATTACH_DATA: u32 = 0x0006_800F;
pub const ATT_ATTACH_TITLE: u32 = 0x0001_8010;
pub const ATT_ATTACH_TRANSPORT_FILENAME: u32 = 0x0006_9001;
pub const ATT_ATTACH_REND_DATA: u32 = 0x0006_9002;
pub const ATT_MAPI_PROPS: u32 = 0x0006_9003;
pub const ATT_ATTACHMENT: u32 = 0x0006_9005;
pub const ATT_TNEF_VERSION: u32 = 0x0008_9006;
pub const ATT_OEM_CODEPAGE: u32 = 0x0006_9007;

/// One raw attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub level: u8,
    pub id: u32,
    pub data: Vec<u8>,
}

/// An attachment assembled from its attribute group.
#[derive(Debug, Clone, Default)]
pub struct TnefAttachment {
    pub title: Option<String>,
    pub transport_name: Option<String>,
    pub data: Option<Vec<u8>>,
    pub props: MapiProps,
}

/// A decoded TNEF stream.
#[derive(Debug, Clone, Default)]
pub struct TnefMessage {
    pub key: u16,
    pub message_class: Option<String>,
    pub subject: Option<String>,
    pub message_id: Option<String>,
    pub date_sent: Option<DateTime<Utc>>,
    pub date_received: Option<DateTime<Utc>>,
    /// Plain body from the legacy `attBody` attribute.
    pub body: Option<String>,
    /// Code page from `attOemCodepage`, used for 8-bit strings.
    pub code_page: Option<u32>,
    pub props: MapiProps,
    pub attachments: Vec<TnefAttachment>,
}

impl TnefMessage {
    /// Message class from the attribute, else from `PR_MESSAGE_CLASS`.
    pub fn class(&self) -> Option<&str> {
        self.message_class
            .as_deref()
            .or_else(|| self.props.string(mapi::PR_MESSAGE_CLASS))
    }

    /// Encoding for 8-bit strings.
    pub fn encoding(&self) -> &'static encoding_rs::Encoding {
        code_page_encoding(self.code_page)
    }
}

/// Map a Windows code page to an encoding (Windows-1252 when unknown).
pub fn code_page_encoding(code_page: Option<u32>) -> &'static encoding_rs::Encoding {
    let label = match code_page {
        Some(65001) => "utf-8".to_string(),
        Some(cp @ (20127 | 28591..=28605)) => format!("cp{cp}"),
        Some(932) => "shift_jis".to_string(),
        Some(936) => "gbk".to_string(),
        Some(949) => "euc-kr".to_string(),
        Some(950) => "big5".to_string(),
        Some(cp) => format!("windows-{cp}"),
        None => "windows-1252".to_string(),
    };
    encoding_rs::Encoding::for_label(label.as_bytes())
        .or_else(|| match code_page {
            Some(cp @ 28591..=28605) => {
                encoding_rs::Encoding::for_label(format!("iso-8859-{}", cp - 28590).as_bytes())
            }
            _ => None,
        })
        .unwrap_or(encoding_rs::WINDOWS_1252)
}

/// Read the raw attribute list.
pub fn read_attributes(data: &[u8]) -> Result<(u16, Vec<Attribute>), TnefError> {
    let mut cursor = Cursor::new(data);
    let signature = cursor.read_u32::<LittleEndian>()?;
    if signature != TNEF_SIGNATURE {
        return Err(TnefError::BadSignature(signature));
    }
    let key = cursor.read_u16::<LittleEndian>()?;

    let mut attributes = Vec::new();
    while (cursor.position() as usize) < data.len() {
        let offset = cursor.position();
        let level = cursor.read_u8()?;
        let id = cursor.read_u32::<LittleEndian>()?;
        let length = cursor.read_u32::<LittleEndian>()? as usize;
        let remaining = data.len() - cursor.position() as usize;
        if length > remaining {
            return Err(TnefError::Truncated { offset });
        }
        let mut payload = vec![0u8; length];
        cursor.read_exact(&mut payload)?;
        let checksum = cursor.read_u16::<LittleEndian>()?;
        if checksum != checksum_of(&payload) {
            return Err(TnefError::Checksum { id });
        }
        attributes.push(Attribute {
            level,
            id,
            data: payload,
        });
    }
    Ok((key, attributes))
}

/// 16-bit sum of all bytes.
pub fn checksum_of(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Decode a TNEF stream into its message and attachment groups.
pub fn read_message(data: &[u8]) -> Result<TnefMessage, TnefError> {
    let (key, attributes) = read_attributes(data)?;
    let mut message = TnefMessage {
        key,
        ..TnefMessage::default()
    };

    for attr in &attributes {
        if attr.id == ATT_OEM_CODEPAGE && attr.data.len() >= 4 {
            message.code_page = Some(Cursor::new(&attr.data).read_u32::<LittleEndian>()?);
        }
    }
    let encoding = message.encoding();

    for attr in attributes {
        match (attr.level, attr.id) {
            (LVL_MESSAGE, ATT_MESSAGE_CLASS) => {
                message.message_class = Some(attr_string(&attr.data, encoding))
            }
            (LVL_MESSAGE, ATT_SUBJECT) => message.subject = Some(attr_string(&attr.data, encoding)),
            (LVL_MESSAGE, ATT_MESSAGE_ID) => {
                message.message_id = Some(attr_string(&attr.data, encoding))
            }
            (LVL_MESSAGE, ATT_BODY) => message.body = Some(attr_string(&attr.data, encoding)),
            (LVL_MESSAGE, ATT_DATE_SENT) => message.date_sent = attr_date(&attr.data),
            (LVL_MESSAGE, ATT_DATE_RECD) => message.date_received = attr_date(&attr.data),
            (LVL_MESSAGE, ATT_MAPI_PROPS) => {
                message.props.extend(mapi::read_props(&attr.data, encoding)?)
            }
            (LVL_ATTACHMENT, ATT_ATTACH_REND_DATA) => {
                message.attachments.push(TnefAttachment::default())
            }
            (LVL_ATTACHMENT, id) => {
                // Some writers omit attAttachRenddata before the first attachment
                if message.attachments.is_empty() {
                    message.attachments.push(TnefAttachment::default());
                }
                let Some(current) = message.attachments.last_mut() else {
                    continue;
                };
                match id {
                    ATT_ATTACH_TITLE => current.title = Some(attr_string(&attr.data, encoding)),
                    ATT_ATTACH_TRANSPORT_FILENAME => {
                        current.transport_name = Some(attr_string(&attr.data, encoding))
                    }
                    ATT_ATTACH_DATA => current.data = Some(attr.data),
                    ATT_ATTACHMENT => current.props.extend(mapi::read_props(&attr.data, encoding)?),
                    _ => {}
                }
            }
            _ => {}
        }
    }
    Ok(message)
}

/// A NUL-terminated 8-bit string attribute.
fn attr_string(data: &[u8], encoding: &'static encoding_rs::Encoding) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let (text, _, _) = encoding.decode(&data[..end]);
    text.trim().to_string()
}

/// A `DTR` date attribute: year, month, day, hour, minute, second, weekday (u16 each).
fn attr_date(data: &[u8]) -> Option<DateTime<Utc>> {
    let mut cursor = Cursor::new(data);
    let mut field = || cursor.read_u16::<LittleEndian>().ok().map(u32::from);
    let (year, month, day) = (field()?, field()?, field()?);
    let (hour, minute, second) = (field()?, field()?, field()?);
    NaiveDate::from_ymd_opt(year as i32, month, day)?
        .and_hms_opt(hour, minute, second)
        .map(|naive| naive.and_utc())
}

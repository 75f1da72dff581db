//! Compressed RTF (`PR_RTF_COMPRESSED`) decompression.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use super::TnefError;

const MAGIC_COMPRESSED: u32 = 0x7546_5A4C;
const MAGIC_UNCOMPRESSED: u32 = 0x414C_454D;
const HEADER_LEN: usize = 16;
const DICT_SIZE: usize = 4096;
/// Upper bound of output bytes per input byte: a control byte followed by
/// eight two-byte references of at most 17 bytes each.
const MAX_EXPANSION: usize = 8;

const PREBUF: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans SerifSymbolArialTimes New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\\par \\pard\\plain\\f0\\fs20\\b\\i\\u\\tab\\tx";

/// Decompress an LZFu (or stored "MELA") RTF blob.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TnefError> {
    let mut header = Cursor::new(data);
    let comp_size = header.read_u32::<LittleEndian>()? as usize;
    let raw_size = header.read_u32::<LittleEndian>()? as usize;
    let magic = header.read_u32::<LittleEndian>()?;
    let _crc = header.read_u32::<LittleEndian>()?;

    // compSize counts everything after its own field
    let end = (comp_size + 4).min(data.len());
    let body = data.get(HEADER_LEN..end).unwrap_or_default();

    match magic {
        MAGIC_UNCOMPRESSED => Ok(body[..raw_size.min(body.len())].to_vec()),
        MAGIC_COMPRESSED => Ok(inflate(body, raw_size)),
        other => Err(TnefError::Malformed(format!(
            "unknown compressed RTF magic {other:#010x}"
        ))),
    }
}

fn inflate(body: &[u8], raw_size: usize) -> Vec<u8> {
    let mut dict = [0u8; DICT_SIZE];
    dict[..PREBUF.len()].copy_from_slice(PREBUF);
    let mut write_pos = PREBUF.len();
    // raw_size comes from the stream header and is not trusted
    let mut out = Vec::with_capacity(raw_size.min(body.len() * MAX_EXPANSION));
    let mut i = 0;

    'outer: while i < body.len() {
        let control = body[i];
        i += 1;
        for bit in 0..8 {
            if i >= body.len() {
                break 'outer;
            }
            if control & (1 << bit) == 0 {
                let byte = body[i];
                i += 1;
                out.push(byte);
                dict[write_pos] = byte;
                write_pos = (write_pos + 1) % DICT_SIZE;
                continue;
            }

            let Some(pair) = body.get(i..i + 2) else {
                break 'outer;
            };
            i += 2;
            let reference = u16::from_be_bytes([pair[0], pair[1]]) as usize;
            let offset = reference >> 4;
            let length = (reference & 0x0F) + 2;
            if offset == write_pos {
                break 'outer;
            }
            for k in 0..length {
                let byte = dict[(offset + k) % DICT_SIZE];
                out.push(byte);
                dict[write_pos] = byte;
                write_pos = (write_pos + 1) % DICT_SIZE;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(magic: u32, raw_size: u32, body: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&(body.len() as u32 + 12).to_le_bytes());
        data.extend_from_slice(&raw_size.to_le_bytes());
        data.extend_from_slice(&magic.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_decompress_lzfu() {
        // Back-reference to the first 11 bytes of the preset dictionary
        let mut body = vec![0x01, 0x00, 0x09];
        body.extend_from_slice(b" hello}");
        body.extend_from_slice(&[0x01, 0x0E, 0x10]);
        let data = wrap(MAGIC_COMPRESSED, 18, &body);
        assert_eq!(decompress(&data).unwrap(), b"{\\rtf1\\ansi hello}");
    }

    #[test]
    fn test_huge_declared_size_is_not_reserved() {
        let mut body = vec![0x01, 0x00, 0x09];
        body.extend_from_slice(b" hello}");
        body.extend_from_slice(&[0x01, 0x0E, 0x10]);
        let data = wrap(MAGIC_COMPRESSED, u32::MAX, &body);
        let out = decompress(&data).unwrap();
        assert_eq!(out, b"{\\rtf1\\ansi hello}");
        assert!(out.capacity() < 1 << 16);
    }

    #[test]
    fn test_decompress_stored() {
        let data = wrap(MAGIC_UNCOMPRESSED, 9, b"{\\rtf1 x}");
        assert_eq!(decompress(&data).unwrap(), b"{\\rtf1 x}");
    }

    #[test]
    fn test_bad_magic() {
        let data = wrap(0xDEAD_BEEF, 0, b"");
        assert!(matches!(decompress(&data), Err(TnefError::Malformed(_))));
    }

    #[test]
    fn test_short_header() {
        assert!(decompress(&[0, 1, 2]).is_err());
    }
}

use std::io::Cursor;
use std::ops::Range;

use bytes::{Buf, Bytes, BytesMut};
#[cfg(any(test, feature = "test-utils"))]
use bytes::BufMut;

use crate::core::{Result, ScanError};

/// PostgreSQL binary COPY format signature: "PGCOPY\n\377\r\n\0"
pub const COPY_BINARY_SIGNATURE: &[u8; 11] = b"PGCOPY\n\xff\r\n\0";

/// Flags field for COPY binary header (0 = no OIDs)
pub const COPY_BINARY_FLAGS: i32 = 0;

/// Bit 16 of the flags word: rows carry an extra OID field.
const COPY_FLAG_WITH_OIDS: i32 = 0x10000;

/// Field count marking the end of the row stream.
const COPY_TRAILER: i16 = -1;

/// One complete row cut out of the COPY stream.
#[derive(Debug, Clone)]
pub struct RowFrame {
    data: Bytes,
    fields: Vec<Option<Range<usize>>>,
}

impl RowFrame {
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Field payload, `None` for SQL NULL.
    #[must_use]
    pub fn field(&self, idx: usize) -> Option<&[u8]> {
        self.fields
            .get(idx)
            .and_then(|range| range.as_ref())
            .map(|range| &self.data[range.clone()])
    }
}

/// Result of trying to cut the next frame out of the buffered stream.
#[derive(Debug)]
pub enum Frame {
    Row(RowFrame),
    Trailer,
}

/// Binary COPY decoder over a growing receive buffer.
///
/// Every method leaves the buffer untouched and returns `Ok(None)` when the
/// buffered bytes do not yet hold a complete unit.
pub struct BinaryCopyDecoder;

impl BinaryCopyDecoder {
    /// Read and validate the binary header (signature, flags, extension area).
    pub fn read_header(buf: &mut BytesMut) -> Result<Option<()>> {
        let mut cursor = Cursor::new(&buf[..]);

        if cursor.remaining() < COPY_BINARY_SIGNATURE.len() {
            return Ok(None);
        }
        let mut sig = [0u8; 11];
        cursor.copy_to_slice(&mut sig);
        if &sig != COPY_BINARY_SIGNATURE {
            return Err(ScanError::InvalidCopyHeader("invalid COPY binary signature".to_string()));
        }

        if cursor.remaining() < 8 {
            return Ok(None);
        }
        let flags = cursor.get_i32();
        if flags & COPY_FLAG_WITH_OIDS != 0 {
            return Err(ScanError::InvalidCopyHeader("OID columns not supported".to_string()));
        }

        let ext_len = cursor.get_i32();
        if ext_len < 0 {
            return Err(ScanError::InvalidCopyHeader(format!(
                "invalid extension area length: {ext_len}"
            )));
        }
        if cursor.remaining() < ext_len as usize {
            return Ok(None);
        }
        cursor.advance(ext_len as usize);

        let consumed = cursor.position() as usize;
        buf.advance(consumed);
        Ok(Some(()))
    }

    /// Cut the next row or the trailer out of the buffer.
    pub fn next_frame(buf: &mut BytesMut) -> Result<Option<Frame>> {
        let mut cursor = Cursor::new(&buf[..]);

        if cursor.remaining() < 2 {
            return Ok(None);
        }
        let field_count = cursor.get_i16();
        if field_count == COPY_TRAILER {
            buf.advance(2);
            return Ok(Some(Frame::Trailer));
        }
        if field_count < 0 {
            return Err(ScanError::Transport(format!("invalid field count: {field_count}")));
        }

        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            if cursor.remaining() < 4 {
                return Ok(None);
            }
            let len = cursor.get_i32();
            if len == -1 {
                fields.push(None);
                continue;
            }
            if len < 0 {
                return Err(ScanError::Transport(format!("invalid field length: {len}")));
            }
            if cursor.remaining() < len as usize {
                return Ok(None);
            }
            let start = cursor.position() as usize;
            cursor.advance(len as usize);
            fields.push(Some(start..start + len as usize));
        }

        let consumed = cursor.position() as usize;
        let data = buf.split_to(consumed).freeze();
        Ok(Some(Frame::Row(RowFrame { data, fields })))
    }
}

/// Binary COPY encoder, used to build streams in tests and fixtures.
#[cfg(any(test, feature = "test-utils"))]
pub struct BinaryCopyEncoder;

#[cfg(any(test, feature = "test-utils"))]
impl BinaryCopyEncoder {
    /// Write COPY binary header (19 bytes)
    #[must_use]
    pub fn write_header() -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(19);
        buf.put_slice(COPY_BINARY_SIGNATURE);
        buf.put_i32(COPY_BINARY_FLAGS);
        buf.put_i32(0);
        buf.to_vec()
    }

    /// Encode a single row; `None` fields are written as NULL.
    #[must_use]
    pub fn encode_row(fields: &[Option<&[u8]>]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_i16(fields.len() as i16);
        for field in fields {
            match field {
                Some(data) => {
                    buf.put_i32(data.len() as i32);
                    buf.put_slice(data);
                }
                None => buf.put_i32(-1),
            }
        }
        buf.to_vec()
    }

    /// Write COPY binary trailer (2 bytes: i16 value -1)
    #[must_use]
    pub fn write_trailer() -> Vec<u8> {
        COPY_TRAILER.to_be_bytes().to_vec()
    }

    /// Encode an exact decimal (`value * 10^-scale`) in PostgreSQL numeric
    /// format: ndigits, weight, sign, dscale, then base-10000 digits.
    #[must_use]
    pub fn encode_numeric(value: i128, scale: u16) -> Vec<u8> {
        let pad = (4 - u32::from(scale) % 4) % 4;
        let frac_groups = (i32::from(scale) + pad as i32) / 4;
        let mut magnitude = value.unsigned_abs() * 10u128.pow(pad);

        let mut digits = Vec::new();
        while magnitude > 0 {
            digits.push((magnitude % 10_000) as i16);
            magnitude /= 10_000;
        }
        digits.reverse();

        let weight = if digits.is_empty() {
            0
        } else {
            digits.len() as i32 - frac_groups - 1
        };
        while digits.last() == Some(&0) {
            digits.pop();
        }

        let mut buf = BytesMut::with_capacity(8 + digits.len() * 2);
        buf.put_i16(digits.len() as i16);
        buf.put_i16(weight as i16);
        buf.put_u16(if value < 0 { 0x4000 } else { 0x0000 });
        buf.put_u16(scale);
        for digit in digits {
            buf.put_i16(digit);
        }
        buf.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let mut buf = BytesMut::from(&BinaryCopyEncoder::write_header()[..]);
        assert!(BinaryCopyDecoder::read_header(&mut buf).unwrap().is_some());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_incomplete() {
        let header = BinaryCopyEncoder::write_header();
        let mut buf = BytesMut::from(&header[..15]);
        assert!(BinaryCopyDecoder::read_header(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 15);
    }

    #[test]
    fn test_header_skips_extension_area() {
        let mut raw = BytesMut::new();
        raw.put_slice(COPY_BINARY_SIGNATURE);
        raw.put_i32(0);
        raw.put_i32(3);
        raw.put_slice(b"abc");
        raw.put_i16(-1);
        BinaryCopyDecoder::read_header(&mut raw).unwrap().unwrap();
        assert_eq!(&raw[..], &[0xff, 0xff]);
    }

    #[test]
    fn test_invalid_signature() {
        let mut buf = BytesMut::from(&b"NOTCOPY\n\xff\r\n\0\0\0\0\0\0\0\0\0"[..]);
        assert!(matches!(
            BinaryCopyDecoder::read_header(&mut buf),
            Err(ScanError::InvalidCopyHeader(_))
        ));
    }

    #[test]
    fn test_oid_flag_rejected() {
        let mut raw = BytesMut::new();
        raw.put_slice(COPY_BINARY_SIGNATURE);
        raw.put_i32(0x10000);
        raw.put_i32(0);
        assert!(matches!(
            BinaryCopyDecoder::read_header(&mut raw),
            Err(ScanError::InvalidCopyHeader(_))
        ));
    }

    #[test]
    fn test_row_and_trailer() {
        let mut raw = BytesMut::new();
        raw.put_slice(&BinaryCopyEncoder::encode_row(&[Some(&42i32.to_be_bytes()), None]));
        raw.put_slice(&BinaryCopyEncoder::write_trailer());

        let Some(Frame::Row(row)) = BinaryCopyDecoder::next_frame(&mut raw).unwrap() else {
            panic!("expected row");
        };
        assert_eq!(row.field_count(), 2);
        assert_eq!(row.field(0), Some(&42i32.to_be_bytes()[..]));
        assert_eq!(row.field(1), None);

        assert!(matches!(
            BinaryCopyDecoder::next_frame(&mut raw).unwrap(),
            Some(Frame::Trailer)
        ));
        assert!(raw.is_empty());
    }

    #[test]
    fn test_partial_row_waits_for_more_bytes() {
        let row = BinaryCopyEncoder::encode_row(&[Some(b"hello")]);
        let mut raw = BytesMut::from(&row[..row.len() - 1]);
        assert!(BinaryCopyDecoder::next_frame(&mut raw).unwrap().is_none());
        assert_eq!(raw.len(), row.len() - 1);

        raw.put_u8(row[row.len() - 1]);
        assert!(matches!(
            BinaryCopyDecoder::next_frame(&mut raw).unwrap(),
            Some(Frame::Row(_))
        ));
    }

    #[test]
    fn test_negative_field_length() {
        let mut raw = BytesMut::new();
        raw.put_i16(1);
        raw.put_i32(-5);
        assert!(matches!(
            BinaryCopyDecoder::next_frame(&mut raw),
            Err(ScanError::Transport(_))
        ));
    }

    #[test]
    fn test_encode_numeric_layout() {
        // 123.45 -> digits [123, 4500], weight 0
        let raw = BinaryCopyEncoder::encode_numeric(12345, 2);
        assert_eq!(raw, vec![0, 2, 0, 0, 0, 0, 0, 2, 0, 123, 0x11, 0x94]);

        // 10000 -> digits [1], weight 1
        let raw = BinaryCopyEncoder::encode_numeric(10_000, 0);
        assert_eq!(raw, vec![0, 1, 0, 1, 0, 0, 0, 0, 0, 1]);

        // zero has no digits
        let raw = BinaryCopyEncoder::encode_numeric(0, 3);
        assert_eq!(raw, vec![0, 0, 0, 0, 0, 0, 0, 3]);
    }
}

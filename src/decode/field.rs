use bytes::Buf;
use uuid::Uuid;

use crate::core::{ColumnData, ColumnVector, Interval, ListEntry, Result, ScanError, TargetType};
use crate::mapping::{MappedType, SourceType};

use super::numeric::{read_numeric, read_numeric_as_f64};

/// Days between 1970-01-01 and the Postgres epoch 2000-01-01.
pub const POSTGRES_EPOCH_DAYS: i32 = 10_957;
/// Microseconds between 1970-01-01 and the Postgres epoch 2000-01-01.
pub const POSTGRES_EPOCH_MICROS: i64 = 946_684_800_000_000;
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Decodes one non-NULL field and appends it to `out`.
///
/// NULLs (length -1) never reach this function; the caller appends them directly.
pub fn decode_field(mapped: &MappedType, data: &[u8], out: &mut ColumnVector) -> Result<()> {
    let scale = match &mapped.target {
        TargetType::Decimal { scale, .. } => u16::from(*scale),
        _ => 0,
    };

    match (&mapped.source, out.data_mut()) {
        (SourceType::Bool, ColumnData::Boolean(values)) => {
            let [byte] = fixed::<1>(mapped, data)?;
            values.push(byte > 0);
        }
        (SourceType::Int2, ColumnData::Int16(values)) => {
            values.push(i16::from_be_bytes(fixed(mapped, data)?));
        }
        (SourceType::Int4, ColumnData::Int32(values)) => {
            values.push(i32::from_be_bytes(fixed(mapped, data)?));
        }
        (SourceType::Int8, ColumnData::Int64(values)) => {
            values.push(i64::from_be_bytes(fixed(mapped, data)?));
        }
        (SourceType::Oid, ColumnData::UInt32(values)) => {
            values.push(u32::from_be_bytes(fixed(mapped, data)?));
        }
        (SourceType::Float4, ColumnData::Float32(values)) => {
            values.push(f32::from_be_bytes(fixed(mapped, data)?));
        }
        (SourceType::Float8, ColumnData::Float64(values)) => {
            values.push(f64::from_be_bytes(fixed(mapped, data)?));
        }
        (SourceType::Numeric, ColumnData::Float64(values)) => {
            values.push(read_numeric_as_f64(data)?);
        }
        (SourceType::Numeric, ColumnData::Decimal16(values)) => values.push(read_numeric(data, scale)?),
        (SourceType::Numeric, ColumnData::Decimal32(values)) => values.push(read_numeric(data, scale)?),
        (SourceType::Numeric, ColumnData::Decimal64(values)) => values.push(read_numeric(data, scale)?),
        (SourceType::Numeric, ColumnData::Decimal128(values)) => values.push(read_numeric(data, scale)?),
        (SourceType::Char, ColumnData::Utf8(values)) => values.push(single_char(mapped, data)?),
        (SourceType::Text | SourceType::TextCast, ColumnData::Utf8(values)) => {
            values.push(utf8(mapped, data)?.to_string());
        }
        (SourceType::Jsonb, ColumnData::Utf8(values)) => {
            let (&version, body) = data
                .split_first()
                .ok_or_else(|| ScanError::decode(mapped.type_name(), 0, "missing jsonb version byte"))?;
            if version != 1 {
                return Err(ScanError::JsonbVersion(version));
            }
            values.push(utf8(mapped, body)?.to_string());
        }
        (SourceType::Bytea, ColumnData::Binary(values)) => values.push(data.to_vec()),
        (SourceType::Date, ColumnData::Date(values)) => {
            let days = i32::from_be_bytes(fixed(mapped, data)?);
            values.push(rebase_date(mapped, days)?);
        }
        (SourceType::Time, ColumnData::Time(values)) => {
            values.push(i64::from_be_bytes(fixed(mapped, data)?));
        }
        (SourceType::TimeTz, ColumnData::Time(values)) => {
            let mut buf: &[u8] = &fixed::<12>(mapped, data)?;
            let micros = buf.get_i64();
            let offset_secs = buf.get_i32();
            values.push(micros + i64::from(offset_secs) * MICROS_PER_SEC);
        }
        (SourceType::Timestamp | SourceType::TimestampTz, ColumnData::Timestamp(values)) => {
            let micros = i64::from_be_bytes(fixed(mapped, data)?);
            values.push(rebase_timestamp(mapped, micros)?);
        }
        (SourceType::Interval, ColumnData::Interval(values)) => {
            let mut buf: &[u8] = &fixed::<16>(mapped, data)?;
            let micros = buf.get_i64();
            let days = buf.get_i32();
            let months = buf.get_i32();
            values.push(Interval { months, days, micros });
        }
        (SourceType::Uuid, ColumnData::Uuid(values)) => {
            values.push(Uuid::from_bytes(fixed(mapped, data)?));
        }
        (SourceType::Enum, ColumnData::Enum(values)) => {
            let TargetType::Enum(enum_type) = &mapped.target else {
                return Err(ScanError::Internal(format!("enum source bound to {}", mapped.target)));
            };
            let label = utf8(mapped, data)?;
            let position = enum_type.position(label).ok_or_else(|| ScanError::UnknownEnumLabel {
                type_name: enum_type.name().to_string(),
                value: label.to_string(),
            })?;
            values.push(position);
        }
        (SourceType::Array { element, element_oid }, ColumnData::List { entries, child }) => {
            decode_array(element, *element_oid, data, entries, child)?;
        }
        (source, _) => {
            return Err(ScanError::Internal(format!(
                "cannot decode {source:?} into a {} column",
                mapped.target
            )));
        }
    }

    out.mark_valid();
    Ok(())
}

/// Decodes a one-dimensional array: `ndim(i32) has_nulls(i32) elem_oid(u32)`,
/// then `length(i32) lower_bound(i32)`, then `length` length-prefixed elements.
fn decode_array(
    element: &MappedType,
    element_oid: Option<u32>,
    data: &[u8],
    entries: &mut Vec<ListEntry>,
    child: &mut ColumnVector,
) -> Result<()> {
    let offset = child.len();
    if data.is_empty() {
        entries.push(ListEntry { offset, length: 0 });
        return Ok(());
    }

    let type_name = format!("{}[]", element.type_name());
    let mut buf = data;
    let ndim = take_i32(&mut buf, &type_name, data.len())?;
    let _has_nulls = take_i32(&mut buf, &type_name, data.len())?;
    let oid = take_i32(&mut buf, &type_name, data.len())? as u32;
    if ndim == 0 {
        entries.push(ListEntry { offset, length: 0 });
        return Ok(());
    }
    if ndim != 1 {
        return Err(ScanError::UnsupportedArrayDimensions(ndim));
    }
    if let Some(expected) = element_oid {
        if expected != oid {
            return Err(ScanError::decode(
                type_name,
                data.len(),
                format!("element type oid {oid} does not match column element type {expected}"),
            ));
        }
    }

    let length = take_i32(&mut buf, &type_name, data.len())?;
    let _lower_bound = take_i32(&mut buf, &type_name, data.len())?;
    if length < 0 {
        return Err(ScanError::decode(type_name, data.len(), format!("negative array length {length}")));
    }

    for _ in 0..length {
        let element_len = take_i32(&mut buf, &type_name, data.len())?;
        if element_len == -1 {
            child.push_null();
            continue;
        }
        let element_len = usize::try_from(element_len).map_err(|_| {
            ScanError::decode(type_name.clone(), data.len(), format!("invalid element length {element_len}"))
        })?;
        if buf.remaining() < element_len {
            return Err(ScanError::decode(type_name, data.len(), "truncated array element"));
        }
        let (element_data, rest) = buf.split_at(element_len);
        decode_field(element, element_data, child)?;
        buf = rest;
    }

    entries.push(ListEntry {
        offset,
        length: length as usize,
    });
    Ok(())
}

/// Decodes a `ctid` (block number, slot) into a 64-bit row identifier.
pub fn decode_row_id(data: &[u8], out: &mut ColumnVector) -> Result<()> {
    let bytes: [u8; 6] = data
        .try_into()
        .map_err(|_| ScanError::decode("tid", data.len(), "expected 6 bytes"))?;
    let mut buf: &[u8] = &bytes;
    let page = i64::from(buf.get_u32());
    let slot = i64::from(buf.get_u16());
    match out.data_mut() {
        ColumnData::Int64(values) => values.push((page << 16) + slot),
        _ => return Err(ScanError::Internal("row id must be read into a BIGINT column".to_string())),
    }
    out.mark_valid();
    Ok(())
}

fn fixed<const N: usize>(mapped: &MappedType, data: &[u8]) -> Result<[u8; N]> {
    data.try_into()
        .map_err(|_| ScanError::decode(mapped.type_name(), data.len(), format!("expected {N} bytes")))
}

fn utf8<'a>(mapped: &MappedType, data: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(data)
        .map_err(|e| ScanError::decode(mapped.type_name(), data.len(), format!("invalid UTF-8: {e}")))
}

// Same rendering as the server's text output: NUL is empty, high bytes are octal escapes.
fn single_char(mapped: &MappedType, data: &[u8]) -> Result<String> {
    match data {
        [] | [0] => Ok(String::new()),
        [byte] if byte.is_ascii() => Ok(char::from(*byte).to_string()),
        [byte] => Ok(format!("\\{byte:03o}")),
        _ => Err(ScanError::decode(mapped.type_name(), data.len(), "expected a single byte")),
    }
}

fn take_i32(buf: &mut &[u8], type_name: &str, len: usize) -> Result<i32> {
    if buf.remaining() < 4 {
        return Err(ScanError::decode(type_name, len, "truncated array header"));
    }
    Ok(buf.get_i32())
}

// Infinity sentinels pass through unchanged.
fn rebase_date(mapped: &MappedType, days: i32) -> Result<i32> {
    if days == i32::MAX || days == i32::MIN {
        return Ok(days);
    }
    days.checked_add(POSTGRES_EPOCH_DAYS)
        .ok_or_else(|| ScanError::decode(mapped.type_name(), 4, "date out of range"))
}

fn rebase_timestamp(mapped: &MappedType, micros: i64) -> Result<i64> {
    if micros == i64::MAX || micros == i64::MIN {
        return Ok(micros);
    }
    micros
        .checked_add(POSTGRES_EPOCH_MICROS)
        .ok_or_else(|| ScanError::decode(mapped.type_name(), 8, "timestamp out of range"))
}

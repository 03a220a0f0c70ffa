use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use uuid::Uuid;

use super::data_type::{DecimalWidth, Interval, TargetType};
use super::value::{DecimalValue, ScalarValue};

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Position of one list value inside the child vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListEntry {
    pub offset: usize,
    pub length: usize,
}

/// Physical storage for a column. Temporal values are kept as integer offsets
/// from the Unix epoch (days for dates, microseconds otherwise).
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Boolean(Vec<bool>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Decimal16(Vec<i16>),
    Decimal32(Vec<i32>),
    Decimal64(Vec<i64>),
    Decimal128(Vec<i128>),
    Utf8(Vec<String>),
    Binary(Vec<Vec<u8>>),
    Date(Vec<i32>),
    Time(Vec<i64>),
    Timestamp(Vec<i64>),
    Interval(Vec<Interval>),
    Uuid(Vec<Uuid>),
    Enum(Vec<u32>),
    List {
        entries: Vec<ListEntry>,
        child: Box<ColumnVector>,
    },
}

impl ColumnData {
    fn with_capacity(data_type: &TargetType, capacity: usize) -> Self {
        match data_type {
            TargetType::Boolean => Self::Boolean(Vec::with_capacity(capacity)),
            TargetType::Int16 => Self::Int16(Vec::with_capacity(capacity)),
            TargetType::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            TargetType::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            TargetType::UInt32 => Self::UInt32(Vec::with_capacity(capacity)),
            TargetType::Float32 => Self::Float32(Vec::with_capacity(capacity)),
            TargetType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            TargetType::Decimal { precision, .. } => match DecimalWidth::for_precision(*precision) {
                DecimalWidth::I16 => Self::Decimal16(Vec::with_capacity(capacity)),
                DecimalWidth::I32 => Self::Decimal32(Vec::with_capacity(capacity)),
                DecimalWidth::I64 => Self::Decimal64(Vec::with_capacity(capacity)),
                DecimalWidth::I128 => Self::Decimal128(Vec::with_capacity(capacity)),
            },
            TargetType::Utf8 => Self::Utf8(Vec::with_capacity(capacity)),
            TargetType::Binary => Self::Binary(Vec::with_capacity(capacity)),
            TargetType::Date => Self::Date(Vec::with_capacity(capacity)),
            TargetType::Time | TargetType::TimeTz => Self::Time(Vec::with_capacity(capacity)),
            TargetType::Timestamp | TargetType::TimestampTz => {
                Self::Timestamp(Vec::with_capacity(capacity))
            }
            TargetType::Interval => Self::Interval(Vec::with_capacity(capacity)),
            TargetType::Uuid => Self::Uuid(Vec::with_capacity(capacity)),
            TargetType::Enum(_) => Self::Enum(Vec::with_capacity(capacity)),
            TargetType::List(child) => Self::List {
                entries: Vec::with_capacity(capacity),
                child: Box::new(ColumnVector::with_capacity((**child).clone(), capacity)),
            },
        }
    }

    fn push_default(&mut self) {
        match self {
            Self::Boolean(v) => v.push(false),
            Self::Int16(v) | Self::Decimal16(v) => v.push(0),
            Self::Int32(v) | Self::Decimal32(v) | Self::Date(v) => v.push(0),
            Self::Int64(v) | Self::Decimal64(v) | Self::Time(v) | Self::Timestamp(v) => v.push(0),
            Self::UInt32(v) | Self::Enum(v) => v.push(0),
            Self::Float32(v) => v.push(0.0),
            Self::Float64(v) => v.push(0.0),
            Self::Decimal128(v) => v.push(0),
            Self::Utf8(v) => v.push(String::new()),
            Self::Binary(v) => v.push(Vec::new()),
            Self::Interval(v) => v.push(Interval::default()),
            Self::Uuid(v) => v.push(Uuid::nil()),
            Self::List { entries, child } => entries.push(ListEntry {
                offset: child.len(),
                length: 0,
            }),
        }
    }
}

/// A typed column with a validity mask. Rows are appended; a row's offset is
/// its position at the time it was appended.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnVector {
    data_type: TargetType,
    validity: Vec<bool>,
    data: ColumnData,
}

impl ColumnVector {
    #[must_use]
    pub fn new(data_type: TargetType) -> Self {
        Self::with_capacity(data_type, 0)
    }

    #[must_use]
    pub fn with_capacity(data_type: TargetType, capacity: usize) -> Self {
        let data = ColumnData::with_capacity(&data_type, capacity);
        Self {
            data_type,
            validity: Vec::with_capacity(capacity),
            data,
        }
    }

    #[must_use]
    pub const fn data_type(&self) -> &TargetType {
        &self.data_type
    }

    #[must_use]
    pub const fn data(&self) -> &ColumnData {
        &self.data
    }

    pub(crate) const fn data_mut(&mut self) -> &mut ColumnData {
        &mut self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validity.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    #[must_use]
    pub fn is_valid(&self, row: usize) -> bool {
        self.validity.get(row).copied().unwrap_or(false)
    }

    pub fn push_null(&mut self) {
        self.data.push_default();
        self.validity.push(false);
    }

    /// Records that a value was just pushed into the backing storage.
    pub(crate) fn mark_valid(&mut self) {
        self.validity.push(true);
    }

    /// Reads one row back out as a scalar. Returns `Null` for invalid or out-of-range rows.
    #[must_use]
    pub fn value(&self, row: usize) -> ScalarValue {
        if !self.is_valid(row) {
            return ScalarValue::Null;
        }
        let scale = match &self.data_type {
            TargetType::Decimal { scale, .. } => *scale,
            _ => 0,
        };
        match &self.data {
            ColumnData::Boolean(v) => ScalarValue::Boolean(v[row]),
            ColumnData::Int16(v) => ScalarValue::Int16(v[row]),
            ColumnData::Int32(v) => ScalarValue::Int32(v[row]),
            ColumnData::Int64(v) => ScalarValue::Int64(v[row]),
            ColumnData::UInt32(v) => ScalarValue::UInt32(v[row]),
            ColumnData::Float32(v) => ScalarValue::Float32(v[row]),
            ColumnData::Float64(v) => ScalarValue::Float64(v[row]),
            ColumnData::Decimal16(v) => ScalarValue::Decimal(DecimalValue::new(i128::from(v[row]), scale)),
            ColumnData::Decimal32(v) => ScalarValue::Decimal(DecimalValue::new(i128::from(v[row]), scale)),
            ColumnData::Decimal64(v) => ScalarValue::Decimal(DecimalValue::new(i128::from(v[row]), scale)),
            ColumnData::Decimal128(v) => ScalarValue::Decimal(DecimalValue::new(v[row], scale)),
            ColumnData::Utf8(v) => ScalarValue::Utf8(v[row].clone()),
            ColumnData::Binary(v) => ScalarValue::Binary(v[row].clone()),
            ColumnData::Date(v) => date_value(v[row]),
            ColumnData::Time(v) => {
                let time = time_of_day(v[row]);
                if matches!(self.data_type, TargetType::TimeTz) {
                    ScalarValue::TimeTz(time)
                } else {
                    ScalarValue::Time(time)
                }
            }
            ColumnData::Timestamp(v) => timestamp_value(v[row], &self.data_type),
            ColumnData::Interval(v) => ScalarValue::Interval(v[row]),
            ColumnData::Uuid(v) => ScalarValue::Uuid(v[row]),
            ColumnData::Enum(v) => match &self.data_type {
                TargetType::Enum(e) => e
                    .label(v[row])
                    .map_or(ScalarValue::Null, |label| ScalarValue::Enum(label.to_string())),
                _ => ScalarValue::Null,
            },
            ColumnData::List { entries, child } => {
                let entry = entries[row];
                ScalarValue::List(
                    (entry.offset..entry.offset + entry.length)
                        .map(|idx| child.value(idx))
                        .collect(),
                )
            }
        }
    }
}

fn date_value(days: i32) -> ScalarValue {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(Duration::days(i64::from(days))))
        .map_or_else(|| infinity(i64::from(days)), ScalarValue::Date)
}

fn time_of_day(micros: i64) -> NaiveTime {
    let micros = micros.rem_euclid(MICROS_PER_DAY);
    let secs = (micros / 1_000_000) as u32;
    let nanos = ((micros % 1_000_000) * 1_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).unwrap_or(NaiveTime::MIN)
}

fn timestamp_value(micros: i64, data_type: &TargetType) -> ScalarValue {
    match DateTime::from_timestamp_micros(micros) {
        Some(ts) if matches!(data_type, TargetType::TimestampTz) => ScalarValue::TimestampTz(ts),
        Some(ts) => ScalarValue::Timestamp(ts.naive_utc()),
        None => infinity(micros),
    }
}

fn infinity(raw: i64) -> ScalarValue {
    if raw < 0 {
        ScalarValue::Utf8("-infinity".to_string())
    } else {
        ScalarValue::Utf8("infinity".to_string())
    }
}

/// A set of equally long columns emitted by one pull.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBatch {
    columns: Vec<ColumnVector>,
    num_rows: usize,
}

impl DataBatch {
    #[must_use]
    pub fn with_capacity(types: &[TargetType], capacity: usize) -> Self {
        Self {
            columns: types
                .iter()
                .map(|t| ColumnVector::with_capacity(t.clone(), capacity))
                .collect(),
            num_rows: 0,
        }
    }

    #[must_use]
    pub const fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnVector] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, idx: usize) -> Option<&ColumnVector> {
        self.columns.get(idx)
    }

    pub(crate) fn columns_mut(&mut self) -> &mut [ColumnVector] {
        &mut self.columns
    }

    pub(crate) const fn finish_row(&mut self) {
        self.num_rows += 1;
    }

    #[must_use]
    pub fn row(&self, row: usize) -> Vec<ScalarValue> {
        self.columns.iter().map(|c| c.value(row)).collect()
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Widest decimal the target engine stores natively.
pub const MAX_DECIMAL_PRECISION: u8 = 38;
/// Largest scale the power-of-ten table covers.
pub const MAX_DECIMAL_SCALE: u8 = 18;

/// Logical column type produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetType {
    Boolean,
    Int16,
    Int32,
    Int64,
    UInt32,
    Float32,
    Float64,
    Decimal { precision: u8, scale: u8 },
    Utf8,
    Binary,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Interval,
    Uuid,
    Enum(EnumType),
    List(Box<TargetType>),
}

/// Physical integer width backing a decimal column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalWidth {
    I16,
    I32,
    I64,
    I128,
}

impl DecimalWidth {
    #[must_use]
    pub const fn for_precision(precision: u8) -> Self {
        match precision {
            0..=4 => Self::I16,
            5..=9 => Self::I32,
            10..=18 => Self::I64,
            _ => Self::I128,
        }
    }
}

impl TargetType {
    #[must_use]
    pub const fn decimal_width(&self) -> Option<DecimalWidth> {
        match self {
            Self::Decimal { precision, .. } => Some(DecimalWidth::for_precision(*precision)),
            _ => None,
        }
    }

    #[must_use]
    pub fn list(child: Self) -> Self {
        Self::List(Box::new(child))
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Int16 => write!(f, "SMALLINT"),
            Self::Int32 => write!(f, "INTEGER"),
            Self::Int64 => write!(f, "BIGINT"),
            Self::UInt32 => write!(f, "UINTEGER"),
            Self::Float32 => write!(f, "FLOAT"),
            Self::Float64 => write!(f, "DOUBLE"),
            Self::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            Self::Utf8 => write!(f, "VARCHAR"),
            Self::Binary => write!(f, "BLOB"),
            Self::Date => write!(f, "DATE"),
            Self::Time => write!(f, "TIME"),
            Self::TimeTz => write!(f, "TIME WITH TIME ZONE"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::TimestampTz => write!(f, "TIMESTAMP WITH TIME ZONE"),
            Self::Interval => write!(f, "INTERVAL"),
            Self::Uuid => write!(f, "UUID"),
            Self::Enum(e) => write!(f, "ENUM {}", e.name()),
            Self::List(child) => write!(f, "{child}[]"),
        }
    }
}

/// Ordinal-encoded enum. Labels keep the order the source reported them in.
#[derive(Debug, Clone)]
pub struct EnumType {
    name: String,
    labels: Arc<[String]>,
    positions: Arc<HashMap<String, u32>>,
}

impl EnumType {
    #[must_use]
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        let positions = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), idx as u32))
            .collect();
        Self {
            name: name.into(),
            labels: labels.into(),
            positions: Arc::new(positions),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn position(&self, label: &str) -> Option<u32> {
        self.positions.get(label).copied()
    }

    #[must_use]
    pub fn label(&self, position: u32) -> Option<&str> {
        self.labels.get(position as usize).map(String::as_str)
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.labels == other.labels
    }
}

/// Calendar interval, kept in the three independent units Postgres uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} months {} days {} us", self.months, self.days, self.micros)
    }
}

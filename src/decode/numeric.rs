//! Postgres `numeric` binary format.
//!
//! Wire layout: `ndigits(u16) weight(i16) sign(u16) dscale(u16)` followed by
//! `ndigits` base-10000 digits, most significant first. The first digit is
//! worth `10000^weight`; leading and trailing zero digits are suppressed.

use crate::core::{Result, ScanError, MAX_DECIMAL_SCALE};

pub const NBASE: i64 = 10_000;
const DEC_DIGITS: i32 = 4;
const HEADER_LEN: usize = 8;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

pub const POWERS_OF_TEN: [i64; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];

/// Per-value numeric header. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalHeader {
    pub ndigits: u16,
    pub weight: i16,
    pub negative: bool,
    pub scale: u16,
}

impl DecimalHeader {
    /// Splits a numeric payload into its header and digit bytes.
    pub fn read(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < HEADER_LEN {
            return Err(ScanError::decode(
                "numeric",
                data.len(),
                format!("need at least {HEADER_LEN} bytes to read a numeric header"),
            ));
        }
        let word = |idx: usize| u16::from_be_bytes([data[idx * 2], data[idx * 2 + 1]]);
        let ndigits = word(0);
        let weight = word(1) as i16;
        let sign = word(2);
        let scale = word(3);

        let negative = match sign {
            NUMERIC_POS => false,
            NUMERIC_NEG => true,
            NUMERIC_NAN => return Err(ScanError::InvalidNumeric("NaN is not supported".to_string())),
            NUMERIC_PINF | NUMERIC_NINF => {
                return Err(ScanError::InvalidNumeric("Infinity is not supported".to_string()));
            }
            other => return Err(ScanError::InvalidNumeric(format!("unknown sign tag {other:#06x}"))),
        };

        let digits = &data[HEADER_LEN..];
        if digits.len() != ndigits as usize * 2 {
            return Err(ScanError::decode(
                "numeric",
                data.len(),
                format!("header declares {ndigits} digits"),
            ));
        }

        Ok((
            Self {
                ndigits,
                weight,
                negative,
                scale,
            },
            digits,
        ))
    }
}

/// Integer storage a decimal can be decoded into.
pub trait DecimalStorage: Copy + Default {
    fn from_digit(digit: i64) -> Option<Self>;
    fn checked_mul_by(self, factor: i64) -> Option<Self>;
    fn checked_add_to(self, other: Self) -> Option<Self>;
    fn checked_negate(self) -> Option<Self>;
    fn from_wide(value: i128) -> Option<Self>;
}

macro_rules! impl_decimal_storage {
    ($($t:ty),*) => {
        $(
            impl DecimalStorage for $t {
                fn from_digit(digit: i64) -> Option<Self> {
                    <$t>::try_from(digit).ok()
                }

                fn checked_mul_by(self, factor: i64) -> Option<Self> {
                    <$t>::try_from(factor).ok().and_then(|f| self.checked_mul(f))
                }

                fn checked_add_to(self, other: Self) -> Option<Self> {
                    self.checked_add(other)
                }

                fn checked_negate(self) -> Option<Self> {
                    self.checked_neg()
                }

                fn from_wide(value: i128) -> Option<Self> {
                    <$t>::try_from(value).ok()
                }
            }
        )*
    };
}

impl_decimal_storage!(i16, i32, i64, i128);

fn out_of_range(scale: u16) -> ScanError {
    ScanError::InvalidNumeric(format!("value out of range for scale {scale}"))
}

/// Decodes the digits into an integer holding `value * 10^scale`.
///
/// `scale` is the column's declared scale. Fractional digits encoded past it
/// are truncated, suppressed trailing zeros are restored.
pub fn read_decimal<T: DecimalStorage>(header: &DecimalHeader, digits: &[u8], scale: u16) -> Result<T> {
    if scale > u16::from(MAX_DECIMAL_SCALE) {
        return Err(ScanError::InvalidNumeric(format!(
            "scale {scale} exceeds the supported maximum of {MAX_DECIMAL_SCALE}"
        )));
    }
    if header.ndigits == 0 {
        return Ok(T::default());
    }

    let mut values = Vec::with_capacity(header.ndigits as usize);
    for chunk in digits.chunks_exact(2) {
        let digit = i64::from(u16::from_be_bytes([chunk[0], chunk[1]]));
        if digit >= NBASE {
            return Err(ScanError::InvalidNumeric(format!("invalid base-10000 digit {digit}")));
        }
        values.push(digit);
    }

    let ndigits = i32::from(header.ndigits);
    let weight = i32::from(header.weight);
    let scale_power = POWERS_OF_TEN[scale as usize];
    let mut next = 0usize;

    let mut integral = T::default();
    if weight >= 0 {
        integral = T::from_digit(values[0]).ok_or_else(|| out_of_range(scale))?;
        next = 1;
        for i in 1..=weight {
            integral = integral.checked_mul_by(NBASE).ok_or_else(|| out_of_range(scale))?;
            if i < ndigits {
                let digit = T::from_digit(values[next]).ok_or_else(|| out_of_range(scale))?;
                integral = integral.checked_add_to(digit).ok_or_else(|| out_of_range(scale))?;
                next += 1;
            }
        }
        integral = integral.checked_mul_by(scale_power).ok_or_else(|| out_of_range(scale))?;
    }

    let mut fractional = T::default();
    if ndigits > weight + 1 {
        // The last group may hold digits below the declared scale, so gather wide
        // and narrow only after the correction.
        let mut wide: i128 = 0;
        for &digit in &values[next..] {
            wide = wide
                .checked_mul(i128::from(NBASE))
                .and_then(|w| w.checked_add(i128::from(digit)))
                .ok_or_else(|| out_of_range(scale))?;
        }

        let fractional_power = (ndigits - weight - 1) * DEC_DIGITS;
        let correction = fractional_power - i32::from(scale);
        if correction.unsigned_abs() as usize >= POWERS_OF_TEN.len() {
            return Err(ScanError::InvalidNumeric(format!(
                "fractional correction of {correction} digits is out of range"
            )));
        }
        if correction >= 0 {
            wide /= i128::from(POWERS_OF_TEN[correction as usize]);
        } else {
            wide = wide
                .checked_mul(i128::from(POWERS_OF_TEN[(-correction) as usize]))
                .ok_or_else(|| out_of_range(scale))?;
        }
        fractional = T::from_wide(wide).ok_or_else(|| out_of_range(scale))?;
    }

    let value = integral.checked_add_to(fractional).ok_or_else(|| out_of_range(scale))?;
    if header.negative {
        value.checked_negate().ok_or_else(|| out_of_range(scale))
    } else {
        Ok(value)
    }
}

/// Reads a whole numeric payload at the given declared scale.
pub fn read_numeric<T: DecimalStorage>(data: &[u8], scale: u16) -> Result<T> {
    let (header, digits) = DecimalHeader::read(data)?;
    read_decimal(&header, digits, scale)
}

/// Approximates a numeric as a double, for unbounded numerics and declared
/// scales a fixed-width decimal cannot hold.
///
/// Sums `digit * 10000^(weight - i)` over the digit groups, so neither the
/// value's scale nor its magnitude is limited by integer storage.
pub fn read_numeric_as_f64(data: &[u8]) -> Result<f64> {
    let (header, digits) = DecimalHeader::read(data)?;
    let base = NBASE as f64;
    let mut exponent = i32::from(header.weight);
    let mut value = 0.0_f64;
    for chunk in digits.chunks_exact(2) {
        let digit = u16::from_be_bytes([chunk[0], chunk[1]]);
        if i64::from(digit) >= NBASE {
            return Err(ScanError::InvalidNumeric(format!("invalid base-10000 digit {digit}")));
        }
        value += f64::from(digit) * base.powi(exponent);
        exponent -= 1;
    }
    if !value.is_finite() {
        return Err(ScanError::InvalidNumeric("value exceeds the range of a double".to_string()));
    }
    Ok(if header.negative { -value } else { value })
}

// Value decoding - binary wire fields into column storage

mod field;
mod numeric;

pub use field::{decode_field, decode_row_id, MICROS_PER_SEC, POSTGRES_EPOCH_DAYS, POSTGRES_EPOCH_MICROS};
pub use numeric::{read_decimal, read_numeric, read_numeric_as_f64, DecimalHeader, DecimalStorage, NBASE, POWERS_OF_TEN};

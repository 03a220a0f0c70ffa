// Module declarations
pub mod error;
pub mod value;
pub mod data_type;
pub mod column;
pub mod vector;

// Re-exports for convenience
pub use error::{Result, ScanError};
pub use value::{DecimalValue, ScalarValue};
pub use data_type::{DecimalWidth, EnumType, Interval, TargetType, MAX_DECIMAL_PRECISION, MAX_DECIMAL_SCALE};
pub use column::{ColumnDescriptor, PgTypeInfo, TypeKind};
pub use vector::{ColumnData, ColumnVector, DataBatch, ListEntry};

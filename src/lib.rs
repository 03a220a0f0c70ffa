// PostgrustScan - parallel Postgres table scanner over binary COPY
// Decodes the native wire format straight into columnar batches

// Clippy configuration
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::wildcard_enum_match_arm)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::module_name_repetitions)]

// Core value, type and columnar batch structures
pub mod core;

// Source type to target type mapping
pub mod mapping;

// Binary field decoding (fixed width, numeric, temporal, arrays)
pub mod decode;

// Filter pushdown translation
pub mod filter;

// Snapshot pinning across worker sessions
pub mod transaction;

// Source sessions and the binary COPY framing
pub mod network;

// Bind, partitioning, readers and the parallel driver
pub mod scan;

// Layered configuration
pub mod config;

// Re-export commonly used types for convenience
pub use crate::config::{ConfigOverrides, ScanConfig};
pub use crate::core::{ColumnVector, DataBatch, Result, ScalarValue, ScanError, TargetType};
pub use filter::{ComparisonOp, FilterSet, TableFilter};
pub use mapping::TargetSchema;
pub use network::{PgConnection, PgConnector};
pub use scan::{ParallelScan, PostgresScanner, ProjectedColumn, ScanOptions, ScanWorker};

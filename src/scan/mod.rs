// Scan module - bind, partitioning and the per-worker COPY readers

mod bind;
mod parallel;
mod partition;
mod plan;
mod query;
mod reader;

pub use bind::{bind_table, BoundTable};
pub use parallel::{ParallelScan, PostgresScanner};
pub use partition::{PageRange, PartitionCoordinator, POSTGRES_TID_MAX};
pub use plan::{ScanOptions, ScanPlan};
pub use query::{build_copy_query, filter_clause, ProjectedColumn};
pub use reader::{ReaderState, ScanWorker};

// Transaction module - snapshot pinning across scan sessions

mod snapshot;

pub use snapshot::{ScanSnapshot, BEGIN_READ_ONLY};

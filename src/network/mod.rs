// Network module - source sessions and the binary COPY wire format

mod connection;
mod copy_binary;
#[cfg(test)]
pub(crate) mod fake;

pub use connection::{quote_identifier, Connector, PgConnection, PgConnector, ScanConnection, SourceCatalog, TableInfo};
pub use copy_binary::{BinaryCopyDecoder, Frame, RowFrame, COPY_BINARY_FLAGS, COPY_BINARY_SIGNATURE};
#[cfg(any(test, feature = "test-utils"))]
pub use copy_binary::BinaryCopyEncoder;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    // Bind-time configuration errors
    #[error("Postgres table \"{schema}\".\"{table}\" not found")]
    TableNotFound { schema: String, table: String },
    #[error("Table '{0}' does not contain any columns")]
    NoColumns(String),
    #[error("Column '{column}' has type '{type_name}' which cannot be read or cast to text")]
    UnsupportedType { column: String, type_name: String },

    // Decode errors
    #[error("Failed to decode {type_name} value of {len} bytes: {reason}")]
    Decode {
        type_name: String,
        len: usize,
        reason: String,
    },
    #[error("Invalid numeric value: {0}")]
    InvalidNumeric(String),
    #[error("JSONB version number mismatch, expected 1, got {0}")]
    JsonbVersion(u8),
    #[error("Only one-dimensional Postgres arrays are supported, got {0} dimensions")]
    UnsupportedArrayDimensions(i32),
    #[error("Could not map ENUM value '{value}' for type '{type_name}'")]
    UnknownEnumLabel { type_name: String, value: String },

    // Transport errors
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("Unable to read binary COPY data from Postgres: {0}")]
    Transport(String),
    #[error("Expected Postgres binary COPY header: {0}")]
    InvalidCopyHeader(String),
    #[error("Field count mismatch: expected {expected}, got {actual}")]
    FieldCountMismatch { expected: usize, actual: i16 },

    // Contract violations between the host engine and the scanner
    #[error("Internal error: {0}")]
    Internal(String),

    // Configuration
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub(crate) fn decode(type_name: impl Into<String>, len: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            type_name: type_name.into(),
            len,
            reason: reason.into(),
        }
    }

    /// Whether the error happened before any row was read.
    #[must_use]
    pub const fn is_bind_error(&self) -> bool {
        matches!(
            self,
            Self::TableNotFound { .. }
                | Self::NoColumns(_)
                | Self::UnsupportedType { .. }
                | Self::Config(_)
                | Self::InvalidConfig(_)
        )
    }

    /// Every error raised while streaming aborts the whole scan; nothing is retried.
    #[must_use]
    pub const fn is_fatal_to_scan(&self) -> bool {
        !self.is_bind_error()
    }
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;

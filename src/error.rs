use thiserror::Error;

/// Errors surfaced by the calendar core and its host adapters.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("preference store error: {0}")]
    Store(String),

    #[error("clipboard write failed: {0}")]
    Clipboard(String),

    #[error("application store rejected the change: {0}")]
    Sink(String),

    #[error("application not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading or writing the tracker file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML header: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("failed to encode TOML header: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("failed to parse JSONL record on line {line}: {source}")]
    JsonDecode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode JSONL record: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

pub type Result<T, E = CalendarError> = std::result::Result<T, E>;

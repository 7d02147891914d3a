use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarError {
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("Key format is missing")]
    MissingKeyFormat,

    #[error("Key format is already set")]
    KeyFormatAlreadySet,

    #[error("Writer has already been written")]
    AlreadyWritten,

    #[error("Invalid block ID: {0}")]
    InvalidBlockId(u32),

    #[error("Block too large: {0} bytes")]
    BlockTooLarge(usize),

    #[error("Block table is full: {0} slots")]
    BlockTableFull(usize),

    #[error("Invalid rendition scale: {0}")]
    InvalidScale(f64),

    #[error("File name too long: {0} bytes (max: 65535)")]
    FileNameTooLong(usize),

    #[error("Too many attributes for a facet: {0} (max: 65535)")]
    TooManyAttributes(usize),

    #[error("Name too long for the variable table: {0}")]
    NameTooLong(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CarError {
    /// Shorthand for building a `CorruptArchive` error
    pub fn corrupt(reason: impl Into<String>) -> Self {
        CarError::CorruptArchive(reason.into())
    }

    /// True for structural archive corruption
    pub fn is_corrupt(&self) -> bool {
        matches!(self, CarError::CorruptArchive(_))
    }
}

pub type Result<T> = std::result::Result<T, CarError>;

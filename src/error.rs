use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the evskim library.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O errors from std::io operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checksum mismatch error when calculated checksum doesn't match stored checksum.
    #[error("Checksum mismatch: expected {expected}, got {calculated}")]
    ChecksumMismatch { expected: u64, calculated: u64 },

    /// Invalid frame error for malformed frames (e.g., oversized length header).
    #[error("Invalid frame: {message}")]
    InvalidFrame { message: String },

    /// Unexpected end of file while reading stream data.
    #[error("Unexpected end of file while reading stream")]
    UnexpectedEof,

    /// A record payload failed FlatBuffers verification against its schema.
    #[error("FlatBuffers error: {0}")]
    FlatbuffersError(#[from] flatbuffers::InvalidFlatbuffer),

    /// Manifest, catalog or schema library JSON could not be read or written.
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// The container declares a checksum this build cannot verify.
    #[error("Unsupported checksum: {0}")]
    UnsupportedChecksum(String),

    /// The container manifest or a stream file has an unknown format version.
    #[error("Unsupported container format: {message}")]
    UnsupportedFormat { message: String },

    /// A record could not be built or decoded.
    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    /// A stream schema is malformed (e.g. duplicate branch names).
    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    /// The catalog configuration is malformed.
    #[error("Invalid catalog: {message}")]
    InvalidCatalog { message: String },

    /// The named stream does not exist in the container.
    #[error("Unknown stream {key}")]
    UnknownStream { key: String },

    /// The named stream was declared twice in one container.
    #[error("Duplicate stream {key}")]
    DuplicateStream { key: String },

    /// An input location could not be opened for read.
    #[error("Cannot open input {}: {source}", path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// An input lacks a stream the catalog requires.
    #[error("Missing required stream {key}")]
    MissingRequiredStream { key: String },

    /// No input yielded a usable set of streams, so no output was produced.
    #[error("No usable input: {reason}")]
    NoUsableInput { reason: String },

    /// The output container could not be created or overwritten.
    #[error("Cannot create output store {}: {source}", path.display())]
    StoreCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Schema library generation failed.
    #[error("Cannot generate schema library from {}: {source}", input.display())]
    SchemaGeneration {
        input: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// An input stream's schema cannot be bound to the established output stream.
    #[error("Schema mismatch for {key}: {reason}")]
    SchemaMismatch { key: String, reason: String },

    /// The skim has already been finalized; no further writes are permitted.
    #[error("Skim already finalized")]
    AlreadyFinalized,
}

impl Error {
    /// Create a new `InvalidFrame` error with a descriptive message.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Create a new `ChecksumMismatch` error with expected and calculated values.
    pub fn checksum_mismatch(expected: u64, calculated: u64) -> Self {
        Self::ChecksumMismatch {
            expected,
            calculated,
        }
    }

    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    pub fn schema_mismatch(key: impl ToString, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn input_open(path: impl Into<PathBuf>, source: Error) -> Self {
        Self::InputOpen {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error only disqualifies the current input of a skim.
    pub fn is_input_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InputOpen { .. }
                | Error::MissingRequiredStream { .. }
                | Error::SchemaMismatch { .. }
        )
    }
}

/// Result type alias for the library operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the icert library.
//!
//! Each variant names the pipeline stage that failed. None of them are
//! retried internally; a failed call leaves no guarantee about files it
//! may have partially written.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for icert operations.
#[derive(Error, Debug)]
pub enum IcertError {
    /// The requested key algorithm tag is not one we can generate
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key pair generation or conversion failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// The certificate template could not be built from the request
    #[error("Template build failed: {0}")]
    TemplateBuildFailed(String),

    /// Signing the certificate failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// PEM encoding of the certificate or key failed
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    /// Writing an output file failed
    #[error("Failed to write {}: {source}", path.display())]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CA certificate or key could not be loaded
    #[error("Failed to load CA from {}: {reason}", path.display())]
    CaLoadFailed { path: PathBuf, reason: String },

    /// An endpoint request carried no usable subject alternative names
    #[error("Invalid subject alternative names: {0}")]
    InvalidSubjectAltNames(String),

    /// PEM decoding error
    #[error("PEM error: {0}")]
    PemError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),
}

/// A specialized Result type for icert operations.
pub type Result<T> = std::result::Result<T, IcertError>;

impl IcertError {
    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IcertError::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn ca_load_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IcertError::CaLoadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

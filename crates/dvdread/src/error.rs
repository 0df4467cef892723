//! Error types for the DVD reader

use crate::domain::Domain;
use dvdread_input::InputError;
use dvdread_udf::UdfError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for reader operations
pub type Result<T> = std::result::Result<T, DvdError>;

/// Errors returned by [`crate::DvdReader`] and [`crate::DvdFile`]
#[derive(Debug, Error)]
pub enum DvdError {
    /// Filesystem error outside the block input layer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Block input failure
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// Malformed or unreadable UDF structures
    #[error("UDF error: {0}")]
    Udf(#[from] UdfError),

    /// The requested file or structure does not exist on the disc
    #[error("not found: {0}")]
    NotFound(String),

    /// The image or device does not hold a readable UDF root directory
    #[error("{path} is not a UDF volume: {reason}")]
    NotUdf {
        /// Path that was opened
        path: PathBuf,
        /// Why the root directory could not be resolved
        reason: String,
    },

    /// Title number not valid for the domain
    #[error("title {title} is not valid for {domain}")]
    InvalidTitle {
        /// Requested title
        title: u8,
        /// Requested domain
        domain: Domain,
    },

    /// Raw domain value outside the known set
    #[error("unsupported domain {0}")]
    UnsupportedDomain(u8),

    /// The operation needs an image or device, not a directory tree
    #[error("operation needs block access to the disc")]
    NoBlockAccess,

    /// Byte offset beyond the end of the file
    #[error("cannot seek to byte {offset} of a {size} byte file")]
    InvalidSeek {
        /// Requested offset
        offset: u64,
        /// File size in bytes
        size: u64,
    },

    /// The path is neither a file, a device nor a directory
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(PathBuf),
}

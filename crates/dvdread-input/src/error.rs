//! Error types for block input operations

use thiserror::Error;

/// Result type for block input operations
pub type Result<T> = std::result::Result<T, InputError>;

/// Errors that can occur while opening or reading a DVD source
#[derive(Debug, Error)]
pub enum InputError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source could not be positioned at a block
    #[error("cannot seek to block {block}")]
    Seek {
        /// Requested block
        block: u32,
    },

    /// Caller buffer is smaller than the requested block count
    #[error("buffer of {len} bytes cannot hold {blocks} blocks")]
    BufferTooSmall {
        /// Buffer length in bytes
        len: usize,
        /// Requested number of blocks
        blocks: usize,
    },

    /// The decryption library could not be loaded
    #[error("failed to load decryption library {name}: {reason}")]
    Library {
        /// Library name or path that was tried
        name: String,
        /// Loader error message
        reason: String,
    },

    /// A required symbol is absent from the decryption library
    #[error("decryption library is missing symbol {0}")]
    MissingSymbol(&'static str),

    /// The decryption library exports an interface we refuse to drive
    #[error("incompatible decryption library: {0}")]
    IncompatibleLibrary(String),

    /// The decryption library reported a failure
    #[error("decryption library error: {0}")]
    Css(String),

    /// Path cannot be handed to the decryption library
    #[error("invalid device path: {0}")]
    InvalidPath(String),
}

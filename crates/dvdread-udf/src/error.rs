//! Error types for UDF filesystem operations

use dvdread_input::InputError;
use thiserror::Error;

/// Result type for UDF filesystem operations
pub type Result<T> = std::result::Result<T, UdfError>;

/// Errors that can occur while walking a UDF filesystem
#[derive(Debug, Error)]
pub enum UdfError {
    /// The block device failed
    #[error("block input error: {0}")]
    Input(#[from] InputError),

    /// No Anchor Volume Descriptor Pointer at any anchor location
    #[error("no anchor volume descriptor pointer found")]
    AnchorNotFound,

    /// The logical volume uses a block size other than 2048
    #[error("unsupported logical block size {0}")]
    InvalidBlockSize(u32),

    /// A block holds a different descriptor than expected
    #[error("expected descriptor tag {expected}, found {found}")]
    UnexpectedTag {
        /// Tag identifier that was expected
        expected: u16,
        /// Tag identifier that was found
        found: u16,
    },

    /// Neither volume descriptor sequence describes the partition
    #[error("partition {0} not found in the volume descriptor sequences")]
    PartitionNotFound(u16),

    /// The partition holds no File Set Descriptor
    #[error("no file set descriptor in partition")]
    FileSetNotFound,

    /// The root directory ICB points outside partition 0
    #[error("root directory ICB lies in partition {partition}")]
    InvalidRootIcb {
        /// Partition named by the root ICB
        partition: u16,
    },

    /// A fixed-layout descriptor could not be decoded
    #[error("descriptor decode error: {0}")]
    BinRw(#[from] binrw::Error),

    /// A descriptor field extends past the data that was read
    #[error("descriptor truncated: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        /// Offset of the field
        offset: usize,
        /// Bytes the field needs
        needed: usize,
        /// Bytes available
        available: usize,
    },
}

//! Block-level input for DVD-Video sources
//!
//! Everything above this crate talks to a disc through the [`BlockInput`]
//! trait: seek to a logical block, read whole 2048-byte blocks, and announce
//! where a new decryption context (a CSS title key) begins.
//!
//! # Backends
//!
//! - [`FileInput`] - plain block I/O over an image file or block device,
//!   assuming the data is already decrypted
//! - [`CssInput`] - reads through a dynamically loaded CSS decryption
//!   library ([`CssLibrary`]), resolved once per process
//! - [`MemoryInput`] - an image held in memory
//!
//! [`InputBackend`] is the capability value that picks between the CSS and
//! plain implementations. [`InputBackend::detect`] probes for the decryption
//! library at most once and silently falls back to plain reads when it is
//! missing or incompatible.
//!
//! # Example
//!
//! ```no_run
//! use dvdread_input::{BlockInput, InputBackend, ReadFlags, BLOCK_SIZE};
//! use std::path::Path;
//!
//! # fn example() -> Result<(), dvdread_input::InputError> {
//! let backend = InputBackend::detect();
//! let mut device = backend.open(Path::new("/dev/dvd"))?;
//!
//! let mut block = vec![0u8; BLOCK_SIZE];
//! device.seek(16)?;
//! let read = device.read(&mut block, 1, ReadFlags::NoDecrypt)?;
//! assert_eq!(read, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod css;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::{InputBackend, LIBRARY_ENV, default_library_names};
pub use css::{CssInput, CssLibrary};
pub use error::{InputError, Result};
pub use file::FileInput;
pub use memory::MemoryInput;

/// Size of a DVD-Video logical block in bytes.
pub const BLOCK_SIZE: usize = 2048;

/// Whether a read should be descrambled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFlags {
    /// Return the blocks exactly as stored.
    #[default]
    NoDecrypt,
    /// Descramble blocks with the current title key, if the backend can.
    Decrypt,
}

/// Block-addressed access to a DVD-Video source.
///
/// Implementations keep a current position in blocks. `read` advances it by
/// the number of blocks returned. A returned count of zero means end of
/// input; an `Err` is an I/O failure.
pub trait BlockInput {
    /// Move to logical block `block`, returning the block actually reached.
    fn seek(&mut self, block: u32) -> Result<u32>;

    /// Read up to `blocks` blocks into `buf` from the current position.
    ///
    /// `buf` must hold at least `blocks * BLOCK_SIZE` bytes. Returns the
    /// number of whole blocks read.
    fn read(&mut self, buf: &mut [u8], blocks: usize, flags: ReadFlags) -> Result<usize>;

    /// Signal that a new decryption context starts at `block`.
    fn title(&mut self, block: u32) -> Result<()>;

    /// Size of the source in blocks, when it can be determined.
    fn block_count(&self) -> Option<u32> {
        None
    }

    /// Seek to `block` and read `blocks` blocks from there.
    ///
    /// A seek that lands anywhere other than `block` reads nothing and
    /// returns `Ok(0)`.
    fn read_at(
        &mut self,
        block: u32,
        buf: &mut [u8],
        blocks: usize,
        flags: ReadFlags,
    ) -> Result<usize> {
        let reached = self.seek(block)?;
        if reached != block {
            tracing::debug!("seek to block {block} landed on {reached}");
            return Ok(0);
        }
        self.read(buf, blocks, flags)
    }
}

impl<T: BlockInput + ?Sized> BlockInput for Box<T> {
    fn seek(&mut self, block: u32) -> Result<u32> {
        (**self).seek(block)
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize, flags: ReadFlags) -> Result<usize> {
        (**self).read(buf, blocks, flags)
    }

    fn title(&mut self, block: u32) -> Result<()> {
        (**self).title(block)
    }

    fn block_count(&self) -> Option<u32> {
        (**self).block_count()
    }
}

/// Verify that `buf` can hold `blocks` logical blocks.
pub(crate) fn check_buffer(buf: &[u8], blocks: usize) -> Result<usize> {
    let needed = blocks
        .checked_mul(BLOCK_SIZE)
        .ok_or(InputError::BufferTooSmall {
            len: buf.len(),
            blocks,
        })?;
    if buf.len() < needed {
        return Err(InputError::BufferTooSmall {
            len: buf.len(),
            blocks,
        });
    }
    Ok(needed)
}

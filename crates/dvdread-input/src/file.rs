//! Plain block I/O over image files and block devices
//!
//! Used when no decryption library is available, or for sources that were
//! decrypted while being ripped. `title` is a no-op.

use crate::{BLOCK_SIZE, BlockInput, ReadFlags, Result, check_buffer};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Unencrypted block input over a file or device node
#[derive(Debug)]
pub struct FileInput {
    file: File,
    path: PathBuf,
    blocks: Option<u32>,
}

impl FileInput {
    /// Open `path` read-only
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or its size probed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let blocks = size_in_blocks(&mut file)?;

        debug!("Opened {} ({:?} blocks)", path.display(), blocks);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            blocks,
        })
    }

    /// Path this input was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whole blocks in `file`, leaving it positioned at the start
///
/// Block devices report a zero length in their metadata; seeking to the end
/// works for both them and regular files.
fn size_in_blocks(file: &mut File) -> Result<Option<u32>> {
    let len = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(u32::try_from(len / BLOCK_SIZE as u64)
        .ok()
        .filter(|&b| b > 0))
}

/// Size of the file or device at `path` in blocks, if it can be opened
pub(crate) fn probe_block_count(path: &Path) -> Option<u32> {
    let mut file = File::open(path).ok()?;
    size_in_blocks(&mut file).ok().flatten()
}

impl BlockInput for FileInput {
    fn seek(&mut self, block: u32) -> Result<u32> {
        let offset = u64::from(block) * BLOCK_SIZE as u64;
        let reached = self.file.seek(SeekFrom::Start(offset))?;
        Ok((reached / BLOCK_SIZE as u64) as u32)
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize, _flags: ReadFlags) -> Result<usize> {
        let wanted = check_buffer(buf, blocks)?;

        let mut filled = 0;
        while filled < wanted {
            match self.file.read(&mut buf[filled..wanted]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        // Leave the position on a block boundary after a short read
        let partial = filled % BLOCK_SIZE;
        if partial != 0 {
            self.file.seek(SeekFrom::Current(-(partial as i64)))?;
        }

        Ok(filled / BLOCK_SIZE)
    }

    fn title(&mut self, _block: u32) -> Result<()> {
        Ok(())
    }

    fn block_count(&self) -> Option<u32> {
        self.blocks
    }
}

//! Reading an open DVD file

use crate::domain::CssTag;
use crate::error::{DvdError, Result};
use crate::reader::DvdReader;
use dvdread_input::{BLOCK_SIZE, BlockInput, InputError, ReadFlags};
use std::fmt;
use tracing::{debug, warn};

/// One file of a title VOB set in a directory tree
pub(crate) struct FilePart {
    /// Whole blocks in the file
    pub(crate) size: u32,
    pub(crate) input: Box<dyn BlockInput>,
}

enum FileStorage {
    /// Extent on the reader's device
    Image { start: u32 },
    /// Consecutive files, each read on its own
    Tree { parts: Vec<FilePart> },
}

/// A file opened with [`DvdReader::open_file`]
///
/// Borrows its reader, so it cannot outlive it. Block reads descramble
/// VOB data; byte reads return data as stored and are meant for IFO and
/// BUP files.
pub struct DvdFile<'r> {
    reader: &'r DvdReader,
    storage: FileStorage,
    css_title: Option<CssTag>,
    position: u64,
    size: u32,
}

impl<'r> DvdFile<'r> {
    pub(crate) fn image(
        reader: &'r DvdReader,
        start: u32,
        size: u32,
        css_title: Option<CssTag>,
    ) -> Self {
        Self {
            reader,
            storage: FileStorage::Image { start },
            css_title,
            position: 0,
            size,
        }
    }

    pub(crate) fn tree(
        reader: &'r DvdReader,
        parts: Vec<FilePart>,
        css_title: Option<CssTag>,
    ) -> Self {
        let size = parts
            .iter()
            .fold(0u32, |total, part| total.saturating_add(part.size));
        Self {
            reader,
            storage: FileStorage::Tree { parts },
            css_title,
            position: 0,
            size,
        }
    }

    /// Size in blocks
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Byte offset the next [`Self::read_bytes`] starts at
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Decryption context of the file; `None` for IFO and BUP files
    pub const fn css_title(&self) -> Option<CssTag> {
        self.css_title
    }

    /// Number of files backing this one
    pub fn part_count(&self) -> usize {
        match &self.storage {
            FileStorage::Image { .. } => 1,
            FileStorage::Tree { parts } => parts.len(),
        }
    }

    /// Read `count` blocks starting `offset` blocks into the file
    ///
    /// VOB data is descrambled. When this file's decryption context differs
    /// from the one the reader last used, the reader switches to it first.
    /// Returns the number of blocks read, zero past the end of the file.
    pub fn read_blocks(&mut self, offset: u32, count: usize, buf: &mut [u8]) -> Result<usize> {
        if let Some(tag) = self.css_title
            && self.reader.switch_css_title(tag)
            && let FileStorage::Image { start } = self.storage
        {
            debug!("switching CSS title to {} at block {start}", tag.raw());
            if let Err(e) = self.reader.device()?.title(start) {
                warn!("cannot switch CSS title at block {start}: {e}");
            }
        }
        self.read_raw(offset, count, buf, ReadFlags::Decrypt)
    }

    /// Fill `buf` from the current byte position, then advance it
    ///
    /// Returns `buf.len()`, or zero without touching `buf` if the blocks
    /// covering the window cannot all be read.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let block_size = BLOCK_SIZE as u64;
        let Ok(first) = u32::try_from(self.position / block_size) else {
            return Ok(0);
        };
        let skip = (self.position % block_size) as usize;
        let blocks = (skip + buf.len()).div_ceil(BLOCK_SIZE);

        let mut scratch = vec![0u8; blocks * BLOCK_SIZE];
        let read = self.read_raw(first, blocks, &mut scratch, ReadFlags::NoDecrypt)?;
        if read != blocks {
            debug!("short read: {read} of {blocks} blocks at block {first}");
            return Ok(0);
        }

        buf.copy_from_slice(&scratch[skip..skip + buf.len()]);
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    /// Move the byte position used by [`Self::read_bytes`]
    ///
    /// Seeking to the very end is allowed; past it is not.
    pub fn seek(&mut self, offset: u64) -> Result<u64> {
        let size = u64::from(self.size) * BLOCK_SIZE as u64;
        if offset > size {
            return Err(DvdError::InvalidSeek { offset, size });
        }
        self.position = offset;
        Ok(offset)
    }

    /// Close the file
    pub fn close(self) {}

    fn read_raw(
        &mut self,
        offset: u32,
        count: usize,
        buf: &mut [u8],
        flags: ReadFlags,
    ) -> Result<usize> {
        let needed = count.checked_mul(BLOCK_SIZE);
        if needed.is_none_or(|needed| buf.len() < needed) {
            return Err(InputError::BufferTooSmall {
                len: buf.len(),
                blocks: count,
            }
            .into());
        }
        if count == 0 {
            return Ok(0);
        }

        match &mut self.storage {
            FileStorage::Image { start } => {
                if offset >= self.size {
                    return Ok(0);
                }
                let count = count.min((self.size - offset) as usize);
                let Some(block) = start.checked_add(offset) else {
                    return Ok(0);
                };
                let mut device = self.reader.device()?;
                Ok(device.read_at(block, buf, count, flags)?)
            }
            FileStorage::Tree { parts } => read_parts(parts, offset, count, buf, flags),
        }
    }
}

/// Read across the files of a split VOB set
///
/// A read straddling the end of a part continues at the start of the next
/// one, with one backend read per part touched. A part that comes up short
/// ends the read.
fn read_parts(
    parts: &mut [FilePart],
    mut offset: u32,
    count: usize,
    buf: &mut [u8],
    flags: ReadFlags,
) -> Result<usize> {
    let mut done = 0;
    for part in parts.iter_mut() {
        if done == count || part.size == 0 {
            break;
        }
        if offset >= part.size {
            offset -= part.size;
            continue;
        }

        let wanted = (count - done).min((part.size - offset) as usize);
        let read = part
            .input
            .read_at(offset, &mut buf[done * BLOCK_SIZE..], wanted, flags)?;
        done += read;
        if read < wanted {
            break;
        }
        offset = 0;
    }
    Ok(done)
}

impl fmt::Debug for DvdFile<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = match self.storage {
            FileStorage::Image { start } => Some(start),
            FileStorage::Tree { .. } => None,
        };
        f.debug_struct("DvdFile")
            .field("start", &start)
            .field("parts", &self.part_count())
            .field("css_title", &self.css_title)
            .field("position", &self.position)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use dvdread_input::MemoryInput;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Counts backend reads into a shared tally
    struct Counting {
        inner: MemoryInput,
        reads: Rc<Cell<usize>>,
    }

    impl BlockInput for Counting {
        fn seek(&mut self, block: u32) -> dvdread_input::Result<u32> {
            self.inner.seek(block)
        }

        fn read(
            &mut self,
            buf: &mut [u8],
            blocks: usize,
            flags: ReadFlags,
        ) -> dvdread_input::Result<usize> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read(buf, blocks, flags)
        }

        fn title(&mut self, block: u32) -> dvdread_input::Result<()> {
            self.inner.title(block)
        }
    }

    fn data(seed: u8, blocks: u32) -> Vec<u8> {
        (0..blocks as usize * BLOCK_SIZE)
            .map(|i| seed.wrapping_add((i / BLOCK_SIZE) as u8))
            .collect()
    }

    fn part(seed: u8, blocks: u32) -> FilePart {
        FilePart {
            size: blocks,
            input: Box::new(MemoryInput::new(data(seed, blocks))),
        }
    }

    fn counted_part(seed: u8, blocks: u32, reads: &Rc<Cell<usize>>) -> FilePart {
        FilePart {
            size: blocks,
            input: Box::new(Counting {
                inner: MemoryInput::new(data(seed, blocks)),
                reads: Rc::clone(reads),
            }),
        }
    }

    #[test]
    fn test_read_inside_one_part() {
        let mut parts = vec![part(10, 3), part(20, 2)];
        let mut buf = vec![0u8; 2 * BLOCK_SIZE];
        let read = read_parts(&mut parts, 3, 2, &mut buf, ReadFlags::NoDecrypt).unwrap();
        assert_eq!(read, 2);
        assert_eq!(buf[0], 20);
        assert_eq!(buf[BLOCK_SIZE], 21);
    }

    #[test]
    fn test_read_straddles_parts() {
        let mut parts = vec![part(10, 3), part(20, 2)];
        let mut buf = vec![0u8; 3 * BLOCK_SIZE];
        let read = read_parts(&mut parts, 1, 3, &mut buf, ReadFlags::NoDecrypt).unwrap();
        assert_eq!(read, 3);
        assert_eq!(buf[0], 11);
        assert_eq!(buf[BLOCK_SIZE], 12);
        assert_eq!(buf[2 * BLOCK_SIZE], 20);
    }

    #[test]
    fn test_straddle_is_two_backend_reads() {
        let reads = Rc::new(Cell::new(0));
        let mut parts = vec![
            counted_part(10, 6, &reads),
            counted_part(20, 3, &reads),
            counted_part(30, 2, &reads),
        ];

        let mut buf = vec![0u8; 2 * BLOCK_SIZE];
        let read = read_parts(&mut parts, 5, 2, &mut buf, ReadFlags::Decrypt).unwrap();
        assert_eq!(read, 2);
        assert_eq!(reads.get(), 2);
        assert_eq!([buf[0], buf[BLOCK_SIZE]], [15, 20]);

        reads.set(0);
        let read = read_parts(&mut parts, 6, 2, &mut buf, ReadFlags::Decrypt).unwrap();
        assert_eq!(read, 2);
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn test_read_past_last_part() {
        let mut parts = vec![part(10, 3)];
        let mut buf = vec![0u8; 2 * BLOCK_SIZE];
        assert_eq!(
            read_parts(&mut parts, 2, 2, &mut buf, ReadFlags::NoDecrypt).unwrap(),
            1
        );
        assert_eq!(
            read_parts(&mut parts, 3, 1, &mut buf, ReadFlags::NoDecrypt).unwrap(),
            0
        );
    }

    #[test]
    fn test_read_spans_three_parts() {
        let mut parts = vec![part(10, 2), part(20, 1), part(30, 2)];
        let mut buf = vec![0u8; 4 * BLOCK_SIZE];
        let read = read_parts(&mut parts, 1, 4, &mut buf, ReadFlags::NoDecrypt).unwrap();
        assert_eq!(read, 4);
        let firsts: Vec<u8> = buf.chunks(BLOCK_SIZE).map(|block| block[0]).collect();
        assert_eq!(firsts, [11, 20, 30, 31]);
    }

    #[test]
    fn test_empty_part_ends_file() {
        let mut parts = vec![part(10, 0), part(20, 2)];
        let mut buf = vec![0u8; BLOCK_SIZE];
        assert_eq!(
            read_parts(&mut parts, 0, 1, &mut buf, ReadFlags::NoDecrypt).unwrap(),
            0
        );
    }
}

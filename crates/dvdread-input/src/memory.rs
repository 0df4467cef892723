//! In-memory block input

use crate::{BLOCK_SIZE, BlockInput, ReadFlags, Result, check_buffer};

/// A disc image held in memory
///
/// Behaves like [`FileInput`](crate::FileInput) over the same bytes: only
/// whole blocks are returned and `title` does nothing.
#[derive(Debug, Clone, Default)]
pub struct MemoryInput {
    data: Vec<u8>,
    position: usize,
}

impl MemoryInput {
    /// Wrap an image
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }

    /// Image bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable image bytes, for corrupting fixtures
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// Current position in blocks
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Unwrap the image
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn total_blocks(&self) -> usize {
        self.data.len() / BLOCK_SIZE
    }
}

impl From<Vec<u8>> for MemoryInput {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl BlockInput for MemoryInput {
    fn seek(&mut self, block: u32) -> Result<u32> {
        self.position = block as usize;
        Ok(block)
    }

    fn read(&mut self, buf: &mut [u8], blocks: usize, _flags: ReadFlags) -> Result<usize> {
        check_buffer(buf, blocks)?;

        let available = self.total_blocks().saturating_sub(self.position);
        let count = blocks.min(available);
        if count == 0 {
            return Ok(0);
        }
        let start = self.position * BLOCK_SIZE;
        let len = count * BLOCK_SIZE;
        buf[..len].copy_from_slice(&self.data[start..start + len]);
        self.position += count;
        Ok(count)
    }

    fn title(&mut self, _block: u32) -> Result<()> {
        Ok(())
    }

    fn block_count(&self) -> Option<u32> {
        u32::try_from(self.total_blocks()).ok().filter(|&b| b > 0)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_past_end_is_short() {
        let mut input = MemoryInput::new(vec![7u8; BLOCK_SIZE * 3]);
        let mut buf = vec![0u8; BLOCK_SIZE * 2];

        assert_eq!(
            input.read_at(2, &mut buf, 2, ReadFlags::NoDecrypt).expect("read"),
            1
        );
        assert_eq!(input.position(), 3);
        assert_eq!(input.read(&mut buf, 1, ReadFlags::NoDecrypt).expect("read"), 0);
    }

    #[test]
    fn test_trailing_partial_block_ignored() {
        let input = MemoryInput::new(vec![0u8; BLOCK_SIZE + 100]);
        assert_eq!(input.block_count(), Some(1));
    }
}

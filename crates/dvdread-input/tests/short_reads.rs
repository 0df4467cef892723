#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Short-read behaviour shared by the plain backends
//!
//! A read never returns a partial block, and whatever is left over is read
//! again by the next call.

use dvdread_input::{BLOCK_SIZE, BlockInput, FileInput, MemoryInput, ReadFlags};
use proptest::prelude::*;
use std::io::Write;

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

proptest! {
    #[test]
    fn file_input_returns_whole_blocks(
        len in 0usize..BLOCK_SIZE * 6,
        start in 0u32..6,
        count in 1usize..5,
    ) {
        let data = patterned(len);
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&data).expect("write");

        let mut input = FileInput::open(file.path()).expect("open");
        let mut buf = vec![0u8; count * BLOCK_SIZE];
        let read = input.read_at(start, &mut buf, count, ReadFlags::NoDecrypt).expect("read");

        let whole = len / BLOCK_SIZE;
        let expected = whole.saturating_sub(start as usize).min(count);
        prop_assert_eq!(read, expected);

        if read > 0 {
            let offset = start as usize * BLOCK_SIZE;
            prop_assert_eq!(&buf[..read * BLOCK_SIZE], &data[offset..offset + read * BLOCK_SIZE]);
        }
    }

    #[test]
    fn memory_input_matches_file_input(
        len in 0usize..BLOCK_SIZE * 5,
        start in 0u32..5,
        count in 1usize..4,
    ) {
        let data = patterned(len);
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&data).expect("write");

        let mut from_file = FileInput::open(file.path()).expect("open");
        let mut from_memory = MemoryInput::new(data);

        let mut a = vec![0u8; count * BLOCK_SIZE];
        let mut b = vec![0u8; count * BLOCK_SIZE];
        let ra = from_file.read_at(start, &mut a, count, ReadFlags::NoDecrypt).expect("read");
        let rb = from_memory.read_at(start, &mut b, count, ReadFlags::NoDecrypt).expect("read");

        prop_assert_eq!(ra, rb);
        prop_assert_eq!(&a[..ra * BLOCK_SIZE], &b[..rb * BLOCK_SIZE]);
    }
}

#[test]
fn sequential_reads_continue_where_the_last_stopped() {
    let data = patterned(BLOCK_SIZE * 3);
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(&data).expect("write");

    let mut input = FileInput::open(file.path()).expect("open");
    let mut buf = vec![0u8; BLOCK_SIZE * 2];

    assert_eq!(input.read(&mut buf, 2, ReadFlags::NoDecrypt).unwrap(), 2);
    assert_eq!(&buf[..], &data[..BLOCK_SIZE * 2]);

    assert_eq!(input.read(&mut buf, 2, ReadFlags::NoDecrypt).unwrap(), 1);
    assert_eq!(&buf[..BLOCK_SIZE], &data[BLOCK_SIZE * 2..]);
}

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Path resolution against synthetic DVD-Video images

use dvdread_input::{BLOCK_SIZE, BlockInput, MemoryInput, ReadFlags};
use dvdread_test_utils::{DiscBuilder, MAIN_SEQUENCE, pattern, standard_dvd_files};
use dvdread_udf::icb::FILE_ENTRY_LAYOUT;
use dvdread_udf::{AdForm, CacheLevel, FileLocation, UdfError, UdfFs};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Counts block reads reaching the wrapped input
struct Counting {
    inner: MemoryInput,
    reads: usize,
}

impl Counting {
    fn new(inner: MemoryInput) -> Self {
        Self { inner, reads: 0 }
    }
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
        self.reads += 1;
        self.inner.read(buf, blocks, flags)
    }

    fn title(&mut self, block: u32) -> dvdread_input::Result<()> {
        self.inner.title(block)
    }

    fn block_count(&self) -> Option<u32> {
        self.inner.block_count()
    }
}

#[test]
fn resolves_every_standard_file() {
    let image = DiscBuilder::dvd().build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    for (name, data) in standard_dvd_files() {
        let found = fs
            .find_file(&mut device, &format!("/VIDEO_TS/{name}"))
            .unwrap()
            .unwrap_or_else(|| panic!("{name} not found"));
        let placed = image.file(&name);
        assert_eq!(found.block, placed.block, "{name}");
        assert_eq!(found.length, data.len() as u64, "{name}");
    }
}

#[test]
fn data_at_resolved_block_matches() {
    let image = DiscBuilder::dvd().build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    let location = fs
        .find_file(&mut device, "/VIDEO_TS/VTS_01_1.VOB")
        .unwrap()
        .unwrap();
    let blocks = location.blocks() as usize;
    let mut buf = vec![0u8; blocks * BLOCK_SIZE];
    assert_eq!(
        device
            .read_at(location.block, &mut buf, blocks, ReadFlags::NoDecrypt)
            .unwrap(),
        blocks
    );
    assert_eq!(buf, pattern(5, 6 * BLOCK_SIZE));
}

#[test]
fn lookup_ignores_case() {
    let image = DiscBuilder::dvd().video_ts_name("video_ts").build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    let upper = fs.find_file(&mut device, "/VIDEO_TS/VTS_01_1.VOB").unwrap();
    let lower = fs.find_file(&mut device, "/video_ts/vts_01_1.vob").unwrap();
    let mixed = fs.find_file(&mut device, "/Video_Ts/Vts_01_1.Vob").unwrap();

    assert!(upper.is_some());
    assert_eq!(upper, lower);
    assert_eq!(upper, mixed);
}

#[test]
fn partition_start_offsets_locations() {
    let image = DiscBuilder::new()
        .partition_start(300)
        .file_at("VIDEO_TS.IFO", pattern(1, 4096), 12)
        .build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    let found = fs
        .find_file(&mut device, "/VIDEO_TS/VIDEO_TS.IFO")
        .unwrap()
        .unwrap();
    assert_eq!(
        found,
        FileLocation {
            block: 312,
            length: 4096,
        }
    );
    assert_eq!(found.blocks(), 2);
}

#[test]
fn extended_entries_and_long_descriptors() {
    let image = DiscBuilder::dvd()
        .extended_entries(true)
        .ad_form(AdForm::Long)
        .build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    let found = fs
        .find_file(&mut device, "/VIDEO_TS/VTS_02_1.VOB")
        .unwrap()
        .unwrap();
    assert_eq!(found.block, image.file("VTS_02_1.VOB").block);
}

#[test]
fn missing_paths_are_none() {
    let image = DiscBuilder::dvd().build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    assert!(fs.find_file(&mut device, "/VIDEO_TS/VTS_09_1.VOB").unwrap().is_none());
    assert!(fs.find_file(&mut device, "/NOPE/VIDEO_TS.IFO").unwrap().is_none());
    assert!(
        fs.find_file(&mut device, "/VIDEO_TS/VIDEO_TS.IFO/X")
            .unwrap()
            .is_none()
    );
}

#[test]
fn empty_files_are_none() {
    let image = DiscBuilder::new().file("VIDEO_TS.IFO", Vec::new()).build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    assert!(fs.find_file(&mut device, "/VIDEO_TS/VIDEO_TS.IFO").unwrap().is_none());
}

#[test]
fn root_resolves() {
    let image = DiscBuilder::new().build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    let root = fs.find_file(&mut device, "/").unwrap().unwrap();
    assert!(root.block > image.partition_start);
}

#[test]
fn corrupted_primary_anchor_uses_backup() {
    let mut image = DiscBuilder::dvd().build();
    image.corrupt_block(256);
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    let found = fs.find_file(&mut device, "/VIDEO_TS/VIDEO_TS.IFO").unwrap();
    assert_eq!(found.map(|f| f.block), Some(image.file("VIDEO_TS.IFO").block));
}

#[test]
fn no_anchor_at_all() {
    let mut image = DiscBuilder::dvd().build();
    image.corrupt_anchors();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    assert!(matches!(
        fs.find_file(&mut device, "/"),
        Err(UdfError::AnchorNotFound)
    ));
}

#[test]
fn corrupted_main_sequence_uses_reserve() {
    let mut image = DiscBuilder::dvd().build();
    for block in MAIN_SEQUENCE..MAIN_SEQUENCE + 4 {
        image.corrupt_block(block);
    }
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    assert!(
        fs.find_file(&mut device, "/VIDEO_TS/VIDEO_TS.IFO")
            .unwrap()
            .is_some()
    );
    assert_eq!(
        fs.volume_identifier(&mut device).unwrap().as_deref(),
        Some("TEST_DISC")
    );
}

#[test]
fn volume_identifiers() {
    let mut set = [0u8; 128];
    set[..8].copy_from_slice(b"SETIDENT");
    let image = DiscBuilder::new()
        .volume_identifier("SOME_MOVIE")
        .volume_set_identifier(set)
        .build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    assert_eq!(
        fs.volume_identifier(&mut device).unwrap().as_deref(),
        Some("SOME_MOVIE")
    );
    assert_eq!(fs.volume_set_identifier(&mut device).unwrap(), Some(set));
}

#[test]
fn video_ts_entries_are_preloaded() {
    let image = DiscBuilder::dvd().build();
    let mut device = Counting::new(image.to_input());
    let mut fs = UdfFs::default();

    fs.find_file(&mut device, "/VIDEO_TS/VIDEO_TS.IFO")
        .unwrap()
        .unwrap();
    let stats = fs.cache_stats();
    assert!(stats.partition);
    assert!(stats.root_icb);
    assert!(stats.icbs >= standard_dvd_files().len());

    device.reads = 0;
    fs.find_file(&mut device, "/VIDEO_TS/VTS_01_3.VOB")
        .unwrap()
        .unwrap();
    assert_eq!(device.reads, 0);
}

#[test]
fn disabled_cache_rereads() {
    let image = DiscBuilder::dvd().build();
    let mut device = Counting::new(image.to_input());
    let mut fs = UdfFs::new(CacheLevel::Disabled);

    let first = fs.find_file(&mut device, "/VIDEO_TS/VTS_01_1.VOB").unwrap();
    let reads = device.reads;
    let second = fs.find_file(&mut device, "/VIDEO_TS/VTS_01_1.VOB").unwrap();

    assert_eq!(first, second);
    assert_eq!(device.reads, reads * 2);
    assert_eq!(fs.cache_stats(), dvdread_udf::CacheStats::default());
}

#[test]
fn cache_level_can_be_toggled() {
    let image = DiscBuilder::dvd().build();
    let mut device = image.to_input();
    let mut fs = UdfFs::default();

    for level in [CacheLevel::Disabled, CacheLevel::Enabled, CacheLevel::Disabled] {
        fs.set_cache_level(level);
        assert_eq!(fs.cache_level(), level);
        assert!(
            fs.find_file(&mut device, "/VIDEO_TS/VIDEO_TS.VOB")
                .unwrap()
                .is_some()
        );
    }
}

#[test]
fn broken_sibling_entry_does_not_affect_lookup() {
    let mut image = DiscBuilder::dvd().build();
    let entry = image.partition_start + image.file("VTS_01_1.VOB").entry;
    let l_ad = entry as usize * BLOCK_SIZE + FILE_ENTRY_LAYOUT.1;
    image.data[l_ad..l_ad + 4].copy_from_slice(&4000u32.to_le_bytes());

    for level in [CacheLevel::Disabled, CacheLevel::Enabled] {
        let mut device = image.to_input();
        let mut fs = UdfFs::new(level);

        let found = fs.find_file(&mut device, "/VIDEO_TS/VIDEO_TS.IFO").unwrap();
        assert_eq!(
            found.map(|f| f.block),
            Some(image.file("VIDEO_TS.IFO").block),
            "{level:?}"
        );
        assert!(
            fs.find_file(&mut device, "/VIDEO_TS/VTS_01_2.VOB").unwrap().is_some(),
            "{level:?}"
        );
        assert!(
            fs.find_file(&mut device, "/VIDEO_TS/VTS_01_1.VOB").is_err(),
            "{level:?}"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn length_and_block_count_follow_file_size(len in 1usize..6 * BLOCK_SIZE) {
        let image = DiscBuilder::new().file("VTS_01_1.VOB", pattern(3, len)).build();
        let mut device = image.to_input();
        let mut fs = UdfFs::default();

        let found = fs.find_file(&mut device, "/VIDEO_TS/VTS_01_1.VOB").unwrap().unwrap();
        prop_assert_eq!(found.length, len as u64);
        prop_assert_eq!(found.blocks() as usize, len.div_ceil(BLOCK_SIZE));
    }
}

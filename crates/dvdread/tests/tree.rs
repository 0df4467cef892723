#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Reading a disc copied to a directory

use dvdread::{BLOCK_SIZE, CssMode, Domain, DvdError, DvdReader, ReaderConfig, ReaderMode};
use dvdread_test_utils::{standard_dvd_files, standard_file, temp_tree, write_tree};
use pretty_assertions::assert_eq;
use std::path::Path;

fn open(path: &Path) -> DvdReader {
    let config = ReaderConfig::new().with_css(CssMode::Disabled);
    DvdReader::open_with_config(path, config).unwrap()
}

fn title_vobs() -> Vec<u8> {
    let mut data = standard_file("VTS_01_1.VOB");
    data.extend(standard_file("VTS_01_2.VOB"));
    data.extend(standard_file("VTS_01_3.VOB"));
    data
}

#[test]
fn opens_as_directory_tree() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());
    assert_eq!(reader.mode(), ReaderMode::DirectoryTree);
    assert_eq!(reader.path(), Some(root.path()));
}

#[test]
fn video_ts_itself_can_be_opened() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(&root.path().join("VIDEO_TS"));
    assert_eq!(reader.open_file(1, Domain::TitleVobs).unwrap().size(), 11);
}

#[test]
fn whole_blocks_only() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());

    // 5000 bytes on disk, the partial block is not readable
    assert_eq!(reader.open_file(0, Domain::InfoFile).unwrap().size(), 2);
    assert_eq!(reader.open_file(2, Domain::InfoFile).unwrap().size(), 1);
    assert_eq!(reader.open_file(0, Domain::MenuVobs).unwrap().size(), 4);
}

#[test]
fn title_vob_parts_read_as_one_file() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());
    let mut vobs = reader.open_file(1, Domain::TitleVobs).unwrap();
    assert_eq!(vobs.part_count(), 3);
    assert_eq!(vobs.size(), 11);

    let mut all = vec![0u8; 11 * BLOCK_SIZE];
    assert_eq!(vobs.read_blocks(0, 11, &mut all).unwrap(), 11);
    assert_eq!(all, title_vobs());
}

#[test]
fn read_across_part_boundary_concatenates() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());
    let mut vobs = reader.open_file(1, Domain::TitleVobs).unwrap();
    let expected = title_vobs();

    // Last block of part 1 and first of part 2
    let mut buf = vec![0u8; 2 * BLOCK_SIZE];
    assert_eq!(vobs.read_blocks(5, 2, &mut buf).unwrap(), 2);
    assert_eq!(buf, &expected[5 * BLOCK_SIZE..7 * BLOCK_SIZE]);

    // Part 2 into part 3
    let mut buf = vec![0u8; 3 * BLOCK_SIZE];
    assert_eq!(vobs.read_blocks(7, 3, &mut buf).unwrap(), 3);
    assert_eq!(buf, &expected[7 * BLOCK_SIZE..10 * BLOCK_SIZE]);

    // Past the end
    assert_eq!(vobs.read_blocks(11, 1, &mut buf).unwrap(), 0);
}

#[test]
fn lookups_ignore_case() {
    let upper = temp_tree("VIDEO_TS");
    let lower = tempfile::tempdir().unwrap();
    let files: Vec<(String, Vec<u8>)> = standard_dvd_files()
        .into_iter()
        .map(|(name, data)| (name.to_ascii_lowercase(), data))
        .collect();
    write_tree(lower.path(), "video_ts", &files).unwrap();

    let upper = open(upper.path());
    let lower = open(lower.path());
    for (title, domain) in [
        (0, Domain::InfoFile),
        (0, Domain::MenuVobs),
        (1, Domain::InfoBackupFile),
        (1, Domain::TitleVobs),
        (2, Domain::TitleVobs),
    ] {
        assert_eq!(
            upper.file_stat(title, domain).unwrap(),
            lower.file_stat(title, domain).unwrap(),
            "title {title} {domain}"
        );
    }

    let mut vobs = lower.open_file(1, Domain::TitleVobs).unwrap();
    let mut all = vec![0u8; 11 * BLOCK_SIZE];
    assert_eq!(vobs.read_blocks(0, 11, &mut all).unwrap(), 11);
    assert_eq!(all, title_vobs());
}

#[test]
fn files_at_the_root() {
    let root = tempfile::tempdir().unwrap();
    write_tree(root.path(), "", &standard_dvd_files()).unwrap();
    let reader = open(root.path());
    assert_eq!(reader.file_stat(0, Domain::InfoFile).unwrap().size, 5000);
}

#[test]
fn file_stat_in_bytes() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());

    let stat = reader.file_stat(1, Domain::TitleVobs).unwrap();
    assert_eq!(
        stat.parts,
        [6, 3, 2].map(|blocks| (blocks * BLOCK_SIZE) as u64)
    );
    assert_eq!(stat.size, 11 * BLOCK_SIZE as u64);
    assert_eq!(reader.file_stat(1, Domain::InfoFile).unwrap().parts, [3000]);
    assert!(matches!(
        reader.file_stat(2, Domain::MenuVobs),
        Err(DvdError::NotFound(_))
    ));
}

#[test]
fn missing_and_invalid() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());

    assert!(matches!(
        reader.open_file(3, Domain::TitleVobs),
        Err(DvdError::NotFound(name)) if name == "VTS_03_1.VOB"
    ));
    assert!(matches!(
        reader.open_file(0, Domain::TitleVobs),
        Err(DvdError::InvalidTitle { .. })
    ));
}

#[test]
fn volume_info_needs_block_access() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());

    assert!(matches!(
        reader.udf_volume_info(),
        Err(DvdError::NoBlockAccess)
    ));
    assert!(matches!(
        reader.iso_volume_info(),
        Err(DvdError::NoBlockAccess)
    ));
    assert!(matches!(
        reader.init_all_css_keys(),
        Err(DvdError::NoBlockAccess)
    ));
}

#[test]
fn disc_id_over_whole_blocks() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());

    let mut expected = standard_file("VIDEO_TS.IFO")[..2 * BLOCK_SIZE].to_vec();
    expected.extend(&standard_file("VTS_01_0.IFO")[..BLOCK_SIZE]);
    expected.extend(standard_file("VTS_02_0.IFO"));
    assert_eq!(reader.disc_id().unwrap(), md5::compute(&expected).0);
}

#[test]
fn summary_without_volume_info() {
    let root = temp_tree("VIDEO_TS");
    let reader = open(root.path());
    let summary = reader.summary().unwrap();

    assert_eq!(summary.mode, ReaderMode::DirectoryTree);
    assert!(summary.udf_volume.is_none());
    assert!(summary.iso_volume.is_none());
    assert!(summary.disc_id.is_some());
    assert_eq!(summary.title_sets.len(), 3);
}

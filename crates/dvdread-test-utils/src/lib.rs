//! Test utilities for dvdread-rs
//!
//! Builds small DVD-Video UDF images and `VIDEO_TS` directory trees, so tests
//! never need a real disc. Images carry an ISO 9660 primary volume
//! descriptor, main and reserve volume descriptor sequences, anchors at
//! block 256 and near the end, and one partition holding the root
//! directory, `VIDEO_TS` and its files.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic, missing_docs)]

use binrw::BinWrite;
use binrw::io::Cursor;
use dvdread_input::{BLOCK_SIZE, MemoryInput};
use dvdread_udf::ad::{AdForm, LongAd, ShortAd};
use dvdread_udf::descriptor::{
    AnchorPointer, DescriptorTag, EntityId, ExtentAd, LogicalVolumeDescriptor,
    PartitionDescriptor, PrimaryVolumeDescriptor, ROOT_ICB_OFFSET, encode_dchars, encode_dstring,
    tag,
};
use dvdread_udf::directory::{FileIdentifierHeader, characteristics, record_size};
use dvdread_udf::icb::{
    EXTENDED_FILE_ENTRY_LAYOUT, FILE_ENTRY_LAYOUT, ICB_TAG_OFFSET, INFORMATION_LENGTH_OFFSET,
    IcbTag,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// ISO 9660 primary volume descriptor block
pub const ISO_PVD_BLOCK: u32 = 16;

/// First block of the main volume descriptor sequence
pub const MAIN_SEQUENCE: u32 = 32;

/// First block of the reserve volume descriptor sequence
pub const RESERVE_SEQUENCE: u32 = 48;

/// Primary anchor block
pub const ANCHOR_BLOCK: u32 = 256;

/// Partition start used unless overridden
pub const DEFAULT_PARTITION_START: u32 = 300;

const SEQUENCE_BLOCKS: u32 = 16;

/// Deterministic file contents that differ per `seed` and per offset
pub fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| {
            let mixed = (i as u32 ^ (u32::from(seed) << 20)).wrapping_mul(2_654_435_761);
            (mixed >> 24) as u8
        })
        .collect()
}

/// The files of a two-title DVD
///
/// IFO sizes are not block multiples so size rounding is exercised.
/// Title 1 has three VOB parts, title 2 one.
pub fn standard_dvd_files() -> Vec<(String, Vec<u8>)> {
    let ifo = pattern(1, 5000);
    let vts1_ifo = pattern(3, 3000);
    let vts2_ifo = pattern(8, BLOCK_SIZE);
    vec![
        ("VIDEO_TS.IFO".into(), ifo.clone()),
        ("VIDEO_TS.BUP".into(), ifo),
        ("VIDEO_TS.VOB".into(), pattern(2, 4 * BLOCK_SIZE)),
        ("VTS_01_0.IFO".into(), vts1_ifo.clone()),
        ("VTS_01_0.BUP".into(), vts1_ifo),
        ("VTS_01_0.VOB".into(), pattern(4, 2 * BLOCK_SIZE)),
        ("VTS_01_1.VOB".into(), pattern(5, 6 * BLOCK_SIZE)),
        ("VTS_01_2.VOB".into(), pattern(6, 3 * BLOCK_SIZE)),
        ("VTS_01_3.VOB".into(), pattern(7, 2 * BLOCK_SIZE)),
        ("VTS_02_0.IFO".into(), vts2_ifo.clone()),
        ("VTS_02_0.BUP".into(), vts2_ifo),
        ("VTS_02_1.VOB".into(), pattern(9, 2 * BLOCK_SIZE)),
    ]
}

/// Contents of `name` in [`standard_dvd_files`]
pub fn standard_file(name: &str) -> Vec<u8> {
    standard_dvd_files()
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, data)| data)
        .unwrap_or_else(|| panic!("{name} is not a standard DVD file"))
}

#[derive(Debug, Clone)]
struct FileSpec {
    name: String,
    data: Vec<u8>,
    location: Option<u32>,
}

/// Where the builder put a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedFile {
    /// Absolute first data block
    pub block: u32,
    /// Partition-relative first data block
    pub location: u32,
    /// Length in bytes
    pub length: u64,
    /// Partition-relative block of the file entry
    pub entry: u32,
}

/// Builder for a synthetic DVD-Video UDF image
#[derive(Debug, Clone)]
pub struct DiscBuilder {
    volume_identifier: String,
    volume_set_identifier: [u8; 128],
    iso_identifier: Option<String>,
    partition_start: u32,
    video_ts_name: String,
    extra_directories: Vec<String>,
    files: Vec<FileSpec>,
    extended_entries: bool,
    ad_form: AdForm,
    backup_anchors: bool,
}

impl Default for DiscBuilder {
    fn default() -> Self {
        let mut volume_set_identifier = [0u8; 128];
        volume_set_identifier[..16].copy_from_slice(b"0123456789ABCDEF");
        Self {
            volume_identifier: "TEST_DISC".into(),
            volume_set_identifier,
            iso_identifier: Some("TEST_DISC".into()),
            partition_start: DEFAULT_PARTITION_START,
            video_ts_name: "VIDEO_TS".into(),
            extra_directories: vec!["AUDIO_TS".into()],
            files: Vec::new(),
            extended_entries: false,
            ad_form: AdForm::Short,
            backup_anchors: true,
        }
    }
}

impl DiscBuilder {
    /// Empty `VIDEO_TS`
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder holding [`standard_dvd_files`]
    pub fn dvd() -> Self {
        standard_dvd_files()
            .into_iter()
            .fold(Self::new(), |builder, (name, data)| builder.file(&name, data))
    }

    pub fn volume_identifier(mut self, identifier: &str) -> Self {
        self.volume_identifier = identifier.into();
        self
    }

    pub fn volume_set_identifier(mut self, identifier: [u8; 128]) -> Self {
        self.volume_set_identifier = identifier;
        self
    }

    /// ISO 9660 volume identifier; `None` leaves block 16 empty
    pub fn iso_identifier(mut self, identifier: Option<&str>) -> Self {
        self.iso_identifier = identifier.map(Into::into);
        self
    }

    pub fn partition_start(mut self, start: u32) -> Self {
        self.partition_start = start;
        self
    }

    /// Name recorded for the `VIDEO_TS` directory
    pub fn video_ts_name(mut self, name: &str) -> Self {
        self.video_ts_name = name.into();
        self
    }

    /// Add a file to `VIDEO_TS`
    pub fn file(mut self, name: &str, data: Vec<u8>) -> Self {
        self.files.push(FileSpec {
            name: name.into(),
            data,
            location: None,
        });
        self
    }

    /// Add a file whose data starts at partition-relative `location`
    ///
    /// `location` must lie past everything allocated before it.
    pub fn file_at(mut self, name: &str, data: Vec<u8>, location: u32) -> Self {
        self.files.push(FileSpec {
            name: name.into(),
            data,
            location: Some(location),
        });
        self
    }

    /// Record Extended File Entries instead of File Entries
    pub fn extended_entries(mut self, extended: bool) -> Self {
        self.extended_entries = extended;
        self
    }

    /// Descriptor form for file data, short or long
    pub fn ad_form(mut self, form: AdForm) -> Self {
        assert!(matches!(form, AdForm::Short | AdForm::Long));
        self.ad_form = form;
        self
    }

    /// Whether to record the anchors near the end of the image
    pub fn backup_anchors(mut self, enabled: bool) -> Self {
        self.backup_anchors = enabled;
        self
    }

    pub fn build(&self) -> DiscImage {
        let start = self.partition_start;
        assert!(start > ANCHOR_BLOCK, "partition must follow the anchor");

        // Partition-relative layout
        let fsd = 0u32;
        let root_entry = 1u32;
        let root_dir = 2u32;
        let mut cursor = 3u32;

        let video_ts_entry = cursor;
        let video_ts_dir = cursor + 1;
        let video_ts_len = self
            .files
            .iter()
            .map(|f| record_size(encode_dchars(&f.name).len(), 0))
            .sum::<usize>()
            + record_size(0, 0);
        cursor = video_ts_dir + blocks_for(video_ts_len);

        let mut extra = Vec::new();
        for name in &self.extra_directories {
            extra.push((name.clone(), cursor, cursor + 1));
            cursor += 2;
        }

        // Entries first, so data of consecutive files is contiguous
        let first_entry = cursor;
        cursor += self.files.len() as u32;

        let mut placed = BTreeMap::new();
        for (index, spec) in self.files.iter().enumerate() {
            let entry = first_entry + index as u32;
            let location = if spec.data.is_empty() {
                0
            } else {
                let location = spec.location.unwrap_or(cursor);
                assert!(location >= cursor, "{} overlaps earlier data", spec.name);
                cursor = location + blocks_for(spec.data.len());
                location
            };
            placed.insert(
                spec.name.clone(),
                PlacedFile {
                    block: if location == 0 { 0 } else { start + location },
                    location,
                    length: spec.data.len() as u64,
                    entry,
                },
            );
        }
        let partition_length = cursor;

        let end = start + partition_length;
        let total = if self.backup_anchors { end + 257 } else { end };
        let mut image = vec![0u8; total as usize * BLOCK_SIZE];

        // Volume structures
        if let Some(identifier) = &self.iso_identifier {
            write_iso_pvd(&mut image, identifier);
        }
        for sequence in [MAIN_SEQUENCE, RESERVE_SEQUENCE] {
            self.write_sequence(&mut image, sequence, partition_length);
        }
        let anchor = AnchorPointer {
            tag: DescriptorTag::new(tag::ANCHOR, ANCHOR_BLOCK),
            main: ExtentAd {
                length: SEQUENCE_BLOCKS * BLOCK_SIZE as u32,
                location: MAIN_SEQUENCE,
            },
            reserve: ExtentAd {
                length: SEQUENCE_BLOCKS * BLOCK_SIZE as u32,
                location: RESERVE_SEQUENCE,
            },
        };
        put(&mut image, ANCHOR_BLOCK, 0, &anchor);
        if self.backup_anchors {
            put(&mut image, total - 257, 0, &anchor);
            put(&mut image, total - 1, 0, &anchor);
        }

        // File set
        put(&mut image, start + fsd, 0, &DescriptorTag::new(tag::FILE_SET, fsd));
        put(
            &mut image,
            start + fsd,
            ROOT_ICB_OFFSET,
            &LongAd::new(root_entry, BLOCK_SIZE as u32, 0),
        );

        // Root directory
        let mut root_entries = vec![(self.video_ts_name.clone(), video_ts_entry, true)];
        root_entries.extend(extra.iter().map(|(name, entry, _)| (name.clone(), *entry, true)));
        let root_data = directory_bytes(root_entry, &root_entries);
        self.write_entry(&mut image, root_entry, 4, root_dir, root_data.len());
        write_bytes(&mut image, start + root_dir, &root_data);

        // VIDEO_TS
        let children: Vec<(String, u32, bool)> = self
            .files
            .iter()
            .map(|f| (f.name.clone(), placed[&f.name].entry, false))
            .collect();
        let video_ts_data = directory_bytes(root_entry, &children);
        self.write_entry(
            &mut image,
            video_ts_entry,
            4,
            video_ts_dir,
            video_ts_data.len(),
        );
        write_bytes(&mut image, start + video_ts_dir, &video_ts_data);

        for (_, entry, dir) in &extra {
            let data = directory_bytes(root_entry, &[]);
            self.write_entry(&mut image, *entry, 4, *dir, data.len());
            write_bytes(&mut image, start + dir, &data);
        }

        for spec in &self.files {
            let file = placed[&spec.name];
            self.write_entry(&mut image, file.entry, 5, file.location, spec.data.len());
            if !spec.data.is_empty() {
                write_bytes(&mut image, file.block, &spec.data);
            }
        }

        DiscImage {
            data: image,
            partition_start: start,
            partition_length,
            files: placed,
        }
    }

    fn write_sequence(&self, image: &mut [u8], first: u32, partition_length: u32) {
        let pvd = PrimaryVolumeDescriptor {
            tag: DescriptorTag::new(tag::PRIMARY_VOLUME, first),
            sequence_number: 0,
            number: 0,
            identifier: encode_dstring(&self.volume_identifier),
            set_identifier: self.volume_set_identifier,
        };
        put(image, first, 0, &pvd);

        let pd = PartitionDescriptor {
            tag: DescriptorTag::new(tag::PARTITION, first + 1),
            sequence_number: 1,
            flags: 1,
            number: 0,
            contents: EntityId::from_identifier("+NSR02"),
            access_type: 1,
            start: self.partition_start,
            length: partition_length,
        };
        put(image, first + 1, 0, &pd);

        let lvd = LogicalVolumeDescriptor {
            tag: DescriptorTag::new(tag::LOGICAL_VOLUME, first + 2),
            sequence_number: 2,
            identifier: encode_dstring(&self.volume_identifier),
            block_size: BLOCK_SIZE as u32,
        };
        put(image, first + 2, 0, &lvd);

        put(image, first + 3, 0, &DescriptorTag::new(tag::TERMINATING, first + 3));
    }

    /// Write a (Extended) File Entry at partition-relative `entry`
    fn write_entry(&self, image: &mut [u8], entry: u32, file_type: u8, location: u32, len: usize) {
        let block = self.partition_start + entry;
        let (identifier, (ea_offset, ad_offset, base)) = if self.extended_entries {
            (tag::EXTENDED_FILE_ENTRY, EXTENDED_FILE_ENTRY_LAYOUT)
        } else {
            (tag::FILE_ENTRY, FILE_ENTRY_LAYOUT)
        };
        // Directories always use short descriptors, files follow the builder
        let form = if file_type == 4 {
            AdForm::Short
        } else {
            self.ad_form
        };

        put(image, block, 0, &DescriptorTag::new(identifier, entry));
        let icb_tag = IcbTag {
            strategy_type: 4,
            max_entries: 1,
            file_type,
            flags: match form {
                AdForm::Long => 1,
                _ => 0,
            },
            ..IcbTag::default()
        };
        put(image, block, ICB_TAG_OFFSET, &icb_tag);
        put(image, block, INFORMATION_LENGTH_OFFSET, &(len as u64));
        put(image, block, ea_offset, &0u32);

        let ad_len = if len == 0 {
            0u32
        } else {
            match form {
                AdForm::Long => {
                    put(image, block, base, &LongAd::new(location, len as u32, 0));
                    16
                }
                _ => {
                    let ad = ShortAd {
                        raw_length: len as u32,
                        position: location,
                    };
                    put(image, block, base, &ad);
                    8
                }
            }
        };
        put(image, block, ad_offset, &ad_len);
    }
}

/// A built image and where its files ended up
#[derive(Debug, Clone)]
pub struct DiscImage {
    /// Image bytes
    pub data: Vec<u8>,
    /// First block of the partition
    pub partition_start: u32,
    /// Partition length in blocks
    pub partition_length: u32,
    /// Files in `VIDEO_TS` by recorded name
    pub files: BTreeMap<String, PlacedFile>,
}

impl DiscImage {
    /// Image size in blocks
    pub fn block_count(&self) -> u32 {
        (self.data.len() / BLOCK_SIZE) as u32
    }

    /// Placement of `name`
    pub fn file(&self, name: &str) -> PlacedFile {
        *self
            .files
            .get(name)
            .unwrap_or_else(|| panic!("{name} not in image"))
    }

    /// Zero `block`, destroying whatever descriptor it held
    pub fn corrupt_block(&mut self, block: u32) {
        let offset = block as usize * BLOCK_SIZE;
        self.data[offset..offset + BLOCK_SIZE].fill(0);
    }

    /// Zero every anchor
    pub fn corrupt_anchors(&mut self) {
        let last = self.block_count() - 1;
        self.corrupt_block(ANCHOR_BLOCK);
        if last > ANCHOR_BLOCK + 256 {
            self.corrupt_block(last - 256);
            self.corrupt_block(last);
        }
    }

    /// The image as an in-memory block input
    pub fn to_input(&self) -> MemoryInput {
        MemoryInput::new(self.data.clone())
    }

    /// Write the image to `path`
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, &self.data)
    }

    /// Write the image to a temporary `.iso` file
    pub fn write_temp(&self) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".iso")
            .tempfile()
            .expect("temp image");
        file.write_all(&self.data).expect("write image");
        file.flush().expect("flush image");
        file
    }
}

/// Write `files` into `root/dir_name`, or into `root` when `dir_name` is
/// empty, returning the directory written to
pub fn write_tree(
    root: &Path,
    dir_name: &str,
    files: &[(String, Vec<u8>)],
) -> std::io::Result<PathBuf> {
    let dir = if dir_name.is_empty() {
        root.to_path_buf()
    } else {
        root.join(dir_name)
    };
    std::fs::create_dir_all(&dir)?;
    for (name, data) in files {
        std::fs::write(dir.join(name), data)?;
    }
    Ok(dir)
}

/// A temporary directory holding [`standard_dvd_files`] under `dir_name`
pub fn temp_tree(dir_name: &str) -> tempfile::TempDir {
    let root = tempfile::tempdir().expect("temp dir");
    write_tree(root.path(), dir_name, &standard_dvd_files()).expect("write tree");
    root
}

fn blocks_for(len: usize) -> u32 {
    len.div_ceil(BLOCK_SIZE).max(1) as u32
}

fn put<T: for<'a> BinWrite<Args<'a> = ()>>(image: &mut [u8], block: u32, offset: usize, value: &T) {
    let start = block as usize * BLOCK_SIZE + offset;
    let mut cursor = Cursor::new(&mut image[start..]);
    value.write_le(&mut cursor).expect("descriptor fits");
}

fn write_bytes(image: &mut [u8], block: u32, data: &[u8]) {
    let start = block as usize * BLOCK_SIZE;
    image[start..start + data.len()].copy_from_slice(data);
}

/// Directory contents: a parent entry, then one entry per child
fn directory_bytes(parent: u32, children: &[(String, u32, bool)]) -> Vec<u8> {
    let mut out = fid(&[], characteristics::PARENT | characteristics::DIRECTORY, parent);
    for (name, entry, is_dir) in children {
        let flags = if *is_dir { characteristics::DIRECTORY } else { 0 };
        out.extend(fid(&encode_dchars(name), flags, *entry));
    }
    out
}

fn fid(name: &[u8], flags: u8, entry: u32) -> Vec<u8> {
    let header = FileIdentifierHeader {
        tag: DescriptorTag::new(tag::FILE_IDENTIFIER, 0),
        version: 1,
        characteristics: flags,
        name_length: name.len() as u8,
        icb: LongAd::new(entry, BLOCK_SIZE as u32, 0),
        implementation_use_length: 0,
    };
    let mut cursor = Cursor::new(Vec::new());
    header.write_le(&mut cursor).expect("in-memory write");
    let mut out = cursor.into_inner();
    out.extend_from_slice(name);
    out.resize(record_size(name.len(), 0), 0);
    out
}

/// ISO 9660 primary volume descriptor with space-padded identifiers
fn write_iso_pvd(image: &mut [u8], identifier: &str) {
    let start = ISO_PVD_BLOCK as usize * BLOCK_SIZE;
    let block = &mut image[start..start + BLOCK_SIZE];
    block[0] = 1;
    block[1..6].copy_from_slice(b"CD001");
    block[6] = 1;
    block[40..72].fill(b' ');
    let len = identifier.len().min(32);
    block[40..40 + len].copy_from_slice(&identifier.as_bytes()[..len]);
    block[190..318].fill(b' ');
    block[190..198].copy_from_slice(b"ISO_SET1");
}

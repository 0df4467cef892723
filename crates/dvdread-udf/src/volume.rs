//! Volume recognition: anchors, volume descriptor sequences, partitions

use crate::descriptor::{
    AnchorPointer, ExtentAd, LogicalVolumeDescriptor, PartitionDescriptor,
    PrimaryVolumeDescriptor, decode_at, dstring, tag, tag_identifier,
};
use crate::error::{Result, UdfError};
use dvdread_input::{BLOCK_SIZE, BlockInput, ReadFlags};
use tracing::debug;

/// Block of the primary Anchor Volume Descriptor Pointer
pub const ANCHOR_BLOCK: u32 = 256;

/// Logical block size every DVD-Video volume uses
pub const LOGICAL_BLOCK_SIZE: u32 = BLOCK_SIZE as u32;

/// A partition, with the logical volume that contains it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    /// Partition flags
    pub flags: u16,
    /// Partition number
    pub number: u16,
    /// Contents identifier, `+NSR02` on DVD-Video
    pub contents: String,
    /// First block; partition-relative addresses are offset by this
    pub start: u32,
    /// Length in blocks
    pub length: u32,
    /// Logical volume identifier, empty if no Logical Volume Descriptor
    /// was recorded
    pub logical_volume: String,
}

/// Identifiers from the Primary Volume Descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeIdentifiers {
    /// Volume identifier
    pub identifier: String,
    /// Volume set identifier, raw
    pub set_identifier: [u8; 128],
}

impl From<&PrimaryVolumeDescriptor> for VolumeIdentifiers {
    fn from(pvd: &PrimaryVolumeDescriptor) -> Self {
        Self {
            identifier: dstring(&pvd.identifier),
            set_identifier: pvd.set_identifier,
        }
    }
}

/// Read `count` blocks starting at `block` without decryption
///
/// A short read yields `Ok(None)`.
pub fn read_blocks<D: BlockInput + ?Sized>(
    device: &mut D,
    block: u32,
    count: usize,
) -> Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; count * BLOCK_SIZE];
    let read = device.read_at(block, &mut buf, count, ReadFlags::NoDecrypt)?;
    if read < count {
        debug!("short read at block {block}: {read} of {count} blocks");
        return Ok(None);
    }
    Ok(Some(buf))
}

/// Blocks covered by a volume descriptor sequence extent
fn sequence(extent: ExtentAd) -> std::ops::Range<u32> {
    extent.location..extent.location.saturating_add(extent.blocks())
}

/// Locate the Anchor Volume Descriptor Pointer
///
/// Block 256 is tried first. When the device size is known the backup
/// anchor 256 blocks before the end and the one in the last block follow.
pub fn find_anchor<D: BlockInput + ?Sized>(device: &mut D) -> Result<AnchorPointer> {
    let mut candidates = vec![ANCHOR_BLOCK];
    if let Some(last) = device.block_count().and_then(|count| count.checked_sub(1)) {
        if let Some(backup) = last.checked_sub(ANCHOR_BLOCK) {
            candidates.push(backup);
        }
        candidates.push(last);
    }
    candidates.dedup();

    for block in candidates {
        if let Some(data) = read_blocks(device, block, 1)?
            && tag_identifier(&data) == Some(tag::ANCHOR)
        {
            if block != ANCHOR_BLOCK {
                debug!("using backup anchor at block {block}");
            }
            return decode_at(&data, 0);
        }
        debug!("no anchor volume descriptor pointer at block {block}");
    }

    Err(UdfError::AnchorNotFound)
}

/// Find partition `number` and its logical volume
///
/// The main sequence is scanned first; whatever it lacks is looked for in
/// the reserve sequence.
pub fn find_partition<D: BlockInput + ?Sized>(
    device: &mut D,
    anchor: &AnchorPointer,
    number: u16,
) -> Result<Partition> {
    let mut partition: Option<PartitionDescriptor> = None;
    let mut volume: Option<LogicalVolumeDescriptor> = None;
    let mut bad_block_size = None;

    for (name, extent) in [("main", anchor.main), ("reserve", anchor.reserve)] {
        for block in sequence(extent) {
            let Some(data) = read_blocks(device, block, 1)? else {
                continue;
            };
            match tag_identifier(&data) {
                Some(tag::PARTITION) if partition.is_none() => {
                    let pd: PartitionDescriptor = decode_at(&data, 0)?;
                    if pd.number == number {
                        partition = Some(pd);
                    }
                }
                Some(tag::LOGICAL_VOLUME) if volume.is_none() => {
                    let lvd: LogicalVolumeDescriptor = decode_at(&data, 0)?;
                    if lvd.block_size == LOGICAL_BLOCK_SIZE {
                        volume = Some(lvd);
                    } else {
                        bad_block_size = Some(lvd.block_size);
                    }
                }
                Some(tag::TERMINATING) => break,
                _ => {}
            }
            if partition.is_some() && volume.is_some() {
                break;
            }
        }

        if partition.is_some() && volume.is_some() {
            break;
        }
        debug!("{name} volume descriptor sequence is incomplete");
    }

    if volume.is_none()
        && let Some(size) = bad_block_size
    {
        return Err(UdfError::InvalidBlockSize(size));
    }

    let pd = partition.ok_or(UdfError::PartitionNotFound(number))?;
    Ok(Partition {
        flags: pd.flags,
        number: pd.number,
        contents: pd.contents.identifier(),
        start: pd.start,
        length: pd.length,
        logical_volume: volume.map(|lvd| dstring(&lvd.identifier)).unwrap_or_default(),
    })
}

/// Find the Primary Volume Descriptor in the main, then reserve sequence
pub fn find_primary_volume<D: BlockInput + ?Sized>(
    device: &mut D,
    anchor: &AnchorPointer,
) -> Result<Option<VolumeIdentifiers>> {
    for extent in [anchor.main, anchor.reserve] {
        for block in sequence(extent) {
            let Some(data) = read_blocks(device, block, 1)? else {
                continue;
            };
            match tag_identifier(&data) {
                Some(tag::PRIMARY_VOLUME) => {
                    let pvd: PrimaryVolumeDescriptor = decode_at(&data, 0)?;
                    return Ok(Some(VolumeIdentifiers::from(&pvd)));
                }
                Some(tag::TERMINATING) => break,
                _ => {}
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorTag, EntityId, encode_dstring};
    use binrw::BinWrite;
    use binrw::io::Cursor;
    use dvdread_input::MemoryInput;
    use pretty_assertions::assert_eq;

    fn put<T: for<'a> BinWrite<Args<'a> = ()>>(image: &mut [u8], block: u32, value: &T) {
        let offset = block as usize * BLOCK_SIZE;
        let mut cursor = Cursor::new(&mut image[offset..offset + BLOCK_SIZE]);
        value.write_le(&mut cursor).unwrap();
    }

    fn anchor(main: u32, reserve: u32) -> AnchorPointer {
        AnchorPointer {
            tag: DescriptorTag::new(tag::ANCHOR, 256),
            main: ExtentAd {
                length: 16 * 2048,
                location: main,
            },
            reserve: ExtentAd {
                length: 16 * 2048,
                location: reserve,
            },
        }
    }

    fn partition_descriptor(block: u32, number: u16, start: u32) -> PartitionDescriptor {
        PartitionDescriptor {
            tag: DescriptorTag::new(tag::PARTITION, block),
            sequence_number: 1,
            flags: 1,
            number,
            contents: EntityId::from_identifier("+NSR02"),
            access_type: 1,
            start,
            length: 1000,
        }
    }

    fn logical_volume(block: u32, block_size: u32) -> LogicalVolumeDescriptor {
        LogicalVolumeDescriptor {
            tag: DescriptorTag::new(tag::LOGICAL_VOLUME, block),
            sequence_number: 2,
            identifier: encode_dstring("MOVIE"),
            block_size,
        }
    }

    fn image(blocks: usize) -> Vec<u8> {
        vec![0u8; blocks * BLOCK_SIZE]
    }

    #[test]
    fn test_primary_anchor() {
        let mut data = image(300);
        put(&mut data, 256, &anchor(32, 48));
        let mut device = MemoryInput::new(data);
        let found = find_anchor(&mut device).unwrap();
        assert_eq!(found.main.location, 32);
        assert_eq!(found.reserve.location, 48);
    }

    #[test]
    fn test_backup_anchors() {
        let mut data = image(1000);
        put(&mut data, 999 - 256, &anchor(40, 60));
        let mut device = MemoryInput::new(data.clone());
        assert_eq!(find_anchor(&mut device).unwrap().main.location, 40);

        let mut data = image(1000);
        put(&mut data, 999, &anchor(41, 61));
        let mut device = MemoryInput::new(data);
        assert_eq!(find_anchor(&mut device).unwrap().main.location, 41);
    }

    #[test]
    fn test_no_anchor() {
        let mut device = MemoryInput::new(image(600));
        assert!(matches!(
            find_anchor(&mut device),
            Err(UdfError::AnchorNotFound)
        ));

        let mut device = MemoryInput::new(image(10));
        assert!(matches!(
            find_anchor(&mut device),
            Err(UdfError::AnchorNotFound)
        ));
    }

    #[test]
    fn test_partition_from_main_sequence() {
        let mut data = image(300);
        put(&mut data, 32, &partition_descriptor(32, 0, 280));
        put(&mut data, 33, &logical_volume(33, 2048));
        put(&mut data, 34, &DescriptorTag::new(tag::TERMINATING, 34));
        let mut device = MemoryInput::new(data);

        let partition = find_partition(&mut device, &anchor(32, 48), 0).unwrap();
        assert_eq!(
            partition,
            Partition {
                flags: 1,
                number: 0,
                contents: "+NSR02".to_string(),
                start: 280,
                length: 1000,
                logical_volume: "MOVIE".to_string(),
            }
        );
    }

    #[test]
    fn test_partition_from_reserve_sequence() {
        let mut data = image(300);
        put(&mut data, 32, &DescriptorTag::new(tag::TERMINATING, 32));
        put(&mut data, 48, &partition_descriptor(48, 0, 290));
        put(&mut data, 49, &logical_volume(49, 2048));
        let mut device = MemoryInput::new(data);

        let partition = find_partition(&mut device, &anchor(32, 48), 0).unwrap();
        assert_eq!(partition.start, 290);
    }

    #[test]
    fn test_other_partition_numbers_skipped() {
        let mut data = image(300);
        put(&mut data, 32, &partition_descriptor(32, 1, 100));
        put(&mut data, 33, &partition_descriptor(33, 0, 200));
        put(&mut data, 34, &logical_volume(34, 2048));
        let mut device = MemoryInput::new(data);

        let partition = find_partition(&mut device, &anchor(32, 48), 0).unwrap();
        assert_eq!(partition.start, 200);
    }

    #[test]
    fn test_wrong_block_size() {
        let mut data = image(300);
        put(&mut data, 32, &partition_descriptor(32, 0, 280));
        put(&mut data, 33, &logical_volume(33, 512));
        let mut device = MemoryInput::new(data);

        assert!(matches!(
            find_partition(&mut device, &anchor(32, 48), 0),
            Err(UdfError::InvalidBlockSize(512))
        ));
    }

    #[test]
    fn test_missing_partition() {
        let mut device = MemoryInput::new(image(300));
        assert!(matches!(
            find_partition(&mut device, &anchor(32, 48), 0),
            Err(UdfError::PartitionNotFound(0))
        ));
    }

    #[test]
    fn test_primary_volume_identifiers() {
        let mut set_identifier = [0u8; 128];
        set_identifier[..4].copy_from_slice(b"SET1");
        let pvd = PrimaryVolumeDescriptor {
            tag: DescriptorTag::new(tag::PRIMARY_VOLUME, 32),
            sequence_number: 0,
            number: 0,
            identifier: encode_dstring("FEATURE_DISC"),
            set_identifier,
        };
        let mut data = image(300);
        put(&mut data, 32, &pvd);
        let mut device = MemoryInput::new(data);

        let ids = find_primary_volume(&mut device, &anchor(32, 48))
            .unwrap()
            .unwrap();
        assert_eq!(ids.identifier, "FEATURE_DISC");
        assert_eq!(&ids.set_identifier[..4], b"SET1");
    }
}

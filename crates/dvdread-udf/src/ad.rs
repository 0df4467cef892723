//! Allocation descriptors
//!
//! A File Entry lists its data extents in one of three encodings, or embeds
//! the data directly. The encoding is the 2-bit type in the ICB tag flags
//! and is modelled as [`AdForm`], with one decode function per form.

use crate::error::{Result, UdfError};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

const LENGTH_MASK: u32 = 0x3FFF_FFFF;

/// Split a raw extent length into (length, extent type flags)
const fn split_length(raw: u32) -> (u32, u8) {
    (raw & LENGTH_MASK, (raw >> 30) as u8)
}

/// Short allocation descriptor (ECMA-167 4/14.14.1), 8 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct ShortAd {
    /// Extent length, top two bits are the extent type
    pub raw_length: u32,
    /// Partition-relative block
    pub position: u32,
}

/// Long allocation descriptor (ECMA-167 4/14.14.2), 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct LongAd {
    /// Extent length, top two bits are the extent type
    pub raw_length: u32,
    /// Partition-relative block
    pub location: u32,
    /// Partition reference number
    pub partition: u16,
    /// Implementation use
    pub implementation_use: [u8; 6],
}

impl LongAd {
    /// Build a descriptor for a recorded extent
    pub fn new(location: u32, length: u32, partition: u16) -> Self {
        Self {
            raw_length: length & LENGTH_MASK,
            location,
            partition,
            implementation_use: [0; 6],
        }
    }
}

/// Extended allocation descriptor (ECMA-167 4/14.14.3), 20 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct ExtAd {
    /// Extent length, top two bits are the extent type
    pub raw_length: u32,
    /// Recorded length
    pub recorded_length: u32,
    /// Information length
    pub information_length: u32,
    /// Partition-relative block
    pub location: u32,
    /// Partition reference number
    pub partition: u16,
    /// Implementation use
    pub implementation_use: [u8; 2],
}

/// Encoding of the allocation descriptors in a File Entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdForm {
    /// 8-byte descriptors in the current partition
    Short,
    /// 16-byte descriptors with a partition reference
    Long,
    /// 20-byte descriptors with a partition reference
    Extended,
    /// Data is stored inside the File Entry itself
    Embedded,
}

impl AdForm {
    /// Form selected by the low three bits of the ICB tag flags
    pub const fn from_icb_flags(flags: u16) -> Option<Self> {
        match flags & 0x7 {
            0 => Some(Self::Short),
            1 => Some(Self::Long),
            2 => Some(Self::Extended),
            3 => Some(Self::Embedded),
            _ => None,
        }
    }

    /// Encoded size of one descriptor; embedded data has no descriptors
    pub const fn size(self) -> usize {
        match self {
            Self::Short => 8,
            Self::Long => 16,
            Self::Extended => 20,
            Self::Embedded => 0,
        }
    }

    /// Decode one descriptor of this form from the start of `data`
    ///
    /// `partition` is the partition short descriptors are relative to.
    /// Embedded data decodes as an extent at location 0 covering `data`.
    pub fn decode(self, data: &[u8], partition: u16) -> Result<AllocationDescriptor> {
        match self {
            Self::Short => decode_short(data, partition),
            Self::Long => decode_long(data),
            Self::Extended => decode_extended(data),
            Self::Embedded => Ok(AllocationDescriptor {
                location: 0,
                length: u32::try_from(data.len()).unwrap_or(u32::MAX),
                flags: 0,
                partition,
            }),
        }
    }
}

/// One extent of file data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocationDescriptor {
    /// Partition-relative first block
    pub location: u32,
    /// Length in bytes
    pub length: u32,
    /// Extent type (0 recorded, 1 allocated, 2 unallocated, 3 continuation)
    pub flags: u8,
    /// Partition reference number
    pub partition: u16,
}

impl AllocationDescriptor {
    /// Partition-relative block just past this extent
    pub fn end_block(&self) -> u32 {
        self.location
            .saturating_add(self.length.div_ceil(dvdread_input::BLOCK_SIZE as u32))
    }
}

impl From<LongAd> for AllocationDescriptor {
    fn from(ad: LongAd) -> Self {
        let (length, flags) = split_length(ad.raw_length);
        Self {
            location: ad.location,
            length,
            flags,
            partition: ad.partition,
        }
    }
}

impl From<ExtAd> for AllocationDescriptor {
    fn from(ad: ExtAd) -> Self {
        let (length, flags) = split_length(ad.raw_length);
        Self {
            location: ad.location,
            length,
            flags,
            partition: ad.partition,
        }
    }
}

fn read<T>(data: &[u8], size: usize) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    if data.len() < size {
        return Err(UdfError::Truncated {
            offset: 0,
            needed: size,
            available: data.len(),
        });
    }
    Ok(T::read_le(&mut Cursor::new(&data[..size]))?)
}

/// Decode a short descriptor, which always refers to `partition`
pub fn decode_short(data: &[u8], partition: u16) -> Result<AllocationDescriptor> {
    let ad: ShortAd = read(data, AdForm::Short.size())?;
    let (length, flags) = split_length(ad.raw_length);
    Ok(AllocationDescriptor {
        location: ad.position,
        length,
        flags,
        partition,
    })
}

/// Decode a long descriptor
pub fn decode_long(data: &[u8]) -> Result<AllocationDescriptor> {
    read::<LongAd>(data, AdForm::Long.size()).map(Into::into)
}

/// Decode an extended descriptor
pub fn decode_extended(data: &[u8]) -> Result<AllocationDescriptor> {
    read::<ExtAd>(data, AdForm::Extended.size()).map(Into::into)
}

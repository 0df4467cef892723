//! Fixed-layout ECMA-167 descriptors
//!
//! Every descriptor starts with a 16-byte [`DescriptorTag`]. All multi-byte
//! fields are little-endian. Only the fields a DVD-Video reader needs are
//! named; the rest are skipped with padding so the same structs can be
//! written back when building test images.

use crate::ad::LongAd;
use crate::error::{Result, UdfError};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use tracing::debug;

/// Tag identifiers used by DVD-Video volumes
pub mod tag {
    /// Primary Volume Descriptor
    pub const PRIMARY_VOLUME: u16 = 1;
    /// Anchor Volume Descriptor Pointer
    pub const ANCHOR: u16 = 2;
    /// Partition Descriptor
    pub const PARTITION: u16 = 5;
    /// Logical Volume Descriptor
    pub const LOGICAL_VOLUME: u16 = 6;
    /// Terminating Descriptor
    pub const TERMINATING: u16 = 8;
    /// File Set Descriptor
    pub const FILE_SET: u16 = 256;
    /// File Identifier Descriptor
    pub const FILE_IDENTIFIER: u16 = 257;
    /// File Entry
    pub const FILE_ENTRY: u16 = 261;
    /// Extended File Entry
    pub const EXTENDED_FILE_ENTRY: u16 = 266;
}

/// Offset of the root directory ICB inside a File Set Descriptor
pub const ROOT_ICB_OFFSET: usize = 400;

/// Descriptor tag (ECMA-167 3/7.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct DescriptorTag {
    /// Tag identifier, see [`tag`]
    pub identifier: u16,
    /// Descriptor version
    pub version: u16,
    /// Sum of the other header bytes modulo 256
    pub checksum: u8,
    /// Serial number
    #[brw(pad_before = 1)]
    pub serial: u16,
    /// CRC of the descriptor body
    pub crc: u16,
    /// Number of body bytes covered by `crc`
    pub crc_length: u16,
    /// Block this descriptor is recorded at
    pub location: u32,
}

impl DescriptorTag {
    /// Create a tag with a valid header checksum
    pub fn new(identifier: u16, location: u32) -> Self {
        let mut tag = Self {
            identifier,
            version: 2,
            location,
            ..Self::default()
        };
        tag.checksum = tag.compute_checksum();
        tag
    }

    /// Header checksum over every tag byte except the checksum itself
    pub fn compute_checksum(&self) -> u8 {
        let mut sum = 0u8;
        for byte in self
            .identifier
            .to_le_bytes()
            .into_iter()
            .chain(self.version.to_le_bytes())
            .chain(self.serial.to_le_bytes())
            .chain(self.crc.to_le_bytes())
            .chain(self.crc_length.to_le_bytes())
            .chain(self.location.to_le_bytes())
        {
            sum = sum.wrapping_add(byte);
        }
        sum
    }
}

/// Tag identifier of the descriptor starting at `data`
///
/// Readers only dispatch on this value; checksums and CRCs are not
/// verified.
pub fn tag_identifier(data: &[u8]) -> Option<u16> {
    data.get(..2).map(|id| u16::from_le_bytes([id[0], id[1]]))
}

/// Extent descriptor (ECMA-167 3/7.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct ExtentAd {
    /// Length in bytes
    pub length: u32,
    /// First block
    pub location: u32,
}

impl ExtentAd {
    /// Number of whole or partial blocks covered, at least one
    pub fn blocks(&self) -> u32 {
        self.length.div_ceil(dvdread_input::BLOCK_SIZE as u32).max(1)
    }
}

/// Entity identifier (ECMA-167 1/7.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct EntityId {
    /// Flags
    pub flags: u8,
    /// Identifier, NUL padded
    pub identifier: [u8; 23],
    /// Identifier suffix
    pub suffix: [u8; 8],
}

impl EntityId {
    /// Build an identifier such as `+NSR02`
    pub fn from_identifier(identifier: &str) -> Self {
        let mut id = Self::default();
        let len = identifier.len().min(id.identifier.len());
        id.identifier[..len].copy_from_slice(&identifier.as_bytes()[..len]);
        id
    }

    /// Identifier with trailing padding removed
    pub fn identifier(&self) -> String {
        let end = self
            .identifier
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.identifier.len());
        String::from_utf8_lossy(&self.identifier[..end]).into_owned()
    }
}

/// Anchor Volume Descriptor Pointer (ECMA-167 3/10.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct AnchorPointer {
    /// Descriptor tag
    pub tag: DescriptorTag,
    /// Main Volume Descriptor Sequence extent
    pub main: ExtentAd,
    /// Reserve Volume Descriptor Sequence extent
    pub reserve: ExtentAd,
}

/// Primary Volume Descriptor (ECMA-167 3/10.1)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct PrimaryVolumeDescriptor {
    /// Descriptor tag
    pub tag: DescriptorTag,
    /// Volume descriptor sequence number
    pub sequence_number: u32,
    /// Primary volume descriptor number
    pub number: u32,
    /// Volume identifier, a 32-byte dstring
    pub identifier: [u8; 32],
    /// Volume set identifier, 128 raw bytes
    #[brw(pad_before = 16)]
    pub set_identifier: [u8; 128],
}

/// Partition Descriptor (ECMA-167 3/10.5)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct PartitionDescriptor {
    /// Descriptor tag
    pub tag: DescriptorTag,
    /// Volume descriptor sequence number
    pub sequence_number: u32,
    /// Partition flags
    pub flags: u16,
    /// Partition number
    pub number: u16,
    /// Partition contents, `+NSR02` on DVD-Video
    pub contents: EntityId,
    /// Access type
    #[brw(pad_before = 128)]
    pub access_type: u32,
    /// First block of the partition
    pub start: u32,
    /// Length in blocks
    pub length: u32,
}

/// Logical Volume Descriptor (ECMA-167 3/10.6), leading fields only
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct LogicalVolumeDescriptor {
    /// Descriptor tag
    pub tag: DescriptorTag,
    /// Volume descriptor sequence number
    pub sequence_number: u32,
    /// Logical volume identifier, a 128-byte dstring
    #[brw(pad_before = 64)]
    pub identifier: [u8; 128],
    /// Logical block size in bytes
    pub block_size: u32,
}

/// Decode a little-endian structure at `offset` within `data`
pub fn decode_at<T>(data: &[u8], offset: usize) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    let tail = data.get(offset..).ok_or(UdfError::Truncated {
        offset,
        needed: 1,
        available: data.len(),
    })?;
    Ok(T::read_le(&mut Cursor::new(tail))?)
}

/// Root directory ICB of a File Set Descriptor block
pub fn file_set_root(block: &[u8]) -> Result<LongAd> {
    decode_at(block, ROOT_ICB_OFFSET)
}

/// Decode a fixed-length dstring field (OSTA CS0)
///
/// The last byte records the used length, compression id included.
pub fn dstring(field: &[u8]) -> String {
    let Some((&len, body)) = field.split_last() else {
        return String::new();
    };
    let len = usize::from(len).min(body.len());
    if len == 0 {
        return String::new();
    }
    dchars(&body[..len])
}

/// Decode OSTA compressed unicode: a compression id followed by characters
///
/// Id 8 stores one Latin-1 byte per character, id 16 stores UTF-16BE.
pub fn dchars(data: &[u8]) -> String {
    let Some((&compression, chars)) = data.split_first() else {
        return String::new();
    };
    match compression {
        8 => chars.iter().map(|&b| char::from(b)).collect(),
        16 => char::decode_utf16(
            chars
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
        )
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect(),
        other => {
            debug!("unsupported dstring compression id {other}");
            String::new()
        }
    }
}

/// Encode `text` as OSTA compressed unicode with the smallest id that fits
pub fn encode_dchars(text: &str) -> Vec<u8> {
    if text.chars().all(|c| u32::from(c) <= 0xFF) {
        let mut out = vec![8];
        out.extend(text.chars().map(|c| u32::from(c) as u8));
        out
    } else {
        let mut out = vec![16];
        out.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
        out
    }
}

/// Encode `text` into a fixed-length dstring field of `N` bytes
pub fn encode_dstring<const N: usize>(text: &str) -> [u8; N] {
    let mut field = [0u8; N];
    if text.is_empty() || N < 2 {
        return field;
    }
    let chars = encode_dchars(text);
    let len = chars.len().min(N - 1);
    field[..len].copy_from_slice(&chars[..len]);
    field[N - 1] = len as u8;
    field
}

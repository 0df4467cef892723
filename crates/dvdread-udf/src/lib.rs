//! UDF filesystem walker for DVD-Video discs
//!
//! Resolves paths such as `/VIDEO_TS/VTS_01_1.VOB` to the block range that
//! holds the file, reading through any [`dvdread_input::BlockInput`].
//! Only what DVD-Video needs from ECMA-167 / UDF 1.02 is implemented: one
//! partition, 2048-byte logical blocks, read-only access.
//!
//! Lookup proceeds from the Anchor Volume Descriptor Pointer (block 256,
//! or the backup anchors near the end of the device) through the volume
//! descriptor sequence to partition 0, its File Set Descriptor and the root
//! directory, then down one directory per path component.
//!
//! Decoded structures are cached per [`UdfFs`] unless the cache is
//! disabled with [`CacheLevel::Disabled`].
//!
//! # Example
//!
//! ```no_run
//! use dvdread_input::FileInput;
//! use dvdread_udf::UdfFs;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut device = FileInput::open("movie.iso")?;
//! let mut fs = UdfFs::default();
//!
//! if let Some(location) = fs.find_file(&mut device, "/VIDEO_TS/VIDEO_TS.IFO")? {
//!     println!("{} blocks at {}", location.blocks(), location.block);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod ad;
pub mod cache;
pub mod descriptor;
pub mod directory;
pub mod error;
pub mod fs;
pub mod icb;
pub mod volume;

pub use ad::{AdForm, AllocationDescriptor};
pub use cache::{CacheLevel, CacheStats};
pub use error::{Result, UdfError};
pub use fs::{FileLocation, UdfFs};
pub use icb::FileType;
pub use volume::{Partition, VolumeIdentifiers};

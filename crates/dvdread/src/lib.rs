//! DVD-Video disc reader
//!
//! Opens a DVD device, an ISO image or a directory holding a copy of a
//! disc, and gives block and byte access to the files of its `VIDEO_TS`
//! directory. On images the UDF filesystem is walked directly, and VOB
//! reads switch the CSS title key of the decryption library as needed.
//!
//! Files are addressed by title set number and [`Domain`] rather than by
//! name:
//!
//! | Domain | Title 0 | Title N |
//! |--------|---------|---------|
//! | [`Domain::InfoFile`] | `VIDEO_TS.IFO` | `VTS_NN_0.IFO` |
//! | [`Domain::InfoBackupFile`] | `VIDEO_TS.BUP` | `VTS_NN_0.BUP` |
//! | [`Domain::MenuVobs`] | `VIDEO_TS.VOB` | `VTS_NN_0.VOB` |
//! | [`Domain::TitleVobs`] | - | `VTS_NN_1.VOB` .. `VTS_NN_9.VOB` |
//!
//! # Example
//!
//! ```no_run
//! use dvdread::{Domain, DvdReader};
//!
//! # fn example() -> dvdread::Result<()> {
//! let reader = DvdReader::open("/dev/dvd")?;
//! let mut vobs = reader.open_file(1, Domain::TitleVobs)?;
//!
//! let mut block = vec![0u8; dvdread::BLOCK_SIZE];
//! let read = vobs.read_blocks(0, 1, &mut block)?;
//! println!("read {read} block(s) of {}", vobs.size());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod domain;
pub mod error;
pub mod file;
pub mod mount;
pub mod reader;
pub mod summary;
pub mod tree;

pub use config::{CssMode, ReaderConfig};
pub use domain::{CssTag, Domain};
pub use dvdread_input::BLOCK_SIZE;
pub use dvdread_udf::CacheLevel;
pub use error::{DvdError, Result};
pub use file::DvdFile;
pub use mount::resolve_underlying_device;
pub use reader::{CssState, DvdReader, DvdStat, ReaderMode, VolumeInfo};
pub use summary::{DiscSummary, TitleSetSummary, VolumeSummary};

#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod fat;
#[cfg(feature = "std")]
pub mod host;
pub mod image;
pub mod layout;
pub mod mount;
pub mod name;
pub mod table;
pub mod timestamp;
pub mod tree;

pub use bytemuck;
#[cfg(feature = "zerocopy")]
pub use zerocopy;

pub use error::{Error, Result};
pub use image::{compose, FileOptions, ImageBuilder, ImageConfig, PartitionMode};
pub use mount::{DirEntryInfo, File, FileStat, OpenMode, Volume};
#[cfg(feature = "std")]
pub use timestamp::SystemClock;
pub use timestamp::{default_timestamp, CalendarTimestamp, RangeError, TimeSource};

pub const MIN_BLK_SIZE: usize = 0x0200;
pub const MAX_BLK_SIZE: usize = 0x1000;
/// Number of clusters that show up at the start of the FAT but don't correspond
/// to a heap allocation.
pub const NONEXISTENT_CLUSTERS: ClusterIdx = 2;

pub type ClusterIdx = u32;
/// Logical block addressing address or offset.
pub type Lba = u64;

/// Unaligned little-endian 16-bit integer.
pub type U16Le = [u8; 2];
/// Unaligned little-endian 32-bit integer.
pub type U32Le = [u8; 4];

/// Hard disk geometry values used by x86's interrupt `0x13`.
///
/// Flash partitions have no geometry; the values only end up in the boot
/// record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DiskGeometry {
	pub heads: u16,
	pub sectors_per_track: u16,
}

impl Default for DiskGeometry {
	#[inline]
	fn default() -> Self {
		Self {
			heads: 0xFF,
			sectors_per_track: 0x3F,
		}
	}
}

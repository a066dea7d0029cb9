//! On-disk records of FAT12/16/32 volumes.
//!
//! All multi-byte fields are unaligned little-endian byte arrays, so every
//! record can be viewed in place with [`bytemuck::from_bytes`] and written
//! back with [`bytemuck::bytes_of`].

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
#[cfg(feature = "zerocopy")]
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
	timestamp::{decode, CalendarTimestamp, PackedFatDate, PackedFatTime},
	ClusterIdx, Lba, U16Le, U32Le, NONEXISTENT_CLUSTERS,
};

/// Number of special sentinel values that indicate the end of an allocation.
pub const END_OF_ALLOC_MARK_COUNT: ClusterIdx = 8;
pub const FREE_CLUSTER_MARK: ClusterIdx = 0;
pub const MAX_CLUSTER_SIZE: usize = 0x8000;
/// Size of one directory entry slot.
pub const ENTRY_SIZE: usize = 0x20;

/// Minimum and maximum FAT lengths for every FAT type.
///
/// **Note:** This is not the same as the cluster count; this is the number of
/// entries in a FAT and not the number of clusters on the heap.
/// The `*_MAX` values also never indicate the maximum valid cluster index for
/// file systems of that FAT type. They are one larger than the maximum valid
/// cluster index could ever be.
pub mod fat_len {
	use crate::ClusterIdx;

	pub const FAT12_MAX: ClusterIdx = 0x0FF6;
	pub const FAT16_MIN: ClusterIdx = 0x0FF7;
	pub const FAT16_MAX: ClusterIdx = 0xFFF6;
	pub const FAT32_MIN: ClusterIdx = 0xFFF7;
	pub const FAT32_MAX: ClusterIdx = 0x0FFF_FFF7;
}

bitflags! {
	/// Flags placed in the FAT entry at index 1.
	#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
	pub struct FatEntry1Flags: u8 {
		/// Set if no disk read/write errors were encountered.
		const NO_IO_ERROR = 4;
		/// Whether or not the file system driver dismounted the volume properly
		/// the last time it had the volume mounted.
		const CLEAN = 8;
	}
}

impl Default for FatEntry1Flags {
	#[inline]
	fn default() -> Self {
		Self::all()
	}
}

/// Maximum length of a long name in UTF-16 code units.
pub const MAX_LONG_NAME_LEN: usize = 0xFF;
pub const NO_NAME: ShortName = *b"NO NAME    ";
pub const SELF_DIR: ShortName = *b".          ";
pub const PARENT_DIR: ShortName = *b"..         ";

/// An 8.3 name of a directory child.
pub type ShortName = [u8; 0xB];

/// Type of FAT file system: FAT12, FAT16 or FAT32.
///
/// For `Fat16` and `Fat32`, the discriminator is also the shift amount if you want
/// to convert between byte size and FAT entry count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FatType {
	Fat12,
	Fat16,
	Fat32,
}

impl FatType {
	/// The FAT type a volume with `cluster_count` data clusters must have.
	///
	/// # Examples
	/// ```
	/// # use fatfsgen::fat::FatType;
	/// assert_eq!(FatType::from_cluster_count(4084), FatType::Fat12);
	/// assert_eq!(FatType::from_cluster_count(4085), FatType::Fat16);
	/// assert_eq!(FatType::from_cluster_count(65525), FatType::Fat32);
	/// ```
	pub const fn from_cluster_count(cluster_count: ClusterIdx) -> Self {
		let len = cluster_count + NONEXISTENT_CLUSTERS;
		if len <= fat_len::FAT12_MAX {
			Self::Fat12
		} else if len <= fat_len::FAT16_MAX {
			Self::Fat16
		} else {
			Self::Fat32
		}
	}

	#[inline]
	pub const fn min_cluster_count(self) -> ClusterIdx {
		match self {
			Self::Fat12 => 1,
			Self::Fat16 => fat_len::FAT16_MIN - NONEXISTENT_CLUSTERS,
			Self::Fat32 => fat_len::FAT32_MIN - NONEXISTENT_CLUSTERS,
		}
	}

	#[inline]
	pub const fn max_cluster_count(self) -> ClusterIdx {
		(match self {
			Self::Fat12 => fat_len::FAT12_MAX,
			Self::Fat16 => fat_len::FAT16_MAX,
			Self::Fat32 => fat_len::FAT32_MAX,
		}) - NONEXISTENT_CLUSTERS
	}

	/// Value to write to [`BootRecordTailExt::fat_type_name`][fat_type_name].
	///
	/// [fat_type_name]: boot_reg::BootRecordTailExt::fat_type_name
	#[inline]
	pub const fn name(self) -> [u8; 8] {
		match self {
			Self::Fat12 => *b"FAT12   ",
			Self::Fat16 => *b"FAT16   ",
			Self::Fat32 => *b"FAT32   ",
		}
	}

	/// Number of reserved blocks in front of the first FAT.
	#[inline]
	pub const fn default_fat_base_lba(self) -> Lba {
		match self {
			Self::Fat32 => 0x20,
			_ => 1,
		}
	}

	#[inline]
	pub const fn bad_cluster_mark(self) -> ClusterIdx {
		self.canon_end_of_alloc_mark() - END_OF_ALLOC_MARK_COUNT
	}

	/// Sentinel value indicating the end of an allocation.
	///
	/// There is more than one value reserved for this. This function will
	/// return the canonical value according to Microsoft.
	#[inline]
	pub const fn canon_end_of_alloc_mark(self) -> ClusterIdx {
		match self {
			Self::Fat12 => 0x0FFF,
			Self::Fat16 => 0xFFFF,
			Self::Fat32 => 0x0FFF_FFFF,
		}
	}

	/// Whether a FAT entry value terminates a cluster chain.
	#[inline]
	pub const fn is_end_of_alloc(self, entry: ClusterIdx) -> bool {
		entry > self.bad_cluster_mark()
	}

	#[inline]
	pub const fn fat_byte_size(self, entry_count: ClusterIdx) -> u32 {
		match self {
			Self::Fat12 => entry_count + (entry_count + 1) / 2,
			_ => entry_count * (1 << self as u8),
		}
	}

	pub const fn pack_fat_entry0(self, medium_type: u8) -> ClusterIdx {
		(match self {
			Self::Fat12 => 0x0F00,
			Self::Fat16 => 0xFF00,
			Self::Fat32 => 0x0FFF_FF00,
		}) | medium_type as u32
	}

	pub const fn pack_fat_entry1(self, flags: FatEntry1Flags) -> ClusterIdx {
		match self {
			Self::Fat12 => 0x0FFF,
			Self::Fat16 => 0x3FFF | (flags.bits() as u32) << 0xC,
			Self::Fat32 => 0x03FF_FFFF | (flags.bits() as u32) << 0x18,
		}
	}

	/// On FAT16/32, unpacks the flags placed in the FAT entry at index 1.
	#[inline]
	pub const fn unpack_fat_entry1(self, entry: ClusterIdx) -> Option<FatEntry1Flags> {
		if matches!(self, Self::Fat12) {
			None
		} else {
			Some(FatEntry1Flags::from_bits_retain(
				(entry >> (0xC * self as u8)) as u8,
			))
		}
	}
}

/// The "boot region" (aka "reserved region") of the FAT volume contains the
/// boot record and `FSInfo` structures.
///
/// Field names ending with `lba_size` indicate that the field counts the number
/// of blocks that something occupies (as opposed to byte size or bit size).
///
/// (`BootRecord*` is short for the structs [`BootRecordCommon`],
/// [`BootRecord12_16`] and [`BootRecord32`].)
///
/// ```text
/// byte            FAT12/FAT16                          FAT32
/// 0x00      BootRecord*::jump_boot              BootRecord*::jump_boot
/// 0x03      BootRecord*::oem_name               BootRecord*::oem_name
/// 0x0B      BpbCommon                           Bpb32 (starts with BpbCommon)
/// 0x24      BootRecordTail                      ...
/// 0x40                                          BootRecordTail
/// 0x1FE     signature                           signature
/// ```
pub mod boot_reg {
	use super::*;

	pub const PRIMARY_LBA: Lba = 0;
	pub const BACKUP_LBA: Lba = 6;
	/// When creating a backup of the start of the partition, not just the first
	/// block should be copied. This is the number of blocks that are backed up.
	pub const BOOT_REG_LBA_SIZE: Lba = 3;
	/// Size of the boot record structs; the rest of a larger block is zero.
	pub const RECORD_SIZE: usize = 0x0200;

	/// The part that FAT12/16 and FAT32 share, used to tell them apart.
	#[derive(Clone, Copy, Pod, Zeroable)]
	#[cfg_attr(
		feature = "zerocopy",
		derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
	)]
	#[repr(C)]
	pub struct BootRecordCommon {
		pub jump_boot: [u8; 3],
		pub oem_name: [u8; 8],
		pub bpb: BpbCommon,
		pub _rest: [u8; 0x01DA],
		pub signature: [u8; 2],
	}

	impl BootRecordCommon {
		pub const SIGNATURE: [u8; 2] = 0xAA55_u16.to_le_bytes();
	}

	#[derive(Clone, Copy, Pod, Zeroable)]
	#[cfg_attr(
		feature = "zerocopy",
		derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
	)]
	#[repr(C)]
	pub struct BootRecord12_16 {
		pub jump_boot: [u8; 3],
		pub oem_name: [u8; 8],
		pub bpb: BpbCommon,
		pub tail: BootRecordTail,
		pub _boot_code: [u8; 0x01C0],
		pub signature: [u8; 2],
	}

	impl BootRecord12_16 {
		pub const JUMP_BOOT: [u8; 3] = [0xEB, 0x3C, 0x90];
	}

	#[derive(Clone, Copy, Pod, Zeroable)]
	#[cfg_attr(
		feature = "zerocopy",
		derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
	)]
	#[repr(C)]
	pub struct BootRecord32 {
		pub jump_boot: [u8; 3],
		pub oem_name: [u8; 8],
		pub bpb: Bpb32,
		pub tail: BootRecordTail,
		pub _boot_code: [u8; 0x01A4],
		pub signature: [u8; 2],
	}

	impl BootRecord32 {
		pub const JUMP_BOOT: [u8; 3] = [0xEB, 0x58, 0x90];
	}

	#[derive(Clone, Copy, Pod, Zeroable)]
	#[cfg_attr(
		feature = "zerocopy",
		derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
	)]
	#[repr(C)]
	pub struct BpbCommon {
		pub blk_size: U16Le,
		pub cluster_lba_size: u8,
		pub fat_base_lba: U16Le,
		pub fat_count: u8,
		pub root_capacity: U16Le,
		pub volume_lba_size16: U16Le,
		pub medium_type: u8,
		pub fat_lba_size16: U16Le,
		pub sectors_per_track: U16Le,
		pub heads: U16Le,
		pub partition_lba_offset: U32Le,
		pub volume_lba_size32: U32Le,
	}

	#[derive(Clone, Copy, Pod, Zeroable)]
	#[cfg_attr(
		feature = "zerocopy",
		derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
	)]
	#[repr(C)]
	pub struct Bpb32 {
		pub common: BpbCommon,
		pub fat_lba_size32: U32Le,
		pub ext_flags: U16Le,
		pub version: U16Le,
		pub first_root_cluster: U32Le,
		pub fsinfo_lba: U16Le,
		pub backup_lba: U16Le,
		pub _reserved: [u8; 0xC],
	}

	#[derive(Clone, Copy, Pod, Zeroable)]
	#[cfg_attr(
		feature = "zerocopy",
		derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
	)]
	#[repr(C)]
	pub struct BootRecordTail {
		pub drive_num: u8,
		pub _reserved: u8,
		pub ext: BootRecordTailExt,
	}

	#[derive(Clone, Copy, Pod, Zeroable)]
	#[cfg_attr(
		feature = "zerocopy",
		derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
	)]
	#[repr(C)]
	pub struct BootRecordTailExt {
		pub signature: u8,
		pub id: U32Le,
		pub label: ShortName,
		pub fat_type_name: [u8; 8],
	}

	impl BootRecordTailExt {
		pub const SIGNATURE: u8 = 0x29;
	}

	impl BootRecordTail {
		/// Drive number of a fixed disk as used by x86's interrupt `0x13`.
		pub const FIXED_DRIVE_NUM: u8 = 0x80;
	}

	#[derive(Clone, Copy, Pod, Zeroable)]
	#[cfg_attr(
		feature = "zerocopy",
		derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
	)]
	#[repr(C)]
	pub struct FsInfo {
		pub lead_signature: U32Le,
		pub _reserved0: [u8; 0x01E0],
		pub struct_signature: U32Le,
		pub free_count: U32Le,
		pub next_free: U32Le,
		pub _reserved1: [u8; 0xC],
		pub trail_signature: U32Le,
	}

	impl FsInfo {
		pub const DEFAULT_LBA: Lba = 1;

		pub const LEAD_SIGNATURE: U32Le = *b"RRaA";
		pub const STRUCT_SIGNATURE: U32Le = *b"rrAa";
		pub const TRAIL_SIGNATURE: U32Le = 0xAA55_0000_u32.to_le_bytes();
		/// Value of `free_count` and `next_free` when the field is not kept
		/// up to date.
		pub const UNKNOWN: U32Le = [0xFF; 4];

		pub fn new(free_count: Option<u32>, next_free: Option<ClusterIdx>) -> Self {
			Self {
				lead_signature: Self::LEAD_SIGNATURE,
				_reserved0: [0; 0x01E0],
				struct_signature: Self::STRUCT_SIGNATURE,
				free_count: free_count.map_or(Self::UNKNOWN, u32::to_le_bytes),
				next_free: next_free.map_or(Self::UNKNOWN, u32::to_le_bytes),
				_reserved1: [0; 0xC],
				trail_signature: Self::TRAIL_SIGNATURE,
			}
		}

		pub fn is_valid(&self) -> bool {
			self.lead_signature == Self::LEAD_SIGNATURE
				&& self.struct_signature == Self::STRUCT_SIGNATURE
				&& self.trail_signature == Self::TRAIL_SIGNATURE
		}

		pub fn free_count(&self) -> Option<u32> {
			(self.free_count != Self::UNKNOWN).then(|| u32::from_le_bytes(self.free_count))
		}
	}
}

/// A short (8.3) directory entry.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[cfg_attr(
	feature = "zerocopy",
	derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
)]
#[repr(C)]
pub struct ChildEntry {
	pub name: ShortName,
	pub attributes: Attributes,
	pub _reserved: u8,
	/// Counts units of 10 ms (0..=199) on top of `creation_time`, despite
	/// what some documentation says.
	pub creation_time_10ms: u8,
	pub creation_time: U16Le,
	pub creation_date: U16Le,
	pub access_date: U16Le,
	pub first_cluster_hi: U16Le,
	pub write_time: U16Le,
	pub write_date: U16Le,
	pub first_cluster_lo: U16Le,
	pub data_size: U32Le,
}

impl ChildEntry {
	/// Marks this and all following slots of a directory as unused.
	pub const BYTE0_END: u8 = 0;
	/// Stands in for a first name byte of `0xE5`.
	pub const BYTE0_SIDESTEP_VACANT: u8 = 5;
	/// Marks a deleted entry.
	pub const BYTE0_VACANT: u8 = 0xE5;

	/// Creates an entry whose creation, access and write stamps are all
	/// `modified`.
	pub fn new(
		name: ShortName,
		attributes: Attributes,
		first_cluster: ClusterIdx,
		data_size: u32,
		(date, time): (PackedFatDate, PackedFatTime),
	) -> Self {
		let mut entry = Self::zeroed();
		entry.name = name;
		entry.attributes = attributes;
		entry.set_first_cluster(first_cluster);
		entry.data_size = data_size.to_le_bytes();
		entry.creation_time = time.0.to_le_bytes();
		entry.creation_date = date.0.to_le_bytes();
		entry.set_modified((date, time));
		entry
	}

	#[inline]
	pub fn first_cluster(&self) -> ClusterIdx {
		(u16::from_le_bytes(self.first_cluster_hi) as ClusterIdx) << 0x10
			| u16::from_le_bytes(self.first_cluster_lo) as ClusterIdx
	}

	#[inline]
	pub fn set_first_cluster(&mut self, cluster: ClusterIdx) {
		self.first_cluster_hi = ((cluster >> 0x10) as u16).to_le_bytes();
		self.first_cluster_lo = (cluster as u16).to_le_bytes();
	}

	#[inline]
	pub fn data_size(&self) -> u32 {
		u32::from_le_bytes(self.data_size)
	}

	/// Decoded write (last modification) stamp.
	#[inline]
	pub fn modified(&self) -> CalendarTimestamp {
		decode(
			PackedFatDate(u16::from_le_bytes(self.write_date)),
			PackedFatTime(u16::from_le_bytes(self.write_time)),
		)
	}

	/// Sets the write stamp; the access date follows it.
	#[inline]
	pub fn set_modified(&mut self, (date, time): (PackedFatDate, PackedFatTime)) {
		self.write_time = time.0.to_le_bytes();
		self.write_date = date.0.to_le_bytes();
		self.access_date = date.0.to_le_bytes();
	}

	#[inline]
	pub fn is_end(&self) -> bool {
		self.name[0] == Self::BYTE0_END
	}

	#[inline]
	pub fn is_vacant(&self) -> bool {
		self.name[0] == Self::BYTE0_VACANT
	}

	/// Whether this is the `.` or `..` entry of a subdirectory.
	#[inline]
	pub fn is_dot(&self) -> bool {
		self.name == SELF_DIR || self.name == PARENT_DIR
	}
}

/// One part of a long name, stored in front of the short entry it belongs to.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[cfg_attr(
	feature = "zerocopy",
	derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
)]
#[repr(C)]
pub struct LongNameEntry {
	pub ord: u8,
	pub name0: [u8; 0xA],
	pub attributes: Attributes,
	pub component_type: u8,
	pub checksum: u8,
	pub name1: [u8; 0xC],
	pub _zero: [u8; 2],
	pub name2: [u8; 4],
}

impl LongNameEntry {
	/// Number of WTF-16 code units in one component.
	pub const CHAR_COUNT: usize = 0xD;
	/// The only possible value of `component_type`.
	pub const TYPE_CHILD: u8 = 0;
	/// Set in the `ord` of the entry holding the end of the name, which is the
	/// first one on disk.
	pub const LAST_ORD_FLAG: u8 = 0x40;
	const ORD_MASK: u8 = 0x3F;

	pub fn new(ord: u8, units: &[u16; Self::CHAR_COUNT], checksum: u8) -> Self {
		let mut entry = Self::zeroed();
		entry.ord = ord;
		entry.attributes = Attributes::LONG_NAME;
		entry.component_type = Self::TYPE_CHILD;
		entry.checksum = checksum;
		let mut bytes = units.iter().flat_map(|u| u.to_le_bytes());
		for b in entry
			.name0
			.iter_mut()
			.chain(&mut entry.name1)
			.chain(&mut entry.name2)
		{
			*b = bytes.next().unwrap_or(0xFF);
		}
		entry
	}

	/// Position of this component in the name, starting at 1.
	#[inline]
	pub fn seq(&self) -> u8 {
		self.ord & Self::ORD_MASK
	}

	#[inline]
	pub fn is_last(&self) -> bool {
		self.ord & Self::LAST_ORD_FLAG != 0
	}

	/// The code units of this component, including terminator and padding.
	pub fn units(&self) -> [u16; Self::CHAR_COUNT] {
		let mut units = [0; Self::CHAR_COUNT];
		let bytes = self.name0.iter().chain(&self.name1).chain(&self.name2);
		let mut bytes = bytes.copied();
		for u in &mut units {
			let lo = bytes.next().unwrap_or(0xFF);
			let hi = bytes.next().unwrap_or(0xFF);
			*u = u16::from_le_bytes([lo, hi]);
		}
		units
	}
}

/// Attributes of a file.
///
/// The behavior of [`Attributes::all`]/[`Attributes::from_bits_truncate`] is
/// stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable)]
#[cfg_attr(
	feature = "zerocopy",
	derive(FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned)
)]
#[repr(transparent)]
pub struct Attributes(u8);

bitflags! {
	impl Attributes: u8 {
		/// Indicates that writes to the file should fail.
		const READ_ONLY = 1;
		/// Indicates that normal directory listings should not show this file.
		const HIDDEN = 2;
		/// Indicates that this is an operating system file.
		const SYSTEM = 4;
		/// The name of this entry is the label of the volume. Only allowed in
		/// the root directory, and it never owns clusters.
		const VOLUME_ID = 8;
		/// Indicates that this file is actually a directory.
		const DIR = 0x10;
		/// Set by the driver when a file is created, renamed, or written to.
		const ARCHIVE = 0x20;
		/// Indicates that this file is actually part of a long file name.
		const LONG_NAME = 0x0F;
	}
}

impl Attributes {
	/// Whether a slot with these attributes holds a [`LongNameEntry`].
	#[inline]
	pub const fn is_long_name(self) -> bool {
		self.0 & 0x3F == Self::LONG_NAME.bits()
	}
}

/// Computes the checksum of a short name.
///
/// # Examples
/// ```
/// # use fatfsgen::fat::{name_checksum, NO_NAME, PARENT_DIR, SELF_DIR};
/// assert_eq!(name_checksum(&NO_NAME), 0xB3);
/// assert_eq!(name_checksum(&SELF_DIR), 0x77);
/// assert_eq!(name_checksum(&PARENT_DIR), 0xC2);
/// ```
pub fn name_checksum(name: &ShortName) -> u8 {
	name.iter()
		.fold(0, |sum, &byte| u8::wrapping_add(sum.rotate_right(1), byte))
}

/// Whether or not a char is valid in an ASCII short name (returns `false` for
/// non-ASCII characters).
///
/// `.`, lower-case ASCII characters and [`ChildEntry::BYTE0_SIDESTEP_VACANT`]
/// are not considered valid.
///
/// # Examples
/// ```
/// # use fatfsgen::fat::is_valid_ascii_short_char;
/// for b in 0..=0xFF {
///     assert_eq!(
///         is_valid_ascii_short_char(b),
///         !matches!(
///             b,
///             (..=0x1F) | b'"' | b'*'..=b',' | b'.' | b'/' | b':'..=b'?' | b'['..=b']'
///             | b'a'..=b'z' | b'|' | 0x80..
///         ),
///     );
/// }
/// ```
pub fn is_valid_ascii_short_char(b: u8) -> bool {
	static VALID: [u8; 0x20] = [
		0x00, 0x00, 0x00, 0x00, 0xFB, 0x23, 0xFF, 0x03, 0xFF, 0xFF, 0xFF, 0xC7, 0x01, 0x00, 0x00,
		0xE8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
		0x00, 0x00,
	];

	VALID[b as usize >> 3] & 1_u8.wrapping_shl(b as u32) != 0
}

/// Whether or not a char is valid in a long name.
///
/// # Examples
/// ```
/// # use fatfsgen::fat::is_valid_long_char;
/// for c in 0..0x80 {
///     assert_eq!(
///         is_valid_long_char(c),
///         !matches!(
///             c as u8,
///             (..=0x1F) | b'"' | b'*' | b'/' | b':' | b'<' | b'>' | b'?' | b'\\' | b'|'
///         ),
///     );
/// }
/// // all non-ASCII code points are valid
/// assert!(is_valid_long_char(0x80));
/// ```
pub fn is_valid_long_char(b: u16) -> bool {
	static VALID: [u8; 0x10] = [
		0x00, 0x00, 0x00, 0x00, 0xFB, 0x7B, 0xFF, 0x2B, 0xFF, 0xFF, 0xFF, 0xEF, 0xFF, 0xFF, 0xFF,
		0xEF,
	];

	*VALID.get(b as usize >> 3).unwrap_or(&0xFF) & 1_u8.wrapping_shl(b as u32) != 0
}

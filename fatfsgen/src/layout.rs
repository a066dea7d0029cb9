//! Placement of the regions of a volume: boot region, FATs, fixed root
//! directory (FAT12/16 only) and the cluster heap.

use core::ops::Range;

use bytemuck::from_bytes;
use log::debug;

use crate::{
	error::{Error, Result},
	fat::{
		boot_reg::{self, BootRecord32, BootRecordCommon},
		FatType, ENTRY_SIZE,
	},
	image::ImageConfig,
	ClusterIdx, MAX_BLK_SIZE, MIN_BLK_SIZE, NONEXISTENT_CLUSTERS,
};

/// Sizes and positions of everything on a volume, in blocks unless stated
/// otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
	pub fat_type: FatType,
	pub blk_size: u32,
	pub cluster_lba_size: u32,
	/// Number of reserved blocks, which is also where the first FAT starts.
	pub fat_base_lba: u32,
	pub fat_count: u32,
	/// Size of one FAT.
	pub fat_lba_size: u32,
	/// Slots in the fixed root directory; 0 on FAT32.
	pub root_capacity: u32,
	/// Volume size as recorded in the boot record.
	pub volume_lba_size: u32,
	pub cluster_count: ClusterIdx,
	/// First cluster of the root directory on FAT32; 0 otherwise.
	pub first_root_cluster: ClusterIdx,
	/// Location of the FSInfo block on FAT32.
	pub fsinfo_lba: Option<u32>,
}

impl Layout {
	/// Finds the layout for an image built with `config`.
	///
	/// Without an explicit FAT type, the smallest type whose cluster count
	/// range fits the volume is used. When the cluster count falls between
	/// two types or above FAT32, the volume is shrunk to the largest cluster
	/// count the smaller type allows; the rest of the image stays unused.
	///
	/// # Errors
	/// [`Error::InvalidConfig`] for unusable parameters and
	/// [`Error::CapacityExceeded`] if the metadata alone doesn't fit.
	pub fn compute(config: &ImageConfig) -> Result<Self> {
		config.validate()?;
		let total = u32::try_from(config.partition_size / u64::from(config.sector_size))
			.map_err(|_| Error::InvalidConfig("partition has more than 2^32 sectors"))?;

		let layout = match config.fat_type {
			Some(fat_type) => {
				let layout = Self::fit(config, fat_type, total)?;
				if layout.cluster_count < fat_type.min_cluster_count() {
					return Err(Error::InvalidConfig(
						"partition is too small for the requested FAT type",
					));
				}
				layout.capped()
			}
			None => Self::pick(config, total)?,
		};
		debug!(
			"{}: {} clusters of {} bytes, {} FAT(s) of {} blocks",
			core::str::from_utf8(&layout.fat_type.name())
				.unwrap_or_default()
				.trim_end(),
			layout.cluster_count,
			layout.cluster_size(),
			layout.fat_count,
			layout.fat_lba_size,
		);
		Ok(layout)
	}

	fn pick(config: &ImageConfig, total: u32) -> Result<Self> {
		let mut smaller: Option<Self> = None;
		for fat_type in [FatType::Fat12, FatType::Fat16, FatType::Fat32] {
			let layout = Self::fit(config, fat_type, total)?;
			if layout.cluster_count < fat_type.min_cluster_count() {
				// between the ranges of two types
				if let Some(smaller) = smaller {
					return Ok(smaller.capped());
				}
			}
			if layout.cluster_count <= fat_type.max_cluster_count() {
				return Ok(layout);
			}
			smaller = Some(layout);
		}
		smaller
			.map(Self::capped)
			.ok_or(Error::InvalidConfig("no FAT type fits the partition"))
	}

	/// Lays out a volume of type `fat_type` over `total` blocks, without
	/// checking the cluster count against the type.
	fn fit(config: &ImageConfig, fat_type: FatType, total: u32) -> Result<Self> {
		let blk_size = config.sector_size;
		let cluster_lba_size = config.sectors_per_cluster;
		let fat_base_lba = match config.reserved_sectors {
			Some(reserved) => reserved,
			None => fat_type.default_fat_base_lba() as u32,
		};
		if fat_type == FatType::Fat32
			&& u64::from(fat_base_lba) < boot_reg::BACKUP_LBA + boot_reg::BOOT_REG_LBA_SIZE
		{
			return Err(Error::InvalidConfig(
				"FAT32 needs room for the backup boot region",
			));
		}
		let root_capacity = match fat_type {
			FatType::Fat32 => 0,
			_ => {
				let per_blk = blk_size / ENTRY_SIZE as u32;
				config.root_entry_count.div_ceil(per_blk) * per_blk
			}
		};
		if root_capacity > u32::from(u16::MAX) {
			return Err(Error::InvalidConfig("too many root directory entries"));
		}
		let root_lba_size = root_capacity * ENTRY_SIZE as u32 / blk_size;
		let fixed = u64::from(fat_base_lba) + u64::from(root_lba_size);

		let mut fat_lba_size: u32 = 1;
		let cluster_count = loop {
			let meta = fixed + u64::from(config.fat_count) * u64::from(fat_lba_size);
			if meta + u64::from(cluster_lba_size) > u64::from(total) {
				return Err(Error::CapacityExceeded {
					required: (meta + u64::from(cluster_lba_size)) * u64::from(blk_size),
					available: config.partition_size,
				});
			}
			let cluster_count = (u64::from(total) - meta) / u64::from(cluster_lba_size);
			// beyond the maximum the volume gets capped anyway
			let sized_for = cluster_count.min(u64::from(fat_type.max_cluster_count()) + 1) as u32;
			let needed = fat_type
				.fat_byte_size(sized_for + NONEXISTENT_CLUSTERS)
				.div_ceil(blk_size);
			if needed <= fat_lba_size {
				break cluster_count as u32;
			}
			fat_lba_size = needed;
		};

		Ok(Self {
			fat_type,
			blk_size,
			cluster_lba_size,
			fat_base_lba,
			fat_count: config.fat_count,
			fat_lba_size,
			root_capacity,
			volume_lba_size: total,
			cluster_count,
			first_root_cluster: match fat_type {
				FatType::Fat32 => NONEXISTENT_CLUSTERS,
				_ => 0,
			},
			fsinfo_lba: match fat_type {
				FatType::Fat32 => Some(boot_reg::FsInfo::DEFAULT_LBA as u32),
				_ => None,
			},
		})
	}

	/// Shrinks the volume to the largest cluster count its FAT type allows.
	fn capped(self) -> Self {
		let max = self.fat_type.max_cluster_count();
		if self.cluster_count <= max {
			return self;
		}
		debug!(
			"capping volume at {max} clusters, {} clusters stay unused",
			self.cluster_count - max
		);
		Self {
			cluster_count: max,
			volume_lba_size: self.heap_base_lba() + max * self.cluster_lba_size,
			..self
		}
	}

	/// Reads the layout of an existing volume from its boot record.
	///
	/// # Errors
	/// [`Error::Corrupted`] if the boot record is missing or inconsistent, or
	/// if `image` is shorter than the volume it describes.
	pub fn from_boot_sector(image: &[u8]) -> Result<Self> {
		let record = image
			.get(..boot_reg::RECORD_SIZE)
			.ok_or(Error::Corrupted("image is smaller than a boot record"))?;
		let common: &BootRecordCommon = from_bytes(record);
		if common.signature != BootRecordCommon::SIGNATURE {
			return Err(Error::Corrupted("missing boot record signature"));
		}
		let bpb = &common.bpb;

		let blk_size = u32::from(u16::from_le_bytes(bpb.blk_size));
		if !blk_size.is_power_of_two()
			|| !(MIN_BLK_SIZE..=MAX_BLK_SIZE).contains(&(blk_size as usize))
		{
			return Err(Error::Corrupted("invalid block size"));
		}
		let cluster_lba_size = u32::from(bpb.cluster_lba_size);
		if !cluster_lba_size.is_power_of_two() {
			return Err(Error::Corrupted("invalid cluster size"));
		}
		let fat_base_lba = u32::from(u16::from_le_bytes(bpb.fat_base_lba));
		let fat_count = u32::from(bpb.fat_count);
		if fat_base_lba == 0 || fat_count == 0 {
			return Err(Error::Corrupted("no reserved blocks or no FAT"));
		}
		let root_capacity = u32::from(u16::from_le_bytes(bpb.root_capacity));
		let volume_lba_size = match u16::from_le_bytes(bpb.volume_lba_size16) {
			0 => u32::from_le_bytes(bpb.volume_lba_size32),
			size => u32::from(size),
		};

		let fat_lba_size16 = u32::from(u16::from_le_bytes(bpb.fat_lba_size16));
		let (fat_lba_size, first_root_cluster, fsinfo_lba) = if fat_lba_size16 != 0 {
			(fat_lba_size16, 0, None)
		} else {
			let record: &BootRecord32 = from_bytes(record);
			let fsinfo_lba = match u16::from_le_bytes(record.bpb.fsinfo_lba) {
				0 | 0xFFFF => None,
				lba => Some(u32::from(lba)),
			};
			(
				u32::from_le_bytes(record.bpb.fat_lba_size32),
				u32::from_le_bytes(record.bpb.first_root_cluster),
				fsinfo_lba,
			)
		};

		let root_lba_size = (root_capacity * ENTRY_SIZE as u32).div_ceil(blk_size);
		let heap_base = u64::from(fat_base_lba)
			+ u64::from(fat_count) * u64::from(fat_lba_size)
			+ u64::from(root_lba_size);
		if heap_base >= u64::from(volume_lba_size) {
			return Err(Error::Corrupted("volume has no cluster heap"));
		}
		let cluster_count =
			((u64::from(volume_lba_size) - heap_base) / u64::from(cluster_lba_size)) as u32;
		let fat_type = FatType::from_cluster_count(cluster_count);
		if (fat_type == FatType::Fat32) != (fat_lba_size16 == 0) {
			return Err(Error::Corrupted(
				"cluster count doesn't match the FAT size field",
			));
		}
		if (fat_type == FatType::Fat32) != (root_capacity == 0) {
			return Err(Error::Corrupted("unexpected root directory capacity"));
		}
		let cluster_count = cluster_count.min(fat_type.max_cluster_count());
		if u64::from(fat_type.fat_byte_size(cluster_count + NONEXISTENT_CLUSTERS))
			> u64::from(fat_lba_size) * u64::from(blk_size)
		{
			return Err(Error::Corrupted("FAT is too small for the cluster heap"));
		}
		if (image.len() as u64) < u64::from(volume_lba_size) * u64::from(blk_size) {
			return Err(Error::Corrupted("image is shorter than the volume"));
		}

		let layout = Self {
			fat_type,
			blk_size,
			cluster_lba_size,
			fat_base_lba,
			fat_count,
			fat_lba_size,
			root_capacity,
			volume_lba_size,
			cluster_count,
			first_root_cluster,
			fsinfo_lba,
		};
		if fat_type == FatType::Fat32 && !layout.is_valid_cluster(first_root_cluster) {
			return Err(Error::Corrupted("root directory cluster is outside the heap"));
		}
		Ok(layout)
	}

	#[inline]
	pub fn root_lba_size(&self) -> u32 {
		(self.root_capacity * ENTRY_SIZE as u32).div_ceil(self.blk_size)
	}

	#[inline]
	pub fn heap_base_lba(&self) -> u32 {
		self.fat_base_lba + self.fat_count * self.fat_lba_size + self.root_lba_size()
	}

	#[inline]
	pub fn cluster_size(&self) -> usize {
		(self.blk_size * self.cluster_lba_size) as usize
	}

	/// Byte range of FAT number `copy`.
	pub fn fat_range(&self, copy: u32) -> Range<usize> {
		let start = (self.fat_base_lba + copy * self.fat_lba_size) as usize * self.blk_size as usize;
		start..start + self.fat_lba_size as usize * self.blk_size as usize
	}

	/// Byte range of the fixed root directory; empty on FAT32.
	pub fn root_range(&self) -> Range<usize> {
		let start =
			(self.fat_base_lba + self.fat_count * self.fat_lba_size) as usize * self.blk_size as usize;
		start..start + self.root_capacity as usize * ENTRY_SIZE
	}

	/// Byte range of a heap cluster. `cluster` must be valid.
	pub fn cluster_range(&self, cluster: ClusterIdx) -> Range<usize> {
		let lba = u64::from(self.heap_base_lba())
			+ u64::from(cluster - NONEXISTENT_CLUSTERS) * u64::from(self.cluster_lba_size);
		let start = lba as usize * self.blk_size as usize;
		start..start + self.cluster_size()
	}

	#[inline]
	pub fn is_valid_cluster(&self, cluster: ClusterIdx) -> bool {
		(NONEXISTENT_CLUSTERS..self.cluster_count + NONEXISTENT_CLUSTERS).contains(&cluster)
	}

	/// Byte offset of a block.
	#[inline]
	pub fn blk_offset(&self, lba: u32) -> usize {
		lba as usize * self.blk_size as usize
	}

	#[inline]
	pub fn volume_byte_size(&self) -> u64 {
		u64::from(self.volume_lba_size) * u64::from(self.blk_size)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::image::ImageConfig;

	#[test]
	fn small_partitions_are_fat12() {
		let layout = Layout::compute(&ImageConfig::default()).unwrap();
		assert_eq!(layout.fat_type, FatType::Fat12);
		assert_eq!(layout.blk_size, 4096);
		assert_eq!(layout.root_capacity, 512);
		assert_eq!(layout.root_lba_size(), 4);
		assert_eq!(layout.fat_lba_size, 1);
		// 256 blocks: 1 reserved, 1 FAT, 4 root
		assert_eq!(layout.cluster_count, 250);
		assert_eq!(layout.heap_base_lba(), 6);
	}

	#[test]
	fn root_capacity_is_rounded_to_whole_blocks() {
		let config = ImageConfig::default().sector_size(512).root_entry_count(20);
		let layout = Layout::compute(&config).unwrap();
		assert_eq!(layout.root_capacity, 32);
		assert_eq!(layout.root_lba_size(), 2);
	}

	#[test]
	fn fat_type_follows_cluster_count() {
		let config = ImageConfig::default()
			.sector_size(512)
			.partition_size(16 << 20);
		let layout = Layout::compute(&config).unwrap();
		assert_eq!(layout.fat_type, FatType::Fat16);
		assert!(layout.cluster_count >= FatType::Fat16.min_cluster_count());

		let config = config.partition_size(64 << 20);
		let layout = Layout::compute(&config).unwrap();
		assert_eq!(layout.fat_type, FatType::Fat32);
		assert_eq!(layout.root_capacity, 0);
		assert_eq!(layout.fat_base_lba, 32);
		assert_eq!(layout.first_root_cluster, 2);
	}

	#[test]
	fn gap_between_types_caps_the_volume() {
		// about 4100 clusters: too many for FAT12, too few for FAT16
		let config = ImageConfig::default()
			.sector_size(512)
			.partition_size(4131 * 512);
		let layout = Layout::compute(&config).unwrap();
		assert_eq!(layout.fat_type, FatType::Fat12);
		assert_eq!(layout.cluster_count, FatType::Fat12.max_cluster_count());
		assert_eq!(
			layout.volume_lba_size,
			layout.heap_base_lba() + layout.cluster_count
		);
	}

	#[test]
	fn explicit_fat_type() {
		let config = ImageConfig::default()
			.sector_size(512)
			.partition_size(64 << 20)
			.fat_type(FatType::Fat16);
		let layout = Layout::compute(&config).unwrap();
		assert_eq!(layout.fat_type, FatType::Fat16);
		assert_eq!(layout.cluster_count, FatType::Fat16.max_cluster_count());

		let config = ImageConfig::default().fat_type(FatType::Fat32);
		assert!(matches!(
			Layout::compute(&config),
			Err(Error::InvalidConfig(_))
		));
	}

	#[test]
	fn too_small_for_metadata() {
		let config = ImageConfig::default().partition_size(4 * 4096);
		assert!(matches!(
			Layout::compute(&config),
			Err(Error::CapacityExceeded { .. })
		));
	}

	#[test]
	fn regions_do_not_overlap() {
		let config = ImageConfig::default().sector_size(512).fat_count(2);
		let layout = Layout::compute(&config).unwrap();
		let fat0 = layout.fat_range(0);
		let fat1 = layout.fat_range(1);
		let root = layout.root_range();
		let heap = layout.cluster_range(2);
		assert_eq!(fat0.start, 512);
		assert_eq!(fat0.end, fat1.start);
		assert_eq!(fat1.end, root.start);
		assert_eq!(root.end, heap.start);
		assert_eq!(
			layout.cluster_range(layout.cluster_count + 1).end as u64,
			layout.volume_byte_size()
		);
	}

	#[test]
	fn rejects_garbage() {
		assert!(matches!(
			Layout::from_boot_sector(&[0; 100]),
			Err(Error::Corrupted(_))
		));
		assert!(matches!(
			Layout::from_boot_sector(&[0; 4096]),
			Err(Error::Corrupted(_))
		));
	}
}

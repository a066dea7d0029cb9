//! Image configuration and composition of a [`DirTree`] into a partition
//! image.

use alloc::{vec, vec::Vec};

use bytemuck::bytes_of;
use log::{debug, trace};

use crate::{
	error::{Error, Result},
	fat::{
		boot_reg::{
			self, BootRecord12_16, BootRecord32, BootRecordCommon, BootRecordTail,
			BootRecordTailExt, Bpb32, BpbCommon, FsInfo,
		},
		is_valid_ascii_short_char, Attributes, ChildEntry, FatEntry1Flags, FatType, ShortName,
		ENTRY_SIZE, MAX_CLUSTER_SIZE, NO_NAME, PARENT_DIR, SELF_DIR,
	},
	layout::Layout,
	table,
	timestamp::{default_timestamp, CalendarTimestamp, PackedFatDate, PackedFatTime, TimeSource},
	tree::{DirNode, DirTree, DirectoryEntry, NodeKind},
	ClusterIdx, DiskGeometry, MAX_BLK_SIZE, MIN_BLK_SIZE, NONEXISTENT_CLUSTERS,
};

/// Whether a volume may be modified after it is mounted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PartitionMode {
	ReadOnly,
	#[default]
	ReadWrite,
}

/// Parameters of a generated image.
///
/// # Examples
/// ```
/// # use fatfsgen::{fat::FatType, ImageConfig, PartitionMode};
/// let config = ImageConfig::default()
///     .partition_size(0x10_0000)
///     .sector_size(512)
///     .fat_type(FatType::Fat12)
///     .mode(PartitionMode::ReadOnly);
/// assert_eq!(config.get_sector_size(), 512);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageConfig {
	pub(crate) partition_size: u64,
	pub(crate) sector_size: u32,
	pub(crate) sectors_per_cluster: u32,
	pub(crate) fat_count: u32,
	pub(crate) root_entry_count: u32,
	pub(crate) reserved_sectors: Option<u32>,
	pub(crate) fat_type: Option<FatType>,
	pub(crate) oem_name: [u8; 8],
	pub(crate) volume_label: ShortName,
	pub(crate) volume_id: u32,
	pub(crate) medium_type: u8,
	pub(crate) geometry: DiskGeometry,
	pub(crate) hidden_sectors: u32,
	pub(crate) long_names: bool,
	pub(crate) use_default_datetime: bool,
	pub(crate) mode: PartitionMode,
}

impl Default for ImageConfig {
	fn default() -> Self {
		Self {
			partition_size: 0x10_0000,
			sector_size: 0x1000,
			sectors_per_cluster: 1,
			fat_count: 1,
			root_entry_count: 512,
			reserved_sectors: None,
			fat_type: None,
			oem_name: *b"MSDOS5.0",
			volume_label: NO_NAME,
			volume_id: 0,
			medium_type: 0xF8,
			geometry: DiskGeometry::default(),
			hidden_sectors: 0,
			long_names: true,
			use_default_datetime: true,
			mode: PartitionMode::ReadWrite,
		}
	}
}

impl ImageConfig {
	#[must_use]
	pub fn partition_size(mut self, bytes: u64) -> Self {
		self.partition_size = bytes;
		self
	}

	#[must_use]
	pub fn sector_size(mut self, bytes: u32) -> Self {
		self.sector_size = bytes;
		self
	}

	#[must_use]
	pub fn sectors_per_cluster(mut self, count: u32) -> Self {
		self.sectors_per_cluster = count;
		self
	}

	#[must_use]
	pub fn fat_count(mut self, count: u32) -> Self {
		self.fat_count = count;
		self
	}

	/// Requested root directory capacity of FAT12/16 volumes. It is rounded
	/// up to whole sectors.
	#[must_use]
	pub fn root_entry_count(mut self, count: u32) -> Self {
		self.root_entry_count = count;
		self
	}

	/// Overrides the number of reserved sectors (1 on FAT12/16, 32 on FAT32).
	#[must_use]
	pub fn reserved_sectors(mut self, count: u32) -> Self {
		self.reserved_sectors = Some(count);
		self
	}

	/// Forces a FAT type instead of deriving it from the cluster count.
	#[must_use]
	pub fn fat_type(mut self, fat_type: FatType) -> Self {
		self.fat_type = Some(fat_type);
		self
	}

	#[must_use]
	pub fn oem_name(mut self, name: [u8; 8]) -> Self {
		self.oem_name = name;
		self
	}

	/// Sets the label in the boot record. It is upper-cased, invalid
	/// characters become `_` and it is cut to 11 bytes.
	#[must_use]
	pub fn volume_label(mut self, label: &str) -> Self {
		let mut packed = [b' '; 0xB];
		for (dst, c) in packed.iter_mut().zip(label.chars()) {
			let c = c.to_ascii_uppercase();
			*dst = if c == ' ' || c.is_ascii() && is_valid_ascii_short_char(c as u8) {
				c as u8
			} else {
				b'_'
			};
		}
		self.volume_label = packed;
		self
	}

	#[must_use]
	pub fn volume_id(mut self, id: u32) -> Self {
		self.volume_id = id;
		self
	}

	#[must_use]
	pub fn medium_type(mut self, medium_type: u8) -> Self {
		self.medium_type = medium_type;
		self
	}

	#[must_use]
	pub fn geometry(mut self, geometry: DiskGeometry) -> Self {
		self.geometry = geometry;
		self
	}

	#[must_use]
	pub fn hidden_sectors(mut self, count: u32) -> Self {
		self.hidden_sectors = count;
		self
	}

	#[must_use]
	pub fn long_names(mut self, enabled: bool) -> Self {
		self.long_names = enabled;
		self
	}

	/// Stamp entries without an explicit timestamp with 1980-01-01 00:00:00
	/// instead of the current time.
	#[must_use]
	pub fn use_default_datetime(mut self, enabled: bool) -> Self {
		self.use_default_datetime = enabled;
		self
	}

	/// Mode the image is meant to be mounted with. Read-only images don't
	/// maintain the free cluster count on FAT32.
	#[must_use]
	pub fn mode(mut self, mode: PartitionMode) -> Self {
		self.mode = mode;
		self
	}

	#[inline]
	pub fn get_partition_size(&self) -> u64 {
		self.partition_size
	}

	#[inline]
	pub fn get_sector_size(&self) -> u32 {
		self.sector_size
	}

	#[inline]
	pub fn get_long_names(&self) -> bool {
		self.long_names
	}

	#[inline]
	pub fn get_use_default_datetime(&self) -> bool {
		self.use_default_datetime
	}

	#[inline]
	pub fn get_mode(&self) -> PartitionMode {
		self.mode
	}

	pub(crate) fn validate(&self) -> Result<()> {
		let sector_size = self.sector_size as usize;
		if !sector_size.is_power_of_two() || !(MIN_BLK_SIZE..=MAX_BLK_SIZE).contains(&sector_size)
		{
			return Err(Error::InvalidConfig(
				"sector size must be a power of two between 512 and 4096",
			));
		}
		if !self.sectors_per_cluster.is_power_of_two()
			|| self.sectors_per_cluster > 0x80
			|| sector_size * self.sectors_per_cluster as usize > MAX_CLUSTER_SIZE
		{
			return Err(Error::InvalidConfig(
				"sectors per cluster must be a power of two and clusters at most 32 KiB",
			));
		}
		if !(1..=2).contains(&self.fat_count) {
			return Err(Error::InvalidConfig("FAT count must be 1 or 2"));
		}
		if self.root_entry_count == 0 {
			return Err(Error::InvalidConfig("root directory must hold at least one entry"));
		}
		if self
			.reserved_sectors
			.is_some_and(|r| r == 0 || r > u32::from(u16::MAX))
		{
			return Err(Error::InvalidConfig("reserved sector count out of range"));
		}
		if self.partition_size == 0 || self.partition_size % u64::from(self.sector_size) != 0 {
			return Err(Error::InvalidConfig(
				"partition size must be a non-zero multiple of the sector size",
			));
		}
		if usize::try_from(self.partition_size).is_err() {
			return Err(Error::InvalidConfig("partition doesn't fit in memory"));
		}
		Ok(())
	}
}

/// Per-file options for [`ImageBuilder::add_file`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileOptions {
	/// Defaults to the builder's default timestamp.
	pub modified: Option<CalendarTimestamp>,
	pub read_only: bool,
}

impl FileOptions {
	#[must_use]
	pub fn modified(mut self, modified: CalendarTimestamp) -> Self {
		self.modified = Some(modified);
		self
	}

	#[must_use]
	pub fn read_only(mut self, read_only: bool) -> Self {
		self.read_only = read_only;
		self
	}
}

/// Collects files and directories and composes them into an image.
///
/// # Examples
/// ```
/// # use fatfsgen::{default_timestamp, FileOptions, ImageBuilder, ImageConfig};
/// let mut builder = ImageBuilder::new(ImageConfig::default(), &default_timestamp());
/// builder.add_file("sub/test.txt", b"hello".to_vec(), FileOptions::default()).unwrap();
/// let image = builder.build().unwrap();
/// assert_eq!(image.len(), 0x10_0000);
/// assert_eq!(image[0x1FE..0x200], [0x55, 0xAA]);
/// ```
#[derive(Clone, Debug)]
pub struct ImageBuilder {
	config: ImageConfig,
	tree: DirTree,
}

impl ImageBuilder {
	/// The clock is only consulted once, for the default timestamp, and only
	/// if the configuration doesn't ask for the FAT epoch.
	pub fn new(config: ImageConfig, clock: &impl TimeSource) -> Self {
		let default_modified = if config.use_default_datetime {
			default_timestamp()
		} else {
			clock.now()
		};
		let tree = DirTree::new(default_modified, config.long_names);
		Self { config, tree }
	}

	#[inline]
	pub fn config(&self) -> &ImageConfig {
		&self.config
	}

	#[inline]
	pub fn tree(&self) -> &DirTree {
		&self.tree
	}

	pub fn add_file(
		&mut self,
		path: &str,
		content: Vec<u8>,
		options: FileOptions,
	) -> Result<&DirectoryEntry> {
		self.tree
			.add_file(path, content, options.modified, options.read_only)
	}

	pub fn add_dir(
		&mut self,
		path: &str,
		modified: Option<CalendarTimestamp>,
	) -> Result<&DirectoryEntry> {
		self.tree.add_dir(path, modified)
	}

	pub fn build(&self) -> Result<Vec<u8>> {
		compose(&self.tree, &self.config)
	}
}

/// Number of clusters a directory with `slot_count` slots occupies. Every
/// subdirectory gets at least one cluster for its `.` and `..` entries.
fn dir_cluster_count(slot_count: usize, cluster_size: usize) -> usize {
	(slot_count * ENTRY_SIZE).div_ceil(cluster_size).max(1)
}

fn file_cluster_count(len: usize, cluster_size: usize) -> usize {
	len.div_ceil(cluster_size)
}

/// Clusters needed by the children of `dir`, recursively.
fn children_cluster_count(dir: &DirNode, cluster_size: usize) -> usize {
	dir.children()
		.iter()
		.map(|child| match &child.kind {
			NodeKind::File(content) => file_cluster_count(content.len(), cluster_size),
			NodeKind::Dir(sub) => {
				dir_cluster_count(sub.slot_count(false), cluster_size)
					+ children_cluster_count(sub, cluster_size)
			}
		})
		.sum()
}

/// Lays out `tree` on a fresh volume and returns the whole partition image.
///
/// Every file and directory gets one contiguous run of clusters; the
/// children of a directory follow right after it.
///
/// # Errors
/// [`Error::CapacityExceeded`] if the data or the root directory doesn't
/// fit, and configuration errors from [`Layout::compute`].
pub fn compose(tree: &DirTree, config: &ImageConfig) -> Result<Vec<u8>> {
	let layout = Layout::compute(config)?;
	let cluster_size = layout.cluster_size();

	let root_slots = tree.root().slot_count(true);
	let root_clusters = match layout.fat_type {
		FatType::Fat32 => dir_cluster_count(root_slots, cluster_size),
		_ => {
			if root_slots > layout.root_capacity as usize {
				return Err(Error::CapacityExceeded {
					required: (root_slots * ENTRY_SIZE) as u64,
					available: u64::from(layout.root_capacity) * ENTRY_SIZE as u64,
				});
			}
			0
		}
	};
	let required = root_clusters + children_cluster_count(tree.root(), cluster_size);
	if required > layout.cluster_count as usize {
		return Err(Error::CapacityExceeded {
			required: required as u64 * cluster_size as u64,
			available: u64::from(layout.cluster_count) * cluster_size as u64,
		});
	}
	debug!(
		"composing {} of {} clusters, {} root slots",
		required, layout.cluster_count, root_slots
	);

	let mut composer = Composer {
		image: vec![0; config.partition_size as usize],
		layout,
		next_cluster: NONEXISTENT_CLUSTERS,
	};
	composer.write_fat_head(config.medium_type);
	match layout.fat_type {
		FatType::Fat32 => {
			let first = composer.allocate(root_clusters);
			let region = composer.layout.cluster_range(first);
			let region = region.start..region.start + root_clusters * cluster_size;
			composer.write_dir(tree.root(), None, region, first, 0);
		}
		_ => {
			let region = layout.root_range();
			composer.write_dir(tree.root(), None, region, 0, 0);
		}
	}
	composer.write_boot_region(config);
	Ok(composer.image)
}

struct Composer {
	image: Vec<u8>,
	layout: Layout,
	/// Clusters are handed out in ascending order.
	next_cluster: ClusterIdx,
}

impl Composer {
	/// Allocates `count` consecutive clusters and chains them. Returns 0 for
	/// an empty allocation.
	fn allocate(&mut self, count: usize) -> ClusterIdx {
		if count == 0 {
			return 0;
		}
		let first = self.next_cluster;
		let clusters: Vec<ClusterIdx> = (first..first + count as ClusterIdx).collect();
		table::link(&mut self.image, &self.layout, &clusters);
		self.next_cluster += count as ClusterIdx;
		first
	}

	fn write_fat_head(&mut self, medium_type: u8) {
		let fat_type = self.layout.fat_type;
		table::set(
			&mut self.image,
			&self.layout,
			0,
			fat_type.pack_fat_entry0(medium_type),
		);
		table::set(
			&mut self.image,
			&self.layout,
			1,
			fat_type.pack_fat_entry1(FatEntry1Flags::default()),
		);
	}

	fn put_slot(&mut self, offset: usize, slot: &[u8]) {
		self.image[offset..offset + ENTRY_SIZE].copy_from_slice(slot);
	}

	/// Writes the entries of `dir` into `region` and recurses into its
	/// children. `this` is the first cluster of `dir` and `parent` the one
	/// of its parent, 0 for the root. `stamp` is `None` for the root.
	fn write_dir(
		&mut self,
		dir: &DirNode,
		stamp: Option<(PackedFatDate, PackedFatTime)>,
		region: core::ops::Range<usize>,
		this: ClusterIdx,
		parent: ClusterIdx,
	) {
		let cluster_size = self.layout.cluster_size();
		let mut offset = region.start;
		if let Some(stamp) = stamp {
			let dot = ChildEntry::new(SELF_DIR, Attributes::DIR, this, 0, stamp);
			let dotdot = ChildEntry::new(PARENT_DIR, Attributes::DIR, parent, 0, stamp);
			self.put_slot(offset, bytes_of(&dot));
			self.put_slot(offset + ENTRY_SIZE, bytes_of(&dotdot));
			offset += 2 * ENTRY_SIZE;
		}

		let firsts: Vec<ClusterIdx> = dir
			.children()
			.iter()
			.map(|child| {
				self.allocate(match &child.kind {
					NodeKind::File(content) => file_cluster_count(content.len(), cluster_size),
					NodeKind::Dir(sub) => dir_cluster_count(sub.slot_count(false), cluster_size),
				})
			})
			.collect();

		for (child, &first) in dir.children().iter().zip(&firsts) {
			for long in &child.entry.encoded.long_name {
				self.put_slot(offset, bytes_of(long));
				offset += ENTRY_SIZE;
			}
			self.put_slot(offset, bytes_of(&child.entry.to_child_entry(first)));
			offset += ENTRY_SIZE;
		}
		debug_assert!(offset <= region.end);

		// `..` of a directory in the root points to cluster 0, even on FAT32
		let parent_for_children = if stamp.is_some() { this } else { 0 };
		for (child, &first) in dir.children().iter().zip(&firsts) {
			match &child.kind {
				NodeKind::File(content) => {
					if first != 0 {
						let start = self.layout.cluster_range(first).start;
						self.image[start..start + content.len()].copy_from_slice(content);
					}
					trace!(
						"{} at cluster {first}, {} bytes",
						child.entry.name,
						content.len()
					);
				}
				NodeKind::Dir(sub) => {
					let start = self.layout.cluster_range(first).start;
					let len = dir_cluster_count(sub.slot_count(false), cluster_size) * cluster_size;
					trace!("{}/ at cluster {first}", child.entry.name);
					self.write_dir(
						sub,
						Some(child.entry.modified),
						start..start + len,
						first,
						parent_for_children,
					);
				}
			}
		}
	}

	fn write_boot_region(&mut self, config: &ImageConfig) {
		let layout = self.layout;
		let fits16 = layout.fat_type != FatType::Fat32 && layout.volume_lba_size <= u32::from(u16::MAX);
		let bpb = BpbCommon {
			blk_size: (layout.blk_size as u16).to_le_bytes(),
			cluster_lba_size: layout.cluster_lba_size as u8,
			fat_base_lba: (layout.fat_base_lba as u16).to_le_bytes(),
			fat_count: layout.fat_count as u8,
			root_capacity: (layout.root_capacity as u16).to_le_bytes(),
			volume_lba_size16: if fits16 {
				(layout.volume_lba_size as u16).to_le_bytes()
			} else {
				[0; 2]
			},
			medium_type: config.medium_type,
			fat_lba_size16: if layout.fat_type == FatType::Fat32 {
				[0; 2]
			} else {
				(layout.fat_lba_size as u16).to_le_bytes()
			},
			sectors_per_track: config.geometry.sectors_per_track.to_le_bytes(),
			heads: config.geometry.heads.to_le_bytes(),
			partition_lba_offset: config.hidden_sectors.to_le_bytes(),
			volume_lba_size32: if fits16 {
				[0; 4]
			} else {
				layout.volume_lba_size.to_le_bytes()
			},
		};
		let tail = BootRecordTail {
			drive_num: BootRecordTail::FIXED_DRIVE_NUM,
			_reserved: 0,
			ext: BootRecordTailExt {
				signature: BootRecordTailExt::SIGNATURE,
				id: config.volume_id.to_le_bytes(),
				label: config.volume_label,
				fat_type_name: layout.fat_type.name(),
			},
		};

		match layout.fat_type {
			FatType::Fat32 => {
				let record = BootRecord32 {
					jump_boot: BootRecord32::JUMP_BOOT,
					oem_name: config.oem_name,
					bpb: Bpb32 {
						common: bpb,
						fat_lba_size32: layout.fat_lba_size.to_le_bytes(),
						ext_flags: [0; 2],
						version: [0; 2],
						first_root_cluster: layout.first_root_cluster.to_le_bytes(),
						fsinfo_lba: (FsInfo::DEFAULT_LBA as u16).to_le_bytes(),
						backup_lba: (boot_reg::BACKUP_LBA as u16).to_le_bytes(),
						_reserved: [0; 0xC],
					},
					tail,
					_boot_code: [0; 0x01A4],
					signature: BootRecordCommon::SIGNATURE,
				};
				self.put_record(boot_reg::PRIMARY_LBA as u32, bytes_of(&record));

				let fsinfo = match config.mode {
					PartitionMode::ReadWrite => FsInfo::new(
						Some(layout.cluster_count + NONEXISTENT_CLUSTERS - self.next_cluster),
						Some(self.next_cluster),
					),
					PartitionMode::ReadOnly => FsInfo::new(None, None),
				};
				self.put_record(FsInfo::DEFAULT_LBA as u32, bytes_of(&fsinfo));
				// the third block of the boot region only carries a signature
				let third = layout.blk_offset(2) + boot_reg::RECORD_SIZE - 2;
				self.image[third..third + 2].copy_from_slice(&BootRecordCommon::SIGNATURE);

				let len = layout.blk_offset(boot_reg::BOOT_REG_LBA_SIZE as u32);
				let backup = layout.blk_offset(boot_reg::BACKUP_LBA as u32);
				self.image.copy_within(0..len, backup);
			}
			_ => {
				let record = BootRecord12_16 {
					jump_boot: BootRecord12_16::JUMP_BOOT,
					oem_name: config.oem_name,
					bpb,
					tail,
					_boot_code: [0; 0x01C0],
					signature: BootRecordCommon::SIGNATURE,
				};
				self.put_record(boot_reg::PRIMARY_LBA as u32, bytes_of(&record));
			}
		}
	}

	fn put_record(&mut self, lba: u32, record: &[u8]) {
		let start = self.layout.blk_offset(lba);
		self.image[start..start + record.len()].copy_from_slice(record);
	}
}

#[cfg(test)]
mod tests {
	use bytemuck::from_bytes;

	use super::*;
	use crate::{fat::LongNameEntry, timestamp::encode};

	fn build(config: ImageConfig, files: &[(&str, &[u8])]) -> (Vec<u8>, Layout) {
		let mut builder = ImageBuilder::new(config, &default_timestamp());
		for (path, content) in files {
			builder
				.add_file(path, content.to_vec(), FileOptions::default())
				.unwrap();
		}
		let image = builder.build().unwrap();
		let layout = Layout::from_boot_sector(&image).unwrap();
		(image, layout)
	}

	fn entry_at(image: &[u8], offset: usize) -> ChildEntry {
		*from_bytes(&image[offset..offset + ENTRY_SIZE])
	}

	#[test]
	fn boot_record_matches_the_computed_layout() {
		let config = ImageConfig::default().volume_label("esp data").volume_id(0x1234_5678);
		let computed = Layout::compute(&config).unwrap();
		let (image, layout) = build(config, &[]);
		assert_eq!(layout, computed);
		let record: &BootRecord12_16 = from_bytes(&image[..boot_reg::RECORD_SIZE]);
		assert_eq!(&record.tail.ext.label, b"ESP DATA   ");
		assert_eq!(record.tail.ext.id, 0x1234_5678_u32.to_le_bytes());
		assert_eq!(&record.tail.ext.fat_type_name, b"FAT12   ");
		assert_eq!(table::get(&image, &layout, 0), 0x0FF8);
		assert_eq!(table::get(&image, &layout, 1), 0x0FFF);
	}

	#[test]
	fn subdirectories_and_dot_entries() {
		let (image, layout) = build(ImageConfig::default(), &[("SUB/test.txt", b"hello")]);
		let root = layout.root_range().start;
		let sub = entry_at(&image, root);
		assert_eq!(&sub.name, b"SUB        ");
		assert!(sub.attributes.contains(Attributes::DIR));
		assert_eq!(sub.first_cluster(), 2);
		assert!(entry_at(&image, root + ENTRY_SIZE).is_end());

		let dir = layout.cluster_range(2).start;
		let dot = entry_at(&image, dir);
		let dotdot = entry_at(&image, dir + ENTRY_SIZE);
		assert_eq!((dot.name, dot.first_cluster()), (SELF_DIR, 2));
		assert_eq!((dotdot.name, dotdot.first_cluster()), (PARENT_DIR, 0));

		// "test.txt" is lower case, so it carries one long-name entry
		let long: &LongNameEntry = from_bytes(&image[dir + 2 * ENTRY_SIZE..dir + 3 * ENTRY_SIZE]);
		assert_eq!(long.ord, 0x41);
		let file = entry_at(&image, dir + 3 * ENTRY_SIZE);
		assert_eq!(&file.name, b"TEST~1  TXT");
		assert_eq!(file.data_size(), 5);
		assert_eq!(file.first_cluster(), 3);
		let data = layout.cluster_range(3).start;
		assert_eq!(&image[data..data + 5], b"hello");
		assert!(layout.fat_type.is_end_of_alloc(table::get(&image, &layout, 3)));
	}

	#[test]
	fn multi_cluster_files_are_chained() {
		let content = vec![0xA5; 3 * 4096 + 1];
		let (image, layout) = build(ImageConfig::default(), &[("BIG.BIN", &content[..])]);
		assert_eq!(table::chain(&image, &layout, 2).unwrap(), [2, 3, 4, 5]);
		let start = layout.cluster_range(2).start;
		assert_eq!(image[start..start + content.len()], content[..]);
		// empty files own no cluster
		let (image, layout) = build(ImageConfig::default(), &[("EMPTY", b"")]);
		assert_eq!(entry_at(&image, layout.root_range().start).first_cluster(), 0);
	}

	#[test]
	fn timestamps_come_from_the_builder() {
		let now = CalendarTimestamp::new(2024, 6, 1, 12, 30, 10).unwrap();
		let config = ImageConfig::default().use_default_datetime(false);
		let mut builder = ImageBuilder::new(config, &now);
		builder.add_file("A", Vec::new(), FileOptions::default()).unwrap();
		let explicit = CalendarTimestamp::new(2000, 1, 2, 3, 4, 6).unwrap();
		builder
			.add_file("B", Vec::new(), FileOptions::default().modified(explicit))
			.unwrap();
		let image = builder.build().unwrap();
		let root = Layout::from_boot_sector(&image).unwrap().root_range().start;
		assert_eq!(entry_at(&image, root).modified(), now);
		assert_eq!(entry_at(&image, root + ENTRY_SIZE).modified(), explicit);

		let mut builder = ImageBuilder::new(ImageConfig::default(), &now);
		let entry = builder.add_file("A", Vec::new(), FileOptions::default()).unwrap();
		assert_eq!(entry.modified, encode(default_timestamp()).unwrap());
	}

	#[test]
	fn capacity_is_checked_up_front() {
		let mut builder = ImageBuilder::new(ImageConfig::default(), &default_timestamp());
		builder
			.add_file("BIG.BIN", vec![0; 0x10_0000], FileOptions::default())
			.unwrap();
		assert!(matches!(
			builder.build(),
			Err(Error::CapacityExceeded { .. })
		));

		let config = ImageConfig::default().sector_size(512).root_entry_count(16);
		let mut builder = ImageBuilder::new(config, &default_timestamp());
		for i in 0..16 {
			builder
				.add_file(&alloc::format!("F{i}"), Vec::new(), FileOptions::default())
				.unwrap();
		}
		assert!(builder.build().is_ok());
		builder.add_file("F16", Vec::new(), FileOptions::default()).unwrap();
		assert!(matches!(
			builder.build(),
			Err(Error::CapacityExceeded { required: 544, available: 512 })
		));
	}

	#[test]
	fn fat32_volumes() {
		let config = ImageConfig::default()
			.sector_size(512)
			.partition_size(64 << 20);
		let (image, layout) = build(config.clone(), &[("dir/file.bin", &[1, 2, 3])]);
		assert_eq!(layout.fat_type, FatType::Fat32);
		assert_eq!(layout.first_root_cluster, 2);
		// root, dir, file
		assert_eq!(table::free_count(&image, &layout), layout.cluster_count - 3);
		let fsinfo: &FsInfo = from_bytes(&image[512..1024]);
		assert!(fsinfo.is_valid());
		assert_eq!(fsinfo.free_count(), Some(layout.cluster_count - 3));
		assert_eq!(fsinfo.next_free, 5_u32.to_le_bytes());
		assert_eq!(image[..3 * 512], image[6 * 512..9 * 512]);

		let (image, _) = build(config.mode(PartitionMode::ReadOnly), &[]);
		let fsinfo: &FsInfo = from_bytes(&image[512..1024]);
		assert_eq!(fsinfo.free_count(), None);
		assert_eq!(fsinfo.next_free, FsInfo::UNKNOWN);
	}

	#[test]
	fn invalid_configs() {
		for config in [
			ImageConfig::default().sector_size(1000),
			ImageConfig::default().sectors_per_cluster(3),
			ImageConfig::default().sectors_per_cluster(16),
			ImageConfig::default().fat_count(0),
			ImageConfig::default().root_entry_count(0),
			ImageConfig::default().partition_size(1000),
		] {
			assert!(matches!(compose(&DirTree::new(default_timestamp(), true), &config), Err(Error::InvalidConfig(_))));
		}
	}
}

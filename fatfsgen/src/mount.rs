//! File access on a mounted image: open, read, write, stat and directory
//! creation.
//!
//! A [`File`] holds no borrow of its [`Volume`]; every operation takes the
//! volume by reference, so writers are serialized by `&mut`. Sharing a
//! volume between threads needs an outer lock. Several handles may be open
//! on one file; each write starts from the directory entry, not from what
//! the handle saw last.

use alloc::{string::String, vec::Vec};

use bytemuck::{bytes_of, from_bytes};
use log::{debug, warn};

use crate::{
	error::{Error, Result},
	fat::{
		boot_reg::{self, FsInfo},
		Attributes, ChildEntry, FatEntry1Flags, FatType, ENTRY_SIZE, PARENT_DIR, SELF_DIR,
	},
	image::PartitionMode,
	layout::Layout,
	name::{check_name, encode_name, names_match, short_name_to_string, LongNameAssembler, ShortNameSet},
	table,
	timestamp::{default_timestamp, encode_saturating, CalendarTimestamp, TimeSource},
	ClusterIdx, NONEXISTENT_CLUSTERS,
};

/// Backing memory of a mounted volume.
///
/// Read-only storage can only be mounted [`PartitionMode::ReadOnly`].
pub trait Storage {
	fn bytes(&self) -> &[u8];
	/// `None` if the storage can't be written.
	fn bytes_mut(&mut self) -> Option<&mut [u8]>;
}

impl Storage for &[u8] {
	#[inline]
	fn bytes(&self) -> &[u8] {
		&self[..]
	}

	#[inline]
	fn bytes_mut(&mut self) -> Option<&mut [u8]> {
		None
	}
}

impl Storage for &mut [u8] {
	#[inline]
	fn bytes(&self) -> &[u8] {
		&self[..]
	}

	#[inline]
	fn bytes_mut(&mut self) -> Option<&mut [u8]> {
		Some(&mut self[..])
	}
}

impl Storage for Vec<u8> {
	#[inline]
	fn bytes(&self) -> &[u8] {
		self.as_slice()
	}

	#[inline]
	fn bytes_mut(&mut self) -> Option<&mut [u8]> {
		Some(self.as_mut_slice())
	}
}

impl Storage for &mut Vec<u8> {
	#[inline]
	fn bytes(&self) -> &[u8] {
		self.as_slice()
	}

	#[inline]
	fn bytes_mut(&mut self) -> Option<&mut [u8]> {
		Some(self.as_mut_slice())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpenMode {
	Read,
	/// Creates the file if it is missing and truncates it otherwise.
	Write,
	/// Creates the file if it is missing; writes go to the end.
	Append,
}

/// An open file.
#[derive(Clone, Debug)]
pub struct File {
	path: String,
	mode: OpenMode,
	/// Image offset of the short entry. Entries never move, directories only
	/// grow at the end.
	entry_offset: usize,
	first_cluster: ClusterIdx,
	size: u32,
	pos: u32,
}

impl File {
	fn new(path: &str, mode: OpenMode, found: &Found) -> Self {
		let size = found.entry.data_size();
		Self {
			path: path.into(),
			mode,
			entry_offset: found.offset,
			first_cluster: found.entry.first_cluster(),
			size,
			pos: if mode == OpenMode::Append { size } else { 0 },
		}
	}

	#[inline]
	pub fn path(&self) -> &str {
		&self.path
	}

	#[inline]
	pub fn mode(&self) -> OpenMode {
		self.mode
	}

	/// Size as of the last operation through this handle.
	#[inline]
	pub fn size(&self) -> u32 {
		self.size
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
	pub size: u32,
	pub modified: CalendarTimestamp,
	pub attributes: Attributes,
}

impl FileStat {
	fn of(entry: &ChildEntry) -> Self {
		Self {
			size: entry.data_size(),
			modified: entry.modified(),
			attributes: entry.attributes,
		}
	}

	#[inline]
	pub fn is_dir(&self) -> bool {
		self.attributes.contains(Attributes::DIR)
	}

	#[inline]
	pub fn is_read_only(&self) -> bool {
		self.attributes.contains(Attributes::READ_ONLY)
	}
}

/// One child as listed by [`Volume::read_dir`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntryInfo {
	/// The long name, or the short name if there is none.
	pub name: String,
	pub short_name: String,
	pub stat: FileStat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DirLocation {
	FixedRoot,
	Chain(ClusterIdx),
}

/// A directory entry found by scanning.
#[derive(Clone, Debug)]
struct Found {
	name: String,
	short_name: String,
	entry: ChildEntry,
	/// Image offset of the short entry.
	offset: usize,
}

impl Found {
	#[inline]
	fn is_dir(&self) -> bool {
		self.entry.attributes.contains(Attributes::DIR)
	}
}

/// A FAT volume mounted from an image in memory.
///
/// # Examples
/// ```
/// # use fatfsgen::{default_timestamp, FileOptions, ImageBuilder, ImageConfig, OpenMode, PartitionMode, Volume};
/// let mut builder = ImageBuilder::new(ImageConfig::default(), &default_timestamp());
/// builder.add_file("hello.txt", b"hello".to_vec(), FileOptions::default()).unwrap();
/// let image = builder.build().unwrap();
///
/// let mut volume = Volume::mount(image, PartitionMode::ReadWrite).unwrap();
/// let mut file = volume.open("HELLO.TXT", OpenMode::Append).unwrap();
/// volume.write(&mut file, b", world").unwrap();
/// assert_eq!(volume.read(&file).unwrap(), b"hello, world");
/// let image: Vec<u8> = volume.unmount();
/// ```
#[derive(Debug)]
pub struct Volume<S, T = CalendarTimestamp> {
	storage: S,
	layout: Layout,
	mode: PartitionMode,
	clock: T,
	/// Whether the clean flag in the FAT has been cleared.
	dirty: bool,
	/// Where the search for free clusters starts.
	next_free: ClusterIdx,
}

impl<S: Storage> Volume<S> {
	/// Mounts with a clock that stamps every modification with
	/// 1980-01-01 00:00:00.
	pub fn mount(storage: S, mode: PartitionMode) -> Result<Self> {
		Self::mount_with_clock(storage, mode, default_timestamp())
	}
}

impl<S: Storage, T: TimeSource> Volume<S, T> {
	/// # Errors
	/// [`Error::Corrupted`] if the storage doesn't hold a FAT volume and
	/// [`Error::ReadOnlyViolation`] if `mode` is read-write but the storage
	/// is not writable.
	pub fn mount_with_clock(mut storage: S, mode: PartitionMode, clock: T) -> Result<Self> {
		let layout = Layout::from_boot_sector(storage.bytes())?;
		if mode == PartitionMode::ReadWrite && storage.bytes_mut().is_none() {
			return Err(Error::ReadOnlyViolation("storage is not writable".into()));
		}
		let data = storage.bytes();
		let next_free = layout
			.fsinfo_lba
			.and_then(|lba| {
				let start = layout.blk_offset(lba);
				data.get(start..start + boot_reg::RECORD_SIZE)
			})
			.map(from_bytes::<FsInfo>)
			.filter(|fsinfo| fsinfo.is_valid())
			.map(|fsinfo| u32::from_le_bytes(fsinfo.next_free))
			.filter(|&next| layout.is_valid_cluster(next))
			.unwrap_or(NONEXISTENT_CLUSTERS);
		let entry1 = table::get(data, &layout, 1);
		if let Some(flags) = layout.fat_type.unpack_fat_entry1(entry1) {
			if !flags.contains(FatEntry1Flags::CLEAN) {
				warn!("volume was not unmounted cleanly");
			}
		}
		debug!(
			"mounted {:?} volume ({:?}), {} clusters",
			layout.fat_type, mode, layout.cluster_count
		);
		Ok(Self {
			storage,
			layout,
			mode,
			clock,
			dirty: false,
			next_free,
		})
	}

	#[inline]
	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	#[inline]
	pub fn mode(&self) -> PartitionMode {
		self.mode
	}

	/// Marks the volume clean again, refreshes FSInfo and returns the
	/// storage.
	pub fn unmount(mut self) -> S {
		if self.dirty {
			let layout = self.layout;
			let next_free = self.next_free;
			if let Some(data) = self.storage.bytes_mut() {
				if let Some(mut flags) = layout.fat_type.unpack_fat_entry1(table::get(data, &layout, 1)) {
					flags.insert(FatEntry1Flags::CLEAN);
					table::set(data, &layout, 1, layout.fat_type.pack_fat_entry1(flags));
				}
				if let Some(lba) = layout.fsinfo_lba {
					let fsinfo = FsInfo::new(Some(table::free_count(data, &layout)), Some(next_free));
					let start = layout.blk_offset(lba);
					data[start..start + boot_reg::RECORD_SIZE].copy_from_slice(bytes_of(&fsinfo));
				}
			}
			debug!("unmounted cleanly");
		}
		self.storage
	}

	/// Free space in bytes.
	pub fn free_space(&self) -> u64 {
		u64::from(table::free_count(self.data(), &self.layout)) * self.layout.cluster_size() as u64
	}

	/// Opens a file. Names are matched exactly first and case-insensitively
	/// second.
	///
	/// # Errors
	/// [`Error::NotFound`] for a missing file (or a missing parent when
	/// creating one), [`Error::IsADirectory`], and
	/// [`Error::ReadOnlyViolation`] when opening for writing on a read-only
	/// mount or a read-only file.
	pub fn open(&mut self, path: &str, mode: OpenMode) -> Result<File> {
		if mode == OpenMode::Read {
			let found = self
				.resolve(path)?
				.ok_or_else(|| Error::IsADirectory(path.into()))?;
			if found.is_dir() {
				return Err(Error::IsADirectory(path.into()));
			}
			return Ok(File::new(path, mode, &found));
		}

		self.check_writable(path)?;
		let (parent, leaf) = split_parent(path)?;
		let dir = self.resolve_dir(parent)?;
		match self.find(dir, leaf)? {
			Some(found) => {
				if found.is_dir() {
					return Err(Error::IsADirectory(path.into()));
				}
				if found.entry.attributes.contains(Attributes::READ_ONLY) {
					return Err(Error::ReadOnlyViolation(path.into()));
				}
				let mut file = File::new(path, mode, &found);
				if mode == OpenMode::Write && (file.size != 0 || file.first_cluster != 0) {
					self.truncate(&mut file)?;
				}
				Ok(file)
			}
			None => {
				check_name(leaf, true)?;
				let entry_offset = self.create_entry(dir, leaf, Attributes::ARCHIVE, 0)?;
				debug!("created {path}");
				Ok(File {
					path: path.into(),
					mode,
					entry_offset,
					first_cluster: 0,
					size: 0,
					pos: 0,
				})
			}
		}
	}

	/// Reads the whole content of a file.
	pub fn read(&self, file: &File) -> Result<Vec<u8>> {
		let entry = self.entry_at(file.entry_offset);
		let size = entry.data_size() as usize;
		let data = self.data();
		let cluster_size = self.layout.cluster_size();
		let chain = table::chain(data, &self.layout, entry.first_cluster())?;
		if chain.len() * cluster_size < size {
			return Err(Error::Corrupted("file is larger than its cluster chain"));
		}
		let mut content = Vec::with_capacity(size);
		for cluster in chain {
			let n = (size - content.len()).min(cluster_size);
			let start = self.layout.cluster_range(cluster).start;
			content.extend_from_slice(&data[start..start + n]);
			if content.len() == size {
				break;
			}
		}
		Ok(content)
	}

	/// Convenience for opening a file and reading all of it.
	pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>> {
		let file = self.open(path, OpenMode::Read)?;
		self.read(&file)
	}

	/// Writes at the position of the handle, growing the file as needed, and
	/// stamps the file with the clock's time.
	///
	/// # Errors
	/// [`Error::ReadOnlyViolation`] on a read-only mount or a handle opened
	/// for reading, [`Error::CapacityExceeded`] if the volume is full. A
	/// failed write leaves the file unchanged.
	pub fn write(&mut self, file: &mut File, buf: &[u8]) -> Result<()> {
		self.check_writable(&file.path)?;
		if file.mode == OpenMode::Read {
			return Err(Error::ReadOnlyViolation(file.path.clone()));
		}
		if buf.is_empty() {
			return Ok(());
		}
		let entry = self.entry_at(file.entry_offset);
		file.first_cluster = entry.first_cluster();
		file.size = entry.data_size();
		file.pos = match file.mode {
			OpenMode::Append => file.size,
			_ => file.pos.min(file.size),
		};
		let end = u64::from(file.pos) + buf.len() as u64;
		let end = u32::try_from(end).map_err(|_| Error::CapacityExceeded {
			required: end,
			available: u64::from(u32::MAX),
		})?;
		let layout = self.layout;
		let cluster_size = layout.cluster_size();
		let mut chain = table::chain(self.data(), &layout, file.first_cluster)?;
		let needed = (end as usize).div_ceil(cluster_size);
		self.mark_dirty()?;
		if chain.len() < needed {
			let hint = self.next_free;
			let data = self.data_mut()?;
			let new = table::allocate(data, &layout, needed - chain.len(), hint)?;
			if let Some(&last) = chain.last() {
				table::set(data, &layout, last, new[0]);
			}
			self.next_free = new[new.len() - 1] + 1;
			chain.extend(new);
		}

		let data = self.data_mut()?;
		let mut pos = file.pos as usize;
		let mut rest = buf;
		while !rest.is_empty() {
			let within = pos % cluster_size;
			let n = rest.len().min(cluster_size - within);
			let start = layout.cluster_range(chain[pos / cluster_size]).start + within;
			data[start..start + n].copy_from_slice(&rest[..n]);
			pos += n;
			rest = &rest[n..];
		}

		file.first_cluster = chain[0];
		file.pos = end;
		file.size = file.size.max(end);
		let (first_cluster, size) = (file.first_cluster, file.size);
		let stamp = encode_saturating(self.clock.now());
		self.update_entry(file.entry_offset, |entry| {
			entry.set_first_cluster(first_cluster);
			entry.data_size = size.to_le_bytes();
			entry.set_modified(stamp);
			entry.attributes |= Attributes::ARCHIVE;
		})
	}

	fn truncate(&mut self, file: &mut File) -> Result<()> {
		self.mark_dirty()?;
		let layout = self.layout;
		table::free(self.data_mut()?, &layout, file.first_cluster)?;
		file.first_cluster = 0;
		file.size = 0;
		file.pos = 0;
		let stamp = encode_saturating(self.clock.now());
		self.update_entry(file.entry_offset, |entry| {
			entry.set_first_cluster(0);
			entry.data_size = 0_u32.to_le_bytes();
			entry.set_modified(stamp);
		})
	}

	/// Current on-disk state of an open file.
	pub fn stat(&self, file: &File) -> FileStat {
		FileStat::of(&self.entry_at(file.entry_offset))
	}

	/// # Errors
	/// [`Error::NotFound`] and [`Error::NotADirectory`] for a parent that is
	/// a file.
	pub fn stat_path(&self, path: &str) -> Result<FileStat> {
		Ok(match self.resolve(path)? {
			Some(found) => FileStat::of(&found.entry),
			None => FileStat {
				size: 0,
				modified: default_timestamp(),
				attributes: Attributes::DIR,
			},
		})
	}

	/// Lists a directory in on-disk order, without `.` and `..`.
	pub fn read_dir(&self, path: &str) -> Result<Vec<DirEntryInfo>> {
		let dir = self.resolve_dir(path)?;
		Ok(self
			.scan(dir)?
			.into_iter()
			.map(|found| DirEntryInfo {
				stat: FileStat::of(&found.entry),
				name: found.name,
				short_name: found.short_name,
			})
			.collect())
	}

	/// Creates a directory. Its parent must exist.
	///
	/// # Errors
	/// [`Error::PathConflict`] if the path exists, otherwise like
	/// [`Self::open`] with [`OpenMode::Write`].
	pub fn create_dir(&mut self, path: &str) -> Result<()> {
		self.check_writable(path)?;
		let (parent, leaf) = split_parent(path)?;
		let dir = self.resolve_dir(parent)?;
		if self.find(dir, leaf)?.is_some() {
			return Err(Error::PathConflict(path.into()));
		}
		check_name(leaf, true)?;

		self.mark_dirty()?;
		let layout = self.layout;
		let hint = self.next_free;
		let parent_cluster = match dir {
			DirLocation::Chain(c) if c != layout.first_root_cluster => c,
			_ => 0,
		};
		let stamp = encode_saturating(self.clock.now());
		let data = self.data_mut()?;
		let cluster = table::allocate(data, &layout, 1, hint)?[0];
		let region = layout.cluster_range(cluster);
		data[region.clone()].fill(0);
		let dot = ChildEntry::new(SELF_DIR, Attributes::DIR, cluster, 0, stamp);
		let dotdot = ChildEntry::new(PARENT_DIR, Attributes::DIR, parent_cluster, 0, stamp);
		data[region.start..region.start + ENTRY_SIZE].copy_from_slice(bytes_of(&dot));
		data[region.start + ENTRY_SIZE..region.start + 2 * ENTRY_SIZE]
			.copy_from_slice(bytes_of(&dotdot));
		self.next_free = cluster + 1;

		if let Err(e) = self.create_entry(dir, leaf, Attributes::DIR, cluster) {
			table::free(self.data_mut()?, &layout, cluster)?;
			return Err(e);
		}
		debug!("created directory {path}");
		Ok(())
	}

	fn data(&self) -> &[u8] {
		self.storage.bytes()
	}

	fn data_mut(&mut self) -> Result<&mut [u8]> {
		self.storage
			.bytes_mut()
			.ok_or_else(|| Error::ReadOnlyViolation("storage is not writable".into()))
	}

	fn check_writable(&self, path: &str) -> Result<()> {
		match self.mode {
			PartitionMode::ReadOnly => Err(Error::ReadOnlyViolation(path.into())),
			PartitionMode::ReadWrite => Ok(()),
		}
	}

	/// Clears the clean flag before the first modification.
	fn mark_dirty(&mut self) -> Result<()> {
		if self.dirty {
			return Ok(());
		}
		let layout = self.layout;
		let data = self.data_mut()?;
		if let Some(mut flags) = layout.fat_type.unpack_fat_entry1(table::get(data, &layout, 1)) {
			flags.remove(FatEntry1Flags::CLEAN);
			table::set(data, &layout, 1, layout.fat_type.pack_fat_entry1(flags));
		}
		self.dirty = true;
		Ok(())
	}

	fn entry_at(&self, offset: usize) -> ChildEntry {
		*from_bytes(&self.data()[offset..offset + ENTRY_SIZE])
	}

	fn update_entry(&mut self, offset: usize, f: impl FnOnce(&mut ChildEntry)) -> Result<()> {
		let data = self.data_mut()?;
		let slot = &mut data[offset..offset + ENTRY_SIZE];
		let mut entry: ChildEntry = *from_bytes(slot);
		f(&mut entry);
		slot.copy_from_slice(bytes_of(&entry));
		Ok(())
	}

	fn root(&self) -> DirLocation {
		match self.layout.fat_type {
			FatType::Fat32 => DirLocation::Chain(self.layout.first_root_cluster),
			_ => DirLocation::FixedRoot,
		}
	}

	/// The directory starting at `first_cluster`; `..` entries use 0 for the
	/// root.
	fn dir_at(&self, first_cluster: ClusterIdx) -> DirLocation {
		match first_cluster {
			0 => self.root(),
			c => DirLocation::Chain(c),
		}
	}

	/// Image offsets of all slots of a directory.
	fn dir_slots(&self, dir: DirLocation) -> Result<Vec<usize>> {
		match dir {
			DirLocation::FixedRoot => Ok(self.layout.root_range().step_by(ENTRY_SIZE).collect()),
			DirLocation::Chain(first) => {
				let mut slots = Vec::new();
				for cluster in table::chain(self.data(), &self.layout, first)? {
					slots.extend(self.layout.cluster_range(cluster).step_by(ENTRY_SIZE));
				}
				Ok(slots)
			}
		}
	}

	fn scan(&self, dir: DirLocation) -> Result<Vec<Found>> {
		let data = self.data();
		let mut found = Vec::new();
		let mut long_name = LongNameAssembler::new();
		for offset in self.dir_slots(dir)? {
			let slot = &data[offset..offset + ENTRY_SIZE];
			let entry: ChildEntry = *from_bytes(slot);
			if entry.is_end() {
				break;
			}
			if entry.is_vacant() {
				long_name.reset();
				continue;
			}
			if entry.attributes.is_long_name() {
				long_name.push(from_bytes(slot));
				continue;
			}
			let long = long_name.finish(&entry.name);
			if entry.is_dot() || entry.attributes.contains(Attributes::VOLUME_ID) {
				continue;
			}
			let short_name = short_name_to_string(&entry.name);
			found.push(Found {
				name: long.unwrap_or_else(|| short_name.clone()),
				short_name,
				entry,
				offset,
			});
		}
		Ok(found)
	}

	fn find(&self, dir: DirLocation, name: &str) -> Result<Option<Found>> {
		let mut entries = self.scan(dir)?;
		let idx = entries
			.iter()
			.position(|f| f.name == name || f.short_name == name)
			.or_else(|| {
				entries
					.iter()
					.position(|f| names_match(&f.name, name) || names_match(&f.short_name, name))
			});
		Ok(idx.map(|i| entries.swap_remove(i)))
	}

	/// Resolves every component of `path`; `None` is the root directory.
	fn resolve(&self, path: &str) -> Result<Option<Found>> {
		let mut current: Option<Found> = None;
		for segment in path.split('/').filter(|s| !s.is_empty()) {
			let dir = match &current {
				None => self.root(),
				Some(found) if found.is_dir() => self.dir_at(found.entry.first_cluster()),
				Some(_) => return Err(Error::NotADirectory(path.into())),
			};
			current = Some(
				self.find(dir, segment)?
					.ok_or_else(|| Error::NotFound(path.into()))?,
			);
		}
		Ok(current)
	}

	fn resolve_dir(&self, path: &str) -> Result<DirLocation> {
		match self.resolve(path)? {
			None => Ok(self.root()),
			Some(found) if found.is_dir() => Ok(self.dir_at(found.entry.first_cluster())),
			Some(_) => Err(Error::NotADirectory(path.into())),
		}
	}

	/// Adds an entry for `name` to `dir` and returns the offset of its short
	/// entry.
	fn create_entry(
		&mut self,
		dir: DirLocation,
		name: &str,
		attributes: Attributes,
		first_cluster: ClusterIdx,
	) -> Result<usize> {
		let mut taken: ShortNameSet = self
			.scan(dir)?
			.iter()
			.map(|found| found.entry.name)
			.collect();
		let encoded = encode_name(name, &mut taken)?;
		let stamp = encode_saturating(self.clock.now());
		let slots = self.free_slots(dir, encoded.slot_count())?;
		let data = self.data_mut()?;
		for (&offset, long) in slots.iter().zip(&encoded.long_name) {
			data[offset..offset + ENTRY_SIZE].copy_from_slice(bytes_of(long));
		}
		let entry = ChildEntry::new(encoded.short_name, attributes, first_cluster, 0, stamp);
		let offset = slots[slots.len() - 1];
		data[offset..offset + ENTRY_SIZE].copy_from_slice(bytes_of(&entry));
		Ok(offset)
	}

	/// Finds `count` consecutive free slots in `dir`, growing it if it is a
	/// cluster chain.
	fn free_slots(&mut self, dir: DirLocation, count: usize) -> Result<Vec<usize>> {
		let slots = self.dir_slots(dir)?;
		let data = self.data();
		let mut run = Vec::with_capacity(count);
		let mut ended = false;
		for (i, &offset) in slots.iter().enumerate() {
			let byte0 = data[offset];
			ended |= byte0 == ChildEntry::BYTE0_END;
			if ended || byte0 == ChildEntry::BYTE0_VACANT {
				run.push(offset);
				if run.len() == count {
					// slots past the end marker may hold stale entries
					if let Some(&next) = slots.get(i + 1).filter(|_| ended) {
						self.mark_dirty()?;
						self.data_mut()?[next..next + ENTRY_SIZE].fill(0);
					}
					return Ok(run);
				}
			} else {
				run.clear();
			}
		}

		let DirLocation::Chain(first) = dir else {
			return Err(Error::CapacityExceeded {
				required: ((slots.len() - run.len() + count) * ENTRY_SIZE) as u64,
				available: (slots.len() * ENTRY_SIZE) as u64,
			});
		};
		self.mark_dirty()?;
		let layout = self.layout;
		let hint = self.next_free;
		let missing = (count - run.len()) * ENTRY_SIZE;
		let data = self.data_mut()?;
		let chain = table::chain(data, &layout, first)?;
		let new = table::allocate(data, &layout, missing.div_ceil(layout.cluster_size()), hint)?;
		for &cluster in &new {
			data[layout.cluster_range(cluster)].fill(0);
			run.extend(layout.cluster_range(cluster).step_by(ENTRY_SIZE));
		}
		if let Some(&last) = chain.last() {
			table::set(data, &layout, last, new[0]);
		}
		self.next_free = new[new.len() - 1] + 1;
		run.truncate(count);
		debug!("directory at cluster {first} grew by {} cluster(s)", new.len());
		Ok(run)
	}
}

/// Splits a path into its parent path and last component.
fn split_parent(path: &str) -> Result<(&str, &str)> {
	let trimmed = path.trim_end_matches('/');
	let (parent, leaf) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
	if leaf.is_empty() {
		return Err(Error::InvalidName(path.into()));
	}
	Ok((parent, leaf))
}

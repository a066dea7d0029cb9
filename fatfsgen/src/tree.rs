//! In-memory directory tree of an image under construction.
//!
//! Names are encoded (short name, numeric tail, long-name chain) as soon as
//! an entry is added, so name errors and alias collisions show up at the
//! call that caused them. Cluster numbers are only assigned when the tree is
//! composed into an image.

use alloc::{collections::BTreeMap, string::String, vec::Vec};

use crate::{
	error::{Error, Result},
	fat::{Attributes, ChildEntry, ShortName},
	name::{check_name, encode_name, encode_short_name, short_name_to_string, EncodedName, ShortNameSet},
	timestamp::{decode, encode, CalendarTimestamp, PackedFatDate, PackedFatTime},
	ClusterIdx,
};

/// A file or directory as it will be written to its parent directory.
#[derive(Clone, Debug)]
pub struct DirectoryEntry {
	/// The name as given by the caller.
	pub name: String,
	pub encoded: EncodedName,
	pub attributes: Attributes,
	pub modified: (PackedFatDate, PackedFatTime),
	/// 0 for directories.
	pub size: u32,
}

impl DirectoryEntry {
	#[inline]
	pub fn short_name(&self) -> &ShortName {
		&self.encoded.short_name
	}

	/// The short name in `NAME.EXT` form.
	pub fn short_name_string(&self) -> String {
		short_name_to_string(&self.encoded.short_name)
	}

	#[inline]
	pub fn is_dir(&self) -> bool {
		self.attributes.contains(Attributes::DIR)
	}

	#[inline]
	pub fn modified(&self) -> CalendarTimestamp {
		decode(self.modified.0, self.modified.1)
	}

	/// Number of directory slots this entry occupies.
	#[inline]
	pub fn slot_count(&self) -> usize {
		self.encoded.slot_count()
	}

	/// The short entry with its first cluster filled in.
	pub fn to_child_entry(&self, first_cluster: ClusterIdx) -> ChildEntry {
		ChildEntry::new(
			self.encoded.short_name,
			self.attributes,
			first_cluster,
			self.size,
			self.modified,
		)
	}
}

#[derive(Clone, Debug)]
pub enum NodeKind {
	File(Vec<u8>),
	Dir(DirNode),
}

#[derive(Clone, Debug)]
pub struct Node {
	pub entry: DirectoryEntry,
	pub kind: NodeKind,
}

/// Children of one directory, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct DirNode {
	children: Vec<Node>,
	/// Exact names to positions in `children`.
	index: BTreeMap<String, usize>,
	short_names: ShortNameSet,
}

impl DirNode {
	#[inline]
	pub fn children(&self) -> &[Node] {
		&self.children
	}

	pub fn get(&self, name: &str) -> Option<&Node> {
		self.index.get(name).map(|&i| &self.children[i])
	}

	/// Number of directory slots the children need, plus the `.` and `..`
	/// entries of a subdirectory.
	pub fn slot_count(&self, is_root: bool) -> usize {
		let dots = if is_root { 0 } else { 2 };
		dots + self
			.children
			.iter()
			.map(|child| child.entry.slot_count())
			.sum::<usize>()
	}

	fn insert(
		&mut self,
		name: &str,
		long_names: bool,
		attributes: Attributes,
		modified: (PackedFatDate, PackedFatTime),
		kind: NodeKind,
	) -> Result<usize> {
		let size = match &kind {
			NodeKind::File(content) => u32::try_from(content.len()).map_err(|_| {
				Error::CapacityExceeded {
					required: content.len() as u64,
					available: u64::from(u32::MAX),
				}
			})?,
			NodeKind::Dir(_) => 0,
		};
		let encoded = if long_names {
			encode_name(name, &mut self.short_names)?
		} else {
			encode_short_name(name, &mut self.short_names)?
		};
		let idx = self.children.len();
		self.children.push(Node {
			entry: DirectoryEntry {
				name: name.into(),
				encoded,
				attributes,
				modified,
				size,
			},
			kind,
		});
		self.index.insert(name.into(), idx);
		Ok(idx)
	}
}

/// The directory tree of an image, rooted at the volume's root directory.
#[derive(Clone, Debug)]
pub struct DirTree {
	root: DirNode,
	long_names: bool,
	/// Stamp for entries added without an explicit timestamp.
	default_modified: CalendarTimestamp,
}

impl DirTree {
	pub fn new(default_modified: CalendarTimestamp, long_names: bool) -> Self {
		Self {
			root: DirNode::default(),
			long_names,
			default_modified,
		}
	}

	#[inline]
	pub fn root(&self) -> &DirNode {
		&self.root
	}

	#[inline]
	pub fn long_names(&self) -> bool {
		self.long_names
	}

	#[inline]
	pub fn default_modified(&self) -> CalendarTimestamp {
		self.default_modified
	}

	/// Looks up a node by its exact path.
	pub fn get(&self, path: &str) -> Option<&Node> {
		let (parents, leaf) = split_path(path).ok()?;
		let mut dir = &self.root;
		for segment in parents {
			match &dir.get(segment)?.kind {
				NodeKind::Dir(sub) => dir = sub,
				NodeKind::File(_) => return None,
			}
		}
		dir.get(leaf)
	}

	/// Adds a file, creating missing parent directories with the default
	/// timestamp.
	///
	/// # Errors
	/// [`Error::PathConflict`] if the path exists or a parent is a file, name
	/// errors from [`crate::name::encode_name`] and [`Error::Range`] for an
	/// unencodable timestamp. The tree is unchanged on error.
	///
	/// # Examples
	/// ```
	/// # use fatfsgen::{tree::DirTree, default_timestamp, Error};
	/// let mut tree = DirTree::new(default_timestamp(), true);
	/// let entry = tree.add_file("sub/testlongfilenames.txt", b"hi".to_vec(), None, false).unwrap();
	/// assert_eq!(entry.short_name_string(), "TESTLO~1.TXT");
	/// assert!(tree.get("sub").unwrap().entry.is_dir());
	/// assert!(matches!(
	///     tree.add_file("sub/testlongfilenames.txt", Vec::new(), None, false),
	///     Err(Error::PathConflict(_))
	/// ));
	/// ```
	pub fn add_file(
		&mut self,
		path: &str,
		content: Vec<u8>,
		modified: Option<CalendarTimestamp>,
		read_only: bool,
	) -> Result<&DirectoryEntry> {
		let (parents, leaf) = split_path(path)?;
		let stamp = encode(modified.unwrap_or(self.default_modified))?;
		self.check_names(&parents, leaf)?;
		let mut attributes = Attributes::ARCHIVE;
		if read_only {
			attributes |= Attributes::READ_ONLY;
		}
		let long_names = self.long_names;
		let dir = self.parent_mut(&parents)?;
		if dir.index.contains_key(leaf) {
			return Err(Error::PathConflict(path.into()));
		}
		let idx = dir.insert(leaf, long_names, attributes, stamp, NodeKind::File(content))?;
		Ok(&dir.children[idx].entry)
	}

	/// Adds a directory, creating missing parents. Adding a directory that
	/// already exists only updates its timestamp, if one is given.
	///
	/// # Errors
	/// Same as [`Self::add_file`], except that an existing directory at
	/// `path` is not a conflict.
	pub fn add_dir(
		&mut self,
		path: &str,
		modified: Option<CalendarTimestamp>,
	) -> Result<&DirectoryEntry> {
		let (parents, leaf) = split_path(path)?;
		let stamp = encode(modified.unwrap_or(self.default_modified))?;
		self.check_names(&parents, leaf)?;
		let long_names = self.long_names;
		let dir = self.parent_mut(&parents)?;
		let idx = match dir.index.get(leaf).copied() {
			Some(idx) => {
				let node = &mut dir.children[idx];
				if !node.entry.is_dir() {
					return Err(Error::PathConflict(path.into()));
				}
				if modified.is_some() {
					node.entry.modified = stamp;
				}
				idx
			}
			None => dir.insert(
				leaf,
				long_names,
				Attributes::DIR,
				stamp,
				NodeKind::Dir(DirNode::default()),
			)?,
		};
		Ok(&dir.children[idx].entry)
	}

	fn check_names(&self, parents: &[&str], leaf: &str) -> Result<()> {
		for name in parents.iter().chain([&leaf]) {
			check_name(name, self.long_names)?;
		}
		Ok(())
	}

	/// Walks to the directory holding the leaf of a path, creating what is
	/// missing. Once one directory is created, everything below it is new,
	/// so a later failure can only come from the first creation.
	fn parent_mut(&mut self, parents: &[&str]) -> Result<&mut DirNode> {
		let stamp = encode(self.default_modified)?;
		let long_names = self.long_names;
		let mut dir = &mut self.root;
		for (depth, segment) in parents.iter().enumerate() {
			let idx = match dir.index.get(*segment).copied() {
				Some(idx) => idx,
				None => dir.insert(
					segment,
					long_names,
					Attributes::DIR,
					stamp,
					NodeKind::Dir(DirNode::default()),
				)?,
			};
			dir = match &mut dir.children[idx].kind {
				NodeKind::Dir(sub) => sub,
				NodeKind::File(_) => {
					return Err(Error::PathConflict(parents[..=depth].join("/")));
				}
			};
		}
		Ok(dir)
	}
}

/// Splits a `/`-separated path into its parent directories and its last
/// component. Empty components are skipped.
fn split_path(path: &str) -> Result<(Vec<&str>, &str)> {
	let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
	let leaf = segments
		.pop()
		.ok_or_else(|| Error::InvalidName(path.into()))?;
	Ok((segments, leaf))
}

#[cfg(test)]
mod tests {
	use alloc::vec;

	use super::*;
	use crate::timestamp::default_timestamp;

	fn tree() -> DirTree {
		DirTree::new(default_timestamp(), true)
	}

	#[test]
	fn files_and_parents() {
		let mut tree = tree();
		tree.add_file("sub/test.txt", b"hello".to_vec(), None, false)
			.unwrap();
		tree.add_file("sub/deeper/TEST.TXT", Vec::new(), None, true)
			.unwrap();

		let sub = tree.get("sub").unwrap();
		assert!(sub.entry.is_dir());
		assert_eq!(sub.entry.size, 0);
		let file = tree.get("sub/test.txt").unwrap();
		assert_eq!(file.entry.size, 5);
		assert_eq!(file.entry.attributes, Attributes::ARCHIVE);
		assert_eq!(file.entry.short_name_string(), "TEST~1.TXT");
		assert!(matches!(&file.kind, NodeKind::File(content) if content == b"hello"));

		let ro = tree.get("sub/deeper/TEST.TXT").unwrap();
		assert!(ro.entry.attributes.contains(Attributes::READ_ONLY));
		assert!(ro.entry.encoded.long_name.is_empty());
		assert!(tree.get("/sub//deeper/TEST.TXT").is_some());
	}

	#[test]
	fn insertion_order_and_slots() {
		let mut tree = tree();
		tree.add_file("B.TXT", Vec::new(), None, false).unwrap();
		tree.add_file("testlongfilenames.txt", Vec::new(), None, false)
			.unwrap();
		tree.add_dir("A", None).unwrap();
		let names: Vec<&str> = tree
			.root()
			.children()
			.iter()
			.map(|n| n.entry.name.as_str())
			.collect();
		assert_eq!(names, ["B.TXT", "testlongfilenames.txt", "A"]);
		// 1 + (1 + 2) + 1
		assert_eq!(tree.root().slot_count(true), 5);
		let NodeKind::Dir(a) = &tree.get("A").unwrap().kind else {
			panic!("A is not a directory");
		};
		assert_eq!(a.slot_count(false), 2);
	}

	#[test]
	fn conflicts_leave_the_tree_unchanged() {
		let mut tree = tree();
		tree.add_file("f.txt", vec![1], None, false).unwrap();
		assert!(matches!(
			tree.add_file("f.txt", vec![2], None, false),
			Err(Error::PathConflict(_))
		));
		assert!(matches!(
			tree.add_file("f.txt/inner", Vec::new(), None, false),
			Err(Error::PathConflict(p)) if p == "f.txt"
		));
		assert!(matches!(tree.add_dir("f.txt", None), Err(Error::PathConflict(_))));
		assert!(matches!(
			tree.add_file("new/bad:name", Vec::new(), None, false),
			Err(Error::InvalidName(_))
		));
		assert!(tree.get("new").is_none());
		assert_eq!(tree.root().children().len(), 1);
	}

	#[test]
	fn alias_collisions() {
		let mut tree = tree();
		tree.add_file("testfile.txt", Vec::new(), None, false).unwrap();
		// the exact 8.3 name is taken by the alias of the first file
		assert!(matches!(
			tree.add_file("TESTFI~1.TXT", Vec::new(), None, false),
			Err(Error::PathConflict(_))
		));
		let upper = tree.add_file("TESTFILE.TXT", Vec::new(), None, false).unwrap();
		assert_eq!(upper.short_name_string(), "TESTFILE.TXT");
		let other = tree.add_file("TestFile.txt", Vec::new(), None, false).unwrap();
		assert_eq!(other.short_name_string(), "TESTFI~2.TXT");
	}

	#[test]
	fn explicit_and_invalid_timestamps() {
		let mut tree = tree();
		let ts = CalendarTimestamp::new(2022, 9, 14, 17, 29, 3).unwrap();
		let entry = tree.add_file("a.bin", Vec::new(), Some(ts), false).unwrap();
		assert_eq!(entry.modified(), ts.truncated());

		let too_early = CalendarTimestamp { year: 1979, ..ts };
		assert!(matches!(
			tree.add_file("b.bin", Vec::new(), Some(too_early), false),
			Err(Error::Range(e)) if e.underflow()
		));
		assert!(tree.get("b.bin").is_none());

		let dir = tree.add_dir("d", None).unwrap();
		assert_eq!(dir.modified(), default_timestamp());
		let dir = tree.add_dir("d", Some(ts)).unwrap();
		assert_eq!(dir.modified(), ts.truncated());
	}

	#[test]
	fn short_names_only() {
		let mut tree = DirTree::new(default_timestamp(), false);
		let entry = tree.add_file("readme.md", Vec::new(), None, false).unwrap();
		assert_eq!(entry.short_name_string(), "README.MD");
		assert!(matches!(
			tree.add_file("testlongfilenames.txt", Vec::new(), None, false),
			Err(Error::LongNameRequired(_))
		));
		assert!(matches!(
			tree.add_file("README.MD", Vec::new(), None, false),
			Err(Error::PathConflict(_))
		));
	}

	#[test]
	fn empty_paths() {
		let mut tree = tree();
		assert!(matches!(
			tree.add_file("/", Vec::new(), None, false),
			Err(Error::InvalidName(_))
		));
		assert!(matches!(tree.add_dir("", None), Err(Error::InvalidName(_))));
	}
}

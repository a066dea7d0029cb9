//! File names: 8.3 short names, generated numeric-tail aliases and VFAT
//! long-name chains.

use alloc::{collections::BTreeSet, format, string::String, vec, vec::Vec};

use log::warn;

use crate::{
	error::{Error, Result},
	fat::{
		is_valid_ascii_short_char, is_valid_long_char, name_checksum, LongNameEntry, ShortName,
		MAX_LONG_NAME_LEN,
	},
};

const BASE_LEN: usize = 8;
const EXT_LEN: usize = 3;
/// Largest numeric tail tried before giving up on a directory.
const MAX_NUMERIC_TAIL: u32 = 999_999;
/// A long name of 255 code units needs 20 components.
const MAX_LONG_NAME_ENTRIES: usize = MAX_LONG_NAME_LEN.div_ceil(LongNameEntry::CHAR_COUNT);

/// How a name has to be stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameClass {
	/// The name is a valid upper-case 8.3 name and is stored as is.
	ShortNameOnly(ShortName),
	/// The name needs a generated short name and a long-name chain.
	ShortNamePlusLong,
}

/// Decides whether `name` can be stored as a plain 8.3 name.
///
/// # Examples
/// ```
/// # use fatfsgen::name::{classify, NameClass};
/// assert_eq!(classify("TEST.TXT"), NameClass::ShortNameOnly(*b"TEST    TXT"));
/// assert_eq!(classify("SUB"), NameClass::ShortNameOnly(*b"SUB        "));
/// assert_eq!(classify("test.txt"), NameClass::ShortNamePlusLong);
/// assert_eq!(classify("TESTLONGFILENAMES.TXT"), NameClass::ShortNamePlusLong);
/// assert_eq!(classify("A.B.C"), NameClass::ShortNamePlusLong);
/// assert_eq!(classify("A+B.TXT"), NameClass::ShortNamePlusLong);
/// ```
pub fn classify(name: &str) -> NameClass {
	match parse_short_name(name) {
		Some(short) => NameClass::ShortNameOnly(short),
		None => NameClass::ShortNamePlusLong,
	}
}

/// Converts a name that already satisfies the 8.3 rules (at most 8 + 3
/// upper-case ASCII characters, one optional `.`) into its directory-entry
/// form.
pub fn parse_short_name(name: &str) -> Option<ShortName> {
	let bytes = name.as_bytes();
	let (base, ext) = match bytes.iter().position(|&b| b == b'.') {
		Some(i) => (&bytes[..i], &bytes[i + 1..]),
		None => (bytes, &[][..]),
	};
	if base.is_empty() || base.len() > BASE_LEN || ext.len() > EXT_LEN {
		return None;
	}
	if bytes.len() > base.len() && ext.is_empty() {
		// trailing dot
		return None;
	}
	let valid = |&b: &u8| b != b' ' && is_valid_ascii_short_char(b);
	if !base.iter().all(valid) || !ext.iter().all(valid) {
		return None;
	}
	let mut short = [b' '; 0xB];
	short[..base.len()].copy_from_slice(base);
	short[BASE_LEN..BASE_LEN + ext.len()].copy_from_slice(ext);
	Some(short)
}

/// Formats a short name the way it is usually displayed.
///
/// # Examples
/// ```
/// # use fatfsgen::name::short_name_to_string;
/// assert_eq!(short_name_to_string(b"TEST    TXT"), "TEST.TXT");
/// assert_eq!(short_name_to_string(b"SUB        "), "SUB");
/// assert_eq!(short_name_to_string(b"TESTLO~1TXT"), "TESTLO~1.TXT");
/// ```
pub fn short_name_to_string(name: &ShortName) -> String {
	let trim = |part: &[u8]| {
		let len = part.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
		part[..len].iter().map(|&b| char::from(b)).collect::<String>()
	};
	let base = trim(&name[..BASE_LEN]);
	let ext = trim(&name[BASE_LEN..]);
	if ext.is_empty() {
		base
	} else {
		format!("{base}.{ext}")
	}
}

/// Short names already allocated in one directory.
#[derive(Clone, Debug, Default)]
pub struct ShortNameSet(BTreeSet<ShortName>);

impl ShortNameSet {
	#[inline]
	pub fn new() -> Self {
		Self::default()
	}

	#[inline]
	pub fn contains(&self, name: &ShortName) -> bool {
		self.0.contains(name)
	}

	/// Returns `false` if the name was already allocated.
	#[inline]
	pub fn insert(&mut self, name: ShortName) -> bool {
		self.0.insert(name)
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl FromIterator<ShortName> for ShortNameSet {
	fn from_iter<I: IntoIterator<Item = ShortName>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// The directory-entry form of a name: its short name and, if needed, the
/// long-name components in on-disk order.
#[derive(Clone, Debug)]
pub struct EncodedName {
	pub short_name: ShortName,
	pub long_name: Vec<LongNameEntry>,
}

impl EncodedName {
	/// Number of directory slots the name occupies.
	#[inline]
	pub fn slot_count(&self) -> usize {
		self.long_name.len() + 1
	}

	/// Reassembles the long name, if there is one.
	pub fn long_name_string(&self) -> Option<String> {
		decode_long_name(&self.long_name, &self.short_name)
	}
}

/// Checks that `name` can be a long name and returns its UTF-16 form.
fn long_name_units(name: &str) -> Result<Vec<u16>> {
	if name.is_empty() || name == "." || name == ".." {
		return Err(Error::InvalidName(name.into()));
	}
	let units: Vec<u16> = name.encode_utf16().collect();
	if units.len() > MAX_LONG_NAME_LEN {
		return Err(Error::NameTooLong {
			name: name.into(),
			len: units.len(),
		});
	}
	if !units.iter().all(|&u| is_valid_long_char(u)) {
		return Err(Error::InvalidName(name.into()));
	}
	Ok(units)
}

/// Checks that `name` can be encoded at all, independently of the directory
/// it goes into.
pub fn check_name(name: &str, long_names: bool) -> Result<()> {
	long_name_units(name)?;
	if !long_names && parse_short_name(&name.to_ascii_uppercase()).is_none() {
		return Err(Error::LongNameRequired(name.into()));
	}
	Ok(())
}

/// Encodes `name` for a directory whose allocated short names are `taken`,
/// recording the short name it ends up with.
///
/// Names that are not plain 8.3 names get a numeric-tail short name and a
/// long-name chain holding the exact original.
///
/// # Errors
/// [`Error::NameTooLong`] beyond 255 UTF-16 units, [`Error::InvalidName`] for
/// names FAT can't hold and [`Error::PathConflict`] if the 8.3 name is already
/// allocated.
///
/// # Examples
/// ```
/// # use fatfsgen::name::{encode_name, ShortNameSet};
/// let mut taken = ShortNameSet::new();
/// let upper = encode_name("TESTFILE.TXT", &mut taken).unwrap();
/// let lower = encode_name("testfile.txt", &mut taken).unwrap();
/// assert_eq!(&upper.short_name, b"TESTFILETXT");
/// assert!(upper.long_name.is_empty());
/// assert_eq!(&lower.short_name, b"TESTFI~1TXT");
/// assert_eq!(lower.long_name_string().as_deref(), Some("testfile.txt"));
/// ```
pub fn encode_name(name: &str, taken: &mut ShortNameSet) -> Result<EncodedName> {
	let units = long_name_units(name)?;
	match classify(name) {
		NameClass::ShortNameOnly(short_name) => allocate_exact(name, short_name, taken),
		NameClass::ShortNamePlusLong => {
			let short_name = generate_short_name(name, taken)?;
			let long_name = long_name_entries(&units, name_checksum(&short_name));
			Ok(EncodedName {
				short_name,
				long_name,
			})
		}
	}
}

/// Encodes `name` for a volume without long names: lower-case letters are
/// upper-cased, anything else that does not fit 8.3 is rejected.
///
/// # Examples
/// ```
/// # use fatfsgen::name::{encode_short_name, ShortNameSet};
/// let mut taken = ShortNameSet::new();
/// assert_eq!(&encode_short_name("test.txt", &mut taken).unwrap().short_name, b"TEST    TXT");
/// assert!(encode_short_name("testlongfilenames.txt", &mut taken).is_err());
/// ```
pub fn encode_short_name(name: &str, taken: &mut ShortNameSet) -> Result<EncodedName> {
	long_name_units(name)?;
	match parse_short_name(&name.to_ascii_uppercase()) {
		Some(short_name) => allocate_exact(name, short_name, taken),
		None => Err(Error::LongNameRequired(name.into())),
	}
}

fn allocate_exact(name: &str, short_name: ShortName, taken: &mut ShortNameSet) -> Result<EncodedName> {
	if !taken.insert(short_name) {
		return Err(Error::PathConflict(name.into()));
	}
	Ok(EncodedName {
		short_name,
		long_name: Vec::new(),
	})
}

fn short_char(c: char) -> u8 {
	let c = c.to_ascii_uppercase();
	if c.is_ascii() && is_valid_ascii_short_char(c as u8) {
		c as u8
	} else {
		b'_'
	}
}

/// Picks the first free numeric-tail alias (`BASE~N.EXT`) for a long name and
/// allocates it.
///
/// # Examples
/// ```
/// # use fatfsgen::name::{generate_short_name, ShortNameSet};
/// let mut taken = ShortNameSet::new();
/// assert_eq!(&generate_short_name("testlongfilenames.txt", &mut taken).unwrap(), b"TESTLO~1TXT");
/// assert_eq!(&generate_short_name("testlongfilenames.txt", &mut taken).unwrap(), b"TESTLO~2TXT");
/// assert_eq!(&generate_short_name("a b+c.html", &mut taken).unwrap(), b"AB_C~1  HTM");
/// assert_eq!(&generate_short_name(".profile", &mut taken).unwrap(), b"PROFIL~1   ");
/// ```
pub fn generate_short_name(name: &str, taken: &mut ShortNameSet) -> Result<ShortName> {
	let (base_part, ext_part) = match name.rfind('.') {
		Some(i) if i > 0 => (&name[..i], &name[i + 1..]),
		_ => (name, ""),
	};
	let mut base: Vec<u8> = base_part
		.chars()
		.filter(|&c| c != ' ' && c != '.')
		.map(short_char)
		.collect();
	if base.is_empty() {
		base.push(b'_');
	}
	let ext: Vec<u8> = ext_part
		.chars()
		.filter(|&c| c != ' ')
		.map(short_char)
		.take(EXT_LEN)
		.collect();

	for n in 1..=MAX_NUMERIC_TAIL {
		let tail = format!("~{n}");
		let keep = (BASE_LEN - tail.len()).min(base.len());
		let mut short = [b' '; 0xB];
		short[..keep].copy_from_slice(&base[..keep]);
		short[keep..keep + tail.len()].copy_from_slice(tail.as_bytes());
		short[BASE_LEN..BASE_LEN + ext.len()].copy_from_slice(&ext);
		if taken.insert(short) {
			return Ok(short);
		}
	}
	Err(Error::PathConflict(name.into()))
}

/// Splits a long name into components of 13 code units, in on-disk order
/// (last component first).
///
/// A name that does not fill its last component is terminated with `0x0000`
/// and padded with `0xFFFF`.
pub fn long_name_entries(units: &[u16], checksum: u8) -> Vec<LongNameEntry> {
	let count = units.len().div_ceil(LongNameEntry::CHAR_COUNT);
	(1..=count)
		.rev()
		.map(|seq| {
			let start = (seq - 1) * LongNameEntry::CHAR_COUNT;
			let mut chunk = [0xFFFF; LongNameEntry::CHAR_COUNT];
			for (i, slot) in chunk.iter_mut().enumerate() {
				match units.get(start + i) {
					Some(&u) => *slot = u,
					None if start + i == units.len() => *slot = 0,
					None => {}
				}
			}
			let mut ord = seq as u8;
			if seq == count {
				ord |= LongNameEntry::LAST_ORD_FLAG;
			}
			LongNameEntry::new(ord, &chunk, checksum)
		})
		.collect()
}

/// Collects long-name components read from a directory, in on-disk order,
/// and checks them against the short entry that follows.
#[derive(Debug, Default)]
pub struct LongNameAssembler {
	units: Vec<u16>,
	checksum: u8,
	/// Sequence number the next component must have.
	next: u8,
	active: bool,
}

impl LongNameAssembler {
	#[inline]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, entry: &LongNameEntry) {
		let seq = entry.seq();
		if entry.is_last() {
			if self.active {
				warn!("long name chain interrupted by a new chain");
			}
			if seq == 0 || seq as usize > MAX_LONG_NAME_ENTRIES {
				warn!("long name component with invalid ordinal {:#04x}", entry.ord);
				self.reset();
				return;
			}
			self.units = vec![0xFFFF; seq as usize * LongNameEntry::CHAR_COUNT];
			self.checksum = entry.checksum;
			self.active = true;
		} else if !self.active || seq == 0 || seq != self.next || entry.checksum != self.checksum {
			if self.active {
				warn!("long name chain broken at ordinal {:#04x}", entry.ord);
			}
			self.reset();
			return;
		}
		let start = (seq as usize - 1) * LongNameEntry::CHAR_COUNT;
		self.units[start..start + LongNameEntry::CHAR_COUNT].copy_from_slice(&entry.units());
		self.next = seq - 1;
	}

	/// Ends the chain at the short entry it belongs to. Returns the long name
	/// if the chain is complete and its checksum matches `short_name`.
	pub fn finish(&mut self, short_name: &ShortName) -> Option<String> {
		let complete = self.active && self.next == 0;
		let checksum = self.checksum;
		let units = core::mem::take(&mut self.units);
		self.reset();
		if !complete {
			return None;
		}
		if checksum != name_checksum(short_name) {
			warn!(
				"long name checksum mismatch for {}",
				short_name_to_string(short_name)
			);
			return None;
		}
		let len = units.iter().position(|&u| u == 0).unwrap_or(units.len());
		let units = &units[..len];
		// a name that could not have been written is not trusted
		let name = String::from_utf16(units)
			.ok()
			.filter(|name| !name.is_empty() && name != "." && name != "..")
			.filter(|_| units.iter().all(|&u| is_valid_long_char(u)));
		if name.is_none() {
			warn!(
				"invalid long name for {}",
				short_name_to_string(short_name)
			);
		}
		name
	}

	pub fn reset(&mut self) {
		self.units.clear();
		self.checksum = 0;
		self.next = 0;
		self.active = false;
	}
}

/// Reassembles a long name from its components in on-disk order.
pub fn decode_long_name(entries: &[LongNameEntry], short_name: &ShortName) -> Option<String> {
	if entries.is_empty() {
		return None;
	}
	let mut assembler = LongNameAssembler::new();
	for entry in entries {
		assembler.push(entry);
	}
	assembler.finish(short_name)
}

/// Case-insensitive name comparison as FAT drivers do it.
pub fn names_match(a: &str, b: &str) -> bool {
	a.chars()
		.flat_map(char::to_lowercase)
		.eq(b.chars().flat_map(char::to_lowercase))
}

use alloc::string::String;
use core::fmt::{self, Display, Formatter};

use crate::timestamp::RangeError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Error thrown while building, composing or accessing an image.
///
/// None of these are transient: the operation that threw has no effect.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
	/// A timestamp cannot be stored in a directory entry.
	Range(RangeError),
	/// A name is longer than 255 UTF-16 code units.
	NameTooLong { name: String, len: usize },
	/// A name is empty, `.`, `..` or contains characters FAT can't store.
	InvalidName(String),
	/// Long names are disabled and this name is not a valid 8.3 name.
	LongNameRequired(String),
	/// A path is already taken by a file, or a file is in the way of a
	/// directory.
	PathConflict(String),
	/// The image is too small for the data and directory entries.
	CapacityExceeded { required: u64, available: u64 },
	NotFound(String),
	/// Write access to a read-only mount or a read-only file.
	ReadOnlyViolation(String),
	NotADirectory(String),
	IsADirectory(String),
	InvalidConfig(&'static str),
	/// The image is not a FAT volume or its structures are inconsistent.
	Corrupted(&'static str),
	#[cfg(feature = "std")]
	Io(std::io::Error),
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Range(e) => Display::fmt(e, f),
			Self::NameTooLong { name, len } => {
				write!(f, "name {name:?} is {len} UTF-16 units long, the maximum is 255")
			}
			Self::InvalidName(name) => write!(f, "invalid file name {name:?}"),
			Self::LongNameRequired(name) => {
				write!(f, "{name:?} is not an 8.3 name and long names are disabled")
			}
			Self::PathConflict(path) => write!(f, "path {path:?} already exists"),
			Self::CapacityExceeded {
				required,
				available,
			} => write!(
				f,
				"image capacity exceeded: {required} bytes required, {available} bytes available"
			),
			Self::NotFound(path) => write!(f, "{path:?} not found"),
			Self::ReadOnlyViolation(path) => write!(f, "{path:?} is read-only"),
			Self::NotADirectory(path) => write!(f, "{path:?} is not a directory"),
			Self::IsADirectory(path) => write!(f, "{path:?} is a directory"),
			Self::InvalidConfig(msg) => write!(f, "invalid image configuration: {msg}"),
			Self::Corrupted(msg) => write!(f, "corrupted FAT volume: {msg}"),
			#[cfg(feature = "std")]
			Self::Io(e) => Display::fmt(e, f),
		}
	}
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Range(e) => Some(e),
			Self::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<RangeError> for Error {
	#[inline]
	fn from(e: RangeError) -> Self {
		Self::Range(e)
	}
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
	#[inline]
	fn from(e: std::io::Error) -> Self {
		Self::Io(e)
	}
}

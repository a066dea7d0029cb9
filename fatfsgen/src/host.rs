//! Host side of image generation: importing a directory tree, writing the
//! image file and extracting an image back into a directory.

use std::{
	ffi::OsString,
	fs,
	io::{self, Write},
	path::{Component, Path, PathBuf},
	process,
	time::SystemTime,
};

use chrono::{Local, TimeZone};
use log::{debug, info, warn};

use crate::{
	error::{Error, Result},
	image::{FileOptions, ImageBuilder, ImageConfig, PartitionMode},
	mount::Volume,
	timestamp::{CalendarTimestamp, SystemClock},
};

/// Adds every file and directory below `dir` to the image root, in name
/// order. Symbolic links are followed; other special files are skipped.
///
/// Host modification times are used unless the builder stamps everything
/// with the FAT epoch. Times outside the FAT range are clamped.
pub fn add_host_dir(builder: &mut ImageBuilder, dir: &Path) -> Result<()> {
	import(builder, dir, "")
}

fn import(builder: &mut ImageBuilder, dir: &Path, prefix: &str) -> Result<()> {
	let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
	entries.sort_by_key(fs::DirEntry::file_name);
	for entry in entries {
		let name = entry
			.file_name()
			.into_string()
			.map_err(|name| Error::InvalidName(name.to_string_lossy().into_owned()))?;
		let path = if prefix.is_empty() {
			name
		} else {
			format!("{prefix}/{name}")
		};
		let host_path = entry.path();
		let meta = fs::metadata(&host_path)?;
		let modified = if builder.config().get_use_default_datetime() {
			None
		} else {
			Some(CalendarTimestamp::from_system_time(meta.modified()?))
		};

		if meta.is_dir() {
			builder.add_dir(&path, modified)?;
			import(builder, &host_path, &path)?;
		} else if meta.is_file() {
			let content = fs::read(&host_path)?;
			debug!("adding {path} ({} bytes)", content.len());
			let options = FileOptions {
				modified,
				read_only: meta.permissions().readonly(),
			};
			builder.add_file(&path, content, options)?;
		} else {
			warn!("skipping {}: not a file or directory", host_path.display());
		}
	}
	Ok(())
}

/// Writes `image` to a temporary file next to `path`, syncs it and renames
/// it over `path`. On failure, whatever was at `path` is left alone and the
/// temporary file is removed.
pub fn write_image(path: &Path, image: &[u8]) -> Result<()> {
	fn write_synced(path: &Path, image: &[u8]) -> io::Result<()> {
		let mut file = fs::File::options()
			.write(true)
			.create_new(true)
			.open(path)?;
		file.write_all(image)?;
		file.sync_all()
	}

	let tmp = temp_path(path)?;
	if let Err(e) = write_synced(&tmp, image).and_then(|()| fs::rename(&tmp, path)) {
		if let Err(remove_err) = fs::remove_file(&tmp) {
			if remove_err.kind() != io::ErrorKind::NotFound {
				warn!("failed to remove {}: {remove_err}", tmp.display());
			}
		}
		return Err(e.into());
	}
	Ok(())
}

/// `.<name>.<pid>.tmp` in the directory of `path`.
fn temp_path(path: &Path) -> Result<PathBuf> {
	let name = path
		.file_name()
		.ok_or_else(|| Error::InvalidName(path.display().to_string()))?;
	let mut tmp_name = OsString::from(".");
	tmp_name.push(name);
	tmp_name.push(format!(".{}.tmp", process::id()));
	Ok(path.with_file_name(tmp_name))
}

/// Builds an image of `input_dir` and writes it to `output`. Nothing is
/// written if the image can't be built.
pub fn generate(input_dir: &Path, output: &Path, config: ImageConfig) -> Result<()> {
	let mut builder = ImageBuilder::new(config, &SystemClock);
	add_host_dir(&mut builder, input_dir)?;
	let image = builder.build()?;
	write_image(output, &image)?;
	info!(
		"wrote {} ({} bytes) from {}",
		output.display(),
		image.len(),
		input_dir.display()
	);
	Ok(())
}

/// Recreates the files and directories of `image` below `out_dir`, with
/// the stored modification times on files.
pub fn extract(image: &[u8], out_dir: &Path) -> Result<()> {
	let mut volume = Volume::mount(image, PartitionMode::ReadOnly)?;
	extract_dir(&mut volume, "", out_dir)
}

fn extract_dir(volume: &mut Volume<&[u8]>, dir: &str, out_dir: &Path) -> Result<()> {
	fs::create_dir_all(out_dir)?;
	for entry in volume.read_dir(dir)? {
		if !is_plain_name(&entry.name) {
			return Err(Error::InvalidName(entry.name));
		}
		let path = format!("{dir}/{}", entry.name);
		let host_path = out_dir.join(&entry.name);
		if entry.stat.is_dir() {
			extract_dir(volume, &path, &host_path)?;
			continue;
		}
		let content = volume.read_file(&path)?;
		let mut file = fs::File::create(&host_path)?;
		file.write_all(&content)?;
		if let Some(time) = to_system_time(entry.stat.modified) {
			file.set_modified(time)?;
		}
		debug!("extracted {path} ({} bytes)", content.len());
	}
	Ok(())
}

/// Whether `name` names a child of a directory and nothing else.
fn is_plain_name(name: &str) -> bool {
	let mut components = Path::new(name).components();
	matches!(
		(components.next(), components.next()),
		(Some(Component::Normal(n)), None) if n == name
	)
}

fn to_system_time(ts: CalendarTimestamp) -> Option<SystemTime> {
	let local = Local.from_local_datetime(&ts.to_naive()?).earliest()?;
	Some(local.into())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_plain_names_are_extracted() {
		for name in ["a.txt", "SUB", "name with spaces", ".hidden"] {
			assert!(is_plain_name(name), "{name}");
		}
		for name in ["", ".", "..", "a/b", "/abs", "a/", "../x"] {
			assert!(!is_plain_name(name), "{name}");
		}
	}

	#[test]
	fn temp_files_live_next_to_the_target() {
		let tmp = temp_path(Path::new("out/fat.img")).unwrap();
		assert_eq!(tmp.parent(), Some(Path::new("out")));
		assert!(tmp.file_name().unwrap().to_str().unwrap().starts_with(".fat.img."));
		assert!(temp_path(Path::new("/")).is_err());
	}

	#[test]
	fn system_time_round_trip() {
		let ts = CalendarTimestamp::new(2021, 7, 8, 9, 10, 12).unwrap();
		let time = to_system_time(ts).unwrap();
		assert_eq!(CalendarTimestamp::from_system_time(time), ts);
	}
}

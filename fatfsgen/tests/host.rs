//! Importing a host directory, writing the image file and extracting it
//! again.

use std::{
	env, fs,
	path::{Path, PathBuf},
	process,
	sync::atomic::{AtomicUsize, Ordering},
	time::{Duration, SystemTime},
};

use fatfsgen::{
	host, CalendarTimestamp, Error, ImageConfig, PartitionMode, SystemClock, Volume,
};

/// A fresh directory below the system temp directory, removed on drop.
struct Scratch(PathBuf);

impl Scratch {
	fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		let n = COUNTER.fetch_add(1, Ordering::Relaxed);
		let path = env::temp_dir().join(format!("fatfsgen-test-{}-{n}", process::id()));
		let _ = fs::remove_dir_all(&path);
		fs::create_dir_all(&path).unwrap();
		Self(path)
	}

	fn path(&self) -> &Path {
		&self.0
	}
}

impl Drop for Scratch {
	fn drop(&mut self) {
		let _ = fs::remove_dir_all(&self.0);
	}
}

fn populate(dir: &Path) -> SystemTime {
	// an even number of seconds survives the two-second resolution
	let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
	fs::create_dir_all(dir.join("sub/deeper")).unwrap();
	fs::create_dir_all(dir.join("empty")).unwrap();
	fs::write(dir.join("README.TXT"), b"top level").unwrap();
	fs::write(dir.join("sub/test.txt"), b"this is test").unwrap();
	fs::write(
		dir.join("sub/deeper/a rather long name.bin"),
		vec![7; 10_000],
	)
	.unwrap();
	for file in ["README.TXT", "sub/test.txt", "sub/deeper/a rather long name.bin"] {
		fs::File::options()
			.write(true)
			.open(dir.join(file))
			.unwrap()
			.set_modified(mtime)
			.unwrap();
	}
	mtime
}

fn config() -> ImageConfig {
	ImageConfig::default()
		.partition_size(2 << 20)
		.sector_size(512)
		.use_default_datetime(false)
}

#[test]
fn generate_and_extract() {
	let scratch = Scratch::new();
	let input = scratch.path().join("input");
	let mtime = populate(&input);
	let image_path = scratch.path().join("fat.img");
	host::generate(&input, &image_path, config()).unwrap();

	let image = fs::read(&image_path).unwrap();
	assert_eq!(image.len(), 2 << 20);
	let volume = Volume::mount(&image[..], PartitionMode::ReadOnly).unwrap();
	let names: Vec<_> = volume
		.read_dir("")
		.unwrap()
		.into_iter()
		.map(|e| e.name)
		.collect();
	// imported in name order
	assert_eq!(names, ["README.TXT", "empty", "sub"]);
	let stat = volume.stat_path("sub/test.txt").unwrap();
	assert_eq!(stat.modified, CalendarTimestamp::from_system_time(mtime));

	let output = scratch.path().join("output");
	host::extract(&image, &output).unwrap();
	assert_eq!(fs::read(output.join("README.TXT")).unwrap(), b"top level");
	assert_eq!(fs::read(output.join("sub/test.txt")).unwrap(), b"this is test");
	assert_eq!(
		fs::read(output.join("sub/deeper/a rather long name.bin")).unwrap(),
		vec![7; 10_000]
	);
	assert!(output.join("empty").is_dir());
	let extracted = fs::metadata(output.join("sub/test.txt"))
		.unwrap()
		.modified()
		.unwrap();
	assert_eq!(extracted, mtime);
}

#[test]
fn failed_builds_leave_no_file() {
	let scratch = Scratch::new();
	let input = scratch.path().join("input");
	fs::create_dir_all(&input).unwrap();
	fs::write(input.join("big.bin"), vec![0; 3 << 20]).unwrap();
	let image_path = scratch.path().join("fat.img");
	let result = host::generate(&input, &image_path, config());
	assert!(matches!(result, Err(Error::CapacityExceeded { .. })));
	assert!(!image_path.exists());
}

#[test]
fn short_names_only() {
	let scratch = Scratch::new();
	let input = scratch.path().join("input");
	fs::create_dir_all(&input).unwrap();
	fs::write(input.join("a very long name.txt"), b"").unwrap();
	let image_path = scratch.path().join("fat.img");
	let result = host::generate(&input, &image_path, config().long_names(false));
	assert!(matches!(result, Err(Error::LongNameRequired(_))));
	assert!(!image_path.exists());
}

fn leftovers(dir: &Path) -> Vec<String> {
	fs::read_dir(dir)
		.unwrap()
		.map(|e| e.unwrap().file_name().into_string().unwrap())
		.filter(|name| name.ends_with(".tmp"))
		.collect()
}

#[test]
fn write_image_replaces_and_cleans_up() {
	let scratch = Scratch::new();
	let path = scratch.path().join("out.img");
	host::write_image(&path, b"first").unwrap();
	host::write_image(&path, b"second").unwrap();
	assert_eq!(fs::read(&path).unwrap(), b"second");
	assert!(leftovers(scratch.path()).is_empty());

	// a file can't replace a non-empty directory
	let dir = scratch.path().join("dir");
	fs::create_dir(&dir).unwrap();
	fs::write(dir.join("keep.txt"), b"keep").unwrap();
	assert!(matches!(
		host::write_image(&dir, b"data"),
		Err(Error::Io(_))
	));
	assert_eq!(fs::read(dir.join("keep.txt")).unwrap(), b"keep");
	assert!(leftovers(scratch.path()).is_empty());

	// nowhere to put the temporary file
	let missing = scratch.path().join("missing/out.img");
	assert!(matches!(
		host::write_image(&missing, b"data"),
		Err(Error::Io(_))
	));
	assert_eq!(fs::read(&path).unwrap(), b"second");
}

#[cfg(unix)]
#[test]
fn write_image_never_writes_through_the_old_target() {
	let scratch = Scratch::new();
	let previous = scratch.path().join("previous.img");
	fs::write(&previous, b"previous image").unwrap();
	let path = scratch.path().join("out.img");
	std::os::unix::fs::symlink(&previous, &path).unwrap();

	host::write_image(&path, b"new image").unwrap();
	assert_eq!(fs::read(&path).unwrap(), b"new image");
	assert!(!fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
	assert_eq!(fs::read(&previous).unwrap(), b"previous image");
	assert!(leftovers(scratch.path()).is_empty());
}

#[test]
fn extract_stays_inside_the_output_dir() {
	let mut builder = fatfsgen::ImageBuilder::new(config(), &SystemClock);
	builder
		.add_file("abcdefghi/EVIL.TXT", b"payload".to_vec(), fatfsgen::FileOptions::default())
		.unwrap();
	let mut image = builder.build().unwrap();

	// rewrite the long name of the directory to ".."
	let layout = fatfsgen::layout::Layout::from_boot_sector(&image).unwrap();
	let slot = &mut image[layout.root_range()][..0x20];
	assert_eq!(slot[0], 0x41);
	let mut units = [0xFFFF_u16; 13];
	units[..3].copy_from_slice(&[u16::from(b'.'), u16::from(b'.'), 0]);
	let unit_offsets = (1..11).step_by(2).chain((14..26).step_by(2)).chain((28..32).step_by(2));
	for (offset, unit) in unit_offsets.zip(units) {
		slot[offset..offset + 2].copy_from_slice(&unit.to_le_bytes());
	}

	let scratch = Scratch::new();
	let output = scratch.path().join("out");
	host::extract(&image, &output).unwrap();
	assert!(!scratch.path().join("EVIL.TXT").exists());
	assert_eq!(
		fs::read(output.join("ABCDEF~1/EVIL.TXT")).unwrap(),
		b"payload"
	);
}

#[test]
fn build_time_is_used_without_host_times() {
	let mut builder = fatfsgen::ImageBuilder::new(config(), &SystemClock);
	builder
		.add_file("a.txt", Vec::new(), fatfsgen::FileOptions::default())
		.unwrap();
	let image = builder.build().unwrap();
	let volume = Volume::mount(&image[..], PartitionMode::ReadOnly).unwrap();
	let modified = volume.stat_path("a.txt").unwrap().modified;
	assert_ne!(modified, CalendarTimestamp::FAT_EPOCH);
}

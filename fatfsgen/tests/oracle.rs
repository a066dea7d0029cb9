//! Cross-checks against the `fatfs` crate: images built here must be
//! readable by it, and volumes it formats must be usable through `Volume`.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use fatfsgen::{
	fat::FatType, CalendarTimestamp, FileOptions, ImageBuilder, ImageConfig, OpenMode,
	PartitionMode, Volume,
};

fn timestamp() -> CalendarTimestamp {
	CalendarTimestamp::new(2021, 7, 8, 9, 10, 12).unwrap()
}

fn build(config: ImageConfig) -> Vec<u8> {
	let mut builder = ImageBuilder::new(config, &timestamp());
	builder
		.add_file("README.TXT", b"read me".to_vec(), FileOptions::default())
		.unwrap();
	builder
		.add_file("sub/test.txt", b"this is test".to_vec(), FileOptions::default())
		.unwrap();
	builder
		.add_file(
			"sub/deeper/A rather long file name.data",
			(0..20_000_u32).map(|i| i as u8).collect(),
			FileOptions::default().read_only(true),
		)
		.unwrap();
	builder.add_dir("empty", None).unwrap();
	builder.build().unwrap()
}

fn read_with_fatfs(fs: &fatfs::FileSystem<Cursor<Vec<u8>>>, path: &str) -> Vec<u8> {
	let mut content = Vec::new();
	fs.root_dir()
		.open_file(path)
		.unwrap()
		.read_to_end(&mut content)
		.unwrap();
	content
}

fn names(dir: fatfs::Dir<'_, Cursor<Vec<u8>>>) -> Vec<String> {
	dir.iter()
		.map(|e| e.unwrap().file_name())
		.filter(|name| name != "." && name != "..")
		.collect()
}

fn check_with_fatfs(image: Vec<u8>, fat_type: fatfs::FatType) {
	let fs = fatfs::FileSystem::new(Cursor::new(image), fatfs::FsOptions::new()).unwrap();
	assert_eq!(fs.fat_type(), fat_type);

	assert_eq!(names(fs.root_dir()), ["README.TXT", "sub", "empty"]);
	assert_eq!(
		names(fs.root_dir().open_dir("sub").unwrap()),
		["test.txt", "deeper"]
	);
	assert!(names(fs.root_dir().open_dir("empty").unwrap()).is_empty());

	assert_eq!(read_with_fatfs(&fs, "README.TXT"), b"read me");
	assert_eq!(read_with_fatfs(&fs, "sub/test.txt"), b"this is test");
	let long = read_with_fatfs(&fs, "sub/deeper/A rather long file name.data");
	assert_eq!(long.len(), 20_000);
	assert!(long.iter().enumerate().all(|(i, &b)| b == i as u8));

	let entry = fs
		.root_dir()
		.open_dir("sub")
		.unwrap()
		.iter()
		.map(Result::unwrap)
		.find(|e| e.file_name() == "test.txt")
		.unwrap();
	assert_eq!(entry.short_file_name(), "TEST~1.TXT");
	assert_eq!(entry.len(), 12);
	let modified = entry.modified();
	assert_eq!(
		(modified.date.year, modified.date.month, modified.date.day),
		(2021, 7, 8)
	);
	assert_eq!(
		(modified.time.hour, modified.time.min, modified.time.sec),
		(9, 10, 12)
	);
}

#[test]
fn fat12_images_are_readable() {
	check_with_fatfs(
		build(ImageConfig::default().sector_size(512)),
		fatfs::FatType::Fat12,
	);
}

#[test]
fn fat16_images_are_readable() {
	let config = ImageConfig::default()
		.sector_size(512)
		.partition_size(16 << 20)
		.fat_count(2);
	check_with_fatfs(build(config), fatfs::FatType::Fat16);
}

#[test]
fn fat32_images_are_readable() {
	let config = ImageConfig::default()
		.sector_size(512)
		.partition_size(64 << 20)
		.fat_type(FatType::Fat32);
	check_with_fatfs(build(config), fatfs::FatType::Fat32);
}

#[test]
fn modified_images_stay_readable() {
	let image = build(ImageConfig::default().sector_size(512));
	let mut volume = Volume::mount(image, PartitionMode::ReadWrite).unwrap();
	let mut file = volume.open("sub/new file.txt", OpenMode::Write).unwrap();
	volume.write(&mut file, &[b'x'; 3000]).unwrap();
	volume.create_dir("sub/made later").unwrap();
	let mut file = volume.open("README.TXT", OpenMode::Append).unwrap();
	volume.write(&mut file, b", please").unwrap();
	let image = volume.unmount();

	let fs = fatfs::FileSystem::new(Cursor::new(image), fatfs::FsOptions::new()).unwrap();
	assert_eq!(read_with_fatfs(&fs, "sub/new file.txt"), [b'x'; 3000]);
	assert_eq!(read_with_fatfs(&fs, "README.TXT"), b"read me, please");
	assert!(names(fs.root_dir().open_dir("sub/made later").unwrap()).is_empty());
}

fn format_with_fatfs(size: usize, fat_type: fatfs::FatType) -> Vec<u8> {
	let mut disk = Cursor::new(vec![0; size]);
	fatfs::format_volume(
		&mut disk,
		fatfs::FormatVolumeOptions::new().fat_type(fat_type),
	)
	.unwrap();
	disk.seek(SeekFrom::Start(0)).unwrap();
	{
		let fs = fatfs::FileSystem::new(&mut disk, fatfs::FsOptions::new()).unwrap();
		let root = fs.root_dir();
		root.create_file("hello.txt")
			.unwrap()
			.write_all(b"hello from fatfs")
			.unwrap();
		let docs = root.create_dir("docs").unwrap();
		docs.create_file("Notes About Things.md")
			.unwrap()
			.write_all(&[b'n'; 5000])
			.unwrap();
	}
	disk.into_inner()
}

fn check_foreign_volume(size: usize, fat_type: fatfs::FatType) {
	let image = format_with_fatfs(size, fat_type);
	let mut volume = Volume::mount(image, PartitionMode::ReadWrite).unwrap();
	assert_eq!(volume.read_file("hello.txt").unwrap(), b"hello from fatfs");
	assert_eq!(volume.read_file("HELLO.TXT").unwrap(), b"hello from fatfs");
	let listing = volume.read_dir("docs").unwrap();
	assert_eq!(listing.len(), 1);
	assert_eq!(listing[0].name, "Notes About Things.md");
	assert_eq!(listing[0].stat.size, 5000);
	assert_eq!(
		volume.read_file("docs/Notes About Things.md").unwrap(),
		[b'n'; 5000]
	);

	let mut file = volume.open("docs/from the shim.txt", OpenMode::Write).unwrap();
	volume.write(&mut file, b"written by the shim").unwrap();
	let image = volume.unmount();

	let fs = fatfs::FileSystem::new(Cursor::new(image), fatfs::FsOptions::new()).unwrap();
	assert_eq!(
		read_with_fatfs(&fs, "docs/from the shim.txt"),
		b"written by the shim"
	);
	assert_eq!(read_with_fatfs(&fs, "hello.txt"), b"hello from fatfs");
}

#[test]
fn fatfs_fat12_volumes_are_mountable() {
	check_foreign_volume(2 << 20, fatfs::FatType::Fat12);
}

#[test]
fn fatfs_fat16_volumes_are_mountable() {
	check_foreign_volume(16 << 20, fatfs::FatType::Fat16);
}

#[test]
fn fatfs_fat32_volumes_are_mountable() {
	check_foreign_volume(64 << 20, fatfs::FatType::Fat32);
}

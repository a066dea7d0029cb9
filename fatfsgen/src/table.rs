//! Reading and writing FAT entries and cluster chains in an image buffer.
//!
//! Reads use the first FAT; writes go to every copy.

use alloc::vec::Vec;

use crate::{
	error::{Error, Result},
	fat::{FatType, FREE_CLUSTER_MARK},
	layout::Layout,
	ClusterIdx, NONEXISTENT_CLUSTERS,
};

/// Reads entry `idx` of the first FAT.
pub fn get(image: &[u8], layout: &Layout, idx: ClusterIdx) -> ClusterIdx {
	let fat = &image[layout.fat_range(0)];
	let idx = idx as usize;
	match layout.fat_type {
		FatType::Fat12 => {
			let off = idx + idx / 2;
			let pair = u16::from_le_bytes([fat[off], fat[off + 1]]);
			ClusterIdx::from(if idx % 2 == 0 { pair & 0x0FFF } else { pair >> 4 })
		}
		FatType::Fat16 => ClusterIdx::from(u16::from_le_bytes([fat[2 * idx], fat[2 * idx + 1]])),
		FatType::Fat32 => {
			let mut raw = [0; 4];
			raw.copy_from_slice(&fat[4 * idx..4 * idx + 4]);
			u32::from_le_bytes(raw) & 0x0FFF_FFFF
		}
	}
}

/// Writes entry `idx` of every FAT. On FAT32 the top four bits of the
/// existing entry are kept.
pub fn set(image: &mut [u8], layout: &Layout, idx: ClusterIdx, value: ClusterIdx) {
	for copy in 0..layout.fat_count {
		let fat = &mut image[layout.fat_range(copy)];
		let idx = idx as usize;
		match layout.fat_type {
			FatType::Fat12 => {
				let off = idx + idx / 2;
				let old = u16::from_le_bytes([fat[off], fat[off + 1]]);
				let value = value as u16 & 0x0FFF;
				let new = if idx % 2 == 0 {
					old & 0xF000 | value
				} else {
					old & 0x000F | value << 4
				};
				fat[off..off + 2].copy_from_slice(&new.to_le_bytes());
			}
			FatType::Fat16 => {
				fat[2 * idx..2 * idx + 2].copy_from_slice(&(value as u16).to_le_bytes());
			}
			FatType::Fat32 => {
				let slot = &mut fat[4 * idx..4 * idx + 4];
				let mut raw = [0; 4];
				raw.copy_from_slice(slot);
				let new = u32::from_le_bytes(raw) & 0xF000_0000 | value & 0x0FFF_FFFF;
				slot.copy_from_slice(&new.to_le_bytes());
			}
		}
	}
}

/// Follows the chain starting at `first`. A `first` of 0 is an empty chain.
///
/// # Errors
/// [`Error::Corrupted`] if the chain leaves the heap, hits a free or bad
/// cluster, or loops.
pub fn chain(image: &[u8], layout: &Layout, first: ClusterIdx) -> Result<Vec<ClusterIdx>> {
	let mut clusters = Vec::new();
	if first == FREE_CLUSTER_MARK {
		return Ok(clusters);
	}
	let mut cluster = first;
	loop {
		if !layout.is_valid_cluster(cluster) {
			return Err(Error::Corrupted("cluster chain leaves the heap"));
		}
		if clusters.len() >= layout.cluster_count as usize {
			return Err(Error::Corrupted("cluster chain loops"));
		}
		clusters.push(cluster);
		let next = get(image, layout, cluster);
		if layout.fat_type.is_end_of_alloc(next) {
			return Ok(clusters);
		}
		if next == FREE_CLUSTER_MARK || next == layout.fat_type.bad_cluster_mark() {
			return Err(Error::Corrupted("cluster chain runs into a free or bad cluster"));
		}
		cluster = next;
	}
}

/// Links `clusters` into one chain ending with an end-of-allocation mark.
pub fn link(image: &mut [u8], layout: &Layout, clusters: &[ClusterIdx]) {
	for pair in clusters.windows(2) {
		set(image, layout, pair[0], pair[1]);
	}
	if let Some(&last) = clusters.last() {
		set(image, layout, last, layout.fat_type.canon_end_of_alloc_mark());
	}
}

/// Marks every cluster of a chain as free.
pub fn free(image: &mut [u8], layout: &Layout, first: ClusterIdx) -> Result<()> {
	for cluster in chain(image, layout, first)? {
		set(image, layout, cluster, FREE_CLUSTER_MARK);
	}
	Ok(())
}

pub fn free_count(image: &[u8], layout: &Layout) -> u32 {
	heap_clusters(layout)
		.filter(|&c| get(image, layout, c) == FREE_CLUSTER_MARK)
		.count() as u32
}

fn heap_clusters(layout: &Layout) -> impl Iterator<Item = ClusterIdx> {
	NONEXISTENT_CLUSTERS..layout.cluster_count + NONEXISTENT_CLUSTERS
}

/// Allocates `count` free clusters, searching from `hint` onwards and then
/// wrapping around, and links them into a chain. The clusters are not
/// zeroed.
///
/// # Errors
/// [`Error::CapacityExceeded`] if there are fewer than `count` free
/// clusters; the FAT is left unchanged.
pub fn allocate(
	image: &mut [u8],
	layout: &Layout,
	count: usize,
	hint: ClusterIdx,
) -> Result<Vec<ClusterIdx>> {
	let hint = if layout.is_valid_cluster(hint) {
		hint
	} else {
		NONEXISTENT_CLUSTERS
	};
	let clusters: Vec<ClusterIdx> = (hint..layout.cluster_count + NONEXISTENT_CLUSTERS)
		.chain(NONEXISTENT_CLUSTERS..hint)
		.filter(|&c| get(image, layout, c) == FREE_CLUSTER_MARK)
		.take(count)
		.collect();
	if clusters.len() < count {
		let cluster_size = layout.cluster_size() as u64;
		return Err(Error::CapacityExceeded {
			required: count as u64 * cluster_size,
			available: clusters.len() as u64 * cluster_size,
		});
	}
	link(image, layout, &clusters);
	Ok(clusters)
}

#[cfg(test)]
mod tests {
	use alloc::vec;

	use super::*;
	use crate::image::ImageConfig;

	fn blank(config: &ImageConfig) -> (Vec<u8>, Layout) {
		let layout = Layout::compute(config).unwrap();
		(vec![0; config.partition_size as usize], layout)
	}

	#[test]
	fn fat12_entries_share_bytes() {
		let (mut image, layout) = blank(&ImageConfig::default());
		assert_eq!(layout.fat_type, FatType::Fat12);
		set(&mut image, &layout, 2, 0xABC);
		set(&mut image, &layout, 3, 0x123);
		assert_eq!(get(&image, &layout, 2), 0xABC);
		assert_eq!(get(&image, &layout, 3), 0x123);
		let fat = &image[layout.fat_range(0)];
		assert_eq!(fat[3..6], [0xBC, 0x3A, 0x12]);
	}

	#[test]
	fn writes_reach_every_copy() {
		let config = ImageConfig::default().sector_size(512).fat_count(2);
		let (mut image, layout) = blank(&config);
		set(&mut image, &layout, 5, 0x0FFF);
		assert_eq!(
			image[layout.fat_range(0)],
			image[layout.fat_range(1)]
		);
	}

	#[test]
	fn fat32_keeps_reserved_bits() {
		let config = ImageConfig::default()
			.sector_size(512)
			.partition_size(64 << 20);
		let (mut image, layout) = blank(&config);
		assert_eq!(layout.fat_type, FatType::Fat32);
		let off = layout.fat_range(0).start + 4 * 7;
		image[off + 3] = 0xF0;
		set(&mut image, &layout, 7, 0x0123_4567);
		assert_eq!(get(&image, &layout, 7), 0x0123_4567);
		assert_eq!(image[off + 3], 0xF1);
	}

	#[test]
	fn allocation_and_chains() {
		let (mut image, layout) = blank(&ImageConfig::default());
		let first = allocate(&mut image, &layout, 3, 0).unwrap();
		assert_eq!(first, [2, 3, 4]);
		let second = allocate(&mut image, &layout, 2, 3).unwrap();
		assert_eq!(second, [5, 6]);
		assert_eq!(chain(&image, &layout, 2).unwrap(), [2, 3, 4]);
		assert!(chain(&image, &layout, 0).unwrap().is_empty());

		free(&mut image, &layout, 2).unwrap();
		assert_eq!(free_count(&image, &layout), layout.cluster_count - 2);
		// wraps around to the freed clusters
		let last = layout.cluster_count + 1;
		let third = allocate(&mut image, &layout, 2, last).unwrap();
		assert_eq!(third, [last, 2]);
		assert_eq!(chain(&image, &layout, last).unwrap(), [last, 2]);
	}

	#[test]
	fn allocation_failure_leaves_the_fat_alone() {
		let (mut image, layout) = blank(&ImageConfig::default());
		let before = image.clone();
		let result = allocate(&mut image, &layout, layout.cluster_count as usize + 1, 2);
		assert!(matches!(result, Err(Error::CapacityExceeded { .. })));
		assert!(image == before);
	}

	#[test]
	fn corrupted_chains() {
		let (mut image, layout) = blank(&ImageConfig::default());
		set(&mut image, &layout, 2, 3);
		set(&mut image, &layout, 3, 2);
		assert!(matches!(chain(&image, &layout, 2), Err(Error::Corrupted(_))));
		set(&mut image, &layout, 3, 0);
		assert!(matches!(chain(&image, &layout, 2), Err(Error::Corrupted(_))));
		assert!(matches!(chain(&image, &layout, 1), Err(Error::Corrupted(_))));
	}
}

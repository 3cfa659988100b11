// Amiga Rigid Disk Block partition lists

use core::fmt;

use gpt_disk_io::BlockIo;

use crate::device::{BlockDevice, MAX_BLOCK_SIZE};
use crate::error::{BlkError, Result};
use crate::part::{PartitionInfo, BOOT_PART_TYPE};
use crate::types::FixedStr;

/// The RDSK block may sit anywhere in the first 16 blocks.
const RDB_SEARCH_LIMIT: u64 = 16;

/// End marker of the PART chain
const CHAIN_END: u32 = 0xFFFF_FFFF;

/// Bound on chain walks; a malformed chain must not loop forever.
const MAX_CHAIN: u32 = 64;

/// PART flags bit 0: partition is bootable
const FLAG_BOOTABLE: u32 = 1;

/// Offset of the DosEnvec longword table inside a PART block
const ENVEC_OFFSET: usize = 128;

fn be32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Big-endian longword sum over the block's own declared length is zero
/// for intact RDSK/PART blocks.
fn checksum_ok(block: &[u8]) -> bool {
    let longs = be32(block, 4) as usize;
    if longs == 0 || longs * 4 > block.len() {
        return false;
    }
    let mut sum: u32 = 0;
    for i in 0..longs {
        sum = sum.wrapping_add(be32(block, i * 4));
    }
    sum == 0
}

fn blksz_ok(blksz: u32) -> bool {
    (512..=MAX_BLOCK_SIZE as u32).contains(&blksz)
}

fn find_rdb<B: BlockIo>(dev: &mut BlockDevice<B>, block: &mut [u8]) -> Result<()> {
    for lba in 0..RDB_SEARCH_LIMIT {
        if dev.read_blocks(lba, block).is_err() {
            continue;
        }
        if block[0..4] == *b"RDSK" && checksum_ok(block) {
            return Ok(());
        }
    }
    Err(BlkError::Unsupported)
}

pub(crate) fn probe<B: BlockIo>(dev: &mut BlockDevice<B>) -> bool {
    if !blksz_ok(dev.blksz) {
        return false;
    }
    let mut buf = [0u8; MAX_BLOCK_SIZE];
    let blksz = dev.blksz as usize;
    find_rdb(dev, &mut buf[..blksz]).is_ok()
}

pub(crate) fn get_info<B: BlockIo>(dev: &mut BlockDevice<B>, part: u32) -> Result<PartitionInfo> {
    if part == 0 || !blksz_ok(dev.blksz) {
        return Err(BlkError::PartitionNotFound);
    }
    let blksz = dev.blksz;
    let mut buf = [0u8; MAX_BLOCK_SIZE];
    let block = &mut buf[..blksz as usize];

    find_rdb(dev, block)?;
    let mut next = be32(block, 28); // partition list head

    let mut num = 1u32;
    let mut steps = 0u32;
    while next != CHAIN_END && steps < MAX_CHAIN {
        dev.read_blocks(next as u64, block)?;
        if block[0..4] != *b"PART" || !checksum_ok(block) {
            return Err(BlkError::PartitionNotFound);
        }
        if num == part {
            return Ok(partition_info(blksz, block));
        }
        next = be32(block, 16);
        num += 1;
        steps += 1;
    }

    Err(BlkError::PartitionNotFound)
}

fn partition_info(blksz: u32, block: &[u8]) -> PartitionInfo {
    let flags = be32(block, 20);

    // BCPL drive name: length byte then characters
    let name_len = (block[36] as usize).min(31);
    let name = core::str::from_utf8(&block[37..37 + name_len]).unwrap_or("");

    // DosEnvec longwords: surfaces, blocks per track, low/high cylinder
    let envec = |i: usize| be32(block, ENVEC_OFFSET + i * 4) as u64;
    let surfaces = envec(3);
    let blocks_per_track = envec(5);
    let low_cyl = envec(9);
    let high_cyl = envec(10);

    let mut info = PartitionInfo::empty();
    info.start = low_cyl * surfaces * blocks_per_track;
    info.size = (high_cyl.saturating_sub(low_cyl) + 1) * surfaces * blocks_per_track;
    info.blksz = blksz;
    info.bootable = flags & FLAG_BOOTABLE != 0;
    info.name = FixedStr::from_str(name);
    info.type_name = FixedStr::from_str(BOOT_PART_TYPE);
    info
}

pub(crate) fn print<B: BlockIo, W: fmt::Write>(
    w: &mut W,
    dev: &mut BlockDevice<B>,
) -> fmt::Result {
    writeln!(w, "Part\tStart Block\tNum Blocks\tBoot\tName")?;
    let mut part = 1u32;
    while let Ok(info) = get_info(dev, part) {
        writeln!(
            w,
            "{:3}\t{:<10}\t{:<10}\t{}\t{}",
            part,
            info.start,
            info.size,
            if info.bootable { "*" } else { " " },
            info.name
        )?;
        part += 1;
    }
    Ok(())
}

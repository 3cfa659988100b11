// Apple Partition Map

use core::fmt;

use gpt_disk_io::BlockIo;

use crate::device::{BlockDevice, MAX_BLOCK_SIZE};
use crate::error::{BlkError, Result};
use crate::part::{PartitionInfo, BOOT_PART_TYPE};
use crate::types::FixedStr;

/// Driver Descriptor Map signature "ER" at block 0
const DDM_SIGNATURE: u16 = 0x4552;

/// Partition map entry signature "PM"
const PM_SIGNATURE: u16 = 0x504D;

fn be16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn be32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn blksz_ok(blksz: u32) -> bool {
    (512..=MAX_BLOCK_SIZE as u32).contains(&blksz)
}

pub(crate) fn probe<B: BlockIo>(dev: &mut BlockDevice<B>) -> bool {
    if !blksz_ok(dev.blksz) {
        return false;
    }
    let mut buf = [0u8; MAX_BLOCK_SIZE];
    let block = &mut buf[..dev.blksz as usize];
    if dev.read_blocks(0, block).is_err() || be16(block, 0) != DDM_SIGNATURE {
        return false;
    }
    if dev.read_blocks(1, block).is_err() {
        return false;
    }
    be16(block, 0) == PM_SIGNATURE
}

/// Entry `part` lives in block `part`; the map describes its own length
/// in every entry.
pub(crate) fn get_info<B: BlockIo>(dev: &mut BlockDevice<B>, part: u32) -> Result<PartitionInfo> {
    if part == 0 || !blksz_ok(dev.blksz) {
        return Err(BlkError::PartitionNotFound);
    }
    let mut buf = [0u8; MAX_BLOCK_SIZE];
    let block = &mut buf[..dev.blksz as usize];
    dev.read_blocks(part as u64, block)?;
    if be16(block, 0) != PM_SIGNATURE {
        return Err(BlkError::PartitionNotFound);
    }
    let map_entries = be32(block, 4);
    if part > map_entries {
        return Err(BlkError::PartitionNotFound);
    }

    let mut info = PartitionInfo::empty();
    info.start = be32(block, 8) as u64;
    info.size = be32(block, 12) as u64;
    info.blksz = dev.blksz;
    info.name = FixedStr::from_bytes(&block[16..48]);
    info.type_name = FixedStr::from_str(BOOT_PART_TYPE);
    Ok(info)
}

pub(crate) fn print<B: BlockIo, W: fmt::Write>(
    w: &mut W,
    dev: &mut BlockDevice<B>,
) -> fmt::Result {
    writeln!(w, "Part\tStart Block\tNum Blocks\tName")?;
    let mut part = 1u32;
    while let Ok(info) = get_info(dev, part) {
        writeln!(
            w,
            "{:3}\t{:<10}\t{:<10}\t{}",
            part, info.start, info.size, info.name
        )?;
        part += 1;
    }
    Ok(())
}

// DOS/MBR partition tables, including extended partition chains

use core::fmt;
use core::fmt::Write as _;

use gpt_disk_io::BlockIo;

use crate::device::{BlockDevice, MAX_BLOCK_SIZE};
use crate::error::{BlkError, Result};
use crate::part::{generic_name, PartitionInfo, BOOT_PART_TYPE};
use crate::types::FixedStr;

const SIGNATURE_OFFSET: usize = 510;
const TABLE_OFFSET: usize = 446;
const ENTRY_SIZE: usize = 16;
const DISKSIG_OFFSET: usize = 440;
const PBR_FAT_OFFSET: usize = 0x36;
const PBR_FAT32_OFFSET: usize = 0x52;

/// EBR chains on a malformed disk can loop; stop descending eventually.
const MAX_EBR_DEPTH: u32 = 64;

#[derive(Clone, Copy)]
struct Entry {
    boot: u8,
    sys: u8,
    start: u32,
    size: u32,
}

impl Entry {
    fn from_bytes(data: &[u8]) -> Self {
        Self {
            boot: data[0],
            sys: data[4],
            start: u32::from_le_bytes([data[8], data[9], data[10], data[11]]),
            size: u32::from_le_bytes([data[12], data[13], data[14], data[15]]),
        }
    }
}

fn entry_at(sector: &[u8], idx: usize) -> Entry {
    let off = TABLE_OFFSET + idx * ENTRY_SIZE;
    Entry::from_bytes(&sector[off..off + ENTRY_SIZE])
}

fn has_signature(sector: &[u8]) -> bool {
    sector[SIGNATURE_OFFSET] == 0x55 && sector[SIGNATURE_OFFSET + 1] == 0xAA
}

/// Filesystem boot sector rather than an MBR (a "superfloppy"). Those
/// carry the same 0xAA55 signature but no partition table.
fn is_pbr(sector: &[u8]) -> bool {
    sector[PBR_FAT_OFFSET..PBR_FAT_OFFSET + 3] == *b"FAT"
        || sector[PBR_FAT32_OFFSET..PBR_FAT32_OFFSET + 5] == *b"FAT32"
}

fn is_extended(sys: u8) -> bool {
    matches!(sys, 0x05 | 0x0F | 0x85)
}

fn blksz_ok(blksz: u32) -> bool {
    (512..=MAX_BLOCK_SIZE as u32).contains(&blksz)
}

pub(crate) fn probe<B: BlockIo>(dev: &mut BlockDevice<B>) -> bool {
    if !blksz_ok(dev.blksz) {
        return false;
    }
    let mut buf = [0u8; MAX_BLOCK_SIZE];
    let sector = &mut buf[..dev.blksz as usize];
    if dev.read_blocks(0, sector).is_err() {
        return false;
    }
    has_signature(sector) && !is_pbr(sector)
}

pub(crate) fn get_info<B: BlockIo>(dev: &mut BlockDevice<B>, part: u32) -> Result<PartitionInfo> {
    if part == 0 || !blksz_ok(dev.blksz) {
        return Err(BlkError::PartitionNotFound);
    }
    get_info_extended(dev, 0, 0, 1, part, 0, 0)
}

/// Walk one MBR/EBR sector.
///
/// `ext_part_sector` is the absolute sector holding the table currently
/// examined (0 for the MBR itself); `relative` is the start of the
/// outermost extended partition, which EBR chain links are relative to.
/// Numbering uses fdisk's slot-count rule: every non-empty MBR slot
/// consumes a number, while inside EBRs only real (non-extended) entries
/// do.
fn get_info_extended<B: BlockIo>(
    dev: &mut BlockDevice<B>,
    ext_part_sector: u64,
    relative: u64,
    mut part_num: u32,
    which_part: u32,
    mut disksig: u32,
    depth: u32,
) -> Result<PartitionInfo> {
    if depth > MAX_EBR_DEPTH {
        return Err(BlkError::PartitionNotFound);
    }

    let blksz = dev.blksz;
    let mut buf = [0u8; MAX_BLOCK_SIZE];
    let sector = &mut buf[..blksz as usize];
    dev.read_blocks(ext_part_sector, sector)?;
    if !has_signature(sector) {
        return Err(BlkError::PartitionNotFound);
    }
    if ext_part_sector == 0 {
        disksig = u32::from_le_bytes([
            sector[DISKSIG_OFFSET],
            sector[DISKSIG_OFFSET + 1],
            sector[DISKSIG_OFFSET + 2],
            sector[DISKSIG_OFFSET + 3],
        ]);
    }

    for i in 0..4 {
        let entry = entry_at(sector, i);
        if (entry.boot & !0x80) == 0
            && entry.sys != 0
            && part_num == which_part
            && !is_extended(entry.sys)
        {
            let mut info = PartitionInfo::empty();
            info.blksz = blksz;
            info.start = ext_part_sector + entry.start as u64;
            info.size = entry.size as u64;
            info.bootable = entry.boot == 0x80;
            info.name = generic_name(dev.if_type, dev.devnum, part_num);
            info.type_name = FixedStr::from_str(BOOT_PART_TYPE);
            let mut uuid = FixedStr::new();
            let _ = write!(uuid, "{:08x}-{:02x}", disksig, part_num);
            info.uuid = Some(uuid);
            return Ok(info);
        }
        // Slot-count numbering rule (see above).
        if (ext_part_sector == 0 && entry.sys != 0)
            || (entry.sys != 0 && !is_extended(entry.sys))
        {
            part_num += 1;
        }
    }

    // Follow the extended partition, if any
    for i in 0..4 {
        let entry = entry_at(sector, i);
        if is_extended(entry.sys) {
            let lba_start = entry.start as u64 + relative;
            let next_relative = if ext_part_sector == 0 { lba_start } else { relative };
            return get_info_extended(
                dev,
                lba_start,
                next_relative,
                part_num,
                which_part,
                disksig,
                depth + 1,
            );
        }
    }

    Err(BlkError::PartitionNotFound)
}

pub(crate) fn print<B: BlockIo, W: fmt::Write>(
    w: &mut W,
    dev: &mut BlockDevice<B>,
) -> fmt::Result {
    writeln!(w, "Part\tStart Sector\tNum Sectors\tUUID\t\tType")?;
    for part in 1..=crate::part::MAX_SEARCH_PARTITIONS {
        let info = match get_info(dev, part) {
            Ok(info) => info,
            Err(_) => continue,
        };
        writeln!(
            w,
            "{:3}\t{:<10}\t{:<10}\t{}{}",
            part,
            info.start,
            info.size,
            info.uuid.unwrap_or_default(),
            if info.bootable { "\tBoot" } else { "" }
        )?;
    }
    Ok(())
}

// ISO9660 partitions: El Torito boot catalog entries

use core::fmt;
use core::fmt::Write as _;

use gpt_disk_io::BlockIo;

use crate::device::BlockDevice;
use crate::error::{BlkError, Result};
use crate::part::{PartitionInfo, BOOT_PART_TYPE};
use crate::types::FixedStr;

/// ISO9660 sector size; devices with any other block size cannot carry
/// this format.
const SECTOR_SIZE: u32 = 2048;

/// Volume descriptor set starts at sector 16
const VOLUME_DESCRIPTOR_START: u64 = 16;

/// Safety limit on the descriptor set length
const MAX_DESCRIPTORS: u64 = 100;

const EL_TORITO: &[u8; 23] = b"EL TORITO SPECIFICATION";

fn descriptor_valid(buf: &[u8]) -> bool {
    buf[1..6] == *b"CD001" && buf[6] == 1
}

pub(crate) fn probe<B: BlockIo>(dev: &mut BlockDevice<B>) -> bool {
    if dev.blksz != SECTOR_SIZE {
        return false;
    }
    let mut buf = [0u8; SECTOR_SIZE as usize];
    if dev.read_blocks(VOLUME_DESCRIPTOR_START, &mut buf).is_err() {
        return false;
    }
    // the first descriptor must be the primary volume descriptor
    buf[0] == 1 && descriptor_valid(&buf)
}

/// Locate the El Torito boot catalog by scanning the descriptor set.
fn boot_catalog_lba<B: BlockIo>(dev: &mut BlockDevice<B>, buf: &mut [u8]) -> Result<u64> {
    dev.read_blocks(VOLUME_DESCRIPTOR_START, buf)?;
    if !(buf[0] == 1 && descriptor_valid(buf)) {
        return Err(BlkError::Unsupported);
    }

    let mut sector = VOLUME_DESCRIPTOR_START + 1;
    loop {
        dev.read_blocks(sector, buf)?;
        if !descriptor_valid(buf) {
            return Err(BlkError::Unsupported);
        }
        match buf[0] {
            0 => {
                // Boot record; only El Torito ones carry a catalog
                if buf[7..7 + EL_TORITO.len()] == *EL_TORITO {
                    let lba = u32::from_le_bytes([buf[71], buf[72], buf[73], buf[74]]);
                    return Ok(lba as u64);
                }
            }
            255 => return Err(BlkError::Unsupported),
            _ => {}
        }
        sector += 1;
        if sector - VOLUME_DESCRIPTOR_START > MAX_DESCRIPTORS {
            return Err(BlkError::Unsupported);
        }
    }
}

/// 16-bit word sum of the 32-byte validation entry must be zero.
fn validation_entry_ok(buf: &[u8]) -> bool {
    if buf[0] != 0x01 || buf[30] != 0x55 || buf[31] != 0xAA {
        return false;
    }
    let mut sum: u16 = 0;
    let mut i = 0;
    while i < 32 {
        sum = sum.wrapping_add(u16::from_le_bytes([buf[i], buf[i + 1]]));
        i += 2;
    }
    sum == 0
}

fn catalog_entry_info(part: u32, entry: &[u8]) -> PartitionInfo {
    let sector_count = u16::from_le_bytes([entry[6], entry[7]]) as u64;
    let load_rba = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]) as u64;

    let mut info = PartitionInfo::empty();
    info.start = load_rba;
    // catalog counts virtual 512-byte sectors; expose device blocks
    info.size = (sector_count + 3) / 4;
    info.blksz = SECTOR_SIZE;
    info.bootable = entry[0] == 0x88;
    info.type_name = FixedStr::from_str(BOOT_PART_TYPE);
    let mut name = FixedStr::new();
    let _ = write!(name, "cd{}", part);
    info.name = name;
    info
}

pub(crate) fn get_info<B: BlockIo>(dev: &mut BlockDevice<B>, part: u32) -> Result<PartitionInfo> {
    if part == 0 {
        return Err(BlkError::PartitionNotFound);
    }
    if dev.blksz != SECTOR_SIZE {
        return Err(BlkError::Unsupported);
    }

    let mut buf = [0u8; SECTOR_SIZE as usize];
    let catalog = boot_catalog_lba(dev, &mut buf)?;
    dev.read_blocks(catalog, &mut buf)?;
    if !validation_entry_ok(&buf) {
        return Err(BlkError::Unsupported);
    }

    // Entry 1 is the initial/default entry right after validation
    if part == 1 {
        return Ok(catalog_entry_info(1, &buf[32..64]));
    }

    // Later entries live in sections: a header, then its boot entries
    let mut part_num = 1u32;
    let mut offset = 64usize;
    while offset + 32 <= buf.len() {
        let header_id = buf[offset];
        if header_id != 0x90 && header_id != 0x91 {
            break;
        }
        let last_section = header_id == 0x91;
        let count = u16::from_le_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
        offset += 32;
        for _ in 0..count {
            if offset + 32 > buf.len() {
                return Err(BlkError::PartitionNotFound);
            }
            part_num += 1;
            if part_num == part {
                return Ok(catalog_entry_info(part, &buf[offset..offset + 32]));
            }
            offset += 32;
        }
        if last_section {
            break;
        }
    }

    Err(BlkError::PartitionNotFound)
}

pub(crate) fn print<B: BlockIo, W: fmt::Write>(
    w: &mut W,
    dev: &mut BlockDevice<B>,
) -> fmt::Result {
    writeln!(w, "Part\tStart Sector\tNum Sectors\tBoot")?;
    let mut part = 1u32;
    while let Ok(info) = get_info(dev, part) {
        writeln!(
            w,
            "{:3}\t{:<10}\t{:<10}\t{}",
            part,
            info.start,
            info.size,
            if info.bootable { "*" } else { " " }
        )?;
        part += 1;
    }
    Ok(())
}

// EFI/GPT partition tables using gpt-disk-rs

use core::fmt;
use core::fmt::Write as _;

use gpt_disk_io::{BlockIo, Disk};
use gpt_disk_types::GptPartitionEntry;

use crate::device::{BlockDevice, IoRef, MAX_BLOCK_SIZE};
use crate::error::{BlkError, Result};
use crate::part::{PartitionInfo, BOOT_PART_TYPE};
use crate::types::FixedStr;

/// Legacy BIOS bootable bit of the entry attributes.
const LEGACY_BIOS_BOOTABLE: u64 = 1 << 2;

fn blksz_ok(blksz: u32) -> bool {
    (512..=MAX_BLOCK_SIZE as u32).contains(&blksz)
}

pub(crate) fn probe<B: BlockIo>(dev: &mut BlockDevice<B>) -> bool {
    if !blksz_ok(dev.blksz) {
        return false;
    }
    let blksz = dev.blksz as usize;
    let mut disk = match Disk::new(IoRef(&mut dev.io)) {
        Ok(d) => d,
        Err(_) => return false,
    };
    let mut block_buf = [0u8; MAX_BLOCK_SIZE];
    match disk.read_primary_gpt_header(&mut block_buf[..blksz]) {
        Ok(header) => header.is_signature_valid(),
        Err(_) => false,
    }
}

pub(crate) fn get_info<B: BlockIo>(dev: &mut BlockDevice<B>, part: u32) -> Result<PartitionInfo> {
    if part == 0 {
        return Err(BlkError::PartitionNotFound);
    }
    if !blksz_ok(dev.blksz) {
        return Err(BlkError::Unsupported);
    }
    let blksz = dev.blksz;

    let mut disk = Disk::new(IoRef(&mut dev.io)).map_err(|_| BlkError::IoError)?;
    let mut header_buf = [0u8; MAX_BLOCK_SIZE];
    let header = disk
        .read_primary_gpt_header(&mut header_buf[..blksz as usize])
        .map_err(|_| BlkError::Unsupported)?;
    if !header.is_signature_valid() {
        return Err(BlkError::Unsupported);
    }

    let layout = header
        .get_partition_entry_array_layout()
        .map_err(|_| BlkError::Unsupported)?;
    if part > layout.num_entries {
        return Err(BlkError::PartitionNotFound);
    }

    let mut entry_buf = [0u8; MAX_BLOCK_SIZE];
    let iter = disk
        .gpt_partition_entry_array_iter(layout, &mut entry_buf[..blksz as usize])
        .map_err(|_| BlkError::IoError)?;

    for (index, entry_result) in iter.enumerate() {
        if index as u32 + 1 != part {
            continue;
        }
        let entry = entry_result.map_err(|_| BlkError::IoError)?;
        if !entry.is_used() {
            return Err(BlkError::PartitionNotFound);
        }
        return Ok(fill_info(blksz, &entry));
    }

    Err(BlkError::PartitionNotFound)
}

fn fill_info(blksz: u32, entry: &GptPartitionEntry) -> PartitionInfo {
    let start = entry.starting_lba.to_u64();

    let mut info = PartitionInfo::empty();
    info.start = start;
    info.size = entry.ending_lba.to_u64().saturating_sub(start) + 1;
    info.blksz = blksz;
    info.bootable = entry.attributes.0.to_u64() & LEGACY_BIOS_BOOTABLE != 0;
    info.type_name = FixedStr::from_str(BOOT_PART_TYPE);

    // UCS-2 name, ASCII subset only
    let mut name = FixedStr::<32>::new();
    for c in entry.name.0.iter() {
        let c = u16::from(*c);
        if c == 0 {
            break;
        }
        if c < 128 {
            let _ = name.write_char(c as u8 as char);
        }
    }
    info.name = name;

    let mut uuid = FixedStr::new();
    let unique_partition_guid = entry.unique_partition_guid;
    let _ = write!(uuid, "{}", unique_partition_guid);
    info.uuid = Some(uuid);

    let mut type_guid = FixedStr::new();
    let partition_type_guid = entry.partition_type_guid;
    let _ = write!(type_guid, "{}", partition_type_guid.0);
    info.type_guid = Some(type_guid);

    info
}

pub(crate) fn print<B: BlockIo, W: fmt::Write>(
    w: &mut W,
    dev: &mut BlockDevice<B>,
) -> fmt::Result {
    writeln!(w, "Part\tStart LBA\tEnd LBA\t\tName")?;
    let mut part = 1u32;
    loop {
        match get_info(dev, part) {
            Ok(info) => {
                writeln!(
                    w,
                    "{:3}\t{:#x}\t{:#x}\t{}",
                    part,
                    info.start,
                    info.start + info.size - 1,
                    info.name
                )?;
                if let Some(uuid) = info.uuid {
                    writeln!(w, "\tguid:\t{}", uuid)?;
                }
            }
            Err(BlkError::PartitionNotFound) => {
                // holes are legal in the entry array; stop at the range end
                if part >= 128 {
                    break;
                }
            }
            Err(_) => break,
        }
        part += 1;
        if part > 128 {
            break;
        }
    }
    Ok(())
}

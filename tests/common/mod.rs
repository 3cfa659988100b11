//! Common test utilities: an in-memory block device, a device registry
//! and raw disk image builders for each table format.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::io;

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use bootblk::{BlkError, BlockDevice, DeviceRegistry, InterfaceType};

/// In-memory block device for testing
#[derive(Debug, Clone)]
pub struct MemoryBlockDevice {
    pub data: Vec<u8>,
    pub block_size: usize,
}

impl MemoryBlockDevice {
    pub fn new(data: Vec<u8>, block_size: usize) -> Self {
        Self { data, block_size }
    }
}

impl BlockIo for MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        BlockSize::new(self.block_size as u32).expect("valid block size")
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        Ok((self.data.len() / self.block_size) as u64)
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + dst.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read beyond end of device",
            ));
        }
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        Ok(())
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        let offset = start_lba.0 as usize * self.block_size;
        if offset + src.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write beyond end of device",
            ));
        }
        self.data[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// Lets gpt_disk_io::Disk take the device without consuming it.
impl BlockIo for &mut MemoryBlockDevice {
    type Error = io::Error;

    fn block_size(&self) -> BlockSize {
        (**self).block_size()
    }

    fn num_blocks(&mut self) -> Result<u64, Self::Error> {
        (**self).num_blocks()
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_blocks(start_lba, dst)
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> Result<(), Self::Error> {
        (**self).write_blocks(start_lba, src)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }
}

/// Wrap raw image bytes in a device descriptor.
pub fn make_device(
    data: Vec<u8>,
    block_size: usize,
    if_type: InterfaceType,
    devnum: u32,
) -> BlockDevice<MemoryBlockDevice> {
    let lba = (data.len() / block_size) as u64;
    BlockDevice::new(
        MemoryBlockDevice::new(data, block_size),
        if_type,
        devnum,
        block_size as u32,
        lba,
    )
}

/// Registry keyed by (interface name, device number, hardware partition).
pub struct TestRegistry {
    devices: Vec<(String, u32, u32, BlockDevice<MemoryBlockDevice>)>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self { devices: Vec::new() }
    }

    pub fn add(
        &mut self,
        ifname: &str,
        devnum: u32,
        hwpart: u32,
        dev: BlockDevice<MemoryBlockDevice>,
    ) {
        self.devices.push((ifname.to_string(), devnum, hwpart, dev));
    }

    pub fn single(ifname: &str, dev: BlockDevice<MemoryBlockDevice>) -> Self {
        let mut reg = Self::new();
        reg.add(ifname, 0, 0, dev);
        reg
    }
}

impl DeviceRegistry for TestRegistry {
    type Io = MemoryBlockDevice;

    fn get_dev_hwpart(
        &mut self,
        ifname: &str,
        devnum: u32,
        hwpart: u32,
    ) -> bootblk::Result<&mut BlockDevice<MemoryBlockDevice>> {
        for (name, num, hw, dev) in &mut self.devices {
            if name == ifname && *num == devnum && *hw == hwpart {
                dev.hwpart = hwpart;
                return Ok(dev);
            }
        }
        Err(BlkError::DeviceNotFound)
    }
}

// ==================== DOS/MBR images ====================

#[derive(Clone, Copy)]
pub struct MbrPart {
    pub bootable: bool,
    pub sys: u8,
    pub start: u32,
    pub size: u32,
}

/// Write one 16-byte table entry into the sector at `lba`.
pub fn write_mbr_entry(data: &mut [u8], lba: u64, slot: usize, part: MbrPart) {
    let base = lba as usize * 512 + 446 + slot * 16;
    data[base] = if part.bootable { 0x80 } else { 0x00 };
    data[base + 4] = part.sys;
    data[base + 8..base + 12].copy_from_slice(&part.start.to_le_bytes());
    data[base + 12..base + 16].copy_from_slice(&part.size.to_le_bytes());
}

pub fn write_mbr_signature(data: &mut [u8], lba: u64) {
    let base = lba as usize * 512;
    data[base + 510] = 0x55;
    data[base + 511] = 0xAA;
}

pub fn set_disk_signature(data: &mut [u8], sig: u32) {
    data[440..444].copy_from_slice(&sig.to_le_bytes());
}

/// Plain MBR image: up to four primary entries, no extended chains.
pub fn build_mbr_disk(num_blocks: u64, disksig: u32, parts: &[(usize, MbrPart)]) -> Vec<u8> {
    let mut data = vec![0u8; num_blocks as usize * 512];
    write_mbr_signature(&mut data, 0);
    set_disk_signature(&mut data, disksig);
    for (slot, part) in parts {
        write_mbr_entry(&mut data, 0, *slot, *part);
    }
    data
}

/// FAT boot sector carrying the MBR signature but no table.
#[allow(dead_code)]
pub fn build_superfloppy_disk(num_blocks: u64) -> Vec<u8> {
    let mut data = vec![0u8; num_blocks as usize * 512];
    write_mbr_signature(&mut data, 0);
    data[0x36..0x39].copy_from_slice(b"FAT");
    data
}

// ==================== ISO9660 / El Torito images ====================

fn write_descriptor_header(data: &mut [u8], sector: usize, type_code: u8) {
    let base = sector * 2048;
    data[base] = type_code;
    data[base + 1..base + 6].copy_from_slice(b"CD001");
    data[base + 6] = 1;
}

/// Fix the validation entry's checksum word so the 16-bit sum is zero.
fn fix_validation_checksum(entry: &mut [u8]) {
    entry[28] = 0;
    entry[29] = 0;
    let mut sum: u16 = 0;
    let mut i = 0;
    while i < 32 {
        sum = sum.wrapping_add(u16::from_le_bytes([entry[i], entry[i + 1]]));
        i += 2;
    }
    let fix = 0u16.wrapping_sub(sum);
    entry[28..30].copy_from_slice(&fix.to_le_bytes());
}

#[derive(Clone, Copy)]
pub struct BootEntry {
    pub bootable: bool,
    pub load_rba: u32,
    /// virtual 512-byte sectors
    pub sector_count: u16,
}

fn write_boot_entry(data: &mut [u8], offset: usize, entry: BootEntry) {
    data[offset] = if entry.bootable { 0x88 } else { 0x00 };
    data[offset + 6..offset + 8].copy_from_slice(&entry.sector_count.to_le_bytes());
    data[offset + 8..offset + 12].copy_from_slice(&entry.load_rba.to_le_bytes());
}

/// Minimal bootable ISO: PVD, El Torito boot record, terminator, catalog
/// with a default entry plus optional section entries.
#[allow(dead_code)]
pub fn build_iso_disk(default_entry: BootEntry, section_entries: &[BootEntry]) -> Vec<u8> {
    let sectors = 64usize;
    let mut data = vec![0u8; sectors * 2048];
    let catalog_sector = 19u32;

    // Primary Volume Descriptor (sector 16)
    write_descriptor_header(&mut data, 16, 1);
    data[16 * 2048 + 40..16 * 2048 + 51].copy_from_slice(b"TEST VOLUME");

    // El Torito boot record (sector 17)
    write_descriptor_header(&mut data, 17, 0);
    data[17 * 2048 + 7..17 * 2048 + 30].copy_from_slice(b"EL TORITO SPECIFICATION");
    data[17 * 2048 + 71..17 * 2048 + 75].copy_from_slice(&catalog_sector.to_le_bytes());

    // Volume Descriptor Set Terminator (sector 18)
    write_descriptor_header(&mut data, 18, 255);

    // Boot catalog (sector 19)
    let cat = catalog_sector as usize * 2048;
    data[cat] = 0x01; // validation entry header
    data[cat + 30] = 0x55;
    data[cat + 31] = 0xAA;
    {
        let (entry, _) = data[cat..].split_at_mut(32);
        fix_validation_checksum(entry);
    }
    write_boot_entry(&mut data, cat + 32, default_entry);
    if !section_entries.is_empty() {
        // one final section header holding the rest
        data[cat + 64] = 0x91;
        data[cat + 66..cat + 68].copy_from_slice(&(section_entries.len() as u16).to_le_bytes());
        for (i, entry) in section_entries.iter().enumerate() {
            write_boot_entry(&mut data, cat + 96 + i * 32, *entry);
        }
    }

    data
}

// ==================== Apple Partition Map images ====================

#[allow(dead_code)]
pub fn build_apm_disk(num_blocks: u64, parts: &[(&str, u32, u32)]) -> Vec<u8> {
    let mut data = vec![0u8; num_blocks as usize * 512];
    // Driver Descriptor Map "ER"
    data[0] = 0x45;
    data[1] = 0x52;
    for (i, (name, start, count)) in parts.iter().enumerate() {
        let base = (i + 1) * 512;
        data[base] = 0x50; // "PM"
        data[base + 1] = 0x4D;
        data[base + 4..base + 8].copy_from_slice(&(parts.len() as u32).to_be_bytes());
        data[base + 8..base + 12].copy_from_slice(&start.to_be_bytes());
        data[base + 12..base + 16].copy_from_slice(&count.to_be_bytes());
        let name_bytes = name.as_bytes();
        let n = name_bytes.len().min(31);
        data[base + 16..base + 16 + n].copy_from_slice(&name_bytes[..n]);
        data[base + 48..base + 57].copy_from_slice(b"Apple_HFS");
    }
    data
}

// ==================== Amiga RDB images ====================

/// Zero the checksum longword, then set it so the block sums to zero.
fn fix_rdb_checksum(block: &mut [u8]) {
    block[8..12].copy_from_slice(&0u32.to_be_bytes());
    let longs = u32::from_be_bytes([block[4], block[5], block[6], block[7]]) as usize;
    let mut sum: u32 = 0;
    for i in 0..longs {
        sum = sum.wrapping_add(u32::from_be_bytes([
            block[i * 4],
            block[i * 4 + 1],
            block[i * 4 + 2],
            block[i * 4 + 3],
        ]));
    }
    block[8..12].copy_from_slice(&sum.wrapping_neg().to_be_bytes());
}

#[derive(Clone, Copy)]
pub struct RdbPart<'a> {
    pub name: &'a str,
    pub bootable: bool,
    pub low_cyl: u32,
    pub high_cyl: u32,
}

pub const RDB_SURFACES: u32 = 16;
pub const RDB_BLOCKS_PER_TRACK: u32 = 63;

/// RDSK block at block 2, PART chain from block 10 on.
#[allow(dead_code)]
pub fn build_rdb_disk(num_blocks: u64, parts: &[RdbPart<'_>]) -> Vec<u8> {
    let mut data = vec![0u8; num_blocks as usize * 512];

    let first_part_block = 10u32;
    {
        let rdsk = &mut data[2 * 512..3 * 512];
        rdsk[0..4].copy_from_slice(b"RDSK");
        rdsk[4..8].copy_from_slice(&64u32.to_be_bytes()); // summed longs
        let head = if parts.is_empty() { 0xFFFF_FFFFu32 } else { first_part_block };
        rdsk[28..32].copy_from_slice(&head.to_be_bytes());
        fix_rdb_checksum(rdsk);
    }

    for (i, part) in parts.iter().enumerate() {
        let blkno = first_part_block as usize + i;
        let block = &mut data[blkno * 512..(blkno + 1) * 512];
        block[0..4].copy_from_slice(b"PART");
        block[4..8].copy_from_slice(&64u32.to_be_bytes());
        let next = if i + 1 < parts.len() {
            first_part_block + i as u32 + 1
        } else {
            0xFFFF_FFFF
        };
        block[16..20].copy_from_slice(&next.to_be_bytes());
        let flags: u32 = if part.bootable { 1 } else { 0 };
        block[20..24].copy_from_slice(&flags.to_be_bytes());
        // BCPL drive name
        let name_bytes = part.name.as_bytes();
        let n = name_bytes.len().min(31);
        block[36] = n as u8;
        block[37..37 + n].copy_from_slice(&name_bytes[..n]);
        // DosEnvec
        let envec = |idx: usize, val: u32, block: &mut [u8]| {
            block[128 + idx * 4..128 + idx * 4 + 4].copy_from_slice(&val.to_be_bytes());
        };
        envec(0, 16, block); // table size
        envec(3, RDB_SURFACES, block);
        envec(5, RDB_BLOCKS_PER_TRACK, block);
        envec(9, part.low_cyl, block);
        envec(10, part.high_cyl, block);
        fix_rdb_checksum(block);
    }

    data
}

// ==================== GPT images ====================

pub mod gpt {
    use super::MemoryBlockDevice;
    use gpt_disk_io::Disk;
    use gpt_disk_types::{
        guid, BlockSize, GptHeader, GptPartitionAttributes, GptPartitionEntryArray,
        GptPartitionType, LbaLe, U32Le, U64Le,
    };

    #[derive(Clone, Copy)]
    pub struct GptPart {
        pub start: u64,
        pub end: u64,
        pub bootable: bool,
    }

    /// Build a GPT image through the same library the crate reads it
    /// with: protective MBR, primary header, entry array.
    pub fn build_gpt_disk(num_blocks: u64, parts: &[GptPart]) -> Vec<u8> {
        let mut device = MemoryBlockDevice::new(vec![0u8; num_blocks as usize * 512], 512);
        {
            let mut disk = Disk::new(&mut device).expect("disk handle");
            let mut buf = [0u8; 512];
            disk.write_protective_mbr(&mut buf).expect("protective mbr");

            let mut header = GptHeader {
                my_lba: LbaLe::from_u64(1),
                alternate_lba: LbaLe::from_u64(num_blocks - 1),
                first_usable_lba: LbaLe::from_u64(34),
                last_usable_lba: LbaLe::from_u64(num_blocks - 34),
                disk_guid: guid!("f1e2d3c4-b5a6-4958-8a7b-6c5d4e3f2a1b"),
                partition_entry_lba: LbaLe::from_u64(2),
                number_of_partition_entries: U32Le::from_u32(128),
                ..Default::default()
            };

            let layout = header
                .get_partition_entry_array_layout()
                .expect("entry layout");
            let mut entry_buf = vec![0u8; 16384];
            let mut entry_array =
                GptPartitionEntryArray::new(layout, BlockSize::BS_512, &mut entry_buf)
                    .expect("entry array");

            let unique = [
                guid!("11111111-1111-4111-8111-111111111111"),
                guid!("22222222-2222-4222-8222-222222222222"),
                guid!("33333333-3333-4333-8333-333333333333"),
                guid!("44444444-4444-4444-8444-444444444444"),
            ];
            for (i, part) in parts.iter().enumerate() {
                let entry = entry_array
                    .get_partition_entry_mut(i as u32)
                    .expect("entry slot");
                entry.partition_type_guid =
                    GptPartitionType(guid!("0fc63daf-8483-4772-8e79-3d69d8477de4"));
                entry.unique_partition_guid = unique[i % unique.len()];
                entry.starting_lba = LbaLe::from_u64(part.start);
                entry.ending_lba = LbaLe::from_u64(part.end);
                entry.attributes = if part.bootable {
                    GptPartitionAttributes(U64Le::from_u64(1 << 2))
                } else {
                    Default::default()
                };
            }

            header.partition_entry_array_crc32 = entry_array.calculate_crc32();
            header.update_header_crc32();

            disk.write_primary_gpt_header(&header, &mut buf)
                .expect("primary header");
            disk.write_gpt_partition_entry_array(&entry_array)
                .expect("entry array write");
            disk.flush().expect("flush");
        }
        device.data
    }
}

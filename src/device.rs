//! Block device descriptors.
//!
//! A [`BlockDevice`] couples a raw block I/O implementation with the
//! descriptor state the partition layer needs: geometry, interface type,
//! and the cached partition-table classification. The storage layer owns
//! these descriptors and hands them out through a [`DeviceRegistry`];
//! this crate only ever reads the geometry and writes the two cache
//! fields (`table`, `log2blksz`).

use gpt_disk_io::BlockIo;
use gpt_disk_types::{BlockSize, Lba};

use crate::error::{BlkError, Result};
use crate::part::TableKind;
use crate::types::FixedStr;

/// Largest device block size the table probes support.
pub const MAX_BLOCK_SIZE: usize = 4096;

/// Transport the device sits behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceType {
    Ide,
    Scsi,
    Atapi,
    Usb,
    Sata,
    Mmc,
    Sd,
    Nvme,
    Virtio,
    Host,
    Unknown,
}

impl InterfaceType {
    /// Parse an interface name as used in specification strings.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ide" => Some(Self::Ide),
            "scsi" => Some(Self::Scsi),
            "atapi" => Some(Self::Atapi),
            "usb" => Some(Self::Usb),
            "sata" => Some(Self::Sata),
            "mmc" => Some(Self::Mmc),
            "sd" => Some(Self::Sd),
            "nvme" => Some(Self::Nvme),
            "virtio" => Some(Self::Virtio),
            "host" => Some(Self::Host),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ide => "IDE",
            Self::Scsi => "SCSI",
            Self::Atapi => "ATAPI",
            Self::Usb => "USB",
            Self::Sata => "SATA",
            Self::Mmc => "MMC",
            Self::Sd => "SD",
            Self::Nvme => "NVMe",
            Self::Virtio => "VirtIO",
            Self::Host => "HOST",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Kind of media behind the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Unknown,
    HardDisk,
    CdRom,
    Optical,
    Tape,
}

/// A block device descriptor plus its I/O channel.
pub struct BlockDevice<B: BlockIo> {
    /// Raw block I/O
    pub io: B,
    pub if_type: InterfaceType,
    pub devnum: u32,
    /// Currently selected hardware partition
    pub hwpart: u32,
    pub media: MediaType,
    pub removable: bool,
    pub vendor: FixedStr<40>,
    pub product: FixedStr<20>,
    pub revision: FixedStr<8>,
    /// Capacity in logical blocks
    pub lba: u64,
    /// Block size in bytes
    pub blksz: u32,
    /// log2 of the block size, cached once resolution succeeds
    pub log2blksz: u32,
    /// Detected partition table format. `Unknown` means not yet
    /// classified; invalidate with [`crate::part::init`] after anything
    /// that can change the table (e.g. a hardware partition switch).
    pub table: TableKind,
}

impl<B: BlockIo> BlockDevice<B> {
    pub fn new(io: B, if_type: InterfaceType, devnum: u32, blksz: u32, lba: u64) -> Self {
        Self {
            io,
            if_type,
            devnum,
            hwpart: 0,
            media: MediaType::HardDisk,
            removable: false,
            vendor: FixedStr::new(),
            product: FixedStr::new(),
            revision: FixedStr::new(),
            lba,
            blksz,
            log2blksz: 0,
            table: TableKind::Unknown,
        }
    }

    /// Read whole blocks starting at `lba` into `buf`. `buf` must be a
    /// multiple of the block size.
    pub fn read_blocks(&mut self, lba: u64, buf: &mut [u8]) -> Result<()> {
        self.io
            .read_blocks(Lba(lba), buf)
            .map_err(|_| BlkError::IoError)
    }
}

/// `BlockIo` by mutable reference, so a probe can hand the device's I/O
/// channel to an API that wants ownership without giving up the
/// descriptor.
pub struct IoRef<'a, B: BlockIo>(pub &'a mut B);

impl<'a, B: BlockIo> BlockIo for IoRef<'a, B> {
    type Error = B::Error;

    fn block_size(&self) -> BlockSize {
        self.0.block_size()
    }

    fn num_blocks(&mut self) -> core::result::Result<u64, Self::Error> {
        self.0.num_blocks()
    }

    fn read_blocks(&mut self, start_lba: Lba, dst: &mut [u8]) -> core::result::Result<(), Self::Error> {
        self.0.read_blocks(start_lba, dst)
    }

    fn write_blocks(&mut self, start_lba: Lba, src: &[u8]) -> core::result::Result<(), Self::Error> {
        self.0.write_blocks(start_lba, src)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        self.0.flush()
    }
}

/// Device lookup seam: resolves an interface name, device number and
/// hardware partition to a descriptor. Implemented by the storage layer;
/// selecting a hardware partition other than the current one is the
/// implementation's job, including whatever controller commands that
/// takes.
pub trait DeviceRegistry {
    type Io: BlockIo;

    fn get_dev_hwpart(
        &mut self,
        ifname: &str,
        devnum: u32,
        hwpart: u32,
    ) -> Result<&mut BlockDevice<Self::Io>>;
}

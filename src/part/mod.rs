//! Partition table access.
//!
//! # Overview
//!
//! A fixed set of partition table formats sits behind one interface:
//! every format can *probe* a device, *enumerate* its entries and *print*
//! its map. Which format a device carries is detected once and cached on
//! the descriptor; [`classify`] performs the detection, [`init`] redoes
//! it from scratch.
//!
//! The format set is closed at build time, so dispatch is a plain `match`
//! over [`TableKind`] rather than anything pluggable. [`HANDLERS`] is the
//! single place the set is named, and its order is the detection
//! priority.
//!
//! # Layers
//!
//! 1. **Handlers** (`dos`, `efi`, `iso9660`, `mac`, `amiga`) - one module
//!    per on-disk format
//! 2. **Registry** (this module) - classification cache + dispatch
//! 3. **Resolver** ([`resolve`]) - specification strings to descriptors

pub mod devspec;
pub mod resolve;

mod amiga;
mod dos;
mod efi;
mod iso9660;
mod mac;

use core::fmt;
use core::fmt::Write as _;

use gpt_disk_io::BlockIo;

use crate::device::{BlockDevice, InterfaceType};
use crate::error::{BlkError, Result};
use crate::types::FixedStr;

/// Type marker carried by every partition the boot flow may use.
pub const BOOT_PART_TYPE: &str = "bootblk";

/// Upper bound on the auto-search index scan.
pub const MAX_SEARCH_PARTITIONS: u32 = 64;

/// Detected partition table format. `Unknown` is reserved for "not yet
/// classified".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Unknown,
    Efi,
    Amiga,
    Dos,
    Iso,
    Mac,
}

/// Descriptor for one registered format.
pub struct FormatHandler {
    pub kind: TableKind,
    pub name: &'static str,
    /// Bound for name scans over this format's entry range
    pub max_entries: u32,
}

/// Registered formats in detection priority order. EFI must precede DOS:
/// GPT carries a protective MBR that the DOS probe would claim.
pub const HANDLERS: &[FormatHandler] = &[
    FormatHandler { kind: TableKind::Efi, name: "EFI", max_entries: 128 },
    FormatHandler { kind: TableKind::Amiga, name: "AMIGA", max_entries: 64 },
    FormatHandler { kind: TableKind::Dos, name: "DOS", max_entries: 64 },
    FormatHandler { kind: TableKind::Iso, name: "ISO", max_entries: 64 },
    FormatHandler { kind: TableKind::Mac, name: "MAC", max_entries: 64 },
];

/// One resolved partition.
///
/// For real table entries `start + size <= device capacity`; the
/// whole-disk view has `start == 0` and `size == capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInfo {
    /// Start block (logical)
    pub start: u64,
    /// Size in blocks
    pub size: u64,
    /// Block size in bytes
    pub blksz: u32,
    pub bootable: bool,
    /// Type marker; must equal [`BOOT_PART_TYPE`] for the boot flow
    pub type_name: FixedStr<32>,
    pub name: FixedStr<32>,
    pub uuid: Option<FixedStr<36>>,
    pub type_guid: Option<FixedStr<36>>,
}

impl PartitionInfo {
    pub(crate) fn empty() -> Self {
        Self {
            start: 0,
            size: 0,
            blksz: 0,
            bootable: false,
            type_name: FixedStr::new(),
            name: FixedStr::new(),
            uuid: None,
            type_guid: None,
        }
    }

    /// Whether the type marker is the boot sentinel.
    pub fn is_boot_type(&self) -> bool {
        self.type_name.as_str() == BOOT_PART_TYPE
    }
}

fn probe<B: BlockIo>(handler: &FormatHandler, dev: &mut BlockDevice<B>) -> bool {
    match handler.kind {
        TableKind::Efi => efi::probe(dev),
        TableKind::Amiga => amiga::probe(dev),
        TableKind::Dos => dos::probe(dev),
        TableKind::Iso => iso9660::probe(dev),
        TableKind::Mac => mac::probe(dev),
        TableKind::Unknown => false,
    }
}

fn entry_info<B: BlockIo>(
    handler: &FormatHandler,
    dev: &mut BlockDevice<B>,
    part: u32,
) -> Result<PartitionInfo> {
    match handler.kind {
        TableKind::Efi => efi::get_info(dev, part),
        TableKind::Amiga => amiga::get_info(dev, part),
        TableKind::Dos => dos::get_info(dev, part),
        TableKind::Iso => iso9660::get_info(dev, part),
        TableKind::Mac => mac::get_info(dev, part),
        TableKind::Unknown => Err(BlkError::Unsupported),
    }
}

/// Handler for the device's table format.
///
/// If the device is already classified, returns that handler without
/// touching the device. Otherwise probes every registered format in
/// [`HANDLERS`] order, caches the first match on the descriptor and
/// returns it. `None` means no format claimed the device - callers treat
/// that as "no partition table", not as a failure.
pub fn classify<B: BlockIo>(dev: &mut BlockDevice<B>) -> Option<&'static FormatHandler> {
    if dev.table == TableKind::Unknown {
        for handler in HANDLERS {
            if probe(handler, dev) {
                dev.table = handler.kind;
                return Some(handler);
            }
        }
        None
    } else {
        HANDLERS.iter().find(|h| h.kind == dev.table)
    }
}

/// Handler for an already-classified device; never probes.
pub fn lookup<B: BlockIo>(dev: &BlockDevice<B>) -> Option<&'static FormatHandler> {
    if dev.table == TableKind::Unknown {
        return None;
    }
    HANDLERS.iter().find(|h| h.kind == dev.table)
}

/// Drop the cached classification and re-probe from scratch. Must be
/// called whenever the underlying table may have changed, e.g. after a
/// hardware partition switch.
pub fn init<B: BlockIo>(dev: &mut BlockDevice<B>) {
    dev.table = TableKind::Unknown;
    for handler in HANDLERS {
        if probe(handler, dev) {
            dev.table = handler.kind;
            break;
        }
    }
}

/// Look up partition `part` on the device, classifying it first if
/// needed. Handler-level failures all surface as [`BlkError::PartitionNotFound`].
pub fn get_info<B: BlockIo>(dev: &mut BlockDevice<B>, part: u32) -> Result<PartitionInfo> {
    let handler = classify(dev).ok_or(BlkError::Unsupported)?;
    entry_info(handler, dev, part).map_err(|_| BlkError::PartitionNotFound)
}

/// Synthesize the partition covering the entire device.
pub fn whole_disk<B: BlockIo>(dev: &BlockDevice<B>) -> Result<PartitionInfo> {
    if dev.lba == 0 {
        return Err(BlkError::InvalidDeviceSize);
    }
    let mut info = PartitionInfo::empty();
    info.start = 0;
    info.size = dev.lba;
    info.blksz = dev.blksz;
    info.type_name = FixedStr::from_str(BOOT_PART_TYPE);
    info.name = FixedStr::from_str("Whole Disk");
    Ok(info)
}

/// Find a partition by exact, case-sensitive name.
///
/// Scans entries upward from 1 and stops at the first lookup failure:
/// a hole in the numbering ends the scan. (The auto search in
/// [`resolve`] deliberately behaves differently and skips holes.)
pub fn find_by_name<B: BlockIo>(
    dev: &mut BlockDevice<B>,
    name: &str,
) -> Result<(u32, PartitionInfo)> {
    let handler = classify(dev).ok_or(BlkError::Unsupported)?;
    for i in 1..handler.max_entries {
        let info = match entry_info(handler, dev, i) {
            Ok(info) => info,
            // no more entries in table
            Err(_) => break,
        };
        if info.name.as_str() == name {
            return Ok((i, info));
        }
    }
    Err(BlkError::PartitionNotFound)
}

/// Print the device's partition map through its handler.
pub fn print<B: BlockIo, W: fmt::Write>(w: &mut W, dev: &mut BlockDevice<B>) -> fmt::Result {
    let handler = match classify(dev) {
        Some(h) => h,
        None => return writeln!(w, "## Unknown partition table type"),
    };
    writeln!(
        w,
        "\nPartition Map for {} device {}  --   Partition Type: {}\n",
        dev.if_type.as_str(),
        dev.devnum,
        handler.name
    )?;
    match handler.kind {
        TableKind::Efi => efi::print(w, dev),
        TableKind::Amiga => amiga::print(w, dev),
        TableKind::Dos => dos::print(w, dev),
        TableKind::Iso => iso9660::print(w, dev),
        TableKind::Mac => mac::print(w, dev),
        TableKind::Unknown => Ok(()),
    }
}

/// Canonical short name for a device/partition pair, e.g. `hda1` or
/// `mmcsdb2`.
pub fn generic_name(if_type: InterfaceType, devnum: u32, part: u32) -> FixedStr<32> {
    let devtype = match if_type {
        InterfaceType::Ide | InterfaceType::Sata | InterfaceType::Atapi => "hd",
        InterfaceType::Scsi => "sd",
        InterfaceType::Usb => "usbd",
        InterfaceType::Mmc | InterfaceType::Sd => "mmcsd",
        _ => "xx",
    };
    let letter = (b'a' + (devnum % 26) as u8) as char;
    let mut name = FixedStr::new();
    let _ = write!(name, "{}{}{}", devtype, letter, part);
    name
}

//! Bootblk - block device and partition resolution for boot loaders
//!
//! # Overview
//!
//! Early in boot there is no operating system, no filesystem layer, and
//! no udev handing out friendly device names - just block devices and a
//! string like `0.1:auto` from a user, a script or firmware. This crate
//! turns such strings into validated partition descriptors:
//!
//! - Specification parsing: `device[.hwpart][:partition]` and
//!   `device[.hwpart]#name`, hex fields, environment fallback
//! - Format detection across MBR/DOS, GPT/EFI, Apple Partition Map,
//!   Amiga RDB and ISO9660 El Torito, behind one interface
//! - Partition resolution: explicit index, lookup by name, bootable
//!   auto-search, and a whole-disk view when no table exists
//!
//! # Architecture
//!
//! The implementation is layered:
//! 1. **Device layer** - [`BlockDevice`] descriptors over a
//!    `gpt_disk_io::BlockIo` channel, handed out by a [`DeviceRegistry`]
//! 2. **Format handlers** - one module per table format, each able to
//!    probe, enumerate and print; the set is fixed at build time
//! 3. **Resolver** - the specification grammar plus the selection state
//!    machine in [`part::resolve`]
//!
//! # Usage
//!
//! ```ignore
//! use bootblk::{get_device_part_str, NoEnvironment};
//!
//! let resolved = get_device_part_str(&mut registry, &NoEnvironment,
//!                                    "mmc", Some("0:auto"), true)?;
//! // resolved.part is the index, resolved.info the descriptor
//! ```
//!
//! Resolution never panics and never terminates the caller; everything
//! surfaces as [`BlkError`], with human-readable diagnostics collected in
//! [`logger`].

#![no_std]

extern crate alloc;

pub mod logger;

pub mod device;
pub mod env;
pub mod error;
pub mod part;
pub mod report;
pub mod types;

pub use device::{BlockDevice, DeviceRegistry, InterfaceType, IoRef, MediaType};
pub use env::{Environment, NoEnvironment, ENV_BOOTDEVICE};
pub use error::{BlkError, Result};
pub use part::devspec::{DevHwPart, PartSelect};
pub use part::resolve::{
    get_device_and_name, get_device_by_str, get_device_part_or_name, get_device_part_str,
    Resolved, IFACE_FTL, IFACE_HOSTFS,
};
pub use part::{
    classify, find_by_name, generic_name, get_info, init, lookup, print, whole_disk,
    FormatHandler, PartitionInfo, TableKind, BOOT_PART_TYPE, HANDLERS, MAX_SEARCH_PARTITIONS,
};
pub use report::dev_print;
pub use types::FixedStr;

//! Device and partition resolution.
//!
//! Turns a specification string plus an interface name into one
//! [`PartitionInfo`], going through device lookup, table classification
//! and partition selection. [`get_device_part_str`] is the numeric/auto
//! grammar, [`get_device_and_name`] the `#name` form, and
//! [`get_device_part_or_name`] tries the name form first and falls back
//! to the numeric grammar.

use gpt_disk_io::BlockIo;

use crate::device::{BlockDevice, DeviceRegistry, InterfaceType, MediaType};
use crate::env::{Environment, ENV_BOOTDEVICE};
use crate::error::{BlkError, Result};
use crate::part::devspec::{self, PartSelect};
use crate::part::{self, PartitionInfo, BOOT_PART_TYPE, MAX_SEARCH_PARTITIONS};
use crate::types::FixedStr;
use crate::{log_error, log_info};

/// Pseudo-interface backed by the host's own filesystem; no block device
/// or partition table is involved.
pub const IFACE_HOSTFS: &str = "hostfs";

/// Pseudo-interface backed by a flash translation layer; likewise bypasses
/// the partition layer.
pub const IFACE_FTL: &str = "ftl";

/// Outcome of a resolution.
///
/// `device` is `None` for the pseudo-interfaces, which have no block
/// device behind them. `part` is the resolved index; 0 means the whole
/// device.
pub struct Resolved<'a, B: BlockIo> {
    pub device: Option<&'a mut BlockDevice<B>>,
    pub part: u32,
    pub info: PartitionInfo,
}

fn passthrough_info(name: &str) -> PartitionInfo {
    let mut info = PartitionInfo::empty();
    info.type_name = FixedStr::from_str(BOOT_PART_TYPE);
    info.name = FixedStr::from_str(name);
    info
}

/// Resolve `device[.hwpart]` to a descriptor.
///
/// Returns the device number together with the handle. Selecting a
/// hardware partition is delegated to the registry; on MMC-class devices
/// the partition table is re-classified afterwards, since a hardware
/// partition switch changes what the table probes see.
pub fn get_device_by_str<'a, R: DeviceRegistry>(
    registry: &'a mut R,
    ifname: &str,
    dev_hwpart_str: &str,
) -> Result<(u32, &'a mut BlockDevice<R::Io>)> {
    let (dev_str, hwpart_str) = devspec::split_hwpart(dev_hwpart_str);
    let devnum = match devspec::parse_hex(dev_str) {
        Some(n) => n,
        None => {
            log_error!("** Bad device specification {} {} **", ifname, dev_str);
            return Err(BlkError::BadSpecification);
        }
    };
    let hwpart = match hwpart_str {
        Some(h) => match devspec::parse_hex(h) {
            Some(n) => n,
            None => {
                log_error!("** Bad HW partition specification {} {} **", ifname, h);
                return Err(BlkError::BadSpecification);
            }
        },
        None => 0,
    };

    let dev = registry.get_dev_hwpart(ifname, devnum, hwpart).map_err(|e| {
        log_info!("** Bad device {} {} **", ifname, dev_hwpart_str);
        e
    })?;
    if dev.media == MediaType::Unknown {
        log_info!("** Bad device {} {} **", ifname, dev_hwpart_str);
        return Err(BlkError::DeviceNotFound);
    }

    // Re-classify after a possible hardware partition switch; otherwise
    // hw partition 0 serves stale table data after another one was shown.
    if dev.if_type == InterfaceType::Mmc {
        part::init(dev);
    }

    Ok((devnum, dev))
}

/// Resolve `device[.hwpart][:part]` to a partition.
///
/// An absent, empty or `"-"` specification falls back to the
/// environment's `bootdevice`. `allow_whole_dev` permits partition 0 and
/// the table-less whole-device case.
pub fn get_device_part_str<'a, R: DeviceRegistry, E: Environment + ?Sized>(
    registry: &'a mut R,
    env: &E,
    ifname: &str,
    dev_part_str: Option<&str>,
    allow_whole_dev: bool,
) -> Result<Resolved<'a, R::Io>> {
    // Pseudo block devices never reach the partition layer.
    if ifname == IFACE_HOSTFS {
        return Ok(Resolved {
            device: None,
            part: 0,
            info: passthrough_info("Host filesystem"),
        });
    }
    if ifname == IFACE_FTL {
        return Ok(Resolved {
            device: None,
            part: 0,
            info: passthrough_info("FTL"),
        });
    }

    let spec = match dev_part_str {
        Some(s) if !s.is_empty() && s != "-" => s,
        _ => match env.get(ENV_BOOTDEVICE) {
            Some(s) => s,
            None => {
                log_error!("** No device specified **");
                return Err(BlkError::DeviceNotFound);
            }
        },
    };

    let (dev_str, part_str) = devspec::split_part(spec);
    let (_devnum, dev) = get_device_by_str(registry, ifname, dev_str)?;

    let sel = devspec::parse_part_select(part_str, allow_whole_dev).map_err(|e| {
        log_error!("** Bad partition specification {} {} **", ifname, spec);
        e
    })?;

    // No partition table on the device, or partition 0 requested: the
    // whole device is the partition.
    if sel == PartSelect::Num(0) || part::classify(dev).is_none() {
        if dev.lba == 0 {
            log_error!("** Bad device size - {} {} **", ifname, dev_str);
            return Err(BlkError::InvalidDeviceSize);
        }
        let explicit_part = matches!(sel, PartSelect::Num(n) if n > 0);
        if explicit_part || !allow_whole_dev {
            log_error!("** No partition table - {} {} **", ifname, dev_str);
            return Err(BlkError::NoPartitionTable);
        }
        dev.log2blksz = dev.blksz.trailing_zeros();
        let info = part::whole_disk(dev)?;
        return Ok(Resolved {
            device: Some(dev),
            part: 0,
            info,
        });
    }

    // There is a table; not specifying a partition means partition 1.
    let (part, info) = match sel {
        PartSelect::Auto => auto_search(dev)?,
        sel => {
            let part = match sel {
                PartSelect::Num(n) => n,
                _ => 1,
            };
            let info = part::get_info(dev, part).map_err(|_| {
                log_error!("** Invalid partition {} **", part);
                BlkError::PartitionNotFound
            })?;
            (part, info)
        }
    };

    if !info.is_boot_type() {
        log_error!(
            "** Invalid partition type \"{}\" (expect \"{}\") **",
            info.type_name,
            BOOT_PART_TYPE
        );
        return Err(BlkError::InvalidPartitionType);
    }

    dev.log2blksz = dev.blksz.trailing_zeros();
    Ok(Resolved {
        device: Some(dev),
        part,
        info,
    })
}

/// Find the first bootable partition; if none are bootable, fall back to
/// the first valid partition.
fn auto_search<B: BlockIo>(dev: &mut BlockDevice<B>) -> Result<(u32, PartitionInfo)> {
    let mut part = 0u32;
    let mut current: Option<PartitionInfo> = None;
    // The working result is overwritten on every hit, so the first valid
    // entry is kept aside for the exhausted-scan case.
    let mut first_valid: Option<PartitionInfo> = None;

    let mut p = 1u32;
    while p <= MAX_SEARCH_PARTITIONS {
        let info = match part::get_info(dev, p) {
            Ok(info) => info,
            // Holes do not end the scan; some formats number sparsely.
            Err(_) => {
                p += 1;
                continue;
            }
        };

        // First valid partition, or new better partition? Save its ID.
        if part == 0 || info.bootable {
            part = p;
        }
        current = Some(info);

        // Best possible partition? Stop searching.
        if info.bootable {
            break;
        }

        if part == p {
            first_valid = Some(info);
        }
        p += 1;
    }

    if part == 0 {
        log_error!("** No valid partitions found **");
        return Err(BlkError::NoValidPartitions);
    }

    // A full sweep means nothing bootable turned up; report the first
    // valid partition found.
    let chosen = if p > MAX_SEARCH_PARTITIONS {
        first_valid
    } else {
        current
    };
    match chosen {
        Some(info) => Ok((part, info)),
        None => Err(BlkError::NoValidPartitions),
    }
}

/// Name-form lookup returning plain values, so callers can fall back to
/// the numeric grammar without holding a device borrow.
fn lookup_by_name<R: DeviceRegistry>(
    registry: &mut R,
    ifname: &str,
    spec: &str,
) -> Result<(u32, u32, u32, PartitionInfo)> {
    let (dev_str, name) = devspec::split_name(spec).ok_or(BlkError::BadSpecification)?;
    let (devnum, dev) = get_device_by_str(registry, ifname, dev_str)?;
    let hwpart = dev.hwpart;
    let (part, info) = part::find_by_name(dev, name).map_err(|e| {
        log_error!("Could not find \"{}\" partition", name);
        e
    })?;
    Ok((devnum, hwpart, part, info))
}

/// Resolve `device[.hwpart]#name` to a partition.
pub fn get_device_and_name<'a, R: DeviceRegistry>(
    registry: &'a mut R,
    ifname: &str,
    dev_part_str: Option<&str>,
) -> Result<Resolved<'a, R::Io>> {
    let spec = dev_part_str.ok_or(BlkError::BadSpecification)?;
    let (devnum, hwpart, part, info) = lookup_by_name(registry, ifname, spec)?;
    let dev = registry.get_dev_hwpart(ifname, devnum, hwpart)?;
    Ok(Resolved {
        device: Some(dev),
        part,
        info,
    })
}

/// Resolve a specification that may use either the `#name` form or the
/// numeric grammar. The name form takes precedence; if its lookup fails,
/// the string is re-read under the `:` grammar.
pub fn get_device_part_or_name<'a, R: DeviceRegistry, E: Environment + ?Sized>(
    registry: &'a mut R,
    env: &E,
    ifname: &str,
    dev_part_str: Option<&str>,
    allow_whole_dev: bool,
) -> Result<Resolved<'a, R::Io>> {
    if let Some(spec) = dev_part_str {
        if devspec::split_name(spec).is_some() {
            if let Ok((devnum, hwpart, part, info)) = lookup_by_name(registry, ifname, spec) {
                let dev = registry.get_dev_hwpart(ifname, devnum, hwpart)?;
                return Ok(Resolved {
                    device: Some(dev),
                    part,
                    info,
                });
            }
        }
    }

    get_device_part_str(registry, env, ifname, dev_part_str, allow_whole_dev).map_err(|e| {
        log_error!(
            "Couldn't find partition {} {}",
            ifname,
            dev_part_str.unwrap_or("")
        );
        e
    })
}

//! Device and partition specification strings.
//!
//! Parses the textual forms accepted by boot commands:
//!
//! ```text
//! device_spec   := device_num [ "." hwpart_num ]
//! dev_part_spec := device_spec [ ":" part_sel ]
//! dev_name_spec := device_spec "#" partition_name
//! part_sel      := "" | "auto" | hex_integer
//! ```
//!
//! `device_num` and `hwpart_num` are unsigned hexadecimal; anything left
//! over after the number is a parse error. An absent `.hwpart` component
//! defaults to hardware partition 0. An empty `part_sel` means
//! "unspecified" and lets the resolver pick its default; `auto` requests
//! the bootable-partition search; `0` means the whole device and is only
//! accepted when the caller allows it.

use crate::error::{BlkError, Result};

/// Partition selector parsed from the `:part` component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSelect {
    /// Nothing given; resolver defaults to partition 1 under a real
    /// table, or the whole device without one
    Unspecified,
    /// Search for a bootable partition
    Auto,
    /// Explicit index; 0 is reserved for the whole device
    Num(u32),
}

/// Parsed `device[.hwpart]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevHwPart {
    pub dev: u32,
    pub hwpart: u32,
}

/// Parse an unsigned hex field, with optional `0x` prefix. The whole
/// string must convert; trailing garbage fails.
pub fn parse_hex(s: &str) -> Option<u32> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Split `device[.hwpart]` at the first `.`.
pub fn split_hwpart(s: &str) -> (&str, Option<&str>) {
    match s.find('.') {
        Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
        None => (s, None),
    }
}

/// Split `device_spec[:part]` at the first `:`.
pub fn split_part(s: &str) -> (&str, Option<&str>) {
    match s.find(':') {
        Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
        None => (s, None),
    }
}

/// Split `device_spec#name` at the first `#`, if present.
pub fn split_name(s: &str) -> Option<(&str, &str)> {
    s.find('#').map(|idx| (&s[..idx], &s[idx + 1..]))
}

/// Parse a full `device[.hwpart]` specification.
pub fn parse_dev_hwpart(s: &str) -> Result<DevHwPart> {
    let (dev_str, hwpart_str) = split_hwpart(s);
    let dev = parse_hex(dev_str).ok_or(BlkError::BadSpecification)?;
    let hwpart = match hwpart_str {
        Some(h) => parse_hex(h).ok_or(BlkError::BadSpecification)?,
        None => 0,
    };
    Ok(DevHwPart { dev, hwpart })
}

/// Parse the partition selector component.
///
/// `allow_whole_dev` is the caller's "partition 0 is acceptable" flag;
/// without it an explicit 0 is rejected. Malformed selectors and a
/// disallowed 0 both yield [`BlkError::PartitionNotFound`], not a parse
/// error: the selector names an entry, and no such entry exists.
pub fn parse_part_select(part_str: Option<&str>, allow_whole_dev: bool) -> Result<PartSelect> {
    let s = match part_str {
        None => return Ok(PartSelect::Unspecified),
        Some(s) if s.is_empty() => return Ok(PartSelect::Unspecified),
        Some(s) => s,
    };
    if s == "auto" {
        return Ok(PartSelect::Auto);
    }
    // Something specified -> use exactly that
    let part = parse_hex(s).ok_or(BlkError::PartitionNotFound)?;
    if part == 0 && !allow_whole_dev {
        return Err(BlkError::PartitionNotFound);
    }
    Ok(PartSelect::Num(part))
}

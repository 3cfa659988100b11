//! Block layer error types

use core::fmt;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, BlkError>;

/// Errors produced by device lookup, specification parsing and partition
/// resolution. All of these are recoverable return values; the crate never
/// terminates the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlkError {
    /// Malformed device or hardware-partition field in a specification
    BadSpecification,
    /// No such device, or no device specified at all
    DeviceNotFound,
    /// Device has no recognized partition table format
    Unsupported,
    /// A real partition was required but the device carries no table
    NoPartitionTable,
    /// The requested partition entry does not exist
    PartitionNotFound,
    /// Auto search exhausted the index range without a valid entry
    NoValidPartitions,
    /// Partition exists but its type marker is not the boot sentinel
    InvalidPartitionType,
    /// Device reports zero capacity
    InvalidDeviceSize,
    /// Block I/O operation failed
    IoError,
}

impl BlkError {
    /// POSIX-style negative error code for callers that speak errno.
    pub const fn errno(&self) -> i32 {
        match self {
            Self::BadSpecification => -22,     // EINVAL
            Self::DeviceNotFound => -19,       // ENODEV
            Self::Unsupported => -93,          // EPROTONOSUPPORT
            Self::NoPartitionTable => -93,     // EPROTONOSUPPORT
            Self::PartitionNotFound => -2,     // ENOENT
            Self::NoValidPartitions => -2,     // ENOENT
            Self::InvalidPartitionType => -22, // EINVAL
            Self::InvalidDeviceSize => -22,    // EINVAL
            Self::IoError => -5,               // EIO
        }
    }
}

impl fmt::Display for BlkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSpecification => write!(f, "Bad device specification"),
            Self::DeviceNotFound => write!(f, "Device not found"),
            Self::Unsupported => write!(f, "Partition table format not recognized"),
            Self::NoPartitionTable => write!(f, "No partition table"),
            Self::PartitionNotFound => write!(f, "Partition not found"),
            Self::NoValidPartitions => write!(f, "No valid partitions found"),
            Self::InvalidPartitionType => write!(f, "Invalid partition type"),
            Self::InvalidDeviceSize => write!(f, "Invalid device size"),
            Self::IoError => write!(f, "Block I/O error"),
        }
    }
}

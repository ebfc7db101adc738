/*++

Licensed under the Apache-2.0 license.

File Name:

    flash.rs

Abstract:

    File contains the block-device and NOR-flash adapter traits and the
    partition table lookup interface.

--*/

use fwu_error::FwuResult;

/// MMC/SD transfer granularity in bytes.
pub const MMC_BLOCK_SIZE: usize = 512;

/// Block-oriented storage device (eMMC, SD card).
///
/// `buf` lengths must be a multiple of [`MMC_BLOCK_SIZE`]. Both operations
/// return the number of bytes actually moved; a short count is how a
/// partial transfer is reported, never by silent truncation.
pub trait BlockDevice {
    fn read_blocks(&mut self, lba: u32, buf: &mut [u8]) -> FwuResult<usize>;

    fn write_blocks(&mut self, lba: u32, buf: &[u8]) -> FwuResult<usize>;
}

/// Byte-addressed NOR flash behind a QSPI controller.
pub trait NorFlash {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> FwuResult<usize>;

    fn write(&mut self, offset: u64, buf: &[u8]) -> FwuResult<()>;
}

/// One GPT partition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PartitionEntry {
    /// Byte offset of the partition on the device
    pub start: u64,

    /// Partition length in bytes
    pub length: u64,
}

/// GPT partition lookup.
pub trait PartitionTable {
    /// (Re-)read the partition table from the device.
    fn init(&mut self) -> FwuResult<()>;

    fn entry(&self, name: &str) -> Option<PartitionEntry>;
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    io.rs

Abstract:

    File contains the boot image source selection policy and the chunked
    flash write/verify helpers used by the write commands.

--*/

use fwu_drivers::{cprintln, BlockDevice, NorFlash, PartitionEntry, PartitionTable, MMC_BLOCK_SIZE};
use fwu_error::{FwuError, FwuResult};
use fwu_image_types::Uuid;

/// Name of the primary FIP partition.
pub const FW_PARTITION_NAME: &str = "fip";
/// Name of the backup FIP partition.
pub const FW_BACKUP_PARTITION_NAME: &str = "fip.bak";

/// Bytes moved per chunk of a bulk flash transfer.
const XFER_CHUNK: usize = 1024 * 1024;

/// Strapping-selected boot source.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BootSource {
    Emmc = 0,
    Qspi = 1,
    Sdmmc = 2,
    None = 3,
}

impl TryFrom<u32> for BootSource {
    type Error = FwuError;

    fn try_from(value: u32) -> FwuResult<Self> {
        match value {
            0 => Ok(Self::Emmc),
            1 => Ok(Self::Qspi),
            2 => Ok(Self::Sdmmc),
            3 => Ok(Self::None),
            _ => Err(FwuError::IO_UNSUPPORTED_SOURCE),
        }
    }
}

/// Returns true for sources the write commands may target.
pub fn valid_write_dev(source: BootSource) -> bool {
    matches!(
        source,
        BootSource::Emmc | BootSource::Sdmmc | BootSource::Qspi
    )
}

/// Boot images this policy can locate.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ImageId {
    Bl2,
    Bl32,
    Bl33,
    Fip,
}

pub const UUID_BL2: Uuid = [
    0x5f, 0xf9, 0xec, 0x0b, 0x4d, 0x22, 0x3e, 0x4d, 0xa5, 0x44, 0xc3, 0x9d, 0x81, 0xc7, 0x3f,
    0x0a,
];
pub const UUID_BL32: Uuid = [
    0x05, 0xd0, 0xe1, 0x89, 0x53, 0xdc, 0x13, 0x47, 0x8d, 0x2b, 0x50, 0x0a, 0x4b, 0x7a, 0x3e,
    0x38,
];
pub const UUID_BL33: Uuid = [
    0xd6, 0xd0, 0xee, 0xa7, 0xfc, 0xea, 0xd5, 0x4b, 0x97, 0x82, 0x99, 0x34, 0xf2, 0x34, 0xb6,
    0xe4,
];

impl ImageId {
    /// ToC identity of images that live inside a FIP.
    pub fn uuid(&self) -> Option<&'static Uuid> {
        match self {
            ImageId::Bl2 => Some(&UUID_BL2),
            ImageId::Bl32 => Some(&UUID_BL32),
            ImageId::Bl33 => Some(&UUID_BL33),
            ImageId::Fip => None,
        }
    }
}

/// Which copy of the FIP a lookup should prefer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FipSelect {
    /// Primary partition
    Default,
    /// Backup partition
    Fallback,
    /// Raw device offset zero
    Raw,
}

/// Where an image can be fetched from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ImageLocation {
    /// A block-device byte region.
    BlockRegion { offset: u64, length: u64 },

    /// A memory-mapped flash region.
    MemoryMapped { offset: u64, length: u64 },

    /// A RAM-resident FIP registered by the bootstrap monitor.
    RamFip { offset: u64, length: u64 },

    /// An entry inside the currently selected FIP.
    FipEntry { uuid: &'static Uuid },
}

/// Image source selection policy.
///
/// Maps (image, boot source) to a concrete backend, falling back from
/// the primary FIP partition to the backup partition to a raw
/// offset-zero FIP.
pub struct IoPolicy {
    ram_fip: Option<(u64, u64)>,
    qspi_fip_offset: u64,
    qspi_fip_length: u64,
}

impl IoPolicy {
    pub fn new(qspi_fip_offset: u64, qspi_fip_length: u64) -> Self {
        Self {
            ram_fip: None,
            qspi_fip_offset,
            qspi_fip_length,
        }
    }

    /// Registers an uploaded RAM-resident FIP, which takes precedence
    /// over every device-backed source.
    pub fn enable_ram_fip(&mut self, offset: u64, length: u64) {
        self.ram_fip = Some((offset, length));
    }

    /// The registered RAM-resident FIP, if any.
    pub fn ram_fip(&self) -> Option<(u64, u64)> {
        self.ram_fip
    }

    /// Locates `image` on `source` for one specific FIP copy.
    pub fn locate(
        &self,
        image: ImageId,
        source: BootSource,
        select: FipSelect,
        partitions: &dyn PartitionTable,
    ) -> FwuResult<ImageLocation> {
        if let Some(uuid) = image.uuid() {
            return Ok(ImageLocation::FipEntry { uuid });
        }

        if let Some((offset, length)) = self.ram_fip {
            return Ok(ImageLocation::RamFip { offset, length });
        }

        match source {
            BootSource::Emmc | BootSource::Sdmmc => match select {
                FipSelect::Raw => Ok(ImageLocation::BlockRegion {
                    offset: 0,
                    length: 0,
                }),
                _ => {
                    let name = match select {
                        FipSelect::Fallback => FW_BACKUP_PARTITION_NAME,
                        _ => FW_PARTITION_NAME,
                    };
                    let entry = partitions
                        .entry(name)
                        .ok_or(FwuError::IO_PARTITION_NOT_FOUND)?;
                    Ok(ImageLocation::BlockRegion {
                        offset: entry.start,
                        length: entry.length,
                    })
                }
            },
            BootSource::Qspi => Ok(ImageLocation::MemoryMapped {
                offset: self.qspi_fip_offset,
                length: self.qspi_fip_length,
            }),
            BootSource::None => Err(FwuError::IO_UNSUPPORTED_SOURCE),
        }
    }

    /// Locates the FIP with the full fallback chain: primary partition,
    /// then backup partition, then raw offset zero.
    pub fn locate_with_fallback(
        &self,
        image: ImageId,
        source: BootSource,
        partitions: &dyn PartitionTable,
    ) -> FwuResult<ImageLocation> {
        for select in [FipSelect::Default, FipSelect::Fallback, FipSelect::Raw] {
            match self.locate(image, source, select, partitions) {
                Ok(location) => return Ok(location),
                Err(err) if err == FwuError::IO_PARTITION_NOT_FOUND => continue,
                Err(err) => return Err(err),
            }
        }
        Err(FwuError::IO_IMAGE_NOT_FOUND)
    }
}

/// Writes `data` to a block device at byte `offset`, chunked, padding
/// the final partial block.
///
/// A device that moves fewer bytes than asked fails the call with the
/// written count logged; nothing is silently truncated.
pub fn block_write(dev: &mut dyn BlockDevice, offset: u64, data: &[u8]) -> FwuResult<()> {
    debug_assert_eq!(offset as usize % MMC_BLOCK_SIZE, 0);
    let mut lba = (offset as usize / MMC_BLOCK_SIZE) as u32;

    let full_len = data.len() / MMC_BLOCK_SIZE * MMC_BLOCK_SIZE;
    let mut written = 0;
    while written < full_len {
        let chunk = XFER_CHUNK.min(full_len - written);
        let n = dev.write_blocks(lba, &data[written..written + chunk])?;
        if n != chunk {
            cprintln!(
                "[flash] incomplete write at lba {}, wrote {} of {} bytes",
                lba,
                written + n,
                data.len()
            );
            return Err(FwuError::DRIVER_FLASH_WRITE_INCOMPLETE);
        }
        written += chunk;
        lba += (chunk / MMC_BLOCK_SIZE) as u32;
    }

    let remainder = &data[full_len..];
    if !remainder.is_empty() {
        let mut block = [0u8; MMC_BLOCK_SIZE];
        block[..remainder.len()].copy_from_slice(remainder);
        let n = dev.write_blocks(lba, &block)?;
        if n != MMC_BLOCK_SIZE {
            cprintln!("[flash] incomplete write of final block at lba {}", lba);
            return Err(FwuError::DRIVER_FLASH_WRITE_INCOMPLETE);
        }
    }
    Ok(())
}

/// Reads back a just-written block region and compares it to `data`.
pub fn block_verify(dev: &mut dyn BlockDevice, offset: u64, data: &[u8]) -> FwuResult<()> {
    let mut lba = (offset as usize / MMC_BLOCK_SIZE) as u32;
    let mut compared = 0;
    let mut block = [0u8; MMC_BLOCK_SIZE];

    while compared < data.len() {
        let n = dev.read_blocks(lba, &mut block)?;
        if n != MMC_BLOCK_SIZE {
            return Err(FwuError::IO_READBACK_SHORT);
        }
        let chunk = MMC_BLOCK_SIZE.min(data.len() - compared);
        if block[..chunk] != data[compared..compared + chunk] {
            cprintln!("[flash] verify mismatch near byte {}", compared);
            return Err(FwuError::IO_READBACK_MISMATCH);
        }
        compared += chunk;
        lba += 1;
    }
    Ok(())
}

/// Reads back a just-written NOR region and compares it to `data`.
pub fn nor_verify(dev: &mut dyn NorFlash, offset: u64, data: &[u8]) -> FwuResult<()> {
    let mut compared = 0;
    let mut chunk_buf = [0u8; MMC_BLOCK_SIZE];

    while compared < data.len() {
        let chunk = chunk_buf.len().min(data.len() - compared);
        let n = dev.read(offset + compared as u64, &mut chunk_buf[..chunk])?;
        if n != chunk {
            return Err(FwuError::IO_READBACK_SHORT);
        }
        if chunk_buf[..chunk] != data[compared..compared + chunk] {
            cprintln!("[flash] verify mismatch near byte {}", compared);
            return Err(FwuError::IO_READBACK_MISMATCH);
        }
        compared += chunk;
    }
    Ok(())
}

/// Updates one FIP partition, refusing images larger than the partition.
pub fn fip_update(
    dev: &mut dyn BlockDevice,
    entry: Option<PartitionEntry>,
    name: &str,
    data: &[u8],
    verify: bool,
) -> FwuResult<()> {
    let entry = entry.ok_or(FwuError::IO_PARTITION_NOT_FOUND)?;
    if data.len() as u64 > entry.length {
        cprintln!(
            "[flash] partition {} holds {} bytes, {} uploaded",
            name,
            entry.length as u32,
            data.len()
        );
        return Err(FwuError::IO_PARTITION_TOO_SMALL);
    }
    block_write(dev, entry.start, data)?;
    if verify {
        block_verify(dev, entry.start, data)?;
    }
    Ok(())
}

/*++

Licensed under the Apache-2.0 license.

File Name:

   generator.rs

Abstract:

    File contains the FIP builder implementation.

--*/

use anyhow::{bail, Result};
use fwu_image_types::{
    FipTocEntry, FipTocHeader, Uuid, FIP_TOC_ENTRY_BYTE_SIZE, FIP_TOC_HEADER_BYTE_SIZE,
    TOC_HEADER_NAME, UUID_NULL,
};
use zerocopy::AsBytes;

/// Builds a FIP container image in memory.
///
/// Payload offsets are aligned (4 bytes by default, matching what the
/// binding stage requires of a producer) and the ToC is closed with the
/// all-zero terminator entry whose offset records the start of the
/// payload region.
pub struct FipBuilder {
    serial_number: u32,
    align: usize,
    images: Vec<(Uuid, Vec<u8>)>,
}

impl FipBuilder {
    pub fn new(serial_number: u32) -> Self {
        Self {
            serial_number,
            align: 4,
            images: Vec::new(),
        }
    }

    /// Sets the payload alignment. Must be a power of two.
    pub fn align(&mut self, align: usize) -> &mut Self {
        self.align = align;
        self
    }

    pub fn add_image(&mut self, uuid: Uuid, payload: Vec<u8>) -> &mut Self {
        self.images.push((uuid, payload));
        self
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        if self.serial_number == 0 {
            bail!("serial number 0 is reserved for invalid packages");
        }
        if !self.align.is_power_of_two() {
            bail!("alignment {} is not a power of two", self.align);
        }

        let toc_size =
            FIP_TOC_HEADER_BYTE_SIZE + FIP_TOC_ENTRY_BYTE_SIZE * (self.images.len() + 1);
        let payload_base = align_up(toc_size, self.align);

        let mut header = FipTocHeader::default();
        header.name.set(TOC_HEADER_NAME);
        header.serial_number.set(self.serial_number);

        let mut out = header.as_bytes().to_vec();

        let mut offset = payload_base;
        for (uuid, payload) in &self.images {
            let mut entry = FipTocEntry::default();
            entry.uuid = *uuid;
            entry.offset_address.set(offset as u64);
            entry.size.set(payload.len() as u64);
            out.extend_from_slice(entry.as_bytes());
            offset = align_up(offset + payload.len(), self.align);
        }

        let mut terminator = FipTocEntry::default();
        terminator.uuid = UUID_NULL;
        terminator.offset_address.set(payload_base as u64);
        out.extend_from_slice(terminator.as_bytes());

        for (_, payload) in &self.images {
            out.resize(align_up(out.len(), self.align), 0);
            out.extend_from_slice(payload);
        }
        out.resize(align_up(out.len(), self.align), 0);

        Ok(out)
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

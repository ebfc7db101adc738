/*++

Licensed under the Apache-2.0 license.

File Name:

    toc.rs

Abstract:

    This file implements the FIP table-of-contents walker: header
    validation and a lazy, bounds-checked cursor over the ToC entries.

--*/

use fwu_error::{FwuError, FwuResult};
use fwu_image_types::{
    FipTocEntry, FipTocHeader, Uuid, FIP_TOC_ENTRY_BYTE_SIZE, FIP_TOC_HEADER_BYTE_SIZE,
    UUID_BYTE_SIZE,
};
use zerocopy::FromBytes;

/// The wire format requires natural alignment for the 64-bit offset and
/// size fields, which the producer guarantees with 4-byte alignment of
/// the container.
pub(crate) fn is_aligned(addr: usize) -> bool {
    addr & 3 == 0
}

/// Reads the ToC header copy out of a package, if enough bytes exist.
pub fn read_header(fip: &[u8]) -> Option<FipTocHeader> {
    FipTocHeader::read_from_prefix(fip)
}

/// Validates the package layout: header and first-entry placement must be
/// 4-byte aligned and the header must carry the FIP name and a non-zero
/// serial number.
pub fn validate_header(fip: &[u8]) -> FwuResult<()> {
    let base = fip.as_ptr() as usize;
    if !is_aligned(base) || !is_aligned(base + FIP_TOC_HEADER_BYTE_SIZE) {
        return Err(FwuError::FW_FIP_ALIGN);
    }
    let header = read_header(fip).ok_or(FwuError::FW_FIP_INCOMPLETE)?;
    if !header.is_valid() {
        return Err(FwuError::FW_FIP_HDR);
    }
    Ok(())
}

/// One step of the ToC walk.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TocStep {
    /// An image entry; the cursor has advanced past it.
    Entry(FipTocEntry),

    /// The all-zero terminator; the walk ended successfully.
    Terminator,
}

/// Lazy cursor over the ToC entries of a validated package.
///
/// The metadata region ends where the first entry's payload begins; a
/// walk that reaches that boundary without seeing the terminator reports
/// the package as unterminated.
pub struct TocCursor {
    offset: usize,
    toc_end: usize,
    total_len: usize,
}

impl TocCursor {
    /// Validates the package header and positions the cursor on entry 0.
    pub fn new(fip: &[u8]) -> FwuResult<Self> {
        validate_header(fip)?;

        let first = entry_at(fip, FIP_TOC_HEADER_BYTE_SIZE).ok_or(FwuError::FW_FIP_INCOMPLETE)?;
        let toc_end = usize::try_from(first.offset_address.get())
            .map_err(|_| FwuError::FW_FIP_INCOMPLETE)?;

        Ok(Self {
            offset: FIP_TOC_HEADER_BYTE_SIZE,
            toc_end,
            total_len: fip.len(),
        })
    }

    /// Byte offset of the first image payload; everything below it is
    /// metadata.
    pub fn first_payload_offset(&self) -> usize {
        self.toc_end
    }

    /// Advances one entry.
    ///
    /// Reaching the metadata boundary without a terminator is
    /// FW_TOC_TERM_MISSING; an entry record extending past the claimed
    /// package length is FW_FIP_INCOMPLETE, distinct from the successful
    /// end of the walk.
    pub fn next(&mut self, fip: &[u8]) -> FwuResult<TocStep> {
        if self.offset >= self.toc_end {
            return Err(FwuError::FW_TOC_TERM_MISSING);
        }
        if let Some(uuid) = uuid_at(fip, self.offset) {
            if uuid == fwu_image_types::UUID_NULL {
                return Ok(TocStep::Terminator);
            }
        }
        if self.offset + FIP_TOC_ENTRY_BYTE_SIZE > self.total_len {
            return Err(FwuError::FW_FIP_INCOMPLETE);
        }
        let entry = entry_at(fip, self.offset).ok_or(FwuError::FW_FIP_INCOMPLETE)?;
        self.offset += FIP_TOC_ENTRY_BYTE_SIZE;
        Ok(TocStep::Entry(entry))
    }
}

/// Finds the entry naming `uuid`, walking until the terminator.
pub fn locate(fip: &[u8], uuid: &Uuid) -> FwuResult<Option<FipTocEntry>> {
    let mut cursor = TocCursor::new(fip)?;
    loop {
        match cursor.next(fip)? {
            TocStep::Terminator => return Ok(None),
            TocStep::Entry(entry) => {
                if &entry.uuid == uuid {
                    return Ok(Some(entry));
                }
            }
        }
    }
}

fn entry_at(fip: &[u8], offset: usize) -> Option<FipTocEntry> {
    FipTocEntry::read_from_prefix(fip.get(offset..)?)
}

fn uuid_at(fip: &[u8], offset: usize) -> Option<Uuid> {
    let bytes = fip.get(offset..offset + UUID_BYTE_SIZE)?;
    let mut uuid = Uuid::default();
    uuid.copy_from_slice(bytes);
    Some(uuid)
}

/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains the wire-exact data structures of the Firmware Image
    Package (FIP) container and the per-image encryption header.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

use core::mem::size_of;
use core::ops::Range;

use zerocopy::byteorder::{LittleEndian, U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Value of the ToC header `name` field identifying a FIP container.
pub const TOC_HEADER_NAME: u32 = 0xAA64_0001;

/// Value of the `magic` field identifying a per-image encryption header.
pub const ENC_HEADER_MAGIC: u32 = 0xAA64_0001;

/// GCM nonce bytes carried in an encryption header.
pub const ENC_IV_SIZE: usize = 12;
/// Capacity of the IV field in the encryption header.
pub const ENC_MAX_IV_SIZE: usize = 16;
/// GCM authentication tag size in bytes.
pub const ENC_TAG_SIZE: usize = 16;
/// Symmetric firmware-encryption key size in bytes.
pub const ENC_KEY_SIZE: usize = 32;

/// `dec_algo` value selecting AES-GCM decryption.
pub const DEC_ALGO_GCM: u16 = 0;

/// Status bit OR-ed into the header flags once an image has been
/// re-encrypted in the field.
pub const FW_ENC_STATUS_FLAG_MASK: u16 = 0x1;

pub const UUID_BYTE_SIZE: usize = 16;
pub type Uuid = [u8; UUID_BYTE_SIZE];
pub const UUID_NULL: Uuid = [0u8; UUID_BYTE_SIZE];

pub const FIP_TOC_HEADER_BYTE_SIZE: usize = size_of::<FipTocHeader>();
pub const FIP_TOC_ENTRY_BYTE_SIZE: usize = size_of::<FipTocEntry>();
pub const ENC_HEADER_BYTE_SIZE: usize = size_of::<FwEncHeader>();

/// Firmware-encryption key selector carried in the header flags field.
#[repr(u16)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FwEncStatus {
    /// Encrypted with the Secure Storage Key (producer output).
    Ssk = 0,

    /// Encrypted with the Backup Secure Storage Key (field binding).
    Bssk = 1,
}

impl From<FwEncStatus> for u16 {
    /// Converts to this type from the input type.
    fn from(value: FwEncStatus) -> Self {
        value as u16
    }
}

/// FIP Table-of-Contents header
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct FipTocHeader {
    /// Container identification constant
    pub name: U32<LittleEndian>,

    /// Package serial number; zero is reserved and invalid
    pub serial_number: U32<LittleEndian>,

    /// Builder flags; carried but not interpreted
    pub flags: U64<LittleEndian>,
}

impl FipTocHeader {
    /// Returns true if the header identifies a FIP container.
    pub fn is_valid(&self) -> bool {
        self.name.get() == TOC_HEADER_NAME && self.serial_number.get() != 0
    }
}

/// FIP Table-of-Contents entry
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct FipTocEntry {
    /// Image identity
    pub uuid: Uuid,

    /// Payload offset in bytes from the start of the package
    pub offset_address: U64<LittleEndian>,

    /// Payload size in bytes
    pub size: U64<LittleEndian>,

    /// Builder flags; carried but not interpreted
    pub flags: U64<LittleEndian>,
}

impl FipTocEntry {
    /// Returns true if this entry is the all-zero ToC terminator.
    pub fn is_terminator(&self) -> bool {
        self.uuid == UUID_NULL
    }

    /// Byte range of this entry's payload within the package.
    pub fn image_range(&self) -> Range<u64> {
        let offset = self.offset_address.get();
        offset..offset + self.size.get()
    }
}

/// Per-image firmware encryption header, prepended to an image payload
/// when the image ships encrypted.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct FwEncHeader {
    /// Encryption header identification constant
    pub magic: U32<LittleEndian>,

    /// Decryption algorithm for the payload
    pub dec_algo: U16<LittleEndian>,

    /// Firmware encryption status
    pub flags: U16<LittleEndian>,

    /// Bytes of `iv` in use
    pub iv_len: U16<LittleEndian>,

    /// Bytes of `tag` in use
    pub tag_len: U16<LittleEndian>,

    /// Initialization vector
    pub iv: [u8; ENC_MAX_IV_SIZE],

    /// Authentication tag
    pub tag: [u8; ENC_TAG_SIZE],
}

impl FwEncHeader {
    /// Returns true if the magic identifies this as an encryption header.
    pub fn is_present(&self) -> bool {
        self.magic.get() == ENC_HEADER_MAGIC
    }

    /// The in-use prefix of the IV field.
    pub fn iv(&self) -> &[u8] {
        let len = usize::from(self.iv_len.get()).min(ENC_MAX_IV_SIZE);
        &self.iv[..len]
    }

    /// The in-use prefix of the tag field.
    pub fn tag(&self) -> &[u8] {
        let len = usize::from(self.tag_len.get()).min(ENC_TAG_SIZE);
        &self.tag[..len]
    }
}

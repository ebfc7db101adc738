/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the error type and error constants used by the library
    for error handling.

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Fwu Error Type
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FwuError(pub NonZeroU32);

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: FwuError = FwuError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl FwuError {
    /// Create a fwu error; intended to only be used from const contexts, as we
    /// don't want runtime panics if val is zero. The preferred way to get a
    /// FwuError from a u32 is `FwuError::try_from()` from the `TryFrom` trait
    /// impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("FwuError cannot be 0"),
        }
    }

    // Use the macro to define all error constants.
    //
    // The firmware-binding codes keep the wire-stable values of the closed
    // fw_bind result enumeration (16..). Driver, IO and bootstrap codes are
    // partitioned into their own ranges.
    define_error_constants![
        (FW_FIP_HDR, 16, "Header check of FIP failed"),
        (FW_FIP_ALIGN, 17, "FIP structure misaligned"),
        (FW_FIP_INCOMPLETE, 18, "FIP truncated or garbled"),
        (FW_TOC_TERM_MISSING, 19, "FIP ToC terminator entry missing"),
        (FW_NOT_SSK_ENCRYPTED, 20, "Image is not SSK encrypted"),
        (FW_SSK_FAILURE, 21, "Failed to obtain SSK key"),
        (FW_DECRYPT, 22, "Failed to decrypt image"),
        (FW_BSSK_FAILURE, 23, "Failed to obtain BSSK key"),
        (FW_ENCRYPT, 24, "Failed to encrypt image"),
        (
            DRIVER_CONSOLE_CLOSED,
            0x00010001,
            "Console transport closed by peer"
        ),
        (DRIVER_POLL_TIMEOUT, 0x00010002, "Bounded poll timed out"),
        (DRIVER_OTP_READ_FAILURE, 0x00010003, "OTP read failed"),
        (DRIVER_OTP_WRITE_FAILURE, 0x00010004, "OTP write failed"),
        (
            DRIVER_OTP_OUT_OF_BOUNDS,
            0x00010005,
            "OTP access out of bounds"
        ),
        (
            DRIVER_OTP_COMMIT_FAILURE,
            0x00010006,
            "OTP emulation commit failed"
        ),
        (
            DRIVER_KEY_UNAVAILABLE,
            0x00010007,
            "Encryption key not available from secure storage"
        ),
        (DRIVER_AES_GCM_FAILURE, 0x00010008, "AES-GCM engine failure"),
        (
            DRIVER_AES_TAG_MISMATCH,
            0x00010009,
            "AES-GCM authentication tag mismatch"
        ),
        (DRIVER_SHA_FAILURE, 0x0001000A, "SHA engine failure"),
        (
            DRIVER_SJTAG_CHALLENGE_FAILURE,
            0x0001000B,
            "SJTAG challenge read failed"
        ),
        (
            DRIVER_SJTAG_UNLOCK_FAILURE,
            0x0001000C,
            "SJTAG unlock failed"
        ),
        (
            DRIVER_DDR_INIT_FAILURE,
            0x0001000D,
            "DDR controller initialization failed"
        ),
        (DRIVER_INFLATE_FAILURE, 0x0001000E, "Gzip inflate failed"),
        (DRIVER_FLASH_READ_FAILURE, 0x0001000F, "Flash read failed"),
        (
            DRIVER_FLASH_WRITE_INCOMPLETE,
            0x00010010,
            "Flash write incomplete"
        ),
        (
            IO_UNSUPPORTED_SOURCE,
            0x00020001,
            "Unsupported boot source for request"
        ),
        (IO_PARTITION_NOT_FOUND, 0x00020002, "Partition not found"),
        (
            IO_PARTITION_TOO_SMALL,
            0x00020003,
            "Partition too small for image"
        ),
        (
            IO_READBACK_SHORT,
            0x00020004,
            "Device readback returned short data"
        ),
        (
            IO_READBACK_MISMATCH,
            0x00020005,
            "Device readback did not match written data"
        ),
        (
            IO_IMAGE_NOT_FOUND,
            0x00020006,
            "No image source applies to the request"
        ),
        (
            BOOTSTRAP_GARBLED_REQUEST,
            0x00030001,
            "Request frame failed format or CRC validation"
        ),
        (
            BOOTSTRAP_AUTH_FAILURE,
            0x00030002,
            "Staged image authentication failed"
        ),
        (
            BOOTSTRAP_EXEC_FAILURE,
            0x00030003,
            "Staged image execution refused"
        ),
    ];
}

impl From<FwuError> for u32 {
    /// Converts to this type from the input type.
    fn from(val: FwuError) -> Self {
        val.0.get()
    }
}

impl TryFrom<u32> for FwuError {
    type Error = TryFromIntError;

    fn try_from(val: u32) -> Result<Self, Self::Error> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(Self(val)),
            Err(err) => Err(err),
        }
    }
}

/// Result type containing a FwuError on failure
pub type FwuResult<T> = Result<T, FwuError>;

/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Firmware Image Package binding library. Walks a FIP's table of
    contents and re-binds every encrypted image from the production SSK
    to the device BSSK, in place.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

mod binder;
pub mod toc;

pub use binder::FipBinder;

use fwu_error::{FwuError, FwuResult};
use fwu_image_types::{FwEncStatus, ENC_IV_SIZE, ENC_KEY_SIZE, ENC_TAG_SIZE};

/// FIP Bind Environment
///
/// Supplies the key provisioning and cryptographic primitives the binder
/// consumes. Firmware backs this with the OTP key store and the AES/TRNG
/// engines; tests substitute instrumented fakes.
pub trait FipBindEnv {
    /// Fetches the selected firmware encryption key into `key` and
    /// returns the number of key bytes.
    fn enc_key(&mut self, kind: FwEncStatus, key: &mut [u8; ENC_KEY_SIZE]) -> FwuResult<usize>;

    /// AES-GCM decrypt of `data` in place.
    fn aes_gcm_decrypt(
        &mut self,
        data: &mut [u8],
        key: &[u8],
        iv: &[u8],
        tag: &[u8],
    ) -> FwuResult<()>;

    /// AES-GCM encrypt of `data` in place, producing `tag`.
    fn aes_gcm_encrypt(
        &mut self,
        data: &mut [u8],
        key: &[u8],
        iv: &[u8; ENC_IV_SIZE],
        tag: &mut [u8; ENC_TAG_SIZE],
    ) -> FwuResult<()>;

    /// One word of hardware randomness.
    fn trng_word(&mut self) -> u32;
}

/// Maps a bind result code to the operator-facing reason string.
///
/// Total by construction: codes this build does not know map to the
/// default string instead of faulting the lookup.
pub fn bind_err_to_str(err: FwuError) -> &'static str {
    if err == FwuError::FW_FIP_HDR {
        "Header check of FIP failed"
    } else if err == FwuError::FW_FIP_ALIGN {
        "FIP needs to be produced with FIP_ALIGN"
    } else if err == FwuError::FW_FIP_INCOMPLETE {
        "FIP is incomplete (truncated, garbled)"
    } else if err == FwuError::FW_TOC_TERM_MISSING {
        "FIP does not have a ToC terminator entry"
    } else if err == FwuError::FW_NOT_SSK_ENCRYPTED {
        "FIP must be encrypted with SSK"
    } else if err == FwuError::FW_SSK_FAILURE {
        "Failed to obtain SSK key"
    } else if err == FwuError::FW_DECRYPT {
        "Failed to decrypt FIP image"
    } else if err == FwuError::FW_BSSK_FAILURE {
        "Failed to obtain BSSK key"
    } else if err == FwuError::FW_ENCRYPT {
        "Failed to encrypt FIP image"
    } else {
        "Unknown error"
    }
}

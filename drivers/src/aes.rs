/*++

Licensed under the Apache-2.0 license.

File Name:

    aes.rs

Abstract:

    File contains the AES-GCM engine adapter trait.

--*/

use fwu_error::FwuResult;
use fwu_image_types::{ENC_IV_SIZE, ENC_TAG_SIZE};

/// AES-GCM authenticated encryption engine.
///
/// Both operations transform `data` in place. Decrypt fails (and must
/// leave no plaintext behind) when the authentication tag does not match.
pub trait AesGcm {
    fn gcm_encrypt(
        &mut self,
        data: &mut [u8],
        key: &[u8],
        iv: &[u8; ENC_IV_SIZE],
        tag: &mut [u8; ENC_TAG_SIZE],
    ) -> FwuResult<()>;

    fn gcm_decrypt(
        &mut self,
        data: &mut [u8],
        key: &[u8],
        iv: &[u8],
        tag: &[u8],
    ) -> FwuResult<()>;
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    binder.rs

Abstract:

    This file is the main implementation of the FIP binder. It converts
    every SSK-encrypted image in a package to a BSSK-encrypted image, in
    place, stopping at the first failure.

--*/

use crate::toc::{self, TocCursor, TocStep};
use crate::FipBindEnv;
use fwu_drivers::cprintln;
use fwu_error::{FwuError, FwuResult};
use fwu_image_types::{
    FwEncHeader, FwEncStatus, DEC_ALGO_GCM, ENC_HEADER_BYTE_SIZE, ENC_IV_SIZE, ENC_KEY_SIZE,
    ENC_TAG_SIZE, FW_ENC_STATUS_FLAG_MASK,
};
use zerocopy::FromBytes;
use zeroize::Zeroize;

/// FIP Binder
///
/// Owns the one-shot key scratch buffer so the acquire-use-wipe protocol
/// on key material has a single home.
pub struct FipBinder<Env: FipBindEnv> {
    /// Bind environment
    env: Env,

    /// Key scratch; holds SSK or BSSK bytes for exactly one cryptographic
    /// operation at a time and is wiped after each use.
    key: [u8; ENC_KEY_SIZE],
}

impl<Env: FipBindEnv> FipBinder<Env> {
    /// Create a new instance of `FipBinder`
    ///
    /// # Arguments
    ///
    /// * `env` - Bind environment
    pub fn new(env: Env) -> Self {
        Self {
            env,
            key: [0u8; ENC_KEY_SIZE],
        }
    }

    /// Re-binds every image of the package in `fip` from SSK to BSSK
    /// encryption.
    ///
    /// The first failing image aborts the whole bind; a package missing
    /// its ToC terminator is rejected even if every image is fine.
    pub fn bind_fip(&mut self, fip: &mut [u8]) -> FwuResult<()> {
        let mut cursor = TocCursor::new(fip)?;

        loop {
            match cursor.next(fip)? {
                TocStep::Terminator => return Ok(()),
                TocStep::Entry(entry) => {
                    let offset = usize::try_from(entry.offset_address.get())
                        .map_err(|_| FwuError::FW_FIP_INCOMPLETE)?;

                    // The encryption-header-sized prefix must lie inside
                    // the package before it can be inspected.
                    if offset.checked_add(ENC_HEADER_BYTE_SIZE).is_none()
                        || offset + ENC_HEADER_BYTE_SIZE > fip.len()
                    {
                        return Err(FwuError::FW_FIP_INCOMPLETE);
                    }
                    if !toc::is_aligned(fip.as_ptr() as usize + offset) {
                        return Err(FwuError::FW_FIP_ALIGN);
                    }

                    let size = usize::try_from(entry.size.get())
                        .map_err(|_| FwuError::FW_FIP_INCOMPLETE)?;
                    self.rebind_image(fip, offset, size)?;
                }
            }
        }
    }

    /// Re-binds a single image payload located at `offset`.
    ///
    /// An image without the encryption-header magic is passed through
    /// untouched; not every image in a package is encrypted.
    fn rebind_image(&mut self, fip: &mut [u8], offset: usize, size: usize) -> FwuResult<()> {
        let header =
            FwEncHeader::read_from_prefix(&fip[offset..]).ok_or(FwuError::FW_FIP_INCOMPLETE)?;
        if !header.is_present() {
            cprintln!("[bind] no encryption header, image passed through");
            return Ok(());
        }

        // The whole image must lie inside the package before any payload
        // byte is dereferenced.
        if size < ENC_HEADER_BYTE_SIZE
            || offset.checked_add(size).is_none()
            || offset + size > fip.len()
        {
            return Err(FwuError::FW_FIP_INCOMPLETE);
        }

        self.decrypt_image(fip, offset, size)?;
        self.encrypt_image(fip, offset, size)
    }

    /// Decrypt phase: strict SSK gating, then GCM decrypt in place with
    /// the IV and tag shipped in the header.
    fn decrypt_image(&mut self, fip: &mut [u8], offset: usize, size: usize) -> FwuResult<()> {
        let header =
            FwEncHeader::read_from_prefix(&fip[offset..]).ok_or(FwuError::FW_FIP_INCOMPLETE)?;

        // Only the single producer-output state is accepted here; any
        // other flag combination is not an SSK image.
        if header.flags.get() != u16::from(FwEncStatus::Ssk) {
            return Err(FwuError::FW_NOT_SSK_ENCRYPTED);
        }

        let key_len = match self.env.enc_key(FwEncStatus::Ssk, &mut self.key) {
            Ok(len) => len.min(ENC_KEY_SIZE),
            Err(_) => {
                self.key.zeroize();
                return Err(FwuError::FW_SSK_FAILURE);
            }
        };

        let payload = &mut fip[offset + ENC_HEADER_BYTE_SIZE..offset + size];
        let result =
            self.env
                .aes_gcm_decrypt(payload, &self.key[..key_len], header.iv(), header.tag());
        self.key.zeroize();

        result.map_err(|_| FwuError::FW_DECRYPT)
    }

    /// Encrypt phase: fresh IV, GCM encrypt in place with the BSSK, then
    /// rewrite the header. The status flag is OR-ed in, not assigned.
    fn encrypt_image(&mut self, fip: &mut [u8], offset: usize, size: usize) -> FwuResult<()> {
        let mut iv = [0u8; ENC_IV_SIZE];
        for chunk in iv.chunks_exact_mut(4) {
            chunk.copy_from_slice(&self.env.trng_word().to_le_bytes());
        }

        let key_len = match self.env.enc_key(FwEncStatus::Bssk, &mut self.key) {
            Ok(len) => len.min(ENC_KEY_SIZE),
            Err(_) => {
                self.key.zeroize();
                return Err(FwuError::FW_BSSK_FAILURE);
            }
        };

        let mut tag = [0u8; ENC_TAG_SIZE];
        let payload = &mut fip[offset + ENC_HEADER_BYTE_SIZE..offset + size];
        let result = self
            .env
            .aes_gcm_encrypt(payload, &self.key[..key_len], &iv, &mut tag);
        self.key.zeroize();
        result.map_err(|_| FwuError::FW_ENCRYPT)?;

        let header =
            FwEncHeader::mut_from_prefix(&mut fip[offset..]).ok_or(FwuError::FW_FIP_INCOMPLETE)?;
        header.dec_algo.set(DEC_ALGO_GCM);
        header.flags.set(header.flags.get() | FW_ENC_STATUS_FLAG_MASK);
        header.tag.copy_from_slice(&tag);
        header.iv[..ENC_IV_SIZE].copy_from_slice(&iv);

        cprintln!("[bind] image re-encrypted");
        Ok(())
    }

    #[cfg(test)]
    fn key_residue(&self) -> &[u8] {
        &self.key
    }
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    keys.rs

Abstract:

    File contains the encryption-key provisioning adapter trait and the
    key derivation helper.

--*/

use fwu_error::FwuResult;
use fwu_image_types::{FwEncStatus, ENC_KEY_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{Sha, ShaAlgo};

pub const KEY32_LEN: usize = 32;

/// A 32-byte key or challenge value, wiped on drop.
#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub struct Key32(pub [u8; KEY32_LEN]);

/// Access to the OTP-backed firmware encryption keys.
///
/// `enc_key` copies the selected key into `key` and returns the number of
/// key bytes. The caller owns the buffer and must wipe it after its single
/// cryptographic use.
pub trait EncKeys {
    fn enc_key(&mut self, kind: FwEncStatus, key: &mut [u8; ENC_KEY_SIZE]) -> FwuResult<usize>;
}

/// Derives a 32-byte key from a 32-byte input and a 32-byte salt by
/// hashing the concatenation.
pub fn derive_key(sha: &mut dyn Sha, input: &Key32, salt: &Key32) -> FwuResult<Key32> {
    let mut buf = Zeroizing::new([0u8; KEY32_LEN * 2]);
    buf[..KEY32_LEN].copy_from_slice(&input.0);
    buf[KEY32_LEN..].copy_from_slice(&salt.0);

    let mut out = Key32::default();
    sha.hash(ShaAlgo::Sha256, &buf[..], &mut out.0)?;
    Ok(out)
}

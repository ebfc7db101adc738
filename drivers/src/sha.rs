/*++

Licensed under the Apache-2.0 license.

File Name:

    sha.rs

Abstract:

    File contains the hash engine adapter trait.

--*/

use fwu_error::FwuResult;

pub const SHA256_DIGEST_BYTE_SIZE: usize = 32;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShaAlgo {
    Sha256,
}

impl ShaAlgo {
    pub fn digest_size(&self) -> usize {
        match self {
            ShaAlgo::Sha256 => SHA256_DIGEST_BYTE_SIZE,
        }
    }
}

/// Hash engine.
pub trait Sha {
    /// Computes the digest of `data` into `digest`, which must be exactly
    /// `algo.digest_size()` bytes.
    fn hash(&mut self, algo: ShaAlgo, data: &[u8], digest: &mut [u8]) -> FwuResult<()>;

    /// Computes the digest of `data` and compares it against `expected`.
    fn verify_hash(&mut self, algo: ShaAlgo, data: &[u8], expected: &[u8]) -> FwuResult<bool> {
        let mut digest = [0u8; SHA256_DIGEST_BYTE_SIZE];
        let digest = &mut digest[..algo.digest_size()];
        self.hash(algo, data, digest)?;
        Ok(digest == expected)
    }
}

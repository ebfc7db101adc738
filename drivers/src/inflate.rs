/*++

Licensed under the Apache-2.0 license.

File Name:

    inflate.rs

Abstract:

    File contains the gzip decompression adapter trait.

--*/

use fwu_error::FwuResult;

/// First two bytes of a gzip stream.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Gzip decompression service.
///
/// Inflate internals live outside this stack; firmware links a platform
/// decompressor and hosted tests supply their own.
pub trait Inflate {
    /// Decompresses the gzip stream in `input` into `output`, returning
    /// the decompressed length.
    fn gunzip(&mut self, input: &[u8], output: &mut [u8]) -> FwuResult<usize>;
}

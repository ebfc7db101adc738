/*++

Licensed under the Apache-2.0 license.

File Name:

    console.rs

Abstract:

    File contains the byte-oriented console transport trait used by the
    bootstrap monitors.

--*/

use fwu_error::FwuResult;

/// Byte-oriented console transport.
///
/// `getc` blocks until a byte is available and fails only when the
/// transport itself is gone (peer hangup, device error). Framing and
/// integrity are handled above this trait.
pub trait Console {
    fn getc(&mut self) -> FwuResult<u8>;

    fn putc(&mut self, byte: u8);

    fn flush(&mut self) {}
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    sjtag.rs

Abstract:

    File contains the secure JTAG unlock adapter trait.

--*/

use fwu_error::FwuResult;

use crate::Key32;

/// Secure JTAG challenge/response unlock.
pub trait Sjtag {
    /// Reads the current unlock challenge.
    fn read_challenge(&mut self, challenge: &mut Key32) -> FwuResult<()>;

    /// Presents the derived unlock response.
    fn write_response(&mut self, response: &Key32) -> FwuResult<()>;
}

/*++

Licensed under the Apache-2.0 license.

File Name:

    ddr.rs

Abstract:

    File contains the DDR controller adapter trait and the configuration
    record exchanged with the bootstrap host tooling.

--*/

use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Memory geometry summary of a DDR configuration.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct DdrInfo {
    /// Clock speed in kHz
    pub speed: U32<LittleEndian>,

    /// Memory size in bytes
    pub size: U32<LittleEndian>,

    /// Data bus width in bits
    pub bus_width: U32<LittleEndian>,
}

/// Fixed-size DDR controller/PHY configuration record.
///
/// The register groups are opaque to this stack; the training engine
/// consumes them. The record crosses the bootstrap wire verbatim, so its
/// size is part of the host protocol.
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned, Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct DdrConfig {
    pub info: DdrInfo,

    /// Controller main register group
    pub main: [U32<LittleEndian>; 8],

    /// Timing register group
    pub timing: [U32<LittleEndian>; 12],

    /// Address mapping register group
    pub mapping: [U32<LittleEndian>; 8],

    /// PHY register group
    pub phy: [U32<LittleEndian>; 8],
}

pub const DDR_CONFIG_BYTE_SIZE: usize = core::mem::size_of::<DdrConfig>();

/// DDR controller and PHY bring-up.
///
/// Training either succeeds or the memory is unusable; the sequencing
/// behind this call is a hardware-defined black box.
pub trait DdrController {
    fn init(&mut self, config: &DdrConfig) -> fwu_error::FwuResult<()>;
}

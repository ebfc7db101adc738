/*++

Licensed under the Apache-2.0 license.

File Name:

    commands.rs

Abstract:

    File contains the bootstrap wire command identifiers.

--*/

/// Single-byte bootstrap command code.
///
/// The same code space serves both boot stages; a stage that does not
/// recognize a code answers NACK("Unknown command").
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CommandId(pub u8);

impl CommandId {
    /// Get version
    pub const VERS: Self = Self(b'V');
    /// Send code/data
    pub const SEND: Self = Self(b'S');
    /// One data chunk of a transfer
    pub const DATA: Self = Self(b'D');
    /// Unzip staged data
    pub const UNZIP: Self = Self(b'Z');
    /// Authenticate staged data
    pub const AUTH: Self = Self(b'U');
    /// Execute downloaded data
    pub const EXEC: Self = Self(b'E');
    /// Override strapping
    pub const STRAP: Self = Self(b'O');
    /// Program OTP data
    pub const OTP_DATA: Self = Self(b'P');
    /// Program OTP random data
    pub const OTP_RANDOM: Self = Self(b'R');
    /// Commit OTP emulation data
    pub const OTP_COMMIT: Self = Self(b'M');
    /// Read OTP data through the emulation layer
    pub const OTP_READ_EMU: Self = Self(b'L');
    /// Read raw OTP fuse data
    pub const OTP_READ_RAW: Self = Self(b'l');
    /// SJTAG read challenge
    pub const SJTAG_RD: Self = Self(b'Q');
    /// SJTAG write response
    pub const SJTAG_WR: Self = Self(b'A');
    /// Copy staged FIP to a flash device
    pub const WRITE_FIP: Self = Self(b'W');
    /// Copy staged raw image to a flash device
    pub const WRITE_IMAGE: Self = Self(b'I');
    /// Re-bind staged FIP from SSK to BSSK
    pub const BIND: Self = Self(b'B');
    /// Continue boot (BL1)
    pub const CONT: Self = Self(b'C');
    /// Reset by exiting the monitor (BL2U)
    pub const RESET: Self = Self(b'e');
    /// Set DDR configuration (BL2U)
    pub const DDR_CFG_SET: Self = Self(b'C');
    /// Get DDR configuration
    pub const DDR_CFG_GET: Self = Self(b'c');
    /// Run DDR self-test
    pub const DDR_TEST: Self = Self(b'T');
    /// Hash staged data
    pub const DATA_HASH: Self = Self(b'H');
    /// Positive response
    pub const ACK: Self = Self(b'a');
    /// Negative response
    pub const NACK: Self = Self(b'n');
}

impl From<CommandId> for u8 {
    /// Converts to this type from the input type.
    fn from(cmd: CommandId) -> Self {
        cmd.0
    }
}

impl From<u8> for CommandId {
    /// Converts to this type from the input type.
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

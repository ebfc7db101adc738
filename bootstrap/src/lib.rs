/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the bootstrap monitor library: the framed
    serial request/response protocol and the provisioning command
    handlers for the BL1 and BL2U boot stages.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

mod bl1;
mod commands;
pub mod ddr_test;
pub mod io;
mod monitor;
mod otp_cmds;
mod session;
pub mod wire;

pub use bl1::{Bl1Monitor, Bl1Platform};
pub use commands::CommandId;
pub use io::{BootSource, FipSelect, ImageId, ImageLocation, IoPolicy};
pub use monitor::{Bl2uMonitor, Bl2uPlatform};
pub use session::Session;
pub use wire::{Channel, ReqFlags, Request, XferOutcome};

/// Largest OTP payload accepted in one request.
pub const MAX_OTP_DATA: usize = 1024;

/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains the hardware adapter traits and support routines shared
    by the secure-boot provisioning stack.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

mod aes;
mod bus;
mod console;
mod ddr;
mod flash;
mod inflate;
mod keys;
mod otp;
mod poll;
pub mod printer;
mod sha;
mod sjtag;
mod trng;

pub use aes::AesGcm;
pub use console::Console;
pub use ddr::{DdrConfig, DdrController, DdrInfo, DDR_CONFIG_BYTE_SIZE};
pub use bus::MemoryBus;
pub use fwu_error::{FwuError, FwuResult};
pub use flash::{BlockDevice, NorFlash, PartitionEntry, PartitionTable, MMC_BLOCK_SIZE};
pub use inflate::{Inflate, GZIP_MAGIC};
pub use keys::{derive_key, EncKeys, Key32, KEY32_LEN};
pub use otp::{otp_all_zero, Otp, OTP_MEM_SIZE};
pub use poll::poll_until;
pub use sha::{Sha, ShaAlgo, SHA256_DIGEST_BYTE_SIZE};
pub use sjtag::Sjtag;
pub use trng::Trng;

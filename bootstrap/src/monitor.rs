/*++

Licensed under the Apache-2.0 license.

File Name:

    monitor.rs

Abstract:

    File contains the BL2U bootstrap monitor: the request loop and the
    provisioning command handlers for image upload, firmware binding,
    flash programming, OTP and DDR management.

--*/

use fwu_drivers::printer::HexBytes;
use fwu_drivers::{
    cprintln, AesGcm, BlockDevice, Console, DdrConfig, DdrController, EncKeys, Inflate, NorFlash,
    Otp, PartitionTable, Sha, ShaAlgo, Trng, DDR_CONFIG_BYTE_SIZE, GZIP_MAGIC,
    SHA256_DIGEST_BYTE_SIZE,
};
use fwu_error::{FwuError, FwuResult};
use fwu_image_bind::{bind_err_to_str, toc, FipBindEnv, FipBinder};
use fwu_image_types::{FwEncStatus, ENC_IV_SIZE, ENC_KEY_SIZE, ENC_TAG_SIZE};
use zerocopy::{AsBytes, FromBytes};

use crate::commands::CommandId;
use crate::io::{self, BootSource, FW_BACKUP_PARTITION_NAME, FW_PARTITION_NAME};
use crate::otp_cmds;
use crate::session::Session;
use crate::wire::{Channel, Request, XferOutcome};
use crate::ddr_test;

/// Staging alignment of the decompression output window.
const UNZIP_OUT_ALIGN: usize = 1 << 20;

/// Hardware services the BL2U monitor runs against.
pub trait Bl2uPlatform:
    Otp + Trng + Sha + AesGcm + EncKeys + Inflate + DdrController
{
    fn version_string(&self) -> &'static str;

    fn chip_id(&mut self) -> u32;

    /// The strapping-selected boot source.
    fn boot_source(&mut self) -> BootSource;

    /// Brings up the IO backend for `source` (clocks, pinmux, controller
    /// init). Datasheet-driven; opaque to this stack.
    fn io_init_dev(&mut self, source: BootSource) -> FwuResult<()>;

    fn block_device(&mut self) -> &mut dyn BlockDevice;

    fn nor_flash(&mut self) -> &mut dyn NorFlash;

    fn partitions(&mut self) -> &mut dyn PartitionTable;

    /// Board-default DDR configuration the session starts from.
    fn default_ddr_config(&self) -> DdrConfig;
}

/// Adapts the platform's key store and crypto engines to the binder's
/// environment.
struct PlatformBindEnv<'a, P: Bl2uPlatform>(&'a mut P);

impl<P: Bl2uPlatform> FipBindEnv for PlatformBindEnv<'_, P> {
    fn enc_key(&mut self, kind: FwEncStatus, key: &mut [u8; ENC_KEY_SIZE]) -> FwuResult<usize> {
        EncKeys::enc_key(self.0, kind, key)
    }

    fn aes_gcm_decrypt(
        &mut self,
        data: &mut [u8],
        key: &[u8],
        iv: &[u8],
        tag: &[u8],
    ) -> FwuResult<()> {
        AesGcm::gcm_decrypt(self.0, data, key, iv, tag)
    }

    fn aes_gcm_encrypt(
        &mut self,
        data: &mut [u8],
        key: &[u8],
        iv: &[u8; ENC_IV_SIZE],
        tag: &mut [u8; ENC_TAG_SIZE],
    ) -> FwuResult<()> {
        AesGcm::gcm_encrypt(self.0, data, key, iv, tag)
    }

    fn trng_word(&mut self) -> u32 {
        Trng::read_word(self.0)
    }
}

/// BL2U bootstrap monitor.
pub struct Bl2uMonitor<C: Console, P: Bl2uPlatform> {
    channel: Channel<C>,
    platform: P,
}

impl<C: Console, P: Bl2uPlatform> Bl2uMonitor<C, P> {
    pub fn new(console: C, platform: P) -> Self {
        Self {
            channel: Channel::new(console),
            platform,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn into_platform(self) -> P {
        self.platform
    }

    /// Serves requests until the reset command or loss of the transport.
    pub fn run(&mut self, session: &mut Session<'_>) -> FwuResult<()> {
        cprintln!("*** ENTERING BL2U BOOTSTRAP MONITOR ***");
        session.ddr_config = self.platform.default_ddr_config();
        let result = self.serve(session);
        cprintln!("*** EXITING BL2U BOOTSTRAP MONITOR ***");
        result
    }

    fn serve(&mut self, session: &mut Session<'_>) -> FwuResult<()> {
        loop {
            let req = match self.channel.rx_req() {
                Ok(req) => req,
                Err(err) if err == FwuError::BOOTSTRAP_GARBLED_REQUEST => {
                    self.channel.tx_nack("Garbled command");
                    continue;
                }
                Err(err) => return Err(err),
            };

            if req.is_cmd(CommandId::RESET) {
                self.channel.tx_ack();
                return Ok(());
            } else if req.is_cmd(CommandId::VERS) {
                self.handle_version();
            } else if req.is_cmd(CommandId::SEND) {
                self.handle_load_data(&req, session)?;
            } else if req.is_cmd(CommandId::UNZIP) {
                self.handle_unzip_data(session);
            } else if req.is_cmd(CommandId::WRITE_IMAGE) {
                self.handle_write_image(&req, session);
            } else if req.is_cmd(CommandId::WRITE_FIP) {
                self.handle_write_fip(&req, session);
            } else if req.is_cmd(CommandId::BIND) {
                self.handle_bind(session);
            } else if req.is_cmd(CommandId::OTP_DATA) {
                otp_cmds::handle_otp_data(&mut self.channel, &mut self.platform, &req)?;
            } else if req.is_cmd(CommandId::OTP_RANDOM) {
                otp_cmds::handle_otp_random(&mut self.channel, &mut self.platform, &req)?;
            } else if req.is_cmd(CommandId::OTP_READ_EMU) {
                otp_cmds::handle_otp_read(&mut self.channel, &mut self.platform, &req, false)?;
            } else if req.is_cmd(CommandId::OTP_READ_RAW) {
                otp_cmds::handle_otp_read(&mut self.channel, &mut self.platform, &req, true)?;
            } else if req.is_cmd(CommandId::DDR_CFG_SET) {
                self.handle_ddr_cfg_set(&req, session)?;
            } else if req.is_cmd(CommandId::DDR_CFG_GET) {
                self.handle_ddr_cfg_get(session);
            } else if req.is_cmd(CommandId::DDR_TEST) {
                self.handle_ddr_test(session);
            } else if req.is_cmd(CommandId::DATA_HASH) {
                self.handle_data_hash(session);
            } else {
                self.channel.tx_nack("Unknown command");
            }
        }
    }

    fn handle_version(&mut self) {
        let mut ident = [0u8; 128];
        let prefix = b"BL2U:";
        let version = self.platform.version_string().as_bytes();
        let len = (prefix.len() + version.len()).min(ident.len());
        ident[..prefix.len()].copy_from_slice(prefix);
        ident[prefix.len()..len].copy_from_slice(&version[..len - prefix.len()]);

        let chip = self.platform.chip_id();
        self.channel.tx_ack_data_arg(chip, &ident[..len]);
    }

    fn handle_load_data(&mut self, req: &Request, session: &mut Session<'_>) -> FwuResult<()> {
        let length = req.arg0 as usize;
        session.set_received_len(0);

        if length == 0 || length > session.capacity() {
            self.channel.tx_nack("Length Error");
            return Ok(());
        }

        // Bring up DDR lazily, possibly with board defaults.
        if !session.ddr_initialized {
            if self.platform.init(&session.ddr_config).is_err() {
                self.channel.tx_nack("DDR initialization error");
                return Ok(());
            }
            session.ddr_initialized = true;
        }

        // Go ahead, receive data.
        self.channel.tx_ack();

        let mut offset = 0;
        while offset < length {
            let window = &mut session.staging_mut()[offset..length];
            match self.channel.rx_data(window, offset)? {
                XferOutcome::Received(n) if n > 0 => offset += n,
                _ => break,
            }
        }

        if offset != length {
            cprintln!("[bl2u] rx data error: received {} of {} bytes", offset, length);
            return Ok(());
        }

        session.set_received_len(length);
        cprintln!("[bl2u] received {} bytes", length);
        Ok(())
    }

    fn handle_unzip_data(&mut self, session: &mut Session<'_>) {
        let mut resp = "Plain data";
        let in_len = session.received_len();

        if in_len >= 2 && session.received()[..2] == GZIP_MAGIC {
            // Decompress past the compressed input, then move the result
            // down over it.
            let out_start = align_up(in_len, UNZIP_OUT_ALIGN);
            let mut unzipped = None;
            if out_start < session.capacity() {
                let staging = session.staging_mut();
                let (input_area, out_area) = staging.split_at_mut(out_start);
                if let Ok(out_len) = self.platform.gunzip(&input_area[..in_len], out_area) {
                    let out_len = out_len.min(out_area.len());
                    staging.copy_within(out_start..out_start + out_len, 0);
                    unzipped = Some(out_len);
                }
            }
            if let Some(out_len) = unzipped {
                session.set_received_len(out_len);
                resp = "Decompressed data";
                cprintln!("[bl2u] unzipped data, length now {} bytes", out_len);
            }
        }

        let len = session.received_len() as u32;
        self.channel.tx_ack_data_arg(len, resp.as_bytes());
    }

    fn handle_write_image(&mut self, req: &Request, session: &mut Session<'_>) {
        let verify = req.arg0 & 0x80 != 0;

        if session.received_len() == 0 {
            self.channel.tx_nack("Flash Image not loaded");
            return;
        }

        let source = match BootSource::try_from(req.arg0 & 0x7F) {
            Ok(source) if io::valid_write_dev(source) => source,
            _ => {
                self.channel.tx_nack("Unsupported target device");
                return;
            }
        };

        if let Err(err) = self.platform.io_init_dev(source) {
            self.channel.tx_nack_rc("Image write failed", err.into());
            return;
        }

        let result = write_to_device(&mut self.platform, source, session.received(), verify);
        match result {
            Ok(()) => self.channel.tx_ack_str(if verify {
                "Image written and verified"
            } else {
                "Image written"
            }),
            Err(err) if err == FwuError::IO_READBACK_SHORT => {
                self.channel.tx_nack("Image readback failed")
            }
            Err(err) if err == FwuError::IO_READBACK_MISMATCH => {
                self.channel.tx_nack("Image verify failed")
            }
            Err(err) => self.channel.tx_nack_rc("Image write failed", err.into()),
        }
    }

    fn handle_write_fip(&mut self, req: &Request, session: &mut Session<'_>) {
        let verify = req.arg0 & 0x80 != 0;

        if session.received_len() == 0 {
            self.channel.tx_nack("FIP Image not loaded");
            return;
        }

        let source = match BootSource::try_from(req.arg0 & 0x7F) {
            Ok(source) if io::valid_write_dev(source) => source,
            _ => {
                self.channel.tx_nack("Unsupported target device");
                return;
            }
        };

        let header_ok = toc::read_header(session.received())
            .map(|header| header.is_valid())
            .unwrap_or(false);
        if !header_ok {
            self.channel.tx_nack("Data is not a valid FIP");
            return;
        }

        if source != self.platform.boot_source() {
            if let Err(err) = self.platform.io_init_dev(source) {
                self.channel.tx_nack_rc("Write FIP failed", err.into());
                return;
            }
        }

        let result = fip_update(&mut self.platform, source, session.received(), verify);
        match result {
            Ok(()) => self.channel.tx_ack_str(if verify {
                "FIP written and verified"
            } else {
                "FIP written"
            }),
            Err(err) if err == FwuError::IO_READBACK_SHORT => {
                self.channel.tx_nack("FIP readback failed")
            }
            Err(err) if err == FwuError::IO_READBACK_MISMATCH => {
                self.channel.tx_nack("FIP verify failed")
            }
            Err(err) if err == FwuError::IO_PARTITION_NOT_FOUND => {
                self.channel.tx_nack("FIP partition not found")
            }
            Err(err) if err == FwuError::IO_PARTITION_TOO_SMALL => {
                self.channel.tx_nack("FIP partition too small")
            }
            Err(err) => self.channel.tx_nack_rc("Write FIP failed", err.into()),
        }
    }

    fn handle_bind(&mut self, session: &mut Session<'_>) {
        if session.received_len() == 0 || session.received_len() > session.capacity() {
            self.channel.tx_nack("Image not loaded, length error");
            return;
        }

        let result = {
            let mut binder = FipBinder::new(PlatformBindEnv(&mut self.platform));
            binder.bind_fip(session.received_mut())
        };
        match result {
            Ok(()) => {
                cprintln!("[bl2u] FIP image successfully bound");
                self.channel.tx_ack();
            }
            Err(err) => self.channel.tx_nack(bind_err_to_str(err)),
        }
    }

    fn handle_ddr_cfg_set(&mut self, req: &Request, session: &mut Session<'_>) -> FwuResult<()> {
        if req.len as usize != DDR_CONFIG_BYTE_SIZE {
            self.channel.tx_nack("Illegal DDR config size");
            return Ok(());
        }

        let mut buf = [0u8; DDR_CONFIG_BYTE_SIZE];
        if !self.channel.rx_data_crc(req, &mut buf)? {
            self.channel.tx_nack("DDR config rx data failed");
            return Ok(());
        }

        if let Some(config) = DdrConfig::read_from(&buf[..]) {
            session.ddr_config = config;
        }
        match self.platform.init(&session.ddr_config) {
            Ok(()) => {
                session.ddr_initialized = true;
                self.channel.tx(CommandId::ACK, req.arg0, &[]);
            }
            Err(_) => self.channel.tx_nack("DDR initialization failed"),
        }
        Ok(())
    }

    fn handle_ddr_cfg_get(&mut self, session: &Session<'_>) {
        self.channel.tx_ack_data(session.ddr_config.as_bytes());
    }

    fn handle_ddr_test(&mut self, session: &mut Session<'_>) {
        if !session.ddr_initialized {
            self.channel.tx_nack("DDR not initialized");
            return;
        }

        let size = (session.ddr_config.info.size.get() as usize).min(session.capacity());
        let mem = session.staging_mut();

        // Fixed order, stop at the first failing sub-test.
        if let Some(offset) = ddr_test::test_data_bus(mem) {
            self.channel.tx_nack_rc("DDR data bus test", offset as u32);
            return;
        }
        if let Some(offset) = ddr_test::test_addr_bus(mem, size) {
            self.channel.tx_nack_rc("DDR address bus test", offset as u32);
            return;
        }
        if let Some(offset) = ddr_test::test_rnd(mem, size, ddr_test::DDR_TEST_SEED) {
            self.channel.tx_nack_rc("DDR sweep test", offset as u32);
            return;
        }
        self.channel.tx_ack_str("Test succeeded");
    }

    fn handle_data_hash(&mut self, session: &Session<'_>) {
        if session.received_len() == 0 {
            self.channel.tx_nack("No downloaded data");
            return;
        }

        let mut digest = [0u8; SHA256_DIGEST_BYTE_SIZE];
        match self
            .platform
            .hash(ShaAlgo::Sha256, session.received(), &mut digest)
        {
            Ok(()) => {
                cprintln!("[bl2u] data hash {}", HexBytes(&digest));
                let len = session.received_len() as u32;
                self.channel.tx_ack_data_arg(len, &digest);
            }
            Err(err) => self.channel.tx_nack_rc("Hash failed", err.into()),
        }
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Writes staged bytes to the selected device at offset zero.
fn write_to_device<P: Bl2uPlatform>(
    platform: &mut P,
    source: BootSource,
    data: &[u8],
    verify: bool,
) -> FwuResult<()> {
    match source {
        BootSource::Emmc | BootSource::Sdmmc => {
            let dev = platform.block_device();
            io::block_write(dev, 0, data)?;
            if verify {
                io::block_verify(dev, 0, data)?;
            }
            Ok(())
        }
        BootSource::Qspi => {
            let dev = platform.nor_flash();
            dev.write(0, data)?;
            io::nor_verify(dev, 0, data)
        }
        _ => Err(FwuError::IO_UNSUPPORTED_SOURCE),
    }
}

/// Updates the FIP on the selected device: primary then backup partition
/// on block devices, raw offset zero on NOR.
fn fip_update<P: Bl2uPlatform>(
    platform: &mut P,
    source: BootSource,
    data: &[u8],
    verify: bool,
) -> FwuResult<()> {
    match source {
        BootSource::Emmc | BootSource::Sdmmc => {
            let (primary, backup) = {
                let partitions = platform.partitions();
                partitions.init()?;
                (
                    partitions.entry(FW_PARTITION_NAME),
                    partitions.entry(FW_BACKUP_PARTITION_NAME),
                )
            };
            let dev = platform.block_device();
            io::fip_update(dev, primary, FW_PARTITION_NAME, data, verify)?;
            io::fip_update(dev, backup, FW_BACKUP_PARTITION_NAME, data, verify)
        }
        BootSource::Qspi => {
            let dev = platform.nor_flash();
            dev.write(0, data)?;
            io::nor_verify(dev, 0, data)
        }
        _ => Err(FwuError::IO_UNSUPPORTED_SOURCE),
    }
}
